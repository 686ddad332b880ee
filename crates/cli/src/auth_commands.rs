use {
    anyhow::Result,
    serde_json::json,
    spotctl_oauth::unix_now,
    spotctl_spotify::SpotifyClient,
    tokio_util::sync::CancellationToken,
};

pub async fn login(client: &SpotifyClient, json: bool) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    eprintln!("Opening browser for authentication...");
    let summary = client.login(&cancel).await;
    cancel.cancel();
    let summary = summary?;

    if let Some(e) = &summary.persist_error {
        eprintln!("warning: logged in, but the token file could not be saved: {e}");
    }
    if json {
        println!(
            "{}",
            json!({
                "user_id": summary.user_id,
                "display_name": summary.display_name,
                "persisted": summary.persist_error.is_none(),
            })
        );
    } else {
        let who = summary.display_name.as_deref().unwrap_or(&summary.user_id);
        println!("Authenticated as {who}");
    }
    Ok(())
}

pub async fn logout(client: &SpotifyClient, json: bool) -> Result<()> {
    client.logout().await?;
    if json {
        println!("{}", json!({ "logged_out": true }));
    } else {
        println!("Logged out; removed {}", client.store().path().display());
    }
    Ok(())
}

pub async fn status(client: &SpotifyClient, json: bool) -> Result<()> {
    let path = client.store().path().display().to_string();
    let Some(bundle) = client.credentials().await else {
        if json {
            println!("{}", json!({ "authenticated": false, "token_path": path }));
        } else {
            println!("Not authenticated. Run `spotctl login`.");
        }
        return Ok(());
    };

    let remaining = bundle.expires_at.checked_sub(unix_now()).filter(|r| *r > 0);
    if json {
        println!(
            "{}",
            json!({
                "authenticated": true,
                "user_id": bundle.user_id,
                "expires_at": bundle.expires_at,
                "token_path": path,
            })
        );
    } else {
        let user = bundle.user_id.as_deref().unwrap_or("unknown user");
        let expiry = remaining.map_or("expired, refreshes on next command".to_string(), describe_remaining);
        println!("{user} [{expiry}]");
        println!("token file: {path}");
    }
    Ok(())
}

fn describe_remaining(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    format!("valid ({hours}h {mins}m remaining)")
}
