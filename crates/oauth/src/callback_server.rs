use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use {
    axum::{
        Router,
        extract::{Query, State},
        http::{StatusCode, header},
        response::{IntoResponse, Response},
        routing::get,
    },
    serde::Deserialize,
    tokio::{
        net::TcpListener,
        sync::{Mutex, oneshot},
        task::JoinHandle,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::error::{Error, Result};

type Outcome = Result<String>;

/// Query parameters the provider appends to the redirect.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Classify a callback request against the nonce of the pending login.
pub fn check_callback(params: &CallbackParams, expected_state: &str) -> Result<String> {
    let Some(state) = params.state.as_deref() else {
        return Err(Error::MissingParam("state"));
    };
    if state != expected_state {
        return Err(Error::StateMismatch {
            received: state.to_string(),
        });
    }
    if let Some(error) = &params.error {
        return Err(Error::AuthorizationDenied(error.clone()));
    }
    match params.code.as_deref() {
        Some(code) if !code.is_empty() => Ok(code.to_string()),
        _ => Err(Error::MissingParam("code")),
    }
}

struct CallbackState {
    authorize_url: String,
    expected_state: String,
    result: Mutex<Option<oneshot::Sender<Outcome>>>,
}

/// Short-lived loopback listener capturing the authorization redirect.
///
/// The redirect URI names `localhost`, which browsers may resolve to `::1`
/// before `127.0.0.1`. When bound to the IPv4 loopback, the same routes are
/// also served on `[::1]` at the same port if that address is available.
pub struct CallbackServer {
    local_addr: SocketAddr,
    outcome: oneshot::Receiver<Outcome>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl CallbackServer {
    /// Bind `addr` and start serving `/` (redirect to the provider) and
    /// `/auth` (the provider's redirect back).
    pub async fn start(addr: SocketAddr, authorize_url: String, state: String) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let (result_tx, outcome) = oneshot::channel();
        let shutdown = CancellationToken::new();

        let app = router(Arc::new(CallbackState {
            authorize_url,
            expected_state: state,
            result: Mutex::new(Some(result_tx)),
        }));

        let mut tasks = vec![serve(listener, app.clone(), shutdown.clone())];
        if local_addr.ip() == Ipv4Addr::LOCALHOST {
            let v6 = SocketAddr::from((Ipv6Addr::LOCALHOST, local_addr.port()));
            match TcpListener::bind(v6).await {
                Ok(listener) => tasks.push(serve(listener, app, shutdown.clone())),
                Err(e) => debug!(addr = %v6, %e, "IPv6 loopback unavailable"),
            }
        }

        debug!(%local_addr, listeners = tasks.len(), "callback listener started");
        Ok(Self {
            local_addr,
            outcome,
            shutdown,
            tasks,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// URL the browser should open to start the login.
    pub fn root_url(&self) -> String {
        format!("http://{}/", self.local_addr)
    }

    /// Wait for the callback, then tear the listener down.
    pub async fn wait_for_code(
        mut self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let outcome = tokio::select! {
            received = &mut self.outcome => match received {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::Cancelled),
            },
            () = tokio::time::sleep(timeout) => Err(Error::CallbackTimeout(timeout)),
            () = cancel.cancelled() => Err(Error::Cancelled),
        };
        self.shutdown().await;
        outcome
    }

    /// Stop serving and wait for the listener tasks to exit.
    pub async fn shutdown(&mut self) {
        self.shutdown.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(%e, "callback listener task failed");
            }
        }
        debug!(local_addr = %self.local_addr, "callback listener stopped");
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn serve(listener: TcpListener, app: Router, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let server =
            axum::serve(listener, app).with_graceful_shutdown(shutdown.cancelled_owned());
        if let Err(e) = server.await {
            warn!(%e, "callback listener stopped with error");
        }
    })
}

fn router(state: Arc<CallbackState>) -> Router {
    Router::new()
        .route("/", get(redirect_to_provider))
        .route("/auth", get(handle_callback))
        .with_state(state)
}

async fn redirect_to_provider(State(state): State<Arc<CallbackState>>) -> Response {
    (StatusCode::FOUND, [(
        header::LOCATION,
        state.authorize_url.clone(),
    )])
        .into_response()
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let outcome = check_callback(&params, &state.expected_state);
    let response = match &outcome {
        Ok(_) => {
            info!("received authorization code");
            (StatusCode::OK, "Authenticated! You can close this tab.".to_string())
        },
        Err(Error::MissingParam(name)) => {
            // A stray request does not end the pending login.
            debug!(param = name, "ignoring incomplete callback");
            return (StatusCode::BAD_REQUEST, format!("Missing parameter: {name}")).into_response();
        },
        Err(Error::StateMismatch { .. }) => {
            warn!("callback state does not match the pending login");
            (
                StatusCode::BAD_REQUEST,
                "Invalid state: login aborted. Run login again.".to_string(),
            )
        },
        Err(e) => {
            warn!(%e, "authorization failed");
            (StatusCode::BAD_REQUEST, e.to_string())
        },
    };

    if let Some(tx) = state.result.lock().await.take() {
        let _ = tx.send(outcome);
    }
    response.into_response()
}
