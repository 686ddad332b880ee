use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{error::Result, types::CredentialBundle};

const TOKEN_FILE: &str = "access_token.json";

/// File-backed persistence for the credential bundle.
///
/// Holds no state besides the path; the bundle itself is owned by whoever
/// loaded it.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore {
    /// Store at `~/.spotctl/access_token.json`.
    pub fn new() -> Self {
        Self::with_path(default_token_path())
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the bundle. A missing or unreadable file means "not logged in".
    pub fn load(&self) -> Option<CredentialBundle> {
        let data = match fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no token file");
                return None;
            },
            Err(e) => {
                warn!(path = %self.path.display(), %e, "failed to read token file");
                return None;
            },
        };
        match serde_json::from_str(&data) {
            Ok(bundle) => Some(bundle),
            Err(e) => {
                warn!(path = %self.path.display(), %e, "ignoring unparseable token file");
                None
            },
        }
    }

    /// Write the bundle via a temp file and rename, so a crash never leaves a
    /// half-written token file behind.
    pub fn save(&self, bundle: &CredentialBundle) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(bundle)?;

        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = open_private(&tmp)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!(path = %self.path.display(), "saved token file");
        Ok(())
    }

    /// Remove the token file. Succeeds if there was nothing to remove.
    pub fn delete(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::File::create(path)
}

fn default_token_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".spotctl"))
        .unwrap_or_else(|| PathBuf::from(".spotctl"))
        .join(TOKEN_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CredentialBundle {
        CredentialBundle {
            access_token: "BQD-access".into(),
            token_type: "Bearer".into(),
            expires_in: 3600,
            expires_at: 1_700_003_600,
            refresh_token: "AQB-refresh".into(),
            user_id: Some("wizzler".into()),
        }
    }

    #[test]
    fn test_save_then_load_is_identical() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TokenStore::with_path(tmp.path().join("nested/access_token.json"));
        let bundle = sample();
        store.save(&bundle).unwrap();
        assert_eq!(store.load(), Some(bundle));
    }

    #[test]
    fn test_save_overwrites_and_leaves_no_temp_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("access_token.json");
        let store = TokenStore::with_path(&path);
        store.save(&sample()).unwrap();

        let mut updated = sample();
        updated.access_token = "BQD-newer".into();
        store.save(&updated).unwrap();

        assert_eq!(store.load().unwrap().access_token, "BQD-newer");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TokenStore::with_path(tmp.path().join("absent.json"));
        assert!(store.load().is_none());
    }

    #[test]
    fn test_load_garbage_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("access_token.json");
        fs::write(&path, "{not json").unwrap();
        assert!(TokenStore::with_path(path).load().is_none());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TokenStore::with_path(tmp.path().join("access_token.json"));
        store.save(&sample()).unwrap();
        store.delete().unwrap();
        assert!(store.load().is_none());
        store.delete().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_token_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("access_token.json");
        TokenStore::with_path(&path).save(&sample()).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_save_into_unwritable_location_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let store = TokenStore::with_path(blocker.join("access_token.json"));
        assert!(matches!(store.save(&sample()), Err(crate::Error::Io(_))));
    }
}
