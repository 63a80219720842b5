//! # Session Persistence
//!
//! Keeps the signed-in auth session at `~/.copilot-chat/session.json` so the
//! next start can skip the login screen.
//!
//! All writes use atomic rename (write `.tmp`, then `rename()`) for crash
//! safety. A corrupt file is treated as "no session".

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::backend::AuthSession;

/// On-disk wrapper around the session.
#[derive(Serialize, Deserialize, Debug)]
struct StoredSession {
    saved_at: i64,
    session: AuthSession,
}

/// Location of the stored session. `None` disables persistence.
#[derive(Clone, Debug)]
pub struct SessionFile {
    path: Option<PathBuf>,
}

impl SessionFile {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// `~/.copilot-chat/session.json`, or a disabled store without a home
    /// directory.
    pub fn default_location() -> Self {
        Self {
            path: crate::core::config::data_dir().map(|d| d.join("session.json")),
        }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Reads the stored session, if any. Unreadable files are discarded.
    pub fn load(&self) -> Option<AuthSession> {
        let path = self.path.as_ref()?;
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read session file {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str::<StoredSession>(&json) {
            Ok(stored) => {
                debug!("Loaded session saved at {}", stored.saved_at);
                Some(stored.session)
            }
            Err(e) => {
                warn!("Discarding corrupt session file: {}", e);
                let _ = fs::remove_file(path);
                None
            }
        }
    }

    pub fn save(&self, session: &AuthSession) -> io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let stored = StoredSession {
            saved_at: Utc::now().timestamp(),
            session: session.clone(),
        };
        atomic_write_json(path, &stored)?;
        debug!("Session saved to {}", path.display());
        Ok(())
    }

    pub fn clear(&self) -> io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Atomically write `data` as JSON to `path` (via `.tmp` + rename). The
/// file holds a refresh token, so on unix only the owner may read it.
fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    // A leftover temp file would keep its old permissions.
    match fs::remove_file(&tmp_path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(&tmp_path)?;
    file.write_all(json.as_bytes())?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::AuthUser;
    use uuid::Uuid;

    fn temp_store() -> (SessionFile, PathBuf) {
        let dir = std::env::temp_dir().join(format!("copilot-chat-session-{}", Uuid::new_v4()));
        (SessionFile::at(dir.join("session.json")), dir)
    }

    fn session() -> AuthSession {
        AuthSession {
            access_token: "at".into(),
            refresh_token: "rt".into(),
            expires_at: 1_900_000_000,
            user: AuthUser {
                id: Uuid::new_v4(),
                email: Some("a@b.c".into()),
            },
        }
    }

    #[test]
    fn test_save_then_load() {
        let (store, dir) = temp_store();
        assert!(store.load().is_none());
        let saved = session();
        store.save(&saved).unwrap();
        assert_eq!(store.load(), Some(saved));
        assert!(!dir.join("session.tmp").exists());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (store, dir) = temp_store();
        store.save(&session()).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load().is_none());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_corrupt_file_is_discarded() {
        let (store, dir) = temp_store();
        fs::create_dir_all(&dir).unwrap();
        fs::write(store.path().unwrap(), "{not json").unwrap();
        assert!(store.load().is_none());
        assert!(!store.path().unwrap().exists());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_disabled_store_is_inert() {
        let store = SessionFile::disabled();
        store.save(&session()).unwrap();
        assert!(store.load().is_none());
        store.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_session_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let (store, dir) = temp_store();
        store.save(&session()).unwrap();
        store.save(&session()).unwrap();
        let mode = fs::metadata(store.path().unwrap()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        let _ = fs::remove_dir_all(dir);
    }
}
