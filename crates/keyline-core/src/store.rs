//! Credential storage.
//!
//! The persisted session lives in `<base>/session.json` with restricted permissions (0600).
//! Token and user are written together as one document, so a reader never observes one
//! updated without the other. Tokens are never logged.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use anyhow::{Context, Result};

use crate::config::paths;
use crate::models::{Session, UserProfile};

/// Durable home of the session. Every write replaces whole fields.
pub trait CredentialStore: Send + Sync {
    /// Persists token and user together.
    ///
    /// # Errors
    /// Returns an error if the persistence medium is unavailable.
    fn save(&self, token: &str, user: &UserProfile) -> Result<()>;

    /// Replaces the cached user, leaving the token untouched.
    ///
    /// # Errors
    /// Returns an error if the persistence medium is unavailable.
    fn save_user(&self, user: &UserProfile) -> Result<()>;

    /// Returns the last persisted session, or the empty session if none.
    ///
    /// # Errors
    /// Returns an error if the persistence medium is unavailable or corrupt.
    fn read(&self) -> Result<Session>;

    /// Erases everything. Clearing an empty store is not an error.
    ///
    /// # Errors
    /// Returns an error if the persistence medium is unavailable.
    fn clear(&self) -> Result<()>;
}

/// JSON file backed store.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location under `KEYLINE_HOME`.
    pub fn open_default() -> Self {
        Self::new(paths::session_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, session: &Session) -> Result<()> {
        let path = &self.path;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents =
            serde_json::to_string_pretty(session).context("Failed to serialize session")?;

        // Write beside the target, then rename over it.
        let tmp_path = path.with_extension("json.tmp");
        write_private(&tmp_path, contents.as_bytes())?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .with_context(|| format!("Failed to open {} for writing", path.display()))?;
        file.write_all(contents)
            .with_context(|| format!("Failed to write to {}", path.display()))?;
    }

    #[cfg(not(unix))]
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("Failed to open {} for writing", path.display()))?;
        file.write_all(contents)
            .with_context(|| format!("Failed to write to {}", path.display()))?;
    }

    Ok(())
}

impl CredentialStore for FileStore {
    fn save(&self, token: &str, user: &UserProfile) -> Result<()> {
        self.write(&Session::new(token, user.clone()))
    }

    fn save_user(&self, user: &UserProfile) -> Result<()> {
        let mut session = self.read()?;
        session.user = Some(user.clone());
        self.write(&session)
    }

    fn read(&self) -> Result<Session> {
        let path = &self.path;
        if !path.exists() {
            return Ok(Session::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read session from {}", path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse session from {}", path.display()))
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}

/// Process-local store for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    session: RwLock<Session>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: RwLock::new(session),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn save(&self, token: &str, user: &UserProfile) -> Result<()> {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) =
            Session::new(token, user.clone());
        Ok(())
    }

    fn save_user(&self, user: &UserProfile) -> Result<()> {
        self.session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .user = Some(user.clone());
        Ok(())
    }

    fn read(&self) -> Result<Session> {
        Ok(self
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn clear(&self) -> Result<()> {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Session::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn full_user() -> UserProfile {
        UserProfile {
            id: 42,
            first_name: "Ann".to_string(),
            last_name: "Lee".to_string(),
            email: "ann@x.com".to_string(),
            status: Some("ACTIVE".to_string()),
            created_at: Some("2024-03-01T10:00:00".to_string()),
            updated_at: Some("2024-03-02T11:30:00Z".to_string()),
        }
    }

    fn bare_user() -> UserProfile {
        UserProfile {
            id: 1,
            first_name: "Bo".to_string(),
            last_name: "Kim".to_string(),
            email: "bo@x.com".to_string(),
            status: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_file_store_read_missing_is_empty() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("session.json"));
        assert_eq!(store.read().unwrap(), Session::default());
    }

    #[test]
    fn test_file_store_save_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("session.json"));

        for user in [full_user(), bare_user()] {
            store.save("tok-123", &user).unwrap();
            assert_eq!(store.read().unwrap(), Session::new("tok-123", user));
        }
    }

    #[test]
    fn test_file_store_save_user_keeps_token() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("session.json"));
        store.save("tok-123", &bare_user()).unwrap();

        store.save_user(&full_user()).unwrap();

        let session = store.read().unwrap();
        assert_eq!(session.token.as_deref(), Some("tok-123"));
        assert_eq!(session.user, Some(full_user()));
    }

    #[test]
    fn test_file_store_clear_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("session.json"));
        store.save("tok-123", &bare_user()).unwrap();

        store.clear().unwrap();
        store.clear().unwrap();

        assert!(!store.path().exists());
        assert_eq!(store.read().unwrap(), Session::default());
    }

    #[test]
    fn test_file_store_corrupt_file_propagates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        let err = FileStore::new(&path).read().unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse session"));
    }

    #[test]
    fn test_file_store_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("session.json"));
        store.save("tok-123", &bare_user()).unwrap();

        assert!(!dir.path().join("session.json.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("session.json"));
        store.save("tok-123", &bare_user()).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_memory_store_contract() {
        let store = MemoryStore::new();
        assert_eq!(store.read().unwrap(), Session::default());

        store.save("abc", &bare_user()).unwrap();
        store.save_user(&full_user()).unwrap();
        assert_eq!(store.read().unwrap(), Session::new("abc", full_user()));

        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(store.read().unwrap(), Session::default());
    }
}
