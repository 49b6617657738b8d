//! Admin session: the credential attached to every mutating request.
//!
//! The credential lives in memory for the process and is mirrored to a small
//! JSON file so a restart restores the logged-in state without a prompt.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::events::{EventSink, HubEvent, Notice};

const CREDENTIALS_FILE_NAME: &str = "credentials.json";

/// Opaque admin secret. Debug output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SavedCredential {
    admin_password: String,
}

/// On-disk home of the credential
#[derive(Debug, Clone)]
pub struct CredentialFile {
    path: PathBuf,
}

impl CredentialFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/freestream/credentials.json`
    pub fn default_location() -> anyhow::Result<Self> {
        let mut path = dirs::config_dir().ok_or_else(|| anyhow!("Could not find config directory"))?;
        path.push("freestream");
        fs::create_dir_all(&path).context("Failed to create config directory")?;
        path.push(CREDENTIALS_FILE_NAME);
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> anyhow::Result<Option<Credential>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path).context("Failed to read credentials file")?;
        let saved: SavedCredential =
            serde_json::from_str(&contents).context("Failed to parse credentials file")?;
        if saved.admin_password.is_empty() {
            return Ok(None);
        }
        Ok(Some(Credential(saved.admin_password)))
    }

    pub fn save(&self, credential: &Credential) -> anyhow::Result<()> {
        let saved = SavedCredential {
            admin_password: credential.0.clone(),
        };
        let contents = serde_json::to_string_pretty(&saved)?;
        write_private(&self.path, contents.as_bytes()).context("Failed to write credentials file")?;
        Ok(())
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow!("Failed to remove credentials file: {}", e)),
        }
    }
}

/// Write `contents` readable by the owner only.
#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    fs::write(path, contents)
}

pub struct Session {
    credential: RwLock<Option<Credential>>,
    file: Option<CredentialFile>,
    events: EventSink,
}

impl Session {
    pub fn new(file: Option<CredentialFile>, events: EventSink) -> Self {
        Self {
            credential: RwLock::new(None),
            file,
            events,
        }
    }

    /// A session that is never persisted
    pub fn in_memory() -> Self {
        Self::new(None, EventSink::detached())
    }

    /// Load a persisted credential. Returns whether the session is now authenticated.
    pub fn restore(&self) -> bool {
        let Some(file) = &self.file else {
            return self.is_authenticated();
        };

        match file.load() {
            Ok(Some(credential)) => {
                self.set(Some(credential));
                tracing::info!("Restored admin session");
                self.events.send(HubEvent::SessionChanged { authenticated: true });
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Could not restore admin session: {:#}", e);
                false
            }
        }
    }

    pub fn login(&self, password: &str) -> Result<()> {
        if password.trim().is_empty() {
            self.events.notice(Notice::error("Enter a password"));
            return Err(Error::blank("password"));
        }

        let credential = Credential::new(password);
        if let Some(file) = &self.file {
            if let Err(e) = file.save(&credential) {
                tracing::warn!("Could not persist admin credential: {:#}", e);
            }
        }
        self.set(Some(credential));

        tracing::info!("Admin logged in");
        self.events.send(HubEvent::SessionChanged { authenticated: true });
        self.events.notice(Notice::success("Logged in to the admin panel"));
        Ok(())
    }

    pub fn logout(&self) {
        self.clear();
        self.events.notice(Notice::success("Logged out of the admin panel").with_title("Logout"));
    }

    /// Drop the credential after the server rejected it.
    pub fn invalidate(&self) {
        tracing::warn!("Admin credential rejected, logging out");
        self.clear();
    }

    pub fn credential(&self) -> Option<Credential> {
        self.credential
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential().is_some()
    }

    fn set(&self, credential: Option<Credential>) {
        *self
            .credential
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = credential;
    }

    fn clear(&self) {
        self.set(None);
        if let Some(file) = &self.file {
            if let Err(e) = file.clear() {
                tracing::warn!("Could not remove persisted credential: {:#}", e);
            }
        }
        self.events.send(HubEvent::SessionChanged { authenticated: false });
    }
}
