//! Durable key material allowing session resumption without re-pairing.
//!
//! The transport emits many incremental credential updates during a session;
//! every update overwrites the single JSON blob on disk, so replaying the
//! same update is harmless.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Credentials the transport needs to resume a paired session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Identity the remote service knows this device by.
    pub device_id: String,
    /// Whether pairing completed and the device is registered upstream.
    #[serde(default)]
    pub registered: bool,
    /// Opaque transport key material, base64-encoded.
    pub key_material: String,
}

impl Credentials {
    pub fn new(device_id: impl Into<String>, key_material: &[u8]) -> Self {
        Self {
            device_id: device_id.into(),
            registered: true,
            key_material: STANDARD.encode(key_material),
        }
    }

    pub fn key_material_bytes(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(&self.key_material)
            .context("credential key material is not valid base64")
    }
}

/// File-backed credential persistence. One session, one blob.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load previously persisted credentials. `None` means no prior session
    /// exists and a fresh QR pairing is required.
    pub async fn load(&self) -> Result<Option<Credentials>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to read credentials from {}", self.path.display())
                })
            }
        };
        let creds = serde_json::from_str(&content).with_context(|| {
            format!("failed to parse credentials from {}", self.path.display())
        })?;
        Ok(Some(creds))
    }

    /// Durably overwrite the stored credentials. Safe to call repeatedly with
    /// the same or an evolving update.
    pub async fn save(&self, creds: &Credentials) -> Result<()> {
        let content = serde_json::to_string_pretty(creds).context("failed to encode credentials")?;
        write_file_secure(&self.path, &content).await
    }
}

/// Write content to a file with owner-only permissions (0o600 on Unix).
///
/// Uses `spawn_blocking` to avoid blocking the async runtime.
async fn write_file_secure(path: &Path, content: &str) -> Result<()> {
    let path = path.to_path_buf();
    let content = content.to_string();

    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        #[cfg(unix)]
        {
            use std::fs::Permissions;
            use std::io::Write;
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&path)?;
            file.write_all(content.as_bytes())?;
            std::fs::set_permissions(&path, Permissions::from_mode(0o600))?;
        }

        #[cfg(not(unix))]
        {
            std::fs::write(&path, &content)?;
        }

        Ok(())
    })
    .await
    .context("credential file write task panicked")?
    .context("failed to write credential file")?;

    Ok(())
}
