use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Proof Hub";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Product label printed in every formatted policy header.
pub const PRODUCT_LABEL: &str = "Policy Proof Hub";

/// Accounts created per batch by the bulk user utilities.
pub const USER_BATCH_SIZE: usize = 5;

/// Attestations shown on a policy's approval panel.
pub const RECENT_ATTESTATION_LIMIT: usize = 10;

const DEFAULT_BIND: &str = "127.0.0.1:8787";

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,proofhub_lib=debug,tower_http=info"
}

/// Get the application data directory.
/// ~/ProofHub/ unless `PROOFHUB_DATA_DIR` overrides it.
pub fn app_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("PROOFHUB_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("ProofHub")
}

/// Runtime settings for the portal server.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub data_dir: PathBuf,
    pub bind: SocketAddr,
    /// Base URL that stored objects are served from.
    pub public_url: String,
    /// External HTML→PDF renderer. The built-in renderer is used when unset.
    pub pdf_command: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PROOFHUB_BIND address {value:?}: {reason}")]
    InvalidBind { value: String, reason: String },
}

impl PortalConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup so tests need not touch the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_dir = lookup("PROOFHUB_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(app_data_dir);

        let bind_raw = lookup("PROOFHUB_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind_raw.parse().map_err(|e: std::net::AddrParseError| {
            ConfigError::InvalidBind {
                value: bind_raw.clone(),
                reason: e.to_string(),
            }
        })?;

        let public_url = lookup("PROOFHUB_PUBLIC_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("http://{bind}"));

        let pdf_command = lookup("PROOFHUB_PDF_COMMAND").filter(|s| !s.trim().is_empty());

        Ok(Self {
            data_dir,
            bind,
            public_url,
            pdf_command,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("proofhub.db")
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.data_dir.join("storage")
    }

    /// Sample PDFs picked up by the sample-upload utility.
    pub fn samples_dir(&self) -> PathBuf {
        self.data_dir.join("samples")
    }
}
