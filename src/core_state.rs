//! Transport-agnostic application state.
//!
//! `CoreState` bundles the collaborators every operation needs: the policy
//! store, object storage, identity provider, document codec and PDF
//! rasterizer. It is built once at startup, wrapped in `Arc`, and shared by
//! all request handlers. Tests build one over in-memory backends.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::PortalConfig;
use crate::db::{self, DatabaseError};
use crate::document::docx::{DocumentCodec, DocxCodec};
use crate::document::render::{CommandRasterizer, PdfRasterizer, Rasterizer};
use crate::identity::{IdentityProvider, SqliteIdentity};
use crate::storage::{LocalObjectStore, ObjectStore};
use crate::store::{shared_connection, PolicyStore, SqlitePolicyStore};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct CoreState {
    pub store: Arc<dyn PolicyStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub codec: Arc<dyn DocumentCodec>,
    pub rasterizer: Arc<dyn Rasterizer>,
    /// Directory scanned by the sample-document upload utility.
    pub samples_dir: PathBuf,
}

impl CoreState {
    /// Open the on-disk database and storage under `config.data_dir`.
    pub fn open(config: &PortalConfig) -> Result<Self, CoreError> {
        std::fs::create_dir_all(&config.data_dir)?;
        std::fs::create_dir_all(config.storage_dir())?;

        let conn = shared_connection(db::open_database(&config.db_path())?);
        let rasterizer: Arc<dyn Rasterizer> = match &config.pdf_command {
            Some(command) => {
                tracing::info!(command = %command, "Using external PDF renderer");
                Arc::new(CommandRasterizer::new(command.clone()))
            }
            None => Arc::new(PdfRasterizer),
        };

        Ok(Self {
            store: Arc::new(SqlitePolicyStore::new(Arc::clone(&conn))),
            objects: Arc::new(LocalObjectStore::new(config.storage_dir(), config.public_url.clone())),
            identity: Arc::new(SqliteIdentity::new(conn)),
            codec: Arc::new(DocxCodec),
            rasterizer,
            samples_dir: config.samples_dir(),
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::storage::MemoryObjectStore;

    /// State over an in-memory database and object store. The store and the
    /// identity provider share one connection, as in production.
    pub fn state() -> CoreState {
        state_with_objects(Arc::new(MemoryObjectStore::new()))
    }

    pub fn state_with_objects(objects: Arc<dyn ObjectStore>) -> CoreState {
        let store = SqlitePolicyStore::open_in_memory().unwrap();
        let conn = store.connection();
        CoreState {
            store: Arc::new(store),
            objects,
            identity: Arc::new(SqliteIdentity::with_iterations(conn, 1_000)),
            codec: Arc::new(DocxCodec),
            rasterizer: Arc::new(PdfRasterizer),
            samples_dir: std::env::temp_dir().join("proofhub-no-samples"),
        }
    }
}
