//! Portal HTTP API.
//!
//! Exposes the policy, document, brief and administrative operations as
//! JSON endpoints under `/api/`, plus `/storage/` for published files.
//! Protected routes pass through Auth → Audit → Handler.
//!
//! `api_router()` returns a `Router` that can be mounted on any axum
//! server instance; `server` runs it standalone.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_server, serve_until_ctrl_c, PortalServer, ServerError, ServerSession};
pub use types::ApiContext;
