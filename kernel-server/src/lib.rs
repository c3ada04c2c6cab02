//! WS/REST control plane for the Aether kernel: the wire protocol, the
//! command dispatcher, the `/kernel` WS upgrade handler, the REST surface,
//! and the `axum::serve` bootstrap. Grounded on the teacher's
//! `axon::commands::api` module, collapsed from several files into this
//! one crate's module set.

pub mod dispatcher;
pub mod routes;
pub mod server;
pub mod state;
pub mod wire;
pub mod ws;

pub use server::start_server;
pub use state::{install_event_forwarder, AppState};
