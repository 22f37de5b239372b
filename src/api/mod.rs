pub mod routes;
mod server;
pub use server::{app, log_filter, serve};
pub mod public;
mod state;
pub use state::{AppState, SharedState};
