//! WebSocket / HTTP server for the multiplayer hub.

mod handler;
mod server;
mod signal;
pub mod state;

pub use server::{Server, build_router};
pub use state::AppState;
