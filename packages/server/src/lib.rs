//! Multiplayer session coordinator.
//!
//! Layers:
//! - `domain`: entities, the per-key entity store and the traits for external collaborators
//! - `usecase`: connection state tracking and room coordination
//! - `infrastructure`: in-memory store, WebSocket pusher and DTOs
//! - `ui`: axum WebSocket / HTTP server

pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
