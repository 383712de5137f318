//! Single-session WhatsApp bridge.
//!
//! Owns the connection lifecycle of one messaging session (pairing QR,
//! credential persistence, automatic reconnection) and exposes it over a
//! small API-key-guarded HTTP control surface. The wire protocol itself
//! lives behind the [`transport::Transport`] trait.

pub mod config;
pub mod credentials;
pub mod error;
pub mod qr;
pub mod routes;
pub mod session;
pub mod state;
pub mod transport;
