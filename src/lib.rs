// Public API for integration tests and potential library usage

pub mod api;
pub mod auth;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod store;
pub mod types;
pub mod ws;
