//! HTTP surface for quill: routing, request handling and server lifecycle

pub mod config;
pub mod error;
pub mod handlers;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ApiError, ServerError};
pub use handlers::handle_request;
pub use server::QuillServer;
pub use state::AppState;
