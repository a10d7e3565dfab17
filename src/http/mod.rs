//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, access-control pipeline)
//!     → request.rs (request ID)
//!     → error.rs (stable error ids, JSON error bodies)
//!     → Send to client
//! ```

pub mod error;
pub mod request;
pub mod server;

pub use error::ApiError;
pub use request::{request_id, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
