//! HTTP layer.
//!
//! # Responsibilities
//! - Serve the router built in server.rs
//! - Assign request IDs (request.rs)
//! - Render admission rejections (response.rs)
//! - Adapt the admission pipeline to axum middleware (middleware/)

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::RequestId;
pub use response::Rejection;
pub use server::HttpServer;
