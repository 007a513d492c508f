//! API Module
//!
//! HTTP handlers and routing for inspecting and administering the cache.
//!
//! # Endpoints
//! - `PUT /set` - Store a value
//! - `GET /get/:key` - Read a value
//! - `GET /entries/:key` - Entry metadata
//! - `DELETE /del/:key` - Invalidate a key
//! - `POST /clear` - Drop every entry
//! - `POST /warm` - Bulk-populate the cache
//! - `GET /stats` - Stats snapshot
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
