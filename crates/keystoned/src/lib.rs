//! keystoned — HTTP front end for a Keystone application root.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | List databases |
//! | GET | `/{db}` | Database id and object count |
//! | GET | `/{db}/@items` | Stream every object as NDJSON |
//! | GET | `/{db}/{key}` | Read one object |
//! | PUT | `/{db}/{key}` | Create or replace one object |
//! | DELETE | `/{db}/{key}` | Delete one object |
//!
//! Other methods get a `405` with the allowed list in `Allow`.

pub mod bridge;
pub mod handlers;
pub mod utilities;

use std::sync::Arc;

use axum::Router;
use axum::routing::any;
use keystone_db::ApplicationRoot;

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: Arc<ApplicationRoot>,
    /// Frames buffered per response before the handler is suspended.
    pub stream_buffer: usize,
}

pub fn build_router(root: Arc<ApplicationRoot>, stream_buffer: usize) -> Router {
    let state = AppState {
        root,
        stream_buffer,
    };

    Router::new()
        .route("/", any(handlers::root))
        .route("/{db}", any(handlers::database))
        .route("/{db}/@items", any(handlers::items))
        .route("/{db}/{key}", any(handlers::object_entry))
        .with_state(state)
}
