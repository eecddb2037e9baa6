pub mod auth;
pub mod middleware;
pub mod protocol;
pub mod reader_task;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the handlers the binary needs to build the router.
pub use middleware::{optional_auth, require_auth};
pub use ws_handler::ws_handler;
