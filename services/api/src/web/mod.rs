pub mod auth;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the handlers to make them easily accessible
// to the binary that will build the web server router.
pub use auth::{logout_handler, me_handler};
pub use middleware::require_auth;
pub use rest::{create_breakdown_handler, list_breakdowns_handler, list_syllabuses_handler};
pub use ws_handler::ws_handler;
