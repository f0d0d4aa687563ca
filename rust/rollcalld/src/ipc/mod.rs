mod error;
mod handlers;
mod helpers;
mod router;
mod types;

pub use router::{drain_events, handle_request};
pub use types::{AppState, Request};
