pub mod events;
pub mod server;

pub use events::{EventBroadcaster, NodeEvent};
pub use server::{create_ws_router, EventFilter};
