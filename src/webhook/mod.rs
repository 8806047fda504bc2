pub mod events;
pub mod handler;
pub mod routing;

pub use routing::{EventRouter, Routed};
