pub mod config;
pub mod error;
pub mod model;
pub mod platform;
pub mod queue;
pub mod server;
pub mod service;
pub mod shutdown;
pub mod store;
pub mod sync;
pub mod util;
pub mod webhook;

#[cfg(test)]
mod test_utils;
