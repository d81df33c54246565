pub mod config;
pub mod directory;
pub mod error;
pub mod foreshadow_tracker;
pub mod in_flight;
pub mod notice;
pub mod optimistic;
pub mod review_flow;

#[cfg(test)]
mod fake_backend;

pub use config::*;
pub use directory::*;
pub use error::*;
pub use foreshadow_tracker::*;
pub use in_flight::*;
pub use notice::*;
pub use optimistic::*;
pub use review_flow::*;
