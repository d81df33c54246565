pub mod error;
pub mod foreshadow;
pub mod refinement;
pub mod serde_helpers;

pub use error::*;
pub use foreshadow::*;
pub use refinement::*;

/// Number of reminders surfaced at once by a reminder panel.
pub const DEFAULT_REMINDER_DISPLAY_LIMIT: usize = 5;
