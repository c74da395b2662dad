//! Pure yield math for the stBRLA staking pool
//! No I/O, no clocks outside `apy::unix_now`, no panics on caller input

pub mod error;
pub mod fixed;
pub mod apy;
pub mod rewards;

// Re-export commonly used types
pub use error::*;
pub use fixed::*;
pub use apy::*;
pub use rewards::*;
