//! Math and calculator errors

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    /// Fixed-point division with a zero denominator
    #[error("division by zero")]
    DivisionByZero,

    /// Result does not fit the signed 64.64 range
    #[error("fixed-point overflow")]
    Overflow,

    /// APY requested for a snapshot id that was never taken (or was cleared)
    #[error("unknown snapshot id: {0}")]
    InvalidSnapshot(String),

    /// End of the measurement window does not strictly follow its start
    #[error("invalid time window: end {end} does not follow start {start}")]
    InvalidTimeWindow { start: u64, end: u64 },

    /// Reward-based estimate with nothing staked
    #[error("no staked amount")]
    NoStakedAmount,
}
