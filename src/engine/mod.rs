//! Pure computation engine(s) for points accrual and position valuation.

use thiserror::Error;

pub mod accrual;
pub mod synchronizer;
pub mod tick_math;

pub use accrual::{AccrualCalculator, AccrualState, Settlement};
pub use synchronizer::synthetic_balance;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("tick {0} outside the supported range")]
    TickOutOfRange(i32),
    #[error("invalid tick range [{lower}, {upper})")]
    InvalidRange { lower: i32, upper: i32 },
    #[error("sqrt price must be non-zero")]
    ZeroSqrtPrice,
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),
}
