use crate::domain::{Decimal, TimeMs, TokenAmount};

use super::MathError;

const MS_PER_HOUR: i64 = 3_600_000;

/// What accrual needs to know about a balance: how much, and since when.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccrualState {
    pub balance: TokenAmount,
    pub last_settled_at: Option<TimeMs>,
}

/// Result of settling one balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    /// Linear points earned since the previous settlement. Never negative.
    pub delta: Decimal,
    pub state: AccrualState,
}

/// Linear accrual: one point per whole token held per hour.
#[derive(Debug, Clone, Copy)]
pub struct AccrualCalculator {
    token_decimals: u32,
}

impl AccrualCalculator {
    pub fn new(token_decimals: u32) -> Self {
        Self { token_decimals }
    }

    /// Settle `state` at `now`.
    ///
    /// Elapsed time is clamped at zero and the settlement timestamp never moves
    /// backwards, so an out-of-order `now` earns nothing and changes nothing.
    ///
    /// # Errors
    /// Returns `MathError::Overflow` if the balance cannot be represented as a
    /// decimal or the product overflows.
    pub fn settle(&self, now: TimeMs, state: &AccrualState) -> Result<Settlement, MathError> {
        let (elapsed_ms, settled_at) = match state.last_settled_at {
            Some(last) if now > last => (now.as_ms() - last.as_ms(), now),
            Some(last) => (0, last),
            None => (0, now),
        };

        let delta = self.points_for(state.balance, elapsed_ms)?;

        Ok(Settlement {
            delta,
            state: AccrualState {
                balance: state.balance,
                last_settled_at: Some(settled_at),
            },
        })
    }

    /// `tokens(balance) * elapsed_ms / 3_600_000`, multiplying first so that
    /// whole-hour spans stay exact.
    fn points_for(&self, balance: TokenAmount, elapsed_ms: i64) -> Result<Decimal, MathError> {
        if balance.is_zero() || elapsed_ms <= 0 {
            return Ok(Decimal::zero());
        }

        let tokens = Decimal::from_token_units(balance, self.token_decimals)
            .map_err(|_| MathError::Overflow("token balance"))?;

        tokens
            .checked_mul(Decimal::from(elapsed_ms))
            .and_then(|token_ms| token_ms.checked_div(Decimal::from(MS_PER_HOUR)))
            .ok_or(MathError::Overflow("point accrual"))
    }
}

/// Boosted delta for a linear delta under a source's multiplier.
pub fn boosted(linear: Decimal, boost: Decimal) -> Result<Decimal, MathError> {
    linear
        .checked_mul(boost)
        .ok_or(MathError::Overflow("boost"))
}
