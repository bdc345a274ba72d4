//! Synthetic token0 balance of a liquidity position at the current pool price.

use primitive_types::U256;

use crate::domain::{LiquidityPosition, PoolState, TokenAmount};

use super::tick_math::{amount0_delta, sqrt_ratio_at_tick};
use super::MathError;

/// Amount of token0 the position represents at the pool's current price,
/// rounded up (the amount needed to mint the same liquidity).
///
/// - current tick below the range: the whole range is token0
/// - current tick at or above the upper tick: the position is all token1, so zero
/// - in range: token0 between the current price and the upper bound
pub fn synthetic_balance(
    pool: &PoolState,
    position: &LiquidityPosition,
) -> Result<TokenAmount, MathError> {
    if position.tick_lower >= position.tick_upper {
        return Err(MathError::InvalidRange {
            lower: position.tick_lower,
            upper: position.tick_upper,
        });
    }
    let liquidity = position.liquidity.as_u128();
    if liquidity == 0 {
        return Ok(TokenAmount::ZERO);
    }

    let sqrt_lower = sqrt_ratio_at_tick(position.tick_lower)?;
    let sqrt_upper = sqrt_ratio_at_tick(position.tick_upper)?;

    let amount0 = if pool.tick < position.tick_lower {
        amount0_delta(sqrt_lower, sqrt_upper, liquidity, true)?
    } else if pool.tick < position.tick_upper {
        amount0_delta(pool.sqrt_price_x96, sqrt_upper, liquidity, true)?
    } else {
        U256::zero()
    };

    to_token_amount(amount0)
}

fn to_token_amount(value: U256) -> Result<TokenAmount, MathError> {
    if value > U256::from(u128::MAX) {
        return Err(MathError::Overflow("synthetic balance"));
    }
    Ok(TokenAmount::new(value.as_u128()))
}
