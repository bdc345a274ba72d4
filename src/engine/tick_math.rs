//! Q64.96 fixed-point tick and amount math for concentrated-liquidity pools.
//!
//! Integer-exact, matching the on-chain TickMath / SqrtPriceMath libraries so
//! synthetic balances agree with what the position manager would quote.

use primitive_types::{U256, U512};

use super::MathError;

pub const MIN_TICK: i32 = -887_272;
pub const MAX_TICK: i32 = 887_272;

const RESOLUTION: usize = 96;

/// Per-bit multipliers: 1 / sqrt(1.0001)^(2^i) as Q128.128.
const TICK_RATIOS: [(u32, u128); 19] = [
    (0x2, 0xfff97272373d413259a46990580e213a),
    (0x4, 0xfff2e50f5f656932ef12357cf3c7fdcc),
    (0x8, 0xffe5caca7e10e4e61c3624eaa0941cd0),
    (0x10, 0xffcb9843d60f6159c9db58835c926644),
    (0x20, 0xff973b41fa98c081472e6896dfb254c0),
    (0x40, 0xff2ea16466c96a3843ec78b326b52861),
    (0x80, 0xfe5dee046a99a2a811c461f1969c3053),
    (0x100, 0xfcbe86c7900a88aedcffc83b479aa3a4),
    (0x200, 0xf987a7253ac413176f2b074cf7815e54),
    (0x400, 0xf3392b0822b70005940c7a398e4b70f3),
    (0x800, 0xe7159475a2c29b7443b29c7fa6e889d9),
    (0x1000, 0xd097f3bdfd2022b8845ad8f792aa5825),
    (0x2000, 0xa9f746462d870fdf8a65dc1f90e061e5),
    (0x4000, 0x70d869a156d2a1b890bb3df62baf32f7),
    (0x8000, 0x31be135f97d08fd981231505542fcfa6),
    (0x10000, 0x9aa508b5b7a84e1c677de54f3e99bc9),
    (0x20000, 0x5d6af8dedb81196699c329225ee604),
    (0x40000, 0x2216e584f5fa1ea926041bedfe98),
    (0x80000, 0x48a170391f7dc42444e8fa2),
];

/// sqrt(1.0001^tick) * 2^96, rounded up.
pub fn sqrt_ratio_at_tick(tick: i32) -> Result<U256, MathError> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(MathError::TickOutOfRange(tick));
    }
    let abs_tick = tick.unsigned_abs();

    let mut ratio = if abs_tick & 0x1 != 0 {
        U256::from(0xfffcb933bd6fad37aa2d162d1a594001u128)
    } else {
        U256::one() << 128
    };
    for (bit, multiplier) in TICK_RATIOS {
        if abs_tick & bit != 0 {
            ratio = (ratio * U256::from(multiplier)) >> 128;
        }
    }

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Q128.128 -> Q64.96, rounding up so the result is never below the true price.
    let remainder = ratio & ((U256::one() << 32) - U256::one());
    let sqrt_price = (ratio >> 32) + if remainder.is_zero() { U256::zero() } else { U256::one() };
    Ok(sqrt_price)
}

/// Amount of token0 between two sqrt prices for `liquidity`:
/// `L * 2^96 * (sqrt_b - sqrt_a) / (sqrt_b * sqrt_a)`.
pub fn amount0_delta(
    sqrt_a: U256,
    sqrt_b: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, MathError> {
    let (lower, upper) = if sqrt_a <= sqrt_b {
        (sqrt_a, sqrt_b)
    } else {
        (sqrt_b, sqrt_a)
    };
    if lower.is_zero() {
        return Err(MathError::ZeroSqrtPrice);
    }

    let numerator1 = U256::from(liquidity) << RESOLUTION;
    let numerator2 = upper - lower;

    if round_up {
        let scaled = mul_div(numerator1, numerator2, upper, true)?;
        Ok(div_rounding_up(scaled, lower))
    } else {
        Ok(mul_div(numerator1, numerator2, upper, false)? / lower)
    }
}

/// `a * b / denominator` with a 512-bit intermediate.
fn mul_div(a: U256, b: U256, denominator: U256, round_up: bool) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::ZeroSqrtPrice);
    }
    let product: U512 = a.full_mul(b);
    let denominator = U512::from(denominator);
    let quotient = product / denominator;
    let quotient = if round_up && !(product % denominator).is_zero() {
        quotient + U512::one()
    } else {
        quotient
    };
    U256::try_from(quotient).map_err(|_| MathError::Overflow("mul_div"))
}

fn div_rounding_up(a: U256, b: U256) -> U256 {
    let quotient = a / b;
    if (a % b).is_zero() {
        quotient
    } else {
        quotient + U256::one()
    }
}
