use rust_decimal::Decimal;
use tracing::warn;

pub const SECONDS_PER_DAY: i64 = 86400;

/// Maximum scale representable by `Decimal`.
const MAX_SCALE: i32 = 28;

/// Converts a raw fixed-point integer amount (as reported by the chain) into
/// a decimal value using the token's reported precision. Unparsable or
/// out-of-range input converts to zero.
pub fn integer_to_decimal(raw: &str, decimals: i32) -> Decimal {
    if !(0..=MAX_SCALE).contains(&decimals) {
        warn!("Unsupported decimal precision {}: {}", decimals, raw);
        return Decimal::ZERO;
    }
    let value = match raw.parse::<i128>() {
        Ok(v) => v,
        Err(error) => {
            warn!("Could not parse raw amount {}: {}", raw, error);
            return Decimal::ZERO;
        }
    };
    match Decimal::try_from_i128_with_scale(value, decimals as u32) {
        Ok(amount) => amount.normalize(),
        Err(error) => {
            warn!("Raw amount out of range {}: {}", raw, error);
            Decimal::ZERO
        }
    }
}

/// Start of the UTC day containing `timestamp`.
pub fn day_start(timestamp: i64) -> i64 {
    (timestamp / SECONDS_PER_DAY) * SECONDS_PER_DAY
}

pub fn day_id(pool_id: &str, timestamp: i64) -> String {
    format!("{}_{}", pool_id, timestamp / SECONDS_PER_DAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_to_decimal() {
        assert_eq!(
            integer_to_decimal("1000000000000000000", 18),
            Decimal::from(1)
        );
        assert_eq!(integer_to_decimal("2000000", 6), Decimal::from(2));
        assert_eq!(
            integer_to_decimal("1500000", 6),
            "1.5".parse::<Decimal>().unwrap()
        );
        assert_eq!(integer_to_decimal("0", 18), Decimal::ZERO);
    }

    #[test]
    fn test_integer_to_decimal_bad_input() {
        assert_eq!(integer_to_decimal("not a number", 18), Decimal::ZERO);
        assert_eq!(integer_to_decimal("100", -1), Decimal::ZERO);
        assert_eq!(integer_to_decimal("100", 29), Decimal::ZERO);
    }

    #[test]
    fn test_day_bucketing() {
        assert_eq!(day_start(0), 0);
        assert_eq!(day_start(86399), 0);
        assert_eq!(day_start(86400), 86400);
        assert_eq!(day_id("pool", 86401), "pool_1");
    }
}
