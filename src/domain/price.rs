//! Tick-size price utilities.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::DomainError;

/// Round a price to the nearest valid tick increment.
///
/// # Errors
///
/// Returns [`DomainError::NonPositiveTickSize`] when `tick_size <= 0`.
pub fn round_to_tick_size(price: Decimal, tick_size: Decimal) -> Result<Decimal, DomainError> {
    if tick_size <= Decimal::ZERO {
        return Err(DomainError::NonPositiveTickSize(tick_size));
    }
    Ok((price / tick_size).round() * tick_size)
}

/// Whether a price sits on the tick grid, within a tenth of a tick.
///
/// # Errors
///
/// Returns [`DomainError::NonPositiveTickSize`] when `tick_size <= 0`.
pub fn is_valid_price(price: Decimal, tick_size: Decimal) -> Result<bool, DomainError> {
    let rounded = round_to_tick_size(price, tick_size)?;
    Ok((price - rounded).abs() < tick_size / dec!(10))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to_tick_size() {
        assert_eq!(
            round_to_tick_size(dec!(0.1234), dec!(0.01)).unwrap(),
            dec!(0.12)
        );
        assert_eq!(
            round_to_tick_size(dec!(0.567), dec!(0.05)).unwrap(),
            dec!(0.55)
        );
        assert_eq!(
            round_to_tick_size(dec!(0.60), dec!(0.001)).unwrap(),
            dec!(0.60)
        );
    }

    #[test]
    fn test_is_valid_price() {
        assert!(is_valid_price(dec!(0.12), dec!(0.01)).unwrap());
        assert!(!is_valid_price(dec!(0.123), dec!(0.01)).unwrap());
    }

    #[test]
    fn test_non_positive_tick_rejected() {
        assert!(round_to_tick_size(dec!(0.5), dec!(0)).is_err());
        assert!(is_valid_price(dec!(0.5), dec!(-0.01)).is_err());
    }
}
