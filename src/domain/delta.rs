//! Position imbalance (delta) across the outcomes of one market.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Below this delta, positions count as balanced.
const BALANCE_THRESHOLD: Decimal = dec!(0.01);

/// Delta (position imbalance) information.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaInfo {
    /// `max(position sizes) - min(position sizes)`.
    pub delta: Decimal,
    pub max_position: Decimal,
    pub min_position: Decimal,
    /// The outcome holding the maximum position; `None` when balanced.
    pub max_outcome: Option<String>,
}

impl DeltaInfo {
    /// Balanced iff `delta < 0.01`; exactly 0.01 is unbalanced.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.delta.abs() < BALANCE_THRESHOLD
    }
}

/// Compute delta over an outcome -> position-size map.
///
/// An empty map yields a zero delta with no max outcome.
#[must_use]
pub fn calculate_delta(positions: &HashMap<String, Decimal>) -> DeltaInfo {
    if positions.is_empty() {
        return DeltaInfo {
            delta: Decimal::ZERO,
            max_position: Decimal::ZERO,
            min_position: Decimal::ZERO,
            max_outcome: None,
        };
    }

    let max_position = positions.values().copied().max().unwrap_or_default();
    let min_position = positions.values().copied().min().unwrap_or_default();
    let delta = max_position - min_position;

    let max_outcome = if delta > Decimal::ZERO {
        positions
            .iter()
            .max_by_key(|(_, size)| **size)
            .map(|(outcome, _)| outcome.clone())
    } else {
        None
    };

    DeltaInfo {
        delta,
        max_position,
        min_position,
        max_outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_positions() {
        let info = calculate_delta(&HashMap::new());
        assert_eq!(info.delta, Decimal::ZERO);
        assert_eq!(info.max_outcome, None);
        assert!(info.is_balanced());
    }

    #[test]
    fn test_unbalanced_positions() {
        let positions = HashMap::from([("Yes".into(), dec!(10)), ("No".into(), dec!(3))]);
        let info = calculate_delta(&positions);
        assert_eq!(info.delta, dec!(7));
        assert_eq!(info.max_position, dec!(10));
        assert_eq!(info.min_position, dec!(3));
        assert_eq!(info.max_outcome.as_deref(), Some("Yes"));
        assert!(!info.is_balanced());
    }

    #[test]
    fn test_equal_positions_have_no_max_outcome() {
        let positions = HashMap::from([("Yes".into(), dec!(5)), ("No".into(), dec!(5))]);
        let info = calculate_delta(&positions);
        assert_eq!(info.delta, Decimal::ZERO);
        assert_eq!(info.max_outcome, None);
    }

    #[test]
    fn test_balance_boundary_is_exclusive() {
        let balanced = DeltaInfo {
            delta: dec!(0.009),
            max_position: dec!(0.009),
            min_position: Decimal::ZERO,
            max_outcome: None,
        };
        assert!(balanced.is_balanced());

        let at_boundary = DeltaInfo {
            delta: dec!(0.01),
            max_position: dec!(0.01),
            min_position: Decimal::ZERO,
            max_outcome: None,
        };
        assert!(!at_boundary.is_balanced());
    }
}
