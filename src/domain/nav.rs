//! Net asset value breakdown.

use rust_decimal::Decimal;

use super::ids::MarketId;

/// Per-position contribution to NAV.
#[derive(Debug, Clone)]
pub struct PositionBreakdown {
    pub market_id: MarketId,
    pub outcome: String,
    pub size: Decimal,
    pub mid_price: Decimal,
    pub value: Decimal,
}

/// Net asset value: cash plus mark-to-market position value.
#[derive(Debug, Clone)]
pub struct Nav {
    pub nav: Decimal,
    pub cash: Decimal,
    pub positions_value: Decimal,
    pub positions: Vec<PositionBreakdown>,
}

impl Nav {
    /// A NAV consisting of cash only.
    #[must_use]
    pub const fn cash_only(cash: Decimal) -> Self {
        Self {
            nav: cash,
            cash,
            positions_value: Decimal::ZERO,
            positions: Vec::new(),
        }
    }
}
