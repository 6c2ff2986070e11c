//! Net asset value calculation.
//!
//! NAV = stablecoin cash + mark-to-market value of all positive positions.
//! Each position is marked with the best available price: a live
//! book-derived mid first, the position's own last-known price next, the
//! market's published price map last. A position with no usable price
//! contributes zero rather than failing the whole calculation.

use rust_decimal::Decimal;

use crate::domain::{MarketId, Nav, Position, PositionBreakdown};
use crate::exchange::Balances;

/// Assets counted as cash.
const STABLE_ASSETS: [&str; 2] = ["USDC", "USD"];

/// Sum of stablecoin-denominated balances.
#[must_use]
pub fn cash_balance(balances: &Balances) -> Decimal {
    STABLE_ASSETS
        .iter()
        .filter_map(|asset| balances.get(*asset))
        .copied()
        .sum()
}

/// Compute NAV from positions and balances.
///
/// `live_mid` resolves a book-derived mid for (market, outcome);
/// `published` resolves the market's published price for an outcome.
pub fn calculate<L, P>(positions: &[Position], balances: &Balances, live_mid: L, published: P) -> Nav
where
    L: Fn(&MarketId, &str) -> Option<Decimal>,
    P: Fn(&MarketId, &str) -> Option<Decimal>,
{
    let cash = cash_balance(balances);
    let mut breakdowns = Vec::new();
    let mut positions_value = Decimal::ZERO;

    for position in positions {
        if position.size <= Decimal::ZERO {
            continue;
        }

        let mid = live_mid(&position.market_id, &position.outcome)
            .or_else(|| {
                (position.current_price > Decimal::ZERO).then_some(position.current_price)
            })
            .or_else(|| published(&position.market_id, &position.outcome))
            .unwrap_or(Decimal::ZERO);

        let value = position.size * mid;
        positions_value += value;
        breakdowns.push(PositionBreakdown {
            market_id: position.market_id.clone(),
            outcome: position.outcome.clone(),
            size: position.size,
            mid_price: mid,
            value,
        });
    }

    Nav {
        nav: cash + positions_value,
        cash,
        positions_value,
        positions: breakdowns,
    }
}
