//! Strategy lifecycle phases and observable state.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::domain::DeltaInfo;

/// Strategy lifecycle phase.
///
/// `Init -> Setup -> Running -> Stopping -> Terminated`. Setup failure
/// jumps straight to `Terminated`; a running strategy always passes through
/// `Stopping` so cleanup is never skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyPhase {
    Init,
    Setup,
    Running,
    Stopping,
    Terminated,
}

/// Snapshot of strategy state, refreshed each tick.
#[derive(Debug, Clone)]
pub struct StrategyState {
    pub phase: StrategyPhase,
    /// Outcome -> net position size, from the last tick.
    pub positions: HashMap<String, Decimal>,
    pub delta: Option<DeltaInfo>,
    /// Open orders observed on the last tick.
    pub open_orders: usize,
    /// Net asset value at the last tick.
    pub nav: Decimal,
    /// Available cash at the last tick.
    pub cash: Decimal,
    pub ticks: u64,
}

impl StrategyState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: StrategyPhase::Init,
            positions: HashMap::new(),
            delta: None,
            open_orders: 0,
            nav: Decimal::ZERO,
            cash: Decimal::ZERO,
            ticks: 0,
        }
    }
}

impl Default for StrategyState {
    fn default() -> Self {
        Self::new()
    }
}
