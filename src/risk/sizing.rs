//! Risk-targeted position sizing
//!
//! risk_pct grows linearly with model confidence between `confidence_floor` and
//! `confidence_ceiling` (clamped to [`risk_pct_min`, `risk_pct_max`]). The amount at
//! risk is `equity * risk_pct`; dividing by the stop distance gives the notional, so a
//! stop-out loses roughly `risk_pct` of equity regardless of where the stop sits.

use crate::config::RiskConfig;
use crate::exchange::InstrumentConstraints;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketRegime {
    Trending,
    Ranging,
    HighVolatility,
}

impl MarketRegime {
    pub fn multiplier(&self, cfg: &RiskConfig) -> f64 {
        match self {
            MarketRegime::Trending => cfg.regime_multiplier_trending,
            MarketRegime::Ranging => cfg.regime_multiplier_ranging,
            MarketRegime::HighVolatility => cfg.regime_multiplier_high_volatility,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingInput {
    pub equity: f64,
    pub confidence: f64,
    pub price: f64,
    /// Stop distance as a fraction of price
    pub stop_loss_pct: f64,
    pub guard_multiplier: f64,
    pub regime: MarketRegime,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSize {
    pub risk_pct: f64,
    pub notional: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SizingRejection {
    InvalidInput(String),
    ZeroMultiplier,
    BelowMinNotional { notional: f64, min_notional: f64 },
}

impl std::fmt::Display for SizingRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizingRejection::InvalidInput(msg) => write!(f, "invalid sizing input: {}", msg),
            SizingRejection::ZeroMultiplier => write!(f, "size multiplier is zero"),
            SizingRejection::BelowMinNotional {
                notional,
                min_notional,
            } => write!(f, "notional {:.2} below minimum {:.2}", notional, min_notional),
        }
    }
}

pub fn risk_pct_for_confidence(confidence: f64, cfg: &RiskConfig) -> f64 {
    let span = cfg.confidence_ceiling - cfg.confidence_floor;
    let t = if span > 0.0 {
        ((confidence - cfg.confidence_floor) / span).clamp(0.0, 1.0)
    } else {
        1.0
    };
    cfg.risk_pct_min + t * (cfg.risk_pct_max - cfg.risk_pct_min)
}

/// Round `quantity` down to a multiple of `step`
pub fn round_down_to_step(quantity: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return quantity;
    }
    // tolerance keeps 0.3 / 0.1 from flooring to 2
    let steps = (quantity / step + 1e-9).floor();
    steps * step
}

pub fn compute_position_size(
    input: &SizingInput,
    cfg: &RiskConfig,
    constraints: &InstrumentConstraints,
) -> Result<PositionSize, SizingRejection> {
    if !(input.equity > 0.0) {
        return Err(SizingRejection::InvalidInput(format!("equity {}", input.equity)));
    }
    if !(input.price > 0.0) {
        return Err(SizingRejection::InvalidInput(format!("price {}", input.price)));
    }
    if !(input.stop_loss_pct > 0.0) {
        return Err(SizingRejection::InvalidInput(format!(
            "stop loss pct {}",
            input.stop_loss_pct
        )));
    }

    let multiplier = input.guard_multiplier * input.regime.multiplier(cfg);
    if multiplier <= 0.0 {
        return Err(SizingRejection::ZeroMultiplier);
    }

    let risk_pct = risk_pct_for_confidence(input.confidence, cfg);
    let notional = (input.equity * risk_pct / input.stop_loss_pct * multiplier)
        .min(input.equity * cfg.max_leverage);
    let quantity = round_down_to_step(notional / input.price, constraints.step_size);
    let rounded_notional = quantity * input.price;

    if quantity <= 0.0 || rounded_notional < constraints.min_notional {
        return Err(SizingRejection::BelowMinNotional {
            notional: rounded_notional,
            min_notional: constraints.min_notional,
        });
    }

    Ok(PositionSize {
        risk_pct,
        notional: rounded_notional,
        quantity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraints() -> InstrumentConstraints {
        InstrumentConstraints {
            step_size: 0.001,
            min_notional: 5.0,
        }
    }

    fn input(confidence: f64) -> SizingInput {
        SizingInput {
            equity: 10_000.0,
            confidence,
            price: 100.0,
            stop_loss_pct: 0.02,
            guard_multiplier: 1.0,
            regime: MarketRegime::Trending,
        }
    }

    #[test]
    fn test_risk_pct_interpolates_and_clamps() {
        let cfg = RiskConfig::default();
        assert!((risk_pct_for_confidence(0.5, &cfg) - 0.009).abs() < 1e-12);
        assert!((risk_pct_for_confidence(0.75, &cfg) - 0.0145).abs() < 1e-12);
        assert!((risk_pct_for_confidence(0.99, &cfg) - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_risk_targeted_notional() {
        let cfg = RiskConfig::default();
        // 10k * 0.9% / 2% = 4500 notional = 45 units at 100
        let size = compute_position_size(&input(0.6), &cfg, &constraints()).unwrap();
        assert!((size.notional - 4_500.0).abs() < 1e-6);
        assert!((size.quantity - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_guard_and_regime_multipliers_stack() {
        let cfg = RiskConfig::default();
        let mut reduced = input(0.6);
        reduced.guard_multiplier = 0.5;
        reduced.regime = MarketRegime::Ranging;
        let size = compute_position_size(&reduced, &cfg, &constraints()).unwrap();
        assert!((size.notional - 4_500.0 * 0.5 * 0.75).abs() < 1e-6);

        reduced.guard_multiplier = 0.0;
        assert_eq!(
            compute_position_size(&reduced, &cfg, &constraints()),
            Err(SizingRejection::ZeroMultiplier)
        );
    }

    #[test]
    fn test_leverage_cap() {
        let cfg = RiskConfig::default();
        let mut tight = input(0.9);
        tight.stop_loss_pct = 0.001;
        let size = compute_position_size(&tight, &cfg, &constraints()).unwrap();
        assert!((size.notional - 30_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_below_min_notional_is_skipped() {
        let cfg = RiskConfig::default();
        let mut small = input(0.6);
        small.equity = 1.0;
        assert!(matches!(
            compute_position_size(&small, &cfg, &constraints()),
            Err(SizingRejection::BelowMinNotional { .. })
        ));
    }

    #[test]
    fn test_round_down_to_step() {
        assert!((round_down_to_step(0.3, 0.1) - 0.3).abs() < 1e-12);
        assert!((round_down_to_step(1.23456, 0.01) - 1.23).abs() < 1e-12);
        assert_eq!(round_down_to_step(0.0009, 0.001), 0.0);
    }
}
