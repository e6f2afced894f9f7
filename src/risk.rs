// =============================================================================
// Risk Engine: position sizing, trade metrics and ATR-based levels
// =============================================================================
//
// Pure calculator: no state, no I/O.
//
//   riskPerUnit   = |entry - stop|
//   maxRiskAmount = balance * risk% / 100
//   positionSize  = maxRiskAmount / riskPerUnit * leverage
//
//   risk   = |entry - stop| * size        reward = |target - entry| * size
//   R:R    = reward / risk                exposure = risk / balance * 100
//   expectancy = winRate * reward - (1 - winRate) * risk
//   Kelly      = (winRate * (1 + R:R) - 1) / R:R
//
// Malformed parameters are rejected with `InvalidInput`; trade validation
// accumulates reasons instead of failing.
// =============================================================================

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::types::Recommendation;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Caller-supplied trade setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskParameters {
    pub account_balance: f64,
    /// Percent of the account risked on this trade (1.0 = 1 %).
    pub risk_percentage: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    #[serde(default)]
    pub leverage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSize {
    pub size: f64,
    /// Notional value: size * entry.
    pub value: f64,
    pub risk_amount: f64,
    pub risk_per_unit: f64,
    pub leverage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub position_size: f64,
    pub potential_loss: f64,
    pub potential_gain: f64,
    pub risk_reward_ratio: f64,
    pub account_exposure_pct: f64,
    pub win_rate: f64,
    pub expectancy: f64,
    pub max_drawdown_pct: f64,
    /// Raw Kelly fraction; `None` when there is no reward to size against.
    pub kelly: Option<f64>,
    /// Kelly clamped to [0, 1] for use as a sizing multiplier.
    pub kelly_clamped: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeValidation {
    pub is_valid: bool,
    pub reasons: Vec<String>,
}

/// ATR-derived protective levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeLevels {
    pub stop_loss: f64,
    pub take_profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    pub initial_balance: f64,
    /// Probability of a winning trade in [0, 1].
    pub win_rate: f64,
    pub risk_reward_ratio: f64,
    /// Percent of the current balance risked per trade.
    pub risk_per_trade: f64,
    pub number_of_trades: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedTrade {
    pub trade_number: usize,
    pub balance: f64,
    pub win: bool,
    pub change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundedReturns {
    pub final_balance: f64,
    pub returns_pct: f64,
    pub max_drawdown_pct: f64,
    pub trades: Vec<SimulatedTrade>,
}

// ---------------------------------------------------------------------------
// Risk Engine
// ---------------------------------------------------------------------------

/// Limits and multipliers supplied at construction time.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskEngine {
    /// Minimum acceptable reward/risk.
    min_risk_reward: f64,
    /// Maximum per-trade risk as a percent of the account.
    max_risk_pct: f64,
    stop_atr_multiplier: f64,
    target_atr_multiplier: f64,
}

impl Default for RiskEngine {
    fn default() -> Self {
        Self {
            min_risk_reward: 1.5,
            max_risk_pct: 2.0,
            stop_atr_multiplier: 2.0,
            target_atr_multiplier: 3.0,
        }
    }
}

impl RiskEngine {
    pub fn new(
        min_risk_reward: f64,
        max_risk_pct: f64,
        stop_atr_multiplier: f64,
        target_atr_multiplier: f64,
    ) -> Self {
        info!(
            min_risk_reward,
            max_risk_pct,
            stop_atr_multiplier,
            target_atr_multiplier,
            "RiskEngine initialised"
        );
        Self {
            min_risk_reward,
            max_risk_pct,
            stop_atr_multiplier,
            target_atr_multiplier,
        }
    }

    // -------------------------------------------------------------------------
    // Sizing
    // -------------------------------------------------------------------------

    pub fn position_size(&self, p: &RiskParameters) -> EngineResult<PositionSize> {
        if !p.account_balance.is_finite() || p.account_balance <= 0.0 {
            return Err(EngineError::invalid(format!(
                "account balance must be positive, got {}",
                p.account_balance
            )));
        }
        if !p.risk_percentage.is_finite() || p.risk_percentage <= 0.0 || p.risk_percentage > 100.0 {
            return Err(EngineError::invalid(format!(
                "risk percentage must be in (0, 100], got {}",
                p.risk_percentage
            )));
        }
        require_price("entry price", p.entry_price)?;
        require_price("stop loss", p.stop_loss)?;

        let leverage = p.leverage.unwrap_or(1.0);
        if !leverage.is_finite() || leverage <= 0.0 {
            return Err(EngineError::invalid(format!("leverage must be positive, got {leverage}")));
        }

        let risk_per_unit = (p.entry_price - p.stop_loss).abs();
        if risk_per_unit == 0.0 {
            return Err(EngineError::invalid("entry price equals stop loss"));
        }

        let risk_amount = p.account_balance * p.risk_percentage / 100.0;
        let size = risk_amount / risk_per_unit * leverage;

        debug!(size, risk_amount, risk_per_unit, leverage, "position sized");
        Ok(PositionSize {
            size,
            value: size * p.entry_price,
            risk_amount,
            risk_per_unit,
            leverage,
        })
    }

    // -------------------------------------------------------------------------
    // Metrics
    // -------------------------------------------------------------------------

    /// Metrics for the sized position, with `confidence` (0..=100) taken as
    /// the win probability.
    pub fn risk_metrics(&self, p: &RiskParameters, confidence: f64) -> EngineResult<RiskMetrics> {
        if !(0.0..=100.0).contains(&confidence) {
            return Err(EngineError::invalid(format!(
                "confidence must be in [0, 100], got {confidence}"
            )));
        }
        require_price("take profit", p.take_profit)?;
        let sized = self.position_size(p)?;

        let potential_loss = sized.risk_per_unit * sized.size;
        let potential_gain = (p.take_profit - p.entry_price).abs() * sized.size;
        let risk_reward_ratio = potential_gain / potential_loss;
        let account_exposure_pct = potential_loss / p.account_balance * 100.0;

        let win_rate = confidence / 100.0;
        let expectancy = win_rate * potential_gain - (1.0 - win_rate) * potential_loss;
        let kelly = kelly_fraction(win_rate, risk_reward_ratio);

        Ok(RiskMetrics {
            position_size: sized.size,
            potential_loss,
            potential_gain,
            risk_reward_ratio,
            account_exposure_pct,
            win_rate,
            expectancy,
            max_drawdown_pct: account_exposure_pct,
            kelly,
            kelly_clamped: kelly.map_or(0.0, |k| k.clamp(0.0, 1.0)),
        })
    }

    /// Check a setup against the engine limits.  Never fails: malformed
    /// parameters become reasons.
    pub fn validate_trade(&self, p: &RiskParameters, confidence: f64) -> TradeValidation {
        let mut reasons = Vec::new();

        let missing = [p.entry_price, p.stop_loss, p.take_profit]
            .iter()
            .any(|v| !v.is_finite() || *v <= 0.0);
        if missing {
            reasons.push("entry, stop loss or take profit price missing".to_string());
            return TradeValidation {
                is_valid: false,
                reasons,
            };
        }

        match self.risk_metrics(p, confidence) {
            Ok(m) => {
                if m.risk_reward_ratio < self.min_risk_reward {
                    reasons.push(format!(
                        "risk/reward {:.2} below minimum {:.2}",
                        m.risk_reward_ratio, self.min_risk_reward
                    ));
                }
                if m.account_exposure_pct > self.max_risk_pct {
                    reasons.push(format!(
                        "risk per trade {:.2}% above maximum {:.2}%",
                        m.account_exposure_pct, self.max_risk_pct
                    ));
                }
                if m.expectancy <= 0.0 {
                    reasons.push(format!("non-positive expectancy {:.2}", m.expectancy));
                }
            }
            Err(e) => reasons.push(e.to_string()),
        }

        TradeValidation {
            is_valid: reasons.is_empty(),
            reasons,
        }
    }

    // -------------------------------------------------------------------------
    // ATR levels
    // -------------------------------------------------------------------------

    /// `stop = price - dir * ATR * stop_mult`, `target = price + dir * ATR *
    /// target_mult`.  HOLD has no direction and therefore no levels.
    pub fn dynamic_levels(&self, price: f64, atr: f64, recommendation: Recommendation) -> Option<TradeLevels> {
        let direction = recommendation.direction();
        if direction == 0.0 || !price.is_finite() || !atr.is_finite() || atr <= 0.0 {
            return None;
        }
        Some(TradeLevels {
            stop_loss: price - direction * atr * self.stop_atr_multiplier,
            take_profit: price + direction * atr * self.target_atr_multiplier,
        })
    }
}

/// Kelly fraction `((w * (1 + rr)) - 1) / rr`.  Unclamped; `None` for a
/// non-positive reward/risk ratio.
pub fn kelly_fraction(win_rate: f64, risk_reward_ratio: f64) -> Option<f64> {
    if !risk_reward_ratio.is_finite() || risk_reward_ratio <= 0.0 {
        return None;
    }
    let k = (win_rate * (1.0 + risk_reward_ratio) - 1.0) / risk_reward_ratio;
    k.is_finite().then_some(k)
}

/// Run `number_of_trades` sequential trades, each risking a fixed percent of
/// the current balance and winning `risk_reward_ratio` times the risk.
pub fn simulate_compounded_returns<R: Rng + ?Sized>(
    params: &SimulationParams,
    rng: &mut R,
) -> EngineResult<CompoundedReturns> {
    if !params.initial_balance.is_finite() || params.initial_balance <= 0.0 {
        return Err(EngineError::invalid("initial balance must be positive"));
    }
    if !(0.0..=1.0).contains(&params.win_rate) {
        return Err(EngineError::invalid(format!(
            "win rate must be in [0, 1], got {}",
            params.win_rate
        )));
    }
    if !(0.0..=100.0).contains(&params.risk_per_trade) || !params.risk_reward_ratio.is_finite() {
        return Err(EngineError::invalid("risk per trade or reward ratio out of range"));
    }

    let mut balance = params.initial_balance;
    let mut peak = balance;
    let mut max_dd = 0.0_f64;
    let mut trades = Vec::with_capacity(params.number_of_trades);

    for trade_number in 1..=params.number_of_trades {
        let win = rng.random_bool(params.win_rate);
        let risk_amount = balance * params.risk_per_trade / 100.0;
        let change = if win {
            risk_amount * params.risk_reward_ratio
        } else {
            -risk_amount
        };
        balance += change;

        if balance > peak {
            peak = balance;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - balance) / peak * 100.0);
        }

        trades.push(SimulatedTrade {
            trade_number,
            balance,
            win,
            change,
        });
    }

    Ok(CompoundedReturns {
        final_balance: balance,
        returns_pct: (balance - params.initial_balance) / params.initial_balance * 100.0,
        max_drawdown_pct: max_dd,
        trades,
    })
}

fn require_price(label: &str, value: f64) -> EngineResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::invalid(format!("{label} must be a positive price, got {value}")))
    }
}
