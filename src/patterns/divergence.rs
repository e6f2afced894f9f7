// =============================================================================
// Price / oscillator divergence
// =============================================================================
//
// The recent window (tail-aligned price and oscillator series) is split into
// an older and a newer half.
//
//   Bearish: price makes a higher high, the oscillator a lower high.
//   Bullish: price makes a lower low, the oscillator a higher low.
//
// Strength = min(100, price move % + oscillator move as % of its window
// range).  Both terms grow with the size of the disagreement.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::indicators::{macd, rsi, RSI_PERIOD};
use crate::market_data::{closes, Candle};

use super::{MIN_ADVANCED_CANDLES, RECENT_WINDOW};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DivergenceKind {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    pub kind: DivergenceKind,
    pub indicator: String,
    pub strength: f64,
    pub description: String,
}

/// RSI and MACD divergences over the recent window of `candles`.
pub fn detect_divergences(candles: &[Candle]) -> Vec<Divergence> {
    let prices = closes(candles);
    let rsi_series = rsi::calculate_rsi(&prices, RSI_PERIOD);
    let macd_series = macd::macd_line(&prices);

    [("RSI", rsi_series), ("MACD", macd_series)]
        .into_iter()
        .filter_map(|(name, osc)| compare(name, &prices, &osc))
        .collect()
}

/// Compare tail-aligned `price` and `osc` series.
pub fn compare(indicator: &str, price: &[f64], osc: &[f64]) -> Option<Divergence> {
    let n = RECENT_WINDOW.min(price.len()).min(osc.len());
    if n < MIN_ADVANCED_CANDLES {
        return None;
    }
    let price = &price[price.len() - n..];
    let osc = &osc[osc.len() - n..];
    let half = n / 2;

    let (p_old, p_new) = price.split_at(half);
    let (o_old, o_new) = osc.split_at(half);

    let osc_range = max(osc) - min(osc);

    let (kind, p_from, p_to, o_from, o_to) = if max(p_new) > max(p_old) && max(o_new) < max(o_old) {
        (DivergenceKind::Bearish, max(p_old), max(p_new), max(o_old), max(o_new))
    } else if min(p_new) < min(p_old) && min(o_new) > min(o_old) {
        (DivergenceKind::Bullish, min(p_old), min(p_new), min(o_old), min(o_new))
    } else {
        return None;
    };

    let price_pct = if p_from == 0.0 { 0.0 } else { ((p_to - p_from) / p_from).abs() * 100.0 };
    let osc_pct = if osc_range > 0.0 { (o_to - o_from).abs() / osc_range * 100.0 } else { 0.0 };
    let strength = (price_pct + osc_pct).min(100.0);
    if !strength.is_finite() {
        return None;
    }

    let description = match kind {
        DivergenceKind::Bearish => format!(
            "price higher high {p_from:.4} -> {p_to:.4} while {indicator} fell {o_from:.2} -> {o_to:.2}"
        ),
        DivergenceKind::Bullish => format!(
            "price lower low {p_from:.4} -> {p_to:.4} while {indicator} rose {o_from:.2} -> {o_to:.2}"
        ),
    };

    Some(Divergence {
        kind,
        indicator: indicator.to_string(),
        strength,
        description,
    })
}

fn max(xs: &[f64]) -> f64 {
    xs.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn min(xs: &[f64]) -> f64 {
    xs.iter().copied().fold(f64::INFINITY, f64::min)
}
