//! Standard momentum / volatility indicators, Wilder-smoothed where the
//! classic definitions call for it. All functions are total over short
//! frames: insufficient history returns `None` rather than a padded value.

use chrono::Timelike;
use serde::{Deserialize, Serialize};
use smc_schemas::Candle;

// ---------------------------------------------------------------------------
// RSI
// ---------------------------------------------------------------------------

/// Wilder RSI over closes. `None` until `period + 1` candles exist.
pub fn rsi(frame: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || frame.len() < period + 1 {
        return None;
    }
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let delta = frame[i].close - frame[i - 1].close;
        if delta >= 0.0 {
            avg_gain += delta;
        } else {
            avg_loss -= delta;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;

    for i in period + 1..frame.len() {
        let delta = frame[i].close - frame[i - 1].close;
        let (gain, loss) = if delta >= 0.0 { (delta, 0.0) } else { (0.0, -delta) };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

// ---------------------------------------------------------------------------
// MACD
// ---------------------------------------------------------------------------

/// MACD(12, 26, 9) evaluated over the whole frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacdSnapshot {
    /// MACD line per bar (fast EMA minus slow EMA), aligned with the frame.
    pub line: Vec<f64>,
    /// Signal line (EMA of the MACD line).
    pub signal: Vec<f64>,
}

impl MacdSnapshot {
    pub fn histogram(&self) -> Option<f64> {
        match (self.line.last(), self.signal.last()) {
            (Some(l), Some(s)) => Some(l - s),
            _ => None,
        }
    }

    pub fn last(&self) -> Option<f64> {
        self.line.last().copied()
    }
}

fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() || period == 0 {
        return out;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut prev = values[0];
    out.push(prev);
    for v in &values[1..] {
        prev = v * k + prev * (1.0 - k);
        out.push(prev);
    }
    out
}

pub fn macd(frame: &[Candle], fast: usize, slow: usize, signal: usize) -> Option<MacdSnapshot> {
    if frame.len() < slow + signal {
        return None;
    }
    let closes: Vec<f64> = frame.iter().map(|c| c.close).collect();
    let fast_ema = ema(&closes, fast);
    let slow_ema = ema(&closes, slow);
    let line: Vec<f64> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema(&line, signal);
    Some(MacdSnapshot {
        line,
        signal: signal_line,
    })
}

// ---------------------------------------------------------------------------
// ATR
// ---------------------------------------------------------------------------

/// Wilder ATR. `None` until `period + 1` candles exist.
pub fn atr(frame: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || frame.len() < period + 1 {
        return None;
    }
    let tr = |i: usize| -> f64 {
        let c = &frame[i];
        let prev_close = frame[i - 1].close;
        (c.high - c.low)
            .max((c.high - prev_close).abs())
            .max((c.low - prev_close).abs())
    };
    let mut value: f64 = (1..=period).map(tr).sum::<f64>() / period as f64;
    for i in period + 1..frame.len() {
        value = (value * (period as f64 - 1.0) + tr(i)) / period as f64;
    }
    Some(value)
}

// ---------------------------------------------------------------------------
// ADX
// ---------------------------------------------------------------------------

/// Trend-strength buckets used by the ADX gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdxRegime {
    NoTrend,
    Weak,
    Strong,
    VeryStrong,
}

impl AdxRegime {
    pub fn from_adx(adx: f64) -> Self {
        if adx < 20.0 {
            AdxRegime::NoTrend
        } else if adx < 25.0 {
            AdxRegime::Weak
        } else if adx < 50.0 {
            AdxRegime::Strong
        } else {
            AdxRegime::VeryStrong
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdxSnapshot {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
    pub regime: AdxRegime,
}

/// Wilder ADX. Needs roughly `2 * period` candles before the first value.
pub fn adx(frame: &[Candle], period: usize) -> Option<AdxSnapshot> {
    if period == 0 || frame.len() < 2 * period + 1 {
        return None;
    }

    let n = frame.len();
    let mut tr_s = 0.0;
    let mut plus_s = 0.0;
    let mut minus_s = 0.0;

    for i in 1..=period {
        let (tr, plus, minus) = dm_tr(frame, i);
        tr_s += tr;
        plus_s += plus;
        minus_s += minus;
    }

    let p = period as f64;
    let mut dx_wilder: Option<f64> = None;
    let mut dx_seed_sum = 0.0;
    let mut dx_seed_count = 0usize;
    let mut plus_di = 0.0;
    let mut minus_di = 0.0;

    for i in period + 1..n {
        let (tr, plus, minus) = dm_tr(frame, i);
        tr_s = tr_s - tr_s / p + tr;
        plus_s = plus_s - plus_s / p + plus;
        minus_s = minus_s - minus_s / p + minus;

        if tr_s <= 0.0 {
            continue;
        }
        plus_di = 100.0 * plus_s / tr_s;
        minus_di = 100.0 * minus_s / tr_s;
        let di_sum = plus_di + minus_di;
        if di_sum <= 0.0 {
            continue;
        }
        let dx = 100.0 * (plus_di - minus_di).abs() / di_sum;

        match dx_wilder {
            None => {
                dx_seed_sum += dx;
                dx_seed_count += 1;
                if dx_seed_count == period {
                    dx_wilder = Some(dx_seed_sum / p);
                }
            }
            Some(prev) => {
                dx_wilder = Some((prev * (p - 1.0) + dx) / p);
            }
        }
    }

    let adx = dx_wilder?;
    Some(AdxSnapshot {
        adx,
        plus_di,
        minus_di,
        regime: AdxRegime::from_adx(adx),
    })
}

fn dm_tr(frame: &[Candle], i: usize) -> (f64, f64, f64) {
    let c = &frame[i];
    let prev = &frame[i - 1];
    let up = c.high - prev.high;
    let down = prev.low - c.low;
    let plus_dm = if up > down && up > 0.0 { up } else { 0.0 };
    let minus_dm = if down > up && down > 0.0 { down } else { 0.0 };
    let tr = (c.high - c.low)
        .max((c.high - prev.close).abs())
        .max((c.low - prev.close).abs());
    (tr, plus_dm, minus_dm)
}

// ---------------------------------------------------------------------------
// CMF
// ---------------------------------------------------------------------------

/// Chaikin Money Flow over `period` bars.
pub fn cmf(frame: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || frame.len() < period {
        return None;
    }
    let window = &frame[frame.len() - period..];
    let mut mfv_sum = 0.0;
    let mut vol_sum = 0.0;
    for c in window {
        let range = c.high - c.low;
        if range > 0.0 {
            let multiplier = ((c.close - c.low) - (c.high - c.close)) / range;
            mfv_sum += multiplier * c.volume;
        }
        vol_sum += c.volume;
    }
    if vol_sum <= 0.0 {
        return None;
    }
    Some(mfv_sum / vol_sum)
}

// ---------------------------------------------------------------------------
// Relative volume
// ---------------------------------------------------------------------------

/// Current bar volume relative to the mean volume of the same hour-of-day
/// over the previous `sessions` occurrences. Falls back to the plain
/// trailing-20 mean when the frame carries no earlier same-hour bars.
pub fn relative_volume(frame: &[Candle], sessions: usize) -> Option<f64> {
    let last = frame.last()?;
    let hour = last.ts.hour();

    let same_hour: Vec<f64> = frame[..frame.len() - 1]
        .iter()
        .rev()
        .filter(|c| c.ts.hour() == hour)
        .take(sessions)
        .map(|c| c.volume)
        .collect();

    let baseline = if same_hour.is_empty() {
        let start = frame.len().saturating_sub(21);
        let window = &frame[start..frame.len() - 1];
        if window.is_empty() {
            return None;
        }
        window.iter().map(|c| c.volume).sum::<f64>() / window.len() as f64
    } else {
        same_hour.iter().sum::<f64>() / same_hour.len() as f64
    };

    if baseline <= 0.0 {
        return None;
    }
    Some(last.volume / baseline)
}
