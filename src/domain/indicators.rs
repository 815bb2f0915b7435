//! Windowed technical indicators
//!
//! A bounded FIFO window of recent prices per instrument, with a
//! relative-strength oscillator and a simple moving average computed on
//! demand. Both return `None` until the window holds enough samples for
//! their lookback; callers treat that as "no signal possible yet".

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use super::model::IndicatorSnapshot;

/// Bounded sequence of recent prices, oldest evicted on overflow.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl PriceWindow {
    pub fn new(capacity: usize) -> Self {
        PriceWindow {
            values: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, price: f64) {
        if self.values.len() >= self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(price);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }
}

/// Simple moving average of the last `period` samples.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let tail = &values[values.len() - period..];
    Some(tail.iter().sum::<f64>() / period as f64)
}

/// Relative-strength oscillator over `period` lookback, Wilder smoothing.
///
/// Seeded with the simple average of the first `period` deltas, then smoothed
/// across the rest of the window. Needs `period + 1` samples. Result is
/// clamped to [0, 100]; a window with no losses reports 100.
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for pair in values.windows(2).take(period) {
        let delta = pair[1] - pair[0];
        if delta >= 0.0 {
            avg_gain += delta;
        } else {
            avg_loss -= delta;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;

    for pair in values.windows(2).skip(period) {
        let delta = pair[1] - pair[0];
        let (gain, loss) = if delta >= 0.0 {
            (delta, 0.0)
        } else {
            (0.0, -delta)
        };
        avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some((100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0))
}

/// Per-instrument price windows with on-demand indicator computation.
///
/// Sole owner of the windows; the evaluator feeds it one sample per tick and
/// reads the snapshot back.
pub struct IndicatorEngine {
    windows: Mutex<HashMap<String, PriceWindow>>,
    window_size: usize,
    oscillator_period: usize,
    moving_average_period: usize,
}

impl IndicatorEngine {
    pub fn new(window_size: usize, oscillator_period: usize, moving_average_period: usize) -> Self {
        IndicatorEngine {
            windows: Mutex::new(HashMap::new()),
            window_size,
            oscillator_period,
            moving_average_period,
        }
    }

    /// Append a sample to the instrument's window, evicting the oldest when
    /// the window is full.
    pub fn observe(&self, instrument: &str, price: f64) {
        let mut windows = self.windows.lock();
        windows
            .entry(instrument.to_string())
            .or_insert_with(|| PriceWindow::new(self.window_size))
            .push(price);
    }

    /// Compute the current indicator snapshot for an instrument.
    pub fn compute(&self, instrument: &str) -> IndicatorSnapshot {
        let values = {
            let windows = self.windows.lock();
            windows.get(instrument).map(|w| w.to_vec()).unwrap_or_default()
        };

        IndicatorSnapshot {
            instrument: instrument.to_string(),
            oscillator: rsi(&values, self.oscillator_period),
            moving_average: sma(&values, self.moving_average_period),
        }
    }

    /// Number of samples currently held for an instrument.
    pub fn sample_count(&self, instrument: &str) -> usize {
        self.windows
            .lock()
            .get(instrument)
            .map(|w| w.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_evicts_oldest_on_overflow() {
        let mut window = PriceWindow::new(3);
        for p in [1.0, 2.0, 3.0, 4.0] {
            window.push(p);
        }
        assert_eq!(window.to_vec(), vec![2.0, 3.0, 4.0]);
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn sma_needs_full_lookback() {
        assert_eq!(sma(&[1.0, 2.0], 3), None);
        assert_eq!(sma(&[1.0, 2.0, 3.0], 3), Some(2.0));
        // Only the last `period` samples count.
        assert_eq!(sma(&[100.0, 1.0, 2.0, 3.0], 3), Some(2.0));
    }

    #[test]
    fn rsi_needs_period_plus_one_samples() {
        let values: Vec<f64> = (0..14).map(|i| i as f64).collect();
        assert_eq!(rsi(&values, 14), None);
        let values: Vec<f64> = (0..15).map(|i| i as f64).collect();
        assert!(rsi(&values, 14).is_some());
    }

    #[test]
    fn rsi_extremes() {
        let rising: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi(&rising, 14), Some(100.0));

        let falling: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        assert_eq!(rsi(&falling, 14), Some(0.0));
    }

    #[test]
    fn rsi_balanced_series_is_midrange() {
        // Alternating equal gains and losses should hover near 50.
        let mut values = vec![100.0];
        for i in 0..30 {
            let last = *values.last().unwrap();
            values.push(if i % 2 == 0 { last + 1.0 } else { last - 1.0 });
        }
        let value = rsi(&values, 14).unwrap();
        assert!((40.0..=60.0).contains(&value), "rsi was {value}");
    }

    #[test]
    fn engine_reports_insufficient_data_then_values() {
        let engine = IndicatorEngine::new(100, 14, 20);
        for i in 0..10 {
            engine.observe("BTCUSDT", 100.0 + i as f64);
        }
        let snapshot = engine.compute("BTCUSDT");
        assert_eq!(snapshot.oscillator, None);
        assert_eq!(snapshot.moving_average, None);

        for i in 10..25 {
            engine.observe("BTCUSDT", 100.0 + i as f64);
        }
        let snapshot = engine.compute("BTCUSDT");
        assert!(snapshot.oscillator.is_some());
        assert!(snapshot.moving_average.is_some());
    }

    #[test]
    fn engine_tracks_instruments_independently() {
        let engine = IndicatorEngine::new(100, 14, 20);
        engine.observe("BTCUSDT", 100.0);
        assert_eq!(engine.sample_count("BTCUSDT"), 1);
        assert_eq!(engine.sample_count("ETHUSDT"), 0);
        let snapshot = engine.compute("ETHUSDT");
        assert_eq!(snapshot.oscillator, None);
    }
}
