//! Metrics reporting for the training loop.

use std::collections::HashMap;
use std::collections::VecDeque;

/// Moving average calculator.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    values: VecDeque<f32>,
    window_size: usize,
    sum: f32,
}

impl MovingAverage {
    pub fn new(window_size: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(window_size),
            window_size,
            sum: 0.0,
        }
    }

    pub fn push(&mut self, value: f32) {
        if self.values.len() >= self.window_size
            && let Some(old) = self.values.pop_front()
        {
            self.sum -= old;
        }
        self.values.push_back(value);
        self.sum += value;
    }

    pub fn average(&self) -> f32 {
        if self.values.is_empty() {
            0.0
        } else {
            self.sum / self.values.len() as f32
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// External sink for named scalar metrics. The trainer pushes one `"loss"`
/// value per completed batch.
pub trait MetricsSink {
    fn push_scalar(&mut self, name: &str, value: f32);
}

/// Sink that discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl MetricsSink for NullSink {
    fn push_scalar(&mut self, _name: &str, _value: f32) {}
}

#[derive(Debug)]
struct Series {
    window: MovingAverage,
    last: f32,
    count: usize,
}

/// In-process sink keeping a windowed moving average per metric name.
#[derive(Debug)]
pub struct MetricsRegistry {
    series: HashMap<String, Series>,
    window_size: usize,
}

impl MetricsRegistry {
    pub fn new(window_size: usize) -> Self {
        Self {
            series: HashMap::new(),
            window_size,
        }
    }

    pub fn average(&self, name: &str) -> Option<f32> {
        self.series.get(name).map(|s| s.window.average())
    }

    pub fn last(&self, name: &str) -> Option<f32> {
        self.series.get(name).map(|s| s.last)
    }

    pub fn count(&self, name: &str) -> usize {
        self.series.get(name).map(|s| s.count).unwrap_or(0)
    }

    pub fn log_summary(&self) {
        let mut names: Vec<&String> = self.series.keys().collect();
        names.sort();

        for name in names {
            let series = &self.series[name];
            tracing::info!(
                "metric {}: count={}, last={:.4}, avg={:.4}",
                name,
                series.count,
                series.last,
                series.window.average()
            );
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new(100)
    }
}

impl MetricsSink for MetricsRegistry {
    fn push_scalar(&mut self, name: &str, value: f32) {
        let window_size = self.window_size;
        let series = self.series.entry(name.to_string()).or_insert_with(|| Series {
            window: MovingAverage::new(window_size),
            last: 0.0,
            count: 0,
        });

        series.window.push(value);
        series.last = value;
        series.count += 1;
    }
}
