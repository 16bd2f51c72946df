//! Endpoint latency and outcome metrics

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

const MAX_SAMPLES: usize = 1000;

/// Sink for per-call latency observations, labelled by endpoint name and
/// whether the call returned an error.
pub trait LatencyRecorder: Send + Sync {
    fn observe(&self, endpoint: &str, success: bool, duration: Duration);
}

#[derive(Clone)]
pub struct MetricsCollector {
    pub total_calls: Arc<AtomicU64>,
    pub successful_calls: Arc<AtomicU64>,
    pub failed_calls: Arc<AtomicU64>,
    pub calls_by_endpoint: Arc<RwLock<HashMap<String, EndpointCounts>>>,
    pub samples: Arc<RwLock<Vec<LatencySample>>>,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointCounts {
    pub successes: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencySample {
    pub timestamp: DateTime<Utc>,
    pub duration_ms: f64,
    pub endpoint: String,
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub endpoints: Vec<EndpointMetric>,
    pub average_duration_ms: f64,
    pub uptime_seconds: i64,
    pub calls_per_second: f64,
    pub error_rate: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EndpointMetric {
    pub endpoint: String,
    pub successes: u64,
    pub failures: u64,
    pub average_duration_ms: f64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            total_calls: Arc::new(AtomicU64::new(0)),
            successful_calls: Arc::new(AtomicU64::new(0)),
            failed_calls: Arc::new(AtomicU64::new(0)),
            calls_by_endpoint: Arc::new(RwLock::new(HashMap::new())),
            samples: Arc::new(RwLock::new(Vec::new())),
            start_time: Utc::now(),
        }
    }

    pub fn record_call(&self, endpoint: &str, success: bool, duration: Duration) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_calls.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_calls.fetch_add(1, Ordering::Relaxed);
        }

        {
            let mut endpoints = self.calls_by_endpoint.write();
            let counts = endpoints.entry(endpoint.to_string()).or_default();
            if success {
                counts.successes += 1;
            } else {
                counts.failures += 1;
            }
        }

        let mut samples = self.samples.write();
        samples.push(LatencySample {
            timestamp: Utc::now(),
            duration_ms: duration.as_secs_f64() * 1000.0,
            endpoint: endpoint.to_string(),
            success,
        });

        if samples.len() > MAX_SAMPLES {
            let drain_end = samples.len() - MAX_SAMPLES;
            samples.drain(0..drain_end);
        }
    }

    pub fn endpoint_counts(&self, endpoint: &str) -> EndpointCounts {
        self.calls_by_endpoint
            .read()
            .get(endpoint)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        let total = self.total_calls.load(Ordering::Relaxed);
        let successful = self.successful_calls.load(Ordering::Relaxed);
        let failed = self.failed_calls.load(Ordering::Relaxed);

        let uptime = Utc::now().signed_duration_since(self.start_time);
        let uptime_seconds = uptime.num_seconds().max(1);

        let samples = self.samples.read();

        let mut endpoints: Vec<EndpointMetric> = self
            .calls_by_endpoint
            .read()
            .iter()
            .map(|(endpoint, counts)| EndpointMetric {
                endpoint: endpoint.clone(),
                successes: counts.successes,
                failures: counts.failures,
                average_duration_ms: average_ms(&samples, Some(endpoint.as_str())),
            })
            .collect();
        endpoints.sort_by(|a, b| (b.successes + b.failures).cmp(&(a.successes + a.failures)));

        MetricsSnapshot {
            total_calls: total,
            successful_calls: successful,
            failed_calls: failed,
            endpoints,
            average_duration_ms: average_ms(&samples, None),
            uptime_seconds,
            calls_per_second: total as f64 / uptime_seconds as f64,
            error_rate: if total > 0 {
                (failed as f64 / total as f64) * 100.0
            } else {
                0.0
            },
        }
    }
}

fn average_ms(samples: &[LatencySample], endpoint: Option<&str>) -> f64 {
    let durations: Vec<f64> = samples
        .iter()
        .filter(|s| endpoint.map_or(true, |name| s.endpoint == name))
        .map(|s| s.duration_ms)
        .collect();

    if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<f64>() / durations.len() as f64
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyRecorder for MetricsCollector {
    fn observe(&self, endpoint: &str, success: bool, duration: Duration) {
        self.record_call(endpoint, success, duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let metrics = MetricsCollector::new();
        metrics.observe("get-app-data", true, Duration::from_millis(10));
        metrics.observe("get-app-data", true, Duration::from_millis(30));
        metrics.observe("get-app-data", false, Duration::from_millis(20));
        metrics.observe("create-user", true, Duration::from_millis(5));

        let snapshot = metrics.get_snapshot();
        assert_eq!(snapshot.total_calls, 4);
        assert_eq!(snapshot.failed_calls, 1);
        assert_eq!(snapshot.error_rate, 25.0);
        assert_eq!(snapshot.endpoints[0].endpoint, "get-app-data");
        assert!((snapshot.endpoints[0].average_duration_ms - 20.0).abs() < 0.001);

        let counts = metrics.endpoint_counts("get-app-data");
        assert_eq!((counts.successes, counts.failures), (2, 1));
        assert_eq!(metrics.endpoint_counts("unknown").successes, 0);
    }

    #[test]
    fn test_sample_window_is_bounded() {
        let metrics = MetricsCollector::new();
        for _ in 0..(MAX_SAMPLES + 50) {
            metrics.observe("get-app-data", true, Duration::from_millis(1));
        }
        assert_eq!(metrics.samples.read().len(), MAX_SAMPLES);
        assert_eq!(metrics.total_calls.load(Ordering::Relaxed), (MAX_SAMPLES + 50) as u64);
    }
}
