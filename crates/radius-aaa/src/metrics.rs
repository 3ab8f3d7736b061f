//! Request timing aggregation and Prometheus text export

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

/// What kind of request a measurement belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RequestType {
    AccessRequest,
    AccountingStart,
    AccountingStop,
    InterimUpdate,
    CoA,
    Disconnect,
}

impl RequestType {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestType::AccessRequest => "Access-Request",
            RequestType::AccountingStart => "Accounting-Start",
            RequestType::AccountingStop => "Accounting-Stop",
            RequestType::InterimUpdate => "Interim-Update",
            RequestType::CoA => "CoA",
            RequestType::Disconnect => "Disconnect",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RequestStatus {
    Success,
    Failure,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Success => "Success",
            RequestStatus::Failure => "Failure",
        }
    }

    pub fn from_ok(ok: bool) -> Self {
        if ok {
            RequestStatus::Success
        } else {
            RequestStatus::Failure
        }
    }
}

/// Response-time statistics for one (type, status) pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseStats {
    pub count: u64,
    pub total: Duration,
    pub min: Duration,
    pub max: Duration,
}

impl ResponseStats {
    fn first(elapsed: Duration) -> Self {
        Self {
            count: 1,
            total: elapsed,
            min: elapsed,
            max: elapsed,
        }
    }

    fn add(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
        self.min = self.min.min(elapsed);
        self.max = self.max.max(elapsed);
    }

    pub fn average(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos((self.total.as_nanos() / u128::from(self.count)) as u64)
        }
    }
}

/// Process-wide request counters.
///
/// `record` holds the lock only for the arithmetic; rendering works on a
/// copied snapshot.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    stats: Mutex<BTreeMap<(RequestType, RequestStatus), ResponseStats>>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, request_type: RequestType, status: RequestStatus, elapsed: Duration) {
        let mut stats = match self.stats.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        stats
            .entry((request_type, status))
            .and_modify(|s| s.add(elapsed))
            .or_insert_with(|| ResponseStats::first(elapsed));
    }

    pub fn snapshot(&self) -> BTreeMap<(RequestType, RequestStatus), ResponseStats> {
        match self.stats.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn get(&self, request_type: RequestType, status: RequestStatus) -> Option<ResponseStats> {
        self.snapshot().get(&(request_type, status)).copied()
    }

    pub fn render_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut metrics = PrometheusMetrics::new();

        let families: [(&str, &str, fn(&ResponseStats) -> Duration); 3] = [
            (
                "radius_response_time_seconds_avg",
                "Average response time per request type and status",
                |s| s.average(),
            ),
            (
                "radius_response_time_seconds_max",
                "Maximum response time per request type and status",
                |s| s.max,
            ),
            (
                "radius_response_time_seconds_min",
                "Minimum response time per request type and status",
                |s| s.min,
            ),
        ];

        for (name, help, value) in families {
            metrics.add_header(name, "gauge", help);
            for ((request_type, status), stats) in &snapshot {
                metrics.add_sample(
                    name,
                    &[("request_type", request_type.as_str()), ("status", status.as_str())],
                    format!("{:.6}", value(stats).as_secs_f64()),
                );
            }
        }

        metrics.add_header(
            "radius_requests_total",
            "counter",
            "Total number of requests per request type and status",
        );
        for ((request_type, status), stats) in &snapshot {
            metrics.add_sample(
                "radius_requests_total",
                &[("request_type", request_type.as_str()), ("status", status.as_str())],
                stats.count,
            );
        }

        metrics.content
    }
}

/// Prometheus metrics in text format
#[derive(Debug, Clone, Default)]
pub struct PrometheusMetrics {
    pub content: String,
}

impl PrometheusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_header(&mut self, name: &str, kind: &str, help: &str) {
        self.content.push_str(&format!("# HELP {} {}\n", name, help));
        self.content.push_str(&format!("# TYPE {} {}\n", name, kind));
    }

    fn add_sample(&mut self, name: &str, labels: &[(&str, &str)], value: impl fmt::Display) {
        let label_str = labels
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, v))
            .collect::<Vec<_>>()
            .join(",");

        self.content
            .push_str(&format!("{}{{{}}} {}\n", name, label_str, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_record_aggregates() {
        let metrics = MetricsAggregator::new();
        metrics.record(
            RequestType::AccountingStart,
            RequestStatus::Success,
            Duration::from_millis(10),
        );
        metrics.record(
            RequestType::AccountingStart,
            RequestStatus::Success,
            Duration::from_millis(30),
        );

        let stats = metrics
            .get(RequestType::AccountingStart, RequestStatus::Success)
            .unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.min, Duration::from_millis(10));
        assert_eq!(stats.max, Duration::from_millis(30));
        assert_eq!(stats.average(), Duration::from_millis(20));
        assert!(metrics
            .get(RequestType::AccountingStart, RequestStatus::Failure)
            .is_none());
    }

    #[test]
    fn test_render_prometheus() {
        let metrics = MetricsAggregator::new();
        metrics.record(
            RequestType::AccessRequest,
            RequestStatus::Failure,
            Duration::from_millis(5),
        );

        let text = metrics.render_prometheus();
        assert!(text.contains("# TYPE radius_response_time_seconds_avg gauge"));
        assert!(text.contains("# TYPE radius_requests_total counter"));
        assert!(text.contains(
            "radius_response_time_seconds_max{request_type=\"Access-Request\",status=\"Failure\"} 0.005000"
        ));
        assert!(
            text.contains("radius_requests_total{request_type=\"Access-Request\",status=\"Failure\"} 1")
        );
    }

    #[test]
    fn test_render_empty() {
        let text = MetricsAggregator::new().render_prometheus();
        assert!(text.contains("# HELP radius_requests_total"));
        assert!(!text.contains("request_type="));
    }

    #[test]
    fn test_concurrent_record() {
        let metrics = Arc::new(MetricsAggregator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.record(
                            RequestType::InterimUpdate,
                            RequestStatus::Success,
                            Duration::from_micros(50),
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = metrics
            .get(RequestType::InterimUpdate, RequestStatus::Success)
            .unwrap();
        assert_eq!(stats.count, 800);
    }
}
