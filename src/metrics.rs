//! Prometheus counters for model calls and tool use.

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};

const BACKEND_LABEL: &str = "backend";
const MODEL_LABEL: &str = "model";
const STATUS_LABEL: &str = "status";
const DIRECTION_LABEL: &str = "direction";
const TOOL_LABEL: &str = "tool";

pub struct MetricsCollector {
    registry: Registry,

    /// Model requests by backend, model, status
    requests_total: CounterVec,

    /// Model request duration in milliseconds
    requests_duration_ms: HistogramVec,

    /// Tokens by backend, model, direction (input/output)
    tokens_total: CounterVec,

    /// Tool calls by tool name and status
    tool_calls_total: CounterVec,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = CounterVec::new(
            Opts::new("sitesmith_model_requests_total", "Total model requests"),
            &[BACKEND_LABEL, MODEL_LABEL, STATUS_LABEL],
        )
        .expect("valid requests counter");
        registry
            .register(Box::new(requests_total.clone()))
            .expect("register requests counter");

        let duration_opts = HistogramOpts::new(
            "sitesmith_model_request_duration_ms",
            "Model request duration in milliseconds",
        )
        .buckets(vec![
            100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0, 60000.0,
        ]);
        let requests_duration_ms = HistogramVec::new(duration_opts, &[BACKEND_LABEL, MODEL_LABEL])
            .expect("valid duration histogram");
        registry
            .register(Box::new(requests_duration_ms.clone()))
            .expect("register duration histogram");

        let tokens_total = CounterVec::new(
            Opts::new("sitesmith_tokens_total", "Total tokens processed"),
            &[BACKEND_LABEL, MODEL_LABEL, DIRECTION_LABEL],
        )
        .expect("valid tokens counter");
        registry
            .register(Box::new(tokens_total.clone()))
            .expect("register tokens counter");

        let tool_calls_total = CounterVec::new(
            Opts::new("sitesmith_tool_calls_total", "Total tool calls"),
            &[TOOL_LABEL, STATUS_LABEL],
        )
        .expect("valid tool counter");
        registry
            .register(Box::new(tool_calls_total.clone()))
            .expect("register tool counter");

        Self {
            registry,
            requests_total,
            requests_duration_ms,
            tokens_total,
            tool_calls_total,
        }
    }

    pub fn record_request(&self, backend: &str, model: &str, success: bool, duration_ms: u64) {
        let status = if success { "success" } else { "failure" };
        self.requests_total
            .with_label_values(&[backend, model, status])
            .inc();
        self.requests_duration_ms
            .with_label_values(&[backend, model])
            .observe(duration_ms as f64);
    }

    pub fn record_tokens(&self, backend: &str, model: &str, input_tokens: u64, output_tokens: u64) {
        self.tokens_total
            .with_label_values(&[backend, model, "input"])
            .inc_by(input_tokens as f64);
        self.tokens_total
            .with_label_values(&[backend, model, "output"])
            .inc_by(output_tokens as f64);
    }

    pub fn record_tool_call(&self, tool: &str, success: bool) {
        let status = if success { "success" } else { "failure" };
        self.tool_calls_total
            .with_label_values(&[tool, status])
            .inc();
    }

    /// Prometheus text exposition of all metrics
    pub fn prometheus_metrics(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Global metrics instance
static METRICS: std::sync::OnceLock<MetricsCollector> = std::sync::OnceLock::new();

pub fn global() -> &'static MetricsCollector {
    METRICS.get_or_init(MetricsCollector::new)
}

pub fn prometheus() -> String {
    global().prometheus_metrics()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector() {
        let collector = MetricsCollector::new();
        collector.record_request("gemini", "gemini-2.5-flash", true, 1500);
        collector.record_request("gemini", "gemini-2.5-flash", false, 200);
        collector.record_tokens("gemini", "gemini-2.5-flash", 1000, 500);
        collector.record_tool_call("writeFile", true);
        collector.record_tool_call("readFile", false);

        let prom = collector.prometheus_metrics();
        assert!(prom.contains("sitesmith_model_requests_total"));
        assert!(prom.contains("sitesmith_tokens_total"));
        assert!(prom.contains("tool=\"writeFile\""));
        assert!(prom.contains("status=\"failure\""));
    }
}
