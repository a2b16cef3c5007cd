//! Prometheus metrics for the router

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::router::RouteStatus;

/// Router metrics
pub struct RouterMetrics {
    pub tasks_total: IntCounter,
    pub task_outcomes: IntCounterVec,
    pub dispatch_duration_seconds: Histogram,
    pub neurogenesis_attempts: IntCounter,
}

impl RouterMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            tasks_total: IntCounter::new("synapse_router_tasks_total", "Total tasks routed")?,
            task_outcomes: IntCounterVec::new(
                Opts::new("synapse_router_task_outcomes_total", "Routed tasks by final status"),
                &["status"],
            )?,
            dispatch_duration_seconds: Histogram::with_opts(
                HistogramOpts::new(
                    "synapse_router_dispatch_duration_seconds",
                    "Time spent waiting on agent dispatch",
                )
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0]),
            )?,
            neurogenesis_attempts: IntCounter::new(
                "synapse_router_neurogenesis_attempts_total",
                "Expansions started because discovery found nobody",
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.tasks_total.clone()))?;
        registry.register(Box::new(self.task_outcomes.clone()))?;
        registry.register(Box::new(self.dispatch_duration_seconds.clone()))?;
        registry.register(Box::new(self.neurogenesis_attempts.clone()))?;
        Ok(())
    }

    pub fn record_outcome(&self, status: RouteStatus) {
        self.task_outcomes.with_label_values(&[status.as_str()]).inc();
    }
}

/// Render a registry in the text exposition format
pub fn render(registry: &Registry) -> prometheus::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcomes_are_exported() {
        let registry = Registry::new();
        let metrics = RouterMetrics::new().unwrap();
        metrics.register(&registry).unwrap();

        metrics.tasks_total.inc();
        metrics.record_outcome(RouteStatus::NoAgentAvailable);

        let text = render(&registry).unwrap();
        assert!(text.contains("synapse_router_tasks_total 1"));
        assert!(text.contains(r#"status="no_agent_available""#));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        let metrics = RouterMetrics::new().unwrap();
        metrics.register(&registry).unwrap();
        assert!(metrics.register(&registry).is_err());
    }
}
