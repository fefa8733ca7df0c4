//! Observability: OpenTelemetry counters/histograms behind a global
//! `OnceLock<Metrics>`, following `database::Database::health_check`'s
//! counterpart in spirit — ambient instrumentation, not a queryable
//! feature (SPEC_FULL.md §A.5). No metrics HTTP surface is exposed here;
//! that endpoint is an external collaborator.

use opentelemetry::metrics::{Counter, Histogram, Meter, MeterProvider};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use std::sync::OnceLock;

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Orchestrator-wide counters and histograms.
pub struct Metrics {
    pub executions_started: Counter<u64>,
    pub executions_completed: Counter<u64>,
    pub executions_failed: Counter<u64>,
    pub agent_invocations_started: Counter<u64>,
    pub agent_invocations_succeeded: Counter<u64>,
    pub agent_invocations_failed: Counter<u64>,
    pub tool_dispatches: Counter<u64>,
    pub approvals_created: Counter<u64>,
    pub approvals_approved: Counter<u64>,
    pub approvals_rejected: Counter<u64>,
    pub approvals_timed_out: Counter<u64>,
    pub schedule_ticks: Counter<u64>,
    pub schedule_misfires: Counter<u64>,
    pub step_duration_seconds: Histogram<f64>,
    pub llm_round_trip_seconds: Histogram<f64>,
}

impl Metrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            executions_started: meter
                .u64_counter("conveyor_executions_started_total")
                .with_description("Workflow executions started")
                .build(),
            executions_completed: meter
                .u64_counter("conveyor_executions_completed_total")
                .with_description("Workflow executions completed")
                .build(),
            executions_failed: meter
                .u64_counter("conveyor_executions_failed_total")
                .with_description("Workflow executions failed")
                .build(),
            agent_invocations_started: meter
                .u64_counter("conveyor_agent_invocations_started_total")
                .with_description("Agent invocations started")
                .build(),
            agent_invocations_succeeded: meter
                .u64_counter("conveyor_agent_invocations_succeeded_total")
                .with_description("Agent invocations completed successfully")
                .build(),
            agent_invocations_failed: meter
                .u64_counter("conveyor_agent_invocations_failed_total")
                .with_description("Agent invocations that failed")
                .build(),
            tool_dispatches: meter
                .u64_counter("conveyor_tool_dispatches_total")
                .with_description("Tool calls dispatched by agent executions")
                .build(),
            approvals_created: meter
                .u64_counter("conveyor_approvals_created_total")
                .with_description("Approval requests created")
                .build(),
            approvals_approved: meter
                .u64_counter("conveyor_approvals_approved_total")
                .with_description("Approval requests approved")
                .build(),
            approvals_rejected: meter
                .u64_counter("conveyor_approvals_rejected_total")
                .with_description("Approval requests rejected")
                .build(),
            approvals_timed_out: meter
                .u64_counter("conveyor_approvals_timed_out_total")
                .with_description("Approval requests that timed out")
                .build(),
            schedule_ticks: meter
                .u64_counter("conveyor_schedule_ticks_total")
                .with_description("Scheduler tick iterations")
                .build(),
            schedule_misfires: meter
                .u64_counter("conveyor_schedule_misfires_total")
                .with_description("Schedules whose cron expression failed to parse")
                .build(),
            step_duration_seconds: meter
                .f64_histogram("conveyor_step_duration_seconds")
                .with_description("Duration of one workflow step")
                .with_unit("s")
                .build(),
            llm_round_trip_seconds: meter
                .f64_histogram("conveyor_llm_round_trip_seconds")
                .with_description("Duration of one LLM provider call")
                .with_unit("s")
                .build(),
        }
    }

    pub fn record_execution_started(&self) {
        self.executions_started.add(1, &[]);
    }

    pub fn record_execution_completed(&self) {
        self.executions_completed.add(1, &[]);
    }

    pub fn record_execution_failed(&self) {
        self.executions_failed.add(1, &[]);
    }

    pub fn record_agent_invocation_started(&self, agent_name: &str) {
        self.agent_invocations_started
            .add(1, &[KeyValue::new("agent", agent_name.to_string())]);
    }

    pub fn record_agent_invocation_succeeded(&self, agent_name: &str) {
        self.agent_invocations_succeeded
            .add(1, &[KeyValue::new("agent", agent_name.to_string())]);
    }

    pub fn record_agent_invocation_failed(&self, agent_name: &str) {
        self.agent_invocations_failed
            .add(1, &[KeyValue::new("agent", agent_name.to_string())]);
    }

    pub fn record_tool_dispatch(&self, tool_name: &str) {
        self.tool_dispatches
            .add(1, &[KeyValue::new("tool", tool_name.to_string())]);
    }

    pub fn record_approval_created(&self) {
        self.approvals_created.add(1, &[]);
    }

    pub fn record_approval_approved(&self) {
        self.approvals_approved.add(1, &[]);
    }

    pub fn record_approval_rejected(&self) {
        self.approvals_rejected.add(1, &[]);
    }

    pub fn record_approval_timed_out(&self) {
        self.approvals_timed_out.add(1, &[]);
    }

    pub fn record_schedule_tick(&self) {
        self.schedule_ticks.add(1, &[]);
    }

    pub fn record_schedule_misfire(&self) {
        self.schedule_misfires.add(1, &[]);
    }

    pub fn record_step_duration(&self, step_type: &str, seconds: f64) {
        self.step_duration_seconds
            .record(seconds, &[KeyValue::new("step_type", step_type.to_string())]);
    }

    pub fn record_llm_round_trip(&self, seconds: f64) {
        self.llm_round_trip_seconds.record(seconds, &[]);
    }
}

/// Initialize the global metrics instance. A no-op `SdkMeterProvider` is
/// used (no OTLP export wiring) — the counters are still collected
/// in-process and available through `metrics()`; piping them to an
/// external backend is an operator concern, not this crate's.
pub fn init() {
    let meter_provider = SdkMeterProvider::builder().build();
    let meter = meter_provider.meter("conveyor");
    let metrics = Metrics::new(&meter);

    if METRICS.set(metrics).is_err() {
        tracing::warn!("observability already initialized");
    }
}

/// The global metrics instance, if `init()` has run.
pub fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninitialized_metrics_is_none() {
        // `init()` is process-global and exercised by other tests in this
        // binary; only assert the accessor doesn't panic either way.
        let _ = metrics();
    }
}
