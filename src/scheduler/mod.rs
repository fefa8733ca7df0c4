//! Cron-triggered scheduler (spec §4.8): once per tick, fire every
//! schedule whose `next_run_at` has passed, then advance it to its next
//! occurrence.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule as CronSchedule;
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::error::Result;
use crate::observability;
use crate::orchestrator::Orchestrator;
use crate::store::{models::WorkflowSchedule, workflow_schedules};

/// Fallback gap applied when a schedule's cron expression fails to parse
/// (spec §4.8: "this is logged and should alert operators").
const MISFIRE_RETRY_GAP: chrono::Duration = chrono::Duration::hours(1);

pub struct Scheduler {
    pool: PgPool,
    orchestrator: Arc<Orchestrator>,
    tick_interval: Duration,
}

impl Scheduler {
    pub fn new(pool: PgPool, orchestrator: Arc<Orchestrator>, tick_interval: Duration) -> Self {
        Self {
            pool,
            orchestrator,
            tick_interval,
        }
    }

    /// Run the tick loop forever. Intended to be spawned as its own task
    /// from `main` when `Config::scheduler_enabled` is set.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.tick_interval);
        loop {
            interval.tick().await;
            if let Err(e) = self.tick().await {
                tracing::error!(error = %e, "scheduler tick failed");
            }
        }
    }

    /// One tick: fire every due schedule and advance it. Returns the
    /// number of schedules fired.
    pub async fn tick(&self) -> Result<usize> {
        let now = Utc::now();
        let due = workflow_schedules::list_due(&self.pool, now).await?;

        if let Some(m) = observability::metrics() {
            m.record_schedule_tick();
        }

        for schedule in &due {
            self.fire(schedule);
            self.advance(schedule, now).await?;
        }

        Ok(due.len())
    }

    /// Start the workflow fire-and-forget; a scheduler tick does not wait
    /// on the run to finish (spec §4.8).
    fn fire(&self, schedule: &WorkflowSchedule) {
        let orchestrator = self.orchestrator.clone();
        let workflow_id = schedule.workflow_id;
        let trigger_data: Value = schedule.trigger_data.clone().unwrap_or_else(|| json!({}));

        tracing::info!(workflow_id, schedule_id = schedule.id, "schedule fired");

        tokio::spawn(async move {
            if let Err(e) = orchestrator.start(workflow_id, trigger_data).await {
                tracing::error!(workflow_id, error = %e, "scheduled execution failed to start");
            }
        });
    }

    async fn advance(&self, schedule: &WorkflowSchedule, now: DateTime<Utc>) -> Result<()> {
        let next_run_at = match next_fire_after(&schedule.cron_expression, now) {
            Some(next) => next,
            None => {
                tracing::warn!(
                    schedule_id = schedule.id,
                    cron_expression = %schedule.cron_expression,
                    "cron expression failed to parse, falling back to a 1h retry"
                );
                if let Some(m) = observability::metrics() {
                    m.record_schedule_misfire();
                }
                now + MISFIRE_RETRY_GAP
            }
        };

        workflow_schedules::advance(&self.pool, schedule.id, now, next_run_at).await
    }
}

/// The next occurrence of `cron_expr` strictly after `after`, or `None`
/// if the expression doesn't parse.
fn next_fire_after(cron_expr: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    CronSchedule::from_str(&normalize_cron_expr(cron_expr))
        .ok()
        .and_then(|schedule| schedule.after(&after).next())
}

/// The `cron` crate only accepts 6–7 field expressions (seconds first),
/// but spec §4.8 requires "standard 6-field (seconds-optional)" syntax,
/// and scenario 6 fires a plain 5-field Unix expression
/// (`*/5 * * * *`). Prepend a `"0"` seconds field when the expression
/// has exactly 5 whitespace-separated fields so the standard Unix form
/// parses the same as its 6-field equivalent.
fn normalize_cron_expr(cron_expr: &str) -> String {
    let field_count = cron_expr.split_whitespace().count();
    if field_count == 5 {
        format!("0 {cron_expr}")
    } else {
        cron_expr.to_string()
    }
}
