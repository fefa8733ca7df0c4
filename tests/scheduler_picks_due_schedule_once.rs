//! Scenario (spec §8 end-to-end 6): a schedule due in the past fires
//! exactly once per tick; the following tick (before the new
//! `next_run_at`) creates no additional execution.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use serial_test::serial;

use conveyor::agent::AgentRunner;
use conveyor::orchestrator::Orchestrator;
use conveyor::scheduler::Scheduler;
use conveyor::store::models::NewWorkflowSchedule;
use conveyor::store::{workflow_executions, workflow_schedules};
use conveyor::tools::ToolDispatcher;

use common::builders::{agent_step, manual_workflow, stub_agent};
use common::scripted_provider::{Scripted, ScriptedProvider};
use common::TestFixture;

#[tokio::test]
#[serial]
async fn due_schedule_fires_once_and_advances_past_the_next_tick() {
    let fixture = TestFixture::new().await;
    let db = fixture.db.clone();

    let workflow_id = manual_workflow(&db, "every-five-minutes").await;
    let agent_id = stub_agent(&db, "ticker", "stub-tick").await;
    agent_step(&db, workflow_id, 0, agent_id, "tick", None, "result", vec![], None).await;

    let schedule = workflow_schedules::create(
        &db,
        NewWorkflowSchedule {
            workflow_id,
            cron_expression: "*/5 * * * *".to_string(),
            trigger_data: Some(json!({})),
        },
        Utc::now() - chrono::Duration::seconds(1),
    )
    .await
    .expect("create schedule");

    let provider = Arc::new(ScriptedProvider::new(vec![(
        "stub-tick",
        vec![Scripted::Text("fired-once"), Scripted::Text("fired-twice")],
    )]));
    let dispatcher = Arc::new(ToolDispatcher::new(db.clone(), None));
    let agent_runner = Arc::new(AgentRunner::new(db.clone(), provider, dispatcher));
    let orchestrator = Arc::new(Orchestrator::new(db.clone(), agent_runner));
    let scheduler = Scheduler::new(db.clone(), orchestrator.clone(), Duration::from_secs(3600));

    let fired_first_tick = scheduler.tick().await.expect("first tick");
    assert_eq!(fired_first_tick, 1);

    // the fired workflow is started fire-and-forget (spec §4.8); give it a
    // moment to actually create its execution row.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let executions_after_first_tick = workflow_executions::list(&db, Some(workflow_id), None, 100, 0)
        .await
        .expect("list executions");
    assert_eq!(executions_after_first_tick.len(), 1, "exactly one execution should have been created");

    tokio::time::sleep(Duration::from_secs(1)).await;

    let fired_second_tick = scheduler.tick().await.expect("second tick");
    assert_eq!(fired_second_tick, 0, "next_run_at is now ~5 minutes out, nothing should be due");

    let advanced = workflow_schedules::get(&db, schedule.id)
        .await
        .expect("get schedule")
        .expect("schedule should still exist");
    let gap = advanced.next_run_at - Utc::now();
    assert!(
        gap.num_minutes() >= 3 && gap.num_minutes() <= 5,
        "next_run_at should have advanced roughly 5 minutes out (not the 1h misfire fallback), gap={gap}"
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    let executions_after_second_tick = workflow_executions::list(&db, Some(workflow_id), None, 100, 0)
        .await
        .expect("list executions");
    assert_eq!(
        executions_after_second_tick.len(),
        1,
        "the second tick must not have created another execution"
    );
}
