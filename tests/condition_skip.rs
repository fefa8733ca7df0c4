//! Scenario (spec §8 end-to-end 2): a condition step whose predicate
//! evaluates true is skipped, its output variable is never set, and the
//! step after it still runs.

mod common;

use std::sync::Arc;

use serde_json::json;
use serial_test::serial;

use conveyor::agent::AgentRunner;
use conveyor::orchestrator::{ExecutionOutcome, Orchestrator};
use conveyor::tools::ToolDispatcher;

use common::builders::{agent_step, condition_step, manual_workflow, stub_agent};
use common::scripted_provider::{Scripted, ScriptedProvider};
use common::TestFixture;

#[tokio::test]
#[serial]
async fn true_condition_skips_step_but_workflow_continues() {
    let fixture = TestFixture::new().await;
    let db = fixture.db.clone();

    let workflow_id = manual_workflow(&db, "classify-maybe-skip-respond").await;
    let a1 = stub_agent(&db, "classifier", "stub-a").await;
    let a3 = stub_agent(&db, "responder", "stub-b").await;

    agent_step(&db, workflow_id, 0, a1, "classify", None, "a", vec![], None).await;
    condition_step(&db, workflow_id, 1, "maybe-skip", "${a.text}==skip", "s", vec![0]).await;
    agent_step(&db, workflow_id, 2, a3, "respond", None, "b", vec![0], None).await;

    let provider = Arc::new(ScriptedProvider::new(vec![
        ("stub-a", vec![Scripted::Text("skip")]),
        ("stub-b", vec![Scripted::Text("done")]),
    ]));
    let dispatcher = Arc::new(ToolDispatcher::new(db.clone(), None));
    let agent_runner = Arc::new(AgentRunner::new(db.clone(), provider, dispatcher));
    let orchestrator = Orchestrator::new(db.clone(), agent_runner);

    let outcome = orchestrator
        .start(workflow_id, json!({}))
        .await
        .expect("workflow start");

    match outcome {
        ExecutionOutcome::Completed { context, .. } => {
            assert_eq!(context["a"]["text"], "skip");
            assert!(context.get("s").is_none(), "condition step's output variable must not be set");
            assert_eq!(context["b"]["text"], "done");
        }
        other => panic!("expected completed execution, got {other:?}"),
    }
}
