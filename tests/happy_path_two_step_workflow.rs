//! Scenario (spec §8 end-to-end 1): a two-step workflow where the second
//! step's input is projected from the first step's output, and both
//! agents end turn immediately.

mod common;

use std::sync::Arc;

use serde_json::json;
use serial_test::serial;

use conveyor::agent::AgentRunner;
use conveyor::orchestrator::{ExecutionOutcome, Orchestrator};
use conveyor::tools::ToolDispatcher;

use common::builders::{agent_step, manual_workflow, stub_agent};
use common::scripted_provider::{Scripted, ScriptedProvider};
use common::TestFixture;

#[tokio::test]
#[serial]
async fn happy_path_two_step_workflow_completes_with_merged_context() {
    let fixture = TestFixture::new().await;
    let db = fixture.db.clone();

    let workflow_id = manual_workflow(&db, "classify-then-respond").await;
    let a1 = stub_agent(&db, "classifier", "stub-a1").await;
    let a2 = stub_agent(&db, "responder", "stub-a2").await;

    agent_step(&db, workflow_id, 0, a1, "classify", None, "class", vec![], None).await;
    agent_step(
        &db,
        workflow_id,
        1,
        a2,
        "respond",
        Some(json!({"category": "${class.text}"})),
        "result",
        vec![0],
        None,
    )
    .await;

    let provider = Arc::new(ScriptedProvider::new(vec![
        ("stub-a1", vec![Scripted::Text("greeting")]),
        ("stub-a2", vec![Scripted::Text("ok")]),
    ]));
    let dispatcher = Arc::new(ToolDispatcher::new(db.clone(), None));
    let agent_runner = Arc::new(AgentRunner::new(db.clone(), provider, dispatcher));
    let orchestrator = Orchestrator::new(db.clone(), agent_runner);

    let outcome = orchestrator
        .start(workflow_id, json!({"query": "hello"}))
        .await
        .expect("workflow start");

    match outcome {
        ExecutionOutcome::Completed { context, .. } => {
            assert_eq!(
                context,
                json!({
                    "trigger": {"query": "hello"},
                    "class": {"text": "greeting", "stop_reason": "end_turn"},
                    "result": {"text": "ok", "stop_reason": "end_turn"},
                })
            );
        }
        other => panic!("expected completed execution, got {other:?}"),
    }
}
