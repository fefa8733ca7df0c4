//! Scenario (spec §8 end-to-end 5): rejecting a pending approval request
//! fails the owning execution outright; the step after the approval
//! never runs.

mod common;

use std::sync::Arc;

use serde_json::json;
use serial_test::serial;

use conveyor::agent::AgentRunner;
use conveyor::approval::ApprovalCoordinator;
use conveyor::orchestrator::{ExecutionOutcome, Orchestrator};
use conveyor::store::models::ExecutionStatus;
use conveyor::store::{agent_executions, approval_requests, workflow_executions};
use conveyor::tools::ToolDispatcher;

use common::builders::{agent_step, approval_step, manual_workflow, stub_agent};
use common::scripted_provider::{Scripted, ScriptedProvider};
use common::TestFixture;

#[tokio::test]
#[serial]
async fn rejecting_a_pending_request_fails_the_execution() {
    let fixture = TestFixture::new().await;
    let db = fixture.db.clone();

    let workflow_id = manual_workflow(&db, "needs-manager-approval-reject").await;
    let a1 = stub_agent(&db, "preparer", "stub-1r").await;
    let a3 = stub_agent(&db, "finalizer", "stub-3r").await;

    agent_step(&db, workflow_id, 0, a1, "prepare", None, "prepared", vec![], None).await;
    approval_step(
        &db,
        workflow_id,
        1,
        "manager-sign-off",
        Some(json!({"requiredRole": "MANAGER", "timeoutMinutes": 60})),
        "decision",
        vec![0],
    )
    .await;
    agent_step(&db, workflow_id, 2, a3, "finalize", None, "final", vec![0], None).await;

    // a3 is never expected to be invoked; it's given no script so any
    // unexpected call would panic the provider immediately.
    let provider = Arc::new(ScriptedProvider::new(vec![("stub-1r", vec![Scripted::Text("prepared")])]));
    let dispatcher = Arc::new(ToolDispatcher::new(db.clone(), None));
    let agent_runner = Arc::new(AgentRunner::new(db.clone(), provider, dispatcher));
    let orchestrator = Arc::new(Orchestrator::new(db.clone(), agent_runner));
    let approvals = ApprovalCoordinator::new(db.clone(), orchestrator.clone());

    let start_outcome = orchestrator
        .start(workflow_id, json!({}))
        .await
        .expect("workflow start");

    let execution_id = match start_outcome {
        ExecutionOutcome::Paused { execution_id } => execution_id,
        other => panic!("expected paused execution, got {other:?}"),
    };

    let pending = approval_requests::get_pending_for_execution(&db, execution_id)
        .await
        .expect("lookup pending approval")
        .expect("exactly one pending approval request should exist");

    approvals
        .reject(pending.id, "bob", "no budget")
        .await
        .expect("reject");

    let execution = workflow_executions::get(&db, execution_id).await.expect("get execution");
    assert_eq!(execution.status, ExecutionStatus::Failed);
    let error_message = execution.error_message.expect("error message on failed execution");
    assert!(
        error_message.contains("Approval rejected: no budget"),
        "unexpected error message: {error_message}"
    );

    let finalize_runs = agent_executions::list_for_workflow_execution(&db, execution_id)
        .await
        .expect("list agent executions")
        .into_iter()
        .filter(|e| e.agent_id == a3)
        .count();
    assert_eq!(finalize_runs, 0, "the step after a rejected approval must never run");
}
