//! Conveyor service entry point: wires the store, LLM provider, tool
//! dispatcher, orchestrator, approval coordinator, and scheduler, then
//! runs the scheduler's tick loop for the lifetime of the process.
//!
//! The admin HTTP surface, auth, and UI are external collaborators this
//! binary is consumed by (SPEC_FULL.md §D) — this process is the
//! orchestration core only.

use std::sync::Arc;

use conveyor::agent::AgentRunner;
use conveyor::approval::ApprovalCoordinator;
use conveyor::config::Config;
use conveyor::database::Database;
use conveyor::llm::AnthropicProvider;
use conveyor::observability;
use conveyor::orchestrator::Orchestrator;
use conveyor::scheduler::Scheduler;
use conveyor::tools::ToolDispatcher;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    observability::init();

    let config = Config::from_env();

    let database = Database::new(&config.database_url, config.database_max_connections)?;
    database.initialize().await?;
    let pool = database.pool().clone();

    let provider = Arc::new(AnthropicProvider::new(
        config.llm_api_key.clone(),
        config.llm_api_version.clone(),
    ));
    let dispatcher = Arc::new(ToolDispatcher::new(pool.clone(), None));
    let agent_runner = Arc::new(AgentRunner::new(pool.clone(), provider, dispatcher));
    let orchestrator = Arc::new(Orchestrator::new(pool.clone(), agent_runner));
    let approval_coordinator = Arc::new(ApprovalCoordinator::new(pool.clone(), orchestrator.clone()));

    tracing::info!(
        git_commit = env!("GIT_COMMIT"),
        build_time = env!("BUILD_TIME"),
        "conveyor starting"
    );

    if config.scheduler_enabled {
        let scheduler = Arc::new(Scheduler::new(pool.clone(), orchestrator.clone(), config.scheduler_tick));
        let sweep_coordinator = approval_coordinator.clone();
        let sweep_interval = config.scheduler_tick;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            loop {
                interval.tick().await;
                if let Err(e) = sweep_coordinator.process_timeouts().await {
                    tracing::error!(error = %e, "approval timeout sweep failed");
                }
            }
        });
        scheduler.run().await;
    } else {
        tracing::info!("scheduler disabled, idling");
        std::future::pending::<()>().await;
    }

    Ok(())
}
