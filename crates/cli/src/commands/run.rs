// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use orchard_client::DaemonClient;
use orchard_engine::orchestrator::{HttpLlmClient, Orchestrator, OrchestratorDeps};
use orchard_engine::{
    ActivityService, MergeService, PrintExecutor, SessionRegistry, TerminalMonitor,
    WorktreeManager,
};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

/// Wire every component for one project and run the orchestrator loop.
pub async fn run(path: &Path, once: bool) -> anyhow::Result<()> {
    let (project, db) = super::open_project(path)?;
    let config = super::load_project_config(path);

    let client = DaemonClient::connect(super::daemon_url());
    if client
        .wait_connected(Duration::from_secs(5))
        .await
        .is_err()
    {
        anyhow::bail!(
            "cannot reach the terminal daemon at {} (start it with `orchard daemon`)",
            super::daemon_url()
        );
    }

    let worktrees = WorktreeManager::new(db.clone(), project.clone());
    let registry = SessionRegistry::new(db.clone(), Arc::clone(&client), project.clone());
    let executor = PrintExecutor::new(db.clone(), project.clone());
    let monitor = Arc::new(TerminalMonitor::new(db.clone(), project.id));

    // Startup hygiene: reconcile sessions, sync worktrees, sweep
    // interrupted print sessions, prune expired audit rows.
    match registry.validate_all_sessions().await {
        Ok(report) => {
            if !report.orphaned.is_empty() {
                warn!(count = report.orphaned.len(), "orphaned daemon sessions");
            }
        }
        Err(e) => warn!(error = %e, "session validation failed"),
    }
    let active = registry.active_worktrees()?;
    let loaded = worktrees.load_worktrees(&active).await?;
    let candidates = executor.recover_on_startup(&loaded)?;
    for candidate in &candidates {
        info!(session_id = %candidate.id, worktree_id = %candidate.worktree_id,
              "interrupted print session is a resume candidate");
    }
    let _ = registry.prune_audit_rows();
    let _ = monitor.prune_old_detections();

    // Pattern detections feed the monitor from the daemon event bus.
    {
        let monitor = Arc::clone(&monitor);
        let mut events = client.events();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                if let orchard_daemon::Event::TerminalData {
                    session_id, data, ..
                } = event
                {
                    let _ = monitor.on_terminal_data(&session_id, &data);
                }
            }
        });
    }

    let orchestrator = Orchestrator::new(OrchestratorDeps {
        project: project.clone(),
        db: db.clone(),
        activity: ActivityService::new(db.clone(), project.clone()),
        worktrees,
        registry,
        executor,
        merge: MergeService::new(db.clone(), project.clone()),
        monitor,
        client: Arc::clone(&client),
        llm: Arc::new(HttpLlmClient::from_env()?),
        config,
    });

    if once {
        orchestrator.manual_tick().await;
        client.close();
        return Ok(());
    }

    println!("orchestrator running for {} ({})", project.name, project.id);
    let loop_task = tokio::spawn(Arc::clone(&orchestrator).run());

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
    orchestrator.stop().await;
    loop_task.abort();
    client.close();
    Ok(())
}
