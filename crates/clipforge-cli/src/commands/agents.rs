//! `clipforge agents` — Show registered agents and their run counters.

use clipforge_core::state::AppState;

pub async fn list(state: &AppState) -> Result<(), String> {
    let stats = state
        .agent_stats_store
        .list()
        .await
        .map_err(|e| e.to_string())?;

    println!(
        "{:<14} {:<12} {:>8} {:>8} {:>6} {:>6} {:>6}",
        "AGENT", "PROVIDER", "TIMEOUT", "RETRIES", "RUNS", "OK", "FAIL"
    );
    for agent in state.orchestrator.describe() {
        let row = stats.iter().find(|s| s.agent_type == agent.agent_type);
        println!(
            "{:<14} {:<12} {:>7}s {:>8} {:>6} {:>6} {:>6}",
            agent.agent_type.as_str(),
            agent.provider,
            agent.timeout_secs,
            agent.max_retries,
            row.map_or(0, |s| s.total_runs),
            row.map_or(0, |s| s.successes),
            row.map_or(0, |s| s.failures),
        );
    }
    Ok(())
}
