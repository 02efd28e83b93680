//! CLI command: `inkloom plan`
//!
//! Prints the stage partition the coordinator builds for a backend count.

use inkloom_core::{format_error_for_cli, AgentCoordinator, AgentRole, ExecutionPlan};
use std::path::Path;

/// Run the plan subcommand.
pub async fn run(
    config: Option<&Path>,
    backends: Option<usize>,
    roles: Vec<AgentRole>,
    json: bool,
) -> anyhow::Result<()> {
    let plan = match backends {
        Some(count) => AgentCoordinator::new()
            .plan(count, &roles)
            .map_err(inkloom_core::Error::from),
        None => super::load_runtime(config)?.plan_preview(&roles),
    }
    .map_err(|e| anyhow::anyhow!(format_error_for_cli(&e)))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print_plan(&plan);
    }
    Ok(())
}

fn print_plan(plan: &ExecutionPlan) {
    println!();
    println!(
        "  Strategy: {} ({} backend{})",
        plan.strategy,
        plan.backend_count,
        if plan.backend_count == 1 { "" } else { "s" }
    );
    println!("  {}", plan.strategy.description());
    println!("  {}", "-".repeat(60));
    for (index, stage) in plan.stages.iter().enumerate() {
        let roles: Vec<String> = stage
            .assignments
            .iter()
            .map(|a| format!("{} (slot {})", a.role, a.backend_slot))
            .collect();
        println!("  Stage {}: {}", index + 1, roles.join(", "));
    }
    if !plan.unscheduled.is_empty() {
        let names: Vec<&str> = plan.unscheduled.iter().map(AgentRole::as_str).collect();
        println!("  Not scheduled: {}", names.join(", "));
    }
    println!();
}
