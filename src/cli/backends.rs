//! CLI command: `inkloom backends`
//!
//! Lists configured backends with their live statistics and the
//! coordination strategy the usable count selects.

use inkloom_llm::{mask_api_key, BackendStore};
use std::path::Path;

/// Run the backends subcommand.
pub async fn run(config: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let runtime = super::load_runtime(config)?;
    let stats = runtime.stats();
    let info = runtime.strategy_info();

    if json {
        let report = serde_json::json!({
            "usable": runtime.usable_count(),
            "strategy": info.strategy,
            "backends": stats,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!("  Backends");
    println!("  {}", "-".repeat(78));
    println!(
        "  {:<20} {:<10} {:<10} {:<10} {:<12} {}",
        "Name", "Provider", "Priority", "Circuit", "Cost/1K", "API key"
    );
    println!("  {}", "-".repeat(78));

    if stats.is_empty() {
        println!("  (no backends configured; add [[backends]] to inkloom.toml)");
    }
    for descriptor in runtime.registry().list_all() {
        let state = runtime
            .registry()
            .breaker_state(descriptor.name())
            .map(|s| s.to_string())
            .unwrap_or_default();
        let key = descriptor
            .config
            .api_key
            .as_deref()
            .map(mask_api_key)
            .unwrap_or_else(|| "-".to_string());
        let name = if descriptor.enabled() {
            descriptor.name().to_string()
        } else {
            format!("{} (off)", descriptor.name())
        };
        println!(
            "  {:<20} {:<10} {:<10} {:<10} {:<12.4} {}",
            name,
            descriptor.provider(),
            descriptor.priority(),
            state,
            descriptor.cost_per_1k_tokens(),
            key
        );
    }

    println!();
    println!(
        "  Usable: {} -> {} ({})",
        runtime.usable_count(),
        info.strategy,
        info.description
    );
    println!();
    Ok(())
}
