//! CLI command: `inkloom run`
//!
//! Runs a pipeline against the configured backends. Each role receives the
//! user prompt; dependent roles also receive their dependencies' outputs.
//! Ctrl-C cancels the run and reports whatever finished.

use inkloom_core::{
    format_error_for_cli, AgentRole, PipelineRequest, PipelineResult, PromptComposer, RoleOutcome,
};
use inkloom_llm::{PromptPayload, SelectionStrategy};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Options for one `inkloom run`
#[derive(Debug)]
pub struct RunOptions {
    /// User prompt
    pub prompt: String,
    /// Roles to run
    pub roles: Vec<AgentRole>,
    /// Ranking objective override
    pub strategy: Option<SelectionStrategy>,
    /// Run timeout
    pub timeout: Option<Duration>,
    /// Print the JSON summary
    pub json: bool,
}

/// Appends upstream role outputs to the prompt
struct UpstreamComposer;

impl PromptComposer for UpstreamComposer {
    fn compose(
        &self,
        _role: AgentRole,
        mut payload: PromptPayload,
        upstream: &BTreeMap<AgentRole, String>,
    ) -> PromptPayload {
        for (role, text) in upstream {
            payload.prompt.push_str(&format!("\n\n## {role} output\n{text}"));
        }
        payload
    }
}

fn build_request(options: &RunOptions) -> PipelineRequest {
    let mut request = PipelineRequest::new(options.roles.clone());
    for role in &options.roles {
        let payload = PromptPayload::new(options.prompt.clone()).with_system_prompt(format!(
            "You are the {role} of a content-generation pipeline. Respond with your {role} output only."
        ));
        request = request.with_payload(*role, payload);
    }
    request.strategy = options.strategy;
    request.timeout = options.timeout;
    request
}

/// Run the run subcommand.
pub async fn run(config: Option<&Path>, options: RunOptions) -> anyhow::Result<()> {
    let runtime = super::load_runtime(config)?.with_composer(Arc::new(UpstreamComposer));
    let request = build_request(&options);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            ctrl_c.cancel();
        }
    });

    let result = runtime
        .run_with_cancel(&request, &cancel)
        .await
        .map_err(|e| anyhow::anyhow!(format_error_for_cli(&e)))?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&result.summary())?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn print_result(result: &PipelineResult) {
    println!();
    println!(
        "  Run {} ({}): {} in {:.1}s",
        result.run_id,
        result.strategy,
        result.status,
        result.elapsed.as_secs_f64()
    );
    println!("  {}", "-".repeat(60));
    for (role, outcome) in &result.outcomes {
        match outcome {
            RoleOutcome::Succeeded(success) => println!(
                "  {:<10} ok       {} ({} tokens, ${:.4})",
                role.as_str(),
                success.backend,
                success.tokens_used,
                success.cost
            ),
            RoleOutcome::Failed { error, dispatches } => println!(
                "  {:<10} failed   {error} after {dispatches} dispatch(es)",
                role.as_str()
            ),
            RoleOutcome::Skipped(reason) => {
                println!("  {:<10} skipped  {reason:?}", role.as_str())
            }
        }
    }
    println!("  Total cost: ${:.4}", result.total_cost());

    let last = result
        .stages
        .iter()
        .rev()
        .flatten()
        .find_map(|role| result.outcome(*role).and_then(RoleOutcome::text));
    if let Some(text) = last {
        println!();
        println!("{text}");
    }
    println!();
}
