//! AI usage command implementation.

use super::{print_json, AppContext};
use crate::ai::budget::{check_budget, month_start, BudgetStatus, HOSTED_PROVIDER};
use crate::error::Result;
use crate::model::UsageSummary;

use chrono::Utc;
use colored::Colorize;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct UsageOutput {
    since: String,
    providers: Vec<UsageSummary>,
    budget: BudgetStatus,
}

/// Print this month's usage per provider and the hosted budget line.
///
/// # Errors
///
/// Returns an error if the usage log cannot be read.
pub fn execute(ctx: &AppContext, json: bool) -> Result<()> {
    let since = month_start(Utc::now());
    let storage = ctx.open_storage()?;
    let providers = storage.usage_summary(since.timestamp_millis())?;
    let spend = storage.monthly_spend(HOSTED_PROVIDER, since.timestamp_millis())?;
    storage.close()?;

    let budget = check_budget(spend, ctx.config.system.monthly_budget_usd);

    if json {
        return print_json(&UsageOutput {
            since: since.to_rfc3339(),
            providers,
            budget,
        });
    }

    println!("{}", format!("AI usage since {}", since.format("%Y-%m-%d")).bold());
    if providers.is_empty() {
        println!("  {}", "No AI calls recorded this month.".dimmed());
    }
    for p in &providers {
        println!(
            "  {:<10} {:>4} calls ({} failed)  {:>7} in / {:>7} out  ${:.4}",
            p.provider.cyan(),
            p.calls,
            p.failures,
            p.input_tokens,
            p.output_tokens,
            p.cost_usd
        );
    }

    let line = format!(
        "Budget ({HOSTED_PROVIDER}): ${:.2} / ${:.2}",
        budget.current_spend, budget.cap
    );
    if budget.within_budget {
        println!("{}", line.green());
    } else {
        println!("{}", format!("{line} (exceeded)").red().bold());
    }
    Ok(())
}
