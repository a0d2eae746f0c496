//! Run the evaluation scenarios against the configured pipeline and write a
//! JSON report.
//!
//! `EVAL_SCENARIOS_FILE` replaces the built-in scenarios; `EVAL_OUTPUT` sets
//! the report path (default `eval_results.json`).

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use datasheet_rag::config::Config;
use datasheet_rag::eval;
use datasheet_rag::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let scenarios = match std::env::var("EVAL_SCENARIOS_FILE") {
        Ok(path) => eval::load_scenarios(&PathBuf::from(path))?,
        Err(_) => eval::builtin_scenarios(),
    };
    let output = PathBuf::from(
        std::env::var("EVAL_OUTPUT").unwrap_or_else(|_| "eval_results.json".to_string()),
    );

    let state = AppState::new(config)?;
    tracing::info!("Running {} scenario(s)", scenarios.len());
    let report = eval::run(&state.pipeline, &scenarios).await;

    for r in &report.results {
        let mark = if r.hint_found { "hit " } else { "miss" };
        tracing::info!("[{mark}] {} -> {} ({})", r.question, r.scope, r.doc_filter);
    }
    tracing::info!(
        "Hint hit rate: {}/{} ({:.0}%), {} error(s)",
        report.hits,
        report.total,
        report.hit_rate * 100.0,
        report.errors
    );

    report.write_json(&output)?;
    tracing::info!("Report written to {}", output.display());
    Ok(())
}
