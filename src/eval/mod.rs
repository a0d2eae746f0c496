//! Scenario-based evaluation: ask known questions, check that the retrieved
//! context (or, for refusals, the answer) carries an expected hint.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::rag::Pipeline;

/// Hints starting with this phrase are checked against the answer instead of
/// the contexts.
const REFUSAL_HINT: &str = "cannot find";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub question: String,
    /// Requested scope: `auto`, `unscoped` or a scope id.
    pub doc_filter: String,
    pub expected_context_hint: String,
}

impl Scenario {
    fn new(question: &str, doc_filter: &str, hint: &str) -> Self {
        Self {
            question: question.to_string(),
            doc_filter: doc_filter.to_string(),
            expected_context_hint: hint.to_string(),
        }
    }

    fn expects_refusal(&self) -> bool {
        self.expected_context_hint
            .to_lowercase()
            .starts_with(REFUSAL_HINT)
    }
}

/// Scenarios for the bundled datasheets: per-document lookups, routing and
/// questions the documents cannot answer.
pub fn builtin_scenarios() -> Vec<Scenario> {
    const F4: &str = "data/stm32f4.pdf";
    const F1: &str = "data/stm32f1.pdf";
    const BG96: &str = "data/bg96.pdf";
    vec![
        Scenario::new("What is the maximum CPU frequency?", F4, "168 MHz"),
        Scenario::new("Which bus is connected to APB2?", F4, "high-speed"),
        Scenario::new("What is the function of pin PA9?", F4, "USART1"),
        Scenario::new("What is the Cortex core used in this microcontroller?", F1, "Cortex-M3"),
        Scenario::new("Is the PA10 pin 5V tolerant?", F1, "tolerant"),
        Scenario::new("What is the flash memory size range?", F1, "64 or 128 Kbytes"),
        Scenario::new("Which LTE categories does the module support?", BG96, "Cat M1"),
        Scenario::new("What is the power supply voltage range (VBAT)?", BG96, "3.3V"),
        Scenario::new("Describe the PSM (Power Saving Mode) features.", BG96, "power saving"),
        Scenario::new("What is the clock speed of STM32F407?", "auto", "168 MHz"),
        Scenario::new("Does BG96 support NB-IoT?", "auto", "NB-IoT"),
        Scenario::new("What is the price of STM32F407 in 2024?", F4, "cannot find"),
        Scenario::new("Does STM32F103 support WiFi connectivity?", F1, "cannot find"),
    ]
}

/// Load scenarios from a JSON array.
pub fn load_scenarios(path: &Path) -> Result<Vec<Scenario>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("Invalid scenarios in {}", path.display()))
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub question: String,
    pub doc_filter: String,
    pub scope: String,
    pub routed: bool,
    pub answer: String,
    pub contexts: Vec<String>,
    pub hint_found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub hits: usize,
    pub errors: usize,
    pub hit_rate: f64,
    pub results: Vec<ScenarioResult>,
}

impl EvalReport {
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// Whether a scenario's hint shows up where it should.
pub fn hint_found(scenario: &Scenario, answer: &str, contexts: &[String]) -> bool {
    let hint = scenario.expected_context_hint.to_lowercase();
    if scenario.expects_refusal() {
        return answer.to_lowercase().contains(&hint);
    }
    contexts.iter().any(|c| c.to_lowercase().contains(&hint))
}

/// Run every scenario in order. A failing ask is recorded, not fatal.
pub async fn run(pipeline: &Pipeline, scenarios: &[Scenario]) -> EvalReport {
    let started_at = Utc::now();
    let mut results = Vec::with_capacity(scenarios.len());

    for scenario in scenarios {
        tracing::info!("Evaluating '{}' (filter: {})", scenario.question, scenario.doc_filter);
        let result = match pipeline.ask(&scenario.question, &scenario.doc_filter).await {
            Ok(ask) => {
                let contexts: Vec<String> = ask.sources.iter().map(|p| p.content.clone()).collect();
                ScenarioResult {
                    question: scenario.question.clone(),
                    doc_filter: scenario.doc_filter.clone(),
                    scope: ask.scope.to_string(),
                    routed: ask.routed,
                    hint_found: hint_found(scenario, &ask.answer, &contexts),
                    answer: ask.answer,
                    contexts,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!("Scenario failed: {e}");
                ScenarioResult {
                    question: scenario.question.clone(),
                    doc_filter: scenario.doc_filter.clone(),
                    scope: String::new(),
                    routed: false,
                    answer: String::new(),
                    contexts: Vec::new(),
                    hint_found: false,
                    error: Some(e.to_string()),
                }
            }
        };
        results.push(result);
    }

    let total = results.len();
    let hits = results.iter().filter(|r| r.hint_found).count();
    let errors = results.iter().filter(|r| r.error.is_some()).count();
    EvalReport {
        started_at,
        finished_at: Utc::now(),
        total,
        hits,
        errors,
        hit_rate: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
        results,
    }
}
