// src/cli/run.rs — `redraft run`: one rewrite from the terminal

use std::io::Read;
use std::path::Path;

use crate::core::policy;
use crate::core::revision::format_score;
use crate::core::types::{FinalResult, RunInput, Termination};
use crate::infra::config::Config;
use crate::memory::store::RequestRecord;
use crate::memory::MemoryManager;

use super::RunArgs;

pub async fn run_rewrite(args: RunArgs, config: &Config) -> anyhow::Result<()> {
    let text = match (&args.text, args.stdin) {
        (_, true) => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
        (Some(text), false) => text.clone(),
        (None, false) => anyhow::bail!("no text given; pass it as an argument or use --stdin"),
    };

    let input = build_input(&args, text, config);

    let mut engine = super::build_engine(config)?;
    if !args.quiet {
        engine = engine.with_progress(super::progress::terminal_progress());
    }

    let result = engine.run(input.clone()).await?;

    if !args.no_store {
        if let Err(e) = store_result(&config.store.db_path(), &input, &result, args.allow_grading) {
            tracing::warn!("Could not store request {}: {}", result.request_id, e);
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render_human(&result));
    }

    if let Some(ref failure) = result.error {
        anyhow::bail!("run ended early: {}", failure.message);
    }
    Ok(())
}

fn build_input(args: &RunArgs, text: String, config: &Config) -> RunInput {
    let session = args
        .session
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut input = RunInput::new(text, session)
        .with_attributes(args.attributes.iter().cloned())
        .with_analysis(args.analyze);
    if let Some(n) = args.iterations {
        input = input.with_max_iterations(n);
    }
    if !args.min_scores.is_empty() {
        let mut min = config.workflow.min_scores();
        for &(criterion, value) in &args.min_scores {
            min[criterion] = value;
        }
        input = input.with_min_scores(min);
    }
    input
}

fn store_result(
    db_path: &Path,
    input: &RunInput,
    result: &FinalResult,
    allow_grading: bool,
) -> anyhow::Result<()> {
    let mm = MemoryManager::open(db_path)?;
    mm.store.upsert_session(&result.session_id)?;
    mm.store
        .insert_request(&RequestRecord::from_run(input, result, allow_grading)?)?;
    tracing::debug!(request_id = %result.request_id, "Request stored");
    Ok(())
}

/// Five-star bar for a 0–10 score, half a star per point rounded.
pub fn star_bar(score: f32) -> String {
    let filled = ((score / 2.0).round() as usize).min(5);
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

/// Plain-text report for stdout.
pub fn render_human(result: &FinalResult) -> String {
    let mut out = String::new();

    if let Some(ref text) = result.candidate_text {
        out.push_str(text.trim_end());
        out.push_str("\n\n");
    }

    if let Some(ref scores) = result.scores {
        for (criterion, &score) in scores.iter() {
            let marker = if policy::passes(score, result.min_scores[criterion]) {
                ""
            } else {
                "  below threshold"
            };
            out.push_str(&format!(
                "{:<24} {:>4}/10  {}{}\n",
                criterion.label(),
                format_score(score),
                star_bar(score),
                marker
            ));
        }
    }

    if !result.attributes_used.is_empty() {
        let source = if result.attributes_inferred { " (inferred)" } else { "" };
        out.push_str(&format!(
            "Attributes{source}: {}\n",
            result.attributes_used.join(", ")
        ));
    }
    if let Some(reason) = &result.inference_error {
        out.push_str(&format!("Attribute inference: {reason}\n"));
    }

    let outcome = match result.termination {
        Termination::ThresholdsMet => "all thresholds met",
        Termination::MaxIterationsReached => "iteration limit reached",
        Termination::Failed => "failed",
    };
    out.push_str(&format!(
        "Iterations: {} ({outcome})\nRequest: {}\n",
        result.iterations, result.request_id
    ));

    if let Some(ref analysis) = result.final_analysis {
        out.push_str(&format!("\n{}\n", analysis.trim()));
    }
    out
}
