// src/cli/mod.rs — CLI definition (clap derive)

pub mod history;
pub mod migrate;
pub mod progress;
pub mod run;
pub mod serve;

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use crate::core::orchestrator::WorkflowEngine;
use crate::core::types::{Criterion, EngineConfig};
use crate::evaluator::judge::LlmEvaluator;
use crate::evaluator::CriterionTable;
use crate::generator::analysis::LlmAnalyzer;
use crate::generator::llm::{LlmAttributeInferrer, LlmGenerator};
use crate::infra::config::Config;
use crate::infra::errors::RedraftError;
use crate::provider::openai_compat::OpenAICompatProvider;
use crate::provider::retry::{RetryConfig, RetryProvider};
use crate::provider::ModelProvider;

#[derive(Parser)]
#[command(
    name = "redraft",
    about = "Iterative rewriting with parallel per-criterion judges",
    version
)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rewrite a text until every criterion meets its threshold
    Run(RunArgs),
    /// Serve the HTTP API
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Do not persist requests
        #[arg(long)]
        no_store: bool,
    },
    /// List stored requests, newest first
    History {
        /// Only requests from this session
        #[arg(long)]
        session: Option<String>,
        /// Only requests opted in to external grading
        #[arg(long, conflicts_with = "session")]
        gradable: bool,
        #[arg(short, long, default_value = "20")]
        limit: u32,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one stored request
    Show {
        request_id: String,
        /// Print the stored record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show migration status, or roll back the latest migration
    Migrate {
        #[arg(long)]
        status: bool,
        #[arg(long, conflicts_with = "status")]
        rollback: bool,
    },
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Text to rewrite
    #[arg(required_unless_present = "stdin")]
    pub text: Option<String>,

    /// Requested attribute (repeatable); inferred from the text when omitted
    #[arg(short = 'a', long = "attribute")]
    pub attributes: Vec<String>,

    /// Session id to file the request under (generated when omitted)
    #[arg(long)]
    pub session: Option<String>,

    /// Max generate/evaluate passes
    #[arg(short = 'n', long)]
    pub iterations: Option<u32>,

    /// Threshold override, e.g. `contentPreservationScore=8` (repeatable)
    #[arg(long = "min-score", value_parser = parse_min_score)]
    pub min_scores: Vec<(Criterion, f32)>,

    /// Summarize the run after it finishes
    #[arg(long)]
    pub analyze: bool,

    /// Print the full result as JSON
    #[arg(long)]
    pub json: bool,

    /// Read the text from stdin
    #[arg(long)]
    pub stdin: bool,

    /// Do not persist the request
    #[arg(long)]
    pub no_store: bool,

    /// Mark the stored request as open for external grading
    #[arg(long)]
    pub allow_grading: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Parse `criterion=value`, with the criterion given by its wire key.
pub fn parse_min_score(s: &str) -> Result<(Criterion, f32), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected criterion=value, got '{s}'"))?;
    let criterion: Criterion = key.parse()?;
    let value: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", value.trim()))?;
    if !(0.0..=10.0).contains(&value) {
        return Err(format!("threshold must be between 0 and 10, got {value}"));
    }
    Ok((criterion, value))
}

/// Wire the LLM-backed adapters into an engine.
pub fn build_engine(config: &Config) -> anyhow::Result<WorkflowEngine> {
    let api_key = config
        .provider
        .api_key()
        .ok_or_else(|| RedraftError::NoApiKey {
            env_var: config.provider.api_key_env.clone(),
        })?;

    let http: Arc<dyn ModelProvider> = Arc::new(OpenAICompatProvider::new(
        "openai-compat",
        api_key,
        config.provider.base_url.clone(),
    ));
    let provider: Arc<dyn ModelProvider> = Arc::new(RetryProvider::with_config(
        http,
        RetryConfig::default().with_max_retries(config.provider.max_retries),
    ));
    let model = config.provider.model.as_str();

    let evaluators = CriterionTable::uniform(|_| {
        Arc::new(LlmEvaluator::new(provider.clone(), model)) as Arc<dyn crate::evaluator::Evaluator>
    });

    tracing::debug!(model, base_url = %config.provider.base_url, "Engine configured");

    Ok(WorkflowEngine::new(
        Arc::new(LlmGenerator::new(provider.clone(), model)),
        evaluators,
        EngineConfig::from(&config.workflow),
    )
    .with_inferrer(Arc::new(LlmAttributeInferrer::new(provider.clone(), model)))
    .with_analyzer(Arc::new(LlmAnalyzer::new(provider, model))))
}
