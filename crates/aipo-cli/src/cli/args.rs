//! Clap argument surface (spec.md §6 "CLI surface (partial; stable subset)").
//! Grounded in the teacher's `Cli`/`Command` split (`assay-cli/src/cli/args/mod.rs`):
//! one top-level `Cli` wrapping a `Command` enum, one `clap::Args` struct per
//! subcommand, flags that double as `AIPO_*` env vars via `#[arg(env = ...)]`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "aipo", version, about = "Automated LLM safety, security, and compliance evaluator")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Execute a suite against a target and evaluate the release gate.
    Run(RunArgs),
    /// Evaluate a stored summary against a policy, without re-running anything.
    Gate(GateArgs),
    /// Measure ASR with confidence intervals for a suite.
    VerifySuite(VerifySuiteArgs),
    /// Inspect persisted conversations.
    Sessions(SessionsArgs),
    /// Replay one persisted conversation.
    ReplayConversation(ReplayConversationArgs),
    /// List every persisted conversation id.
    ListConversations(ListConversationsArgs),
    /// Preflight checks for the engine and (optionally) one adapter.
    Doctor(DoctorArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum JudgeKind {
    Keyword,
    Llm,
    Classifier,
    Ensemble,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum OrchestratorKind {
    Single,
    Multi,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum ScoringKind {
    Any,
    Majority,
    Final,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum ReportFormat {
    Json,
    Yaml,
    Md,
    Html,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum ReplayFormat {
    Text,
    Json,
    Interactive,
}

/// Shared target/storage flags every command that drives or inspects a run
/// needs (spec.md §6 env prefix `AIPO_`).
#[derive(clap::Args, Debug, Clone)]
pub struct StorageArgs {
    /// Root directory for cache/state/reports (overrides OS convention).
    #[arg(long, env = "AIPO_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Optional YAML config file layered under env and CLI overrides.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Parser, Clone)]
pub struct RunArgs {
    #[arg(long)]
    pub suite: PathBuf,

    /// Adapter name. Resolved either as a path to an adapter spec YAML file
    /// or as `<name>.yaml` under `./adapters/`.
    #[arg(long)]
    pub adapter: String,

    #[arg(long)]
    pub model: String,

    #[arg(long, value_enum, default_value = "keyword")]
    pub judge: JudgeKind,

    #[arg(long, default_value_t = 1.0)]
    pub sample_rate: f64,

    #[arg(long, default_value_t = 5)]
    pub max_turns: u32,

    #[arg(long, value_enum, default_value = "single")]
    pub orchestrator: OrchestratorKind,

    #[arg(long, value_enum, default_value = "any")]
    pub scoring: ScoringKind,

    #[arg(long)]
    pub policy: Option<PathBuf>,

    /// Rate budget, e.g. "10/sec" or "300/min".
    #[arg(long)]
    pub max_rate: Option<String>,

    /// Adds random per-call jitter and avoids bursty request timing.
    #[arg(long)]
    pub stealth: bool,

    /// Extra delay window in milliseconds between calls, e.g. "200-800".
    #[arg(long)]
    pub random_delay: Option<String>,

    #[arg(long)]
    pub capture_traffic: bool,

    /// Also write `reports/findings.sarif` (SARIF 2.1.0) alongside
    /// `summary.json`, for upload to GitHub Code Scanning or similar.
    #[arg(long)]
    pub sarif: bool,

    /// Skip tests whose fingerprint (suite+model+prompt+policy hash+engine
    /// version) is unchanged from a prior passing run, reusing the stored
    /// result instead of re-invoking the adapter.
    #[arg(long)]
    pub incremental: bool,

    #[arg(long, env = "AIPO_SEED")]
    pub seed: Option<u64>,

    #[arg(long)]
    pub budget_usd: Option<f64>,

    #[arg(long)]
    pub generate_evidence: bool,

    #[command(flatten)]
    pub storage: StorageArgs,
}

#[derive(Parser, Clone)]
pub struct GateArgs {
    #[arg(long)]
    pub summary: PathBuf,

    #[arg(long)]
    pub policy: PathBuf,

    #[arg(long)]
    pub generate_evidence: bool,

    #[command(flatten)]
    pub storage: StorageArgs,
}

#[derive(Parser, Clone)]
pub struct VerifySuiteArgs {
    pub suite: PathBuf,

    #[arg(long)]
    pub adapter: String,

    #[arg(long)]
    pub model: String,

    #[arg(long, default_value_t = 1.0)]
    pub sample_rate: f64,

    #[arg(long, value_enum, default_value = "keyword")]
    pub judge: JudgeKind,

    #[arg(long, default_value_t = aipo_core::DEFAULT_JAILBREAK_THRESHOLD)]
    pub threshold: f64,

    #[arg(long, value_enum, default_value = "json")]
    pub report_format: ReportFormat,

    #[arg(long, env = "AIPO_SEED")]
    pub seed: Option<u64>,

    #[command(flatten)]
    pub storage: StorageArgs,
}

#[derive(Parser, Clone)]
pub struct SessionsArgs {
    #[command(subcommand)]
    pub cmd: SessionsCmd,
}

#[derive(Subcommand, Clone)]
pub enum SessionsCmd {
    List(SessionsListArgs),
    Show(SessionsShowArgs),
    Export(SessionsExportArgs),
    Delete(SessionsDeleteArgs),
    Prune(SessionsPruneArgs),
}

#[derive(clap::Args, Clone)]
pub struct SessionsListArgs {
    #[command(flatten)]
    pub storage: StorageArgs,
}

#[derive(clap::Args, Clone)]
pub struct SessionsShowArgs {
    pub conversation_id: uuid::Uuid,

    #[command(flatten)]
    pub storage: StorageArgs,
}

#[derive(clap::Args, Clone)]
pub struct SessionsExportArgs {
    pub conversation_id: uuid::Uuid,

    #[arg(long)]
    pub out: PathBuf,

    #[command(flatten)]
    pub storage: StorageArgs,
}

#[derive(clap::Args, Clone)]
pub struct SessionsDeleteArgs {
    pub conversation_id: uuid::Uuid,

    #[command(flatten)]
    pub storage: StorageArgs,
}

#[derive(clap::Args, Clone)]
pub struct SessionsPruneArgs {
    /// Conversations whose every turn is older than this many days are removed.
    #[arg(long, default_value_t = 30)]
    pub older_than_days: i64,

    #[command(flatten)]
    pub storage: StorageArgs,
}

#[derive(Parser, Clone)]
pub struct ReplayConversationArgs {
    pub conversation_id: uuid::Uuid,

    #[arg(long, value_enum, default_value = "text")]
    pub format: ReplayFormat,

    #[command(flatten)]
    pub storage: StorageArgs,
}

#[derive(Parser, Clone)]
pub struct ListConversationsArgs {
    #[command(flatten)]
    pub storage: StorageArgs,
}

#[derive(Parser, Clone)]
pub struct DoctorArgs {
    #[command(subcommand)]
    pub cmd: DoctorCmd,
}

#[derive(Subcommand, Clone)]
pub enum DoctorCmd {
    Check(DoctorCheckArgs),
}

#[derive(clap::Args, Clone)]
pub struct DoctorCheckArgs {
    #[arg(long)]
    pub adapter: Option<String>,

    #[command(flatten)]
    pub storage: StorageArgs,
}
