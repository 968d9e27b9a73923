use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::client::openai::DEFAULT_API_BASE;
use crate::semantic::DEFAULT_MODEL_ID;

#[derive(Parser, Debug)]
#[command(
    name = "avqa",
    version,
    about = "Audio-visual QA benchmark generation and scoring tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the work units of a category's input collection without calling the model.
    Inventory(InventoryArgs),
    /// Generate benchmark questions for one category.
    Generate(GenerateArgs),
    /// Score a model's answers against gold benchmark records.
    Evaluate(EvaluateArgs),
    /// Summarise a generation or evaluation ledger.
    Status(StatusArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, ValueEnum)]
pub enum Category {
    #[value(name = "causal_reasoning", alias = "cr")]
    CausalReasoning,
    #[value(name = "unanswerability", alias = "ua")]
    Unanswerability,
    #[value(name = "pitch_timbre_reasoning", alias = "tpr")]
    PitchTimbreReasoning,
    #[value(name = "performer_skill_profiling", alias = "psp")]
    PerformerSkillProfiling,
    #[value(name = "implicit_distractions", alias = "id")]
    ImplicitDistractions,
    #[value(name = "tempo_av_sync_analysis", alias = "tsa")]
    TempoAvSyncAnalysis,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CausalReasoning => "causal_reasoning",
            Self::Unanswerability => "unanswerability",
            Self::PitchTimbreReasoning => "pitch_timbre_reasoning",
            Self::PerformerSkillProfiling => "performer_skill_profiling",
            Self::ImplicitDistractions => "implicit_distractions",
            Self::TempoAvSyncAnalysis => "tempo_av_sync_analysis",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    /// Falls back to OPENAI_API_KEY.
    #[arg(long)]
    pub api_key: Option<String>,

    #[arg(long, default_value = DEFAULT_API_BASE)]
    pub api_base: String,
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[arg(long, value_enum)]
    pub category: Category,

    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[arg(long, default_value = "questions")]
    pub output_dir: PathBuf,

    #[arg(long)]
    pub ledger_path: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[arg(long, value_enum)]
    pub category: Category,

    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[arg(long, default_value = "questions")]
    pub output_dir: PathBuf,

    #[arg(long)]
    pub ledger_path: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value = "gpt-4o")]
    pub model: String,

    #[arg(long)]
    pub temperature: Option<f32>,

    /// Records one model call must yield per unit.
    #[arg(long)]
    pub multiplicity: Option<usize>,

    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Politeness pause between model calls, in seconds.
    #[arg(long)]
    pub sleep_between: Option<f64>,

    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Seed for option shuffling.
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, default_value_t = false)]
    pub no_resume: bool,

    #[command(flatten)]
    pub service: ServiceArgs,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long)]
    pub output: PathBuf,

    /// Prefix of the candidate fields `<key>_answer` and `<key>_reason`.
    #[arg(long)]
    pub model_key: String,

    #[arg(long, default_value = "gpt-4o")]
    pub llm_model: String,

    #[arg(long, default_value_t = 0.1)]
    pub temperature: f32,

    #[arg(long, default_value_t = 1.0)]
    pub sleep_between: f64,

    #[arg(long, default_value_t = 5)]
    pub max_retries: u32,

    #[arg(long, default_value_t = 120)]
    pub timeout_secs: u64,

    #[arg(long, default_value = DEFAULT_MODEL_ID)]
    pub scorer_model: String,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub no_resume: bool,

    #[command(flatten)]
    pub service: ServiceArgs,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long)]
    pub ledger_path: PathBuf,
}
