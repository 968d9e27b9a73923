use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::cli::EvaluateArgs;
use crate::client::{
    CompletionRequest, ModelClient, RetryPolicy, RetryingClient, Sleeper, ThreadSleeper,
};
use crate::commands::build_service_client;
use crate::error::PipelineError;
use crate::ledger::{
    EVALUATION_IDENTITY_FIELD, GENERATION_IDENTITY_FIELD, Identified, LedgerWriter,
    filter_pending, identity_string, load_completed_ids, read_records,
};
use crate::model::{
    AggregatePercentages, AggregateScores, AnswerCorrectness, CoreInferenceEvaluation,
    EvaluationRecord, EvaluationRunManifest, FactualConsistencyEvaluation, RunCounters,
};
use crate::normalize::ResponseNormalizer;
use crate::semantic::{EntailmentScorer, LocalNliScorer};
use crate::util::{format_percent, now_utc_string, utc_compact_string, write_json_pretty};

mod pipeline;
mod prompts;
mod run;
mod stats;

pub use pipeline::{EvaluationPipeline, EvaluationSettings};
pub use run::{run, summary_path_for};

use prompts::*;
