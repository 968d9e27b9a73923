use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use tracing::{info, warn};

use crate::cli::{Category, GenerateArgs};
use crate::client::{
    CompletionRequest, ModelClient, RetryPolicy, RetryingClient, Sleeper, ThreadSleeper,
};
use crate::commands::build_service_client;
use crate::enumerate::{CaptionChannel, InputLayout, UnitSource, discover};
use crate::error::PipelineError;
use crate::ledger::{
    GENERATION_IDENTITY_FIELD, LedgerWriter, filter_pending, load_completed_ids,
};
use crate::model::{BenchmarkItem, GenerationRunManifest, RunCounters, WorkUnit};
use crate::normalize::{
    ItemSchema, ResponseNormalizer, ResponseShape, Stamp, parse_and_validate, shuffle_options,
};
use crate::util::{now_utc_string, utc_compact_string, write_json_pretty};

pub const DEFAULT_LEDGER_FILE: &str = "qa_pairs.jsonl";

mod pipeline;
mod profiles;
mod run;
#[cfg(test)]
mod tests;

pub use pipeline::{GenerationPipeline, GenerationSettings};
pub use profiles::{GenerationProfile, TemplateRenderer, profile_for, system_prompt_for};
pub use run::run;
