use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One identity-bearing bundle of prompt material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub video_id: String,
    /// Named prompt fields, e.g. `visual`, `audio`, `transcript`.
    pub fields: BTreeMap<String, String>,
    /// Pipeline-controlled values stamped onto every generated record.
    pub labels: BTreeMap<String, String>,
    /// Overrides the run's expected record count for this unit.
    pub multiplicity: Option<usize>,
}

impl WorkUnit {
    pub fn new(video_id: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            fields: BTreeMap::new(),
            labels: BTreeMap::new(),
            multiplicity: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkItem {
    pub question: String,
    pub options: BTreeMap<String, String>,
    pub correct_answer_key: String,
    pub gold_reasoning: String,
    pub video_id: String,
    pub category: String,
    /// Model-produced fields outside the schema, plus stamped unit labels.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnswerCorrectness {
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactualConsistencyEvaluation {
    pub factual_consistency_score: f64,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreInferenceEvaluation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sanitized_gold_reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sanitized_generated_reasoning: Option<String>,
    pub core_inference_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

pub const EVALUATION_FIELDS: [&str; 3] = [
    "answer_correctness",
    "factual_consistency_evaluation",
    "core_inference_evaluation",
];

/// A candidate record enriched by the three evaluation stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    #[serde(flatten)]
    pub candidate: Map<String, Value>,
    pub answer_correctness: AnswerCorrectness,
    pub factual_consistency_evaluation: FactualConsistencyEvaluation,
    pub core_inference_evaluation: CoreInferenceEvaluation,
}

impl EvaluationRecord {
    pub fn new(
        mut candidate: Map<String, Value>,
        answer_correctness: AnswerCorrectness,
        factual_consistency_evaluation: FactualConsistencyEvaluation,
        core_inference_evaluation: CoreInferenceEvaluation,
    ) -> Self {
        for field in EVALUATION_FIELDS {
            candidate.remove(field);
        }

        Self {
            candidate,
            answer_correctness,
            factual_consistency_evaluation,
            core_inference_evaluation,
        }
    }
}

/// Mean scores across evaluated records, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AggregateScores {
    pub record_count: usize,
    pub answer_correctness: f64,
    pub factual_consistency: f64,
    pub core_inference: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatePercentages {
    pub answer_correctness: String,
    pub factual_consistency: String,
    pub core_inference: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunCounters {
    pub discovered: usize,
    pub already_completed: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub records_written: usize,
    pub skipped: BTreeMap<String, usize>,
}

impl RunCounters {
    pub fn record_skip(&mut self, kind: &str) {
        *self.skipped.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub category: String,
    pub started_at: String,
    pub updated_at: String,
    pub status: String,
    pub model: String,
    pub temperature: f32,
    pub multiplicity: usize,
    pub max_retries: u32,
    pub sleep_between_ms: u64,
    pub resume: bool,
    pub data_dir: String,
    pub ledger_path: String,
    pub counts: RunCounters,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub updated_at: String,
    pub status: String,
    pub input_path: String,
    pub output_path: String,
    pub model_key: String,
    pub llm_model: String,
    pub temperature: f32,
    pub max_retries: u32,
    pub sleep_between_ms: u64,
    pub scorer_model: String,
    pub resume: bool,
    pub input_malformed_lines: usize,
    pub counts: RunCounters,
    pub aggregates: AggregateScores,
    pub percentages: AggregatePercentages,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryEntry {
    pub video_id: String,
    pub completed: bool,
    pub companions: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub sha256: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub category: String,
    pub data_dir: String,
    pub ledger_path: String,
    pub unit_count: usize,
    pub pending_count: usize,
    pub units: Vec<InventoryEntry>,
}
