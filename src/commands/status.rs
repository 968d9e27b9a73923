use std::collections::{BTreeMap, HashSet};

use anyhow::Result;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::evaluate::summary_path_for;
use crate::ledger::{
    EVALUATION_IDENTITY_FIELD, GENERATION_IDENTITY_FIELD, identity_string, read_records,
};
use crate::model::AggregateScores;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    pub record_count: usize,
    pub malformed_lines: usize,
    pub distinct_video_ids: usize,
    pub distinct_questions: usize,
    pub evaluated_records: usize,
    pub per_category: BTreeMap<String, usize>,
}

pub fn run(args: StatusArgs) -> Result<()> {
    let path = &args.ledger_path;
    info!(ledger = %path.display(), "status requested");

    if !path.exists() {
        warn!(path = %path.display(), "ledger file missing");
        return Ok(());
    }

    let scan = read_records(path)?;
    let summary = summarize(&scan.records, scan.malformed_lines);

    info!(
        records = summary.record_count,
        malformed_lines = summary.malformed_lines,
        distinct_video_ids = summary.distinct_video_ids,
        distinct_questions = summary.distinct_questions,
        "ledger status"
    );
    for (category, count) in &summary.per_category {
        info!(category = %category, records = count, "category count");
    }

    if summary.evaluated_records > 0 {
        let percentages = AggregateScores::from_records(&scan.records).percentages();
        info!(
            evaluated = summary.evaluated_records,
            answer_correctness = %percentages.answer_correctness,
            factual_consistency = %percentages.factual_consistency,
            core_inference = %percentages.core_inference,
            "evaluation aggregates"
        );

        let summary_path = summary_path_for(path);
        if summary_path.exists() {
            info!(path = %summary_path.display(), "evaluation summary manifest present");
        } else {
            warn!(path = %summary_path.display(), "evaluation summary manifest missing");
        }
    }

    Ok(())
}

pub fn summarize(records: &[Map<String, Value>], malformed_lines: usize) -> LedgerSummary {
    let mut video_ids = HashSet::new();
    let mut questions = HashSet::new();
    let mut summary = LedgerSummary {
        record_count: records.len(),
        malformed_lines,
        ..LedgerSummary::default()
    };

    for record in records {
        if let Some(video_id) = record.get(GENERATION_IDENTITY_FIELD).and_then(identity_string) {
            video_ids.insert(video_id);
        }
        if let Some(question) = record.get(EVALUATION_IDENTITY_FIELD).and_then(identity_string) {
            questions.insert(question);
        }
        if record.contains_key("answer_correctness") {
            summary.evaluated_records += 1;
        }

        let category = record
            .get("category")
            .and_then(Value::as_str)
            .unwrap_or("uncategorized");
        *summary.per_category.entry(category.to_string()).or_insert(0) += 1;
    }

    summary.distinct_video_ids = video_ids.len();
    summary.distinct_questions = questions.len();
    summary
}
