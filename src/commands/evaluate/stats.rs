use super::*;

impl AggregateScores {
    /// Lines without an answer check are ignored; a missing score counts as zero.
    pub fn from_records(records: &[Map<String, Value>]) -> Self {
        let mut totals = Self::default();

        for record in records {
            let Some(is_correct) = record
                .get("answer_correctness")
                .and_then(|value| value.get("is_correct"))
                .and_then(Value::as_bool)
            else {
                continue;
            };

            totals.record_count += 1;
            totals.answer_correctness += if is_correct { 1.0 } else { 0.0 };
            totals.factual_consistency +=
                nested_score(record, "factual_consistency_evaluation", "factual_consistency_score");
            totals.core_inference +=
                nested_score(record, "core_inference_evaluation", "core_inference_score");
        }

        if totals.record_count == 0 {
            return totals;
        }

        let count = totals.record_count as f64;
        Self {
            record_count: totals.record_count,
            answer_correctness: totals.answer_correctness / count,
            factual_consistency: totals.factual_consistency / count,
            core_inference: totals.core_inference / count,
        }
    }

    pub fn percentages(&self) -> AggregatePercentages {
        AggregatePercentages {
            answer_correctness: format_percent(self.answer_correctness * 100.0),
            factual_consistency: format_percent(self.factual_consistency * 100.0),
            core_inference: format_percent(self.core_inference * 100.0),
        }
    }
}

fn nested_score(record: &Map<String, Value>, section: &str, field: &str) -> f64 {
    record
        .get(section)
        .and_then(|value| value.get(field))
        .and_then(Value::as_f64)
        .filter(|score| score.is_finite())
        .unwrap_or(0.0)
}
