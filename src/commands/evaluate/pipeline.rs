use super::*;

#[derive(Debug, Clone)]
pub struct EvaluationSettings {
    pub model: String,
    pub temperature: f32,
    pub sleep_between: Duration,
    pub answer_field: String,
    pub reason_field: String,
}

impl EvaluationSettings {
    pub fn for_model_key(model_key: &str, model: &str, temperature: f32, sleep_between: Duration) -> Self {
        Self {
            model: model.to_string(),
            temperature,
            sleep_between,
            answer_field: format!("{model_key}_answer"),
            reason_field: format!("{model_key}_reason"),
        }
    }
}

/// An input record keyed by its question text.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub question: String,
    pub record: Map<String, Value>,
}

impl Identified for Candidate {
    fn identity(&self) -> &str {
        &self.question
    }
}

impl Candidate {
    /// Records without a usable question cannot be resumed and are skipped.
    pub fn from_record(record: Map<String, Value>) -> Result<Self, PipelineError> {
        let question = record
            .get(EVALUATION_IDENTITY_FIELD)
            .and_then(identity_string)
            .filter(|question| !question.trim().is_empty())
            .ok_or_else(|| PipelineError::IncompleteRecord("missing question".to_string()))?;
        Ok(Self { question, record })
    }
}

struct ScoringInputs {
    correct_answer: String,
    generated_answer: String,
    gold_reasoning: String,
    generated_reasoning: String,
}

pub struct EvaluationPipeline<'a> {
    client: &'a dyn ModelClient,
    sleeper: &'a dyn Sleeper,
    scorer: &'a dyn EntailmentScorer,
    normalizer: ResponseNormalizer,
    settings: EvaluationSettings,
}

impl<'a> EvaluationPipeline<'a> {
    pub fn new(
        client: &'a dyn ModelClient,
        sleeper: &'a dyn Sleeper,
        scorer: &'a dyn EntailmentScorer,
        settings: EvaluationSettings,
    ) -> Result<Self> {
        Ok(Self {
            client,
            sleeper,
            scorer,
            normalizer: ResponseNormalizer::new()?,
            settings,
        })
    }

    /// Evaluates pending candidates in input order, appending each record as it completes.
    pub fn run(
        &self,
        records: Vec<Map<String, Value>>,
        completed: &HashSet<String>,
        writer: &mut LedgerWriter,
        counters: &mut RunCounters,
    ) -> Result<()> {
        counters.discovered += records.len();

        let mut candidates = Vec::with_capacity(records.len());
        for record in records {
            match Candidate::from_record(record) {
                Ok(candidate) => candidates.push(candidate),
                Err(err) => {
                    warn!(error_kind = err.kind(), error = %err, "skipping record");
                    counters.record_skip(err.kind());
                }
            }
        }

        let identified = candidates.len();
        let pending = filter_pending(candidates, completed).collect::<Vec<Candidate>>();
        counters.already_completed += identified - pending.len();

        info!(
            pending = pending.len(),
            already_completed = counters.already_completed,
            "starting evaluation"
        );

        for candidate in pending {
            counters.attempted += 1;
            let video_id = candidate
                .record
                .get(GENERATION_IDENTITY_FIELD)
                .and_then(identity_string)
                .unwrap_or_default();

            match self.evaluate(candidate.record) {
                Ok(evaluated) => {
                    writer.append(&evaluated)?;
                    counters.succeeded += 1;
                    counters.records_written += 1;
                    info!(
                        video_id = %video_id,
                        is_correct = evaluated.answer_correctness.is_correct,
                        factual_consistency = evaluated.factual_consistency_evaluation.factual_consistency_score,
                        core_inference = evaluated.core_inference_evaluation.core_inference_score,
                        "evaluated record"
                    );
                }
                Err(err) => {
                    warn!(
                        video_id = %video_id,
                        error_kind = err.kind(),
                        error = %err,
                        "skipping record"
                    );
                    counters.record_skip(err.kind());
                }
            }
        }

        Ok(())
    }

    /// Runs the answer check, then either the full scoring stages or the zero-score branch.
    pub fn evaluate(&self, candidate: Map<String, Value>) -> Result<EvaluationRecord, PipelineError> {
        let inputs = self.scoring_inputs(&candidate)?;

        let answer_correctness = self.check_answer(&inputs)?;
        if !answer_correctness.is_correct {
            return Ok(EvaluationRecord::new(
                candidate,
                answer_correctness,
                FactualConsistencyEvaluation {
                    factual_consistency_score: 0.0,
                    explanation: INCORRECT_ANSWER_EXPLANATION.to_string(),
                },
                CoreInferenceEvaluation {
                    sanitized_gold_reasoning: None,
                    sanitized_generated_reasoning: None,
                    core_inference_score: 0.0,
                    explanation: Some(INCORRECT_ANSWER_EXPLANATION.to_string()),
                },
            ));
        }

        let factual = self.score_factual_consistency(&inputs)?;
        let core_inference = self.score_core_inference(&inputs)?;

        Ok(EvaluationRecord::new(
            candidate,
            answer_correctness,
            factual,
            core_inference,
        ))
    }

    fn scoring_inputs(&self, candidate: &Map<String, Value>) -> Result<ScoringInputs, PipelineError> {
        let correct_key = text_field(candidate, "correct_answer_key");
        let correct_answer = correct_key.as_deref().and_then(|key| {
            candidate
                .get("options")
                .and_then(|options| options.get(key))
                .and_then(non_empty_text)
        });
        let generated_answer = text_field(candidate, &self.settings.answer_field);
        let gold_reasoning = text_field(candidate, "gold_reasoning");
        let generated_reasoning = text_field(candidate, &self.settings.reason_field);

        match (correct_answer, generated_answer, gold_reasoning, generated_reasoning) {
            (Some(correct_answer), Some(generated_answer), Some(gold_reasoning), Some(generated_reasoning)) => {
                Ok(ScoringInputs {
                    correct_answer,
                    generated_answer,
                    gold_reasoning,
                    generated_reasoning,
                })
            }
            (correct_answer, generated_answer, gold_reasoning, generated_reasoning) => {
                let mut missing = Vec::new();
                if correct_key.is_none() {
                    missing.push("correct_answer_key");
                } else if correct_answer.is_none() {
                    missing.push("options[correct_answer_key]");
                }
                if generated_answer.is_none() {
                    missing.push(self.settings.answer_field.as_str());
                }
                if gold_reasoning.is_none() {
                    missing.push("gold_reasoning");
                }
                if generated_reasoning.is_none() {
                    missing.push(self.settings.reason_field.as_str());
                }
                Err(PipelineError::IncompleteRecord(format!(
                    "missing fields: {}",
                    missing.join(", ")
                )))
            }
        }
    }

    fn check_answer(&self, inputs: &ScoringInputs) -> Result<AnswerCorrectness, PipelineError> {
        let reply = self.call_json(
            ANSWER_CHECK_SYSTEM_PROMPT,
            &answer_check_prompt(&inputs.generated_answer, &inputs.correct_answer),
        )?;

        Ok(AnswerCorrectness {
            is_correct: reply
                .get("is_correct")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    fn score_factual_consistency(
        &self,
        inputs: &ScoringInputs,
    ) -> Result<FactualConsistencyEvaluation, PipelineError> {
        let reply = self.call_json(
            FACTUAL_SYSTEM_PROMPT,
            &factual_prompt(&inputs.generated_reasoning, &inputs.gold_reasoning),
        )?;

        let score = reply
            .get("factual_consistency_score")
            .and_then(Value::as_f64)
            .filter(|score| score.is_finite())
            .ok_or_else(|| {
                PipelineError::Format("factual_consistency_score is missing or not a number".to_string())
            })?;

        Ok(FactualConsistencyEvaluation {
            factual_consistency_score: score.clamp(0.0, 1.0),
            explanation: reply
                .get("explanation")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }

    fn score_core_inference(
        &self,
        inputs: &ScoringInputs,
    ) -> Result<CoreInferenceEvaluation, PipelineError> {
        let sanitized_gold = self.sanitize(&inputs.gold_reasoning)?;
        let sanitized_generated = self.sanitize(&inputs.generated_reasoning)?;
        let probabilities = self.scorer.score(&sanitized_gold, &sanitized_generated);

        Ok(CoreInferenceEvaluation {
            sanitized_gold_reasoning: Some(sanitized_gold),
            sanitized_generated_reasoning: Some(sanitized_generated),
            core_inference_score: probabilities.entailment,
            explanation: None,
        })
    }

    fn sanitize(&self, reasoning: &str) -> Result<String, PipelineError> {
        let reply = self.call_json(SANITIZER_SYSTEM_PROMPT, &sanitizer_prompt(reasoning))?;
        Ok(reply
            .get("sanitized_reasoning")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// One structured-output call followed by the politeness pause.
    fn call_json(&self, system_prompt: &str, user_prompt: &str) -> Result<Map<String, Value>, PipelineError> {
        let request = CompletionRequest {
            model: &self.settings.model,
            system_prompt,
            user_prompt,
            temperature: self.settings.temperature,
            json_response: true,
            max_tokens: None,
        };
        let outcome = self.client.complete(&request);
        self.sleeper.sleep(self.settings.sleep_between);

        let normalized = self.normalizer.normalize(&outcome?);
        match serde_json::from_str::<Value>(&normalized) {
            Ok(Value::Object(reply)) => Ok(reply),
            Ok(_) => Err(PipelineError::Format("expected a JSON object reply".to_string())),
            Err(err) => Err(PipelineError::Format(format!("reply is not valid JSON: {err}"))),
        }
    }
}

fn text_field(record: &Map<String, Value>, key: &str) -> Option<String> {
    record.get(key).and_then(non_empty_text)
}

fn non_empty_text(value: &Value) -> Option<String> {
    identity_string(value).filter(|text| !text.trim().is_empty())
}
