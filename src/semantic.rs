use std::collections::HashSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL_ID: &str = "nli-local-hash-v1";
pub const DEFAULT_MODEL_NAME: &str = "lexical-entailment-hashed-ngrams";
pub const DEFAULT_EMBEDDING_DIM: usize = 384;
pub const DEFAULT_BACKEND: &str = "local-hash-v1";

const NEGATION_WORDS: [&str; 17] = [
    "no", "not", "never", "none", "nobody", "nothing", "neither", "nor", "cannot", "cant",
    "dont", "doesnt", "isnt", "arent", "wasnt", "werent", "without",
];

const STOP_WORDS: [&str; 16] = [
    "a", "an", "the", "is", "are", "was", "were", "of", "to", "in", "on", "and", "or", "its",
    "it", "be",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerModelConfig {
    pub model_id: String,
    pub model_name: String,
    pub dimensions: usize,
    pub backend: String,
}

pub fn resolve_model_config(model_id: &str) -> ScorerModelConfig {
    let trimmed = model_id.trim();
    let resolved_id = if trimmed.is_empty() {
        DEFAULT_MODEL_ID
    } else {
        trimmed
    };

    let model_name = if resolved_id == DEFAULT_MODEL_ID {
        DEFAULT_MODEL_NAME
    } else {
        resolved_id
    };

    ScorerModelConfig {
        model_id: resolved_id.to_string(),
        model_name: model_name.to_string(),
        dimensions: DEFAULT_EMBEDDING_DIM,
        backend: DEFAULT_BACKEND.to_string(),
    }
}

/// Class probabilities for a (premise, hypothesis) pair; they sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub contradiction: f64,
    pub neutral: f64,
    pub entailment: f64,
}

impl ClassProbabilities {
    fn from_logits(contradiction: f64, neutral: f64, entailment: f64) -> Self {
        let peak = contradiction.max(neutral).max(entailment);
        let c = (contradiction - peak).exp();
        let n = (neutral - peak).exp();
        let e = (entailment - peak).exp();
        let total = c + n + e;

        Self {
            contradiction: c / total,
            neutral: n / total,
            entailment: e / total,
        }
    }

    fn neutral() -> Self {
        Self {
            contradiction: 0.0,
            neutral: 1.0,
            entailment: 0.0,
        }
    }
}

/// Local, synchronous pair classifier. Pure in its two string inputs.
pub trait EntailmentScorer {
    fn score(&self, premise: &str, hypothesis: &str) -> ClassProbabilities;
}

pub struct LocalNliScorer {
    config: ScorerModelConfig,
}

impl LocalNliScorer {
    pub fn load(model_id: &str) -> Self {
        Self {
            config: resolve_model_config(model_id),
        }
    }

    pub fn config(&self) -> &ScorerModelConfig {
        &self.config
    }
}

impl EntailmentScorer for LocalNliScorer {
    fn score(&self, premise: &str, hypothesis: &str) -> ClassProbabilities {
        if words(premise).is_empty() && words(hypothesis).is_empty() {
            return ClassProbabilities::neutral();
        }

        let premise_vector = embed_text_local(premise, self.config.dimensions);
        let hypothesis_vector = embed_text_local(hypothesis, self.config.dimensions);
        let similarity = cosine_similarity(&premise_vector, &hypothesis_vector).max(0.0);

        let premise_words = content_words(premise);
        let hypothesis_words = content_words(hypothesis);
        let coverage = if hypothesis_words.is_empty() {
            similarity
        } else {
            let covered = hypothesis_words
                .iter()
                .filter(|word| premise_words.contains(*word))
                .count();
            covered as f64 / hypothesis_words.len() as f64
        };

        let overlap = 0.5 * similarity + 0.5 * coverage;
        let polarity_mismatch = is_negated(premise) != is_negated(hypothesis);

        let entailment = 4.0 * overlap - 1.0 - if polarity_mismatch { 3.0 } else { 0.0 };
        let contradiction = if polarity_mismatch {
            3.0 * overlap
        } else {
            -1.0 - overlap
        };

        ClassProbabilities::from_logits(contradiction, 0.5, entailment)
    }
}

pub fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}

pub fn embed_text_local(payload: &str, dimensions: usize) -> Vec<f32> {
    let dims = dimensions.max(8);
    let mut vector = vec![0_f32; dims];
    let mut tokens = tokenize_payload(payload);

    if tokens.is_empty() {
        return vector;
    }

    for token in tokens.drain(..) {
        let hash = stable_hash(&token);
        let index = (hash as usize) % dims;
        let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        let weight = 1.0 + (((hash >> 48) & 0xFF) as f32 / 255.0);
        vector[index] += sign * weight;
    }

    normalize_vector(&mut vector);
    vector
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }

    left.iter()
        .zip(right.iter())
        .map(|(left_value, right_value)| f64::from(*left_value) * f64::from(*right_value))
        .sum::<f64>()
}

fn stable_hash(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn words(payload: &str) -> Vec<String> {
    normalize_whitespace(payload)
        .split(' ')
        .map(|value| {
            value
                .chars()
                .filter(|character| character.is_ascii_alphanumeric())
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|value| !value.is_empty())
        .collect()
}

fn content_words(payload: &str) -> HashSet<String> {
    words(payload)
        .into_iter()
        .filter(|word| !STOP_WORDS.contains(&word.as_str()))
        .filter(|word| !NEGATION_WORDS.contains(&word.as_str()))
        .collect()
}

fn is_negated(payload: &str) -> bool {
    words(payload)
        .iter()
        .filter(|word| NEGATION_WORDS.contains(&word.as_str()))
        .count()
        % 2
        == 1
}

fn tokenize_payload(payload: &str) -> Vec<String> {
    let words = words(payload);
    if words.is_empty() {
        return Vec::new();
    }

    let mut features = Vec::<String>::with_capacity(words.len() * 2);
    for (index, word) in words.iter().enumerate() {
        features.push(format!("w:{word}"));
        if let Some(next) = words.get(index + 1) {
            features.push(format!("b:{word}_{next}"));
        }
    }
    features
}

fn normalize_vector(values: &mut [f32]) {
    let squared_norm = values
        .iter()
        .map(|value| f64::from(*value) * f64::from(*value))
        .sum::<f64>();

    if squared_norm <= 0.0 {
        return;
    }

    let norm = squared_norm.sqrt() as f32;
    if norm == 0.0 {
        return;
    }

    for value in values {
        *value /= norm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> LocalNliScorer {
        LocalNliScorer::load("")
    }

    fn assert_distribution(probabilities: ClassProbabilities) {
        let total =
            probabilities.contradiction + probabilities.neutral + probabilities.entailment;
        assert!((total - 1.0).abs() < 1e-9, "probabilities sum to {total}");
    }

    #[test]
    fn empty_model_id_resolves_to_default_backend() {
        let config = resolve_model_config("  ");
        assert_eq!(config.model_id, DEFAULT_MODEL_ID);
        assert_eq!(config.backend, DEFAULT_BACKEND);
        assert_eq!(config.dimensions, DEFAULT_EMBEDDING_DIM);
    }

    #[test]
    fn identical_claims_are_entailed() {
        let claim = "The subject is playing a specific instrument.";
        let probabilities = scorer().score(claim, claim);

        assert_distribution(probabilities);
        assert!(probabilities.entailment > 0.8, "{probabilities:?}");
    }

    #[test]
    fn unrelated_claims_are_not_entailed() {
        let probabilities = scorer().score(
            "The setting is described as dimly lit.",
            "A performer's attire carries a pattern.",
        );

        assert_distribution(probabilities);
        assert!(probabilities.entailment < 0.3, "{probabilities:?}");
    }

    #[test]
    fn negated_claim_leans_to_contradiction() {
        let scorer = scorer();
        let affirmed = scorer.score(
            "The subject is playing an instrument.",
            "The subject is playing an instrument.",
        );
        let negated = scorer.score(
            "The subject is playing an instrument.",
            "The subject is not playing an instrument.",
        );

        assert_distribution(negated);
        assert!(negated.contradiction > negated.entailment, "{negated:?}");
        assert!(negated.entailment < affirmed.entailment);
    }

    #[test]
    fn two_empty_claims_are_neutral() {
        let probabilities = scorer().score("", "  ...  ");

        assert_distribution(probabilities);
        assert_eq!(probabilities.neutral, 1.0);
        assert_eq!(probabilities.entailment, 0.0);
    }

    #[test]
    fn scoring_is_deterministic() {
        let scorer = scorer();
        let first = scorer.score("the cause is spoken", "the effect is seen");
        let second = scorer.score("the cause is spoken", "the effect is seen");
        assert_eq!(first, second);
    }
}
