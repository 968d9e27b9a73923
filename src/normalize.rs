//! Repair and validation of generative-model JSON output.
//!
//! Repair rules, applied until the text stops changing:
//! 1. surrounding whitespace is trimmed;
//! 2. Markdown code-fence markers at line boundaries (```` ``` ```` or
//!    ```` ```json ````) are removed;
//! 3. a comma followed only by whitespace and a closing `}` or `]` is removed.
//!
//! Applying the rules to a fixpoint makes `normalize` idempotent.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use rand::Rng;
use rand::seq::SliceRandom;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::PipelineError;
use crate::model::BenchmarkItem;

pub const OPTION_COUNT: usize = 4;

pub const CORE_ITEM_KEYS: [&str; 4] = ["question", "options", "correct_answer_key", "gold_reasoning"];

pub struct ResponseNormalizer {
    fence: Regex,
    trailing_comma: Regex,
}

impl ResponseNormalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            fence: Regex::new(r"(?m)^[ \t]*```(?i:json)?[ \t]*\r?\n?|\r?\n?[ \t]*```[ \t]*$")
                .context("failed to compile code-fence regex")?,
            trailing_comma: Regex::new(r",(\s*[}\]])")
                .context("failed to compile trailing-comma regex")?,
        })
    }

    pub fn normalize(&self, raw: &str) -> String {
        let mut current = raw.trim().to_string();
        loop {
            let next = self.repair_once(&current);
            if next == current {
                return current;
            }
            current = next;
        }
    }

    fn repair_once(&self, text: &str) -> String {
        let unfenced = self.fence.replace_all(text.trim(), "");
        let uncomma = self.trailing_comma.replace_all(&unfenced, "$1");
        uncomma.trim().to_string()
    }
}

/// Top-level JSON shape the model was asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    List,
    /// A single object, as forced by structured-output mode; treated as a one-element list.
    Object,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSchema {
    pub required_keys: Vec<String>,
    pub require_four_options: bool,
}

impl ItemSchema {
    pub fn new(required_keys: &[&str], require_four_options: bool) -> Self {
        Self {
            required_keys: required_keys.iter().map(|key| key.to_string()).collect(),
            require_four_options,
        }
    }

    pub fn core() -> Self {
        Self::new(&CORE_ITEM_KEYS, true)
    }
}

/// Pipeline-controlled fields written over whatever the model produced.
#[derive(Debug, Clone, Copy)]
pub struct Stamp<'a> {
    pub video_id: &'a str,
    pub category: &'a str,
    pub labels: &'a BTreeMap<String, String>,
}

pub fn parse_and_validate(
    normalized_text: &str,
    expected_item_count: usize,
    shape: ResponseShape,
    schema: &ItemSchema,
    stamp: Stamp<'_>,
) -> Result<Vec<BenchmarkItem>, PipelineError> {
    let parsed = serde_json::from_str::<Value>(normalized_text)
        .map_err(|err| PipelineError::Format(format!("response is not valid JSON: {err}")))?;

    let elements = match (shape, parsed) {
        (ResponseShape::List, Value::Array(elements)) => elements,
        (ResponseShape::Object, Value::Object(object)) => vec![Value::Object(object)],
        (ResponseShape::List, other) => {
            return Err(PipelineError::Format(format!(
                "expected a JSON list, got {}",
                json_kind(&other)
            )));
        }
        (ResponseShape::Object, other) => {
            return Err(PipelineError::Format(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            )));
        }
    };

    if elements.len() != expected_item_count {
        return Err(PipelineError::Format(format!(
            "expected {expected_item_count} items, got {}",
            elements.len()
        )));
    }

    elements
        .into_iter()
        .enumerate()
        .map(|(index, element)| validate_item(index, element, schema, stamp))
        .collect()
}

fn validate_item(
    index: usize,
    element: Value,
    schema: &ItemSchema,
    stamp: Stamp<'_>,
) -> Result<BenchmarkItem, PipelineError> {
    let Value::Object(mut object) = element else {
        return Err(PipelineError::Schema(format!(
            "item {index} is {}, not an object",
            json_kind(&element)
        )));
    };

    let missing = schema
        .required_keys
        .iter()
        .filter(|key| !object.contains_key(key.as_str()))
        .map(String::as_str)
        .collect::<Vec<&str>>();
    if !missing.is_empty() {
        return Err(PipelineError::Schema(format!(
            "item {index} missing keys: {}",
            missing.join(", ")
        )));
    }

    let options = take_options(index, &mut object)?;
    if schema.require_four_options && options.len() != OPTION_COUNT {
        return Err(PipelineError::Schema(format!(
            "item {index} has {} options, expected {OPTION_COUNT}",
            options.len()
        )));
    }

    let correct_answer_key = take_string(index, &mut object, "correct_answer_key")?;
    if !options.contains_key(&correct_answer_key) {
        return Err(PipelineError::Schema(format!(
            "item {index} correct_answer_key {correct_answer_key:?} is not an option label"
        )));
    }

    let question = take_string(index, &mut object, "question")?;
    let gold_reasoning = take_string(index, &mut object, "gold_reasoning")?;

    object.remove("video_id");
    object.remove("category");
    for (name, value) in stamp.labels {
        object.insert(name.clone(), Value::String(value.clone()));
    }

    Ok(BenchmarkItem {
        question,
        options,
        correct_answer_key,
        gold_reasoning,
        video_id: stamp.video_id.to_string(),
        category: stamp.category.to_string(),
        extra: object,
    })
}

fn take_options(
    index: usize,
    object: &mut Map<String, Value>,
) -> Result<BTreeMap<String, String>, PipelineError> {
    let Some(Value::Object(raw_options)) = object.remove("options") else {
        return Err(PipelineError::Schema(format!(
            "item {index} options must be an object"
        )));
    };

    raw_options
        .into_iter()
        .map(|(label, text)| match text {
            Value::String(text) => Ok((label, text)),
            other => Err(PipelineError::Schema(format!(
                "item {index} option {label:?} is {}, not a string",
                json_kind(&other)
            ))),
        })
        .collect()
}

fn take_string(
    index: usize,
    object: &mut Map<String, Value>,
    key: &str,
) -> Result<String, PipelineError> {
    match object.remove(key) {
        Some(Value::String(text)) => Ok(text),
        Some(other) => Err(PipelineError::Schema(format!(
            "item {index} field {key} is {}, not a string",
            json_kind(&other)
        ))),
        None => Err(PipelineError::Schema(format!(
            "item {index} missing keys: {key}"
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Permutes the options and relabels them `A`, `B`, ... keeping the correct text correct.
pub fn shuffle_options<R: Rng + ?Sized>(item: &mut BenchmarkItem, rng: &mut R) {
    let entries = std::mem::take(&mut item.options)
        .into_iter()
        .collect::<Vec<(String, String)>>();
    let correct_index = entries
        .iter()
        .position(|(label, _)| *label == item.correct_answer_key);

    let mut order = (0..entries.len()).collect::<Vec<usize>>();
    order.shuffle(rng);

    let mut relabelled = BTreeMap::new();
    for (position, original) in order.into_iter().enumerate() {
        let label = option_label(position);
        if Some(original) == correct_index {
            item.correct_answer_key = label.clone();
        }
        relabelled.insert(label, entries[original].1.clone());
    }
    item.options = relabelled;
}

fn option_label(position: usize) -> String {
    let offset = u8::try_from(position % 26).unwrap_or(0);
    char::from(b'A' + offset).to_string()
}
