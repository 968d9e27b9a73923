use std::fs;
use std::path::Path;

use clap::Parser;
use serde_json::{Value, json};
use tempfile::tempdir;

use super::*;
use crate::cli::{Cli, Commands};
use crate::client::testing::{RecordingSleeper, ScriptedClient, rate_limited};
use crate::enumerate::SYNC_STATUS_LABEL;
use crate::error::ServiceError;
use crate::ledger::read_records;

fn item(question: &str) -> Value {
    json!({
        "question": question,
        "options": {"A": "a drum", "B": "a violin", "C": "a flute", "D": "a tuba"},
        "correct_answer_key": "B",
        "gold_reasoning": "The bow moves across the strings as a sustained tone is heard.",
        "video_id": "placeholder_id",
        "category": "made_up"
    })
}

fn two_items_fenced() -> String {
    let body = serde_json::to_string_pretty(&json!([item("Why?"), item("What next?")]))
        .expect("serialize");
    // Trailing comma before the closing bracket, as models often emit.
    let with_comma = format!("{},\n]", body.trim_end_matches(']').trim_end());
    format!("```json\n{with_comma}\n```")
}

fn write(path: &Path, text: &str) {
    fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
    fs::write(path, text).expect("write fixture");
}

fn causal_clip(root: &Path, id: &str, audio: Option<&str>) {
    write(&root.join("transcripts").join(format!("{id}.txt")), "tighten the strap so it holds");
    write(&root.join("visual_captions").join(format!("{id}.txt")), "a person pulls a strap");
    if let Some(audio) = audio {
        write(&root.join("audio_captions").join(format!("{id}.txt")), audio);
    }
}

fn settings_for(category: Category) -> GenerationSettings {
    let cli = Cli::parse_from(["avqa", "generate", "--category", category.as_str()]);
    let Commands::Generate(args) = cli.command else {
        panic!("expected generate args");
    };
    run::resolve_settings(&args, &profile_for(category)).expect("settings")
}

struct Harness {
    client: ScriptedClient,
    sleeper: RecordingSleeper,
}

impl Harness {
    fn new() -> Self {
        Self {
            client: ScriptedClient::new(),
            sleeper: RecordingSleeper::default(),
        }
    }

    fn run(
        &self,
        category: Category,
        data_dir: &Path,
        ledger: &Path,
        resume: bool,
    ) -> RunCounters {
        let profile = profile_for(category);
        let sources = discover(&profile.layout, data_dir).expect("discover");
        let completed = if resume {
            load_completed_ids(ledger, GENERATION_IDENTITY_FIELD).expect("completed ids")
        } else {
            HashSet::new()
        };

        let mut writer = LedgerWriter::open_append(ledger).expect("open ledger");
        let mut counters = RunCounters::default();
        let mut pipeline = GenerationPipeline::new(
            &self.client,
            &self.sleeper,
            settings_for(category),
            StdRng::seed_from_u64(7),
        )
        .expect("pipeline");
        pipeline
            .run(sources, &completed, &mut writer, &mut counters)
            .expect("run");
        counters
    }
}

#[test]
fn profiles_carry_category_defaults() {
    let tempo = profile_for(Category::TempoAvSyncAnalysis);
    assert_eq!(tempo.multiplicity, 1);
    assert_eq!(tempo.max_retries, 3);
    assert_eq!(tempo.shape, ResponseShape::Object);
    assert!(tempo.json_response && tempo.shuffle_options);
    assert_eq!(tempo.max_tokens, Some(800));
    assert_eq!(tempo.timeout_secs, 120);

    let pitch = profile_for(Category::PitchTimbreReasoning);
    assert_eq!(pitch.multiplicity, 3);
    assert_eq!(pitch.max_retries, 5);

    let distractions = profile_for(Category::ImplicitDistractions);
    assert_eq!(distractions.temperature, 0.4);
    assert_eq!(distractions.sleep_between_secs, 1.5);
}

#[test]
fn cli_overrides_replace_profile_defaults() {
    let cli = Cli::parse_from([
        "avqa",
        "generate",
        "--category",
        "psp",
        "--temperature",
        "0.9",
        "--multiplicity",
        "3",
        "--sleep-between",
        "0",
    ]);
    let Commands::Generate(args) = cli.command else {
        panic!("expected generate args");
    };

    let settings = run::resolve_settings(&args, &profile_for(args.category)).expect("settings");
    assert_eq!(settings.category, "performer_skill_profiling");
    assert_eq!(settings.temperature, 0.9);
    assert_eq!(settings.multiplicity, 3);
    assert!(settings.sleep_between.is_zero());
}

#[test]
fn single_object_profile_rejects_larger_multiplicity() {
    let cli = Cli::parse_from(["avqa", "generate", "--category", "tsa", "--multiplicity", "2"]);
    let Commands::Generate(args) = cli.command else {
        panic!("expected generate args");
    };
    assert!(run::resolve_settings(&args, &profile_for(args.category)).is_err());
}

#[test]
fn renderer_reports_unresolved_placeholders() {
    let renderer = TemplateRenderer::new().expect("renderer");
    let mut unit = WorkUnit::new("clip001");
    unit.fields.insert("visual".to_string(), "a harp".to_string());

    let rendered = renderer
        .render("{video_id}: {visual} x{question_count}", &unit, 2)
        .expect("all fields present");
    assert_eq!(rendered, "clip001: a harp x2");

    let err = renderer
        .render("{visual} / {audio}", &unit, 2)
        .expect_err("audio missing");
    assert_eq!(err.kind(), "missing_input");
    assert!(err.to_string().contains("audio"), "{err}");
}

#[test]
fn generated_records_are_stamped_and_appended() {
    let dir = tempdir().expect("tempdir");
    let data = dir.path().join("data");
    let ledger = dir.path().join("questions/qa_pairs.jsonl");
    causal_clip(&data, "clip001", Some("a buckle clicks"));

    let harness = Harness::new();
    harness.client.push_ok(two_items_fenced());
    let counters = harness.run(Category::CausalReasoning, &data, &ledger, true);

    assert_eq!(counters.succeeded, 1);
    assert_eq!(counters.records_written, 2);

    let scan = read_records(&ledger).expect("ledger");
    assert_eq!(scan.records.len(), 2);
    for record in &scan.records {
        assert_eq!(record["video_id"], json!("clip001"));
        assert_eq!(record["category"], json!("causal_reasoning"));
    }

    let calls = harness.client.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].user_prompt.contains("a buckle clicks"));
    assert!(calls[0].user_prompt.contains("Generate 2 distinct"));
    assert!(!calls[0].json_response);
    assert_eq!(harness.sleeper.delays(), vec![Duration::from_secs(1)]);
}

#[test]
fn resumed_run_makes_no_calls_for_completed_units() {
    let dir = tempdir().expect("tempdir");
    let data = dir.path().join("data");
    let ledger = dir.path().join("qa_pairs.jsonl");
    causal_clip(&data, "clip001", Some("a buckle clicks"));
    causal_clip(&data, "clip002", Some("wind noise"));

    let first = Harness::new();
    first.client.push_ok(two_items_fenced()).push_ok(two_items_fenced());
    first.run(Category::CausalReasoning, &data, &ledger, true);
    assert_eq!(first.client.call_count(), 2);

    let second = Harness::new();
    let counters = second.run(Category::CausalReasoning, &data, &ledger, true);

    assert_eq!(second.client.call_count(), 0);
    assert_eq!(counters.already_completed, 2);
    assert_eq!(counters.attempted, 0);
    assert_eq!(read_records(&ledger).expect("ledger").records.len(), 4);
}

#[test]
fn missing_audio_caption_unit_is_skipped_without_a_call() {
    let dir = tempdir().expect("tempdir");
    let data = dir.path().join("data");
    let ledger = dir.path().join("qa_pairs.jsonl");
    causal_clip(&data, "clip001", None);
    causal_clip(&data, "clip002", Some("wind noise"));

    let harness = Harness::new();
    harness.client.push_ok(two_items_fenced());
    let counters = harness.run(Category::CausalReasoning, &data, &ledger, true);

    assert_eq!(harness.client.call_count(), 1);
    assert_eq!(counters.skipped.get("missing_input"), Some(&1));

    let ids = load_completed_ids(&ledger, GENERATION_IDENTITY_FIELD).expect("ids");
    assert!(!ids.contains("clip001"));
    assert!(ids.contains("clip002"));
}

#[test]
fn failures_skip_the_unit_and_the_batch_continues() {
    let dir = tempdir().expect("tempdir");
    let data = dir.path().join("data");
    let ledger = dir.path().join("qa_pairs.jsonl");
    for id in ["clip001", "clip002", "clip003", "clip004"] {
        causal_clip(&data, id, Some("a buckle clicks"));
    }

    let harness = Harness::new();
    harness
        .client
        .push_err(ServiceError::Permanent {
            status: Some(401),
            message: "bad key".to_string(),
        })
        .push_ok("this is not json")
        .push_ok(json!([item("only one")]).to_string())
        .push_ok(two_items_fenced());
    let counters = harness.run(Category::CausalReasoning, &data, &ledger, true);

    assert_eq!(counters.attempted, 4);
    assert_eq!(counters.succeeded, 1);
    assert_eq!(counters.skipped.get("permanent_service"), Some(&1));
    assert_eq!(counters.skipped.get("format"), Some(&2));

    let scan = read_records(&ledger).expect("ledger");
    assert_eq!(scan.records.len(), 2);
    assert!(scan.records.iter().all(|record| record["video_id"] == json!("clip004")));
}

#[test]
fn one_invalid_item_rejects_the_whole_unit() {
    let dir = tempdir().expect("tempdir");
    let data = dir.path().join("data");
    let ledger = dir.path().join("qa_pairs.jsonl");
    causal_clip(&data, "clip001", Some("a buckle clicks"));

    let mut broken = item("Which option?");
    broken["options"]
        .as_object_mut()
        .expect("options")
        .remove("D");

    let harness = Harness::new();
    harness
        .client
        .push_ok(json!([item("Why?"), broken]).to_string());
    let counters = harness.run(Category::CausalReasoning, &data, &ledger, true);

    assert_eq!(counters.skipped.get("schema"), Some(&1));
    assert!(!ledger.exists() || read_records(&ledger).expect("ledger").records.is_empty());
}

#[test]
fn exhausted_rate_limit_retries_skip_the_unit() {
    let dir = tempdir().expect("tempdir");
    let data = dir.path().join("data");
    let ledger = dir.path().join("qa_pairs.jsonl");
    causal_clip(&data, "clip001", Some("a buckle clicks"));

    let inner = ScriptedClient::new();
    for _ in 0..3 {
        inner.push_err(rate_limited());
    }
    let sleeper = RecordingSleeper::default();
    let client = RetryingClient::new(&inner, RetryPolicy::new(3), &sleeper);

    let profile = profile_for(Category::CausalReasoning);
    let sources = discover(&profile.layout, &data).expect("discover");
    let mut writer = LedgerWriter::open_append(&ledger).expect("open ledger");
    let mut counters = RunCounters::default();
    let mut pipeline = GenerationPipeline::new(
        &client,
        &sleeper,
        settings_for(Category::CausalReasoning),
        StdRng::seed_from_u64(1),
    )
    .expect("pipeline");
    pipeline
        .run(sources, &HashSet::new(), &mut writer, &mut counters)
        .expect("run completes");

    assert_eq!(inner.call_count(), 3);
    assert_eq!(counters.skipped.get("transient_service"), Some(&1));
    // Two backoff delays, then the politeness pause.
    assert_eq!(sleeper.delays().len(), 3);
}

#[test]
fn tempo_sync_accepts_a_single_object_and_stamps_sync_status() {
    let dir = tempdir().expect("tempdir");
    let data = dir.path().join("tempo_sync_data");
    let ledger = dir.path().join("qa_pairs.jsonl");
    write(&data.join("misaligned_clips/visual_captions/beat_01.txt"), "sticks hit a snare");
    write(&data.join("misaligned_clips/audio_captions/beat_01.txt"), "snare hits trail the motion");

    let mut response = item("Do the strikes match the sound?");
    response["sync_status"] = json!("Aligned");

    let harness = Harness::new();
    harness.client.push_ok(response.to_string());
    let counters = harness.run(Category::TempoAvSyncAnalysis, &data, &ledger, true);
    assert_eq!(counters.records_written, 1);

    let calls = harness.client.calls();
    assert!(calls[0].json_response);
    assert!(calls[0].user_prompt.contains("Misaligned"));

    let record = &read_records(&ledger).expect("ledger").records[0];
    assert_eq!(record[SYNC_STATUS_LABEL], json!("Misaligned"));
    assert_eq!(record["category"], json!("tempo_av_sync_analysis"));

    let key = record["correct_answer_key"].as_str().expect("key");
    assert_eq!(record["options"][key], json!("a violin"));
    assert_eq!(harness.sleeper.delays(), vec![Duration::from_millis(200)]);
}

#[test]
fn tempo_sync_rejects_a_list_response() {
    let dir = tempdir().expect("tempdir");
    let data = dir.path().join("tempo_sync_data");
    let ledger = dir.path().join("qa_pairs.jsonl");
    write(&data.join("aligned_clips/visual_captions/beat_02.txt"), "a hand claps");
    write(&data.join("aligned_clips/audio_captions/beat_02.txt"), "claps on the beat");

    let harness = Harness::new();
    harness.client.push_ok(json!([item("Aligned?")]).to_string());
    let counters = harness.run(Category::TempoAvSyncAnalysis, &data, &ledger, true);

    assert_eq!(counters.skipped.get("format"), Some(&1));
    assert_eq!(counters.records_written, 0);
}

#[test]
fn unit_multiplicity_overrides_the_run_default() {
    let dir = tempdir().expect("tempdir");
    let data = dir.path().join("data");
    causal_clip(&data, "clip001", Some("a buckle clicks"));

    let profile = profile_for(Category::CausalReasoning);
    let mut sources = discover(&profile.layout, &data).expect("discover");
    sources[0].multiplicity = Some(3);
    let source = &sources[0];

    let client = ScriptedClient::new();
    client
        .push_ok(two_items_fenced())
        .push_ok(json!([item("Why?"), item("What next?"), item("What caused it?")]).to_string());
    let sleeper = RecordingSleeper::default();
    let settings = settings_for(Category::CausalReasoning);
    assert_eq!(settings.multiplicity, 2);
    let mut pipeline = GenerationPipeline::new(&client, &sleeper, settings, StdRng::seed_from_u64(3))
        .expect("pipeline");

    let err = pipeline
        .process_unit(source)
        .expect_err("default count no longer satisfies the unit");
    assert_eq!(err.kind(), "format");

    let items = pipeline.process_unit(source).expect("overridden count accepted");
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|item| item.video_id == "clip001"));

    let calls = client.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].user_prompt.contains("Generate 3 distinct"));
}
