use super::*;

pub fn run(args: EvaluateArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    if !args.input.is_file() {
        bail!("input ledger not found: {}", args.input.display());
    }
    if !args.sleep_between.is_finite() || args.sleep_between < 0.0 {
        bail!("--sleep-between must be a non-negative number of seconds");
    }
    let summary_path = args
        .manifest_path
        .clone()
        .unwrap_or_else(|| summary_path_for(&args.output));

    info!(
        input = %args.input.display(),
        output = %args.output.display(),
        model_key = %args.model_key,
        run_id = %run_id,
        "starting evaluate"
    );

    let input = read_records(&args.input)?;
    if input.malformed_lines > 0 {
        warn!(
            path = %args.input.display(),
            malformed_lines = input.malformed_lines,
            "ignored malformed input lines"
        );
    }

    let (completed, mut writer) = if args.no_resume {
        (HashSet::new(), LedgerWriter::open_truncate(&args.output)?)
    } else {
        (
            load_completed_ids(&args.output, EVALUATION_IDENTITY_FIELD)?,
            LedgerWriter::open_append(&args.output)?,
        )
    };

    let scorer = LocalNliScorer::load(&args.scorer_model);
    info!(
        model_id = %scorer.config().model_id,
        backend = %scorer.config().backend,
        "loaded semantic scorer"
    );

    let http = build_service_client(&args.service, Duration::from_secs(args.timeout_secs))?;
    let sleeper = ThreadSleeper;
    let client = RetryingClient::new(&http, RetryPolicy::new(args.max_retries), &sleeper);
    let settings = EvaluationSettings::for_model_key(
        &args.model_key,
        &args.llm_model,
        args.temperature,
        Duration::from_secs_f64(args.sleep_between),
    );

    let mut counters = RunCounters::default();
    let pipeline = EvaluationPipeline::new(&client, &sleeper, &scorer, settings)?;
    pipeline.run(input.records, &completed, &mut writer, &mut counters)?;

    let output = read_records(&args.output)?;
    let aggregates = AggregateScores::from_records(&output.records);
    let percentages = aggregates.percentages();

    info!(
        records = aggregates.record_count,
        answer_correctness = %percentages.answer_correctness,
        factual_consistency = %percentages.factual_consistency,
        core_inference = %percentages.core_inference,
        "evaluation aggregates"
    );

    let manifest = EvaluationRunManifest {
        manifest_version: 1,
        run_id,
        started_at,
        updated_at: now_utc_string(),
        status: "completed".to_string(),
        input_path: args.input.display().to_string(),
        output_path: args.output.display().to_string(),
        model_key: args.model_key.clone(),
        llm_model: args.llm_model.clone(),
        temperature: args.temperature,
        max_retries: args.max_retries,
        sleep_between_ms: (args.sleep_between * 1000.0).round() as u64,
        scorer_model: scorer.config().model_id.clone(),
        resume: !args.no_resume,
        input_malformed_lines: input.malformed_lines,
        counts: counters,
        aggregates,
        percentages,
    };
    write_json_pretty(&summary_path, &manifest)?;

    info!(
        succeeded = manifest.counts.succeeded,
        skipped = manifest.counts.skipped_total(),
        already_completed = manifest.counts.already_completed,
        summary = %summary_path.display(),
        "evaluate completed"
    );

    Ok(())
}

/// `<output>.summary.json`, next to the output ledger.
pub fn summary_path_for(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".summary.json");
    PathBuf::from(name)
}
