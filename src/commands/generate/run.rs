use super::*;

pub fn run(args: GenerateArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let profile = profile_for(args.category);
    let settings = resolve_settings(&args, &profile)?;
    let max_retries = args.max_retries.unwrap_or(profile.max_retries);
    let timeout = Duration::from_secs(args.timeout_secs.unwrap_or(profile.timeout_secs));

    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(profile.data_dir));
    let ledger_path = args
        .ledger_path
        .clone()
        .unwrap_or_else(|| args.output_dir.join(DEFAULT_LEDGER_FILE));
    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        args.output_dir.join("manifests").join(format!(
            "generate_{}_{}.json",
            settings.category,
            utc_compact_string(started_ts)
        ))
    });

    info!(
        category = %settings.category,
        data_dir = %data_dir.display(),
        ledger = %ledger_path.display(),
        run_id = %run_id,
        "starting generate"
    );

    let sources = discover(&profile.layout, &data_dir)?;
    let completed = if args.no_resume {
        HashSet::new()
    } else {
        load_completed_ids(&ledger_path, GENERATION_IDENTITY_FIELD)?
    };

    let http = build_service_client(&args.service, timeout)?;
    let sleeper = ThreadSleeper;
    let client = RetryingClient::new(&http, RetryPolicy::new(max_retries), &sleeper);
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut writer = LedgerWriter::open_append(&ledger_path)?;
    let mut counters = RunCounters::default();
    let mut pipeline = GenerationPipeline::new(&client, &sleeper, settings, rng)?;
    pipeline.run(sources, &completed, &mut writer, &mut counters)?;

    let settings = pipeline.settings();
    let manifest = GenerationRunManifest {
        manifest_version: 1,
        run_id,
        category: settings.category.clone(),
        started_at,
        updated_at: now_utc_string(),
        status: "completed".to_string(),
        model: settings.model.clone(),
        temperature: settings.temperature,
        multiplicity: settings.multiplicity,
        max_retries,
        sleep_between_ms: settings.sleep_between.as_millis() as u64,
        resume: !args.no_resume,
        data_dir: data_dir.display().to_string(),
        ledger_path: ledger_path.display().to_string(),
        counts: counters,
    };
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        succeeded = manifest.counts.succeeded,
        skipped = manifest.counts.skipped_total(),
        records_written = manifest.counts.records_written,
        already_completed = manifest.counts.already_completed,
        ledger = %ledger_path.display(),
        manifest = %manifest_path.display(),
        "generate completed"
    );

    Ok(())
}

pub fn resolve_settings(args: &GenerateArgs, profile: &GenerationProfile) -> Result<GenerationSettings> {
    let multiplicity = args.multiplicity.unwrap_or(profile.multiplicity);
    if multiplicity == 0 {
        bail!("--multiplicity must be at least 1");
    }
    if profile.shape == ResponseShape::Object && multiplicity != 1 {
        bail!(
            "{} asks for a single JSON object; --multiplicity must be 1",
            profile.category.as_str()
        );
    }

    let sleep_between_secs = args.sleep_between.unwrap_or(profile.sleep_between_secs);
    if !sleep_between_secs.is_finite() || sleep_between_secs < 0.0 {
        bail!("--sleep-between must be a non-negative number of seconds");
    }

    Ok(GenerationSettings {
        category: profile.category.as_str().to_string(),
        model: args.model.clone(),
        temperature: args.temperature.unwrap_or(profile.temperature),
        multiplicity,
        sleep_between: Duration::from_secs_f64(sleep_between_secs),
        shape: profile.shape,
        json_response: profile.json_response,
        max_tokens: profile.max_tokens,
        shuffle_options: profile.shuffle_options,
        system_prompt: system_prompt_for(profile),
        user_template: profile.user_template.to_string(),
    })
}
