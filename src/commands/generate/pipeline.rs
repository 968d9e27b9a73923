use super::*;

/// Per-run knobs; every value starts from a profile and may be overridden from the CLI.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub category: String,
    pub model: String,
    pub temperature: f32,
    pub multiplicity: usize,
    pub sleep_between: Duration,
    pub shape: ResponseShape,
    pub json_response: bool,
    pub max_tokens: Option<u32>,
    pub shuffle_options: bool,
    pub system_prompt: String,
    pub user_template: String,
}

/// Drives units through fetch, normalize, validate and append; a failed unit is skipped.
pub struct GenerationPipeline<'a, R: Rng> {
    client: &'a dyn ModelClient,
    sleeper: &'a dyn Sleeper,
    normalizer: ResponseNormalizer,
    renderer: TemplateRenderer,
    schema: ItemSchema,
    settings: GenerationSettings,
    rng: R,
}

impl<'a, R: Rng> GenerationPipeline<'a, R> {
    pub fn new(
        client: &'a dyn ModelClient,
        sleeper: &'a dyn Sleeper,
        settings: GenerationSettings,
        rng: R,
    ) -> Result<Self> {
        Ok(Self {
            client,
            sleeper,
            normalizer: ResponseNormalizer::new()?,
            renderer: TemplateRenderer::new()?,
            schema: ItemSchema::core(),
            settings,
            rng,
        })
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Processes every pending source in order. Only ledger I/O aborts the run.
    pub fn run(
        &mut self,
        sources: Vec<UnitSource>,
        completed: &HashSet<String>,
        writer: &mut LedgerWriter,
        counters: &mut RunCounters,
    ) -> Result<()> {
        counters.discovered += sources.len();
        let pending = filter_pending(sources, completed).collect::<Vec<UnitSource>>();
        counters.already_completed += counters.discovered.saturating_sub(pending.len());

        info!(
            category = %self.settings.category,
            pending = pending.len(),
            already_completed = counters.already_completed,
            "starting generation"
        );

        for source in pending {
            counters.attempted += 1;

            match self.process_unit(&source) {
                Ok(items) => {
                    writer.append_batch(&items)?;
                    counters.succeeded += 1;
                    counters.records_written += items.len();
                    info!(video_id = %source.video_id, records = items.len(), "generated questions");
                    self.pause();
                }
                Err(err) => {
                    warn!(
                        video_id = %source.video_id,
                        error_kind = err.kind(),
                        error = %err,
                        "skipping unit"
                    );
                    counters.record_skip(err.kind());
                    if !matches!(err, PipelineError::MissingInput(_)) {
                        self.pause();
                    }
                }
            }
        }

        Ok(())
    }

    /// All-or-nothing: returns every expected record for the unit or an error.
    pub fn process_unit(&mut self, source: &UnitSource) -> Result<Vec<BenchmarkItem>, PipelineError> {
        let unit = source.load()?;
        let expected = unit.multiplicity.unwrap_or(self.settings.multiplicity);
        let user_prompt = self
            .renderer
            .render(&self.settings.user_template, &unit, expected)?;

        let request = CompletionRequest {
            model: &self.settings.model,
            system_prompt: &self.settings.system_prompt,
            user_prompt: &user_prompt,
            temperature: self.settings.temperature,
            json_response: self.settings.json_response,
            max_tokens: self.settings.max_tokens,
        };
        let raw = self.client.complete(&request)?;

        let normalized = self.normalizer.normalize(&raw);
        let stamp = Stamp {
            video_id: &unit.video_id,
            category: &self.settings.category,
            labels: &unit.labels,
        };
        let mut items = parse_and_validate(
            &normalized,
            expected,
            self.settings.shape,
            &self.schema,
            stamp,
        )?;

        if self.settings.shuffle_options {
            for item in &mut items {
                shuffle_options(item, &mut self.rng);
            }
        }

        Ok(items)
    }

    fn pause(&self) {
        self.sleeper.sleep(self.settings.sleep_between);
    }
}
