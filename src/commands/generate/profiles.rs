use super::*;

pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

const TRANSCRIPT_CHANNEL: CaptionChannel = CaptionChannel {
    field: "transcript",
    dir_name: "transcripts",
    allow_empty: true,
};
const VISUAL_CHANNEL: CaptionChannel = CaptionChannel {
    field: "visual",
    dir_name: "visual_captions",
    allow_empty: false,
};
const AUDIO_CHANNEL: CaptionChannel = CaptionChannel {
    field: "audio",
    dir_name: "audio_captions",
    allow_empty: false,
};

/// Configuration payload for one question category.
#[derive(Debug, Clone, Copy)]
pub struct GenerationProfile {
    pub category: Category,
    pub data_dir: &'static str,
    pub layout: InputLayout,
    pub multiplicity: usize,
    pub temperature: f32,
    pub max_retries: u32,
    pub sleep_between_secs: f64,
    pub shape: ResponseShape,
    pub json_response: bool,
    pub timeout_secs: u64,
    pub max_tokens: Option<u32>,
    pub shuffle_options: bool,
    pub system_prompt: &'static str,
    pub user_template: &'static str,
}

pub fn profile_for(category: Category) -> GenerationProfile {
    let base = GenerationProfile {
        category,
        data_dir: "",
        layout: InputLayout::CaptionSet {
            anchor: TRANSCRIPT_CHANNEL,
            companions: &[VISUAL_CHANNEL, AUDIO_CHANNEL],
        },
        multiplicity: 2,
        temperature: 0.5,
        max_retries: 5,
        sleep_between_secs: 1.0,
        shape: ResponseShape::List,
        json_response: false,
        timeout_secs: DEFAULT_TIMEOUT_SECS,
        max_tokens: None,
        shuffle_options: false,
        system_prompt: "",
        user_template: "",
    };

    match category {
        Category::CausalReasoning => GenerationProfile {
            data_dir: "causal_reasoning_data",
            system_prompt: CAUSAL_SYSTEM_PROMPT,
            user_template: CAPTION_SET_TEMPLATE,
            ..base
        },
        Category::Unanswerability => GenerationProfile {
            data_dir: "unanswerability_data",
            system_prompt: UNANSWERABLE_SYSTEM_PROMPT,
            user_template: CAPTION_SET_TEMPLATE,
            ..base
        },
        Category::PitchTimbreReasoning => GenerationProfile {
            data_dir: "pitch_timbre_data",
            layout: InputLayout::CaptionSet {
                anchor: VISUAL_CHANNEL,
                companions: &[AUDIO_CHANNEL],
            },
            multiplicity: 3,
            sleep_between_secs: 1.2,
            system_prompt: PITCH_TIMBRE_SYSTEM_PROMPT,
            user_template: VISUAL_AUDIO_TEMPLATE,
            ..base
        },
        Category::PerformerSkillProfiling => GenerationProfile {
            data_dir: "performer_skill_data",
            layout: InputLayout::OrderLog {
                csv_name: "order_log.csv",
            },
            temperature: 0.6,
            sleep_between_secs: 1.2,
            system_prompt: PERFORMER_SKILL_SYSTEM_PROMPT,
            user_template: ORDER_LOG_TEMPLATE,
            ..base
        },
        Category::ImplicitDistractions => GenerationProfile {
            data_dir: "implicit_distractions_data",
            layout: InputLayout::SplitScreen {
                csv_name: "order_log.csv",
            },
            temperature: 0.4,
            sleep_between_secs: 1.5,
            system_prompt: IMPLICIT_DISTRACTION_SYSTEM_PROMPT,
            user_template: SPLIT_SCREEN_TEMPLATE,
            ..base
        },
        Category::TempoAvSyncAnalysis => GenerationProfile {
            data_dir: "tempo_sync_data",
            layout: InputLayout::SyncPairs,
            multiplicity: 1,
            temperature: 0.7,
            max_retries: 3,
            sleep_between_secs: 0.2,
            shape: ResponseShape::Object,
            json_response: true,
            timeout_secs: 120,
            max_tokens: Some(800),
            shuffle_options: true,
            system_prompt: TEMPO_SYNC_SYSTEM_PROMPT,
            user_template: SYNC_PAIR_TEMPLATE,
            ..base
        },
    }
}

/// Resolves `{field}` placeholders from a unit's fields.
pub struct TemplateRenderer {
    placeholder: Regex,
}

impl TemplateRenderer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            placeholder: Regex::new(r"\{([a-z_][a-z0-9_]*)\}")
                .context("failed to compile template placeholder regex")?,
        })
    }

    pub fn render(
        &self,
        template: &str,
        unit: &WorkUnit,
        expected_items: usize,
    ) -> Result<String, PipelineError> {
        let mut unresolved = Vec::new();
        let rendered = self
            .placeholder
            .replace_all(template, |captures: &regex::Captures<'_>| {
                let name = &captures[1];
                if name == "video_id" {
                    return unit.video_id.clone();
                }
                if name == "question_count" {
                    return expected_items.to_string();
                }
                match unit.fields.get(name) {
                    Some(value) => value.clone(),
                    None => {
                        unresolved.push(name.to_string());
                        String::new()
                    }
                }
            })
            .into_owned();

        if unresolved.is_empty() {
            Ok(rendered)
        } else {
            Err(PipelineError::MissingInput(format!(
                "prompt fields not available: {}",
                unresolved.join(", ")
            )))
        }
    }
}

const ITEM_FORMAT: &str = "Each question object has exactly these keys: \"question\" (string), \
\"options\" (an object with keys \"A\", \"B\", \"C\", \"D\" mapping to answer text), \
\"correct_answer_key\" (one of the option keys), \"gold_reasoning\" (string), \
\"video_id\" and \"category\". Reply with JSON only.";

const CAUSAL_SYSTEM_PROMPT: &str = "You design benchmark questions for cross-modal causal reasoning. \
Each question must be unanswerable from a single modality: ask for the cause of a visual event that \
the audio or transcript explains, or for the visible effect of something heard. Trust visual captions \
for objects and attributes; use audio captions and the transcript for sound and speech, and ignore a \
transcript that is filler or unrelated to the scene. Give one correct answer and three plausible \
distractors, including a visual-only trap and an audio-only trap. Write the gold reasoning as if \
watching the video, never mentioning captions or transcripts. Return a JSON list of question objects.";

const UNANSWERABLE_SYSTEM_PROMPT: &str = "You design benchmark questions that test whether a model \
recognises when a video does not contain the requested information. Each question must sound \
answerable and be grounded in what is seen and heard, but the specific detail it asks for must be \
absent from every channel. Exactly one option states that the information cannot be determined from \
the video; the other three are plausible fabrications. Write the gold reasoning as if watching the \
video, explaining which evidence is present and which is missing. Return a JSON list of question objects.";

const PITCH_TIMBRE_SYSTEM_PROMPT: &str = "You design benchmark questions about pitch and timbre in \
musical performances. Each question must link a visible instrument, playing technique or register \
with an audible property such as pitch height, brightness, attack or resonance, so that neither the \
visual nor the audio description alone suffices. Distractors should swap instruments, registers or \
timbral qualities plausibly. Write the gold reasoning as if watching and listening to the video. \
Return a JSON list of question objects.";

const PERFORMER_SKILL_SYSTEM_PROMPT: &str = "You design benchmark questions comparing two performers \
who appear one after the other in a single video. Use the visual and audio descriptions of each \
performance and the ground-truth order to ask which performer shows greater skill, control or \
expressiveness, and why. Questions must require combining what is seen and heard across both halves; \
refer to performers by their position (first or second), never by caption. Return a JSON list of question \
objects.";

const IMPLICIT_DISTRACTION_SYSTEM_PROMPT: &str = "You design benchmark questions for split-screen \
videos in which the top and bottom halves show unrelated scenes with their own sound. Each question \
targets one half, and the most tempting distractor must come from the other half, so a model has to \
attribute sights and sounds to the correct region. Write the gold reasoning as if watching the video, \
naming which half the evidence comes from. Return a JSON list of question objects.";

const TEMPO_SYNC_SYSTEM_PROMPT: &str = "You design benchmark questions about tempo and audio-visual \
synchronisation. Given visual and audio descriptions of a clip and its ground-truth sync status \
(Aligned or Misaligned), ask one varied question whose correct answer depends on whether motion and \
sound line up in time, for example strikes against beats or lip movement against speech. Never \
reveal the sync status in the question. Return a single JSON object for ONE question.";

const CAPTION_SET_TEMPLATE: &str = "Video ID: {video_id}

Visual captions:
{visual}

Audio captions:
{audio}

Transcript:
{transcript}

Generate {question_count} distinct multiple-choice questions that satisfy all rules.";

const VISUAL_AUDIO_TEMPLATE: &str = "Video ID: {video_id}

Visual captions:
{visual}

Audio captions:
{audio}

Generate {question_count} distinct multiple-choice questions that satisfy all rules.";

const ORDER_LOG_TEMPLATE: &str = "Video ID: {video_id}

First performer, visual caption:
{vis_first}
First performer, audio caption:
{aud_first}

Second performer, visual caption:
{vis_second}
Second performer, audio caption:
{aud_second}

Ground-truth order:
{order}

Generate {question_count} distinct multiple-choice questions that satisfy all rules.";

const SPLIT_SCREEN_TEMPLATE: &str = "Video ID: {video_id}

Top half, visual caption:
{top_vis}
Top half, audio caption:
{top_aud}

Bottom half, visual caption:
{bot_vis}
Bottom half, audio caption:
{bot_aud}

Generate {question_count} distinct multiple-choice questions that satisfy all rules.";

const SYNC_PAIR_TEMPLATE: &str = "Visual captions:
{visual}

Audio captions:
{audio}

Ground-truth sync status:
{sync_status}

Generate ONE multiple-choice question that satisfies all rules.";

/// System prompt with the shared item-format instructions appended.
pub fn system_prompt_for(profile: &GenerationProfile) -> String {
    format!("{}\n\n{ITEM_FORMAT}", profile.system_prompt)
}
