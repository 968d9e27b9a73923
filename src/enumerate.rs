//! Work enumeration: discover unit identities cheaply, load companion text lazily.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, StringRecord};

use crate::error::PipelineError;
use crate::ledger::Identified;
use crate::model::WorkUnit;
use crate::util::read_trimmed_text;

pub const SYNC_STATUS_LABEL: &str = "sync_status";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptionChannel {
    pub field: &'static str,
    pub dir_name: &'static str,
    pub allow_empty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLayout {
    /// Anchor directory of `<id>.txt` files plus same-named companions.
    CaptionSet {
        anchor: CaptionChannel,
        companions: &'static [CaptionChannel],
    },
    /// `aligned_clips/` and `misaligned_clips/`, each with visual and audio captions.
    SyncPairs,
    /// Paired first/second performance captions with a ground-truth order.
    OrderLog { csv_name: &'static str },
    /// Top/bottom split-screen captions, columns detected by name.
    SplitScreen { csv_name: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Companion {
    pub path: PathBuf,
    pub allow_empty: bool,
}

/// A discovered unit whose companion text has not been read yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSource {
    pub video_id: String,
    pub companions: BTreeMap<String, Companion>,
    pub literals: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub problems: Vec<String>,
    pub multiplicity: Option<usize>,
}

impl UnitSource {
    fn new(video_id: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            companions: BTreeMap::new(),
            literals: BTreeMap::new(),
            labels: BTreeMap::new(),
            problems: Vec::new(),
            multiplicity: None,
        }
    }

    fn companion(&mut self, field: &str, path: PathBuf, allow_empty: bool) {
        self.companions
            .insert(field.to_string(), Companion { path, allow_empty });
    }

    /// Reads every companion; labels double as prompt fields.
    pub fn load(&self) -> Result<WorkUnit, PipelineError> {
        if !self.problems.is_empty() {
            return Err(PipelineError::MissingInput(self.problems.join("; ")));
        }

        let mut unit = WorkUnit::new(&self.video_id);
        for (field, companion) in &self.companions {
            if !companion.path.is_file() {
                return Err(PipelineError::MissingInput(format!(
                    "{field} companion not found: {}",
                    companion.path.display()
                )));
            }

            let text = read_trimmed_text(&companion.path)
                .map_err(|err| PipelineError::MissingInput(format!("{err:#}")))?;
            if text.is_empty() && !companion.allow_empty {
                return Err(PipelineError::MissingInput(format!(
                    "{field} companion is empty: {}",
                    companion.path.display()
                )));
            }
            unit.fields.insert(field.clone(), text);
        }

        for (name, value) in self.literals.iter().chain(self.labels.iter()) {
            unit.fields.insert(name.clone(), value.clone());
        }
        unit.labels = self.labels.clone();
        unit.multiplicity = self.multiplicity;

        Ok(unit)
    }
}

impl Identified for UnitSource {
    fn identity(&self) -> &str {
        &self.video_id
    }
}

/// Lists the units of an input collection in a reproducible order.
pub fn discover(layout: &InputLayout, data_dir: &Path) -> Result<Vec<UnitSource>> {
    match layout {
        InputLayout::CaptionSet { anchor, companions } => {
            discover_caption_set(data_dir, anchor, companions)
        }
        InputLayout::SyncPairs => discover_sync_pairs(data_dir),
        InputLayout::OrderLog { csv_name } => discover_order_log(data_dir, csv_name),
        InputLayout::SplitScreen { csv_name } => discover_split_screen(data_dir, csv_name),
    }
}

fn discover_caption_set(
    data_dir: &Path,
    anchor: &CaptionChannel,
    companions: &[CaptionChannel],
) -> Result<Vec<UnitSource>> {
    let anchor_dir = data_dir.join(anchor.dir_name);
    if !anchor_dir.is_dir() {
        bail!("{} directory not found: {}", anchor.field, anchor_dir.display());
    }

    let mut sources = Vec::new();
    for path in list_text_files(&anchor_dir)? {
        let Some(video_id) = file_stem(&path) else {
            continue;
        };

        let mut source = UnitSource::new(&video_id);
        for channel in companions {
            let companion_path = data_dir
                .join(channel.dir_name)
                .join(format!("{video_id}.txt"));
            source.companion(channel.field, companion_path, channel.allow_empty);
        }
        source.companion(anchor.field, path, anchor.allow_empty);
        sources.push(source);
    }

    Ok(sources)
}

fn discover_sync_pairs(data_dir: &Path) -> Result<Vec<UnitSource>> {
    let mut sources = Vec::new();
    let mut found_any_dir = false;

    for (status, clip_dir) in [("Aligned", "aligned_clips"), ("Misaligned", "misaligned_clips")] {
        let visual_dir = data_dir.join(clip_dir).join("visual_captions");
        let audio_dir = data_dir.join(clip_dir).join("audio_captions");
        if !visual_dir.is_dir() {
            continue;
        }
        found_any_dir = true;

        for path in list_text_files(&visual_dir)? {
            let Some(video_id) = file_stem(&path) else {
                continue;
            };

            let mut source = UnitSource::new(&video_id);
            source.companion("audio", audio_dir.join(format!("{video_id}.txt")), false);
            source.companion("visual", path, false);
            source
                .labels
                .insert(SYNC_STATUS_LABEL.to_string(), status.to_string());
            sources.push(source);
        }
    }

    if !found_any_dir {
        bail!(
            "no aligned_clips/ or misaligned_clips/ caption directories under {}",
            data_dir.display()
        );
    }

    sources.sort_by(|left, right| left.video_id.cmp(&right.video_id));
    Ok(sources)
}

fn discover_order_log(data_dir: &Path, csv_name: &str) -> Result<Vec<UnitSource>> {
    let (headers, rows) = read_csv(&data_dir.join(csv_name))?;
    let column = |name: &str| headers.iter().position(|header| header.trim() == name);

    let id_column = column("combined_file");
    let caption_columns = [
        ("vis_first", column("first_visual_caption"), "first_visual_caption"),
        ("aud_first", column("first_audio_caption"), "first_audio_caption"),
        ("vis_second", column("second_visual_caption"), "second_visual_caption"),
        ("aud_second", column("second_audio_caption"), "second_audio_caption"),
    ];
    let first_role = column("first_role");
    let second_role = column("second_role");

    let mut sources = Vec::with_capacity(rows.len());
    for (row_index, row) in rows.iter().enumerate() {
        let video_id = cell(row, id_column)
            .and_then(|value| file_stem(Path::new(value)))
            .unwrap_or_else(|| format!("{csv_name}#row{}", row_index + 1));
        let mut source = UnitSource::new(video_id);

        for (field, index, name) in caption_columns {
            match cell(row, index) {
                Some(relative) => source.companion(field, resolve_path(data_dir, relative), false),
                None => source.problems.push(format!("missing {name} column value")),
            }
        }

        match (cell(row, first_role), cell(row, second_role)) {
            (Some(first), Some(second)) => {
                source.literals.insert(
                    "order".to_string(),
                    format!("The {first} performs first, followed by the {second}."),
                );
            }
            _ => source
                .problems
                .push("missing first_role/second_role column value".to_string()),
        }

        if id_column.is_none() || cell(row, id_column).is_none() {
            source
                .problems
                .push("missing combined_file column value".to_string());
        }

        sources.push(source);
    }

    Ok(sources)
}

fn discover_split_screen(data_dir: &Path, csv_name: &str) -> Result<Vec<UnitSource>> {
    let csv_path = data_dir.join(csv_name);
    let (headers, rows) = read_csv(&csv_path)?;
    let detect = |needle: &str| -> Result<usize> {
        headers
            .iter()
            .position(|header| header.to_ascii_lowercase().contains(needle))
            .with_context(|| format!("no column containing {needle:?} in {}", csv_path.display()))
    };

    let id_column = detect("video_name")?;
    let caption_columns = [
        ("top_vis", detect("top_visual")?),
        ("top_aud", detect("top_audio")?),
        ("bot_vis", detect("bottom_visual")?),
        ("bot_aud", detect("bottom_audio")?),
    ];

    let mut sources = Vec::with_capacity(rows.len());
    for (row_index, row) in rows.iter().enumerate() {
        let identity = cell(row, Some(id_column));
        let mut source = UnitSource::new(
            identity
                .map(ToOwned::to_owned)
                .unwrap_or_else(|| format!("{csv_name}#row{}", row_index + 1)),
        );
        if identity.is_none() {
            source.problems.push("missing video_name column value".to_string());
        }

        for (field, index) in caption_columns {
            match cell(row, Some(index)) {
                Some(path) => source.companion(field, resolve_path(data_dir, path), false),
                None => source
                    .problems
                    .push(format!("missing {} column value", headers[index].trim())),
            }
        }

        sources.push(source);
    }

    Ok(sources)
}

fn read_csv(path: &Path) -> Result<(Vec<String>, Vec<StringRecord>)> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open metadata csv: {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("failed to read csv headers: {}", path.display()))?
        .iter()
        .map(ToOwned::to_owned)
        .collect::<Vec<String>>();

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record.with_context(|| format!("failed to read csv row: {}", path.display()))?);
    }

    if rows.is_empty() {
        bail!("no rows in {}", path.display());
    }

    Ok((headers, rows))
}

fn cell(row: &StringRecord, index: Option<usize>) -> Option<&str> {
    index
        .and_then(|index| row.get(index))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn resolve_path(data_dir: &Path, value: &str) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        data_dir.join(path)
    }
}

fn list_text_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        let is_text = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("txt"))
            .unwrap_or(false);
        if is_text {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(ToOwned::to_owned)
}
