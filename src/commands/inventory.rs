use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::InventoryArgs;
use crate::commands::generate::{DEFAULT_LEDGER_FILE, GenerationProfile, profile_for};
use crate::enumerate::{UnitSource, discover};
use crate::ledger::{GENERATION_IDENTITY_FIELD, Identified, load_completed_ids};
use crate::model::{InventoryEntry, InventoryManifest};
use crate::util::{now_utc_string, sha256_file, write_json_pretty};

pub fn run(args: InventoryArgs) -> Result<()> {
    let profile = profile_for(args.category);
    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(profile.data_dir));
    let ledger_path = args
        .ledger_path
        .clone()
        .unwrap_or_else(|| args.output_dir.join(DEFAULT_LEDGER_FILE));

    let manifest = build_manifest(&profile, &data_dir, &ledger_path)?;

    if args.dry_run {
        info!(
            category = %manifest.category,
            unit_count = manifest.unit_count,
            pending_count = manifest.pending_count,
            source = %manifest.data_dir,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args.manifest_path.unwrap_or_else(|| {
        args.output_dir
            .join("manifests")
            .join(format!("inventory_{}.json", manifest.category))
    });

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(
        unit_count = manifest.unit_count,
        pending_count = manifest.pending_count,
        "inventory completed"
    );

    Ok(())
}

pub fn build_manifest(
    profile: &GenerationProfile,
    data_dir: &Path,
    ledger_path: &Path,
) -> Result<InventoryManifest> {
    let sources = discover(&profile.layout, data_dir)?;
    let completed = load_completed_ids(ledger_path, GENERATION_IDENTITY_FIELD)?;

    let mut units = Vec::with_capacity(sources.len());
    for source in &sources {
        units.push(inventory_entry(source, &completed)?);
    }

    let pending_count = units.iter().filter(|unit| !unit.completed).count();

    Ok(InventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        category: profile.category.as_str().to_string(),
        data_dir: data_dir.display().to_string(),
        ledger_path: ledger_path.display().to_string(),
        unit_count: units.len(),
        pending_count,
        units,
    })
}

fn inventory_entry(source: &UnitSource, completed: &HashSet<String>) -> Result<InventoryEntry> {
    let mut companions = BTreeMap::new();
    let mut sha256 = BTreeMap::new();

    for (field, companion) in &source.companions {
        companions.insert(field.clone(), companion.path.display().to_string());
        if companion.path.is_file() {
            sha256.insert(field.clone(), sha256_file(&companion.path)?);
        } else {
            warn!(
                video_id = %source.video_id,
                field = %field,
                path = %companion.path.display(),
                "companion file missing"
            );
        }
    }

    for problem in &source.problems {
        warn!(video_id = %source.video_id, problem = %problem, "unit metadata incomplete");
    }

    Ok(InventoryEntry {
        video_id: source.video_id.clone(),
        completed: completed.contains(source.identity()),
        companions,
        labels: source.labels.clone(),
        sha256,
    })
}
