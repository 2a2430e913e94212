// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The `export` command: load inputs, run one export (or a front and a back
// export for duplex), and write the result.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use sheetpress_cache::{EffectCache, SqliteEffectStore, sqlite::DEFAULT_MAX_BYTES};
use sheetpress_core::config::ExportSettings;
use sheetpress_core::error::{Result, SheetpressError};
use sheetpress_core::types::CardRenderItem;
use sheetpress_export::naming::output_filename;
use sheetpress_export::{CancelSignal, ExportOrchestrator, ExportOutcome, OutputMode, duplex};
use sheetpress_render::DirectoryImageSource;
use tracing::info;

/// Paths gathered from the command line.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub cards: PathBuf,
    pub backs: Option<PathBuf>,
    pub settings: Option<PathBuf>,
    pub images: PathBuf,
    pub out: PathBuf,
    pub cache_db: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResult {
    Saved(PathBuf),
    Cancelled,
}

const DUPLEX_SUFFIX: &str = "_duplex";

pub fn load_cards(path: &Path) -> Result<Vec<CardRenderItem>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn open_cache(path: Option<&Path>) -> Result<EffectCache> {
    match path {
        Some(path) => {
            let store = SqliteEffectStore::open(path, DEFAULT_MAX_BYTES)?;
            Ok(EffectCache::new(Arc::new(store)))
        }
        None => Ok(EffectCache::in_memory()),
    }
}

/// Logs overall progress in steps of ten percent. `offset` and `share` map
/// this export's 0..100 onto its slice of the whole job.
fn progress_logger(offset: f32, share: f32) -> impl Fn(f32) + Send + Sync {
    let last = AtomicU32::new(0);
    move |percent| {
        let overall = offset + percent * share;
        let step = (overall / 10.0).floor() as u32;
        if step > last.fetch_max(step, Ordering::Relaxed) {
            info!(percent = step * 10, "export progress");
        }
    }
}

fn into_document(outcome: ExportOutcome) -> Result<Option<Vec<u8>>> {
    match outcome {
        ExportOutcome::Document(bytes) => Ok(Some(bytes)),
        ExportOutcome::Cancelled => Ok(None),
        ExportOutcome::Saved(path) => Err(SheetpressError::Coordinator(format!(
            "expected an in-memory document, got {}",
            path.display()
        ))),
    }
}

pub async fn run(job: ExportJob, cancel: &CancelSignal) -> Result<JobResult> {
    let settings = match &job.settings {
        Some(path) => ExportSettings::load(path)?,
        None => ExportSettings::default(),
    };
    let cards = load_cards(&job.cards)?;
    let cache = open_cache(job.cache_db.as_deref())?;
    let orchestrator =
        ExportOrchestrator::new(Arc::new(DirectoryImageSource::new(&job.images)), Some(cache));

    let Some(backs_path) = &job.backs else {
        let output = OutputMode::Save {
            dir: job.out.clone(),
        };
        let outcome = orchestrator
            .export(cards, settings, output, progress_logger(0.0, 1.0), cancel)
            .await?;
        return match outcome {
            ExportOutcome::Saved(path) => Ok(JobResult::Saved(path)),
            ExportOutcome::Cancelled => Ok(JobResult::Cancelled),
            ExportOutcome::Document(_) => Err(SheetpressError::Coordinator(
                "expected a saved document".into(),
            )),
        };
    };

    let backs = load_cards(backs_path)?;
    if backs.len() != cards.len() {
        return Err(SheetpressError::InvalidSettings(format!(
            "{} backs given for {} cards",
            backs.len(),
            cards.len()
        )));
    }
    let backs = duplex::backs_for(&backs, settings.layout.columns);

    let front = orchestrator
        .export(
            cards,
            settings.clone(),
            OutputMode::Bytes,
            progress_logger(0.0, 0.5),
            cancel,
        )
        .await?;
    let Some(front) = into_document(front)? else {
        return Ok(JobResult::Cancelled);
    };

    // Backs arrive already padded and mirrored.
    let mut back_settings = settings.clone();
    back_settings.layout.right_align_incomplete_rows = false;
    let back = orchestrator
        .export(
            backs,
            back_settings,
            OutputMode::Bytes,
            progress_logger(50.0, 0.5),
            cancel,
        )
        .await?;
    let Some(back) = into_document(back)? else {
        return Ok(JobResult::Cancelled);
    };

    let document = duplex::interleave(&front, &back)?;
    let mut naming = settings.naming.clone();
    if naming.mode_suffix.is_empty() {
        naming.mode_suffix = DUPLEX_SUFFIX.into();
    }
    let path = job
        .out
        .join(output_filename(&naming, chrono::Local::now().date_naive()));
    tokio::fs::create_dir_all(&job.out).await?;
    tokio::fs::write(&path, &document).await?;
    info!(path = %path.display(), bytes = document.len(), "duplex document saved");
    Ok(JobResult::Saved(path))
}
