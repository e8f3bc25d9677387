use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vitals_core::config::resolve_data_dir;
use vitals_core::{ClinicalDocumentImporter, CoreConfig, ImportOutcome, SampleStore};

/// Totals across one batch run.
#[derive(Debug, Default)]
struct BatchSummary {
    documents: usize,
    failed_documents: usize,
    forwarded: usize,
    duplicates: usize,
    malformed: usize,
    sink_failures: usize,
}

/// Batch import entry point
///
/// Imports vital signs from every `*.xml` document in the inbox directory into the sample
/// store. A document that cannot be read or parsed is logged and skipped; the rest of the
/// batch still runs.
///
/// # Environment Variables
/// - `VITALS_INBOX_DIR`: Directory of CDA documents to import (default: "inbox")
/// - `VITALS_DATA_DIR`: Directory for sample storage (default: "vitals_data")
///
/// # Returns
/// * `Ok(())` - If the batch ran, even when individual documents failed
/// * `Err(anyhow::Error)` - If configuration is invalid or the inbox cannot be listed
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("vitals=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let inbox: PathBuf = std::env::var("VITALS_INBOX_DIR")
        .unwrap_or_else(|_| "inbox".into())
        .into();
    let data_dir = resolve_data_dir(std::env::var("VITALS_DATA_DIR").ok());

    tracing::info!("++ Importing CDA documents from {}", inbox.display());
    tracing::info!("++ Storing samples in {}", data_dir.display());

    let cfg = Arc::new(CoreConfig::new(data_dir)?);
    let mut store = SampleStore::new(cfg);
    let importer = ClinicalDocumentImporter::new();

    let documents = list_documents(&inbox)?;
    let mut summary = BatchSummary::default();

    for path in documents {
        summary.documents += 1;

        let xml = match std::fs::read_to_string(&path) {
            Ok(xml) => xml,
            Err(e) => {
                tracing::error!("failed to read {}: {}", path.display(), e);
                summary.failed_documents += 1;
                continue;
            }
        };

        match importer.import_vitals(&xml, &mut store) {
            Ok(report) => {
                match report.outcome {
                    ImportOutcome::NotClinicalDocument => {
                        tracing::warn!("{} is not a clinical document", path.display())
                    }
                    ImportOutcome::NoVitalsSection => {
                        tracing::info!("{} has no vital signs", path.display())
                    }
                    ImportOutcome::Imported => tracing::info!(
                        "{}: {} samples forwarded, {} duplicates, {} malformed entries",
                        path.display(),
                        report.forwarded,
                        report.duplicates,
                        report.malformed
                    ),
                }
                summary.forwarded += report.forwarded;
                summary.duplicates += report.duplicates;
                summary.malformed += report.malformed;
                summary.sink_failures += report.sink_failures;
            }
            Err(e) => {
                tracing::error!("failed to import {}: {}", path.display(), e);
                summary.failed_documents += 1;
            }
        }
    }

    tracing::info!("batch complete: {:?}", summary);
    Ok(())
}

/// `*.xml` files directly under `inbox`, sorted by file name.
fn list_documents(inbox: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(inbox)
        .with_context(|| format!("failed to list inbox {}", inbox.display()))?;

    let mut documents = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_xml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
        if path.is_file() && is_xml {
            documents.push(path);
        }
    }

    documents.sort();
    Ok(documents)
}
