//! Subcommand implementations

use anyhow::Context;
use refscan_core::{BatchFinished, ScanConfig, Scanner};
use refscan_host::MemoryHost;
use refscan_report::{JsonFileReportStore, MemoryReportStore, ReportStore};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a session's report lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Store directory
    pub dir: PathBuf,
    /// Session name
    pub name: String,
}

impl Session {
    fn store(&self) -> anyhow::Result<JsonFileReportStore> {
        JsonFileReportStore::for_session(&self.dir, &self.name)
            .with_context(|| format!("opening session {}", self.name))
    }
}

fn load_host(dataset: &Path) -> anyhow::Result<Arc<MemoryHost>> {
    let host = MemoryHost::load(dataset)
        .with_context(|| format!("loading dataset {}", dataset.display()))?;
    Ok(Arc::new(host))
}

fn scanner(dataset: &Path, session: &Session, config: ScanConfig) -> anyhow::Result<Scanner> {
    let host = load_host(dataset)?;
    let store = Arc::new(session.store()?);
    Ok(Scanner::new(host.clone(), host, store).with_config(config))
}

/// Rebuild the session report from scratch, printing every step
///
/// # Errors
/// Returns error if inputs cannot be loaded or the reference map cannot be
/// resolved. Operation failures end the batch and are reported in the
/// returned summary.
pub async fn find_broken(
    dataset: &Path,
    session: &Session,
    config: ScanConfig,
    retries: usize,
    out: &mut impl Write,
) -> anyhow::Result<BatchFinished> {
    let scanner = scanner(dataset, session, config)?;
    let mut run = scanner
        .batch()
        .context("resolving reference fields")?
        .with_retries(retries);

    let mut write_error = None;
    let finished = run
        .run_to_completion(|progress| {
            let line = format!(
                "[{}/{}] {} ({}) {}",
                progress.operation,
                progress.operation_count,
                progress.message,
                progress.progress,
                progress.overall()
            );
            if let Err(err) = writeln!(out, "{line}") {
                if write_error.is_none() {
                    write_error = Some(err);
                }
            }
        })
        .await;
    if let Some(err) = write_error {
        return Err(err.into());
    }

    writeln!(out, "{}", finished.message)?;
    writeln!(
        out,
        "{} broken target references in {} of {} entity types scanned.",
        finished.broken_targets, finished.completed, finished.total
    )?;
    Ok(finished)
}

/// Print the stored report
///
/// # Errors
/// Returns error if the session store cannot be read
pub async fn print_report(session: &Session, json: bool, out: &mut impl Write) -> anyhow::Result<()> {
    let report = session.store()?.read().await.context("reading report")?;
    if json {
        serde_json::to_writer_pretty(&mut *out, &report)?;
        writeln!(out)?;
    } else if report.is_empty() {
        writeln!(out, "No report built yet for session {}.", session.name)?;
    } else {
        write!(out, "{}", report.summary())?;
    }
    Ok(())
}

/// Print the resolved reference map
///
/// # Errors
/// Returns error if the dataset cannot be loaded or resolved
pub fn print_map(dataset: &Path, config: ScanConfig, out: &mut impl Write) -> anyhow::Result<()> {
    let host = load_host(dataset)?;
    let scanner =
        Scanner::new(host.clone(), host, Arc::new(MemoryReportStore::new())).with_config(config);
    let map = scanner
        .resolver()
        .resolve_reference_fields()
        .context("resolving reference fields")?;
    serde_json::to_writer_pretty(&mut *out, &map)?;
    writeln!(out)?;
    Ok(())
}

/// Print the advisory line for the session
///
/// # Errors
/// Returns error if inputs cannot be loaded or a probe fails
pub async fn estimate(
    dataset: &Path,
    session: &Session,
    config: ScanConfig,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let scanner = scanner(dataset, session, config)?;
    let report = scanner.store().read().await.context("reading report")?;
    let advisory = scanner.advisor().advisory(&report).await?;
    writeln!(out, "{advisory}")?;
    Ok(())
}

/// Copy the session report to a JSON file
///
/// # Errors
/// Returns error if the report cannot be read or the file written
pub async fn export_report(session: &Session, path: &Path) -> anyhow::Result<()> {
    let report = session.store()?.read().await.context("reading report")?;
    let json = serde_json::to_vec_pretty(&report)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), "report exported");
    Ok(())
}
