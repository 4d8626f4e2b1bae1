//! Pluggable health checks aggregated into a single pass/fail report

use crate::database::DatabaseConnection;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Per-item detail lines, keyed by an item identifier (file path, db alias).
pub type CheckDetails = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "FAILED")]
    Failed,
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckStatus::Ok => write!(f, "ok"),
            CheckStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// One check's slice of the overall report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub status: CheckStatus,
    pub details: CheckDetails,
}

/// Result state recorded by a check's `run()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub ok: bool,
    pub details: CheckDetails,
}

/// A single testable health condition.
///
/// `run()` must record an outcome before returning; the accessors return
/// `AppError::CheckNotRun` until it has. A failing condition is not an error:
/// it is an outcome with `ok == false`. Errors are reserved for conditions
/// the check cannot classify (see `AppError::IoError`).
#[async_trait::async_trait]
pub trait HealthCheck: Send + Sync {
    fn check_id(&self) -> &str;

    fn is_critical(&self) -> bool {
        true
    }

    /// Executes the check and records its outcome.
    async fn run(&mut self) -> Result<()>;

    /// The outcome recorded by `run()`.
    fn outcome(&self) -> Result<&CheckOutcome>;

    fn is_ok(&self) -> Result<bool> {
        Ok(self.outcome()?.ok)
    }

    fn details(&self) -> Result<&CheckDetails> {
        Ok(&self.outcome()?.details)
    }

    fn as_report_entry(&self) -> Result<ReportEntry> {
        let outcome = self.outcome()?;
        Ok(ReportEntry {
            status: if outcome.ok { CheckStatus::Ok } else { CheckStatus::Failed },
            details: outcome.details.clone(),
        })
    }
}

/// Item-level test logic for a `ListCheck`.
///
/// A probe may define a default check id and a default item collection;
/// both can be overridden per instance through `CheckOptions`.
#[async_trait::async_trait]
pub trait ItemCheck: Send + Sync {
    type Item: Send + Sync;

    fn default_check_id(&self) -> Option<&str> {
        None
    }

    fn default_items(&self) -> Option<Vec<Self::Item>> {
        None
    }

    /// Tests one item, returning its verdict and detail lines.
    async fn check_item(&self, item: &Self::Item) -> Result<(bool, CheckDetails)>;
}

/// Per-instance overrides for a `ListCheck`.
#[derive(Debug, Clone)]
pub struct CheckOptions<I> {
    pub check_id: Option<String>,
    pub is_critical: bool,
    pub items: Option<Vec<I>>,
}

impl<I> Default for CheckOptions<I> {
    fn default() -> Self {
        Self {
            check_id: None,
            is_critical: true,
            items: None,
        }
    }
}

/// A check that evaluates a collection of homogeneous items.
///
/// Every item is evaluated even after a failure is found, so the report
/// always carries complete per-item detail. Item details merge with
/// last-write-wins on key collision; item identifiers should be unique
/// within one check.
pub struct ListCheck<P: ItemCheck> {
    check_id: String,
    is_critical: bool,
    items: Vec<P::Item>,
    probe: P,
    outcome: Option<CheckOutcome>,
}

impl<P: ItemCheck> ListCheck<P> {
    /// Resolution order for both id and items: explicit option, then the
    /// probe's default, then a configuration error.
    pub fn with_options(probe: P, options: CheckOptions<P::Item>) -> Result<Self> {
        let check_id = options
            .check_id
            .or_else(|| probe.default_check_id().map(str::to_owned))
            .ok_or(AppError::MissingCheckId)?;

        let items = match options.items {
            Some(items) => items,
            None => probe.default_items().unwrap_or_default(),
        };
        if items.is_empty() {
            return Err(AppError::NoItems(check_id));
        }

        Ok(Self {
            check_id,
            is_critical: options.is_critical,
            items,
            probe,
            outcome: None,
        })
    }
}

#[async_trait::async_trait]
impl<P: ItemCheck> HealthCheck for ListCheck<P> {
    fn check_id(&self) -> &str {
        &self.check_id
    }

    fn is_critical(&self) -> bool {
        self.is_critical
    }

    async fn run(&mut self) -> Result<()> {
        let mut ok = true;
        let mut details = CheckDetails::new();

        for item in &self.items {
            let (item_ok, item_details) = self.probe.check_item(item).await?;
            if !item_ok {
                ok = false;
            }
            details.extend(item_details);
        }

        self.outcome = Some(CheckOutcome { ok, details });
        Ok(())
    }

    fn outcome(&self) -> Result<&CheckOutcome> {
        self.outcome
            .as_ref()
            .ok_or_else(|| AppError::CheckNotRun(self.check_id.clone()))
    }
}

/// Returns true if something exists at `path`, even when it cannot be read.
///
/// Permission-denied means the path exists with the wrong permissions, which
/// is different from `Path::exists()` treating it as absent. Any other stat
/// failure besides not-found is outside the recognized vocabulary and
/// propagates to the caller.
async fn file_exists(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Fails if at least one of the listed files doesn't exist.
pub struct FilesExist;

#[async_trait::async_trait]
impl ItemCheck for FilesExist {
    type Item = PathBuf;

    async fn check_item(&self, path: &PathBuf) -> Result<(bool, CheckDetails)> {
        let exists = file_exists(path).await?;
        let mut details = CheckDetails::new();
        details.insert(
            path.display().to_string(),
            if exists { "exists" } else { "NO SUCH FILE" }.to_string(),
        );
        Ok((exists, details))
    }
}

pub type FilesExistCheck = ListCheck<FilesExist>;

impl FilesExistCheck {
    pub fn new(paths: Vec<PathBuf>, check_id: impl Into<String>) -> Result<Self> {
        Self::with_options(
            FilesExist,
            CheckOptions {
                check_id: Some(check_id.into()),
                items: Some(paths),
                ..Default::default()
            },
        )
    }
}

/// Fails if at least one of the listed files exists.
pub struct FilesAbsent;

#[async_trait::async_trait]
impl ItemCheck for FilesAbsent {
    type Item = PathBuf;

    async fn check_item(&self, path: &PathBuf) -> Result<(bool, CheckDetails)> {
        let exists = file_exists(path).await?;
        let mut details = CheckDetails::new();
        details.insert(
            path.display().to_string(),
            if exists { "FILE EXISTS" } else { "no such file" }.to_string(),
        );
        Ok((!exists, details))
    }
}

pub type FilesAbsentCheck = ListCheck<FilesAbsent>;

impl FilesAbsentCheck {
    pub fn new(paths: Vec<PathBuf>, check_id: impl Into<String>) -> Result<Self> {
        Self::with_options(
            FilesAbsent,
            CheckOptions {
                check_id: Some(check_id.into()),
                items: Some(paths),
                ..Default::default()
            },
        )
    }
}

/// Verifies that every configured database accepts connections and is usable.
///
/// A connection failure is part of this check's expected vocabulary: it
/// becomes a FAILED detail line for that alias and the remaining databases
/// are still checked. One unreachable database never aborts the run.
pub struct DatabasesReachable;

#[async_trait::async_trait]
impl ItemCheck for DatabasesReachable {
    type Item = Arc<dyn DatabaseConnection>;

    fn default_check_id(&self) -> Option<&str> {
        Some("databases")
    }

    async fn check_item(&self, conn: &Arc<dyn DatabaseConnection>) -> Result<(bool, CheckDetails)> {
        let mut details = CheckDetails::new();

        if conn.ensure_connection().await.is_err() {
            details.insert(conn.alias().to_string(), "FAILED".to_string());
            return Ok((false, details));
        }

        let usable = conn.is_usable().await;
        details.insert(
            conn.alias().to_string(),
            if usable { "ok" } else { "FAILED" }.to_string(),
        );
        Ok((usable, details))
    }
}

pub type DatabasesCheck = ListCheck<DatabasesReachable>;

impl DatabasesCheck {
    pub fn new(connections: Vec<Arc<dyn DatabaseConnection>>) -> Result<Self> {
        Self::with_options(
            DatabasesReachable,
            CheckOptions {
                items: Some(connections),
                ..Default::default()
            },
        )
    }
}

/// Report produced by one aggregator run, keyed by check id.
pub type HealthReport = HashMap<String, ReportEntry>;

/// Runs a set of checks in order and computes the overall verdict.
///
/// Fresh instance per invocation: `run_all` consumes the checks' one-shot
/// outcome state, and concurrent callers (one per HTTP request) each build
/// their own checker.
pub struct HealthChecker {
    checks: Vec<Box<dyn HealthCheck>>,
}

impl HealthChecker {
    /// Check ids must be distinct within one checker.
    pub fn new(checks: Vec<Box<dyn HealthCheck>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for check in &checks {
            if !seen.insert(check.check_id().to_string()) {
                return Err(AppError::DuplicateCheckId(check.check_id().to_string()));
            }
        }
        Ok(Self { checks })
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Runs every check in construction order and returns the overall
    /// verdict with the per-check report.
    ///
    /// Expected check failures land in the report and never stop the
    /// remaining checks; an unclassified error aborts the whole run.
    pub async fn run_all(&mut self) -> Result<(bool, HealthReport)> {
        info!("Running {} health checks", self.checks.len());

        let mut report = HealthReport::new();
        for check in &mut self.checks {
            check.run().await?;
            let entry = check.as_report_entry()?;
            match entry.status {
                CheckStatus::Ok => info!("Health check '{}' passed", check.check_id()),
                CheckStatus::Failed => {
                    warn!("Health check '{}' failed: {:?}", check.check_id(), entry.details)
                }
            }
            report.insert(check.check_id().to_string(), entry);
        }

        let healthy = self.assess_overall_status()?;
        info!(
            "Health check run complete - overall status: {}",
            if healthy { CheckStatus::Ok } else { CheckStatus::Failed }
        );
        Ok((healthy, report))
    }

    /// Unhealthy if any critical check failed, or if every check failed
    /// regardless of criticality.
    fn assess_overall_status(&self) -> Result<bool> {
        let mut failed = 0;
        let mut critical_failed = false;

        for check in &self.checks {
            if !check.is_ok()? {
                failed += 1;
                if check.is_critical() {
                    critical_failed = true;
                }
            }
        }

        Ok(!(critical_failed || failed == self.checks.len()))
    }
}
