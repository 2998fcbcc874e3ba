use std::collections::{BTreeSet, HashSet};

use immich_core::BulkIdResult;

use super::SyncError;
use super::remote::RemoteCatalog;
use super::report::{BatchAction, BatchFailure, RuleOutcome, RuleReport};

/// Membership changes for one album; ids are sorted so batches are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub to_add: BTreeSet<String>,
    pub to_remove: BTreeSet<String>,
}

impl ReconciliationPlan {
    pub fn compute(desired: &HashSet<String>, current: &HashSet<String>) -> Self {
        Self {
            to_add: desired.difference(current).cloned().collect(),
            to_remove: current.difference(desired).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumHandle {
    pub id: String,
    pub created: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub added: usize,
    pub removed: usize,
    pub rejected: usize,
    pub failures: Vec<BatchFailure>,
}

#[derive(Clone)]
pub struct Reconciler {
    remote: RemoteCatalog,
    batch_size: usize,
    preview: bool,
}

impl Reconciler {
    pub fn new(remote: RemoteCatalog, batch_size: usize, preview: bool) -> Self {
        Self {
            remote,
            batch_size: batch_size.max(1),
            preview,
        }
    }

    pub async fn find_album(&self, name: &str) -> Result<Option<String>, SyncError> {
        let albums = self.remote.list_albums().await?;
        Ok(albums
            .into_iter()
            .find(|album| album.album_name == name)
            .map(|album| album.id))
    }

    /// Looks the album up by exact name and creates it only when absent. Each
    /// creation is a single POST; after a retryable failure the name is looked
    /// up again before the next one.
    pub async fn ensure_album(&self, name: &str) -> Result<AlbumHandle, SyncError> {
        let retry = *self.remote.retry_policy();
        let mut attempt = 0u32;
        loop {
            if let Some(id) = self.find_album(name).await? {
                return Ok(AlbumHandle { id, created: false });
            }
            match self.remote.create_album(name).await {
                Ok(album) => {
                    tracing::info!(album = name, id = %album.id, "album created");
                    return Ok(AlbumHandle {
                        id: album.id,
                        created: true,
                    });
                }
                Err(SyncError::Api { operation, source }) if source.is_retryable() => {
                    if !retry.has_attempts_left(attempt) {
                        return Err(SyncError::RetriesExhausted {
                            operation,
                            attempts: attempt + 1,
                            source,
                        });
                    }
                    let delay = retry.delay(attempt, source.retry_after());
                    tracing::warn!(
                        album = name,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %source,
                        "album creation failed, looking it up again"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub async fn current_members(&self, album_id: &str) -> Result<HashSet<String>, SyncError> {
        let album = self.remote.get_album(album_id).await?;
        Ok(album.assets.into_iter().map(|asset| asset.id).collect())
    }

    /// Sends the plan in batches. A failed batch is recorded and the remaining
    /// batches still go out.
    pub async fn apply(&self, album_id: &str, plan: &ReconciliationPlan) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();
        let to_add: Vec<String> = plan.to_add.iter().cloned().collect();
        let to_remove: Vec<String> = plan.to_remove.iter().cloned().collect();

        for batch in to_add.chunks(self.batch_size) {
            match self.remote.add_assets(album_id, batch).await {
                Ok(results) => {
                    let (ok, rejected) = tally(batch, &results);
                    outcome.added += ok;
                    outcome.rejected += rejected;
                }
                Err(err) => outcome.failures.push(batch_failure(BatchAction::Add, batch, err)),
            }
        }
        for batch in to_remove.chunks(self.batch_size) {
            match self.remote.remove_assets(album_id, batch).await {
                Ok(results) => {
                    let (ok, rejected) = tally(batch, &results);
                    outcome.removed += ok;
                    outcome.rejected += rejected;
                }
                Err(err) => {
                    outcome
                        .failures
                        .push(batch_failure(BatchAction::Remove, batch, err))
                }
            }
        }
        outcome
    }

    /// Brings the album named `name` to exactly `desired`. Errors never escape:
    /// they end up in the returned report.
    pub async fn reconcile(&self, name: &str, desired: &HashSet<String>) -> RuleReport {
        let report = RuleReport::new(name, desired.len());
        if self.preview {
            return self.preview_rule(report, desired).await;
        }

        let album = match self.ensure_album(name).await {
            Ok(album) => album,
            Err(err) => {
                tracing::error!(album = name, error = %err, "album lookup/creation failed");
                return report.failed(err);
            }
        };
        let mut report = RuleReport {
            album_id: Some(album.id.clone()),
            album_created: album.created,
            ..report
        };
        let current = match self.current_members(&album.id).await {
            Ok(current) => current,
            Err(err) => {
                tracing::error!(album = name, error = %err, "fetching album members failed");
                return report.failed(err);
            }
        };

        let plan = ReconciliationPlan::compute(desired, &current);
        if plan.is_empty() {
            tracing::info!(album = name, total = desired.len(), "album already up to date");
            return report;
        }

        let outcome = self.apply(&album.id, &plan).await;
        report.added = outcome.added;
        report.removed = outcome.removed;
        report.rejected = outcome.rejected;
        report.failures = outcome.failures.iter().map(ToString::to_string).collect();
        report.outcome = if outcome.failures.is_empty() {
            RuleOutcome::Applied
        } else {
            for failure in &outcome.failures {
                tracing::error!(album = name, %failure, "batch failed");
            }
            RuleOutcome::PartialFailure
        };
        tracing::info!(
            album = name,
            added = report.added,
            removed = report.removed,
            rejected = report.rejected,
            total = desired.len(),
            "album reconciled"
        );
        report
    }

    async fn preview_rule(&self, report: RuleReport, desired: &HashSet<String>) -> RuleReport {
        let name = report.name.clone();
        let album_id = match self.find_album(&name).await {
            Ok(album_id) => album_id,
            Err(err) => return report.failed(err),
        };
        let current = match &album_id {
            Some(id) => match self.current_members(id).await {
                Ok(current) => current,
                Err(err) => return report.failed(err),
            },
            None => HashSet::new(),
        };
        let plan = ReconciliationPlan::compute(desired, &current);
        tracing::info!(
            album = %name,
            exists = album_id.is_some(),
            to_add = plan.to_add.len(),
            to_remove = plan.to_remove.len(),
            "preview: plan computed, nothing sent"
        );
        RuleReport {
            album_id,
            added: plan.to_add.len(),
            removed: plan.to_remove.len(),
            outcome: if plan.is_empty() {
                RuleOutcome::Unchanged
            } else {
                RuleOutcome::Previewed
            },
            ..report
        }
    }
}

/// An empty result list means the server accepted the batch without per-id
/// detail.
fn tally(batch: &[String], results: &[BulkIdResult]) -> (usize, usize) {
    if results.is_empty() {
        return (batch.len(), 0);
    }
    let ok = results.iter().filter(|result| result.success).count();
    (ok, results.len() - ok)
}

fn batch_failure(action: BatchAction, batch: &[String], err: SyncError) -> BatchFailure {
    BatchFailure {
        action,
        size: batch.len(),
        error: err.to_string(),
    }
}
