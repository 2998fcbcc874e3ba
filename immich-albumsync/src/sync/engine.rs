use std::collections::HashSet;

use immich_core::ImmichClient;
use tokio::task::JoinSet;

use super::SyncError;
use super::backoff::RetryPolicy;
use super::catalog::{CatalogSnapshot, fetch_snapshot};
use super::governor::Governor;
use super::reconcile::Reconciler;
use super::remote::RemoteCatalog;
use super::report::{RuleReport, RunSummary};
use crate::rules::{PeopleDirectory, SyncRule, resolve_people};

const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;
const DEFAULT_PAGE_SIZE: u32 = 1000;
const DEFAULT_BATCH_SIZE: usize = 2000;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub max_concurrent_requests: usize,
    pub page_size: u32,
    pub batch_size: usize,
    pub preview: bool,
    pub retry: RetryPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            preview: false,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct AlbumSyncEngine {
    remote: RemoteCatalog,
    reconciler: Reconciler,
    options: EngineOptions,
}

impl AlbumSyncEngine {
    pub fn new(client: ImmichClient, options: EngineOptions) -> Self {
        let governor = Governor::new(options.max_concurrent_requests);
        let remote = RemoteCatalog::new(client, governor, options.retry);
        let reconciler = Reconciler::new(remote.clone(), options.batch_size, options.preview);
        Self {
            remote,
            reconciler,
            options,
        }
    }

    /// One full pass: snapshot the catalog, evaluate every rule against it and
    /// reconcile each album independently. Only a failed snapshot aborts the run;
    /// per-album problems are reported in the summary.
    pub async fn run(&self, rules: &[SyncRule]) -> Result<RunSummary, SyncError> {
        tracing::info!(
            rules = rules.len(),
            preview = self.options.preview,
            max_concurrent_requests = self.remote.governor().limit(),
            "sync run started"
        );
        let snapshot = fetch_snapshot(&self.remote, self.options.page_size).await?;

        let mut rules = rules.to_vec();
        let directory = if uses_people_sets(&rules) {
            self.people_directory().await
        } else {
            None
        };
        let unmatched = resolve_people(&mut rules, directory.as_ref(), &snapshot.people());
        let desired = desired_memberships(&rules, &snapshot);

        let reports = self.reconcile_all(&rules, desired, unmatched).await;
        let summary = RunSummary {
            preview: self.options.preview,
            assets_scanned: snapshot.len(),
            rules: reports,
        };
        tracing::info!(status = ?summary.status(), "sync run finished");
        Ok(summary)
    }

    async fn people_directory(&self) -> Option<PeopleDirectory> {
        match self.remote.list_people().await {
            Ok(people) => Some(PeopleDirectory::new(&people)),
            Err(err) => {
                tracing::warn!(error = %err, "person lookup unavailable, treating names as ids");
                None
            }
        }
    }

    async fn reconcile_all(
        &self,
        rules: &[SyncRule],
        desired: Vec<HashSet<String>>,
        unmatched: Vec<Vec<String>>,
    ) -> Vec<RuleReport> {
        let mut tasks = JoinSet::new();
        let mut sizes = Vec::with_capacity(rules.len());
        for (index, ((rule, members), unmatched)) in rules
            .iter()
            .zip(desired)
            .zip(unmatched)
            .enumerate()
        {
            if !unmatched.is_empty() {
                tracing::warn!(
                    album = %rule.name,
                    people = ?unmatched,
                    "people in this rule appear on no asset"
                );
            }
            sizes.push(members.len());
            let reconciler = self.reconciler.clone();
            let name = rule.name.clone();
            tasks.spawn(async move {
                let mut report = reconciler.reconcile(&name, &members).await;
                report.unmatched_people = unmatched;
                (index, report)
            });
        }

        let mut reports: Vec<Option<RuleReport>> = vec![None; rules.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => reports[index] = Some(report),
                Err(err) => tracing::error!(error = %err, "rule task did not complete"),
            }
        }

        reports
            .into_iter()
            .zip(rules)
            .zip(sizes)
            .map(|((report, rule), size)| {
                report.unwrap_or_else(|| {
                    RuleReport::new(rule.name.clone(), size).failed("rule task did not complete")
                })
            })
            .collect()
    }
}

fn uses_people_sets(rules: &[SyncRule]) -> bool {
    rules
        .iter()
        .flat_map(|rule| &rule.filters)
        .filter_map(|filter| filter.people_ids())
        .any(|ids| !ids.is_empty())
}

/// Matches every asset against every rule in a single pass over the snapshot.
pub fn desired_memberships(rules: &[SyncRule], snapshot: &CatalogSnapshot) -> Vec<HashSet<String>> {
    let mut desired = vec![HashSet::new(); rules.len()];
    for asset in &snapshot.assets {
        for (rule, members) in rules.iter().zip(desired.iter_mut()) {
            if rule.matches(asset) {
                members.insert(asset.id.clone());
            }
        }
    }
    desired
}
