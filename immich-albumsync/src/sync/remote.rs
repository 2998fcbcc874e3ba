use std::future::Future;

use immich_core::{
    AlbumDetail, AlbumSummary, AssetPage, BulkIdResult, ImmichClient, ImmichError, Person,
};

use super::SyncError;
use super::backoff::RetryPolicy;
use super::governor::Governor;

/// The single path to the catalog: every request takes a governor permit and
/// transient failures are retried under the run's [`RetryPolicy`].
#[derive(Clone)]
pub struct RemoteCatalog {
    client: ImmichClient,
    governor: Governor,
    retry: RetryPolicy,
}

impl RemoteCatalog {
    pub fn new(client: ImmichClient, governor: Governor, retry: RetryPolicy) -> Self {
        Self {
            client,
            governor,
            retry,
        }
    }

    pub fn governor(&self) -> &Governor {
        &self.governor
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub async fn search_assets_page(&self, page: u32, size: u32) -> Result<AssetPage, SyncError> {
        self.call("search assets", || self.client.search_assets_page(page, size))
            .await
    }

    pub async fn list_people(&self) -> Result<Vec<Person>, SyncError> {
        self.call("list people", || self.client.list_people()).await
    }

    pub async fn list_albums(&self) -> Result<Vec<AlbumSummary>, SyncError> {
        self.call("list albums", || self.client.list_albums()).await
    }

    pub async fn get_album(&self, album_id: &str) -> Result<AlbumDetail, SyncError> {
        self.call("get album", || self.client.get_album(album_id))
            .await
    }

    /// Single attempt, never retried here; see `Reconciler::ensure_album`.
    pub async fn create_album(&self, name: &str) -> Result<AlbumSummary, SyncError> {
        self.call_once("create album", self.client.create_album(name))
            .await
    }

    pub async fn add_assets(
        &self,
        album_id: &str,
        asset_ids: &[String],
    ) -> Result<Vec<BulkIdResult>, SyncError> {
        self.call("add assets", || self.client.add_assets(album_id, asset_ids))
            .await
    }

    pub async fn remove_assets(
        &self,
        album_id: &str,
        asset_ids: &[String],
    ) -> Result<Vec<BulkIdResult>, SyncError> {
        self.call("remove assets", || {
            self.client.remove_assets(album_id, asset_ids)
        })
        .await
    }

    async fn call_once<T, Fut>(&self, operation: &'static str, request: Fut) -> Result<T, SyncError>
    where
        Fut: Future<Output = Result<T, ImmichError>>,
    {
        self.governor
            .run(request)
            .await?
            .map_err(|source| SyncError::Api { operation, source })
    }

    async fn call<T, F, Fut>(&self, operation: &'static str, mut request: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ImmichError>>,
    {
        let mut attempt = 0u32;
        loop {
            // the permit is dropped before any backoff sleep
            let err = match self.governor.run(request()).await? {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !err.is_retryable() {
                return Err(SyncError::Api {
                    operation,
                    source: err,
                });
            }
            if !self.retry.has_attempts_left(attempt) {
                return Err(SyncError::RetriesExhausted {
                    operation,
                    attempts: attempt + 1,
                    source: err,
                });
            }
            let delay = self.retry.delay(attempt, err.retry_after());
            tracing::warn!(
                operation,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying remote call"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
