use std::collections::HashSet;

use futures_util::future::join_all;

use super::SyncError;
use super::remote::RemoteCatalog;
use crate::rules::Asset;

/// All assets of one run, fetched to completion before any rule is evaluated.
#[derive(Debug, Default, Clone)]
pub struct CatalogSnapshot {
    pub assets: Vec<Asset>,
}

impl CatalogSnapshot {
    pub fn new(assets: Vec<Asset>) -> Self {
        Self { assets }
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Every person id detected on at least one asset.
    pub fn people(&self) -> HashSet<String> {
        self.assets
            .iter()
            .flat_map(|asset| asset.people.iter().cloned())
            .collect()
    }
}

/// Pages through the metadata search, requesting as many pages at once as the
/// governor allows. The listing ends at the first page that is empty or has no
/// successor; pages requested past that point are discarded.
pub async fn fetch_snapshot(
    remote: &RemoteCatalog,
    page_size: u32,
) -> Result<CatalogSnapshot, SyncError> {
    let window = u32::try_from(remote.governor().limit())
        .unwrap_or(u32::MAX)
        .max(1);
    let page_size = page_size.max(1);
    let mut assets = Vec::new();
    let mut first = 1u32;

    loop {
        let pages = join_all(
            (first..first.saturating_add(window))
                .map(|page| remote.search_assets_page(page, page_size)),
        )
        .await;

        let mut finished = false;
        for page in pages {
            let page = page?;
            let last = page.items.is_empty() || page.next_page.is_none();
            assets.extend(page.items.iter().map(Asset::from));
            if last {
                finished = true;
                break;
            }
        }
        if finished {
            break;
        }
        tracing::debug!(assets = assets.len(), "catalog window fetched");
        first = first.saturating_add(window);
    }

    tracing::info!(assets = assets.len(), "catalog snapshot complete");
    Ok(CatalogSnapshot::new(assets))
}
