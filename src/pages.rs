use crate::credentials::CredentialLoader;
use crate::view::{Liveness, ViewSlot, ViewState, WriteOutcome};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// One mounted page: its view slot and the in-flight credential load.
#[derive(Debug)]
pub struct PageEntry {
    pub slot: ViewSlot,
    last_seen: Instant,
    load: JoinHandle<()>,
}

/// Pages mounted by browser loads, keyed by page id.
#[derive(Default)]
pub struct PageRegistry {
    pages: RwLock<HashMap<Uuid, PageEntry>>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts a new page and starts its single credential fetch.
    pub async fn mount(&self, loader: Arc<dyn CredentialLoader>) -> (Uuid, ViewSlot) {
        let page_id = Uuid::new_v4();
        let slot = ViewSlot::new();
        let liveness = slot.liveness();
        let load = tokio::spawn(load_credentials(page_id, slot.clone(), liveness, loader));
        self.pages.write().await.insert(
            page_id,
            PageEntry {
                slot: slot.clone(),
                last_seen: Instant::now(),
                load,
            },
        );
        debug!(%page_id, "page mounted");
        (page_id, slot)
    }

    /// Looks up a page and records the request as activity on it.
    pub async fn get(&self, page_id: &Uuid) -> Option<ViewSlot> {
        let mut pages = self.pages.write().await;
        let entry = pages.get_mut(page_id)?;
        entry.last_seen = Instant::now();
        Some(entry.slot.clone())
    }

    /// Returns false if the page was not mounted.
    pub async fn unmount(&self, page_id: &Uuid) -> bool {
        let entry = self.pages.write().await.remove(page_id);
        match entry {
            Some(entry) => {
                entry.slot.unmount().await;
                debug!(%page_id, load_finished = entry.load.is_finished(), "page unmounted");
                true
            }
            None => false,
        }
    }

    /// Unmounts pages idle for longer than `ttl`; their browser never said
    /// goodbye. A page showing the widget stays until `ready_ttl` (never less
    /// than `ttl`) so late widget errors such as an expired token still land.
    pub async fn prune_expired(&self, ttl: Duration, ready_ttl: Duration) -> usize {
        let candidates: Vec<(Uuid, ViewSlot, Duration)> = self
            .pages
            .read()
            .await
            .iter()
            .map(|(id, entry)| (*id, entry.slot.clone(), entry.last_seen.elapsed()))
            .collect();
        let mut pruned = 0;
        for (page_id, slot, idle) in candidates {
            let limit = match slot.snapshot().await {
                ViewState::Ready(_) => ready_ttl.max(ttl),
                _ => ttl,
            };
            if idle >= limit && self.unmount(&page_id).await {
                pruned += 1;
            }
        }
        if pruned > 0 {
            let remaining = self.mounted_count().await;
            info!(pruned, remaining, "pruned expired pages");
        }
        pruned
    }

    pub async fn unmount_all(&self) {
        let drained: Vec<PageEntry> = self.pages.write().await.drain().map(|(_, e)| e).collect();
        for entry in drained {
            entry.slot.unmount().await;
        }
    }

    pub async fn mounted_count(&self) -> usize {
        self.pages.read().await.len()
    }
}

async fn load_credentials(
    page_id: Uuid,
    slot: ViewSlot,
    liveness: Liveness,
    loader: Arc<dyn CredentialLoader>,
) {
    let result = loader.fetch().await;
    if let Err(err) = &result {
        error!(%page_id, %err, "embed credential load failed");
    }
    match slot.settle(&liveness, result).await {
        Ok(WriteOutcome::Applied) => {
            debug!(%page_id, "embed credentials settled");
        }
        Ok(WriteOutcome::Discarded) => {
            debug!(%page_id, "page unmounted before credentials resolved; discarding");
        }
        Err(err) => {
            warn!(%page_id, %err, "credential result rejected");
        }
    }
}

#[cfg(test)]
pub mod test_support {
    use crate::credentials::{CredentialBundle, CredentialLoader, LoadError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    pub fn bundle() -> CredentialBundle {
        CredentialBundle {
            token: "t".into(),
            embed_url: "https://app.powerbi.com/reportEmbed".into(),
            report_id: "r".into(),
        }
    }

    /// Loader that resolves immediately with a fixed result.
    pub struct StaticLoader {
        pub missing: Option<&'static str>,
        pub calls: AtomicUsize,
    }

    impl StaticLoader {
        pub fn ok() -> Self {
            Self {
                missing: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn missing(field: &'static str) -> Self {
            Self {
                missing: Some(field),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CredentialLoader for StaticLoader {
        async fn fetch(&self) -> Result<CredentialBundle, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.missing {
                None => Ok(bundle()),
                Some(field) => Err(LoadError::MissingField(field)),
            }
        }
    }

    /// Loader that blocks until released.
    #[derive(Default)]
    pub struct GatedLoader {
        pub gate: Notify,
    }

    #[async_trait]
    impl CredentialLoader for GatedLoader {
        async fn fetch(&self) -> Result<CredentialBundle, LoadError> {
            self.gate.notified().await;
            Ok(bundle())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::view::ViewState;
    use std::sync::atomic::Ordering;

    async fn settled(slot: &ViewSlot) -> ViewState {
        for _ in 0..100 {
            let state = slot.snapshot().await;
            if state != ViewState::Loading {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        slot.snapshot().await
    }

    #[tokio::test]
    async fn mount_fetches_once_and_becomes_ready() {
        let registry = PageRegistry::new();
        let loader = Arc::new(StaticLoader::ok());
        let (page_id, slot) = registry.mount(loader.clone()).await;
        assert_eq!(settled(&slot).await, ViewState::Ready(bundle()));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert!(registry.get(&page_id).await.is_some());
    }

    #[tokio::test]
    async fn missing_field_never_reaches_ready() {
        let registry = PageRegistry::new();
        let (_, slot) = registry
            .mount(Arc::new(StaticLoader::missing("reportId")))
            .await;
        assert_eq!(
            settled(&slot).await,
            ViewState::Error {
                message: "No reportId returned from /embed-token".into()
            }
        );
    }

    #[tokio::test]
    async fn unmount_before_resolution_discards_result() {
        let registry = PageRegistry::new();
        let loader = Arc::new(GatedLoader::default());
        let (page_id, slot) = registry.mount(loader.clone()).await;
        assert!(registry.unmount(&page_id).await);
        loader.gate.notify_one();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(slot.snapshot().await, ViewState::Loading);
        assert!(registry.get(&page_id).await.is_none());
    }

    #[tokio::test]
    async fn prunes_only_expired_pages() {
        let registry = PageRegistry::new();
        let hour = Duration::from_secs(3600);
        registry.mount(Arc::new(GatedLoader::default())).await;
        assert_eq!(registry.prune_expired(Duration::from_secs(60), hour).await, 0);
        assert_eq!(registry.prune_expired(Duration::ZERO, hour).await, 1);
        assert_eq!(registry.mounted_count().await, 0);
    }

    #[tokio::test]
    async fn ready_pages_outlive_the_idle_ttl() {
        let registry = PageRegistry::new();
        let (page_id, slot) = registry.mount(Arc::new(StaticLoader::ok())).await;
        assert_eq!(settled(&slot).await, ViewState::Ready(bundle()));

        let day = Duration::from_secs(86_400);
        assert_eq!(registry.prune_expired(Duration::ZERO, day).await, 0);
        assert!(registry.get(&page_id).await.is_some());

        assert_eq!(registry.prune_expired(Duration::ZERO, Duration::ZERO).await, 1);
        assert!(registry.get(&page_id).await.is_none());
    }

    #[tokio::test]
    async fn lookups_count_as_activity() {
        let registry = PageRegistry::new();
        let (page_id, _) = registry.mount(Arc::new(GatedLoader::default())).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(registry.get(&page_id).await.is_some());
        let ttl = Duration::from_millis(20);
        assert_eq!(registry.prune_expired(ttl, ttl).await, 0);
    }

    #[tokio::test]
    async fn unmount_unknown_page_is_a_no_op() {
        let registry = PageRegistry::new();
        assert!(!registry.unmount(&Uuid::new_v4()).await);
    }
}
