use crate::core::analytics::AnalyticsViews;
use crate::core::filter::DateFilter;
use crate::core::ledger::Snapshot;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MemoKey {
    revision: u64,
    filter: DateFilter,
    lower_bound: Option<DateTime<Utc>>,
}

/// Memoizes the analytics views of the last (snapshot revision, filter,
/// window) it was asked for. A change to any of them recomputes.
///
/// Revisions are only comparable within one ledger, so keep one selector
/// per ledger.
#[derive(Clone, Default)]
pub struct AnalyticsSelector {
    inner: Arc<Mutex<Option<(MemoKey, Arc<AnalyticsViews>)>>>,
}

impl AnalyticsSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn select(
        &self,
        snapshot: &Snapshot,
        filter: DateFilter,
        now: DateTime<Utc>,
    ) -> Arc<AnalyticsViews> {
        let key = MemoKey {
            revision: snapshot.revision(),
            filter,
            lower_bound: filter.lower_bound(now),
        };

        let mut memo = self.inner.lock().await;
        if let Some((cached_key, views)) = memo.as_ref()
            && *cached_key == key
        {
            debug!(revision = key.revision, %filter, "Selector HIT");
            return Arc::clone(views);
        }

        debug!(revision = key.revision, %filter, "Selector MISS");
        let views = Arc::new(AnalyticsViews::compute(
            snapshot.transactions(),
            filter,
            now,
        ));
        *memo = Some((key, Arc::clone(&views)));
        views
    }
}
