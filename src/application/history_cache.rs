// History cache - Per-chart derived series with freshness window and background refresh
use crate::application::history_source::HistorySource;
use crate::application::scheduler::ScheduledTask;
use crate::application::usage_deriver::derive;
use crate::domain::telemetry::{ChartKind, DerivedSeriesSet, HistoryPeriod};
use crate::error::HistoryError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::time::Instant;

/// Presentation side of a chart.
pub trait ChartRenderer: Send + Sync {
    fn render(&self, chart_id: &str, kind: &ChartKind, series: &DerivedSeriesSet);
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub freshness: Duration,
    pub refresh_interval: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            freshness: Duration::from_secs(300),
            refresh_interval: Duration::from_secs(60),
        }
    }
}

/// How a request was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Served {
    Fetched,
    Cached,
    /// Fetch failed; whatever was cached stays on screen.
    Failed,
    /// A newer request for the chart, or its removal, took over while this
    /// one was fetching. Nothing was stored or rendered.
    Superseded,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    derived: Arc<DerivedSeriesSet>,
    fetched_at: Instant,
}

/// Everything the cache tracks for one chart. `token` identifies the request
/// that currently owns the chart; results from any other request are dropped.
#[derive(Debug, Default)]
struct Chart {
    token: u64,
    entry: Option<CacheEntry>,
    refresh: Option<ScheduledTask>,
}

struct Inner {
    source: Arc<dyn HistorySource>,
    renderer: Arc<dyn ChartRenderer>,
    settings: CacheSettings,
    next_token: AtomicU64,
    charts: Mutex<HashMap<String, Chart>>,
}

/// Shared handle to the per-chart cache. Scheduled refreshes only hold a weak
/// reference, so dropping the last handle cancels them all.
#[derive(Clone)]
pub struct HistoryCache {
    inner: Arc<Inner>,
}

impl HistoryCache {
    pub fn new(
        source: Arc<dyn HistorySource>,
        renderer: Arc<dyn ChartRenderer>,
        settings: CacheSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                renderer,
                settings,
                next_token: AtomicU64::new(0),
                charts: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Render `chart_id`, fetching when the entry is missing, stale or
    /// `force_refresh` is set, then schedule the next background refresh.
    pub async fn request(
        &self,
        chart_id: &str,
        kind: ChartKind,
        source_url: &str,
        force_refresh: bool,
    ) -> Served {
        let token = self.claim(chart_id);
        self.serve(chart_id, kind, source_url, force_refresh, token)
            .await
    }

    /// A new period is always fetched; later refreshes stay on that period.
    pub async fn request_period(
        &self,
        chart_id: &str,
        kind: ChartKind,
        base_url: &str,
        period: HistoryPeriod,
    ) -> Served {
        let source_url = format!("{}/{}", base_url.trim_end_matches('/'), period.as_segment());
        self.request(chart_id, kind, &source_url, true).await
    }

    pub fn cached(&self, chart_id: &str) -> Option<Arc<DerivedSeriesSet>> {
        self.charts()
            .get(chart_id)
            .and_then(|chart| chart.entry.as_ref())
            .map(|entry| entry.derived.clone())
    }

    pub fn has_pending_refresh(&self, chart_id: &str) -> bool {
        self.charts()
            .get(chart_id)
            .and_then(|chart| chart.refresh.as_ref())
            .is_some_and(ScheduledTask::is_pending)
    }

    /// Forget a chart that left the page. Its refresh is cancelled and any
    /// fetch still in flight for it is discarded on arrival.
    pub fn remove(&self, chart_id: &str) {
        let removed = self.charts().remove(chart_id);
        if let Some(refresh) = removed.and_then(|chart| chart.refresh) {
            refresh.cancel();
        }
    }

    /// Cancel every scheduled refresh and drop all entries.
    pub fn clear(&self) {
        let charts: Vec<Chart> = self.charts().drain().map(|(_, chart)| chart).collect();
        charts
            .into_iter()
            .filter_map(|chart| chart.refresh)
            .for_each(ScheduledTask::cancel);
    }

    /// Make a new request the owner of `chart_id`, cancelling its pending
    /// refresh.
    fn claim(&self, chart_id: &str) -> u64 {
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed) + 1;
        let mut charts = self.charts();
        let chart = charts.entry(chart_id.to_string()).or_default();
        chart.token = token;
        if let Some(pending) = chart.refresh.take() {
            pending.cancel();
        }
        token
    }

    fn is_current(&self, chart_id: &str, token: u64) -> bool {
        self.charts()
            .get(chart_id)
            .is_some_and(|chart| chart.token == token)
    }

    async fn serve(
        &self,
        chart_id: &str,
        kind: ChartKind,
        source_url: &str,
        force_refresh: bool,
        token: u64,
    ) -> Served {
        let cached = if force_refresh {
            None
        } else {
            self.fresh_entry(chart_id)
        };

        let served = match cached {
            Some(derived) => {
                tracing::debug!("Serving chart {} from cache", chart_id);
                self.inner.renderer.render(chart_id, &kind, &derived);
                Served::Cached
            }
            None => match self.load(chart_id, &kind, source_url, token).await {
                Ok(Some(derived)) => {
                    self.inner.renderer.render(chart_id, &kind, &derived);
                    Served::Fetched
                }
                Ok(None) => {
                    tracing::debug!("Discarding superseded fetch of chart {}", chart_id);
                    return Served::Superseded;
                }
                Err(_) if !self.is_current(chart_id, token) => return Served::Superseded,
                Err(e) => {
                    tracing::warn!("Keeping cached data for chart {}: {}", chart_id, e);
                    Served::Failed
                }
            },
        };

        self.schedule_refresh(chart_id, kind, source_url, token);
        served
    }

    /// Background refresh on behalf of the request holding `token`.
    async fn refresh(&self, chart_id: &str, kind: ChartKind, source_url: &str, token: u64) {
        if self.is_current(chart_id, token) {
            self.serve(chart_id, kind, source_url, false, token).await;
        }
    }

    fn fresh_entry(&self, chart_id: &str) -> Option<Arc<DerivedSeriesSet>> {
        self.charts()
            .get(chart_id)
            .and_then(|chart| chart.entry.as_ref())
            .filter(|entry| entry.fetched_at.elapsed() < self.inner.settings.freshness)
            .map(|entry| entry.derived.clone())
    }

    /// Fetch and derive. `Ok(None)` when the chart changed owner meanwhile.
    async fn load(
        &self,
        chart_id: &str,
        kind: &ChartKind,
        source_url: &str,
        token: u64,
    ) -> Result<Option<Arc<DerivedSeriesSet>>, HistoryError> {
        tracing::debug!("Fetching chart {} from {}", chart_id, source_url);
        let raw = self.inner.source.fetch(source_url).await?;

        let derived = Arc::new(match kind.usage_kind() {
            Some(usage) => derive(&raw, usage, chrono::Utc::now().timestamp_millis()),
            None => DerivedSeriesSet::passthrough(raw),
        });

        let mut charts = self.charts();
        match charts.get_mut(chart_id) {
            Some(chart) if chart.token == token => {
                chart.entry = Some(CacheEntry {
                    derived: derived.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(Some(derived))
            }
            _ => Ok(None),
        }
    }

    fn schedule_refresh(&self, chart_id: &str, kind: ChartKind, source_url: &str, token: u64) {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let id = chart_id.to_string();
        let url = source_url.to_string();
        let timer = ScheduledTask::after(self.inner.settings.refresh_interval, async move {
            if let Some(inner) = inner.upgrade() {
                HistoryCache { inner }.refresh(&id, kind, &url, token).await;
            }
        });

        let mut charts = self.charts();
        match charts.get_mut(chart_id) {
            Some(chart) if chart.token == token => {
                if let Some(previous) = chart.refresh.replace(timer) {
                    previous.cancel();
                }
            }
            _ => timer.cancel(),
        }
    }

    fn charts(&self) -> MutexGuard<'_, HashMap<String, Chart>> {
        self.inner
            .charts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
