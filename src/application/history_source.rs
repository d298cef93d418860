// History source trait for chart data access
use crate::domain::telemetry::RawSeriesSet;
use crate::error::HistoryError;
use async_trait::async_trait;

#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Fetch the raw history document behind `source_url`
    async fn fetch(&self, source_url: &str) -> Result<RawSeriesSet, HistoryError>;
}
