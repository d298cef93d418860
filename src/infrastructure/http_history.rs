// HTTP history source implementation
use crate::application::history_source::HistorySource;
use crate::application::usage_deriver::{DoorEvent, door_events};
use crate::domain::telemetry::RawSeriesSet;
use crate::error::{DecodeError, HistoryError};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Items inside one group of a history document, keyed by id or listed.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HistoryGroup {
    Keyed(BTreeMap<String, RawSeriesSet>),
    Listed(Vec<RawSeriesSet>),
}

impl HistoryGroup {
    fn into_items(self) -> Vec<RawSeriesSet> {
        match self {
            HistoryGroup::Keyed(items) => items.into_values().collect(),
            HistoryGroup::Listed(items) => items,
        }
    }
}

/// Every item of a `{group: {id: {channel: [[ts, value], ...]}}}` document.
pub fn parse_history_items(body: &str) -> Result<Vec<RawSeriesSet>, DecodeError> {
    let document: BTreeMap<String, HistoryGroup> = serde_json::from_str(body)?;
    Ok(document
        .into_values()
        .flat_map(HistoryGroup::into_items)
        .collect())
}

/// A chart endpoint carries one item; when several arrive the last one wins.
pub fn parse_history_document(body: &str) -> Result<RawSeriesSet, DecodeError> {
    Ok(parse_history_items(body)?.pop().unwrap_or_default())
}

#[derive(Debug, Clone)]
pub struct HttpHistorySource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpHistorySource {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_text(&self, url: &str) -> Result<String, HistoryError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(HistoryError::Status { status, body });
        }

        Ok(response.text().await?)
    }

    /// Open/close history of all doors, oldest first
    pub async fn fetch_door_events(&self) -> Result<Vec<DoorEvent>, HistoryError> {
        let body = self.get_text(&format!("{}/doors", self.base_url)).await?;
        let doors = parse_history_items(&body)?;
        tracing::debug!("Loaded history for {} doors", doors.len());
        Ok(door_events(&doors))
    }
}

#[async_trait]
impl HistorySource for HttpHistorySource {
    async fn fetch(&self, source_url: &str) -> Result<RawSeriesSet, HistoryError> {
        let body = self.get_text(source_url).await?;
        Ok(parse_history_document(&body)?)
    }
}
