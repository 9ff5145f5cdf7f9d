use std::collections::HashMap;

use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::retry::RetryPolicy;

use super::error::SheetsError;
use super::types::{
    COL_LOCK, LockStamp, REQUIRED_COLUMNS, RowStatus, WorkItem, column_to_a1,
};

const API_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Operations the orchestrator needs from the work-item store.
///
/// Implemented by [`SheetsClient`] against the live spreadsheet and by
/// in-memory fakes in tests.
pub trait WorkItemStore {
    /// First row with status `Prepared` and an empty or expired lock,
    /// in ascending row order.
    fn find_prepared(
        &self,
        tab: &str,
    ) -> impl Future<Output = Result<Option<WorkItem>, SheetsError>> + Send;

    /// Write `stamp` into the row's Lock cell and verify ownership.
    /// `false` means another run claimed the row concurrently.
    fn try_acquire(
        &self,
        tab: &str,
        row: u32,
        stamp: &LockStamp,
    ) -> impl Future<Output = Result<bool, SheetsError>> + Send;

    /// Persist several columns of one row in a single batched request.
    fn batch_update(
        &self,
        tab: &str,
        row: u32,
        updates: &[(&str, String)],
    ) -> impl Future<Output = Result<(), SheetsError>> + Send;

    /// Clear the row's Lock cell.
    fn release(&self, tab: &str, row: u32) -> impl Future<Output = Result<(), SheetsError>> + Send;
}

/// Cached header information for one worksheet tab.
#[derive(Debug, Clone)]
struct TabLayout {
    headers: Vec<String>,
    last_column: String,
}

impl TabLayout {
    fn column_index(&self, name: &str) -> Option<u32> {
        self.headers
            .iter()
            .position(|h| h == name)
            .map(|idx| idx as u32 + 1)
    }
}

/// Google Sheets values-API client scoped to a single spreadsheet.
///
/// Authentication uses a bearer access token supplied by configuration;
/// obtaining and refreshing the token is the deployment's concern.
pub struct SheetsClient {
    http: Client,
    base_url: String,
    spreadsheet_id: String,
    access_token: String,
    retry: RetryPolicy,
    layouts: Mutex<HashMap<String, TabLayout>>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

impl SheetsClient {
    pub fn new(spreadsheet_id: String, access_token: String, retry: RetryPolicy) -> Self {
        Self::with_base_url(spreadsheet_id, access_token, retry, API_URL.to_string())
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(
        spreadsheet_id: String,
        access_token: String,
        retry: RetryPolicy,
        base_url: String,
    ) -> Self {
        let http = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            base_url,
            spreadsheet_id,
            access_token,
            retry,
            layouts: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch and validate the header row of `tab`, reporting any missing
    /// required columns. Used by the `check` command.
    pub async fn verify_tab(&self, tab: &str) -> Result<(), SheetsError> {
        self.layout(tab).await.map(|_| ())
    }

    fn a1_range(tab: &str, cells: &str) -> String {
        // Single quotes in A1 notation are escaped by doubling.
        format!("'{}'!{}", tab.replace('\'', "''"), cells)
    }

    async fn layout(&self, tab: &str) -> Result<TabLayout, SheetsError> {
        let mut cache = self.layouts.lock().await;
        if let Some(layout) = cache.get(tab) {
            return Ok(layout.clone());
        }

        let rows = self.get_range(&Self::a1_range(tab, "1:1")).await?;
        let headers: Vec<String> = rows
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(|h| h.trim().to_string())
            .collect();

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .filter(|col| !headers.iter().any(|h| h == *col))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(SheetsError::MissingColumns {
                tab: tab.to_string(),
                columns: missing.join(", "),
            });
        }

        let layout = TabLayout {
            last_column: column_to_a1(headers.len() as u32),
            headers,
        };
        cache.insert(tab.to_string(), layout.clone());
        Ok(layout)
    }

    async fn cell_range(&self, tab: &str, column: &str, row: u32) -> Result<String, SheetsError> {
        let layout = self.layout(tab).await?;
        let index = layout
            .column_index(column)
            .ok_or_else(|| SheetsError::UnknownColumn(column.to_string()))?;
        Ok(Self::a1_range(tab, &format!("{}{row}", column_to_a1(index))))
    }

    async fn get_range(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let url = format!("{}/{}/values/{range}", self.base_url, self.spreadsheet_id);
        let http = self.http.clone();
        let token = self.access_token.clone();
        self.retry
            .run("sheets-get", async move || {
                let response = http
                    .get(&url)
                    .bearer_auth(&token)
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    let message = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "unknown error".to_string());
                    return Err(SheetsError::ApiError {
                        status: status.as_u16(),
                        message,
                    });
                }
                let body = response.json::<ValueRange>().await?;
                Ok(body.values)
            })
            .await
    }

    async fn put_cell(&self, range: &str, value: &str) -> Result<(), SheetsError> {
        let url = format!(
            "{}/{}/values/{range}?valueInputOption=RAW",
            self.base_url, self.spreadsheet_id
        );
        let body = json!({ "values": [[value]] });
        let http = self.http.clone();
        let token = self.access_token.clone();
        self.retry
            .run("sheets-update", async move || {
                let response = http
                    .put(&url)
                    .bearer_auth(&token)
                    .json(&body)
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    let message = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "unknown error".to_string());
                    return Err(SheetsError::ApiError {
                        status: status.as_u16(),
                        message,
                    });
                }
                Ok(())
            })
            .await
    }
}

impl WorkItemStore for SheetsClient {
    async fn find_prepared(&self, tab: &str) -> Result<Option<WorkItem>, SheetsError> {
        let layout = self.layout(tab).await?;
        let range = Self::a1_range(tab, &format!("A2:{}", layout.last_column));
        let rows = self.get_range(&range).await?;
        debug!(tab, rows = rows.len(), "fetched worksheet rows");

        let now = Utc::now();
        for (offset, cells) in rows.iter().enumerate() {
            let item = WorkItem::from_cells(offset as u32 + 2, &layout.headers, cells);
            if item.status == Some(RowStatus::Prepared) && item.is_available(now) {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    async fn try_acquire(
        &self,
        tab: &str,
        row: u32,
        stamp: &LockStamp,
    ) -> Result<bool, SheetsError> {
        let range = self.cell_range(tab, COL_LOCK, row).await?;
        self.put_cell(&range, &stamp.render()).await?;

        // The values API has no compare-and-set; reading the cell back
        // detects a concurrent claimer that wrote after us.
        let cells = self.get_range(&range).await?;
        let current = cells
            .first()
            .and_then(|r| r.first())
            .map(|v| v.trim().to_string())
            .unwrap_or_default();
        let owned = current == stamp.render();
        if owned {
            info!(tab, row, locked_until = %stamp, "row locked");
        }
        Ok(owned)
    }

    async fn batch_update(
        &self,
        tab: &str,
        row: u32,
        updates: &[(&str, String)],
    ) -> Result<(), SheetsError> {
        if updates.is_empty() {
            return Ok(());
        }
        let layout = self.layout(tab).await?;
        let mut data = Vec::with_capacity(updates.len());
        for (column, value) in updates {
            let index = layout
                .column_index(column)
                .ok_or_else(|| SheetsError::UnknownColumn(column.to_string()))?;
            data.push(json!({
                "range": Self::a1_range(tab, &format!("{}{row}", column_to_a1(index))),
                "values": [[value]],
            }));
        }
        let url = format!(
            "{}/{}/values:batchUpdate",
            self.base_url, self.spreadsheet_id
        );
        let body = json!({ "valueInputOption": "RAW", "data": data });
        let http = self.http.clone();
        let token = self.access_token.clone();

        self.retry
            .run("sheets-batch-update", async move || {
                let response = http
                    .post(&url)
                    .bearer_auth(&token)
                    .json(&body)
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    let message = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "unknown error".to_string());
                    return Err(SheetsError::ApiError {
                        status: status.as_u16(),
                        message,
                    });
                }
                Ok(())
            })
            .await
    }

    async fn release(&self, tab: &str, row: u32) -> Result<(), SheetsError> {
        let range = self.cell_range(tab, COL_LOCK, row).await?;
        self.put_cell(&range, "").await?;
        info!(tab, row, "row lock released");
        Ok(())
    }
}
