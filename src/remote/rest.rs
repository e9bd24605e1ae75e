use async_trait::async_trait;
use reqwest::{Client, Response};

use super::{ChangeStream, RemoteError, RemoteMirror, realtime};
use crate::models::CalendarRow;

/// Mirror backed by a PostgREST-style HTTP API (`/rest/v1/<table>`)
/// with a realtime websocket for change notifications.
#[derive(Debug, Clone)]
pub struct RestMirror {
    client: Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl RestMirror {
    pub fn new(base_url: &str, api_key: &str, table: &str) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .user_agent(concat!("studylog/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            table: table.to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    async fn check(response: Response) -> Result<Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl RemoteMirror for RestMirror {
    async fn select_all(&self) -> Result<Vec<CalendarRow>, RemoteError> {
        let response = self
            .client
            .get(self.endpoint())
            .query(&[("select", "*"), ("order", "date.asc")])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let rows = Self::check(response).await?.json::<Vec<CalendarRow>>().await?;
        tracing::debug!(rows = rows.len(), table = %self.table, "fetched remote rows");
        Ok(rows)
    }

    async fn upsert(&self, row: CalendarRow) -> Result<(), RemoteError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[&row])
            .send()
            .await?;
        Self::check(response).await?;
        tracing::debug!(date = %row.date, "upserted remote row");
        Ok(())
    }

    async fn subscribe(&self) -> Result<ChangeStream, RemoteError> {
        let url = realtime::websocket_url(&self.base_url, &self.api_key);
        realtime::subscribe(&url, &self.api_key, &self.table).await
    }
}
