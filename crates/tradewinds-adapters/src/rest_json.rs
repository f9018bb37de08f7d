//! REST/JSON pull adapter with bounded retry via the shared HTTP client.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use tradewinds_core::{BackfillWindow, Cursor, RawItem, Row};
use tradewinds_store::{FetchError, HttpClient, HttpClientConfig};

use crate::{AdapterError, SourceAdapter};

pub struct RestJsonAdapter {
    name: String,
    base_url: String,
    path: String,
    query: Vec<(String, String)>,
    http: HttpClient,
    window: Option<BackfillWindow>,
}

impl RestJsonAdapter {
    pub fn new(
        name: &str,
        base_url: &str,
        path: &str,
        config: HttpClientConfig,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            path: path.to_string(),
            query: Vec::new(),
            http: HttpClient::new(config)?,
            window: None,
        })
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    fn url_for(&self, cursor: Option<&Cursor>) -> String {
        let path = cursor
            .and_then(Cursor::as_text)
            .unwrap_or(self.path.as_str());
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl SourceAdapter for RestJsonAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&mut self, cursor: Option<&Cursor>) -> Result<Vec<RawItem>, AdapterError> {
        let url = self.url_for(cursor);
        let mut query = self.query.clone();
        if let Some(window) = self.window {
            query.push(("start".to_string(), window.start.to_rfc3339()));
            query.push(("end".to_string(), window.end.to_rfc3339()));
        }
        let body = self.http.get_json(&self.name, &url, &query).await?;
        Ok(match body {
            JsonValue::Array(items) => items,
            other => vec![other],
        })
    }

    fn transform(&mut self, item: &RawItem) -> Vec<Row> {
        Row::from_json_object(item).into_iter().collect()
    }

    fn set_window(&mut self, window: BackfillWindow) {
        self.window = Some(window);
    }
}
