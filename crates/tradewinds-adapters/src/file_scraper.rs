//! File/HTML scrape adapter. A content checksum suppresses re-ingestion of
//! unchanged upstream documents; CSV payloads fan out into one item per
//! record.

use async_trait::async_trait;
use serde_json::{json, Map, Value as JsonValue};
use sha2::{Digest, Sha256};

use tradewinds_core::{Cursor, RawItem, Row};
use tradewinds_store::{FetchError, HttpClient, HttpClientConfig};

use crate::{AdapterError, SourceAdapter};

pub struct FileScraperAdapter {
    name: String,
    url: String,
    http: HttpClient,
    last_checksum: Option<String>,
}

impl FileScraperAdapter {
    pub fn new(name: &str, url: &str, config: HttpClientConfig) -> Result<Self, FetchError> {
        Ok(Self {
            name: name.to_string(),
            url: url.to_string(),
            http: HttpClient::new(config)?,
            last_checksum: None,
        })
    }

    /// True when the payload hash matches the previous successful fetch;
    /// otherwise the hash is remembered for the next poll.
    pub(crate) fn is_unchanged(&mut self, payload: &[u8]) -> bool {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        let checksum = hex::encode(hasher.finalize());
        if self.last_checksum.as_deref() == Some(checksum.as_str()) {
            return true;
        }
        self.last_checksum = Some(checksum);
        false
    }

    pub(crate) fn parse_payload(
        source: &str,
        url: &str,
        payload: &[u8],
    ) -> Result<Vec<RawItem>, AdapterError> {
        let text = String::from_utf8_lossy(payload);
        if url.ends_with(".csv") {
            return parse_csv(&text);
        }
        Ok(vec![json!({"source": source, "content": text})])
    }
}

fn parse_csv(text: &str) -> Result<Vec<RawItem>, AdapterError> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|err| AdapterError::Malformed(format!("csv header: {err}")))?
        .clone();

    let mut items = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| AdapterError::Malformed(format!("csv record: {err}")))?;
        let mut object = Map::new();
        for (header, field) in headers.iter().zip(record.iter()) {
            object.insert(header.to_string(), JsonValue::String(field.to_string()));
        }
        items.push(JsonValue::Object(object));
    }
    Ok(items)
}

#[async_trait]
impl SourceAdapter for FileScraperAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&mut self, cursor: Option<&Cursor>) -> Result<Vec<RawItem>, AdapterError> {
        let url = cursor
            .and_then(Cursor::as_text)
            .unwrap_or(self.url.as_str())
            .to_string();
        let resp = self.http.get_bytes(&self.name, &url, &[]).await?;
        if self.is_unchanged(&resp.body) {
            return Ok(Vec::new());
        }
        Self::parse_payload(&self.name, &url, &resp.body)
    }

    fn transform(&mut self, item: &RawItem) -> Vec<Row> {
        Row::from_json_object(item).into_iter().collect()
    }
}
