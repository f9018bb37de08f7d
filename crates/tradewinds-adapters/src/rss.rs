//! RSS/Atom poll adapter: repeated polls only yield entries published
//! strictly after the supplied cursor timestamp.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;

use tradewinds_core::{Cursor, RawItem, Row};
use tradewinds_store::{FetchError, HttpClient, HttpClientConfig};

use crate::{AdapterError, SourceAdapter};

pub struct RssAdapter {
    name: String,
    url: String,
    http: HttpClient,
}

impl RssAdapter {
    pub fn new(name: &str, url: &str, config: HttpClientConfig) -> Result<Self, FetchError> {
        Ok(Self {
            name: name.to_string(),
            url: url.to_string(),
            http: HttpClient::new(config)?,
        })
    }

    /// Parse a feed document and keep entries newer than `cutoff`. Entries
    /// without a published timestamp always pass.
    pub(crate) fn entries_after(
        source: &str,
        payload: &[u8],
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawItem>, AdapterError> {
        let feed = feed_rs::parser::parse(payload)
            .map_err(|err| AdapterError::Malformed(format!("unparsable feed: {err}")))?;

        let mut items = Vec::new();
        for entry in feed.entries {
            let published = entry.published.or(entry.updated);
            if let (Some(ts), Some(cut)) = (published, cutoff) {
                if ts <= cut {
                    continue;
                }
            }
            items.push(json!({
                "source": source,
                "title": entry.title.map(|t| t.content),
                "url": entry.links.first().map(|l| l.href.clone()),
                "summary": entry.summary.map(|t| t.content),
                "published_at": published.map(|ts| ts.to_rfc3339()),
            }));
        }
        Ok(items)
    }
}

#[async_trait]
impl SourceAdapter for RssAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&mut self, cursor: Option<&Cursor>) -> Result<Vec<RawItem>, AdapterError> {
        let resp = self.http.get_bytes(&self.name, &self.url, &[]).await?;
        let cutoff = cursor.and_then(Cursor::as_timestamp);
        Self::entries_after(&self.name, &resp.body, cutoff)
    }

    fn transform(&mut self, item: &RawItem) -> Vec<Row> {
        Row::from_json_object(item).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel>
  <title>Press releases</title>
  <item>
    <title>Monetary policy decisions</title>
    <link>https://cb.example/press/decision</link>
    <description>Rates unchanged.</description>
    <pubDate>Wed, 03 Jan 2024 13:45:00 GMT</pubDate>
  </item>
  <item>
    <title>Account of the December meeting</title>
    <link>https://cb.example/press/minutes</link>
    <description>Minutes.</description>
    <pubDate>Mon, 01 Jan 2024 09:00:00 GMT</pubDate>
  </item>
</channel></rss>"#;

    #[test]
    fn cursor_filters_strictly_older_entries() {
        let cutoff = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).single();
        let items = RssAdapter::entries_after("policy.ecb.rss", FEED.as_bytes(), cutoff).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["title"], json!("Monetary policy decisions"));
        assert_eq!(items[0]["url"], json!("https://cb.example/press/decision"));
    }

    #[test]
    fn no_cursor_yields_every_entry() {
        let items = RssAdapter::entries_after("policy.ecb.rss", FEED.as_bytes(), None).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["summary"], json!("Minutes."));
    }

    #[test]
    fn garbage_payloads_are_a_permanent_error() {
        let err = RssAdapter::entries_after("policy.ecb.rss", b"not xml at all", None).unwrap_err();
        assert!(matches!(err, AdapterError::Malformed(_)));
    }
}
