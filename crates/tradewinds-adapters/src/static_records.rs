//! Adapter over a fixed in-memory record list. Backs push-style datasets
//! whose payloads arrive out of band, plus fixtures and tests.

use async_trait::async_trait;

use tradewinds_core::{Cursor, RawItem, Row};

use crate::{AdapterError, SourceAdapter};

pub struct StaticRecordAdapter {
    name: String,
    records: Vec<RawItem>,
}

impl StaticRecordAdapter {
    pub fn new(name: &str, records: Vec<RawItem>) -> Self {
        Self {
            name: name.to_string(),
            records,
        }
    }
}

#[async_trait]
impl SourceAdapter for StaticRecordAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&mut self, _cursor: Option<&Cursor>) -> Result<Vec<RawItem>, AdapterError> {
        Ok(self.records.clone())
    }

    fn transform(&mut self, item: &RawItem) -> Vec<Row> {
        Row::from_json_object(item).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn non_object_items_are_dropped_by_the_base_transform() {
        let mut adapter = StaticRecordAdapter::new(
            "static.test",
            vec![serde_json::json!({"a": 1}), serde_json::json!(42)],
        );
        let items = adapter.fetch(None).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(adapter.transform(&items[0]).len(), 1);
        assert!(adapter.transform(&items[1]).is_empty());
    }
}
