//! Submission totals derived from the event store.

use std::sync::Arc;

use async_trait::async_trait;

use crate::sources::query::QueryShapes;
use crate::sources::{fields, field, EventStore, SourceError, SubmissionTotals};
use crate::time::TimeRange;

/// Counts every submission for a service with one event-store search.
#[derive(Clone)]
pub struct EventStoreTotals {
    store: Arc<dyn EventStore>,
    shapes: QueryShapes,
}

impl EventStoreTotals {
    pub fn new(store: Arc<dyn EventStore>, shapes: QueryShapes) -> Self {
        Self { store, shapes }
    }
}

#[async_trait]
impl SubmissionTotals for EventStoreTotals {
    async fn total_submissions(&self, service_id: &str, range: &TimeRange) -> Result<u64, SourceError> {
        let query = self.shapes.submission_total(&self.shapes.service_filter(service_id), *range);
        let rows = self.store.query(&query).await?;

        // A search with no matching events may return no row at all.
        let Some(row) = rows.first() else {
            return Ok(0);
        };
        match field(row, fields::TOTAL) {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|e| SourceError::Decode(format!("total '{}': {}", raw, e))),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EventStoreConfig;
    use crate::sources::{EventQuery, QueryKind, Row};
    use crate::time::Timestamp;

    struct FixedStore(Vec<Row>);

    #[async_trait]
    impl EventStore for FixedStore {
        async fn query(&self, query: &EventQuery) -> Result<Vec<Row>, SourceError> {
            assert_eq!(query.kind, QueryKind::SubmissionTotal);
            assert!(query.filter.contains("aem_service=svc-1"));
            Ok(self.0.clone())
        }
    }

    fn range() -> TimeRange {
        TimeRange::new(
            Timestamp::parse("2025-06-18 00:00:00").unwrap(),
            Timestamp::parse("2025-06-19 00:00:00").unwrap(),
        )
        .unwrap()
    }

    fn totals(rows: Vec<Row>) -> EventStoreTotals {
        EventStoreTotals::new(Arc::new(FixedStore(rows)), QueryShapes::new(EventStoreConfig::default()))
    }

    #[tokio::test]
    async fn test_reads_total_field() {
        let row: Row = [("total".to_string(), "1234".to_string())].into_iter().collect();
        assert_eq!(totals(vec![row]).total_submissions("svc-1", &range()).await.unwrap(), 1234);
    }

    #[tokio::test]
    async fn test_no_rows_means_zero() {
        assert_eq!(totals(Vec::new()).total_submissions("svc-1", &range()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_garbage_total_is_decode_error() {
        let row: Row = [("total".to_string(), "lots".to_string())].into_iter().collect();
        let result = totals(vec![row]).total_submissions("svc-1", &range()).await;
        assert!(matches!(result, Err(SourceError::Decode(_))));
    }
}
