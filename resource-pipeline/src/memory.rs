//! In-memory data source
//!
//! Evaluates a [`SourceQuery`] against a vector of rows: filter, keyset,
//! stable sort by the compiled ordering, then skip/take. Used by tests and by
//! embedders that already hold their rows in memory.

use std::sync::Arc;

use crate::source::{
    ResourceSource, SourceError, SourceOperation, SourceQuery, SourceResult, SourceRow,
};

/// A [`ResourceSource`] over rows held in memory
#[derive(Debug, Clone)]
pub struct InMemorySource<T> {
    rows: Arc<Vec<T>>,
    failure: Option<String>,
}

impl<T> InMemorySource<T> {
    /// Create a source over the given rows, in their natural order
    pub fn new(rows: Vec<T>) -> Self {
        Self {
            rows: Arc::new(rows),
            failure: None,
        }
    }

    /// Make every operation fail with the given message
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Number of rows held, ignoring any query
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the source holds no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn check(&self, operation: SourceOperation) -> SourceResult<()> {
        match &self.failure {
            Some(message) => Err(SourceError::new(operation, message.clone())),
            None => Ok(()),
        }
    }
}

impl<T: SourceRow + Clone> InMemorySource<T> {
    /// Evaluate a query synchronously
    pub fn evaluate(&self, query: &SourceQuery) -> Vec<T> {
        let mut matched: Vec<&T> = self.rows.iter().filter(|row| query.matches(*row)).collect();

        if !query.ordering.is_empty() {
            // sort_by is stable, equal keys keep source order
            matched.sort_by(|a, b| query.ordering.compare(*a, *b));
        }

        let skip = usize::try_from(query.skip.unwrap_or(0)).unwrap_or(usize::MAX);
        let take = query
            .take
            .map_or(usize::MAX, |t| usize::try_from(t).unwrap_or(usize::MAX));

        matched.into_iter().skip(skip).take(take).cloned().collect()
    }
}

impl<T> ResourceSource for InMemorySource<T>
where
    T: SourceRow + Clone + Send + Sync,
{
    type Row = T;

    async fn count(&self, query: &SourceQuery) -> SourceResult<u64> {
        self.check(SourceOperation::Count)?;
        let count = self.rows.iter().filter(|row| query.matches(*row)).count();
        Ok(count as u64)
    }

    async fn fetch(&self, query: &SourceQuery) -> SourceResult<Vec<T>> {
        self.check(SourceOperation::Fetch)?;
        Ok(self.evaluate(query))
    }
}
