use crate::domain::{Query, Row, StorageError, TableSchema};
use async_trait::async_trait;
use std::sync::Arc;

/// Row-level access to the relational store.
///
/// Implementations receive identifiers only through [`TableSchema`], and must
/// reject filters or orderings on columns the schema does not declare.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn fetch_row(&self, schema: &TableSchema, id: i64) -> Result<Option<Row>, StorageError>;

    /// Inserts `row` and returns the allocated primary key.
    async fn insert_row(&self, schema: &TableSchema, row: &Row) -> Result<i64, StorageError>;

    async fn update_row(&self, schema: &TableSchema, id: i64, row: &Row) -> Result<(), StorageError>;

    /// Returns the number of deleted rows; zero is not an error.
    async fn delete_row(&self, schema: &TableSchema, id: i64) -> Result<u64, StorageError>;

    async fn select_rows(&self, schema: &TableSchema, query: &Query) -> Result<Vec<Row>, StorageError>;

    /// Counts rows matching the query's filters. Paging is ignored.
    async fn count_rows(&self, schema: &TableSchema, query: &Query) -> Result<u64, StorageError>;

    async fn is_patch_applied(&self, name: &str) -> Result<bool, StorageError>;

    async fn record_patch(&self, name: &str) -> Result<(), StorageError>;

    /// Starts a unit of work. Its writes become visible on commit and are
    /// discarded when it is rolled back or dropped. Transactions do not nest.
    async fn begin(&self) -> Result<StorageTransaction, StorageError>;
}

/// Commit and savepoint control for a storage opened by [`Storage::begin`].
#[async_trait]
pub trait TransactionControl: Send + Sync {
    async fn savepoint(&self) -> Result<(), StorageError>;

    /// Undoes everything written since the last savepoint.
    async fn rollback_to_savepoint(&self) -> Result<(), StorageError>;

    async fn commit(&self) -> Result<(), StorageError>;

    async fn rollback(&self) -> Result<(), StorageError>;
}

pub struct StorageTransaction {
    storage: Arc<dyn Storage>,
    control: Arc<dyn TransactionControl>,
}

impl StorageTransaction {
    pub fn new<T>(inner: T) -> Self
    where
        T: Storage + TransactionControl + 'static,
    {
        let inner = Arc::new(inner);
        Self {
            storage: inner.clone(),
            control: inner,
        }
    }

    /// Storage whose reads and writes run inside this transaction.
    pub fn storage(&self) -> Arc<dyn Storage> {
        self.storage.clone()
    }

    pub async fn savepoint(&self) -> Result<(), StorageError> {
        self.control.savepoint().await
    }

    pub async fn rollback_to_savepoint(&self) -> Result<(), StorageError> {
        self.control.rollback_to_savepoint().await
    }

    pub async fn commit(self) -> Result<(), StorageError> {
        self.control.commit().await
    }

    pub async fn rollback(self) -> Result<(), StorageError> {
        self.control.rollback().await
    }
}

pub(crate) fn nested_transaction() -> StorageError {
    StorageError::Database("A transaction is already in progress".to_string())
}

/// Checks every column a query touches against the schema.
pub fn validate_query(schema: &TableSchema, query: &Query) -> Result<(), StorageError> {
    for group in &query.groups {
        for filter in &group.filters {
            schema.column(&filter.field)?;
        }
    }
    for order in &query.orders {
        schema.column(&order.field)?;
    }
    Ok(())
}

/// Checks every key of a row against the schema.
pub fn validate_row(schema: &TableSchema, row: &Row) -> Result<(), StorageError> {
    for key in row.keys() {
        schema.column(key)?;
    }
    Ok(())
}
