use super::storage::{
    nested_transaction, validate_query, validate_row, Storage, StorageTransaction,
    TransactionControl,
};
use crate::domain::coerce::{coerce_bool, coerce_i64, coerce_text, coerce_timestamp, format_timestamp};
use crate::domain::{
    Column, ColumnKind, ConditionType, Filter, Query, Row, SortDirection, StorageError, TableSchema,
};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default, Clone)]
struct MemoryTable {
    last_id: i64,
    rows: BTreeMap<i64, Row>,
}

#[derive(Default, Clone)]
struct MemoryState {
    tables: HashMap<&'static str, MemoryTable>,
    patches: HashSet<String>,
}

#[derive(Default)]
struct FailureSwitches {
    writes: AtomicBool,
    deletes: AtomicBool,
    patch_records: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process table store following the query rules of [`super::PostgresStorage`]:
/// AND of OR-groups, case-insensitive `like`, nulls last ascending and a
/// primary-key tie-breaker. Text sorts by code point rather than by a
/// database collation.
///
/// Ids are allocated per table starting at 1 and never reused. Writes,
/// deletes and patch bookkeeping can be switched to fail, which the tests
/// use to reach the error paths.
///
/// A transaction works on a copy of the whole store and publishes it on
/// commit, replacing whatever other handles wrote in the meantime.
#[derive(Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<MemoryState>>,
    failures: Arc<FailureSwitches>,
    // Set on the staged copy held by a transaction
    publish_to: Option<Arc<Mutex<MemoryState>>>,
    savepoint: Mutex<Option<MemoryState>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.failures.writes.store(fail, AtomicOrdering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.failures.deletes.store(fail, AtomicOrdering::SeqCst);
    }

    pub fn set_fail_patch_records(&self, fail: bool) {
        self.failures.patch_records.store(fail, AtomicOrdering::SeqCst);
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        lock(&self.state)
    }

    fn check_writes(&self) -> Result<(), StorageError> {
        if self.failures.writes.load(AtomicOrdering::SeqCst) {
            return Err(StorageError::Database(
                "Connection lost while writing".to_string(),
            ));
        }
        Ok(())
    }
}

/// Converts a value to the canonical JSON shape of its column.
fn normalize(column: &Column, value: &Value) -> Result<Value, StorageError> {
    let invalid = |reason: String| StorageError::InvalidValue {
        column: column.name.to_string(),
        reason,
    };

    let normalized = match column.kind {
        ColumnKind::Integer => coerce_i64(value).map_err(invalid)?.map(Value::from),
        ColumnKind::Text => coerce_text(value).map(Value::String),
        ColumnKind::Boolean => coerce_bool(value).map_err(invalid)?.map(Value::Bool),
        ColumnKind::Timestamp => coerce_timestamp(value)
            .map_err(invalid)?
            .map(|ts| Value::String(format_timestamp(&ts))),
    };

    Ok(normalized.unwrap_or(Value::Null))
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_i64()
            .unwrap_or_default()
            .cmp(&y.as_i64().unwrap_or_default()),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// SQL `LIKE` with `%` and `_` wildcards and `\` escapes, case-insensitive.
fn like(text: &str, pattern: &str) -> bool {
    enum Token {
        Any,
        One,
        Char(char),
    }

    let mut tokens = Vec::new();
    let mut chars = pattern.chars().flat_map(char::to_lowercase);
    while let Some(ch) = chars.next() {
        tokens.push(match ch {
            '%' => Token::Any,
            '_' => Token::One,
            '\\' => Token::Char(chars.next().unwrap_or('\\')),
            other => Token::Char(other),
        });
    }

    let text: Vec<char> = text.chars().flat_map(char::to_lowercase).collect();

    // matches[j]: the first i characters of text match the first j tokens
    let mut matches = vec![false; tokens.len() + 1];
    matches[0] = true;
    for (j, token) in tokens.iter().enumerate() {
        matches[j + 1] = matches[j] && matches!(token, Token::Any);
    }

    for ch in &text {
        let mut next = vec![false; tokens.len() + 1];
        for (j, token) in tokens.iter().enumerate() {
            next[j + 1] = match token {
                Token::Any => next[j] || matches[j + 1],
                Token::One => matches[j],
                Token::Char(c) => matches[j] && c == ch,
            };
        }
        matches = next;
    }

    matches[tokens.len()]
}

fn matches_filter(schema: &TableSchema, row: &Row, filter: &Filter) -> Result<bool, StorageError> {
    let column = schema.column(&filter.field)?;
    let current = row.get(column.name).unwrap_or(&Value::Null);

    let matched = match filter.condition_type {
        ConditionType::Null => current.is_null(),
        ConditionType::Notnull => !current.is_null(),
        ConditionType::Eq if filter.value.is_null() => current.is_null(),
        ConditionType::Neq if filter.value.is_null() => !current.is_null(),
        _ if current.is_null() => {
            // NULL never satisfies a comparison, except an empty NOT IN
            filter.condition_type == ConditionType::Nin && filter.values().is_empty()
        }
        ConditionType::Like | ConditionType::Nlike => {
            // CAST(bool AS TEXT) in Postgres
            let text = match current {
                Value::Bool(flag) => flag.to_string(),
                other => coerce_text(other).unwrap_or_default(),
            };
            let pattern = coerce_text(&filter.value).unwrap_or_default();
            like(&text, &pattern) == (filter.condition_type == ConditionType::Like)
        }
        ConditionType::In | ConditionType::Nin => {
            let mut found = false;
            for value in filter.values() {
                if compare(current, &normalize(column, &value)?) == Ordering::Equal {
                    found = true;
                    break;
                }
            }
            found == (filter.condition_type == ConditionType::In)
        }
        op => {
            let ordering = compare(current, &normalize(column, &filter.value)?);
            match op {
                ConditionType::Eq => ordering == Ordering::Equal,
                ConditionType::Neq => ordering != Ordering::Equal,
                ConditionType::Gt => ordering == Ordering::Greater,
                ConditionType::Gteq => ordering != Ordering::Less,
                ConditionType::Lt => ordering == Ordering::Less,
                ConditionType::Lteq => ordering != Ordering::Greater,
                _ => false,
            }
        }
    };

    Ok(matched)
}

fn matches_query(schema: &TableSchema, row: &Row, query: &Query) -> Result<bool, StorageError> {
    for group in query.groups.iter().filter(|g| !g.filters.is_empty()) {
        let mut any = false;
        for filter in &group.filters {
            if matches_filter(schema, row, filter)? {
                any = true;
                break;
            }
        }
        if !any {
            return Ok(false);
        }
    }
    Ok(true)
}

fn order_rows(schema: &TableSchema, rows: &mut [Row], query: &Query) {
    rows.sort_by(|a, b| {
        for order in &query.orders {
            let x = a.get(&order.field).unwrap_or(&Value::Null);
            let y = b.get(&order.field).unwrap_or(&Value::Null);
            let asc = order.direction == SortDirection::Asc;
            let ordering = match (x.is_null(), y.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) if asc => Ordering::Greater,
                (true, false) => Ordering::Less,
                (false, true) if asc => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) if asc => compare(x, y),
                (false, false) => compare(y, x),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        let pk = schema.primary_key;
        compare(
            a.get(pk).unwrap_or(&Value::Null),
            b.get(pk).unwrap_or(&Value::Null),
        )
    });
}

fn filtered(schema: &TableSchema, table: Option<&MemoryTable>, query: &Query) -> Result<Vec<Row>, StorageError> {
    let mut rows = Vec::new();
    if let Some(table) = table {
        for row in table.rows.values() {
            if matches_query(schema, row, query)? {
                rows.push(row.clone());
            }
        }
    }
    Ok(rows)
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn fetch_row(&self, schema: &TableSchema, id: i64) -> Result<Option<Row>, StorageError> {
        let state = self.state();
        Ok(state
            .tables
            .get(schema.name)
            .and_then(|table| table.rows.get(&id))
            .cloned())
    }

    async fn insert_row(&self, schema: &TableSchema, row: &Row) -> Result<i64, StorageError> {
        self.check_writes()?;
        validate_row(schema, row)?;

        let mut stored = Row::new();
        for column in schema.columns {
            let value = match row.get(column.name) {
                Some(value) if column.name != schema.primary_key => normalize(column, value)?,
                _ => Value::Null,
            };
            stored.insert(column.name.to_string(), value);
        }

        let mut state = self.state();
        let table = state.tables.entry(schema.name).or_default();
        table.last_id += 1;
        let id = table.last_id;
        stored.insert(schema.primary_key.to_string(), Value::from(id));
        table.rows.insert(id, stored);

        Ok(id)
    }

    async fn update_row(&self, schema: &TableSchema, id: i64, row: &Row) -> Result<(), StorageError> {
        self.check_writes()?;
        validate_row(schema, row)?;

        let mut changes = Vec::new();
        for (key, value) in row.iter().filter(|(key, _)| key.as_str() != schema.primary_key) {
            let column = schema.column(key)?;
            changes.push((column.name, normalize(column, value)?));
        }

        let mut state = self.state();
        if let Some(existing) = state
            .tables
            .get_mut(schema.name)
            .and_then(|table| table.rows.get_mut(&id))
        {
            for (name, value) in changes {
                existing.insert(name.to_string(), value);
            }
        }

        Ok(())
    }

    async fn delete_row(&self, schema: &TableSchema, id: i64) -> Result<u64, StorageError> {
        if self.failures.deletes.load(AtomicOrdering::SeqCst) {
            return Err(StorageError::Database(
                "Connection lost while deleting".to_string(),
            ));
        }

        let mut state = self.state();
        let removed = state
            .tables
            .get_mut(schema.name)
            .and_then(|table| table.rows.remove(&id));

        Ok(u64::from(removed.is_some()))
    }

    async fn select_rows(&self, schema: &TableSchema, query: &Query) -> Result<Vec<Row>, StorageError> {
        validate_query(schema, query)?;

        let state = self.state();
        let mut rows = filtered(schema, state.tables.get(schema.name), query)?;
        drop(state);

        order_rows(schema, &mut rows, query);

        Ok(match query.page {
            Some(page) => rows
                .into_iter()
                .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
                .take(usize::try_from(page.size).unwrap_or(usize::MAX))
                .collect(),
            None => rows,
        })
    }

    async fn count_rows(&self, schema: &TableSchema, query: &Query) -> Result<u64, StorageError> {
        validate_query(schema, query)?;

        let state = self.state();
        Ok(filtered(schema, state.tables.get(schema.name), query)?.len() as u64)
    }

    async fn is_patch_applied(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.state().patches.contains(name))
    }

    async fn record_patch(&self, name: &str) -> Result<(), StorageError> {
        if self.failures.patch_records.load(AtomicOrdering::SeqCst) {
            return Err(StorageError::Database(
                "Connection lost while recording patch".to_string(),
            ));
        }
        self.state().patches.insert(name.to_string());
        Ok(())
    }

    async fn begin(&self) -> Result<StorageTransaction, StorageError> {
        if self.publish_to.is_some() {
            return Err(nested_transaction());
        }

        let staged = self.state().clone();
        Ok(StorageTransaction::new(MemoryStorage {
            state: Arc::new(Mutex::new(staged)),
            failures: self.failures.clone(),
            publish_to: Some(self.state.clone()),
            savepoint: Mutex::new(None),
        }))
    }
}

#[async_trait]
impl TransactionControl for MemoryStorage {
    async fn savepoint(&self) -> Result<(), StorageError> {
        let snapshot = self.state().clone();
        *lock(&self.savepoint) = Some(snapshot);
        Ok(())
    }

    async fn rollback_to_savepoint(&self) -> Result<(), StorageError> {
        let snapshot = lock(&self.savepoint).clone();
        if let Some(snapshot) = snapshot {
            *self.state() = snapshot;
        }
        Ok(())
    }

    async fn commit(&self) -> Result<(), StorageError> {
        let target = self.publish_to.as_ref().ok_or_else(|| {
            StorageError::Database("No transaction in progress".to_string())
        })?;
        let staged = std::mem::take(&mut *self.state());
        *lock(target) = staged;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StorageError> {
        *self.state() = MemoryState::default();
        Ok(())
    }
}
