use super::storage::{
    nested_transaction, validate_query, validate_row, Storage, StorageTransaction,
    TransactionControl,
};
use crate::domain::coerce::{coerce_bool, coerce_i64, coerce_text, coerce_timestamp, format_timestamp};
use crate::domain::{
    Column, ColumnKind, ConditionType, Filter, Page, Query, Row, SortDirection, StorageError,
    TableSchema,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgQueryResult, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row as _, Transaction};
use tokio::sync::Mutex;

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

const SAVEPOINT: &str = "doublev_blog_savepoint";

enum Connection {
    Pool(PgPool),
    // None once committed or rolled back
    Transaction(Mutex<Option<Transaction<'static, Postgres>>>),
}

pub struct PostgresStorage {
    connection: Connection,
}

fn finished() -> StorageError {
    StorageError::Database("Transaction is no longer active".to_string())
}

fn not_in_transaction() -> StorageError {
    StorageError::Database("No transaction in progress".to_string())
}

impl PostgresStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            connection: Connection::Pool(pool),
        }
    }

    async fn fetch_optional(&self, query: PgQuery<'_>) -> Result<Option<PgRow>, StorageError> {
        match &self.connection {
            Connection::Pool(pool) => Ok(query.fetch_optional(pool).await?),
            Connection::Transaction(tx) => {
                let mut guard = tx.lock().await;
                let tx = guard.as_mut().ok_or_else(finished)?;
                Ok(query.fetch_optional(&mut **tx).await?)
            }
        }
    }

    async fn fetch_one(&self, query: PgQuery<'_>) -> Result<PgRow, StorageError> {
        match &self.connection {
            Connection::Pool(pool) => Ok(query.fetch_one(pool).await?),
            Connection::Transaction(tx) => {
                let mut guard = tx.lock().await;
                let tx = guard.as_mut().ok_or_else(finished)?;
                Ok(query.fetch_one(&mut **tx).await?)
            }
        }
    }

    async fn fetch_all(&self, query: PgQuery<'_>) -> Result<Vec<PgRow>, StorageError> {
        match &self.connection {
            Connection::Pool(pool) => Ok(query.fetch_all(pool).await?),
            Connection::Transaction(tx) => {
                let mut guard = tx.lock().await;
                let tx = guard.as_mut().ok_or_else(finished)?;
                Ok(query.fetch_all(&mut **tx).await?)
            }
        }
    }

    async fn execute(&self, query: PgQuery<'_>) -> Result<PgQueryResult, StorageError> {
        match &self.connection {
            Connection::Pool(pool) => Ok(query.execute(pool).await?),
            Connection::Transaction(tx) => {
                let mut guard = tx.lock().await;
                let tx = guard.as_mut().ok_or_else(finished)?;
                Ok(query.execute(&mut **tx).await?)
            }
        }
    }

    async fn take_transaction(&self) -> Result<Transaction<'static, Postgres>, StorageError> {
        match &self.connection {
            Connection::Pool(_) => Err(not_in_transaction()),
            Connection::Transaction(tx) => tx.lock().await.take().ok_or_else(finished),
        }
    }

    async fn savepoint_command(&self, command: &str) -> Result<(), StorageError> {
        if matches!(self.connection, Connection::Pool(_)) {
            return Err(not_in_transaction());
        }
        let sql = format!("{} {}", command, SAVEPOINT);
        self.execute(sqlx::query(&sql)).await?;
        Ok(())
    }
}

// Значение, приведённое к нативному типу колонки
enum Bound {
    Integer(Option<i64>),
    Text(Option<String>),
    Boolean(Option<bool>),
    Timestamp(Option<NaiveDateTime>),
}

fn quote_ident(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn convert(column: &Column, value: &Value) -> Result<Bound, StorageError> {
    let invalid = |reason: String| StorageError::InvalidValue {
        column: column.name.to_string(),
        reason,
    };

    Ok(match column.kind {
        ColumnKind::Integer => Bound::Integer(coerce_i64(value).map_err(invalid)?),
        ColumnKind::Text => Bound::Text(coerce_text(value)),
        ColumnKind::Boolean => Bound::Boolean(coerce_bool(value).map_err(invalid)?),
        ColumnKind::Timestamp => Bound::Timestamp(coerce_timestamp(value).map_err(invalid)?),
    })
}

fn push_bound(builder: &mut QueryBuilder<'_, Postgres>, bound: Bound) {
    match bound {
        Bound::Integer(v) => builder.push_bind(v),
        Bound::Text(v) => builder.push_bind(v),
        Bound::Boolean(v) => builder.push_bind(v),
        Bound::Timestamp(v) => builder.push_bind(v),
    };
}

fn push_condition(
    builder: &mut QueryBuilder<'_, Postgres>,
    schema: &TableSchema,
    filter: &Filter,
) -> Result<(), StorageError> {
    let column = schema.column(&filter.field)?;
    let ident = quote_ident(column.name);

    match filter.condition_type {
        ConditionType::Null | ConditionType::Notnull => {
            builder.push(format!("{} {}", ident, filter.condition_type));
        }
        ConditionType::Eq if filter.value.is_null() => {
            builder.push(format!("{} IS NULL", ident));
        }
        ConditionType::Neq if filter.value.is_null() => {
            builder.push(format!("{} IS NOT NULL", ident));
        }
        ConditionType::Like | ConditionType::Nlike => {
            builder.push(format!("CAST({} AS TEXT) {} ", ident, filter.condition_type));
            builder.push_bind(coerce_text(&filter.value).unwrap_or_default());
        }
        ConditionType::In | ConditionType::Nin => {
            let values = filter.values();
            if values.is_empty() {
                let always = filter.condition_type == ConditionType::Nin;
                builder.push(if always { "TRUE" } else { "FALSE" });
                return Ok(());
            }
            builder.push(format!("{} {} (", ident, filter.condition_type));
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    builder.push(", ");
                }
                push_bound(builder, convert(column, value)?);
            }
            builder.push(")");
        }
        op => {
            builder.push(format!("{} {} ", ident, op));
            push_bound(builder, convert(column, &filter.value)?);
        }
    }

    Ok(())
}

fn push_where(
    builder: &mut QueryBuilder<'_, Postgres>,
    schema: &TableSchema,
    query: &Query,
) -> Result<(), StorageError> {
    let groups: Vec<_> = query
        .groups
        .iter()
        .filter(|group| !group.filters.is_empty())
        .collect();

    if groups.is_empty() {
        return Ok(());
    }

    builder.push(" WHERE ");
    for (i, group) in groups.iter().enumerate() {
        if i > 0 {
            builder.push(" AND ");
        }
        builder.push("(");
        for (j, filter) in group.filters.iter().enumerate() {
            if j > 0 {
                builder.push(" OR ");
            }
            push_condition(builder, schema, filter)?;
        }
        builder.push(")");
    }

    Ok(())
}

fn push_order(builder: &mut QueryBuilder<'_, Postgres>, schema: &TableSchema, query: &Query) {
    builder.push(" ORDER BY ");
    for order in &query.orders {
        let nulls = match order.direction {
            SortDirection::Asc => "NULLS LAST",
            SortDirection::Desc => "NULLS FIRST",
        };
        builder.push(format!(
            "{} {} {}, ",
            quote_ident(&order.field),
            order.direction,
            nulls
        ));
    }
    builder.push(format!("{} ASC", quote_ident(schema.primary_key)));
}

/// LIMIT and OFFSET binds; Postgres rejects negatives, so large values clamp.
fn page_bounds(page: &Page) -> (i64, i64) {
    (
        i64::try_from(page.size).unwrap_or(i64::MAX),
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
    )
}

fn select_list(schema: &TableSchema) -> String {
    schema
        .columns
        .iter()
        .map(|c| quote_ident(c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn decode_row(schema: &TableSchema, row: &PgRow) -> Result<Row, StorageError> {
    let mut out = Row::new();
    for column in schema.columns {
        let value = match column.kind {
            ColumnKind::Integer => row
                .try_get::<Option<i64>, _>(column.name)?
                .map(Value::from),
            ColumnKind::Text => row
                .try_get::<Option<String>, _>(column.name)?
                .map(Value::String),
            ColumnKind::Boolean => row
                .try_get::<Option<bool>, _>(column.name)?
                .map(Value::Bool),
            ColumnKind::Timestamp => row
                .try_get::<Option<NaiveDateTime>, _>(column.name)?
                .map(|ts| Value::String(format_timestamp(&ts))),
        };
        out.insert(column.name.to_string(), value.unwrap_or(Value::Null));
    }
    Ok(out)
}

/// Row entries except the primary key, resolved against their columns.
fn writable_columns<'r>(
    schema: &TableSchema,
    row: &'r Row,
) -> Result<Vec<(Column, &'r Value)>, StorageError> {
    validate_row(schema, row)?;
    row.iter()
        .filter(|(key, _)| key.as_str() != schema.primary_key)
        .map(|(key, value)| Ok((*schema.column(key)?, value)))
        .collect()
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn fetch_row(&self, schema: &TableSchema, id: i64) -> Result<Option<Row>, StorageError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM {} WHERE {} = ",
            select_list(schema),
            quote_ident(schema.name),
            quote_ident(schema.primary_key)
        ));
        builder.push_bind(id);

        let row = self.fetch_optional(builder.build()).await?;

        row.map(|row| decode_row(schema, &row)).transpose()
    }

    async fn insert_row(&self, schema: &TableSchema, row: &Row) -> Result<i64, StorageError> {
        let columns = writable_columns(schema, row)?;

        let mut builder =
            QueryBuilder::<Postgres>::new(format!("INSERT INTO {} ", quote_ident(schema.name)));

        if columns.is_empty() {
            builder.push("DEFAULT VALUES");
        } else {
            let names: Vec<String> = columns.iter().map(|(c, _)| quote_ident(c.name)).collect();
            builder.push(format!("({}) VALUES (", names.join(", ")));
            for (i, (column, value)) in columns.iter().enumerate() {
                if i > 0 {
                    builder.push(", ");
                }
                push_bound(&mut builder, convert(column, value)?);
            }
            builder.push(")");
        }
        builder.push(format!(" RETURNING {}", quote_ident(schema.primary_key)));

        let inserted = self.fetch_one(builder.build()).await.map_err(|e| {
            tracing::error!("Failed to insert into {}: {}", schema.name, e);
            e
        })?;

        Ok(inserted.try_get::<i64, _>(schema.primary_key)?)
    }

    async fn update_row(&self, schema: &TableSchema, id: i64, row: &Row) -> Result<(), StorageError> {
        let columns = writable_columns(schema, row)?;
        if columns.is_empty() {
            return Ok(());
        }

        let mut builder =
            QueryBuilder::<Postgres>::new(format!("UPDATE {} SET ", quote_ident(schema.name)));
        for (i, (column, value)) in columns.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder.push(format!("{} = ", quote_ident(column.name)));
            push_bound(&mut builder, convert(column, value)?);
        }
        builder.push(format!(" WHERE {} = ", quote_ident(schema.primary_key)));
        builder.push_bind(id);

        self.execute(builder.build()).await.map_err(|e| {
            tracing::error!("Failed to update {} #{}: {}", schema.name, id, e);
            e
        })?;

        Ok(())
    }

    async fn delete_row(&self, schema: &TableSchema, id: i64) -> Result<u64, StorageError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "DELETE FROM {} WHERE {} = ",
            quote_ident(schema.name),
            quote_ident(schema.primary_key)
        ));
        builder.push_bind(id);

        let result = self.execute(builder.build()).await?;

        Ok(result.rows_affected())
    }

    async fn select_rows(&self, schema: &TableSchema, query: &Query) -> Result<Vec<Row>, StorageError> {
        validate_query(schema, query)?;

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM {}",
            select_list(schema),
            quote_ident(schema.name)
        ));
        push_where(&mut builder, schema, query)?;
        push_order(&mut builder, schema, query);

        if let Some(page) = query.page {
            let (limit, offset) = page_bounds(&page);
            builder.push(" LIMIT ");
            builder.push_bind(limit);
            builder.push(" OFFSET ");
            builder.push_bind(offset);
        }

        tracing::debug!("Collection query: {}", builder.sql());

        let rows = self.fetch_all(builder.build()).await?;

        rows.iter().map(|row| decode_row(schema, row)).collect()
    }

    async fn count_rows(&self, schema: &TableSchema, query: &Query) -> Result<u64, StorageError> {
        validate_query(schema, query)?;

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT COUNT(*) AS count FROM {}",
            quote_ident(schema.name)
        ));
        push_where(&mut builder, schema, query)?;

        let row = self.fetch_one(builder.build()).await?;
        let count: i64 = row.try_get("count")?;

        Ok(count.max(0) as u64)
    }

    async fn is_patch_applied(&self, name: &str) -> Result<bool, StorageError> {
        let query = sqlx::query("SELECT patch_name FROM patch_list WHERE patch_name = $1").bind(name);
        let row = self.fetch_optional(query).await?;

        Ok(row.is_some())
    }

    async fn record_patch(&self, name: &str) -> Result<(), StorageError> {
        let query = sqlx::query(
            "INSERT INTO patch_list (patch_name) VALUES ($1) ON CONFLICT (patch_name) DO NOTHING",
        )
        .bind(name);
        self.execute(query).await?;

        Ok(())
    }

    async fn begin(&self) -> Result<StorageTransaction, StorageError> {
        let pool = match &self.connection {
            Connection::Pool(pool) => pool,
            Connection::Transaction(_) => return Err(nested_transaction()),
        };

        let tx = pool.begin().await?;
        tracing::debug!("Transaction started");
        Ok(StorageTransaction::new(PostgresStorage {
            connection: Connection::Transaction(Mutex::new(Some(tx))),
        }))
    }
}

#[async_trait]
impl TransactionControl for PostgresStorage {
    async fn savepoint(&self) -> Result<(), StorageError> {
        self.savepoint_command("SAVEPOINT").await
    }

    async fn rollback_to_savepoint(&self) -> Result<(), StorageError> {
        self.savepoint_command("ROLLBACK TO SAVEPOINT").await
    }

    async fn commit(&self) -> Result<(), StorageError> {
        self.take_transaction().await?.commit().await?;
        tracing::debug!("Transaction committed");
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StorageError> {
        self.take_transaction().await?.rollback().await?;
        tracing::debug!("Transaction rolled back");
        Ok(())
    }
}
