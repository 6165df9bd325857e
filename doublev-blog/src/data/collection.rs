use super::storage::Storage;
use crate::domain::{
    ConditionType, Entity, Filter, FilterGroup, Page, Query, Row, SortDirection, SortOrder,
    StorageError,
};
use serde_json::Value;
use std::sync::Arc;

/// Deferred, chainable query over an entity table.
///
/// Nothing is read until [`Collection::items`] or [`Collection::size`] is
/// called. Both results are cached until the query changes; a paging change
/// only drops the cached items since the size does not depend on it.
pub struct Collection<E: Entity> {
    storage: Arc<dyn Storage>,
    groups: Vec<FilterGroup>,
    orders: Vec<SortOrder>,
    page_size: Option<u64>,
    cur_page: u64,
    items: Option<Vec<E>>,
    size: Option<u64>,
}

impl<E: Entity> Collection<E> {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            groups: Vec::new(),
            orders: Vec::new(),
            page_size: None,
            cur_page: 1,
            items: None,
            size: None,
        }
    }

    fn reset(&mut self) {
        self.items = None;
        self.size = None;
    }

    pub fn add_field_to_filter(
        &mut self,
        field: impl Into<String>,
        condition: ConditionType,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.add_filter_group(vec![Filter::new(field, condition, value)])
    }

    /// Adds filters that match when any one of them does.
    pub fn add_filter_group(&mut self, filters: Vec<Filter>) -> &mut Self {
        if !filters.is_empty() {
            self.groups.push(FilterGroup { filters });
            self.reset();
        }
        self
    }

    pub fn add_order(&mut self, field: impl Into<String>, direction: SortDirection) -> &mut Self {
        self.orders.push(SortOrder::new(field, direction));
        self.items = None;
        self
    }

    pub fn set_page_size(&mut self, page_size: u64) -> &mut Self {
        self.page_size = Some(page_size);
        self.items = None;
        self
    }

    pub fn set_cur_page(&mut self, page: u64) -> &mut Self {
        self.cur_page = page.max(1);
        self.items = None;
        self
    }

    pub fn query(&self) -> Query {
        Query {
            groups: self.groups.clone(),
            orders: self.orders.clone(),
            page: self.page_size.map(|size| Page::new(size, self.cur_page)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.items.is_some()
    }

    pub fn new_empty_item(&self) -> E {
        E::default()
    }

    pub async fn items(&mut self) -> Result<Vec<E>, StorageError> {
        if let Some(items) = &self.items {
            return Ok(items.clone());
        }

        let rows = self.storage.select_rows(&E::SCHEMA, &self.query()).await?;
        let items = rows
            .into_iter()
            .map(E::from_row)
            .collect::<Result<Vec<E>, StorageError>>()?;

        self.items = Some(items.clone());
        Ok(items)
    }

    /// Number of matching rows, regardless of paging.
    pub async fn size(&mut self) -> Result<u64, StorageError> {
        if let Some(size) = self.size {
            return Ok(size);
        }

        let size = self.storage.count_rows(&E::SCHEMA, &self.query()).await?;
        self.size = Some(size);
        Ok(size)
    }

    /// Items as flat field maps, in collection order.
    pub async fn to_rows(&mut self) -> Result<Vec<Row>, StorageError> {
        self.items()
            .await?
            .iter()
            .map(E::to_data)
            .collect()
    }
}
