use super::collection::Collection;
use crate::domain::{Entity, SearchCriteria, SearchResults, StorageError};

/// Applies `criteria` to `collection` and materializes one result page.
///
/// The total is counted before paging is applied, so it always reflects
/// every row that matches the filters.
pub async fn apply_search_criteria<E: Entity>(
    collection: &mut Collection<E>,
    criteria: &SearchCriteria,
) -> Result<SearchResults<E>, StorageError> {
    for group in &criteria.filter_groups {
        collection.add_filter_group(group.filters.clone());
    }
    for order in &criteria.sort_orders {
        collection.add_order(order.field.clone(), order.direction);
    }

    let total_count = collection.size().await?;

    if let Some(page_size) = criteria.page_size {
        collection
            .set_page_size(page_size)
            .set_cur_page(criteria.current_page.unwrap_or(1));
    }

    let items = collection.items().await?;

    Ok(SearchResults {
        search_criteria: criteria.clone(),
        items,
        total_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MemoryStorage, Storage};
    use crate::domain::{ConditionType, Filter, Post, Row, SortDirection};
    use serde_json::Value;
    use std::sync::Arc;

    async fn storage() -> Arc<dyn Storage> {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        for (title, author) in [("One", "Ann"), ("Two", "Bob"), ("Three", "Ann"), ("Four", "Cid")] {
            let mut row = Row::new();
            row.insert("title".into(), Value::from(title));
            row.insert("author".into(), Value::from(author));
            storage.insert_row(&Post::SCHEMA, &row).await.unwrap();
        }
        storage
    }

    #[tokio::test]
    async fn empty_criteria_returns_the_whole_table() {
        let mut collection = Collection::<Post>::new(storage().await);
        let results = apply_search_criteria(&mut collection, &SearchCriteria::new())
            .await
            .unwrap();
        assert_eq!(results.total_count, 4);
        assert_eq!(results.items.len(), 4);
        assert_eq!(results.items[0].title(), Some("One"));
    }

    #[tokio::test]
    async fn filter_groups_sort_and_page() {
        let criteria = SearchCriteria::new()
            .with_filter_group(vec![
                Filter::eq("author", "Ann"),
                Filter::eq("author", "Cid"),
            ])
            .with_sort_order("title", SortDirection::Desc)
            .with_page(2, 1);

        let mut collection = Collection::<Post>::new(storage().await);
        let results = apply_search_criteria(&mut collection, &criteria).await.unwrap();

        assert_eq!(results.total_count, 3);
        let titles: Vec<_> = results.items.iter().filter_map(|p| p.title()).collect();
        assert_eq!(titles, vec!["Three", "One"]);
        assert_eq!(results.search_criteria, criteria);
    }

    #[tokio::test]
    async fn page_past_the_end_keeps_the_true_total() {
        let criteria = SearchCriteria::new().with_page(10, 4);
        let mut collection = Collection::<Post>::new(storage().await);
        let results = apply_search_criteria(&mut collection, &criteria).await.unwrap();
        assert!(results.items.is_empty());
        assert_eq!(results.total_count, 4);
    }

    #[tokio::test]
    async fn unknown_field_propagates() {
        let criteria = SearchCriteria::new()
            .with_filter_group(vec![Filter::new("rating", ConditionType::Gt, 3)]);
        let mut collection = Collection::<Post>::new(storage().await);
        let err = apply_search_criteria(&mut collection, &criteria)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UnknownColumn { .. }));
    }
}
