use crate::data::Collection;
use crate::domain::post::fields as post_fields;
use crate::domain::{ConditionType, Entity, Filter, Post, Row, SortDirection, StorageError};
use crate::infrastructure::url::UrlBuilder;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;

pub const POST_EDIT_PATH: &str = "doublev_blog/post/edit";
pub const POST_DELETE_PATH: &str = "doublev_blog/post/delete";

pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Overrides how a filter on one field is added to the collection.
pub trait AddFilterStrategy<E: Entity>: Send + Sync {
    fn add_filter(&self, collection: &mut Collection<E>, filter: &Filter);
}

/// Turns a plain value into a "contains" match.
pub struct ContainsFilterStrategy;

// Wildcards typed into the grid are matched literally.
fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for ch in needle.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

impl<E: Entity> AddFilterStrategy<E> for ContainsFilterStrategy {
    fn add_filter(&self, collection: &mut Collection<E>, filter: &Filter) {
        let needle = match &filter.value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        collection.add_field_to_filter(
            filter.field.clone(),
            ConditionType::Like,
            format!("%{}%", escape_like(&needle)),
        );
    }
}

/// Decorates listing rows before they are returned.
pub trait RowActions: Send + Sync {
    fn prepare(&self, row: &mut Row);
}

/// Adds edit and delete actions to every post row that has an id.
pub struct PostActions {
    urls: UrlBuilder,
}

impl PostActions {
    pub fn new(urls: UrlBuilder) -> Self {
        Self { urls }
    }
}

impl RowActions for PostActions {
    fn prepare(&self, row: &mut Row) {
        let post_id = match row.get(post_fields::POST_ID) {
            Some(Value::Null) | None => return,
            Some(Value::String(id)) => id.clone(),
            Some(id) => id.to_string(),
        };
        let title = match row.get(post_fields::TITLE) {
            Some(Value::String(title)) => title.clone(),
            _ => String::new(),
        };
        let params = [(post_fields::POST_ID, post_id)];

        row.insert(
            "actions".to_string(),
            json!({
                "edit": {
                    "href": self.urls.get_url(POST_EDIT_PATH, &params),
                    "label": "Edit",
                },
                "delete": {
                    "href": self.urls.get_url(POST_DELETE_PATH, &params),
                    "label": "Delete",
                    "confirm": {
                        "title": format!("Delete \"{}\"", title),
                        "message": format!("Are you sure you want to delete a \"{}\" record?", title),
                    },
                },
            }),
        );
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingData {
    #[serde(rename = "totalRecords")]
    pub total_records: u64,
    pub items: Vec<Row>,
}

/// Feeds an admin grid from an entity collection.
pub struct ListingDataProvider<E: Entity> {
    collection: Collection<E>,
    strategies: HashMap<String, Box<dyn AddFilterStrategy<E>>>,
    row_actions: Option<Box<dyn RowActions>>,
}

impl<E: Entity> ListingDataProvider<E> {
    pub fn new(collection: Collection<E>) -> Self {
        Self {
            collection,
            strategies: HashMap::new(),
            row_actions: None,
        }
    }

    pub fn with_filter_strategy(
        mut self,
        field: &str,
        strategy: Box<dyn AddFilterStrategy<E>>,
    ) -> Self {
        self.strategies.insert(field.to_string(), strategy);
        self
    }

    pub fn with_row_actions(mut self, actions: Box<dyn RowActions>) -> Self {
        self.row_actions = Some(actions);
        self
    }

    pub fn add_filter(&mut self, filter: Filter) -> &mut Self {
        match self.strategies.get(&filter.field) {
            Some(strategy) => strategy.add_filter(&mut self.collection, &filter),
            None => {
                self.collection.add_filter_group(vec![filter]);
            }
        }
        self
    }

    pub fn add_order(&mut self, field: &str, direction: SortDirection) -> &mut Self {
        self.collection.add_order(field, direction);
        self
    }

    pub fn set_limit(&mut self, page: u64, page_size: u64) -> &mut Self {
        self.collection.set_page_size(page_size).set_cur_page(page);
        self
    }

    /// Applies grid request parameters: `page`, `limit`, `sort`, `dir` and
    /// one filter for each of `filterable` present in `params`.
    pub fn apply_request(&mut self, params: &HashMap<String, String>, filterable: &[&str]) -> &mut Self {
        for field in filterable {
            if let Some(value) = params.get(*field).filter(|v| !v.is_empty()) {
                self.add_filter(Filter::eq(*field, value.as_str()));
            }
        }

        if let Some(sort) = params.get("sort").filter(|s| !s.is_empty()) {
            let direction = params
                .get("dir")
                .map(|dir| SortDirection::parse(dir))
                .unwrap_or_default();
            self.add_order(sort, direction);
        }

        let page = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
        let limit = params
            .get("limit")
            .and_then(|l| l.parse().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE);
        self.set_limit(page, limit)
    }

    pub async fn get_data(&mut self) -> Result<ListingData, StorageError> {
        let total_records = self.collection.size().await?;
        let mut items = self.collection.to_rows().await?;

        if let Some(actions) = &self.row_actions {
            for row in items.iter_mut() {
                actions.prepare(row);
            }
        }

        Ok(ListingData {
            total_records,
            items,
        })
    }
}

/// Post grid: free-text fields match by substring and rows carry actions.
pub fn post_listing(collection: Collection<Post>, urls: UrlBuilder) -> ListingDataProvider<Post> {
    let mut provider = ListingDataProvider::new(collection);
    for field in [post_fields::TITLE, post_fields::AUTHOR, post_fields::CONTENT] {
        provider = provider.with_filter_strategy(field, Box::new(ContainsFilterStrategy));
    }
    provider.with_row_actions(Box::new(PostActions::new(urls)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MemoryStorage, Storage};
    use crate::domain::Comment;
    use std::sync::Arc;

    async fn seeded() -> Arc<dyn Storage> {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        for (title, author) in [("Rust news", "Ann"), ("Cooking", "Bob"), ("rusty tools", "Ann")] {
            let mut row = Row::new();
            row.insert("title".into(), Value::from(title));
            row.insert("author".into(), Value::from(author));
            storage.insert_row(&Post::SCHEMA, &row).await.unwrap();
        }
        storage
    }

    #[tokio::test]
    async fn post_rows_get_actions() {
        let storage = seeded().await;
        let mut provider = post_listing(Collection::new(storage), UrlBuilder::new("/admin"));
        let data = provider.get_data().await.unwrap();

        assert_eq!(data.total_records, 3);
        let actions = &data.items[0]["actions"];
        assert_eq!(actions["edit"]["href"], "/admin/doublev_blog/post/edit?post_id=1");
        assert_eq!(actions["edit"]["label"], "Edit");
        assert_eq!(actions["delete"]["href"], "/admin/doublev_blog/post/delete?post_id=1");
        assert_eq!(actions["delete"]["confirm"]["title"], "Delete \"Rust news\"");
        assert_eq!(
            actions["delete"]["confirm"]["message"],
            "Are you sure you want to delete a \"Rust news\" record?"
        );
    }

    #[tokio::test]
    async fn text_filters_match_substrings() {
        let storage = seeded().await;
        let mut provider = post_listing(Collection::new(storage), UrlBuilder::new("/admin"));
        provider.add_filter(Filter::eq("title", "rust"));
        provider.add_order("title", SortDirection::Desc);

        let data = provider.get_data().await.unwrap();
        let titles: Vec<_> = data.items.iter().map(|row| row["title"].clone()).collect();
        assert_eq!(titles, vec![Value::from("rusty tools"), Value::from("Rust news")]);
    }

    #[tokio::test]
    async fn wildcards_in_the_search_text_are_literal() {
        let storage = seeded().await;
        for title in ["100% Rust", "1000 Rust", "a_b", "axb"] {
            let mut row = Row::new();
            row.insert("title".into(), Value::from(title));
            storage.insert_row(&Post::SCHEMA, &row).await.unwrap();
        }

        let mut provider = post_listing(Collection::new(storage.clone()), UrlBuilder::new("/admin"));
        provider.add_filter(Filter::eq("title", "100%"));
        let data = provider.get_data().await.unwrap();
        assert_eq!(data.total_records, 1);
        assert_eq!(data.items[0]["title"], "100% Rust");

        let mut provider = post_listing(Collection::new(storage), UrlBuilder::new("/admin"));
        provider.add_filter(Filter::eq("title", "a_b"));
        let data = provider.get_data().await.unwrap();
        assert_eq!(data.total_records, 1);
        assert_eq!(data.items[0]["title"], "a_b");
    }

    #[test]
    fn like_escaping() {
        assert_eq!(escape_like(r"50%_off\"), r"50\%\_off\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[tokio::test]
    async fn fields_without_a_strategy_filter_exactly() {
        let storage = seeded().await;
        let mut provider = post_listing(Collection::new(storage), UrlBuilder::new("/admin"));
        provider.add_filter(Filter::eq("post_id", 2));
        provider.set_limit(1, 10);

        let data = provider.get_data().await.unwrap();
        assert_eq!(data.total_records, 1);
        assert_eq!(data.items[0]["title"], "Cooking");
    }

    #[tokio::test]
    async fn grid_request_parameters() {
        let storage = seeded().await;
        let mut provider = post_listing(Collection::new(storage), UrlBuilder::new("/admin"));
        let params: HashMap<String, String> = [
            ("author", "Ann"),
            ("sort", "title"),
            ("dir", "desc"),
            ("limit", "1"),
            ("page", "2"),
            ("content", ""),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        provider.apply_request(&params, &["title", "author", "content", "is_active"]);

        let data = provider.get_data().await.unwrap();
        assert_eq!(data.total_records, 2);
        assert_eq!(data.items.len(), 1);
        assert_eq!(data.items[0]["title"], "Rust news");
    }

    #[tokio::test]
    async fn comment_rows_are_plain() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut row = Row::new();
        row.insert("post_id".into(), Value::from(1));
        storage.insert_row(&Comment::SCHEMA, &row).await.unwrap();

        let mut provider = ListingDataProvider::<Comment>::new(Collection::new(storage));
        let data = provider.get_data().await.unwrap();
        assert_eq!(data.total_records, 1);
        assert!(data.items[0].get("actions").is_none());
        assert_eq!(serde_json::to_value(&data).unwrap()["totalRecords"], 1);
    }
}
