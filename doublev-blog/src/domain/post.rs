use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::coerce::serde_fields;
use super::entity::{Column, ColumnKind, Entity, Row, TableSchema};
use super::error::StorageError;

pub const POST_TABLE: &str = "doublev_blog_post";

pub mod fields {
    pub const POST_ID: &str = "post_id";
    pub const TITLE: &str = "title";
    pub const CONTENT: &str = "content";
    pub const AUTHOR: &str = "author";
    pub const IS_ACTIVE: &str = "is_active";
    pub const CREATED_AT: &str = "created_at";
    pub const UPDATED_AT: &str = "updated_at";
}

const POST_COLUMNS: &[Column] = &[
    Column::new(fields::POST_ID, ColumnKind::Integer),
    Column::new(fields::TITLE, ColumnKind::Text),
    Column::new(fields::CONTENT, ColumnKind::Text),
    Column::new(fields::AUTHOR, ColumnKind::Text),
    Column::new(fields::IS_ACTIVE, ColumnKind::Boolean),
    Column::new(fields::CREATED_AT, ColumnKind::Timestamp),
    Column::new(fields::UPDATED_AT, ColumnKind::Timestamp),
];

/// Blog post record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default, deserialize_with = "serde_fields::id")]
    post_id: Option<i64>,
    #[serde(default, deserialize_with = "serde_fields::text")]
    title: Option<String>,
    #[serde(default, deserialize_with = "serde_fields::text")]
    content: Option<String>,
    #[serde(default, deserialize_with = "serde_fields::text")]
    author: Option<String>,
    #[serde(default, deserialize_with = "serde_fields::flag")]
    is_active: Option<bool>,
    #[serde(default, with = "serde_fields::timestamp")]
    created_at: Option<NaiveDateTime>,
    #[serde(default, with = "serde_fields::timestamp")]
    updated_at: Option<NaiveDateTime>,
}

impl Post {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a post from submitted form data. Keys that are not post fields are ignored.
    pub fn from_form(form: &Row) -> Result<Self, StorageError> {
        let known: Row = form
            .iter()
            .filter(|(key, _)| POST_COLUMNS.iter().any(|c| c.name == key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        serde_json::from_value(Value::Object(known)).map_err(|e| StorageError::InvalidValue {
            column: "form".to_string(),
            reason: e.to_string(),
        })
    }

    /// Overwrites every field present in `form`, keeping the others.
    pub fn apply_form(&mut self, form: &Row) -> Result<&mut Self, StorageError> {
        let submitted = Post::from_form(form)?;
        if form.contains_key(fields::POST_ID) {
            self.post_id = submitted.post_id;
        }
        if form.contains_key(fields::TITLE) {
            self.title = submitted.title;
        }
        if form.contains_key(fields::CONTENT) {
            self.content = submitted.content;
        }
        if form.contains_key(fields::AUTHOR) {
            self.author = submitted.author;
        }
        if form.contains_key(fields::IS_ACTIVE) {
            self.is_active = submitted.is_active;
        }
        Ok(self)
    }

    pub fn post_id(&self) -> Option<i64> {
        self.post_id
    }

    pub fn set_post_id(&mut self, post_id: i64) -> &mut Self {
        self.post_id = Some(post_id);
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> &mut Self {
        self.title = Some(title.into());
        self
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn set_content(&mut self, content: impl Into<String>) -> &mut Self {
        self.content = Some(content.into());
        self
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn set_author(&mut self, author: impl Into<String>) -> &mut Self {
        self.author = Some(author.into());
        self
    }

    pub fn is_active(&self) -> Option<bool> {
        self.is_active
    }

    pub fn set_is_active(&mut self, is_active: bool) -> &mut Self {
        self.is_active = Some(is_active);
        self
    }

    pub fn created_at(&self) -> Option<NaiveDateTime> {
        self.created_at
    }

    pub fn set_created_at(&mut self, created_at: NaiveDateTime) -> &mut Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn updated_at(&self) -> Option<NaiveDateTime> {
        self.updated_at
    }

    pub fn set_updated_at(&mut self, updated_at: NaiveDateTime) -> &mut Self {
        self.updated_at = Some(updated_at);
        self
    }
}

impl Entity for Post {
    const SCHEMA: TableSchema = TableSchema {
        name: POST_TABLE,
        primary_key: fields::POST_ID,
        columns: POST_COLUMNS,
        insert_only: &[fields::CREATED_AT],
    };

    const LABEL: &'static str = "Post";

    fn id(&self) -> Option<i64> {
        self.post_id
    }

    fn set_id(&mut self, id: i64) {
        self.post_id = Some(id);
    }

    fn touch(&mut self, now: NaiveDateTime, is_new: bool) {
        if is_new {
            self.created_at = Some(now);
        }
        self.updated_at = Some(now);
    }

    fn validate(&self) -> Result<(), StorageError> {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => Ok(()),
            _ => Err(StorageError::Validation(
                "The post title is required.".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn unset_fields_read_as_none() {
        let post = Post::new();
        assert_eq!(post.post_id(), None);
        assert_eq!(post.is_active(), None);
        assert_eq!(post.title(), None);
    }

    #[test]
    fn setters_chain() {
        let mut post = Post::new();
        post.set_title("T").set_content("C").set_author("A").set_is_active(false);
        assert_eq!(post.title(), Some("T"));
        assert_eq!(post.is_active(), Some(false));
    }

    #[test]
    fn from_form_coerces_submitted_strings() {
        let post = Post::from_form(&form(json!({
            "post_id": "",
            "title": "Hello",
            "is_active": "true",
            "form_key": "ignored",
        })))
        .unwrap();
        assert_eq!(post.post_id(), None);
        assert_eq!(post.title(), Some("Hello"));
        assert_eq!(post.is_active(), Some(true));

        let post = Post::from_form(&form(json!({ "post_id": "12", "is_active": 0 }))).unwrap();
        assert_eq!(post.post_id(), Some(12));
        assert_eq!(post.is_active(), Some(false));
    }

    #[test]
    fn row_omits_unset_fields() {
        let mut post = Post::new();
        post.set_title("T");
        let row = post.to_row().unwrap();
        assert_eq!(row.len(), 1);
        assert_eq!(row["title"], json!("T"));
    }

    #[test]
    fn row_round_trips_timestamps() {
        let mut post = Post::new();
        post.set_title("T")
            .set_created_at(crate::domain::coerce::parse_timestamp("2025-09-26 08:00:00").unwrap());
        let row = post.to_row().unwrap();
        assert_eq!(row["created_at"], json!("2025-09-26 08:00:00"));
        assert_eq!(Post::from_row(row).unwrap(), post);
    }

    #[test]
    fn blank_title_is_rejected() {
        let mut post = Post::new();
        assert!(post.validate().is_err());
        post.set_title("   ");
        assert!(post.validate().is_err());
        post.set_title("ok");
        assert!(post.validate().is_ok());
    }

    #[test]
    fn touch_keeps_creation_time_on_update() {
        let first = crate::domain::coerce::parse_timestamp("2025-01-01 00:00:00").unwrap();
        let later = crate::domain::coerce::parse_timestamp("2025-02-01 00:00:00").unwrap();
        let mut post = Post::new();
        post.touch(first, true);
        post.touch(later, false);
        assert_eq!(post.created_at(), Some(first));
        assert_eq!(post.updated_at(), Some(later));
    }
}
