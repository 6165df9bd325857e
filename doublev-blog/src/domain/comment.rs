use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::coerce::serde_fields;
use super::entity::{Column, ColumnKind, Entity, TableSchema};
use super::error::StorageError;

pub const COMMENT_TABLE: &str = "doublev_blog_comment";

pub mod fields {
    pub const COMMENT_ID: &str = "comment_id";
    pub const POST_ID: &str = "post_id";
    pub const AUTHOR: &str = "author";
    pub const EMAIL: &str = "email";
    pub const CONTENT: &str = "content";
    pub const IS_ACTIVE: &str = "is_active";
    pub const CREATED_AT: &str = "created_at";
}

const COMMENT_COLUMNS: &[Column] = &[
    Column::new(fields::COMMENT_ID, ColumnKind::Integer),
    Column::new(fields::POST_ID, ColumnKind::Integer),
    Column::new(fields::AUTHOR, ColumnKind::Text),
    Column::new(fields::EMAIL, ColumnKind::Text),
    Column::new(fields::CONTENT, ColumnKind::Text),
    Column::new(fields::IS_ACTIVE, ColumnKind::Boolean),
    Column::new(fields::CREATED_AT, ColumnKind::Timestamp),
];

/// Comment left on a post. The referenced post is not required to exist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default, deserialize_with = "serde_fields::id")]
    comment_id: Option<i64>,
    #[serde(default, deserialize_with = "serde_fields::reference")]
    post_id: Option<i64>,
    #[serde(default, deserialize_with = "serde_fields::text")]
    author: Option<String>,
    #[serde(default, deserialize_with = "serde_fields::text")]
    email: Option<String>,
    #[serde(default, deserialize_with = "serde_fields::text")]
    content: Option<String>,
    #[serde(default, deserialize_with = "serde_fields::flag")]
    is_active: Option<bool>,
    #[serde(default, with = "serde_fields::timestamp")]
    created_at: Option<NaiveDateTime>,
}

impl Comment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn comment_id(&self) -> Option<i64> {
        self.comment_id
    }

    pub fn set_comment_id(&mut self, comment_id: i64) -> &mut Self {
        self.comment_id = Some(comment_id);
        self
    }

    pub fn post_id(&self) -> Option<i64> {
        self.post_id
    }

    pub fn set_post_id(&mut self, post_id: i64) -> &mut Self {
        self.post_id = Some(post_id);
        self
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn set_author(&mut self, author: impl Into<String>) -> &mut Self {
        self.author = Some(author.into());
        self
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn set_email(&mut self, email: impl Into<String>) -> &mut Self {
        self.email = Some(email.into());
        self
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn set_content(&mut self, content: impl Into<String>) -> &mut Self {
        self.content = Some(content.into());
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
}

impl Entity for Comment {
    const SCHEMA: TableSchema = TableSchema {
        name: COMMENT_TABLE,
        primary_key: fields::COMMENT_ID,
        columns: COMMENT_COLUMNS,
        insert_only: &[fields::CREATED_AT],
    };

    const LABEL: &'static str = "Comment";

    fn id(&self) -> Option<i64> {
        self.comment_id
    }

    fn set_id(&mut self, id: i64) {
        self.comment_id = Some(id);
    }

    // Comments have no update timestamp.
    fn touch(&mut self, now: NaiveDateTime, is_new: bool) {
        if is_new {
            self.created_at = Some(now);
        }
    }

    fn validate(&self) -> Result<(), StorageError> {
        if self.post_id.is_none() {
            return Err(StorageError::Validation(
                "The comment must reference a post.".to_string(),
            ));
        }
        Ok(())
    }
}
