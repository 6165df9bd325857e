use super::form_provider::{PostFormDataProvider, STAGING_KEY};
use super::listing_provider::{post_listing, ListingDataProvider, POST_EDIT_PATH};
use super::mass_action::{MassSelection, NOTHING_SELECTED};
use super::session::{DataPersistor, Session};
use crate::data::{Collection, PostRepository, Storage};
use crate::domain::coerce::{coerce_id, coerce_text};
use crate::domain::post::fields;
use crate::domain::{ConditionType, DomainError, Post, Row};
use crate::infrastructure::url::UrlBuilder;
use serde_json::Value;
use std::sync::Arc;

pub const POST_INDEX_PATH: &str = "doublev_blog/post/index";

const SAVE_FAILED: &str = "Something went wrong while saving the post.";

/// What an admin action asks the HTTP layer to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    Redirect(String),
    Page { title: &'static str },
}

/// An id request parameter counts only when it is non-empty and not "0".
pub(crate) fn requested_id(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|id| !id.is_empty() && *id != "0")
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => true,
    }
}

/// Post create/edit/delete actions behind the admin routes.
pub struct PostAdmin {
    posts: Arc<dyn PostRepository>,
    storage: Arc<dyn Storage>,
    urls: UrlBuilder,
}

impl PostAdmin {
    pub fn new(posts: Arc<dyn PostRepository>, storage: Arc<dyn Storage>, urls: UrlBuilder) -> Self {
        Self {
            posts,
            storage,
            urls,
        }
    }

    fn redirect(&self, path: &str, params: &[(&str, String)]) -> ActionResult {
        ActionResult::Redirect(self.urls.get_url(path, params))
    }

    fn to_index(&self) -> ActionResult {
        self.redirect(POST_INDEX_PATH, &[])
    }

    fn to_edit(&self, post_id: Option<String>) -> ActionResult {
        match post_id {
            Some(id) => self.redirect(POST_EDIT_PATH, &[(fields::POST_ID, id)]),
            None => self.redirect(POST_EDIT_PATH, &[]),
        }
    }

    pub fn listing(&self) -> ListingDataProvider<Post> {
        post_listing(Collection::new(self.storage.clone()), self.urls.clone())
    }

    /// Form provider narrowed to one post, or to no stored post for a new one.
    pub fn form(&self, post_id: Option<i64>, session: &Session) -> PostFormDataProvider {
        let mut collection = Collection::new(self.storage.clone());
        match post_id {
            Some(id) => collection.add_field_to_filter(fields::POST_ID, ConditionType::Eq, id),
            None => collection.add_field_to_filter(fields::POST_ID, ConditionType::Null, Value::Null),
        };
        PostFormDataProvider::new(collection, Arc::new(session.clone()))
    }

    pub fn new_post(&self) -> ActionResult {
        ActionResult::Page { title: "New Post" }
    }

    pub async fn edit(
        &self,
        post_id: Option<&str>,
        session: &Session,
    ) -> Result<ActionResult, DomainError> {
        let Some(raw) = requested_id(post_id) else {
            return Ok(self.new_post());
        };

        match self.posts.get_by_id(coerce_id(raw)).await {
            Ok(_) => Ok(ActionResult::Page { title: "Edit Post" }),
            Err(DomainError::NotFound(_)) => {
                session.add_error_message("This post no longer exists.");
                Ok(self.to_index())
            }
            Err(e) => Err(e),
        }
    }

    async fn persist(&self, form: &Row, post_id: Option<i64>) -> Result<Post, DomainError> {
        let mut post = match post_id {
            Some(id) => self.posts.get_by_id(id).await?,
            None => Post::new(),
        };
        post.apply_form(form)?;
        self.posts.save(post).await
    }

    pub async fn save(&self, mut form: Row, session: &Session) -> ActionResult {
        if form.is_empty() {
            return self.to_index();
        }

        let raw_id = form
            .get(fields::POST_ID)
            .and_then(coerce_text)
            .filter(|id| !id.is_empty());

        if form.get(fields::IS_ACTIVE) == Some(&Value::from("true")) {
            form.insert(fields::IS_ACTIVE.to_string(), Value::from(1));
        }
        if requested_id(raw_id.as_deref()).is_none() {
            form.insert(fields::POST_ID.to_string(), Value::Null);
        }

        let post_id = requested_id(raw_id.as_deref()).map(coerce_id);
        match self.persist(&form, post_id).await {
            Ok(post) => {
                session.add_success_message("You saved the post.");
                session.clear(STAGING_KEY);

                if form.get("back").is_some_and(is_truthy) {
                    return self.to_edit(post.post_id().map(|id| id.to_string()));
                }
                self.to_index()
            }
            Err(e) => {
                if e.is_localized() {
                    session.add_error_message(e.to_string());
                } else {
                    tracing::error!("Saving post {:?} failed: {}", post_id, e);
                    session.add_error_message(SAVE_FAILED);
                }

                session.set(STAGING_KEY, Value::Object(form));
                self.to_edit(raw_id)
            }
        }
    }

    pub async fn delete(&self, post_id: Option<&str>, session: &Session) -> ActionResult {
        let Some(raw) = requested_id(post_id) else {
            session.add_error_message("We can't find a post to delete.");
            return self.to_index();
        };

        match self.posts.delete_by_id(coerce_id(raw)).await {
            Ok(_) => {
                session.add_success_message("You deleted the post.");
                self.to_index()
            }
            Err(e) => {
                session.add_error_message(e.to_string());
                self.to_edit(Some(raw.to_string()))
            }
        }
    }

    async fn delete_selected(&self, selection: &MassSelection) -> Result<u64, DomainError> {
        let mut collection = Collection::<Post>::new(self.storage.clone());
        selection.apply(&mut collection);

        let size = collection.size().await?;
        for post in collection.items().await? {
            self.posts.delete(&post).await?;
        }
        Ok(size)
    }

    pub async fn mass_delete(&self, selection: Option<MassSelection>, session: &Session) -> ActionResult {
        let Some(selection) = selection else {
            session.add_error_message(NOTHING_SELECTED);
            return self.to_index();
        };

        match self.delete_selected(&selection).await {
            Ok(size) => {
                tracing::info!("Mass delete removed {} post(s)", size);
                session.add_success_message(format!(
                    "A total of {} record(s) have been deleted.",
                    size
                ));
            }
            Err(e) => session.add_error_message(e.to_string()),
        }
        self.to_index()
    }
}
