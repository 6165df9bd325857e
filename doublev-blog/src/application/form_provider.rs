use super::session::DataPersistor;
use crate::data::Collection;
use crate::domain::{Entity, Post, Row, StorageError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Staging key for post form input rejected by a save.
pub const STAGING_KEY: &str = "doublev_blog_post";

/// Form data for the post editor, keyed by post id ("" for a new post).
///
/// Staged input is checked on every call, not only the first, so a save
/// rejected after the cache was filled still shows up in the form.
pub struct PostFormDataProvider {
    collection: Collection<Post>,
    persistor: Arc<dyn DataPersistor>,
    loaded: Option<BTreeMap<String, Row>>,
}

fn data_key(post_id: Option<i64>) -> String {
    post_id.map(|id| id.to_string()).unwrap_or_default()
}

impl PostFormDataProvider {
    pub fn new(collection: Collection<Post>, persistor: Arc<dyn DataPersistor>) -> Self {
        Self {
            collection,
            persistor,
            loaded: None,
        }
    }

    pub async fn get_data(&mut self) -> Result<BTreeMap<String, Row>, StorageError> {
        if self.loaded.is_none() {
            let mut loaded = BTreeMap::new();
            for post in self.collection.items().await? {
                loaded.insert(data_key(post.post_id()), post.to_data()?);
            }
            self.loaded = Some(loaded);
        }
        let loaded = self.loaded.get_or_insert_with(BTreeMap::new);

        if let Some(staged) = self.persistor.get(STAGING_KEY) {
            match staged {
                Value::Object(form) => match Post::from_form(&form) {
                    Ok(post) => {
                        loaded.insert(data_key(post.post_id()), post.to_data()?);
                    }
                    Err(e) => tracing::warn!("Discarding unreadable staged post form: {}", e),
                },
                other => tracing::warn!("Discarding staged post form of unexpected shape: {}", other),
            }
            self.persistor.clear(STAGING_KEY);
        }

        Ok(loaded.clone())
    }
}
