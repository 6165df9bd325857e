use super::storage::Storage;
use crate::domain::{Entity, StorageError};
use chrono::{Local, NaiveDateTime, Timelike};
use std::marker::PhantomData;
use std::sync::Arc;

/// Moves one entity to and from its table row, keyed by the primary key.
pub struct ResourceGateway<E: Entity> {
    storage: Arc<dyn Storage>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for ResourceGateway<E> {
    fn clone(&self) -> Self {
        Self::new(self.storage.clone())
    }
}

fn local_now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

impl<E: Entity> ResourceGateway<E> {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            _entity: PhantomData,
        }
    }

    /// Populates `entity` from the row with primary key `id`.
    ///
    /// An absent row leaves the entity untouched, so its id stays unset.
    pub async fn load(&self, entity: &mut E, id: i64) -> Result<(), StorageError> {
        if let Some(row) = self.storage.fetch_row(&E::SCHEMA, id).await? {
            *entity = E::from_row(row)?;
        }
        Ok(())
    }

    /// Inserts an entity without id (and writes the new id back) or updates the row it names.
    pub async fn save(&self, entity: &mut E) -> Result<(), StorageError> {
        entity.validate()?;

        let schema = E::SCHEMA;
        match entity.id() {
            None => {
                entity.touch(local_now(), true);
                let id = self.storage.insert_row(&schema, &entity.to_row()?).await?;
                entity.set_id(id);
                tracing::debug!("Inserted {} row {}", schema.name, id);
            }
            Some(id) => {
                entity.touch(local_now(), false);
                let mut row = entity.to_row()?;
                for column in schema.insert_only {
                    row.remove(*column);
                }
                self.storage.update_row(&schema, id, &row).await?;
                tracing::debug!("Updated {} row {}", schema.name, id);
            }
        }

        Ok(())
    }

    /// Deletes the entity's row. A row that is already gone counts as deleted.
    pub async fn delete(&self, entity: &E) -> Result<(), StorageError> {
        let Some(id) = entity.id() else {
            return Ok(());
        };

        let affected = self.storage.delete_row(&E::SCHEMA, id).await?;
        if affected == 0 {
            tracing::debug!("{} row {} was already absent", E::SCHEMA.name, id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryStorage;
    use crate::domain::Post;

    fn gateway() -> ResourceGateway<Post> {
        ResourceGateway::new(Arc::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn load_of_missing_row_leaves_entity_empty() {
        let gateway = gateway();
        let mut post = Post::new();
        gateway.load(&mut post, 9).await.unwrap();
        assert_eq!(post.post_id(), None);
    }

    #[tokio::test]
    async fn insert_assigns_id_and_timestamps() {
        let gateway = gateway();
        let mut post = Post::new();
        post.set_title("T");
        gateway.save(&mut post).await.unwrap();

        assert_eq!(post.post_id(), Some(1));
        assert!(post.created_at().is_some());
        assert_eq!(post.created_at(), post.updated_at());
    }

    #[tokio::test]
    async fn update_never_rewrites_creation_time() {
        let gateway = gateway();
        let mut post = Post::new();
        post.set_title("T");
        gateway.save(&mut post).await.unwrap();
        let created = post.created_at();

        let mut edited = Post::new();
        edited
            .set_post_id(1)
            .set_title("T2")
            .set_created_at(crate::domain::coerce::parse_timestamp("2000-01-01 00:00:00").unwrap());
        gateway.save(&mut edited).await.unwrap();

        let mut reloaded = Post::new();
        gateway.load(&mut reloaded, 1).await.unwrap();
        assert_eq!(reloaded.title(), Some("T2"));
        assert_eq!(reloaded.created_at(), created);
    }

    #[tokio::test]
    async fn deleting_twice_is_idempotent() {
        let gateway = gateway();
        let mut post = Post::new();
        post.set_title("T");
        gateway.save(&mut post).await.unwrap();

        gateway.delete(&post).await.unwrap();
        gateway.delete(&post).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_entity_is_not_written() {
        let gateway = gateway();
        let mut post = Post::new();
        let err = gateway.save(&mut post).await.unwrap_err();
        assert_eq!(err.to_string(), "The post title is required.");
        assert_eq!(post.post_id(), None);
    }
}
