use super::collection::Collection;
use super::resource::ResourceGateway;
use super::search_criteria::apply_search_criteria;
use super::storage::Storage;
use crate::domain::comment::fields as comment_fields;
use crate::domain::{
    Comment, ConditionType, DomainError, Entity, Post, SearchCriteria, SearchResults,
};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn save(&self, post: Post) -> Result<Post, DomainError>;
    async fn get_by_id(&self, post_id: i64) -> Result<Post, DomainError>;
    async fn get_list(&self, criteria: &SearchCriteria) -> Result<SearchResults<Post>, DomainError>;
    async fn delete(&self, post: &Post) -> Result<bool, DomainError>;
    async fn delete_by_id(&self, post_id: i64) -> Result<bool, DomainError>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn save(&self, comment: Comment) -> Result<Comment, DomainError>;
    async fn get_by_id(&self, comment_id: i64) -> Result<Comment, DomainError>;
    async fn get_by_post_id(&self, post_id: i64) -> Result<Vec<Comment>, DomainError>;
    async fn get_list(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<SearchResults<Comment>, DomainError>;
    async fn delete(&self, comment: &Comment) -> Result<bool, DomainError>;
    async fn delete_by_id(&self, comment_id: i64) -> Result<bool, DomainError>;
}

/// CRUD over one entity table, raising the domain error taxonomy.
pub struct EntityRepository<E: Entity> {
    resource: ResourceGateway<E>,
    storage: Arc<dyn Storage>,
}

impl<E: Entity> EntityRepository<E> {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            resource: ResourceGateway::new(storage.clone()),
            storage,
        }
    }

    pub fn create_collection(&self) -> Collection<E> {
        Collection::new(self.storage.clone())
    }

    pub async fn save(&self, mut entity: E) -> Result<E, DomainError> {
        self.resource.save(&mut entity).await.map_err(|e| {
            tracing::error!("Failed to save {}: {}", E::LABEL, e);
            DomainError::PersistenceFailed(e.to_string())
        })?;

        tracing::info!("{} saved: id={:?}", E::LABEL, entity.id());
        Ok(entity)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<E, DomainError> {
        let mut entity = E::default();
        self.resource.load(&mut entity, id).await?;

        if entity.id().is_none() {
            return Err(DomainError::NotFound(format!(
                "{} with id \"{}\" does not exist.",
                E::LABEL,
                id
            )));
        }

        Ok(entity)
    }

    pub async fn get_list(&self, criteria: &SearchCriteria) -> Result<SearchResults<E>, DomainError> {
        let mut collection = self.create_collection();
        Ok(apply_search_criteria(&mut collection, criteria).await?)
    }

    pub async fn delete(&self, entity: &E) -> Result<bool, DomainError> {
        self.resource.delete(entity).await.map_err(|e| {
            tracing::error!("Failed to delete {} {:?}: {}", E::LABEL, entity.id(), e);
            DomainError::DeleteFailed(e.to_string())
        })?;

        tracing::info!("{} deleted: id={:?}", E::LABEL, entity.id());
        Ok(true)
    }

    pub async fn delete_by_id(&self, id: i64) -> Result<bool, DomainError> {
        let entity = self.get_by_id(id).await?;
        self.delete(&entity).await
    }
}

#[async_trait]
impl PostRepository for EntityRepository<Post> {
    async fn save(&self, post: Post) -> Result<Post, DomainError> {
        EntityRepository::save(self, post).await
    }

    async fn get_by_id(&self, post_id: i64) -> Result<Post, DomainError> {
        EntityRepository::get_by_id(self, post_id).await
    }

    async fn get_list(&self, criteria: &SearchCriteria) -> Result<SearchResults<Post>, DomainError> {
        EntityRepository::get_list(self, criteria).await
    }

    async fn delete(&self, post: &Post) -> Result<bool, DomainError> {
        EntityRepository::delete(self, post).await
    }

    async fn delete_by_id(&self, post_id: i64) -> Result<bool, DomainError> {
        EntityRepository::delete_by_id(self, post_id).await
    }
}

#[async_trait]
impl CommentRepository for EntityRepository<Comment> {
    async fn save(&self, comment: Comment) -> Result<Comment, DomainError> {
        EntityRepository::save(self, comment).await
    }

    async fn get_by_id(&self, comment_id: i64) -> Result<Comment, DomainError> {
        EntityRepository::get_by_id(self, comment_id).await
    }

    async fn get_by_post_id(&self, post_id: i64) -> Result<Vec<Comment>, DomainError> {
        let mut collection = self.create_collection();
        collection.add_field_to_filter(comment_fields::POST_ID, ConditionType::Eq, post_id);
        Ok(collection.items().await?)
    }

    async fn get_list(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<SearchResults<Comment>, DomainError> {
        EntityRepository::get_list(self, criteria).await
    }

    async fn delete(&self, comment: &Comment) -> Result<bool, DomainError> {
        EntityRepository::delete(self, comment).await
    }

    async fn delete_by_id(&self, comment_id: i64) -> Result<bool, DomainError> {
        EntityRepository::delete_by_id(self, comment_id).await
    }
}
