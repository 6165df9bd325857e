use crate::data::{EntityRepository, Storage, StorageTransaction};
use crate::domain::{Post, StorageError};
use async_trait::async_trait;
use std::sync::Arc;

pub const INITIAL_POST_TITLE: &str = "Hello World - DoubleV Blog";
pub const INITIAL_POST_AUTHOR: &str = "DoubleV Partners";

const INITIAL_POST_CONTENT: &str = r#"
<h2>Welcome to the DoubleV Blog Module!</h2>
<p>This is an example post created automatically when the module was installed.</p>
<p>This post demonstrates that the module installation was successful and the database schema is working correctly.</p>
<h3>Features of this module:</h3>
<ul>
    <li>Create and manage blog posts</li>
    <li>Handle comments for posts</li>
    <li>REST API endpoints</li>
    <li>Admin panel integration</li>
    <li>UI Components with KnockoutJS</li>
</ul>
<p>You can edit or delete this post from the admin panel under <strong>Blog > Posts</strong>.</p>
<p><em>Developed by DoubleV Partners - Full Stack Excellence</em></p>
"#;

/// One-shot data change applied after the schema migrations.
///
/// `apply` runs inside the transaction that also records the patch, so a
/// patch is either applied and recorded or neither.
#[async_trait]
pub trait DataPatch: Send + Sync {
    fn name(&self) -> &'static str;

    async fn apply(&self, tx: &StorageTransaction) -> Result<(), StorageError>;
}

/// Inserts the welcome post on first install.
pub struct CreateInitialPost;

#[async_trait]
impl DataPatch for CreateInitialPost {
    fn name(&self) -> &'static str {
        "DoubleV\\Blog\\Setup\\Patch\\Data\\CreateInitialPost"
    }

    async fn apply(&self, tx: &StorageTransaction) -> Result<(), StorageError> {
        let posts = EntityRepository::<Post>::new(tx.storage());

        let mut post = Post::new();
        post.set_title(INITIAL_POST_TITLE)
            .set_content(INITIAL_POST_CONTENT)
            .set_author(INITIAL_POST_AUTHOR)
            .set_is_active(true);

        // Installation must not fail because of the seed
        tx.savepoint().await?;
        match posts.save(post).await {
            Ok(post) => tracing::info!("Initial post created: id={:?}", post.post_id()),
            Err(e) => {
                tx.rollback_to_savepoint().await?;
                tracing::error!("DoubleV Blog: Failed to create initial post - {}", e);
            }
        }
        Ok(())
    }
}

/// Runs every pending patch once, in order, and records it in `patch_list`.
pub struct PatchApplier {
    storage: Arc<dyn Storage>,
    patches: Vec<Box<dyn DataPatch>>,
}

impl PatchApplier {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            patches: Vec::new(),
        }
    }

    pub fn with_patch(mut self, patch: Box<dyn DataPatch>) -> Self {
        self.patches.push(patch);
        self
    }

    /// Returns the names of the patches applied by this run.
    pub async fn apply_pending(&self) -> Result<Vec<&'static str>, StorageError> {
        let mut applied = Vec::new();

        for patch in &self.patches {
            let name = patch.name();
            if self.storage.is_patch_applied(name).await? {
                tracing::debug!("Data patch {} already applied", name);
                continue;
            }

            tracing::info!("Applying data patch {}", name);
            let tx = self.storage.begin().await?;
            patch.apply(&tx).await?;
            tx.storage().record_patch(name).await.map_err(|e| {
                tracing::error!("Failed to record data patch {}: {}", name, e);
                e
            })?;
            tx.commit().await?;
            applied.push(name);
        }

        Ok(applied)
    }
}

/// The module's data patches, in install order.
pub fn install_patches(storage: Arc<dyn Storage>) -> PatchApplier {
    PatchApplier::new(storage).with_patch(Box::new(CreateInitialPost))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MemoryStorage, PostRepository};
    use crate::domain::SearchCriteria;

    fn install() -> (Arc<MemoryStorage>, Arc<EntityRepository<Post>>, PatchApplier) {
        let storage = Arc::new(MemoryStorage::new());
        let posts = Arc::new(EntityRepository::<Post>::new(storage.clone()));
        let applier = install_patches(storage.clone());
        (storage, posts, applier)
    }

    async fn post_count(posts: &EntityRepository<Post>) -> u64 {
        PostRepository::get_list(posts, &SearchCriteria::new())
            .await
            .unwrap()
            .total_count
    }

    #[tokio::test]
    async fn seed_inserts_the_welcome_post_once() {
        let (_, posts, applier) = install();

        assert_eq!(applier.apply_pending().await.unwrap().len(), 1);
        assert!(applier.apply_pending().await.unwrap().is_empty());

        let results = PostRepository::get_list(posts.as_ref(), &SearchCriteria::new())
            .await
            .unwrap();
        assert_eq!(results.total_count, 1);
        let post = &results.items[0];
        assert_eq!(post.title(), Some(INITIAL_POST_TITLE));
        assert_eq!(post.author(), Some(INITIAL_POST_AUTHOR));
        assert_eq!(post.is_active(), Some(true));
        assert!(post.content().unwrap_or_default().contains("Welcome to the DoubleV Blog Module!"));
    }

    #[tokio::test]
    async fn seed_failure_does_not_fail_installation() {
        let (storage, posts, applier) = install();

        storage.set_fail_writes(true);
        let applied = applier.apply_pending().await.unwrap();
        storage.set_fail_writes(false);

        assert_eq!(applied.len(), 1);
        assert!(storage.is_patch_applied(applied[0]).await.unwrap());
        assert!(applier.apply_pending().await.unwrap().is_empty());
        assert_eq!(post_count(&posts).await, 0);
    }

    #[tokio::test]
    async fn unrecorded_patch_leaves_no_seed_behind() {
        let (storage, posts, applier) = install();

        storage.set_fail_patch_records(true);
        assert!(applier.apply_pending().await.is_err());
        assert_eq!(post_count(&posts).await, 0);

        storage.set_fail_patch_records(false);
        assert_eq!(applier.apply_pending().await.unwrap().len(), 1);
        assert!(applier.apply_pending().await.unwrap().is_empty());
        assert_eq!(post_count(&posts).await, 1);
    }
}
