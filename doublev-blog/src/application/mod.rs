pub mod form_provider;
pub mod listing_provider;
pub mod mass_action;
pub mod post_admin;
pub mod session;
pub mod setup;

pub use form_provider::{PostFormDataProvider, STAGING_KEY};
pub use listing_provider::{post_listing, ListingData, ListingDataProvider, PostActions};
pub use mass_action::MassSelection;
pub use post_admin::{ActionResult, PostAdmin};
pub use session::{DataPersistor, Message, MessageKind, Session, SessionStore};
pub use setup::{install_patches, CreateInitialPost, DataPatch, PatchApplier};

use crate::data::{CommentRepository, EntityRepository, PostRepository, Storage};
use crate::domain::{Comment, Post};
use crate::infrastructure::url::UrlBuilder;
use std::sync::Arc;

/// Authorization resource tags checked by the admin and REST routes.
pub const POSTS_RESOURCE: &str = "DoubleV_Blog::posts";
pub const COMMENTS_RESOURCE: &str = "DoubleV_Blog::comments";

/// Everything the HTTP layer needs, wired over one storage backend.
#[derive(Clone)]
pub struct BlogServices {
    pub storage: Arc<dyn Storage>,
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub post_admin: Arc<PostAdmin>,
    pub sessions: Arc<SessionStore>,
    pub urls: UrlBuilder,
}

impl BlogServices {
    pub fn new(storage: Arc<dyn Storage>, urls: UrlBuilder) -> Self {
        let posts: Arc<dyn PostRepository> = Arc::new(EntityRepository::<Post>::new(storage.clone()));
        let comments: Arc<dyn CommentRepository> =
            Arc::new(EntityRepository::<Comment>::new(storage.clone()));
        let post_admin = Arc::new(PostAdmin::new(posts.clone(), storage.clone(), urls.clone()));

        Self {
            storage,
            posts,
            comments,
            post_admin,
            sessions: Arc::new(SessionStore::new()),
            urls,
        }
    }

    pub fn patches(&self) -> PatchApplier {
        install_patches(self.storage.clone())
    }
}
