pub mod collection;
pub mod memory_storage;
pub mod postgres_storage;
pub mod repository;
pub mod resource;
pub mod search_criteria;
pub mod storage;

pub use collection::Collection;
pub use memory_storage::MemoryStorage;
pub use postgres_storage::PostgresStorage;
pub use repository::{CommentRepository, EntityRepository, PostRepository};
pub use resource::ResourceGateway;
pub use search_criteria::apply_search_criteria;
pub use storage::{Storage, StorageTransaction, TransactionControl};
