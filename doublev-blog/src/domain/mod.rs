pub mod coerce;
pub mod comment;
pub mod entity;
pub mod error;
pub mod post;
pub mod search;

pub use comment::Comment;
pub use entity::{Column, ColumnKind, Entity, Row, TableSchema};
pub use error::{DomainError, StorageError};
pub use post::Post;
pub use search::{
    ConditionType, Filter, FilterGroup, Page, Query, SearchCriteria, SearchResults, SortDirection,
    SortOrder,
};
