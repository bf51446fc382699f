pub mod domain;
pub mod repository;
pub mod service;

pub use domain::{NewPost, PostChanges, ValidationError};
pub use repository::{PostRepository, RepositoryError, SqlitePostRepository};
pub use service::{BlogError, BlogService};
