use std::sync::Arc;

use crate::blog::domain::{NewPost, PostChanges, ValidationError};
use crate::blog::repository::{PostRepository, RepositoryError};
use crate::db::models::{Post, PostId, PostSummary, UserId};
use crate::uploads::{PostForm, UploadError, UploadStore};

#[derive(Debug, thiserror::Error)]
pub enum BlogError {
    #[error("post not found")]
    NotFound,

    #[error("caller does not own this post")]
    NotAuthorized,

    #[error("invalid post: {0}")]
    Validation(#[from] ValidationError),

    #[error("store failure: {0}")]
    Store(#[from] RepositoryError),

    #[error("upload failure: {0}")]
    Upload(#[from] UploadError),
}

/// Create, list, update and delete posts, enforcing ownership.
#[derive(Clone)]
pub struct BlogService {
    posts: Arc<dyn PostRepository>,
    uploads: UploadStore,
}

impl BlogService {
    pub fn new(posts: Arc<dyn PostRepository>, uploads: UploadStore) -> Self {
        Self { posts, uploads }
    }

    /// Validate the form, store the image if one was sent, then insert the
    /// post. A stored image is removed again if the insert fails.
    pub async fn create(&self, owner: UserId, form: PostForm) -> Result<Post, BlogError> {
        let draft = NewPost::new(owner, form.title, form.description)?;

        let Some(pending) = form.image else {
            return Ok(self.posts.create(draft).await?);
        };

        let image = self.uploads.save(&pending).await?;
        match self.posts.create(draft.with_image(image.path.clone())).await {
            Ok(post) => Ok(post),
            Err(e) => {
                self.uploads.discard(&image).await;
                Err(e.into())
            }
        }
    }

    pub async fn list(&self) -> Result<Vec<PostSummary>, BlogError> {
        Ok(self.posts.list().await?)
    }

    pub async fn update(
        &self,
        caller: UserId,
        id: PostId,
        changes: PostChanges,
    ) -> Result<Post, BlogError> {
        let post = self.owned_post(caller, id).await?;

        let changes = changes.normalized();
        if changes.is_empty() {
            return Ok(post);
        }

        self.posts
            .update(id, &changes)
            .await?
            .ok_or(BlogError::NotFound)
    }

    pub async fn delete(&self, caller: UserId, id: PostId) -> Result<(), BlogError> {
        self.owned_post(caller, id).await?;

        if !self.posts.delete_by_id(id).await? {
            return Err(BlogError::NotFound);
        }
        Ok(())
    }

    async fn owned_post(&self, caller: UserId, id: PostId) -> Result<Post, BlogError> {
        let post = self.posts.get_by_id(id).await?.ok_or(BlogError::NotFound)?;
        if post.owner != caller {
            return Err(BlogError::NotAuthorized);
        }
        Ok(post)
    }
}
