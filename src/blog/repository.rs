// Repository pattern - isolates all post persistence
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::blog::domain::{NewPost, PostChanges};
use crate::db::models::{OwnerSummary, Post, PostId, PostSummary};
use crate::state::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),
}

/// Persistence boundary for posts.
///
/// No version checks: concurrent updates to one post are last-write-wins.
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a post under a freshly generated id
    async fn create(&self, post: NewPost) -> Result<Post, RepositoryError>;

    /// All posts, newest first, with owners expanded to id and email
    async fn list(&self) -> Result<Vec<PostSummary>, RepositoryError>;

    async fn get_by_id(&self, id: PostId) -> Result<Option<Post>, RepositoryError>;

    /// Apply the provided fields; `None` if the post does not exist
    async fn update(&self, id: PostId, changes: &PostChanges)
        -> Result<Option<Post>, RepositoryError>;

    /// Returns whether a post was removed
    async fn delete_by_id(&self, id: PostId) -> Result<bool, RepositoryError>;
}

/// SQLite implementation
pub struct SqlitePostRepository {
    pool: DbPool,
}

impl SqlitePostRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const POST_COLUMNS: &str = "id, title, description, image, user_id, created_at, updated_at";

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        image: row.get(3)?,
        owner: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn load_post(conn: &rusqlite::Connection, id: PostId) -> rusqlite::Result<Option<Post>> {
    conn.query_row(
        &format!("SELECT {} FROM posts WHERE id = ?1", POST_COLUMNS),
        params![id],
        post_from_row,
    )
    .optional()
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait]
impl PostRepository for SqlitePostRepository {
    async fn create(&self, post: NewPost) -> Result<Post, RepositoryError> {
        let conn = self.pool.get()?;
        let created_at = now();
        let stored = Post {
            id: PostId::generate(),
            title: post.title().to_string(),
            description: post.description().to_string(),
            image: post.image().map(str::to_string),
            owner: post.owner(),
            updated_at: created_at.clone(),
            created_at,
        };

        conn.execute(
            "INSERT INTO posts (id, title, description, image, user_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                stored.id,
                stored.title,
                stored.description,
                stored.image,
                stored.owner,
                stored.created_at,
                stored.updated_at
            ],
        )?;

        Ok(stored)
    }

    async fn list(&self) -> Result<Vec<PostSummary>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT p.id, p.title, p.description, p.image, p.user_id, u.email,
                    p.created_at, p.updated_at
             FROM posts p
             LEFT JOIN users u ON u.id = p.user_id
             ORDER BY p.created_at DESC, p.id DESC",
        )?;

        let posts = stmt
            .query_map([], |row| {
                Ok(PostSummary {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    description: row.get(2)?,
                    image: row.get(3)?,
                    owner: OwnerSummary {
                        id: row.get(4)?,
                        email: row.get(5)?,
                    },
                    created_at: row.get(6)?,
                    updated_at: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(posts)
    }

    async fn get_by_id(&self, id: PostId) -> Result<Option<Post>, RepositoryError> {
        let conn = self.pool.get()?;
        Ok(load_post(&conn, id)?)
    }

    async fn update(
        &self,
        id: PostId,
        changes: &PostChanges,
    ) -> Result<Option<Post>, RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let Some(mut post) = load_post(&tx, id)? else {
            return Ok(None);
        };
        changes.apply_to(&mut post);
        post.updated_at = now();

        tx.execute(
            "UPDATE posts SET title = ?2, description = ?3, updated_at = ?4 WHERE id = ?1",
            params![post.id, post.title, post.description, post.updated_at],
        )?;
        tx.commit()?;

        Ok(Some(post))
    }

    async fn delete_by_id(&self, id: PostId) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::users::create_user;
    use crate::db::memory_pool;
    use crate::db::models::UserId;

    fn create_test_repo() -> (SqlitePostRepository, UserId) {
        let pool = memory_pool();
        let user = create_user(&pool, "owner@example.com", "pw", 4).unwrap();
        (SqlitePostRepository::new(pool), user.id)
    }

    fn new_post(owner: UserId, title: &str) -> NewPost {
        NewPost::new(owner, Some(title.into()), Some("body".into())).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (repo, owner) = create_test_repo();

        let created = repo
            .create(new_post(owner, "First").with_image("uploads/1-a.png"))
            .await
            .unwrap();
        assert_eq!(created.title, "First");
        assert_eq!(created.owner, owner);
        assert_eq!(created.image.as_deref(), Some("uploads/1-a.png"));

        let loaded = repo.get_by_id(created.id).await.unwrap();
        assert_eq!(loaded, Some(created));
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let (repo, _owner) = create_test_repo();
        assert_eq!(repo.get_by_id(PostId::generate()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_create_for_unknown_owner_fails() {
        let (repo, _owner) = create_test_repo();
        let result = repo.create(new_post(UserId::generate(), "Orphan")).await;
        assert!(matches!(result, Err(RepositoryError::Sql(_))));
    }

    #[tokio::test]
    async fn test_list_expands_owner_newest_first() {
        let (repo, owner) = create_test_repo();
        let first = repo.create(new_post(owner, "First")).await.unwrap();
        let second = repo.create(new_post(owner, "Second")).await.unwrap();

        let posts = repo.list().await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].id, second.id);
        assert_eq!(posts[1].id, first.id);
        assert_eq!(posts[0].owner.id, owner);
        assert_eq!(posts[0].owner.email.as_deref(), Some("owner@example.com"));
    }

    #[tokio::test]
    async fn test_list_is_stable_without_writes() {
        let (repo, owner) = create_test_repo();
        repo.create(new_post(owner, "One")).await.unwrap();
        repo.create(new_post(owner, "Two")).await.unwrap();

        assert_eq!(repo.list().await.unwrap(), repo.list().await.unwrap());
    }

    #[tokio::test]
    async fn test_update_applies_only_provided_fields() {
        let (repo, owner) = create_test_repo();
        let created = repo
            .create(new_post(owner, "Title").with_image("uploads/1-a.png"))
            .await
            .unwrap();

        let changes = PostChanges {
            title: None,
            description: Some("Changed".into()),
        };
        let updated = repo.update(created.id, &changes).await.unwrap().unwrap();
        assert_eq!(updated.title, "Title");
        assert_eq!(updated.description, "Changed");
        assert_eq!(updated.image, created.image);
        assert_eq!(updated.owner, owner);

        let loaded = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(loaded, updated);
    }

    #[tokio::test]
    async fn test_update_missing_returns_none() {
        let (repo, _owner) = create_test_repo();
        let result = repo
            .update(PostId::generate(), &PostChanges::default())
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_delete() {
        let (repo, owner) = create_test_repo();
        let created = repo.create(new_post(owner, "Doomed")).await.unwrap();

        assert!(repo.delete_by_id(created.id).await.unwrap());
        assert_eq!(repo.get_by_id(created.id).await.unwrap(), None);

        // Delete again should return false
        assert!(!repo.delete_by_id(created.id).await.unwrap());
    }
}
