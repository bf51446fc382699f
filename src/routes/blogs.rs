use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};

use crate::blog::{BlogError, PostChanges};
use crate::db::models::{Post, PostId, PostSummary};
use crate::error::{AppError, AppResult, Message};
use crate::extractors::CurrentUser;
use crate::state::AppState;

const CREATE_FAILED: &str = "Error creating blog";
const FETCH_FAILED: &str = "Error fetching blogs";
const UPDATE_FAILED: &str = "Error updating blog";
const DELETE_FAILED: &str = "Error deleting blog";
const NOT_FOUND: &str = "Blog not found";

/// Room for the text fields and multipart framing around the image.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/api/blogs", get(list_blogs).post(create_blog))
        .route("/api/blogs/{id}", put(update_blog).delete(delete_blog))
        .layer(DefaultBodyLimit::max(
            max_upload_bytes.saturating_add(FORM_OVERHEAD_BYTES),
        ))
}

/// Map a service error to a response. Missing posts and ownership failures
/// keep their own status; everything else becomes `fallback`.
fn reject(err: BlogError, fallback: AppError) -> AppError {
    match err {
        BlogError::NotFound => AppError::NotFound(NOT_FOUND.into()),
        BlogError::NotAuthorized => AppError::NotAuthorized,
        other => {
            tracing::warn!("{}: {}", fallback, other);
            fallback
        }
    }
}

fn parse_id(raw: &str) -> AppResult<PostId> {
    PostId::parse(raw).ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
}

async fn create_blog(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<Post>)> {
    let multipart = multipart.map_err(|e| {
        tracing::warn!("{}: {}", CREATE_FAILED, e);
        AppError::BadRequest(CREATE_FAILED.into())
    })?;

    let form = state
        .uploads
        .read_form(multipart)
        .await
        .map_err(|e| reject(e.into(), AppError::BadRequest(CREATE_FAILED.into())))?;

    let post = state
        .blogs
        .create(user.id, form)
        .await
        .map_err(|e| reject(e, AppError::BadRequest(CREATE_FAILED.into())))?;
    tracing::info!(post_id = %post.id, owner = %post.owner, "Created post");

    Ok((StatusCode::CREATED, Json(post)))
}

async fn list_blogs(State(state): State<AppState>) -> AppResult<Json<Vec<PostSummary>>> {
    let posts = state
        .blogs
        .list()
        .await
        .map_err(|e| reject(e, AppError::Failed(FETCH_FAILED.into())))?;
    Ok(Json(posts))
}

async fn update_blog(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<Json<Post>> {
    let id = parse_id(&id)?;

    // An empty body is an update with no fields
    let changes: PostChanges = if body.iter().all(u8::is_ascii_whitespace) {
        PostChanges::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!("{}: {}", UPDATE_FAILED, e);
            AppError::BadRequest(UPDATE_FAILED.into())
        })?
    };

    let post = state
        .blogs
        .update(user.id, id, changes)
        .await
        .map_err(|e| reject(e, AppError::BadRequest(UPDATE_FAILED.into())))?;
    tracing::info!(post_id = %post.id, "Updated post");

    Ok(Json(post))
}

async fn delete_blog(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Message>> {
    let id = parse_id(&id)?;

    state
        .blogs
        .delete(user.id, id)
        .await
        .map_err(|e| reject(e, AppError::BadRequest(DELETE_FAILED.into())))?;
    tracing::info!(post_id = %id, "Deleted post");

    Ok(Json(Message::new("Blog removed")))
}
