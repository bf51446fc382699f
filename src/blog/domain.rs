// Pure post-level rules: what a valid new post is and how changes apply.
use serde::Deserialize;

use crate::db::models::{Post, UserId};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("`{0}` is required")]
    Missing(&'static str),
}

/// A post ready to be inserted. Only constructible through [`NewPost::new`],
/// so title and description are always non-blank.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    title: String,
    description: String,
    image: Option<String>,
    owner: UserId,
}

impl NewPost {
    pub fn new(
        owner: UserId,
        title: Option<String>,
        description: Option<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            title: required("title", title)?,
            description: required("description", description)?,
            image: None,
            owner,
        })
    }

    pub fn with_image(mut self, path: impl Into<String>) -> Self {
        self.image = Some(path.into());
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }
}

fn required(field: &'static str, value: Option<String>) -> Result<String, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::Missing(field)),
    }
}

/// Body of an update request. Absent or blank fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PostChanges {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl PostChanges {
    pub fn normalized(self) -> Self {
        let keep = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            title: keep(self.title),
            description: keep(self.description),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }

    /// Apply to an in-memory post. Owner and image are never touched.
    pub fn apply_to(&self, post: &mut Post) {
        if let Some(title) = &self.title {
            post.title = title.clone();
        }
        if let Some(description) = &self.description {
            post.description = description.clone();
        }
    }
}
