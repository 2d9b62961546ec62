//! Review manager.
//!
//! Per (user, site) pair the lifecycle is `NoReview -> Reviewed` on create,
//! `Reviewed -> Reviewed` on update and `Reviewed -> NoReview` on delete. A second create
//! while `Reviewed` fails with `Conflict`. The pair is a unique constraint in the store,
//! so a create that races past the pre-check is still rejected there.

use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ApiError, FieldError, StoreError},
    models::{ReviewRequest, ReviewWithAuthor},
    repository::Repository,
    slug::resolve_site,
};

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 10;
pub const MIN_CONTENT_CHARS: usize = 10;
pub const MAX_CONTENT_CHARS: usize = 2000;
pub const MAX_TITLE_CHARS: usize = 100;

/// ValidReview
///
/// A review body that passed validation. Only this type reaches the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidReview {
    pub rating: i32,
    pub title: Option<String>,
    pub content: String,
}

impl TryFrom<ReviewRequest> for ValidReview {
    type Error = ApiError;

    fn try_from(req: ReviewRequest) -> Result<Self, Self::Error> {
        let mut details = Vec::new();

        let rating = i32::try_from(req.rating)
            .ok()
            .filter(|r| (MIN_RATING..=MAX_RATING).contains(&i64::from(*r)));
        if rating.is_none() {
            details.push(FieldError::new("rating", "must be between 1 and 10"));
        }

        // Lengths are counted in characters, not bytes.
        let content_len = req.content.chars().count();
        if content_len < MIN_CONTENT_CHARS {
            details.push(FieldError::new("content", "must be at least 10 characters"));
        } else if content_len > MAX_CONTENT_CHARS {
            details.push(FieldError::new("content", "must be at most 2000 characters"));
        }

        if let Some(title) = &req.title {
            if title.chars().count() > MAX_TITLE_CHARS {
                details.push(FieldError::new("title", "must be at most 100 characters"));
            }
        }

        match rating {
            Some(rating) if details.is_empty() => Ok(ValidReview {
                rating,
                title: req.title,
                content: req.content,
            }),
            _ => Err(ApiError::validation("Invalid review data", details)),
        }
    }
}

/// create_review
///
/// Fails with `Conflict` when the caller already reviewed the site, whether that is
/// caught by the pre-check or by the store's pair constraint.
pub async fn create_review(
    repo: &dyn Repository,
    caller: &AuthUser,
    slug: &str,
    req: ReviewRequest,
) -> Result<ReviewWithAuthor, ApiError> {
    let review = ValidReview::try_from(req)?;
    let site = resolve_site(repo, slug).await?;
    let site_id = site.site.id;

    // Friendly early answer; the constraint below is what guarantees uniqueness.
    if repo.find_review(caller.id, site_id).await?.is_some() {
        return Err(already_reviewed(caller.id, site_id));
    }

    match repo.insert_review(caller.id, site_id, &review).await {
        Ok(created) => {
            tracing::info!(
                review_id = %created.review.id,
                user_id = %caller.id,
                %site_id,
                rating = created.review.rating,
                "review created"
            );
            Ok(created)
        }
        Err(StoreError::UniqueViolation) => Err(already_reviewed(caller.id, site_id)),
        Err(err) => Err(err.into()),
    }
}

/// update_review
///
/// Overwrites the caller's review in place; the row keeps its id and creation time.
pub async fn update_review(
    repo: &dyn Repository,
    caller: &AuthUser,
    slug: &str,
    req: ReviewRequest,
) -> Result<ReviewWithAuthor, ApiError> {
    let review = ValidReview::try_from(req)?;
    let site = resolve_site(repo, slug).await?;
    let site_id = site.site.id;

    let updated = repo
        .update_review(caller.id, site_id, &review)
        .await?
        .ok_or_else(|| ApiError::not_found("Review not found"))?;
    tracing::info!(review_id = %updated.review.id, user_id = %caller.id, %site_id, "review updated");
    Ok(updated)
}

/// delete_review
///
/// Removes the caller's own review of the site.
pub async fn delete_review(repo: &dyn Repository, caller: &AuthUser, slug: &str) -> Result<(), ApiError> {
    let site = resolve_site(repo, slug).await?;
    let site_id = site.site.id;

    if !repo.delete_review(caller.id, site_id).await? {
        return Err(ApiError::not_found("Review not found"));
    }
    tracing::info!(user_id = %caller.id, %site_id, "review deleted");
    Ok(())
}

fn already_reviewed(user_id: Uuid, site_id: Uuid) -> ApiError {
    tracing::warn!(%user_id, %site_id, "duplicate review rejected");
    ApiError::conflict("You have already reviewed this dive site")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(rating: i64, content: &str) -> ReviewRequest {
        ReviewRequest {
            rating,
            title: None,
            content: content.to_string(),
        }
    }

    fn failing_fields(req: ReviewRequest) -> Vec<String> {
        match ValidReview::try_from(req) {
            Err(ApiError::Validation { details, .. }) => {
                details.into_iter().map(|d| d.field).collect()
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn rating_bounds_are_inclusive() {
        assert!(ValidReview::try_from(request(1, "0123456789")).is_ok());
        assert!(ValidReview::try_from(request(10, "0123456789")).is_ok());
        assert_eq!(failing_fields(request(0, "0123456789")), ["rating"]);
        assert_eq!(failing_fields(request(11, "0123456789")), ["rating"]);
        assert_eq!(failing_fields(request(i64::MAX, "0123456789")), ["rating"]);
    }

    #[test]
    fn content_length_bounds() {
        assert_eq!(failing_fields(request(5, "123456789")), ["content"]);
        assert!(ValidReview::try_from(request(5, "1234567890")).is_ok());
        assert!(ValidReview::try_from(request(5, &"x".repeat(2000))).is_ok());
        assert_eq!(failing_fields(request(5, &"x".repeat(2001))), ["content"]);
    }

    #[test]
    fn content_is_measured_in_characters() {
        // Ten multi-byte characters.
        let fish = "\u{1F420}".repeat(10);
        assert!(ValidReview::try_from(request(5, &fish)).is_ok());
        assert_eq!(failing_fields(request(5, &fish[..36])), ["content"]);
    }

    #[test]
    fn overlong_title_is_rejected() {
        let req = ReviewRequest {
            rating: 7,
            title: Some("t".repeat(101)),
            content: "long enough content".to_string(),
        };
        assert_eq!(failing_fields(req), ["title"]);
    }

    #[test]
    fn every_failing_field_is_reported() {
        assert_eq!(failing_fields(request(0, "short")), ["rating", "content"]);
    }
}
