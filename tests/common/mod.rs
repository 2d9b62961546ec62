//! Shared test double: an `InMemoryRepository` wrapper whose behaviour can be
//! scripted to reproduce interleavings and outages the plain store never shows.
#![allow(dead_code)]

use async_trait::async_trait;
use divesite_catalog::{
    InMemoryRepository, Repository,
    catalog::{SitePage, SiteQuery},
    error::StoreError,
    models::{
        CreateSiteRequest, MarineLife, NewUser, PhotoWithAuthor, Review, ReviewWithAuthor,
        SiteCounts, SiteRow, User,
    },
    reviews::ValidReview,
    slug::SlugCandidates,
};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default)]
pub struct Script {
    /// `find_review` and `site_name_exists` report nothing, as if a concurrent writer
    /// committed between the pre-check and the insert.
    pub skip_prechecks: bool,
    /// `site_counts` lags behind the rows it counts.
    pub stale_counts: bool,
    /// User lookups fail as if the database were unreachable.
    pub users_offline: bool,
}

pub struct ScriptedRepository {
    pub inner: Arc<InMemoryRepository>,
    pub script: Script,
}

impl ScriptedRepository {
    pub fn new(inner: Arc<InMemoryRepository>, script: Script) -> Self {
        Self { inner, script }
    }
}

fn offline() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl Repository for ScriptedRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        if self.script.users_offline {
            return Err(offline());
        }
        self.inner.get_user(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        if self.script.users_offline {
            return Err(offline());
        }
        self.inner.find_user_by_email(email).await
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        self.inner.create_user(user).await
    }

    async fn list_sites(&self, query: &SiteQuery) -> Result<SitePage, StoreError> {
        self.inner.list_sites(query).await
    }

    async fn find_site_by_slug(&self, candidates: &SlugCandidates) -> Result<Option<SiteRow>, StoreError> {
        self.inner.find_site_by_slug(candidates).await
    }

    async fn site_name_exists(&self, name: &str) -> Result<bool, StoreError> {
        if self.script.skip_prechecks {
            return Ok(false);
        }
        self.inner.site_name_exists(name).await
    }

    async fn create_site(&self, req: &CreateSiteRequest, created_by: Uuid) -> Result<SiteRow, StoreError> {
        self.inner.create_site(req, created_by).await
    }

    async fn list_site_reviews(&self, site_id: Uuid) -> Result<Vec<ReviewWithAuthor>, StoreError> {
        self.inner.list_site_reviews(site_id).await
    }

    async fn list_site_photos(&self, site_id: Uuid) -> Result<Vec<PhotoWithAuthor>, StoreError> {
        self.inner.list_site_photos(site_id).await
    }

    async fn site_counts(&self, site_id: Uuid) -> Result<SiteCounts, StoreError> {
        let counts = self.inner.site_counts(site_id).await?;
        if self.script.stale_counts {
            return Ok(SiteCounts {
                reviews: counts.reviews + 3,
                photos: counts.photos + 3,
                ..counts
            });
        }
        Ok(counts)
    }

    async fn find_review(&self, user_id: Uuid, site_id: Uuid) -> Result<Option<Review>, StoreError> {
        if self.script.skip_prechecks {
            return Ok(None);
        }
        self.inner.find_review(user_id, site_id).await
    }

    async fn insert_review(
        &self,
        user_id: Uuid,
        site_id: Uuid,
        review: &ValidReview,
    ) -> Result<ReviewWithAuthor, StoreError> {
        self.inner.insert_review(user_id, site_id, review).await
    }

    async fn update_review(
        &self,
        user_id: Uuid,
        site_id: Uuid,
        review: &ValidReview,
    ) -> Result<Option<ReviewWithAuthor>, StoreError> {
        self.inner.update_review(user_id, site_id, review).await
    }

    async fn delete_review(&self, user_id: Uuid, site_id: Uuid) -> Result<bool, StoreError> {
        self.inner.delete_review(user_id, site_id).await
    }

    async fn list_marine_life(&self) -> Result<Vec<MarineLife>, StoreError> {
        self.inner.list_marine_life().await
    }

    async fn list_site_marine_life(&self, site_id: Uuid) -> Result<Vec<MarineLife>, StoreError> {
        self.inner.list_site_marine_life(site_id).await
    }

    async fn replace_site_marine_life(&self, site_id: Uuid, ids: &[Uuid]) -> Result<(), StoreError> {
        self.inner.replace_site_marine_life(site_id, ids).await
    }
}
