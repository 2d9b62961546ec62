use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    catalog::{SitePage, SiteQuery},
    error::StoreError,
    models::{
        AuthorSummary, CreateSiteRequest, Difficulty, DiveSite, MarineLife, MarineLifeType,
        NewUser, Photo, PhotoAuthor, PhotoWithAuthor, Review, ReviewWithAuthor, Role, SiteCounts,
        SiteListRow, SiteRow, User,
    },
    repository::Repository,
    reviews::ValidReview,
    slug::SlugCandidates,
};

/// InMemoryRepository
///
/// A `Repository` held entirely in process memory, used by the test suites and local
/// demos. It enforces the same structural rules as the Postgres schema: unique emails,
/// one review per (user, site) pair, and foreign keys on every reference.
///
/// Timestamps come from a logical clock that advances one second per write, so
/// "newest first" and "oldest wins" orderings are deterministic.
pub struct InMemoryRepository {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    ticks: i64,
    users: Vec<User>,
    sites: Vec<DiveSite>,
    reviews: Vec<Review>,
    photos: Vec<Photo>,
    favorites: HashSet<(Uuid, Uuid)>,
    marine_life: Vec<MarineLife>,
    site_marine_life: HashMap<Uuid, Vec<Uuid>>,
}

impl State {
    fn now(&mut self) -> DateTime<Utc> {
        self.ticks += 1;
        epoch() + Duration::seconds(self.ticks)
    }

    fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn has_site(&self, id: Uuid) -> bool {
        self.sites.iter().any(|s| s.id == id)
    }

    fn site_row(&self, site: &DiveSite) -> Option<SiteRow> {
        let creator = self.user(site.created_by_id)?;
        Some(SiteRow {
            site: site.clone(),
            creator_name: creator.name.clone(),
            creator_role: creator.role,
        })
    }

    fn with_author(&self, review: Review) -> Option<ReviewWithAuthor> {
        let author = self.user(review.user_id)?;
        let user = AuthorSummary {
            id: author.id,
            name: author.name.clone(),
            avatar: author.avatar.clone(),
        };
        Some(ReviewWithAuthor { review, user })
    }
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::days(20_000)
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means another test thread panicked mid-write.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // --- Seeding helpers ---

    /// Inserts an account with an unusable password hash (login always fails).
    pub fn add_user(&self, name: &str, role: Role) -> User {
        let mut state = self.lock();
        let user = User {
            id: Uuid::new_v4(),
            email: format!("{}@divers.test", name.to_lowercase().replace(' ', ".")),
            password_hash: "!".to_string(),
            name: name.to_string(),
            role,
            avatar: None,
            bio: None,
            created_at: state.now(),
        };
        state.users.push(user.clone());
        user
    }

    pub fn add_site(&self, name: &str, created_by: Uuid) -> DiveSite {
        self.add_site_with(name, created_by, |_| {})
    }

    /// Inserts a minimal active site, letting the caller adjust any field first.
    pub fn add_site_with(
        &self,
        name: &str,
        created_by: Uuid,
        configure: impl FnOnce(&mut DiveSite),
    ) -> DiveSite {
        let mut state = self.lock();
        let now = state.now();
        let mut site = DiveSite {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: format!("{name} dive site"),
            location: "Unknown".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            depth_min: 5,
            depth_max: 30,
            dive_type: Vec::new(),
            difficulty: Difficulty::Beginner,
            required_certification: Vec::new(),
            current_conditions: None,
            drift_potential: None,
            entry_point: None,
            visibility_min: None,
            visibility_max: None,
            temperature_min: None,
            temperature_max: None,
            marine_life: None,
            emergency_info: None,
            average_dive_duration: None,
            hazards: None,
            permits_fees: None,
            eco_data: None,
            is_active: true,
            created_by_id: created_by,
            created_at: now,
            updated_at: now,
        };
        configure(&mut site);
        state.sites.push(site.clone());
        site
    }

    pub fn add_marine_life(&self, name: &str, kind: MarineLifeType) -> MarineLife {
        let taxon = MarineLife {
            id: Uuid::new_v4(),
            name: name.to_string(),
            latin_name: None,
            kind,
            description: None,
            image_url: None,
        };
        self.lock().marine_life.push(taxon.clone());
        taxon
    }

    pub fn add_photo(&self, user_id: Uuid, site_id: Uuid, url: &str) -> Photo {
        let mut state = self.lock();
        let photo = Photo {
            id: Uuid::new_v4(),
            url: url.to_string(),
            caption: None,
            user_id,
            dive_site_id: site_id,
            created_at: state.now(),
        };
        state.photos.push(photo.clone());
        photo
    }

    pub fn add_favorite(&self, user_id: Uuid, site_id: Uuid) {
        self.lock().favorites.insert((user_id, site_id));
    }

    /// Number of stored reviews for the pair; never more than one.
    pub fn review_count(&self, user_id: Uuid, site_id: Uuid) -> usize {
        self.lock()
            .reviews
            .iter()
            .filter(|r| r.user_id == user_id && r.dive_site_id == site_id)
            .count()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.lock().user(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut state = self.lock();
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation);
        }
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            name: user.name,
            role: Role::User,
            avatar: None,
            bio: None,
            created_at: state.now(),
        };
        state.users.push(created.clone());
        Ok(created)
    }

    async fn list_sites(&self, query: &SiteQuery) -> Result<SitePage, StoreError> {
        let state = self.lock();
        let search = query.search.as_deref().map(str::to_lowercase);

        let mut matches: Vec<&DiveSite> = state
            .sites
            .iter()
            .filter(|s| s.is_active)
            .filter(|s| match &search {
                Some(term) => {
                    contains_ci(&s.name, term)
                        || contains_ci(&s.location, term)
                        || contains_ci(&s.description, term)
                }
                None => true,
            })
            .filter(|s| query.difficulty.is_none_or(|d| s.difficulty == d))
            .filter(|s| query.dive_type.is_none_or(|t| s.dive_type.contains(&t)))
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let total = matches.len() as i64;
        let rows = matches
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .filter_map(|site| {
                let row = state.site_row(site)?;
                Some(SiteListRow {
                    review_count: state.reviews.iter().filter(|r| r.dive_site_id == site.id).count() as i64,
                    favorite_count: state.favorites.iter().filter(|(_, s)| *s == site.id).count() as i64,
                    site: row.site,
                    creator_name: row.creator_name,
                    creator_role: row.creator_role,
                })
            })
            .collect();

        Ok(SitePage { rows, total })
    }

    async fn find_site_by_slug(&self, candidates: &SlugCandidates) -> Result<Option<SiteRow>, StoreError> {
        let state = self.lock();
        let best = state
            .sites
            .iter()
            .filter_map(|s| candidates.rank(&s.name).map(|rank| (rank, s)))
            .min_by(|(ra, a), (rb, b)| {
                ra.cmp(rb)
                    .then(a.created_at.cmp(&b.created_at))
                    .then(a.id.cmp(&b.id))
            });
        Ok(best.and_then(|(_, site)| state.site_row(site)))
    }

    async fn site_name_exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.lock().sites.iter().any(|s| s.name == name))
    }

    async fn create_site(&self, req: &CreateSiteRequest, created_by: Uuid) -> Result<SiteRow, StoreError> {
        let mut state = self.lock();
        if state.user(created_by).is_none() {
            return Err(StoreError::ForeignKeyViolation);
        }
        if state.sites.iter().any(|s| s.name == req.name) {
            return Err(StoreError::UniqueViolation);
        }
        let now = state.now();
        let site = DiveSite {
            id: Uuid::new_v4(),
            name: req.name.clone(),
            description: req.description.clone(),
            location: req.location.clone(),
            latitude: req.latitude,
            longitude: req.longitude,
            depth_min: req.depth_min,
            depth_max: req.depth_max,
            dive_type: req.dive_type.clone(),
            difficulty: req.difficulty,
            required_certification: req.required_certification.clone(),
            current_conditions: req.current_conditions,
            drift_potential: req.drift_potential.clone(),
            entry_point: req.entry_point.clone(),
            visibility_min: req.visibility_min,
            visibility_max: req.visibility_max,
            temperature_min: req.temperature_min,
            temperature_max: req.temperature_max,
            marine_life: req.marine_life.clone(),
            emergency_info: req.emergency_info.clone(),
            average_dive_duration: req.average_dive_duration,
            hazards: req.hazards.clone(),
            permits_fees: req.permits_fees.clone(),
            eco_data: req.eco_data.clone(),
            is_active: true,
            created_by_id: created_by,
            created_at: now,
            updated_at: now,
        };
        state.sites.push(site.clone());
        state.site_row(&site).ok_or(StoreError::ForeignKeyViolation)
    }

    async fn list_site_reviews(&self, site_id: Uuid) -> Result<Vec<ReviewWithAuthor>, StoreError> {
        let state = self.lock();
        let mut reviews: Vec<Review> = state
            .reviews
            .iter()
            .filter(|r| r.dive_site_id == site_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(reviews.into_iter().filter_map(|r| state.with_author(r)).collect())
    }

    async fn list_site_photos(&self, site_id: Uuid) -> Result<Vec<PhotoWithAuthor>, StoreError> {
        let state = self.lock();
        let mut photos: Vec<&Photo> = state.photos.iter().filter(|p| p.dive_site_id == site_id).collect();
        photos.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(photos
            .into_iter()
            .filter_map(|p| {
                let author = state.user(p.user_id)?;
                Some(PhotoWithAuthor {
                    photo: p.clone(),
                    user: PhotoAuthor {
                        id: author.id,
                        name: author.name.clone(),
                    },
                })
            })
            .collect())
    }

    async fn site_counts(&self, site_id: Uuid) -> Result<SiteCounts, StoreError> {
        let state = self.lock();
        Ok(SiteCounts {
            reviews: state.reviews.iter().filter(|r| r.dive_site_id == site_id).count() as i64,
            favorites: state.favorites.iter().filter(|(_, s)| *s == site_id).count() as i64,
            photos: state.photos.iter().filter(|p| p.dive_site_id == site_id).count() as i64,
        })
    }

    async fn find_review(&self, user_id: Uuid, site_id: Uuid) -> Result<Option<Review>, StoreError> {
        Ok(self
            .lock()
            .reviews
            .iter()
            .find(|r| r.user_id == user_id && r.dive_site_id == site_id)
            .cloned())
    }

    async fn insert_review(
        &self,
        user_id: Uuid,
        site_id: Uuid,
        review: &ValidReview,
    ) -> Result<ReviewWithAuthor, StoreError> {
        let mut state = self.lock();
        if state.user(user_id).is_none() || !state.has_site(site_id) {
            return Err(StoreError::ForeignKeyViolation);
        }
        if state
            .reviews
            .iter()
            .any(|r| r.user_id == user_id && r.dive_site_id == site_id)
        {
            return Err(StoreError::UniqueViolation);
        }
        let now = state.now();
        let created = Review {
            id: Uuid::new_v4(),
            rating: review.rating,
            title: review.title.clone(),
            content: review.content.clone(),
            user_id,
            dive_site_id: site_id,
            created_at: now,
            updated_at: now,
        };
        state.reviews.push(created.clone());
        state.with_author(created).ok_or(StoreError::ForeignKeyViolation)
    }

    async fn update_review(
        &self,
        user_id: Uuid,
        site_id: Uuid,
        review: &ValidReview,
    ) -> Result<Option<ReviewWithAuthor>, StoreError> {
        let mut state = self.lock();
        let now = state.now();
        let Some(existing) = state
            .reviews
            .iter_mut()
            .find(|r| r.user_id == user_id && r.dive_site_id == site_id)
        else {
            return Ok(None);
        };
        existing.rating = review.rating;
        existing.title = review.title.clone();
        existing.content = review.content.clone();
        existing.updated_at = now;
        let updated = existing.clone();
        Ok(state.with_author(updated))
    }

    async fn delete_review(&self, user_id: Uuid, site_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let before = state.reviews.len();
        state
            .reviews
            .retain(|r| !(r.user_id == user_id && r.dive_site_id == site_id));
        Ok(state.reviews.len() < before)
    }

    async fn list_marine_life(&self) -> Result<Vec<MarineLife>, StoreError> {
        let mut taxa = self.lock().marine_life.clone();
        taxa.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(taxa)
    }

    async fn list_site_marine_life(&self, site_id: Uuid) -> Result<Vec<MarineLife>, StoreError> {
        let state = self.lock();
        let ids = state.site_marine_life.get(&site_id).cloned().unwrap_or_default();
        let mut taxa: Vec<MarineLife> = state
            .marine_life
            .iter()
            .filter(|m| ids.contains(&m.id))
            .cloned()
            .collect();
        taxa.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(taxa)
    }

    async fn replace_site_marine_life(&self, site_id: Uuid, ids: &[Uuid]) -> Result<(), StoreError> {
        let mut state = self.lock();
        if !state.has_site(site_id) {
            return Err(StoreError::ForeignKeyViolation);
        }
        // Validate everything before touching the set so a failure leaves it intact.
        if !ids.iter().all(|id| state.marine_life.iter().any(|m| m.id == *id)) {
            return Err(StoreError::ForeignKeyViolation);
        }
        let mut unique = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }
        state.site_marine_life.insert(site_id, unique);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid(rating: i32) -> ValidReview {
        ValidReview {
            rating,
            title: None,
            content: "Clear water and turtles".to_string(),
        }
    }

    #[tokio::test]
    async fn second_review_for_pair_is_a_unique_violation() {
        let repo = InMemoryRepository::new();
        let diver = repo.add_user("Ana", Role::User);
        let site = repo.add_site("Blue Hole", diver.id);

        repo.insert_review(diver.id, site.id, &valid(8)).await.unwrap();
        let second = repo.insert_review(diver.id, site.id, &valid(9)).await;

        assert!(matches!(second, Err(StoreError::UniqueViolation)));
        assert_eq!(repo.review_count(diver.id, site.id), 1);
    }

    #[tokio::test]
    async fn review_for_unknown_site_is_a_foreign_key_violation() {
        let repo = InMemoryRepository::new();
        let diver = repo.add_user("Ana", Role::User);
        let result = repo.insert_review(diver.id, Uuid::new_v4(), &valid(8)).await;
        assert!(matches!(result, Err(StoreError::ForeignKeyViolation)));
    }

    #[tokio::test]
    async fn failed_replace_leaves_associations_untouched() {
        let repo = InMemoryRepository::new();
        let guide = repo.add_user("Guide", Role::Guide);
        let site = repo.add_site("Blue Hole", guide.id);
        let turtle = repo.add_marine_life("Green Turtle", MarineLifeType::Reptile);

        repo.replace_site_marine_life(site.id, &[turtle.id]).await.unwrap();
        let result = repo
            .replace_site_marine_life(site.id, &[Uuid::new_v4()])
            .await;

        assert!(matches!(result, Err(StoreError::ForeignKeyViolation)));
        let taxa = repo.list_site_marine_life(site.id).await.unwrap();
        assert_eq!(taxa, vec![turtle]);
    }

    #[tokio::test]
    async fn oldest_site_wins_a_fallback_tie() {
        let repo = InMemoryRepository::new();
        let guide = repo.add_user("Guide", Role::Guide);
        let older = repo.add_site("Blue Corner", guide.id);
        repo.add_site("Blue Lagoon", guide.id);

        let candidates = SlugCandidates::parse("blue-hole").unwrap();
        let row = repo.find_site_by_slug(&candidates).await.unwrap().unwrap();
        assert_eq!(row.site.id, older.id);
    }
}
