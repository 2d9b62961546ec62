use crate::{
    catalog::{SitePage, SiteQuery},
    error::StoreError,
    models::{
        CreateSiteRequest, MarineLife, NewUser, PhotoRow, PhotoWithAuthor, Review, ReviewRow,
        ReviewWithAuthor, SiteCounts, SiteListRow, SiteRow, User,
    },
    reviews::ValidReview,
    slug::SlugCandidates,
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// The persistence contract used by every service. Handlers and services only see
/// `Arc<dyn Repository>`, so the Postgres store and the in-memory store are
/// interchangeable.
///
/// Implementations must enforce the same structural rules as the schema: one review
/// per (user, site) pair reported as `StoreError::UniqueViolation`, and references to
/// unknown rows reported as `StoreError::ForeignKeyViolation`.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    // Unique on email.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    // --- Catalog ---
    // Active sites only, newest first.
    async fn list_sites(&self, query: &SiteQuery) -> Result<SitePage, StoreError>;
    // Exact spaced match, then exact dashed match, then first-word containment;
    // oldest site wins within a rank.
    async fn find_site_by_slug(&self, candidates: &SlugCandidates) -> Result<Option<SiteRow>, StoreError>;
    async fn site_name_exists(&self, name: &str) -> Result<bool, StoreError>;
    async fn create_site(&self, req: &CreateSiteRequest, created_by: Uuid) -> Result<SiteRow, StoreError>;

    // --- Member tier relations ---
    async fn list_site_reviews(&self, site_id: Uuid) -> Result<Vec<ReviewWithAuthor>, StoreError>;
    async fn list_site_photos(&self, site_id: Uuid) -> Result<Vec<PhotoWithAuthor>, StoreError>;
    async fn site_counts(&self, site_id: Uuid) -> Result<SiteCounts, StoreError>;

    // --- Reviews (keyed by the (user, site) pair) ---
    async fn find_review(&self, user_id: Uuid, site_id: Uuid) -> Result<Option<Review>, StoreError>;
    async fn insert_review(
        &self,
        user_id: Uuid,
        site_id: Uuid,
        review: &ValidReview,
    ) -> Result<ReviewWithAuthor, StoreError>;
    // Returns None when the pair has no review.
    async fn update_review(
        &self,
        user_id: Uuid,
        site_id: Uuid,
        review: &ValidReview,
    ) -> Result<Option<ReviewWithAuthor>, StoreError>;
    // Returns true if a row was removed.
    async fn delete_review(&self, user_id: Uuid, site_id: Uuid) -> Result<bool, StoreError>;

    // --- Marine life ---
    async fn list_marine_life(&self) -> Result<Vec<MarineLife>, StoreError>;
    async fn list_site_marine_life(&self, site_id: Uuid) -> Result<Vec<MarineLife>, StoreError>;
    // Delete-all then insert-all, atomically.
    async fn replace_site_marine_life(&self, site_id: Uuid, ids: &[Uuid]) -> Result<(), StoreError>;
}

/// RepositoryState
///
/// The shared handle to the persistence layer stored in the application state.
pub type RepositoryState = Arc<dyn Repository>;

const SITE_COLUMNS: &str = r#"
    s.id, s.name, s.description, s.location, s.latitude, s.longitude,
    s.depth_min, s.depth_max, s.dive_type, s.difficulty, s.required_certification,
    s.current_conditions, s.drift_potential, s.entry_point,
    s.visibility_min, s.visibility_max, s.temperature_min, s.temperature_max,
    s.marine_life, s.emergency_info, s.average_dive_duration, s.hazards,
    s.permits_fees, s.eco_data, s.is_active, s.created_by_id, s.created_at, s.updated_at
"#;

const REVIEW_COLUMNS: &str = r#"
    r.id, r.rating, r.title, r.content, r.user_id, r.dive_site_id, r.created_at, r.updated_at,
    u.name AS author_name, u.avatar AS author_avatar
"#;

const USER_COLUMNS: &str = "id, email, password_hash, name, role, avatar, bio, created_at";

/// PostgresRepository
///
/// `Repository` backed by the shared `PgPool`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn get_site_row(&self, id: Uuid) -> Result<Option<SiteRow>, StoreError> {
        let sql = format!(
            r#"SELECT {SITE_COLUMNS}, u.name AS creator_name, u.role AS creator_role
               FROM dive_sites s JOIN users u ON u.id = s.created_by_id
               WHERE s.id = $1"#
        );
        Ok(sqlx::query_as::<_, SiteRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }
}

/// Escapes LIKE metacharacters so user input is matched literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// push_site_filters
///
/// Appends the catalog WHERE clause shared by the count and the page query.
/// `is_active = true` is always applied.
fn push_site_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &SiteQuery) {
    builder.push(" WHERE s.is_active = true");

    if let Some(search) = &query.search {
        let pattern = format!("%{}%", escape_like(search));
        builder.push(" AND (s.name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR s.location ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR s.description ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }

    if let Some(difficulty) = query.difficulty {
        builder.push(" AND s.difficulty = ");
        builder.push_bind(difficulty);
    }

    if let Some(dive_type) = query.dive_type {
        builder.push(" AND ");
        builder.push_bind(dive_type);
        builder.push(" = ANY(s.dive_type)");
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            r#"INSERT INTO users (id, email, password_hash, name, role, created_at)
               VALUES ($1, $2, $3, $4, 'USER', NOW())
               RETURNING {USER_COLUMNS}"#
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(user.email)
            .bind(user.password_hash)
            .bind(user.name)
            .fetch_one(&self.pool)
            .await?)
    }

    /// list_sites
    ///
    /// Builds the filter with QueryBuilder so every user-supplied value is bound, never
    /// interpolated. The count and the page use the same WHERE clause.
    async fn list_sites(&self, query: &SiteQuery) -> Result<SitePage, StoreError> {
        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM dive_sites s");
        push_site_filters(&mut count, query);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            r#"SELECT {SITE_COLUMNS},
                   u.name AS creator_name, u.role AS creator_role,
                   (SELECT COUNT(*) FROM reviews r WHERE r.dive_site_id = s.id) AS review_count,
                   (SELECT COUNT(*) FROM favorites f WHERE f.dive_site_id = s.id) AS favorite_count
               FROM dive_sites s JOIN users u ON u.id = s.created_by_id"#
        ));
        push_site_filters(&mut builder, query);
        builder.push(" ORDER BY s.created_at DESC, s.id LIMIT ");
        builder.push_bind(i64::from(query.limit));
        builder.push(" OFFSET ");
        builder.push_bind(query.offset());

        let rows = builder
            .build_query_as::<SiteListRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(SitePage { rows, total })
    }

    /// find_site_by_slug
    ///
    /// `strpos` keeps the first-word fallback a plain case-sensitive substring test,
    /// with no LIKE metacharacters to escape.
    async fn find_site_by_slug(&self, candidates: &SlugCandidates) -> Result<Option<SiteRow>, StoreError> {
        let sql = format!(
            r#"SELECT {SITE_COLUMNS}, u.name AS creator_name, u.role AS creator_role
               FROM dive_sites s JOIN users u ON u.id = s.created_by_id
               WHERE s.name = $1 OR s.name = $2 OR strpos(s.name, $3) > 0
               ORDER BY CASE WHEN s.name = $1 THEN 0 WHEN s.name = $2 THEN 1 ELSE 2 END,
                        s.created_at ASC, s.id ASC
               LIMIT 1"#
        );
        Ok(sqlx::query_as::<_, SiteRow>(&sql)
            .bind(&candidates.spaced)
            .bind(&candidates.dashed)
            .bind(&candidates.first_word)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn site_name_exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM dive_sites WHERE name = $1)")
                .bind(name)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn create_site(&self, req: &CreateSiteRequest, created_by: Uuid) -> Result<SiteRow, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"INSERT INTO dive_sites (
                   id, name, description, location, latitude, longitude, depth_min, depth_max,
                   dive_type, difficulty, required_certification, current_conditions,
                   drift_potential, entry_point, visibility_min, visibility_max,
                   temperature_min, temperature_max, marine_life, emergency_info,
                   average_dive_duration, hazards, permits_fees, eco_data,
                   is_active, created_by_id, created_at, updated_at
               ) VALUES (
                   $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                   $17, $18, $19, $20, $21, $22, $23, $24, true, $25, NOW(), NOW()
               )"#,
        )
        .bind(id)
        .bind(&req.name)
        .bind(&req.description)
        .bind(&req.location)
        .bind(req.latitude)
        .bind(req.longitude)
        .bind(req.depth_min)
        .bind(req.depth_max)
        .bind(req.dive_type.clone())
        .bind(req.difficulty)
        .bind(req.required_certification.clone())
        .bind(req.current_conditions)
        .bind(&req.drift_potential)
        .bind(&req.entry_point)
        .bind(req.visibility_min)
        .bind(req.visibility_max)
        .bind(req.temperature_min)
        .bind(req.temperature_max)
        .bind(&req.marine_life)
        .bind(&req.emergency_info)
        .bind(req.average_dive_duration)
        .bind(&req.hazards)
        .bind(&req.permits_fees)
        .bind(&req.eco_data)
        .bind(created_by)
        .execute(&self.pool)
        .await?;

        // The row was just inserted; a miss here means the store lost it.
        self.get_site_row(id)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn list_site_reviews(&self, site_id: Uuid) -> Result<Vec<ReviewWithAuthor>, StoreError> {
        let sql = format!(
            r#"SELECT {REVIEW_COLUMNS}
               FROM reviews r JOIN users u ON u.id = r.user_id
               WHERE r.dive_site_id = $1
               ORDER BY r.created_at DESC, r.id"#
        );
        let rows = sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(site_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ReviewWithAuthor::from).collect())
    }

    async fn list_site_photos(&self, site_id: Uuid) -> Result<Vec<PhotoWithAuthor>, StoreError> {
        let rows = sqlx::query_as::<_, PhotoRow>(
            r#"SELECT p.id, p.url, p.caption, p.user_id, p.dive_site_id, p.created_at,
                      u.name AS author_name
               FROM photos p JOIN users u ON u.id = p.user_id
               WHERE p.dive_site_id = $1
               ORDER BY p.created_at DESC, p.id"#,
        )
        .bind(site_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PhotoWithAuthor::from).collect())
    }

    async fn site_counts(&self, site_id: Uuid) -> Result<SiteCounts, StoreError> {
        Ok(sqlx::query_as::<_, SiteCounts>(
            r#"SELECT
                   (SELECT COUNT(*) FROM reviews WHERE dive_site_id = $1) AS reviews,
                   (SELECT COUNT(*) FROM favorites WHERE dive_site_id = $1) AS favorites,
                   (SELECT COUNT(*) FROM photos WHERE dive_site_id = $1) AS photos"#,
        )
        .bind(site_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_review(&self, user_id: Uuid, site_id: Uuid) -> Result<Option<Review>, StoreError> {
        Ok(sqlx::query_as::<_, Review>(
            r#"SELECT id, rating, title, content, user_id, dive_site_id, created_at, updated_at
               FROM reviews WHERE user_id = $1 AND dive_site_id = $2"#,
        )
        .bind(user_id)
        .bind(site_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// insert_review
    ///
    /// Insert and author join in one statement (CTE). A second review for the same pair
    /// trips `reviews_user_site_key` and surfaces as `UniqueViolation`.
    async fn insert_review(
        &self,
        user_id: Uuid,
        site_id: Uuid,
        review: &ValidReview,
    ) -> Result<ReviewWithAuthor, StoreError> {
        let sql = format!(
            r#"WITH r AS (
                   INSERT INTO reviews (id, rating, title, content, user_id, dive_site_id, created_at, updated_at)
                   VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
                   RETURNING *
               )
               SELECT {REVIEW_COLUMNS} FROM r JOIN users u ON u.id = r.user_id"#
        );
        let row = sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(review.rating)
            .bind(&review.title)
            .bind(&review.content)
            .bind(user_id)
            .bind(site_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn update_review(
        &self,
        user_id: Uuid,
        site_id: Uuid,
        review: &ValidReview,
    ) -> Result<Option<ReviewWithAuthor>, StoreError> {
        let sql = format!(
            r#"WITH r AS (
                   UPDATE reviews
                   SET rating = $3, title = $4, content = $5, updated_at = NOW()
                   WHERE user_id = $1 AND dive_site_id = $2
                   RETURNING *
               )
               SELECT {REVIEW_COLUMNS} FROM r JOIN users u ON u.id = r.user_id"#
        );
        let row = sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(user_id)
            .bind(site_id)
            .bind(review.rating)
            .bind(&review.title)
            .bind(&review.content)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ReviewWithAuthor::from))
    }

    async fn delete_review(&self, user_id: Uuid, site_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM reviews WHERE user_id = $1 AND dive_site_id = $2")
            .bind(user_id)
            .bind(site_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_marine_life(&self) -> Result<Vec<MarineLife>, StoreError> {
        Ok(sqlx::query_as::<_, MarineLife>(
            "SELECT id, name, latin_name, type, description, image_url FROM marine_life ORDER BY name ASC, id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_site_marine_life(&self, site_id: Uuid) -> Result<Vec<MarineLife>, StoreError> {
        Ok(sqlx::query_as::<_, MarineLife>(
            r#"SELECT m.id, m.name, m.latin_name, m.type, m.description, m.image_url
               FROM dive_site_marine_life dm JOIN marine_life m ON m.id = dm.marine_life_id
               WHERE dm.dive_site_id = $1
               ORDER BY m.name ASC, m.id"#,
        )
        .bind(site_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// replace_site_marine_life
    ///
    /// Runs inside one transaction so readers never observe the emptied set. An unknown
    /// taxon id aborts the whole replace with `ForeignKeyViolation`.
    async fn replace_site_marine_life(&self, site_id: Uuid, ids: &[Uuid]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM dive_site_marine_life WHERE dive_site_id = $1")
            .bind(site_id)
            .execute(&mut *tx)
            .await?;

        if !ids.is_empty() {
            sqlx::query(
                r#"INSERT INTO dive_site_marine_life (dive_site_id, marine_life_id)
                   SELECT $1, UNNEST($2::uuid[])
                   ON CONFLICT DO NOTHING"#,
            )
            .bind(site_id)
            .bind(ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
