use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Enumerations (Mapped to Postgres enum types) ---

/// Role
///
/// The RBAC field carried by every account. Guests are represented by the absence
/// of a session rather than by a variant here.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Guide,
    #[default]
    User,
}

impl Role {
    /// Guides and admins curate site records and their marine-life associations.
    pub fn can_curate(self) -> bool {
        matches!(self, Role::Admin | Role::Guide)
    }
}

/// Difficulty
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "difficulty_level", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    Technical,
}

/// DiveType
///
/// Tags describing how a site is dived. A site carries a set of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "dive_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiveType {
    Shore,
    Boat,
    Wreck,
    Cave,
    Drift,
    Wall,
    Reef,
    Night,
    Technical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "certification_level", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Certification {
    OpenWater,
    Advanced,
    Rescue,
    Divemaster,
    Nitrox,
    Wreck,
    Cave,
    Technical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "current_condition", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CurrentCondition {
    Mild,
    Moderate,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "marine_life_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarineLifeType {
    Fish,
    Plant,
    Coral,
    Invertebrate,
    Mammal,
    Reptile,
}

/// Raised when a query-string value does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown variant `{0}`")]
pub struct UnknownVariant(pub String);

impl FromStr for Difficulty {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BEGINNER" => Ok(Difficulty::Beginner),
            "INTERMEDIATE" => Ok(Difficulty::Intermediate),
            "ADVANCED" => Ok(Difficulty::Advanced),
            "TECHNICAL" => Ok(Difficulty::Technical),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl FromStr for DiveType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SHORE" => Ok(DiveType::Shore),
            "BOAT" => Ok(DiveType::Boat),
            "WRECK" => Ok(DiveType::Wreck),
            "CAVE" => Ok(DiveType::Cave),
            "DRIFT" => Ok(DiveType::Drift),
            "WALL" => Ok(DiveType::Wall),
            "REEF" => Ok(DiveType::Reef),
            "NIGHT" => Ok(DiveType::Night),
            "TECHNICAL" => Ok(DiveType::Technical),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Admin => "ADMIN",
            Role::Guide => "GUIDE",
            Role::User => "USER",
        };
        f.write_str(label)
    }
}

// --- Core Records (Mapped to Database) ---

/// User
///
/// Account row from the `users` table. Never serialized directly: the password hash
/// stays server-side and clients receive a `UserProfile` instead.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// NewUser
///
/// Insert payload for a registration that already passed validation and hashing.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
}

/// DiveSite
///
/// Full row from the `dive_sites` table. Handlers never return this as-is; the
/// visibility gate decides which subset of it reaches the caller.
#[derive(Debug, Clone, FromRow)]
pub struct DiveSite {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_min: i32,
    pub depth_max: i32,
    pub dive_type: Vec<DiveType>,
    pub difficulty: Difficulty,
    pub required_certification: Vec<Certification>,
    pub current_conditions: Option<CurrentCondition>,
    pub drift_potential: Option<String>,
    pub entry_point: Option<String>,
    pub visibility_min: Option<i32>,
    pub visibility_max: Option<i32>,
    pub temperature_min: Option<i32>,
    pub temperature_max: Option<i32>,
    pub marine_life: Option<String>,
    pub emergency_info: Option<String>,
    pub average_dive_duration: Option<i32>,
    pub hazards: Option<String>,
    pub permits_fees: Option<String>,
    pub eco_data: Option<serde_json::Value>,
    pub is_active: bool,
    pub created_by_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// SiteRow
///
/// A site joined with the public fields of its creator.
#[derive(Debug, Clone, FromRow)]
pub struct SiteRow {
    #[sqlx(flatten)]
    pub site: DiveSite,
    pub creator_name: String,
    pub creator_role: Role,
}

impl SiteRow {
    pub fn creator(&self) -> CreatorSummary {
        CreatorSummary {
            id: self.site.created_by_id,
            name: self.creator_name.clone(),
            role: self.creator_role,
        }
    }
}

/// SiteListRow
///
/// Catalog listing row: the site, its creator and the two counters shown on cards.
#[derive(Debug, Clone, FromRow)]
pub struct SiteListRow {
    #[sqlx(flatten)]
    pub site: DiveSite,
    pub creator_name: String,
    pub creator_role: Role,
    pub review_count: i64,
    pub favorite_count: i64,
}

/// Review
///
/// A row from the `reviews` table. The (user_id, dive_site_id) pair is unique.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub rating: i32,
    pub title: Option<String>,
    pub content: String,
    pub user_id: Uuid,
    pub dive_site_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Public fields of a review author.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub name: String,
    pub avatar: Option<String>,
}

/// ReviewWithAuthor
///
/// The review payload returned by the API: the row plus its author under `user`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct ReviewWithAuthor {
    #[serde(flatten)]
    pub review: Review,
    pub user: AuthorSummary,
}

/// Review joined with `users` (loaded via a JOIN in the repository query).
#[derive(Debug, Clone, FromRow)]
pub struct ReviewRow {
    #[sqlx(flatten)]
    pub review: Review,
    pub author_name: String,
    pub author_avatar: Option<String>,
}

impl From<ReviewRow> for ReviewWithAuthor {
    fn from(row: ReviewRow) -> Self {
        let user = AuthorSummary {
            id: row.review.user_id,
            name: row.author_name,
            avatar: row.author_avatar,
        };
        ReviewWithAuthor {
            review: row.review,
            user,
        }
    }
}

/// Photo
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: Uuid,
    pub url: String,
    pub caption: Option<String>,
    pub user_id: Uuid,
    pub dive_site_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct PhotoAuthor {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct PhotoWithAuthor {
    #[serde(flatten)]
    pub photo: Photo,
    pub user: PhotoAuthor,
}

#[derive(Debug, Clone, FromRow)]
pub struct PhotoRow {
    #[sqlx(flatten)]
    pub photo: Photo,
    pub author_name: String,
}

impl From<PhotoRow> for PhotoWithAuthor {
    fn from(row: PhotoRow) -> Self {
        let user = PhotoAuthor {
            id: row.photo.user_id,
            name: row.author_name,
        };
        PhotoWithAuthor {
            photo: row.photo,
            user,
        }
    }
}

/// MarineLife
///
/// A taxon from the centrally curated `marine_life` reference table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MarineLife {
    pub id: Uuid,
    pub name: String,
    pub latin_name: Option<String>,
    // 'type' is a reserved keyword in Rust.
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: MarineLifeType,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

// --- Derived / Summary Schemas (Output) ---

/// Public identity of a site's creator.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct CreatorSummary {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

/// Aggregate counters attached to the authenticated detail view.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq)]
#[ts(export)]
pub struct SiteCounts {
    pub reviews: i64,
    pub favorites: i64,
    pub photos: i64,
}

/// Counters shown on catalog cards.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct ListCounts {
    pub reviews: i64,
    pub favorites: i64,
}

/// UserProfile
///
/// Output schema for an account (GET /me, login and registration responses).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub avatar: Option<String>,
    pub bio: Option<String>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        UserProfile {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            avatar: user.avatar,
            bio: user.bio,
        }
    }
}

// --- Request Payloads (Input Schemas) ---

/// ReviewRequest
///
/// Body of POST and PUT /sites/{slug}/reviews. Range and length rules are applied by
/// the review manager, not by deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ReviewRequest {
    #[schema(example = 8)]
    pub rating: i64,
    pub title: Option<String>,
    pub content: String,
}

/// ReplaceMarineLifeRequest
///
/// Body of POST /sites/{slug}/marine-life. The listed taxa become the site's full set.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceMarineLifeRequest {
    pub marine_life_ids: Vec<Uuid>,
}

/// CreateSiteRequest
///
/// Body of POST /sites. Only the descriptive core is mandatory; operational details
/// may be filled in later by the curator.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreateSiteRequest {
    #[schema(example = "Blue Hole")]
    pub name: String,
    pub description: String,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_min: i32,
    pub depth_max: i32,
    #[serde(default)]
    pub dive_type: Vec<DiveType>,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub required_certification: Vec<Certification>,
    pub current_conditions: Option<CurrentCondition>,
    pub drift_potential: Option<String>,
    pub entry_point: Option<String>,
    pub visibility_min: Option<i32>,
    pub visibility_max: Option<i32>,
    pub temperature_min: Option<i32>,
    pub temperature_max: Option<i32>,
    pub marine_life: Option<String>,
    pub emergency_info: Option<String>,
    pub average_dive_duration: Option<i32>,
    pub hazards: Option<String>,
    pub permits_fees: Option<String>,
    #[schema(value_type = Option<Object>)]
    #[ts(type = "unknown")]
    pub eco_data: Option<serde_json::Value>,
}

/// RegisterRequest
///
/// Input payload for POST /auth/register. New accounts always receive the USER role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// AuthResponse
///
/// A freshly issued bearer token and the profile it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

/// Confirmation body for operations that return no entity.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SuccessResponse {
    pub success: bool,
}
