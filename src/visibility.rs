//! Visibility gate for site payloads.
//!
//! Guests see the descriptive tier of a site. Any signed-in caller, regardless of role,
//! additionally sees the operational tier (conditions, hazards, emergency info), the
//! reviews and photos, and the computed aggregates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{
        Certification, CreatorSummary, CurrentCondition, Difficulty, DiveSite, DiveType,
        PhotoWithAuthor, ReviewWithAuthor, SiteCounts, SiteRow,
    },
    repository::Repository,
    slug::slugify,
};

/// PublicSiteView
///
/// Fields every caller may see.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PublicSiteView {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_min: i32,
    pub depth_max: i32,
    pub dive_type: Vec<DiveType>,
    pub difficulty: Difficulty,
    pub created_by: CreatorSummary,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// MemberSiteView
///
/// The public fields plus the tier reserved for signed-in callers. Optional fields are
/// serialized as `null` rather than omitted so clients can rely on the keys existing.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MemberSiteView {
    #[serde(flatten)]
    pub public: PublicSiteView,
    pub current_conditions: Option<CurrentCondition>,
    pub drift_potential: Option<String>,
    pub entry_point: Option<String>,
    pub visibility_min: Option<i32>,
    pub visibility_max: Option<i32>,
    pub temperature_min: Option<i32>,
    pub temperature_max: Option<i32>,
    pub emergency_info: Option<String>,
    pub required_certification: Vec<Certification>,
    pub marine_life: Option<String>,
    pub average_dive_duration: Option<i32>,
    pub hazards: Option<String>,
    pub permits_fees: Option<String>,
    #[schema(value_type = Option<Object>)]
    #[ts(type = "unknown")]
    pub eco_data: Option<serde_json::Value>,
    pub reviews: Vec<ReviewWithAuthor>,
    pub photos: Vec<PhotoWithAuthor>,
    pub average_rating: Option<f64>,
    pub counts: SiteCounts,
}

/// SiteDetail
///
/// Exactly one tier is active per response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
#[serde(untagged)]
pub enum SiteDetail {
    Member(Box<MemberSiteView>),
    Public(PublicSiteView),
}

/// MemberExtras
///
/// Relations loaded only when the caller holds a session.
#[derive(Debug, Clone, Default)]
pub struct MemberExtras {
    pub reviews: Vec<ReviewWithAuthor>,
    pub photos: Vec<PhotoWithAuthor>,
    pub counts: SiteCounts,
}

/// Arithmetic mean of the ratings; `None` when there are none.
pub fn average_rating(ratings: impl IntoIterator<Item = i32>) -> Option<f64> {
    let (sum, count) = ratings
        .into_iter()
        .fold((0i64, 0u32), |(sum, count), r| (sum + i64::from(r), count + 1));
    (count > 0).then(|| sum as f64 / f64::from(count))
}

pub fn public_view(site: &DiveSite, creator: CreatorSummary) -> PublicSiteView {
    PublicSiteView {
        id: site.id,
        slug: slugify(&site.name),
        name: site.name.clone(),
        description: site.description.clone(),
        location: site.location.clone(),
        latitude: site.latitude,
        longitude: site.longitude,
        depth_min: site.depth_min,
        depth_max: site.depth_max,
        dive_type: site.dive_type.clone(),
        difficulty: site.difficulty,
        created_by: creator,
        created_at: site.created_at,
    }
}

pub fn member_view(site: DiveSite, creator: CreatorSummary, extras: MemberExtras) -> MemberSiteView {
    let public = public_view(&site, creator);
    let average_rating = average_rating(extras.reviews.iter().map(|r| r.review.rating));
    MemberSiteView {
        public,
        current_conditions: site.current_conditions,
        drift_potential: site.drift_potential,
        entry_point: site.entry_point,
        visibility_min: site.visibility_min,
        visibility_max: site.visibility_max,
        temperature_min: site.temperature_min,
        temperature_max: site.temperature_max,
        emergency_info: site.emergency_info,
        required_certification: site.required_certification,
        marine_life: site.marine_life,
        average_dive_duration: site.average_dive_duration,
        hazards: site.hazards,
        permits_fees: site.permits_fees,
        eco_data: site.eco_data,
        reviews: extras.reviews,
        photos: extras.photos,
        average_rating,
        counts: extras.counts,
    }
}

/// gate
///
/// Picks the tier for a resolved site. Member relations are only fetched when the
/// caller is authenticated, and the average is recomputed from them on every call.
pub async fn gate(
    repo: &dyn Repository,
    row: SiteRow,
    authenticated: bool,
) -> Result<SiteDetail, ApiError> {
    let creator = row.creator();
    if !authenticated {
        tracing::debug!(site_id = %row.site.id, "serving public tier");
        return Ok(SiteDetail::Public(public_view(&row.site, creator)));
    }

    let site_id = row.site.id;
    let reviews = repo.list_site_reviews(site_id).await?;
    let photos = repo.list_site_photos(site_id).await?;
    // Review and photo counts follow the lists in this response, not a separate read.
    let counts = SiteCounts {
        reviews: reviews.len() as i64,
        photos: photos.len() as i64,
        ..repo.site_counts(site_id).await?
    };
    let extras = MemberExtras {
        reviews,
        photos,
        counts,
    };
    tracing::debug!(%site_id, reviews = extras.reviews.len(), "serving member tier");
    Ok(SiteDetail::Member(Box::new(member_view(row.site, creator, extras))))
}
