//! Site catalog: search, filter and paginate the active sites, and curate new ones.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{
    auth::AuthUser,
    error::{ApiError, FieldError, StoreError},
    models::{CreateSiteRequest, CreatorSummary, Difficulty, DiveType, ListCounts, SiteListRow},
    repository::Repository,
    visibility::{MemberExtras, MemberSiteView, PublicSiteView, member_view, public_view},
};

pub const DEFAULT_PAGE_SIZE: u32 = 12;
pub const MAX_PAGE_SIZE: u32 = 100;
const MAX_NAME_LEN: usize = 200;

/// SiteFilter
///
/// Raw query parameters of GET /sites. Values are kept as strings so that unknown enum
/// values and non-numeric paging input can be ignored instead of rejected.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct SiteFilter {
    /// Case-insensitive substring matched against name, location and description.
    pub search: Option<String>,
    /// One of BEGINNER, INTERMEDIATE, ADVANCED, TECHNICAL; anything else is ignored.
    pub difficulty: Option<String>,
    /// A dive type tag the site must carry; unknown values are ignored.
    pub dive_type: Option<String>,
    /// 1-indexed page number (default 1).
    pub page: Option<String>,
    /// Page size (default 12, at most 100).
    pub limit: Option<String>,
}

/// SiteQuery
///
/// The normalized form of a `SiteFilter`, handed to the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteQuery {
    pub search: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub dive_type: Option<DiveType>,
    pub page: u32,
    pub limit: u32,
}

impl SiteQuery {
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

impl From<SiteFilter> for SiteQuery {
    fn from(filter: SiteFilter) -> Self {
        let page = filter
            .page
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);
        let limit = filter
            .limit
            .and_then(|l| l.trim().parse::<u32>().ok())
            .filter(|l| *l >= 1)
            .map_or(DEFAULT_PAGE_SIZE, |l| l.min(MAX_PAGE_SIZE));
        SiteQuery {
            search: filter.search.filter(|s| !s.trim().is_empty()),
            difficulty: filter.difficulty.and_then(|d| d.parse().ok()),
            dive_type: filter.dive_type.and_then(|t| t.parse().ok()),
            page,
            limit,
        }
    }
}

/// One page of catalog rows plus the total number of matches.
#[derive(Debug, Clone, Default)]
pub struct SitePage {
    pub rows: Vec<SiteListRow>,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
    pub has_more: bool,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: i64) -> Self {
        let limit_i = i64::from(limit);
        Self {
            page,
            limit,
            total,
            total_pages: (total + limit_i - 1) / limit_i,
            has_more: i64::from(page) * limit_i < total,
        }
    }
}

/// A catalog card: the public tier of a site plus its counters.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct SiteListItem {
    #[serde(flatten)]
    pub site: PublicSiteView,
    pub counts: ListCounts,
}

impl From<SiteListRow> for SiteListItem {
    fn from(row: SiteListRow) -> Self {
        let creator = CreatorSummary {
            id: row.site.created_by_id,
            name: row.creator_name,
            role: row.creator_role,
        };
        SiteListItem {
            site: public_view(&row.site, creator),
            counts: ListCounts {
                reviews: row.review_count,
                favorites: row.favorite_count,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct SiteListResponse {
    pub sites: Vec<SiteListItem>,
    pub pagination: Pagination,
}

/// list_sites
///
/// Runs a normalized catalog query; only active sites are ever listed.
pub async fn list_sites(repo: &dyn Repository, query: SiteQuery) -> Result<SiteListResponse, ApiError> {
    let page = repo.list_sites(&query).await?;
    tracing::debug!(
        total = page.total,
        page = query.page,
        limit = query.limit,
        "catalog query served"
    );
    Ok(SiteListResponse {
        sites: page.rows.into_iter().map(SiteListItem::from).collect(),
        pagination: Pagination::new(query.page, query.limit, page.total),
    })
}

/// Checks a new site body, collecting every failing field.
pub fn validate_site(req: &CreateSiteRequest) -> Result<(), ApiError> {
    let mut details = Vec::new();
    let name_len = req.name.trim().chars().count();
    if name_len == 0 || name_len > MAX_NAME_LEN {
        details.push(FieldError::new("name", "must be between 1 and 200 characters"));
    }
    if req.description.trim().is_empty() {
        details.push(FieldError::new("description", "must not be empty"));
    }
    if req.location.trim().is_empty() {
        details.push(FieldError::new("location", "must not be empty"));
    }
    if !(-90.0..=90.0).contains(&req.latitude) {
        details.push(FieldError::new("latitude", "must be between -90 and 90"));
    }
    if !(-180.0..=180.0).contains(&req.longitude) {
        details.push(FieldError::new("longitude", "must be between -180 and 180"));
    }
    if req.depth_min < 0 || req.depth_max < 0 {
        details.push(FieldError::new("depthMin", "depths must not be negative"));
    } else if req.depth_min > req.depth_max {
        details.push(FieldError::new("depthMax", "must not be less than depthMin"));
    }
    if details.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation("Invalid dive site data", details))
    }
}

/// create_site
///
/// Guides and admins add sites. Names must be unique so exact slug matches stay
/// unambiguous; the store's unique index settles concurrent creates.
pub async fn create_site(
    repo: &dyn Repository,
    caller: &AuthUser,
    mut req: CreateSiteRequest,
) -> Result<MemberSiteView, ApiError> {
    if !caller.role.can_curate() {
        tracing::warn!(user_id = %caller.id, role = %caller.role, "site creation refused");
        return Err(ApiError::Forbidden);
    }
    validate_site(&req)?;
    req.name = req.name.trim().to_string();

    if repo.site_name_exists(&req.name).await? {
        return Err(duplicate_name(&req.name));
    }

    let row = match repo.create_site(&req, caller.id).await {
        Ok(row) => row,
        Err(StoreError::UniqueViolation) => return Err(duplicate_name(&req.name)),
        Err(err) => return Err(err.into()),
    };
    tracing::info!(site_id = %row.site.id, name = %row.site.name, created_by = %caller.id, "dive site created");

    let creator = row.creator();
    Ok(member_view(row.site, creator, MemberExtras::default()))
}

fn duplicate_name(name: &str) -> ApiError {
    tracing::warn!(name, "duplicate site name rejected");
    ApiError::conflict("A dive site with this name already exists")
}
