use crate::{
    AppState,
    auth::{self, AuthUser, MaybeAuthUser},
    catalog::{self, SiteFilter, SiteListResponse, SiteQuery},
    error::{ApiError, ErrorBody},
    marine_life,
    models::{
        AuthResponse, CreateSiteRequest, LoginRequest, MarineLife, MessageResponse,
        RegisterRequest, ReplaceMarineLifeRequest, ReviewRequest, ReviewWithAuthor,
        SuccessResponse, UserProfile,
    },
    reviews,
    slug::resolve_site,
    visibility::{self, MemberSiteView, SiteDetail},
};
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};

// --- Catalog ---

/// get_sites
///
/// [Public Route] Lists active dive sites, newest first, with search, filters and
/// pagination. Malformed paging input falls back to the defaults instead of failing.
#[utoipa::path(
    get,
    path = "/sites",
    params(SiteFilter),
    responses(
        (status = 200, description = "Catalog page", body = SiteListResponse),
        (status = 500, description = "Store failure", body = ErrorBody)
    )
)]
pub async fn get_sites(
    State(state): State<AppState>,
    Query(filter): Query<SiteFilter>,
) -> Result<Json<SiteListResponse>, ApiError> {
    let response = catalog::list_sites(&*state.repo, SiteQuery::from(filter)).await?;
    Ok(Json(response))
}

/// get_site_detail
///
/// [Public Route, session-aware] Resolves a slug and returns the tier the caller is
/// entitled to: guests get the public view, any signed-in user the member view.
#[utoipa::path(
    get,
    path = "/sites/{slug}",
    params(("slug" = String, Path, description = "Hyphenated lowercase site name")),
    responses(
        (status = 200, description = "Site detail (public or member tier)", body = SiteDetail),
        (status = 404, description = "Dive site not found", body = ErrorBody)
    )
)]
pub async fn get_site_detail(
    MaybeAuthUser(caller): MaybeAuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<SiteDetail>, ApiError> {
    let row = resolve_site(&*state.repo, &slug).await?;
    let detail = visibility::gate(&*state.repo, row, caller.is_some()).await?;
    Ok(Json(detail))
}

/// create_site
///
/// [Curator Route] Adds a dive site. Guides and admins only.
#[utoipa::path(
    post,
    path = "/sites",
    request_body = CreateSiteRequest,
    responses(
        (status = 201, description = "Site created", body = MemberSiteView),
        (status = 400, description = "Invalid site data", body = ErrorBody),
        (status = 401, description = "No session", body = ErrorBody),
        (status = 403, description = "Not a guide or admin", body = ErrorBody),
        (status = 409, description = "Name already taken", body = ErrorBody)
    )
)]
pub async fn create_site(
    caller: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateSiteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MemberSiteView>), ApiError> {
    let Json(req) = payload?;
    let site = catalog::create_site(&*state.repo, &caller, req).await?;
    Ok((StatusCode::CREATED, Json(site)))
}

// --- Reviews ---

/// create_review
///
/// [Authenticated Route] Posts the caller's review of a site. One review per user and
/// site: a second attempt is answered with 409.
#[utoipa::path(
    post,
    path = "/sites/{slug}/reviews",
    params(("slug" = String, Path, description = "Hyphenated lowercase site name")),
    request_body = ReviewRequest,
    responses(
        (status = 201, description = "Review created", body = ReviewWithAuthor),
        (status = 400, description = "Invalid review data", body = ErrorBody),
        (status = 401, description = "No session", body = ErrorBody),
        (status = 404, description = "Dive site not found", body = ErrorBody),
        (status = 409, description = "Already reviewed", body = ErrorBody)
    )
)]
pub async fn create_review(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    payload: Result<Json<ReviewRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ReviewWithAuthor>), ApiError> {
    let Json(req) = payload?;
    let review = reviews::create_review(&*state.repo, &caller, &slug, req).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// update_review
///
/// [Authenticated Route] Overwrites the caller's existing review of a site.
#[utoipa::path(
    put,
    path = "/sites/{slug}/reviews",
    params(("slug" = String, Path, description = "Hyphenated lowercase site name")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Review updated", body = ReviewWithAuthor),
        (status = 400, description = "Invalid review data", body = ErrorBody),
        (status = 401, description = "No session", body = ErrorBody),
        (status = 404, description = "Site or review not found", body = ErrorBody)
    )
)]
pub async fn update_review(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    payload: Result<Json<ReviewRequest>, JsonRejection>,
) -> Result<Json<ReviewWithAuthor>, ApiError> {
    let Json(req) = payload?;
    let review = reviews::update_review(&*state.repo, &caller, &slug, req).await?;
    Ok(Json(review))
}

/// delete_review
///
/// [Authenticated Route] Removes the caller's review of a site.
#[utoipa::path(
    delete,
    path = "/sites/{slug}/reviews",
    params(("slug" = String, Path, description = "Hyphenated lowercase site name")),
    responses(
        (status = 200, description = "Review deleted", body = MessageResponse),
        (status = 401, description = "No session", body = ErrorBody),
        (status = 404, description = "Site or review not found", body = ErrorBody)
    )
)]
pub async fn delete_review(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    reviews::delete_review(&*state.repo, &caller, &slug).await?;
    Ok(Json(MessageResponse {
        message: "Review deleted successfully".to_string(),
    }))
}

// --- Marine life ---

/// get_site_marine_life
///
/// [Public Route] Taxa recorded at a site, alphabetical.
#[utoipa::path(
    get,
    path = "/sites/{slug}/marine-life",
    params(("slug" = String, Path, description = "Hyphenated lowercase site name")),
    responses(
        (status = 200, description = "Taxa at the site", body = [MarineLife]),
        (status = 404, description = "Dive site not found", body = ErrorBody)
    )
)]
pub async fn get_site_marine_life(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<MarineLife>>, ApiError> {
    Ok(Json(marine_life::site_marine_life(&*state.repo, &slug).await?))
}

/// replace_site_marine_life
///
/// [Curator Route] Replaces the full set of taxa recorded at a site.
#[utoipa::path(
    post,
    path = "/sites/{slug}/marine-life",
    params(("slug" = String, Path, description = "Hyphenated lowercase site name")),
    request_body = ReplaceMarineLifeRequest,
    responses(
        (status = 200, description = "Associations replaced", body = SuccessResponse),
        (status = 400, description = "Malformed body or unknown taxon", body = ErrorBody),
        (status = 401, description = "No session", body = ErrorBody),
        (status = 403, description = "Not a guide or admin", body = ErrorBody),
        (status = 404, description = "Dive site not found", body = ErrorBody)
    )
)]
pub async fn replace_site_marine_life(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    payload: Result<Json<ReplaceMarineLifeRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Json(req) = payload?;
    marine_life::replace_site_marine_life(&*state.repo, &caller, &slug, req).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// list_marine_life
///
/// [Public Route] The full taxa reference table, alphabetical.
#[utoipa::path(
    get,
    path = "/marine-life",
    responses((status = 200, description = "All taxa", body = [MarineLife]))
)]
pub async fn list_marine_life(State(state): State<AppState>) -> Result<Json<Vec<MarineLife>>, ApiError> {
    Ok(Json(state.repo.list_marine_life().await?))
}

// --- Identity ---

/// register
///
/// [Public Route] Creates a USER account and returns a session token for it.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = AuthResponse),
        (status = 400, description = "Invalid registration data", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let Json(req) = payload?;
    let response = auth::register(&*state.repo, &state.config, req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// login
///
/// [Public Route] Exchanges email and password for a session token.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid email or password", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(req) = payload?;
    Ok(Json(auth::login(&*state.repo, &state.config, req).await?))
}

/// get_me
///
/// [Authenticated Route] The caller's own profile.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 401, description = "No session", body = ErrorBody)
    )
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = state
        .repo
        .get_user(id)
        .await?
        .ok_or(ApiError::Unauthenticated)?;
    Ok(Json(user.into()))
}
