use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Request boundary: extractors, handlers and errors.
pub mod auth;
pub mod error;
pub mod handlers;

// Domain services.
pub mod catalog;
pub mod marine_life;
pub mod reviews;
pub mod slug;
pub mod visibility;

// Persistence and configuration.
pub mod config;
pub mod memory_repository;
pub mod models;
pub mod repository;

// Route groups (Public, Authenticated, Curator).
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, curator, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::ApiError;
pub use memory_repository::InMemoryRepository;
pub use repository::{PostgresRepository, Repository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every route and schema, served at `/api-docs/openapi.json` and
/// browsable under `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_sites, handlers::get_site_detail, handlers::create_site,
        handlers::create_review, handlers::update_review, handlers::delete_review,
        handlers::get_site_marine_life, handlers::replace_site_marine_life,
        handlers::list_marine_life, handlers::register, handlers::login, handlers::get_me
    ),
    components(
        schemas(
            models::Role, models::Difficulty, models::DiveType, models::Certification,
            models::CurrentCondition, models::MarineLifeType, models::Review,
            models::AuthorSummary, models::ReviewWithAuthor, models::Photo,
            models::PhotoAuthor, models::PhotoWithAuthor, models::MarineLife,
            models::CreatorSummary, models::SiteCounts, models::ListCounts,
            models::UserProfile, models::ReviewRequest, models::ReplaceMarineLifeRequest,
            models::CreateSiteRequest, models::RegisterRequest, models::LoginRequest,
            models::AuthResponse, models::MessageResponse, models::SuccessResponse,
            visibility::PublicSiteView, visibility::MemberSiteView, visibility::SiteDetail,
            catalog::Pagination, catalog::SiteListItem, catalog::SiteListResponse,
            error::ErrorBody, error::FieldError,
        )
    ),
    tags(
        (name = "divesite-catalog", description = "Dive site catalog and review API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The shared, immutable container handed to every request: the persistence layer and
/// the loaded configuration. Cloning is cheap (an `Arc` and a small struct).
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub config: AppConfig,
}

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Gate for the authenticated and curator route groups. Extracting `AuthUser` rejects
/// the request with 401 before any handler runs when the session is missing or invalid.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the route groups, the API docs and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let protected = authenticated::authenticated_routes()
        .merge(curator::curator_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(protected)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: every log line of a request carries its method, uri
/// and `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
