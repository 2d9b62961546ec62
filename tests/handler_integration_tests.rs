use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use divesite_catalog::{
    ApiError, AppConfig, AppState, InMemoryRepository,
    auth::{AuthUser, MaybeAuthUser},
    catalog::SiteFilter,
    handlers,
    models::{
        CreateSiteRequest, Difficulty, MarineLifeType, ReplaceMarineLifeRequest, ReviewRequest,
        Role,
    },
    visibility::SiteDetail,
};
use std::sync::Arc;

mod common;
use common::{Script, ScriptedRepository};

// --- Test Utilities ---

fn create_test_state() -> (AppState, Arc<InMemoryRepository>) {
    let repo = Arc::new(InMemoryRepository::new());
    let state = AppState {
        repo: repo.clone(),
        config: AppConfig::default(),
    };
    (state, repo)
}

fn create_scripted_state(script: Script) -> (AppState, Arc<InMemoryRepository>) {
    let repo = Arc::new(InMemoryRepository::new());
    let state = AppState {
        repo: Arc::new(ScriptedRepository::new(repo.clone(), script)),
        config: AppConfig::default(),
    };
    (state, repo)
}

fn caller(repo: &InMemoryRepository, name: &str, role: Role) -> AuthUser {
    let user = repo.add_user(name, role);
    AuthUser {
        id: user.id,
        name: user.name,
        role: user.role,
    }
}

fn review(rating: i64) -> ReviewRequest {
    ReviewRequest {
        rating,
        title: Some("Morning dive".to_string()),
        content: "Visibility past thirty metres".to_string(),
    }
}

// --- Handler Tests ---

#[tokio::test]
async fn test_get_site_detail_public_tier_for_guest() {
    let (state, repo) = create_test_state();
    let guide = repo.add_user("Guide", Role::Guide);
    repo.add_site("Blue Hole", guide.id);

    let Json(detail) = handlers::get_site_detail(
        MaybeAuthUser(None),
        State(state),
        Path("blue-hole".to_string()),
    )
    .await
    .unwrap();

    let SiteDetail::Public(view) = detail else {
        panic!("guest received the member tier");
    };
    assert_eq!(view.name, "Blue Hole");
    assert_eq!(view.created_by.id, guide.id);
}

#[tokio::test]
async fn test_get_site_detail_member_tier_for_session() {
    let (state, repo) = create_test_state();
    let diver = caller(&repo, "Ana", Role::User);
    let guide = repo.add_user("Guide", Role::Guide);
    repo.add_site("Blue Hole", guide.id);

    handlers::create_review(
        diver.clone(),
        State(state.clone()),
        Path("blue-hole".to_string()),
        Ok(Json(review(6))),
    )
    .await
    .unwrap();

    let Json(detail) = handlers::get_site_detail(
        MaybeAuthUser(Some(diver)),
        State(state),
        Path("blue-hole".to_string()),
    )
    .await
    .unwrap();

    let SiteDetail::Member(view) = detail else {
        panic!("member received the public tier");
    };
    assert_eq!(view.average_rating, Some(6.0));
    assert_eq!(view.counts.reviews, 1);
    assert_eq!(view.reviews[0].user.name, "Ana");
}

#[tokio::test]
async fn test_get_site_detail_not_found() {
    let (state, _repo) = create_test_state();

    let result = handlers::get_site_detail(
        MaybeAuthUser(None),
        State(state),
        Path("atlantis".to_string()),
    )
    .await;

    let err = result.unwrap_err();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_review_returns_created() {
    let (state, repo) = create_test_state();
    let diver = caller(&repo, "Ana", Role::User);
    let guide = repo.add_user("Guide", Role::Guide);
    let site = repo.add_site("Blue Hole", guide.id);

    let (status, Json(created)) = handlers::create_review(
        diver.clone(),
        State(state),
        Path("blue-hole".to_string()),
        Ok(Json(review(9))),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created.review.dive_site_id, site.id);
    assert_eq!(created.review.user_id, diver.id);
    assert_eq!(created.user.name, "Ana");
}

#[tokio::test]
async fn test_duplicate_review_is_conflict() {
    let (state, repo) = create_test_state();
    let diver = caller(&repo, "Ana", Role::User);
    let guide = repo.add_user("Guide", Role::Guide);
    let site = repo.add_site("Blue Hole", guide.id);

    handlers::create_review(
        diver.clone(),
        State(state.clone()),
        Path("blue-hole".to_string()),
        Ok(Json(review(9))),
    )
    .await
    .unwrap();
    let result = handlers::create_review(
        diver.clone(),
        State(state),
        Path("blue-hole".to_string()),
        Ok(Json(review(9))),
    )
    .await;

    assert!(matches!(result, Err(ApiError::Conflict(_))));
    assert_eq!(repo.review_count(diver.id, site.id), 1);
}

#[tokio::test]
async fn test_concurrent_creates_leave_one_review() {
    let (state, repo) = create_test_state();
    let diver = caller(&repo, "Ana", Role::User);
    let guide = repo.add_user("Guide", Role::Guide);
    let site = repo.add_site("Blue Hole", guide.id);

    let attempts = (0..8).map(|_| {
        let state = state.clone();
        let diver = diver.clone();
        tokio::spawn(async move {
            handlers::create_review(
                diver,
                State(state),
                Path("blue-hole".to_string()),
                Ok(Json(review(7))),
            )
            .await
            .map(|_| ())
        })
    });

    let mut created = 0;
    let mut conflicts = 0;
    for attempt in attempts.collect::<Vec<_>>() {
        match attempt.await.unwrap() {
            Ok(()) => created += 1,
            Err(ApiError::Conflict(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(repo.review_count(diver.id, site.id), 1);
}

#[tokio::test]
async fn test_review_race_past_precheck_is_conflict() {
    // The pre-check sees no review for either attempt, so the second create is only
    // stopped by the store's pair constraint.
    let (state, repo) = create_scripted_state(Script {
        skip_prechecks: true,
        ..Script::default()
    });
    let diver = caller(&repo, "Ana", Role::User);
    let guide = repo.add_user("Guide", Role::Guide);
    let site = repo.add_site("Blue Hole", guide.id);

    handlers::create_review(
        diver.clone(),
        State(state.clone()),
        Path("blue-hole".to_string()),
        Ok(Json(review(9))),
    )
    .await
    .unwrap();
    let result = handlers::create_review(
        diver.clone(),
        State(state),
        Path("blue-hole".to_string()),
        Ok(Json(review(4))),
    )
    .await;

    let err = result.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
    assert_eq!(err.status(), StatusCode::CONFLICT);
    assert_eq!(repo.review_count(diver.id, site.id), 1);
}

#[tokio::test]
async fn test_site_name_race_past_precheck_is_conflict() {
    let (state, repo) = create_scripted_state(Script {
        skip_prechecks: true,
        ..Script::default()
    });
    let guide = caller(&repo, "Guide", Role::Guide);
    let request = CreateSiteRequest {
        name: "Canyon Wall".to_string(),
        description: "Vertical wall with overhangs".to_string(),
        location: "Dahab".to_string(),
        latitude: 28.5,
        longitude: 34.5,
        depth_min: 5,
        depth_max: 40,
        difficulty: Difficulty::Advanced,
        ..CreateSiteRequest::default()
    };

    let (status, _) = handlers::create_site(guide.clone(), State(state.clone()), Ok(Json(request.clone())))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::CREATED);

    let result = handlers::create_site(guide, State(state.clone()), Ok(Json(request))).await;
    assert!(matches!(result, Err(ApiError::Conflict(_))));

    let Json(page) = handlers::get_sites(State(state), Query(SiteFilter::default()))
        .await
        .unwrap();
    assert_eq!(page.pagination.total, 1);
}

#[tokio::test]
async fn test_member_counts_follow_loaded_lists() {
    let (state, repo) = create_scripted_state(Script {
        stale_counts: true,
        ..Script::default()
    });
    let diver = caller(&repo, "Ana", Role::User);
    let guide = repo.add_user("Guide", Role::Guide);
    let site = repo.add_site("Blue Hole", guide.id);
    repo.add_photo(guide.id, site.id, "https://img.test/blue-hole.jpg");
    repo.add_favorite(diver.id, site.id);

    handlers::create_review(
        diver.clone(),
        State(state.clone()),
        Path("blue-hole".to_string()),
        Ok(Json(review(8))),
    )
    .await
    .unwrap();

    let Json(detail) = handlers::get_site_detail(
        MaybeAuthUser(Some(diver)),
        State(state),
        Path("blue-hole".to_string()),
    )
    .await
    .unwrap();

    let SiteDetail::Member(view) = detail else {
        panic!("member received the public tier");
    };
    assert_eq!(view.counts.reviews, view.reviews.len() as i64);
    assert_eq!(view.counts.photos, view.photos.len() as i64);
    assert_eq!(view.counts.reviews, 1);
    assert_eq!(view.counts.photos, 1);
    assert_eq!(view.counts.favorites, 1);
}

#[tokio::test]
async fn test_delete_review_responds_with_message() {
    let (state, repo) = create_test_state();
    let diver = caller(&repo, "Ana", Role::User);
    let guide = repo.add_user("Guide", Role::Guide);
    repo.add_site("Blue Hole", guide.id);

    handlers::create_review(
        diver.clone(),
        State(state.clone()),
        Path("blue-hole".to_string()),
        Ok(Json(review(9))),
    )
    .await
    .unwrap();

    let Json(body) = handlers::delete_review(diver, State(state), Path("blue-hole".to_string()))
        .await
        .unwrap();
    assert_eq!(body.message, "Review deleted successfully");
}

#[tokio::test]
async fn test_replace_marine_life_forbidden_for_user() {
    let (state, repo) = create_test_state();
    let diver = caller(&repo, "Ana", Role::User);
    let guide = repo.add_user("Guide", Role::Guide);
    repo.add_site("Blue Hole", guide.id);
    let turtle = repo.add_marine_life("Green Turtle", MarineLifeType::Reptile);

    let result = handlers::replace_site_marine_life(
        diver,
        State(state),
        Path("blue-hole".to_string()),
        Ok(Json(ReplaceMarineLifeRequest {
            marine_life_ids: vec![turtle.id],
        })),
    )
    .await;

    let err = result.unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_replace_marine_life_success_for_admin() {
    let (state, repo) = create_test_state();
    let admin = caller(&repo, "Admin", Role::Admin);
    repo.add_site("Blue Hole", admin.id);
    let turtle = repo.add_marine_life("Green Turtle", MarineLifeType::Reptile);

    let Json(body) = handlers::replace_site_marine_life(
        admin,
        State(state.clone()),
        Path("blue-hole".to_string()),
        Ok(Json(ReplaceMarineLifeRequest {
            marine_life_ids: vec![turtle.id],
        })),
    )
    .await
    .unwrap();
    assert!(body.success);

    let Json(taxa) = handlers::get_site_marine_life(State(state), Path("blue-hole".to_string()))
        .await
        .unwrap();
    assert_eq!(taxa.len(), 1);
    assert_eq!(taxa[0].id, turtle.id);
}

#[tokio::test]
async fn test_get_sites_defaults() {
    let (state, repo) = create_test_state();
    let guide = repo.add_user("Guide", Role::Guide);
    repo.add_site("Blue Hole", guide.id);

    let Json(page) = handlers::get_sites(State(state), Query(SiteFilter::default()))
        .await
        .unwrap();

    assert_eq!(page.sites.len(), 1);
    assert_eq!(page.pagination.page, 1);
    assert_eq!(page.pagination.limit, 12);
    assert!(!page.pagination.has_more);
}

#[tokio::test]
async fn test_get_me_returns_profile() {
    let (state, repo) = create_test_state();
    let diver = caller(&repo, "Ana", Role::User);

    let Json(profile) = handlers::get_me(diver.clone(), State(state)).await.unwrap();
    assert_eq!(profile.id, diver.id);
    assert_eq!(profile.name, "Ana");
    assert_eq!(profile.role, Role::User);
}
