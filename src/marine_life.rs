//! Marine-life associations between sites and the taxa reference table.

use std::collections::HashSet;

use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ApiError, FieldError, StoreError},
    models::{MarineLife, ReplaceMarineLifeRequest},
    repository::Repository,
    slug::resolve_site,
};

/// Taxa recorded for a site, alphabetical by common name.
pub async fn site_marine_life(repo: &dyn Repository, slug: &str) -> Result<Vec<MarineLife>, ApiError> {
    let site = resolve_site(repo, slug).await?;
    Ok(repo.list_site_marine_life(site.site.id).await?)
}

/// replace_site_marine_life
///
/// Replaces the full association set of a site in one transaction. Restricted to
/// guides and admins. Duplicate ids in the request collapse to one pair.
pub async fn replace_site_marine_life(
    repo: &dyn Repository,
    caller: &AuthUser,
    slug: &str,
    req: ReplaceMarineLifeRequest,
) -> Result<usize, ApiError> {
    if !caller.role.can_curate() {
        tracing::warn!(user_id = %caller.id, role = %caller.role, "marine life update refused");
        return Err(ApiError::Forbidden);
    }

    let site = resolve_site(repo, slug).await?;
    let ids = dedup_ids(req.marine_life_ids);

    match repo.replace_site_marine_life(site.site.id, &ids).await {
        Ok(()) => {
            tracing::info!(site_id = %site.site.id, taxa = ids.len(), user_id = %caller.id, "marine life replaced");
            Ok(ids.len())
        }
        Err(StoreError::ForeignKeyViolation) => Err(ApiError::validation(
            "Unknown marine life id",
            vec![FieldError::new("marineLifeIds", "every id must reference an existing taxon")],
        )),
        Err(err) => Err(err.into()),
    }
}

/// Keeps the first occurrence of each id, preserving request order.
fn dedup_ids(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}
