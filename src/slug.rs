//! Slug resolution.
//!
//! Sites are addressed by a slug derived from their name (`"Blue Hole"` -> `"blue-hole"`).
//! No slug is stored: the name is reconstructed from the slug and matched against the
//! catalog, so resolution is best-effort rather than a key lookup.

use crate::{error::ApiError, models::SiteRow, repository::Repository};

/// slugify
///
/// Lowercases a site name and collapses every run of characters outside `[a-z0-9]`
/// into a single `-`, trimmed at both ends. The result is always URL-safe.
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    if slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// SlugCandidates
///
/// The names a slug may stand for, in match priority order:
/// 1. `spaced`: capitalized tokens joined by a space (`"Blue Hole"`).
/// 2. `dashed`: capitalized tokens joined by `" - "` (`"Tubbataha - North Atoll"`).
/// 3. `first_word`: fallback, any name containing the first word of `spaced`
///    (case-sensitive substring).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlugCandidates {
    pub spaced: String,
    pub dashed: String,
    pub first_word: String,
}

/// How a stored name matched a slug. Ordering is the tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchRank {
    Spaced,
    Dashed,
    FirstWord,
}

impl SlugCandidates {
    /// Returns `None` when the slug has no usable first token (empty or leading `-`),
    /// since an empty fallback would match every site. Slugs carrying a NUL byte can
    /// name no stored site and are rejected before reaching the store.
    pub fn parse(slug: &str) -> Option<Self> {
        if slug.contains('\0') {
            return None;
        }
        let words: Vec<String> = slug.split('-').map(capitalize).collect();
        let spaced = words.join(" ");
        let dashed = words.join(" - ");
        let first_word = spaced.split(' ').next().unwrap_or_default().to_string();
        if first_word.is_empty() {
            return None;
        }
        Some(Self {
            spaced,
            dashed,
            first_word,
        })
    }

    /// Classifies a stored name against the candidates.
    pub fn rank(&self, name: &str) -> Option<MatchRank> {
        if name == self.spaced {
            Some(MatchRank::Spaced)
        } else if name == self.dashed {
            Some(MatchRank::Dashed)
        } else if name.contains(&self.first_word) {
            Some(MatchRank::FirstWord)
        } else {
            None
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// resolve_site
///
/// Locates the site a slug refers to. A pure read: safe to call concurrently and
/// repeatedly. Exact matches win over the first-word fallback; remaining ties go to the
/// oldest site.
pub async fn resolve_site(repo: &dyn Repository, slug: &str) -> Result<SiteRow, ApiError> {
    let Some(candidates) = SlugCandidates::parse(slug) else {
        tracing::debug!(slug, "slug has no usable tokens");
        return Err(ApiError::not_found("Dive site not found"));
    };

    match repo.find_site_by_slug(&candidates).await? {
        Some(row) => {
            tracing::debug!(slug, site_id = %row.site.id, name = %row.site.name, "slug resolved");
            Ok(row)
        }
        None => {
            tracing::debug!(slug, "slug did not resolve");
            Err(ApiError::not_found("Dive site not found"))
        }
    }
}
