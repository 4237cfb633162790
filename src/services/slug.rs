//! Slug generation
//!
//! Turns free-text titles (Korean and Latin alike) into URL-safe slugs and
//! resolves collisions against a storage lookup by appending `-1`, `-2`, ...
//!
//! # Example
//!
//! ```
//! use devspace::services::slug::generate_slug;
//!
//! assert_eq!(generate_slug("Hello, World!"), "hello-world");
//! assert_eq!(generate_slug("러스트 入門 Guide"), "러스트-guide");
//! ```
//!
//! The existence check and the caller's insert are not atomic. Callers must
//! keep a unique constraint on the slug column and retry on conflict, see
//! [`crate::services::post::PostService`].

use std::future::Future;

use crate::config::SlugConfig;

/// Error types for slug resolution
#[derive(Debug, thiserror::Error)]
pub enum SlugError {
    /// The title contains nothing that survives sanitizing
    #[error("Title has no characters usable in a slug: {0:?}")]
    InvalidTitle(String),

    /// Every candidate up to the attempt limit is taken
    #[error("No free slug for '{base}' after {attempts} attempts")]
    Exhausted { base: String, attempts: u32 },

    /// The existence lookup failed
    #[error("Slug lookup failed: {0}")]
    Lookup(#[from] anyhow::Error),
}

/// Whether `c` is a precomposed Hangul syllable (가..힣)
pub fn is_hangul_syllable(c: char) -> bool {
    ('\u{AC00}'..='\u{D7A3}').contains(&c)
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || is_hangul_syllable(c)
}

/// Generate the base slug for a title, bounded to the default 50 characters
pub fn generate_slug(title: &str) -> String {
    generate_slug_with_max(title, SlugConfig::default().max_length)
}

/// Generate the base slug for a title, bounded to `max_length` characters
///
/// Lower-cases, drops everything that is not an ASCII word character,
/// Hangul syllable, whitespace or hyphen, folds whitespace/hyphen runs into a
/// single hyphen and strips hyphens from both ends. May return an empty
/// string.
pub fn generate_slug_with_max(title: &str, max_length: usize) -> String {
    let lowered = title.to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut pending_hyphen = false;

    for c in lowered.trim().chars() {
        if is_word_char(c) {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else if c == '-' || c.is_whitespace() {
            pending_hyphen = true;
        }
    }

    truncate_slug(&slug, max_length)
}

/// Cut a slug to at most `max_chars` characters without leaving a
/// trailing hyphen behind.
fn truncate_slug(slug: &str, max_chars: usize) -> String {
    match slug.char_indices().nth(max_chars) {
        Some((idx, _)) => slug[..idx].trim_end_matches('-').to_string(),
        None => slug.to_string(),
    }
}

/// Build the `n`-th collision candidate, shortening the base so the suffix
/// still fits in `max_length`.
fn suffixed_candidate(base: &str, n: u32, max_length: usize) -> Option<String> {
    let suffix = format!("-{}", n);
    let room = max_length.checked_sub(suffix.len())?;
    let head = truncate_slug(base, room);
    if head.is_empty() {
        return None;
    }
    Some(format!("{}{}", head, suffix))
}

/// Resolve a unique slug for `title` with the default limits
pub async fn generate_unique_slug<F, Fut>(title: &str, exists: F) -> Result<String, SlugError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    generate_unique_slug_with(title, &SlugConfig::default(), exists).await
}

/// Resolve a unique slug for `title`
///
/// `exists` answers whether a post already uses the candidate. Candidates
/// are `base`, `base-1`, `base-2`, ... and at most `config.max_attempts` of
/// them are checked.
///
/// # Errors
/// - `InvalidTitle` if the title sanitizes to an empty slug
/// - `Exhausted` if every checked candidate is taken
/// - `Lookup` if `exists` fails
pub async fn generate_unique_slug_with<F, Fut>(
    title: &str,
    config: &SlugConfig,
    mut exists: F,
) -> Result<String, SlugError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    let base = generate_slug_with_max(title, config.max_length);
    if base.is_empty() {
        return Err(SlugError::InvalidTitle(title.to_string()));
    }

    let mut candidate = base.clone();
    for attempt in 0..config.max_attempts {
        if attempt > 0 {
            candidate = match suffixed_candidate(&base, attempt, config.max_length) {
                Some(candidate) => candidate,
                None => break,
            };
        }

        if !exists(candidate.clone()).await? {
            return Ok(candidate);
        }
        tracing::debug!(slug = %candidate, "slug taken, trying next suffix");
    }

    Err(SlugError::Exhausted {
        base,
        attempts: config.max_attempts,
    })
}
