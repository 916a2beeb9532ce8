//! Task ID generation.
//!
//! An ID is the slugified title plus a 6-character hex suffix, e.g.
//! `fix-login-bug-3f91ac`. The suffix is random in normal operation and a
//! counter when deterministic mode is enabled for tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Maximum length of the slug portion of an ID.
const MAX_SLUG_LEN: usize = 40;

static DETERMINISTIC: AtomicBool = AtomicBool::new(false);
static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Enable deterministic ID suffixes (a counter instead of random hex).
///
/// Only intended for tests that need stable IDs.
pub fn enable_deterministic_ids() {
    DETERMINISTIC.store(true, Ordering::SeqCst);
    COUNTER.store(0, Ordering::SeqCst);
}

/// Switch ID suffixes back to random hex.
pub fn disable_deterministic_ids() {
    DETERMINISTIC.store(false, Ordering::SeqCst);
}

/// Convert a title to a slug: lowercase ASCII alphanumeric runs joined by
/// hyphens, truncated to a bounded length without a trailing hyphen.
#[must_use]
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len().min(MAX_SLUG_LEN));

    for word in title.split(|c: char| !c.is_ascii_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.extend(word.chars().map(|c| c.to_ascii_lowercase()));
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }

    slug.truncate(MAX_SLUG_LEN);
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[allow(clippy::cast_possible_truncation)]
fn suffix() -> String {
    if DETERMINISTIC.load(Ordering::SeqCst) {
        format!("{:06x}", COUNTER.fetch_add(1, Ordering::SeqCst))
    } else {
        use std::collections::hash_map::RandomState;
        use std::hash::{BuildHasher, Hasher};

        let mut hasher = RandomState::new().build_hasher();
        // Only entropy is needed, truncation is fine
        hasher.write_u128(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_or(0, |d| d.as_nanos()),
        );
        format!("{:06x}", hasher.finish() & 0xFF_FFFF)
    }
}

/// Generate a task ID from a title.
///
/// Titles with no usable characters fall back to the `task-` prefix.
#[must_use]
pub fn generate_task_id(title: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        format!("task-{}", suffix())
    } else {
        format!("{slug}-{}", suffix())
    }
}
