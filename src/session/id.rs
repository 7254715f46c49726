//! Human-readable session identifiers: `{sanitized-display-name}-{100..=999}`.

use rand::Rng;

/// Replaces every character outside `[a-z0-9]`.
pub const SEPARATOR: char = '-';

/// Base used when a display name has no usable characters.
const FALLBACK_BASE: &str = "user";

/// Longest sanitized base kept before the suffix.
const MAX_BASE_LEN: usize = 32;

/// Mint a session id for `display_name` with a random 3-digit suffix.
///
/// Collisions across different accounts are possible; callers that care
/// check the store before using the id.
pub fn mint_session_id(display_name: &str) -> String {
    mint_with_rng(display_name, &mut rand::thread_rng())
}

/// [`mint_session_id`] with an explicit random source.
pub fn mint_with_rng<R: Rng + ?Sized>(display_name: &str, rng: &mut R) -> String {
    let suffix: u16 = rng.gen_range(100..=999);
    format!("{}{}{}", sanitize_display_name(display_name), SEPARATOR, suffix)
}

/// Lower-case the name and replace every non-alphanumeric run with a single
/// separator, trimming separators at either end.
pub fn sanitize_display_name(display_name: &str) -> String {
    let mut base = String::with_capacity(display_name.len());
    for c in display_name.chars() {
        if c.is_ascii_alphanumeric() {
            base.push(c.to_ascii_lowercase());
        } else if !base.is_empty() && !base.ends_with(SEPARATOR) {
            base.push(SEPARATOR);
        }
    }

    base.truncate(MAX_BASE_LEN);
    let base = base.trim_end_matches(SEPARATOR);
    if base.is_empty() {
        FALLBACK_BASE.to_string()
    } else {
        base.to_string()
    }
}
