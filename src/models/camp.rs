use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A camp is the unit of tenancy: every clinical record hangs off exactly
/// one camp id, and the slug is the only identifier exposed in public URLs.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Camp {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub venue: Option<String>,
    pub contact_phone: Option<String>,
    pub hospital_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCampRequest {
    pub slug: String,
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub venue: Option<String>,
    pub contact_phone: Option<String>,
    pub hospital_name: Option<String>,
}

/// Slug is intentionally absent: it is immutable after creation.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCampRequest {
    pub name: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub venue: Option<String>,
    pub contact_phone: Option<String>,
    pub hospital_name: Option<String>,
}

/// Validates that a slug only contains lowercase ASCII letters, digits and
/// hyphens, does not start or end with a hyphen, and is between 2 and 63
/// characters. Slugs end up in patient ids and public URLs, so the shape
/// is enforced at creation time.
pub fn is_valid_slug(s: &str) -> bool {
    let len = s.len();
    len >= 2
        && len <= 63
        && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !s.starts_with('-')
        && !s.ends_with('-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_shape() {
        assert!(is_valid_slug("winter-clinic"));
        assert!(is_valid_slug("camp2026"));
        assert!(!is_valid_slug("a"));
        assert!(!is_valid_slug("-leading"));
        assert!(!is_valid_slug("trailing-"));
        assert!(!is_valid_slug("Upper-Case"));
        assert!(!is_valid_slug("with space"));
    }
}
