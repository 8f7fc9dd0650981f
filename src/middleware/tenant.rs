//! Tenant isolation guard: a pure decision layer between the authenticated
//! identity and the camp an operation targets. No database access, no side
//! effects; every denial is reported to the caller.

use uuid::Uuid;

use crate::models::auth::Identity;

/// Why an operation was denied camp access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Deny {
    #[error("no camp scope provided")]
    MissingTenant,
    #[error("malformed camp identifier")]
    MalformedTenant,
    #[error("operation targets another camp")]
    TenantMismatch,
    #[error("conflicting camp identifiers in request")]
    ConflictingTenant,
}

/// Parse a camp id supplied as text (query/body values arrive as strings).
pub fn parse_camp_id(raw: &str) -> Result<Uuid, Deny> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Deny::MissingTenant);
    }
    trimmed.parse().map_err(|_| Deny::MalformedTenant)
}

/// Collapse the camp ids a request may carry (path, body, query) into one.
/// First non-empty wins, but two *different* ids anywhere in the request is
/// a hard reject — a request must never be ambiguous about its tenant.
pub fn resolve_requested(sources: &[Option<Uuid>]) -> Result<Option<Uuid>, Deny> {
    let mut resolved: Option<Uuid> = None;
    for id in sources.iter().flatten() {
        match resolved {
            None => resolved = Some(*id),
            Some(seen) if seen != *id => return Err(Deny::ConflictingTenant),
            Some(_) => {}
        }
    }
    Ok(resolved)
}

/// The isolation decision. Admins have global access, independent of whether
/// the camp even exists; everyone else may act only inside their home camp.
pub fn authorize(identity: &Identity, requested: Option<Uuid>) -> Result<(), Deny> {
    if identity.is_admin() {
        return Ok(());
    }
    let requested = requested.ok_or(Deny::MissingTenant)?;
    match identity.home_camp_id {
        Some(home) if home == requested => Ok(()),
        _ => Err(Deny::TenantMismatch),
    }
}

/// Resolve + authorize in one step, returning the effective camp scope.
/// Used by handlers that always carry the camp id in the path.
pub fn authorize_scoped(identity: &Identity, sources: &[Option<Uuid>]) -> Result<Uuid, Deny> {
    let requested = resolve_requested(sources)?;
    authorize(identity, requested)?;
    requested.ok_or(Deny::MissingTenant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserRole;

    fn admin() -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            role: UserRole::Admin,
            home_camp_id: None,
        }
    }

    fn doctor(home: Uuid) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            role: UserRole::Doctor,
            home_camp_id: Some(home),
        }
    }

    #[test]
    fn admin_always_allowed_even_for_unknown_camps() {
        assert_eq!(authorize(&admin(), Some(Uuid::new_v4())), Ok(()));
        assert_eq!(authorize(&admin(), None), Ok(()));
    }

    #[test]
    fn staff_allowed_only_in_home_camp() {
        let home = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert_eq!(authorize(&doctor(home), Some(home)), Ok(()));
        assert_eq!(authorize(&doctor(home), Some(other)), Err(Deny::TenantMismatch));
    }

    #[test]
    fn staff_without_scope_is_denied() {
        assert_eq!(
            authorize(&doctor(Uuid::new_v4()), None),
            Err(Deny::MissingTenant)
        );
    }

    #[test]
    fn camp_head_follows_same_rule_as_doctor() {
        let home = Uuid::new_v4();
        let head = Identity {
            user_id: Uuid::new_v4(),
            role: UserRole::CampHead,
            home_camp_id: Some(home),
        };
        assert_eq!(authorize(&head, Some(home)), Ok(()));
        assert_eq!(authorize(&head, Some(Uuid::new_v4())), Err(Deny::TenantMismatch));
    }

    #[test]
    fn resolve_takes_first_non_empty() {
        let a = Uuid::new_v4();
        assert_eq!(resolve_requested(&[None, Some(a), None]), Ok(Some(a)));
        assert_eq!(resolve_requested(&[None, None]), Ok(None));
    }

    #[test]
    fn resolve_rejects_two_different_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(
            resolve_requested(&[Some(a), Some(b)]),
            Err(Deny::ConflictingTenant)
        );
        // Repeating the same id is fine.
        assert_eq!(resolve_requested(&[Some(a), Some(a)]), Ok(Some(a)));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_camp_id(""), Err(Deny::MissingTenant));
        assert_eq!(parse_camp_id("  "), Err(Deny::MissingTenant));
        assert_eq!(parse_camp_id("not-a-uuid"), Err(Deny::MalformedTenant));
        let id = Uuid::new_v4();
        assert_eq!(parse_camp_id(&id.to_string()), Ok(id));
    }
}
