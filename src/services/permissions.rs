//! Capability resolution for a (actor, file) pair.
//!
//! Everything here is pure: callers load the grants and pass the clock in,
//! so the same inputs always produce the same decision.

use crate::entities::{files, share_grants};
use crate::models::{Actor, Capability, CapabilitySet, Role, SharePermission};
use chrono::{DateTime, Utc};

pub fn full_access() -> CapabilitySet {
    CapabilitySet::from([Capability::View, Capability::Download, Capability::Manage])
}

/// Resolves what `actor` may do with `file`.
///
/// Owners and admins get every capability. Anyone else is limited to the
/// single grant addressed to them for this file, provided it has not expired
/// at `now`. A grant whose permission cannot be parsed grants nothing.
pub fn resolve_capabilities(
    actor: &Actor,
    file: &files::Model,
    grants: &[share_grants::Model],
    now: DateTime<Utc>,
) -> CapabilitySet {
    if actor.id == file.owner_id {
        return full_access();
    }

    match actor.role {
        Role::Admin => full_access(),
        Role::User | Role::Guest => grants
            .iter()
            .find(|g| g.file_id == file.id && g.recipient_id == actor.id)
            .filter(|g| !g.is_expired_at(now))
            .and_then(|g| g.permission.parse::<SharePermission>().ok())
            .map(|p| p.capabilities())
            .unwrap_or_default(),
    }
}

pub fn has_capability(
    actor: &Actor,
    file: &files::Model,
    grants: &[share_grants::Model],
    capability: Capability,
    now: DateTime<Utc>,
) -> bool {
    resolve_capabilities(actor, file, grants, now).contains(&capability)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn actor(id: &str, role: Role) -> Actor {
        Actor {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            role,
        }
    }

    fn file(owner: &str) -> files::Model {
        files::Model {
            id: "file-1".to_string(),
            owner_id: owner.to_string(),
            original_name: "report.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            size: 42,
            storage_key: "uploads/file-1".to_string(),
            created_at: Utc::now(),
        }
    }

    fn grant(
        recipient: &str,
        permission: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> share_grants::Model {
        share_grants::Model {
            file_id: "file-1".to_string(),
            recipient_id: recipient.to_string(),
            granted_by: "owner".to_string(),
            permission: permission.to_string(),
            expires_at,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_owner_has_everything() {
        let caps = resolve_capabilities(&actor("owner", Role::Guest), &file("owner"), &[], Utc::now());
        assert_eq!(caps, full_access());
    }

    #[test]
    fn test_admin_overrides_without_grant() {
        let caps = resolve_capabilities(&actor("root", Role::Admin), &file("owner"), &[], Utc::now());
        assert_eq!(caps, full_access());
    }

    #[test]
    fn test_no_grant_means_no_access() {
        let caps = resolve_capabilities(&actor("alice", Role::User), &file("owner"), &[], Utc::now());
        assert!(caps.is_empty());
    }

    #[test]
    fn test_view_grant_never_includes_download() {
        let now = Utc::now();
        let grants = vec![grant("alice", "VIEW", None)];
        let caps = resolve_capabilities(&actor("alice", Role::User), &file("owner"), &grants, now);
        assert_eq!(caps, CapabilitySet::from([Capability::View]));
        assert!(!has_capability(
            &actor("alice", Role::User),
            &file("owner"),
            &grants,
            Capability::Download,
            now
        ));
    }

    #[test]
    fn test_download_grant_includes_view_but_not_manage() {
        let grants = vec![grant("alice", "DOWNLOAD", None)];
        let caps = resolve_capabilities(&actor("alice", Role::User), &file("owner"), &grants, Utc::now());
        assert_eq!(caps, CapabilitySet::from([Capability::View, Capability::Download]));
    }

    #[test]
    fn test_expired_grant_is_ignored() {
        let now = Utc::now();
        let grants = vec![grant("alice", "DOWNLOAD", Some(now - Duration::minutes(1)))];
        let caps = resolve_capabilities(&actor("alice", Role::User), &file("owner"), &grants, now);
        assert!(caps.is_empty());

        let before_expiry = now - Duration::minutes(2);
        let caps = resolve_capabilities(
            &actor("alice", Role::User),
            &file("owner"),
            &grants,
            before_expiry,
        );
        assert!(caps.contains(&Capability::Download));
    }

    #[test]
    fn test_grant_for_someone_else_does_not_apply() {
        let grants = vec![grant("bob", "DOWNLOAD", None)];
        let caps = resolve_capabilities(&actor("alice", Role::Guest), &file("owner"), &grants, Utc::now());
        assert!(caps.is_empty());
    }

    #[test]
    fn test_guest_with_grant_gets_granted_level() {
        let grants = vec![grant("guest", "VIEW", None)];
        let caps = resolve_capabilities(&actor("guest", Role::Guest), &file("owner"), &grants, Utc::now());
        assert_eq!(caps, CapabilitySet::from([Capability::View]));
    }
}
