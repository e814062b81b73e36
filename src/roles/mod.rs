//! Role and permission policy
//!
//! Every permission decision of the dashboard goes through this module.
//! Roles form a strict hierarchy and staff may only act on accounts ranked
//! below their own. Owner accounts are untouchable by anyone but themselves.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Account role, ordered from least to most privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Vip,
    Moderator,
    Admin,
    Founder,
    Owner,
}

/// Every role, lowest rank first
pub const ALL_ROLES: [Role; 6] = [
    Role::User,
    Role::Vip,
    Role::Moderator,
    Role::Admin,
    Role::Founder,
    Role::Owner,
];

impl Role {
    /// Decode a stored role string
    ///
    /// Matching ignores case and surrounding whitespace. Anything
    /// unrecognised decodes as [`Role::User`].
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "vip" => Role::Vip,
            "moderator" => Role::Moderator,
            "admin" => Role::Admin,
            "founder" => Role::Founder,
            "owner" => Role::Owner,
            _ => Role::User,
        }
    }

    /// Strict decode used for request bodies, where a typo must not
    /// silently demote someone to `user`
    pub fn parse_strict(value: &str) -> Option<Self> {
        let role = Role::parse(value);
        if role == Role::User && !value.trim().eq_ignore_ascii_case("user") {
            return None;
        }
        Some(role)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Vip => "vip",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
            Role::Founder => "founder",
            Role::Owner => "owner",
        }
    }

    pub fn rank(&self) -> u8 {
        *self as u8
    }

    /// Moderator and above may open the dashboard
    pub fn has_dashboard_access(&self) -> bool {
        *self >= Role::Moderator
    }

    /// Ban and unban
    pub fn can_moderate(&self) -> bool {
        *self >= Role::Moderator
    }

    /// Edit other users' profile fields
    pub fn can_edit_users(&self) -> bool {
        *self >= Role::Admin
    }

    /// Change roles and delete accounts
    pub fn can_manage_roles(&self) -> bool {
        *self == Role::Owner
    }

    pub fn can_run_crawler(&self) -> bool {
        *self >= Role::Admin
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the role a stored account actually holds
///
/// The configured owner email always wins over the stored value so a fresh
/// deployment has someone able to promote staff.
pub fn effective_role(email: &str, stored_role: &str, owner_email: Option<&str>) -> Role {
    match owner_email {
        Some(owner) if email.trim().eq_ignore_ascii_case(owner.trim()) => Role::Owner,
        _ => Role::parse(stored_role),
    }
}

/// A party to a permission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subject {
    pub id: i32,
    pub role: Role,
}

impl Subject {
    pub fn new(id: i32, role: Role) -> Self {
        Self { id, role }
    }

    fn outranks(&self, other: &Subject) -> bool {
        self.role > other.role
    }
}

/// Mutations one account can attempt on another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Ban,
    Unban,
    EditProfile,
    ChangeRole(Role),
    Delete,
}

/// Reasons a permission check fails
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Dashboard access requires moderator role or higher")]
    NoDashboardAccess,

    #[error("No permission to ban or unban users")]
    CannotModerate,

    #[error("No permission to edit other users")]
    CannotEdit,

    #[error("Only the owner can change roles")]
    OwnerOnlyRoles,

    #[error("Only the owner can delete users")]
    OwnerOnlyDelete,

    #[error("The owner account cannot be modified")]
    OwnerProtected,

    #[error("The owner role cannot be granted")]
    OwnerNotGrantable,

    #[error("Cannot act on a user with an equal or higher role")]
    TargetOutranks,

    #[error("Cannot {0} your own account")]
    SelfAction(&'static str),

    #[error("No permission to run the crawler")]
    CannotRunCrawler,
}

/// Gate for the dashboard and all catalog management
pub fn require_dashboard(role: Role) -> Result<(), PolicyError> {
    if role.has_dashboard_access() {
        Ok(())
    } else {
        Err(PolicyError::NoDashboardAccess)
    }
}

pub fn require_crawler(role: Role) -> Result<(), PolicyError> {
    if role.can_run_crawler() {
        Ok(())
    } else {
        Err(PolicyError::CannotRunCrawler)
    }
}

/// Decide whether `actor` may perform `action` on `target`
pub fn authorize_user_action(
    actor: Subject,
    target: Subject,
    action: UserAction,
) -> Result<(), PolicyError> {
    let is_self = actor.id == target.id;

    match action {
        UserAction::Ban | UserAction::Unban => {
            if !actor.role.can_moderate() {
                return Err(PolicyError::CannotModerate);
            }
            if is_self {
                return Err(PolicyError::SelfAction("ban"));
            }
            if target.role == Role::Owner {
                return Err(PolicyError::OwnerProtected);
            }
            if !actor.outranks(&target) {
                return Err(PolicyError::TargetOutranks);
            }
            Ok(())
        }
        UserAction::EditProfile => {
            if is_self {
                return Ok(());
            }
            if !actor.role.can_edit_users() {
                return Err(PolicyError::CannotEdit);
            }
            if target.role == Role::Owner {
                return Err(PolicyError::OwnerProtected);
            }
            if !actor.outranks(&target) {
                return Err(PolicyError::TargetOutranks);
            }
            Ok(())
        }
        UserAction::ChangeRole(new_role) => {
            if !actor.role.can_manage_roles() {
                return Err(PolicyError::OwnerOnlyRoles);
            }
            if target.role == Role::Owner {
                return Err(PolicyError::OwnerProtected);
            }
            if new_role == Role::Owner {
                return Err(PolicyError::OwnerNotGrantable);
            }
            Ok(())
        }
        UserAction::Delete => {
            if !actor.role.can_manage_roles() {
                return Err(PolicyError::OwnerOnlyDelete);
            }
            if is_self {
                return Err(PolicyError::SelfAction("delete"));
            }
            if target.role == Role::Owner {
                return Err(PolicyError::OwnerProtected);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(id: i32, role: Role) -> Subject {
        Subject::new(id, role)
    }

    #[test]
    fn test_parse_is_lenient() {
        assert_eq!(Role::parse("ADMIN"), Role::Admin);
        assert_eq!(Role::parse("  Founder "), Role::Founder);
        assert_eq!(Role::parse(""), Role::User);
        assert_eq!(Role::parse("superuser"), Role::User);
    }

    #[test]
    fn test_parse_strict_rejects_unknown() {
        assert_eq!(Role::parse_strict("vip"), Some(Role::Vip));
        assert_eq!(Role::parse_strict("User"), Some(Role::User));
        assert_eq!(Role::parse_strict("admn"), None);
        assert_eq!(Role::parse_strict(""), None);
    }

    #[test]
    fn test_dashboard_gate() {
        assert_eq!(require_dashboard(Role::User), Err(PolicyError::NoDashboardAccess));
        assert_eq!(require_dashboard(Role::Vip), Err(PolicyError::NoDashboardAccess));
        assert!(require_dashboard(Role::Moderator).is_ok());
        assert!(require_dashboard(Role::Owner).is_ok());
    }

    #[test]
    fn test_founder_outranks_admin() {
        assert!(Role::Founder > Role::Admin);
        let founder = subject(1, Role::Founder);
        let admin = subject(2, Role::Admin);
        assert!(authorize_user_action(founder, admin, UserAction::Ban).is_ok());
        assert_eq!(
            authorize_user_action(admin, founder, UserAction::Ban),
            Err(PolicyError::TargetOutranks)
        );
    }

    #[test]
    fn test_owner_cannot_be_banned_or_deleted() {
        let owner = subject(1, Role::Owner);
        let founder = subject(2, Role::Founder);
        assert_eq!(
            authorize_user_action(founder, owner, UserAction::Ban),
            Err(PolicyError::OwnerProtected)
        );
        assert_eq!(
            authorize_user_action(founder, owner, UserAction::EditProfile),
            Err(PolicyError::OwnerProtected)
        );
        assert_eq!(
            authorize_user_action(owner, owner, UserAction::Delete),
            Err(PolicyError::SelfAction("delete"))
        );
    }

    #[test]
    fn test_moderator_bans_only_below() {
        let moderator = subject(1, Role::Moderator);
        assert!(authorize_user_action(moderator, subject(2, Role::Vip), UserAction::Ban).is_ok());
        assert_eq!(
            authorize_user_action(moderator, subject(3, Role::Moderator), UserAction::Unban),
            Err(PolicyError::TargetOutranks)
        );
        assert_eq!(
            authorize_user_action(moderator, subject(4, Role::User), UserAction::EditProfile),
            Err(PolicyError::CannotEdit)
        );
    }

    #[test]
    fn test_no_self_ban() {
        let admin = subject(5, Role::Admin);
        assert_eq!(
            authorize_user_action(admin, admin, UserAction::Ban),
            Err(PolicyError::SelfAction("ban"))
        );
    }

    #[test]
    fn test_anyone_edits_own_profile() {
        let user = subject(9, Role::User);
        assert!(authorize_user_action(user, user, UserAction::EditProfile).is_ok());
    }

    #[test]
    fn test_only_owner_changes_roles() {
        let owner = subject(1, Role::Owner);
        let founder = subject(2, Role::Founder);
        let user = subject(3, Role::User);
        assert!(authorize_user_action(owner, user, UserAction::ChangeRole(Role::Admin)).is_ok());
        assert_eq!(
            authorize_user_action(founder, user, UserAction::ChangeRole(Role::Vip)),
            Err(PolicyError::OwnerOnlyRoles)
        );
        assert_eq!(
            authorize_user_action(owner, user, UserAction::ChangeRole(Role::Owner)),
            Err(PolicyError::OwnerNotGrantable)
        );
        assert_eq!(
            authorize_user_action(owner, owner, UserAction::ChangeRole(Role::User)),
            Err(PolicyError::OwnerProtected)
        );
    }

    #[test]
    fn test_effective_role_owner_email() {
        assert_eq!(
            effective_role("Boss@Example.com", "user", Some("boss@example.com")),
            Role::Owner
        );
        assert_eq!(
            effective_role("someone@example.com", "admin", Some("boss@example.com")),
            Role::Admin
        );
        assert_eq!(effective_role("a@b.co", "moderator", None), Role::Moderator);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Founder).unwrap(), "\"founder\"");
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn any_role() -> impl Strategy<Value = Role> {
        prop::sample::select(ALL_ROLES.to_vec())
    }

    proptest! {
        #[test]
        fn property_as_str_parse_round_trip(role in any_role()) {
            prop_assert_eq!(Role::parse(role.as_str()), role);
            prop_assert_eq!(Role::parse(&role.as_str().to_uppercase()), role);
        }

        #[test]
        fn property_rank_matches_ordering(a in any_role(), b in any_role()) {
            prop_assert_eq!(a < b, a.rank() < b.rank());
        }

        #[test]
        fn property_owner_never_banned_or_deleted(actor in any_role(), actor_id in 1i32..100) {
            let owner = Subject::new(1000, Role::Owner);
            let actor = Subject::new(actor_id, actor);
            prop_assert!(authorize_user_action(actor, owner, UserAction::Ban).is_err());
            prop_assert!(authorize_user_action(actor, owner, UserAction::Delete).is_err());
        }

        #[test]
        fn property_ban_requires_strictly_higher_rank(a in any_role(), b in any_role()) {
            let actor = Subject::new(1, a);
            let target = Subject::new(2, b);
            if authorize_user_action(actor, target, UserAction::Ban).is_ok() {
                prop_assert!(a > b);
                prop_assert!(a.can_moderate());
            }
        }

        #[test]
        fn property_non_dashboard_roles_denied(role in any_role()) {
            let allowed = require_dashboard(role).is_ok();
            prop_assert_eq!(allowed, role >= Role::Moderator);
        }
    }
}
