//! User identity and access gating.

use crate::model::UserId;
use uuid::Uuid;

/// A signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: UserId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    User,
    Admin,
}

/// Source of the current user and role lookups. Backed by the hosted auth
/// service in deployments; tests and offline use [`StaticIdentity`].
pub trait IdentityProvider {
    /// The signed-in user, if any.
    fn current(&self) -> Option<UserIdentity>;

    fn role_of(&self, user: UserId) -> Role;
}

/// Outcome of gating a screen behind sign-in (and optionally a role).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    /// Not signed in, or role too low: send the user to the entry screen.
    RedirectToEntry,
}

/// Gate access: signed-in is always required; `required` adds a role floor.
/// Admins satisfy any floor.
pub fn check_access(provider: &dyn IdentityProvider, required: Option<Role>) -> AccessDecision {
    let Some(user) = provider.current() else {
        return AccessDecision::RedirectToEntry;
    };
    match required {
        Some(floor) if provider.role_of(user.id) < floor => AccessDecision::RedirectToEntry,
        _ => AccessDecision::Allow,
    }
}

/// Fixed identity for tests and single-user offline boards.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    identity: Option<UserIdentity>,
    role: Role,
}

impl StaticIdentity {
    pub fn signed_in(name: &str) -> Self {
        Self {
            identity: Some(UserIdentity {
                id: Uuid::new_v4(),
                name: name.to_string(),
            }),
            role: Role::User,
        }
    }

    pub fn signed_out() -> Self {
        Self {
            identity: None,
            role: Role::User,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

impl IdentityProvider for StaticIdentity {
    fn current(&self) -> Option<UserIdentity> {
        self.identity.clone()
    }

    fn role_of(&self, _user: UserId) -> Role {
        self.role
    }
}
