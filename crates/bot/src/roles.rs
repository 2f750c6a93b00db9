use std::collections::HashSet;

use postbox_core::domain::user::UserId;

/// Sender privilege level. `Admin` is a superset of `Staff`; the two only
/// differ for the explicitly admin-only commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Public,
    Staff,
    Admin,
}

impl Role {
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Staff | Self::Admin)
    }
}

/// Privileged-id set from configuration: one admin plus zero or more
/// moderators. The registry layer knows nothing about roles; this is the
/// only place ids become privileges.
#[derive(Clone, Debug)]
pub struct RoleSet {
    admin_id: UserId,
    moderator_ids: HashSet<UserId>,
}

impl RoleSet {
    pub fn new(admin_id: UserId, moderator_ids: impl IntoIterator<Item = UserId>) -> Self {
        Self { admin_id, moderator_ids: moderator_ids.into_iter().collect() }
    }

    pub fn role_of(&self, user: UserId) -> Role {
        if user == self.admin_id {
            Role::Admin
        } else if self.moderator_ids.contains(&user) {
            Role::Staff
        } else {
            Role::Public
        }
    }
}
