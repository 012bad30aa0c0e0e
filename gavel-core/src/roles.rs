//! Role lifecycle shared by every session kind.
//!
//! Roles are resolved by exact name, created when absent, and memoized per
//! guild. A memoized role that was deleted by hand is evicted the first time
//! the platform reports it missing, so the next command recreates it.

use std::collections::BTreeSet;

use dashmap::DashMap;

use crate::error::{Result, SessionError};
use crate::gateway::{Gateway, GatewayError, color};
use crate::ids::{GuildId, MemberId, RoleId};

/// The fixed roles the bot manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleName {
    StarredSpeaker,
    Refuter,
    SideA,
    SideB,
}

impl RoleName {
    pub fn as_str(self) -> &'static str {
        match self {
            RoleName::StarredSpeaker => "Starred Speaker",
            RoleName::Refuter => "Refuter",
            RoleName::SideA => "Side A",
            RoleName::SideB => "Side B",
        }
    }

    pub fn color(self) -> u32 {
        match self {
            RoleName::StarredSpeaker => color::YELLOW,
            RoleName::Refuter => color::RED,
            RoleName::SideA => color::BLUE,
            RoleName::SideB => color::RED,
        }
    }
}

impl std::fmt::Display for RoleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Default)]
pub struct RoleReconciler {
    known: DashMap<(GuildId, RoleName), RoleId>,
}

impl RoleReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `name`, creating it with its color when the guild has none.
    pub async fn ensure(
        &self,
        gateway: &dyn Gateway,
        guild: GuildId,
        name: RoleName,
    ) -> Result<RoleId> {
        if let Some(id) = self.lookup(gateway, guild, name).await? {
            return Ok(id);
        }
        let id = gateway.create_role(guild, name.as_str(), name.color()).await?;
        tracing::info!(%guild, role = %name, id = %id, "Created role");
        self.known.insert((guild, name), id);
        Ok(id)
    }

    /// Resolve `name` without creating it.
    pub async fn lookup(
        &self,
        gateway: &dyn Gateway,
        guild: GuildId,
        name: RoleName,
    ) -> Result<Option<RoleId>> {
        if let Some(id) = self.known.get(&(guild, name)) {
            return Ok(Some(*id));
        }
        let found = gateway.find_role_by_name(guild, name.as_str()).await?;
        if let Some(id) = found {
            self.known.insert((guild, name), id);
        }
        Ok(found)
    }

    /// Drop the memoized id for `name`.
    pub fn forget(&self, guild: GuildId, name: RoleName) {
        self.known.remove(&(guild, name));
    }

    /// Translate a failed write against a memoized role. A missing role is
    /// evicted so the next attempt re-resolves it by name.
    pub fn stale(&self, guild: GuildId, name: RoleName, err: GatewayError) -> SessionError {
        match err {
            GatewayError::NotFound(detail) => {
                self.forget(guild, name);
                tracing::warn!(%guild, role = %name, %detail, "Role went missing");
                SessionError::NotFound(format!(
                    "The {name} role (or one of its members) no longer exists. \
                     Run the command again to recreate it."
                ))
            }
            other => other.into(),
        }
    }

    /// Current holders of a managed role.
    pub async fn holders(
        &self,
        gateway: &dyn Gateway,
        guild: GuildId,
        name: RoleName,
        role: RoleId,
    ) -> Result<BTreeSet<MemberId>> {
        gateway
            .list_role_members(guild, role)
            .await
            .map_err(|e| self.stale(guild, name, e))
    }

    /// Make the holders of `role` exactly `intended`.
    pub async fn reset_membership(
        &self,
        gateway: &dyn Gateway,
        guild: GuildId,
        name: RoleName,
        role: RoleId,
        intended: &BTreeSet<MemberId>,
    ) -> Result<()> {
        let current = self.holders(gateway, guild, name, role).await?;
        for member in current.difference(intended) {
            gateway
                .remove_member_role(guild, *member, role)
                .await
                .map_err(|e| self.stale(guild, name, e))?;
        }
        for member in intended.difference(&current) {
            gateway
                .add_member_role(guild, *member, role)
                .await
                .map_err(|e| self.stale(guild, name, e))?;
        }
        tracing::debug!(
            %guild,
            role = %name,
            removed = current.difference(intended).count(),
            added = intended.difference(&current).count(),
            "Reconciled role membership"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Call, MemoryGateway};

    const GUILD: GuildId = GuildId(10);

    #[tokio::test]
    async fn ensure_creates_once_then_reuses() {
        let gw = MemoryGateway::new();
        let roles = RoleReconciler::new();

        let first = roles.ensure(&gw, GUILD, RoleName::Refuter).await.unwrap();
        let second = roles.ensure(&gw, GUILD, RoleName::Refuter).await.unwrap();

        assert_eq!(first, second);
        let creates = gw
            .journal()
            .into_iter()
            .filter(|call| matches!(call, Call::CreateRole { .. }))
            .count();
        assert_eq!(creates, 1);
        assert_eq!(gw.role_color(GUILD, first), Some(color::RED));
    }

    #[tokio::test]
    async fn ensure_adopts_role_created_by_hand() {
        let gw = MemoryGateway::new();
        let existing = gw.create_role(GUILD, "Side A", 0).await.unwrap();
        gw.clear_journal();

        let roles = RoleReconciler::new();
        let id = roles.ensure(&gw, GUILD, RoleName::SideA).await.unwrap();

        assert_eq!(id, existing);
        assert!(gw.journal().is_empty());
    }

    #[tokio::test]
    async fn lookup_never_creates() {
        let gw = MemoryGateway::new();
        let roles = RoleReconciler::new();
        assert_eq!(
            roles.lookup(&gw, GUILD, RoleName::StarredSpeaker).await.unwrap(),
            None
        );
        assert!(gw.journal().is_empty());
    }

    #[tokio::test]
    async fn reset_membership_is_exact() {
        let gw = MemoryGateway::new();
        let roles = RoleReconciler::new();
        let role = roles.ensure(&gw, GUILD, RoleName::Refuter).await.unwrap();
        gw.grant(GUILD, MemberId(1), role);
        gw.grant(GUILD, MemberId(2), role);

        let intended = BTreeSet::from([MemberId(2), MemberId(3)]);
        roles
            .reset_membership(&gw, GUILD, RoleName::Refuter, role, &intended)
            .await
            .unwrap();

        assert_eq!(gw.holders(GUILD, role), intended);
    }

    #[tokio::test]
    async fn deleted_role_is_reported_then_recreated() {
        let gw = MemoryGateway::new();
        let roles = RoleReconciler::new();
        let role = roles.ensure(&gw, GUILD, RoleName::SideB).await.unwrap();
        gw.delete_role(GUILD, role);

        let err = roles
            .reset_membership(&gw, GUILD, RoleName::SideB, role, &BTreeSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));

        let recreated = roles.ensure(&gw, GUILD, RoleName::SideB).await.unwrap();
        assert_ne!(recreated, role);
    }
}
