//! Caller identity.
//!
//! Every engine operation that touches tenant data takes a [`TenantContext`]
//! explicitly instead of reading ambient session state. The context is
//! produced by [`Engine::resolve_context`](crate::Engine::resolve_context).

use serde::{Deserialize, Serialize};

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Treasurer,
    Member,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Treasurer => "treasurer",
            Self::Member => "member",
        }
    }

    /// Admins and treasurers may act on behalf of any member of their tenant.
    pub fn is_privileged(self) -> bool {
        matches!(self, Self::Admin | Self::Treasurer)
    }
}

impl TryFrom<&str> for Role {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "admin" => Ok(Self::Admin),
            "treasurer" => Ok(Self::Treasurer),
            "member" => Ok(Self::Member),
            other => Err(EngineError::InvalidInput(format!("invalid role: {other}"))),
        }
    }
}

/// Resolved `{tenant, caller, role}` triple.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: String,
    pub member_id: String,
    pub role: Role,
}

impl TenantContext {
    pub fn is_privileged(&self) -> bool {
        self.role.is_privileged()
    }

    /// Fails with `Unauthorized` unless the caller is an admin or treasurer.
    pub fn require_privileged(&self, action: &str) -> Result<(), EngineError> {
        if !self.is_privileged() {
            return Err(EngineError::Unauthorized(format!(
                "only admins and treasurers can {action}"
            )));
        }
        Ok(())
    }

    /// Fails with `Unauthorized` unless the caller is an admin.
    pub fn require_admin(&self, action: &str) -> Result<(), EngineError> {
        if self.role != Role::Admin {
            return Err(EngineError::Unauthorized(format!(
                "only admins can {action}"
            )));
        }
        Ok(())
    }

    /// Privileged callers may act for anyone; members only for themselves.
    pub fn require_self_or_privileged(
        &self,
        member_id: &str,
        action: &str,
    ) -> Result<(), EngineError> {
        if self.is_privileged() || self.member_id == member_id {
            return Ok(());
        }
        Err(EngineError::Unauthorized(format!(
            "members can only {action} for themselves"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: Role) -> TenantContext {
        TenantContext {
            tenant_id: "t".to_string(),
            member_id: "m1".to_string(),
            role,
        }
    }

    #[test]
    fn role_round_trips_through_storage_string() {
        for role in [Role::Admin, Role::Treasurer, Role::Member] {
            assert_eq!(Role::try_from(role.as_str()).unwrap(), role);
        }
        assert!(Role::try_from("owner").is_err());
    }

    #[test]
    fn member_role_is_limited_to_own_records() {
        let member = ctx(Role::Member);
        assert!(member.require_self_or_privileged("m1", "record").is_ok());
        assert!(matches!(
            member.require_self_or_privileged("m2", "record"),
            Err(EngineError::Unauthorized(_))
        ));
        assert!(ctx(Role::Treasurer)
            .require_self_or_privileged("m2", "record")
            .is_ok());
    }

    #[test]
    fn treasurer_is_privileged_but_not_admin() {
        let treasurer = ctx(Role::Treasurer);
        assert!(treasurer.require_privileged("approve loans").is_ok());
        assert!(treasurer.require_admin("change roles").is_err());
    }
}
