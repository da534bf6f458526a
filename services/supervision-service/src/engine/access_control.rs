//! Administrative access control for the supervision surface itself:
//! attribute-based permission checks, role-based grouping, MFA enforcement
//! for enrolling admins. This guards supervision's own admin operations, not
//! the agent requests `PolicyEngine` evaluates.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use supervision_common::error::{Result, SupervisionError};

#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user_id: String,
    pub permissions: Vec<String>,
    pub roles: Vec<String>,
    pub mfa_enabled: bool,
    pub granted_at: DateTime<Utc>,
    pub granted_by: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AccessControlStats {
    pub total_users: usize,
    pub mfa_enabled_count: usize,
    pub role_counts: HashMap<String, usize>,
}

fn role_permissions(role: &str) -> &'static [&'static str] {
    match role {
        "admin" => &["*"],
        "policy_manager" => &["policy:read", "policy:write", "policy:deploy"],
        "escalation_approver" => &["escalation:read", "escalation:approve"],
        "auditor" => &["audit:read", "anomaly:read", "compliance:read"],
        "viewer" => &["policy:read", "constraint:read", "audit:read"],
        _ => &[],
    }
}

const KNOWN_ROLES: &[&str] = &["admin", "policy_manager", "escalation_approver", "auditor", "viewer"];

fn grants(perms: &[&str], required: &str) -> bool {
    if perms.contains(&"*") || perms.contains(&required) {
        return true;
    }
    if let Some((category, _)) = required.split_once(':') {
        let wildcard = format!("{category}:*");
        if perms.iter().any(|p| *p == wildcard) {
            return true;
        }
    }
    false
}

pub struct AccessControl {
    require_mfa_for_admin: bool,
    users: Mutex<HashMap<String, AdminUser>>,
}

impl AccessControl {
    pub fn new(require_mfa_for_admin: bool) -> Self {
        Self { require_mfa_for_admin, users: Mutex::new(HashMap::new()) }
    }

    pub fn grant_access(
        &self,
        user_id: &str,
        permissions: Vec<String>,
        roles: Vec<String>,
        granted_by: Option<String>,
    ) -> AdminUser {
        let user = AdminUser {
            user_id: user_id.to_string(),
            permissions,
            roles,
            mfa_enabled: self.require_mfa_for_admin,
            granted_at: Utc::now(),
            granted_by,
        };
        self.users.lock().insert(user_id.to_string(), user.clone());
        user
    }

    pub fn revoke_access(&self, user_id: &str) -> Result<()> {
        self.users
            .lock()
            .remove(user_id)
            .map(|_| ())
            .ok_or_else(|| SupervisionError::PermissionNotFound(user_id.to_string()))
    }

    pub fn check_permission(&self, user_id: &str, required_permission: &str) -> Result<()> {
        let users = self.users.lock();
        let user = users
            .get(user_id)
            .ok_or_else(|| SupervisionError::AccessDenied(format!("{user_id} is not authorized")))?;

        let direct: Vec<&str> = user.permissions.iter().map(String::as_str).collect();
        if grants(&direct, required_permission) {
            return Ok(());
        }

        for role in &user.roles {
            if grants(role_permissions(role), required_permission) {
                return Ok(());
            }
        }

        Err(SupervisionError::InsufficientPrivileges(format!(
            "missing permission '{required_permission}'"
        )))
    }

    pub fn assign_role(&self, user_id: &str, role: &str) -> Result<()> {
        if !KNOWN_ROLES.contains(&role) {
            return Err(SupervisionError::RoleNotAssigned(format!("unknown role '{role}'")));
        }
        let mut users = self.users.lock();
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| SupervisionError::AccessDenied(format!("{user_id} not found")))?;
        if !user.roles.iter().any(|r| r == role) {
            user.roles.push(role.to_string());
        }
        Ok(())
    }

    pub fn remove_role(&self, user_id: &str, role: &str) -> Result<()> {
        let mut users = self.users.lock();
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| SupervisionError::AccessDenied(format!("{user_id} not found")))?;
        user.roles.retain(|r| r != role);
        Ok(())
    }

    pub fn get_user_permissions(&self, user_id: &str) -> Vec<String> {
        let users = self.users.lock();
        let Some(user) = users.get(user_id) else {
            return Vec::new();
        };
        let mut permissions: HashSet<String> = user.permissions.iter().cloned().collect();
        for role in &user.roles {
            permissions.extend(role_permissions(role).iter().map(|p| p.to_string()));
        }
        permissions.into_iter().collect()
    }

    pub fn get_user(&self, user_id: &str) -> Option<AdminUser> {
        self.users.lock().get(user_id).cloned()
    }

    pub fn get_stats(&self) -> AccessControlStats {
        let users = self.users.lock();
        let mut role_counts = HashMap::new();
        let mut mfa_enabled_count = 0;
        for user in users.values() {
            if user.mfa_enabled {
                mfa_enabled_count += 1;
            }
            for role in &user.roles {
                *role_counts.entry(role.clone()).or_insert(0) += 1;
            }
        }
        AccessControlStats { total_users: users.len(), mfa_enabled_count, role_counts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_role_grants_everything() {
        let ac = AccessControl::new(true);
        ac.grant_access("alice", vec![], vec!["admin".to_string()], None);
        assert!(ac.check_permission("alice", "policy:write").is_ok());
        assert!(ac.check_permission("alice", "anything:at:all").is_ok());
    }

    #[test]
    fn viewer_role_is_read_only() {
        let ac = AccessControl::new(true);
        ac.grant_access("bob", vec![], vec!["viewer".to_string()], None);
        assert!(ac.check_permission("bob", "policy:read").is_ok());
        assert!(matches!(
            ac.check_permission("bob", "policy:write"),
            Err(SupervisionError::InsufficientPrivileges(_))
        ));
    }

    #[test]
    fn unknown_user_is_denied() {
        let ac = AccessControl::new(true);
        assert!(matches!(ac.check_permission("nobody", "policy:read"), Err(SupervisionError::AccessDenied(_))));
    }

    #[test]
    fn assigning_unknown_role_is_rejected() {
        let ac = AccessControl::new(true);
        ac.grant_access("alice", vec![], vec![], None);
        assert!(matches!(ac.assign_role("alice", "superuser"), Err(SupervisionError::RoleNotAssigned(_))));
    }

    #[test]
    fn direct_wildcard_permission_matches_category() {
        let ac = AccessControl::new(true);
        ac.grant_access("carol", vec!["escalation:*".to_string()], vec![], None);
        assert!(ac.check_permission("carol", "escalation:approve").is_ok());
    }
}
