//! Role-based permission policy.

use std::collections::{HashMap, HashSet};

use rolegate_core::{PolicyTable, Role};

use super::AuthError;

/// Static mapping from operation to the roles allowed to perform it.
///
/// Fails closed: an operation with no entry is denied to every role.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationPolicy {
    rules: HashMap<String, HashSet<Role>>,
}

impl AuthorizationPolicy {
    /// Create an empty policy that denies everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the policy from a configured table.
    #[must_use]
    pub fn from_table(table: &PolicyTable) -> Self {
        let rules = table
            .0
            .iter()
            .map(|(operation, roles)| (operation.clone(), roles.iter().copied().collect()))
            .collect();
        Self { rules }
    }

    /// Allow `roles` to perform `operation`, replacing any existing rule.
    #[must_use]
    pub fn with_rule(mut self, operation: impl Into<String>, roles: &[Role]) -> Self {
        self.rules
            .insert(operation.into(), roles.iter().copied().collect());
        self
    }

    /// Whether `role` may perform `operation`.
    #[must_use]
    pub fn is_allowed(&self, role: Role, operation: &str) -> bool {
        self.rules
            .get(operation)
            .is_some_and(|roles| roles.contains(&role))
    }

    /// Like [`is_allowed`](Self::is_allowed), as a `Result`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Forbidden`] if the role is not allowed.
    pub fn check(&self, role: Role, operation: &str) -> Result<(), AuthError> {
        if self.is_allowed(role, operation) {
            Ok(())
        } else {
            Err(AuthError::Forbidden {
                role,
                operation: operation.to_string(),
            })
        }
    }

    /// Roles allowed to perform `operation`, in privilege order.
    #[must_use]
    pub fn allowed_roles(&self, operation: &str) -> Vec<Role> {
        let mut roles: Vec<Role> = self
            .rules
            .get(operation)
            .map(|roles| roles.iter().copied().collect())
            .unwrap_or_default();
        roles.sort();
        roles
    }

    /// Known operations, sorted.
    #[must_use]
    pub fn operations(&self) -> Vec<&str> {
        let mut operations: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        operations.sort_unstable();
        operations
    }
}

impl From<&PolicyTable> for AuthorizationPolicy {
    fn from(table: &PolicyTable) -> Self {
        Self::from_table(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_table_matrix() {
        let policy = AuthorizationPolicy::from_table(&PolicyTable::default());

        let expected = [
            (Role::User, "profile", true),
            (Role::User, "moderator", false),
            (Role::User, "admin", false),
            (Role::Moderator, "profile", true),
            (Role::Moderator, "moderator", true),
            (Role::Moderator, "admin", false),
            (Role::Admin, "profile", true),
            (Role::Admin, "moderator", true),
            (Role::Admin, "admin", true),
        ];

        for (role, operation, allowed) in expected {
            assert_eq!(
                policy.is_allowed(role, operation),
                allowed,
                "{role} on {operation}"
            );
        }
    }

    #[test]
    fn test_unknown_operation_denied_to_all() {
        let policy = AuthorizationPolicy::from_table(&PolicyTable::default());
        for role in Role::ALL {
            assert!(!policy.is_allowed(role, "billing"));
            assert!(!policy.is_allowed(role, ""));
            assert!(!policy.is_allowed(role, "Admin"));
        }
    }

    #[test]
    fn test_empty_policy_denies_everything() {
        let policy = AuthorizationPolicy::new();
        for role in Role::ALL {
            assert!(!policy.is_allowed(role, "profile"));
        }
        assert!(policy.operations().is_empty());
    }

    #[test]
    fn test_check_error() {
        let policy = AuthorizationPolicy::new().with_rule("reports", &[Role::Moderator]);

        assert!(policy.check(Role::Moderator, "reports").is_ok());
        match policy.check(Role::User, "reports") {
            Err(AuthError::Forbidden { role, operation }) => {
                assert_eq!(role, Role::User);
                assert_eq!(operation, "reports");
            }
            other => panic!("expected forbidden, got {other:?}"),
        }
    }

    #[test]
    fn test_with_rule_replaces() {
        let policy = AuthorizationPolicy::new()
            .with_rule("reports", &[Role::Admin, Role::User])
            .with_rule("reports", &[Role::Moderator]);

        assert_eq!(policy.allowed_roles("reports"), vec![Role::Moderator]);
        assert!(!policy.is_allowed(Role::Admin, "reports"));
    }

    #[test]
    fn test_operations_sorted() {
        let policy = AuthorizationPolicy::from(&PolicyTable::default());
        assert_eq!(policy.operations(), vec!["admin", "moderator", "profile"]);
        assert_eq!(
            policy.allowed_roles("moderator"),
            vec![Role::Admin, Role::Moderator]
        );
        assert!(policy.allowed_roles("missing").is_empty());
    }
}
