//! Allow-list access policy.
//!
//! The policy is evaluated as an explicit guard stage before any handler
//! runs, never inside the handlers themselves.

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Process the message.
    Allow,
    /// Drop the message and tell the sender ("Access Denied").
    DenyNotify,
    /// Drop the message without replying (group chats).
    DenySilent,
}

/// Static allow-list policy from configuration.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    allowed_ids: Vec<i64>,
    admin_ids: Vec<i64>,
    allow_all_users_in_groups: bool,
}

impl AccessPolicy {
    pub fn new(allowed_ids: Vec<i64>, admin_ids: Vec<i64>, allow_all_users_in_groups: bool) -> Self {
        Self {
            allowed_ids,
            admin_ids,
            allow_all_users_in_groups,
        }
    }

    /// Decide whether a message from `user_id` may be processed.
    pub fn check(&self, user_id: i64, is_group: bool) -> AccessDecision {
        if self.admin_ids.contains(&user_id) || self.allowed_ids.contains(&user_id) {
            return AccessDecision::Allow;
        }

        if is_group {
            if self.allow_all_users_in_groups {
                AccessDecision::Allow
            } else {
                AccessDecision::DenySilent
            }
        } else {
            AccessDecision::DenyNotify
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(allow_all_groups: bool) -> AccessPolicy {
        AccessPolicy::new(vec![100, 200], vec![1], allow_all_groups)
    }

    #[test]
    fn allowed_user_passes() {
        assert_eq!(policy(false).check(100, false), AccessDecision::Allow);
        assert_eq!(policy(false).check(100, true), AccessDecision::Allow);
    }

    #[test]
    fn admin_passes() {
        assert_eq!(policy(false).check(1, false), AccessDecision::Allow);
    }

    #[test]
    fn unknown_user_in_private_chat_is_notified() {
        assert_eq!(policy(false).check(999, false), AccessDecision::DenyNotify);
    }

    #[test]
    fn unknown_user_in_group_is_dropped_silently() {
        assert_eq!(policy(false).check(999, true), AccessDecision::DenySilent);
    }

    #[test]
    fn group_flag_admits_anyone_in_groups_only() {
        assert_eq!(policy(true).check(999, true), AccessDecision::Allow);
        assert_eq!(policy(true).check(999, false), AccessDecision::DenyNotify);
    }
}
