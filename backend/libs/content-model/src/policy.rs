//! Edit/delete authorization for posts, replies and chat messages
//!
//! Administrators may mutate anything at any time. Everyone else may only
//! touch their own items: one edit within the edit window, and deletion
//! within the (shorter) delete window. Both windows are measured from
//! `created_at` and close at exactly the window length.
use crate::identity::Actor;
use crate::models::ItemMeta;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

pub const EDIT_WINDOW_MINUTES: i64 = 15;
pub const DELETE_WINDOW_MINUTES: i64 = 10;

pub fn edit_window() -> Duration {
    Duration::minutes(EDIT_WINDOW_MINUTES)
}

pub fn delete_window() -> Duration {
    Duration::minutes(DELETE_WINDOW_MINUTES)
}

/// Edits a non-admin author may make over an item's lifetime.
pub const MAX_AUTHOR_EDITS: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Edit,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Edit => "edit",
            Operation::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum DenyReason {
    Unauthorized,
    EditLimitReached,
    EditWindowExpired,
    DeleteWindowExpired,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::Unauthorized => "unauthorized",
            DenyReason::EditLimitReached => "edit-limit-reached",
            DenyReason::EditWindowExpired => "edit-window-expired",
            DenyReason::DeleteWindowExpired => "delete-window-expired",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Decide whether `actor` may perform `operation` on `item` at `now`.
pub fn authorize(
    actor: &Actor,
    item: &ItemMeta,
    operation: Operation,
    now: DateTime<Utc>,
) -> Decision {
    if actor.is_admin {
        return Decision::Allow;
    }

    if actor.identity != item.author {
        return Decision::Deny(DenyReason::Unauthorized);
    }

    // Clock skew can put created_at slightly ahead of now.
    let elapsed = (now - item.created_at).max(Duration::zero());

    match operation {
        Operation::Edit => {
            if item.edit_count >= MAX_AUTHOR_EDITS {
                Decision::Deny(DenyReason::EditLimitReached)
            } else if elapsed >= edit_window() {
                Decision::Deny(DenyReason::EditWindowExpired)
            } else {
                Decision::Allow
            }
        }
        Operation::Delete => {
            if elapsed >= delete_window() {
                Decision::Deny(DenyReason::DeleteWindowExpired)
            } else {
                Decision::Allow
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Who {
        Admin,
        Author,
        Other,
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    fn item(edit_count: i32) -> ItemMeta {
        ItemMeta {
            author: "Kay".to_string(),
            created_at: t0(),
            edit_count,
        }
    }

    fn actor(who: Who) -> Actor {
        match who {
            Who::Admin => Actor {
                identity: "Steph".to_string(),
                is_admin: true,
            },
            Who::Author => Actor {
                identity: "Kay".to_string(),
                is_admin: false,
            },
            Who::Other => Actor {
                identity: "Steph".to_string(),
                is_admin: false,
            },
        }
    }

    /// The decision table written out independently of `authorize`.
    fn expected(who: Who, op: Operation, edit_count: i32, elapsed: Duration) -> Decision {
        match (who, op) {
            (Who::Admin, _) => Decision::Allow,
            (Who::Other, _) => Decision::Deny(DenyReason::Unauthorized),
            (Who::Author, Operation::Edit) if edit_count >= 1 => {
                Decision::Deny(DenyReason::EditLimitReached)
            }
            (Who::Author, Operation::Edit) if elapsed >= Duration::minutes(15) => {
                Decision::Deny(DenyReason::EditWindowExpired)
            }
            (Who::Author, Operation::Delete) if elapsed >= Duration::minutes(10) => {
                Decision::Deny(DenyReason::DeleteWindowExpired)
            }
            (Who::Author, _) => Decision::Allow,
        }
    }

    #[test]
    fn test_authorization_table_exhaustive() {
        let elapsed_points = [
            Duration::zero(),
            Duration::minutes(9) + Duration::seconds(59),
            Duration::minutes(10),
            Duration::minutes(10) + Duration::seconds(1),
            Duration::minutes(14) + Duration::seconds(59),
            Duration::minutes(15),
            Duration::minutes(15) + Duration::seconds(1),
            Duration::hours(1),
            Duration::days(30),
        ];

        let mut checked = 0;
        for who in [Who::Admin, Who::Author, Who::Other] {
            for op in [Operation::Edit, Operation::Delete] {
                for edit_count in [0, 1, 2] {
                    for elapsed in elapsed_points {
                        let decision = authorize(&actor(who), &item(edit_count), op, t0() + elapsed);
                        assert_eq!(
                            decision,
                            expected(who, op, edit_count, elapsed),
                            "who={:?} op={:?} edit_count={} elapsed={}s",
                            who,
                            op,
                            edit_count,
                            elapsed.num_seconds()
                        );
                        checked += 1;
                    }
                }
            }
        }
        assert_eq!(checked, 3 * 2 * 3 * elapsed_points.len());
    }

    #[test]
    fn test_edit_window_boundary() {
        let author = actor(Who::Author);
        let just_inside = t0() + Duration::minutes(14) + Duration::seconds(59);
        let at_boundary = t0() + Duration::minutes(15);

        assert_eq!(
            authorize(&author, &item(0), Operation::Edit, just_inside),
            Decision::Allow
        );
        assert_eq!(
            authorize(&author, &item(0), Operation::Edit, at_boundary),
            Decision::Deny(DenyReason::EditWindowExpired)
        );
    }

    #[test]
    fn test_delete_window_boundary() {
        let author = actor(Who::Author);
        let just_inside = t0() + Duration::minutes(9) + Duration::seconds(59);
        let at_boundary = t0() + Duration::minutes(10);

        assert_eq!(
            authorize(&author, &item(0), Operation::Delete, just_inside),
            Decision::Allow
        );
        assert_eq!(
            authorize(&author, &item(0), Operation::Delete, at_boundary),
            Decision::Deny(DenyReason::DeleteWindowExpired)
        );
    }

    #[test]
    fn test_spent_edit_denied_even_inside_window() {
        let decision = authorize(&actor(Who::Author), &item(1), Operation::Edit, t0());
        assert_eq!(decision, Decision::Deny(DenyReason::EditLimitReached));
    }

    #[test]
    fn test_delete_ignores_edit_count() {
        let decision = authorize(&actor(Who::Author), &item(1), Operation::Delete, t0());
        assert_eq!(decision, Decision::Allow);
    }

    #[test]
    fn test_future_created_at_counts_as_fresh() {
        let decision = authorize(
            &actor(Who::Author),
            &item(0),
            Operation::Delete,
            t0() - Duration::minutes(5),
        );
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_deny_reason_tokens() {
        assert_eq!(DenyReason::Unauthorized.to_string(), "unauthorized");
        assert_eq!(
            serde_json::to_value(DenyReason::EditLimitReached).unwrap(),
            "edit-limit-reached"
        );
        assert_eq!(
            serde_json::from_str::<DenyReason>("\"delete-window-expired\"").unwrap(),
            DenyReason::DeleteWindowExpired
        );
        assert_eq!(DenyReason::EditWindowExpired.as_str(), "edit-window-expired");
    }
}
