//! Notification boundary payload
//!
//! The aggregation engine hands these records to a separate notification
//! collaborator. Delivery is that collaborator's problem; the engine never
//! depends on it succeeding.

use crate::enums::{NotificationPriority, NotificationType};
use crate::{new_entity_id, EntityId, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A notification record queued for delivery to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub notification_id: EntityId,
    pub user_id: EntityId,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub priority: NotificationPriority,
    /// In-app route the notification links to, e.g. `/objectives/<id>`.
    pub link: Option<String>,
    pub created_at: Timestamp,
}

impl NotificationRecord {
    /// Create a record for a user with normal priority.
    pub fn new(
        user_id: EntityId,
        notification_type: NotificationType,
        title: &str,
        message: &str,
    ) -> Self {
        Self {
            notification_id: new_entity_id(),
            user_id,
            title: title.to_string(),
            message: message.to_string(),
            notification_type,
            priority: NotificationPriority::default(),
            link: None,
            created_at: Utc::now(),
        }
    }

    /// Set the delivery priority.
    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the in-app link.
    pub fn with_link(mut self, link: &str) -> Self {
        self.link = Some(link.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let user = new_entity_id();
        let record = NotificationRecord::new(
            user,
            NotificationType::StatusChanged,
            "Objective at risk",
            "Progress dropped below 90",
        )
        .with_priority(NotificationPriority::High)
        .with_link("/objectives/abc");

        assert_eq!(record.user_id, user);
        assert_eq!(record.priority, NotificationPriority::High);
        assert_eq!(record.link.as_deref(), Some("/objectives/abc"));
    }
}
