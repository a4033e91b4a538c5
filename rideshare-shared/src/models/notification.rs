use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    RideCancelled,
    RideLeft,
    LateCancellation,
    RideJoined,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::RideCancelled => "ride_cancelled",
            NotificationType::RideLeft => "ride_left",
            NotificationType::LateCancellation => "late_cancellation",
            NotificationType::RideJoined => "ride_joined",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ride_cancelled" => Ok(NotificationType::RideCancelled),
            "ride_left" => Ok(NotificationType::RideLeft),
            "late_cancellation" => Ok(NotificationType::LateCancellation),
            "ride_joined" => Ok(NotificationType::RideJoined),
            other => Err(format!("unknown notification type: {}", other)),
        }
    }
}

/// A single recipient's inbox entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub body: String,
    pub ride_id: Option<Uuid>,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }

    /// Stamps `read_at` the first time; later calls keep the original stamp.
    /// Returns whether anything changed.
    pub fn mark_read(&mut self, now: DateTime<Utc>) -> bool {
        if self.read_at.is_some() {
            return false;
        }
        self.read_at = Some(now);
        true
    }
}

/// Recipient-independent part of a notification, expanded once per user by the fanout.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationDraft {
    pub kind: NotificationType,
    pub title: String,
    pub body: String,
    pub ride_id: Option<Uuid>,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
}

impl NotificationDraft {
    pub fn addressed_to(&self, user_id: &str, now: DateTime<Utc>) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            kind: self.kind,
            title: self.title.clone(),
            body: self.body.clone(),
            ride_id: self.ride_id,
            from_address: self.from_address.clone(),
            to_address: self.to_address.clone(),
            created_at: now,
            read_at: None,
        }
    }
}
