//! The subscriber callback wire payload (spec.md §6).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{NotificationId, SubscriptionId};

/// `0=create, 1=modify, 2=delete` (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NotificationEventType {
    Create = 0,
    Modify = 1,
    Delete = 2,
}

impl Serialize for NotificationEventType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> { serializer.serialize_u8(*self as u8) }
}

impl<'de> Deserialize<'de> for NotificationEventType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(Self::Create),
            1 => Ok(Self::Modify),
            2 => Ok(Self::Delete),
            other => Err(serde::de::Error::custom(format!("invalid notificationEventType: {other}"))),
        }
    }
}

/// One notification object POSTed as `application/json` to a subscriber's
/// callback URL (spec.md §6). Field names follow the wire contract exactly,
/// including camelCase, since this struct is serialized as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(rename = "notificationId")]
    pub notification_id: NotificationId,
    #[serde(rename = "consumerSubscriptionId")]
    pub consumer_subscription_id: Option<SubscriptionId>,
    #[serde(rename = "notificationEventType")]
    pub notification_event_type: NotificationEventType,
    #[serde(rename = "objectRef")]
    pub object_ref: String,
    pub object: Value,
}
