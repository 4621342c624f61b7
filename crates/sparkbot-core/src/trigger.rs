use core::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Resources a webhook can be notified about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resource {
    Memberships,
    Messages,
    Rooms,
    AttachmentActions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Event {
    Created,
    Updated,
    Deleted,
}

impl Resource {
    pub const ALL: [Self; 4] = [
        Self::Memberships,
        Self::Messages,
        Self::Rooms,
        Self::AttachmentActions,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memberships => "memberships",
            Self::Messages => "messages",
            Self::Rooms => "rooms",
            Self::AttachmentActions => "attachmentActions",
        }
    }

    /// Events the platform emits for this resource.
    #[must_use]
    pub const fn events(self) -> &'static [Event] {
        match self {
            Self::Memberships => &[Event::Created, Event::Updated, Event::Deleted],
            Self::Messages => &[Event::Created, Event::Deleted],
            Self::Rooms => &[Event::Created, Event::Updated],
            Self::AttachmentActions => &[Event::Created],
        }
    }

    #[must_use]
    pub fn supports(self, event: Event) -> bool {
        self.events().contains(&event)
    }
}

impl Event {
    pub const ALL: [Self; 3] = [Self::Created, Self::Updated, Self::Deleted];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownName(s.to_owned()))
    }
}

impl FromStr for Event {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| UnknownName(s.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource or event name: {0}")]
pub struct UnknownName(pub String);

/// A `resource/event` pair, the dispatch key of the event router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub resource: Resource,
    pub event: Event,
}

impl EventKey {
    #[must_use]
    pub const fn new(resource: Resource, event: Event) -> Self {
        Self { resource, event }
    }

    #[must_use]
    pub fn is_legal(self) -> bool {
        self.resource.supports(self.event)
    }

    /// Every legal pair, in table order.
    pub fn all() -> impl Iterator<Item = Self> {
        Resource::ALL
            .into_iter()
            .flat_map(|r| r.events().iter().map(move |e| Self::new(r, *e)))
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource, self.event)
    }
}

/// Webhook envelope POSTed by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub id: String,
    pub name: String,
    pub created: String,
    pub target_url: String,
    pub resource: Resource,
    pub event: Event,
    pub actor_id: String,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl Trigger {
    #[must_use]
    pub const fn key(&self) -> EventKey {
        EventKey::new(self.resource, self.event)
    }

    /// Identifier of the resource instance the event is about.
    #[must_use]
    pub fn data_id(&self) -> Option<&str> {
        self.data.get("id").and_then(Value::as_str)
    }

    /// Validates and converts a raw payload.
    #[must_use]
    pub fn from_payload(payload: Value) -> Option<Self> {
        if !is_valid_trigger(&payload) {
            return None;
        }
        match serde_json::from_value(payload) {
            Ok(trigger) => Some(trigger),
            Err(e) => {
                debug!(error = %e, "payload passed validation but did not deserialize");
                None
            }
        }
    }
}

const MANDATORY_FIELDS: [&str; 7] = [
    "id",
    "name",
    "created",
    "targetUrl",
    "resource",
    "event",
    "actorId",
];

/// Checks that a JSON payload is a webhook trigger for a supported
/// resource/event combination.
#[must_use]
pub fn is_valid_trigger(payload: &Value) -> bool {
    let Some(obj) = payload.as_object() else {
        debug!("payload is not a JSON object");
        return false;
    };

    for field in MANDATORY_FIELDS {
        let present = obj
            .get(field)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty());
        if !present {
            debug!(field, "payload is missing a mandatory field");
            return false;
        }
    }
    if !obj.get("data").is_some_and(Value::is_object) {
        debug!(field = "data", "payload is missing a mandatory field");
        return false;
    }

    let resource = obj.get("resource").and_then(Value::as_str).unwrap_or_default();
    let Ok(resource) = resource.parse::<Resource>() else {
        debug!(resource, "unsupported resource");
        return false;
    };
    let event = obj.get("event").and_then(Value::as_str).unwrap_or_default();
    let Ok(event) = event.parse::<Event>() else {
        debug!(event, "unsupported event");
        return false;
    };
    if !resource.supports(event) {
        debug!(%resource, %event, "event is not emitted for this resource");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload(resource: &str, event: &str) -> Value {
        json!({
            "id": "Y2lzY29zcGFyazovL3VzL1dFQkhPT0svZjRl",
            "name": "sparkbot",
            "created": "2016-08-23T16:26:02.754Z",
            "targetUrl": "https://bot.example.com/",
            "resource": resource,
            "event": event,
            "actorId": "Y2lzY29zcGFyazovL3VzL1BFT1BMRS9hY3Rvcg",
            "orgId": "org",
            "status": "active",
            "data": { "id": "msg-1", "roomId": "room-1" }
        })
    }

    #[test]
    fn accepts_every_legal_pair() {
        for key in EventKey::all() {
            let p = payload(key.resource.as_str(), key.event.as_str());
            assert!(is_valid_trigger(&p), "{key} should be accepted");
        }
        assert_eq!(EventKey::all().count(), 8);
    }

    #[test]
    fn rejects_illegal_pairs() {
        for (resource, event) in [
            ("messages", "updated"),
            ("rooms", "deleted"),
            ("attachmentActions", "updated"),
            ("attachmentActions", "deleted"),
        ] {
            assert!(!is_valid_trigger(&payload(resource, event)), "{resource}/{event}");
        }
    }

    #[test]
    fn rejects_unknown_names() {
        assert!(!is_valid_trigger(&payload("teams", "created")));
        assert!(!is_valid_trigger(&payload("messages", "all")));
        assert!(!is_valid_trigger(&payload("all", "all")));
    }

    #[test]
    fn rejects_missing_fields() {
        for field in MANDATORY_FIELDS.iter().chain(["data"].iter()) {
            let mut p = payload("messages", "created");
            p.as_object_mut().unwrap().remove(*field);
            assert!(!is_valid_trigger(&p), "missing {field}");
        }
        let mut p = payload("messages", "created");
        p["actorId"] = json!("");
        assert!(!is_valid_trigger(&p));
        p = payload("messages", "created");
        p["data"] = json!("msg-1");
        assert!(!is_valid_trigger(&p));
        assert!(!is_valid_trigger(&json!([1, 2])));
    }

    #[test]
    fn converts_valid_payload() {
        let trigger = Trigger::from_payload(payload("attachmentActions", "created")).unwrap();
        assert_eq!(trigger.resource, Resource::AttachmentActions);
        assert_eq!(trigger.key().to_string(), "attachmentActions/created");
        assert_eq!(trigger.data_id(), Some("msg-1"));
        assert_eq!(trigger.org_id.as_deref(), Some("org"));
        assert!(Trigger::from_payload(payload("rooms", "deleted")).is_none());
    }
}
