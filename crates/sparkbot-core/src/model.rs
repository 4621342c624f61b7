use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoomType {
    Direct,
    Group,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Message details as returned by `GET /messages/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub person_id: String,
    pub person_email: String,
    pub room_id: String,
    #[serde(default)]
    pub room_type: RoomType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentioned_people: Option<Vec<String>>,
    pub created: String,
}

impl Message {
    /// A message carries text, files, or both.
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.is_empty())
            || self.files.as_ref().is_some_and(|f| !f.is_empty())
    }

    #[must_use]
    pub fn mentions_anyone(&self) -> bool {
        self.mentioned_people.as_ref().is_some_and(|p| !p.is_empty())
    }
}

/// A card submission, `GET /attachment/actions/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentActions {
    pub id: String,
    pub person_id: String,
    pub room_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message_id: String,
    pub inputs: HashMap<String, Value>,
    pub created: String,
}

/// `GET /people/{id}` payload, trimmed to what the bot needs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick_name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Human,
    Machine,
    #[default]
    Unknown,
}

const BOT_EMAIL_DOMAINS: [&str; 2] = ["sparkbot.io", "webex.bot"];

impl AccountType {
    /// Bots are flagged by their person type, or by their email domain on
    /// older accounts.
    #[must_use]
    pub fn of(person: &Person) -> Self {
        if person.kind.as_deref() == Some("bot") {
            return Self::Machine;
        }
        let domain = person
            .emails
            .first()
            .and_then(|email| email.split_once('@'))
            .map(|(_, domain)| domain);
        match domain {
            Some(d) if BOT_EMAIL_DOMAINS.iter().any(|b| d.eq_ignore_ascii_case(b)) => Self::Machine,
            _ => Self::Human,
        }
    }
}

/// The account behind the access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountIdentity {
    pub account_type: AccountType,
    pub person: Person,
    /// Approximation of how clients abbreviate the account in mentions.
    pub nick_name: String,
    /// Alternate person id some clients emit in mention markup.
    pub raw_id: String,
}

impl AccountIdentity {
    #[must_use]
    pub fn from_person(person: Person) -> Self {
        let nick_name = person
            .display_name
            .split(' ')
            .next()
            .unwrap_or_default()
            .to_owned();
        Self {
            account_type: AccountType::of(&person),
            raw_id: crate::mention::raw_person_id(&person.id).unwrap_or_default(),
            nick_name,
            person,
        }
    }
}

/// A keyword and its arguments, extracted from a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub keyword: String,
    pub args: Vec<String>,
    pub message: Message,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn account_type_detection() {
        let mut person = Person {
            id: "p".to_owned(),
            emails: vec!["mybot@sparkbot.io".to_owned()],
            display_name: "My Bot".to_owned(),
            ..Person::default()
        };
        assert_eq!(AccountType::of(&person), AccountType::Machine);
        person.emails = vec!["someone@example.com".to_owned()];
        assert_eq!(AccountType::of(&person), AccountType::Human);
        person.kind = Some("bot".to_owned());
        assert_eq!(AccountType::of(&person), AccountType::Machine);
        person.kind = None;
        person.emails = vec!["mybot@WEBEX.bot".to_owned()];
        assert_eq!(AccountType::of(&person), AccountType::Machine);
        person.emails.clear();
        assert_eq!(AccountType::of(&person), AccountType::Human);
    }

    #[test]
    fn identity_nick_name() {
        let identity = AccountIdentity::from_person(Person {
            id: "p".to_owned(),
            display_name: "Mark Webster".to_owned(),
            ..Person::default()
        });
        assert_eq!(identity.nick_name, "Mark");
        assert_eq!(identity.account_type, AccountType::Human);
    }

    #[test]
    fn message_from_api_json() {
        let message: Message = serde_json::from_value(json!({
            "id": "m1",
            "roomId": "r1",
            "roomType": "group",
            "text": "Bot /help",
            "html": "<p><spark-mention>Bot</spark-mention> /help</p>",
            "personId": "u1",
            "personEmail": "matt@example.com",
            "mentionedPeople": ["bot-id"],
            "created": "2015-10-18T14:26:16+00:00"
        }))
        .unwrap();
        assert_eq!(message.room_type, RoomType::Group);
        assert!(message.has_content());
        assert!(message.mentions_anyone());

        let unusual: Message = serde_json::from_value(json!({
            "id": "m2", "roomId": "r1", "roomType": "team",
            "personId": "u1", "personEmail": "x@y", "files": ["https://f"],
            "created": "2015-10-18T14:26:16+00:00"
        }))
        .unwrap();
        assert_eq!(unusual.room_type, RoomType::Unknown);
        assert!(unusual.has_content());
        assert!(!unusual.mentions_anyone());
    }
}
