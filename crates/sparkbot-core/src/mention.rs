use base64::{
    Engine as _,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use tracing::{debug, trace};

use crate::{
    html::{HtmlEvent, HtmlEvents},
    model::{AccountIdentity, Message},
};

const MENTION_TAG: &str = "spark-mention";
/// Length of `ciscospark://us/PEOPLE/`, the prefix of decoded person ids.
const RAW_ID_OFFSET: usize = 23;

const PERMISSIVE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decodes a person id into the bare identifier some clients put in mention
/// markup instead of the full id.
#[must_use]
pub fn raw_person_id(person_id: &str) -> Option<String> {
    let decoded = PERMISSIVE.decode(person_id).ok()?;
    let decoded = String::from_utf8_lossy(&decoded);
    decoded.get(RAW_ID_OFFSET..).map(ToOwned::to_owned)
}

/// Returns the message text with every mention of `me` removed.
///
/// Mentions only exist in the HTML rendition, so plain-text messages come
/// back as is.
#[must_use]
pub fn trim_mentions(me: &AccountIdentity, message: &Message) -> String {
    let Some(html) = message.html.as_deref() else {
        return message.text.clone().unwrap_or_default();
    };

    let mut buffer = String::new();
    let mut skip = 0usize;
    for event in HtmlEvents::new(html) {
        match event {
            HtmlEvent::Open { ref name, .. } if name == MENTION_TAG => {
                if is_self_mention(me, &event) {
                    skip += 1;
                }
            }
            HtmlEvent::Text(text) => {
                if skip > 0 {
                    trace!(label = %text, "dropping self mention");
                    skip -= 1;
                    continue;
                }
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                if !buffer.is_empty() {
                    buffer.push(' ');
                }
                buffer.push_str(text);
            }
            HtmlEvent::Open { .. } | HtmlEvent::Close(_) => {}
        }
    }

    debug!(trimmed = %buffer, "removed self mentions");
    buffer
}

fn is_self_mention(me: &AccountIdentity, tag: &HtmlEvent<'_>) -> bool {
    if tag.attr("data-object-type") != Some("person") {
        return false;
    }
    tag.attr("data-object-id").is_some_and(|id| {
        id == me.person.id || (!me.raw_id.is_empty() && id == me.raw_id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Person, RoomType};

    // base64("ciscospark://us/PEOPLE/1234-bot")
    const BOT_ID: &str = "Y2lzY29zcGFyazovL3VzL1BFT1BMRS8xMjM0LWJvdA";

    fn bot() -> AccountIdentity {
        AccountIdentity::from_person(Person {
            id: BOT_ID.to_owned(),
            emails: vec!["helper@webex.bot".to_owned()],
            display_name: "Helper Bot".to_owned(),
            ..Person::default()
        })
    }

    fn message(text: &str, html: Option<&str>) -> Message {
        Message {
            id: "m1".to_owned(),
            person_id: "someone".to_owned(),
            person_email: "someone@example.com".to_owned(),
            room_id: "r1".to_owned(),
            room_type: RoomType::Group,
            text: Some(text.to_owned()),
            html: html.map(ToOwned::to_owned),
            mentioned_people: Some(vec![BOT_ID.to_owned()]),
            created: "2019-01-01T00:00:00Z".to_owned(),
            ..Message::default()
        }
    }

    #[test]
    fn decodes_raw_id() {
        assert_eq!(raw_person_id(BOT_ID).as_deref(), Some("1234-bot"));
        assert_eq!(raw_person_id("not base64!"), None);
        assert_eq!(raw_person_id("c2hvcnQ"), None);
    }

    #[test]
    fn plain_text_is_untouched() {
        let msg = message("Helper  /help me", None);
        assert_eq!(trim_mentions(&bot(), &msg), "Helper  /help me");
    }

    #[test]
    fn removes_mention_label() {
        let html = format!(
            r#"<p><spark-mention data-object-type="person" data-object-id="{BOT_ID}">Helper</spark-mention> /help me</p>"#
        );
        let msg = message("Helper /help me", Some(&html));
        assert_eq!(trim_mentions(&bot(), &msg), "/help me");
    }

    #[test]
    fn removes_mention_by_raw_id() {
        let html = r#"<spark-mention data-object-type="person" data-object-id="1234-bot">Helper</spark-mention>/status"#;
        let msg = message("Helper /status", Some(html));
        assert_eq!(trim_mentions(&bot(), &msg), "/status");
    }

    #[test]
    fn keeps_other_mentions() {
        let html = format!(
            concat!(
                r#"<p>hey <spark-mention data-object-type="person" data-object-id="other">Alice</spark-mention>"#,
                r#" ask <spark-mention data-object-type="person" data-object-id="{id}">Helper</spark-mention>"#,
                r#" about <b>this</b></p>"#
            ),
            id = BOT_ID
        );
        let msg = message("hey Alice ask Helper about this", Some(&html));
        assert_eq!(trim_mentions(&bot(), &msg), "hey Alice ask about this");
    }

    #[test]
    fn ignores_non_person_mentions() {
        let html = format!(
            r#"<spark-mention data-object-type="groupMention" data-object-id="{BOT_ID}">All</spark-mention> go"#
        );
        let msg = message("All go", Some(&html));
        assert_eq!(trim_mentions(&bot(), &msg), "All go");
    }
}
