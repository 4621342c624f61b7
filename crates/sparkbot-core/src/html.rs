//! Minimal scanner turning a message HTML fragment into open-tag, text and
//! close-tag events. Only what message bodies contain is handled: elements,
//! quoted or bare attributes, comments and character references.

use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlEvent<'a> {
    Open {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text(Cow<'a, str>),
    Close(String),
}

impl HtmlEvent<'_> {
    /// Attribute lookup on an open tag.
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&str> {
        match self {
            Self::Open { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            Self::Text(_) | Self::Close(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct HtmlEvents<'a> {
    src: &'a str,
    pos: usize,
    pending_close: Option<String>,
}

impl<'a> HtmlEvents<'a> {
    #[must_use]
    pub const fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            pending_close: None,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_past(&mut self, terminator: &str) {
        match self.rest().find(terminator) {
            Some(i) => self.pos += i + terminator.len(),
            None => self.pos = self.src.len(),
        }
    }

    fn text(&mut self) -> HtmlEvent<'a> {
        let start = self.pos;
        let bytes = self.src.as_bytes();
        let mut end = start + 1;
        while end < bytes.len() && !(bytes[end] == b'<' && starts_markup(&self.src[end..])) {
            end += 1;
        }
        self.pos = end;
        HtmlEvent::Text(decode_entities(&self.src[start..end]))
    }

    fn close_tag(&mut self) -> HtmlEvent<'a> {
        let rest = &self.rest()[2..];
        let end = rest.find('>').unwrap_or(rest.len());
        let name = rest[..end].trim().to_ascii_lowercase();
        self.pos += 2 + (end + 1).min(rest.len());
        HtmlEvent::Close(name)
    }

    fn open_tag(&mut self) -> HtmlEvent<'a> {
        let rest = &self.rest()[1..];
        let name_len = rest
            .find(|c: char| !is_name_char(c))
            .unwrap_or(rest.len());
        let name = rest[..name_len].to_ascii_lowercase();
        let mut cursor = &rest[name_len..];
        let mut attrs = Vec::new();
        let mut self_closing = false;

        loop {
            cursor = cursor.trim_start();
            if cursor.is_empty() {
                break;
            }
            if let Some(after) = cursor.strip_prefix("/>") {
                self_closing = true;
                cursor = after;
                break;
            }
            if let Some(after) = cursor.strip_prefix('>') {
                cursor = after;
                break;
            }
            if let Some(after) = cursor.strip_prefix('/') {
                cursor = after;
                continue;
            }

            let key_len = cursor
                .find(|c: char| c.is_whitespace() || matches!(c, '=' | '>' | '/'))
                .unwrap_or(cursor.len());
            let key = cursor[..key_len].to_ascii_lowercase();
            cursor = cursor[key_len..].trim_start();

            let value = if let Some(after_eq) = cursor.strip_prefix('=') {
                let after_eq = after_eq.trim_start();
                let (raw, remaining) = match after_eq.chars().next() {
                    Some(quote @ ('"' | '\'')) => {
                        let body = &after_eq[1..];
                        let close = body.find(quote).unwrap_or(body.len());
                        (&body[..close], &body[(close + 1).min(body.len())..])
                    }
                    _ => {
                        let len = after_eq
                            .find(|c: char| c.is_whitespace() || c == '>')
                            .unwrap_or(after_eq.len());
                        (&after_eq[..len], &after_eq[len..])
                    }
                };
                cursor = remaining;
                decode_entities(raw).into_owned()
            } else {
                String::new()
            };
            attrs.push((key, value));
        }

        self.pos = self.src.len() - cursor.len();
        if self_closing {
            self.pending_close = Some(name.clone());
        }
        HtmlEvent::Open { name, attrs }
    }
}

impl<'a> Iterator for HtmlEvents<'a> {
    type Item = HtmlEvent<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(name) = self.pending_close.take() {
            return Some(HtmlEvent::Close(name));
        }
        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return None;
            }
            if rest.starts_with("<!--") {
                self.skip_past("-->");
                continue;
            }
            if rest.starts_with("<!") || rest.starts_with("<?") {
                self.skip_past(">");
                continue;
            }
            if rest.starts_with("</") && starts_markup(rest) {
                return Some(self.close_tag());
            }
            if starts_markup(rest) {
                return Some(self.open_tag());
            }
            return Some(self.text());
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.')
}

fn starts_markup(s: &str) -> bool {
    let mut chars = s.chars();
    if chars.next() != Some('<') {
        return false;
    }
    match chars.next() {
        Some('/') => chars.next().is_some_and(|c| c.is_ascii_alphabetic()),
        Some('!' | '?') => true,
        Some(c) => c.is_ascii_alphabetic(),
        None => false,
    }
}

/// Replaces named and numeric character references.
#[must_use]
pub fn decode_entities(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_reference(&rest[1..semi]).map(|c| (c, semi)));
        if let Some((c, semi)) = decoded {
            out.push(c);
            rest = &rest[semi + 1..];
        } else {
            out.push('&');
            rest = &rest[1..];
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_reference(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}
