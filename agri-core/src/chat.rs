//! Chatbot reply parsing, the local conversation transcript and the
//! "get solution" question templates.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

use crate::model::DetectionKind;

pub const WELCOME_MESSAGE: &str = "Hello! I'm Krishi Mitra, your farming assistant. \
     Ask me about crops, pests, plant diseases or the weather.";

/// Shown in place of a reply when the chatbot request fails.
pub const FALLBACK_REPLY: &str =
    "Sorry, I couldn't process that request. Please try again later.";

/// Result-field values that do not name a real detection.
const SENTINEL_NAMES: &[&str] = &["--", "Unknown", "Processing...", "Error"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReplyFormat {
    Text,
    Markup,
}

/// A chatbot reply with its wrapper removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub format: ReplyFormat,
    pub body: String,
}

impl ChatReply {
    pub fn text(body: impl Into<String>) -> Self {
        Self { format: ReplyFormat::Text, body: body.into() }
    }

    /// Parse a raw `response` string. A fenced block (```` ```html ... ``` ````)
    /// is unwrapped and classified by its language tag; anything else is kept
    /// verbatim and classified by content. Markup is sanitized.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        let (format, body) = match unwrap_fence(trimmed) {
            Some((lang, body)) => {
                let format = match lang.to_ascii_lowercase().as_str() {
                    "html" | "htm" | "xml" | "xhtml" => ReplyFormat::Markup,
                    "" => classify(body),
                    _ => ReplyFormat::Text,
                };
                (format, body)
            }
            None => (classify(trimmed), trimmed),
        };

        let body = match format {
            ReplyFormat::Markup => sanitize_markup(body),
            ReplyFormat::Text => body.to_string(),
        };
        Self { format, body }
    }
}

/// Keep the formatting tags the chatbot is asked to produce; drop scripts,
/// event handlers and everything else.
pub fn sanitize_markup(html: &str) -> String {
    ammonia::Builder::new()
        .tags(HashSet::from([
            "div", "span", "p", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li",
            "strong", "em", "b", "i", "br", "hr", "table", "thead", "tbody", "tr", "td", "th",
        ]))
        .clean(html)
        .to_string()
}

/// Language tags recognised when a fence has no line break after the tag.
const INLINE_FENCE_TAGS: &[&str] =
    &["html", "htm", "xhtml", "xml", "text", "txt", "plaintext", "markdown", "md"];

fn unwrap_fence(s: &str) -> Option<(&str, &str)> {
    const FENCE: &str = "```";

    let inner = s.strip_prefix(FENCE)?.strip_suffix(FENCE)?;
    if inner.contains(FENCE) {
        return None;
    }

    let (lang, body) = match inner.split_once('\n') {
        Some((info, body)) => (info.trim(), body),
        None => inline_fence_tag(inner).map_or(("", inner), |n| inner.split_at(n)),
    };

    if lang.contains(char::is_whitespace) {
        return None;
    }
    Some((lang, body.trim()))
}

/// Length of a known tag at the start of a single-line fence body. The tag
/// must be followed by `<`, whitespace or nothing, so ```` ```Use neem oil``` ````
/// keeps its first word.
fn inline_fence_tag(inner: &str) -> Option<usize> {
    INLINE_FENCE_TAGS.iter().find_map(|tag| {
        let head = inner.get(..tag.len())?;
        let next = inner[tag.len()..].chars().next();
        (head.eq_ignore_ascii_case(tag) && next.is_none_or(|c| c == '<' || c.is_whitespace()))
            .then_some(tag.len())
    })
}

fn classify(body: &str) -> ReplyFormat {
    let Some(last_close) = body.rfind('>') else {
        return ReplyFormat::Text;
    };
    let has_tag = body.as_bytes().windows(2).enumerate().any(|(i, w)| {
        i < last_close && w[0] == b'<' && (w[1].is_ascii_alphabetic() || w[1] == b'/')
    });
    if has_tag { ReplyFormat::Markup } else { ReplyFormat::Text }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Role {
    User,
    Bot,
    /// Local status lines such as the welcome message.
    Notice,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub format: ReplyFormat,
    pub body: String,
    pub at: DateTime<Utc>,
}

/// The visible conversation log.
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        let mut t = Self { messages: Vec::new() };
        t.push_welcome();
        t
    }

    /// Drop everything and start over with only the welcome message.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.push_welcome();
    }

    fn push_welcome(&mut self) {
        self.push(Role::Notice, ChatReply::text(WELCOME_MESSAGE));
    }

    pub fn push_user(&mut self, text: &str) {
        self.push(Role::User, ChatReply::text(text));
    }

    pub fn push_bot(&mut self, reply: ChatReply) {
        self.push(Role::Bot, reply);
    }

    fn push(&mut self, role: Role, reply: ChatReply) {
        self.messages.push(ChatMessage {
            role,
            format: reply.format,
            body: reply.body,
            at: Utc::now(),
        });
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Question sent to the chatbot for a detected problem, or `None` when
/// `name` is a placeholder rather than a detection.
pub fn solution_query(kind: DetectionKind, name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() || SENTINEL_NAMES.contains(&name) {
        return None;
    }

    Some(match kind {
        DetectionKind::Disease => format!("What is the solution for {name} disease in plants?"),
        DetectionKind::Pest => format!("How to control {name} pest in crops?"),
    })
}
