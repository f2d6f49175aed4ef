//! Email input model — the immutable unit of work for a pipeline run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EmailError;

/// Email address with optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl EmailAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    pub fn with_name(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: Some(name.into()),
        }
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

/// Attachment metadata — contents are never loaded into the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub size: usize,
}

/// An inbound email. Created once per message, never mutated; each
/// workflow run owns exactly one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailInput {
    pub from: EmailAddress,
    pub to: Vec<EmailAddress>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<EmailAddress>,
    pub subject: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentMeta>,
}

impl EmailInput {
    /// Parse a raw RFC 822 message into an `EmailInput`.
    ///
    /// Falls back to HTML body (tags stripped) when there is no text part.
    pub fn from_rfc822(raw: &[u8]) -> Result<Self, EmailError> {
        use mail_parser::{MessageParser, MimeHeaders};

        let parsed = MessageParser::default()
            .parse(raw)
            .ok_or_else(|| EmailError::Parse("not a parseable RFC 822 message".into()))?;

        let from = addresses(parsed.from())
            .into_iter()
            .next()
            .ok_or_else(|| EmailError::Parse("message has no From address".into()))?;

        let body = if let Some(text) = parsed.body_text(0) {
            text.to_string()
        } else if let Some(html) = parsed.body_html(0) {
            strip_html(html.as_ref())
        } else {
            String::new()
        };

        let received_at = parsed
            .date()
            .and_then(|d| {
                chrono::NaiveDate::from_ymd_opt(d.year as i32, u32::from(d.month), u32::from(d.day))
                    .and_then(|date| {
                        date.and_hms_opt(
                            u32::from(d.hour),
                            u32::from(d.minute),
                            u32::from(d.second),
                        )
                    })
                    .map(|naive| naive.and_utc())
            })
            .unwrap_or_else(Utc::now);

        let attachments = parsed
            .attachments()
            .map(|part| AttachmentMeta {
                filename: part.attachment_name().map(|s| s.to_string()),
                mime_type: part.content_type().map(|ct| match ct.subtype() {
                    Some(sub) => format!("{}/{}", ct.ctype(), sub),
                    None => ct.ctype().to_string(),
                }),
                size: part.contents().len(),
            })
            .collect();

        Ok(Self {
            from,
            to: addresses(parsed.to()),
            cc: addresses(parsed.cc()),
            subject: parsed.subject().unwrap_or("(no subject)").to_string(),
            body,
            received_at,
            attachments,
        })
    }

    /// Render the email as the compact text block given to the model.
    ///
    /// Quoted reply tails are stripped and the body is truncated to
    /// `max_body_chars` to keep prompts bounded.
    pub fn format_for_prompt(&self, max_body_chars: usize) -> String {
        let mut out = String::with_capacity(256);
        out.push_str(&format!("From: {}\n", self.from));
        if !self.to.is_empty() {
            let to: Vec<String> = self.to.iter().map(|a| a.to_string()).collect();
            out.push_str(&format!("To: {}\n", to.join(", ")));
        }
        out.push_str(&format!("Subject: {}\n", self.subject));
        out.push_str(&format!("Received: {}\n", self.received_at.to_rfc3339()));
        if !self.attachments.is_empty() {
            let names: Vec<&str> = self
                .attachments
                .iter()
                .map(|a| a.filename.as_deref().unwrap_or("unnamed"))
                .collect();
            out.push_str(&format!("Attachments: {}\n", names.join(", ")));
        }
        out.push('\n');
        let body = strip_quoted_text(&self.body);
        out.extend(body.chars().take(max_body_chars));
        out
    }
}

/// Convert a mail-parser address header into our address list.
fn addresses(addr: Option<&mail_parser::Address>) -> Vec<EmailAddress> {
    let Some(addr) = addr else {
        return Vec::new();
    };
    let from_addr = |a: &mail_parser::Addr| {
        a.address.as_ref().map(|address| EmailAddress {
            address: address.to_string(),
            name: a.name.as_ref().map(|n| n.to_string()),
        })
    };
    match addr {
        mail_parser::Address::List(addrs) => addrs.iter().filter_map(from_addr).collect(),
        mail_parser::Address::Group(groups) => groups
            .iter()
            .flat_map(|g| g.addresses.iter().filter_map(from_addr))
            .collect(),
    }
}

/// Strip quoted text from an email body.
///
/// Drops `>`-prefixed lines and everything after an "On … wrote:" or
/// "--- Original Message ---" attribution line. Pure string parsing.
pub fn strip_quoted_text(body: &str) -> String {
    let mut kept = Vec::new();
    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('>') {
            continue;
        }
        if trimmed.starts_with("On ") && trimmed.ends_with("wrote:") {
            break;
        }
        if trimmed.starts_with("---") && trimmed.contains("Original Message") {
            break;
        }
        kept.push(line);
    }
    while kept.last().is_some_and(|l| l.trim().is_empty()) {
        kept.pop();
    }
    kept.join("\n")
}

/// Crude HTML-to-text for bodies without a plain-text part.
fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len() / 2);
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
