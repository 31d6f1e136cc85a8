//! Turn a decoded Maniphest mail into an [`Embed`].

use regex::Regex;
use tracing::{error, warn};

use crate::error::{LookoutError, Result};
use crate::model::embed::{Embed, EmbedAuthor, EmbedField};
use crate::model::mail::DecodedMail;
use crate::parser::header::{decode_encoded_words, parse_date};
use crate::parser::stamps::{find_stamp, get_stamp};

/// Length of the `"[Maniphest] "` subject prefix.
pub const SUBJECT_PREFIX_LEN: usize = 12;

/// Shown for Assignee and Tag when the task has none.
pub const NONE_PLACEHOLDER: &str = "(none)";

/// `YYYY-MM-DDTHH:MM:SS.mmmZ`
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Task priority → sidebar color, as configured on phabricator.wikimedia.org.
const PRIORITY_COLORS: [(&str, u32); 6] = [
    ("100", 0xda49be), // Unbreak Now!
    ("90", 0x8e44ad),  // Needs Triage
    ("80", 0xc0392b),  // High
    ("50", 0xe67e22),  // Medium
    ("25", 0xf1c40f),  // Low
    ("10", 0x3498db),  // Lowest
];

/// Builds embeds for one Phabricator instance.
#[derive(Debug, Clone)]
pub struct EmbedBuilder {
    tracker_url: String,
    description_re: Regex,
}

impl EmbedBuilder {
    /// `tracker_url` is the instance base URL, e.g. `https://phabricator.wikimedia.org`.
    pub fn new(tracker_url: &str) -> Result<Self> {
        let tracker_url = tracker_url.trim_end_matches('/').to_string();
        let pattern = format!(
            r"(?s)(.+)\n\nTASK DETAIL\n {{2}}{}",
            regex::escape(&tracker_url)
        );
        let description_re = Regex::new(&pattern).map_err(|e| LookoutError::InvalidConfig {
            option: "tracker.base_url",
            reason: e.to_string(),
        })?;
        Ok(Self {
            tracker_url,
            description_re,
        })
    }

    pub fn tracker_url(&self) -> &str {
        &self.tracker_url
    }

    /// Build the embed for `mail`, whose stamp header text is `stamps`.
    pub fn build(&self, mail: &DecodedMail, stamps: &str) -> Embed {
        let subject = decode_encoded_words(mail.header("Subject").unwrap_or(""));

        let mut embed = Embed {
            title: title_from_subject(&subject),
            ..Default::default()
        };

        match self.description_re.captures(&mail.plain_body) {
            Some(caps) => embed.description = caps.get(1).map(|m| m.as_str().to_string()),
            None => error!(
                tag = "missing_description",
                plain_body = %mail.plain_body,
                "missing description"
            ),
        }

        if let Some(monogram) = present(get_stamp("monogram", stamps)) {
            embed.url = Some(format!("{}/{monogram}", self.tracker_url));
        }

        if let Some(actor) = present(get_stamp("actor", stamps)) {
            embed.author = Some(EmbedAuthor {
                name: actor.to_string(),
                url: Some(self.profile_url(actor)),
            });
        }

        if let Some(status) = present(get_stamp("status", stamps)) {
            embed
                .fields
                .push(EmbedField::inline("Status", capitalize(status)));
        }

        // Unassigned and untagged tasks are common, so these are not warned about.
        let assignee = present(find_stamp("task-owner", stamps))
            .map(|owner| self.profile_link(owner))
            .unwrap_or_else(|| NONE_PLACEHOLDER.to_string());
        embed.fields.push(EmbedField::inline("Assignee", assignee));

        let tag = present(find_stamp("tag", stamps))
            .map(|tag| self.profile_link(tag))
            .unwrap_or_else(|| NONE_PLACEHOLDER.to_string());
        embed.fields.push(EmbedField::inline("Tag", tag));

        let date = mail.header("Date").unwrap_or("");
        match parse_date(date) {
            Some(dt) => embed.timestamp = Some(dt.format(TIMESTAMP_FORMAT).to_string()),
            None => error!(tag = "invalid_date", date, "failed to parse date header"),
        }

        if let Some(priority) = present(get_stamp("task-priority", stamps)) {
            embed.color = priority_color(priority);
        }

        embed
    }

    /// `@name` → `<tracker>/p/name`
    fn profile_url(&self, handle: &str) -> String {
        format!("{}/p/{}", self.tracker_url, drop_sigil(handle))
    }

    /// `[@name](<tracker>/p/name)`
    fn profile_link(&self, handle: &str) -> String {
        format!("[{handle}]({})", self.profile_url(handle))
    }
}

/// Strip the `"[Maniphest] "` prefix.
///
/// Subjects shorter than the prefix are kept whole.
pub fn title_from_subject(subject: &str) -> String {
    match subject.char_indices().nth(SUBJECT_PREFIX_LEN) {
        Some((idx, _)) => subject[idx..].to_string(),
        None if subject.chars().count() == SUBJECT_PREFIX_LEN => String::new(),
        None => {
            warn!(tag = "short_subject", subject, "subject shorter than prefix");
            subject.to_string()
        }
    }
}

/// Sidebar color for a task priority value.
pub fn priority_color(priority: &str) -> Option<u32> {
    PRIORITY_COLORS
        .iter()
        .find(|(p, _)| *p == priority)
        .map(|(_, color)| *color)
}

/// `open` → `Open`
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Drop the leading `@` or `#` of a handle.
fn drop_sigil(handle: &str) -> &str {
    let mut chars = handle.chars();
    chars.next();
    chars.as_str()
}

/// Empty stamp values carry no information.
fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
