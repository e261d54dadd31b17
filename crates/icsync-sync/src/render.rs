//! Rendering events into destination record bodies.
//!
//! A body is an `[event ...]` block understood by the destination's calendar
//! support, the optional description, and a hidden marker carrying the UID:
//!
//! ```text
//! [event start="2024-06-01T10:00:00Z" timezone="UTC" status="standalone" name="Team Sync" minimal="true"]
//! [/event]
//!
//! Weekly sync.
//!
//! <!-- ics_uid: abc-123 -->
//! ```

use std::sync::LazyLock;

use icsync_core::Event;
use regex::Regex;

/// Title used when an event has no summary.
pub const UNTITLED_EVENT: &str = "Untitled event";

/// Timezone written when neither the event nor the site names one.
const FALLBACK_TIMEZONE: &str = "UTC";

static UID_MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^<!-- ics_uid: (.*?) -->\r?$").expect("Invalid UID marker regex")
});

/// The title and body rendered for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEvent {
    /// Record title.
    pub title: String,
    /// Record body.
    pub body: String,
}

/// Renders events with a site-wide default timezone.
#[derive(Debug, Clone, Default)]
pub struct EventRenderer {
    site_timezone: Option<String>,
}

impl EventRenderer {
    /// Creates a renderer. A blank timezone counts as none.
    pub fn new(site_timezone: Option<&str>) -> Self {
        Self {
            site_timezone: site_timezone
                .map(str::trim)
                .filter(|tz| !tz.is_empty())
                .map(str::to_string),
        }
    }

    /// Renders the title and body of `event`.
    pub fn render(&self, event: &Event) -> RenderedEvent {
        RenderedEvent {
            title: render_title(event),
            body: self.render_body(event),
        }
    }

    /// Renders the body of `event`. Equal events render byte-identical bodies.
    pub fn render_body(&self, event: &Event) -> String {
        let timezone = event
            .tzid
            .as_deref()
            .map(str::trim)
            .filter(|tz| !tz.is_empty())
            .or(self.site_timezone.as_deref())
            .unwrap_or(FALLBACK_TIMEZONE);

        let start = event.starts_at.map(|t| t.to_display_string());
        let end = event.ends_at.map(|t| t.to_display_string());

        let mut attrs: Vec<String> = Vec::new();
        push_attr(&mut attrs, "start", start.as_deref().unwrap_or_default());
        push_attr(&mut attrs, "end", end.as_deref().unwrap_or_default());
        push_attr(&mut attrs, "timezone", &escape_attr(timezone));
        attrs.push(r#"status="standalone""#.to_string());
        push_attr(&mut attrs, "name", &escape_attr(&event.summary));
        push_attr(&mut attrs, "url", &escape_attr(&event.url));
        push_attr(&mut attrs, "location", &escape_attr(&event.location));
        attrs.push(r#"minimal="true""#.to_string());

        let mut body = format!("[event {}]\n[/event]\n", attrs.join(" "));
        let description = event.description.trim();
        if !description.is_empty() {
            body.push('\n');
            body.push_str(description);
            body.push('\n');
        }
        body.push_str(&format!("\n<!-- ics_uid: {} -->\n", escape_attr(&event.uid)));
        body
    }
}

fn push_attr(attrs: &mut Vec<String>, name: &str, value: &str) {
    if !value.is_empty() {
        attrs.push(format!("{name}=\"{value}\""));
    }
}

/// Returns the record title for `event`.
pub fn render_title(event: &Event) -> String {
    let title = event.summary.trim();
    if title.is_empty() {
        UNTITLED_EVENT.to_string()
    } else {
        title.to_string()
    }
}

/// Escapes a value for use inside a quoted attribute.
///
/// Quotes become `\"`, CR and LF become spaces, and the result is trimmed.
pub fn escape_attr(value: &str) -> String {
    value
        .replace('"', "\\\"")
        .replace(['\r', '\n'], " ")
        .trim()
        .to_string()
}

/// Reads the UID back out of a rendered body.
///
/// The real marker is always the last one; a description may carry copies.
pub fn parse_uid_marker(body: &str) -> Option<String> {
    UID_MARKER_REGEX
        .captures_iter(body)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().replace("\\\"", "\""))
        .filter(|uid| !uid.is_empty())
}
