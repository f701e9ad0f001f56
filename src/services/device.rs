//! User-agent device classification
//!
//! A stateless pure function over woothee. The derived (family, kind) pair
//! is stored on every event and doubles as a dedup comparison key, so it has
//! to be deterministic and cheap enough to run on every tracking hit.

use woothee::parser::Parser;

/// Coarse device fingerprint derived from a raw user-agent string
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    /// Human-readable composite of vendor/OS/browser tokens,
    /// e.g. "Apple iPhone Safari". None when nothing was parseable.
    pub family: Option<String>,
    /// "desktop", "mobile", "bot" or "other". None when undetermined.
    pub kind: Option<String>,
}

impl DeviceInfo {
    /// True when the fingerprint carries any signal at all.
    /// Two blank fingerprints are not considered a device match.
    pub fn is_identifiable(&self) -> bool {
        self.family.is_some() || self.kind.is_some()
    }
}

/// Classify a raw user-agent string into a coarse device fingerprint.
pub fn classify_user_agent(user_agent: Option<&str>) -> DeviceInfo {
    let Some(ua) = user_agent.filter(|ua| !ua.is_empty()) else {
        return DeviceInfo::default();
    };

    let parser = Parser::new();
    let result = parser.parse(ua).unwrap_or_default();

    let tokens: Vec<&str> = [result.vendor, result.os, result.name]
        .into_iter()
        .filter(|t| !t.is_empty() && *t != "UNKNOWN")
        .collect();

    let family = if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" "))
    };

    let kind = match result.category {
        "pc" => Some("desktop"),
        "smartphone" | "mobilephone" => Some("mobile"),
        "crawler" => Some("bot"),
        "appliance" | "misc" => Some("other"),
        _ => None,
    }
    .map(String::from);

    DeviceInfo { family, kind }
}
