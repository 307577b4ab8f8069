//! User agent parsing for request context.
//!
//! Browser, operating system and device are parsed with the `uaparser` crate
//! against the rule set bundled in `regexes.yaml`. Rendering engines are not
//! covered by that format and are detected from well-known product tokens.
//!
//! Parsing never fails: an absent, unknown or garbled user agent produces a
//! [`ClientInfo`] with empty fields.

use once_cell::sync::Lazy;
use serde::Serialize;
use thiserror::Error;
use uaparser::{Parser, UserAgentParser};

/// Family name `uaparser` reports when no rule matched.
const UNKNOWN_FAMILY: &str = "Other";

static UA_PARSER: Lazy<Result<UserAgentParser, RulesError>> =
    Lazy::new(|| load_rules(include_bytes!("regexes.yaml")));

/// The bundled user agent rules could not be compiled.
///
/// Parsing stays silent in that case and yields client info with only the
/// raw agent and engine filled in; [`init_parser`] surfaces the cause.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("user agent rules failed to load: {0}")]
pub struct RulesError(String);

fn load_rules(rules: &[u8]) -> Result<UserAgentParser, RulesError> {
    UserAgentParser::builder()
        .with_unicode_support(false)
        .build_from_bytes(rules)
        .map_err(|err| RulesError(err.to_string()))
}

/// Compile the user agent rules ahead of the first request.
///
/// Compilation otherwise happens lazily on first use, which adds latency to
/// whichever request triggers it.
pub fn init_parser() -> Result<(), RulesError> {
    Lazy::force(&UA_PARSER).as_ref().map(|_| ()).map_err(Clone::clone)
}

/// Name and version of a client component.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Component {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Component {
    fn new(name: Option<&str>, version: Option<String>) -> Self {
        let name = name.filter(|n| !n.is_empty() && *n != UNKNOWN_FAMILY);
        Self {
            version: name.and(version),
            name: name.map(str::to_owned),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.version.is_none()
    }
}

/// Hardware the client runs on.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Device {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Device {
    pub fn is_empty(&self) -> bool {
        self.vendor.is_none() && self.model.is_none()
    }
}

/// Structured identification of the requesting client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    /// Raw user agent string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ua: Option<String>,
    #[serde(skip_serializing_if = "Component::is_empty")]
    pub browser: Component,
    #[serde(skip_serializing_if = "Component::is_empty")]
    pub engine: Component,
    #[serde(skip_serializing_if = "Component::is_empty")]
    pub os: Component,
    #[serde(skip_serializing_if = "Device::is_empty")]
    pub device: Device,
}

impl ClientInfo {
    /// Parse a user agent header value.
    pub fn parse(user_agent: Option<&str>) -> Self {
        let Some(ua) = user_agent.map(str::trim).filter(|ua| !ua.is_empty()) else {
            return Self::default();
        };
        let mut info = Self {
            ua: Some(ua.to_owned()),
            engine: detect_engine(ua),
            ..Self::default()
        };
        let Ok(parser) = UA_PARSER.as_ref() else {
            return info;
        };

        let client = parser.parse_user_agent(ua);
        let family: &str = &client.family;
        info.browser = Component::new(
            Some(family),
            join_version(&[
                client.major.as_deref(),
                client.minor.as_deref(),
                client.patch.as_deref(),
            ]),
        );

        let os = parser.parse_os(ua);
        let family: &str = &os.family;
        info.os = Component::new(
            Some(family),
            join_version(&[os.major.as_deref(), os.minor.as_deref(), os.patch.as_deref()]),
        );

        let device = parser.parse_device(ua);
        info.device = Device {
            vendor: device
                .brand
                .as_deref()
                .filter(|b| !b.is_empty())
                .map(str::to_owned),
            model: device
                .model
                .as_deref()
                .filter(|m| !m.is_empty())
                .map(str::to_owned),
        };
        info
    }

    pub fn is_empty(&self) -> bool {
        self.ua.is_none()
    }
}

fn join_version(parts: &[Option<&str>]) -> Option<String> {
    let parts: Vec<&str> = parts
        .iter()
        .map_while(|p| p.filter(|s| !s.is_empty()))
        .collect();
    (!parts.is_empty()).then(|| parts.join("."))
}

/// Product tokens identifying rendering engines, most specific first.
///
/// Each entry is `(marker, engine name, token whose version is reported)`.
const ENGINE_TOKENS: &[(&str, &str, &str)] = &[
    ("Trident/", "Trident", "Trident/"),
    ("Edge/", "EdgeHTML", "Edge/"),
    ("Presto/", "Presto", "Presto/"),
    ("Chrome/", "Blink", "Chrome/"),
    ("CriOS/", "WebKit", "AppleWebKit/"),
    ("AppleWebKit/", "WebKit", "AppleWebKit/"),
    ("Gecko/", "Gecko", "rv:"),
];

fn detect_engine(ua: &str) -> Component {
    ENGINE_TOKENS
        .iter()
        .find(|(marker, _, _)| ua.contains(*marker))
        .map(|&(_, engine, version_token)| {
            Component::new(Some(engine), version_after(ua, version_token))
        })
        .unwrap_or_default()
}

fn version_after(ua: &str, token: &str) -> Option<String> {
    let start = ua.find(token)? + token.len();
    let version: String = ua[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let version = version.trim_end_matches('.');
    (!version.is_empty()).then(|| version.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use logtest::Logger;
    use rstest::rstest;

    const FIREFOX_MAC: &str =
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:109.0) Gecko/20100101 Firefox/109.0";
    const CHROME_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                                  (KHTML, like Gecko) Chrome/120.0.6099.109 Safari/537.36";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1_2 like Mac OS X) \
                                 AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1.2 \
                                 Mobile/15E148 Safari/604.1";

    #[rstest]
    fn parses_firefox_on_mac() {
        let info = ClientInfo::parse(Some(FIREFOX_MAC));
        assert_eq!(info.browser.name.as_deref(), Some("Firefox"));
        assert_eq!(info.browser.version.as_deref(), Some("109.0"));
        assert_eq!(info.engine.name.as_deref(), Some("Gecko"));
        assert_eq!(info.engine.version.as_deref(), Some("109.0"));
        assert_eq!(info.os.name.as_deref(), Some("Mac OS X"));
        assert_eq!(info.device.vendor.as_deref(), Some("Apple"));
    }

    #[rstest]
    fn parses_chrome_on_windows() {
        let info = ClientInfo::parse(Some(CHROME_WINDOWS));
        assert_eq!(info.browser.name.as_deref(), Some("Chrome"));
        assert_eq!(info.browser.version.as_deref(), Some("120.0.6099"));
        assert_eq!(info.engine.name.as_deref(), Some("Blink"));
        assert_eq!(info.os.name.as_deref(), Some("Windows"));
        assert_eq!(info.os.version.as_deref(), Some("10"));
        assert!(info.device.is_empty());
    }

    #[rstest]
    fn parses_mobile_safari() {
        let info = ClientInfo::parse(Some(SAFARI_IPHONE));
        assert_eq!(info.browser.name.as_deref(), Some("Mobile Safari"));
        assert_eq!(info.os.name.as_deref(), Some("iOS"));
        assert_eq!(info.os.version.as_deref(), Some("17.1.2"));
        assert_eq!(info.engine.name.as_deref(), Some("WebKit"));
        assert_eq!(info.device.model.as_deref(), Some("iPhone"));
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    #[case(Some("   "))]
    fn absent_user_agent_is_empty(#[case] ua: Option<&str>) {
        assert_eq!(ClientInfo::parse(ua), ClientInfo::default());
    }

    #[rstest]
    fn garbage_user_agent_yields_empty_fields() {
        let info = ClientInfo::parse(Some("%%% not a browser %%%"));
        assert_eq!(info.ua.as_deref(), Some("%%% not a browser %%%"));
        assert!(info.browser.is_empty());
        assert!(info.engine.is_empty());
        assert!(info.os.is_empty());
        assert!(info.device.is_empty());
    }

    #[rstest]
    fn bundled_rules_compile() {
        assert_eq!(init_parser(), Ok(()));
    }

    #[rstest]
    fn broken_rules_fail_without_logging() {
        let mut logger = Logger::start();
        while logger.pop().is_some() {}

        let Err(err) = load_rules(b"user_agent_parsers: [[[") else {
            panic!("malformed rules compiled");
        };

        assert!(err.to_string().starts_with("user agent rules failed to load"));
        let mut records = Vec::new();
        while let Some(record) = logger.pop() {
            if record.target().starts_with("logtree::client_info") {
                records.push(record.args().to_owned());
            }
        }
        assert!(records.is_empty(), "unexpected records: {records:?}");
    }

    #[rstest]
    #[case("Chrome/120.0.1 Safari", "Chrome/", Some("120.0.1"))]
    #[case("rv:109.0) Gecko", "rv:", Some("109.0"))]
    #[case("Trident/.", "Trident/", None)]
    #[case("nothing here", "Chrome/", None)]
    fn version_after_token(#[case] ua: &str, #[case] token: &str, #[case] expected: Option<&str>) {
        assert_eq!(version_after(ua, token).as_deref(), expected);
    }
}
