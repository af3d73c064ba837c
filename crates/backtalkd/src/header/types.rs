//! Value types produced by the header parser.

use std::fmt;
use std::str::FromStr;

use super::errors::HeaderError;
use super::parser;

/// Protocol name every handshake line starts with.
pub const PROTOCOL_NAME: &str = "backtalk";

/// Value recorded for options written as a bare key.
pub const PRESENT_VALUE: &str = "_present_";

/// Parsed handshake header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub(super) protocol: ProtocolVersion,
    pub(super) service: String,
    pub(super) service_version: ServiceVersion,
    pub(super) options: Vec<HeaderOption>,
}

impl Header {
    /// Parses one handshake line, without its trailing newline.
    ///
    /// # Errors
    ///
    /// Returns the [`HeaderError`] for the first token that fails validation.
    pub fn parse(line: &str) -> Result<Self, HeaderError> {
        parser::parse_header(line)
    }

    /// Protocol version requested by the peer.
    #[must_use]
    pub const fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    /// Requested service name, as sent.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Requested service version.
    #[must_use]
    pub const fn service_version(&self) -> &ServiceVersion {
        &self.service_version
    }

    /// Options in the order they were sent.
    #[must_use]
    pub fn options(&self) -> &[HeaderOption] {
        &self.options
    }

    /// Number of options carried by the header.
    #[must_use]
    pub const fn option_count(&self) -> usize {
        self.options.len()
    }

    /// Value of the first option named `key`.
    #[must_use]
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|option| option.key == key)
            .map(HeaderOption::value)
    }
}

impl FromStr for Header {
    type Err = HeaderError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        Self::parse(line)
    }
}

impl fmt::Display for Header {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{PROTOCOL_NAME}/{} {} {}",
            self.protocol, self.service, self.service_version
        )?;
        if self.options.is_empty() {
            return Ok(());
        }
        formatter.write_str(" (")?;
        for (index, option) in self.options.iter().enumerate() {
            if index > 0 {
                formatter.write_str(";")?;
            }
            write!(formatter, "{option}")?;
        }
        formatter.write_str(")")
    }
}

/// `<major>.<minor>` protocol revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtocolVersion {
    /// Major revision.
    pub major: u32,
    /// Minor revision.
    pub minor: u32,
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}.{}", self.major, self.minor)
    }
}

/// Release qualifier appended to a service version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Qualifier {
    /// `-RELEASE`
    Release,
    /// `-SNAPSHOT`
    Snapshot,
}

impl Qualifier {
    pub(super) fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "RELEASE" => Some(Self::Release),
            "SNAPSHOT" => Some(Self::Snapshot),
            _ => None,
        }
    }

    /// Suffix text without the leading dash.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Release => "RELEASE",
            Self::Snapshot => "SNAPSHOT",
        }
    }
}

/// Dotted numeric service version.
///
/// The original text is kept because registry lookups compare versions as
/// strings: `1.0` and `01.0` name different registrations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceVersion {
    pub(super) text: String,
    pub(super) major: u32,
    pub(super) minor: u32,
    pub(super) patch: Option<u32>,
    pub(super) qualifier: Option<Qualifier>,
}

impl ServiceVersion {
    /// Version text exactly as it appeared on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Major component.
    #[must_use]
    pub const fn major(&self) -> u32 {
        self.major
    }

    /// Minor component.
    #[must_use]
    pub const fn minor(&self) -> u32 {
        self.minor
    }

    /// Optional patch component.
    #[must_use]
    pub const fn patch(&self) -> Option<u32> {
        self.patch
    }

    /// Optional release qualifier.
    #[must_use]
    pub const fn qualifier(&self) -> Option<Qualifier> {
        self.qualifier
    }
}

impl fmt::Display for ServiceVersion {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.text)
    }
}

/// One entry of the parenthesised option list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeaderOption {
    key: String,
    value: String,
}

impl HeaderOption {
    /// Builds a `key=value` option.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Builds a bare-key option carrying [`PRESENT_VALUE`].
    #[must_use]
    pub fn flag(key: impl Into<String>) -> Self {
        Self::new(key, PRESENT_VALUE)
    }

    /// Option key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Option value, [`PRESENT_VALUE`] for bare keys.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns `true` when the option was sent as a bare key.
    #[must_use]
    pub fn is_flag(&self) -> bool {
        self.value == PRESENT_VALUE
    }
}

impl fmt::Display for HeaderOption {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_flag() {
            formatter.write_str(&self.key)
        } else {
            write!(formatter, "{}={}", self.key, self.value)
        }
    }
}
