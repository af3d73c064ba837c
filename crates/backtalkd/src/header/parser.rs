//! Token-by-token validation of a handshake line.

use super::errors::HeaderError;
use super::types::{Header, HeaderOption, PROTOCOL_NAME, ProtocolVersion, Qualifier, ServiceVersion};

pub(super) fn parse_header(line: &str) -> Result<Header, HeaderError> {
    let mut tokens = split_tokens(line).into_iter();

    let protocol = parse_protocol(tokens.next().unwrap_or_default())?;
    let service = tokens
        .next()
        .ok_or(HeaderError::IncompleteHeader)
        .and_then(parse_service)?;
    let service_version = tokens
        .next()
        .ok_or(HeaderError::MissingServiceVersion)
        .and_then(parse_service_version)?;
    let options = tokens
        .next()
        .map(parse_options)
        .transpose()?
        .unwrap_or_default();

    Ok(Header {
        protocol,
        service,
        service_version,
        options,
    })
}

/// Splits on single spaces. Interior empty tokens survive so a doubled space
/// corrupts the following field; trailing ones are dropped.
fn split_tokens(line: &str) -> Vec<&str> {
    let mut tokens = line.split(' ').collect::<Vec<_>>();
    while tokens.last().is_some_and(|token| token.is_empty()) {
        tokens.pop();
    }
    tokens
}

fn parse_protocol(token: &str) -> Result<ProtocolVersion, HeaderError> {
    let Some(rest) = token.strip_prefix(PROTOCOL_NAME) else {
        return Err(HeaderError::MissingProtocol);
    };
    let (major, minor) = rest
        .strip_prefix('/')
        .and_then(|version| version.split_once('.'))
        .ok_or(HeaderError::BadProtocolVersion)?;
    match (parse_number(major), parse_number(minor)) {
        (Some(major), Some(minor)) => Ok(ProtocolVersion { major, minor }),
        _ => Err(HeaderError::BadProtocolVersion),
    }
}

fn parse_service(token: &str) -> Result<String, HeaderError> {
    if !token.is_empty() && token.chars().all(is_word_char) {
        Ok(token.to_owned())
    } else {
        Err(HeaderError::MissingService)
    }
}

fn parse_service_version(token: &str) -> Result<ServiceVersion, HeaderError> {
    let (numeric, qualifier) = match token.split_once('-') {
        Some((numeric, suffix)) => (
            numeric,
            Some(Qualifier::from_suffix(suffix).ok_or(HeaderError::BadServiceVersion)?),
        ),
        None => (token, None),
    };

    let components = numeric
        .split('.')
        .map(parse_number)
        .collect::<Option<Vec<_>>>()
        .ok_or(HeaderError::BadServiceVersion)?;
    let (major, minor, patch) = match components.as_slice() {
        [major, minor] => (*major, *minor, None),
        [major, minor, patch] => (*major, *minor, Some(*patch)),
        _ => return Err(HeaderError::BadServiceVersion),
    };

    Ok(ServiceVersion {
        text: token.to_owned(),
        major,
        minor,
        patch,
        qualifier,
    })
}

fn parse_options(token: &str) -> Result<Vec<HeaderOption>, HeaderError> {
    let interior = token
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .filter(|interior| !interior.is_empty() && interior.chars().all(is_graphic))
        .ok_or(HeaderError::BadOptionSpecification)?;
    interior.split(';').map(parse_option).collect()
}

fn parse_option(piece: &str) -> Result<HeaderOption, HeaderError> {
    match piece.split_once('=') {
        Some((key, value)) if is_option_key(key) && is_option_value(value) => {
            Ok(HeaderOption::new(key, value))
        }
        None if is_option_key(piece) => Ok(HeaderOption::flag(piece)),
        _ => Err(HeaderError::BadOptionSpecification),
    }
}

/// ASCII digits only, and small enough for `u32`.
fn parse_number(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

const fn is_word_char(character: char) -> bool {
    character.is_ascii_alphanumeric() || character == '_'
}

fn is_graphic(character: char) -> bool {
    !character.is_whitespace() && !character.is_control()
}

fn is_option_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|character| is_graphic(character) && !character.is_ascii_punctuation())
}

fn is_option_value(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|character| is_graphic(character) && character != ';')
}
