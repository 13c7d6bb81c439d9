//! Parsing of the request line and of individual header lines.
//!
//! Both functions receive one line with its terminator already removed.

use http::{HeaderName, Method, header};
use tracing::trace;

use crate::codec::{MAX_HEADER_VALUE_LENGTH, MAX_METHOD_LENGTH, MAX_PATH_LENGTH};
use crate::ensure;
use crate::protocol::{ParseError, ProtocolVersion, RequestMessage};

/// Parses `METHOD SP PATH SP HTTP/MAJOR.MINOR` into a fresh request message.
pub(crate) fn parse_request_line(line: &[u8]) -> Result<RequestMessage, ParseError> {
    let mut tokens = line.split(u8::is_ascii_whitespace).filter(|token| !token.is_empty());
    let (Some(method), Some(path), Some(version), None) = (tokens.next(), tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(ParseError::invalid_request_line("expected `METHOD PATH VERSION`"));
    };

    ensure!(method.len() <= MAX_METHOD_LENGTH, ParseError::InvalidMethod);
    let method = Method::from_bytes(method).map_err(|e| {
        trace!(cause = %e, "invalid method token");
        ParseError::InvalidMethod
    })?;

    ensure!(path.len() <= MAX_PATH_LENGTH, ParseError::too_long_path(path.len(), MAX_PATH_LENGTH));
    let path = std::str::from_utf8(path).map_err(|e| ParseError::invalid_request_line(format!("path is not utf-8: {e}")))?;

    let version = parse_version(version)?;
    Ok(RequestMessage::request(method, path, version))
}

fn parse_version(token: &[u8]) -> Result<ProtocolVersion, ParseError> {
    let number = |digits: &[u8]| std::str::from_utf8(digits).ok().and_then(|digits| digits.parse::<u8>().ok());

    let (major, minor) = token
        .strip_prefix(b"HTTP/")
        .and_then(|rest| {
            let dot = rest.iter().position(|b| *b == b'.')?;
            Some((number(&rest[..dot])?, number(&rest[dot + 1..])?))
        })
        .ok_or(ParseError::InvalidVersion(None))?;

    ensure!(major == 1, ParseError::InvalidVersion(Some(major)));
    // HTTP/1.2 and up behave like HTTP/1.1
    Ok(ProtocolVersion { major, minor: minor.min(1) })
}

/// Applies one `KEY: VALUE` line to `message`; unknown keys are ignored.
pub(crate) fn apply_header(message: &mut RequestMessage, line: &[u8]) -> Result<(), ParseError> {
    let colon = line.iter().position(|b| *b == b':').ok_or_else(|| ParseError::invalid_header("missing `:` separator"))?;
    let name = HeaderName::from_bytes(line[..colon].trim_ascii()).map_err(ParseError::invalid_header)?;
    let value = line[colon + 1..].trim_ascii();

    if name == header::CONTENT_LENGTH {
        let content_length = std::str::from_utf8(value).ok().and_then(|value| value.parse::<u64>().ok()).unwrap_or(0);
        message.set_content_length(content_length);
    } else if name == header::CONTENT_TYPE {
        message.set_content_type(bounded_value(&name, value)?);
    } else if name == header::HOST {
        message.set_host(bounded_value(&name, value)?);
    } else if name == header::CONNECTION {
        for option in value.split(|b| *b == b',').map(<[u8]>::trim_ascii) {
            if option.eq_ignore_ascii_case(b"close") {
                message.set_keep_alive(false);
            } else if option.eq_ignore_ascii_case(b"keep-alive") {
                message.set_keep_alive(true);
            }
        }
    } else {
        trace!(header = %name, "ignore header");
    }

    Ok(())
}

fn bounded_value<'a>(name: &HeaderName, value: &'a [u8]) -> Result<&'a str, ParseError> {
    ensure!(
        value.len() <= MAX_HEADER_VALUE_LENGTH,
        ParseError::invalid_header(format!("{name} value exceeds {MAX_HEADER_VALUE_LENGTH} bytes"))
    );
    std::str::from_utf8(value).map_err(|e| ParseError::invalid_header(format!("{name} value is not utf-8: {e}")))
}
