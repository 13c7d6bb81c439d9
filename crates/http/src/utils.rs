//! Utility macros and functions for the HTTP crate.
//!
//! This module provides helper macros and functions that are used internally
//! by the HTTP crate implementation.

/// A macro for early returns with an error if a condition is not met.
///
/// This is similar to the `assert!` macro, but returns an error instead of panicking.
///
/// # Example
///
/// ```ignore
/// ensure!(path.len() <= MAX_PATH_LENGTH, ParseError::too_long_path(path.len(), MAX_PATH_LENGTH));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;

/// Returns the offset of the first occurrence of `needle` in `haystack`.
pub(crate) fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    let (&first, rest) = needle.split_first()?;
    let mut offset = 0;
    while haystack.len() - offset >= needle.len() {
        let at = haystack[offset..=haystack.len() - needle.len()].iter().position(|b| *b == first)?;
        let start = offset + at;
        if &haystack[start + 1..start + needle.len()] == rest {
            return Some(start);
        }
        offset = start + 1;
    }
    None
}

/// Strips one trailing `\r\n` or `\n`, returning `None` when the line has no terminator.
pub(crate) fn strip_line_terminator(line: &[u8]) -> Option<&[u8]> {
    line.strip_suffix(b"\r\n").or_else(|| line.strip_suffix(b"\n"))
}

/// Returns the offset just past the first blank line, where lines end in `\r\n` or `\n`.
pub(crate) fn find_blank_line_end(buf: &[u8]) -> Option<usize> {
    let mut offset = 0;
    while let Some(at) = buf[offset..].iter().position(|b| *b == b'\n') {
        let next = offset + at + 1;
        let rest = &buf[next..];
        if rest.starts_with(b"\n") {
            return Some(next + 1);
        }
        if rest.starts_with(b"\r\n") {
            return Some(next + 2);
        }
        offset = next;
    }
    None
}
