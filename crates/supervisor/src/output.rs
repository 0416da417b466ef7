// SPDX-License-Identifier: MIT

//! Per-chunk output handling: split on newlines, strip trailing CR, prefix
//! stderr with `ERROR: `, and detect the SDK reconnection-loop heuristic
//! that should trigger a cooperative restart.

/// Substring match for the SDK's reconnection-loop log line. A substring
/// match, not a regex, is intentionally forgiving of surrounding text.
const CONNECTION_ERROR_MARKER: &str = "Connection was closed, trying to reconnect";

/// Splits a raw chunk into complete lines, stripping a trailing `\r` from
/// each (handles both `\n` and `\r\n` line endings). A trailing partial line
/// with no terminator is dropped — callers are expected to buffer partial
/// chunks themselves if exact byte-for-byte reconstruction across reads
/// matters; for log purposes a line is only meaningful once complete.
pub fn split_lines(chunk: &str) -> Vec<&str> {
    chunk
        .split('\n')
        .enumerate()
        .filter_map(|(i, line)| {
            // the final element after a trailing '\n' is an empty string;
            // drop it. A genuinely incomplete final line (no trailing '\n')
            // is still surfaced — better to show a possibly-truncated line
            // than lose it entirely.
            let is_trailing_empty = line.is_empty() && i == chunk.matches('\n').count();
            if is_trailing_empty {
                None
            } else {
                Some(line.strip_suffix('\r').unwrap_or(line))
            }
        })
        .collect()
}

pub fn prefix_stderr(line: &str, is_stderr: bool) -> String {
    if is_stderr {
        format!("ERROR: {line}")
    } else {
        line.to_string()
    }
}

pub fn is_connection_error_line(line: &str) -> bool {
    line.contains(CONNECTION_ERROR_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_newline_and_strips_cr() {
        let lines = split_lines("first\r\nsecond\nthird\n");
        assert_eq!(lines, vec!["first", "second", "third"]);
    }

    #[test]
    fn keeps_trailing_line_with_no_terminator() {
        let lines = split_lines("partial line no newline");
        assert_eq!(lines, vec!["partial line no newline"]);
    }

    #[test]
    fn stderr_lines_get_error_prefix() {
        assert_eq!(prefix_stderr("boom", true), "ERROR: boom");
        assert_eq!(prefix_stderr("fine", false), "fine");
    }

    #[test]
    fn detects_connection_error_marker() {
        assert!(is_connection_error_line("2024 WARN Connection was closed, trying to reconnect in 1s"));
        assert!(!is_connection_error_line("totally normal log line"));
    }
}
