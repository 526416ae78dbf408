//! Line protocol of the out-of-band control port.
//!
//! Operators (or scripts) connect to the control port and send one command
//! per line:
//!
//! ```text
//! r /tmp/spacewar.rim      mount a tape image in the reader
//! r "my tapes/lisp.rim"    quoted paths may contain spaces
//! r                        unmount the reader
//! p /tmp/out.bin           punch command (accepted, currently no effect)
//! ```
//!
//! [`tokenize`] splits a line into words; [`ControlCommand::parse`] turns the
//! words into a typed command.

use thiserror::Error;

/// Errors produced while parsing a control line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    /// The first word is not a known command.
    #[error("unknown control command: {0:?}")]
    UnknownCommand(String),
}

/// A parsed control-port command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// `r <path>`: load the file at `path` into the reader.
    MountReader { path: String },
    /// `r`: remove the tape from the reader.
    UnmountReader,
    /// `p [path]`: punch command; parsed but has no effect.
    Punch { path: Option<String> },
}

impl ControlCommand {
    /// Parses one control line.
    ///
    /// Returns `Ok(None)` for a blank line.  Words after the first argument
    /// are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownCommand`] when the first word is not
    /// `r` or `p`.
    pub fn parse(line: &str) -> Result<Option<Self>, ControlError> {
        let mut words = tokenize(line).into_iter();
        let Some(command) = words.next() else {
            return Ok(None);
        };
        let argument = words.next();

        match command.as_str() {
            "r" => Ok(Some(match argument {
                Some(path) => ControlCommand::MountReader { path },
                None => ControlCommand::UnmountReader,
            })),
            "p" => Ok(Some(ControlCommand::Punch { path: argument })),
            _ => Err(ControlError::UnknownCommand(command)),
        }
    }
}

/// Splits a control line into words.
///
/// Words are separated by whitespace.  A word that starts with `"` or `'`
/// extends to the next occurrence of that same quote character and may
/// contain whitespace and the other quote character; the quotes themselves
/// are not part of the word.  An unterminated quote takes the rest of the
/// line.  Trailing `\r`/`\n` are treated as whitespace.
///
/// # Examples
///
/// ```rust
/// use pdp1_core::protocol::control::tokenize;
///
/// assert_eq!(tokenize(r#"r "my file.bin""#), vec!["r", "my file.bin"]);
/// assert_eq!(tokenize("p 'a b' c"), vec!["p", "a b", "c"]);
/// ```
pub fn tokenize(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let Some(first) = chars.next() else {
            break;
        };

        let mut word = String::new();
        if first == '"' || first == '\'' {
            for c in chars.by_ref() {
                if c == first {
                    break;
                }
                word.push(c);
            }
        } else {
            word.push(first);
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                word.push(c);
            }
        }
        words.push(word);
    }

    words
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_plain_words() {
        assert_eq!(tokenize("r  /tmp/tape.rim\t x"), vec!["r", "/tmp/tape.rim", "x"]);
    }

    #[test]
    fn test_tokenize_double_quoted_span() {
        assert_eq!(tokenize(r#"r "my file.bin""#), vec!["r", "my file.bin"]);
    }

    #[test]
    fn test_tokenize_single_quoted_span_followed_by_word() {
        assert_eq!(tokenize("p 'a b' c"), vec!["p", "a b", "c"]);
    }

    #[test]
    fn test_tokenize_unterminated_quote_takes_rest_of_line() {
        assert_eq!(tokenize(r#"r "abc"#), vec!["r", "abc"]);
        assert_eq!(tokenize("r 'a b  c"), vec!["r", "a b  c"]);
    }

    #[test]
    fn test_tokenize_other_quote_is_literal_inside_span() {
        assert_eq!(tokenize(r#"r "it's here""#), vec!["r", "it's here"]);
    }

    #[test]
    fn test_tokenize_strips_line_terminators() {
        assert_eq!(tokenize("r tape.rim\r\n"), vec!["r", "tape.rim"]);
    }

    #[test]
    fn test_tokenize_blank_line_is_empty() {
        assert!(tokenize("   \r\n").is_empty());
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_parse_mount_with_path() {
        // Act
        let cmd = ControlCommand::parse(r#"r "/tmp/my tape.rim""#).unwrap();

        // Assert
        assert_eq!(
            cmd,
            Some(ControlCommand::MountReader {
                path: "/tmp/my tape.rim".to_string()
            })
        );
    }

    #[test]
    fn test_parse_bare_r_is_unmount() {
        assert_eq!(
            ControlCommand::parse("r\n").unwrap(),
            Some(ControlCommand::UnmountReader)
        );
    }

    #[test]
    fn test_parse_punch_with_and_without_path() {
        assert_eq!(
            ControlCommand::parse("p out.bin").unwrap(),
            Some(ControlCommand::Punch {
                path: Some("out.bin".to_string())
            })
        );
        assert_eq!(
            ControlCommand::parse("p").unwrap(),
            Some(ControlCommand::Punch { path: None })
        );
    }

    #[test]
    fn test_parse_blank_line_is_none() {
        assert_eq!(ControlCommand::parse("  ").unwrap(), None);
    }

    #[test]
    fn test_parse_unknown_command_is_error() {
        assert_eq!(
            ControlCommand::parse("x 1"),
            Err(ControlError::UnknownCommand("x".to_string()))
        );
    }
}
