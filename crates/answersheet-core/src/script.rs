//! Instruction file parsing.
//!
//! One action per line; blank lines and `#` comments are dropped, the rest is
//! split on whitespace. Argument counts are not enforced here: a short line
//! becomes [`Action::Malformed`] and only fails once the run driver reaches it.
//!
//! ```text
//! # comment
//! cookies <base64 of "name=value; name2=value2">
//! save-pdf <url> <ignored> <studentId>/<filename>.pdf
//! ```

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use thiserror::Error;

/// Action kind that replaces the current cookie header.
pub const COOKIES: &str = "cookies";
/// Action kind that renders a URL to a PDF.
pub const SAVE_PDF: &str = "save-pdf";

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("line {line}: malformed `{kind}` instruction: {reason}")]
    Malformed {
        line: usize,
        kind: String,
        reason: &'static str,
    },
    #[error("cookie value is not valid base64")]
    CookieBase64(#[from] base64::DecodeError),
    #[error("decoded cookie header is not valid UTF-8")]
    CookieUtf8(#[from] std::string::FromUtf8Error),
}

/// One parsed instruction line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Base64-encoded cookie header applied to every later `save-pdf`.
    Cookies { encoded: String },
    /// Render `url` and save it under the identifier derived from `relative_path`.
    SavePdf { url: String, relative_path: String },
    /// Known kind with missing arguments (1-based `line`).
    Malformed {
        line: usize,
        kind: String,
        reason: &'static str,
    },
    /// Any other kind; ignored.
    Other { kind: String },
}

impl Action {
    fn from_tokens(line: usize, tokens: &[&str]) -> Action {
        let kind = tokens[0];
        let malformed = |reason: &'static str| Action::Malformed {
            line,
            kind: kind.to_string(),
            reason,
        };
        match kind {
            COOKIES => match tokens.get(1) {
                Some(encoded) => Action::Cookies {
                    encoded: encoded.to_string(),
                },
                None => malformed("missing cookie value"),
            },
            // save-pdf <url> <ignored> <relative path>
            SAVE_PDF => match (tokens.get(1), tokens.get(3)) {
                (Some(url), Some(relative_path)) => Action::SavePdf {
                    url: url.to_string(),
                    relative_path: relative_path.to_string(),
                },
                (None, _) => malformed("missing url"),
                (Some(_), None) => malformed("missing output path"),
            },
            other => Action::Other {
                kind: other.to_string(),
            },
        }
    }

    /// Surfaces a deferred parse failure.
    pub fn check(&self) -> Result<(), ScriptError> {
        match self {
            Action::Malformed { line, kind, reason } => Err(ScriptError::Malformed {
                line: *line,
                kind: kind.clone(),
                reason: *reason,
            }),
            _ => Ok(()),
        }
    }
}

/// Parses instruction text into actions in file order.
pub fn parse_script(text: &str) -> Vec<Action> {
    let normalized = text.replace("\r\n", "\n");
    normalized
        .split(['\n', '\r'])
        .enumerate()
        .filter_map(|(idx, raw)| {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            Some(Action::from_tokens(idx + 1, &tokens))
        })
        .collect()
}

/// Standard alphabet, padding optional, trailing bits tolerated.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decodes the payload of a `cookies` action into a `Cookie` header string.
///
/// Accepts both the standard and the URL-safe alphabet, with or without padding.
pub fn decode_cookie_header(encoded: &str) -> Result<String, ScriptError> {
    let standard: String = encoded
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    let bytes = LENIENT.decode(standard)?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_blank_and_comment_lines() {
        let actions = parse_script("\n# x\n\ncookies Zm9v\n");
        assert_eq!(
            actions,
            vec![Action::Cookies {
                encoded: "Zm9v".to_string()
            }]
        );
    }

    #[test]
    fn handles_crlf_and_extra_whitespace() {
        let text = "  cookies   abc  \r\n\tsave-pdf  https://x/a  q   1/r.pdf \r\n";
        let actions = parse_script(text);
        assert_eq!(actions.len(), 2);
        assert_eq!(
            actions[1],
            Action::SavePdf {
                url: "https://x/a".to_string(),
                relative_path: "1/r.pdf".to_string(),
            }
        );
    }

    #[test]
    fn parse_is_idempotent_on_normalized_input() {
        let text = "cookies Zm9v\nsave-pdf https://x/a q 1/r.pdf\n";
        assert_eq!(parse_script(text), parse_script(&normalize(text)));
    }

    fn normalize(text: &str) -> String {
        text.lines()
            .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn lone_carriage_returns_split_lines() {
        let actions = parse_script("cookies a\rcookies b\r");
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn unknown_kinds_are_kept_as_other() {
        let actions = parse_script("save-file https://x/a q 1/r.zip\n");
        assert_eq!(
            actions,
            vec![Action::Other {
                kind: "save-file".to_string()
            }]
        );
        assert!(actions[0].check().is_ok());
    }

    #[test]
    fn short_lines_become_malformed_with_line_number() {
        let actions = parse_script("# header\ncookies\nsave-pdf https://x/a q\n");
        assert!(matches!(actions[0], Action::Malformed { line: 2, .. }));
        assert!(matches!(
            actions[1],
            Action::Malformed {
                line: 3,
                reason: "missing output path",
                ..
            }
        ));
        let err = actions[1].check().unwrap_err();
        assert!(err.to_string().starts_with("line 3:"));
    }

    #[test]
    fn empty_or_comment_only_text_yields_nothing() {
        assert!(parse_script("").is_empty());
        assert!(parse_script("# only\n   \n#another").is_empty());
    }

    #[test]
    fn decode_cookie_header_roundtrip() {
        assert_eq!(decode_cookie_header("c2lkPWFiYzEyMw==").unwrap(), "sid=abc123");
        assert!(matches!(
            decode_cookie_header("not base64!"),
            Err(ScriptError::CookieBase64(_))
        ));
    }

    #[test]
    fn decode_cookie_header_without_padding() {
        assert_eq!(decode_cookie_header("c2lkPWFiYzEyMw").unwrap(), "sid=abc123");
    }

    #[test]
    fn decode_cookie_header_url_safe_alphabet() {
        // "a>?b" is "YT4/Yg==" in the standard alphabet
        assert_eq!(decode_cookie_header("YT4_Yg").unwrap(), "a>?b");
        assert_eq!(decode_cookie_header("YT4/Yg==").unwrap(), "a>?b");
        // "~~~" is "fn5+" in the standard alphabet
        assert_eq!(decode_cookie_header("fn5-").unwrap(), "~~~");
    }
}
