//! Output sanitization.
//!
//! Bastion menus decorate their output heavily: colored prompts, cursor
//! repositioning, window-title updates, bells. Everything the driver matches
//! on must first pass through [`sanitize`], which strips ANSI/VT escape
//! sequences and non-printing control characters, leaving printable text and
//! explicit line breaks. The transform is pure and safe to apply to text
//! that is already clean.

use std::borrow::Cow;

/// Strip ANSI escape sequences from text.
///
/// Removes all ANSI control sequences (CSI, OSC, charset designation, and
/// simple two-byte escapes) from the input. Returns a borrowed slice when
/// there is nothing to strip.
#[must_use]
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    // Menu rows are mostly plain; skip allocation when no ESC is present.
    if !text.contains('\x1b') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            // CSI: parameter bytes, then one final byte
            Some('[') => {
                chars.next();
                while let Some(&p) = chars.peek() {
                    chars.next();
                    if p.is_ascii_alphabetic() || p == '@' || p == '`' {
                        break;
                    }
                }
            }
            // OSC (window titles etc.): runs until BEL or ST
            Some(']') => {
                chars.next();
                while let Some(t) = chars.next() {
                    if t == '\x07' {
                        break;
                    }
                    if t == '\x1b' {
                        if chars.peek() == Some(&'\\') {
                            chars.next();
                        }
                        break;
                    }
                }
            }
            // Charset designation carries one more byte
            Some('(' | ')' | '*' | '+') => {
                chars.next();
                chars.next();
            }
            // Two-byte escapes (keypad modes, index, reset)
            Some(&n) if n.is_ascii_uppercase() || n == '=' || n == '>' => {
                chars.next();
            }
            // Bare or unrecognized ESC: drop it
            _ => {}
        }
    }

    Cow::Owned(out)
}

/// Sanitize one inbound chunk before it is appended to the output buffer.
///
/// Strips escape sequences, then drops remaining control characters other
/// than `\n`, `\r`, and `\t` (bells, backspaces, and similar leak through
/// menus that redraw in place).
#[must_use]
pub fn sanitize(text: &str) -> Cow<'_, str> {
    let stripped = strip_ansi(text);

    let needs_filter = stripped
        .chars()
        .any(|c| c.is_control() && c != '\n' && c != '\r' && c != '\t');
    if !needs_filter {
        return stripped;
    }

    Cow::Owned(
        stripped
            .chars()
            .filter(|&c| !c.is_control() || c == '\n' || c == '\r' || c == '\t')
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_ansi_csi() {
        let text = "\x1b[32mgreen\x1b[0m text";
        let result = strip_ansi(text);
        assert_eq!(result, "green text");
    }

    #[test]
    fn strip_ansi_no_escape() {
        let text = "plain text";
        let result = strip_ansi(text);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, "plain text");
    }

    #[test]
    fn strip_ansi_osc() {
        let text = "\x1b]0;Window Title\x07normal text";
        let result = strip_ansi(text);
        assert_eq!(result, "normal text");
    }

    #[test]
    fn sanitize_keeps_line_breaks() {
        let text = "row1\r\nrow2\n\x07\x08row3";
        let result = sanitize(text);
        assert_eq!(result, "row1\r\nrow2\nrow3");
    }

    #[test]
    fn sanitize_clean_text_is_borrowed() {
        let text = "1) web-01 10.0.0.1\n[Host]>";
        let result = sanitize(text);
        assert!(matches!(result, Cow::Borrowed(_)));
    }

    #[test]
    fn sanitize_colored_prompt() {
        let text = "\x1b[1;32m[Host]>\x1b[0m ";
        assert_eq!(sanitize(text), "[Host]> ");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let text = "\x1b[2J\x1b[Hmenu\n1) item\x07\nOpt> ";
        let once = sanitize(text).into_owned();
        let twice = sanitize(&once).into_owned();
        assert_eq!(once, twice);
    }

    proptest::proptest! {
        #[test]
        fn sanitize_output_has_no_escapes(input in "\\PC{0,64}") {
            let out = sanitize(&input);
            proptest::prop_assert!(!out.contains('\x1b'));
        }

        #[test]
        fn sanitize_idempotent_on_arbitrary_input(input in ".{0,64}") {
            let once = sanitize(&input).into_owned();
            let twice = sanitize(&once).into_owned();
            proptest::prop_assert_eq!(once, twice);
        }
    }
}
