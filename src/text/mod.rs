use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

/// Matches the CSI escape family `ESC [ <params> <final>` plus the
/// visible-ESC variant (U+241B) tmux emits in certain captures.
fn csi_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:\x1b|\u{241b})\[[0-9;?]*[ -/]*[@-~]").unwrap())
}

/// Matches `[<params>m` remnants left behind when the ESC byte was stripped
/// by an upstream serializer. Restricted to the SGR subset (final byte `m`)
/// so legitimate bracketed text survives.
fn orphan_sgr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[0-9;]*m").unwrap())
}

/// Matches one OSC-8 hyperlink marker, open (`ESC ] 8 ; params ; url ST`)
/// or close (`ESC ] 8 ; ; ST`). The visible link text sits between two
/// markers and is preserved.
fn osc8_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x1b\]8;[^\x07\x1b]*(?:\x07|\x1b\\)").unwrap())
}

/// Removes ANSI CSI sequences from a string.
pub fn strip_ansi(s: &str) -> Cow<'_, str> {
    csi_re().replace_all(s, "")
}

/// Removes ANSI CSI sequences, then orphaned SGR remnants (`[2m`, `[0m`, …)
/// that survive when the ESC byte was already lost upstream.
pub fn strip_ansi_with_orphans(s: &str) -> String {
    let stripped = strip_ansi(s);
    orphan_sgr_re().replace_all(&stripped, "").into_owned()
}

/// Removes OSC-8 hyperlink markers while keeping the visible link text.
pub fn strip_osc8_hyperlinks(s: &str) -> Cow<'_, str> {
    osc8_re().replace_all(s, "")
}

const SEPARATOR_MIN_LEN: usize = 4;

/// True iff the trimmed line is long enough and dominated (more than half of
/// its runes) by horizontal-rule characters: U+2500 box-drawing dashes,
/// ASCII `-`, or `=`.
pub fn is_separator_line(line: &str) -> bool {
    let trimmed = line.trim();
    let total = trimmed.chars().count();
    if total < SEPARATOR_MIN_LEN {
        return false;
    }
    let dashes = trimmed
        .chars()
        .filter(|c| matches!(c, '─' | '-' | '='))
        .count();
    dashes * 2 > total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi_basic() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
        assert_eq!(strip_ansi("plain"), "plain");
        assert_eq!(strip_ansi("\x1b[1;38;5;208mbold\x1b[m"), "bold");
    }

    #[test]
    fn test_strip_ansi_visible_esc_variant() {
        assert_eq!(strip_ansi("\u{241b}[2mdim\u{241b}[0m"), "dim");
    }

    #[test]
    fn test_strip_ansi_idempotent_and_never_longer() {
        let inputs = [
            "\x1b[31mred\x1b[0m",
            "no escapes at all",
            "partial \x1b[12",
            "❯ \x1b[2msuggestion\x1b[0m",
        ];
        for input in inputs {
            let once = strip_ansi(input).into_owned();
            let twice = strip_ansi(&once).into_owned();
            assert_eq!(once, twice);
            assert!(once.len() <= input.len());
        }
    }

    #[test]
    fn test_strip_orphaned_sgr() {
        assert_eq!(strip_ansi_with_orphans("hello[2mdim[0m"), "hellodim");
        // Non-SGR brackets survive.
        assert_eq!(strip_ansi_with_orphans("array[0] = x"), "array[0] = x");
        assert_eq!(strip_ansi_with_orphans("[y/N]"), "[y/N]");
    }

    #[test]
    fn test_strip_osc8_keeps_link_text() {
        let s = "see \x1b]8;;https://example.com\x1b\\docs\x1b]8;;\x1b\\ here";
        assert_eq!(strip_osc8_hyperlinks(s), "see docs here");
        let bel = "\x1b]8;;https://example.com\x07docs\x1b]8;;\x07";
        assert_eq!(strip_osc8_hyperlinks(bel), "docs");
    }

    #[test]
    fn test_is_separator_line() {
        assert!(is_separator_line("────────────────"));
        assert!(is_separator_line("  ----------  "));
        assert!(is_separator_line("========"));
        assert!(is_separator_line("── header ──────────"));
        assert!(!is_separator_line("--"));
        assert!(!is_separator_line("normal text - with a dash"));
        assert!(!is_separator_line(""));
    }
}
