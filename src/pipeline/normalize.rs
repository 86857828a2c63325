//! Normalisation: deterministic cleanup of raw OCR page text.
//!
//! Tesseract output differs between versions in ways that do not change
//! meaning: CRLF vs LF, no-break spaces around currency amounts, doubled
//! spaces between columns, stray zero-width characters. Markers are matched
//! literally, so these are flattened before the text leaves the extractor.
//! Characters themselves are never substituted; a misread glyph stays misread.
//!
//! Rules (applied in order):
//! 1. Normalise line endings (CRLF / CR → LF)
//! 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
//! 3. Map no-break and other exotic spaces to a plain space
//! 4. Collapse runs of horizontal whitespace to a single space
//! 5. Trim trailing whitespace per line
//! 6. Collapse 3+ consecutive blank lines down to 2
//! 7. Trim leading and trailing blank lines

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every normalisation rule to one page of OCR output.
pub fn clean_page_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = normalise_spaces(&s);
    let s = collapse_horizontal_whitespace(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim_matches('\n').to_string()
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

const INVISIBLE: [char; 6] = [
    '\u{200B}', // zero-width space
    '\u{200C}', // zero-width non-joiner
    '\u{200D}', // zero-width joiner
    '\u{2060}', // word joiner
    '\u{FEFF}', // BOM
    '\u{00AD}', // soft hyphen
];

fn remove_invisible_chars(input: &str) -> String {
    input.chars().filter(|c| !INVISIBLE.contains(c)).collect()
}

fn normalise_spaces(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\u{00A0}' | '\u{2007}' | '\u{202F}' | '\u{2009}' | '\u{200A}' | '\t' => ' ',
            other => other,
        })
        .collect()
}

static RE_HSPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());

fn collapse_horizontal_whitespace(input: &str) -> String {
    RE_HSPACE.replace_all(input, " ").into_owned()
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|l| l.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crlf_becomes_lf() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn no_break_space_in_amount_is_plain() {
        assert_eq!(clean_page_text("Сумма 860\u{00A0}T"), "Сумма 860 T");
        assert_eq!(clean_page_text("Сумма 860\u{202F}T"), "Сумма 860 T");
    }

    #[test]
    fn column_gaps_collapse() {
        assert_eq!(clean_page_text("Сумма      860   T"), "Сумма 860 T");
    }

    #[test]
    fn invisible_chars_removed() {
        assert_eq!(clean_page_text("Квит\u{200B}анция\u{FEFF}"), "Квитанция");
    }

    #[test]
    fn blank_lines_are_bounded() {
        let out = clean_page_text("\n\na\n\n\n\n\n\nb  \n\n");
        assert_eq!(out, "a\n\n\nb");
    }

    #[test]
    fn glyphs_are_never_substituted() {
        // a misread currency sign stays misread
        assert_eq!(clean_page_text("860 ₸"), "860 ₸");
    }
}
