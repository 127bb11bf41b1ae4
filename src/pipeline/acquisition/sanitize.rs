/// Sanitize extracted page text before line segmentation.
///
/// Drops control characters (keeping newlines and tabs), folds Unicode
/// spaces such as NBSP to an ASCII space, and normalizes CRLF. Line
/// structure is preserved: lookahead depends on it.
pub fn sanitize_page_text(raw: &str) -> String {
    raw.replace("\r\n", "\n")
        .chars()
        .filter_map(|c| match c {
            '\n' | '\t' => Some(c),
            '\r' => Some('\n'),
            '\u{00A0}' | '\u{2007}' | '\u{202F}' | '\u{2009}' | '\u{200A}' => Some(' '),
            // Zero-width characters show up in PDF text layers between digits
            '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' => None,
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}
