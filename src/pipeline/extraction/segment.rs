/// A trimmed, non-empty line. `index` counts filtered lines only, so
/// "the next line" always means the next non-empty one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLine<'a> {
    pub index: usize,
    pub text: &'a str,
}

/// Restartable view over the lines of a text; each `iter()` starts over.
#[derive(Debug, Clone, Copy)]
pub struct LineSegments<'a> {
    text: &'a str,
}

impl<'a> LineSegments<'a> {
    pub fn iter(&self) -> impl Iterator<Item = RawLine<'a>> + 'a {
        self.text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(index, text)| RawLine { index, text })
    }
}

impl<'a> IntoIterator for LineSegments<'a> {
    type Item = RawLine<'a>;
    type IntoIter = Box<dyn Iterator<Item = RawLine<'a>> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

pub fn segment_lines(text: &str) -> LineSegments<'_> {
    LineSegments { text }
}
