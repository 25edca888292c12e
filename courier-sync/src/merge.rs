//! Marker-delimited section merge.
//!
//! A section with key `K` occupies
//!
//! ```text
//! <!-- start: K -->
//! content
//! <!-- end: K -->
//! ```
//!
//! inside an otherwise hand-authored file. [`merge`] replaces an existing block
//! for each key or appends a new one, and never touches text outside the
//! markers. The merge is pure, deterministic and idempotent.
//!
//! Content that itself contains `K`'s markers has them written as
//! `&lt;!-- start: K --&gt;` / `&lt;!-- end: K --&gt;`, so a block always
//! ends at its own end marker.

use courier_core::types::FileSection;

/// `<!-- start: K -->`
pub fn start_marker(key: &str) -> String {
    format!("<!-- start: {key} -->")
}

/// `<!-- end: K -->`
pub fn end_marker(key: &str) -> String {
    format!("<!-- end: {key} -->")
}

fn escape_marker(marker: &str) -> String {
    marker.replace('<', "&lt;").replace('>', "&gt;")
}

fn block(key: &str, content: &str) -> String {
    let (start, end) = (start_marker(key), end_marker(key));
    let content = if content.contains(&start) || content.contains(&end) {
        content
            .replace(&start, &escape_marker(&start))
            .replace(&end, &escape_marker(&end))
    } else {
        content.to_string()
    };
    format!("{start}\n{content}\n{end}")
}

/// How one section was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionPlacement {
    Replaced,
    Appended,
    /// A start or end marker was present but no well-formed pair.
    AppendedMalformed,
}

/// Byte span `[start, end)` of the block for `key`, markers included.
///
/// The block ends at the first end marker that has a start marker before it and
/// starts at the nearest such start marker. A stray end marker with no start
/// before it is skipped; a dangling start marker is shadowed by a later one.
fn find_block(existing: &str, key: &str) -> Option<(usize, usize)> {
    let start = start_marker(key);
    let end = end_marker(key);
    let mut from = 0;
    while let Some(rel) = existing[from..].find(&end) {
        let end_at = from + rel;
        if let Some(start_at) = existing[..end_at].rfind(&start) {
            return Some((start_at, end_at + end.len()));
        }
        from = end_at + end.len();
    }
    None
}

fn merge_one(existing: &str, section: &FileSection) -> (String, SectionPlacement) {
    if let Some((from, to)) = find_block(existing, &section.key) {
        let mut out = String::with_capacity(existing.len() + section.content.len());
        out.push_str(&existing[..from]);
        out.push_str(&block(&section.key, &section.content));
        out.push_str(&existing[to..]);
        return (out, SectionPlacement::Replaced);
    }

    let placement = if existing.contains(&start_marker(&section.key))
        || existing.contains(&end_marker(&section.key))
    {
        SectionPlacement::AppendedMalformed
    } else {
        SectionPlacement::Appended
    };

    let mut out = String::with_capacity(existing.len() + section.content.len() + 64);
    out.push_str(existing);
    if !existing.is_empty() && !existing.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&block(&section.key, &section.content));
    (out, placement)
}

/// Merge `sections` into `existing`, in order. Later sections with the same
/// key win.
pub fn merge(existing: &str, sections: &[FileSection]) -> String {
    let mut content = existing.to_string();
    for section in sections {
        let (next, placement) = merge_one(&content, section);
        if placement == SectionPlacement::AppendedMalformed {
            tracing::warn!(key = %section.key, "malformed markers, appending a fresh section");
        } else {
            tracing::trace!(key = %section.key, ?placement, "section merged");
        }
        content = next;
    }
    content
}

/// Content between the markers of `key`, if a well-formed block exists.
pub fn section_content<'a>(content: &'a str, key: &str) -> Option<&'a str> {
    let (from, to) = find_block(content, key)?;
    let inner_from = from + start_marker(key).len();
    let inner_to = to - end_marker(key).len();
    let inner = &content[inner_from..inner_to];
    let inner = inner.strip_prefix('\n').unwrap_or(inner);
    Some(inner.strip_suffix('\n').unwrap_or(inner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn s(key: &str, content: &str) -> FileSection {
        FileSection::new(key, content)
    }

    #[test]
    fn appends_to_empty_content() {
        assert_eq!(
            merge("", &[s("foo", "hello")]),
            "<!-- start: foo -->\nhello\n<!-- end: foo -->"
        );
    }

    #[test]
    fn no_sections_leaves_content_unchanged() {
        assert_eq!(merge("", &[]), "");
        assert_eq!(merge("# Title\n", &[]), "# Title\n");
    }

    #[rstest]
    #[case("# Title", "# Title\n<!-- start: k -->\nx\n<!-- end: k -->")]
    #[case("# Title\n", "# Title\n<!-- start: k -->\nx\n<!-- end: k -->")]
    #[case("# Title\n\n", "# Title\n\n<!-- start: k -->\nx\n<!-- end: k -->")]
    fn append_separator_only_when_needed(#[case] existing: &str, #[case] expected: &str) {
        assert_eq!(merge(existing, &[s("k", "x")]), expected);
    }

    #[test]
    fn replaces_existing_block_and_keeps_surroundings() {
        let existing = "intro\n<!-- start: foo -->\nold\nlines\n<!-- end: foo -->\noutro\n";
        let merged = merge(existing, &[s("foo", "new")]);
        assert_eq!(merged, "intro\n<!-- start: foo -->\nnew\n<!-- end: foo -->\noutro\n");
    }

    #[test]
    fn later_same_key_wins() {
        let merged = merge("", &[s("foo", "first"), s("foo", "second")]);
        assert_eq!(merged, "<!-- start: foo -->\nsecond\n<!-- end: foo -->");
    }

    #[test]
    fn keys_do_not_interfere() {
        let merged = merge("", &[s("a", "1"), s("b", "2")]);
        let merged = merge(&merged, &[s("a", "one")]);
        assert_eq!(section_content(&merged, "a"), Some("one"));
        assert_eq!(section_content(&merged, "b"), Some("2"));
    }

    #[rstest]
    #[case("")]
    #[case("hand written\n")]
    #[case("no newline")]
    #[case("<!-- start: foo -->\nold\n<!-- end: foo -->")]
    #[case("<!-- start: foo -->\ndangling start\n")]
    #[case("<!-- end: foo -->\nstray end\n")]
    #[case("<!-- end: foo -->\n<!-- start: foo -->\nreversed\n")]
    fn merge_is_idempotent(#[case] existing: &str) {
        let sections = [s("foo", "content"), s("bar", "other")];
        let once = merge(existing, &sections);
        let twice = merge(&once, &sections);
        assert_eq!(once, twice);
    }

    #[test]
    fn end_before_start_falls_back_to_append() {
        let existing = "<!-- end: foo -->\n<!-- start: foo -->\n";
        let merged = merge(existing, &[s("foo", "x")]);
        assert!(merged.starts_with(existing));
        assert!(merged.ends_with("<!-- start: foo -->\nx\n<!-- end: foo -->"));
    }

    #[test]
    fn outside_text_is_preserved_byte_for_byte() {
        let prefix = "# Guide\r\n\r\nKeep   this   spacing\t\n";
        let suffix = "\n## Footer\n";
        let existing = format!("{prefix}<!-- start: foo -->\nold\n<!-- end: foo -->{suffix}");
        let merged = merge(&existing, &[s("foo", "new")]);
        assert!(merged.starts_with(prefix));
        assert!(merged.ends_with(suffix));
    }

    #[test]
    fn empty_content_clears_block() {
        let existing = "<!-- start: foo -->\nold\n<!-- end: foo -->";
        let merged = merge(existing, &[s("foo", "")]);
        assert_eq!(merged, "<!-- start: foo -->\n\n<!-- end: foo -->");
        assert_eq!(section_content(&merged, "foo"), Some(""));
    }

    #[test]
    fn own_markers_in_content_are_escaped() {
        let content = "before\n<!-- end: foo -->\n<!-- start: foo -->\nafter";
        let once = merge("intro\n", &[s("foo", content)]);
        let twice = merge(&once, &[s("foo", content)]);
        assert_eq!(once, twice);
        assert_eq!(once.matches("<!-- end: foo -->").count(), 1);
        assert_eq!(
            section_content(&once, "foo"),
            Some("before\n&lt;!-- end: foo --&gt;\n&lt;!-- start: foo --&gt;\nafter")
        );
    }

    #[test]
    fn other_keys_markers_in_content_are_kept() {
        let merged = merge("", &[s("foo", "see <!-- end: bar -->")]);
        assert_eq!(section_content(&merged, "foo"), Some("see <!-- end: bar -->"));
    }

    #[test]
    fn key_prefix_does_not_match_longer_key() {
        let existing = "<!-- start: foo-bar -->\nx\n<!-- end: foo-bar -->";
        let merged = merge(existing, &[s("foo", "y")]);
        assert_eq!(section_content(&merged, "foo-bar"), Some("x"));
        assert_eq!(section_content(&merged, "foo"), Some("y"));
    }
}
