//! Display-safe formatting of assistant text.
//!
//! The formatter is the single point where untrusted, possibly partial assistant text becomes
//! markup.  It only ever emits `p`, `br`, `ol`, `li` and `strong`; everything taken from the
//! source text is escaped.  Formatting is a pure function of the full buffer, so re-running it
//! on a growing buffer never leaves artifacts from earlier partial renders.

use std::fmt;
use std::sync::Arc;

/// The marker that opens and closes a bold span.
const BOLD_MARKER: &str = "**";

/// Line prefixes treated as unordered bullets.  They render as ordered-list items.
const BULLET_PREFIXES: &[&str] = &["- ", "* ", "• "];

/// Longest run of digits accepted as a list number.
const MAX_LIST_NUMBER_DIGITS: usize = 3;

///////////////////////////////////////////// Fixups ////////////////////////////////////////////

/// A product-specific rewrite applied to the raw text before it is formatted.
///
/// Fixups must be pure functions of their input: the formatter runs them on the full buffer
/// every time, and the final render has to depend only on the final buffer.
pub trait TextFixup: Send + Sync {
    /// A short name used in debug output.
    fn name(&self) -> &str;

    /// Rewrite `text`.
    fn apply(&self, text: &str) -> String;
}

/// Breaks an inline enumeration such as `Options: 1. A 2. B` onto separate lines.
///
/// A number only starts a new line when it continues the sequence (1, 2, 3, ...), so phrases
/// like `call 911. Then` are left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineListBreaks;

impl TextFixup for InlineListBreaks {
    fn name(&self) -> &str {
        "inline-list-breaks"
    }

    fn apply(&self, text: &str) -> String {
        text.split('\n')
            .map(break_inline_list)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn break_inline_list(line: &str) -> String {
    let bytes = line.as_bytes();
    let mut expected = numbered_marker(line.trim_start())
        .map(|(n, _)| n + 1)
        .unwrap_or(1);
    let mut out = String::with_capacity(line.len() + 8);
    let mut last = 0;
    let mut i = 1;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit()
            && bytes[i - 1].is_ascii_whitespace()
            && let Some((n, len)) = numbered_marker(&line[i..])
            && n == expected
        {
            let end = line[..i].trim_end().len();
            out.push_str(&line[last..end]);
            out.push('\n');
            last = i;
            expected += 1;
            i += len;
            continue;
        }
        i += 1;
    }
    out.push_str(&line[last..]);
    out
}

/////////////////////////////////////////// Formatter ///////////////////////////////////////////

/// Renders assistant text into the whitelisted markup vocabulary.
#[derive(Clone, Default)]
pub struct Formatter {
    fixups: Vec<Arc<dyn TextFixup>>,
}

impl Formatter {
    /// A formatter with no fixups.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fixup.  Fixups run in the order they were added.
    pub fn with_fixup(mut self, fixup: impl TextFixup + 'static) -> Self {
        self.fixups.push(Arc::new(fixup));
        self
    }

    /// Render `text` to display-safe markup.
    pub fn format(&self, text: &str) -> String {
        let mut text = text.replace("\r\n", "\n");
        for fixup in &self.fixups {
            text = fixup.apply(&text);
        }
        let mut out = String::with_capacity(text.len() + 32);
        for block in parse_blocks(&text) {
            block.render(&mut out);
        }
        out
    }
}

impl fmt::Debug for Formatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.fixups.iter().map(|fixup| fixup.name()).collect();
        f.debug_struct("Formatter").field("fixups", &names).finish()
    }
}

/// Render `text` with the default formatter.
pub fn format_markup(text: &str) -> String {
    Formatter::new().format(text)
}

/// Render `text` verbatim: escaped, with newlines as line breaks.
///
/// Used for user and error messages, which are never interpreted.
pub fn plain_markup(text: &str) -> String {
    text.replace("\r\n", "\n")
        .split('\n')
        .map(escape_html)
        .collect::<Vec<_>>()
        .join("<br />")
}

/// Escape the characters that are significant in HTML text and attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

///////////////////////////////////////////// Blocks ////////////////////////////////////////////

#[derive(Debug, PartialEq)]
enum Block<'a> {
    Paragraph(Vec<&'a str>),
    List(Vec<Vec<&'a str>>),
}

impl Block<'_> {
    fn render(&self, out: &mut String) {
        match self {
            Block::Paragraph(lines) => {
                out.push_str("<p>");
                let lines: Vec<String> = lines.iter().map(|line| render_inline(line)).collect();
                out.push_str(&lines.join("<br />"));
                out.push_str("</p>");
            }
            Block::List(items) => {
                out.push_str("<ol>");
                for item in items {
                    out.push_str("<li>");
                    let mut lines = Vec::with_capacity(item.len());
                    if let Some((first, rest)) = item.split_first() {
                        lines.push(render_item_head(first));
                        lines.extend(rest.iter().map(|line| render_inline(line)));
                    }
                    out.push_str(&lines.join("<br />"));
                    out.push_str("</li>");
                }
                out.push_str("</ol>");
            }
        }
    }
}

/// Splits `text` into blocks.  A message holds at most one list: every item, from the first to
/// the last, lands in it in encounter order, and prose between items continues the item before
/// it.  Prose before the first item and after a blank line following the last item stays in
/// paragraphs.
fn parse_blocks(text: &str) -> Vec<Block<'_>> {
    let lines: Vec<&str> = text.split('\n').map(str::trim).collect();
    let mut blocks = Vec::new();

    let is_item = |line: &&str| list_item_body(line).is_some();
    let (Some(first), Some(last)) = (
        lines.iter().position(is_item),
        lines.iter().rposition(is_item),
    ) else {
        push_paragraphs(&lines, &mut blocks);
        return blocks;
    };

    push_paragraphs(&lines[..first], &mut blocks);
    let mut end = last + 1;
    while end < lines.len() && !lines[end].is_empty() {
        end += 1;
    }
    let mut items: Vec<Vec<&str>> = Vec::new();
    for &line in &lines[first..end] {
        if let Some(body) = list_item_body(line) {
            items.push(vec![body]);
        } else if !line.is_empty()
            && let Some(item) = items.last_mut()
        {
            item.push(line);
        }
    }
    blocks.push(Block::List(items));
    push_paragraphs(&lines[end..], &mut blocks);
    blocks
}

fn push_paragraphs<'a>(lines: &[&'a str], blocks: &mut Vec<Block<'a>>) {
    for paragraph in lines.split(|line| line.is_empty()) {
        if !paragraph.is_empty() {
            blocks.push(Block::Paragraph(paragraph.to_vec()));
        }
    }
}

/// Returns the item text when `line` (already trimmed) is a list item.
fn list_item_body(line: &str) -> Option<&str> {
    for prefix in BULLET_PREFIXES {
        if let Some(body) = line.strip_prefix(prefix) {
            return Some(body.trim());
        }
    }
    numbered_marker(line).map(|(_, len)| line[len..].trim())
}

/// Parses a leading `N.` or `N)` followed by whitespace.  Returns the number and the length of
/// the marker, excluding the whitespace.
fn numbered_marker(text: &str) -> Option<(u32, usize)> {
    let digits = text.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || digits > MAX_LIST_NUMBER_DIGITS {
        return None;
    }
    let rest = &text.as_bytes()[digits..];
    match rest {
        [b'.' | b')', next, ..] if next.is_ascii_whitespace() => {
            let number = text[..digits].parse().ok()?;
            Some((number, digits + 1))
        }
        _ => None,
    }
}

///////////////////////////////////////////// Inline ////////////////////////////////////////////

/// Renders the first line of a list item, bolding a leading `label:`.
fn render_item_head(line: &str) -> String {
    if let Some((label, rest)) = split_label(line) {
        let mut out = format!("<strong>{}</strong>:", escape_html(label));
        if !rest.is_empty() {
            out.push(' ');
            out.push_str(&render_inline(rest));
        }
        out
    } else {
        render_inline(line)
    }
}

fn split_label(line: &str) -> Option<(&str, &str)> {
    let (label, rest) = line.split_once(':')?;
    let label = label.trim();
    if label.is_empty() || label.contains(BOLD_MARKER) {
        return None;
    }
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some((label, rest.trim()))
}

/// Escapes `line` and turns closed `**` pairs into `strong` spans.
///
/// An unterminated span renders as plain text without its marker.  A lone `*` ending an
/// unterminated span is the first half of a closing marker that has not arrived yet, so it is
/// dropped as well.
fn render_inline(line: &str) -> String {
    let parts: Vec<&str> = line.split(BOLD_MARKER).collect();
    let markers = parts.len() - 1;
    let mut out = String::with_capacity(line.len() + 16);
    for (i, part) in parts.into_iter().enumerate() {
        let inside = i % 2 == 1;
        if inside && i < markers {
            if !part.is_empty() {
                out.push_str("<strong>");
                out.push_str(&escape_html(part));
                out.push_str("</strong>");
            }
        } else if inside {
            out.push_str(&escape_html(part.strip_suffix('*').unwrap_or(part)));
        } else {
            out.push_str(&escape_html(part));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_is_escaped_and_bold_rendered() {
        let markup = format_markup("<script>x</script>**bold**");
        assert_eq!(
            markup,
            "<p>&lt;script&gt;x&lt;/script&gt;<strong>bold</strong></p>"
        );
        assert!(!markup.contains("<script"));
    }

    #[test]
    fn unterminated_bold_is_plain_text() {
        assert_eq!(format_markup("a **bo"), "<p>a bo</p>");
        assert_eq!(format_markup("a **bold*"), "<p>a bold</p>");
        assert_eq!(format_markup("a **bold**"), "<p>a <strong>bold</strong></p>");
    }

    #[test]
    fn bold_does_not_cross_lines() {
        assert_eq!(format_markup("**a\nb**"), "<p>a<br />b</p>");
    }

    #[test]
    fn paragraphs_and_breaks() {
        assert_eq!(
            format_markup("one\ntwo\n\nthree"),
            "<p>one<br />two</p><p>three</p>"
        );
        assert_eq!(format_markup("\n\n  \n"), "");
        assert_eq!(format_markup(""), "");
    }

    #[test]
    fn numbered_list_with_intro() {
        let text = "Here are the plans:\n1. Basic: cheap\n2. Premium: **best** value\n\nAsk me more.";
        assert_eq!(
            format_markup(text),
            "<p>Here are the plans:</p>\
             <ol><li><strong>Basic</strong>: cheap</li>\
             <li><strong>Premium</strong>: <strong>best</strong> value</li></ol>\
             <p>Ask me more.</p>"
        );
    }

    #[test]
    fn bullets_are_normalized() {
        assert_eq!(
            format_markup("- first\n* second\n• third"),
            "<ol><li>first</li><li>second</li><li>third</li></ol>"
        );
    }

    #[test]
    fn blank_lines_between_items_keep_one_list() {
        assert_eq!(
            format_markup("1. a\n\n2. b"),
            "<ol><li>a</li><li>b</li></ol>"
        );
    }

    #[test]
    fn prose_between_items_keeps_one_list() {
        assert_eq!(
            format_markup("1. a\n\nNote\n\n2. b"),
            "<ol><li>a<br />Note</li><li>b</li></ol>"
        );
        assert_eq!(
            format_markup("Steps:\n1. Call us\n\nThen:\n\n2. Send the form\n\nThanks!"),
            "<p>Steps:</p><ol><li>Call us<br />Then:</li><li>Send the form</li></ol>\
             <p>Thanks!</p>"
        );
    }

    #[test]
    fn continuation_lines_join_the_item() {
        assert_eq!(
            format_markup("1. a\nmore about a\n2. b"),
            "<ol><li>a<br />more about a</li><li>b</li></ol>"
        );
    }

    #[test]
    fn label_requires_plain_colon() {
        assert_eq!(
            format_markup("1. see https://example.com"),
            "<ol><li>see https://example.com</li></ol>"
        );
        assert_eq!(
            format_markup("1. **Label**: text"),
            "<ol><li><strong>Label</strong>: text</li></ol>"
        );
        assert_eq!(
            format_markup("1. <b>: x"),
            "<ol><li><strong>&lt;b&gt;</strong>: x</li></ol>"
        );
    }

    #[test]
    fn numbers_without_space_are_prose() {
        assert_eq!(format_markup("3.14 is pi"), "<p>3.14 is pi</p>");
        assert_eq!(format_markup("1."), "<p>1.</p>");
    }

    #[test]
    fn escape_everything_significant() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn plain_markup_never_interprets() {
        assert_eq!(plain_markup("**hi**\n<i>"), "**hi**<br />&lt;i&gt;");
    }

    #[test]
    fn final_render_depends_only_on_final_buffer() {
        let formatter = Formatter::new().with_fixup(InlineListBreaks);
        let full = "Plans: 1. **Basic**: cheap 2. Gold: shiny";
        let mut last = String::new();
        for end in 1..=full.len() {
            if full.is_char_boundary(end) {
                last = formatter.format(&full[..end]);
            }
        }
        assert_eq!(last, formatter.format(full));
    }

    #[test]
    fn inline_list_breaks_follow_the_sequence() {
        let fixup = InlineListBreaks;
        assert_eq!(
            fixup.apply("Options: 1. A 2. B 3. C"),
            "Options:\n1. A\n2. B\n3. C"
        );
        assert_eq!(fixup.apply("call 911. Then wait"), "call 911. Then wait");
        assert_eq!(fixup.apply("1. A 2. B"), "1. A\n2. B");
        assert_eq!(fixup.apply("in 2. Then"), "in 2. Then");
    }

    #[test]
    fn formatter_with_fixup_builds_list() {
        let formatter = Formatter::new().with_fixup(InlineListBreaks);
        assert_eq!(
            formatter.format("Options: 1. A 2. B"),
            "<p>Options:</p><ol><li>A</li><li>B</li></ol>"
        );
        assert_eq!(
            format!("{formatter:?}"),
            r#"Formatter { fixups: ["inline-list-breaks"] }"#
        );
    }
}
