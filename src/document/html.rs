//! Minimal HTML reader for already-sanitized document bodies.
//!
//! Turns markup into a flat list of layout blocks (headings, paragraphs,
//! list items, table rows, page breaks) carrying styled text runs. Both
//! the PDF layout engine and the DOCX writer consume this model.

/// A lexical HTML token. Tag names are lower-cased; text is entity-decoded.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Start {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    End(String),
    Text(String),
}

/// Elements whose content is never rendered.
const SKIPPED: &[&str] = &["script", "style", "head", "title", "template"];

fn tokenize(html: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let bytes = html.as_bytes();
    let mut i = 0;
    let mut text_start = 0;

    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        let rest = &html[i..];
        let consumed = if rest.starts_with("<!--") {
            Some(rest.find("-->").map_or(rest.len(), |end| end + 3))
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            Some(rest.find('>').map_or(rest.len(), |end| end + 1))
        } else if rest.len() > 2 && rest.as_bytes()[1] == b'/' && rest.as_bytes()[2].is_ascii_alphabetic() {
            let end = rest.find('>').unwrap_or(rest.len());
            let name = rest[2..end]
                .split(|c: char| c.is_ascii_whitespace())
                .next()
                .unwrap_or("")
                .to_ascii_lowercase();
            flush_text(html, text_start, i, &mut tokens);
            tokens.push(Token::End(name));
            Some((end + 1).min(rest.len()))
        } else if rest.len() > 1 && rest.as_bytes()[1].is_ascii_alphabetic() {
            flush_text(html, text_start, i, &mut tokens);
            let (token, len) = parse_start_tag(rest);
            let raw_name = match &token {
                Token::Start { name, self_closing: false, .. } if matches!(name.as_str(), "script" | "style") => {
                    Some(name.clone())
                }
                _ => None,
            };
            tokens.push(token);
            match raw_name {
                // raw text elements: everything up to the matching close tag
                Some(name) => {
                    let body_start = i + len;
                    let close = format!("</{name}");
                    let body = &html[body_start..];
                    let body_len = body
                        .to_ascii_lowercase()
                        .find(&close)
                        .unwrap_or(body.len());
                    if body_len > 0 {
                        tokens.push(Token::Text(body[..body_len].to_string()));
                    }
                    let after = &body[body_len..];
                    let close_len = after.find('>').map_or(after.len(), |end| end + 1);
                    if body_len < body.len() {
                        tokens.push(Token::End(name));
                    }
                    Some(len + body_len + close_len)
                }
                None => Some(len),
            }
        } else {
            None
        };

        match consumed {
            Some(len) => {
                if rest.starts_with("<!") || rest.starts_with("<?") {
                    flush_text(html, text_start, i, &mut tokens);
                }
                i += len;
                text_start = i;
            }
            None => i += 1,
        }
    }
    flush_text(html, text_start, bytes.len(), &mut tokens);
    tokens
}

fn flush_text(html: &str, start: usize, end: usize, tokens: &mut Vec<Token>) {
    if start < end {
        tokens.push(Token::Text(decode_entities(&html[start..end])));
    }
}

/// Parse `<name attr="v" ...>` at the start of `rest`; returns the token
/// and the number of bytes consumed.
fn parse_start_tag(rest: &str) -> (Token, usize) {
    let bytes = rest.as_bytes();
    let mut i = 1;
    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' && bytes[i] != b'/' {
        i += 1;
    }
    let name = rest[1..i].to_ascii_lowercase();
    let mut attrs = Vec::new();
    let mut self_closing = false;

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        match bytes[i] {
            b'>' => {
                i += 1;
                break;
            }
            b'/' => {
                self_closing = true;
                i += 1;
            }
            _ => {
                let key_start = i;
                while i < bytes.len()
                    && !bytes[i].is_ascii_whitespace()
                    && !matches!(bytes[i], b'=' | b'>' | b'/')
                {
                    i += 1;
                }
                let key = rest[key_start..i].to_ascii_lowercase();
                let mut value = String::new();
                if i < bytes.len() && bytes[i] == b'=' {
                    i += 1;
                    if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                        let quote = bytes[i];
                        i += 1;
                        let value_start = i;
                        while i < bytes.len() && bytes[i] != quote {
                            i += 1;
                        }
                        value = decode_entities(&rest[value_start..i]);
                        i = (i + 1).min(bytes.len());
                    } else {
                        let value_start = i;
                        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                            i += 1;
                        }
                        value = decode_entities(&rest[value_start..i]);
                    }
                }
                if !key.is_empty() {
                    attrs.push((key, value));
                }
            }
        }
    }

    let self_closing = self_closing || is_void(&name);
    (Token::Start { name, attrs, self_closing }, i)
}

fn is_void(name: &str) -> bool {
    matches!(name, "br" | "hr" | "img" | "meta" | "link" | "input" | "col" | "wbr")
}

/// Decode the named entities an HTML serializer emits plus numeric ones.
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        // entity names are short; look at most 12 characters ahead
        let semi = tail
            .char_indices()
            .take(12)
            .find(|&(_, c)| c == ';')
            .map(|(idx, _)| idx);
        let Some(semi) = semi else {
            out.push('&');
            rest = &tail[1..];
            continue;
        };
        let entity = &tail[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// A stretch of text with uniform inline style.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Run {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: u8, runs: Vec<Run> },
    Paragraph { runs: Vec<Run> },
    ListItem { ordered: bool, number: usize, depth: usize, runs: Vec<Run> },
    TableRow { header: bool, cells: Vec<Vec<Run>> },
    PageBreak,
}

impl Block {
    pub fn plain_text(&self) -> String {
        match self {
            Block::Heading { runs, .. } | Block::Paragraph { runs } | Block::ListItem { runs, .. } => {
                runs_text(runs)
            }
            Block::TableRow { cells, .. } => cells
                .iter()
                .map(|c| runs_text(c))
                .collect::<Vec<_>>()
                .join("\t"),
            Block::PageBreak => String::new(),
        }
    }
}

pub fn runs_text(runs: &[Run]) -> String {
    runs.iter().map(|r| r.text.as_str()).collect()
}

#[derive(Debug, Clone, Copy, Default)]
struct Style {
    bold: usize,
    italic: usize,
    underline: usize,
}

enum Pending {
    Heading(u8),
    Paragraph,
    ListItem { ordered: bool, number: usize, depth: usize },
}

struct ListFrame {
    ordered: bool,
    next: usize,
}

#[derive(Default)]
struct RowBuilder {
    header: bool,
    cells: Vec<Vec<Run>>,
    cell: Option<Vec<Run>>,
}

#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
    style: Style,
    lists: Vec<ListFrame>,
    pending: Option<(Pending, Vec<Run>)>,
    row: Option<RowBuilder>,
    skip: usize,
}

impl BlockBuilder {
    fn flush(&mut self) {
        let Some((kind, runs)) = self.pending.take() else {
            return;
        };
        let runs = trim_runs(runs);
        if runs.is_empty() {
            return;
        }
        self.blocks.push(match kind {
            Pending::Heading(level) => Block::Heading { level, runs },
            Pending::Paragraph => Block::Paragraph { runs },
            Pending::ListItem { ordered, number, depth } => Block::ListItem {
                ordered,
                number,
                depth,
                runs,
            },
        });
    }

    fn start(&mut self, kind: Pending) {
        self.flush();
        self.pending = Some((kind, Vec::new()));
    }

    fn close_cell(&mut self) {
        if let Some(row) = self.row.as_mut() {
            if let Some(cell) = row.cell.take() {
                row.cells.push(trim_runs(cell));
            }
        }
    }

    fn close_row(&mut self) {
        self.close_cell();
        if let Some(row) = self.row.take() {
            if !row.cells.is_empty() {
                self.blocks.push(Block::TableRow {
                    header: row.header,
                    cells: row.cells,
                });
            }
        }
    }

    fn text(&mut self, raw: &str) {
        if self.skip > 0 {
            return;
        }
        let text = collapse_whitespace(raw);
        if text.is_empty() {
            return;
        }
        let run = Run {
            text,
            bold: self.style.bold > 0,
            italic: self.style.italic > 0,
            underline: self.style.underline > 0,
        };
        if let Some(row) = self.row.as_mut() {
            let cell = row.cell.get_or_insert_with(Vec::new);
            push_run(cell, run);
            return;
        }
        if self.pending.is_none() {
            if run.text.trim().is_empty() {
                return;
            }
            self.pending = Some((Pending::Paragraph, Vec::new()));
        }
        if let Some((_, runs)) = self.pending.as_mut() {
            push_run(runs, run);
        }
    }

    fn line_break(&mut self) {
        let run = Run {
            text: "\n".into(),
            ..Run::default()
        };
        if let Some(row) = self.row.as_mut() {
            push_run(row.cell.get_or_insert_with(Vec::new), run);
        } else if let Some((_, runs)) = self.pending.as_mut() {
            push_run(runs, run);
        }
    }

    fn open(&mut self, name: &str, attrs: &[(String, String)]) {
        if SKIPPED.contains(&name) {
            self.skip += 1;
            return;
        }
        match name {
            "b" | "strong" => self.style.bold += 1,
            "i" | "em" => self.style.italic += 1,
            "u" | "ins" => self.style.underline += 1,
            "br" => self.line_break(),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name.as_bytes()[1] - b'0';
                self.start(Pending::Heading(level));
            }
            "p" | "blockquote" | "pre" | "div" if self.row.is_some() => {
                self.line_break_if_content();
            }
            "p" | "blockquote" | "pre" => {
                if !self.in_fresh_list_item() {
                    self.start(Pending::Paragraph);
                }
            }
            "div" => {
                let page_break = attrs
                    .iter()
                    .any(|(k, v)| k == "class" && v.split_whitespace().any(|c| c == "page-break"));
                self.flush();
                if page_break {
                    self.blocks.push(Block::PageBreak);
                }
            }
            "ul" | "ol" => {
                self.flush();
                self.lists.push(ListFrame {
                    ordered: name == "ol",
                    next: 1,
                });
            }
            "li" => {
                let depth = self.lists.len().saturating_sub(1);
                let (ordered, number) = match self.lists.last_mut() {
                    Some(frame) => {
                        let number = frame.next;
                        frame.next += 1;
                        (frame.ordered, number)
                    }
                    None => (false, 1),
                };
                self.start(Pending::ListItem { ordered, number, depth });
            }
            "table" => self.flush(),
            "tr" => {
                self.flush();
                self.close_row();
                self.row = Some(RowBuilder::default());
            }
            "td" | "th" => {
                if self.row.is_none() {
                    self.flush();
                    self.row = Some(RowBuilder::default());
                }
                self.close_cell();
                if let Some(row) = self.row.as_mut() {
                    row.header |= name == "th";
                    row.cell = Some(Vec::new());
                }
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &str) {
        if SKIPPED.contains(&name) {
            self.skip = self.skip.saturating_sub(1);
            return;
        }
        match name {
            "b" | "strong" => self.style.bold = self.style.bold.saturating_sub(1),
            "i" | "em" => self.style.italic = self.style.italic.saturating_sub(1),
            "u" | "ins" => self.style.underline = self.style.underline.saturating_sub(1),
            "td" | "th" => self.close_cell(),
            "tr" | "table" => self.close_row(),
            "p" | "blockquote" | "pre" | "div" if self.row.is_some() => {}
            "p" | "blockquote" | "pre" => {
                if !matches!(self.pending, Some((Pending::ListItem { .. }, _))) {
                    self.flush();
                }
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "li" | "div" => self.flush(),
            "ul" | "ol" => {
                self.flush();
                self.lists.pop();
            }
            _ => {}
        }
    }

    fn in_fresh_list_item(&self) -> bool {
        matches!(&self.pending, Some((Pending::ListItem { .. }, runs)) if runs.is_empty())
    }

    fn line_break_if_content(&mut self) {
        let has_content = self
            .row
            .as_ref()
            .and_then(|r| r.cell.as_ref())
            .is_some_and(|c| !c.is_empty());
        if has_content {
            self.line_break();
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush();
        self.close_row();
        self.blocks
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn push_run(runs: &mut Vec<Run>, run: Run) {
    if let Some(last) = runs.last_mut() {
        if last.bold == run.bold && last.italic == run.italic && last.underline == run.underline {
            if !(last.text.ends_with(' ') && run.text.starts_with(' ')) {
                last.text.push_str(&run.text);
            } else {
                last.text.push_str(&run.text[1..]);
            }
            return;
        }
        if last.text.ends_with(' ') && run.text.starts_with(' ') {
            let mut run = run;
            run.text.remove(0);
            runs.push(run);
            return;
        }
    }
    runs.push(run);
}

/// Strip ASCII whitespace at the block edges and around hard line breaks,
/// dropping runs left empty.
fn trim_runs(runs: Vec<Run>) -> Vec<Run> {
    let mut runs: Vec<Run> = runs
        .into_iter()
        .map(|mut r| {
            r.text = r.text.replace(" \n", "\n").replace("\n ", "\n");
            r
        })
        .collect();
    if let Some(first) = runs.first_mut() {
        first.text = first.text.trim_start_matches([' ', '\n']).to_string();
    }
    if let Some(last) = runs.last_mut() {
        last.text = last.text.trim_end_matches([' ', '\n']).to_string();
    }
    runs.retain(|r| !r.text.is_empty());
    runs
}

/// Lay out sanitized body HTML as a flat block list.
pub fn parse_blocks(html: &str) -> Vec<Block> {
    let mut builder = BlockBuilder::default();
    for token in tokenize(html) {
        match token {
            Token::Start { name, attrs, self_closing } => {
                builder.open(&name, &attrs);
                if self_closing && !is_void(&name) {
                    builder.close(&name);
                }
            }
            Token::End(name) => builder.close(&name),
            Token::Text(text) => builder.text(&text),
        }
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(blocks: &[Block]) -> Vec<String> {
        blocks.iter().map(Block::plain_text).collect()
    }

    #[test]
    fn tokenizer_reads_attributes_and_entities() {
        let tokens = tokenize(r#"<div class="page-break" data-x=1></div><p>A &amp; B &lt;C&gt;</p>"#);
        assert_eq!(
            tokens[0],
            Token::Start {
                name: "div".into(),
                attrs: vec![
                    ("class".into(), "page-break".into()),
                    ("data-x".into(), "1".into())
                ],
                self_closing: false,
            }
        );
        assert_eq!(tokens[3], Token::Text("A & B <C>".into()));
    }

    #[test]
    fn comments_and_doctype_are_skipped() {
        let tokens = tokenize("<!doctype html><!-- note --><p>x</p>");
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn stray_angle_bracket_is_text() {
        let blocks = parse_blocks("<p>1 < 2</p>");
        assert_eq!(text_of(&blocks), vec!["1 < 2"]);
    }

    #[test]
    fn numeric_entities_decode() {
        assert_eq!(decode_entities("&#8212;&#x41;&nbsp;"), "\u{2014}A\u{a0}");
        assert_eq!(decode_entities("AT&T"), "AT&T");
    }

    #[test]
    fn blocks_capture_structure() {
        let blocks = parse_blocks(
            "<h2>Scope</h2><p>Applies to <strong>all</strong> staff.</p>\
             <ol><li>First</li><li>Second<ul><li>Nested</li></ul></li></ol>\
             <div class=\"page-break\"></div>\
             <table><tr><th>Role</th><th>Duty</th></tr><tr><td>Director</td><td>Approve</td></tr></table>",
        );
        assert!(matches!(&blocks[0], Block::Heading { level: 2, .. }));
        match &blocks[1] {
            Block::Paragraph { runs } => {
                assert_eq!(runs.len(), 3);
                assert!(runs[1].bold);
                assert_eq!(runs[1].text, "all");
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
        assert!(matches!(&blocks[2], Block::ListItem { ordered: true, number: 1, depth: 0, .. }));
        assert!(matches!(&blocks[3], Block::ListItem { ordered: true, number: 2, .. }));
        assert!(matches!(&blocks[4], Block::ListItem { ordered: false, depth: 1, .. }));
        assert_eq!(blocks[5], Block::PageBreak);
        assert!(matches!(&blocks[6], Block::TableRow { header: true, .. }));
        assert_eq!(blocks[7].plain_text(), "Director\tApprove");
    }

    #[test]
    fn whitespace_collapses_and_empty_paragraphs_drop() {
        let blocks = parse_blocks("<p>  a\n   b  </p><p></p><p>&nbsp;</p>");
        assert_eq!(text_of(&blocks), vec!["a b", "\u{a0}"]);
    }

    #[test]
    fn style_content_is_not_text() {
        let blocks = parse_blocks("<style>p { color: red; }</style><p>Body</p>");
        assert_eq!(text_of(&blocks), vec!["Body"]);
    }

    #[test]
    fn line_breaks_survive() {
        let blocks = parse_blocks("<p>one<br>two</p>");
        assert_eq!(text_of(&blocks), vec!["one\ntwo"]);
    }

    #[test]
    fn multibyte_text_after_entity() {
        let blocks = parse_blocks("<p>Security &amp; Data \u{2014} overview</p><p>Sant\u{e9} &amp; Entit\u{e9}</p>");
        assert_eq!(
            text_of(&blocks),
            vec!["Security & Data \u{2014} overview", "Sant\u{e9} & Entit\u{e9}"]
        );
    }

    #[test]
    fn unterminated_entity_before_multibyte_is_literal() {
        assert_eq!(decode_entities("R&D \u{2014}\u{2014}\u{2014}\u{2014} caf\u{e9}"), "R&D \u{2014}\u{2014}\u{2014}\u{2014} caf\u{e9}");
        assert_eq!(decode_entities("&\u{e9}\u{e9}\u{e9}&amp;"), "&\u{e9}\u{e9}\u{e9}&");
    }
}
