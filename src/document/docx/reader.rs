use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{CodecError, ConvertedDocument};
use crate::document::html::Run;
use crate::document::template::escape_html;

pub const DOCUMENT_PART: &str = "word/document.xml";
pub const STYLES_PART: &str = "word/styles.xml";
pub const NUMBERING_PART: &str = "word/numbering.xml";

/// Subtrees whose content is not part of the running text (drawings,
/// text boxes, embedded objects, alternate renderings).
const SKIPPED: &[&[u8]] = &[b"AlternateContent", b"drawing", b"pict", b"object"];

#[derive(Debug, Default)]
struct Paragraph {
    style_id: Option<String>,
    num_id: Option<String>,
    level: u32,
    runs: Vec<Run>,
    break_before: bool,
    break_after: bool,
}

impl Paragraph {
    fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

type Cell = Vec<Paragraph>;
type Row = Vec<Cell>;

#[derive(Debug)]
enum BodyItem {
    Paragraph(Paragraph),
    Table(Vec<Row>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParagraphKind {
    Heading(u8),
    ListItem { ordered: bool, level: u32 },
    Body,
}

/// styleId → lower-cased display name.
fn parse_styles(xml: &str) -> Result<HashMap<String, String>, CodecError> {
    let mut styles = HashMap::new();
    let mut reader = Reader::from_str(xml);
    let mut current: Option<String> = None;
    loop {
        match reader.read_event().map_err(|e| xml_error(STYLES_PART, e))? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"style" => current = attr(&e, b"styleId"),
                b"name" => {
                    if let (Some(id), Some(name)) = (current.as_ref(), attr(&e, b"val")) {
                        styles.insert(id.clone(), name.to_lowercase());
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(styles)
}

#[derive(Debug, Default)]
struct Numbering {
    /// (abstractNumId, ilvl) → numFmt
    formats: HashMap<(String, u32), String>,
    /// numId → abstractNumId
    instances: HashMap<String, String>,
}

impl Numbering {
    fn parse(xml: &str) -> Result<Self, CodecError> {
        let mut numbering = Numbering::default();
        let mut reader = Reader::from_str(xml);
        let mut abstract_id: Option<String> = None;
        let mut level: Option<u32> = None;
        let mut num_id: Option<String> = None;
        loop {
            match reader.read_event().map_err(|e| xml_error(NUMBERING_PART, e))? {
                Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                    b"abstractNum" => abstract_id = attr(&e, b"abstractNumId"),
                    b"lvl" => level = attr(&e, b"ilvl").and_then(|v| v.parse().ok()),
                    b"numFmt" => {
                        if let (Some(a), Some(l), Some(fmt)) = (abstract_id.as_ref(), level, attr(&e, b"val")) {
                            numbering.formats.insert((a.clone(), l), fmt);
                        }
                    }
                    b"num" => num_id = attr(&e, b"numId"),
                    b"abstractNumId" => {
                        if let (Some(n), Some(a)) = (num_id.as_ref(), attr(&e, b"val")) {
                            numbering.instances.insert(n.clone(), a);
                        }
                    }
                    _ => {}
                },
                Event::End(e) => match e.local_name().as_ref() {
                    b"abstractNum" => abstract_id = None,
                    b"num" => num_id = None,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(numbering)
    }

    /// `None` when the list definition is unknown.
    fn is_ordered(&self, num_id: &str, level: u32) -> Option<bool> {
        let abstract_id = self.instances.get(num_id)?;
        let fmt = self.formats.get(&(abstract_id.clone(), level))?;
        Some(!matches!(fmt.as_str(), "bullet" | "none"))
    }
}

fn attr(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Toggle properties (`<w:b/>`, `<w:b w:val="false"/>`).
fn toggle_on(e: &BytesStart<'_>) -> bool {
    !matches!(attr(e, b"val").as_deref(), Some("0" | "false" | "off" | "none"))
}

fn xml_error(part: &'static str, e: impl std::fmt::Display) -> CodecError {
    CodecError::Xml {
        part,
        reason: e.to_string(),
    }
}

#[derive(Default)]
struct BodyParser {
    items: Vec<BodyItem>,
    tables: Vec<Vec<Row>>,
    paragraph: Option<Paragraph>,
    run: Option<Run>,
    in_paragraph_props: bool,
    in_text: bool,
    skip: usize,
    skipped_graphics: usize,
}

impl BodyParser {
    fn open(&mut self, e: &BytesStart<'_>, empty: bool) {
        let name = e.local_name();
        let name = name.as_ref();
        if SKIPPED.contains(&name) {
            if self.skip == 0 {
                self.skipped_graphics += 1;
            }
            if !empty {
                self.skip += 1;
            }
            return;
        }
        if self.skip > 0 {
            return;
        }
        match name {
            b"p" => {
                self.paragraph = Some(Paragraph::default());
                if empty {
                    self.close_paragraph();
                }
            }
            b"pPr" => self.in_paragraph_props = !empty,
            b"pStyle" if self.in_paragraph_props => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.style_id = attr(e, b"val");
                }
            }
            b"numId" if self.in_paragraph_props => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.num_id = attr(e, b"val").filter(|v| v != "0");
                }
            }
            b"ilvl" if self.in_paragraph_props => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.level = attr(e, b"val").and_then(|v| v.parse().ok()).unwrap_or(0);
                }
            }
            b"pageBreakBefore" if self.in_paragraph_props && toggle_on(e) => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.break_before = true;
                }
            }
            b"r" if !self.in_paragraph_props => {
                self.run = Some(Run::default());
                if empty {
                    self.run = None;
                }
            }
            b"b" | b"i" | b"u" => {
                if let Some(run) = self.run.as_mut() {
                    let on = toggle_on(e);
                    match name {
                        b"b" => run.bold = on,
                        b"i" => run.italic = on,
                        _ => run.underline = on,
                    }
                }
            }
            b"t" if self.run.is_some() => self.in_text = !empty,
            b"tab" if self.run.is_some() => self.push_text("\t"),
            b"br" | b"cr" if self.run.is_some() => {
                if attr(e, b"type").as_deref() == Some("page") {
                    if let Some(p) = self.paragraph.as_mut() {
                        if p.runs.is_empty() && p.text().is_empty() {
                            p.break_before = true;
                        } else {
                            p.break_after = true;
                        }
                    }
                } else {
                    self.push_text("\n");
                }
            }
            b"tbl" => self.tables.push(Vec::new()),
            b"tr" => {
                if let Some(table) = self.tables.last_mut() {
                    table.push(Vec::new());
                }
            }
            b"tc" => {
                if let Some(row) = self.tables.last_mut().and_then(|t| t.last_mut()) {
                    row.push(Vec::new());
                }
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        if self.skip > 0 {
            if SKIPPED.contains(&name) {
                self.skip -= 1;
            }
            return;
        }
        match name {
            b"p" => self.close_paragraph(),
            b"pPr" => self.in_paragraph_props = false,
            b"r" => self.close_run(),
            b"t" => self.in_text = false,
            b"tbl" => {
                let Some(rows) = self.tables.pop() else {
                    return;
                };
                match self.tables.last_mut().and_then(|t| t.last_mut()).and_then(|r| r.last_mut()) {
                    // nested table: flatten its paragraphs into the enclosing cell
                    Some(cell) => cell.extend(rows.into_iter().flatten().flatten()),
                    None => self.items.push(BodyItem::Table(rows)),
                }
            }
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(run) = self.run.as_mut() {
            run.text.push_str(text);
        }
    }

    fn close_run(&mut self) {
        let (Some(run), Some(p)) = (self.run.take(), self.paragraph.as_mut()) else {
            return;
        };
        if run.text.is_empty() {
            return;
        }
        match p.runs.last_mut() {
            Some(last) if last.bold == run.bold && last.italic == run.italic && last.underline == run.underline => {
                last.text.push_str(&run.text);
            }
            _ => p.runs.push(run),
        }
    }

    fn close_paragraph(&mut self) {
        self.close_run();
        self.in_paragraph_props = false;
        let Some(p) = self.paragraph.take() else {
            return;
        };
        match self.tables.last_mut().and_then(|t| t.last_mut()).and_then(|r| r.last_mut()) {
            Some(cell) => cell.push(p),
            None => self.items.push(BodyItem::Paragraph(p)),
        }
    }
}

fn classify(p: &Paragraph, styles: &HashMap<String, String>, numbering: &Numbering) -> ParagraphKind {
    let style_name = p
        .style_id
        .as_ref()
        .map(|id| styles.get(id).cloned().unwrap_or_else(|| id.to_lowercase()))
        .unwrap_or_default();

    if style_name == "title" {
        return ParagraphKind::Heading(1);
    }
    if let Some(level) = style_name
        .strip_prefix("heading")
        .map(str::trim)
        .and_then(|n| n.parse::<u8>().ok())
    {
        return ParagraphKind::Heading(level.clamp(1, 6));
    }
    if let Some(num_id) = p.num_id.as_deref() {
        let ordered = numbering
            .is_ordered(num_id, p.level)
            .unwrap_or_else(|| style_name.contains("number"));
        return ParagraphKind::ListItem {
            ordered,
            level: p.level,
        };
    }
    let compact = style_name.replace(' ', "");
    if compact.starts_with("listnumber") {
        return ParagraphKind::ListItem { ordered: true, level: 0 };
    }
    if compact.starts_with("listparagraph") || compact.starts_with("listbullet") {
        return ParagraphKind::ListItem { ordered: false, level: 0 };
    }
    ParagraphKind::Body
}

fn runs_html(runs: &[Run]) -> String {
    let mut out = String::new();
    for run in runs {
        if run.bold {
            out.push_str("<strong>");
        }
        if run.italic {
            out.push_str("<em>");
        }
        if run.underline {
            out.push_str("<u>");
        }
        out.push_str(&escape_html(&run.text).replace('\n', "<br />"));
        if run.underline {
            out.push_str("</u>");
        }
        if run.italic {
            out.push_str("</em>");
        }
        if run.bold {
            out.push_str("</strong>");
        }
    }
    out
}

struct HtmlEmitter<'a> {
    out: String,
    lists: Vec<bool>,
    styles: &'a HashMap<String, String>,
    numbering: &'a Numbering,
}

impl HtmlEmitter<'_> {
    fn close_lists_to(&mut self, depth: usize) {
        while self.lists.len() > depth {
            let ordered = self.lists.pop().unwrap_or(false);
            self.out.push_str(if ordered { "</ol>" } else { "</ul>" });
        }
    }

    fn open_list(&mut self, ordered: bool) {
        self.out.push_str(if ordered { "<ol>" } else { "<ul>" });
        self.lists.push(ordered);
    }

    fn paragraph(&mut self, p: &Paragraph) {
        if p.break_before {
            self.close_lists_to(0);
            self.out.push_str(r#"<div class="page-break"></div>"#);
        }
        match classify(p, self.styles, self.numbering) {
            ParagraphKind::ListItem { ordered, level } => {
                let depth = level as usize + 1;
                self.close_lists_to(depth);
                if self.lists.len() == depth && self.lists.last() != Some(&ordered) {
                    self.close_lists_to(depth - 1);
                }
                while self.lists.len() < depth {
                    self.open_list(ordered);
                }
                self.out.push_str("<li>");
                self.out.push_str(&runs_html(&p.runs));
                self.out.push_str("</li>");
            }
            ParagraphKind::Heading(level) => {
                self.close_lists_to(0);
                self.out.push_str(&format!("<h{level}>{}</h{level}>", runs_html(&p.runs)));
            }
            ParagraphKind::Body => {
                self.close_lists_to(0);
                self.out.push_str("<p>");
                self.out.push_str(&runs_html(&p.runs));
                self.out.push_str("</p>");
            }
        }
        if p.break_after {
            self.close_lists_to(0);
            self.out.push_str(r#"<div class="page-break"></div>"#);
        }
    }

    fn table(&mut self, rows: &[Row]) {
        self.close_lists_to(0);
        self.out.push_str("<table>");
        for row in rows {
            self.out.push_str("<tr>");
            for cell in row {
                self.out.push_str("<td>");
                for p in cell {
                    self.out.push_str("<p>");
                    self.out.push_str(&runs_html(&p.runs));
                    self.out.push_str("</p>");
                }
                self.out.push_str("</td>");
            }
            self.out.push_str("</tr>");
        }
        self.out.push_str("</table>");
    }
}

fn raw_text(items: &[BodyItem]) -> String {
    let mut out = String::new();
    let mut push = |p: &Paragraph| {
        out.push_str(&p.text());
        out.push_str("\n\n");
    };
    for item in items {
        match item {
            BodyItem::Paragraph(p) => push(p),
            BodyItem::Table(rows) => rows.iter().flatten().flatten().for_each(&mut push),
        }
    }
    out
}

/// Convert the main document part (plus optional styles and numbering
/// parts) into HTML and raw text.
pub fn convert(
    document_xml: &str,
    styles_xml: Option<&str>,
    numbering_xml: Option<&str>,
) -> Result<ConvertedDocument, CodecError> {
    let styles = styles_xml.map(parse_styles).transpose()?.unwrap_or_default();
    let numbering = numbering_xml.map(Numbering::parse).transpose()?.unwrap_or_default();

    let mut parser = BodyParser::default();
    let mut reader = Reader::from_str(document_xml);
    loop {
        match reader.read_event().map_err(|e| xml_error(DOCUMENT_PART, e))? {
            Event::Start(e) => parser.open(&e, false),
            Event::Empty(e) => parser.open(&e, true),
            Event::End(e) => parser.close(e.local_name().as_ref()),
            Event::Text(t) if parser.in_text && parser.skip == 0 => {
                let text = t.unescape().map_err(|e| xml_error(DOCUMENT_PART, e))?;
                parser.push_text(&text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let mut messages = Vec::new();
    if parser.skipped_graphics > 0 {
        messages.push(format!(
            "Skipped {} embedded image(s) or drawing(s)",
            parser.skipped_graphics
        ));
    }
    let unknown_lists = parser
        .items
        .iter()
        .filter_map(|item| match item {
            BodyItem::Paragraph(p) => p.num_id.as_deref().map(|id| (id, p.level)),
            BodyItem::Table(_) => None,
        })
        .filter(|(id, level)| numbering.is_ordered(id, *level).is_none())
        .count();
    if unknown_lists > 0 {
        messages.push(format!(
            "{unknown_lists} list paragraph(s) reference undefined numbering; rendered as bullets"
        ));
    }

    let mut emitter = HtmlEmitter {
        out: String::new(),
        lists: Vec::new(),
        styles: &styles,
        numbering: &numbering,
    };
    for item in &parser.items {
        match item {
            BodyItem::Paragraph(p) => emitter.paragraph(p),
            BodyItem::Table(rows) => emitter.table(rows),
        }
    }
    emitter.close_lists_to(0);

    Ok(ConvertedDocument {
        html: emitter.out,
        raw_text: raw_text(&parser.items),
        messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> String {
        format!(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        )
    }

    const STYLES: &str = r#"<w:styles xmlns:w="w">
        <w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/></w:style>
        <w:style w:type="paragraph" w:styleId="ListParagraph"><w:name w:val="List Paragraph"/></w:style>
    </w:styles>"#;

    const NUMBERING: &str = r#"<w:numbering xmlns:w="w">
        <w:abstractNum w:abstractNumId="0"><w:lvl w:ilvl="0"><w:numFmt w:val="bullet"/></w:lvl><w:lvl w:ilvl="1"><w:numFmt w:val="bullet"/></w:lvl></w:abstractNum>
        <w:abstractNum w:abstractNumId="1"><w:lvl w:ilvl="0"><w:numFmt w:val="decimal"/></w:lvl></w:abstractNum>
        <w:num w:numId="5"><w:abstractNumId w:val="0"/></w:num>
        <w:num w:numId="6"><w:abstractNumId w:val="1"/></w:num>
    </w:numbering>"#;

    fn list_para(num_id: u32, level: u32, text: &str) -> String {
        format!(
            r#"<w:p><w:pPr><w:pStyle w:val="ListParagraph"/><w:numPr><w:ilvl w:val="{level}"/><w:numId w:val="{num_id}"/></w:numPr></w:pPr><w:r><w:t>{text}</w:t></w:r></w:p>"#
        )
    }

    #[test]
    fn headings_from_style_names() {
        let xml = doc(r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Overview</w:t></w:r></w:p>"#);
        let out = convert(&xml, Some(STYLES), None).unwrap();
        assert_eq!(out.html, "<h1>Overview</h1>");
    }

    #[test]
    fn inline_formatting_and_escaping() {
        let xml = doc(
            r#"<w:p><w:r><w:t xml:space="preserve">Fees &amp; </w:t></w:r><w:r><w:rPr><w:b/><w:i/></w:rPr><w:t>charges</w:t></w:r><w:r><w:rPr><w:b w:val="0"/></w:rPr><w:t xml:space="preserve"> &lt;apply&gt;</w:t></w:r></w:p>"#,
        );
        let out = convert(&xml, None, None).unwrap();
        assert_eq!(out.html, "<p>Fees &amp; <strong><em>charges</em></strong> &lt;apply&gt;</p>");
        assert_eq!(out.raw_text, "Fees & charges <apply>\n\n");
    }

    #[test]
    fn numbered_and_bulleted_lists_nest() {
        let body = [
            list_para(6, 0, "First"),
            list_para(5, 1, "Detail"),
            list_para(6, 0, "Second"),
            r#"<w:p><w:r><w:t>After</w:t></w:r></w:p>"#.to_string(),
        ]
        .concat();
        let out = convert(&doc(&body), Some(STYLES), Some(NUMBERING)).unwrap();
        assert_eq!(
            out.html,
            "<ol><li>First</li><ul><li>Detail</li></ul><li>Second</li></ol><p>After</p>"
        );
        assert!(out.messages.is_empty());
    }

    #[test]
    fn list_paragraph_style_without_numbering_is_bullet() {
        let xml = doc(r#"<w:p><w:pPr><w:pStyle w:val="ListParagraph"/></w:pPr><w:r><w:t>Item</w:t></w:r></w:p>"#);
        let out = convert(&xml, Some(STYLES), None).unwrap();
        assert_eq!(out.html, "<ul><li>Item</li></ul>");
    }

    #[test]
    fn undefined_numbering_is_reported() {
        let out = convert(&doc(&list_para(9, 0, "Orphan")), Some(STYLES), Some(NUMBERING)).unwrap();
        assert_eq!(out.html, "<ul><li>Orphan</li></ul>");
        assert_eq!(out.messages.len(), 1);
    }

    #[test]
    fn tables_and_page_breaks() {
        let xml = doc(
            r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>Role</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Duty</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
               <w:p><w:r><w:br w:type="page"/></w:r><w:r><w:t>Next page</w:t></w:r></w:p>"#,
        );
        let out = convert(&xml, None, None).unwrap();
        assert_eq!(
            out.html,
            r#"<table><tr><td><p>Role</p></td><td><p>Duty</p></td></tr></table><div class="page-break"></div><p>Next page</p>"#
        );
        assert_eq!(out.raw_text, "Role\n\nDuty\n\nNext page\n\n");
    }

    #[test]
    fn drawings_are_skipped_with_message() {
        let xml = doc(
            r#"<w:p><w:r><w:t>Logo:</w:t></w:r><w:r><w:drawing><wp:inline><w:p><w:r><w:t>hidden</w:t></w:r></w:p></wp:inline></w:drawing></w:r></w:p>"#,
        );
        let out = convert(&xml, None, None).unwrap();
        assert_eq!(out.html, "<p>Logo:</p>");
        assert_eq!(out.messages, vec!["Skipped 1 embedded image(s) or drawing(s)".to_string()]);
    }

    #[test]
    fn tabs_and_line_breaks() {
        let xml = doc(r#"<w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r></w:p>"#);
        let out = convert(&xml, None, None).unwrap();
        assert_eq!(out.html, "<p>a\tb<br />c</p>");
    }

    #[test]
    fn empty_paragraphs_are_kept() {
        let out = convert(&doc("<w:p/><w:p></w:p>"), None, None).unwrap();
        assert_eq!(out.html, "<p></p><p></p>");
    }

    #[test]
    fn malformed_xml_is_error() {
        let err = convert("<w:document><w:body><w:p></w:body>", None, None).unwrap_err();
        assert!(matches!(err, CodecError::Xml { part: DOCUMENT_PART, .. }));
    }
}
