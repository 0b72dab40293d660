//! Native PDF layout via `printpdf` built-in fonts.
//!
//! Layout happens in two phases: `layout()` places text on A4 pages in
//! millimetre coordinates (pure, testable), then `PdfRasterizer` paints the
//! placed items. Blocks (headings, paragraphs, list items, table rows) are
//! kept whole: a block that does not fit in the remaining space moves to the
//! next page. Only a block taller than an entire page is split.

use std::io::BufWriter;

use printpdf::{BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, Rgb};

use super::{PolicyDocument, RenderError, Rasterizer};
use crate::config::PRODUCT_LABEL;
use crate::document::html::{parse_blocks, Block, Run};
use crate::document::template::display_field;

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 22.0;
const CONTENT_TOP: f32 = PAGE_HEIGHT_MM - MARGIN_MM;
const CONTENT_BOTTOM: f32 = MARGIN_MM;
const CONTENT_WIDTH: f32 = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
const FOOTER_Y: f32 = 10.0;

const PT_TO_MM: f32 = 0.3528;
/// Average Helvetica glyph advance as a fraction of the font size.
const REGULAR_ADVANCE: f32 = 0.52;
const BOLD_ADVANCE: f32 = 0.56;

const BODY_PT: f32 = 10.5;
const LINE_SPACING: f32 = 1.5;
const LIST_INDENT_MM: f32 = 6.0;
const CELL_PADDING_MM: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl FontStyle {
    fn of(run: &Run, force_bold: bool) -> Self {
        match (run.bold || force_bold, run.italic) {
            (false, false) => FontStyle::Regular,
            (true, false) => FontStyle::Bold,
            (false, true) => FontStyle::Italic,
            (true, true) => FontStyle::BoldItalic,
        }
    }

    fn is_bold(self) -> bool {
        matches!(self, FontStyle::Bold | FontStyle::BoldItalic)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Body,
    Strong,
    Muted,
}

/// A run of text at an absolute position (baseline, millimetres from the
/// bottom-left corner).
#[derive(Debug, Clone, PartialEq)]
pub struct Placed {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub style: FontStyle,
    pub tone: Tone,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub items: Vec<Placed>,
}

impl PageLayout {
    pub fn text(&self) -> String {
        self.items
            .iter()
            .map(|i| i.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Built-in PDF fonts only cover Latin text; map common typographic
/// characters to ASCII and replace the rest.
pub fn pdf_safe_text(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{a0}' | '\t' => ' ',
            '\u{2010}'..='\u{2015}' => '-',
            '\u{2018}' | '\u{2019}' | '\u{201a}' => '\'',
            '\u{201c}' | '\u{201d}' | '\u{201e}' => '"',
            '\u{2022}' | '\u{25cf}' | '\u{25aa}' => '-',
            '\u{2026}' => '.',
            c if c.is_ascii() => c,
            _ => '?',
        })
        .collect()
}

fn text_width(text: &str, size: f32, style: FontStyle) -> f32 {
    let advance = if style.is_bold() { BOLD_ADVANCE } else { REGULAR_ADVANCE };
    text.chars().count() as f32 * size * advance * PT_TO_MM
}

fn line_height(size: f32) -> f32 {
    size * LINE_SPACING * PT_TO_MM
}

/// A block laid out relative to its own top edge; `dy` is the distance from
/// the block top down to each item's baseline.
#[derive(Debug, Default)]
struct LaidBlock {
    items: Vec<(f32, Placed)>,
    height: f32,
    space_before: f32,
}

/// Greedy word wrap of styled runs into lines no wider than `width`.
/// Lines only break at whitespace; a single over-long word overflows.
fn wrap_runs(runs: &[Run], size: f32, width: f32, force_bold: bool) -> Vec<Vec<(String, FontStyle)>> {
    let mut lines: Vec<Vec<(String, FontStyle)>> = vec![Vec::new()];
    let mut line_width = 0.0_f32;
    let space = size * REGULAR_ADVANCE * PT_TO_MM;
    let mut pending_space = false;

    for run in runs {
        let style = FontStyle::of(run, force_bold);
        let text = pdf_safe_text(&run.text);
        for (i, hard_line) in text.split('\n').enumerate() {
            if i > 0 {
                lines.push(Vec::new());
                line_width = 0.0;
                pending_space = false;
            }
            for (j, word) in hard_line.split(' ').enumerate() {
                if j > 0 {
                    pending_space = true;
                }
                if word.is_empty() {
                    continue;
                }
                let w = text_width(word, size, style);
                let mut spaced = pending_space && line_width > 0.0;
                pending_space = false;
                if spaced && line_width + space + w > width {
                    lines.push(Vec::new());
                    line_width = 0.0;
                    spaced = false;
                }
                let Some(line) = lines.last_mut() else { continue };
                if spaced {
                    if let Some((text, _)) = line.last_mut() {
                        text.push(' ');
                    }
                    line_width += space;
                }
                match line.last_mut() {
                    Some((text, s)) if *s == style => text.push_str(word),
                    _ => line.push((word.to_string(), style)),
                }
                line_width += w;
            }
        }
    }
    lines.retain(|l| !l.is_empty());
    lines
}

/// Lay styled runs out as a block of lines starting at `x`.
fn text_block(runs: &[Run], size: f32, x: f32, width: f32, tone: Tone, force_bold: bool) -> LaidBlock {
    let lh = line_height(size);
    let mut block = LaidBlock::default();
    for (n, line) in wrap_runs(runs, size, width, force_bold).into_iter().enumerate() {
        let mut cursor = x;
        let baseline = n as f32 * lh + size * PT_TO_MM;
        for (text, style) in line {
            let w = text_width(&text, size, style);
            block.items.push((
                baseline,
                Placed {
                    text,
                    x: cursor,
                    y: 0.0,
                    size,
                    style,
                    tone,
                },
            ));
            cursor += w;
        }
        block.height = (n + 1) as f32 * lh;
    }
    block
}

fn heading_size(level: u8) -> (f32, f32) {
    match level {
        1 => (16.5, 6.0),
        2 => (13.5, 5.0),
        3 => (12.0, 4.0),
        _ => (11.0, 3.5),
    }
}

fn lay_out_block(block: &Block) -> Option<LaidBlock> {
    match block {
        Block::Heading { level, runs } => {
            let (size, space) = heading_size(*level);
            let mut laid = text_block(runs, size, MARGIN_MM, CONTENT_WIDTH, Tone::Strong, true);
            laid.space_before = space;
            Some(laid)
        }
        Block::Paragraph { runs } => {
            let mut laid = text_block(runs, BODY_PT, MARGIN_MM, CONTENT_WIDTH, Tone::Body, false);
            if laid.items.is_empty() {
                // a deliberate blank line (`<p>&nbsp;</p>`)
                laid.height = line_height(BODY_PT);
            }
            laid.space_before = 2.5;
            Some(laid)
        }
        Block::ListItem { ordered, number, depth, runs } => {
            let indent = MARGIN_MM + LIST_INDENT_MM * (*depth as f32 + 1.0);
            let mut laid = text_block(runs, BODY_PT, indent, CONTENT_WIDTH - (indent - MARGIN_MM), Tone::Body, false);
            let marker = if *ordered { format!("{number}.") } else { "-".to_string() };
            laid.items.insert(
                0,
                (
                    BODY_PT * PT_TO_MM,
                    Placed {
                        text: marker,
                        x: indent - 5.0,
                        y: 0.0,
                        size: BODY_PT,
                        style: FontStyle::Regular,
                        tone: Tone::Body,
                    },
                ),
            );
            laid.height = laid.height.max(line_height(BODY_PT));
            laid.space_before = 1.0;
            Some(laid)
        }
        Block::TableRow { header, cells } => {
            let columns = cells.len().max(1);
            let col_width = CONTENT_WIDTH / columns as f32;
            let mut laid = LaidBlock {
                space_before: 0.5,
                ..LaidBlock::default()
            };
            for (i, cell) in cells.iter().enumerate() {
                let x = MARGIN_MM + i as f32 * col_width + CELL_PADDING_MM;
                let tone = if *header { Tone::Strong } else { Tone::Body };
                let cell_block = text_block(cell, BODY_PT, x, col_width - 2.0 * CELL_PADDING_MM, tone, *header);
                laid.height = laid.height.max(cell_block.height + 2.0 * CELL_PADDING_MM);
                laid.items.extend(
                    cell_block
                        .items
                        .into_iter()
                        .map(|(dy, item)| (dy + CELL_PADDING_MM, item)),
                );
            }
            Some(laid)
        }
        Block::PageBreak => None,
    }
}

fn header_block(document: &PolicyDocument) -> LaidBlock {
    let label_pt = 8.5;
    let value_x = MARGIN_MM + 32.0;
    let mut block = LaidBlock::default();
    let mut dy = 0.0;
    let rows = [
        ("SECTION", &document.meta.section, 10.5),
        ("NUMBER", &document.meta.number, 10.5),
        ("SUBJECT", &document.meta.subject, 13.5),
    ];
    for (label, value, size) in rows {
        let baseline = dy + size * PT_TO_MM;
        block.items.push((
            baseline,
            Placed {
                text: label.to_string(),
                x: MARGIN_MM,
                y: 0.0,
                size: label_pt,
                style: FontStyle::Regular,
                tone: Tone::Muted,
            },
        ));
        block.items.push((
            baseline,
            Placed {
                text: pdf_safe_text(display_field(value)),
                x: value_x,
                y: 0.0,
                size,
                style: FontStyle::Bold,
                tone: Tone::Strong,
            },
        ));
        dy += line_height(size);
    }
    let product_width = text_width(PRODUCT_LABEL, 9.0, FontStyle::Regular);
    block.items.push((
        dy - 2.0,
        Placed {
            text: PRODUCT_LABEL.to_string(),
            x: MARGIN_MM + CONTENT_WIDTH - product_width,
            y: 0.0,
            size: 9.0,
            style: FontStyle::Regular,
            tone: Tone::Muted,
        },
    ));
    block.height = dy + 6.0;
    block
}

struct Paginator {
    pages: Vec<PageLayout>,
    cursor: f32,
}

impl Paginator {
    fn new() -> Self {
        Self {
            pages: vec![PageLayout::default()],
            cursor: CONTENT_TOP,
        }
    }

    fn page_is_empty(&self) -> bool {
        self.pages.last().map_or(true, |p| p.items.is_empty())
    }

    fn new_page(&mut self) {
        self.pages.push(PageLayout::default());
        self.cursor = CONTENT_TOP;
    }

    fn push(&mut self, item: Placed) {
        if let Some(page) = self.pages.last_mut() {
            page.items.push(item);
        }
    }

    fn place(&mut self, block: LaidBlock) {
        let space = if self.page_is_empty() { 0.0 } else { block.space_before };
        let needed = space + block.height;
        let page_height = CONTENT_TOP - CONTENT_BOTTOM;

        if self.cursor - needed < CONTENT_BOTTOM && !self.page_is_empty() && block.height <= page_height {
            self.new_page();
        }
        if block.height <= page_height {
            let top = self.cursor - if self.page_is_empty() { 0.0 } else { space };
            for (dy, mut item) in block.items {
                item.y = top - dy;
                self.push(item);
            }
            self.cursor = top - block.height;
            return;
        }

        // taller than a page: flow line by line
        let mut items = block.items;
        items.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut top = self.cursor - space;
        let mut shift = 0.0;
        for (dy, mut item) in items {
            let mut y = top - (dy - shift);
            if y < CONTENT_BOTTOM {
                self.new_page();
                top = self.cursor;
                shift = dy - item.size * PT_TO_MM;
                y = top - (dy - shift);
            }
            item.y = y;
            self.push(item);
        }
        self.cursor = top - (block.height - shift);
    }

    fn finish(mut self) -> Vec<PageLayout> {
        for (i, page) in self.pages.iter_mut().enumerate() {
            let label = format!("Page {}", i + 1);
            let width = text_width(&label, 8.5, FontStyle::Regular);
            page.items.push(Placed {
                text: label,
                x: MARGIN_MM + CONTENT_WIDTH - width,
                y: FOOTER_Y,
                size: 8.5,
                style: FontStyle::Regular,
                tone: Tone::Muted,
            });
        }
        self.pages
    }
}

/// Place the header, body blocks and page footers of a policy on A4 pages.
pub fn layout(document: &PolicyDocument) -> Vec<PageLayout> {
    let mut paginator = Paginator::new();
    paginator.place(header_block(document));
    for block in parse_blocks(&document.body_html) {
        match lay_out_block(&block) {
            Some(laid) => paginator.place(laid),
            None => {
                if !paginator.page_is_empty() {
                    paginator.new_page();
                }
            }
        }
    }
    paginator.finish()
}

/// Built-in renderer: no external dependencies, Helvetica family only.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfRasterizer;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
    bold_italic: IndirectFontRef,
}

impl Fonts {
    fn get(&self, style: FontStyle) -> &IndirectFontRef {
        match style {
            FontStyle::Regular => &self.regular,
            FontStyle::Bold => &self.bold,
            FontStyle::Italic => &self.italic,
            FontStyle::BoldItalic => &self.bold_italic,
        }
    }
}

fn tone_color(tone: Tone) -> Color {
    let (r, g, b) = match tone {
        Tone::Body => (0.067, 0.094, 0.153),
        Tone::Strong => (0.059, 0.090, 0.165),
        Tone::Muted => (0.420, 0.447, 0.502),
    };
    Color::Rgb(Rgb::new(r, g, b, None))
}

impl Rasterizer for PdfRasterizer {
    fn rasterize(&self, document: &PolicyDocument) -> Result<Vec<u8>, RenderError> {
        let pages = layout(document);
        let title = pdf_safe_text(display_field(&document.meta.subject));
        let (doc, page1, layer1) =
            PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");

        let font = |f: BuiltinFont| {
            doc.add_builtin_font(f)
                .map_err(|e| RenderError::Pdf(format!("font error: {e}")))
        };
        let fonts = Fonts {
            regular: font(BuiltinFont::Helvetica)?,
            bold: font(BuiltinFont::HelveticaBold)?,
            italic: font(BuiltinFont::HelveticaOblique)?,
            bold_italic: font(BuiltinFont::HelveticaBoldOblique)?,
        };

        for (i, page) in pages.iter().enumerate() {
            let (page_index, layer_index) = if i == 0 {
                (page1, layer1)
            } else {
                doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1")
            };
            let layer = doc.get_page(page_index).get_layer(layer_index);
            for item in &page.items {
                layer.set_fill_color(tone_color(item.tone));
                layer.use_text(
                    item.text.as_str(),
                    item.size,
                    Mm(item.x),
                    Mm(item.y),
                    fonts.get(item.style),
                );
            }
        }

        let mut buf = BufWriter::new(Vec::new());
        doc.save(&mut buf)
            .map_err(|e| RenderError::Pdf(format!("save error: {e}")))?;
        buf.into_inner()
            .map_err(|e| RenderError::Pdf(format!("buffer error: {e}")))
    }
}
