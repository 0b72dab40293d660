use std::io::{Cursor, Write};

use quick_xml::escape::escape;

use super::CodecError;
use crate::document::html::{parse_blocks, Block, Run};

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Body font size in half-points (11pt).
const BODY_HALF_POINTS: u32 = 22;
/// Usable width of an A4 page with 1" margins, in twentieths of a point.
const TEXT_WIDTH_TWIPS: u32 = 9026;

const BULLET_NUM_ID: u32 = 1;
const DECIMAL_NUM_ID: u32 = 2;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/><Override PartName="/word/numbering.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/></Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering" Target="numbering.xml"/></Relationships>"#;

fn styles_xml() -> String {
    let mut out = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="{W_NS}"><w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri" w:cs="Calibri"/><w:sz w:val="{BODY_HALF_POINTS}"/><w:szCs w:val="{BODY_HALF_POINTS}"/></w:rPr></w:rPrDefault><w:pPrDefault><w:pPr><w:spacing w:after="160" w:line="276" w:lineRule="auto"/></w:pPr></w:pPrDefault></w:docDefaults><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style><w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:pPr><w:keepNext/></w:pPr><w:rPr><w:b/><w:sz w:val="44"/></w:rPr></w:style>"#
    );
    for (level, size) in [(1, 36), (2, 30), (3, 26), (4, 24), (5, 22), (6, 22)] {
        out.push_str(&format!(
            r#"<w:style w:type="paragraph" w:styleId="Heading{level}"><w:name w:val="heading {level}"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:keepNext/><w:keepLines/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="{}"/></w:pPr><w:rPr><w:b/><w:color w:val="0F172A"/><w:sz w:val="{size}"/></w:rPr></w:style>"#,
            level - 1
        ));
    }
    out.push_str(r#"<w:style w:type="paragraph" w:styleId="ListParagraph"><w:name w:val="List Paragraph"/><w:basedOn w:val="Normal"/><w:pPr><w:ind w:left="720"/><w:contextualSpacing/></w:pPr></w:style>"#);
    out.push_str(r#"<w:style w:type="table" w:styleId="TableGrid"><w:name w:val="Table Grid"/><w:tblPr><w:tblBorders><w:top w:val="single" w:sz="4" w:space="0" w:color="E5E7EB"/><w:left w:val="single" w:sz="4" w:space="0" w:color="E5E7EB"/><w:bottom w:val="single" w:sz="4" w:space="0" w:color="E5E7EB"/><w:right w:val="single" w:sz="4" w:space="0" w:color="E5E7EB"/><w:insideH w:val="single" w:sz="4" w:space="0" w:color="E5E7EB"/><w:insideV w:val="single" w:sz="4" w:space="0" w:color="E5E7EB"/></w:tblBorders></w:tblPr></w:style>"#);
    out.push_str("</w:styles>");
    out
}

fn numbering_xml() -> String {
    let mut out = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:numbering xmlns:w="{W_NS}">"#
    );
    for (abstract_id, ordered) in [(0, false), (1, true)] {
        out.push_str(&format!(r#"<w:abstractNum w:abstractNumId="{abstract_id}"><w:multiLevelType w:val="hybridMultilevel"/>"#));
        for level in 0..9u32 {
            let (fmt, text) = if ordered {
                ("decimal", format!("%{}.", level + 1))
            } else {
                ("bullet", "\u{2022}".to_string())
            };
            out.push_str(&format!(
                r#"<w:lvl w:ilvl="{level}"><w:start w:val="1"/><w:numFmt w:val="{fmt}"/><w:lvlText w:val="{text}"/><w:lvlJc w:val="left"/><w:pPr><w:ind w:left="{}" w:hanging="360"/></w:pPr></w:lvl>"#,
                720 * (level + 1)
            ));
        }
        out.push_str("</w:abstractNum>");
    }
    out.push_str(&format!(
        r#"<w:num w:numId="{BULLET_NUM_ID}"><w:abstractNumId w:val="0"/></w:num><w:num w:numId="{DECIMAL_NUM_ID}"><w:abstractNumId w:val="1"/></w:num></w:numbering>"#
    ));
    out
}

fn core_xml(title: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>{}</dc:title></cp:coreProperties>"#,
        escape(title)
    )
}

fn run_xml(run: &Run, force_bold: bool, out: &mut String) {
    out.push_str("<w:r>");
    if run.bold || force_bold || run.italic || run.underline {
        out.push_str("<w:rPr>");
        if run.bold || force_bold {
            out.push_str("<w:b/>");
        }
        if run.italic {
            out.push_str("<w:i/>");
        }
        if run.underline {
            out.push_str(r#"<w:u w:val="single"/>"#);
        }
        out.push_str("</w:rPr>");
    }
    let mut segment = String::new();
    let flush = |segment: &mut String, out: &mut String| {
        if !segment.is_empty() {
            out.push_str(r#"<w:t xml:space="preserve">"#);
            out.push_str(&escape(segment.as_str()));
            out.push_str("</w:t>");
            segment.clear();
        }
    };
    for c in run.text.chars() {
        match c {
            '\n' => {
                flush(&mut segment, out);
                out.push_str("<w:br/>");
            }
            '\t' => {
                flush(&mut segment, out);
                out.push_str("<w:tab/>");
            }
            _ => segment.push(c),
        }
    }
    flush(&mut segment, out);
    out.push_str("</w:r>");
}

fn paragraph_xml(props: &str, runs: &[Run], force_bold: bool, out: &mut String) {
    out.push_str("<w:p>");
    if !props.is_empty() {
        out.push_str("<w:pPr>");
        out.push_str(props);
        out.push_str("</w:pPr>");
    }
    for run in runs {
        run_xml(run, force_bold, out);
    }
    out.push_str("</w:p>");
}

fn table_xml(rows: &[(bool, &Vec<Vec<Run>>)], out: &mut String) {
    let columns = rows.iter().map(|(_, cells)| cells.len()).max().unwrap_or(1).max(1);
    let width = TEXT_WIDTH_TWIPS / columns as u32;
    out.push_str(&format!(
        r#"<w:tbl><w:tblPr><w:tblStyle w:val="TableGrid"/><w:tblW w:w="{TEXT_WIDTH_TWIPS}" w:type="dxa"/></w:tblPr><w:tblGrid>"#
    ));
    for _ in 0..columns {
        out.push_str(&format!(r#"<w:gridCol w:w="{width}"/>"#));
    }
    out.push_str("</w:tblGrid>");
    for (header, cells) in rows {
        out.push_str("<w:tr><w:trPr><w:cantSplit/>");
        if *header {
            out.push_str("<w:tblHeader/>");
        }
        out.push_str("</w:trPr>");
        for i in 0..columns {
            out.push_str(&format!(r#"<w:tc><w:tcPr><w:tcW w:w="{width}" w:type="dxa"/></w:tcPr>"#));
            let runs = cells.get(i).map(Vec::as_slice).unwrap_or(&[]);
            paragraph_xml("", runs, *header, out);
            out.push_str("</w:tc>");
        }
        out.push_str("</w:tr>");
    }
    out.push_str("</w:tbl>");
}

/// Lay out an HTML body as `word/document.xml`.
pub fn document_xml(html: &str) -> String {
    let blocks = parse_blocks(html);
    let mut body = String::new();
    let mut i = 0;
    while i < blocks.len() {
        match &blocks[i] {
            Block::Heading { level, runs } => {
                paragraph_xml(&format!(r#"<w:pStyle w:val="Heading{level}"/>"#), runs, false, &mut body);
            }
            Block::Paragraph { runs } => paragraph_xml("", runs, false, &mut body),
            Block::ListItem { ordered, depth, runs, .. } => {
                let num_id = if *ordered { DECIMAL_NUM_ID } else { BULLET_NUM_ID };
                let props = format!(
                    r#"<w:pStyle w:val="ListParagraph"/><w:numPr><w:ilvl w:val="{}"/><w:numId w:val="{num_id}"/></w:numPr>"#,
                    (*depth).min(8)
                );
                paragraph_xml(&props, runs, false, &mut body);
            }
            Block::TableRow { .. } => {
                let mut rows = Vec::new();
                while let Some(Block::TableRow { header, cells }) = blocks.get(i) {
                    rows.push((*header, cells));
                    i += 1;
                }
                table_xml(&rows, &mut body);
                continue;
            }
            Block::PageBreak => body.push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#),
        }
        i += 1;
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{W_NS}"><w:body>{body}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr></w:body></w:document>"#
    )
}

/// Package an HTML body as a complete DOCX file.
pub fn write_docx(html: &str, title: &str) -> Result<Vec<u8>, CodecError> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    let parts = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", PACKAGE_RELS.to_string()),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS.to_string()),
        ("word/document.xml", document_xml(html)),
        ("word/styles.xml", styles_xml()),
        ("word/numbering.xml", numbering_xml()),
        ("docProps/core.xml", core_xml(title)),
    ];
    for (name, content) in parts {
        zip.start_file(name, options)?;
        zip.write_all(content.as_bytes())?;
    }
    Ok(zip.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn package_has_required_parts() {
        let bytes = write_docx("<p>Hello</p>", "Brief").unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        for name in [
            "[Content_Types].xml",
            "_rels/.rels",
            "word/document.xml",
            "word/styles.xml",
            "word/numbering.xml",
        ] {
            assert!(archive.by_name(name).is_ok(), "missing {name}");
        }
    }

    #[test]
    fn body_font_is_calibri_11pt() {
        let styles = styles_xml();
        assert!(styles.contains(r#"w:ascii="Calibri""#));
        assert!(styles.contains(r#"<w:sz w:val="22"/>"#));
    }

    #[test]
    fn text_is_escaped() {
        let xml = document_xml("<p>Fees &amp; &lt;charges&gt;</p>");
        assert!(xml.contains("Fees &amp; &lt;charges&gt;"));
    }

    #[test]
    fn table_rows_never_split() {
        let xml = document_xml("<table><tr><th>Name</th><th>Role</th></tr><tr><td>Ana</td></tr></table><p>after</p>");
        assert_eq!(xml.matches("<w:tbl>").count(), 1);
        assert_eq!(xml.matches("<w:cantSplit/>").count(), 2);
        assert_eq!(xml.matches("<w:tblHeader/>").count(), 1);
        // the short row is padded to the full column count
        assert_eq!(xml.matches("<w:tc>").count(), 4);
    }

    #[test]
    fn page_breaks_and_line_breaks() {
        let xml = document_xml(r#"<p>one<br>two</p><div class="page-break"></div><p>three</p>"#);
        assert!(xml.contains("<w:t xml:space=\"preserve\">one</w:t><w:br/><w:t xml:space=\"preserve\">two</w:t>"));
        assert!(xml.contains(r#"<w:br w:type="page"/>"#));
    }

    #[test]
    fn title_lands_in_core_properties() {
        let bytes = write_docx("<p>x</p>", "Q3 & Q4 Brief").unwrap();
        assert!(part(&bytes, "docProps/core.xml").contains("<dc:title>Q3 &amp; Q4 Brief</dc:title>"));
    }
}
