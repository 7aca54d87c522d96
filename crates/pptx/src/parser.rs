//! PPTX file parser implementation.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use tasksheet_core::{Deck, Error, Result, Slide};
use zip::ZipArchive;

const PRESENTATION_PATH: &str = "ppt/presentation.xml";
const PRESENTATION_RELS_PATH: &str = "ppt/_rels/presentation.xml.rels";

/// Parser for PPTX (Office Open XML) files.
pub struct PptxParser;

impl PptxParser {
    /// Create a new PPTX parser.
    pub fn new() -> Self {
        Self
    }

    /// Open and parse a deck from disk.
    pub fn open(&self, path: &Path, locator: &str) -> Result<Deck> {
        let file = File::open(path)?;
        self.parse(BufReader::new(file), locator)
    }

    /// Parse a PPTX file from a reader. `locator` identifies the whole deck.
    pub fn parse<R: Read + Seek>(&self, reader: R, locator: &str) -> Result<Deck> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let mut deck = Deck::new(locator);

        for (idx, entry) in self.get_slide_order(&mut archive)?.iter().enumerate() {
            let number = idx + 1;
            let slide_locator = deck.slide_locator(entry.slide_id.as_deref(), number);
            let slide = self.parse_slide(&mut archive, &entry.path, number, slide_locator)?;
            deck.add_slide(slide);
        }

        log::debug!("Parsed {} slides from {}", deck.slides.len(), locator);
        Ok(deck)
    }

    /// Ordered slide parts: `p:sldIdLst` when present, relationship numbering otherwise.
    fn get_slide_order<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
    ) -> Result<Vec<SlideEntry>> {
        let rels_content = self.read_file_from_archive(archive, PRESENTATION_RELS_PATH)?;
        let rels = parse_slide_relationships(&rels_content)?;

        if let Ok(presentation) = self.read_file_from_archive(archive, PRESENTATION_PATH) {
            let listed = parse_slide_id_list(&presentation)?;
            if !listed.is_empty() {
                let targets: HashMap<&str, &str> = rels
                    .iter()
                    .map(|r| (r.id.as_str(), r.path.as_str()))
                    .collect();
                let mut entries = Vec::with_capacity(listed.len());
                for (slide_id, rel_id) in listed {
                    match targets.get(rel_id.as_str()) {
                        Some(path) => entries.push(SlideEntry {
                            path: path.to_string(),
                            slide_id: Some(slide_id),
                        }),
                        None => {
                            return Err(Error::PptxParseError(format!(
                                "Slide {} refers to missing relationship {}",
                                slide_id, rel_id
                            )));
                        }
                    }
                }
                return Ok(entries);
            }
        }

        log::debug!("No slide id list, ordering slides by relationship number");
        let mut slides: Vec<(String, Option<usize>)> = rels
            .into_iter()
            .map(|r| {
                let order = extract_slide_number(&r.id).or_else(|| extract_slide_number(&r.path));
                (r.path, order)
            })
            .collect();

        slides.sort_by(|a, b| match (a.1, b.1) {
            (Some(na), Some(nb)) => na.cmp(&nb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.0.cmp(&b.0),
        });

        Ok(slides
            .into_iter()
            .map(|(path, _)| SlideEntry { path, slide_id: None })
            .collect())
    }

    /// Parse a single slide from the archive.
    fn parse_slide<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        slide_path: &str,
        slide_number: usize,
        locator: String,
    ) -> Result<Slide> {
        let content = self.read_file_from_archive(archive, slide_path)?;
        let mut slide = Slide::new(slide_number, locator);

        for text in extract_shape_texts(&content, slide_number) {
            slide.add_shape(text);
        }

        Ok(slide)
    }

    /// Read a file from the ZIP archive.
    fn read_file_from_archive<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        path: &str,
    ) -> Result<String> {
        let mut file = archive
            .by_name(path)
            .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

        Ok(content)
    }
}

impl Default for PptxParser {
    fn default() -> Self {
        Self::new()
    }
}

/// A slide part and its `p:sldId` id.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SlideEntry {
    path: String,
    slide_id: Option<String>,
}

/// A slide relationship from the presentation rels.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SlideRelationship {
    id: String,
    path: String,
}

/// Collect the slide relationships (not layouts or masters).
fn parse_slide_relationships(xml: &str) -> Result<Vec<SlideRelationship>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut rels = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"Relationship" =>
            {
                let rel_type = attribute(e, b"Type").unwrap_or_default();
                if !rel_type.ends_with("/slide") {
                    continue;
                }
                let (Some(id), Some(target)) = (attribute(e, b"Id"), attribute(e, b"Target")) else {
                    continue;
                };
                let path = match target.strip_prefix('/') {
                    Some(absolute) => absolute.to_string(),
                    None => format!("ppt/{}", target),
                };
                rels.push(SlideRelationship { id, path });
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing relationships: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(rels)
}

/// `(slide id, relationship id)` pairs from `p:sldIdLst`, in presentation order.
fn parse_slide_id_list(xml: &str) -> Result<Vec<(String, String)>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut slides = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"sldId" =>
            {
                if let (Some(id), Some(rel)) = (attribute(e, b"id"), attribute(e, b"r:id")) {
                    slides.push((id, rel));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing presentation: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(slides)
}

/// Text of each shape in document order, read from `a:t` runs.
/// Paragraphs and line breaks become `\n`.
fn extract_shape_texts(xml_content: &str, slide_number: usize) -> Vec<String> {
    let mut shapes = Vec::new();
    let mut reader = Reader::from_str(xml_content);
    reader.trim_text(false);

    let mut depth = 0usize;
    let mut in_paragraph = false;
    let mut in_run_text = false;
    let mut current_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                b"sp" | b"graphicFrame" => {
                    if depth == 0 {
                        current_text.clear();
                    }
                    depth += 1;
                }
                b"p" if depth > 0 => {
                    in_paragraph = true;
                    if !current_text.is_empty() {
                        current_text.push('\n');
                    }
                }
                b"t" if in_paragraph => {
                    in_run_text = true;
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if in_paragraph && local_name(e.name().as_ref()) == b"br" {
                    current_text.push('\n');
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_run_text {
                    let text = e.unescape().unwrap_or_default();
                    current_text.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                b"sp" | b"graphicFrame" if depth > 0 => {
                    depth -= 1;
                    if depth == 0 {
                        let text = current_text.trim();
                        if !text.is_empty() {
                            shapes.push(text.to_string());
                        }
                        current_text.clear();
                        in_paragraph = false;
                        in_run_text = false;
                    }
                }
                b"p" => {
                    in_paragraph = false;
                }
                b"t" => {
                    in_run_text = false;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                log::warn!(
                    "Slide {}: XML parsing error, keeping text read so far: {}",
                    slide_number,
                    e
                );
                break;
            }
            _ => {}
        }
    }

    shapes
}

/// Read an attribute by its full (possibly prefixed) name.
fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

/// Extract the local name from a potentially namespaced XML element name.
fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Extract a slide number from a string like "rId2" or "slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    const SLIDE_REL: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
    const LAYOUT_REL: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";

    fn shape(paragraphs: &[&str]) -> String {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<a:p><a:r><a:t>{}</a:t></a:r></a:p>", p))
            .collect();
        format!("<p:sp><p:nvSpPr/><p:txBody><a:bodyPr/>{}</p:txBody></p:sp>", body)
    }

    fn slide_xml(shapes: &[String]) -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<p:sld xmlns:a="a" xmlns:p="p"><p:cSld><p:spTree>"#,
                "{}",
                "</p:spTree></p:cSld></p:sld>",
            ),
            shapes.concat()
        )
    }

    fn rels_xml(rels: &[(&str, &str, &str)]) -> String {
        let body: String = rels
            .iter()
            .map(|(id, ty, target)| {
                format!(r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#, id, ty, target)
            })
            .collect();
        format!(r#"<?xml version="1.0"?><Relationships>{}</Relationships>"#, body)
    }

    fn presentation_xml(ids: &[(&str, &str)]) -> String {
        let body: String = ids
            .iter()
            .map(|(id, rel)| format!(r#"<p:sldId id="{}" r:id="{}"/>"#, id, rel))
            .collect();
        format!(
            concat!(
                r#"<?xml version="1.0"?><p:presentation xmlns:p="p" xmlns:r="r">"#,
                r#"<p:sldIdLst>{}</p:sldIdLst></p:presentation>"#,
            ),
            body
        )
    }

    fn build_pptx(files: &[(&str, String)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in files {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_extract_slide_number() {
        assert_eq!(extract_slide_number("rId1"), Some(1));
        assert_eq!(extract_slide_number("rId12"), Some(12));
        assert_eq!(extract_slide_number("slide1.xml"), Some(1));
        assert_eq!(extract_slide_number("slide123.xml"), Some(123));
        assert_eq!(extract_slide_number("nodigits"), None);
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"p:sp"), b"sp");
        assert_eq!(local_name(b"a:t"), b"t");
        assert_eq!(local_name(b"sp"), b"sp");
    }

    #[test]
    fn test_shapes_keep_document_order_and_paragraphs() {
        let xml = slide_xml(&[
            shape(&["Summary: first line", "second line"]),
            shape(&["Task: Trench &amp; pipe"]),
            shape(&["   "]),
        ]);

        assert_eq!(
            extract_shape_texts(&xml, 1),
            vec!["Summary: first line\nsecond line", "Task: Trench & pipe"]
        );
    }

    #[test]
    fn test_line_break_becomes_newline() {
        let xml = slide_xml(&[
            concat!(
                "<p:sp><p:txBody><a:p><a:r><a:t>Task: a</a:t></a:r><a:br/>",
                "<a:r><a:t>Summary: b</a:t></a:r></a:p></p:txBody></p:sp>",
            )
            .to_string(),
        ]);
        assert_eq!(extract_shape_texts(&xml, 1), vec!["Task: a\nSummary: b"]);
    }

    #[test]
    fn test_parse_orders_by_slide_id_list() {
        let bytes = build_pptx(&[
            (
                PRESENTATION_RELS_PATH,
                rels_xml(&[
                    ("rId1", LAYOUT_REL, "slideLayouts/slideLayout1.xml"),
                    ("rId2", SLIDE_REL, "slides/slide1.xml"),
                    ("rId3", SLIDE_REL, "slides/slide2.xml"),
                ]),
            ),
            (PRESENTATION_PATH, presentation_xml(&[("300", "rId3"), ("256", "rId2")])),
            ("ppt/slides/slide1.xml", slide_xml(&[shape(&["Category: 【土工】掘削"])])),
            ("ppt/slides/slide2.xml", slide_xml(&[shape(&["Cover"])])),
        ]);

        let deck = PptxParser::new()
            .parse(Cursor::new(bytes), "https://example.com/deck")
            .unwrap();

        assert_eq!(deck.slides.len(), 2);
        assert_eq!(deck.slides[0].number, 1);
        assert_eq!(deck.slides[0].shapes, vec!["Cover"]);
        assert_eq!(deck.slides[0].locator, "https://example.com/deck#slide=id.300");
        assert_eq!(deck.slides[1].shapes, vec!["Category: 【土工】掘削"]);
        assert_eq!(deck.slides[1].locator, "https://example.com/deck#slide=id.256");
    }

    #[test]
    fn test_parse_falls_back_to_relationship_order() {
        let bytes = build_pptx(&[
            (
                PRESENTATION_RELS_PATH,
                rels_xml(&[
                    ("rId10", SLIDE_REL, "slides/slide10.xml"),
                    ("rId2", SLIDE_REL, "/ppt/slides/slide2.xml"),
                ]),
            ),
            ("ppt/slides/slide2.xml", slide_xml(&[shape(&["two"])])),
            ("ppt/slides/slide10.xml", slide_xml(&[shape(&["ten"])])),
        ]);

        let deck = PptxParser::new().parse(Cursor::new(bytes), "deck").unwrap();
        let texts: Vec<_> = deck.slides.iter().map(|s| s.content()).collect();
        assert_eq!(texts, vec!["two", "ten"]);
        assert_eq!(deck.slides[1].locator, "deck#slide=2");
    }

    #[test]
    fn test_missing_relationship_is_error() {
        let bytes = build_pptx(&[
            (PRESENTATION_RELS_PATH, rels_xml(&[])),
            (PRESENTATION_PATH, presentation_xml(&[("256", "rId9")])),
        ]);

        let err = PptxParser::new().parse(Cursor::new(bytes), "deck").unwrap_err();
        assert!(matches!(err, Error::PptxParseError(_)));
    }

    #[test]
    fn test_not_a_zip_is_error() {
        let err = PptxParser::new()
            .parse(Cursor::new(b"not a zip".to_vec()), "deck")
            .unwrap_err();
        assert!(matches!(err, Error::ZipError(_)));
    }
}
