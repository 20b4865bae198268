//! Multi-format document parser producing normalized plain text

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::SourceType;

/// Glyph names some PDF fonts leak into extracted text
static GLYPH_MAP: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        // Ligatures, longest names first so "f_f_i" wins over "f_f"
        ("f_f_i", "ffi"),
        ("f_f_l", "ffl"),
        ("f_f", "ff"),
        ("f_i", "fi"),
        ("f_l", "fl"),
        ("uni2010", "-"),
        ("uni2011", "-"),
        ("uni2013", "-"),
        ("uni2014", "--"),
        ("uni2018", "'"),
        ("uni2019", "'"),
        ("uni201C", "\""),
        ("uni201D", "\""),
        ("uni2022", "* "),
        ("uni2026", "..."),
        ("uni00A0", " "),
        ("uni2212", "-"),
    ]
});

static CONTROL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").expect("valid regex"));
static HORIZONTAL_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t\u{00A0}\u{2002}\u{2003}\u{2009}]+").expect("valid regex"));
static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));
static PAGE_NUMBER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(page\s*)?\d{1,4}(\s*(of|/)\s*\d{1,4})?$|^-\s*\d{1,4}\s*-$")
        .expect("valid regex")
});
static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Replace leaked glyph names and typographic characters with plain equivalents
fn cleanup_pdf_text(text: &str) -> String {
    let mut result = text.replace('\0', "");
    for (glyph_name, replacement) in GLYPH_MAP.iter() {
        if result.contains(glyph_name) {
            result = result.replace(glyph_name, replacement);
        }
    }

    result
        .replace(['\u{2010}', '\u{2011}', '\u{2013}'], "-")
        .replace('\u{2014}', "--")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{2022}', "* ")
        .replace('\u{2026}', "...")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
}

/// Normalize whitespace: unify line endings, drop control characters,
/// collapse horizontal runs, trim lines and squeeze blank-line runs.
pub fn normalize_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = CONTROL_CHARS.replace_all(&text, "");
    let text = HORIZONTAL_SPACE.replace_all(&text, " ");
    let text = text.lines().map(str::trim).collect::<Vec<_>>().join("\n");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Parsed document with extracted text and metadata
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Source kind
    pub source_type: SourceType,
    /// Normalized text content
    pub text: String,
    /// SHA-256 of `text`
    pub content_hash: String,
    /// Total pages (PDF only)
    pub total_pages: Option<u32>,
}

impl ParsedDocument {
    fn new(filename: &str, source_type: SourceType, raw: &str, total_pages: Option<u32>) -> Result<Self> {
        let text = normalize_text(raw);
        if text.is_empty() {
            return Err(Error::parse(
                filename,
                format!("No text content could be extracted from {}", source_type.display_name()),
            ));
        }

        Ok(Self {
            source_type,
            content_hash: hash_content(&text),
            text,
            total_pages,
        })
    }
}

/// Multi-format document parser
pub struct DocumentParser;

impl DocumentParser {
    /// Parse file bytes according to their resolved source kind
    pub fn parse(filename: &str, data: &[u8], source_type: SourceType) -> Result<ParsedDocument> {
        tracing::debug!("Parsing {} ({}, {} bytes)", filename, source_type, data.len());

        match source_type {
            SourceType::Text => {
                let text = decode_utf8(filename, data)?;
                ParsedDocument::new(filename, source_type, text, None)
            }
            SourceType::Markdown => {
                let text = decode_utf8(filename, data)?;
                ParsedDocument::new(filename, source_type, &markdown_to_text(text), None)
            }
            SourceType::Pdf => Self::parse_pdf(filename, data),
            SourceType::Word => Self::parse_docx(filename, data),
        }
    }

    /// Parse PDF document page by page
    fn parse_pdf(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let mut pages = match lopdf::Document::load_mem(data) {
            Ok(doc) => doc
                .get_pages()
                .keys()
                .map(|&number| match doc.extract_text(&[number]) {
                    Ok(text) => cleanup_pdf_text(&text),
                    Err(e) => {
                        tracing::warn!("{}: page {} extraction failed: {}", filename, number, e);
                        String::new()
                    }
                })
                .collect::<Vec<_>>(),
            Err(e) => {
                tracing::warn!("{}: lopdf failed to load ({}), trying pdf-extract", filename, e);
                Vec::new()
            }
        };

        if pages.iter().all(|p| p.trim().is_empty()) {
            let text = pdf_extract::extract_text_from_mem(data)
                .map_err(|e| Error::parse(filename, format!("PDF extraction failed: {}", e)))?;
            pages = cleanup_pdf_text(&text)
                .split('\u{000C}')
                .map(str::to_string)
                .collect();
        }

        let total_pages = pages.len() as u32;
        let pages = strip_headers_and_footers(&pages);

        let text = pages
            .iter()
            .enumerate()
            .filter(|(_, lines)| !lines.is_empty())
            .map(|(i, lines)| format!("[Page {}]\n{}", i + 1, lines.join("\n")))
            .collect::<Vec<_>>()
            .join("\n\n");

        ParsedDocument::new(filename, SourceType::Pdf, &text, Some(total_pages))
    }

    /// Parse DOCX document: paragraphs, then tables rendered as `cell | cell`
    #[allow(irrefutable_let_patterns)]
    fn parse_docx(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let doc = docx_rs::read_docx(data)
            .map_err(|e| Error::parse(filename, format!("Invalid DOCX: {}", e)))?;

        let mut content = String::new();
        for child in &doc.document.children {
            match child {
                docx_rs::DocumentChild::Paragraph(p) => {
                    content.push_str(&paragraph_text(p));
                    content.push('\n');
                }
                docx_rs::DocumentChild::Table(table) => {
                    for row in &table.rows {
                        let docx_rs::TableChild::TableRow(row) = row;
                        let cells: Vec<String> = row
                            .cells
                            .iter()
                            .map(|cell| {
                                let docx_rs::TableRowChild::TableCell(cell) = cell;
                                cell.children
                                    .iter()
                                    .filter_map(|c| match c {
                                        docx_rs::TableCellContent::Paragraph(p) => {
                                            Some(paragraph_text(p))
                                        }
                                        _ => None,
                                    })
                                    .collect::<Vec<_>>()
                                    .join(" ")
                                    .trim()
                                    .to_string()
                            })
                            .collect();
                        if cells.iter().any(|c| !c.is_empty()) {
                            content.push_str(&cells.join(" | "));
                            content.push('\n');
                        }
                    }
                    content.push('\n');
                }
                _ => {}
            }
        }

        ParsedDocument::new(filename, SourceType::Word, &content, None)
    }
}

fn paragraph_text(p: &docx_rs::Paragraph) -> String {
    let mut text = String::new();
    for child in &p.children {
        if let docx_rs::ParagraphChild::Run(run) = child {
            for child in &run.children {
                match child {
                    docx_rs::RunChild::Text(t) => text.push_str(&t.text),
                    docx_rs::RunChild::Tab(_) => text.push(' '),
                    docx_rs::RunChild::Break(_) => text.push('\n'),
                    _ => {}
                }
            }
        }
    }
    text
}

/// Strict UTF-8 decode with BOM removal
fn decode_utf8<'a>(filename: &str, data: &'a [u8]) -> Result<&'a str> {
    let text = std::str::from_utf8(data).map_err(|e| {
        Error::parse(filename, format!("Invalid UTF-8 at byte {}", e.valid_up_to()))
    })?;
    Ok(text.strip_prefix('\u{FEFF}').unwrap_or(text))
}

/// Render markdown to plain text, keeping text and code, dropping markup
fn markdown_to_text(source: &str) -> String {
    use pulldown_cmark::{Event, Parser, TagEnd};

    let mut out = String::with_capacity(source.len());
    for event in Parser::new(source) {
        match event {
            Event::Text(t) | Event::Code(t) => out.push_str(&t),
            Event::SoftBreak | Event::HardBreak | Event::Rule => out.push('\n'),
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::CodeBlock) => {
                out.push_str("\n\n")
            }
            Event::End(TagEnd::Item | TagEnd::List(_)) => out.push('\n'),
            _ => {}
        }
    }
    out
}

/// Split pages into trimmed non-empty lines and drop running headers,
/// footers and bare page numbers.
///
/// A first or last line counts as a header/footer when, with digits masked,
/// it appears in that position on at least half of the pages. Only applies
/// to documents with three or more pages.
fn strip_headers_and_footers(pages: &[String]) -> Vec<Vec<String>> {
    let mut pages: Vec<Vec<String>> = pages
        .iter()
        .map(|p| {
            p.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        })
        .collect();

    let mask = |line: &str| DIGITS.replace_all(line, "#").into_owned();

    if pages.len() >= 3 {
        let threshold = (pages.len() + 1) / 2;
        let mut firsts: HashMap<String, usize> = HashMap::new();
        let mut lasts: HashMap<String, usize> = HashMap::new();
        for lines in &pages {
            if let Some(first) = lines.first() {
                *firsts.entry(mask(first)).or_default() += 1;
            }
            if lines.len() > 1 {
                if let Some(last) = lines.last() {
                    *lasts.entry(mask(last)).or_default() += 1;
                }
            }
        }

        for lines in &mut pages {
            if lines.first().is_some_and(|l| firsts.get(&mask(l)).copied().unwrap_or(0) >= threshold) {
                lines.remove(0);
            }
            if lines.len() > 1
                && lines.last().is_some_and(|l| lasts.get(&mask(l)).copied().unwrap_or(0) >= threshold)
            {
                lines.pop();
            }
        }
    }

    for lines in &mut pages {
        if lines.last().is_some_and(|l| PAGE_NUMBER_LINE.is_match(l)) {
            lines.pop();
        }
        if lines.first().is_some_and(|l| PAGE_NUMBER_LINE.is_match(l)) {
            lines.remove(0);
        }
    }

    pages
}

/// Hash content for deduplication
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
