// Export of the rewritten résumé.
// Markdown → HTML for display, Markdown → US-letter PDF for download.
// PDF layout is CPU-bound; callers run `render_pdf` inside spawn_blocking.

pub mod metrics;

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument};
use pulldown_cmark::{html, Event, HeadingLevel, Parser, Tag};
use thiserror::Error;

use metrics::{get_metrics, Face};

const PAGE_WIDTH_PT: f32 = 612.0;
const PAGE_HEIGHT_PT: f32 = 792.0;
const MARGIN_PT: f32 = 50.0;
const BODY_SIZE_PT: f32 = 10.5;
const LINE_SPACING: f32 = 1.35;
const INDENT_PT: f32 = 14.0;
const MM_PER_PT: f32 = 25.4 / 72.0;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("PDF generation failed: {0}")]
    Pdf(String),
}

/// Renders Markdown to an HTML fragment.
pub fn render_html(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, Parser::new(markdown));
    out
}

/// One run of text laid out as a unit (heading, paragraph, list item).
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub face: Face,
    pub size_pt: f32,
    pub indent_pt: f32,
    pub space_before_pt: f32,
    pub text: String,
}

impl Block {
    fn body(indent_pt: f32) -> Self {
        Self {
            face: Face::Regular,
            size_pt: BODY_SIZE_PT,
            indent_pt,
            space_before_pt: 4.0,
            text: String::new(),
        }
    }

    fn heading(level: HeadingLevel) -> Self {
        let size_pt = match level {
            HeadingLevel::H1 => 18.0,
            HeadingLevel::H2 => 14.0,
            _ => 12.0,
        };
        Self {
            face: Face::Bold,
            size_pt,
            indent_pt: 0.0,
            space_before_pt: size_pt * 0.6,
            text: String::new(),
        }
    }
}

/// Flattens Markdown into styled blocks. Inline emphasis is dropped; list
/// items carry their marker and are indented by nesting depth.
pub fn flatten_markdown(markdown: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut current: Option<Block> = None;
    let mut lists: Vec<Option<u64>> = Vec::new();

    let flush = |current: &mut Option<Block>, blocks: &mut Vec<Block>| {
        if let Some(mut block) = current.take() {
            let text = block.text.split_whitespace().collect::<Vec<_>>().join(" ");
            if !text.is_empty() {
                block.text = text;
                blocks.push(block);
            }
        }
    };

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Heading(level, ..)) => {
                flush(&mut current, &mut blocks);
                current = Some(Block::heading(level));
            }
            Event::Start(Tag::Paragraph) => {
                if current.is_none() {
                    current = Some(Block::body(INDENT_PT * lists.len() as f32));
                }
            }
            Event::Start(Tag::List(start)) => {
                flush(&mut current, &mut blocks);
                lists.push(start);
            }
            Event::End(Tag::List(_)) => {
                flush(&mut current, &mut blocks);
                lists.pop();
            }
            Event::Start(Tag::Item) => {
                flush(&mut current, &mut blocks);
                let depth = lists.len().max(1);
                let marker = match lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => "- ".to_string(),
                };
                let mut block = Block::body(INDENT_PT * (depth - 1) as f32);
                block.space_before_pt = 2.0;
                block.text.push_str(&marker);
                current = Some(block);
            }
            Event::End(Tag::Heading(..)) | Event::End(Tag::Paragraph) | Event::End(Tag::Item) => {
                flush(&mut current, &mut blocks);
            }
            Event::Text(text) | Event::Code(text) => {
                current
                    .get_or_insert_with(|| Block::body(INDENT_PT * lists.len() as f32))
                    .text
                    .push_str(&text);
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some(block) = current.as_mut() {
                    block.text.push(' ');
                }
            }
            Event::Rule => flush(&mut current, &mut blocks),
            _ => {}
        }
    }
    flush(&mut current, &mut blocks);
    blocks
}

/// A wrapped line positioned on a page, in points from the bottom-left.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub page: usize,
    pub x_pt: f32,
    pub y_pt: f32,
    pub face: Face,
    pub size_pt: f32,
    pub text: String,
}

/// Wraps every block to the text width and assigns pages, starting a new
/// page whenever the next line would cross the bottom margin.
pub fn layout_blocks(blocks: &[Block]) -> Vec<PlacedLine> {
    let text_width_pt = PAGE_WIDTH_PT - 2.0 * MARGIN_PT;
    let top = PAGE_HEIGHT_PT - MARGIN_PT;
    let mut placed = Vec::new();
    let mut page = 0;
    let mut y = top;

    for block in blocks {
        let metrics = get_metrics(block.face);
        let max_width_em = (text_width_pt - block.indent_pt) / block.size_pt;
        let leading = block.size_pt * LINE_SPACING;

        if y < top {
            y -= block.space_before_pt;
        }

        for line in metrics.wrap(&block.text, max_width_em) {
            if y - leading < MARGIN_PT {
                page += 1;
                y = top;
            }
            y -= leading;
            placed.push(PlacedLine {
                page,
                x_pt: MARGIN_PT + block.indent_pt,
                y_pt: y,
                face: block.face,
                size_pt: block.size_pt,
                text: line,
            });
        }
    }
    placed
}

/// Renders Markdown to a PDF document and returns its bytes.
pub fn render_pdf(markdown: &str, title: &str) -> Result<Vec<u8>, ExportError> {
    let placed = layout_blocks(&flatten_markdown(markdown));

    let (doc, first_page, first_layer) = PdfDocument::new(
        title,
        Mm(PAGE_WIDTH_PT * MM_PER_PT),
        Mm(PAGE_HEIGHT_PT * MM_PER_PT),
        "Layer 1",
    );
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ExportError::Pdf(format!("{e:?}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ExportError::Pdf(format!("{e:?}")))?;

    let page_count = placed.last().map(|l| l.page + 1).unwrap_or(1);
    let mut layers = vec![doc.get_page(first_page).get_layer(first_layer)];
    for _ in 1..page_count {
        let (page, layer) = doc.add_page(
            Mm(PAGE_WIDTH_PT * MM_PER_PT),
            Mm(PAGE_HEIGHT_PT * MM_PER_PT),
            "Layer 1",
        );
        layers.push(doc.get_page(page).get_layer(layer));
    }

    for line in placed {
        let font: &IndirectFontRef = match line.face {
            Face::Regular => &regular,
            Face::Bold => &bold,
        };
        layers[line.page].use_text(
            line.text,
            line.size_pt,
            Mm(line.x_pt * MM_PER_PT),
            Mm(line.y_pt * MM_PER_PT),
            font,
        );
    }

    drop(layers);
    doc.save_to_bytes()
        .map_err(|e| ExportError::Pdf(format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# Jane Doe\n\nRust engineer based in Berlin.\n\n## Experience\n\n\
        - Built a streaming parser\n- Shipped `axum` services\n  1. nested first\n  2. nested second\n\n\
        ---\n\nPlain closing paragraph.\n";

    #[test]
    fn test_render_html_headings_and_lists() {
        let out = render_html(SAMPLE);
        assert!(out.contains("<h1>Jane Doe</h1>"));
        assert!(out.contains("<li>Built a streaming parser</li>"));
    }

    #[test]
    fn test_flatten_styles_headings_and_items() {
        let blocks = flatten_markdown(SAMPLE);
        let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Jane Doe",
                "Rust engineer based in Berlin.",
                "Experience",
                "- Built a streaming parser",
                "- Shipped axum services",
                "1. nested first",
                "2. nested second",
                "Plain closing paragraph.",
            ]
        );
        assert_eq!(blocks[0].face, Face::Bold);
        assert!(blocks[0].size_pt > blocks[2].size_pt);
        assert_eq!(blocks[1].face, Face::Regular);
        assert!(blocks[5].indent_pt > blocks[3].indent_pt);
    }

    #[test]
    fn test_layout_starts_new_pages() {
        let long: String = (0..200)
            .map(|i| format!("Paragraph number {i} with some filler text.\n\n"))
            .collect();
        let placed = layout_blocks(&flatten_markdown(&long));
        let pages = placed.last().unwrap().page + 1;
        assert!(pages > 1, "expected multiple pages, got {pages}");
        for line in &placed {
            assert!(line.y_pt >= MARGIN_PT, "line below margin: {line:?}");
            assert!(line.y_pt <= PAGE_HEIGHT_PT - MARGIN_PT);
        }
    }

    #[test]
    fn test_layout_lines_go_down_the_page() {
        let placed = layout_blocks(&flatten_markdown(SAMPLE));
        for pair in placed.windows(2) {
            if pair[0].page == pair[1].page {
                assert!(pair[1].y_pt < pair[0].y_pt);
            }
        }
    }

    #[test]
    fn test_render_pdf_produces_pdf_bytes() {
        let bytes = render_pdf(SAMPLE, "Resume").unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_render_pdf_empty_markdown_still_valid() {
        let bytes = render_pdf("", "Resume").unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
