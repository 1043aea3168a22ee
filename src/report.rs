//! Paginated title reports.
//!
//! Layout is computed first (pages of positioned lines, no I/O) and then written
//! as a PDF with the builtin Helvetica font. Page geometry follows US Letter with
//! one-inch margins.

use crate::constants::REPORT_HEADING;
use crate::error::{PipelineError, Result};
use printpdf::{BuiltinFont, Mm, PdfDocument};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info, instrument};

pub const PAGE_WIDTH_MM: f32 = 215.9;
pub const PAGE_HEIGHT_MM: f32 = 279.4;
pub const MARGIN_MM: f32 = 25.4;

const HEADING_FONT_SIZE: f32 = 16.0;
const ITEM_FONT_SIZE: f32 = 12.0;
const LINE_SPACING: f32 = 1.2;
const PT_TO_MM: f32 = 0.352_778;
// Helvetica has no metrics available here; half an em is close for Latin text
const AVG_GLYPH_WIDTH_EM: f32 = 0.5;
const LAYER_NAME: &str = "Layer 1";

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub font_size: f32,
    pub x_mm: f32,
    /// Baseline, measured from the bottom edge.
    pub y_mm: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportPage {
    pub lines: Vec<PlacedLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportLayout {
    pub heading: String,
    pub pages: Vec<ReportPage>,
}

impl ReportLayout {
    /// Text of every line below the heading, across pages, in order.
    pub fn body_lines(&self) -> Vec<&str> {
        self.pages
            .iter()
            .flat_map(|p| p.lines.iter())
            .skip(1)
            .map(|l| l.text.as_str())
            .collect()
    }
}

struct Cursor {
    pages: Vec<ReportPage>,
    y_mm: f32,
}

impl Cursor {
    fn new() -> Self {
        Self {
            pages: vec![ReportPage::default()],
            y_mm: PAGE_HEIGHT_MM - MARGIN_MM,
        }
    }

    fn advance(&mut self, font_size: f32) {
        let step = line_height_mm(font_size);
        if self.y_mm - step < MARGIN_MM {
            self.pages.push(ReportPage::default());
            self.y_mm = PAGE_HEIGHT_MM - MARGIN_MM;
        }
        self.y_mm -= step;
    }

    fn place(&mut self, text: String, font_size: f32, x_mm: f32) {
        self.advance(font_size);
        let y_mm = self.y_mm;
        if let Some(page) = self.pages.last_mut() {
            page.lines.push(PlacedLine {
                text,
                font_size,
                x_mm,
                y_mm,
            });
        }
    }
}

fn line_height_mm(font_size: f32) -> f32 {
    font_size * LINE_SPACING * PT_TO_MM
}

fn text_width_mm(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * AVG_GLYPH_WIDTH_EM * PT_TO_MM
}

fn chars_per_line(font_size: f32) -> usize {
    let usable = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
    ((usable / (font_size * AVG_GLYPH_WIDTH_EM * PT_TO_MM)) as usize).max(1)
}

/// Splits text into words, each paired with the whitespace run before it.
fn spaced_words(text: &str) -> Vec<(&str, &str)> {
    let mut words = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(|c: char| !c.is_whitespace()) {
        let (gap, tail) = rest.split_at(start);
        let end = tail.find(char::is_whitespace).unwrap_or(tail.len());
        let (word, next) = tail.split_at(end);
        words.push((gap, word));
        rest = next;
    }
    words
}

/// Greedy word wrap keeping the original spacing between words on a line;
/// words longer than a line are split.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();

    for (gap, word) in spaced_words(text) {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let word: String = word.into_iter().collect();
        if !current.is_empty()
            && current.chars().count() + gap.chars().count() + word.chars().count() > max_chars
        {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str(gap);
        }
        current.push_str(&word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Centered heading, one blank line, then `1. <title>`, `2. <title>`, ...
pub fn layout_report(heading: &str, titles: &[String]) -> ReportLayout {
    let mut cursor = Cursor::new();

    let heading_x = ((PAGE_WIDTH_MM - text_width_mm(heading, HEADING_FONT_SIZE)) / 2.0).max(MARGIN_MM);
    cursor.place(heading.to_string(), HEADING_FONT_SIZE, heading_x);
    cursor.advance(HEADING_FONT_SIZE);

    let max_chars = chars_per_line(ITEM_FONT_SIZE);
    for (index, title) in titles.iter().enumerate() {
        let item = format!("{}. {}", index + 1, title);
        for line in wrap_text(&item, max_chars) {
            cursor.place(line, ITEM_FONT_SIZE, MARGIN_MM);
        }
    }

    ReportLayout {
        heading: heading.to_string(),
        pages: cursor.pages,
    }
}

/// Writes one report document to `path`, replacing any existing file.
/// Returns the number of pages written.
#[instrument(skip(path, titles), fields(path = %path.display(), titles = titles.len()))]
pub fn render_report(path: &Path, titles: &[String]) -> Result<usize> {
    let layout = layout_report(REPORT_HEADING, titles);
    write_pdf(path, &layout)?;
    info!("Report written: {} ({} pages)", path.display(), layout.pages.len());
    Ok(layout.pages.len())
}

fn write_pdf(path: &Path, layout: &ReportLayout) -> Result<()> {
    let render_error = |message: String| PipelineError::Render {
        path: path.display().to_string(),
        message,
    };

    let (doc, first_page, first_layer) = PdfDocument::new(
        layout.heading.as_str(),
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        LAYER_NAME,
    );
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| render_error(e.to_string()))?;

    for (index, page) in layout.pages.iter().enumerate() {
        let (page_index, layer_index) = if index == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), LAYER_NAME)
        };
        let layer = doc.get_page(page_index).get_layer(layer_index);
        for line in &page.lines {
            layer.use_text(line.text.as_str(), line.font_size, Mm(line.x_mm), Mm(line.y_mm), &font);
        }
    }

    let file = File::create(path).map_err(|e| render_error(e.to_string()))?;
    doc.save(&mut BufWriter::new(file))
        .map_err(|e| render_error(e.to_string()))?;
    debug!("Saved {}", path.display());
    Ok(())
}
