//! PDF rendering with builtin Helvetica fonts.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use chrono::Utc;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};

use super::{ReportError, ReportInput, Result};

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const LINE_HEIGHT_MM: f32 = 6.0;
const BODY_SIZE: f32 = 10.0;
const HEADING_SIZE: f32 = 13.0;
const TITLE_SIZE: f32 = 18.0;
const WRAP_CHARS: usize = 95;

/// Cursor that walks down the page and breaks to a new one at the
/// bottom margin.
struct PageWriter<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
}

impl<'a> PageWriter<'a> {
    fn new(doc: &'a PdfDocumentReference, layer: PdfLayerReference) -> Self {
        Self {
            doc,
            layer,
            y: PAGE_HEIGHT_MM - MARGIN_MM,
        }
    }

    fn line(&mut self, text: &str, size: f32, font: &IndirectFontRef) {
        if self.y < MARGIN_MM {
            let (page, layer) = self
                .doc
                .add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT_MM - MARGIN_MM;
        }
        self.layer
            .use_text(text, size, Mm(MARGIN_MM), Mm(self.y), font);
        self.y -= LINE_HEIGHT_MM * (size / BODY_SIZE);
    }

    fn blank(&mut self) {
        self.y -= LINE_HEIGHT_MM;
    }
}

fn wrap(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + word.chars().count() + 1 > WRAP_CHARS {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

pub fn render(path: &Path, input: &ReportInput<'_>) -> Result<()> {
    let (doc, page, layer) = PdfDocument::new(
        "RepurposeIQ Intelligence Report",
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ReportError::Pdf(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ReportError::Pdf(e.to_string()))?;

    let mut writer = PageWriter::new(&doc, doc.get_page(page).get_layer(layer));

    writer.line("RepurposeIQ Intelligence Report", TITLE_SIZE, &bold);
    writer.blank();
    writer.line(
        &format!("Generated: {}", Utc::now().format("%Y-%m-%d %H:%M UTC")),
        BODY_SIZE,
        &regular,
    );
    writer.line(&format!("Requested by: {}", input.generated_by), BODY_SIZE, &regular);
    writer.line(&format!("Query: {}", input.query), BODY_SIZE, &regular);
    writer.line(
        &format!(
            "Agents: {} | Confidence: {:.0}%",
            input.response.agents_used.join(", "),
            input.response.strategic_reasoning.confidence_score * 100.0
        ),
        BODY_SIZE,
        &regular,
    );
    writer.blank();

    // Markdown headings become bold section lines.
    for raw in input.response.answer.lines() {
        let line = raw.trim_end();
        if line.is_empty() {
            writer.blank();
        } else if let Some(heading) = line.strip_prefix("## ") {
            writer.blank();
            writer.line(heading, HEADING_SIZE, &bold);
        } else if let Some(heading) = line.strip_prefix("# ") {
            writer.blank();
            writer.line(heading, HEADING_SIZE, &bold);
        } else {
            for wrapped in wrap(line) {
                writer.line(&wrapped, BODY_SIZE, &regular);
            }
        }
    }

    writer.blank();
    writer.line("Data Sources", HEADING_SIZE, &bold);
    for factor in &input.response.strategic_reasoning.decision_factors {
        writer.line(&format!("- {factor}"), BODY_SIZE, &regular);
    }

    let file = File::create(path)?;
    doc.save(&mut BufWriter::new(file))
        .map_err(|e| ReportError::Pdf(e.to_string()))?;
    Ok(())
}
