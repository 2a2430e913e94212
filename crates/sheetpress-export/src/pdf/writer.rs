// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF page sink: turns composed page rasters into a `printpdf` 0.8 document.
//
// Each page is one RGB image XObject placed at the origin at its native DPI,
// so the page size in points equals the raster size at that DPI. Placeholder
// labels are written as Helvetica text over the raster.

use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, RawImage,
    RawImageData, RawImageFormat, TextItem, XObjectTransform,
};
use sheetpress_core::error::{Result, SheetpressError};
use sheetpress_render::compose::LABEL_SIZE_MM;
use sheetpress_render::{ComposedPage, PageLabel};
use tracing::{debug, instrument};

use crate::renderer::PageSink;

/// Average Helvetica glyph advance as a fraction of the font size.
const HELVETICA_AVG_ADVANCE: f32 = 0.5;

fn px_to_pt(px: f64, dpi: u32) -> f32 {
    (px / dpi as f64 * 72.0) as f32
}

/// Text ops for one label, centred on its anchor. `page_h_pt` flips the y axis.
fn label_ops(label: &PageLabel, dpi: u32, page_h_pt: f32) -> Vec<Op> {
    let size_pt = Mm(LABEL_SIZE_MM as f32).into_pt().0;
    let text_w_pt = label.text.chars().count() as f32 * size_pt * HELVETICA_AVG_ADVANCE;
    let x = px_to_pt(label.x_px as f64, dpi) - text_w_pt / 2.0;
    // Baseline sits a third of the size below the anchor so the glyphs straddle it.
    let y = page_h_pt - px_to_pt(label.y_px as f64, dpi) - size_pt / 3.0;

    vec![
        Op::StartTextSection,
        Op::SetTextCursor {
            pos: Point {
                x: Pt(x),
                y: Pt(y),
            },
        },
        Op::SetFontSizeBuiltinFont {
            size: Pt(size_pt),
            font: BuiltinFont::Helvetica,
        },
        Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(label.text.clone())],
            font: BuiltinFont::Helvetica,
        },
        Op::EndTextSection,
    ]
}

/// Collects pages in order and serialises them on `finish`.
///
/// Only the composed rasters are held between calls; the `printpdf` document
/// is built inside `finish`, so the sink stays `Send`.
pub struct PdfPageSink {
    title: String,
    pages: Vec<ComposedPage>,
}

impl PdfPageSink {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_owned(),
            pages: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

fn build_page(doc: &mut PdfDocument, page: ComposedPage) -> PdfPage {
    let dpi = page.dpi;
    let (width, height) = page.image.dimensions();
    let page_w = Mm((width as f64 / dpi as f64 * 25.4) as f32);
    let page_h = Mm((height as f64 / dpi as f64 * 25.4) as f32);
    let page_h_pt = page_h.into_pt().0;

    let raw = RawImage {
        pixels: RawImageData::U8(page.image.into_raw()),
        width: width as usize,
        height: height as usize,
        data_format: RawImageFormat::RGB8,
        tag: Vec::new(),
    };
    let xobject_id = doc.add_image(&raw);

    let mut ops = vec![Op::UseXobject {
        id: xobject_id,
        transform: XObjectTransform {
            translate_x: Some(Pt(0.0)),
            translate_y: Some(Pt(0.0)),
            scale_x: Some(1.0),
            scale_y: Some(1.0),
            dpi: Some(dpi as f32),
            rotate: None,
        },
    }];
    for label in &page.labels {
        ops.extend(label_ops(label, dpi, page_h_pt));
    }
    debug!(
        width,
        height,
        dpi,
        labels = page.labels.len(),
        "page added to document"
    );
    PdfPage::new(page_w, page_h, ops)
}

impl PageSink<ComposedPage> for PdfPageSink {
    type Output = Vec<u8>;

    fn append(&mut self, index: usize, page: ComposedPage) -> Result<()> {
        if index != self.pages.len() {
            return Err(SheetpressError::PdfError(format!(
                "page {index} arrived while expecting page {}",
                self.pages.len()
            )));
        }
        self.pages.push(page);
        Ok(())
    }

    #[instrument(skip_all, fields(pages = self.pages.len()))]
    fn finish(self) -> Result<Vec<u8>> {
        if self.pages.is_empty() {
            return Err(SheetpressError::PdfError("document has no pages".into()));
        }
        let mut doc = PdfDocument::new(&self.title);
        let pages: Vec<PdfPage> = self
            .pages
            .into_iter()
            .map(|page| build_page(&mut doc, page))
            .collect();
        doc.with_pages(pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        debug!(bytes = output.len(), warnings = warnings.len(), "document serialised");
        Ok(output)
    }
}
