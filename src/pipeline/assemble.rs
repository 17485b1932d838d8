//! Assemble stage: preview JPEG + OCR dump → one searchable PDF page each.
//!
//! Every page is sized to its JPEG (one pixel = one point) and shows the
//! JPEG, embedded as-is, as background. Each confident word from the TSV is
//! drawn on top in text rendering mode *invisible*: it can be selected and
//! searched but never paints. OCR coordinates live in TIFF pixel space, so they are
//! scaled by `jpeg_width / tiff_width` and flipped to PDF's bottom-up y axis.

use crate::error::{Error, Result};
use crate::ocr::{tsv, OcrOutput};
use crate::output::PageArtifacts;
use crate::progress::StageContext;
use crate::PDF_TAG;
use image::codecs::jpeg::JpegDecoder;
use image::{ColorType, ImageDecoder};
use printpdf::{
    BuiltinFont, DictItem, ExternalStream, ExternalXObject, Mm, Op, PdfDocument, PdfPage,
    PdfSaveOptions, PdfWarnMsg, Point, Pt, Px, TextItem, TextRenderingMode, XObjectTransform,
};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, warn};

/// Average Helvetica advance width as a fraction of the font size.
const AVG_GLYPH_WIDTH_EM: f32 = 0.5;

/// Share of the font size that sits below the baseline.
const DESCENT_EM: f32 = 0.2;

/// A word ready to be drawn, in PDF points with the origin bottom-left.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedWord {
    pub text: String,
    pub x: f32,
    /// Baseline.
    pub y: f32,
    pub font_size: f32,
    /// Horizontal scaling in percent that stretches the text to its box.
    pub horizontal_scaling: f32,
}

/// Counts reported back to the orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssembleStats {
    pub pages: usize,
    pub words_kept: usize,
    pub words_dropped: usize,
}

/// Place the confident words of one page.
///
/// `scale` maps OCR pixel coordinates onto page points and `page_height` is
/// in points. Returns the placed words and how many were dropped for low
/// confidence or a degenerate box.
pub fn text_layer(
    ocr: &OcrOutput,
    min_confidence: f32,
    scale: f32,
    page_height: f32,
) -> (Vec<PlacedWord>, usize) {
    let mut placed = Vec::with_capacity(ocr.len());
    let mut dropped = 0;

    for record in &ocr.records {
        let text = record.text.trim();
        let width = record.rect.width() * scale;
        let height = record.rect.height() * scale;
        if record.confidence < min_confidence || text.is_empty() || width <= 0.0 || height <= 0.0
        {
            dropped += 1;
            continue;
        }

        let font_size = height;
        let natural_width = text.chars().count() as f32 * AVG_GLYPH_WIDTH_EM * font_size;
        let horizontal_scaling = (width / natural_width * 100.0).clamp(10.0, 500.0);

        placed.push(PlacedWord {
            text: text.to_string(),
            x: record.rect.x1 * scale,
            y: page_height - record.rect.y2 * scale + DESCENT_EM * font_size,
            font_size,
            horizontal_scaling,
        });
    }

    (placed, dropped)
}

fn text_ops(words: &[PlacedWord]) -> Vec<Op> {
    if words.is_empty() {
        return Vec::new();
    }

    let mut ops = Vec::with_capacity(words.len() * 4 + 3);
    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextRenderingMode {
        mode: TextRenderingMode::Invisible,
    });
    for w in words {
        ops.push(Op::SetFontSizeBuiltinFont {
            size: Pt(w.font_size),
            font: BuiltinFont::Helvetica,
        });
        ops.push(Op::SetHorizontalScaling {
            percent: w.horizontal_scaling,
        });
        ops.push(Op::SetTextCursor {
            pos: Point {
                x: Pt(w.x),
                y: Pt(w.y),
            },
        });
        ops.push(Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(w.text.clone())],
            font: BuiltinFont::Helvetica,
        });
    }
    ops.push(Op::EndTextSection);
    ops
}

fn pt_to_mm(pt: f32) -> Mm {
    Mm(pt * 25.4 / 72.0)
}

/// The preview JPEG as an image XObject, embedded byte for byte.
///
/// The stream keeps its `DCTDecode` filter, so the quality chosen for the
/// compress stage is exactly what ends up in the PDF.
fn jpeg_xobject(path: &Path) -> Result<(ExternalXObject, u32, u32)> {
    let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    let decoder = JpegDecoder::new(Cursor::new(bytes.as_slice()))
        .map_err(|e| Error::image(path, e))?;
    let (width, height) = decoder.dimensions();
    let color_space: &[u8] = match decoder.color_type() {
        ColorType::L8 | ColorType::L16 => b"DeviceGray",
        _ => b"DeviceRGB",
    };

    let dict = BTreeMap::from([
        ("Type".to_string(), DictItem::Name(b"XObject".to_vec())),
        ("Subtype".to_string(), DictItem::Name(b"Image".to_vec())),
        ("Width".to_string(), DictItem::Int(i64::from(width))),
        ("Height".to_string(), DictItem::Int(i64::from(height))),
        ("ColorSpace".to_string(), DictItem::Name(color_space.to_vec())),
        ("BitsPerComponent".to_string(), DictItem::Int(8)),
        ("Filter".to_string(), DictItem::Name(b"DCTDecode".to_vec())),
    ]);
    let xobject = ExternalXObject {
        stream: ExternalStream {
            dict,
            content: bytes,
            compress: false,
        },
        width: Some(Px(width as usize)),
        height: Some(Px(height as usize)),
        dpi: Some(72.0),
    };
    Ok((xobject, width, height))
}

/// Build one page: background image plus invisible text.
fn build_page(
    doc: &mut PdfDocument,
    page: &PageArtifacts,
    min_confidence: f32,
    stats: &mut AssembleStats,
) -> Result<PdfPage> {
    let (xobject, width, height) = jpeg_xobject(&page.jpeg)?;
    let (tiff_width, _) =
        image::image_dimensions(&page.tiff).map_err(|e| Error::image(&page.tiff, e))?;
    if tiff_width == 0 {
        return Err(Error::PdfAssembly {
            page: page.page_index,
            detail: format!("{} has zero width", page.tiff.display()),
        });
    }
    let image_id = doc.add_xobject(&xobject);

    let page_w = width as f32;
    let page_h = height as f32;
    let scale = page_w / tiff_width as f32;

    let ocr = tsv::read_tsv(&page.tsv)?;
    let (words, dropped) = text_layer(&ocr, min_confidence, scale, page_h);
    stats.words_kept += words.len();
    stats.words_dropped += dropped;
    debug!(
        "Page {}: {}x{} pt, {} words placed, {} dropped",
        page.page_index,
        width,
        height,
        words.len(),
        dropped
    );

    let mut ops = vec![Op::UseXobject {
        id: image_id,
        transform: XObjectTransform {
            translate_x: Some(Pt(0.0)),
            translate_y: Some(Pt(0.0)),
            scale_x: None,
            scale_y: None,
            // At 72 DPI one pixel maps to one point, i.e. the full page.
            dpi: Some(72.0),
            rotate: None,
        },
    }];
    ops.extend(text_ops(&words));

    Ok(PdfPage::new(pt_to_mm(page_w), pt_to_mm(page_h), ops))
}

/// Write the searchable PDF for `pages` to `output`.
///
/// Nothing is written if the cancellation flag is raised at any point.
pub fn generate_pdf(
    pages: &[PageArtifacts],
    output: &Path,
    min_confidence: f32,
    ctx: StageContext<'_>,
) -> Result<AssembleStats> {
    let total = pages.len();
    info!("Assembling {} pages into {}", total, output.display());
    ctx.start(total);

    let title = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Searchable PDF".to_string());
    let mut doc = PdfDocument::new(&title);
    doc.metadata.info.creator = PDF_TAG.to_string();
    doc.metadata.info.producer = format!("{} {}", PDF_TAG, env!("CARGO_PKG_VERSION"));

    let mut stats = AssembleStats::default();
    let mut pdf_pages = Vec::with_capacity(total);
    for (done, page) in pages.iter().enumerate() {
        ctx.check(done, total)?;
        pdf_pages.push(build_page(&mut doc, page, min_confidence, &mut stats)?);
        ctx.page_done(page.page_index, done + 1, total, true);
    }
    ctx.check(total, total)?;

    doc.with_pages(pdf_pages);
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
    if !warnings.is_empty() {
        warn!("printpdf reported {} warnings", warnings.len());
        for w in &warnings {
            debug!("printpdf: {:?}", w);
        }
    }

    write_output(output, &bytes)?;
    stats.pages = total;
    ctx.finish();
    info!(
        "Wrote {} ({} bytes, {} words)",
        output.display(),
        bytes.len(),
        stats.words_kept
    );
    Ok(stats)
}

/// Atomic write: temp file in the same directory, then rename.
fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    let fail = |source| Error::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(fail)?;
    }
    let tmp_path = path.with_extension("pdf.tmp");
    std::fs::write(&tmp_path, bytes).map_err(fail)?;
    std::fs::rename(&tmp_path, path).map_err(fail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{OcrRecord, OcrRect};

    fn word(text: &str, rect: OcrRect, confidence: f32) -> OcrRecord {
        OcrRecord {
            rect,
            text: text.into(),
            confidence,
        }
    }

    #[test]
    fn low_confidence_words_are_excluded() {
        let ocr = OcrOutput::new(vec![
            word("keep", OcrRect::new(0.0, 0.0, 40.0, 10.0), 80.0),
            word("noise", OcrRect::new(0.0, 20.0, 50.0, 30.0), 24.9),
            word("edge", OcrRect::new(0.0, 40.0, 40.0, 50.0), 25.0),
        ]);
        let (placed, dropped) = text_layer(&ocr, 25.0, 1.0, 100.0);
        let texts: Vec<_> = placed.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["keep", "edge"]);
        assert_eq!(dropped, 1);
    }

    #[test]
    fn coordinates_are_scaled_and_flipped() {
        // 300 DPI raster shown at 100 DPI → scale 1/3.
        let ocr = OcrOutput::new(vec![word(
            "Total",
            OcrRect::new(300.0, 600.0, 450.0, 630.0),
            90.0,
        )]);
        let (placed, _) = text_layer(&ocr, 0.0, 1.0 / 3.0, 1000.0);
        let w = &placed[0];
        assert!((w.x - 100.0).abs() < 1e-3);
        assert!((w.font_size - 10.0).abs() < 1e-3);
        // bottom edge at 1000 - 210 = 790, baseline lifted by the descent.
        assert!((w.y - (790.0 + DESCENT_EM * 10.0)).abs() < 1e-3);
        // 5 chars * 0.5 em * 10pt = 25pt natural vs 50pt box → 200 %.
        assert!((w.horizontal_scaling - 200.0).abs() < 1e-3);
    }

    #[test]
    fn degenerate_boxes_and_blank_text_are_dropped() {
        let ocr = OcrOutput::new(vec![
            word("flat", OcrRect::new(0.0, 10.0, 40.0, 10.0), 99.0),
            word("   ", OcrRect::new(0.0, 0.0, 40.0, 10.0), 99.0),
        ]);
        let (placed, dropped) = text_layer(&ocr, 0.0, 1.0, 100.0);
        assert!(placed.is_empty());
        assert_eq!(dropped, 2);
    }

    #[test]
    fn text_ops_wrap_words_in_one_invisible_section() {
        let words = vec![PlacedWord {
            text: "a".into(),
            x: 1.0,
            y: 2.0,
            font_size: 10.0,
            horizontal_scaling: 100.0,
        }];
        let ops = text_ops(&words);
        assert!(matches!(ops.first(), Some(Op::StartTextSection)));
        assert!(matches!(ops.last(), Some(Op::EndTextSection)));
        assert!(ops.iter().any(|op| matches!(
            op,
            Op::SetTextRenderingMode {
                mode: TextRenderingMode::Invisible
            }
        )));
        assert!(text_ops(&[]).is_empty());
    }

    #[test]
    fn jpeg_is_embedded_without_reencoding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.100.40.jpeg");
        image::RgbImage::from_pixel(64, 32, image::Rgb([200, 10, 10]))
            .save(&path)
            .unwrap();

        let (xobject, width, height) = jpeg_xobject(&path).unwrap();
        assert_eq!((width, height), (64, 32));
        assert_eq!(xobject.stream.content, std::fs::read(&path).unwrap());
        assert!(!xobject.stream.compress);
        assert_eq!(
            xobject.stream.dict.get("Filter"),
            Some(&DictItem::Name(b"DCTDecode".to_vec()))
        );
        assert_eq!(
            xobject.stream.dict.get("ColorSpace"),
            Some(&DictItem::Name(b"DeviceRGB".to_vec()))
        );
    }

    #[test]
    fn points_to_millimetres() {
        assert!((pt_to_mm(72.0).0 - 25.4).abs() < 1e-4);
    }
}
