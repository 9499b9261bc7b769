//! Formula rasterization: draw a formula's text into a transparent PNG so
//! the PDF renderer never needs native math typesetting.
//!
//! Glyph outlines come from a system serif face discovered through `fontdb`
//! and parsed with `ttf-parser`; contours are flattened and scanline-filled
//! (non-zero winding) into an `image` buffer. The result is returned as a
//! base64 data URI ready to drop into an `<img src>` attribute.

use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use fontdb::{Database, Family, Query};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use thiserror::Error;
use tracing::debug;
use ttf_parser::{Face, GlyphId, OutlineBuilder};

const INLINE_FONT_PX: f32 = 14.0;
const DISPLAY_FONT_PX: f32 = 18.0;
const SUPERSAMPLE: f32 = 2.0;
const PAD_PX: u32 = 2;

#[derive(Debug, Error)]
pub enum MathError {
    #[error("no usable serif font available on this host")]
    NoFont,
    #[error("formula is empty")]
    EmptyFormula,
    #[error("font face could not be parsed: {0}")]
    Face(String),
    #[error("png encoding failed: {0}")]
    Encode(String),
}

/// A rasterized formula, ready for embedding.
#[derive(Debug, Clone)]
pub struct RasterFormula {
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
}

/// Seam between the transformer and the rasterizer so tests can substitute
/// a deterministic fake (including one that always fails, to exercise the
/// degradation path).
pub trait MathRasterizer: Send + Sync {
    fn rasterize(&self, formula: &str, display: bool) -> Result<RasterFormula, MathError>;
}

struct FaceData {
    bytes: Vec<u8>,
    index: u32,
}

/// Rasterizer backed by the host's installed fonts.
///
/// Construction never fails: when no serif face is found every `rasterize`
/// call reports [`MathError::NoFont`] and the transformer degrades to its
/// inline error marker.
pub struct SystemFontRasterizer {
    face: Option<FaceData>,
}

impl SystemFontRasterizer {
    pub fn from_system_fonts() -> Self {
        let mut db = Database::new();
        db.load_system_fonts();

        let query = Query {
            families: &[
                Family::Name("Times New Roman"),
                Family::Name("Liberation Serif"),
                Family::Name("Nimbus Roman No9 L"),
                Family::Name("DejaVu Serif"),
                Family::Serif,
            ],
            ..Query::default()
        };

        let face = db.query(&query).and_then(|id| {
            db.with_face_data(id, |data, index| FaceData {
                bytes: data.to_vec(),
                index,
            })
        });

        if face.is_none() {
            debug!("no serif font found; formulas will degrade to error markers");
        }

        Self { face }
    }
}

impl MathRasterizer for SystemFontRasterizer {
    fn rasterize(&self, formula: &str, display: bool) -> Result<RasterFormula, MathError> {
        let face_data = self.face.as_ref().ok_or(MathError::NoFont)?;
        let face = Face::parse(&face_data.bytes, face_data.index)
            .map_err(|err| MathError::Face(err.to_string()))?;

        let text = formula.trim().trim_matches('$').trim();
        if text.is_empty() {
            return Err(MathError::EmptyFormula);
        }

        let font_px = if display {
            DISPLAY_FONT_PX
        } else {
            INLINE_FONT_PX
        };
        let scale = font_px * SUPERSAMPLE / f32::from(face.units_per_em());
        let ascender = f32::from(face.ascender());
        let descender = f32::from(face.descender());

        let mut contours: Vec<Vec<(f32, f32)>> = Vec::new();
        let mut pen_x = 0.0_f32;

        for ch in text.chars() {
            if ch == ' ' || ch == '\t' {
                pen_x += f32::from(face.units_per_em()) * 0.3;
                continue;
            }
            let glyph = face
                .glyph_index(ch)
                .or_else(|| face.glyph_index('?'))
                .unwrap_or(GlyphId(0));

            let mut builder = ContourBuilder::new(pen_x);
            face.outline_glyph(glyph, &mut builder);
            contours.extend(builder.finish());

            pen_x += face
                .glyph_hor_advance(glyph)
                .map(f32::from)
                .unwrap_or_else(|| f32::from(face.units_per_em()) * 0.5);
        }

        let width = (pen_x * scale).ceil() as u32 + 2 * PAD_PX;
        let height = ((ascender - descender) * scale).ceil() as u32 + 2 * PAD_PX;
        let mut canvas = RgbaImage::new(width.max(1), height.max(1));

        // Map font units to pixel space: y grows downwards from the ascender.
        let edges: Vec<((f32, f32), (f32, f32))> = contours
            .iter()
            .flat_map(|contour| {
                contour.windows(2).map(|pair| {
                    let to_px = |(x, y): (f32, f32)| {
                        (
                            x * scale + PAD_PX as f32,
                            (ascender - y) * scale + PAD_PX as f32,
                        )
                    };
                    (to_px(pair[0]), to_px(pair[1]))
                })
            })
            .collect();

        fill_nonzero(&mut canvas, &edges);

        let mut encoded = Vec::new();
        DynamicImage::ImageRgba8(canvas)
            .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)
            .map_err(|err| MathError::Encode(err.to_string()))?;

        Ok(RasterFormula {
            data_uri: format!("data:image/png;base64,{}", BASE64.encode(&encoded)),
            width: width.max(1),
            height: height.max(1),
        })
    }
}

/// Accumulates one glyph's contours as closed polylines in font units,
/// offset horizontally by the pen position. Curves are flattened with a
/// fixed subdivision count, plenty at formula sizes.
struct ContourBuilder {
    offset_x: f32,
    current: Vec<(f32, f32)>,
    contours: Vec<Vec<(f32, f32)>>,
}

impl ContourBuilder {
    fn new(offset_x: f32) -> Self {
        Self {
            offset_x,
            current: Vec::new(),
            contours: Vec::new(),
        }
    }

    fn push(&mut self, x: f32, y: f32) {
        self.current.push((x + self.offset_x, y));
    }

    fn last(&self) -> (f32, f32) {
        self.current
            .last()
            .copied()
            .map(|(x, y)| (x - self.offset_x, y))
            .unwrap_or((0.0, 0.0))
    }

    fn finish(mut self) -> Vec<Vec<(f32, f32)>> {
        self.end_contour();
        self.contours
    }

    fn end_contour(&mut self) {
        if self.current.len() > 1 {
            let first = self.current[0];
            if self.current.last() != Some(&first) {
                self.current.push(first);
            }
            self.contours.push(std::mem::take(&mut self.current));
        } else {
            self.current.clear();
        }
    }
}

impl OutlineBuilder for ContourBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        self.end_contour();
        self.push(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.push(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x0, y0) = self.last();
        const STEPS: u32 = 8;
        for step in 1..=STEPS {
            let t = step as f32 / STEPS as f32;
            let mt = 1.0 - t;
            let px = mt * mt * x0 + 2.0 * mt * t * x1 + t * t * x;
            let py = mt * mt * y0 + 2.0 * mt * t * y1 + t * t * y;
            self.push(px, py);
        }
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x0, y0) = self.last();
        const STEPS: u32 = 16;
        for step in 1..=STEPS {
            let t = step as f32 / STEPS as f32;
            let mt = 1.0 - t;
            let px = mt * mt * mt * x0
                + 3.0 * mt * mt * t * x1
                + 3.0 * mt * t * t * x2
                + t * t * t * x;
            let py = mt * mt * mt * y0
                + 3.0 * mt * mt * t * y1
                + 3.0 * mt * t * t * y2
                + t * t * t * y;
            self.push(px, py);
        }
    }

    fn close(&mut self) {
        self.end_contour();
    }
}

/// Scanline fill with the non-zero winding rule, the fill convention
/// TrueType outlines are designed for.
fn fill_nonzero(canvas: &mut RgbaImage, edges: &[((f32, f32), (f32, f32))]) {
    let ink = Rgba([0, 0, 0, 255]);
    let width = canvas.width() as i64;

    for row in 0..canvas.height() {
        let sample_y = row as f32 + 0.5;
        let mut crossings: Vec<(f32, i32)> = Vec::new();

        for &((x0, y0), (x1, y1)) in edges {
            let (direction, top, bottom) = if y0 < y1 {
                (1, (x0, y0), (x1, y1))
            } else if y1 < y0 {
                (-1, (x1, y1), (x0, y0))
            } else {
                continue;
            };
            if sample_y < top.1 || sample_y >= bottom.1 {
                continue;
            }
            let t = (sample_y - top.1) / (bottom.1 - top.1);
            crossings.push((top.0 + t * (bottom.0 - top.0), direction));
        }

        crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut winding = 0;
        let mut span_start = 0.0_f32;
        for (x, direction) in crossings {
            if winding == 0 {
                span_start = x;
            }
            winding += direction;
            if winding == 0 {
                let from = span_start.floor().max(0.0) as i64;
                let to = (x.ceil() as i64).min(width);
                for col in from..to {
                    canvas.put_pixel(col as u32, row, ink);
                }
            }
        }
    }
}
