use std::path::{Path, PathBuf};

use ab_glyph::{point, Font, FontVec, PxScale, ScaleFont};
use anyhow::{anyhow, bail, Context, Result};
use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use image::{Rgb, RgbImage};

use crate::report::{BlockStyle, ReportDocument};

/// Capture settings, in logical pixels before `scale` is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureOptions {
    pub scale: f32,
    pub width: u32,
    pub background: [u8; 3],
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            scale: 2.0,
            width: 800,
            background: [0xf8, 0xfa, 0xfc],
        }
    }
}

impl CaptureOptions {
    pub fn pixel_width(&self) -> u32 {
        (self.width as f32 * self.scale).round().max(1.0) as u32
    }
}

/// Turns a laid-out report into one tall bitmap.
pub trait ReportRasterizer: Send + Sync {
    fn rasterize(&self, doc: &ReportDocument, options: &CaptureOptions) -> Result<RgbImage>;
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum FaceRole {
    Regular,
    Bold,
    Italic,
}

struct TextStyle {
    size: f32,
    face: FaceRole,
    color: [u8; 3],
    space_before: f32,
    space_after: f32,
    indent: f32,
}

fn text_style(style: BlockStyle) -> TextStyle {
    let (size, face, color, space_before, space_after, indent) = match style {
        BlockStyle::Title => (30.0, FaceRole::Bold, [0x0f, 0x17, 0x2a], 0.0, 4.0, 0.0),
        BlockStyle::Byline => (15.0, FaceRole::Italic, [0x64, 0x74, 0x8b], 0.0, 10.0, 0.0),
        BlockStyle::Badge => (14.0, FaceRole::Bold, [0x43, 0x38, 0xca], 2.0, 2.0, 0.0),
        BlockStyle::Section => (20.0, FaceRole::Bold, [0x1e, 0x29, 0x3b], 24.0, 8.0, 0.0),
        BlockStyle::Label => (12.0, FaceRole::Bold, [0x4f, 0x46, 0xe5], 8.0, 3.0, 0.0),
        BlockStyle::Body => (14.0, FaceRole::Regular, [0x33, 0x41, 0x55], 0.0, 6.0, 0.0),
        BlockStyle::Poem => (15.0, FaceRole::Italic, [0x1e, 0x29, 0x3b], 4.0, 8.0, 16.0),
        BlockStyle::Quote => (14.0, FaceRole::Italic, [0x33, 0x41, 0x55], 2.0, 8.0, 16.0),
        BlockStyle::Question => (15.0, FaceRole::Bold, [0x0f, 0x17, 0x2a], 14.0, 4.0, 0.0),
        BlockStyle::Hint => (12.0, FaceRole::Regular, [0x94, 0xa3, 0xb8], 0.0, 4.0, 16.0),
        BlockStyle::KeyPoint => (12.0, FaceRole::Regular, [0x47, 0x55, 0x69], 0.0, 2.0, 16.0),
        BlockStyle::Footer => (10.0, FaceRole::Bold, [0x94, 0xa3, 0xb8], 12.0, 0.0, 0.0),
    };
    TextStyle {
        size,
        face,
        color,
        space_before,
        space_after,
        indent,
    }
}

/// Regular, bold and italic faces used for the report.
pub struct FontSet {
    regular: FontVec,
    bold: FontVec,
    italic: FontVec,
}

impl FontSet {
    /// An explicit font file is used for every role; otherwise system
    /// sans-serif faces are queried, then serif, then whatever is installed.
    pub fn load(font_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = font_path {
            let mut db = Database::new();
            db.load_font_file(path)
                .with_context(|| format!("failed loading font {}", path.display()))?;
            let id = db
                .faces()
                .next()
                .map(|face| face.id)
                .with_context(|| format!("{} contains no usable font face", path.display()))?;
            return Ok(Self {
                regular: face_font(&db, id)?,
                bold: face_font(&db, id)?,
                italic: face_font(&db, id)?,
            });
        }

        let mut db = Database::new();
        db.load_system_fonts();
        let Some(first) = db.faces().next().map(|face| face.id) else {
            bail!("no fonts found on this system; pass --font or set POETIQUE_REPORT_FONT");
        };
        let resolve = |weight: Weight, style: Style| {
            let id = [Family::SansSerif, Family::Serif]
                .iter()
                .find_map(|family| {
                    db.query(&Query {
                        families: std::slice::from_ref(family),
                        weight,
                        stretch: Stretch::Normal,
                        style,
                    })
                })
                .unwrap_or(first);
            face_font(&db, id)
        };
        Ok(Self {
            regular: resolve(Weight::NORMAL, Style::Normal)?,
            bold: resolve(Weight::BOLD, Style::Normal)?,
            italic: resolve(Weight::NORMAL, Style::Italic)?,
        })
    }

    fn face(&self, role: FaceRole) -> &FontVec {
        match role {
            FaceRole::Regular => &self.regular,
            FaceRole::Bold => &self.bold,
            FaceRole::Italic => &self.italic,
        }
    }
}

fn face_font(db: &Database, id: fontdb::ID) -> Result<FontVec> {
    let (data, index) = db
        .with_face_data(id, |data, index| (data.to_vec(), index))
        .ok_or_else(|| anyhow!("font face data is unavailable"))?;
    FontVec::try_from_vec_and_index(data, index).map_err(|err| anyhow!("invalid font: {err}"))
}

/// Draws the report with real font outlines, synchronously.
pub struct GlyphRasterizer {
    font_path: Option<PathBuf>,
}

impl GlyphRasterizer {
    pub fn new(font_path: Option<PathBuf>) -> Self {
        Self { font_path }
    }
}

impl ReportRasterizer for GlyphRasterizer {
    fn rasterize(&self, doc: &ReportDocument, options: &CaptureOptions) -> Result<RgbImage> {
        let fonts = FontSet::load(self.font_path.as_deref())?;
        render_document(&fonts, doc, options)
    }
}

const PADDING: f32 = 40.0;
const LINE_SPACING: f32 = 1.45;

struct PlacedLine<'a> {
    text: String,
    style: TextStyle,
    font: &'a FontVec,
    x: f32,
    baseline: f32,
}

pub fn render_document(
    fonts: &FontSet,
    doc: &ReportDocument,
    options: &CaptureOptions,
) -> Result<RgbImage> {
    let scale = options.scale;
    if !(scale.is_finite() && scale > 0.0) {
        bail!("capture scale must be positive, got {scale}");
    }
    let width_px = options.pixel_width();
    let mut lines: Vec<PlacedLine<'_>> = Vec::new();
    let mut cursor = PADDING * scale;

    for block in &doc.blocks {
        let style = text_style(block.style);
        let font = fonts.face(style.face);
        let px = PxScale::from(style.size * scale);
        let scaled = font.as_scaled(px);
        let x = (PADDING + style.indent) * scale;
        let max_width = width_px as f32 - x - PADDING * scale;
        let text = match block.style {
            BlockStyle::KeyPoint => format!("\u{2022} {}", block.text),
            _ => block.text.clone(),
        };
        cursor += style.space_before * scale;
        let line_height = style.size * scale * LINE_SPACING;
        for line in wrap_text(&text, max_width, |candidate| measure(font, px, candidate)) {
            let baseline = cursor + scaled.ascent();
            cursor += line_height;
            lines.push(PlacedLine {
                text: line,
                style: text_style(block.style),
                font,
                x,
                baseline,
            });
        }
        cursor += style.space_after * scale;
    }
    cursor += PADDING * scale;

    let height_px = cursor.ceil().max(1.0) as u32;
    let mut canvas = RgbImage::from_pixel(width_px, height_px, Rgb(options.background));
    for line in &lines {
        draw_line(&mut canvas, line, scale);
    }
    Ok(canvas)
}

fn measure(font: &FontVec, px: PxScale, text: &str) -> f32 {
    let scaled = font.as_scaled(px);
    let mut width = 0.0;
    let mut previous = None;
    for ch in text.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(prev) = previous {
            width += scaled.kern(prev, id);
        }
        width += scaled.h_advance(id);
        previous = Some(id);
    }
    width
}

fn draw_line(canvas: &mut RgbImage, line: &PlacedLine<'_>, scale: f32) {
    let px = PxScale::from(line.style.size * scale);
    let scaled = line.font.as_scaled(px);
    let (width, height) = canvas.dimensions();
    let mut caret = line.x;
    let mut previous = None;
    for ch in line.text.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(prev) = previous {
            caret += scaled.kern(prev, id);
        }
        let glyph = id.with_scale_and_position(px, point(caret, line.baseline));
        caret += scaled.h_advance(id);
        previous = Some(id);
        let Some(outlined) = line.font.outline_glyph(glyph) else {
            continue;
        };
        let bounds = outlined.px_bounds();
        outlined.draw(|gx, gy, coverage| {
            let x = bounds.min.x as i64 + i64::from(gx);
            let y = bounds.min.y as i64 + i64::from(gy);
            if x < 0 || y < 0 || x >= i64::from(width) || y >= i64::from(height) {
                return;
            }
            let pixel = canvas.get_pixel_mut(x as u32, y as u32);
            let alpha = coverage.clamp(0.0, 1.0);
            for (channel, ink) in pixel.0.iter_mut().zip(line.style.color) {
                *channel = (f32::from(*channel) * (1.0 - alpha) + f32::from(ink) * alpha).round()
                    as u8;
            }
        });
    }
}

/// Greedy word wrap. Explicit newlines are kept; a word wider than
/// `max_width` on its own is split between characters.
pub fn wrap_text(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut out = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if measure(&candidate) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            if measure(word) <= max_width {
                current = word.to_string();
                continue;
            }
            for ch in word.chars() {
                let mut next = current.clone();
                next.push(ch);
                if !current.is_empty() && measure(&next) > max_width {
                    out.push(std::mem::replace(&mut current, ch.to_string()));
                } else {
                    current = next;
                }
            }
        }
        out.push(current);
    }
    out
}

#[cfg(test)]
mod tests {
    use poetique_contracts::AnswerVisibility;

    use super::{render_document, text_style, wrap_text, CaptureOptions, FontSet};
    use crate::report::{BlockStyle, ReportDocument};
    use crate::testing::sample_result;

    fn chars(text: &str) -> f32 {
        text.chars().count() as f32
    }

    #[test]
    fn wraps_on_word_boundaries() {
        let lines = wrap_text("the sneer of cold command", 10.0, chars);
        assert_eq!(lines, ["the sneer", "of cold", "command"]);
    }

    #[test]
    fn keeps_explicit_line_breaks_and_blank_lines() {
        let lines = wrap_text("I met a traveller\n\nWho said", 40.0, chars);
        assert_eq!(lines, ["I met a traveller", "", "Who said"]);
    }

    #[test]
    fn splits_words_longer_than_the_line() {
        let lines = wrap_text("ab abcdefgh", 4.0, chars);
        assert_eq!(lines, ["ab", "abcd", "efgh"]);
    }

    #[test]
    fn capture_defaults_match_a_two_x_800px_report() {
        let options = CaptureOptions::default();
        assert_eq!(options.pixel_width(), 1600);
        assert_eq!(options.background, [0xf8, 0xfa, 0xfc]);
        assert!(text_style(BlockStyle::Title).size > text_style(BlockStyle::Body).size);
    }

    #[test]
    fn system_fonts_render_an_inked_report() -> anyhow::Result<()> {
        let Ok(fonts) = FontSet::load(None) else {
            eprintln!("no system fonts resolved; skipping glyph render");
            return Ok(());
        };
        let result = sample_result();
        let doc = ReportDocument::build(&result, &AnswerVisibility::new(), true);
        let options = CaptureOptions {
            scale: 1.0,
            ..CaptureOptions::default()
        };
        let bitmap = render_document(&fonts, &doc, &options)?;
        assert_eq!(bitmap.width(), 800);
        assert!(bitmap.height() > 800);
        let background = image::Rgb(options.background);
        let inked = bitmap.pixels().filter(|pixel| **pixel != background).count();
        assert!(inked > 1000, "only {inked} pixels were drawn");
        Ok(())
    }
}
