//! Raster rendering of the distorted-text CAPTCHA.
//!
//! Layers, bottom to top:
//! 1. horizontal grey→white gradient
//! 2. faint scratch strokes
//! 3. glyphs, each with its own rotation and vertical jitter
//! 4. one or two full-width jagged polylines
//! 5. noise dots

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{ImageFormat, Rgba, RgbaImage, imageops};
use imageproc::drawing::{Blend, Canvas, draw_filled_rect_mut, draw_line_segment_mut};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use imageproc::rect::Rect;
use mida_common::MidaError;
use rand::Rng;
use rusttype::{Font, Scale, point};
use std::io::Cursor;

const WIDTH: u32 = 280;
const HEIGHT: u32 = 80;
const FONT_SIZE: f32 = 44.0;
const START_X: f32 = 40.0;
const CHAR_SPACING: f32 = 45.0;
const GLYPH_TILE: u32 = 64;

/// DejaVu Sans, shipped with the crate so glyphs render without setup
const EMBEDDED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

const GRADIENT_FROM: Rgba<u8> = Rgba([0xc0, 0xc0, 0xc0, 0xff]);
const GRADIENT_TO: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);
const INK: Rgba<u8> = Rgba([0, 0, 0, 0xff]);
const SCRATCH: Rgba<u8> = Rgba([0, 0, 0, 26]);
const DOT: Rgba<u8> = Rgba([0, 0, 0, 51]);

/// Renders CAPTCHA text into a noisy 280x80 image
pub struct TextRenderer {
    font: Option<Font<'static>>,
}

impl TextRenderer {
    pub fn new(font: Option<Font<'static>>) -> Self {
        Self { font }
    }

    /// Renderer over the bundled DejaVu Sans
    pub fn embedded() -> Self {
        let font = Font::try_from_bytes(EMBEDDED_FONT);
        if font.is_none() {
            tracing::error!("Bundled CAPTCHA font failed to parse");
        }
        Self::new(font)
    }

    /// Load the glyph font from disk, falling back to the bundled font
    /// when the file is missing or invalid.
    pub fn from_font_path(path: &str) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => match Font::try_from_vec(bytes) {
                Some(font) => Self::new(Some(font)),
                None => {
                    tracing::warn!(path = %path, "Font file is not a valid TrueType font, using bundled font");
                    Self::embedded()
                }
            },
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Font file not readable, using bundled font");
                Self::embedded()
            }
        }
    }

    /// Configured font when set, bundled font otherwise
    pub fn from_config(font_path: Option<&str>) -> Self {
        match font_path {
            Some(path) => Self::from_font_path(path),
            None => Self::embedded(),
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (WIDTH, HEIGHT)
    }

    pub fn render<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> RgbaImage {
        let mut image = RgbaImage::new(WIDTH, HEIGHT);
        fill_background(&mut image);

        let mut canvas = Blend(image);
        draw_scratches(&mut canvas, rng);
        let mut image = canvas.0;

        if let Some(font) = &self.font {
            draw_glyphs(&mut image, font, text, rng);
        }

        let mut canvas = Blend(image);
        draw_jagged_line(&mut canvas, rng);
        if rng.random_bool(0.5) {
            draw_jagged_line(&mut canvas, rng);
        }
        draw_noise_dots(&mut canvas, rng);
        canvas.0
    }

    /// Render and encode as a `data:image/png;base64,...` URL
    pub fn render_data_url<R: Rng + ?Sized>(
        &self,
        text: &str,
        rng: &mut R,
    ) -> Result<String, MidaError> {
        let image = self.render(text, rng);
        let mut png = Cursor::new(Vec::new());
        image
            .write_to(&mut png, ImageFormat::Png)
            .map_err(|e| MidaError::Captcha(format!("PNG encoding failed: {}", e)))?;
        Ok(format!(
            "data:image/png;base64,{}",
            STANDARD.encode(png.into_inner())
        ))
    }
}

fn fill_background(image: &mut RgbaImage) {
    imageops::horizontal_gradient(image, &GRADIENT_FROM, &GRADIENT_TO);
}

fn random_point<R: Rng + ?Sized>(rng: &mut R) -> (f32, f32) {
    (
        rng.random::<f32>() * WIDTH as f32,
        rng.random::<f32>() * HEIGHT as f32,
    )
}

/// Uniform in [-0.5, 0.5)
fn centered<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    rng.random::<f32>() - 0.5
}

fn draw_scratches<C, R>(canvas: &mut C, rng: &mut R)
where
    C: Canvas<Pixel = Rgba<u8>>,
    R: Rng + ?Sized,
{
    for _ in 0..15 {
        let from = random_point(rng);
        let to = random_point(rng);
        draw_line_segment_mut(canvas, from, to, SCRATCH);
    }
}

/// Parallel strokes offset along the segment normal
fn draw_thick_line<C>(canvas: &mut C, from: (f32, f32), to: (f32, f32), width: u32, color: C::Pixel)
where
    C: Canvas,
{
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let len = (dx * dx + dy * dy).sqrt().max(f32::EPSILON);
    let (nx, ny) = (-dy / len, dx / len);
    let half = (width as f32 - 1.0) / 2.0;
    for i in 0..width {
        let offset = i as f32 - half;
        draw_line_segment_mut(
            canvas,
            (from.0 + nx * offset, from.1 + ny * offset),
            (to.0 + nx * offset, to.1 + ny * offset),
            color,
        );
    }
}

fn draw_glyphs<R: Rng + ?Sized>(image: &mut RgbaImage, font: &Font<'static>, text: &str, rng: &mut R) {
    let scale = Scale::uniform(FONT_SIZE);
    let v_metrics = font.v_metrics(scale);
    let tile_center = GLYPH_TILE as f32 / 2.0;

    for (i, c) in text.chars().enumerate() {
        let mut tile = RgbaImage::new(GLYPH_TILE, GLYPH_TILE);

        let glyph = font.glyph(c).scaled(scale);
        let advance = glyph.h_metrics().advance_width;
        let baseline = tile_center + (v_metrics.ascent + v_metrics.descent) / 2.0;
        let glyph = glyph.positioned(point(tile_center - advance / 2.0, baseline));

        if let Some(bb) = glyph.pixel_bounding_box() {
            glyph.draw(|gx, gy, coverage| {
                let x = gx as i32 + bb.min.x;
                let y = gy as i32 + bb.min.y;
                if x >= 0 && y >= 0 && (x as u32) < GLYPH_TILE && (y as u32) < GLYPH_TILE {
                    let alpha = (coverage * 255.0) as u8;
                    tile.put_pixel(x as u32, y as u32, Rgba([0, 0, 0, alpha]));
                }
            });
        }

        // Per-glyph jitter stroke, drawn in the glyph's own frame
        if rng.random_bool(0.5) {
            let from = (tile_center - 10.0, tile_center + centered(rng) * 20.0);
            let to = (tile_center + 10.0, tile_center + centered(rng) * 20.0);
            draw_thick_line(&mut tile, from, to, 2, INK);
        }

        let theta = centered(rng) * 0.4;
        let rotated = rotate_about_center(&tile, theta, Interpolation::Bilinear, Rgba([0, 0, 0, 0]));

        let x = START_X + i as f32 * CHAR_SPACING;
        let y = HEIGHT as f32 / 2.0 + centered(rng) * 15.0;
        imageops::overlay(
            image,
            &rotated,
            (x - tile_center) as i64,
            (y - tile_center) as i64,
        );
    }
}

fn draw_jagged_line<C, R>(canvas: &mut C, rng: &mut R)
where
    C: Canvas<Pixel = Rgba<u8>>,
    R: Rng + ?Sized,
{
    const SEGMENTS: u32 = 5;
    let mut x = 10.0;
    let mut y = HEIGHT as f32 / 2.0 + centered(rng) * 30.0;
    for _ in 0..SEGMENTS {
        let next = (x + WIDTH as f32 / SEGMENTS as f32, y + centered(rng) * 40.0);
        draw_thick_line(canvas, (x, y), next, 3, INK);
        (x, y) = next;
    }
}

fn draw_noise_dots<C, R>(canvas: &mut C, rng: &mut R)
where
    C: Canvas<Pixel = Rgba<u8>>,
    R: Rng + ?Sized,
{
    for _ in 0..30 {
        let x = rng.random_range(0..WIDTH) as i32;
        let y = rng.random_range(0..HEIGHT) as i32;
        draw_filled_rect_mut(canvas, Rect::at(x, y).of_size(2, 2), DOT);
    }
}
