//! Offline rasterizer for the filter chain.
//!
//! The live preview hands `FilterChain::to_css()` to a compositor; the bake
//! path below evaluates the same chain on a decoded pixel surface so exports
//! and AI round-trips see exactly what the preview shows. Colour operations
//! follow the Filter Effects shorthand definitions on non-premultiplied sRGB
//! values, each clamped to [0, 1] before the next one runs. Blur works on
//! premultiplied colour and treats everything outside the image as
//! transparent, the way a compositor does.

use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba, RgbaImage};
use photoedit_contracts::filters::{Channel, FilterChain, FilterOp, FilterVector};
use photoedit_contracts::{EditorError, EditorResult};
use rayon::prelude::*;

use crate::raster::{map_image_error, reader_for, BaseImage, RasterBuffer, SurfaceLimits};

/// Blur radii below this many pixels are not visible in the preview and are
/// skipped.
pub const MIN_BLUR_SIGMA: f32 = 0.5;

pub type Rgba16Image = ImageBuffer<Rgba<u16>, Vec<u16>>;

type Matrix3 = [[f32; 3]; 3];

#[derive(Debug, Clone, Copy, PartialEq)]
enum PixelOp {
    Linear { slope: f32, intercept: f32 },
    Matrix(Matrix3),
}

impl PixelOp {
    fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        match self {
            Self::Linear { slope, intercept } => {
                rgb.map(|value| (value * slope + intercept).clamp(0.0, 1.0))
            }
            Self::Matrix(m) => {
                let [r, g, b] = rgb;
                [
                    (m[0][0] * r + m[0][1] * g + m[0][2] * b).clamp(0.0, 1.0),
                    (m[1][0] * r + m[1][1] * g + m[1][2] * b).clamp(0.0, 1.0),
                    (m[2][0] * r + m[2][1] * g + m[2][2] * b).clamp(0.0, 1.0),
                ]
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Pixel(PixelOp),
    Blur { sigma: f32 },
}

fn stage_for(op: &FilterOp) -> Stage {
    let amount = op.amount();
    match op.channel {
        Channel::Brightness => Stage::Pixel(PixelOp::Linear {
            slope: amount as f32,
            intercept: 0.0,
        }),
        Channel::Contrast => Stage::Pixel(PixelOp::Linear {
            slope: amount as f32,
            intercept: (0.5 - 0.5 * amount) as f32,
        }),
        Channel::Saturation => Stage::Pixel(PixelOp::Matrix(saturate_matrix(amount))),
        Channel::Grayscale => Stage::Pixel(PixelOp::Matrix(grayscale_matrix(amount))),
        Channel::Sepia => Stage::Pixel(PixelOp::Matrix(sepia_matrix(amount))),
        Channel::Blur => Stage::Blur {
            sigma: amount as f32,
        },
        Channel::HueRotate => Stage::Pixel(PixelOp::Matrix(hue_rotate_matrix(amount))),
    }
}

fn to_f32(m: [[f64; 3]; 3]) -> Matrix3 {
    m.map(|row| row.map(|value| value as f32))
}

fn saturate_matrix(s: f64) -> Matrix3 {
    to_f32([
        [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
    ])
}

fn grayscale_matrix(amount: f64) -> Matrix3 {
    let g = 1.0 - amount.clamp(0.0, 1.0);
    to_f32([
        [0.2126 + 0.7874 * g, 0.7152 - 0.7152 * g, 0.0722 - 0.0722 * g],
        [0.2126 - 0.2126 * g, 0.7152 + 0.2848 * g, 0.0722 - 0.0722 * g],
        [0.2126 - 0.2126 * g, 0.7152 - 0.7152 * g, 0.0722 + 0.9278 * g],
    ])
}

fn sepia_matrix(amount: f64) -> Matrix3 {
    let g = 1.0 - amount.clamp(0.0, 1.0);
    to_f32([
        [0.393 + 0.607 * g, 0.769 - 0.769 * g, 0.189 - 0.189 * g],
        [0.349 - 0.349 * g, 0.686 + 0.314 * g, 0.168 - 0.168 * g],
        [0.272 - 0.272 * g, 0.534 - 0.534 * g, 0.131 + 0.869 * g],
    ])
}

fn hue_rotate_matrix(degrees: f64) -> Matrix3 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    to_f32([
        [
            0.213 + cos * 0.787 - sin * 0.213,
            0.715 - cos * 0.715 - sin * 0.715,
            0.072 - cos * 0.072 + sin * 0.928,
        ],
        [
            0.213 - cos * 0.213 + sin * 0.143,
            0.715 + cos * 0.285 + sin * 0.140,
            0.072 - cos * 0.072 - sin * 0.283,
        ],
        [
            0.213 - cos * 0.213 - sin * 0.787,
            0.715 - cos * 0.715 + sin * 0.715,
            0.072 + cos * 0.928 + sin * 0.072,
        ],
    ])
}

/// Bits per channel a surface is quantized back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleDepth {
    Eight,
    Sixteen,
}

impl SampleDepth {
    fn of(image: &DynamicImage) -> Self {
        let color = image.color();
        if color.bytes_per_pixel() > color.channel_count() {
            Self::Sixteen
        } else {
            Self::Eight
        }
    }
}

/// Straight-alpha RGBA samples in [0, 1], remembering the depth they were
/// decoded at so a bake never narrows the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    width: u32,
    height: u32,
    depth: SampleDepth,
    pixels: Vec<[f32; 4]>,
}

impl Surface {
    pub fn from_rgba8(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            depth: SampleDepth::Eight,
            pixels: image
                .pixels()
                .map(|px| px.0.map(|value| f32::from(value) / 255.0))
                .collect(),
        }
    }

    pub fn from_rgba16(image: &Rgba16Image) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            depth: SampleDepth::Sixteen,
            pixels: image
                .pixels()
                .map(|px| px.0.map(|value| f32::from(value) / 65535.0))
                .collect(),
        }
    }

    /// Sources wider than 8 bits per channel are kept at 16 bits.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        match SampleDepth::of(&image) {
            SampleDepth::Eight => Self::from_rgba8(&image.into_rgba8()),
            SampleDepth::Sixteen => Self::from_rgba16(&image.into_rgba16()),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn depth(&self) -> SampleDepth {
        self.depth
    }

    pub fn to_rgba8(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let px = self.pixels[(y * self.width + x) as usize];
            Rgba(px.map(|value| (value.clamp(0.0, 1.0) * 255.0).round() as u8))
        })
    }

    pub fn to_rgba16(&self) -> Rgba16Image {
        Rgba16Image::from_fn(self.width, self.height, |x, y| {
            let px = self.pixels[(y * self.width + x) as usize];
            Rgba(px.map(|value| (value.clamp(0.0, 1.0) * 65535.0).round() as u16))
        })
    }

    /// Encodes losslessly at the surface's own depth.
    pub fn encode_png(&self) -> EditorResult<RasterBuffer> {
        match self.depth {
            SampleDepth::Eight => encode_png(&self.to_rgba8()),
            SampleDepth::Sixteen => {
                let mut out = Cursor::new(Vec::new());
                self.to_rgba16()
                    .write_to(&mut out, ImageFormat::Png)
                    .map_err(|err| EditorError::surface(format!("PNG encode failed: {err}")))?;
                Ok(RasterBuffer::png(out.into_inner()))
            }
        }
    }

    /// Runs `chain` in order. Identity operations are skipped, so an identity
    /// chain leaves the samples untouched; consecutive per-pixel operations
    /// share one pass.
    pub fn apply_chain(&mut self, chain: &FilterChain) {
        let mut pending: Vec<PixelOp> = Vec::new();
        for op in chain.iter().filter(|op| !op.is_identity()) {
            match stage_for(op) {
                Stage::Pixel(pixel_op) => pending.push(pixel_op),
                Stage::Blur { sigma } if sigma < MIN_BLUR_SIGMA => {}
                Stage::Blur { sigma } => {
                    self.apply_pixel_ops(&pending);
                    pending.clear();
                    self.blur(sigma);
                }
            }
        }
        self.apply_pixel_ops(&pending);
    }

    fn apply_pixel_ops(&mut self, ops: &[PixelOp]) {
        if ops.is_empty() {
            return;
        }
        self.pixels.par_iter_mut().for_each(|px| {
            let mut rgb = [px[0], px[1], px[2]];
            for op in ops {
                rgb = op.apply(rgb);
            }
            px[..3].copy_from_slice(&rgb);
        });
    }

    /// Separable gaussian on premultiplied colour. Taps outside the image
    /// contribute transparent black, so edges fade out.
    fn blur(&mut self, sigma: f32) {
        let (width, height) = (self.width as usize, self.height as usize);
        if width == 0 || height == 0 {
            return;
        }
        let kernel = gaussian_kernel(sigma);
        let radius = (kernel.len() / 2) as isize;

        let premultiplied: Vec<[f32; 4]> = self
            .pixels
            .par_iter()
            .map(|&[r, g, b, a]| [r * a, g * a, b * a, a])
            .collect();

        let mut horizontal = vec![[0.0f32; 4]; premultiplied.len()];
        horizontal
            .par_chunks_mut(width)
            .zip(premultiplied.par_chunks(width))
            .for_each(|(out_row, in_row)| {
                for (x, slot) in out_row.iter_mut().enumerate() {
                    *slot = convolve(&kernel, radius, x, width, |i| in_row[i]);
                }
            });

        let mut vertical = vec![[0.0f32; 4]; premultiplied.len()];
        vertical
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, out_row)| {
                for (x, slot) in out_row.iter_mut().enumerate() {
                    *slot = convolve(&kernel, radius, y, height, |i| horizontal[i * width + x]);
                }
            });

        self.pixels = vertical
            .into_par_iter()
            .map(|[r, g, b, a]| {
                if a <= 0.0 {
                    return [0.0; 4];
                }
                [
                    (r / a).clamp(0.0, 1.0),
                    (g / a).clamp(0.0, 1.0),
                    (b / a).clamp(0.0, 1.0),
                    a.clamp(0.0, 1.0),
                ]
            })
            .collect();
    }
}

fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (sigma * 3.0).ceil().max(1.0) as isize;
    let denom = 2.0 * sigma * sigma;
    let weights: Vec<f32> = (-radius..=radius)
        .map(|offset| (-((offset * offset) as f32) / denom).exp())
        .collect();
    let total: f32 = weights.iter().sum();
    weights.into_iter().map(|weight| weight / total).collect()
}

fn convolve(
    kernel: &[f32],
    radius: isize,
    center: usize,
    len: usize,
    sample: impl Fn(usize) -> [f32; 4],
) -> [f32; 4] {
    let mut acc = [0.0f32; 4];
    for (tap, weight) in kernel.iter().enumerate() {
        let index = center as isize + tap as isize - radius;
        if index < 0 || index >= len as isize {
            continue;
        }
        for (slot, value) in acc.iter_mut().zip(sample(index as usize)) {
            *slot += value * weight;
        }
    }
    acc
}

/// Runs `chain` over an 8-bit surface. See [`Surface::apply_chain`].
pub fn apply_chain(surface: RgbaImage, chain: &FilterChain) -> RgbaImage {
    let mut working = Surface::from_rgba8(&surface);
    working.apply_chain(chain);
    working.to_rgba8()
}

/// Decodes the base image at its natural dimensions and sample depth.
pub fn decode_surface(base: &BaseImage, limits: SurfaceLimits) -> EditorResult<Surface> {
    limits.check(base.width(), base.height())?;
    let decoded = reader_for(base.raster().bytes(), base.format())
        .decode()
        .map_err(map_image_error)?;
    Ok(Surface::from_dynamic(decoded))
}

pub fn encode_png(surface: &RgbaImage) -> EditorResult<RasterBuffer> {
    let mut out = Cursor::new(Vec::new());
    surface
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|err| EditorError::surface(format!("PNG encode failed: {err}")))?;
    Ok(RasterBuffer::png(out.into_inner()))
}

/// Bakes `vector` into the pixels of `base` and re-encodes losslessly.
pub fn bake(
    base: &BaseImage,
    vector: &FilterVector,
    limits: SurfaceLimits,
) -> EditorResult<RasterBuffer> {
    let mut surface = decode_surface(base, limits)?;
    surface.apply_chain(&vector.chain());
    surface.encode_png()
}

/// A bake captured by value: the base image and vector at submission time.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub image: BaseImage,
    pub filters: FilterVector,
    pub limits: SurfaceLimits,
}

impl RenderJob {
    pub fn run(&self) -> EditorResult<RasterBuffer> {
        bake(&self.image, &self.filters, self.limits)
    }
}
