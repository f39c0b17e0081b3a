//! CPU-side image sources for textures and cube maps.
//!
//! Decoding goes through the `image` crate; everything here produces
//! `RgbaImage` buffers that the backend uploads as RGBA8 textures.

use std::path::Path;

use image::{imageops, Rgba, RgbaImage};

use crate::error::ImageSourceError;

/// Face offsets in a 4x3 horizontal-cross atlas, in face-size units,
/// ordered +X, -X, +Y, -Y, +Z, -Z.
pub const CROSS_FACE_OFFSETS: [(u32, u32); 6] = [(2, 1), (0, 1), (1, 0), (1, 2), (1, 1), (3, 1)];

/// Tangent-space "straight up" normal, for meshes without a normal map.
pub const FLAT_NORMAL: [u8; 4] = [128, 128, 255, 255];

/// Decodes an image file into RGBA8.
pub fn load_rgba(path: impl AsRef<Path>) -> Result<RgbaImage, ImageSourceError> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|source| ImageSourceError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image.to_rgba8())
}

/// Single-colour texture
pub fn solid(size: u32, color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(size, size, Rgba(color))
}

/// Checkerboard with `cells` squares per side
pub fn checker(size: u32, cells: u32, a: [u8; 4], b: [u8; 4]) -> RgbaImage {
    let cell = (size / cells.max(1)).max(1);
    RgbaImage::from_fn(size, size, |x, y| {
        if (x / cell + y / cell) % 2 == 0 {
            Rgba(a)
        } else {
            Rgba(b)
        }
    })
}

/// Cuts the six faces out of a horizontal-cross atlas.
///
/// The atlas must be four faces wide and three faces tall with square faces.
pub fn slice_cross_atlas(atlas: &RgbaImage) -> Result<[RgbaImage; 6], ImageSourceError> {
    let (width, height) = atlas.dimensions();
    let face = width / 4;
    if face == 0 || width % 4 != 0 || height % 3 != 0 || height / 3 != face {
        return Err(ImageSourceError::CrossLayout { width, height });
    }

    Ok(CROSS_FACE_OFFSETS
        .map(|(fx, fy)| imageops::crop_imm(atlas, fx * face, fy * face, face, face).to_image()))
}

/// Accepts six separate face images in +X, -X, +Y, -Y, +Z, -Z order.
pub fn cube_faces(faces: Vec<RgbaImage>) -> Result<[RgbaImage; 6], ImageSourceError> {
    let count = faces.len();
    faces
        .try_into()
        .map_err(|_| ImageSourceError::FaceCount(count))
}

/// Procedural sky: a vertical gradient from `horizon` to `zenith`, with the
/// lower hemisphere fading to `ground`.
pub fn gradient_sky(size: u32, zenith: [u8; 4], horizon: [u8; 4], ground: [u8; 4]) -> [RgbaImage; 6] {
    let size = size.max(1);
    let face = |index: usize| {
        RgbaImage::from_fn(size, size, |x, y| {
            let u = 2.0 * (x as f32 + 0.5) / size as f32 - 1.0;
            let v = 2.0 * (y as f32 + 0.5) / size as f32 - 1.0;
            let dir = cube_direction(index, u, v);
            let len = (dir[0] * dir[0] + dir[1] * dir[1] + dir[2] * dir[2]).sqrt();
            let elevation = dir[1] / len;
            if elevation >= 0.0 {
                Rgba(lerp_color(horizon, zenith, elevation))
            } else {
                Rgba(lerp_color(horizon, ground, (-elevation * 4.0).min(1.0)))
            }
        })
    };
    [face(0), face(1), face(2), face(3), face(4), face(5)]
}

/// Direction through texel `(u, v)` of cube face `index` (wgpu layer order).
fn cube_direction(index: usize, u: f32, v: f32) -> [f32; 3] {
    match index {
        0 => [1.0, -v, -u],
        1 => [-1.0, -v, u],
        2 => [u, 1.0, v],
        3 => [u, -1.0, -v],
        4 => [u, -v, 1.0],
        _ => [-u, -v, -1.0],
    }
}

fn lerp_color(a: [u8; 4], b: [u8; 4], t: f32) -> [u8; 4] {
    let t = t.clamp(0.0, 1.0);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = (a[i] as f32 + (b[i] as f32 - a[i] as f32) * t).round() as u8;
    }
    out
}
