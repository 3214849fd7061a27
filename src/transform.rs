use image::{ImageBuffer, Pixel};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use log::debug;
use nalgebra::{Matrix3, SMatrix, SVector};

use crate::crop::{resolve_output_size, CropSpec};
use crate::error::{CropError, Result};
use crate::geometry::{order_corners, Point, Quad};

/// An 8-bit image buffer of any pixel layout (`Luma`, `Rgb`, `Rgba`, ...).
pub type Image<P> = ImageBuffer<P, Vec<u8>>;

/// Largest crop, in pixels, that a single warp may allocate.
pub const MAX_OUTPUT_PIXELS: u64 = 64 * 1024 * 1024;

/// Projective matrix mapping the canonical `quad` onto the unit square
/// `(0,0) (1,0) (1,1) (0,1)`.
///
/// Solves the eight-unknown linear system with `h33 = 1`.
fn unit_square_matrix(quad: &Quad) -> Result<Matrix3<f64>> {
    let dest = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];

    let mut a_matrix = SMatrix::<f64, 8, 8>::zeros();
    let mut b_vector = SVector::<f64, 8>::zeros();

    for (i, (src, (x_prime, y_prime))) in quad.0.iter().zip(dest).enumerate() {
        let (x, y) = (src.x, src.y);

        a_matrix[(2 * i, 0)] = x;
        a_matrix[(2 * i, 1)] = y;
        a_matrix[(2 * i, 2)] = 1.0;
        a_matrix[(2 * i, 6)] = -x * x_prime;
        a_matrix[(2 * i, 7)] = -y * x_prime;
        b_vector[2 * i] = x_prime;

        a_matrix[(2 * i + 1, 3)] = x;
        a_matrix[(2 * i + 1, 4)] = y;
        a_matrix[(2 * i + 1, 5)] = 1.0;
        a_matrix[(2 * i + 1, 6)] = -x * y_prime;
        a_matrix[(2 * i + 1, 7)] = -y * y_prime;
        b_vector[2 * i + 1] = y_prime;
    }

    let h = a_matrix
        .lu()
        .solve(&b_vector)
        .filter(|h| h.iter().all(|v| v.is_finite()))
        .ok_or_else(|| CropError::Geometry(format!("no perspective transform for {:?}", quad.0)))?;

    Ok(Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0))
}

/// Unit interval to output pixel index along one axis of `len` pixels.
///
/// Spans `0..=len-1`; a single pixel samples the middle of the quad.
fn axis_scale(len: u32) -> (f64, f64) {
    if len > 1 {
        ((len - 1) as f64, 0.0)
    } else {
        (1.0, -0.5)
    }
}

/// Projective matrix mapping the canonical `quad` onto the output pixel grid.
///
/// For outputs at least two pixels on a side the corners land on
/// `(0,0) (w-1,0) (w-1,h-1) (0,h-1)`. A one-pixel axis samples the
/// quad's midline instead of collapsing two corners onto each other.
pub fn perspective_matrix(quad: &Quad, width: u32, height: u32) -> Result<Matrix3<f64>> {
    let to_unit = unit_square_matrix(quad)?;
    let (sx, tx) = axis_scale(width);
    let (sy, ty) = axis_scale(height);
    let to_pixels = Matrix3::new(sx, 0.0, tx, 0.0, sy, ty, 0.0, 0.0, 1.0);
    Ok(to_pixels * to_unit)
}

/// Resample `img` into a `width` x `height` buffer through `matrix`, which
/// maps source coordinates to output coordinates.
///
/// Output pixels whose preimage falls off the source are black.
pub fn warp_perspective<P>(
    img: &Image<P>,
    matrix: &Matrix3<f64>,
    width: u32,
    height: u32,
) -> Result<Image<P>>
where
    P: Pixel<Subpixel = u8> + Send + Sync,
{
    if width as u64 * height as u64 > MAX_OUTPUT_PIXELS {
        return Err(CropError::OutputTooLarge { width, height });
    }

    let mut coeffs = [0.0f32; 9];
    for (dst, src) in coeffs.iter_mut().zip(matrix.transpose().iter()) {
        *dst = *src as f32;
    }
    let projection = Projection::from_matrix(coeffs)
        .ok_or_else(|| CropError::Geometry("perspective matrix is singular".to_string()))?;

    let black = [0u8; 4];
    let default = *P::from_slice(&black[..P::CHANNEL_COUNT as usize]);
    let mut output: Image<P> = ImageBuffer::new(width, height);
    warp_into(img, &projection, Interpolation::Bilinear, default, &mut output);

    Ok(output)
}

/// Crop and unwarp the region bounded by four pixel-space points.
///
/// The points may come in any order. The output size follows `spec`; a
/// degenerate quadrilateral is rejected with [`CropError::Geometry`] and an
/// oversized result with [`CropError::OutputTooLarge`], so a batch caller can
/// skip the item.
pub fn four_point_transform<P>(
    img: &Image<P>,
    points: &[Point; 4],
    spec: &CropSpec,
) -> Result<Image<P>>
where
    P: Pixel<Subpixel = u8> + Send + Sync,
{
    spec.validate()?;

    let quad = order_corners(points);
    if quad.is_degenerate() {
        return Err(CropError::Geometry(format!(
            "corners {:?} are collinear or coincident",
            quad.0
        )));
    }

    let (width, height) = resolve_output_size(&quad, spec);
    debug!(
        "Warping quad {:?} to {}x{} (extent {:?})",
        quad.0,
        width,
        height,
        quad.edge_extent()
    );

    let matrix = perspective_matrix(&quad, width, height)?;
    warp_perspective(img, &matrix, width, height)
}
