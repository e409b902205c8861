// Import our Triangle type from the genes module
use crate::genes::Triangle;

// Image types from the image crate
// RgbaImage = 2D image with RGBA pixels, GrayImage = single-channel coverage mask
use image::{GrayImage, Luma, Rgba, RgbaImage};

// Polygon scan conversion from imageproc
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;

/// Opaque white, the background every rendering starts from
const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Check if three points form a degenerate triangle
///
/// A degenerate triangle has duplicate points or collinear points (zero area).
/// These cannot be drawn by imageproc's draw_polygon_mut function.
///
/// Returns true if the triangle is degenerate and should not be drawn.
fn is_degenerate(points: &[Point<i32>; 3]) -> bool {
    let (p0, p1, p2) = (points[0], points[1], points[2]);

    if p0 == p1 || p1 == p2 || p0 == p2 {
        return true;
    }

    // Twice the signed area; zero means collinear
    let area = i64::from(p1.x - p0.x) * i64::from(p2.y - p0.y)
        - i64::from(p2.x - p0.x) * i64::from(p1.y - p0.y);
    area == 0
}

/// A reusable drawing surface: the RGBA output plus a scratch coverage mask
///
/// Keeping both buffers alive between renders means rendering a particle
/// allocates nothing.
#[derive(Clone, Debug)]
pub struct Canvas {
    image: RgbaImage,
    mask: GrayImage,
}

impl Canvas {
    /// Create a white canvas of the given size
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, BACKGROUND),
            mask: GrayImage::new(width, height),
        }
    }

    /// Fill the output with opaque white
    pub fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = BACKGROUND;
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// The rendered pixels
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Mutable access for custom rasterizers
    pub fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    /// Consume the canvas and keep only the rendered pixels
    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

/// Turns an ordered triangle list into pixels
///
/// Implementations must composite in list order over an opaque white
/// background. Fitness and preview must come from the same implementation,
/// so the swarm owns one rasterizer and uses it for both.
///
/// `Send + Sync` because particles are rendered in parallel.
pub trait Rasterizer: Send + Sync {
    /// Render `triangles` into `canvas`, overwriting whatever it held
    fn render_into(&self, triangles: &[Triangle], canvas: &mut Canvas);

    /// Render into a freshly allocated image
    fn render(&self, triangles: &[Triangle], width: u32, height: u32) -> RgbaImage {
        let mut canvas = Canvas::new(width, height);
        self.render_into(triangles, &mut canvas);
        canvas.into_image()
    }
}

/// Default rasterizer: aliased scanline fill with Porter-Duff "over" blending
///
/// Vertices are rounded to the nearest pixel. Each triangle is first scan
/// converted into the canvas mask by imageproc, then blended pixel by pixel
/// inside its clipped bounding box.
#[derive(Clone, Copy, Debug, Default)]
pub struct TriangleRasterizer;

impl Rasterizer for TriangleRasterizer {
    fn render_into(&self, triangles: &[Triangle], canvas: &mut Canvas) {
        canvas.clear();

        // Order matters - later triangles draw over earlier ones
        for triangle in triangles {
            draw_triangle_with_alpha(canvas, triangle);
        }
    }
}

/// Draw a triangle with proper alpha blending
///
/// # Alpha Compositing Formula (Porter-Duff "over" operation)
/// For each pixel the triangle covers:
/// - result_color = (src_alpha * src_color) + ((1 - src_alpha) * dst_color)
/// - result_alpha stays 255 since we always composite onto opaque white
fn draw_triangle_with_alpha(canvas: &mut Canvas, triangle: &Triangle) {
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let src_alpha = triangle.alpha.clamp(0.0, 1.0) as f32;
    if src_alpha == 0.0 {
        return;
    }

    let points = triangle
        .points
        .map(|(x, y)| Point::new(x.round() as i32, y.round() as i32));

    // Skip degenerate triangles to prevent panic in draw_polygon_mut
    if is_degenerate(&points) {
        return;
    }

    // Clip the bounding box to the canvas; nothing to do if fully off-screen
    let min_x = points.iter().map(|p| p.x).min().unwrap_or(0).max(0);
    let min_y = points.iter().map(|p| p.y).min().unwrap_or(0).max(0);
    let max_x = points.iter().map(|p| p.x).max().unwrap_or(-1).min(width as i32 - 1);
    let max_y = points.iter().map(|p| p.y).max().unwrap_or(-1).min(height as i32 - 1);
    if min_x > max_x || min_y > max_y {
        return;
    }

    // Mark coverage in the scratch mask
    draw_polygon_mut(&mut canvas.mask, &points, Luma([255u8]));

    let color = triangle.color.map(|c| c.clamp(0.0, 255.0) as f32);
    let inv_alpha = 1.0 - src_alpha;

    // Blend covered pixels and wipe the mask behind us for the next triangle
    for y in min_y as u32..=max_y as u32 {
        for x in min_x as u32..=max_x as u32 {
            let coverage = canvas.mask.get_pixel_mut(x, y);
            if coverage.0[0] == 0 {
                continue;
            }
            coverage.0[0] = 0;

            let dst = canvas.image.get_pixel_mut(x, y);
            for (channel, &src) in dst.0.iter_mut().zip(color.iter()) {
                *channel = (src * src_alpha + f32::from(*channel) * inv_alpha).round() as u8;
            }
        }
    }
}
