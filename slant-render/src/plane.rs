use slant_core::mat4::{self, Mat4};
use tiny_skia::{
    FillRule, FilterQuality, Paint, PathBuilder, Pattern, Pixmap, SpreadMode, Transform,
};

/// Cells per side when approximating the perspective-mapped plane with
/// affine triangles.
pub const PLANE_SUBDIVISIONS: usize = 16;

/// Pixel rectangle one eye renders into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    /// Eye `index` of `count` side-by-side views of a `width`x`height` frame.
    pub fn split(width: u32, height: u32, index: usize, count: usize) -> Self {
        let count = count.max(1) as f32;
        let w = width as f32 / count;
        Self {
            x: w * index as f32,
            y: 0.0,
            width: w,
            height: height as f32,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Normalised device coordinates to pixels, +y up.
    pub fn ndc_to_pixel(&self, ndc_x: f64, ndc_y: f64) -> (f32, f32) {
        (
            self.x + ((ndc_x + 1.0) * 0.5) as f32 * self.width,
            self.y + ((1.0 - ndc_y) * 0.5) as f32 * self.height,
        )
    }
}

/// Project a point of the unit plane (`x`, `y` in [-1, 1]) to pixels.
/// `None` when the point falls behind the eye.
pub fn project_point(
    model_view: &Mat4,
    projection: &Mat4,
    viewport: &Viewport,
    x: f64,
    y: f64,
) -> Option<(f32, f32)> {
    let world = mat4::transform(*model_view, [x, y, 0.0, 1.0]);
    let clip = mat4::transform(*projection, world);
    if clip[3] <= f64::EPSILON {
        return None;
    }
    Some(viewport.ndc_to_pixel(clip[0] / clip[3], clip[1] / clip[3]))
}

/// Affine map taking three texture points onto three screen points.
pub fn triangle_transform(tex: [(f32, f32); 3], dst: [(f32, f32); 3]) -> Option<Transform> {
    let (u0, v0) = tex[0];
    let (du1, dv1) = (tex[1].0 - u0, tex[1].1 - v0);
    let (du2, dv2) = (tex[2].0 - u0, tex[2].1 - v0);
    let det = du1 * dv2 - du2 * dv1;
    if det.abs() <= f32::EPSILON {
        return None;
    }

    let (x0, y0) = dst[0];
    let (dx1, dy1) = (dst[1].0 - x0, dst[1].1 - y0);
    let (dx2, dy2) = (dst[2].0 - x0, dst[2].1 - y0);

    let sx = (dx1 * dv2 - dx2 * dv1) / det;
    let kx = (dx2 * du1 - dx1 * du2) / det;
    let ky = (dy1 * dv2 - dy2 * dv1) / det;
    let sy = (dy2 * du1 - dy1 * du2) / det;
    let tx = x0 - sx * u0 - kx * v0;
    let ty = y0 - ky * u0 - sy * v0;
    Some(Transform::from_row(sx, ky, kx, sy, tx, ty))
}

/// Draw `texture` across the projected plane. Returns the number of
/// triangles filled.
pub fn draw_textured_plane(
    canvas: &mut Pixmap,
    texture: &Pixmap,
    model_view: &Mat4,
    projection: &Mat4,
    viewport: &Viewport,
) -> usize {
    let n = PLANE_SUBDIVISIONS;
    let (tw, th) = (texture.width() as f32, texture.height() as f32);

    let mut grid: Vec<Option<(f32, f32)>> = Vec::with_capacity((n + 1) * (n + 1));
    for row in 0..=n {
        let y = 1.0 - 2.0 * row as f64 / n as f64;
        for col in 0..=n {
            let x = -1.0 + 2.0 * col as f64 / n as f64;
            grid.push(project_point(model_view, projection, viewport, x, y));
        }
    }
    let tex_at = |col: usize, row: usize| (tw * col as f32 / n as f32, th * row as f32 / n as f32);
    let at = |col: usize, row: usize| grid[row * (n + 1) + col];

    let mut filled = 0;
    for row in 0..n {
        for col in 0..n {
            let cells = [
                [(col, row), (col + 1, row), (col + 1, row + 1)],
                [(col, row), (col + 1, row + 1), (col, row + 1)],
            ];
            for tri in cells {
                let corners = tri.map(|(col, row)| at(col, row));
                let [Some(a), Some(b), Some(c)] = corners else {
                    continue;
                };
                let tex = tri.map(|(col, row)| tex_at(col, row));
                if fill_triangle(canvas, texture, tex, [a, b, c]) {
                    filled += 1;
                }
            }
        }
    }
    filled
}

fn fill_triangle(
    canvas: &mut Pixmap,
    texture: &Pixmap,
    tex: [(f32, f32); 3],
    dst: [(f32, f32); 3],
) -> bool {
    let Some(transform) = triangle_transform(tex, dst) else {
        return false;
    };
    let mut pb = PathBuilder::new();
    pb.move_to(dst[0].0, dst[0].1);
    pb.line_to(dst[1].0, dst[1].1);
    pb.line_to(dst[2].0, dst[2].1);
    pb.close();
    let Some(path) = pb.finish() else {
        return false;
    };

    let paint = Paint {
        shader: Pattern::new(
            texture.as_ref(),
            SpreadMode::Pad,
            FilterQuality::Bilinear,
            1.0,
            transform,
        ),
        anti_alias: false,
        ..Paint::default()
    };
    canvas.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    true
}
