use crate::mat4::Mat4;

/// Rotation (degrees), per-axis scale and translation of the stimulus plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelView {
    pub rotation: [f64; 3],
    pub scale: [f64; 3],
    pub translation: [f64; 3],
}

impl Default for ModelView {
    fn default() -> Self {
        Self {
            rotation: [0.0; 3],
            scale: [1.0; 3],
            translation: [0.0; 3],
        }
    }
}

impl ModelView {
    /// Column-major model-view matrix. Angles are applied negated, so a
    /// positive slant tips the top of the plane away from the viewer.
    pub fn matrix(&self) -> Mat4 {
        let [left, up, forward] = self.axes();
        let [sx, sy, sz] = self.scale;
        let [tx, ty, tz] = self.translation;
        [
            [left[0] * sx, left[1] * sx, left[2] * sx, 0.0],
            [up[0] * sy, up[1] * sy, up[2] * sy, 0.0],
            [forward[0] * sz, forward[1] * sz, forward[2] * sz, 0.0],
            [tx, ty, tz, 1.0],
        ]
    }

    fn axes(&self) -> [[f64; 3]; 3] {
        let (sin_x, cos_x) = (-self.rotation[0]).to_radians().sin_cos();
        let (sin_y, cos_y) = (-self.rotation[1]).to_radians().sin_cos();
        let (sin_z, cos_z) = (-self.rotation[2]).to_radians().sin_cos();

        let left = [
            cos_y * cos_z,
            sin_x * sin_y * cos_z + cos_x * sin_z,
            -cos_x * sin_y * cos_z + sin_x * sin_z,
        ];
        let up = [
            -cos_y * sin_z,
            -sin_x * sin_y * sin_z + cos_x * cos_z,
            cos_x * sin_y * sin_z + sin_x * cos_z,
        ];
        let forward = [sin_y, -sin_x * cos_y, cos_x * cos_y];

        [left, up, forward]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mat4::{IDENTITY, transform};

    const EPSILON: f64 = 1e-9;

    #[test]
    fn default_is_identity() {
        assert_eq!(ModelView::default().matrix(), IDENTITY);
    }

    #[test]
    fn slant_tips_top_edge_away_from_viewer() {
        let mv = ModelView {
            rotation: [60.0, 0.0, 0.0],
            ..ModelView::default()
        };
        let top = transform(mv.matrix(), [0.0, 1.0, 0.0, 1.0]);
        assert!((top[1] - 0.5).abs() < EPSILON);
        assert!(top[2] < 0.0, "top edge should recede, got z = {}", top[2]);
    }

    #[test]
    fn scale_and_translation_apply_after_rotation() {
        let mv = ModelView {
            rotation: [0.0; 3],
            scale: [30.0, 30.0, 0.06],
            translation: [0.0, 0.0, -3.0],
        };
        let corner = transform(mv.matrix(), [1.0, -1.0, 1.0, 1.0]);
        assert!((corner[0] - 30.0).abs() < EPSILON);
        assert!((corner[1] + 30.0).abs() < EPSILON);
        assert!((corner[2] - (0.06 - 3.0)).abs() < EPSILON);
    }
}
