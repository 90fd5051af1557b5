use serde::{Deserialize, Serialize};

use crate::mat4::Mat4;

/// Fraction of the eye distance used as the near plane when the configured
/// near plane lies behind the eye.
pub const ADJUSTED_NEAR_FRACTION: f64 = 0.8;

/// Clipping volume measured at the screen plane. The screen sits at depth 0
/// with positive depth pointing toward the viewer, so `far` is the
/// more-negative bound and `near` a small positive one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frustum {
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
    pub far: f64,
    pub near: f64,
}

impl Frustum {
    /// Frustum spanning a physical screen of the given size, centred on it.
    pub fn from_screen(width: f64, height: f64, far: f64, near: f64) -> Self {
        Self {
            left: -0.5 * width,
            right: 0.5 * width,
            bottom: -0.5 * height,
            top: 0.5 * height,
            far,
            near,
        }
    }
}

/// Eye offset from the screen centre, in the same units as the frustum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyePosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl EyePosition {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Left and right eye, half a pupil distance either side of centre.
    pub fn pair_from_pupil(pupil_size: f64, view_distance: f64) -> [EyePosition; 2] {
        [
            EyePosition::new(pupil_size * -0.5, 0.0, view_distance),
            EyePosition::new(pupil_size * 0.5, 0.0, view_distance),
        ]
    }
}

/// Which depth mapping `compute_projection` used. The sign convention of the
/// resulting depth terms is not pinned down; it only affects projected depth,
/// never projected x and y.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthBranch {
    /// Eye in front of the near plane.
    Normal,
    /// Near plane behind the eye, replaced by `ADJUSTED_NEAR_FRACTION * eye.z`.
    AdjustedNear,
}

pub fn depth_branch(frustum: &Frustum, eye: &EyePosition) -> DepthBranch {
    if eye.z > frustum.near {
        DepthBranch::Normal
    } else {
        DepthBranch::AdjustedNear
    }
}

/// Off-axis perspective projection for an eye at `eye` looking at a screen
/// fixed at depth 0.
///
/// The returned matrix is column-major: its columns are the rows
/// `[m00,0,0,0]`, `[0,m11,0,0]`, `[A,B,C,-1]`, `[E,F,G,eye.z]`. Every term is
/// computed in `f64` with no rounding, so identical inputs always give
/// bit-identical output.
pub fn compute_projection(frustum: &Frustum, eye: &EyePosition) -> Mat4 {
    let width = frustum.right - frustum.left;
    let height = frustum.top - frustum.bottom;

    let m00 = 2.0 * eye.z / width;
    let m11 = 2.0 * eye.z / height;

    // shear for an eye that is not centred on the clipping box
    let a = (frustum.right + frustum.left - 2.0 * eye.x) / width;
    let b = (frustum.top + frustum.bottom - 2.0 * eye.y) / height;

    let near = match depth_branch(frustum, eye) {
        DepthBranch::Normal => frustum.near,
        DepthBranch::AdjustedNear => ADJUSTED_NEAR_FRACTION * eye.z,
    };
    let far = frustum.far;
    let c = -(2.0 * eye.z - far - near) / (near - far);
    let d = -2.0 * (eye.z - far) * (eye.z - near) / (near - far);

    let e = -m00 * eye.x - eye.z * a;
    let f = -m11 * eye.y - eye.z * b;
    let g = d - c * eye.z;

    [
        [m00, 0.0, 0.0, 0.0],
        [0.0, m11, 0.0, 0.0],
        [a, b, c, -1.0],
        [e, f, g, eye.z],
    ]
}

/// Physical geometry of the stimulus display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Visible screen width (cm)
    pub screen_width: f64,
    /// Visible screen height (cm)
    pub screen_height: f64,
    /// Eye to screen distance (cm)
    pub view_distance: f64,
    pub far: f64,
    pub near: f64,
    /// Depth of the stimulus plane relative to the screen
    pub stimulus_depth: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub fullscreen: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            screen_width: 59.5,
            screen_height: 33.8,
            view_distance: 100.0,
            far: -200.0,
            near: 40.0,
            stimulus_depth: -3.0,
            scale_x: 30.0,
            scale_y: 30.0,
            fullscreen: true,
        }
    }
}

impl DisplayConfig {
    pub fn frustum(&self) -> Frustum {
        Frustum::from_screen(self.screen_width, self.screen_height, self.far, self.near)
    }

    /// Eye positions for a session: both eyes in stereo, the left eye alone
    /// otherwise.
    pub fn eyes(&self, pupil_size: f64, stereo: bool) -> Vec<EyePosition> {
        let [left, right] = EyePosition::pair_from_pupil(pupil_size, self.view_distance);
        if stereo { vec![left, right] } else { vec![left] }
    }
}
