/// 4x4 matrix, column-major: `m[col][row]`. This is the layout a GL-style
/// consumer uploads without transposing.
pub type Mat4 = [[f64; 4]; 4];

pub const IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// result = a * b (b applied first)
#[allow(clippy::needless_range_loop)]
pub fn mul(a: Mat4, b: Mat4) -> Mat4 {
    let mut result = [[0.0f64; 4]; 4];
    for i in 0..4 {
        for j in 0..4 {
            for k in 0..4 {
                result[i][j] += a[k][j] * b[i][k];
            }
        }
    }
    result
}

/// M * v
pub fn transform(m: Mat4, v: [f64; 4]) -> [f64; 4] {
    [
        m[0][0] * v[0] + m[1][0] * v[1] + m[2][0] * v[2] + m[3][0] * v[3],
        m[0][1] * v[0] + m[1][1] * v[1] + m[2][1] * v[2] + m[3][1] * v[3],
        m[0][2] * v[0] + m[1][2] * v[1] + m[2][2] * v[2] + m[3][2] * v[3],
        m[0][3] * v[0] + m[1][3] * v[1] + m[2][3] * v[2] + m[3][3] * v[3],
    ]
}

pub fn transpose(m: Mat4) -> Mat4 {
    [
        [m[0][0], m[1][0], m[2][0], m[3][0]],
        [m[0][1], m[1][1], m[2][1], m[3][1]],
        [m[0][2], m[1][2], m[2][2], m[3][2]],
        [m[0][3], m[1][3], m[2][3], m[3][3]],
    ]
}

/// Row-major view of a column-major matrix, for printing and comparisons.
pub fn rows(m: Mat4) -> Mat4 {
    transpose(m)
}

/// Rounds every element to `decimals` places. Only useful when comparing
/// against logs produced by the legacy rig, which rounded to 4 places.
pub fn rounded(m: Mat4, decimals: i32) -> Mat4 {
    let scale = 10f64.powi(decimals);
    let mut out = m;
    for col in out.iter_mut() {
        for v in col.iter_mut() {
            *v = (*v * scale).round() / scale;
        }
    }
    out
}
