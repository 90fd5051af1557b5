pub mod plane;
pub mod render;
pub mod text;

pub use plane::Viewport;
pub use render::SkiaRenderer;
