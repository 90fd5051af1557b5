use crate::assets::TrialTextures;
use crate::error::RenderError;
use crate::mat4::Mat4;
use crate::phase::Screen;

/// Display collaborator driven by the presentation controller.
pub trait Renderer {
    /// Bind a message or the fixation point for subsequent draws.
    fn bind_screen(&mut self, screen: Screen) -> Result<(), RenderError>;

    /// Bind one trial's colormap/heightmap/normalmap. Called exactly once per
    /// stimulus presentation.
    fn bind_stimulus(&mut self, textures: &TrialTextures, height_ratio: f64)
    -> Result<(), RenderError>;

    /// Draw the bound content once per eye, using that eye's projection.
    fn draw(
        &mut self,
        is_stimulus: bool,
        rotation_x: f64,
        projections: &[Mat4],
    ) -> Result<(), RenderError>;

    fn disable_state(&mut self);

    fn unbind_all(&mut self);
}
