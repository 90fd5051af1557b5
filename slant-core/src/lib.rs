pub mod assets;
pub mod error;
pub mod mat4;
pub mod modelview;
pub mod phase;
pub mod projection;
pub mod render;
pub mod trial;

pub use assets::{StimulusAssets, TrialTextures};
pub use error::{ConfigurationError, RenderError};
pub use mat4::Mat4;
pub use modelview::ModelView;
pub use phase::{BlockKind, MessageKind, PresentationState, Screen};
pub use projection::{DepthBranch, DisplayConfig, EyePosition, Frustum, compute_projection};
pub use render::Renderer;
pub use trial::{Trial, TrialResult};
