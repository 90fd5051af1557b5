use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::FontVec;
use slant_core::{
    ConfigurationError, DisplayConfig, Mat4, MessageKind, ModelView, RenderError, Renderer,
    Screen, StimulusAssets, TrialTextures,
};
use slant_timing::{FrameStats, HighPrecisionTimer, Timer};
use tiny_skia::{Color, Paint, Pixmap, PixmapPaint, Rect, Transform};

use crate::plane::{Viewport, draw_textured_plane};
use crate::text::render_text_pixmap;

const BACKGROUND: Color = Color::BLACK;

#[derive(Debug, Clone, PartialEq)]
enum Bound {
    Nothing,
    Screen(Screen),
    Stimulus { colormap: PathBuf, height_ratio: f64 },
}

/// Software renderer drawing into an RGBA pixmap that the window copies to
/// its surface.
///
/// Only the colormap is drawn. Heightmaps and normalmaps are validated and
/// must be bound, but are never sampled, and `height_ratio` scales depth on
/// a flat plane. The relief itself needs a GPU renderer.
pub struct SkiaRenderer {
    width: u32,
    height: u32,
    font: FontVec,
    display: DisplayConfig,

    colormaps: HashMap<PathBuf, Pixmap>,
    relief_maps: HashSet<PathBuf>,
    messages: HashMap<MessageKind, Pixmap>,
    fixation: Pixmap,

    canvas: Pixmap,
    bound: Bound,
    enabled: bool,
    draw_timer: HighPrecisionTimer,
}

impl SkiaRenderer {
    /// Load every stimulus texture and the message font. Any missing or
    /// undecodable file fails here, before the window shows anything.
    pub fn new(
        width: u32,
        height: u32,
        assets: &StimulusAssets,
        font_path: &Path,
        display: &DisplayConfig,
    ) -> Result<Self, ConfigurationError> {
        let bytes = fs::read(font_path).map_err(|_| ConfigurationError::missing(font_path))?;
        let font = FontVec::try_from_vec(bytes).map_err(|e| {
            ConfigurationError::invalid(format!("font {}: {e}", font_path.display()))
        })?;

        let mut colormaps = HashMap::with_capacity(assets.len());
        for path in &assets.colormaps {
            colormaps.insert(path.clone(), load_texture(path)?);
        }
        let mut relief_maps = HashSet::new();
        for path in assets.heightmaps.iter().chain(&assets.normalmaps) {
            check_image(path)?;
            relief_maps.insert(path.clone());
        }
        log::info!("preloaded {} stimulus textures", colormaps.len());

        let canvas = blank_canvas(width, height).map_err(|e| ConfigurationError::invalid(e.to_string()))?;
        let mut renderer = Self {
            width,
            height,
            font,
            display: display.clone(),
            colormaps,
            relief_maps,
            messages: HashMap::new(),
            fixation: fixation_cross(height).map_err(|e| ConfigurationError::invalid(e.to_string()))?,
            canvas,
            bound: Bound::Nothing,
            enabled: true,
            draw_timer: HighPrecisionTimer::new(),
        };
        renderer
            .cache_messages()
            .map_err(|e| ConfigurationError::invalid(e.to_string()))?;
        Ok(renderer)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.width = width;
        self.height = height;
        self.canvas = blank_canvas(width, height)?;
        self.fixation = fixation_cross(height)?;
        self.cache_messages()
    }

    /// Premultiplied RGBA bytes of the last drawn frame.
    pub fn frame(&self) -> &[u8] {
        self.canvas.data()
    }

    pub fn canvas(&self) -> &Pixmap {
        &self.canvas
    }

    pub fn draw_stats(&self) -> FrameStats {
        self.draw_timer.frame_stats()
    }

    fn cache_messages(&mut self) -> Result<(), RenderError> {
        let size = (self.height as f32 / 28.0).max(12.0);
        for kind in MessageKind::ALL {
            let pm = render_text_pixmap(kind.text(), size, &self.font, Color::WHITE)?;
            self.messages.insert(kind, pm);
        }
        Ok(())
    }

    fn model_view(&self, rotation_x: f64, height_ratio: f64) -> Mat4 {
        ModelView {
            rotation: [rotation_x, 0.0, 0.0],
            scale: [self.display.scale_x, self.display.scale_y, height_ratio],
            translation: [0.0, 0.0, self.display.stimulus_depth],
        }
        .matrix()
    }
}

impl Renderer for SkiaRenderer {
    fn bind_screen(&mut self, screen: Screen) -> Result<(), RenderError> {
        self.bound = Bound::Screen(screen);
        Ok(())
    }

    fn bind_stimulus(
        &mut self,
        textures: &TrialTextures,
        height_ratio: f64,
    ) -> Result<(), RenderError> {
        if !self.colormaps.contains_key(&textures.colormap) {
            return Err(RenderError::Texture {
                path: textures.colormap.clone(),
                message: "not preloaded".into(),
            });
        }
        for path in [&textures.heightmap, &textures.normalmap] {
            if !self.relief_maps.contains(path) {
                return Err(RenderError::Texture {
                    path: path.clone(),
                    message: "not preloaded".into(),
                });
            }
        }
        self.bound = Bound::Stimulus {
            colormap: textures.colormap.clone(),
            height_ratio,
        };
        Ok(())
    }

    fn draw(
        &mut self,
        is_stimulus: bool,
        rotation_x: f64,
        projections: &[Mat4],
    ) -> Result<(), RenderError> {
        let start = self.draw_timer.now();
        self.canvas.fill(BACKGROUND);
        if !self.enabled {
            return Ok(());
        }

        let count = projections.len();
        for (eye, projection) in projections.iter().enumerate() {
            let viewport = Viewport::split(self.width, self.height, eye, count);
            match &self.bound {
                Bound::Stimulus {
                    colormap,
                    height_ratio,
                } if is_stimulus => {
                    let model_view = self.model_view(rotation_x, *height_ratio);
                    let texture = self.colormaps.get(colormap).ok_or_else(|| RenderError::Texture {
                        path: colormap.clone(),
                        message: "released".into(),
                    })?;
                    draw_textured_plane(&mut self.canvas, texture, &model_view, projection, &viewport);
                }
                Bound::Screen(Screen::Fixation) => {
                    blit_centered(&mut self.canvas, &self.fixation, &viewport);
                }
                Bound::Screen(Screen::Message(kind)) => {
                    if let Some(pm) = self.messages.get(kind) {
                        blit_centered(&mut self.canvas, pm, &viewport);
                    }
                }
                _ => {}
            }
        }

        let elapsed = self.draw_timer.elapsed(start);
        self.draw_timer.record_frame(elapsed);
        Ok(())
    }

    fn disable_state(&mut self) {
        self.enabled = false;
        self.canvas.fill(BACKGROUND);
    }

    fn unbind_all(&mut self) {
        self.bound = Bound::Nothing;
    }
}

fn blank_canvas(width: u32, height: u32) -> Result<Pixmap, RenderError> {
    let mut canvas = Pixmap::new(width.max(1), height.max(1))
        .ok_or_else(|| RenderError::Canvas(format!("cannot allocate {width}x{height}")))?;
    canvas.fill(BACKGROUND);
    Ok(canvas)
}

/// White cross, two bars of 1/27 of the screen height.
fn fixation_cross(screen_height: u32) -> Result<Pixmap, RenderError> {
    let size = (screen_height / 27).max(8);
    let thickness = (size as f32 / 20.0).max(2.0);
    let mut pm = Pixmap::new(size, size)
        .ok_or_else(|| RenderError::Canvas("fixation pixmap".into()))?;

    let mut paint = Paint::default();
    paint.anti_alias = false;
    paint.set_color(Color::WHITE);

    let extent = size as f32;
    let bars = [
        Rect::from_xywh(0.0, (extent - thickness) * 0.5, extent, thickness),
        Rect::from_xywh((extent - thickness) * 0.5, 0.0, thickness, extent),
    ];
    for bar in bars.into_iter().flatten() {
        pm.fill_rect(bar, &paint, Transform::identity(), None);
    }
    Ok(pm)
}

/// Draw `pm` centred in the viewport, shrunk to fit its width if needed.
fn blit_centered(canvas: &mut Pixmap, pm: &Pixmap, viewport: &Viewport) {
    let (w, h) = (pm.width() as f32, pm.height() as f32);
    let scale = (viewport.width * 0.9 / w).min(1.0);
    let (cx, cy) = viewport.center();
    let transform = Transform::from_row(
        scale,
        0.0,
        0.0,
        scale,
        (cx - w * scale * 0.5).round(),
        (cy - h * scale * 0.5).round(),
    );
    canvas.draw_pixmap(0, 0, pm.as_ref(), &PixmapPaint::default(), transform, None);
}

fn texture_error(path: &Path, message: impl ToString) -> ConfigurationError {
    ConfigurationError::invalid(format!("texture {}: {}", path.display(), message.to_string()))
}

fn check_image(path: &Path) -> Result<(u32, u32), ConfigurationError> {
    if !path.is_file() {
        return Err(ConfigurationError::missing(path));
    }
    image::image_dimensions(path).map_err(|e| texture_error(path, e))
}

fn load_texture(path: &Path) -> Result<Pixmap, ConfigurationError> {
    if !path.is_file() {
        return Err(ConfigurationError::missing(path));
    }
    let rgba = image::open(path).map_err(|e| texture_error(path, e))?.into_rgba8();
    let (w, h) = rgba.dimensions();
    let mut pm = Pixmap::new(w, h).ok_or_else(|| texture_error(path, "empty image"))?;
    for (dst, src) in pm.pixels_mut().iter_mut().zip(rgba.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = tiny_skia::ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Ok(pm)
}
