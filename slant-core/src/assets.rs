use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigurationError;

const COLORMAP_DIR: &str = "colormaps";
const HEIGHTMAP_DIR: &str = "heightmaps";
const NORMALMAP_DIR: &str = "normalmaps";

/// Image files of one trial, all sharing a stimulus index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialTextures {
    pub colormap: PathBuf,
    pub heightmap: PathBuf,
    pub normalmap: PathBuf,
}

/// Three parallel, sorted lists of stimulus images. Index `i` of each list
/// belongs to stimulus `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StimulusAssets {
    pub colormaps: Vec<PathBuf>,
    pub heightmaps: Vec<PathBuf>,
    pub normalmaps: Vec<PathBuf>,
}

impl StimulusAssets {
    pub fn new(colormaps: Vec<PathBuf>, heightmaps: Vec<PathBuf>, normalmaps: Vec<PathBuf>) -> Self {
        Self {
            colormaps,
            heightmaps,
            normalmaps,
        }
    }

    /// Scan `root/{colormaps,heightmaps,normalmaps}` for `.jpg`/`.png` files.
    pub fn discover(root: &Path) -> Result<Self, ConfigurationError> {
        let assets = Self {
            colormaps: list_images(&root.join(COLORMAP_DIR))?,
            heightmaps: list_images(&root.join(HEIGHTMAP_DIR))?,
            normalmaps: list_images(&root.join(NORMALMAP_DIR))?,
        };
        log::info!(
            "found {} stimuli under {}",
            assets.colormaps.len(),
            root.display()
        );
        Ok(assets)
    }

    /// Number of stimuli, once the three lists agree.
    pub fn validate(&self) -> Result<usize, ConfigurationError> {
        let (c, h, n) = (
            self.colormaps.len(),
            self.heightmaps.len(),
            self.normalmaps.len(),
        );
        if c != h || h != n {
            return Err(ConfigurationError::MismatchedAssets {
                colormaps: c,
                heightmaps: h,
                normalmaps: n,
            });
        }
        Ok(c)
    }

    pub fn len(&self) -> usize {
        self.colormaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colormaps.is_empty()
    }

    pub fn textures(&self, stimulus_id: usize) -> Option<TrialTextures> {
        Some(TrialTextures {
            colormap: self.colormaps.get(stimulus_id)?.clone(),
            heightmap: self.heightmaps.get(stimulus_id)?.clone(),
            normalmap: self.normalmaps.get(stimulus_id)?.clone(),
        })
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, ConfigurationError> {
    let entries = fs::read_dir(dir).map_err(|_| ConfigurationError::missing(dir))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_image(path))
        .collect();
    files.sort();
    Ok(files)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "png"))
        .unwrap_or(false)
}
