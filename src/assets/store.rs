use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;

use crate::{
    assets::{decode, fit},
    foundation::core::Canvas,
    foundation::error::{VoxreelError, VoxreelResult},
};

/// Plain description of one still image as the timeline builder sees it.
/// Identity is the path; dimensions are the source dimensions before fitting.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VisualAsset {
    pub path: String,
    pub width: u32,
    pub height: u32,
}

/// One image decoded, fitted to the canvas, and premultiplied, ready to blit.
#[derive(Clone)]
pub struct PreparedVisual {
    pub source: PathBuf,
    /// Frame-sized premultiplied RGBA8, row-major, exactly `canvas` pixels.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl std::fmt::Debug for PreparedVisual {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedVisual")
            .field("source", &self.source)
            .field("bytes", &self.rgba8_premul.len())
            .finish()
    }
}

/// Immutable store of prepared visuals.
///
/// All filesystem IO and decoding is front-loaded here so the render stages
/// stay deterministic and IO-free. Unreadable entries are skipped with a
/// warning (never fatal per item); an empty surviving set is a precondition
/// failure.
#[derive(Clone, Debug)]
pub struct PreparedVisualStore {
    canvas: Canvas,
    assets: Vec<VisualAsset>,
    visuals: Vec<PreparedVisual>,
}

impl PreparedVisualStore {
    pub fn prepare(paths: &[PathBuf], canvas: Canvas) -> VoxreelResult<Self> {
        if paths.is_empty() {
            return Err(VoxreelError::validation("image list must be non-empty"));
        }

        let existing: Vec<&PathBuf> = paths.iter().filter(|p| p.is_file()).collect();
        if existing.len() < paths.len() {
            tracing::warn!(
                missing = paths.len() - existing.len(),
                using = existing.len(),
                "some image paths do not exist, continuing with the rest"
            );
        }

        let mut assets = Vec::with_capacity(existing.len());
        let mut visuals = Vec::with_capacity(existing.len());
        for path in existing {
            match Self::prepare_one(path, canvas) {
                Ok((asset, visual)) => {
                    assets.push(asset);
                    visuals.push(visual);
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "skipping unreadable image");
                }
            }
        }

        if visuals.is_empty() {
            return Err(VoxreelError::validation(
                "no usable images after validation",
            ));
        }

        Ok(Self {
            canvas,
            assets,
            visuals,
        })
    }

    fn prepare_one(path: &Path, canvas: Canvas) -> VoxreelResult<(VisualAsset, PreparedVisual)> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read image bytes from '{}'", path.display()))?;
        let img = decode::decode_image(&bytes)?;
        let asset = VisualAsset {
            path: path.to_string_lossy().into_owned(),
            width: img.width(),
            height: img.height(),
        };

        let fitted = fit::fit_to_fill(&img, canvas);
        let mut rgba = fitted.into_raw();
        decode::premultiply_rgba8_in_place(&mut rgba);
        let visual = PreparedVisual {
            source: path.to_path_buf(),
            rgba8_premul: Arc::new(rgba),
        };
        Ok((asset, visual))
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Plain asset descriptions, in preparation order, for timeline pairing.
    pub fn assets(&self) -> &[VisualAsset] {
        &self.assets
    }

    pub fn len(&self) -> usize {
        self.visuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visuals.is_empty()
    }

    pub fn get(&self, index: usize) -> VoxreelResult<&PreparedVisual> {
        self.visuals
            .get(index)
            .ok_or_else(|| VoxreelError::asset(format!("visual index {index} out of range")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba([50, 60, 70, 255]));
        img.save(&path).unwrap();
        path
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("voxreel_store_{tag}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn prepares_valid_images_and_skips_missing() {
        let dir = temp_dir("skip");
        let a = write_png(&dir, "a.png", 64, 64);
        let b = write_png(&dir, "b.png", 32, 64);
        let missing = dir.join("nope.png");

        let store = PreparedVisualStore::prepare(
            &[a, missing, b],
            Canvas {
                width: 16,
                height: 8,
            },
        )
        .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.assets()[0].width, 64);
        assert_eq!(store.assets()[1].height, 64);
        // Fitted buffers are exactly canvas-sized.
        assert_eq!(store.get(0).unwrap().rgba8_premul.len(), 16 * 8 * 4);
    }

    #[test]
    fn wholly_unusable_list_is_fatal() {
        let dir = temp_dir("fatal");
        let garbage = dir.join("garbage.png");
        std::fs::write(&garbage, b"not a png").unwrap();

        let err = PreparedVisualStore::prepare(
            &[dir.join("absent.png"), garbage],
            Canvas {
                width: 16,
                height: 8,
            },
        );
        assert!(err.is_err());
    }

    #[test]
    fn empty_input_list_is_fatal() {
        assert!(
            PreparedVisualStore::prepare(
                &[],
                Canvas {
                    width: 16,
                    height: 8
                }
            )
            .is_err()
        );
    }
}
