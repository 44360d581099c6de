use std::path::{Path, PathBuf};

use fontdue::{Font, FontSettings};

/// A parsed caption font together with where it came from.
pub struct CaptionFont {
    pub font: Font,
    pub source: PathBuf,
}

impl std::fmt::Debug for CaptionFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptionFont")
            .field("source", &self.source)
            .finish()
    }
}

/// Font files probed in order when the caller does not supply a path.
/// Bold sans faces commonly present on Linux installs.
pub fn default_font_candidates() -> Vec<PathBuf> {
    [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
        "/usr/share/fonts/truetype/freefont/FreeSansBold.ttf",
        "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
        "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

/// Walk `candidates` in order and return the first file that parses as a
/// usable font. Existence is not enough; a corrupt file falls through to the
/// next candidate. `None` means captions are disabled for the run, which is
/// a degraded output, not a failure.
pub fn resolve_caption_font(candidates: &[PathBuf]) -> Option<CaptionFont> {
    for path in candidates {
        match load_font(path) {
            Ok(font) => {
                tracing::info!(path = %path.display(), "caption font resolved");
                return Some(CaptionFont {
                    font,
                    source: path.clone(),
                });
            }
            Err(reason) => {
                tracing::debug!(path = %path.display(), %reason, "font candidate rejected");
            }
        }
    }
    tracing::warn!(
        candidates = candidates.len(),
        "no usable caption font found, captions disabled"
    );
    None
}

fn load_font(path: &Path) -> Result<Font, String> {
    if !path.is_file() {
        return Err("not a file".to_owned());
    }
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    Font::from_bytes(bytes, FontSettings::default()).map_err(str::to_owned)
}
