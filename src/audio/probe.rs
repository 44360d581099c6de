use std::{
    path::Path,
    process::{Command, Stdio},
};

use anyhow::Context;

use crate::foundation::error::{VoxreelError, VoxreelResult};

/// Narration audio as the timeline builder consumes it: a path for the muxer
/// plus the probed duration in seconds.
#[derive(Clone, Debug, PartialEq)]
pub struct NarrationTrack {
    pub path: std::path::PathBuf,
    pub duration_sec: f64,
}

impl NarrationTrack {
    /// Probe `path` with the system `ffprobe` and capture its duration.
    ///
    /// The narration is never decoded here; the encoder muxes it straight
    /// from disk. Only the duration is needed to anchor the timeline.
    pub fn probe(path: impl AsRef<Path>) -> VoxreelResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(VoxreelError::asset(format!(
                "narration file '{}' does not exist",
                path.display()
            )));
        }
        if !is_ffprobe_on_path() {
            return Err(VoxreelError::asset(
                "ffprobe is required to measure narration duration, but was not found on PATH",
            ));
        }

        let output = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("spawn ffprobe for '{}'", path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoxreelError::asset(format!(
                "ffprobe exited with status {} for '{}': {}",
                output.status,
                path.display(),
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let duration_sec = parse_probed_duration(&stdout).ok_or_else(|| {
            VoxreelError::asset(format!(
                "ffprobe returned no usable duration for '{}' (got {:?})",
                path.display(),
                stdout.trim()
            ))
        })?;

        tracing::debug!(path = %path.display(), duration_sec, "probed narration duration");
        Ok(Self {
            path: path.to_path_buf(),
            duration_sec,
        })
    }
}

/// Parse ffprobe's `format=duration` output. Must be a finite positive number
/// of seconds; ffprobe prints `N/A` for streams it cannot measure.
fn parse_probed_duration(stdout: &str) -> Option<f64> {
    let secs: f64 = stdout.trim().parse().ok()?;
    (secs.is_finite() && secs > 0.0).then_some(secs)
}

/// Return `true` when `ffprobe` can be invoked from `PATH`.
pub fn is_ffprobe_on_path() -> bool {
    Command::new("ffprobe")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_seconds() {
        assert_eq!(parse_probed_duration("12.345\n"), Some(12.345));
        assert_eq!(parse_probed_duration("  3 "), Some(3.0));
    }

    #[test]
    fn rejects_na_zero_and_garbage() {
        assert_eq!(parse_probed_duration("N/A\n"), None);
        assert_eq!(parse_probed_duration("0.0"), None);
        assert_eq!(parse_probed_duration("-2.0"), None);
        assert_eq!(parse_probed_duration("inf"), None);
        assert_eq!(parse_probed_duration(""), None);
    }

    #[test]
    fn missing_file_is_an_asset_error() {
        let err = NarrationTrack::probe("/definitely/not/here.mp3").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
