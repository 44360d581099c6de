use crate::foundation::error::{VoxreelError, VoxreelResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> VoxreelResult<Self> {
        if num == 0 {
            return Err(VoxreelError::validation("Fps num must be > 0"));
        }
        if den == 0 {
            return Err(VoxreelError::validation("Fps den must be > 0"));
        }
        Ok(Self { num, den })
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    pub fn secs_to_frames_floor(self, secs: f64) -> u64 {
        (secs * self.as_f64()).floor().max(0.0) as u64
    }

    pub fn secs_to_frames_ceil(self, secs: f64) -> u64 {
        (secs * self.as_f64()).ceil().max(0.0) as u64
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn pixel_bytes(self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Explicit engine parameters. Every tunable of the synchronization and
/// compositing pass lives here; nothing is read from ambient configuration.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct EngineConfig {
    /// Output frame dimensions. Must be even on both axes for yuv420p output.
    pub canvas: Canvas,
    /// Output frame rate.
    pub fps: Fps,
    /// Crossfade length in seconds between consecutive clips.
    pub crossfade_sec: f64,
    /// Fraction of the frame width captions may occupy before wrapping.
    pub caption_safe_width: f64,
    /// Lower bound applied when a computed clip duration is non-positive.
    pub min_clip_duration_sec: f64,
    /// Seconds appended after the narration so the video does not cut hard.
    pub trailing_buffer_sec: f64,
    /// Worker threads used for frame compositing and handed to the encoder.
    pub render_threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            canvas: Canvas {
                width: 1920,
                height: 1080,
            },
            fps: Fps { num: 24, den: 1 },
            crossfade_sec: 0.5,
            caption_safe_width: 0.88,
            min_clip_duration_sec: 3.0,
            trailing_buffer_sec: 0.5,
            render_threads: 4,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> VoxreelResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(VoxreelError::validation("canvas width/height must be > 0"));
        }
        if !self.canvas.width.is_multiple_of(2) || !self.canvas.height.is_multiple_of(2) {
            return Err(VoxreelError::validation(
                "canvas width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(VoxreelError::validation("fps must have num>0 and den>0"));
        }
        if !self.crossfade_sec.is_finite() || self.crossfade_sec < 0.0 {
            return Err(VoxreelError::validation(
                "crossfade_sec must be finite and >= 0",
            ));
        }
        if !self.caption_safe_width.is_finite()
            || self.caption_safe_width <= 0.0
            || self.caption_safe_width > 1.0
        {
            return Err(VoxreelError::validation(
                "caption_safe_width must be in (0, 1]",
            ));
        }
        if !self.min_clip_duration_sec.is_finite() || self.min_clip_duration_sec <= 0.0 {
            return Err(VoxreelError::validation(
                "min_clip_duration_sec must be finite and > 0",
            ));
        }
        if !self.trailing_buffer_sec.is_finite() || self.trailing_buffer_sec < 0.0 {
            return Err(VoxreelError::validation(
                "trailing_buffer_sec must be finite and >= 0",
            ));
        }
        if self.render_threads == 0 {
            return Err(VoxreelError::validation("render_threads must be >= 1"));
        }
        Ok(())
    }

    /// Caption wrap width in pixels derived from the safe-width fraction.
    pub fn caption_wrap_width_px(&self) -> u32 {
        ((f64::from(self.canvas.width) * self.caption_safe_width).round() as u32).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_seconds_to_frames() {
        let fps = Fps::new(24, 1).unwrap();
        assert_eq!(fps.secs_to_frames_floor(1.0), 24);
        assert_eq!(fps.secs_to_frames_ceil(1.01), 25);
        assert_eq!(fps.secs_to_frames_floor(-1.0), 0);
    }

    #[test]
    fn default_config_validates() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn odd_canvas_is_rejected() {
        let cfg = EngineConfig {
            canvas: Canvas {
                width: 1921,
                height: 1080,
            },
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn default_safe_width_is_88_percent_of_1080p() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.caption_wrap_width_px(), 1690);
    }
}
