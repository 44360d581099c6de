use std::{
    io::Read,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use anyhow::Context;

use crate::{
    foundation::core::{Canvas, Fps},
    foundation::error::{VoxreelError, VoxreelResult},
    render::composite::FrameRgba,
};

/// Everything the encoder needs to spawn ffmpeg.
#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub canvas: Canvas,
    pub fps: Fps,
    pub out_path: PathBuf,
    pub overwrite: bool,
    /// Narration file muxed as the audio track. Encoded with `-shortest`, so
    /// the output duration locks to this track.
    pub audio_path: Option<PathBuf>,
    /// Thread count passed to libx264.
    pub threads: usize,
}

/// Streams raw opaque RGBA8 frames into a spawned system `ffmpeg` and muxes
/// the narration from disk. Frames must arrive in presentation order.
pub struct FfmpegEncoder {
    cfg: EncodeConfig,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    frames_pushed: u64,
}

impl FfmpegEncoder {
    pub fn new(cfg: EncodeConfig) -> VoxreelResult<Self> {
        if cfg.canvas.width == 0 || cfg.canvas.height == 0 {
            return Err(VoxreelError::validation(
                "encoder width/height must be non-zero",
            ));
        }
        if !cfg.canvas.width.is_multiple_of(2) || !cfg.canvas.height.is_multiple_of(2) {
            return Err(VoxreelError::validation(
                "encoder width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        if cfg.fps.num == 0 || cfg.fps.den == 0 {
            return Err(VoxreelError::validation("encoder fps must be non-zero"));
        }
        if cfg.threads == 0 {
            return Err(VoxreelError::validation("encoder threads must be >= 1"));
        }

        ensure_parent_dir(&cfg.out_path)?;
        if !cfg.overwrite && cfg.out_path.exists() {
            return Err(VoxreelError::validation(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(VoxreelError::render(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }
        if let Some(audio) = cfg.audio_path.as_deref()
            && !audio.is_file()
        {
            return Err(VoxreelError::asset(format!(
                "audio file '{}' does not exist",
                audio.display()
            )));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.arg(if cfg.overwrite { "-y" } else { "-n" });

        // Video input: raw RGBA8 frames on stdin. Frames are opaque by the
        // time they reach the encoder, so no alpha flattening is needed.
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.canvas.width, cfg.canvas.height),
            "-r",
            &format!("{}/{}", cfg.fps.num, cfg.fps.den),
            "-i",
            "pipe:0",
        ]);

        if let Some(audio) = cfg.audio_path.as_deref() {
            cmd.arg("-i").arg(audio);
        }

        cmd.args([
            "-c:v",
            "libx264",
            "-preset",
            "medium",
            "-pix_fmt",
            "yuv420p",
            "-threads",
            &cfg.threads.to_string(),
        ]);

        if cfg.audio_path.is_some() {
            // `-shortest` locks the muxed duration to the narration track.
            cmd.args(["-c:a", "aac", "-shortest"]);
        } else {
            cmd.arg("-an");
        }
        cmd.args(["-movflags", "+faststart"]).arg(&cfg.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            VoxreelError::render(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| VoxreelError::render("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| VoxreelError::render("failed to open ffmpeg stderr (unexpected)"))?;
        // Drain stderr on a side thread so ffmpeg can never block on a full pipe.
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        Ok(Self {
            cfg,
            child: Some(child),
            stdin: Some(stdin),
            stderr_drain: Some(stderr_drain),
            frames_pushed: 0,
        })
    }

    pub fn encode_frame(&mut self, frame: &FrameRgba) -> VoxreelResult<()> {
        if frame.width != self.cfg.canvas.width || frame.height != self.cfg.canvas.height {
            return Err(VoxreelError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.cfg.canvas.width, self.cfg.canvas.height
            )));
        }
        if frame.data.len() != self.cfg.canvas.pixel_bytes() {
            return Err(VoxreelError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(VoxreelError::render("ffmpeg encoder is already finalized"));
        };

        use std::io::Write as _;
        stdin.write_all(&frame.data).map_err(|e| {
            VoxreelError::render(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        self.frames_pushed += 1;
        Ok(())
    }

    pub fn frames_pushed(&self) -> u64 {
        self.frames_pushed
    }

    /// Close stdin, wait for ffmpeg and surface its stderr on failure.
    pub fn finish(mut self) -> VoxreelResult<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| VoxreelError::render("ffmpeg encoder not started"))?;

        let status = child
            .wait()
            .map_err(|e| VoxreelError::render(format!("failed to wait for ffmpeg: {e}")))?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| VoxreelError::render("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| VoxreelError::render(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(VoxreelError::render(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }
        tracing::debug!(
            frames = self.frames_pushed,
            out = %self.cfg.out_path.display(),
            "ffmpeg finished"
        );
        Ok(())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        // An abandoned encoder must not leave a zombie ffmpeg behind.
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> VoxreelResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
