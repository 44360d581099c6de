use std::path::PathBuf;

use rayon::prelude::*;

use crate::{
    assets::store::PreparedVisualStore,
    audio::probe::NarrationTrack,
    captions::font::resolve_caption_font,
    captions::layout::{CaptionStyle, layout_captions},
    encode::ffmpeg::{EncodeConfig, FfmpegEncoder},
    foundation::core::EngineConfig,
    foundation::error::{VoxreelError, VoxreelResult},
    render::composite::{FrameRgba, over_premul_faded, over_premul_patch},
    render::plan::RenderPlan,
    timeline::builder::Timeline,
    transcript::segment::{Segment, validate_segments},
};

/// Frames rendered per parallel batch before being handed to the encoder in
/// presentation order.
const CHUNK_FRAMES: u64 = 64;

/// Inputs for one assembly run.
#[derive(Clone, Debug)]
pub struct AssembleRequest {
    /// Narration audio file, probed for duration and muxed into the output.
    pub narration: PathBuf,
    /// Transcript segments, ordered as the transcription provider emitted them.
    pub segments: Vec<Segment>,
    /// Still images in presentation order.
    pub images: Vec<PathBuf>,
    /// Output MP4 path.
    pub output: PathBuf,
    /// Font files tried in order for captions; empty means the built-in
    /// candidate list.
    pub font_candidates: Vec<PathBuf>,
    pub style: CaptionStyle,
    pub config: EngineConfig,
}

impl AssembleRequest {
    pub fn new(
        narration: impl Into<PathBuf>,
        segments: Vec<Segment>,
        images: Vec<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            narration: narration.into(),
            segments,
            images,
            output: output.into(),
            font_candidates: Vec::new(),
            style: CaptionStyle::default(),
            config: EngineConfig::default(),
        }
    }
}

/// What a finished run produced.
#[derive(Clone, Debug, PartialEq)]
pub struct AssembleReport {
    pub output: PathBuf,
    pub total_frames: u64,
    pub clip_count: usize,
    pub cue_count: usize,
    /// Duration of the scheduled timeline in seconds; the muxed file itself
    /// is clamped to the narration by `-shortest`.
    pub timeline_duration_sec: f64,
    /// The font that captioned the run, absent when none resolved.
    pub caption_font: Option<PathBuf>,
}

/// Run the whole engine: probe, prepare, schedule, composite, encode.
///
/// Stages run strictly in order and all IO happens before the frame loop.
/// A failure after the encoder starts removes the partial output file.
pub fn assemble_video(req: &AssembleRequest) -> VoxreelResult<AssembleReport> {
    req.config.validate()?;
    validate_segments(&req.segments)?;

    let narration = NarrationTrack::probe(&req.narration)?;
    let store = PreparedVisualStore::prepare(&req.images, req.config.canvas)?;
    let timeline = Timeline::build(
        &req.segments,
        store.len(),
        narration.duration_sec,
        &req.config,
    )?;

    let font = if req.font_candidates.is_empty() {
        resolve_caption_font(&crate::captions::font::default_font_candidates())
    } else {
        resolve_caption_font(&req.font_candidates)
    };
    let cues = match font.as_ref() {
        Some(f) => layout_captions(&req.segments, f, &req.config, &req.style),
        None => Vec::new(),
    };

    let plan = RenderPlan::compile(&timeline, &cues, font.as_ref(), &req.style, &req.config)?;
    tracing::info!(
        clips = plan.clips.len(),
        cues = plan.cues.len(),
        frames = plan.total_frames,
        duration_sec = timeline.total_duration,
        "render plan compiled"
    );

    let encoder = FfmpegEncoder::new(EncodeConfig {
        canvas: req.config.canvas,
        fps: req.config.fps,
        out_path: req.output.clone(),
        overwrite: true,
        audio_path: Some(narration.path.clone()),
        threads: req.config.render_threads,
    })?;

    let mut output_guard = OutputGuard(Some(req.output.clone()));
    encode_all_frames(&plan, &store, encoder, req.config.render_threads)?;
    output_guard.disarm();

    Ok(AssembleReport {
        output: req.output.clone(),
        total_frames: plan.total_frames,
        clip_count: plan.clips.len(),
        cue_count: plan.cues.len(),
        timeline_duration_sec: timeline.total_duration,
        caption_font: font.map(|f| f.source),
    })
}

/// Composite a single frame from the plan: opaque black base, active clips
/// in timeline order with their fade ramps, then active caption strips.
pub fn render_frame(
    plan: &RenderPlan,
    store: &PreparedVisualStore,
    frame_idx: u64,
) -> VoxreelResult<FrameRgba> {
    let mut frame = FrameRgba::opaque_black(plan.canvas);

    for clip in plan.clips_at(frame_idx) {
        let visual = store.get(clip.asset_index)?;
        over_premul_faded(
            &mut frame.data,
            &visual.rgba8_premul,
            clip.fade_alpha_at(frame_idx),
        )?;
    }
    for cue in plan.cues_at(frame_idx) {
        over_premul_patch(
            &mut frame,
            &cue.rgba8_premul,
            cue.width,
            cue.height,
            cue.x,
            cue.y,
        )?;
    }
    Ok(frame)
}

/// Render frames in parallel chunks and push them to the encoder in order.
fn encode_all_frames(
    plan: &RenderPlan,
    store: &PreparedVisualStore,
    mut encoder: FfmpegEncoder,
    threads: usize,
) -> VoxreelResult<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| VoxreelError::render(format!("failed to build render thread pool: {e}")))?;

    let mut chunk_start = 0u64;
    while chunk_start < plan.total_frames {
        let chunk_end = (chunk_start + CHUNK_FRAMES).min(plan.total_frames);
        let rendered: Vec<VoxreelResult<FrameRgba>> = pool.install(|| {
            (chunk_start..chunk_end)
                .into_par_iter()
                .map(|f| render_frame(plan, store, f))
                .collect()
        });
        for frame in rendered {
            encoder.encode_frame(&frame?)?;
        }
        chunk_start = chunk_end;
    }

    encoder.finish()
}

/// Deletes the output file on drop unless disarmed, so a failed encode never
/// leaves a truncated MP4 behind.
struct OutputGuard(Option<PathBuf>);

impl OutputGuard {
    fn disarm(&mut self) {
        self.0 = None;
    }
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}
