//! Voxreel turns a narrated slideshow's raw parts into a finished MP4.
//!
//! Given a narration audio file, its time-stamped transcript segments and an
//! ordered list of still images, the engine schedules one clip per
//! (segment, image) pair, crossfades between them, burns word-wrapped
//! captions into the frames and muxes the narration back in.
//!
//! # Pipeline overview
//!
//! 1. **Probe & prepare**: measure the narration with `ffprobe`, decode and
//!    fit every image up front ([`PreparedVisualStore`])
//! 2. **Schedule**: derive each clip's start and duration from the
//!    transcript timestamps so the clips tile the narration without gaps
//!    ([`Timeline`])
//! 3. **Plan**: convert seconds to frames and rasterize caption text once
//!    ([`RenderPlan`])
//! 4. **Composite & encode**: render frames in parallel and stream them to
//!    the system `ffmpeg` binary ([`assemble_video`])
//!
//! The key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **No IO in the frame loop**: images, fonts and durations are all
//!   resolved before the first frame renders.
//! - **Premultiplied RGBA8** end-to-end, opaque by construction, so frames
//!   stream straight to the encoder.
//! - **Audio is the clock**: the timeline is sized from the narration and
//!   the muxed output is locked to it with `-shortest`.
#![forbid(unsafe_code)]

mod assets;
mod audio;
mod captions;
mod encode;
mod foundation;
mod render;
mod timeline;
mod transcript;

pub use assets::decode::decode_image;
pub use assets::fit::fit_to_fill;
pub use assets::store::{PreparedVisual, PreparedVisualStore, VisualAsset};
pub use audio::probe::{NarrationTrack, is_ffprobe_on_path};
pub use captions::font::{CaptionFont, default_font_candidates, resolve_caption_font};
pub use captions::layout::{CaptionCue, CaptionStyle, layout_captions, wrap_words};
pub use encode::ffmpeg::{EncodeConfig, FfmpegEncoder, is_ffmpeg_on_path};
pub use foundation::core::{Canvas, EngineConfig, Fps};
pub use foundation::error::{VoxreelError, VoxreelResult};
pub use render::composite::{FrameRgba, over_premul, over_premul_faded, over_premul_patch};
pub use render::pipeline::{AssembleReport, AssembleRequest, assemble_video, render_frame};
pub use render::plan::{ClipSpan, CueSpan, RenderPlan};
pub use timeline::builder::{Timeline, VisualClip};
pub use transcript::segment::{Segment, segments_from_json, validate_segments};
