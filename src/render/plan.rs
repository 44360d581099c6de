use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};

use crate::{
    captions::font::CaptionFont,
    captions::layout::{CaptionCue, CaptionStyle, line_height_px},
    foundation::core::{Canvas, EngineConfig, Fps},
    foundation::error::{VoxreelError, VoxreelResult},
    render::composite::mul_div255,
    timeline::builder::Timeline,
};

/// A clip's placement in frame units, fade ramp included.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClipSpan {
    pub asset_index: usize,
    /// First frame the clip is visible (inclusive).
    pub start_frame: u64,
    /// First frame past the clip (exclusive).
    pub end_frame: u64,
    /// Frames over which the clip ramps from invisible to full opacity.
    pub fade_in_frames: u64,
}

impl ClipSpan {
    pub fn covers(&self, frame: u64) -> bool {
        frame >= self.start_frame && frame < self.end_frame
    }

    /// Crossfade ramp for `frame`: linear 0→255 across `fade_in_frames`,
    /// then solid. Frame 0 of the ramp is already partially visible so two
    /// crossfading clips always sum to full coverage.
    pub fn fade_alpha_at(&self, frame: u64) -> u8 {
        debug_assert!(self.covers(frame));
        if self.fade_in_frames == 0 {
            return 255;
        }
        let step = frame - self.start_frame + 1;
        if step >= self.fade_in_frames {
            255
        } else {
            ((step * 255) / self.fade_in_frames) as u8
        }
    }
}

/// A caption cue rasterized once and timed in frame units.
#[derive(Clone, PartialEq)]
pub struct CueSpan {
    pub start_frame: u64,
    pub end_frame: u64,
    /// Placement of the overlay's top-left corner on the frame.
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
    /// Premultiplied RGBA8 strip, `width * height * 4` bytes.
    pub rgba8_premul: Vec<u8>,
}

impl std::fmt::Debug for CueSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CueSpan")
            .field("start_frame", &self.start_frame)
            .field("end_frame", &self.end_frame)
            .field("size", &(self.width, self.height))
            .finish()
    }
}

impl CueSpan {
    pub fn covers(&self, frame: u64) -> bool {
        frame >= self.start_frame && frame < self.end_frame
    }
}

/// Everything the frame loop needs, with all time math and text shaping done
/// up front. Rendering a frame from a plan touches no clocks, no fonts and
/// no filesystem.
#[derive(Clone, Debug)]
pub struct RenderPlan {
    pub canvas: Canvas,
    pub fps: Fps,
    pub total_frames: u64,
    pub clips: Vec<ClipSpan>,
    pub cues: Vec<CueSpan>,
}

impl RenderPlan {
    /// Convert the timeline and cue list into frame units and rasterize the
    /// caption text. `font` is `None` when no usable font was resolved; the
    /// plan then simply carries no cues.
    pub fn compile(
        timeline: &Timeline,
        cues: &[CaptionCue],
        font: Option<&CaptionFont>,
        style: &CaptionStyle,
        config: &EngineConfig,
    ) -> VoxreelResult<Self> {
        config.validate()?;
        if timeline.clips.is_empty() {
            return Err(VoxreelError::render("render plan requires clips"));
        }
        let fps = config.fps;
        let canvas = config.canvas;
        let total_frames = fps.secs_to_frames_ceil(timeline.total_duration).max(1);

        let clips = timeline
            .clips
            .iter()
            .map(|clip| ClipSpan {
                asset_index: clip.asset_index,
                start_frame: fps.secs_to_frames_floor(clip.start),
                end_frame: fps
                    .secs_to_frames_ceil(clip.end())
                    .min(total_frames)
                    .max(fps.secs_to_frames_floor(clip.start) + 1),
                fade_in_frames: fps.secs_to_frames_ceil(clip.crossfade_in),
            })
            .collect();

        let mut cue_spans = Vec::new();
        if let Some(font) = font {
            for (i, cue) in cues.iter().enumerate() {
                match rasterize_cue(cue, font, style, canvas) {
                    Some(span_bitmap) => {
                        let start_frame = fps.secs_to_frames_floor(cue.start);
                        let end_frame = fps
                            .secs_to_frames_ceil(cue.end)
                            .min(total_frames)
                            .max(start_frame + 1);
                        cue_spans.push(CueSpan {
                            start_frame,
                            end_frame,
                            x: span_bitmap.x,
                            y: span_bitmap.y,
                            width: span_bitmap.width,
                            height: span_bitmap.height,
                            rgba8_premul: span_bitmap.data,
                        });
                    }
                    None => {
                        tracing::warn!(cue = i, start = cue.start, "cue produced no glyphs, skipping");
                    }
                }
            }
        }

        Ok(Self {
            canvas,
            fps,
            total_frames,
            clips,
            cues: cue_spans,
        })
    }

    /// Clips visible at `frame`, in timeline order so later clips composite
    /// over earlier ones during a crossfade.
    pub fn clips_at(&self, frame: u64) -> impl Iterator<Item = &ClipSpan> {
        self.clips.iter().filter(move |c| c.covers(frame))
    }

    pub fn cues_at(&self, frame: u64) -> impl Iterator<Item = &CueSpan> {
        self.cues.iter().filter(move |c| c.covers(frame))
    }
}

struct RasterizedBlock {
    x: i64,
    y: i64,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// Rasterize a wrapped cue into one premultiplied strip: a stroke pass in
/// the stroke color offset over a disc of the stroke radius, then the fill
/// pass on top. Lines are centered horizontally; the block's top edge sits
/// at `vertical_anchor * frame height`.
fn rasterize_cue(
    cue: &CaptionCue,
    font: &CaptionFont,
    style: &CaptionStyle,
    canvas: Canvas,
) -> Option<RasterizedBlock> {
    if cue.lines.is_empty() {
        return None;
    }
    let stroke = style.stroke_px as i64;
    let line_h = line_height_px(style) as i64;
    let block_w = canvas.width;
    let block_h = (cue.lines.len() as i64 * line_h + 2 * stroke).max(1) as u32;
    let mut data = vec![0u8; block_w as usize * block_h as usize * 4];
    let mut drew_any = false;

    for (line_idx, line) in cue.lines.iter().enumerate() {
        let line_w: f32 = line
            .chars()
            .map(|c| font.font.metrics(c, style.font_px).advance_width)
            .sum();
        let x0 = ((f64::from(block_w) - f64::from(line_w)) / 2.0).max(0.0) as f32;
        let y0 = (stroke + line_idx as i64 * line_h) as f32;

        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings {
            x: x0,
            y: y0,
            ..LayoutSettings::default()
        });
        layout.append(&[&font.font], &TextStyle::new(line, style.font_px, 0));

        let glyphs: Vec<_> = layout.glyphs().clone();
        for glyph in &glyphs {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let (_, mask) = font.font.rasterize_config(glyph.key);
            let gx = glyph.x.round() as i64;
            let gy = glyph.y.round() as i64;

            // Stroke first so the fill overwrites its interior.
            for dy in -stroke..=stroke {
                for dx in -stroke..=stroke {
                    if dx * dx + dy * dy > stroke * stroke {
                        continue;
                    }
                    blend_mask(
                        &mut data,
                        block_w,
                        block_h,
                        gx + dx,
                        gy + dy,
                        &mask,
                        glyph.width,
                        glyph.height,
                        style.stroke_rgba,
                    );
                }
            }
            blend_mask(
                &mut data,
                block_w,
                block_h,
                gx,
                gy,
                &mask,
                glyph.width,
                glyph.height,
                style.fill_rgba,
            );
            drew_any = true;
        }
    }

    if !drew_any {
        return None;
    }
    Some(RasterizedBlock {
        x: 0,
        y: (f64::from(canvas.height) * style.vertical_anchor).round() as i64 - stroke,
        width: block_w,
        height: block_h,
        data,
    })
}

/// Blend a coverage mask in `color` (straight alpha) into a premultiplied
/// buffer at `(x, y)`, clipping at the buffer edges.
#[allow(clippy::too_many_arguments)]
fn blend_mask(
    buf: &mut [u8],
    buf_w: u32,
    buf_h: u32,
    x: i64,
    y: i64,
    mask: &[u8],
    mask_w: usize,
    mask_h: usize,
    color: [u8; 4],
) {
    for row in 0..mask_h {
        let py = y + row as i64;
        if py < 0 || py >= buf_h as i64 {
            continue;
        }
        for col in 0..mask_w {
            let px = x + col as i64;
            if px < 0 || px >= buf_w as i64 {
                continue;
            }
            let coverage = mask[row * mask_w + col];
            if coverage == 0 {
                continue;
            }
            let sa = mul_div255(coverage as u16, color[3] as u16);
            if sa == 0 {
                continue;
            }
            let idx = ((py as u32 * buf_w + px as u32) * 4) as usize;
            let inv = 255 - sa;
            for c in 0..3 {
                let src_premul = mul_div255(color[c] as u16, sa);
                buf[idx + c] = (src_premul + mul_div255(buf[idx + c] as u16, inv)).min(255) as u8;
            }
            buf[idx + 3] = (sa + mul_div255(buf[idx + 3] as u16, inv)).min(255) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        captions::font::{default_font_candidates, resolve_caption_font},
        transcript::segment::Segment,
    };

    fn plan_for(starts: &[f64], narration: f64) -> RenderPlan {
        let segments: Vec<Segment> = starts
            .iter()
            .map(|&s| Segment::new(s, Some(s + 1.0), "t"))
            .collect();
        let config = EngineConfig::default();
        let timeline = Timeline::build(&segments, starts.len(), narration, &config).unwrap();
        RenderPlan::compile(&timeline, &[], None, &CaptionStyle::default(), &config).unwrap()
    }

    #[test]
    fn every_frame_is_covered_by_at_least_one_clip() {
        let plan = plan_for(&[0.0, 2.0, 4.5], 9.0);
        assert_eq!(plan.total_frames, 228); // 9.5s at 24fps
        for frame in 0..plan.total_frames {
            assert!(
                plan.clips_at(frame).next().is_some(),
                "frame {frame} has no clip"
            );
        }
    }

    #[test]
    fn crossfade_windows_have_two_clips() {
        let plan = plan_for(&[0.0, 2.0], 6.0);
        // Second clip starts at 2.0s = frame 48 and fades over 0.5s = 12 frames.
        let both: Vec<u64> = (0..plan.total_frames)
            .filter(|&f| plan.clips_at(f).count() == 2)
            .collect();
        assert!(both.contains(&48));
        assert!(both.contains(&59));
        assert!(!both.contains(&60));
    }

    #[test]
    fn fade_ramp_is_monotonic_and_saturates() {
        let span = ClipSpan {
            asset_index: 1,
            start_frame: 48,
            end_frame: 200,
            fade_in_frames: 12,
        };
        let mut last = 0u8;
        for f in 48..60 {
            let a = span.fade_alpha_at(f);
            assert!(a >= last);
            last = a;
        }
        assert_eq!(span.fade_alpha_at(60), 255);
        assert!(span.fade_alpha_at(48) > 0);
    }

    #[test]
    fn first_clip_never_fades() {
        let plan = plan_for(&[0.0, 3.0], 8.0);
        assert_eq!(plan.clips[0].fade_in_frames, 0);
        assert_eq!(plan.clips[0].fade_alpha_at(0), 255);
    }

    #[test]
    fn cue_rasterization_produces_a_visible_strip() {
        let Some(font) = resolve_caption_font(&default_font_candidates()) else {
            return;
        };
        let style = CaptionStyle::default();
        let canvas = Canvas {
            width: 640,
            height: 360,
        };
        let cue = CaptionCue {
            start: 0.0,
            end: 2.0,
            lines: vec!["Hello world".into()],
        };
        let block = rasterize_cue(&cue, &font, &style, canvas).unwrap();
        assert_eq!(block.width, 640);
        assert!(block.height > 40);
        // Anchor: top of the block near 0.65 * 360 = 234.
        assert_eq!(block.y, 234 - style.stroke_px as i64);
        // Both fill and stroke pixels present.
        let has_yellow = block
            .data
            .chunks_exact(4)
            .any(|p| p[0] > 200 && p[1] > 200 && p[2] < 60 && p[3] > 200);
        let has_dark = block
            .data
            .chunks_exact(4)
            .any(|p| p[3] > 200 && p[0] < 60 && p[1] < 60);
        assert!(has_yellow, "no fill pixels rendered");
        assert!(has_dark, "no stroke pixels rendered");
    }

    #[test]
    fn empty_cue_is_skipped_not_fatal() {
        let Some(font) = resolve_caption_font(&default_font_candidates()) else {
            return;
        };
        let cue = CaptionCue {
            start: 0.0,
            end: 2.0,
            lines: vec![],
        };
        assert!(
            rasterize_cue(
                &cue,
                &font,
                &CaptionStyle::default(),
                Canvas {
                    width: 64,
                    height: 64
                }
            )
            .is_none()
        );
    }
}
