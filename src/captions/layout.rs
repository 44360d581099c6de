use crate::{captions::font::CaptionFont, foundation::core::EngineConfig, transcript::segment::Segment};

/// Visual treatment of caption text. Defaults follow the house style:
/// large bold yellow fill with a thin black stroke, parked in the lower
/// third so it clears both faces and platform UI chrome.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptionStyle {
    /// Glyph size in pixels.
    pub font_px: f32,
    /// Straight-alpha fill color.
    pub fill_rgba: [u8; 4],
    /// Straight-alpha stroke color.
    pub stroke_rgba: [u8; 4],
    /// Stroke radius in pixels.
    pub stroke_px: u32,
    /// Top of the caption block as a fraction of frame height.
    pub vertical_anchor: f64,
    /// Seconds a cue stays up when its segment has no usable end.
    pub default_duration_sec: f64,
    /// Line height as a multiple of the font size.
    pub line_spacing: f32,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_px: 45.0,
            fill_rgba: [255, 255, 0, 255],
            stroke_rgba: [0, 0, 0, 255],
            stroke_px: 2,
            vertical_anchor: 0.65,
            default_duration_sec: 2.0,
            line_spacing: 1.2,
        }
    }
}

/// One caption, timed and already wrapped into display lines.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptionCue {
    pub start: f64,
    pub end: f64,
    pub lines: Vec<String>,
}

impl CaptionCue {
    pub fn active_at(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }
}

/// Turn segments into timed, wrapped cues.
///
/// Independent of the clip schedule: every non-empty segment captions,
/// including segments beyond the image count. Cues whose segment lacks a
/// usable end run for the default duration.
pub fn layout_captions(
    segments: &[Segment],
    font: &CaptionFont,
    config: &EngineConfig,
    style: &CaptionStyle,
) -> Vec<CaptionCue> {
    let wrap_px = config.caption_wrap_width_px() as f32;
    let mut cues = Vec::new();
    let mut skipped = 0usize;

    for seg in segments {
        let text = seg.text.trim();
        if text.is_empty() {
            skipped += 1;
            continue;
        }
        let end = seg
            .usable_end()
            .unwrap_or(seg.start + style.default_duration_sec);
        cues.push(CaptionCue {
            start: seg.start,
            end,
            lines: wrap_words(text, font, style.font_px, wrap_px),
        });
    }

    if skipped > 0 {
        tracing::debug!(skipped, "segments with empty text produce no cues");
    }
    cues
}

/// Greedy word wrap against a pixel budget, measured with the actual font's
/// advance widths. A single word wider than the budget gets its own line
/// rather than being split mid-word.
pub fn wrap_words(text: &str, font: &CaptionFont, font_px: f32, wrap_px: f32) -> Vec<String> {
    let space_w = advance_width(font, ' ', font_px);
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_w = 0.0f32;

    for word in text.split_whitespace() {
        let word_w: f32 = word.chars().map(|c| advance_width(font, c, font_px)).sum();
        if line.is_empty() {
            line.push_str(word);
            line_w = word_w;
        } else if line_w + space_w + word_w <= wrap_px {
            line.push(' ');
            line.push_str(word);
            line_w += space_w + word_w;
        } else {
            lines.push(std::mem::take(&mut line));
            line.push_str(word);
            line_w = word_w;
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn advance_width(font: &CaptionFont, c: char, font_px: f32) -> f32 {
    font.font.metrics(c, font_px).advance_width
}

/// Pixel height of one wrapped line, stroke excluded.
pub fn line_height_px(style: &CaptionStyle) -> u32 {
    (style.font_px * style.line_spacing).round().max(1.0) as u32
}
