use anyhow::Context;

use crate::foundation::error::{VoxreelError, VoxreelResult};

/// One time-stamped unit of transcribed speech.
///
/// This is the engine's input contract with the transcription provider.
/// `start` values are expected to be ordered but are not assumed strictly
/// increasing or gapless; `end` may be absent or garbage and downstream
/// consumers must tolerate both.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Segment {
    /// Segment start in seconds.
    pub start: f64,
    /// Segment end in seconds, when the provider supplies one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    /// Spoken text; may be empty or whitespace-only.
    #[serde(default)]
    pub text: String,
}

impl Segment {
    pub fn new(start: f64, end: Option<f64>, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// End timestamp usable for caption timing: `end` when it is finite and
    /// after `start`, otherwise `None` (callers apply their documented floor).
    pub fn usable_end(&self) -> Option<f64> {
        match self.end {
            Some(end) if end.is_finite() && end > self.start => Some(end),
            _ => None,
        }
    }
}

#[derive(serde::Deserialize)]
struct TranscriptDoc {
    segments: Vec<Segment>,
}

/// Parse a Whisper-style transcript document: `{"segments": [{start, end, text}, ...]}`.
pub fn segments_from_json(json: &str) -> VoxreelResult<Vec<Segment>> {
    let doc: TranscriptDoc = serde_json::from_str(json)
        .context("parse transcript json")
        .map_err(|e| VoxreelError::serde(format!("{e:#}")))?;
    validate_segments(&doc.segments)?;
    Ok(doc.segments)
}

/// Check the fatal preconditions on a segment list.
///
/// Zero segments or non-finite start timestamps abort the run before any
/// rendering work; out-of-order starts are tolerated (the timeline builder
/// clamps the durations they produce).
pub fn validate_segments(segments: &[Segment]) -> VoxreelResult<()> {
    if segments.is_empty() {
        return Err(VoxreelError::validation(
            "transcript must contain at least one segment",
        ));
    }
    for (i, seg) in segments.iter().enumerate() {
        if !seg.start.is_finite() || seg.start < 0.0 {
            return Err(VoxreelError::validation(format!(
                "segment {i} start must be finite and >= 0 (got {})",
                seg.start
            )));
        }
    }
    Ok(())
}
