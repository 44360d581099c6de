use crate::{
    foundation::core::EngineConfig,
    foundation::error::{VoxreelError, VoxreelResult},
    transcript::segment::Segment,
};

/// One scheduled still image on the video track.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VisualClip {
    /// Index into the prepared visual store.
    pub asset_index: usize,
    /// Placement on the global timeline, in seconds.
    pub start: f64,
    /// Duration the clip owns before any crossfade padding.
    pub base_duration: f64,
    /// Extra tail seconds so the next clip's fade-in has pixels to fade over.
    pub crossfade_pad: f64,
    /// Length of this clip's fade-in, zero for the first clip.
    pub crossfade_in: f64,
}

impl VisualClip {
    /// Seconds the clip is actually on screen, padding included.
    pub fn scheduled_duration(&self) -> f64 {
        self.base_duration + self.crossfade_pad
    }

    pub fn end(&self) -> f64 {
        self.start + self.scheduled_duration()
    }
}

/// The synchronized schedule: one clip per usable (segment, image) pair plus
/// the locked total duration.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Timeline {
    pub clips: Vec<VisualClip>,
    /// Narration duration plus the trailing buffer. The encoder's `-shortest`
    /// flag still locks the muxed output to the narration itself.
    pub total_duration: f64,
}

impl Timeline {
    /// Pair segments with images index-for-index and derive every clip's
    /// placement from the transcript timestamps.
    ///
    /// Clip `i` starts at `segments[i].start` and runs until the next paired
    /// segment starts, so consecutive clips tile the narration without gaps
    /// whatever the segment `end` values claim. The last paired clip is
    /// stretched to the end of the timeline. Extra segments narrate over the
    /// final image; extra images are dropped.
    pub fn build(
        segments: &[Segment],
        image_count: usize,
        narration_duration_sec: f64,
        config: &EngineConfig,
    ) -> VoxreelResult<Self> {
        config.validate()?;
        if segments.is_empty() {
            return Err(VoxreelError::validation(
                "timeline requires at least one segment",
            ));
        }
        if image_count == 0 {
            return Err(VoxreelError::validation(
                "timeline requires at least one image",
            ));
        }
        if !narration_duration_sec.is_finite() || narration_duration_sec <= 0.0 {
            return Err(VoxreelError::validation(format!(
                "narration duration must be finite and > 0 (got {narration_duration_sec})"
            )));
        }

        let total_duration = narration_duration_sec + config.trailing_buffer_sec;
        let paired = segments.len().min(image_count);
        if paired < segments.len() {
            tracing::debug!(
                segments = segments.len(),
                images = image_count,
                "more segments than images, trailing segments share the last image"
            );
        }
        if paired < image_count {
            tracing::debug!(
                segments = segments.len(),
                images = image_count,
                "more images than segments, trailing images are unused"
            );
        }

        let mut clips = Vec::with_capacity(paired);
        for i in 0..paired {
            let start = segments[i].start;
            let raw = if i + 1 < paired {
                segments[i + 1].start - start
            } else {
                total_duration - start
            };

            let base_duration = if raw > 0.0 {
                raw
            } else {
                tracing::warn!(
                    clip = i,
                    start,
                    raw_duration = raw,
                    floor = config.min_clip_duration_sec,
                    "non-positive clip duration, clamping to floor"
                );
                config.min_clip_duration_sec
            };

            clips.push(VisualClip {
                asset_index: i,
                start,
                base_duration,
                crossfade_pad: config.crossfade_sec,
                crossfade_in: if i == 0 { 0.0 } else { config.crossfade_sec },
            });
        }

        Ok(Self {
            clips,
            total_duration,
        })
    }

    /// Latest instant any clip is still on screen. At least `total_duration`
    /// unless clamping pushed a clip past it.
    pub fn visual_end(&self) -> f64 {
        self.clips
            .iter()
            .map(VisualClip::end)
            .fold(self.total_duration, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64) -> Segment {
        Segment::new(start, Some(start + 1.0), "words")
    }

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn durations_come_from_successor_starts_not_segment_ends() {
        // Segment ends deliberately disagree with the next start; the
        // timeline must follow the starts.
        let segments = vec![
            Segment::new(0.0, Some(1.2), "a"),
            Segment::new(2.0, Some(2.1), "b"),
            Segment::new(4.5, None, "c"),
        ];
        let tl = Timeline::build(&segments, 3, 9.0, &config()).unwrap();

        assert_eq!(tl.total_duration, 9.5);
        assert_eq!(tl.clips.len(), 3);
        assert_eq!(tl.clips[0].base_duration, 2.0);
        assert_eq!(tl.clips[1].base_duration, 2.5);
        assert_eq!(tl.clips[2].base_duration, 5.0);
    }

    #[test]
    fn clips_tile_the_timeline_without_gaps() {
        let segments = vec![seg(0.0), seg(3.1), seg(5.9), seg(8.0)];
        let tl = Timeline::build(&segments, 4, 12.0, &config()).unwrap();

        for pair in tl.clips.windows(2) {
            assert!((pair[0].start + pair[0].base_duration - pair[1].start).abs() < 1e-9);
        }
        let last = tl.clips.last().unwrap();
        assert!((last.start + last.base_duration - tl.total_duration).abs() < 1e-9);
    }

    #[test]
    fn every_clip_carries_the_crossfade_pad_and_only_later_clips_fade_in() {
        let segments = vec![seg(0.0), seg(2.0)];
        let tl = Timeline::build(&segments, 2, 6.0, &config()).unwrap();

        assert_eq!(tl.clips[0].crossfade_pad, 0.5);
        assert_eq!(tl.clips[0].crossfade_in, 0.0);
        assert_eq!(tl.clips[1].crossfade_pad, 0.5);
        assert_eq!(tl.clips[1].crossfade_in, 0.5);
        assert_eq!(tl.clips[0].scheduled_duration(), 2.5);
    }

    #[test]
    fn more_segments_than_images_yields_one_clip_per_image() {
        let segments = vec![seg(0.0), seg(1.0), seg(2.0), seg(3.0), seg(4.0)];
        let tl = Timeline::build(&segments, 3, 10.0, &config()).unwrap();

        assert_eq!(tl.clips.len(), 3);
        // The last clip stretches to the end of the timeline, covering the
        // narration of the unpaired segments.
        assert_eq!(tl.clips[2].start, 2.0);
        assert_eq!(tl.clips[2].base_duration, 10.5 - 2.0);
    }

    #[test]
    fn more_images_than_segments_drops_the_extras() {
        let segments = vec![seg(0.0), seg(4.0)];
        let tl = Timeline::build(&segments, 5, 8.0, &config()).unwrap();
        assert_eq!(tl.clips.len(), 2);
        assert_eq!(tl.clips.last().unwrap().asset_index, 1);
    }

    #[test]
    fn non_positive_durations_clamp_to_the_floor() {
        // Out-of-order starts make the middle clip's raw duration negative.
        let segments = vec![seg(0.0), seg(5.0), seg(3.0)];
        let tl = Timeline::build(&segments, 3, 9.0, &config()).unwrap();
        assert_eq!(tl.clips[1].base_duration, 3.0);
    }

    #[test]
    fn last_segment_past_narration_end_still_gets_the_floor() {
        let segments = vec![seg(0.0), seg(11.0)];
        let tl = Timeline::build(&segments, 2, 10.0, &config()).unwrap();
        // 10.5 - 11.0 is negative, so the terminal clip is clamped.
        assert_eq!(tl.clips[1].base_duration, 3.0);
        assert!(tl.visual_end() > tl.total_duration);
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        assert!(Timeline::build(&[], 3, 9.0, &config()).is_err());
        assert!(Timeline::build(&[seg(0.0)], 0, 9.0, &config()).is_err());
        assert!(Timeline::build(&[seg(0.0)], 1, 0.0, &config()).is_err());
        assert!(Timeline::build(&[seg(0.0)], 1, f64::NAN, &config()).is_err());
    }
}
