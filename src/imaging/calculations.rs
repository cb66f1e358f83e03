//! Pure calculation functions for output dimensions and the quality search.
//!
//! All functions here are pure and testable without any I/O or images.

/// Output dimensions derived from a source size and a max-edge constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaledDimensions {
    pub width: u32,
    pub height: u32,
}

impl ScaledDimensions {
    /// True when these dimensions differ from the original `(width, height)`.
    pub fn was_resized(&self, original: (u32, u32)) -> bool {
        (self.width, self.height) != original
    }
}

/// Fit `(width, height)` inside a `max_edge` square, preserving aspect ratio.
///
/// The longer edge becomes `max_edge` and the other is scaled proportionally,
/// rounded to the nearest pixel. Images already within the bound are returned
/// unchanged (never upscale).
///
/// ```
/// # use picbake::imaging::scaled_dimensions;
/// let s = scaled_dimensions(4000, 2000, 1080);
/// assert_eq!((s.width, s.height), (1080, 540));
///
/// let s = scaled_dimensions(800, 600, 1080);
/// assert_eq!((s.width, s.height), (800, 600));
/// ```
pub fn scaled_dimensions(width: u32, height: u32, max_edge: u32) -> ScaledDimensions {
    if width <= max_edge && height <= max_edge {
        return ScaledDimensions { width, height };
    }

    let ratio = width as f64 / height as f64;
    if width > height {
        ScaledDimensions {
            width: max_edge,
            height: ((max_edge as f64 / ratio).round() as u32).max(1),
        }
    } else {
        // Portrait or square: height is the longer (or equal) edge
        ScaledDimensions {
            width: ((max_edge as f64 * ratio).round() as u32).max(1),
            height: max_edge,
        }
    }
}

/// Upper bound on encode attempts for one image: `ceil((max - min) / step) + 1`.
pub fn max_encode_attempts(max_quality: u32, min_quality: u32, step: u32) -> usize {
    let span = max_quality.saturating_sub(min_quality);
    span.div_ceil(step.max(1)) as usize + 1
}

/// The descending qualities visited by the search.
///
/// Starts at `max_quality` and subtracts `step` while the value stays at or
/// above `min_quality`. When the step does not land exactly on the floor, the
/// floor itself is appended so the last attempt is always `min_quality`.
pub fn quality_ladder(max_quality: u32, min_quality: u32, step: u32) -> Vec<u32> {
    let step = step.max(1);
    let mut ladder = Vec::with_capacity(max_encode_attempts(max_quality, min_quality, step));
    let mut quality = max_quality;
    loop {
        ladder.push(quality);
        match quality.checked_sub(step) {
            Some(next) if next >= min_quality => quality = next,
            _ => break,
        }
    }
    if quality > min_quality {
        ladder.push(min_quality);
    }
    ladder
}
