//! Color ramps: ordered position to color maps sampled by the route shaders
//! along the length of a line, and their construction from overlapping
//! traffic segments.

use super::segment::NormalizedRange;
use crate::render::color::Color;
use log::trace;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Offset of the stops inserted next to segment boundaries, so that colors
/// change abruptly instead of blending over the whole gap between stops.
pub const RAMP_EPSILON: f64 = 1e-5;

/// Totally ordered position, to key a [`BTreeMap`].
#[derive(Clone, Copy, Debug)]
struct Position(f64);

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Position {}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Ordered mapping from positions in `[0, 1]` to colors.
///
/// Inserting at an existing position replaces its color.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColorRamp {
    stops: BTreeMap<Position, Color>,
}

impl ColorRamp {
    /// Creates an empty ramp.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ramp of a single color.
    pub fn flat(color: Color) -> Self {
        let mut ramp = Self::new();
        ramp.insert(0.0, color);
        ramp.insert(1.0, color);
        ramp
    }

    /// Sets the color at a position, clamped to `[0, 1]`.
    pub fn insert(&mut self, position: f64, color: Color) {
        self.stops.insert(Position(position.clamp(0.0, 1.0)), color);
    }

    /// Returns the number of stops.
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    /// Checks whether the ramp has no stop.
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Iterates over the stops by increasing position.
    pub fn iter(&self) -> impl Iterator<Item = (f64, Color)> + '_ {
        self.stops.iter().map(|(p, c)| (p.0, *c))
    }

    /// Returns the stop positions, in increasing order.
    pub fn positions(&self) -> Vec<f64> {
        self.stops.keys().map(|p| p.0).collect()
    }

    /// Returns the color at a position, interpolating linearly between the
    /// surrounding stops.
    pub fn color_at(&self, position: f64) -> Color {
        let key = Position(position);
        let before = self.stops.range(..=key).next_back();
        let after = self.stops.range(key..).next();
        match (before, after) {
            (Some((p0, c0)), Some((p1, c1))) => {
                let span = p1.0 - p0.0;
                if span <= 0.0 {
                    *c0
                } else {
                    c0.lerp(c1, (position - p0.0) / span)
                }
            }
            (Some((_, c)), None) | (None, Some((_, c))) => *c,
            (None, None) => Color::TRANSPARENT,
        }
    }

    /// Paints the traveled range `[0, progress]` with `clip_color`, keeping
    /// the rest of the ramp.
    ///
    /// The ramp resumes right after `progress` with the color of its first
    /// stop at or after `progress`.
    pub fn with_progress(&self, progress: f64, clip_color: Color) -> ColorRamp {
        if progress.is_nan() || progress <= 0.0 {
            return self.clone();
        }
        if progress + RAMP_EPSILON >= 1.0 {
            return ColorRamp::flat(clip_color);
        }

        let resume = progress + RAMP_EPSILON;
        let mut ramp = ColorRamp::new();
        ramp.insert(0.0, clip_color);
        ramp.insert(progress, clip_color);
        let resume_color = self
            .iter()
            .find(|&(p, _)| p >= progress)
            .map_or(clip_color, |(_, color)| color);
        ramp.insert(resume, resume_color);
        for (position, color) in self.iter().filter(|&(p, _)| p > resume) {
            ramp.insert(position, color);
        }
        ramp
    }

    /// Samples the ramp into `width` RGBA texels, as uploaded to a gradient
    /// texture.
    pub fn to_texels(&self, width: usize) -> Vec<[u8; 4]> {
        let last = width.saturating_sub(1).max(1) as f64;
        (0..width)
            .map(|i| self.color_at(i as f64 / last).to_rgba8())
            .collect()
    }

    /// Builds the ramp of a route painted with `base_color` and overlaid with
    /// colored spans.
    ///
    /// Where spans overlap, the one with the highest priority wins, ties going
    /// to the latest inserted. Each run of a single color gets hard edges:
    /// extra stops one [`RAMP_EPSILON`] away from its bounds keep the
    /// neighbouring color up to the boundary.
    pub fn from_spans(spans: &[ColorSpan], base_color: Color) -> ColorRamp {
        let runs = resolve_priorities(spans);
        let mut ramp = ColorRamp::new();
        ramp.insert(0.0, base_color);
        ramp.insert(1.0, base_color);

        // An interior run gets a stop one epsilon before its start and one
        // after its end, on top of its bounds: N separate runs give 4N + 2
        // stops.
        for (k, run) in runs.iter().enumerate() {
            let prev = k.checked_sub(1).map(|j| &runs[j]);
            let next = runs.get(k + 1);

            match prev {
                Some(prev) if prev.is_adjacent_to(run) => {
                    ramp.insert(run.start - RAMP_EPSILON, prev.color);
                    ramp.insert(run.start, run.color);
                }
                _ => {
                    if run.start < RAMP_EPSILON {
                        ramp.insert(0.0, run.color);
                    } else {
                        ramp.insert(run.start - RAMP_EPSILON, base_color);
                        ramp.insert(run.start, run.color);
                    }
                }
            }

            if !next.is_some_and(|next| run.is_adjacent_to(next)) {
                if run.end > 1.0 - RAMP_EPSILON {
                    ramp.insert(1.0, run.color);
                } else {
                    ramp.insert(run.end, run.color);
                    ramp.insert(run.end + RAMP_EPSILON, base_color);
                }
            }
        }

        // Zero-length spans show as spikes, unless hidden under a span with a
        // higher priority.
        let mut spikes: Vec<&ColorSpan> = spans.iter().filter(|s| s.range.is_degenerate()).collect();
        spikes.sort_by_key(|s| s.key());
        for spike in spikes {
            let position = spike.range.start;
            let hidden = spans.iter().any(|s| {
                !s.range.is_degenerate() && s.range.contains(position) && s.key() > spike.key()
            });
            if hidden {
                continue;
            }
            let before = ramp.color_at(position - RAMP_EPSILON);
            let after = ramp.color_at(position + RAMP_EPSILON);
            if position >= RAMP_EPSILON {
                ramp.insert(position - RAMP_EPSILON, before);
            }
            if position <= 1.0 - RAMP_EPSILON {
                ramp.insert(position + RAMP_EPSILON, after);
            }
            ramp.insert(position, spike.color);
        }

        trace!("Built ramp with {} stops from {} spans", ramp.len(), spans.len());
        ramp
    }
}

/// A colored range over a route, as input to [`ColorRamp::from_spans`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorSpan {
    /// Covered positions.
    pub range: NormalizedRange,
    /// Priority of the span over overlapping ones.
    pub priority: u32,
    /// Insertion order, breaking priority ties.
    pub order: usize,
    /// Color of the span.
    pub color: Color,
}

impl ColorSpan {
    fn key(&self) -> (u32, usize) {
        (self.priority, self.order)
    }
}

/// A maximal range of a single color after priority resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Run {
    start: f64,
    end: f64,
    color: Color,
}

impl Run {
    /// Checks whether `next` starts where this run ends, up to a gap too small
    /// to show the base color in between.
    fn is_adjacent_to(&self, next: &Run) -> bool {
        next.start - self.end < 2.0 * RAMP_EPSILON
    }
}

/// Splits the route at every span boundary, keeps the winning span of each
/// piece and merges consecutive pieces of the same color.
fn resolve_priorities(spans: &[ColorSpan]) -> Vec<Run> {
    let covering: Vec<&ColorSpan> = spans.iter().filter(|s| !s.range.is_degenerate()).collect();

    let mut breakpoints: Vec<f64> = covering
        .iter()
        .flat_map(|s| [s.range.start, s.range.end])
        .collect();
    breakpoints.sort_by(f64::total_cmp);
    breakpoints.dedup();

    let mut runs: Vec<Run> = Vec::new();
    for w in breakpoints.windows(2) {
        let (start, end) = (w[0], w[1]);
        let winner = covering
            .iter()
            .filter(|s| s.range.start <= start && s.range.end >= end)
            .max_by_key(|s| s.key());
        let Some(winner) = winner else {
            continue;
        };

        match runs.last_mut() {
            Some(last) if last.color == winner.color && last.is_adjacent_to(&Run { start, end, color: winner.color }) => {
                last.end = end;
            }
            _ => runs.push(Run {
                start,
                end,
                color: winner.color,
            }),
        }
    }
    runs
}
