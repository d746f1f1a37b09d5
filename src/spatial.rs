use serde::{Deserialize, Serialize};

/// How far the hit region reaches past each side of a target, in normalized units
pub const DEFAULT_TOLERANCE: f64 = 0.05;

const MIN_HIT_SCORE: f64 = 70.0;
const HIT_SCORE_RANGE: f64 = 30.0;

/// A normalized tap position, both axes relative to the image extent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TapPoint {
    pub x: f64,
    pub y: f64,
}

impl TapPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_normalized(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }
}

impl From<(f64, f64)> for TapPoint {
    fn from(v: (f64, f64)) -> Self {
        TapPoint { x: v.0, y: v.1 }
    }
}

/// Target region inside an image, normalized to [0, 1] on both axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> TapPoint {
        TapPoint::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Distance from the center to any corner
    pub fn half_diagonal(&self) -> f64 {
        ((self.width / 2.0).powi(2) + (self.height / 2.0).powi(2)).sqrt()
    }

    /// Grow by `tolerance` on every side, clamped to the unit canvas.
    ///
    /// The width/height clamp is taken from the expanded origin, so a box
    /// pressed against the left or top edge keeps its full expanded size.
    pub fn expanded(&self, tolerance: f64) -> Rect {
        let x = (self.x - tolerance).max(0.0);
        let y = (self.y - tolerance).max(0.0);
        Rect {
            x,
            y,
            width: (self.width + 2.0 * tolerance).min(1.0 - x),
            height: (self.height + 2.0 * tolerance).min(1.0 - y),
        }
    }

    /// Inclusive point-in-rectangle test
    pub fn contains(&self, p: TapPoint) -> bool {
        self.x <= p.x && p.x <= self.x + self.width && self.y <= p.y && p.y <= self.y + self.height
    }

    pub fn is_normalized(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
    }
}

/// Verdict for one tap against one rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapOutcome {
    pub is_hit: bool,
    pub score: u8,
}

impl TapOutcome {
    pub const MISS: TapOutcome = TapOutcome {
        is_hit: false,
        score: 0,
    };
}

/// Score a tap against a single target.
///
/// The hit test runs against the expanded region; the proximity score runs
/// against the unexpanded box, mapping center-to-corner distance onto 100..70.
pub fn check_tap_location(tap: TapPoint, rect: &Rect, tolerance: f64) -> TapOutcome {
    if !rect.expanded(tolerance).contains(tap) {
        return TapOutcome::MISS;
    }

    let max_distance = rect.half_diagonal();
    if max_distance <= 0.0 {
        return TapOutcome {
            is_hit: true,
            score: 100,
        };
    }

    let center = rect.center();
    let distance = ((tap.x - center.x).powi(2) + (tap.y - center.y).powi(2)).sqrt();
    let accuracy = (1.0 - distance / max_distance).clamp(0.0, 1.0);

    TapOutcome {
        is_hit: true,
        score: (MIN_HIT_SCORE + accuracy * HIT_SCORE_RANGE).floor() as u8,
    }
}

/// The winning rectangle for a tap across every target of an image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestHit<'a> {
    pub index: usize,
    pub rect: &'a Rect,
    pub outcome: TapOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Located<'a> {
    Hit(BestHit<'a>),
    /// Nothing was hit; `reference` is the first target, shown as the answer
    Missed { reference: &'a Rect },
}

impl Located<'_> {
    pub fn is_hit(&self) -> bool {
        matches!(self, Located::Hit(_))
    }

    pub fn score(&self) -> u8 {
        match self {
            Located::Hit(best) => best.outcome.score,
            Located::Missed { .. } => 0,
        }
    }
}

/// Pick the strictly best-scoring hit, earlier rectangles winning ties.
/// Returns `None` only when there are no rectangles at all.
pub fn locate_best(tap: TapPoint, rects: &[Rect], tolerance: f64) -> Option<Located<'_>> {
    let first = rects.first()?;

    let mut best: Option<BestHit<'_>> = None;
    for (index, rect) in rects.iter().enumerate() {
        let outcome = check_tap_location(tap, rect, tolerance);
        if !outcome.is_hit {
            continue;
        }
        if best.map_or(true, |b| outcome.score > b.outcome.score) {
            best = Some(BestHit {
                index,
                rect,
                outcome,
            });
        }
    }

    Some(match best {
        Some(hit) => Located::Hit(hit),
        None => Located::Missed { reference: first },
    })
}
