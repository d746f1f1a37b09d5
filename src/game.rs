use crate::config::Config;
use crate::error::{Error, Result};
use crate::mastery::{self, RatingUpdate};
use crate::pronunciation::{self, PronunciationOutcome};
use crate::spatial::{self, Located, Rect, TapPoint, DEFAULT_TOLERANCE};
use crate::store::{FeatureType, NewAttempt, ProgressDb};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub tap_tolerance: f64,
    pub track_progress: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tap_tolerance: DEFAULT_TOLERANCE,
            track_progress: true,
        }
    }
}

impl From<&Config> for Settings {
    fn from(cfg: &Config) -> Self {
        Self {
            tap_tolerance: cfg.tap_tolerance,
            track_progress: cfg.track_progress,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SayWordResult {
    #[serde(flatten)]
    pub outcome: PronunciationOutcome,
    pub target_word: String,
    pub spoken_text: String,
    pub attempt_id: Option<String>,
    pub progress: Option<RatingUpdate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindObjectResult {
    pub is_correct: bool,
    pub score: u8,
    pub feedback: String,
    /// Only filled on a miss, so the answer can be shown
    pub correct_location: Option<Rect>,
    pub attempt_id: Option<String>,
    pub progress: Option<RatingUpdate>,
}

/// Runs single attempts through the scorers and, when a database is
/// attached, records them and feeds the mastery tracker.
#[derive(Debug)]
pub struct Game {
    pub settings: Settings,
    db: Option<ProgressDb>,
}

impl Game {
    pub fn with_db(settings: Settings, db: ProgressDb) -> Self {
        Self {
            settings,
            db: Some(db),
        }
    }

    pub fn without_db(settings: Settings) -> Self {
        Self { settings, db: None }
    }

    pub fn db(&self) -> Option<&ProgressDb> {
        self.db.as_ref()
    }

    pub fn say_word(
        &mut self,
        player_id: &str,
        object_id: &str,
        target: &str,
        spoken: &str,
    ) -> Result<SayWordResult> {
        let outcome = pronunciation::score_pronunciation(target, spoken);
        tracing::debug!(
            player_id,
            object_id,
            score = outcome.score,
            is_correct = outcome.is_correct,
            "scored pronunciation"
        );

        let attempt = NewAttempt {
            player_id: player_id.to_string(),
            object_id: object_id.to_string(),
            feature: FeatureType::SayWord,
            score: outcome.score,
            spoken_text: Some(spoken.to_string()),
            tap: None,
            is_correct: outcome.is_correct,
        };
        let rating = mastery::rating_from_score(outcome.score);
        let (attempt_id, progress) = self.persist(&attempt, rating)?;

        Ok(SayWordResult {
            outcome,
            target_word: target.to_string(),
            spoken_text: spoken.to_string(),
            attempt_id,
            progress,
        })
    }

    /// Score a tap against every target of one image.
    ///
    /// Rejects taps or targets outside the unit square and images without
    /// targets; the scorer itself never sees malformed input.
    pub fn find_object(
        &mut self,
        player_id: &str,
        object_id: &str,
        object_name: &str,
        tap: TapPoint,
        rects: &[Rect],
    ) -> Result<FindObjectResult> {
        if !tap.is_normalized() {
            return Err(Error::CoordinateOutOfRange { x: tap.x, y: tap.y });
        }
        if let Some(idx) = rects.iter().position(|r| !r.is_normalized()) {
            return Err(Error::InvalidRect(idx));
        }

        let located =
            spatial::locate_best(tap, rects, self.settings.tap_tolerance).ok_or(Error::NoTargets)?;
        let is_correct = located.is_hit();
        let score = located.score();
        tracing::debug!(player_id, object_id, score, is_correct, "scored tap");

        let (feedback, correct_location) = match located {
            Located::Hit(_) => (format!("Great job! You found the {object_name}!"), None),
            Located::Missed { reference } => (
                format!("Not quite! Try to find the {object_name}."),
                Some(*reference),
            ),
        };

        let attempt = NewAttempt {
            player_id: player_id.to_string(),
            object_id: object_id.to_string(),
            feature: FeatureType::FindObject,
            score,
            spoken_text: None,
            tap: Some(tap),
            is_correct,
        };
        let rating = mastery::rating_from_hit(is_correct, score);
        let (attempt_id, progress) = self.persist(&attempt, rating)?;

        Ok(FindObjectResult {
            is_correct,
            score,
            feedback,
            correct_location,
            attempt_id,
            progress,
        })
    }

    /// Apply an explicit rating signal. Without a database the update starts
    /// from a fresh record every time.
    pub fn rate(&mut self, player_id: &str, object_id: &str, rating: f64) -> Result<RatingUpdate> {
        match self.db.as_mut() {
            Some(db) => db.apply_rating(player_id, object_id, rating),
            None => Ok(mastery::record_rating(None, rating)),
        }
    }

    fn persist(
        &mut self,
        attempt: &NewAttempt,
        rating: f64,
    ) -> Result<(Option<String>, Option<RatingUpdate>)> {
        let Some(db) = self.db.as_mut() else {
            return Ok((None, None));
        };

        let record = db.record_attempt(attempt)?;
        let progress = if self.settings.track_progress {
            Some(db.apply_rating(&attempt.player_id, &attempt.object_id, rating)?)
        } else {
            None
        };

        Ok((Some(record.id), progress))
    }
}
