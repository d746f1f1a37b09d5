use serde::{Deserialize, Serialize};
use std::fmt;

/// Ratings at or above this count as a success
pub const SUCCESS_RATING: f64 = 4.0;
/// Consecutive non-successes after which extra help is offered
pub const HELP_AFTER_FAILURES: u32 = 3;
/// Top of the star scale that attempt scores are mapped onto
pub const MAX_RATING: f64 = 5.0;

/// Long-term progress for one (player, object) pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MasteryRecord {
    pub last_rating: f64,
    pub practice_count: u32,
    pub consecutive_failed_attempts: u32,
    pub is_learned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum MasteryState {
    Unseen,
    Practicing,
    Learned,
}

impl MasteryState {
    pub fn of(record: Option<&MasteryRecord>) -> Self {
        record.map_or(MasteryState::Unseen, MasteryRecord::state)
    }
}

impl MasteryRecord {
    pub fn state(&self) -> MasteryState {
        if self.is_learned {
            MasteryState::Learned
        } else if self.practice_count == 0 {
            MasteryState::Unseen
        } else {
            MasteryState::Practicing
        }
    }

    pub fn needs_help(&self) -> bool {
        self.consecutive_failed_attempts >= HELP_AFTER_FAILURES
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MasteryMessage {
    JustLearned,
    KeepItUp,
    OfferHelp,
    KeepTrying,
}

impl MasteryMessage {
    pub fn text(&self) -> &'static str {
        match self {
            MasteryMessage::JustLearned => "Congratulations! You learned this word!",
            MasteryMessage::KeepItUp => "Great job! Keep it up!",
            MasteryMessage::OfferHelp => "Let me help you practice this word.",
            MasteryMessage::KeepTrying => "Keep trying! You're doing great!",
        }
    }
}

impl fmt::Display for MasteryMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingUpdate {
    pub record: MasteryRecord,
    pub message: MasteryMessage,
}

/// Apply one rating signal to the stored record, or to a fresh one when
/// the pair has never been rated.
///
/// The rating always replaces `last_rating` and always bumps
/// `practice_count`. A success zeroes the failure streak and marks the object
/// learned; a non-success grows the streak and leaves `is_learned` alone, so
/// mastery is never taken back.
pub fn record_rating(existing: Option<&MasteryRecord>, rating: f64) -> RatingUpdate {
    let prev = existing.copied().unwrap_or_default();
    let mut next = MasteryRecord {
        last_rating: rating,
        practice_count: prev.practice_count.saturating_add(1),
        ..prev
    };

    let message = if rating >= SUCCESS_RATING {
        next.consecutive_failed_attempts = 0;
        next.is_learned = true;
        if prev.is_learned {
            MasteryMessage::KeepItUp
        } else {
            MasteryMessage::JustLearned
        }
    } else {
        next.consecutive_failed_attempts = prev.consecutive_failed_attempts.saturating_add(1);
        if next.needs_help() {
            MasteryMessage::OfferHelp
        } else {
            MasteryMessage::KeepTrying
        }
    };

    RatingUpdate {
        record: next,
        message,
    }
}

/// Map a 0..100 pronunciation score onto the 0..5 rating scale (80 lands on 4.0)
pub fn rating_from_score(score: u8) -> f64 {
    f64::from(score.min(100)) * MAX_RATING / 100.0
}

/// Lowest score a find-object hit can get
const MIN_HIT_SCORE: u8 = 70;

/// Map a find-object result onto the rating scale. Every hit is a success:
/// the 70..=100 hit range spreads over 4.0..=5.0. A miss rates 0.
pub fn rating_from_hit(is_hit: bool, score: u8) -> f64 {
    if !is_hit {
        return 0.0;
    }
    let above_min = score.clamp(MIN_HIT_SCORE, 100) - MIN_HIT_SCORE;
    SUCCESS_RATING
        + (MAX_RATING - SUCCESS_RATING) * f64::from(above_min) / f64::from(100 - MIN_HIT_SCORE)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterySummary {
    pub total_learned: usize,
    /// One star per learned object
    pub total_stars: usize,
    pub practiced: usize,
}

pub fn summarize<'a, I>(records: I) -> MasterySummary
where
    I: IntoIterator<Item = &'a MasteryRecord>,
{
    records
        .into_iter()
        .fold(MasterySummary::default(), |mut acc, record| {
            acc.practiced += 1;
            if record.is_learned {
                acc.total_learned += 1;
                acc.total_stars += 1;
            }
            acc
        })
}

/// Star-rating bands used when showing a rating back to the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum RatingBand {
    Perfect,
    Excellent,
    Good,
    NiceTry,
    KeepTrying,
    NotRated,
}

const RATING_BANDS: [(f64, RatingBand); 4] = [
    (4.5, RatingBand::Perfect),
    (4.0, RatingBand::Excellent),
    (3.0, RatingBand::Good),
    (2.0, RatingBand::NiceTry),
];

impl RatingBand {
    pub fn of(rating: f64) -> Self {
        RATING_BANDS
            .iter()
            .find(|(min, _)| rating >= *min)
            .map(|(_, band)| *band)
            .unwrap_or(if rating > 0.0 {
                RatingBand::KeepTrying
            } else {
                RatingBand::NotRated
            })
    }

    pub fn text(&self) -> &'static str {
        match self {
            RatingBand::Perfect => "Perfect!",
            RatingBand::Excellent => "Excellent!",
            RatingBand::Good => "Good job! Keep practicing!",
            RatingBand::NiceTry => "Nice try! Try again!",
            RatingBand::KeepTrying => "Keep trying!",
            RatingBand::NotRated => "Say the word to start",
        }
    }
}
