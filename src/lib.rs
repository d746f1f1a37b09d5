// Library surface for the CLI and integration tests.
// The scorers and the mastery tracker are pure; `store` and `game` wrap them
// with persistence.
pub mod config;
pub mod error;
pub mod game;
pub mod logging;
pub mod mastery;
pub mod pronunciation;
pub mod spatial;
pub mod store;
pub mod util;

pub use error::{Error, Result};
pub use game::{Game, Settings};
pub use mastery::{record_rating, MasteryRecord, MasteryMessage, RatingUpdate};
pub use pronunciation::{score_pronunciation, PronunciationOutcome};
pub use spatial::{check_tap_location, locate_best, Rect, TapOutcome, TapPoint};
pub use store::ProgressDb;
