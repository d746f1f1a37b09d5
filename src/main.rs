use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use speakeasy::{
    config::{Config, ConfigStore, FileConfigStore},
    logging,
    mastery::{MasteryState, RatingBand},
    store::FeatureType,
    Game, ProgressDb, Rect, Settings, TapPoint,
};
use std::{error::Error, path::PathBuf};

/// scoring and progress engine for the SpeakEasy picture-naming game
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Scores spoken attempts at an object's name and taps on its location in a picture, and keeps per-object mastery so unlearned words come back and learned ones are celebrated."
)]
pub struct Cli {
    /// progress database to use instead of the configured one
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    /// config file to read instead of the platform default
    #[clap(long = "config-file", global = true)]
    config_file: Option<PathBuf>,

    /// how far the tap region reaches past each target, in normalized units
    #[clap(long, global = true)]
    tolerance: Option<f64>,

    /// do not turn attempt scores into mastery ratings
    #[clap(long, global = true)]
    no_track: bool,

    /// print a short line instead of JSON
    #[clap(long, global = true)]
    plain: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// score a transcribed attempt at saying an object's name
    Say {
        #[clap(short, long)]
        player: String,
        #[clap(short, long)]
        object: String,
        /// the object's name as shown to the player
        #[clap(short, long)]
        target: String,
        /// what the speech recognizer heard
        spoken: String,
    },
    /// score a tap against the target regions of an image
    Find {
        #[clap(short, long)]
        player: String,
        #[clap(short, long)]
        object: String,
        /// the object's name, used in feedback
        #[clap(short, long)]
        name: String,
        #[clap(long)]
        x: f64,
        #[clap(long)]
        y: f64,
        /// target region as x,y,width,height (repeatable)
        #[clap(long = "rect", value_parser = parse_rect, required = true)]
        rects: Vec<Rect>,
    },
    /// apply a rating signal (0-5) to a player's object
    Rate {
        #[clap(short, long)]
        player: String,
        #[clap(short, long)]
        object: String,
        #[clap(allow_negative_numbers = true)]
        rating: f64,
    },
    /// show mastery records for a player
    Progress {
        #[clap(short, long)]
        player: String,
        #[clap(short, long)]
        object: Option<String>,
    },
    /// learned objects and stars for a player
    Summary {
        #[clap(short, long)]
        player: String,
    },
    /// recent attempts, newest first
    History {
        #[clap(short, long)]
        player: String,
        #[clap(short, long, value_enum)]
        feature: Option<FeatureArg>,
        #[clap(long, default_value_t = 0)]
        offset: usize,
        #[clap(long, default_value_t = 100)]
        limit: usize,
    },
    /// attempt accuracy and averages for a player
    Stats {
        #[clap(short, long)]
        player: String,
    },
    /// discard every mastery record for a player
    Reset {
        #[clap(short, long)]
        player: String,
    },
    /// show the effective configuration
    Config {
        /// write the effective configuration back to the config file
        #[clap(long)]
        save: bool,
    },
}

#[derive(Debug, Copy, Clone, ValueEnum, strum_macros::Display)]
pub enum FeatureArg {
    SayWord,
    FindObject,
}

impl FeatureArg {
    fn as_feature(&self) -> FeatureType {
        match self {
            FeatureArg::SayWord => FeatureType::SayWord,
            FeatureArg::FindObject => FeatureType::FindObject,
        }
    }
}

fn parse_rect(s: &str) -> Result<Rect, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<f64>, _>>()
        .map_err(|e| format!("invalid number in rect '{s}': {e}"))?;
    match parts.as_slice() {
        [x, y, width, height] => Ok(Rect::new(*x, *y, *width, *height)),
        _ => Err(format!("expected x,y,width,height but got '{s}'")),
    }
}

impl Cli {
    /// Merge command-line overrides into the loaded configuration
    fn apply_overrides(&self, mut cfg: Config) -> Config {
        if let Some(db) = &self.db {
            cfg.database_path = Some(db.clone());
        }
        if let Some(tolerance) = self.tolerance {
            cfg.tap_tolerance = tolerance;
        }
        if self.no_track {
            cfg.track_progress = false;
        }
        cfg
    }

    fn config_store(&self) -> FileConfigStore {
        match &self.config_file {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }
}

fn open_game(cfg: &Config) -> Game {
    let settings = Settings::from(cfg);
    let path = cfg
        .database_path()
        .unwrap_or_else(ProgressDb::default_path);
    match ProgressDb::open(&path) {
        Ok(db) => Game::with_db(settings, db),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "progress database unavailable, attempts will not be saved");
            Game::without_db(settings)
        }
    }
}

fn emit<T: Serialize>(value: &T, plain: Option<String>) -> Result<(), Box<dyn Error>> {
    match plain {
        Some(line) => println!("{line}"),
        None => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let store = cli.config_store();
    let cfg = cli.apply_overrides(store.load());

    logging::init_tracing(&cfg.log_level)?;

    if let Command::Config { save } = &cli.command {
        if *save {
            store.save(&cfg)?;
            tracing::info!(path = %store.path().display(), "configuration saved");
        }
        return emit(&cfg, None);
    }

    let mut game = open_game(&cfg);
    let plain = cli.plain;

    match &cli.command {
        Command::Say {
            player,
            object,
            target,
            spoken,
        } => {
            let result = game.say_word(player, object, target, spoken)?;
            let line = plain.then(|| format!("{} ({})", result.outcome.feedback, result.outcome.score));
            emit(&result, line)?;
        }
        Command::Find {
            player,
            object,
            name,
            x,
            y,
            rects,
        } => {
            let result = game.find_object(player, object, name, TapPoint::new(*x, *y), rects)?;
            let line = plain.then(|| format!("{} ({})", result.feedback, result.score));
            emit(&result, line)?;
        }
        Command::Rate {
            player,
            object,
            rating,
        } => {
            let update = game.rate(player, object, *rating)?;
            let line = plain.then(|| {
                format!(
                    "{} [{}] practiced {} times",
                    update.message,
                    RatingBand::of(*rating).text(),
                    update.record.practice_count
                )
            });
            emit(&update, line)?;
        }
        Command::Progress { player, object } => {
            let db = game.db().ok_or("progress database unavailable")?;
            match object {
                Some(object) => {
                    let progress = db.load_progress(player, object)?;
                    let line = plain.then(|| {
                        let state = MasteryState::of(progress.as_ref().map(|p| &p.record));
                        format!("{object}: {state}")
                    });
                    emit(&progress, line)?;
                }
                None => {
                    let progress = db.list_progress(player)?;
                    let line = plain.then(|| {
                        progress
                            .iter()
                            .map(|p| format!("{}: {}", p.object_id, p.record.state()))
                            .collect::<Vec<_>>()
                            .join("\n")
                    });
                    emit(&progress, line)?;
                }
            }
        }
        Command::Summary { player } => {
            let db = game.db().ok_or("progress database unavailable")?;
            let summary = db.summary(player)?;
            let line = plain.then(|| {
                format!(
                    "{} learned, {} stars, {} practiced",
                    summary.summary.total_learned, summary.summary.total_stars, summary.summary.practiced
                )
            });
            emit(&summary, line)?;
        }
        Command::History {
            player,
            feature,
            offset,
            limit,
        } => {
            let db = game.db().ok_or("progress database unavailable")?;
            let feature = feature.as_ref().map(FeatureArg::as_feature);
            let attempts = db.attempt_history(player, feature, *offset, *limit)?;
            let line = plain.then(|| {
                attempts
                    .iter()
                    .map(|a| format!("{} {} {} {}", a.created_at.format("%F %T"), a.feature, a.object_id, a.score))
                    .collect::<Vec<_>>()
                    .join("\n")
            });
            emit(&attempts, line)?;
        }
        Command::Stats { player } => {
            let db = game.db().ok_or("progress database unavailable")?;
            let stats = db.player_stats(player)?;
            let line = plain.then(|| {
                format!(
                    "{} attempts, {}% correct, average score {}",
                    stats.total_attempts, stats.accuracy_percentage, stats.average_score
                )
            });
            emit(&stats, line)?;
        }
        Command::Reset { player } => {
            let db = game.db().ok_or("progress database unavailable")?;
            let removed = db.reset_progress(player)?;
            let line = plain.then(|| format!("Progress reset successfully ({removed} records)"));
            emit(&serde_json::json!({ "success": true, "removed": removed }), line)?;
        }
        // handled before the database is opened
        Command::Config { .. } => {}
    }

    Ok(())
}
