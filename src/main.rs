//! Bouncy Road headless runner
//!
//! Loads a level's `data.json`, plays it through with the auto player at a
//! fixed 60 fps step and prints the resulting score.
//!
//! Usage: `bouncy-road <data.json> [seed] [settings.json]`

use std::path::PathBuf;
use std::process::ExitCode;

use bouncy_road::audio::SilentTrack;
use bouncy_road::consts::FRAME_RATE;
use bouncy_road::highscores::HighScoreEntry;
use bouncy_road::persistence::{LoadError, read_level};
use bouncy_road::sim::{AutoPlayer, InputScore, PlayState};
use bouncy_road::{HighScores, Settings};

/// Hard stop for levels without an end event
const MAX_RUN_SECONDS: f32 = 600.0;

/// Auto player jitter, seconds
const JITTER_SEC: f32 = 0.03;
const MISS_CHANCE: f64 = 0.02;

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error("usage: bouncy-road <data.json> [seed] [settings.json]")]
    Usage,
    #[error("invalid seed `{0}`")]
    Seed(String),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Settings(#[from] bouncy_road::settings::SettingsError),
}

fn run() -> Result<(), RunError> {
    let mut args = std::env::args().skip(1);
    let level_path = PathBuf::from(args.next().ok_or(RunError::Usage)?);
    let seed = match args.next() {
        Some(s) => s.parse::<u64>().map_err(|_| RunError::Seed(s))?,
        None => 0,
    };
    let settings = match args.next() {
        Some(path) => Settings::load(&PathBuf::from(path))?,
        None => Settings::default(),
    };

    let level = read_level(&level_path)?;
    let mut engine = level.build_engine(Box::new(SilentTrack::new(MAX_RUN_SECONDS, false)))?;
    engine.apply_settings(&settings);

    let mut player = AutoPlayer::new(seed, JITTER_SEC, MISS_CHANCE);
    let dt = 1.0 / FRAME_RATE;
    let mut elapsed = 0.0;

    engine.set_play_state(PlayState::Playing);
    while engine.play_state() == PlayState::Playing && elapsed < MAX_RUN_SECONDS {
        engine.update(dt);
        player.drive(&mut engine);
        elapsed += dt;
    }
    engine.set_play_state(PlayState::Stopped);

    let score = engine.compute_score();
    let results = engine.input_results();
    let count = |s: InputScore| results.iter().filter(|r| r.score == s).count();
    log::info!(
        "Finished at {:.2}s: {} presses, {} expected",
        elapsed,
        results.len(),
        engine.expected_input_count()
    );

    println!("Score: {:.1}%", score);
    println!(
        "Ace {}  Good {}  Barely {}  Miss {}",
        count(InputScore::Ace),
        count(InputScore::Good),
        count(InputScore::Barely),
        count(InputScore::Miss)
    );

    let scores_path = level_path.with_file_name("highscores.json");
    let mut scores = HighScores::load(&scores_path);
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as f64)
        .unwrap_or(0.0);
    if let Some(rank) = scores.add(HighScoreEntry::from_results(score, results, timestamp)) {
        println!("New high score, rank {}", rank);
        if let Err(e) = scores.save(&scores_path) {
            log::warn!("Could not save high scores: {}", e);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
