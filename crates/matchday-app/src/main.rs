// Matchday rollover job.
//
// Startup sequence:
// 1. Initialize tracing (log to file)
// 2. Load config
// 3. Open database
// 4. Import player points
// 5. Roll every manager into the open gameweek
// 6. Report results of the gameweek that just closed

use std::path::Path;

use matchday_app::config;
use matchday_app::db::Database;
use matchday_app::points_import;
use matchday_app::schedule::SeasonSchedule;
use matchday_app::service::SeasonService;
use matchday_core::sources::GameweekWindowOracle;

use anyhow::Context;
use tracing::{error, info, warn};

fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("Matchday rollover starting");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: season={}, {} gameweeks",
        config.season.name,
        config.season.deadlines.len()
    );

    // 3. Open database
    let db = Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);

    // 4. Import player points
    let points_path = Path::new(&config.data_paths.player_points);
    if points_path.exists() {
        let rows = points_import::load_player_points(points_path)
            .context("failed to load player points")?;
        let written = db
            .import_player_points(&rows)
            .context("failed to store player points")?;
        info!("Imported {} player points rows from {}", written, points_path.display());
    } else {
        warn!(
            "No player points file at {}, skipping import",
            points_path.display()
        );
    }

    // 5. Roll every manager into the open gameweek
    let schedule = SeasonSchedule::from_config(&config.season);
    let service = SeasonService::new(db, schedule);
    let Some(gameweek) = service.oracle().current_open_gameweek() else {
        info!("All deadlines have passed; nothing to roll over");
        return Ok(());
    };

    let report = service
        .start_gameweek(gameweek)
        .context("gameweek rollover failed")?;
    for (user_id, reason) in &report.failed {
        error!("Manager {} not rolled over: {}", user_id, reason);
    }

    // 6. Report results of the gameweek that just closed
    if gameweek > 1 {
        let closed = gameweek - 1;
        let scores = service
            .score_gameweek(closed)
            .context("failed to collect gameweek results")?;
        for (user_id, score) in &scores {
            info!(
                "Gameweek {} result for {}: {} ({} penalty)",
                closed, user_id, score.final_score, score.transfer_penalty
            );
        }
        info!("{} results recorded for gameweek {}", scores.len(), closed);
    }

    info!("Matchday rollover finished");
    Ok(())
}

/// Initialize tracing to log to `logs/matchday.log`.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("matchday.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("matchday=info,matchday_app=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
