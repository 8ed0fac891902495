// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stop check-in CLI
//!
//! Rider-side front end for the check-in core: log in with an ID token,
//! scan stop codes, and view trip history and the leaderboard.

use std::sync::Arc;

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stop_checkin::{
    config::Config,
    db::{FileStateStore, StateStore},
    error::AppError,
    models::{PunchRecord, TripState},
    scan::Detection,
    services::{CheckinMachine, CheckinOutcome, HttpRecordApi, LeaderboardError, RecordApi},
    session::Session,
    time_utils::{format_utc_rfc3339, Clock, SystemClock},
    AppState,
};

#[derive(Parser)]
#[command(name = "stop-checkin", version, about = "Check in at bus stops by scanning QR codes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the identity provider login URL
    LoginUrl,
    /// Store an ID token obtained from the identity provider
    Login {
        #[arg(long, env = "CHECKIN_ID_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// Show the logged-in rider
    Whoami,
    /// Show the current trip state
    Status,
    /// Scan one code at a stop
    Scan {
        /// Stop the rider is at
        #[arg(long)]
        stop: String,
        /// Raw scanned payload
        payload: String,
    },
    /// Read scanner frames from stdin, one payload per line
    Watch {
        #[arg(long)]
        stop: String,
    },
    /// Show trip history grouped by day
    History,
    /// Show the leaderboard
    Ranking,
    /// Log out and clear local state
    Logout,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    init_logging(config.log_json);

    let store: Arc<dyn StateStore> = Arc::new(FileStateStore::new(&config.state_path));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let api: Arc<dyn RecordApi> = Arc::new(
        HttpRecordApi::from_config(&config).context("Failed to create record API client")?,
    );
    tracing::debug!(base_url = %config.record_api_base_url, "Record API configured");

    let open = || {
        AppState::open(&config, Arc::clone(&api), Arc::clone(&store), Arc::clone(&clock))
            .map_err(report)
    };

    match cli.command {
        Command::LoginUrl => {
            let ui = config
                .hosted_ui()
                .context("COGNITO_DOMAIN, COGNITO_APP_CLIENT_ID and COGNITO_REDIRECT_URI must be set")?;
            println!("{}", ui.login_url());
        }
        Command::Login { token } => {
            let session = Session::login(&token, Arc::clone(&store), Arc::clone(&clock))
                .map_err(report)?;
            println!("Logged in as {}", session.user_id());
        }
        Command::Whoami => {
            let state = open()?;
            let identity = state.session.identity();
            println!("user id: {}", identity.user_id);
            if let Some(email) = &identity.email {
                println!("email:   {}", email);
            }
            if let Some(exp) = identity.expires_at {
                println!("expires: {}", format_utc_rfc3339(exp));
            }
        }
        Command::Status => print_trip_state(&open()?.checkin.trip_state()),
        Command::Scan { stop, payload } => {
            let state = open()?;
            state.checkin.select_stop(&stop).map_err(report)?;
            let outcome = state
                .checkin
                .receive_detections(&[Detection::new(payload)])
                .await;
            print_outcome(outcome);
        }
        Command::Watch { stop } => watch(open()?.checkin, &stop).await?,
        Command::History => {
            let state = open()?;
            state.reconciler.refresh().await.map_err(report)?;
            print_history(&state);
        }
        Command::Ranking => match open()?.leaderboard.load().await {
            Ok(board) => {
                for (position, entry) in board.ranked() {
                    let medal = match position {
                        1 => "🥇",
                        2 => "🥈",
                        3 => "🥉",
                        _ => "  ",
                    };
                    println!(
                        "{} {:>3}. {:<16} {} trips",
                        medal,
                        position,
                        entry.display_user_id(),
                        entry.count
                    );
                }
            }
            Err(LeaderboardError::Empty) => println!("No leaderboard data yet"),
            Err(LeaderboardError::Load(e)) => return Err(report(e)),
        },
        Command::Logout => {
            match Session::open(Arc::clone(&store), Arc::clone(&clock)) {
                Ok(session) => session.logout()?,
                // Nothing valid to end; still wipe whatever is left.
                Err(_) => store.clear()?,
            }
            println!("Logged out");
            if let Some(url) = config.hosted_ui().and_then(|ui| ui.logout_url()) {
                println!("Finish signing out at: {}", url);
            }
        }
    }

    Ok(())
}

/// Feed each stdin line to the machine as a scanner frame.
///
/// Frames are processed concurrently, so repeats of a code that arrive while
/// the first is in flight or cooling down are dropped.
async fn watch(checkin: Arc<CheckinMachine>, stop: &str) -> anyhow::Result<()> {
    checkin.select_stop(stop).map_err(report)?;
    println!("Scanning at {} (one payload per line, Ctrl-D to stop)", stop);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();

    while let Some(line) = lines.next_line().await? {
        let checkin = Arc::clone(&checkin);
        tasks.spawn(async move {
            let outcome = checkin.receive_detections(&[Detection::new(line)]).await;
            print_outcome(outcome);
        });
    }

    while tasks.join_next().await.is_some() {}
    Ok(())
}

fn print_outcome(outcome: Result<CheckinOutcome, AppError>) {
    match outcome {
        Ok(CheckinOutcome::Started { stop, abandoned, .. }) => {
            if let Some(old) = abandoned {
                println!(
                    "Previous trip from {} was never closed and has been left open",
                    old.start_stop
                );
            }
            println!("Trip started at {}", stop);
        }
        Ok(CheckinOutcome::Ended {
            start_stop,
            end_stop,
            ..
        }) => println!("Trip ended: {} → {}", start_stop, end_stop),
        Ok(CheckinOutcome::NoToken) => println!("Nothing scanned"),
        Ok(CheckinOutcome::Dropped) => tracing::debug!("Duplicate scan ignored"),
        Ok(CheckinOutcome::Discarded) => println!("Logged out before the check-in finished"),
        Err(e) => eprintln!("{}", e.rider_message()),
    }
}

fn print_trip_state(state: &TripState) {
    match state {
        TripState::Inactive => println!("Not on a trip"),
        TripState::Active {
            start_stop,
            started_at_millis,
        } => {
            let started = chrono::DateTime::from_timestamp_millis(*started_at_millis)
                .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| started_at_millis.to_string());
            println!("On a trip from {} since {}", start_stop, started);
        }
    }
}

fn print_history(state: &AppState) {
    let buckets = state.reconciler.buckets(&Local::now());
    if buckets.is_empty() {
        println!("No trips yet");
        return;
    }

    for (title, records) in [
        ("Today", &buckets.today),
        ("Yesterday", &buckets.yesterday),
        ("Earlier", &buckets.earlier),
    ] {
        if records.is_empty() {
            continue;
        }
        println!("{}", title);
        for record in records {
            println!("  {}", describe_record(record));
        }
    }
}

fn describe_record(record: &PunchRecord) -> String {
    let local = |t: chrono::DateTime<chrono::Utc>| {
        t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
    };
    let start = record
        .started_at()
        .map(local)
        .unwrap_or_else(|| record.start_time.clone());

    match (&record.end_stop, record.ended_at()) {
        (Some(end_stop), Some(end)) => format!(
            "{} {} → {} {}",
            start,
            record.start_stop,
            local(end),
            end_stop
        ),
        _ => format!("{} {} → (open)", start, record.start_stop),
    }
}

/// Print the rider-facing message and turn the error into a CLI failure.
fn report(e: AppError) -> anyhow::Error {
    eprintln!("{}", e.rider_message());
    anyhow::Error::new(e)
}

/// Initialize logging to stderr (JSON when `LOG_FORMAT=json`).
fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("stop_checkin=debug,info")
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_current_span(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
