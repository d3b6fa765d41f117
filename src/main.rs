use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use echoverse::config::AppConfig;
use echoverse::logging::init_logging;
use echoverse::metrics::MetricsCollector;
use echoverse::recording::{ReaderSource, Recorder, StopReason};
use echoverse::{
    AuthProvider, Clock, Draft, Entry, EntryId, InputValidator, Mood, Session, SledStore, SystemClock,
    UnlockMode,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Time capsule mode: entries open one year after recording, ignoring unlock dates
    #[arg(long, global = true)]
    time_capsule: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and log in
    Register {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Name shown in the header
        #[arg(short, long)]
        name: String,

        /// Password (at least 8 characters)
        #[arg(short, long)]
        password: String,
    },
    /// Log in to an existing account
    Login {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password
        #[arg(short, long)]
        password: String,
    },
    /// Log out
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Change your display name
    Profile {
        /// New display name
        #[arg(short, long)]
        name: String,
    },
    /// List the available moods
    Moods,
    /// Record a new entry
    New {
        /// Short title
        #[arg(short, long)]
        title: String,

        /// Mood emoji or label
        #[arg(short, long)]
        mood: String,

        /// Unlock date (YYYY-MM-DD or RFC 3339)
        #[arg(short, long)]
        unlock: String,

        /// Audio file to capture from, or "-" for stdin
        #[arg(short, long)]
        audio: PathBuf,

        /// MIME type of the audio
        #[arg(long, default_value = "audio/webm")]
        mime: String,
    },
    /// Show your timeline
    Timeline {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Export the audio of an unlocked entry
    Play {
        /// Entry id
        id: String,

        /// Where to write the audio
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Write a reflection on an unlocked entry
    Reflect {
        /// Entry id
        id: String,

        /// Reflection text; empty clears it
        #[arg(short, long)]
        text: String,
    },
    /// Dashboard counts and upcoming unlocks
    Stats,
}

/// Entry listing without the audio bytes
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EntrySummary<'a> {
    id: &'a str,
    title: &'a str,
    mood: Mood,
    recorded_date: DateTime<Utc>,
    unlock_date: DateTime<Utc>,
    is_unlocked: bool,
    days_until_unlock: i64,
    audio_bytes: usize,
    reflection: Option<&'a str>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    let log_file = config.logging.file_path.as_deref().map(Path::new);
    let _log_guard = init_logging(
        Some(&config.get_log_level()),
        log_file,
        config.logging.format == "json",
    )?;

    // Parse command line arguments
    let cli = Cli::parse();

    let store = SledStore::open(Path::new(&config.storage.path))
        .context("Failed to open entry store")?;
    let auth = AuthProvider::new(&store, SystemClock);
    let mode = if cli.time_capsule {
        UnlockMode::TimeCapsule
    } else {
        config.unlock_mode()
    };

    match cli.command {
        Commands::Register {
            email,
            name,
            password,
        } => {
            let user = auth.register(&email, &password, &name)?;
            println!("Welcome to EchoVerse, {}!", user.display_name);
        },
        Commands::Login { email, password } => {
            let user = auth.login(&email, &password)?;
            println!("Logged in as {} <{}>", user.display_name, user.email);
        },
        Commands::Logout => {
            auth.logout()?;
            println!("Logged out");
        },
        Commands::Whoami => match auth.current_user()? {
            Some(user) => println!("{} <{}> (since {})", user.display_name, user.email, user.created_at.date_naive()),
            None => println!("Not logged in"),
        },
        Commands::Profile { name } => {
            let user = auth.require_user()?;
            let user = auth.update_display_name(&user.id, &name)?;
            println!("Display name updated to {}", user.display_name);
        },
        Commands::Moods => {
            for mood in Mood::ALL {
                println!("{}  {}", mood.emoji(), mood.label());
            }
        },
        Commands::New {
            title,
            mood,
            unlock,
            audio,
            mime,
        } => {
            let user = auth.require_user()?;
            let mut draft = Draft {
                title,
                mood: Some(mood),
                unlock_date: Some(unlock),
                audio: None,
            };
            InputValidator::validate_before_capture(&draft, SystemClock.now())?;

            let recorder = Recorder::with_max_duration(Duration::from_secs(
                config.recording.max_duration_secs,
            ));
            draft.audio = Some(capture_audio(&recorder, &audio, mime).await?);

            let mut session = Session::start(user, &store, SystemClock, mode);
            print_notifications(&session);
            let entry = session.create_entry(draft)?;
            println!(
                "Saved \"{}\" ({}). You'll meet this voice again on {}.",
                entry.title,
                entry.id,
                entry.unlock_date.format("%B %-d, %Y")
            );
            session.end();
        },
        Commands::Timeline { json } => {
            let user = auth.require_user()?;
            let session = Session::start(user, &store, SystemClock, mode);
            let summaries: Vec<_> = session
                .entries()
                .iter()
                .map(|entry| summarize(entry, session.days_until_unlock(entry)))
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                print_notifications(&session);
                print_timeline(&summaries);
            }
            session.end();
        },
        Commands::Play { id, out } => {
            let user = auth.require_user()?;
            let session = Session::start(user, &store, SystemClock, mode);
            let audio = session.play(&EntryId(id))?;
            tokio::fs::write(&out, &audio.bytes)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!("Wrote {} bytes of {} to {}", audio.len(), audio.mime_type, out.display());
            session.end();
        },
        Commands::Reflect { id, text } => {
            let user = auth.require_user()?;
            let mut session = Session::start(user, &store, SystemClock, mode);
            session.save_reflection(&EntryId(id), &text)?;
            println!("Reflection saved");
            session.end();
        },
        Commands::Stats => {
            let user = auth.require_user()?;
            let session = Session::start(user, &store, SystemClock, mode);
            let stats = session.stats();
            println!("Total entries:  {}", stats.total);
            println!("Unlocked:       {}", stats.unlocked);
            println!("Locked:         {}", stats.locked);
            println!("This month:     {}", stats.recorded_this_month);

            let upcoming = session.upcoming_unlocks(5);
            if !upcoming.is_empty() {
                println!("\nUpcoming unlocks:");
                for item in upcoming {
                    println!("  {}  in {} days", item.entry.title, item.days_remaining);
                }
            }
            session.end();
        },
    }

    Ok(())
}

/// Capture audio from a file or stdin; Ctrl-C stops the capture
async fn capture_audio(
    recorder: &Recorder,
    path: &Path,
    mime: String,
) -> Result<echoverse::AudioPayload> {
    let stop = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    let recording = if path == Path::new("-") {
        info!("Recording from stdin; press Ctrl-C to stop");
        let source = ReaderSource::new(tokio::io::stdin()).with_mime_type(mime);
        recorder.capture(source, stop).await?
    } else {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let source = ReaderSource::new(file).with_mime_type(mime);
        recorder.capture(source, stop).await?
    };

    MetricsCollector::default().record_audio_captured(recording.payload.len());
    match recording.stop_reason {
        StopReason::TimeLimit => warn!("Recording reached the time limit and was stopped"),
        StopReason::SizeLimit => warn!("Recording exceeded the size limit"),
        StopReason::EndOfStream | StopReason::Stopped => {},
    }

    Ok(recording.payload)
}

fn summarize(entry: &Entry, days_until_unlock: i64) -> EntrySummary<'_> {
    EntrySummary {
        id: entry.id.as_str(),
        title: &entry.title,
        mood: entry.mood,
        recorded_date: entry.recorded_date,
        unlock_date: entry.unlock_date,
        is_unlocked: entry.is_unlocked,
        days_until_unlock,
        audio_bytes: entry.audio.len(),
        reflection: entry.reflection.as_deref(),
    }
}

fn print_notifications<S, C>(session: &Session<S, C>)
where
    S: echoverse::EntryStore,
    C: echoverse::Clock,
{
    let newly = session.newly_unlocked();
    match newly.len() {
        0 => {},
        1 => println!("🎉 An entry has unlocked!"),
        n => println!("🎉 {n} entries have unlocked!"),
    }
    for entry in newly {
        println!("   {} {}  ({})", entry.mood.emoji(), entry.title, entry.id);
    }
}

fn print_timeline(summaries: &[EntrySummary<'_>]) {
    let unlocked = summaries.iter().filter(|s| s.is_unlocked).count();
    println!(
        "{} entries unlocked • {} waiting to be discovered",
        unlocked,
        summaries.len() - unlocked
    );

    for summary in summaries {
        let status = if summary.is_unlocked {
            "🔓".to_string()
        } else {
            format!("🔒 {} days", summary.days_until_unlock)
        };
        println!(
            "{}  {}  {}  recorded {}  unlocks {}  {}",
            summary.id,
            summary.mood.emoji(),
            summary.title,
            summary.recorded_date.date_naive(),
            summary.unlock_date.date_naive(),
            status
        );
        if let Some(reflection) = summary.reflection {
            println!("    ↳ {reflection}");
        }
    }
}
