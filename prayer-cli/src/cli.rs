use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{Select, Text};
use prayer_core::{
    Clock, Config, CountdownDisplay, FileStore, Host, KeyValueStore, Language, Location, MemoryStore,
    PrayerApp, ReqwestTransport, SystemClock, ViewSignal, refresh::spawn_auto_refresh,
};
use std::{io::Write, sync::Arc};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::watch,
};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::terminal::{Terminal, render_next};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "prayer", version, about = "Islamic prayer times for your location")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Choose display language and optionally pin a location.
    Configure,

    /// Print the path of the config file.
    ConfigPath,

    /// Show today's prayer times.
    Show {
        /// Ignore today's cached times and fetch again.
        #[arg(long)]
        refresh: bool,
    },

    /// Show the next prayer and the time left until it.
    Next,

    /// Live countdown with notifications. Type `r` to refresh, `c` to clear the
    /// cache and refresh, `q` to quit.
    Watch,

    /// Fetch today's prayer times again.
    Refresh,

    /// Forget the cached location and times, then fetch again.
    ClearCache,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::ConfigPath => {
                println!("{}", Config::config_file_path()?.display());
                Ok(())
            }
            Command::Show { refresh } => {
                let app = build_app(true)?;
                app.handle_view_signal(ViewSignal::Ready).await;
                if refresh {
                    app.refresh_now().await;
                } else {
                    app.load().await;
                }
                if let Some(location) = app.location() {
                    println!("{location}");
                }
                Ok(())
            }
            Command::Next => {
                let app = build_app(false)?;
                let result = app.load().await;
                println!("{}", render_next(&result, app.language(), &app.clock().now()));
                Ok(())
            }
            Command::Refresh => {
                let app = build_app(true)?;
                app.handle_view_signal(ViewSignal::Ready).await;
                app.refresh_now().await;
                Ok(())
            }
            Command::ClearCache => {
                let app = build_app(true)?;
                app.handle_view_signal(ViewSignal::Ready).await;
                app.clear_cache_and_refresh().await;
                Ok(())
            }
            Command::Watch => run_watch(Arc::new(build_app(true)?)).await,
        }
    }
}

fn build_app(show_panel: bool) -> anyhow::Result<PrayerApp> {
    let config = Config::load()?;
    let store: Arc<dyn KeyValueStore> = match FileStore::open_default() {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %e, "no data directory, caching in memory only");
            Arc::new(MemoryStore::new())
        }
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let terminal = Arc::new(Terminal::new(config.language, show_panel, clock.clone()));

    let host = Host {
        store,
        transport: Arc::new(ReqwestTransport::new()),
        clock,
        view: terminal.clone(),
        notices: terminal,
    };

    Ok(PrayerApp::new(config, host))
}

async fn run_watch(app: Arc<PrayerApp>) -> anyhow::Result<()> {
    let language = app.language();
    let cancel = CancellationToken::new();

    let (display_tx, mut display_rx) = watch::channel(CountdownDisplay::Loading);
    let (countdown, notifier) = app.start_countdown(display_tx, cancel.clone());
    let refresher = spawn_auto_refresh(app.clone(), app.clock(), cancel.clone());

    app.handle_view_signal(ViewSignal::Ready).await;
    app.load().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = display_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let text = display_rx.borrow_and_update().status_text(language);
                let mut out = std::io::stdout().lock();
                let _ = write!(out, "\r\x1b[2K🕐 {text}");
                let _ = out.flush();
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.trim() {
                    "r" => {
                        let app = app.clone();
                        tokio::spawn(async move { app.refresh_now().await });
                    }
                    "c" => {
                        let app = app.clone();
                        tokio::spawn(async move { app.clear_cache_and_refresh().await });
                    }
                    "q" => break,
                    _ => {}
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "failed to read from stdin");
                    stdin_open = false;
                }
            },
        }
    }

    cancel.cancel();
    countdown.join().await;
    let _ = refresher.await;
    let _ = notifier.await;
    println!();

    Ok(())
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let language = Select::new("Display language:", Language::all().to_vec())
        .with_starting_cursor(Language::all().iter().position(|l| *l == config.language).unwrap_or(0))
        .prompt()
        .context("Language selection was cancelled")?;
    config.language = language;

    let current = config.location.clone();
    let country = Text::new("Country (leave empty to detect from IP):")
        .with_initial_value(current.as_ref().map(|l| l.country.as_str()).unwrap_or(""))
        .prompt()
        .context("Location entry was cancelled")?;

    let location = if country.trim().is_empty() {
        None
    } else {
        let city = Text::new("City:")
            .with_initial_value(current.as_ref().map(|l| l.city.as_str()).unwrap_or(""))
            .prompt()
            .context("Location entry was cancelled")?;
        anyhow::ensure!(!city.trim().is_empty(), "A city is required when a country is given");
        Some(Location::new(country.trim(), city.trim()))
    };
    config.set_location(location);

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());

    Ok(())
}
