//! Terminal dashboard for binwatch that monitors waste bin fill levels, predicts
//! overflows, and routes the operator to a bin.

mod app;
mod config;
mod input;
mod ui;

use std::{
    fs::OpenOptions,
    io,
    path::Path,
    sync::{Arc, Mutex},
    time::{Duration as StdDuration, Instant},
};

use anyhow::Result;
use binwatch_core::{Backend, BinwatchService, ChangeSubscription, PortError};
use binwatch_provider_osrm as osrm;
use binwatch_provider_supabase as supabase;
use chrono::Utc;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use reqwest::Client;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::{ActiveRoute, App, Screen};
use crate::config::Config;
use crate::input::Action;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log_file)?;

    // HTTP + service setup
    let client = Client::builder().user_agent("binwatch/0.1").build()?;

    let supabase = supabase::ports(client.clone(), config.supabase.clone());
    let routing = osrm::port(client, &config.osrm_url);
    let backend = Backend::new(supabase.registry, supabase.change_feed, routing);
    let service = Arc::new(BinwatchService::new(backend, config.prediction));

    tracing::info!(
        registry = config.supabase.is_configured(),
        origin = config.origin.is_some(),
        "starting binwatch"
    );

    // App state
    let mut app = App::new(Arc::clone(&service), config.origin);
    if let Err(err) = service.refresh().await {
        tracing::warn!(error = %err, "initial fetch failed");
        app.notify_error("Failed to fetch bins");
    }
    let subscription = match service.subscribe_changes().await {
        Ok(subscription) => {
            app.live_updates = true;
            Some(subscription)
        }
        Err(err) => {
            tracing::warn!(error = %err, "live updates unavailable");
            app.notify_error(format!("Live updates unavailable: {err}"));
            None
        }
    };

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run event loop
    let res = run(&mut terminal, app, subscription).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res
}

// The terminal belongs to the UI, so logs go to a file.
fn init_tracing(path: &Path) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .init();
    Ok(())
}

async fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App,
    mut subscription: Option<ChangeSubscription>,
) -> Result<()> {
    loop {
        app.sync_store();
        app.prune_toasts(Instant::now());

        // Draw current UI
        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Poll for input (non-blocking, small timeout to keep CPU low)
        if event::poll(StdDuration::from_millis(100))?
            && let CEvent::Key(key) = event::read()?
        {
            let action = input::handle_key_event(key, &mut app);

            match action {
                Action::Quit => break,
                Action::None => {}
                Action::LocateUser => {
                    locate_user(&mut app);
                }
                slow => {
                    app.is_busy = true;
                    terminal.draw(|frame| ui::draw(frame, &app))?;

                    perform(&mut app, slow).await;

                    app.is_busy = false;
                }
            }
        }

        if let Some(feed) = subscription.as_mut() {
            match drain_changes(feed) {
                Ok(0) => {}
                Ok(count) => {
                    tracing::debug!(count, "registry changed, refreshing");
                    if let Err(err) = app.service.refresh().await {
                        tracing::warn!(error = %err, "refresh after change failed");
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "change feed stopped");
                    app.notify_error("Live updates stopped");
                    app.live_updates = false;
                    subscription = None;
                }
            }
        }
    }

    Ok(())
}

/// Number of pending change events, consumed without waiting.
fn drain_changes(feed: &mut ChangeSubscription) -> Result<usize, PortError> {
    let mut count = 0;
    while let Some(event) = feed.try_next()? {
        tracing::trace!(kind = ?event.kind, id = ?event.id, "change event");
        count += 1;
    }
    Ok(count)
}

async fn perform(app: &mut App, action: Action) {
    match action {
        Action::Refresh => {
            if app.service.refresh().await.is_err() {
                app.notify_error("Failed to fetch bins");
            }
        }
        Action::SubmitNewBin => {
            let new_bin = match app.form.parse() {
                Ok(new_bin) => new_bin,
                Err(err) => {
                    app.notify_error(err.to_string());
                    return;
                }
            };

            match app.service.add_bin(&new_bin).await {
                Ok(()) => {
                    app.notify_success("Bin added successfully");
                    app.form = app::AddBinForm::default();
                    app.screen = Screen::Dashboard;
                }
                Err(err) => app.notify_error(format!("Failed to add bin: {err}")),
            }
        }
        Action::CollectSelected => {
            let Some(id) = app.selected_bin().map(|bin| bin.id.clone()) else {
                app.notify_error("Select a bin first");
                return;
            };

            match app.service.mark_collected(&id, Utc::now()).await {
                Ok(()) => app.notify_success("Bin marked as collected"),
                Err(err) => {
                    tracing::warn!(%id, error = %err, "collection update failed");
                    app.notify_error("Failed to mark bin as collected");
                }
            }
        }
        Action::DeleteSelected => {
            let Some(id) = app.selected_bin().map(|bin| bin.id.clone()) else {
                app.notify_error("Select a bin first");
                return;
            };

            match app.service.delete_bin(&id).await {
                Ok(()) => app.notify_success("Bin deleted successfully"),
                Err(err) => {
                    tracing::warn!(%id, error = %err, "delete failed");
                    app.notify_error("Failed to delete bin");
                }
            }
        }
        Action::RouteToSelected => {
            let Some(target) = app.selected_bin().cloned() else {
                app.notify_error("Select a bin first");
                return;
            };

            if app.user_location().is_none() {
                app.notify_error("Please enable your location first");
                if !locate_user(app) {
                    return;
                }
            }
            let Some(origin) = app.user_location() else {
                return;
            };

            match app.service.route_to(origin, &target).await {
                Ok(route) => {
                    app.notify_success(route.summary());
                    app.route = Some(ActiveRoute {
                        bin: target,
                        origin,
                        route,
                    });
                    app.screen = Screen::Route;
                }
                Err(err) => app.notify_error(format!("Failed to find route: {err}")),
            }
        }
        Action::None | Action::Quit | Action::LocateUser => {}
    }
}

/// Enable the configured operator position. Returns whether one is available.
fn locate_user(app: &mut App) -> bool {
    if app.origin.is_some() {
        app.location_enabled = true;
        app.notify_success("Location detected successfully");
        true
    } else {
        app.notify_error("Unable to detect your location. Set BINWATCH_ORIGIN=lat,lon");
        false
    }
}
