use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use docuprocess::broadcast::{
    drain_notifications, Notification, NotificationKind, NotificationVariant,
};
use docuprocess::config::{
    default_config_path, load_config, load_config_or_default, Config, SessionMode,
    StaticIdentityConfig,
};
use docuprocess::session::SignInFlow;
use docuprocess::view::{initials, render_entry_line, EntryView, HistoryScreen, Tab};
use docuprocess::{telemetry, AppContext, EntryId, FileRef, Result};

#[derive(Parser)]
#[command(name = "docuprocess", version)]
#[command(about = "Upload insurance documents and review processing history", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.docuprocess/docuprocess.yaml)
    #[arg(short, long, env = "DOCUPROCESS_CONFIG")]
    config: Option<PathBuf>,

    /// Sign in as this user id, bypassing the configured session mode
    #[arg(long, env = "DOCUPROCESS_USER")]
    sign_in_as: Option<String>,

    /// Do not sign in; nothing is written to history
    #[arg(long, conflicts_with = "sign_in_as")]
    anonymous: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload and process documents
    Process {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show processing history for the signed-in user
    History,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => match default_config_path() {
            Some(path) => load_config_or_default(path)?,
            None => Config::default(),
        },
    };

    if let Some(user_id) = &cli.sign_in_as {
        config.session.mode = SessionMode::Static;
        config.session.static_identity = Some(StaticIdentityConfig {
            user_id: user_id.clone(),
            email: None,
            display_name: None,
            avatar_url: None,
        });
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    telemetry::init_tracing(&config.logging)?;

    let ctx = AppContext::init(config).await?;

    if !cli.anonymous {
        match ctx.session.sign_in().await? {
            SignInFlow::Completed(identity) => {
                let label = identity.label();
                println!("Signed in as {} [{}]", label, initials(label));
            }
            SignInFlow::Redirect { authorize_url } => {
                println!("Open this URL to sign in: {}", authorize_url);
                println!("Continuing without a session; results will not be saved to history.");
            }
        }
    }

    let outcome = match cli.command {
        Commands::Process { files } => process(&ctx, files).await,
        Commands::History => history(&ctx).await,
    };

    ctx.shutdown().await;
    outcome
}

async fn process(ctx: &AppContext, paths: Vec<PathBuf>) -> Result<()> {
    println!("== {} ==", Tab::Upload.label());

    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        match FileRef::from_path(path) {
            Ok(file) => files.push(file),
            Err(e) => eprintln!("Skipping {}: {}", path.display(), e),
        }
    }

    let mut events = ctx.uploads.subscribe();
    let mut notifications = ctx.uploads.notifications();
    let outcome = ctx.uploads.submit_files(files)?;
    for rejection in &outcome.rejected {
        print_notification(&Notification::rejected(rejection));
    }

    let mut pending: HashSet<EntryId> = outcome.accepted.into_iter().collect();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while !pending.is_empty() {
        tokio::select! {
            _ = &mut ctrl_c => {
                println!("Interrupted, cancelling remaining uploads");
                return Ok(());
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(entry) = ctx.uploads.entry(&event.entry_id) {
                        println!("{}", render_entry_line(&EntryView::from_entry(&entry)));
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Progress output fell behind"),
                Err(RecvError::Closed) => break,
            },
            notification = notifications.recv() => match notification {
                Ok(notification) => print_lifecycle_notification(&notification),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Notification output fell behind"),
                Err(RecvError::Closed) => break,
            },
        }

        pending.retain(|id| {
            ctx.uploads
                .entry(id)
                .is_some_and(|entry| !entry.status.is_terminal())
        });
    }

    // History inserts may still be running and can raise their own notifications.
    ctx.uploads.wait_idle().await;
    for notification in drain_notifications(&mut notifications) {
        print_lifecycle_notification(&notification);
    }

    println!();
    for entry in ctx.uploads.entries() {
        println!("{}", render_entry_line(&EntryView::from_entry(&entry)));
    }
    Ok(())
}

async fn history(ctx: &AppContext) -> Result<()> {
    println!("== {} ==", Tab::History.label());

    let identity = ctx.session.current_identity();
    let view = ctx.history.load_history(identity.as_ref()).await;

    match HistoryScreen::from_view(&view) {
        HistoryScreen::SignInRequired => println!("Sign in to view your processing history."),
        HistoryScreen::Loading => println!("Loading..."),
        HistoryScreen::Failed(error) => println!("Could not load history: {}", error),
        HistoryScreen::Empty => {
            println!("No processing history yet");
            println!("Upload some documents to see your processing history here.");
        }
        HistoryScreen::Items { heading, items } => {
            println!("Recent Processing Activity ({})", heading);
            for item in items {
                let anomaly = if item.anomaly { "  anomaly" } else { "" };
                println!(
                    "{:<20} {:<20} {:<10} {}{}",
                    item.processed_at, item.document_type, item.status, item.title, anomaly
                );
            }
        }
    }
    Ok(())
}

/// Rejections are printed from the submit outcome, so they are skipped here.
fn print_lifecycle_notification(notification: &Notification) {
    if notification.kind != NotificationKind::Rejected {
        print_notification(notification);
    }
}

fn print_notification(notification: &Notification) {
    let marker = match notification.variant {
        NotificationVariant::Default => "*",
        NotificationVariant::Destructive => "!",
    };
    println!(
        "{} {}: {}",
        marker, notification.title, notification.description
    );
}
