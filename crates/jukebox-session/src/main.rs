use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use jukebox_session::commands::{Command, Console, Reply};
use jukebox_session::config::{self, JukeboxConfig};
use jukebox_session::events::EventBus;
use jukebox_session::loopback::LoopbackTransport;
use jukebox_session::registry::SessionRegistry;
use jukebox_session::resolver::CatalogResolver;
use jukebox_types::{SessionEvent, format_clock};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "jukebox")]
struct Args {
    /// Jukebox config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start the next queued track when one ends
    #[arg(long)]
    auto_advance: bool,

    /// Seconds to wait in an empty channel before leaving
    #[arg(long)]
    idle_grace_secs: Option<u64>,

    /// Volume for new sessions (0-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    volume: Option<u8>,
}

fn load_config(args: &Args) -> Result<JukeboxConfig> {
    match args.config.as_ref() {
        Some(path) => JukeboxConfig::load(path),
        None => {
            let auto_path = std::env::current_exe()
                .ok()
                .and_then(|path| path.parent().map(|dir| dir.join("jukebox.toml")));
            match auto_path {
                Some(path) if path.exists() => JukeboxConfig::load(&path),
                _ => {
                    tracing::warn!("no config file; catalog is empty");
                    Ok(JukeboxConfig::default())
                }
            }
        }
    }
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::NowPlaying {
            title,
            position_secs,
            requester,
            ..
        } => println!(
            "* now playing: {title} from {} (requested by {requester})",
            format_clock(*position_secs)
        ),
        SessionEvent::QueueChanged { queue_len, .. } => {
            println!("* queue: {queue_len} song(s)")
        }
        SessionEvent::LeftChannel {
            channel,
            reason,
            text_channel,
            ..
        } => println!(
            "* [{}] music stopped: left {channel} ({})",
            text_channel.as_deref().unwrap_or("-"),
            reason.as_str()
        ),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,jukebox_session=info")),
        )
        .init();

    let cfg = load_config(&args)?;
    let mut settings = config::session_settings_from_config(&cfg)?;
    if args.auto_advance {
        settings.auto_advance = true;
    }
    if let Some(secs) = args.idle_grace_secs {
        settings.idle_grace = std::time::Duration::from_secs(secs);
    }
    if let Some(volume) = args.volume {
        settings.default_volume = volume;
    }
    let console_settings = config::console_settings_from_config(&cfg);
    let catalog = config::catalog_from_config(&cfg);
    tracing::info!(
        tracks = catalog.len(),
        channel = %console_settings.voice_channel.name,
        auto_advance = settings.auto_advance,
        "jukebox starting"
    );

    let transport = Arc::new(LoopbackTransport::new(console_settings.occupants));
    let resolver = Arc::new(CatalogResolver::new(catalog));
    let events = EventBus::new();
    let mut event_rx = events.subscribe();
    let registry = SessionRegistry::start(transport.clone(), resolver, events, settings);
    let console = Console::new(registry, transport, console_settings);

    tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => print_event(&event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event printer lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::unbounded_channel::<()>();
    let _ = ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    });

    println!("{}", jukebox_session::commands::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = shutdown_rx.recv() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(jukebox_session::commands::CommandError::Empty) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        match console.execute(command).await {
            Reply::Text(text) => println!("{text}"),
            Reply::Quit => break,
        }
    }

    tracing::info!("jukebox stopped");
    Ok(())
}
