// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use meeting::backends::{PlatformBackend, platform_for};
use meeting::Config;
use std::fs::File;
use std::sync::Mutex;

mod cli;

#[derive(Parser)]
#[command(name = "meeting")]
#[command(about = "Meeting room with local camera and microphone controls")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    /// Use simulated devices instead of PipeWire
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the lobby in the terminal and join from there (default)
    Join,

    /// List available cameras and microphones
    Devices,

    /// Open the camera once and report whether access works
    Probe,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let interactive = matches!(cli.command, None | Some(Commands::Join));
    init_logging(interactive);

    let mut config = Config::load();
    if cli.simulate {
        config.backend = PlatformBackend::Simulated;
    }
    let platform = platform_for(config.backend);

    match cli.command {
        Some(Commands::Devices) => cli::list_devices(platform),
        Some(Commands::Probe) => cli::probe_camera(platform, &config),
        Some(Commands::Join) | None => meeting::terminal::run(config, platform),
    }
}

/// Set RUST_LOG to control the level, e.g. RUST_LOG=meeting=debug
///
/// The terminal view owns the screen, so its logs go to a file in the
/// cache directory instead of stderr.
fn init_logging(interactive: bool) {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };

    let log_file = interactive
        .then(|| dirs::cache_dir().map(|dir| dir.join("meeting")))
        .flatten()
        .and_then(|dir| {
            std::fs::create_dir_all(&dir).ok()?;
            File::create(dir.join("meeting.log")).ok()
        });

    match log_file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init(),
        None if interactive => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::sink)
            .init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_target(true)
            .with_level(true)
            .init(),
    }
}
