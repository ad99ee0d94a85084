mod app;
mod config;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use photosync_slideshow::{DEFAULT_FRAME_DURATION, Quality, SlideshowRequest, create_slideshow};
use tracing_subscriber::EnvFilter;

use config::DaemonConfig;

/// PhotoSync server daemon.
#[derive(Debug, Parser)]
#[command(name = "photosyncd", version, about)]
struct Cli {
    /// Path to the JSON config file.
    #[arg(short = 'f', long = "config", default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build a slideshow video from selected thumbnails and exit.
    Slideshow(SlideshowArgs),
}

#[derive(Debug, Args)]
struct SlideshowArgs {
    /// Phone directory holding the originals.
    #[arg(long)]
    dir: PathBuf,

    /// Output name; the video is written as `<dir>/<name>.mp4`.
    #[arg(long)]
    name: String,

    /// Seconds per photo.
    #[arg(long, default_value_t = DEFAULT_FRAME_DURATION)]
    duration: f64,

    /// high, medium or low.
    #[arg(long, default_value = "medium")]
    quality: Quality,

    /// Background track under the configured music directory.
    #[arg(long)]
    music: Option<String>,

    /// Thumbnail names, in display order.
    #[arg(required = true)]
    thumbnails: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = DaemonConfig::load(&cli.config)?;

    match cli.command {
        Some(Command::Slideshow(args)) => {
            let request = SlideshowRequest {
                name: args.name,
                thumbnails: args.thumbnails,
                frame_duration: args.duration,
                quality: args.quality,
                music: args.music,
            };
            let output = create_slideshow(&args.dir, &request, &config.slideshow_settings()).await?;
            println!("{}", output.display());
            Ok(())
        }
        None => {
            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                server_name = %config.server_name,
                "starting photosyncd"
            );
            app::run(config).await
        }
    }
}
