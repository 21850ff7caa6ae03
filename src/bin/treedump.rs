use std::path::PathBuf;
use std::process;

use clap::Parser;

use tracing::{event, Level};

use treesync::config::Config;
use treesync::model::document::Document;
use treesync::panel::Panel;

fn setup_tracing() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .pretty()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {}", e);
    }
}

/// Prints the rows a tree panel would show for an SVG drawing.
#[derive(Parser, Debug)]
#[command(name = "treedump", version, about)]
struct Cli {
    /// Drawing to load
    input: PathBuf,

    /// Config file to use instead of the one in the XDG config directory
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print Pango markup instead of plain labels
    #[arg(long)]
    markup: bool,
}

fn main() -> process::ExitCode {
    let cli = Cli::parse();
    setup_tracing();

    let config = match &cli.config {
        Some(path) => Config::load_file(path),
        None => Config::load(),
    };

    let config = match config {
        Ok(config) => config,
        Err(error) => {
            event!(Level::WARN, %error, "falling back to default config");
            Config::default()
        },
    };

    let document = match Document::load_from_path(&cli.input) {
        Ok(document) => document,
        Err(error) => {
            eprintln!("{}: {}", cli.input.display(), error);
            return process::ExitCode::FAILURE;
        },
    };

    let panel = Panel::new(document, config);
    let mirror = panel.mirror();

    for (depth, row) in mirror.model().walk() {
        let Some(row) = mirror.model().get(row) else { continue };
        let label = if cli.markup { row.markup() } else { row.text() };
        println!("{:indent$}{}", "", label, indent = depth * 2);
    }

    process::ExitCode::SUCCESS
}
