// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "barcode-scanner")]
#[command(about = "Scan barcodes with a camera")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Replay these images as a virtual camera instead of using hardware
    #[arg(long = "virtual", value_name = "IMAGE", num_args = 1.., global = true)]
    virtual_images: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Scan one barcode with the camera (Ctrl-C cancels)
    Scan {
        /// Prefer the front-facing camera
        #[arg(long)]
        front: bool,

        /// Spend more time per frame looking for a code
        #[arg(long)]
        try_harder: bool,

        /// Only accept these formats (e.g. QR_CODE,EAN_13)
        #[arg(long, value_delimiter = ',')]
        formats: Option<Vec<String>>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode a barcode from an image file
    Decode {
        image: PathBuf,

        /// Spend more time looking for a code
        #[arg(long)]
        try_harder: bool,

        /// Only accept these formats (e.g. QR_CODE,EAN_13)
        #[arg(long, value_delimiter = ',')]
        formats: Option<Vec<String>>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control the log level, e.g. RUST_LOG=barcode_scanner=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => cli::list_cameras(&cli.virtual_images),
        Commands::Scan {
            front,
            try_harder,
            formats,
            json,
        } => cli::scan(
            cli::ScanArgs {
                front,
                try_harder,
                formats,
                json,
            },
            &cli.virtual_images,
        ),
        Commands::Decode {
            image,
            try_harder,
            formats,
            json,
        } => cli::decode_image(cli::DecodeArgs {
            image,
            try_harder,
            formats,
            json,
        }),
    }
}
