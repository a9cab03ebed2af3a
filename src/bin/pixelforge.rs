#![deny(unsafe_code)]
#![warn(
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice
)]

use std::{
    fmt::Display,
    net::{IpAddr, Ipv4Addr},
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use pixelforge::{
    codec,
    service::{ExtractParams, PaletteClient, PaletteServer, ServiceConfig, DEFAULT_PORT},
    PaletteOrder, PalettePipeline,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum CliOrder {
    Hue,
    Lightness,
}

impl From<CliOrder> for PaletteOrder {
    fn from(value: CliOrder) -> Self {
        match value {
            CliOrder::Hue => PaletteOrder::HueLightness,
            CliOrder::Lightness => PaletteOrder::LightnessSaturationHue,
        }
    }
}

impl Display for CliOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                CliOrder::Hue => "hue",
                CliOrder::Lightness => "lightness",
            }
        )
    }
}

/// Palette image parameters. Zero means the default.
#[derive(Args, Debug, Clone, Copy)]
struct PaletteArgs {
    /// Number of color tiles per row (default 3)
    #[arg(long, default_value_t = 0)]
    colors_per_row: u32,

    /// Width of each color tile in pixels (default 50)
    #[arg(long, default_value_t = 0)]
    width: u32,

    /// Height of each color tile in pixels (default 50)
    #[arg(long, default_value_t = 0)]
    height: u32,

    /// Keep only the first N colors of the ordered palette (0 keeps all)
    #[arg(long, default_value_t = 0)]
    colors_num: u32,
}

impl From<PaletteArgs> for ExtractParams {
    fn from(args: PaletteArgs) -> Self {
        Self {
            colors_per_row: args.colors_per_row,
            tile_width: args.width,
            tile_height: args.height,
            color_count: args.colors_num,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the color palette of an image and save it as a PNG
    ExtractPalette {
        #[arg(long)]
        input_image: PathBuf,

        #[arg(long)]
        output_image: PathBuf,

        #[command(flatten)]
        palette: PaletteArgs,

        #[arg(long, default_value_t = CliOrder::Hue)]
        order: CliOrder,

        /// Maximum number of scanner threads (0 uses the default of 32)
        #[arg(long, default_value_t = 0)]
        workers: usize,
    },
    /// Run the streaming palette service
    Serve {
        #[arg(long, env = "PIXELFORGE_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
        host: IpAddr,

        #[arg(long, env = "PIXELFORGE_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Size of the palette image chunks sent back to clients
        #[arg(long, default_value_t = ServiceConfig::new().chunk_size)]
        chunk_size: usize,

        /// Largest accepted upload in bytes
        #[arg(long, default_value_t = ServiceConfig::new().max_upload)]
        max_upload: usize,

        /// Largest palette image rendered for a request, in pixels
        #[arg(long, default_value_t = ServiceConfig::new().max_output_pixels)]
        max_output_pixels: u64,
    },
    /// Send an image to a running palette service and save the returned palette image
    Remote {
        #[arg(long, default_value = "127.0.0.1:9090")]
        addr: String,

        #[arg(long)]
        input_image: PathBuf,

        #[arg(long)]
        output_image: PathBuf,

        #[command(flatten)]
        palette: PaletteArgs,

        /// Size of the upload chunks
        #[arg(long, default_value_t = ServiceConfig::new().chunk_size)]
        chunk_size: usize,
    },
}

#[derive(Parser, Debug)]
#[command(name = "pixelforge", version, about = "Extracts the distinct color palette of an image")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    let Cli { command } = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match command {
        Command::ExtractPalette {
            input_image,
            output_image,
            palette,
            order,
            workers,
        } => extract(&input_image, &output_image, palette, order.into(), workers),
        Command::Serve {
            host,
            port,
            chunk_size,
            max_upload,
            max_output_pixels,
        } => {
            let config = ServiceConfig {
                host,
                port,
                chunk_size,
                max_upload,
                max_output_pixels,
                ..ServiceConfig::default()
            };
            runtime()?.block_on(serve(config))
        }
        Command::Remote {
            addr,
            input_image,
            output_image,
            palette,
            chunk_size,
        } => runtime()?.block_on(remote(&addr, &input_image, &output_image, palette, chunk_size)),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")
}

fn extract(
    input: &Path,
    output: &Path,
    args: PaletteArgs,
    order: PaletteOrder,
    workers: usize,
) -> Result<()> {
    let time = Instant::now();
    let image = codec::load(input)?.into_rgba8();

    let pipeline = PalettePipeline::new(&image)
        .colors_per_row(args.colors_per_row)
        .tile_size(args.width, args.height)
        .max_colors(args.colors_num as usize)
        .order(order)
        .max_workers(workers);

    #[cfg(feature = "threads")]
    let palette = pipeline.palette_image_par();
    #[cfg(not(feature = "threads"))]
    let palette = pipeline.palette_image();

    let palette = palette.with_context(|| format!("cannot forge a palette from {}", input.display()))?;
    codec::save_png(&palette, output)?;

    info!(
        input = %input.display(),
        output = %output.display(),
        width = palette.width(),
        height = palette.height(),
        elapsed = ?time.elapsed(),
        "palette saved"
    );
    Ok(())
}

async fn serve(config: ServiceConfig) -> Result<()> {
    let server = PaletteServer::bind(config)
        .await
        .with_context(|| format!("failed to listen on {}", config.addr()))?;

    server
        .serve_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
    Ok(())
}

async fn remote(
    addr: &str,
    input: &Path,
    output: &Path,
    args: PaletteArgs,
    chunk_size: usize,
) -> Result<()> {
    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("failed to read {}", input.display()))?;

    let file_name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let format = input
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let response = PaletteClient::connect(addr)
        .await
        .with_context(|| format!("failed to connect to {addr}"))?
        .chunk_size(chunk_size)
        .extract_palette(&bytes, &file_name, &format, args.into())
        .await
        .context("palette request failed")?;

    tokio::fs::write(output, &response.palette_bytes)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!(
        output = %output.display(),
        bytes = response.palette_bytes.len(),
        format = %response.format,
        "palette received"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn extract_palette_flags() {
        let cli = Cli::try_parse_from([
            "pixelforge",
            "extract-palette",
            "--input-image",
            "in.png",
            "--output-image",
            "out.png",
            "--colors-per-row",
            "4",
            "--colors-num",
            "12",
            "--order",
            "lightness",
        ])
        .unwrap();

        let Command::ExtractPalette { input_image, palette, order, workers, .. } = cli.command else {
            panic!("wrong subcommand");
        };
        assert_eq!(input_image, PathBuf::from("in.png"));
        assert_eq!(palette.colors_per_row, 4);
        assert_eq!(palette.width, 0);
        assert_eq!(palette.colors_num, 12);
        assert_eq!(order, CliOrder::Lightness);
        assert_eq!(workers, 0);
    }

    #[test]
    fn rejects_non_numeric_values() {
        for flag in ["--colors-per-row", "--width", "--height", "--colors-num"] {
            let result = Cli::try_parse_from([
                "pixelforge",
                "extract-palette",
                "--input-image",
                "in.png",
                "--output-image",
                "out.png",
                flag,
                "many",
            ]);
            assert!(result.is_err(), "{flag} accepted a non-numeric value");
        }
    }

    #[test]
    fn serve_flags() {
        let cli = Cli::try_parse_from(["pixelforge", "serve", "--port", "0", "--max-output-pixels", "100"])
            .unwrap();
        let Command::Serve { port, max_output_pixels, max_upload, .. } = cli.command else {
            panic!("wrong subcommand");
        };
        assert_eq!(port, 0);
        assert_eq!(max_output_pixels, 100);
        assert_eq!(max_upload, ServiceConfig::new().max_upload);
    }

    #[test]
    fn requires_paths() {
        assert!(Cli::try_parse_from(["pixelforge", "extract-palette", "--input-image", "in.png"]).is_err());
    }
}
