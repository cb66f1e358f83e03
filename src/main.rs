use clap::{Parser, Subcommand};
use picbake::process::{PipelinePaths, cleanup_output, process_images};
use picbake::{config, imaging, logging, manifest, output, process};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "picbake")]
#[command(about = "Build-time WebP transcoding and cache-busting for static sites")]
#[command(long_about = "\
Build-time WebP transcoding and cache-busting for static sites

Run after the site build. Every image in the source directory is scaled to
fit the maximum edge, encoded to WebP under the byte budget, and written to
the output directory with a content-hashed name. The page-data manifest is
rewritten to reference the hashed names and saved minified with a .gz copy.

Layout:

  public/pic/             # Source images (jpg, jpeg, png, webp, bmp, gif)
  │   ├── town.png
  │   └── logo.webp
  dist/
  ├── site-data.json      # Manifest: gallery[*].src → /pic/town-1a2b3c4d.webp
  ├── site-data.json.gz   # Pre-compressed copy
  └── pic/
      ├── town-1a2b3c4d.webp
      └── logo-9f3e21aa.webp

Per-image failures are reported and skipped; the run still succeeds.
A missing manifest is fatal.

Run 'picbake gen-config' to generate a documented picbake.toml.")]
#[command(version)]
struct Cli {
    /// Source image directory
    #[arg(long, default_value = "public/pic", global = true)]
    source: PathBuf,

    /// Output directory for hashed images
    #[arg(long, default_value = "dist/pic", global = true)]
    output: PathBuf,

    /// Page-data manifest to rewrite
    #[arg(long, default_value = "dist/site-data.json", global = true)]
    manifest: PathBuf,

    /// Pipeline config file (optional)
    #[arg(long, default_value = "picbake.toml", global = true)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: images → manifest → cleanup
    Build,
    /// Transcode and hash images, then clean up; the manifest is not touched
    Images,
    /// Minify the manifest and write its gzip copy
    Manifest,
    /// Print a stock picbake.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.json_logs);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return ExitCode::SUCCESS;
    }

    let config = match config::load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %cli.config.display(), error = %e, "invalid config");
            return ExitCode::FAILURE;
        }
    };

    match execute(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.is_missing_manifest() {
                tracing::error!(error = %e, "manifest must exist; run the site build first");
            } else {
                tracing::error!(error = %e, "pipeline failed");
            }
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: &Cli, config: &config::PipelineConfig) -> Result<(), process::ProcessError> {
    match cli.command {
        Command::Build => {
            let paths = PipelinePaths {
                source_dir: cli.source.clone(),
                output_dir: cli.output.clone(),
                manifest: cli.manifest.clone(),
            };
            println!("==> Processing {}", cli.source.display());
            let report = process::run(&paths, config, output::print_process_event)?;
            output::print_persist_stats(&report.persist);
            output::print_summary(&report);
        }
        Command::Images => {
            println!("==> Processing {}", cli.source.display());
            let images = process_images(
                &imaging::RustBackend::new(),
                &cli.source,
                &cli.output,
                config,
                output::print_process_event,
            )?;
            let cleanup = cleanup_output(&cli.output);
            output::print_images_only_summary(&images, &cleanup);
        }
        Command::Manifest => {
            let stats = manifest::compress_manifest(&cli.manifest, config.manifest.gzip)?;
            output::print_persist_stats(&stats);
        }
        Command::GenConfig => print!("{}", config::stock_config_toml()),
    }
    Ok(())
}
