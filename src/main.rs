//! Superpack - super image packer for OPLUS firmware packages.
//!
//! Rebuilds `super.img` from:
//! - a domestic firmware tree (`version_info.txt`, `META/super_def.*.json`, `IMAGES/`)
//! - a domestic tree plus a full OTA directory of partition images
//! - a standalone `super_def.json` plus a full OTA directory

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use superpack::config::Config;
use superpack::layout::ImageOverrides;
use superpack::lpmake::LpmakeOptions;
use superpack::pack::{self, PackOptions};

#[derive(Parser)]
#[command(name = "superpack", version)]
#[command(about = "A super packer for OPLUS firmware packages")]
#[command(
    after_help = "EXAMPLES:\n  Pack super from domestic folder:\n    superpack --path ./XXXdomestic_11_15.0.0.850\n\n  Pack super from full ota with domestic folder:\n    superpack --path ./XXXdomestic_11_15.0.0.850 --fullota ./FULL_OTA\n\n  Pack super from full ota with super_def.json:\n    superpack --path ./super_def.json --fullota ./FULL_OTA"
)]
struct Cli {
    /// Working folder (domestic tree) or super_def.json path
    #[arg(long, value_name = "PATH")]
    path: PathBuf,

    /// Directory containing lpmake and simg2img (searched before PATH)
    #[arg(short, long, value_name = "PATH")]
    binpath: Option<PathBuf>,

    /// Image to use for my_preload
    #[arg(long, value_name = "PATH")]
    preload: Option<PathBuf>,

    /// Image to use for my_company
    #[arg(long, value_name = "PATH")]
    company: Option<PathBuf>,

    /// Don't pass --virtual-ab to lpmake
    #[arg(long)]
    no_vab: bool,

    /// lpmake --metadata-slots
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(2..=3))]
    mslots: u8,

    /// Produce a sparse super image (lpmake --sparse)
    #[arg(long)]
    sparse: bool,

    /// Lay out empty _b partitions, as in the shipped super_meta.raw
    #[arg(long)]
    abab: bool,

    /// Pack super from a FULL_OTA directory
    #[arg(long, value_name = "PATH")]
    fullota: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_options(self) -> PackOptions {
        PackOptions {
            path: self.path,
            bin_path: self.binpath,
            overrides: ImageOverrides {
                preload: self.preload,
                company: self.company,
            },
            full_update: self.fullota,
            lpmake: LpmakeOptions {
                metadata_slots: self.mslots,
                virtual_ab: !self.no_vab,
                sparse: self.sparse,
            },
            ab_pair: self.abab,
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "superpack=debug" } else { "superpack=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .try_init();
}

fn run(cli: Cli) -> Result<()> {
    let base_dir = std::env::current_dir().context("Failed to determine current directory")?;
    let config = Config::load(&base_dir);
    config.log();

    let options = cli.into_options();
    tracing::debug!("{:?}", options);
    pack::pack(&options, &config).context("Super packing failed")?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
