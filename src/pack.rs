//! The packing pipeline.
//!
//! mode → tools → scratch → manifest → layout → lpmake → verify.
//! Every step returns a typed error; the first one aborts the run before an
//! image is produced. Only verification is allowed to "fail" softly.

use std::path::{Path, PathBuf};

use crate::common::prepare_scratch_dir;
use crate::config::Config;
use crate::error::{ensure_exists, Result};
use crate::layout::{ImageOverrides, ImageSource, LayoutPlan, Planner, Simg2img};
use crate::lpmake::{self, LpmakeOptions};
use crate::manifest::{self, join_manifest_path};
use crate::mode::BuildMode;
use crate::timing::Timer;
use crate::tools::{Tool, ToolLocator};
use crate::verify::{self, VerifyOutcome};

/// Everything a run needs from the command line.
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Domestic tree directory, or a `super_def.json` file.
    pub path: PathBuf,
    /// Extra directory searched for the tools before `PATH`.
    pub bin_path: Option<PathBuf>,
    pub overrides: ImageOverrides,
    /// Full OTA directory with flat `<partition>.img` files.
    pub full_update: Option<PathBuf>,
    pub lpmake: LpmakeOptions,
    /// Emit empty slot-B entries (layout of the shipped `super_meta.raw`).
    pub ab_pair: bool,
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct PackReport {
    pub mode: BuildMode,
    pub manifest: PathBuf,
    /// `nv_id` from `version_info.txt`, for domestic-tree modes.
    pub nv_id: Option<u64>,
    pub output: PathBuf,
    pub plan: LayoutPlan,
    pub verification: VerifyOutcome,
}

/// Run the whole pipeline, resolving tools from `config` and `--binpath`.
pub fn pack(options: &PackOptions, config: &Config) -> Result<PackReport> {
    let mode = BuildMode::resolve(&options.path, options.full_update.as_deref())?;
    tracing::info!("Pack mode: {}", mode);
    check_inputs(options)?;

    let tools = ToolLocator::discover(options.bin_path.as_deref(), &config.tool_overrides())?;
    pack_with_tools(mode, options, config, &tools)
}

/// Pipeline after mode and tool resolution.
pub fn pack_with_tools(
    mode: BuildMode,
    options: &PackOptions,
    config: &Config,
    tools: &ToolLocator,
) -> Result<PackReport> {
    let scratch = prepare_scratch_dir(&config.scratch_dir)?;

    let loaded = manifest::load_for_mode(mode, &options.path)?;
    match loaded.nv_id {
        Some(nv_id) => tracing::info!("Using manifest {} (nv_id {})", loaded.path.display(), nv_id),
        None => tracing::info!("Using manifest {}", loaded.path.display()),
    }

    let timer = Timer::start("Layout planning");
    let converter = Simg2img::new(tools.path(Tool::Simg2img)?);
    let source = ImageSource::for_mode(
        mode,
        &options.path,
        &loaded.path,
        options.full_update.as_deref(),
    )?;
    let plan = Planner::new(mode, source, &options.overrides, &scratch, &converter)
        .with_ab_pair(options.ab_pair)
        .plan(&loaded.def)?;
    plan.log_summary();
    timer.finish();

    let output = lpmake::output_path(mode, &options.path, options.full_update.as_deref());
    let timer = Timer::start("lpmake");
    lpmake::run(tools.path(Tool::Lpmake)?, &plan, &options.lpmake, &output)?;
    timer.finish();

    let verification = verify_output(options, &loaded.def.super_meta.path, &output)?;

    tracing::info!("Super packing completed! {}", output.display());
    Ok(PackReport {
        mode,
        manifest: loaded.path,
        nv_id: loaded.nv_id,
        output,
        plan,
        verification,
    })
}

fn check_inputs(options: &PackOptions) -> Result<()> {
    let optional = [
        options.overrides.preload.as_deref(),
        options.overrides.company.as_deref(),
        options.full_update.as_deref(),
    ];
    for path in optional.into_iter().flatten() {
        ensure_exists(path)?;
    }
    Ok(())
}

fn verify_output(options: &PackOptions, super_meta: &str, output: &Path) -> Result<VerifyOutcome> {
    if !verify::should_verify(
        options.ab_pair,
        options.full_update.is_some(),
        !options.overrides.is_empty(),
    ) {
        let outcome = VerifyOutcome::Skipped {
            reason: if options.ab_pair {
                "custom images used".to_string()
            } else {
                "AB-paired layout not requested".to_string()
            },
        };
        verify::report(Path::new(super_meta), &outcome);
        return Ok(outcome);
    }

    let reference = join_manifest_path(&options.path, super_meta);
    tracing::info!("{} verify start...", reference.display());
    let outcome = verify::verify_super_meta(&reference, output)?;
    verify::report(&reference, &outcome);
    Ok(outcome)
}
