//! lpmake invocation.
//!
//! The argument list is derived entirely from a [`LayoutPlan`]:
//!
//! ```text
//! lpmake --metadata-size <n> --metadata-slots <2|3> --block-size <n>
//!        --device super:<size>:<alignment>
//!        [--group <name>:<maximum_size>]...
//!        [--partition <name>:readonly:<size>:<group> [--image <name>=<path>]]...
//!        [--virtual-ab] [--sparse]
//!        --output <path>
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::common::ensure_parent_exists;
use crate::error::Result;
use crate::layout::LayoutPlan;
use crate::mode::BuildMode;
use crate::process::Cmd;

/// Name of the physical device inside the super image.
pub const SUPER_DEVICE: &str = "super";
/// Access mode given to every partition.
pub const PARTITION_ACCESS: &str = "readonly";
/// File name of the produced image.
pub const SUPER_IMAGE: &str = "super.img";

/// Operator-selected lpmake switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LpmakeOptions {
    /// 2 or 3.
    pub metadata_slots: u8,
    pub virtual_ab: bool,
    pub sparse: bool,
}

impl Default for LpmakeOptions {
    fn default() -> Self {
        Self {
            metadata_slots: 3,
            virtual_ab: true,
            sparse: false,
        }
    }
}

/// Where the super image is written for `mode`.
pub fn output_path(mode: BuildMode, root: &Path, full_update: Option<&Path>) -> PathBuf {
    match (mode, full_update) {
        (BuildMode::DomesticOnly, _) | (_, None) => root.join("IMAGES").join(SUPER_IMAGE),
        (_, Some(dir)) => dir.join(SUPER_IMAGE),
    }
}

/// Assemble the lpmake command for `plan`.
pub fn command(program: &Path, plan: &LayoutPlan, options: &LpmakeOptions, output: &Path) -> Cmd {
    let device = &plan.block_device;
    let mut cmd = Cmd::new(program)
        .arg("--metadata-size")
        .arg(plan.metadata_size.to_string())
        .arg("--metadata-slots")
        .arg(options.metadata_slots.to_string())
        .arg("--block-size")
        .arg(device.block_size.to_string())
        .arg("--device")
        .arg(format!("{}:{}:{}", SUPER_DEVICE, device.size, device.alignment));

    for group in &plan.groups {
        cmd = cmd
            .arg("--group")
            .arg(format!("{}:{}", group.name, group.maximum_size));
    }

    for partition in &plan.partitions {
        cmd = cmd.arg("--partition").arg(format!(
            "{}:{}:{}:{}",
            partition.name, PARTITION_ACCESS, partition.size, partition.group_name
        ));
        if let Some(image) = &partition.image {
            let mut spec = OsString::from(format!("{}=", partition.name));
            spec.push(image.as_os_str());
            cmd = cmd.arg("--image").arg_os(spec);
        }
    }

    if options.virtual_ab {
        cmd = cmd.arg("--virtual-ab");
    }
    if options.sparse {
        cmd = cmd.arg("--sparse");
    }

    cmd.arg("--output").arg_path(output)
}

/// Build the super image, creating the output directory if needed.
pub fn run(program: &Path, plan: &LayoutPlan, options: &LpmakeOptions, output: &Path) -> Result<()> {
    ensure_parent_exists(output)?;
    command(program, plan, options, output).run()?;
    Ok(())
}
