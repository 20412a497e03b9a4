//! Partition layout planning.
//!
//! Turns the slot-A partitions of a manifest into the sized, image-backed
//! entries handed to lpmake. For each partition the planner
//!
//! 1. picks the source image (manifest path, full OTA image, or override),
//! 2. expands it to a raw image in the scratch directory if it is sparse,
//! 3. sizes it by aligning the raw length up to the device block size.
//!
//! In domestic mode the aligned size must equal the size the manifest
//! declares; a disagreement means the tree is inconsistent and the plan
//! fails. Full OTA images and override images are taken at their own size.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ensure_exists, PackError, Result};
use crate::manifest::{
    join_manifest_path, BlockDevice, Group, PartitionSpec, SuperDef, SLOT_A_SUFFIX, SLOT_B_SUFFIX,
};
use crate::mode::BuildMode;
use crate::process::Cmd;
use crate::sparse::is_sparse_image;

/// Partition replaced by `--preload`.
pub const PRELOAD_PARTITION: &str = "my_preload";
/// Partition replaced by `--company`.
pub const COMPANY_PARTITION: &str = "my_company";
/// Group the slot-B placeholders are placed in.
pub const SLOT_B_GROUP: &str = "qti_dynamic_partitions_b";

/// Round `n` up to the next multiple of `alignment` (a power of two).
pub fn align_up(n: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (n + alignment - 1) & !(alignment - 1)
}

/// Images supplied on the command line in place of packaged ones.
#[derive(Debug, Clone, Default)]
pub struct ImageOverrides {
    pub preload: Option<PathBuf>,
    pub company: Option<PathBuf>,
}

impl ImageOverrides {
    /// Override for a partition base name, if any.
    pub fn for_partition(&self, base_name: &str) -> Option<&Path> {
        match base_name {
            PRELOAD_PARTITION => self.preload.as_deref(),
            COMPANY_PARTITION => self.company.as_deref(),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.preload.is_none() && self.company.is_none()
    }
}

/// Where partition images come from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// `path` entries of `manifest`, relative to the domestic tree root.
    Manifest { root: PathBuf, manifest: PathBuf },
    /// `<dir>/<base>.img` inside a full OTA directory.
    FullUpdate { dir: PathBuf },
}

impl ImageSource {
    pub fn for_mode(
        mode: BuildMode,
        root: &Path,
        manifest: &Path,
        full_update: Option<&Path>,
    ) -> Result<Self> {
        match (mode, full_update) {
            (BuildMode::DomesticOnly, _) => Ok(Self::Manifest {
                root: root.to_path_buf(),
                manifest: manifest.to_path_buf(),
            }),
            (_, Some(dir)) => Ok(Self::FullUpdate {
                dir: dir.to_path_buf(),
            }),
            (_, None) => Err(PackError::InvalidMode(format!(
                "{} mode requires a full OTA directory",
                mode
            ))),
        }
    }

    fn image_for(&self, spec: &PartitionSpec) -> Result<PathBuf> {
        match self {
            Self::Manifest { root, manifest } => {
                let rel = spec.path.as_deref().ok_or_else(|| {
                    PackError::manifest(manifest, format!("partition {} has no path", spec.name))
                })?;
                Ok(join_manifest_path(root, rel))
            }
            Self::FullUpdate { dir } => Ok(dir.join(format!("{}.img", spec.base_name()))),
        }
    }
}

/// Expands sparse images to raw ones.
pub trait ImageConverter {
    fn sparse_to_raw(&self, sparse: &Path, raw: &Path) -> Result<()>;
}

/// [`ImageConverter`] backed by the `simg2img` binary.
#[derive(Debug, Clone)]
pub struct Simg2img {
    program: PathBuf,
}

impl Simg2img {
    pub fn new(program: &Path) -> Self {
        Self {
            program: program.to_path_buf(),
        }
    }
}

impl ImageConverter for Simg2img {
    fn sparse_to_raw(&self, sparse: &Path, raw: &Path) -> Result<()> {
        Cmd::new(&self.program)
            .arg_path(sparse)
            .arg_path(raw)
            .run()?;
        Ok(())
    }
}

/// One entry of the final layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPartition {
    pub name: String,
    pub group_name: String,
    /// Always a multiple of the block size.
    pub size: u64,
    /// `None` for slot-B placeholders.
    pub image: Option<PathBuf>,
}

impl ResolvedPartition {
    /// Zero-sized slot-B entry mirroring a slot-A partition.
    fn slot_b_placeholder(slot_a_name: &str) -> Self {
        let base = slot_a_name
            .strip_suffix(SLOT_A_SUFFIX)
            .unwrap_or(slot_a_name);
        Self {
            name: format!("{}{}", base, SLOT_B_SUFFIX),
            group_name: SLOT_B_GROUP.to_string(),
            size: 0,
            image: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.image.is_none()
    }
}

/// Everything lpmake needs.
#[derive(Debug, Clone)]
pub struct LayoutPlan {
    pub metadata_size: u64,
    pub block_device: BlockDevice,
    /// Non-default groups, in declaration order.
    pub groups: Vec<Group>,
    pub partitions: Vec<ResolvedPartition>,
}

impl LayoutPlan {
    /// Sum of planned partition sizes in `group`.
    pub fn group_usage(&self, group: &str) -> u64 {
        self.partitions
            .iter()
            .filter(|p| p.group_name == group)
            .map(|p| p.size)
            .sum()
    }

    /// Log the layout and warn about groups planned past their budget.
    pub fn log_summary(&self) {
        for p in &self.partitions {
            match &p.image {
                Some(image) => tracing::info!(
                    "  {:<24} {:<28} {:>12}  {}",
                    p.name,
                    p.group_name,
                    p.size,
                    image.display()
                ),
                None => tracing::info!("  {:<24} {:<28} {:>12}  (placeholder)", p.name, p.group_name, p.size),
            }
        }
        for group in &self.groups {
            let used = self.group_usage(&group.name);
            if group.maximum_size > 0 && used > group.maximum_size {
                tracing::warn!(
                    "Group {} uses {} bytes, more than its maximum of {}",
                    group.name,
                    used,
                    group.maximum_size
                );
            }
        }
    }
}

/// Plans the layout for one run.
pub struct Planner<'a> {
    mode: BuildMode,
    source: ImageSource,
    overrides: &'a ImageOverrides,
    scratch_dir: &'a Path,
    converter: &'a dyn ImageConverter,
    ab_pair: bool,
}

impl<'a> Planner<'a> {
    pub fn new(
        mode: BuildMode,
        source: ImageSource,
        overrides: &'a ImageOverrides,
        scratch_dir: &'a Path,
        converter: &'a dyn ImageConverter,
    ) -> Self {
        Self {
            mode,
            source,
            overrides,
            scratch_dir,
            converter,
            ab_pair: false,
        }
    }

    /// Also emit an empty `_b` entry after every partition.
    pub fn with_ab_pair(mut self, ab_pair: bool) -> Self {
        self.ab_pair = ab_pair;
        self
    }

    pub fn plan(&self, def: &SuperDef) -> Result<LayoutPlan> {
        let block_device = *def.block_device();
        let mut partitions = Vec::new();

        for spec in def.slot_a_partitions() {
            let resolved = self.resolve(spec, block_device.block_size)?;
            partitions.push(resolved);
            if self.ab_pair {
                partitions.push(ResolvedPartition::slot_b_placeholder(&spec.name));
            }
        }

        Ok(LayoutPlan {
            metadata_size: def.super_meta.size,
            block_device,
            groups: def.sized_groups().into_iter().cloned().collect(),
            partitions,
        })
    }

    fn resolve(&self, spec: &PartitionSpec, block_size: u64) -> Result<ResolvedPartition> {
        let base = spec.base_name();
        let override_image = self.overrides.for_partition(base);

        let source = match override_image {
            Some(path) => {
                tracing::info!("Using {} for {}", path.display(), spec.name);
                path.to_path_buf()
            }
            None => self.source.image_for(spec)?,
        };
        ensure_exists(&source)?;

        let image = self.materialize(&source, base)?;
        let real_size = fs::metadata(&image).map_err(|e| PackError::io(&image, e))?.len();
        let aligned = align_up(real_size, block_size);

        tracing::debug!("{} origin  size: {}", spec.name, real_size);
        tracing::debug!("{} aligned size: {}", spec.name, aligned);

        let size = if self.mode.is_full_update() || override_image.is_some() {
            aligned
        } else {
            tracing::debug!("{} def     size: {}", spec.name, spec.size);
            if spec.size != aligned {
                return Err(PackError::SizePolicyViolation {
                    partition: spec.name.clone(),
                    declared: spec.size,
                    aligned,
                });
            }
            aligned
        };

        Ok(ResolvedPartition {
            name: spec.name.clone(),
            group_name: spec.group_name.clone(),
            size,
            image: Some(image),
        })
    }

    /// Raw image for `source`, converting into the scratch directory if sparse.
    fn materialize(&self, source: &Path, base: &str) -> Result<PathBuf> {
        if !is_sparse_image(source)? {
            return Ok(source.to_path_buf());
        }
        let raw = self.scratch_dir.join(format!("raw_{}", base));
        tracing::debug!("{} is sparse, converting to {}", source.display(), raw.display());
        self.converter.sparse_to_raw(source, &raw)?;
        Ok(raw)
    }
}
