//! `super_def.json` loading.
//!
//! Domestic trees carry the manifest at `META/super_def.<nv_id>.json`, where
//! `nv_id` comes from the first record of `version_info.txt`. In the
//! manifest-file mode the path given on the command line is the manifest.
//!
//! Vendor manifests are inconsistent about numbers: sizes show up both as
//! JSON numbers and as decimal strings, so every numeric field accepts both.

use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ensure_exists, PackError, Result};
use crate::mode::BuildMode;

/// Name of the group that carries no size cap.
pub const DEFAULT_GROUP: &str = "default";

/// Version descriptor at the root of a domestic tree.
pub const VERSION_INFO_FILE: &str = "version_info.txt";

pub const SLOT_A_SUFFIX: &str = "_a";
pub const SLOT_B_SUFFIX: &str = "_b";

/// Parsed `super_def.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct SuperDef {
    pub super_meta: SuperMeta,
    pub block_devices: Vec<BlockDevice>,
    pub groups: Vec<Group>,
    pub partitions: Vec<PartitionSpec>,
}

/// Reference to the reference metadata image inside the tree.
#[derive(Debug, Clone, Deserialize)]
pub struct SuperMeta {
    pub path: String,
    #[serde(deserialize_with = "de_u64")]
    pub size: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BlockDevice {
    #[serde(deserialize_with = "de_u64")]
    pub block_size: u64,
    #[serde(deserialize_with = "de_u64")]
    pub size: u64,
    #[serde(deserialize_with = "de_u64")]
    pub alignment: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default, deserialize_with = "de_u64")]
    pub maximum_size: u64,
}

impl Group {
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_GROUP
    }
}

/// A partition as declared in the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct PartitionSpec {
    pub name: String,
    pub group_name: String,
    #[serde(default, deserialize_with = "de_u64")]
    pub size: u64,
    #[serde(default)]
    pub path: Option<String>,
}

impl PartitionSpec {
    pub fn is_slot_a(&self) -> bool {
        self.name.ends_with(SLOT_A_SUFFIX)
    }

    /// Partition name without its two-character slot suffix.
    pub fn base_name(&self) -> &str {
        strip_slot_suffix(&self.name)
    }
}

/// Strip a trailing `_a` / `_b`; other names are returned unchanged.
pub fn strip_slot_suffix(name: &str) -> &str {
    name.strip_suffix(SLOT_A_SUFFIX)
        .or_else(|| name.strip_suffix(SLOT_B_SUFFIX))
        .unwrap_or(name)
}

impl SuperDef {
    /// Parse and validate a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| PackError::io(path, e))?;
        Self::parse(path, &content)
    }

    /// Parse manifest text; `origin` is only used in error messages.
    pub fn parse(origin: &Path, content: &str) -> Result<Self> {
        let def: SuperDef =
            serde_json::from_str(content).map_err(|e| PackError::manifest(origin, e.to_string()))?;
        def.validate(origin)?;
        Ok(def)
    }

    fn validate(&self, origin: &Path) -> Result<()> {
        let device = self
            .block_devices
            .first()
            .ok_or_else(|| PackError::manifest(origin, "block_devices is empty"))?;
        if !device.block_size.is_power_of_two() {
            return Err(PackError::manifest(
                origin,
                format!("block_size {} is not a power of two", device.block_size),
            ));
        }
        for spec in self.slot_a_partitions() {
            if !self.has_group(&spec.group_name) {
                return Err(PackError::manifest(
                    origin,
                    format!("partition {} uses undeclared group {}", spec.name, spec.group_name),
                ));
            }
        }
        Ok(())
    }

    /// The block device used for the whole image (the first declared).
    pub fn block_device(&self) -> &BlockDevice {
        // validate() guarantees at least one entry
        &self.block_devices[0]
    }

    /// Declared groups except `default`, first declaration wins.
    pub fn sized_groups(&self) -> Vec<&Group> {
        let mut seen = Vec::new();
        let mut out = Vec::new();
        for group in self.groups.iter().filter(|g| !g.is_default()) {
            if !seen.contains(&group.name.as_str()) {
                seen.push(group.name.as_str());
                out.push(group);
            }
        }
        out
    }

    pub fn has_group(&self, name: &str) -> bool {
        name == DEFAULT_GROUP || self.groups.iter().any(|g| g.name == name)
    }

    /// Slot-A partitions in declaration order.
    pub fn slot_a_partitions(&self) -> impl Iterator<Item = &PartitionSpec> {
        self.partitions.iter().filter(|p| p.is_slot_a())
    }
}

/// A manifest together with where it was found.
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub path: PathBuf,
    pub nv_id: Option<u64>,
    pub def: SuperDef,
}

/// Locate and load the manifest for `mode`.
pub fn load_for_mode(mode: BuildMode, path: &Path) -> Result<LoadedManifest> {
    if mode.uses_domestic_tree() {
        let nv_id = read_nv_id(path)?;
        let manifest_path = super_def_path(path, nv_id);
        ensure_exists(&manifest_path)?;
        let def = SuperDef::load(&manifest_path)?;
        Ok(LoadedManifest {
            path: manifest_path,
            nv_id: Some(nv_id),
            def,
        })
    } else {
        let def = SuperDef::load(path)?;
        Ok(LoadedManifest {
            path: path.to_path_buf(),
            nv_id: None,
            def,
        })
    }
}

/// `<root>/META/super_def.<nv_id:08>.json`
pub fn super_def_path(root: &Path, nv_id: u64) -> PathBuf {
    root.join("META").join(format!("super_def.{:08}.json", nv_id))
}

/// Read `nv_id` from the first record of `<root>/version_info.txt`.
pub fn read_nv_id(root: &Path) -> Result<u64> {
    let path = root.join(VERSION_INFO_FILE);
    let content = fs::read_to_string(&path).map_err(|e| PackError::io(&path, e))?;
    parse_nv_id(&path, &content)
}

pub fn parse_nv_id(origin: &Path, content: &str) -> Result<u64> {
    let records: Vec<serde_json::Value> =
        serde_json::from_str(content).map_err(|e| PackError::manifest(origin, e.to_string()))?;
    let first = records
        .first()
        .ok_or_else(|| PackError::manifest(origin, "no version records"))?;
    match first.get("nv_id") {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| PackError::manifest(origin, format!("nv_id {} is not an unsigned integer", n))),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| PackError::manifest(origin, format!("nv_id {:?} is not numeric", s))),
        Some(other) => Err(PackError::manifest(
            origin,
            format!("nv_id has unexpected type: {}", other),
        )),
        None => Err(PackError::manifest(origin, "first record has no nv_id")),
    }
}

/// Join a `/`-separated manifest path under `root`.
pub fn join_manifest_path(root: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .fold(root.to_path_buf(), |acc, c| acc.join(c))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

fn de_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "super_meta": { "path": "META/super_meta.raw", "size": "65536" },
        "block_devices": [ { "block_size": 4096, "size": "12884901888", "alignment": 1048576 } ],
        "groups": [
            { "name": "default" },
            { "name": "qti_dynamic_partitions_a", "maximum_size": "2147483648" },
            { "name": "qti_dynamic_partitions_b", "maximum_size": 2147483648 },
            { "name": "qti_dynamic_partitions_a", "maximum_size": 1 }
        ],
        "partitions": [
            { "name": "system_a", "group_name": "qti_dynamic_partitions_a", "size": "16384", "path": "IMAGES/system.img" },
            { "name": "system_b", "group_name": "qti_dynamic_partitions_b" },
            { "name": "vendor_a", "group_name": "qti_dynamic_partitions_a", "path": "IMAGES/vendor.img" }
        ]
    }"#;

    fn parse(content: &str) -> Result<SuperDef> {
        SuperDef::parse(Path::new("super_def.json"), content)
    }

    #[test]
    fn test_parse_mixed_number_formats() {
        let def = parse(MANIFEST).unwrap();
        assert_eq!(def.super_meta.size, 65536);
        assert_eq!(def.block_device().block_size, 4096);
        assert_eq!(def.block_device().size, 12_884_901_888);
        assert_eq!(def.partitions[0].size, 16384);
        assert_eq!(def.partitions[2].size, 0);
        assert_eq!(def.partitions[1].path, None);
    }

    #[test]
    fn test_sized_groups_skip_default_and_duplicates() {
        let def = parse(MANIFEST).unwrap();
        let groups = def.sized_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "qti_dynamic_partitions_a");
        assert_eq!(groups[0].maximum_size, 2_147_483_648);
        assert_eq!(groups[1].name, "qti_dynamic_partitions_b");
    }

    #[test]
    fn test_slot_a_partitions_keep_order() {
        let def = parse(MANIFEST).unwrap();
        let names: Vec<_> = def.slot_a_partitions().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["system_a", "vendor_a"]);
    }

    #[test]
    fn test_missing_top_level_key() {
        let err = parse(r#"{ "super_meta": { "path": "x", "size": 1 }, "block_devices": [], "groups": [] }"#)
            .unwrap_err();
        assert!(matches!(err, PackError::ManifestParse { .. }));
        assert!(err.to_string().contains("partitions"));
    }

    #[test]
    fn test_empty_block_devices_rejected() {
        let err = parse(
            r#"{ "super_meta": { "path": "x", "size": 1 }, "block_devices": [], "groups": [], "partitions": [] }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("block_devices is empty"));
    }

    #[test]
    fn test_block_size_must_be_power_of_two() {
        let err = parse(
            r#"{ "super_meta": { "path": "x", "size": 1 },
                 "block_devices": [ { "block_size": 4000, "size": 1, "alignment": 1 } ],
                 "groups": [], "partitions": [] }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("power of two"));
    }

    #[test]
    fn test_undeclared_group_rejected() {
        let err = parse(
            r#"{ "super_meta": { "path": "x", "size": 1 },
                 "block_devices": [ { "block_size": 4096, "size": 1, "alignment": 1 } ],
                 "groups": [ { "name": "default" } ],
                 "partitions": [
                    { "name": "odm_b", "group_name": "also_missing" },
                    { "name": "odm_a", "group_name": "mystery_group", "path": "IMAGES/odm.img" }
                 ] }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("odm_a uses undeclared group mystery_group"));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(parse("not json"), Err(PackError::ManifestParse { .. })));
    }

    #[test]
    fn test_base_name() {
        assert_eq!(strip_slot_suffix("my_preload_a"), "my_preload");
        assert_eq!(strip_slot_suffix("system_b"), "system");
        assert_eq!(strip_slot_suffix("super"), "super");
    }

    #[test]
    fn test_super_def_path_zero_padded() {
        assert_eq!(
            super_def_path(Path::new("/tree"), 7),
            PathBuf::from("/tree/META/super_def.00000007.json")
        );
    }

    #[test]
    fn test_parse_nv_id_number_and_string() {
        let origin = Path::new("version_info.txt");
        assert_eq!(parse_nv_id(origin, r#"[{"nv_id": 7}]"#).unwrap(), 7);
        assert_eq!(parse_nv_id(origin, r#"[{"nv_id": "10010111"}]"#).unwrap(), 10_010_111);
    }

    #[test]
    fn test_parse_nv_id_errors() {
        let origin = Path::new("version_info.txt");
        assert!(parse_nv_id(origin, "[]").is_err());
        assert!(parse_nv_id(origin, r#"[{"version": 1}]"#).is_err());
        assert!(parse_nv_id(origin, r#"[{"nv_id": "abc"}]"#).is_err());
        assert!(parse_nv_id(origin, "garbage").is_err());
    }

    #[test]
    fn test_join_manifest_path() {
        assert_eq!(
            join_manifest_path(Path::new("/tree"), "IMAGES/system.img"),
            PathBuf::from("/tree/IMAGES/system.img")
        );
        assert_eq!(
            join_manifest_path(Path::new("/tree"), "./META//super_meta.raw"),
            PathBuf::from("/tree/META/super_meta.raw")
        );
    }
}
