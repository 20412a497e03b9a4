//! Shared test utilities for superpack tests.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use superpack::config::Config;
use superpack::layout::ImageOverrides;
use superpack::lpmake::LpmakeOptions;
use superpack::pack::PackOptions;

pub const SPARSE_MAGIC: [u8; 4] = [0x3A, 0xFF, 0x26, 0xED];

/// Test environment: a domestic tree, a FULL_OTA directory, a tool
/// directory with mock lpmake/simg2img, and a scratch directory.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Domestic firmware tree root
    pub domestic: PathBuf,
    /// Full OTA directory
    pub full_ota: PathBuf,
    /// Directory holding the mock tools
    pub bin: PathBuf,
    /// Scratch directory used by Config
    pub scratch: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base = temp_dir.path();

        let domestic = base.join("XXXdomestic_11_15.0.0.850");
        let full_ota = base.join("FULL_OTA");
        let bin = base.join("bin");
        let scratch = base.join(".temp");

        for dir in [&domestic, &full_ota, &bin] {
            fs::create_dir_all(dir).expect("Failed to create test dir");
        }
        fs::create_dir_all(domestic.join("META")).expect("Failed to create META");

        let env = Self {
            _temp_dir: temp_dir,
            domestic,
            full_ota,
            bin,
            scratch,
        };
        env.install_simg2img();
        env.install_lpmake(None);
        env
    }

    pub fn config(&self) -> Config {
        Config {
            lpmake: None,
            simg2img: None,
            scratch_dir: self.scratch.clone(),
        }
    }

    /// Options for a plain domestic build.
    pub fn options(&self) -> PackOptions {
        PackOptions {
            path: self.domestic.clone(),
            bin_path: Some(self.bin.clone()),
            overrides: ImageOverrides::default(),
            full_update: None,
            lpmake: LpmakeOptions::default(),
            ab_pair: false,
        }
    }

    /// Write `version_info.txt` with the given nv_id.
    pub fn write_version_info(&self, nv_id: u64) {
        fs::write(
            self.domestic.join("version_info.txt"),
            format!(r#"[{{"nv_id": "{}", "version_name": "15.0.0.850"}}]"#, nv_id),
        )
        .expect("Failed to write version_info.txt");
    }

    /// Write `META/super_def.<nv_id>.json` and return its path.
    pub fn write_super_def(&self, nv_id: u64, json: &str) -> PathBuf {
        let path = self
            .domestic
            .join("META")
            .join(format!("super_def.{:08}.json", nv_id));
        fs::write(&path, json).expect("Failed to write super_def");
        path
    }

    /// File recording the arguments of the last lpmake call.
    pub fn lpmake_args_file(&self) -> PathBuf {
        self.bin.join("lpmake.args")
    }

    /// Arguments of the last lpmake call, one per entry.
    pub fn lpmake_args(&self) -> Vec<String> {
        fs::read_to_string(self.lpmake_args_file())
            .expect("lpmake was not invoked")
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// File recording every simg2img call as `<in> <out>` lines.
    pub fn simg2img_calls_file(&self) -> PathBuf {
        self.bin.join("simg2img.calls")
    }

    /// Mock lpmake: records its arguments and writes 8192 zero bytes
    /// followed by `metadata` (if any) to the `--output` path.
    pub fn install_lpmake(&self, metadata: Option<&Path>) {
        let append = metadata
            .map(|m| format!("cat '{}' >> \"$out\"\n", m.display()))
            .unwrap_or_default();
        let script = format!(
            "#!/bin/sh\n\
             printf '%s\\n' \"$@\" > '{args}'\n\
             out=''\n\
             prev=''\n\
             for a in \"$@\"; do\n\
             \x20 if [ \"$prev\" = '--output' ]; then out=\"$a\"; fi\n\
             \x20 prev=\"$a\"\n\
             done\n\
             head -c 8192 /dev/zero > \"$out\"\n\
             {append}\
             echo 'lpmake: done'\n",
            args = self.lpmake_args_file().display(),
            append = append,
        );
        write_executable(&self.bin.join("lpmake"), &script);
    }

    /// Mock lpmake that always fails.
    pub fn install_failing_lpmake(&self) {
        write_executable(
            &self.bin.join("lpmake"),
            "#!/bin/sh\necho 'Invalid partition layout' >&2\nexit 1\n",
        );
    }

    /// Mock simg2img that always fails.
    pub fn install_failing_simg2img(&self) {
        write_executable(
            &self.bin.join("simg2img"),
            "#!/bin/sh\necho 'Invalid sparse file format' >&2\nexit 255\n",
        );
    }

    /// Mock simg2img: drops the 4-byte magic and records the call.
    pub fn install_simg2img(&self) {
        let script = format!(
            "#!/bin/sh\n\
             echo \"$1 $2\" >> '{calls}'\n\
             tail -c +5 \"$1\" > \"$2\"\n",
            calls = self.simg2img_calls_file().display(),
        );
        write_executable(&self.bin.join("simg2img"), &script);
    }
}

/// Write a file and mark it executable.
pub fn write_executable(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir for tool");
    }
    fs::write(path, content).expect("Failed to write mock tool");
    let mut perms = fs::metadata(path).expect("Failed to get metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("Failed to set permissions");
}

/// Write a raw image of `len` bytes.
pub fn write_raw_image(path: &Path, len: usize) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create image dir");
    }
    fs::write(path, vec![0xA5u8; len]).expect("Failed to write raw image");
}

/// Write a sparse-looking image whose raw payload is `payload_len` bytes.
pub fn write_sparse_image(path: &Path, payload_len: usize) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create image dir");
    }
    let mut data = SPARSE_MAGIC.to_vec();
    data.extend(vec![0x11u8; payload_len]);
    fs::write(path, data).expect("Failed to write sparse image");
}

/// Manifest with one block device (4096-byte blocks), the default group,
/// both dynamic partition groups, and the given partition entries.
pub fn super_def_json(partitions: &str) -> String {
    format!(
        r#"{{
    "super_meta": {{ "path": "META/super_meta.raw", "size": "65536" }},
    "block_devices": [
        {{ "name": "super", "block_size": "4096", "size": "12884901888", "alignment": "1048576" }}
    ],
    "groups": [
        {{ "name": "default", "maximum_size": "0" }},
        {{ "name": "qti_dynamic_partitions_a", "maximum_size": "2147483648" }},
        {{ "name": "qti_dynamic_partitions_b", "maximum_size": "2147483648" }}
    ],
    "partitions": [
        {}
    ]
}}"#,
        partitions
    )
}

/// Assert that a file exists.
pub fn assert_file_exists(path: &Path) {
    assert!(path.exists(), "Expected file to exist: {}", path.display());
}
