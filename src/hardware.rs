//! Hardware profiling
//!
//! Captures architecture, memory, GPU class, core count and free disk once at
//! startup. Detection never fails: anything that cannot be read degrades to a
//! conservative default (unknown architecture, cpu-only GPU, zero RAM/disk).
//!
//! # Exchange File
//!
//! The profile is persisted as a transient `KEY=value` file so a cooperating
//! process can reuse it without re-probing:
//!
//! ```text
//! ARCH=x86_64
//! RAM_GB=12
//! GPU_TYPE=cpu
//! CPU_CORES=8
//! DISK_AVAILABLE_GB=250
//! RECOMMENDED_TIER=basic
//! ```

use crate::logic::resolver::tier_for_ram;
use crate::tools::binary_exists;
use crate::types::{Architecture, GpuType};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

const GIB: u64 = 1024 * 1024 * 1024;

/// PCI vendor id of AMD GPUs as exposed under `/sys/class/drm`
const AMD_PCI_VENDOR: &str = "0x1002";

/// Default location of the exchange file
pub const DEFAULT_EXCHANGE_FILE: &str = "/run/stackprov/hardware.env";

/// Snapshot of the machine at run start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareProfile {
    pub architecture: Architecture,
    pub ram_gb: u64,
    pub gpu_type: GpuType,
    pub cpu_cores: u32,
    pub disk_available_gb: u64,
}

impl Default for HardwareProfile {
    fn default() -> Self {
        Self {
            architecture: Architecture::Unknown,
            ram_gb: 0,
            gpu_type: GpuType::Cpu,
            cpu_cores: 1,
            disk_available_gb: 0,
        }
    }
}

impl HardwareProfile {
    /// Profile the local machine.
    ///
    /// `install_root` is the filesystem whose free space is measured.
    pub fn detect(install_root: &Path) -> Self {
        let architecture = detect_architecture();
        let (ram_gb, cpu_cores) = detect_memory_and_cores();
        let gpu_type = detect_gpu(architecture);
        let disk_available_gb = detect_disk_available_gb(install_root);

        let profile = Self {
            architecture,
            ram_gb,
            gpu_type,
            cpu_cores,
            disk_available_gb,
        };
        tracing::info!("Hardware profile: {}", profile);
        profile
    }

    /// Render the exchange file contents
    pub fn to_exchange_string(&self) -> String {
        format!(
            "ARCH={}\nRAM_GB={}\nGPU_TYPE={}\nCPU_CORES={}\nDISK_AVAILABLE_GB={}\nRECOMMENDED_TIER={}\n",
            self.architecture,
            self.ram_gb,
            self.gpu_type,
            self.cpu_cores,
            self.disk_available_gb,
            tier_for_ram(self.ram_gb),
        )
    }

    /// Write the exchange file.
    ///
    /// The contents go to a freshly created sibling file that is then
    /// renamed over `path`, so a symlink planted at `path` is replaced,
    /// never followed.
    pub fn write_exchange_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let file_name = path
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "exchange path has no file name"))?;
        let staging = dir.join(format!(
            ".{}.{}.tmp",
            file_name.to_string_lossy(),
            std::process::id()
        ));

        let written = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o644)
            .open(&staging)
            .and_then(|mut file| {
                file.write_all(self.to_exchange_string().as_bytes())?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&staging, path));
        if written.is_err() {
            let _ = fs::remove_file(&staging);
        }
        written
    }

    /// Parse exchange file contents.
    ///
    /// Missing or garbled keys fall back to the conservative defaults;
    /// `RECOMMENDED_TIER` is informational and recomputed, never trusted.
    pub fn from_exchange_str(content: &str) -> Self {
        let mut profile = Self::default();
        for line in content.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"');
            match key.trim() {
                "ARCH" => profile.architecture = Architecture::from_machine(value),
                "RAM_GB" => profile.ram_gb = value.parse().unwrap_or(0),
                "GPU_TYPE" => profile.gpu_type = value.parse().unwrap_or_default(),
                "CPU_CORES" => profile.cpu_cores = value.parse().unwrap_or(1).max(1),
                "DISK_AVAILABLE_GB" => profile.disk_available_gb = value.parse().unwrap_or(0),
                _ => {}
            }
        }
        profile
    }

    /// Read a previously written exchange file.
    pub fn read_exchange_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self::from_exchange_str(&fs::read_to_string(path)?))
    }
}

impl fmt::Display for HardwareProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arch={}, ram={}GB, gpu={}, cores={}, disk_free={}GB",
            self.architecture, self.ram_gb, self.gpu_type, self.cpu_cores, self.disk_available_gb
        )
    }
}

// ============================================================================
// Detection Functions
// ============================================================================

/// Read the running kernel's machine type.
pub fn detect_architecture() -> Architecture {
    match nix::sys::utsname::uname() {
        Ok(uts) => Architecture::from_machine(&uts.machine().to_string_lossy()),
        Err(e) => {
            tracing::warn!("uname failed: {}; architecture unknown", e);
            Architecture::Unknown
        }
    }
}

/// Total RAM (GiB, rounded to nearest) and logical core count.
pub fn detect_memory_and_cores() -> (u64, u32) {
    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    sys.refresh_cpu();

    let ram_gb = ram_gb_from_bytes(sys.total_memory());
    let cpu_cores = u32::try_from(sys.cpus().len()).unwrap_or(u32::MAX).max(1);
    (ram_gb, cpu_cores)
}

/// Round a byte count to the nearest whole GiB.
///
/// Firmware reservations make a 16 GB machine report slightly less than
/// 16 GiB; flooring would push it into the tier below.
pub fn ram_gb_from_bytes(bytes: u64) -> u64 {
    bytes.saturating_add(GIB / 2) / GIB
}

/// Free space on the filesystem holding `path`, floored to GiB.
pub fn detect_disk_available_gb(path: &Path) -> u64 {
    match nix::sys::statvfs::statvfs(path) {
        Ok(stat) => {
            let bytes = (stat.blocks_available() as u64).saturating_mul(stat.fragment_size() as u64);
            bytes / GIB
        }
        Err(e) => {
            tracing::warn!("statvfs({}) failed: {}; assuming 0GB free", path.display(), e);
            0
        }
    }
}

/// Detect the GPU class from sysfs and procfs entries.
pub fn detect_gpu(architecture: Architecture) -> GpuType {
    let nvidia = Path::new("/proc/driver/nvidia/version").exists() || binary_exists("nvidia-smi");
    let vendors = read_drm_vendors();
    let compatible = if architecture == Architecture::Arm64 {
        fs::read("/proc/device-tree/compatible")
            .map(|b| String::from_utf8_lossy(&b).replace('\0', ","))
            .unwrap_or_default()
    } else {
        String::new()
    };
    classify_gpu(nvidia, &vendors, &compatible)
}

fn read_drm_vendors() -> Vec<String> {
    let Ok(entries) = fs::read_dir("/sys/class/drm") else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("card"))
        .filter_map(|e| fs::read_to_string(e.path().join("device/vendor")).ok())
        .map(|v| v.trim().to_ascii_lowercase())
        .collect()
}

/// Pure classification: nvidia beats amd beats apple beats cpu.
pub fn classify_gpu(nvidia_present: bool, drm_vendors: &[String], device_tree: &str) -> GpuType {
    if nvidia_present {
        GpuType::Nvidia
    } else if drm_vendors.iter().any(|v| v == AMD_PCI_VENDOR) {
        GpuType::Amd
    } else if device_tree.to_ascii_lowercase().contains("apple") {
        GpuType::Apple
    } else {
        GpuType::Cpu
    }
}

// ============================================================================
// Tests
// ============================================================================
