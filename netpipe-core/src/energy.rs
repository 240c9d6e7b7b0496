// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Package energy counters read from RAPL model-specific registers.
//!
//! The reader identifies the CPU from `/proc/cpuinfo`, maps every physical
//! package to the first CPU that belongs to it, and reads the package energy
//! status register through the `msr` device of that CPU. Counters are
//! 32 bits wide and wrap, so consumption is always computed from two
//! snapshots with [`EnergySnapshot::delta`].
//!
//! Reading `/dev/cpu/*/msr` normally requires root and the `msr` module.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::EnergyError;

pub const INTEL_RAPL_POWER_UNIT: u64 = 0x606;
pub const INTEL_PKG_ENERGY_STATUS: u64 = 0x611;
pub const AMD_RAPL_POWER_UNIT: u64 = 0xc001_0299;
pub const AMD_PKG_ENERGY_STATUS: u64 = 0xc001_029b;

/// Only this Intel family exposes the registers used here.
pub const INTEL_FAMILY: u32 = 6;

/// First AMD family (Zen) with RAPL registers.
pub const AMD_MIN_FAMILY: u32 = 0x17;

const MAX_CPUS: usize = 1024;
const ENERGY_COUNTER_MASK: u64 = 0xffff_ffff;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CpuVendor {
    Intel,
    Amd,
    Other(String),
}

impl CpuVendor {
    fn from_vendor_id(id: &str) -> Self {
        match id {
            "GenuineIntel" => CpuVendor::Intel,
            "AuthenticAMD" => CpuVendor::Amd,
            other => CpuVendor::Other(other.to_string()),
        }
    }
}

impl fmt::Display for CpuVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuVendor::Intel => write!(f, "Intel"),
            CpuVendor::Amd => write!(f, "AMD"),
            CpuVendor::Other(id) => write!(f, "{}", id),
        }
    }
}

/// Vendor, family and model of the first processor listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuIdentity {
    pub vendor: CpuVendor,
    pub family: u32,
    pub model: u32,
}

impl CpuIdentity {
    /// Parse the text of `/proc/cpuinfo`. Returns `None` when any of the
    /// three fields is missing.
    pub fn parse(cpuinfo: &str) -> Option<Self> {
        let mut vendor = None;
        let mut family = None;
        let mut model = None;

        for line in cpuinfo.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "vendor_id" if vendor.is_none() => {
                    vendor = Some(CpuVendor::from_vendor_id(value));
                }
                "cpu family" if family.is_none() => family = value.parse().ok(),
                "model" if model.is_none() => model = value.parse().ok(),
                _ => {}
            }
            if vendor.is_some() && family.is_some() && model.is_some() {
                break;
            }
        }

        Some(Self {
            vendor: vendor?,
            family: family?,
            model: model?,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, EnergyError> {
        let text = std::fs::read_to_string(path).map_err(|source| EnergyError::CpuInfo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).ok_or_else(|| EnergyError::CpuInfo {
            path: path.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::InvalidData,
                "missing vendor_id, cpu family or model",
            ),
        })
    }

    /// Register addresses for this CPU.
    ///
    /// # Errors
    /// `UnsupportedCpu` for vendors or families without package RAPL.
    pub fn registers(&self) -> Result<RaplRegisters, EnergyError> {
        match self.vendor {
            CpuVendor::Intel if self.family == INTEL_FAMILY => Ok(RaplRegisters {
                power_unit: INTEL_RAPL_POWER_UNIT,
                package_energy: INTEL_PKG_ENERGY_STATUS,
            }),
            CpuVendor::Amd if self.family >= AMD_MIN_FAMILY => Ok(RaplRegisters {
                power_unit: AMD_RAPL_POWER_UNIT,
                package_energy: AMD_PKG_ENERGY_STATUS,
            }),
            _ => Err(EnergyError::UnsupportedCpu {
                vendor: self.vendor.to_string(),
                family: self.family,
                model: self.model,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaplRegisters {
    pub power_unit: u64,
    pub package_energy: u64,
}

/// Scaling factors decoded from the power unit register.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaplUnits {
    /// Watts per power count.
    pub power: f64,
    /// Joules per energy count.
    pub energy: f64,
    /// Seconds per time count.
    pub time: f64,
}

impl RaplUnits {
    pub fn decode(raw: u64) -> Self {
        let scale = |bits: u64| 0.5f64.powi(bits as i32);
        Self {
            power: scale(raw & 0xf),
            energy: scale((raw >> 8) & 0x1f),
            time: scale((raw >> 16) & 0xf),
        }
    }
}

/// First CPU of every physical package, ordered by package id.
///
/// Walks `cpuN/topology/physical_package_id` under `cpu_root` from CPU 0
/// until the first missing entry.
pub fn detect_packages(cpu_root: &Path) -> Result<Vec<usize>, EnergyError> {
    let mut first_cpu: BTreeMap<u32, usize> = BTreeMap::new();

    for cpu in 0..MAX_CPUS {
        let path = cpu_root
            .join(format!("cpu{}", cpu))
            .join("topology")
            .join("physical_package_id");
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => break,
            Err(source) => return Err(EnergyError::CpuInfo { path, source }),
        };
        let package: u32 = text.trim().parse().map_err(|_| EnergyError::CpuInfo {
            path: path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, "package id is not a number"),
        })?;
        first_cpu.entry(package).or_insert(cpu);
    }

    if first_cpu.is_empty() {
        return Err(EnergyError::NoPackages {
            path: cpu_root.to_path_buf(),
        });
    }

    Ok(first_cpu.into_values().collect())
}

/// Filesystem locations the reader consults.
#[derive(Debug, Clone)]
pub struct EnergyPaths {
    pub cpuinfo: PathBuf,
    pub cpu_sysfs: PathBuf,
    pub msr_dev: PathBuf,
}

impl Default for EnergyPaths {
    fn default() -> Self {
        Self {
            cpuinfo: PathBuf::from("/proc/cpuinfo"),
            cpu_sysfs: PathBuf::from("/sys/devices/system/cpu"),
            msr_dev: PathBuf::from("/dev/cpu"),
        }
    }
}

/// Per-package energy reader.
#[derive(Debug)]
pub struct EnergyReader {
    identity: CpuIdentity,
    registers: RaplRegisters,
    msr_dev: PathBuf,
    /// First CPU of each package.
    packages: Vec<usize>,
    /// Joules per count, per package.
    energy_units: Vec<f64>,
}

impl EnergyReader {
    /// Open the reader on the running system.
    pub fn open() -> Result<Self, EnergyError> {
        Self::with_paths(EnergyPaths::default())
    }

    pub fn with_paths(paths: EnergyPaths) -> Result<Self, EnergyError> {
        let identity = CpuIdentity::from_file(&paths.cpuinfo)?;
        let registers = identity.registers()?;
        let packages = detect_packages(&paths.cpu_sysfs)?;

        let energy_units = packages
            .iter()
            .map(|&cpu| {
                read_msr(&paths.msr_dev, cpu, registers.power_unit)
                    .map(|raw| RaplUnits::decode(raw).energy)
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            vendor = %identity.vendor,
            family = identity.family,
            model = identity.model,
            packages = packages.len(),
            "Energy reader ready"
        );

        Ok(Self {
            identity,
            registers,
            msr_dev: paths.msr_dev,
            packages,
            energy_units,
        })
    }

    pub fn identity(&self) -> &CpuIdentity {
        &self.identity
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    /// Joules per counter increment of `package`.
    pub fn energy_unit(&self, package: usize) -> Result<f64, EnergyError> {
        self.energy_units
            .get(package)
            .copied()
            .ok_or(EnergyError::PackageOutOfRange {
                index: package,
                total: self.packages.len(),
            })
    }

    /// Raw 32-bit energy counter of `package`.
    pub fn read_raw(&self, package: usize) -> Result<u64, EnergyError> {
        let cpu = *self
            .packages
            .get(package)
            .ok_or(EnergyError::PackageOutOfRange {
                index: package,
                total: self.packages.len(),
            })?;
        let raw = read_msr(&self.msr_dev, cpu, self.registers.package_energy)?;
        Ok(raw & ENERGY_COUNTER_MASK)
    }

    /// Current energy counter of `package` in joules.
    ///
    /// The value is only meaningful relative to another reading.
    pub fn read_package_energy(&self, package: usize) -> Result<f64, EnergyError> {
        let raw = self.read_raw(package)?;
        Ok(raw as f64 * self.energy_unit(package)?)
    }

    /// Read every package at once.
    pub fn snapshot(&self) -> Result<EnergySnapshot, EnergyError> {
        let counters = (0..self.packages.len())
            .map(|package| self.read_raw(package))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(EnergySnapshot {
            taken: Instant::now(),
            counters,
            units: self.energy_units.clone(),
        })
    }
}

/// Counters of every package at one instant.
#[derive(Debug, Clone)]
pub struct EnergySnapshot {
    taken: Instant,
    counters: Vec<u64>,
    units: Vec<f64>,
}

impl EnergySnapshot {
    pub fn counters(&self) -> &[u64] {
        &self.counters
    }

    /// Joules consumed per package between `self` and `later`.
    pub fn delta(&self, later: &EnergySnapshot) -> Vec<f64> {
        self.counters
            .iter()
            .zip(&later.counters)
            .zip(&self.units)
            .map(|((&before, &after), &unit)| {
                let counts = after.wrapping_sub(before) & ENERGY_COUNTER_MASK;
                counts as f64 * unit
            })
            .collect()
    }

    /// Wall time between `self` and `later`.
    pub fn elapsed_until(&self, later: &EnergySnapshot) -> Duration {
        later.taken.saturating_duration_since(self.taken)
    }
}

fn read_msr(msr_dev: &Path, cpu: usize, register: u64) -> Result<u64, EnergyError> {
    let path = msr_dev.join(cpu.to_string()).join("msr");
    let file = File::open(&path).map_err(|source| EnergyError::MsrOpen { cpu, source })?;
    let mut data = [0u8; 8];
    file.read_exact_at(&mut data, register)
        .map_err(|source| EnergyError::MsrRead {
            cpu,
            register,
            source,
        })?;
    Ok(u64::from_le_bytes(data))
}
