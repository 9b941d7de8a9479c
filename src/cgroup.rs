// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Access to per-cgroup cumulative counters. Discovers the mounted
//! `cpuacct`, `blkio` and `memory` hierarchies, scans them for groups and
//! reads the raw counter files. Groups are keyed by hierarchy path, so the
//! same group mounted in several subsystem trees merges into one entry.

use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const PROC_MOUNTS: &str = "/proc/mounts";

/// The cgroup subsystems tracked by the monitor.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Subsystem {
    Cpuacct,
    Blkio,
    Memory,
}

impl Subsystem {
    pub const ALL: [Subsystem; 3] = [Subsystem::Cpuacct, Subsystem::Blkio, Subsystem::Memory];

    /// Returns the subsystem name as it appears in mount options.
    pub fn name(&self) -> &'static str {
        match self {
            Subsystem::Cpuacct => "cpuacct",
            Subsystem::Blkio => "blkio",
            Subsystem::Memory => "memory",
        }
    }
}

/// Failure reading a group's counters. `Removed` is the one recoverable
/// case: the group's directory vanished between samples and the group
/// should be dropped from the monitored set.
#[derive(Debug)]
pub enum CounterError {
    Removed,
    Io(io::Error),
}

impl fmt::Display for CounterError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CounterError::Removed => write!(f, "cgroup was removed"),
            CounterError::Io(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for CounterError {}

impl From<io::Error> for CounterError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => CounterError::Removed,
            _ => CounterError::Io(err),
        }
    }
}

fn read_counter_file(path: &Path) -> Result<String, CounterError> {
    Ok(fs::read_to_string(path)?)
}

fn read_counter_u64(path: &Path) -> Result<u64, CounterError> {
    Ok(read_counter_file(path)?.trim().parse().unwrap_or(0))
}

fn count_procs(dir: &Path) -> Result<u32, CounterError> {
    let contents = read_counter_file(&dir.join("cgroup.procs"))?;
    Ok(contents.lines().filter(|l| !l.trim().is_empty()).count() as u32)
}

/// Cumulative CPU accounting from `cpuacct.stat`, in clock ticks.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CpuacctUsage {
    pub user: u64,
    pub system: u64,
}

/// Cumulative block I/O from `blkio.throttle.io_service_bytes`, in bytes,
/// summed across devices.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct BlkioUsage {
    pub read: u64,
    pub write: u64,
}

/// Memory usage from `memory.usage_in_bytes` and `memory.stat`, in bytes.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MemoryUsage {
    pub total: u64,
    pub rss: u64,
    pub swap: u64,
}

/// Parses `cpuacct.stat` ("user N" / "system N" lines).
pub fn parse_cpuacct_stat(contents: &str) -> CpuacctUsage {
    let mut usage = CpuacctUsage::default();
    for line in contents.lines() {
        if let Some((key, value)) = line.split_once(' ') {
            let value = value.trim().parse().unwrap_or(0);
            match key {
                "user" => usage.user = value,
                "system" => usage.system = value,
                _ => {}
            }
        }
    }
    usage
}

/// Parses `blkio.throttle.io_service_bytes` ("MAJ:MIN Op N" lines),
/// summing Read and Write across devices. The trailing "Total" line has no
/// device field and is skipped.
pub fn parse_blkio_bytes(contents: &str) -> BlkioUsage {
    let mut usage = BlkioUsage::default();
    for line in contents.lines() {
        let mut fields = line.split_whitespace();
        let (Some(dev), Some(op), Some(value)) = (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        if !dev.contains(':') {
            continue;
        }
        let value: u64 = value.parse().unwrap_or(0);
        match op {
            "Read" => usage.read += value,
            "Write" => usage.write += value,
            _ => {}
        }
    }
    usage
}

/// Parses `memory.stat` for the rss and swap fields. Kernels without swap
/// accounting omit the swap key, which reads as zero.
pub fn parse_memory_stat(contents: &str, usage_in_bytes: u64) -> MemoryUsage {
    let mut usage = MemoryUsage {
        total: usage_in_bytes,
        ..Default::default()
    };
    for line in contents.lines() {
        if let Some((key, value)) = line.split_once(' ') {
            let value = value.trim().parse().unwrap_or(0);
            match key {
                "rss" => usage.rss = value,
                "swap" => usage.swap = value,
                _ => {}
            }
        }
    }
    usage
}

/// CPU accounting counters for one group, with the previous sample kept
/// for delta computation.
#[derive(Clone, Debug, Default)]
pub struct CpuacctRecord {
    pub dir: PathBuf,
    pub prev: CpuacctUsage,
    pub current: CpuacctUsage,
    pub nr_procs: u32,
}

impl CpuacctRecord {
    pub fn new(dir: PathBuf) -> Result<Self, CounterError> {
        let mut record = Self {
            dir,
            ..Default::default()
        };
        record.refresh()?;
        record.prev = record.current;
        Ok(record)
    }

    pub fn refresh(&mut self) -> Result<(), CounterError> {
        let usage = parse_cpuacct_stat(&read_counter_file(&self.dir.join("cpuacct.stat"))?);
        self.prev = std::mem::replace(&mut self.current, usage);
        self.nr_procs = count_procs(&self.dir)?;
        Ok(())
    }

    pub fn delta(&self) -> CpuacctUsage {
        CpuacctUsage {
            user: self.current.user.saturating_sub(self.prev.user),
            system: self.current.system.saturating_sub(self.prev.system),
        }
    }
}

/// Block I/O counters for one group.
#[derive(Clone, Debug, Default)]
pub struct BlkioRecord {
    pub dir: PathBuf,
    pub prev: BlkioUsage,
    pub current: BlkioUsage,
    pub nr_procs: u32,
}

impl BlkioRecord {
    pub fn new(dir: PathBuf) -> Result<Self, CounterError> {
        let mut record = Self {
            dir,
            ..Default::default()
        };
        record.refresh()?;
        record.prev = record.current;
        Ok(record)
    }

    pub fn refresh(&mut self) -> Result<(), CounterError> {
        let usage = parse_blkio_bytes(&read_counter_file(
            &self.dir.join("blkio.throttle.io_service_bytes"),
        )?);
        self.prev = std::mem::replace(&mut self.current, usage);
        self.nr_procs = count_procs(&self.dir)?;
        Ok(())
    }

    pub fn delta(&self) -> BlkioUsage {
        BlkioUsage {
            read: self.current.read.saturating_sub(self.prev.read),
            write: self.current.write.saturating_sub(self.prev.write),
        }
    }
}

/// Memory counters for one group. Memory is reported as absolute values,
/// so only `current` is consulted for rows, but the previous sample is
/// kept for uniformity with the other records.
#[derive(Clone, Debug, Default)]
pub struct MemoryRecord {
    pub dir: PathBuf,
    pub prev: MemoryUsage,
    pub current: MemoryUsage,
    pub nr_procs: u32,
}

impl MemoryRecord {
    pub fn new(dir: PathBuf) -> Result<Self, CounterError> {
        let mut record = Self {
            dir,
            ..Default::default()
        };
        record.refresh()?;
        record.prev = record.current;
        Ok(record)
    }

    pub fn refresh(&mut self) -> Result<(), CounterError> {
        let usage_in_bytes = read_counter_u64(&self.dir.join("memory.usage_in_bytes"))?;
        let usage = parse_memory_stat(
            &read_counter_file(&self.dir.join("memory.stat"))?,
            usage_in_bytes,
        );
        self.prev = std::mem::replace(&mut self.current, usage);
        self.nr_procs = count_procs(&self.dir)?;
        Ok(())
    }
}

/// One monitored group, merged across every subsystem tree it appears in.
/// A group present in only a subset of the hierarchies is still valid and
/// reports default-zero rates for the missing subsystems.
#[derive(Clone, Debug, Default)]
pub struct MonitoredGroup {
    pub name: String,
    pub cpu: Option<CpuacctRecord>,
    pub blkio: Option<BlkioRecord>,
    pub memory: Option<MemoryRecord>,
}

impl MonitoredGroup {
    pub fn new(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    /// Number of attached processes, taken as the maximum across the
    /// subsystem records so the result does not depend on scan order.
    pub fn nr_procs(&self) -> u32 {
        let mut nr_procs = 0;
        if let Some(cpu) = &self.cpu {
            nr_procs = nr_procs.max(cpu.nr_procs);
        }
        if let Some(blkio) = &self.blkio {
            nr_procs = nr_procs.max(blkio.nr_procs);
        }
        if let Some(memory) = &self.memory {
            nr_procs = nr_procs.max(memory.nr_procs);
        }
        nr_procs
    }

    /// Refreshes every subsystem record of the group.
    pub fn refresh(&mut self) -> Result<(), CounterError> {
        if let Some(cpu) = &mut self.cpu {
            cpu.refresh()?;
        }
        if let Some(blkio) = &mut self.blkio {
            blkio.refresh()?;
        }
        if let Some(memory) = &mut self.memory {
            memory.refresh()?;
        }
        Ok(())
    }
}

/// Returns the mount point of every tracked subsystem, from `/proc/mounts`.
pub fn subsystem_mounts() -> Result<BTreeMap<Subsystem, PathBuf>> {
    Ok(parse_subsystem_mounts(&fs::read_to_string(PROC_MOUNTS)?))
}

fn parse_subsystem_mounts(contents: &str) -> BTreeMap<Subsystem, PathBuf> {
    let mut mounts = BTreeMap::new();
    for line in contents.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 || fields[2] != "cgroup" {
            continue;
        }
        for subsystem in Subsystem::ALL {
            if fields[3].split(',').any(|opt| opt == subsystem.name()) {
                mounts
                    .entry(subsystem)
                    .or_insert_with(|| PathBuf::from(fields[1]));
            }
        }
    }
    mounts
}

/// Scans every mounted subsystem tree and returns the monitored groups
/// keyed by hierarchy path, with initial counter baselines taken.
pub fn scan_groups(
    mounts: &BTreeMap<Subsystem, PathBuf>,
) -> Result<BTreeMap<String, MonitoredGroup>> {
    let mut groups = BTreeMap::new();
    for (&subsystem, root) in mounts {
        scan_tree(subsystem, root, root, &mut groups)?;
    }
    Ok(groups)
}

fn scan_tree(
    subsystem: Subsystem,
    root: &Path,
    dir: &Path,
    groups: &mut BTreeMap<String, MonitoredGroup>,
) -> Result<()> {
    let name = group_name(root, dir);
    let record_dir = dir.to_path_buf();
    // A group can disappear while the scan is running; skip it like any
    // other mid-run removal. The group entry is only created once a
    // record actually attaches.
    match subsystem {
        Subsystem::Cpuacct => match CpuacctRecord::new(record_dir) {
            Ok(record) => group_entry(groups, name).cpu = Some(record),
            Err(CounterError::Removed) => return Ok(()),
            Err(CounterError::Io(err)) => return Err(err.into()),
        },
        Subsystem::Blkio => match BlkioRecord::new(record_dir) {
            Ok(record) => group_entry(groups, name).blkio = Some(record),
            Err(CounterError::Removed) => return Ok(()),
            Err(CounterError::Io(err)) => return Err(err.into()),
        },
        Subsystem::Memory => match MemoryRecord::new(record_dir) {
            Ok(record) => group_entry(groups, name).memory = Some(record),
            Err(CounterError::Removed) => return Ok(()),
            Err(CounterError::Io(err)) => return Err(err.into()),
        },
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            scan_tree(subsystem, root, &entry.path(), groups)?;
        }
    }
    Ok(())
}

fn group_entry(
    groups: &mut BTreeMap<String, MonitoredGroup>,
    name: String,
) -> &mut MonitoredGroup {
    groups
        .entry(name.clone())
        .or_insert_with(|| MonitoredGroup::new(name))
}

fn group_name(root: &Path, dir: &Path) -> String {
    match dir.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => "/".to_string(),
        Ok(rel) => format!("/{}", rel.to_string_lossy()),
        Err(_) => dir.to_string_lossy().into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpuacct_stat() {
        let usage = parse_cpuacct_stat("user 100\nsystem 40\n");
        assert_eq!(usage.user, 100);
        assert_eq!(usage.system, 40);
    }

    #[test]
    fn test_parse_cpuacct_stat_empty() {
        assert_eq!(parse_cpuacct_stat(""), CpuacctUsage::default());
    }

    #[test]
    fn test_parse_blkio_bytes_sums_devices() {
        let contents = "8:0 Read 1024\n\
                        8:0 Write 512\n\
                        8:16 Read 2048\n\
                        8:16 Sync 4096\n\
                        Total 7680\n";
        let usage = parse_blkio_bytes(contents);
        assert_eq!(usage.read, 3072);
        assert_eq!(usage.write, 512);
    }

    #[test]
    fn test_parse_memory_stat_missing_swap() {
        let usage = parse_memory_stat("cache 100\nrss 4096\n", 8192);
        assert_eq!(usage.total, 8192);
        assert_eq!(usage.rss, 4096);
        assert_eq!(usage.swap, 0);
    }

    #[test]
    fn test_parse_memory_stat_with_swap() {
        let usage = parse_memory_stat("rss 4096\nswap 1024\n", 8192);
        assert_eq!(usage.swap, 1024);
    }

    #[test]
    fn test_parse_subsystem_mounts() {
        let contents = "\
            proc /proc proc rw,nosuid 0 0\n\
            cgroup /sys/fs/cgroup/cpu,cpuacct cgroup rw,cpu,cpuacct 0 0\n\
            cgroup /sys/fs/cgroup/blkio cgroup rw,blkio 0 0\n\
            cgroup /sys/fs/cgroup/memory cgroup rw,memory 0 0\n\
            cgroup2 /sys/fs/cgroup/unified cgroup2 rw 0 0\n";
        let mounts = parse_subsystem_mounts(contents);
        assert_eq!(
            mounts.get(&Subsystem::Cpuacct),
            Some(&PathBuf::from("/sys/fs/cgroup/cpu,cpuacct"))
        );
        assert_eq!(
            mounts.get(&Subsystem::Blkio),
            Some(&PathBuf::from("/sys/fs/cgroup/blkio"))
        );
        assert_eq!(
            mounts.get(&Subsystem::Memory),
            Some(&PathBuf::from("/sys/fs/cgroup/memory"))
        );
    }

    #[test]
    fn test_parse_subsystem_mounts_none() {
        assert!(parse_subsystem_mounts("proc /proc proc rw 0 0\n").is_empty());
    }

    #[test]
    fn test_counter_error_from_io() {
        let err = CounterError::from(io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, CounterError::Removed));
        let err = CounterError::from(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, CounterError::Io(_)));
    }

    #[test]
    fn test_nr_procs_is_max_across_records() {
        let mut group = MonitoredGroup::new("/test".to_string());
        group.cpu = Some(CpuacctRecord {
            nr_procs: 2,
            ..Default::default()
        });
        group.memory = Some(MemoryRecord {
            nr_procs: 5,
            ..Default::default()
        });
        assert_eq!(group.nr_procs(), 5);
    }

    #[test]
    fn test_delta_clamps_on_counter_decrease() {
        let record = CpuacctRecord {
            prev: CpuacctUsage {
                user: 100,
                system: 50,
            },
            current: CpuacctUsage {
                user: 90,
                system: 70,
            },
            ..Default::default()
        };
        let delta = record.delta();
        assert_eq!(delta.user, 0);
        assert_eq!(delta.system, 20);
    }
}
