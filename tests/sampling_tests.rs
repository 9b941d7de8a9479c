// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Sampling engine tests against a fake cgroup filesystem layout built in
//! a temporary directory, one mount point per subsystem.

use anyhow::Result;
use cgtop::cgroup::{scan_groups, Subsystem};
use cgtop::CgroupStatTracker;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct FakeHierarchy {
    _tmp: TempDir,
    mounts: BTreeMap<Subsystem, PathBuf>,
}

impl FakeHierarchy {
    fn new(subsystems: &[Subsystem]) -> Result<Self> {
        let tmp = TempDir::new()?;
        let mut mounts = BTreeMap::new();
        for &subsystem in subsystems {
            let root = tmp.path().join(subsystem.name());
            fs::create_dir_all(&root)?;
            write_group_files(subsystem, &root, 0, 0, 1)?;
            mounts.insert(subsystem, root);
        }
        Ok(Self { _tmp: tmp, mounts })
    }

    fn group_dir(&self, subsystem: Subsystem, name: &str) -> PathBuf {
        self.mounts[&subsystem].join(name.trim_start_matches('/'))
    }

    fn add_group(
        &self,
        subsystem: Subsystem,
        name: &str,
        a: u64,
        b: u64,
        nr_procs: u32,
    ) -> Result<()> {
        let dir = self.group_dir(subsystem, name);
        fs::create_dir_all(&dir)?;
        write_group_files(subsystem, &dir, a, b, nr_procs)?;
        Ok(())
    }

    fn remove_group(&self, name: &str) -> Result<()> {
        for root in self.mounts.values() {
            let dir = root.join(name.trim_start_matches('/'));
            if dir.exists() {
                fs::remove_dir_all(&dir)?;
            }
        }
        Ok(())
    }
}

/// Writes the counter files one subsystem directory is expected to carry.
/// For cpuacct `a`/`b` are user/system ticks, for blkio read/write bytes,
/// for memory usage/rss bytes.
fn write_group_files(subsystem: Subsystem, dir: &Path, a: u64, b: u64, nr_procs: u32) -> Result<()> {
    let procs = (0..nr_procs)
        .map(|i| format!("{}\n", 1000 + i))
        .collect::<String>();
    fs::write(dir.join("cgroup.procs"), procs)?;
    match subsystem {
        Subsystem::Cpuacct => {
            fs::write(dir.join("cpuacct.stat"), format!("user {a}\nsystem {b}\n"))?;
        }
        Subsystem::Blkio => {
            fs::write(
                dir.join("blkio.throttle.io_service_bytes"),
                format!("8:0 Read {a}\n8:0 Write {b}\nTotal {}\n", a + b),
            )?;
        }
        Subsystem::Memory => {
            fs::write(dir.join("memory.usage_in_bytes"), format!("{a}\n"))?;
            fs::write(dir.join("memory.stat"), format!("rss {b}\nswap 0\n"))?;
        }
    }
    Ok(())
}

#[test]
fn test_scan_merges_groups_across_subsystems() -> Result<()> {
    let fake = FakeHierarchy::new(&Subsystem::ALL)?;
    fake.add_group(Subsystem::Cpuacct, "/web", 100, 50, 2)?;
    fake.add_group(Subsystem::Memory, "/web", 4096, 2048, 3)?;
    fake.add_group(Subsystem::Blkio, "/batch", 0, 0, 1)?;

    let groups = scan_groups(&fake.mounts)?;
    // The roots merge into "/", and /web merges across two hierarchies.
    assert_eq!(groups.len(), 3);

    let web = &groups["/web"];
    assert!(web.cpu.is_some());
    assert!(web.memory.is_some());
    assert!(web.blkio.is_none());
    assert_eq!(web.nr_procs(), 3);

    let batch = &groups["/batch"];
    assert!(batch.cpu.is_none());
    assert!(batch.blkio.is_some());
    Ok(())
}

#[test]
fn test_initial_scan_has_zero_deltas() -> Result<()> {
    let fake = FakeHierarchy::new(&[Subsystem::Cpuacct])?;
    fake.add_group(Subsystem::Cpuacct, "/busy", 100000, 50000, 1)?;

    let groups = scan_groups(&fake.mounts)?;
    let delta = groups["/busy"].cpu.as_ref().unwrap().delta();
    assert_eq!(delta.user, 0);
    assert_eq!(delta.system, 0);
    Ok(())
}

#[test]
fn test_removed_group_is_dropped_and_others_survive() -> Result<()> {
    let fake = FakeHierarchy::new(&[Subsystem::Cpuacct])?;
    fake.add_group(Subsystem::Cpuacct, "/a", 10, 10, 1)?;
    fake.add_group(Subsystem::Cpuacct, "/b", 10, 10, 1)?;
    fake.add_group(Subsystem::Cpuacct, "/c", 10, 10, 1)?;

    let mut tracker = CgroupStatTracker::new(&fake.mounts)?;
    assert_eq!(tracker.nr_groups(), 4); // "/", /a, /b, /c

    fake.remove_group("/b")?;
    tracker.update()?;
    assert_eq!(tracker.nr_groups(), 3);
    assert!(!tracker.groups.contains_key("/b"));

    let rows = tracker.stats(false, false);
    assert!(rows.iter().all(|row| row.name != "/b"));
    assert!(rows.iter().any(|row| row.name == "/a"));
    assert!(rows.iter().any(|row| row.name == "/c"));

    // B stays gone on later cycles.
    tracker.update()?;
    assert!(!tracker.groups.contains_key("/b"));
    Ok(())
}

#[test]
fn test_counter_growth_shows_up_as_rates() -> Result<()> {
    let fake = FakeHierarchy::new(&[Subsystem::Blkio])?;
    fake.add_group(Subsystem::Blkio, "/io", 0, 0, 1)?;

    let mut tracker = CgroupStatTracker::new(&fake.mounts)?;
    fake.add_group(Subsystem::Blkio, "/io", 1 << 20, 1 << 10, 1)?;
    std::thread::sleep(std::time::Duration::from_millis(20));
    tracker.update()?;

    let rows = tracker.stats(false, false);
    let io = rows.iter().find(|row| row.name == "/io").unwrap();
    assert!(io.bio_read > 0.0);
    assert!(io.bio_write > 0.0);
    assert!(io.bio_read > io.bio_write);
    assert!(io.active);
    Ok(())
}

#[test]
fn test_hide_empty_filters_on_process_count() -> Result<()> {
    let fake = FakeHierarchy::new(&[Subsystem::Memory])?;
    fake.add_group(Subsystem::Memory, "/occupied", 4096, 1024, 2)?;
    fake.add_group(Subsystem::Memory, "/deserted", 4096, 1024, 0)?;

    let mut tracker = CgroupStatTracker::new(&fake.mounts)?;
    tracker.update()?;

    let all = tracker.stats(false, false);
    assert!(all.iter().any(|row| row.name == "/deserted"));

    let non_empty = tracker.stats(true, false);
    assert!(non_empty.iter().all(|row| row.name != "/deserted"));
    assert!(non_empty.iter().any(|row| row.name == "/occupied"));
    Ok(())
}

#[test]
fn test_hide_inactive_filters_on_activity() -> Result<()> {
    let fake = FakeHierarchy::new(&[Subsystem::Blkio])?;
    fake.add_group(Subsystem::Blkio, "/quiet", 0, 0, 1)?;
    fake.add_group(Subsystem::Blkio, "/noisy", 0, 0, 1)?;

    let mut tracker = CgroupStatTracker::new(&fake.mounts)?;
    fake.add_group(Subsystem::Blkio, "/noisy", 4096, 0, 1)?;
    std::thread::sleep(std::time::Duration::from_millis(20));
    tracker.update()?;

    let active_only = tracker.stats(false, true);
    assert!(active_only.iter().any(|row| row.name == "/noisy"));
    assert!(active_only.iter().all(|row| row.name != "/quiet"));
    Ok(())
}
