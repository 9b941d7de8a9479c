// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! The sampling engine. Owns the monitored-group mapping and the host CPU
//! baseline, refreshes counters once per tick and derives per-interval
//! rates. Groups created after startup are not discovered; groups removed
//! mid-run are dropped silently.

use crate::cgroup::{scan_groups, CounterError, MonitoredGroup, Subsystem};
use crate::host::HostCpuTracker;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

/// One snapshot row: the derived metrics of a single group for the most
/// recent interval. CPU is in percent of host busy time, block I/O in
/// bytes per second, memory in absolute bytes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CgroupStat {
    pub name: String,
    pub nr_procs: u32,
    pub cpu_user: f64,
    pub cpu_system: f64,
    pub bio_read: f64,
    pub bio_write: f64,
    pub mem_total: u64,
    pub mem_rss: u64,
    pub mem_swap: u64,
    pub active: bool,
}

/// Builds the snapshot row for a group given the shared per-tick deltas.
/// `cpu_delta == 0` (first tick or an idle host) yields zero percentages
/// rather than dividing by zero.
pub fn stat_row(group: &MonitoredGroup, cpu_delta: u64, time_delta: f64) -> CgroupStat {
    let mut row = CgroupStat {
        name: group.name.clone(),
        nr_procs: group.nr_procs(),
        ..Default::default()
    };
    if let Some(cpu) = &group.cpu {
        if cpu_delta != 0 {
            let delta = cpu.delta();
            row.cpu_user = delta.user as f64 * 100.0 / cpu_delta as f64;
            row.cpu_system = delta.system as f64 * 100.0 / cpu_delta as f64;
        }
    }
    if let Some(blkio) = &group.blkio {
        if time_delta > 0.0 {
            let delta = blkio.delta();
            row.bio_read = delta.read as f64 / time_delta;
            row.bio_write = delta.write as f64 / time_delta;
        }
    }
    if let Some(memory) = &group.memory {
        row.mem_total = memory.current.total;
        row.mem_rss = memory.current.rss;
        row.mem_swap = memory.current.swap;
    }
    row.active = row.cpu_user > 0.0
        || row.cpu_system > 0.0
        || row.bio_read > 0.0
        || row.bio_write > 0.0
        || row.mem_total > 0
        || row.mem_rss > 0
        || row.mem_swap > 0;
    row
}

/// Tracks every monitored group across refresh cycles.
#[derive(Debug)]
pub struct CgroupStatTracker {
    pub groups: BTreeMap<String, MonitoredGroup>,
    host: HostCpuTracker,
    last_sample: Instant,
    cpu_delta: u64,
    time_delta: f64,
}

impl CgroupStatTracker {
    /// Scans the given subsystem mount points and takes the initial
    /// counter and host CPU baselines.
    pub fn new(mounts: &BTreeMap<Subsystem, PathBuf>) -> Result<Self> {
        let groups = scan_groups(mounts).context("failed to scan cgroup hierarchies")?;
        let mut host = HostCpuTracker::default();
        host.update()?;
        Ok(Self {
            groups,
            host,
            last_sample: Instant::now(),
            cpu_delta: 0,
            time_delta: 0.0,
        })
    }

    /// Refreshes all counters and the shared per-tick deltas. A group
    /// whose counters report removal is dropped after the full update
    /// pass; any other counter failure is fatal.
    pub fn update(&mut self) -> Result<()> {
        let mut removed = Vec::new();
        for (name, group) in self.groups.iter_mut() {
            match group.refresh() {
                Ok(()) => {}
                Err(CounterError::Removed) => removed.push(name.clone()),
                Err(CounterError::Io(err)) => {
                    return Err(err)
                        .with_context(|| format!("failed to refresh counters of {name}"))
                }
            }
        }
        for name in &removed {
            log::debug!("cgroup {name} was removed, dropping");
            self.groups.remove(name);
        }

        self.host.update()?;
        self.cpu_delta = self.host.busy_delta();
        let now = Instant::now();
        self.time_delta = now.duration_since(self.last_sample).as_secs_f64();
        self.last_sample = now;
        Ok(())
    }

    /// Returns the snapshot rows for the current interval. `hide_empty`
    /// is applied here, before row construction, since emptiness depends
    /// on the raw process count rather than derived rates.
    pub fn stats(&self, hide_empty: bool, hide_inactive: bool) -> Vec<CgroupStat> {
        self.groups
            .values()
            .filter(|group| !(hide_empty && group.nr_procs() == 0))
            .map(|group| stat_row(group, self.cpu_delta, self.time_delta))
            .filter(|row| !(hide_inactive && !row.active))
            .collect()
    }

    pub fn nr_groups(&self) -> usize {
        self.groups.len()
    }
}
