// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use anyhow::Result;
use procfs::{CpuTime, CurrentSI, KernelStats};

/// Host-wide cumulative CPU time from `/proc/stat`, in clock ticks.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct HostCpuUsage {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl HostCpuUsage {
    /// Ticks spent doing work of any kind.
    pub fn busy(&self) -> u64 {
        self.user + self.nice + self.system + self.irq + self.softirq + self.steal
    }

    pub fn total(&self) -> u64 {
        self.busy() + self.idle + self.iowait
    }
}

fn procfs_cpu_to_usage(stat: &CpuTime) -> HostCpuUsage {
    HostCpuUsage {
        user: stat.user,
        nice: stat.nice,
        system: stat.system,
        idle: stat.idle,
        iowait: stat.iowait.unwrap_or(0),
        irq: stat.irq.unwrap_or(0),
        softirq: stat.softirq.unwrap_or(0),
        steal: stat.steal.unwrap_or(0),
    }
}

/// Tracks the host CPU baseline across samples. The busy-tick delta is the
/// denominator for every per-group CPU percentage.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct HostCpuTracker {
    pub prev: HostCpuUsage,
    pub current: HostCpuUsage,
}

impl HostCpuTracker {
    pub fn update(&mut self) -> Result<()> {
        let kernel_stats = KernelStats::current()?;
        self.prev = std::mem::replace(&mut self.current, procfs_cpu_to_usage(&kernel_stats.total));
        Ok(())
    }

    /// Busy ticks elapsed since the previous update, never negative.
    pub fn busy_delta(&self) -> u64 {
        self.current.busy().saturating_sub(self.prev.busy())
    }
}
