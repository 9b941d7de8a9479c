// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use clap::Parser;

#[derive(Clone, Debug, Parser)]
#[command(author, version, about = "A top-like monitor for cgroup resource usage", long_about = None)]
pub struct Cli {
    /// Hide inactive groups.
    #[arg(short = 'i', long, default_value_t = false)]
    pub hide_inactive: bool,
    /// Blank zero values instead of printing them.
    #[arg(short = 'z', long, default_value_t = false)]
    pub hide_zero: bool,
    /// Hide groups with no attached processes.
    #[arg(short = 'e', long, default_value_t = false)]
    pub hide_empty: bool,
    /// Non-interactive mode, print each cycle to stdout.
    #[arg(short = 'b', long, default_value_t = false)]
    pub batch: bool,
    /// Number of iterations before ending.
    #[arg(short = 'n', long = "iter", value_name = "NUM")]
    pub iterations: Option<u32>,
    /// Delay between iterations in seconds.
    #[arg(short = 'd', long = "delay", value_name = "SEC", default_value_t = 1.0)]
    pub delay_seconds: f64,
    /// Show collection timing.
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}
