// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

pub mod app;
pub mod cgroup;
pub mod cli;
pub mod format;
pub mod host;
pub mod keymap;
pub mod stats;
pub mod tui;

pub use app::sort_rows;
pub use app::App;
pub use app::SortKey;
pub use app::SORTING_KEYS;
pub use cgroup::CounterError;
pub use cgroup::MonitoredGroup;
pub use cgroup::Subsystem;
pub use host::HostCpuTracker;
pub use keymap::Key;
pub use keymap::KeyMap;
pub use stats::CgroupStat;
pub use stats::CgroupStatTracker;
pub use tui::Event;
pub use tui::Tui;

pub const APP: &str = "cgtop";
pub const LICENSE: &str = "Copyright (c) Meta Platforms, Inc. and affiliates.

This software may be used and distributed according to the terms of the
GNU General Public License version 2.";

/// Commands the event loop can apply to the view state. Every key binding
/// resolves to one of these; unbound keys resolve to `None`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd)]
pub enum Action {
    None,
    Tick,
    Render,
    Quit,
    ReverseSorting,
    SortKeyPrev,
    SortKeyNext,
    SortKeyFirst,
    SortKeyLast,
    ToggleHideInactive,
    ToggleHideZero,
    ToggleHideEmpty,
}
