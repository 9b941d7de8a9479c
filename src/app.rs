// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! The presentation controller. Owns the view state (sort key, direction
//! and visibility flags), applies it to each tick's snapshot rows and lays
//! them out as fixed-width lines for either the interactive display or the
//! batch stream.

use crate::cli::Cli;
use crate::format::{
    byps_to_str, byte_count_to_str, percent_to_str, MAX_WIDTH_BLKIO, MAX_WIDTH_CPU,
    MAX_WIDTH_MEMORY,
};
use crate::stats::{CgroupStat, CgroupStatTracker};
use crate::Action;
use anyhow::{bail, Result};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::Paragraph;
use ratatui::Frame;
use std::time::Instant;

const SUBSYS_SEP: &str = "  ";
const ITEM_SEP: &str = " ";
const NR_PROCS_WIDTH: usize = 4;

/// The fields a snapshot can be sorted by, in column order.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum SortKey {
    CpuUser,
    CpuSystem,
    BioRead,
    BioWrite,
    MemTotal,
    MemRss,
    MemSwap,
    NrProcs,
    Name,
}

pub const SORTING_KEYS: [SortKey; 9] = [
    SortKey::CpuUser,
    SortKey::CpuSystem,
    SortKey::BioRead,
    SortKey::BioWrite,
    SortKey::MemTotal,
    SortKey::MemRss,
    SortKey::MemSwap,
    SortKey::NrProcs,
    SortKey::Name,
];

impl SortKey {
    /// The column title shown in the header line.
    pub fn title(&self) -> &'static str {
        match self {
            SortKey::CpuUser => "USR",
            SortKey::CpuSystem => "SYS",
            SortKey::BioRead => "READ",
            SortKey::BioWrite => "WRITE",
            SortKey::MemTotal => "TOTAL",
            SortKey::MemRss => "RSS",
            SortKey::MemSwap => "SWAP",
            SortKey::NrProcs => "#",
            SortKey::Name => "NAME",
        }
    }
}

/// Stable sort by the given key; equal keys keep their snapshot order.
pub fn sort_rows(rows: &mut [CgroupStat], key: SortKey, reverse: bool) {
    rows.sort_by(|a, b| {
        let ord = match key {
            SortKey::CpuUser => a.cpu_user.total_cmp(&b.cpu_user),
            SortKey::CpuSystem => a.cpu_system.total_cmp(&b.cpu_system),
            SortKey::BioRead => a.bio_read.total_cmp(&b.bio_read),
            SortKey::BioWrite => a.bio_write.total_cmp(&b.bio_write),
            SortKey::MemTotal => a.mem_total.cmp(&b.mem_total),
            SortKey::MemRss => a.mem_rss.cmp(&b.mem_rss),
            SortKey::MemSwap => a.mem_swap.cmp(&b.mem_swap),
            SortKey::NrProcs => a.nr_procs.cmp(&b.nr_procs),
            SortKey::Name => a.name.cmp(&b.name),
        };
        if reverse {
            ord.reverse()
        } else {
            ord
        }
    });
}

fn center(s: &str, width: usize) -> String {
    format!("{s:^width$}")
}

/// The subsystem group header, each title centered over its column span.
pub fn subsys_title() -> String {
    let cpu_width = 2 * MAX_WIDTH_CPU + ITEM_SEP.len();
    let blkio_width = 2 * MAX_WIDTH_BLKIO + ITEM_SEP.len();
    let memory_width = 3 * MAX_WIDTH_MEMORY + 2 * ITEM_SEP.len();
    [
        format!("[{}]", center("CPUACCT", cpu_width - 2)),
        format!("[{}]", center("BLKIO", blkio_width - 2)),
        format!("[{}]", center("MEMORY", memory_width - 2)),
    ]
    .join(SUBSYS_SEP)
}

/// Each column title padded to its column, with the separator that
/// precedes it, in layout order. Concatenating the strings yields the full
/// item header line.
fn item_titles() -> Vec<(SortKey, String)> {
    vec![
        (SortKey::CpuUser, center("USR", MAX_WIDTH_CPU)),
        (
            SortKey::CpuSystem,
            format!("{ITEM_SEP}{}", center("SYS", MAX_WIDTH_CPU)),
        ),
        (
            SortKey::BioRead,
            format!("{SUBSYS_SEP}{}", center("READ", MAX_WIDTH_BLKIO)),
        ),
        (
            SortKey::BioWrite,
            format!("{ITEM_SEP}{}", center("WRITE", MAX_WIDTH_BLKIO)),
        ),
        (
            SortKey::MemTotal,
            format!("{SUBSYS_SEP}{}", center("TOTAL", MAX_WIDTH_MEMORY)),
        ),
        (
            SortKey::MemRss,
            format!("{ITEM_SEP}{}", center("RSS", MAX_WIDTH_MEMORY)),
        ),
        (
            SortKey::MemSwap,
            format!("{ITEM_SEP}{}", center("SWAP", MAX_WIDTH_MEMORY)),
        ),
        (
            SortKey::NrProcs,
            format!("{SUBSYS_SEP}{:>NR_PROCS_WIDTH$}", "#"),
        ),
        (SortKey::Name, format!("{ITEM_SEP}NAME")),
    ]
}

/// The item header as a plain line, for the batch stream.
pub fn item_title() -> String {
    item_titles().into_iter().map(|(_, s)| s).collect()
}

pub struct App {
    pub stats: CgroupStatTracker,
    pub rows: Vec<CgroupStat>,
    pub sort_key: SortKey,
    pub sort_reverse: bool,
    pub hide_inactive: bool,
    pub hide_zero: bool,
    pub hide_empty: bool,
    pub debug: bool,
    pub iterations: Option<u32>,
    pub completed: u32,
    pub should_quit: bool,
    pub last_collect_ms: f64,
}

impl App {
    /// Creates a new App with view state seeded from the CLI.
    pub fn new(stats: CgroupStatTracker, args: &Cli) -> Self {
        Self {
            stats,
            rows: Vec::new(),
            sort_key: SortKey::Name,
            sort_reverse: false,
            hide_inactive: args.hide_inactive,
            hide_zero: args.hide_zero,
            hide_empty: args.hide_empty,
            debug: args.debug,
            iterations: args.iterations,
            completed: 0,
            should_quit: false,
            last_collect_ms: 0.0,
        }
    }

    /// Runs one sampling cycle and rebuilds the visible rows.
    pub fn on_tick(&mut self) -> Result<()> {
        let collect_start = Instant::now();
        self.stats.update()?;
        self.last_collect_ms = collect_start.elapsed().as_secs_f64() * 1000.0;

        let mut rows = self.stats.stats(self.hide_empty, self.hide_inactive);
        sort_rows(&mut rows, self.sort_key, self.sort_reverse);
        self.rows = rows;

        self.completed += 1;
        if let Some(iterations) = self.iterations {
            if self.completed >= iterations {
                self.should_quit = true;
            }
        }
        Ok(())
    }

    /// Moves the sort key along the fixed key list, clamping at the ends.
    pub fn adjust_sort_key(&mut self, delta: isize) {
        let now = SORTING_KEYS
            .iter()
            .position(|key| *key == self.sort_key)
            .unwrap_or(0) as isize;
        let new = (now + delta).clamp(0, SORTING_KEYS.len() as isize - 1);
        self.sort_key = SORTING_KEYS[new as usize];
    }

    /// Applies an action to the view state. View changes become visible on
    /// the next tick.
    pub fn handle_action(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::Tick => self.on_tick()?,
            Action::Quit => self.should_quit = true,
            Action::ReverseSorting => self.sort_reverse = !self.sort_reverse,
            Action::SortKeyPrev => self.adjust_sort_key(-1),
            Action::SortKeyNext => self.adjust_sort_key(1),
            Action::SortKeyFirst => self.adjust_sort_key(-(SORTING_KEYS.len() as isize)),
            Action::SortKeyLast => self.adjust_sort_key(SORTING_KEYS.len() as isize),
            Action::ToggleHideInactive => self.hide_inactive = !self.hide_inactive,
            Action::ToggleHideZero => self.hide_zero = !self.hide_zero,
            Action::ToggleHideEmpty => self.hide_empty = !self.hide_empty,
            Action::Render | Action::None => {}
        }
        Ok(())
    }

    fn cell(&self, formatted: String, zero: bool, width: usize) -> String {
        if self.hide_zero && zero {
            " ".repeat(width)
        } else {
            format!("{formatted:>width$}")
        }
    }

    /// Lays out one row in the same column structure as the headers.
    pub fn format_row(&self, row: &CgroupStat) -> String {
        let cpu = [
            self.cell(percent_to_str(row.cpu_user), row.cpu_user == 0.0, MAX_WIDTH_CPU),
            self.cell(
                percent_to_str(row.cpu_system),
                row.cpu_system == 0.0,
                MAX_WIDTH_CPU,
            ),
        ]
        .join(ITEM_SEP);
        let blkio = [
            self.cell(byps_to_str(row.bio_read), row.bio_read == 0.0, MAX_WIDTH_BLKIO),
            self.cell(
                byps_to_str(row.bio_write),
                row.bio_write == 0.0,
                MAX_WIDTH_BLKIO,
            ),
        ]
        .join(ITEM_SEP);
        let memory = [
            self.cell(
                byte_count_to_str(row.mem_total),
                row.mem_total == 0,
                MAX_WIDTH_MEMORY,
            ),
            self.cell(
                byte_count_to_str(row.mem_rss),
                row.mem_rss == 0,
                MAX_WIDTH_MEMORY,
            ),
            self.cell(
                byte_count_to_str(row.mem_swap),
                row.mem_swap == 0,
                MAX_WIDTH_MEMORY,
            ),
        ]
        .join(ITEM_SEP);
        let tail = format!("{:>NR_PROCS_WIDTH$}{}{}", row.nr_procs, ITEM_SEP, row.name);
        [cpu, blkio, memory, tail].join(SUBSYS_SEP)
    }

    fn timing_msg(&self) -> String {
        format!("{:.1} msec to collect statistics", self.last_collect_ms)
    }

    /// The item header with the active sort column highlighted.
    fn item_title_line(&self) -> Line<'static> {
        let header_style = Style::default().add_modifier(Modifier::REVERSED);
        let spans = item_titles()
            .into_iter()
            .map(|(key, text)| {
                if key == self.sort_key {
                    Span::styled(text, header_style.add_modifier(Modifier::BOLD))
                } else {
                    Span::styled(text, header_style)
                }
            })
            .collect::<Vec<_>>();
        Line::from(spans)
    }

    /// Renders the interactive display, truncating rows to the visible
    /// height. The frame must at least fit the headers and the fixed
    /// columns.
    pub fn render(&mut self, frame: &mut Frame) -> Result<()> {
        let area = frame.area();
        let nr_headers = if self.debug { 3 } else { 2 };
        if (area.height as usize) < nr_headers + 1 || (area.width as usize) < item_title().len() {
            bail!(
                "terminal too small for display: {}x{}",
                area.width,
                area.height
            );
        }

        let header_style = Style::default().add_modifier(Modifier::REVERSED);
        let mut lines: Vec<Line> = Vec::new();
        if self.debug {
            lines.push(Line::from(self.timing_msg()));
        }
        lines.push(Line::styled(subsys_title(), header_style));
        lines.push(self.item_title_line());

        let visible = (area.height as usize).saturating_sub(lines.len());
        for row in self.rows.iter().take(visible) {
            lines.push(Line::from(self.format_row(row)));
        }
        frame.render_widget(Paragraph::new(Text::from(lines)), area);
        Ok(())
    }

    /// One cycle of batch output: timing line, both headers, every
    /// visible row.
    pub fn batch_lines(&self) -> Vec<String> {
        let mut lines = vec![self.timing_msg(), subsys_title(), item_title()];
        lines.extend(self.rows.iter().map(|row| self.format_row(row)));
        lines
    }
}
