// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use cgtop::cgroup;
use cgtop::cli::Cli;
use cgtop::Action;
use cgtop::App;
use cgtop::CgroupStatTracker;
use cgtop::Event;
use cgtop::Key;
use cgtop::KeyMap;
use cgtop::Tui;
use cgtop::APP;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::event::KeyCode::Char;
use simplelog::{LevelFilter, WriteLogger};
use std::fs::File;
use std::io::Write;
use std::time::Duration;

fn get_action(keymap: &KeyMap, event: &Event) -> Action {
    match event {
        Event::Tick => Action::Tick,
        Event::Resize(_, _) => Action::Render,
        Event::Key(key) => match key.code {
            Char(c) => keymap.action(&Key::Char(c)),
            _ => keymap.action(&Key::Code(key.code)),
        },
        _ => Action::None,
    }
}

async fn run_batch(app: &mut App, delay: Duration) -> Result<()> {
    let mut stdout = std::io::stdout();
    loop {
        app.on_tick()?;
        for line in app.batch_lines() {
            writeln!(stdout, "{line}")?;
        }
        stdout.flush()?;
        if app.should_quit {
            return Ok(());
        }
        tokio::time::sleep(delay).await;
    }
}

async fn run_tui(app: &mut App, keymap: KeyMap, delay: Duration) -> Result<()> {
    let mut tui = Tui::new(delay.as_millis() as u64)?;
    tui.enter()?;

    loop {
        let event = tui.next().await?;
        if let Event::Error = event {
            bail!("terminal event stream failed");
        }
        let action = get_action(&keymap, &event);
        app.handle_action(&action)?;

        // Redraw only when the state just advanced a tick or the terminal
        // geometry changed; key commands become visible on the next tick.
        if matches!(action, Action::Tick | Action::Render) {
            let mut render_result = Ok(());
            tui.draw(|frame| render_result = app.render(frame))?;
            render_result?;
        }
        if app.should_quit {
            break;
        }
    }
    tui.exit().await?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    if args.debug {
        WriteLogger::init(
            LevelFilter::Debug,
            simplelog::Config::default(),
            File::create(format!("{APP}.log"))?,
        )?;
    }
    let keymap = KeyMap::default();

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(async {
            let mounts = cgroup::subsystem_mounts().context("failed to read cgroup mounts")?;
            if mounts.is_empty() {
                bail!("no cgroup subsystem hierarchies are mounted");
            }
            let stats = CgroupStatTracker::new(&mounts)?;
            let mut app = App::new(stats, &args);

            let delay = Duration::from_secs_f64(args.delay_seconds.max(0.001));
            if args.batch {
                run_batch(&mut app, delay).await
            } else {
                run_tui(&mut app, keymap, delay).await
            }
        })
}
