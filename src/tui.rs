// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Terminal lifecycle and the event task. One spawned task multiplexes
//! the tick timer with the crossterm input stream and forwards both as
//! [`Event`]s; the main loop consumes them one at a time, so view state is
//! only ever touched from a single logical thread.

use std::{
    io::{stderr, Stderr},
    ops::{Deref, DerefMut},
    time::Duration,
};

use anyhow::anyhow;
use anyhow::Result;
use crossterm::{
    cursor,
    event::{Event as CrosstermEvent, KeyEvent, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::{FutureExt, StreamExt};
use ratatui::backend::CrosstermBackend;
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug)]
pub enum Event {
    Init,
    Error,
    Tick,
    Key(KeyEvent),
    Resize(u16, u16),
}

pub struct Tui {
    pub terminal: ratatui::Terminal<CrosstermBackend<Stderr>>,
    pub task: JoinHandle<()>,
    pub cancellation_token: CancellationToken,
    pub event_rx: UnboundedReceiver<Event>,
    pub event_tx: UnboundedSender<Event>,
    pub tick_rate_ms: u64,
}

impl Tui {
    /// Returns a new Tui.
    pub fn new(tick_rate_ms: u64) -> Result<Self> {
        let terminal = ratatui::Terminal::new(CrosstermBackend::new(stderr()))?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cancellation_token = CancellationToken::new();
        let task = tokio::spawn(async {});
        Ok(Self {
            terminal,
            task,
            cancellation_token,
            event_rx,
            event_tx,
            tick_rate_ms,
        })
    }

    /// Starts the event task.
    pub fn start(&mut self) {
        let tick_delay = Duration::from_millis(self.tick_rate_ms.max(1));
        self.cancel();
        self.cancellation_token = CancellationToken::new();
        let _cancellation_token = self.cancellation_token.clone();
        let _event_tx = self.event_tx.clone();
        self.task = tokio::spawn(async move {
            let mut reader = crossterm::event::EventStream::new();
            let mut tick_interval = tokio::time::interval(tick_delay);
            _event_tx
                .send(Event::Init)
                .expect("Failed to send init event");
            loop {
                let tick = tick_interval.tick();
                let crossterm_event = reader.next().fuse();
                tokio::select! {
                    _ = _cancellation_token.cancelled() => {
                        break;
                    }
                    maybe_event = crossterm_event => {
                        match maybe_event {
                            Some(Ok(evt)) => {
                                match evt {
                                    CrosstermEvent::Key(key) => {
                                        if key.kind == KeyEventKind::Press {
                                            _event_tx.send(Event::Key(key)).expect("Failed to send key event");
                                        }
                                    }
                                    CrosstermEvent::Resize(x, y) => {
                                        _event_tx.send(Event::Resize(x, y)).expect("Failed to send resize event");
                                    }
                                    _ => {}
                                }
                            }
                            Some(Err(_)) => {
                                _event_tx.send(Event::Error).expect("Failed to send error event");
                            }
                            None => {}
                        }
                    }
                    _ = tick => {
                        _event_tx.send(Event::Tick).expect("Failed to send tick event");
                    }
                }
            }
        });
    }

    /// Stops the event task. The runtime is single-threaded, so the task
    /// only makes progress while this awaits; never block the thread
    /// waiting for it.
    pub async fn stop(&mut self) -> Result<()> {
        self.cancel();
        let task = std::mem::replace(&mut self.task, tokio::spawn(async {}));
        task.abort();
        if let Err(err) = task.await {
            if !err.is_cancelled() {
                return Err(err.into());
            }
        }
        Ok(())
    }

    /// Enters the Tui interface.
    pub fn enter(&mut self) -> Result<()> {
        crossterm::terminal::enable_raw_mode()?;
        crossterm::execute!(std::io::stderr(), EnterAlternateScreen)?;
        // Hiding the cursor can fail with misconfigured terminals, for
        // example TERM=xterm-color. This is harmless.
        let _ = crossterm::execute!(std::io::stderr(), cursor::Hide);
        self.start();
        Ok(())
    }

    /// Exits the Tui interface.
    pub async fn exit(&mut self) -> Result<()> {
        self.stop().await?;
        self.restore()
    }

    /// Restores the terminal state. Safe to call more than once; a
    /// terminal already out of raw mode is left alone.
    pub fn restore(&mut self) -> Result<()> {
        if crossterm::terminal::is_raw_mode_enabled()? {
            self.flush()?;
            crossterm::execute!(std::io::stderr(), LeaveAlternateScreen, cursor::Show)?;
            crossterm::terminal::disable_raw_mode()?;
        }
        Ok(())
    }

    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    /// Waits for the next event.
    pub async fn next(&mut self) -> Result<Event> {
        self.event_rx
            .recv()
            .await
            .ok_or(anyhow!("Unable to get event"))
    }
}

impl Deref for Tui {
    type Target = ratatui::Terminal<CrosstermBackend<Stderr>>;

    fn deref(&self) -> &Self::Target {
        &self.terminal
    }
}

impl DerefMut for Tui {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.terminal
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        // Drop cannot await the event task; exit() already reaped it on
        // the normal path, and an abandoned task dies with the runtime.
        self.cancel();
        if let Err(err) = self.restore() {
            log::error!("Failed to restore terminal: {err}");
        }
    }
}
