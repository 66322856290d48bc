//! The scheduling loop tying both Firebase streams to the board.
//!
//! Everything runs on one task. Each iteration:
//!
//! ```text
//!  1. table stream closed?          ──▶ resubscribe it
//!  2. timers: table/game stale      ──▶ force-reconnect
//!             config due            ──▶ resend mac/eip
//!  3. mailbox: one button name      ──▶ spawn hit write
//!  4. select(table, game, timeout)  ──▶ buffer bytes, drain frames
//!                                        table frames first, then game
//!  5. sleep
//! ```
//!
//! Every wait in the loop is bounded by a sub-second timeout, so a silent
//! stream or an absent board never stalls the other work.

pub mod connection;

pub use connection::{Connection, StreamKind};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::bridge::{LocalChannel, Message};
use crate::config::Config;
use crate::device;
use crate::firebase::{redacted, Endpoints, Frame, PutEvent, RemoteStore};
use crate::session::Session;
use crate::timer::Timer;

/// Timing knobs of the loop.
#[derive(Debug, Clone, Copy)]
pub struct Intervals {
    pub table: Duration,
    pub game: Duration,
    pub config: Duration,
    pub poll_timeout: Duration,
    pub loop_delay: Duration,
}

impl Default for Intervals {
    fn default() -> Self {
        Intervals {
            table: Duration::from_secs(60),
            game: Duration::from_secs(5),
            config: Duration::from_secs(10),
            poll_timeout: Duration::from_millis(100),
            loop_delay: Duration::from_millis(100),
        }
    }
}

impl From<&Config> for Intervals {
    fn from(config: &Config) -> Self {
        Intervals {
            table: Duration::from_secs(config.table_interval_secs),
            game: Duration::from_secs(config.game_interval_secs),
            config: Duration::from_secs(config.config_interval_secs),
            poll_timeout: Duration::from_millis(config.poll_timeout_ms),
            loop_delay: Duration::from_millis(config.loop_delay_ms),
        }
    }
}

pub struct Dispatcher {
    session: Session,
    endpoints: Endpoints,
    remote: Arc<dyn RemoteStore>,
    channel: Box<dyn LocalChannel>,
    intervals: Intervals,
    table: Connection,
    game: Connection,
    config_timer: Timer,
}

impl Dispatcher {
    pub fn new(
        session: Session,
        endpoints: Endpoints,
        remote: Arc<dyn RemoteStore>,
        channel: Box<dyn LocalChannel>,
        intervals: Intervals,
    ) -> Self {
        Dispatcher {
            session,
            endpoints,
            remote,
            channel,
            intervals,
            table: Connection::new(StreamKind::Table),
            game: Connection::new(StreamKind::Game),
            config_timer: Timer::new(),
        }
    }

    #[cfg(test)]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[cfg(test)]
    pub fn table(&self) -> &Connection {
        &self.table
    }

    #[cfg(test)]
    pub fn game(&self) -> &Connection {
        &self.game
    }

    /// Run until `stop` flips to true, then close everything.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) {
        info!(
            "Dispatcher started for board {} (channel: {}, intervals: {:?})",
            self.session.device(),
            self.channel.name(),
            self.intervals
        );
        self.start().await;

        while !*stop.borrow() {
            self.tick().await;
            tokio::select! {
                _ = tokio::time::sleep(self.intervals.loop_delay) => {}
                // A dropped sender disables this branch; only the flag stops us then.
                Ok(()) = stop.changed() => {}
            }
        }

        info!("Stop requested, closing connections");
        self.shutdown().await;
    }

    /// Push the board configuration, then open the table stream.
    pub async fn start(&mut self) {
        self.send_configuration().await;
        self.config_timer.reset();
        self.subscribe_table().await;
    }

    /// One pass of the loop, without the trailing sleep.
    pub async fn tick(&mut self) {
        if !self.table.is_open() {
            self.subscribe_table().await;
        }
        self.check_timers().await;
        self.poll_channel().await;
        self.poll_streams().await;
    }

    pub async fn shutdown(&mut self) {
        self.table.close();
        self.game.close();
        self.channel.close().await;
    }

    async fn check_timers(&mut self) {
        if self.table.past(self.intervals.table) {
            debug!("[table] Refreshing after {:?}", self.intervals.table);
            self.subscribe_table().await;
        }
        if self.session.game_id().is_some() && self.game.past(self.intervals.game) {
            debug!("[game] Refreshing after {:?}", self.intervals.game);
            self.subscribe_game().await;
        }
        if self.config_timer.past(self.intervals.config) {
            self.send_configuration().await;
            self.config_timer.reset();
        }
    }

    async fn subscribe_table(&mut self) {
        match self.endpoints.table(self.session.device()) {
            Ok(url) => self.table.reopen(self.remote.as_ref(), url).await,
            Err(e) => warn!("[table] {:#}", e),
        }
    }

    /// Point the game connection at the tracked game, closing the old one.
    async fn subscribe_game(&mut self) {
        let Some(game_id) = self.session.game_id() else {
            self.game.close();
            return;
        };
        match self.endpoints.game(game_id) {
            Ok(url) => self.game.reopen(self.remote.as_ref(), url).await,
            Err(e) => {
                warn!("[game] {:#}", e);
                self.game.close();
            }
        }
    }

    async fn poll_channel(&mut self) {
        if !self.channel.begin().await {
            return;
        }
        match self.channel.read_message(self.intervals.poll_timeout).await {
            Ok(Some(raw)) => {
                let name = raw.trim();
                if name.is_empty() {
                    debug!("Ignoring blank mailbox message");
                } else {
                    self.on_button_press(name);
                }
            }
            Ok(None) => {}
            Err(e) => debug!("Discarding mailbox message: {}", e),
        }
    }

    async fn poll_streams(&mut self) {
        let table_open = self.table.is_open();
        let game_open = self.game.is_open();
        let table = &mut self.table;
        let game = &mut self.game;

        let ready = tokio::time::timeout(self.intervals.poll_timeout, async {
            tokio::select! {
                biased;
                chunk = table.recv(), if table_open => Some((StreamKind::Table, chunk)),
                chunk = game.recv(), if game_open => Some((StreamKind::Game, chunk)),
                else => None,
            }
        })
        .await;

        if let Ok(Some((kind, chunk))) = ready {
            match kind {
                StreamKind::Table => self.table.ingest(chunk),
                StreamKind::Game => self.game.ingest(chunk),
            };
        }
        self.table.drain_ready();
        self.game.drain_ready();

        // Table first: a game switch must land before frames from either
        // game connection are routed.
        while let Some(frame) = self.table.next_frame() {
            match frame {
                Frame::Put(put) => self.on_table_update(put).await,
                Frame::Discarded(why) => trace!("[table] Discarded frame: {}", why),
            }
        }
        while let Some(frame) = self.game.next_frame() {
            match frame {
                Frame::Put(put) => self.on_game_update(put).await,
                Frame::Discarded(why) => trace!("[game] Discarded frame: {}", why),
            }
        }
    }

    async fn on_table_update(&mut self, put: PutEvent) {
        if let Some(switch) = self.session.apply_table_update(&put) {
            info!(
                "[table] Game changed: {} -> {}",
                switch.previous.as_deref().unwrap_or("none"),
                switch.current.as_deref().unwrap_or("none")
            );
            self.subscribe_game().await;
        }
    }

    async fn on_game_update(&mut self, put: PutEvent) {
        if let Some(score) = self.session.apply_game_update(&put) {
            debug!("[game] Score {} - {}", score.team_1, score.team_2);
            self.send(Message::Score(score)).await;
        }
    }

    /// Record a hit for `button_name` without blocking the loop.
    fn on_button_press(&self, button_name: &str) {
        let button_id = self.session.button_id(button_name);
        let url = match self.endpoints.hits(&button_id) {
            Ok(url) => url,
            Err(e) => {
                warn!("Cannot record button {}: {:#}", button_id, e);
                return;
            }
        };

        let remote = Arc::clone(&self.remote);
        tokio::spawn(async move {
            info!("sending button> {}", redacted(&url));
            match remote.record_hit(&url).await {
                Ok(body) => info!("sending button< {}", body),
                Err(e) => warn!("Button {} not recorded: {:#}", button_id, e),
            }
        });
    }

    async fn send_configuration(&mut self) {
        let ip = device::local_ip();
        self.send(Message::Mac(self.session.device().clone())).await;
        self.send(Message::Eip(ip)).await;
    }

    async fn send(&mut self, message: Message) {
        if !self.channel.begin().await {
            debug!("Board unavailable, dropping {}", message);
            return;
        }
        if let Err(e) = self.channel.send_message(&message.to_string()).await {
            warn!("Mailbox send of {} failed: {}", message, e);
        }
    }
}
