use std::{sync::Arc, time::Duration};

use chrono::Utc;
use run_tracker_lib::{geo_path::GeoPath, location_fix::LocationFix, run_summary::RunSummary};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::{JoinHandle, JoinSet},
    time::{Instant, Interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    ingestor::ConvertedFix, Collaborators, Command, FinishedSession, LocationIngestor, NotificationSync, RunStore,
    SessionError, SessionStateMachine, Settings, StateBus, TrackerConfig, TrackerSnapshot, Transition,
};

/// Where the location source pushes its fixes. Cheap to clone, usable from any thread.
#[derive(Clone)]
pub struct LocationSink {
    sender: mpsc::Sender<LocationFix>,
}

impl LocationSink {
    pub async fn push(&self, fix: LocationFix) -> Result<(), SessionError> {
        self.sender.send(fix).await.map_err(|_| SessionError::Closed)
    }

    /// For callback based sources that cannot wait. Fixes are not buffered beyond the queue.
    pub fn try_push(&self, fix: LocationFix) -> Result<(), SessionError> {
        match self.sender.try_send(fix) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Fix queue full, dropping fix");
                Err(SessionError::QueueFull("fix"))
            }
            Err(TrySendError::Closed(_)) => Err(SessionError::Closed),
        }
    }
}

/// Handle to a running session engine.
///
/// Commands and fixes are queued onto a single executor task which owns the
/// session. Observers read everything through the [`StateBus`].
pub struct Tracker {
    commands: mpsc::Sender<Command>,
    fixes: LocationSink,
    bus: StateBus,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Tracker {
    /// Spawns the executor, the conversion worker and the notification sync on the current runtime.
    pub fn start(config: &TrackerConfig, collaborators: Collaborators) -> Self {
        let bus = StateBus::new(config.bus_capacity);
        let cancel = CancellationToken::new();

        let (command_tx, command_rx) = mpsc::channel(config.command_queue.max(1));
        let (fix_tx, fix_rx) = mpsc::channel(config.fix_queue.max(1));
        let (converted_tx, converted_rx) = mpsc::channel(config.fix_queue.max(1));

        let (ingestor, worker) = LocationIngestor::spawn(
            collaborators.converter.clone(),
            config.conversion_timeout,
            config.fix_queue,
            converted_tx,
            cancel.clone(),
        );

        let executor = SessionExecutor {
            machine: SessionStateMachine::new(),
            bus: bus.clone(),
            commands: command_rx,
            fixes: fix_rx,
            converted: converted_rx,
            ingestor,
            ticker: None,
            tick_interval: config.tick_interval,
            store: collaborators.store,
            settings: collaborators.settings,
            saves: JoinSet::new(),
            cancel: cancel.clone(),
        };

        let notifications = NotificationSync::new(bus.clone(), config.timer_precision);

        let tasks = vec![
            tokio::spawn(executor.run()),
            worker,
            tokio::spawn(notifications.run(cancel.clone())),
        ];

        Self {
            commands: command_tx,
            fixes: LocationSink { sender: fix_tx },
            bus,
            cancel,
            tasks,
        }
    }

    pub async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands.send(command).await.map_err(|_| SessionError::Closed)
    }

    pub fn try_send(&self, command: Command) -> Result<(), SessionError> {
        self.commands.try_send(command).map_err(|err| match err {
            TrySendError::Full(_) => SessionError::QueueFull("command"),
            TrySendError::Closed(_) => SessionError::Closed,
        })
    }

    pub fn location_sink(&self) -> LocationSink {
        self.fixes.clone()
    }

    pub fn bus(&self) -> &StateBus {
        &self.bus
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        self.bus.snapshot()
    }

    /// Stops every background task and waits for runs that are still being saved.
    ///
    /// Commands already accepted by [`Tracker::send`] are handled before the executor exits.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(err) = task.await {
                tracing::error!("Tracker task failed: {:?}", err);
            }
        }
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum Event {
    Command(Command),
    Tick,
    Converted(ConvertedFix),
    Fix(LocationFix),
    Shutdown,
}

/// The only owner of session state. Everything that touches it arrives as an event.
struct SessionExecutor {
    machine: SessionStateMachine,
    bus: StateBus,
    commands: mpsc::Receiver<Command>,
    fixes: mpsc::Receiver<LocationFix>,
    converted: mpsc::Receiver<ConvertedFix>,
    ingestor: LocationIngestor,
    ticker: Option<Interval>,
    tick_interval: Duration,
    store: Arc<dyn RunStore>,
    settings: Arc<dyn Settings>,
    saves: JoinSet<()>,
    cancel: CancellationToken,
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

impl SessionExecutor {
    async fn run(mut self) {
        tracing::info!("Session executor started");

        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Event::Shutdown,
                command = self.commands.recv() => match command {
                    Some(command) => Event::Command(command),
                    None => Event::Shutdown,
                },
                _ = next_tick(&mut self.ticker) => Event::Tick,
                Some(converted) = self.converted.recv() => Event::Converted(converted),
                Some(fix) = self.fixes.recv() => Event::Fix(fix),
            };

            match event {
                Event::Command(command) => self.on_command(command),
                Event::Tick => self.on_tick(),
                Event::Converted(converted) => self.on_converted(converted),
                Event::Fix(fix) => self.on_fix(fix),
                Event::Shutdown => break,
            }
        }

        // Commands accepted before shutdown still run, so a queued Stop saves its run.
        self.commands.close();
        while let Some(command) = self.commands.recv().await {
            self.on_command(command);
        }

        self.ticker = None;
        while let Some(result) = self.saves.join_next().await {
            if let Err(err) = result {
                tracing::error!("Run save task failed: {:?}", err);
            }
        }

        tracing::info!("Session executor stopped");
    }

    fn on_command(&mut self, command: Command) {
        let now = Instant::now();

        match self.machine.handle(command, now) {
            Transition::Started(epoch) => {
                tracing::info!("Session {} started", epoch.session);
                self.start_ticker(now);
                self.publish_state();
                self.publish_path();
                self.bus.elapsed_millis().publish(0);
                self.bus.elapsed_seconds().publish(0);
            }
            Transition::Resumed(epoch) => {
                tracing::info!("Session {} resumed, lap {}", epoch.session, epoch.lap);
                self.start_ticker(now);
                self.publish_state();
                self.publish_path();
            }
            Transition::Paused { elapsed_millis } => {
                tracing::info!("Session paused at {} ms", elapsed_millis);
                self.ticker = None;
                self.publish_state();
                self.bus.elapsed_millis().publish(elapsed_millis);
            }
            Transition::Stopped(finished) => {
                tracing::info!("Session {} stopped after {} ms", finished.id, finished.elapsed_millis);
                self.ticker = None;
                self.finalize(finished);
                self.publish_state();
                self.publish_path();
                self.bus.elapsed_millis().publish(0);
                self.bus.elapsed_seconds().publish(0);
            }
            Transition::Ignored => {
                tracing::debug!("Ignoring {:?} while {:?}", command, self.machine.state());
            }
        }
    }

    fn start_ticker(&mut self, now: Instant) {
        let mut ticker = tokio::time::interval_at(now + self.tick_interval, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
    }

    fn on_tick(&mut self) {
        let Some(tick) = self.machine.tick(Instant::now()) else {
            self.ticker = None;
            return;
        };

        self.bus.elapsed_millis().publish(tick.elapsed_millis);
        if let Some(second) = tick.second {
            self.bus.elapsed_seconds().publish(second);
        }
    }

    fn on_fix(&mut self, fix: LocationFix) {
        match LocationIngestor::screen(&fix, self.machine.state(), self.machine.epoch()) {
            Ok((point, epoch)) => {
                self.ingestor.dispatch(point, epoch);
            }
            Err(rejection) => rejection.log(),
        }
    }

    fn on_converted(&mut self, converted: ConvertedFix) {
        if self.machine.apply_fix(converted.point, converted.epoch) {
            tracing::debug!("Recorded {:?}", converted.point);
            self.publish_path();
        } else {
            tracing::debug!("Discarding fix from session {} lap {}", converted.epoch.session, converted.epoch.lap);
        }
    }

    /// Hands the run to the store unless nothing was covered.
    fn finalize(&mut self, finished: FinishedSession) {
        while let Some(result) = self.saves.try_join_next() {
            if let Err(err) = result {
                tracing::error!("Run save task failed: {:?}", err);
            }
        }

        let weight = self.settings.body_weight_kg();
        let summary = RunSummary::compute(finished.path, finished.elapsed_millis, weight, Utc::now());

        if summary.distance_meters == 0 {
            tracing::info!("Session {} covered no distance, run not saved", finished.id);
            return;
        }

        tracing::info!(
            "Saving run: {} m in {} ms, {} km/h, {} kcal",
            summary.distance_meters,
            summary.duration_millis,
            summary.avg_speed_kmh,
            summary.calories_burned
        );

        let store = self.store.clone();
        self.saves.spawn(async move {
            if let Err(err) = store.save_run(summary).await {
                tracing::error!("Failed to save run: {:?}", err);
            }
        });
    }

    fn publish_state(&self) {
        self.bus.publish_state(self.machine.state());
    }

    fn publish_path(&self) {
        let path = self.machine.session().map(|session| session.path().clone()).unwrap_or_else(GeoPath::new);
        self.bus.path().publish(Arc::new(path));
    }
}
