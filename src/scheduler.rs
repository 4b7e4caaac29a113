// src/scheduler.rs - Background maintenance: expiry sweeps and joke injection
use std::sync::{Arc, Mutex as StdMutex, Weak};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use rand::{rngs::StdRng, SeedableRng};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};

use crate::{
    lifecycle, Config, EventDice, ExpiryPolicy, JokeGenerator, NoteStore, NotesError, RngDice,
    Result, SweepReport,
};

type SharedStatus = Arc<StdMutex<MaintenanceStatus>>;
type BoxedDice = Box<dyn EventDice + Send>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceStatus {
    /// Whether the scheduler is running
    pub is_running: bool,
    /// When the last sweep finished
    pub last_sweep_time: Option<DateTime<Utc>>,
    /// Records removed by the last sweep
    pub last_sweep_removed: usize,
    /// Joke notes created since start
    pub jokes_injected: usize,
}

#[derive(Debug)]
pub enum MaintenanceCommand {
    /// Sweep immediately, optionally reporting the outcome
    SweepNow(Option<oneshot::Sender<Result<SweepReport>>>),
    /// Turn joke injection on or off
    SetJokesEnabled(bool),
    /// Stop the scheduler task
    Stop,
}

pub struct MaintenanceScheduler {
    config: Config,

    /// Channel to the scheduler task
    command_tx: mpsc::Sender<MaintenanceCommand>,

    scheduler_task: Option<JoinHandle<()>>,

    /// Shared with the task, which updates it after each event
    status: SharedStatus,

    storage: Option<Weak<Mutex<NoteStore>>>,

    jokes_enabled: bool,

    /// Randomness for the joke generator, consumed by `start`
    dice: Option<BoxedDice>,
}

impl MaintenanceScheduler {
    pub fn new(config: Config) -> Self {
        debug!("Initializing maintenance scheduler with config: {:?}", config);
        let (command_tx, _) = mpsc::channel(10);

        Self {
            config,
            command_tx,
            scheduler_task: None,
            status: Arc::new(StdMutex::new(MaintenanceStatus::default())),
            storage: None,
            jokes_enabled: true,
            dice: None,
        }
    }

    /// Replaces the entropy-seeded dice used for jokes.
    pub fn with_dice(mut self, dice: impl EventDice + Send + 'static) -> Self {
        self.dice = Some(Box::new(dice));
        self
    }

    /// Set the weak reference to the note store
    pub fn set_storage(&mut self, storage: &Arc<Mutex<NoteStore>>) {
        self.storage = Some(Arc::downgrade(storage));
        debug!("Storage reference set in MaintenanceScheduler.");
    }

    pub async fn start(&mut self) -> Result<()> {
        if self.scheduler_task.is_some() {
            debug!("Maintenance scheduler already running");
            return Ok(());
        }

        let storage = match &self.storage {
            Some(weak) if weak.upgrade().is_some() => weak.clone(),
            Some(_) => {
                error!("NoteStore reference is no longer valid.");
                return Err(NotesError::ApplicationError {
                    message: "NoteStore reference is no longer valid.".to_string(),
                });
            }
            None => {
                error!("No storage reference found in MaintenanceScheduler.");
                return Err(NotesError::ApplicationError {
                    message: "MaintenanceScheduler does not have a storage reference.".to_string(),
                });
            }
        };

        let (command_tx, command_rx) = mpsc::channel(10);
        self.command_tx = command_tx;

        let dice: BoxedDice = match self.dice.take() {
            Some(dice) => dice,
            None => Box::new(RngDice(StdRng::from_entropy())),
        };
        let worker = Worker {
            storage,
            status: Arc::clone(&self.status),
            policy: self.config.expiry_policy(),
            sweep_every: Duration::from_secs(self.config.sweep_interval_secs),
            joke_window: (
                self.config.joke_interval_min_secs,
                self.config.joke_interval_max_secs,
            ),
            jokes: JokeGenerator::new(dice, self.config.joke_probability),
            jokes_enabled: self.jokes_enabled,
        };

        info!(
            "Starting maintenance scheduler (sweep every {}s)",
            self.config.sweep_interval_secs
        );
        self.scheduler_task = Some(tokio::spawn(worker.run(command_rx)));
        update_status(&self.status, |status| status.is_running = true);

        Ok(())
    }

    /// Stop the scheduler if it's running
    pub async fn stop(&mut self) -> Result<()> {
        let Some(task) = self.scheduler_task.take() else {
            debug!("Maintenance scheduler is not running");
            return Ok(());
        };

        if let Err(e) = self.command_tx.send(MaintenanceCommand::Stop).await {
            warn!("Failed to send stop command to maintenance scheduler: {}", e);
        }

        let joined = task.await;
        update_status(&self.status, |status| status.is_running = false);
        joined.map_err(|e| {
            let message = format!("Failed to stop maintenance scheduler: {}", e);
            error!("{}", message);
            NotesError::SchedulerFailed { message }
        })?;

        info!("Maintenance scheduler stopped");
        Ok(())
    }

    /// Sweeps right away and waits for the report.
    pub async fn sweep_now(&self) -> Result<SweepReport> {
        if self.scheduler_task.is_none() {
            return Err(NotesError::SchedulerFailed {
                message: "Maintenance scheduler is not running".to_string(),
            });
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(MaintenanceCommand::SweepNow(Some(reply_tx)))
            .await?;

        reply_rx.await.map_err(|e| NotesError::SchedulerFailed {
            message: format!("Sweep result was dropped: {}", e),
        })?
    }

    pub async fn set_jokes_enabled(&mut self, enabled: bool) -> Result<()> {
        self.jokes_enabled = enabled;
        if self.scheduler_task.is_some() {
            self.send(MaintenanceCommand::SetJokesEnabled(enabled))
                .await?;
        }
        Ok(())
    }

    pub fn get_status(&self) -> MaintenanceStatus {
        match self.status.lock() {
            Ok(status) => status.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    async fn send(&self, command: MaintenanceCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|e| NotesError::SchedulerFailed {
                message: format!("Failed to send scheduler command: {}", e),
            })
    }
}

impl Drop for MaintenanceScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.scheduler_task.take() {
            task.abort();
        }
    }
}

fn update_status(status: &SharedStatus, change: impl FnOnce(&mut MaintenanceStatus)) {
    match status.lock() {
        Ok(mut guard) => change(&mut guard),
        Err(poisoned) => change(&mut poisoned.into_inner()),
    }
}

/// State owned by the spawned scheduler task.
struct Worker {
    storage: Weak<Mutex<NoteStore>>,
    status: SharedStatus,
    policy: ExpiryPolicy,
    sweep_every: Duration,
    joke_window: (u64, u64),
    jokes: JokeGenerator<BoxedDice>,
    jokes_enabled: bool,
}

impl Worker {
    async fn run(mut self, mut command_rx: mpsc::Receiver<MaintenanceCommand>) {
        let mut sweep_interval = time::interval(self.sweep_every);
        sweep_interval.tick().await; // Initial tick, startup already swept

        let joke_timer = time::sleep(self.next_joke_delay());
        tokio::pin!(joke_timer);

        loop {
            tokio::select! {
                _ = sweep_interval.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!("Scheduled sweep failed: {}", e);
                    }
                }
                _ = &mut joke_timer => {
                    self.roll_joke().await;
                    joke_timer.as_mut().reset(Instant::now() + self.next_joke_delay());
                }
                command = command_rx.recv() => match command {
                    Some(MaintenanceCommand::SweepNow(reply)) => {
                        let result = self.sweep().await;
                        match reply {
                            Some(reply) => {
                                let _ = reply.send(result);
                            }
                            None => {
                                if let Err(e) = result {
                                    error!("Manual sweep failed: {}", e);
                                }
                            }
                        }
                    }
                    Some(MaintenanceCommand::SetJokesEnabled(enabled)) => {
                        info!("Jokes {}", if enabled { "enabled" } else { "disabled" });
                        self.jokes_enabled = enabled;
                    }
                    Some(MaintenanceCommand::Stop) | None => {
                        info!("Maintenance scheduler stopping...");
                        break;
                    }
                }
            }
        }
    }

    fn next_joke_delay(&mut self) -> Duration {
        let (min, max) = self.joke_window;
        self.jokes.next_delay(min, max)
    }

    fn store(&self) -> Result<Arc<Mutex<NoteStore>>> {
        self.storage.upgrade().ok_or_else(|| NotesError::SchedulerFailed {
            message: "NoteStore was dropped".to_string(),
        })
    }

    async fn sweep(&mut self) -> Result<SweepReport> {
        let storage = self.store()?;
        let report = {
            let mut store = storage.lock().await;
            lifecycle::sweep(&mut store, &self.policy)?
        };

        if report.removed_count() > 0 {
            info!("Sweep removed {} notes", report.removed_count());
        }
        update_status(&self.status, |status| {
            status.last_sweep_time = Some(Utc::now());
            status.last_sweep_removed = report.removed_count();
        });
        Ok(report)
    }

    async fn roll_joke(&mut self) {
        if !self.jokes_enabled {
            return;
        }
        let storage = match self.store() {
            Ok(storage) => storage,
            Err(e) => {
                warn!("Skipping joke: {}", e);
                return;
            }
        };

        let injected = {
            let mut store = storage.lock().await;
            self.jokes.maybe_inject(&mut store, true)
        };
        match injected {
            Ok(Some(_)) => update_status(&self.status, |status| status.jokes_injected += 1),
            Ok(None) => {}
            Err(e) => error!("Failed to save joke note: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NoteFields;
    use tempfile::TempDir;

    /// Always triggers, but only schedules the first roll right away.
    struct FirstRollDice {
        delays: usize,
    }

    impl EventDice for FirstRollDice {
        fn roll(&mut self, _p: f64) -> bool {
            true
        }

        fn pick(&mut self, _len: usize) -> usize {
            0
        }

        fn delay_secs(&mut self, _min: u64, max: u64) -> u64 {
            self.delays += 1;
            if self.delays == 1 {
                0
            } else {
                max
            }
        }
    }

    fn shared_store(dir: &TempDir) -> Arc<Mutex<NoteStore>> {
        Arc::new(Mutex::new(NoteStore::new(dir.path().join("notes.json"))))
    }

    fn quiet_config(dir: &TempDir) -> Config {
        Config {
            joke_interval_min_secs: 3600,
            joke_interval_max_secs: 3600,
            ..Config::default().with_data_dir(dir.path())
        }
    }

    #[tokio::test]
    async fn test_start_requires_storage() {
        let dir = TempDir::new().unwrap();
        let mut scheduler = MaintenanceScheduler::new(quiet_config(&dir));
        assert!(scheduler.start().await.is_err());
        assert!(scheduler.sweep_now().await.is_err());
        assert!(!scheduler.get_status().is_running);
    }

    #[tokio::test]
    async fn test_sweep_now_removes_expired_notes() {
        let dir = TempDir::new().unwrap();
        let storage = shared_store(&dir);
        let id = storage
            .lock()
            .await
            .upsert_at(
                None,
                NoteFields::new("old", "").temporary(true),
                Utc::now() - chrono::Duration::days(31),
            )
            .unwrap()
            .unwrap();

        let mut scheduler = MaintenanceScheduler::new(quiet_config(&dir));
        scheduler.set_storage(&storage);
        scheduler.start().await.unwrap();
        assert!(scheduler.get_status().is_running);

        let report = scheduler.sweep_now().await.unwrap();
        assert_eq!(report.removed_count(), 1);
        assert!(!storage.lock().await.contains(&id));

        let status = scheduler.get_status();
        assert_eq!(status.last_sweep_removed, 1);
        assert!(status.last_sweep_time.is_some());

        scheduler.stop().await.unwrap();
        assert!(!scheduler.get_status().is_running);
    }

    #[tokio::test]
    async fn test_joke_timer_injects_notes() {
        let dir = TempDir::new().unwrap();
        let storage = shared_store(&dir);

        let mut scheduler =
            MaintenanceScheduler::new(quiet_config(&dir)).with_dice(FirstRollDice { delays: 0 });
        scheduler.set_storage(&storage);
        scheduler.start().await.unwrap();

        for _ in 0..100 {
            if scheduler.get_status().jokes_injected > 0 {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        scheduler.stop().await.unwrap();

        assert_eq!(scheduler.get_status().jokes_injected, 1);
        let store = storage.lock().await;
        let joke = store.notes().next().unwrap();
        assert_eq!(joke.category, crate::JOKE_CATEGORY);
        assert!(joke.temporary);
    }

    #[tokio::test]
    async fn test_disabled_jokes_are_not_injected() {
        let dir = TempDir::new().unwrap();
        let storage = shared_store(&dir);

        let mut scheduler =
            MaintenanceScheduler::new(quiet_config(&dir)).with_dice(FirstRollDice { delays: 0 });
        scheduler.set_jokes_enabled(false).await.unwrap();
        scheduler.set_storage(&storage);
        scheduler.start().await.unwrap();

        // A round trip through the command channel lets the first joke timer fire.
        time::sleep(Duration::from_millis(50)).await;
        scheduler.sweep_now().await.unwrap();
        scheduler.stop().await.unwrap();

        assert_eq!(scheduler.get_status().jokes_injected, 0);
        assert!(storage.lock().await.is_empty());
    }
}
