//! The application manager: the single writer of all runtime state.
//!
//! # Run loop
//!
//! Each tick of [`ApplicationManager::run`] performs, in order:
//!
//! ```text
//! DrainCommands ─► EvaluateCarousel ─► AdvanceActiveProgram ─► sleep
//! ```
//!
//! Producers never touch manager state.  They enqueue [`Command`]s through a
//! [`CommandSender`] and read the published [`ManagerStatus`].  The manager is
//! the only component that builds, advances, stops and cleans up programs, so
//! exactly one program owns the display at any time.
//!
//! # Crash isolation
//!
//! A program that returns an error from `advance` (or panics in any lifecycle
//! call) is treated as crashed: it gets a best-effort `cleanup`, the manager
//! continues with no active program, and nothing about the crash is persisted.
//!
//! # Persistence
//!
//! After every mutating command the manager writes a [`PersistedSnapshot`]
//! through its [`StateRepository`].  A failed write is logged and never
//! changes in-memory state.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use retroboard_core::{
    merge_config, Carousel, CarouselState, Command, DisplaySurface, GlobalSettings,
    PersistedCarousel, PersistedSnapshot, PlaylistEntry, Program, ProgramConfig, ProgramContext,
    ProgramRegistry, RuntimeError, SetupError, StopHandle,
};

use crate::application::command_queue::{CommandQueue, CommandSender};
use crate::application::persistence::StateRepository;
use crate::application::status::{CrashReport, LifecycleState, ManagerStatus};

/// Default upper bound on the run loop's sleep.
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_millis(100);

/// Default soft limit for a single `advance` call.
pub const DEFAULT_ADVANCE_BUDGET: Duration = Duration::from_millis(250);

/// Why a switch to a program did not happen.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown program `{0}`")]
    UnknownProgram(String),

    #[error("program failed to start: {0}")]
    Setup(#[from] SetupError),
}

/// Timing knobs for the run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerOptions {
    /// Longest the loop sleeps between ticks, with or without an active
    /// program.  Bounds command latency.
    pub idle_interval: Duration,
    /// `advance` calls slower than this are logged at `warn`.
    pub advance_budget: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            idle_interval: DEFAULT_IDLE_INTERVAL,
            advance_budget: DEFAULT_ADVANCE_BUDGET,
        }
    }
}

/// The program currently owning the display.
struct ActiveProgram {
    name: String,
    instance: Box<dyn Program>,
    stop: StopHandle,
    /// Earliest instant at which `advance` may run again.
    next_advance: Option<Instant>,
}

/// Owns the active program, the carousel, per-program configuration, global
/// settings and the display surface.
pub struct ApplicationManager {
    registry: Arc<ProgramRegistry>,
    surface: Box<dyn DisplaySurface>,
    store: Box<dyn StateRepository>,
    queue: CommandQueue,
    active: Option<ActiveProgram>,
    lifecycle: LifecycleState,
    last_crash: Option<CrashReport>,
    program_configs: BTreeMap<String, ProgramConfig>,
    last_program: Option<String>,
    settings: GlobalSettings,
    carousel: Carousel,
    /// Cleared by `Quit`.
    running: bool,
    /// Cleared from outside (signal handler) to request a graceful shutdown.
    running_flag: Arc<AtomicBool>,
    /// Set by `restore` when no snapshot was found.
    fresh_start: bool,
    status_tx: watch::Sender<ManagerStatus>,
    options: ManagerOptions,
}

impl ApplicationManager {
    /// Creates a manager with no active program.
    ///
    /// The surface's current brightness becomes the initial global setting
    /// until [`restore`](Self::restore) loads a snapshot.
    pub fn new(
        registry: Arc<ProgramRegistry>,
        surface: Box<dyn DisplaySurface>,
        store: Box<dyn StateRepository>,
        options: ManagerOptions,
    ) -> Self {
        let settings = GlobalSettings {
            brightness: surface.brightness(),
        };
        let (status_tx, _) = watch::channel(ManagerStatus::default());
        let manager = Self {
            registry,
            surface,
            store,
            queue: CommandQueue::new(),
            active: None,
            lifecycle: LifecycleState::Stopped,
            last_crash: None,
            program_configs: BTreeMap::new(),
            last_program: None,
            settings,
            carousel: Carousel::new(Instant::now()),
            running: true,
            running_flag: Arc::new(AtomicBool::new(true)),
            fresh_start: true,
            status_tx,
            options,
        };
        manager.publish();
        manager
    }

    // ── Producer / reader handles ────────────────────────────────────────────

    /// A new handle producers can enqueue commands through.
    pub fn sender(&self) -> CommandSender {
        self.queue.sender()
    }

    /// Enqueues `command`; it is applied on the next tick.
    pub fn enqueue(&self, command: Command) -> bool {
        self.queue.sender().enqueue(command)
    }

    /// A receiver that always holds the latest [`ManagerStatus`].
    pub fn subscribe(&self) -> watch::Receiver<ManagerStatus> {
        self.status_tx.subscribe()
    }

    /// The shared flag that keeps the run loop alive.  Storing `false` requests
    /// a graceful shutdown at the next tick.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running_flag)
    }

    // ── Startup ──────────────────────────────────────────────────────────────

    /// Loads the persisted snapshot and rebuilds in-memory state from it.
    ///
    /// Does not start any program; see [`resume`](Self::resume).
    pub fn restore(&mut self) {
        let snapshot = self.store.load();
        if snapshot.is_empty() {
            info!("no saved state found; starting fresh");
            self.fresh_start = true;
            self.publish();
            return;
        }
        self.fresh_start = false;

        self.program_configs = snapshot.program_configs;
        self.last_program = snapshot.last_program;

        let brightness = GlobalSettings::clamp_brightness(i64::from(snapshot.settings.brightness));
        self.settings.brightness = brightness;
        self.surface.set_brightness(brightness);

        let known: Vec<PlaylistEntry> = self.known_entries(snapshot.carousel.playlist.clone());
        let index = if known.len() == snapshot.carousel.playlist.len() {
            snapshot.carousel.index
        } else {
            0
        };
        let persisted = PersistedCarousel {
            enabled: snapshot.carousel.enabled,
            playlist: known,
            index,
        };
        self.carousel = Carousel::restore(&persisted, Instant::now());

        info!(
            last_program = ?self.last_program,
            brightness,
            carousel = self.carousel.is_rotating(),
            "restored saved state"
        );
        self.publish();
    }

    /// Starts the program the restored state calls for.
    ///
    /// In priority order: the current carousel entry when the carousel
    /// rotates; the last program if it is still registered; and, only when no
    /// snapshot existed, `fallback` or else the first registered program.
    /// Returns the name of the program that was started.
    pub fn resume(&mut self, fallback: Option<&str>) -> Option<String> {
        let target = if let Some(entry) = self.carousel.current().filter(|_| self.carousel.is_rotating())
        {
            Some(entry.program.clone())
        } else if let Some(last) = self.last_program.clone() {
            if self.registry.contains(&last) {
                Some(last)
            } else {
                warn!(program = %last, "last program is no longer registered; not resuming");
                None
            }
        } else if self.fresh_start {
            fallback
                .filter(|name| self.registry.contains(name))
                .map(str::to_owned)
                .or_else(|| self.registry.names().into_iter().next())
        } else {
            None
        };

        let name = target?;
        if self.start(&name, ProgramConfig::new()) {
            Some(name)
        } else {
            None
        }
    }

    /// Switches to `name` immediately, outside the queue.
    ///
    /// `config` is merged over the program's remembered configuration.
    /// Returns `false` if the program is unknown or failed to start.
    pub fn start(&mut self, name: &str, config: ProgramConfig) -> bool {
        let started = match self.switch_to(name, &config) {
            Ok(()) => {
                self.persist();
                true
            }
            Err(e) => {
                error!(program = %name, error = %e, "could not start program");
                false
            }
        };
        self.publish();
        started
    }

    // ── Run loop ─────────────────────────────────────────────────────────────

    /// Runs ticks until `Quit` is dispatched or the running flag is cleared,
    /// then shuts down gracefully.  Blocks the calling thread.
    pub fn run(&mut self) {
        info!("application manager started");
        loop {
            let now = Instant::now();
            if !self.tick_at(now) {
                break;
            }
            let pause = self.sleep_duration(Instant::now());
            if !pause.is_zero() {
                std::thread::sleep(pause);
            }
        }
        self.shutdown();
        info!("application manager stopped");
    }

    /// Executes one tick as if the current time were `now`.
    ///
    /// Returns `false` when the loop should exit.  After `Quit` the remaining
    /// commands of the same drain are still applied, but the carousel and the
    /// active program are not advanced again.
    pub fn tick_at(&mut self, now: Instant) -> bool {
        if !self.running_flag.load(Ordering::Relaxed) {
            self.running = false;
        }

        for command in self.queue.drain() {
            self.dispatch(command, now);
        }

        if self.running {
            self.evaluate_carousel(now);
            self.advance_active(now);
        }

        self.publish();
        self.running
    }

    /// Graceful termination: the active program is stopped with its
    /// configuration captured, `last_program` is kept, and state is persisted.
    pub fn shutdown(&mut self) {
        self.running = false;
        if self.active.is_some() {
            self.stop_active();
            self.persist();
        }
        self.publish();
    }

    fn sleep_duration(&self, now: Instant) -> Duration {
        let idle = self.options.idle_interval;
        match self.active.as_ref().and_then(|active| active.next_advance) {
            Some(due) => due.saturating_duration_since(now).min(idle),
            None if self.active.is_some() => Duration::ZERO,
            None => idle,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn current_program_name(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.name.as_str())
    }

    /// The live configuration of `name` if it is active, otherwise its stored
    /// configuration.
    pub fn program_config(&self, name: &str) -> Option<ProgramConfig> {
        match &self.active {
            Some(active) if active.name == name => Some(active.instance.config()),
            _ => self.program_configs.get(name).cloned(),
        }
    }

    pub fn carousel_state(&self) -> &CarouselState {
        self.carousel.state()
    }

    pub fn settings(&self) -> GlobalSettings {
        self.settings
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.lifecycle
    }

    /// The most recent crash, if any program has crashed since startup.
    pub fn last_crash(&self) -> Option<&CrashReport> {
        self.last_crash.as_ref()
    }

    pub fn last_program(&self) -> Option<&str> {
        self.last_program.as_deref()
    }

    pub fn surface(&self) -> &dyn DisplaySurface {
        self.surface.as_ref()
    }

    /// `false` once `Quit` was dispatched or shutdown ran.
    pub fn is_running(&self) -> bool {
        self.running
    }

    // ── Dispatch ─────────────────────────────────────────────────────────────

    fn dispatch(&mut self, command: Command, now: Instant) {
        debug!(action = command.action(), "dispatching command");
        match command {
            Command::Switch { program, config } => match self.switch_to(&program, &config) {
                Ok(()) => self.persist(),
                Err(DispatchError::UnknownProgram(name)) => {
                    warn!(program = %name, "switch ignored: unknown program");
                }
                Err(e) => error!(program = %program, error = %e, "switch failed"),
            },

            Command::Stop => {
                if self.stop_active().is_none() {
                    debug!("stop requested with no active program");
                }
                self.last_program = None;
                self.persist();
            }

            Command::SetConfig { key, value } => self.set_active_config(&key, value),

            Command::SetProgramConfig { program, config } => {
                self.set_program_config(&program, &config);
            }

            Command::SetSettings { brightness } => {
                let clamped = GlobalSettings::clamp_brightness(brightness);
                if i64::from(clamped) != brightness {
                    debug!(requested = brightness, applied = clamped, "brightness clamped");
                }
                self.settings.brightness = clamped;
                self.surface.set_brightness(clamped);
                info!(brightness = clamped, "brightness changed");
                self.persist();
            }

            Command::SetCarousel { enabled, playlist } => {
                let playlist = self.known_entries(playlist);
                let first = self
                    .carousel
                    .configure(enabled, playlist, now)
                    .map(str::to_owned);
                info!(
                    enabled,
                    entries = self.carousel.state().playlist.len(),
                    "carousel configured"
                );
                if let Some(first) = first {
                    if let Err(e) = self.switch_to(&first, &ProgramConfig::new()) {
                        error!(program = %first, error = %e, "carousel could not start its first entry");
                    }
                }
                self.persist();
            }

            Command::Quit => {
                info!("quit requested");
                self.running = false;
            }
        }
    }

    fn set_active_config(&mut self, key: &str, value: serde_json::Value) {
        let Some(active) = self.active.as_mut() else {
            warn!(key, "config change ignored: no program is active");
            return;
        };

        let instance = &mut active.instance;
        let outcome = guarded(|| {
            instance.update_config(key, value);
            instance.config()
        });
        match outcome {
            Ok(config) => {
                debug!(program = %active.name, key, "config updated");
                self.program_configs.insert(active.name.clone(), config);
                self.persist();
            }
            Err(message) => {
                self.crash(RuntimeError::Panicked(message));
            }
        }
    }

    fn set_program_config(&mut self, program: &str, patch: &ProgramConfig) {
        if !self.registry.contains(program) {
            warn!(program, "program config ignored: unknown program");
            return;
        }

        let stored = self.program_configs.entry(program.to_owned()).or_default();
        let changed = merge_config(stored, patch);
        debug!(program, changed = changed.len(), "program config merged");

        let mut crashed = None;
        if let Some(active) = self.active.as_mut().filter(|a| a.name == program) {
            let instance = &mut active.instance;
            let applied = guarded(|| {
                for key in &changed {
                    if let Some(value) = patch.get(key) {
                        instance.update_config(key, value.clone());
                    }
                }
            });
            if let Err(message) = applied {
                crashed = Some(RuntimeError::Panicked(message));
            }
        }

        match crashed {
            Some(err) => self.crash(err),
            None => self.persist(),
        }
    }

    /// Drops playlist entries that name unregistered programs.
    fn known_entries(&self, playlist: Vec<PlaylistEntry>) -> Vec<PlaylistEntry> {
        playlist
            .into_iter()
            .filter(|entry| {
                let known = self.registry.contains(&entry.program);
                if !known {
                    warn!(program = %entry.program, "dropping carousel entry for unknown program");
                }
                known
            })
            .collect()
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Stops the active program and starts `name` with its remembered
    /// configuration merged with `overrides`.  Does not persist.
    fn switch_to(&mut self, name: &str, overrides: &ProgramConfig) -> Result<(), DispatchError> {
        if !self.registry.contains(name) {
            return Err(DispatchError::UnknownProgram(name.to_owned()));
        }

        self.stop_active();

        let mut config = self.program_configs.get(name).cloned().unwrap_or_default();
        merge_config(&mut config, overrides);

        let (stop, signal) = StopHandle::pair();
        let context = ProgramContext {
            width: self.surface.width(),
            height: self.surface.height(),
            config,
            stop: signal,
        };
        let mut instance = self
            .registry
            .build(name, context)
            .ok_or_else(|| DispatchError::UnknownProgram(name.to_owned()))?;

        let surface = self.surface.as_mut();
        let setup = match guarded(|| instance.setup(surface)) {
            Ok(result) => result,
            Err(message) => Err(SetupError::Panicked(message)),
        };

        if let Err(e) = setup {
            stop.raise();
            let surface = self.surface.as_mut();
            if let Err(message) = guarded(|| instance.cleanup(surface)) {
                warn!(program = %name, panic = %message, "cleanup after failed setup panicked");
            }
            self.lifecycle = LifecycleState::Stopped;
            return Err(DispatchError::Setup(e));
        }

        let instance_config = match guarded(|| instance.config()) {
            Ok(config) => config,
            Err(message) => {
                warn!(program = %name, panic = %message, "config() panicked after setup");
                ProgramConfig::new()
            }
        };
        self.program_configs.insert(name.to_owned(), instance_config);
        self.last_program = Some(name.to_owned());
        self.lifecycle = LifecycleState::Running;
        self.active = Some(ActiveProgram {
            name: name.to_owned(),
            instance,
            stop,
            next_advance: None,
        });
        info!(program = %name, "program started");
        Ok(())
    }

    /// Stops the active program after capturing its configuration.
    ///
    /// Returns the name of the program that was stopped.
    fn stop_active(&mut self) -> Option<String> {
        let mut active = self.active.take()?;
        info!(program = %active.name, "stopping program");

        match guarded(|| active.instance.config()) {
            Ok(config) => {
                self.program_configs.insert(active.name.clone(), config);
            }
            Err(message) => {
                warn!(program = %active.name, panic = %message, "config() panicked during stop");
            }
        }

        active.stop.raise();
        let instance = &mut active.instance;
        let surface = self.surface.as_mut();
        let finished = guarded(|| {
            instance.stop();
            instance.cleanup(surface);
        });
        if let Err(message) = finished {
            error!(program = %active.name, panic = %message, "program panicked while stopping");
        }

        self.lifecycle = LifecycleState::Stopped;
        Some(active.name)
    }

    /// Drops the active program after a failure.  Nothing is captured or
    /// persisted and `last_program` is left untouched.
    fn crash(&mut self, err: RuntimeError) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        error!(program = %active.name, error = %err, "program crashed; continuing without it");

        active.stop.raise();
        let instance = &mut active.instance;
        let surface = self.surface.as_mut();
        if let Err(message) = guarded(|| instance.cleanup(surface)) {
            warn!(program = %active.name, panic = %message, "cleanup after crash panicked");
        }
        self.lifecycle = LifecycleState::Stopped;
        self.last_crash = Some(CrashReport {
            program: active.name,
            error: err.to_string(),
        });
    }

    fn evaluate_carousel(&mut self, now: Instant) {
        let Some(next) = self.carousel.evaluate(now) else {
            return;
        };
        info!(program = %next, "carousel rotating");
        match self.switch_to(&next, &ProgramConfig::new()) {
            Ok(()) => self.persist(),
            Err(e) => error!(program = %next, error = %e, "carousel switch failed"),
        }
    }

    fn advance_active(&mut self, now: Instant) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.next_advance.is_some_and(|due| now < due) {
            return;
        }

        let instance = &mut active.instance;
        let surface = self.surface.as_mut();
        let started = Instant::now();
        let outcome = guarded(|| instance.advance(surface));
        let elapsed = started.elapsed();

        if elapsed > self.options.advance_budget {
            warn!(
                program = %active.name,
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = self.options.advance_budget.as_millis() as u64,
                "advance overran its budget"
            );
        }

        match outcome {
            Ok(Ok(())) => {
                let interval = active.instance.frame_interval();
                active.next_advance = Some(now + interval);
            }
            Ok(Err(err)) => self.crash(err),
            Err(message) => self.crash(RuntimeError::Panicked(message)),
        }
    }

    // ── Persistence & status ─────────────────────────────────────────────────

    fn snapshot(&self) -> PersistedSnapshot {
        PersistedSnapshot {
            last_program: self.last_program.clone(),
            program_configs: self.program_configs.clone(),
            settings: self.settings,
            carousel: self.carousel.to_persisted(),
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.snapshot()) {
            error!(error = %e, "failed to persist state; in-memory state unchanged");
        }
    }

    fn publish(&self) {
        self.status_tx.send_replace(ManagerStatus {
            current_program: self.current_program_name().map(str::to_owned),
            lifecycle: self.lifecycle,
            last_crash: self.last_crash.clone(),
            program_configs: self.program_configs.clone(),
            brightness: self.settings.brightness,
            carousel: self.carousel.to_persisted(),
            running: self.running,
        });
    }
}

/// Runs `f`, turning a panic into its message.
fn guarded<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(panic_message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
