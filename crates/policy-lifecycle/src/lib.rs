//! Process-wide shutdown coordination: an `Activity` RAII token postpones
//! shutdown completion while held, and a `ShutdownSubscription` lets idle
//! loops wake up on either their own timeout or a shutdown request.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;
use tokio::sync::mpsc::{Receiver as MpscReceiver, Sender as MpscSender};
use tokio::sync::watch::{Receiver as WatchReceiver, Sender as WatchSender};

static ACTIVE: OnceLock<Mutex<Option<Activity>>> = OnceLock::new();
static SHUTTING_DOWN: AtomicBool = AtomicBool::new(false);
static STOPPING: OnceLock<ShutdownState> = OnceLock::new();

/// Represents in-flight work that cannot be ruthlessly interrupted: the
/// connection server holds one per in-flight inquiry, the sweeper holds
/// one for the duration of a sweep. While any `Activity` is alive,
/// [`Lifecycle::wait_for_shutdown`] cannot complete.
#[derive(Clone)]
pub struct Activity {
    _tx: MpscSender<()>,
}

impl std::fmt::Debug for Activity {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Activity").finish()
    }
}

impl Activity {
    /// Obtain an Activity token, or `None` if the process is already
    /// shutting down and no new activity may be initiated.
    pub fn get_opt() -> Option<Self> {
        Some(ACTIVE.get()?.lock().unwrap().as_ref()?.clone())
    }

    /// As [`Activity::get_opt`], but a missing `Lifecycle` or an
    /// in-progress shutdown is reported as an error.
    pub fn get() -> anyhow::Result<Self> {
        Self::get_opt().ok_or_else(|| anyhow::anyhow!("shutting down"))
    }

    pub fn is_shutting_down(&self) -> bool {
        SHUTTING_DOWN.load(Ordering::Relaxed)
    }
}

struct ShutdownState {
    tx: WatchSender<()>,
    rx: WatchReceiver<()>,
    request_shutdown_tx: MpscSender<()>,
}

/// A cheaply-cloneable subscription to the process shutdown signal, for
/// use in a `tokio::select!` alongside an idle loop's own timeout.
pub struct ShutdownSubscription {
    rx: WatchReceiver<()>,
}

impl ShutdownSubscription {
    pub fn get() -> Self {
        Self {
            rx: STOPPING.get().expect("Lifecycle::new not called").rx.clone(),
        }
    }

    pub async fn shutting_down(&mut self) {
        self.rx.changed().await.ok();
    }
}

/// Returns `true` once shutdown has been signalled.
pub fn is_shutting_down() -> bool {
    SHUTTING_DOWN.load(Ordering::Relaxed)
}

/// Initializes the process-wide shutdown state. Constructed once in
/// `policyd::run`; panics if called twice.
pub struct Lifecycle {
    activity_rx: MpscReceiver<()>,
    request_shutdown_rx: MpscReceiver<()>,
    grace_period: Duration,
}

impl Lifecycle {
    pub fn new(grace_period: Duration) -> Self {
        let (activity_tx, activity_rx) = tokio::sync::mpsc::channel(1);
        ACTIVE
            .set(Mutex::new(Some(Activity { _tx: activity_tx })))
            .map_err(|_| ())
            .expect("Lifecycle::new called more than once");

        let (request_shutdown_tx, request_shutdown_rx) = tokio::sync::mpsc::channel(1);
        let (tx, rx) = tokio::sync::watch::channel(());
        STOPPING
            .set(ShutdownState {
                tx,
                rx,
                request_shutdown_tx,
            })
            .map_err(|_| ())
            .expect("Lifecycle::new called more than once");

        Self {
            activity_rx,
            request_shutdown_rx,
            grace_period,
        }
    }

    /// Explicitly requests shutdown, e.g. from a test or an admin signal
    /// other than Ctrl-C.
    pub async fn request_shutdown() {
        if let Some(state) = STOPPING.get() {
            state.request_shutdown_tx.send(()).await.ok();
        }
    }

    /// Waits for Ctrl-C or an explicit [`Lifecycle::request_shutdown`]
    /// call, then flips the shutdown watch channel, drops this
    /// `Lifecycle`'s own `Activity` sender, and waits (bounded by
    /// `grace_period`) for all outstanding `Activity` tokens to be
    /// dropped before returning.
    pub async fn wait_for_shutdown(&mut self) {
        tracing::debug!("waiting for shutdown signal");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = self.request_shutdown_rx.recv() => {}
        };
        tracing::info!("shutdown requested, draining in-flight inquiries");
        SHUTTING_DOWN.store(true, Ordering::SeqCst);
        ACTIVE.get().map(|a| a.lock().unwrap().take());
        STOPPING.get().map(|s| s.tx.send(()).ok());

        tokio::select! {
            _ = self.activity_rx.recv() => {
                tracing::debug!("all activity drained cleanly");
            }
            _ = tokio::time::sleep(self.grace_period) => {
                tracing::warn!("grace period elapsed with activity still outstanding");
            }
        }
    }
}
