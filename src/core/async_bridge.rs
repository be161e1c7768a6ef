//! Queue plus one listener thread in front of a [`Dispatcher`]
//!
//! Producers `put` records on a crossbeam channel; the listener thread
//! drains it in batches and hands each batch to its dispatcher. Stopping
//! enqueues a stop message behind every accepted record, so everything put
//! before `stop` is written before `stop` returns.

use super::dispatcher::Dispatcher;
use super::error::{LoggerError, Result};
use super::metrics::PipelineMetrics;
use super::overflow_policy::OverflowPolicy;
use super::record::LogRecord;
use crossbeam_channel::{bounded, unbounded, Receiver, SendTimeoutError, Sender, TrySendError};
use parking_lot::{Condvar, Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default shutdown timeout for listener cleanup (5 seconds)
///
/// Used when a bridge is dropped without an explicit `stop()`.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest number of records the listener hands to the dispatcher at once
const BATCH_SIZE: usize = 50;

/// Queue parameters for one bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    pub name: String,
    /// `None` for an unbounded queue
    pub capacity: Option<usize>,
    pub policy: OverflowPolicy,
}

impl QueueSettings {
    /// Unbounded queue with the blocking policy
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity: None,
            policy: OverflowPolicy::default(),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn bounded(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_policy(mut self, policy: OverflowPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Unstarted,
    Running,
    Stopping,
    Stopped,
}

enum BridgeMessage {
    Record(LogRecord),
    Stop,
}

/// Asynchronous hand-off between producers and a dispatcher
///
/// # Example
///
/// ```
/// use rust_json_logger::prelude::*;
///
/// let memory = MemoryAppender::new();
/// let dispatcher = Dispatcher::new().with_sink(Sink::new("memory", memory.clone()));
/// let bridge = AsyncBridge::new(dispatcher, QueueSettings::new("main").bounded(128));
///
/// bridge.start().unwrap();
/// bridge.put(LogRecord::new("app", LogLevel::Info, "queued")).unwrap();
/// bridge.stop(DEFAULT_SHUTDOWN_TIMEOUT).unwrap();
///
/// assert_eq!(memory.len(), 1);
/// ```
pub struct AsyncBridge {
    settings: QueueSettings,
    sender: Sender<BridgeMessage>,
    receiver: Receiver<BridgeMessage>,
    dispatcher: Arc<Dispatcher>,
    /// Held for reading by `put` while it sends, for writing by `start`/`stop`
    state: RwLock<BridgeState>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    /// Set once the stopping caller is done with the listener
    exited: Mutex<bool>,
    exit_signal: Condvar,
}

impl AsyncBridge {
    /// Create the queue; no thread runs until [`AsyncBridge::start`]
    pub fn new(dispatcher: Dispatcher, settings: QueueSettings) -> Self {
        let (sender, receiver) = match settings.capacity {
            Some(capacity) => bounded(capacity),
            None => unbounded(),
        };
        Self {
            settings,
            sender,
            receiver,
            dispatcher: Arc::new(dispatcher),
            state: RwLock::new(BridgeState::Unstarted),
            handle: Mutex::new(None),
            exited: Mutex::new(false),
            exit_signal: Condvar::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    pub fn state(&self) -> BridgeState {
        *self.state.read()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Records waiting in the queue
    pub fn len(&self) -> usize {
        self.sender.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }

    fn metrics(&self) -> &PipelineMetrics {
        self.dispatcher.metrics()
    }

    /// Spawn the listener thread
    ///
    /// # Errors
    ///
    /// `AlreadyStarted` if the listener is running or stopping,
    /// `LoggerStopped` once stopped, `SpawnError` if the OS refuses the thread.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.write();
        match *state {
            BridgeState::Unstarted => {}
            BridgeState::Running | BridgeState::Stopping => {
                return Err(LoggerError::AlreadyStarted(self.settings.name.clone()))
            }
            BridgeState::Stopped => return Err(LoggerError::LoggerStopped),
        }

        let receiver = self.receiver.clone();
        let dispatcher = Arc::clone(&self.dispatcher);
        let handle = thread::Builder::new()
            .name(format!("log-listener-{}", self.settings.name))
            .spawn(move || listen(&receiver, &dispatcher))
            .map_err(|e| LoggerError::SpawnError(e.to_string()))?;

        *self.handle.lock() = Some(handle);
        *state = BridgeState::Running;
        Ok(())
    }

    /// Enqueue a record for the listener
    ///
    /// Accepted before `start` (held until the listener runs) and while
    /// running. When a bounded queue is full the configured
    /// [`OverflowPolicy`] decides between waiting and `QueueFull`; before
    /// `start` nothing drains the queue, so a full queue is always
    /// `QueueFull`.
    pub fn put(&self, record: LogRecord) -> Result<()> {
        let state = self.state.read();
        let result = match *state {
            BridgeState::Unstarted => self.send(BridgeMessage::Record(record), false),
            BridgeState::Running => self.send(BridgeMessage::Record(record), true),
            BridgeState::Stopping | BridgeState::Stopped => Err(LoggerError::LoggerStopped),
        };
        drop(state);

        match result {
            Ok(()) => {
                self.metrics().record_queued();
            }
            Err(_) => {
                self.metrics().record_rejected();
            }
        }
        result
    }

    fn send(&self, message: BridgeMessage, may_block: bool) -> Result<()> {
        let max = self.settings.capacity.unwrap_or(usize::MAX);
        match self.sender.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) if !may_block => {
                self.metrics().record_queue_full();
                Err(LoggerError::queue_full(self.sender.len(), max))
            }
            Err(TrySendError::Full(message)) => {
                self.metrics().record_queue_full();
                match self.settings.policy {
                    OverflowPolicy::Block => {
                        self.metrics().record_block();
                        self.sender
                            .send(message)
                            .map_err(|_| LoggerError::LoggerStopped)
                    }
                    OverflowPolicy::FailFast => Err(LoggerError::queue_full(self.sender.len(), max)),
                    OverflowPolicy::BlockWithTimeout(timeout) => {
                        self.metrics().record_block();
                        match self.sender.send_timeout(message, timeout) {
                            Ok(()) => Ok(()),
                            Err(SendTimeoutError::Timeout(_)) => {
                                Err(LoggerError::queue_full(self.sender.len(), max))
                            }
                            Err(SendTimeoutError::Disconnected(_)) => Err(LoggerError::LoggerStopped),
                        }
                    }
                }
            }
            Err(TrySendError::Disconnected(_)) => Err(LoggerError::LoggerStopped),
        }
    }

    /// Stop the listener after it drains every accepted record
    ///
    /// Idempotent: a no-op when the bridge never started or already stopped.
    /// A caller arriving while another stop is in progress waits for that
    /// stop to finish.
    ///
    /// # Errors
    ///
    /// `ShutdownTimeout` if the listener is still running after `timeout`;
    /// the bridge is marked stopped regardless.
    pub fn stop(&self, timeout: Duration) -> Result<()> {
        {
            let mut state = self.state.write();
            match *state {
                BridgeState::Unstarted | BridgeState::Stopped => return Ok(()),
                BridgeState::Stopping => {
                    drop(state);
                    return self.wait_for_exit(timeout);
                }
                BridgeState::Running => {}
            }
            *state = BridgeState::Stopping;
            // Sent under the write lock: no put can slip in behind it
            if self.sender.send(BridgeMessage::Stop).is_err() {
                self.dispatcher
                    .report(&format!("[LOGGER ERROR] Bridge '{}' lost its listener", self.name()));
            }
        }

        let handle = self.handle.lock().take();
        let result = match handle {
            Some(handle) => self.join(handle, timeout),
            None => Ok(()),
        };
        *self.state.write() = BridgeState::Stopped;

        *self.exited.lock() = true;
        self.exit_signal.notify_all();
        result
    }

    fn wait_for_exit(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut exited = self.exited.lock();
        while !*exited {
            if self.exit_signal.wait_until(&mut exited, deadline).timed_out() && !*exited {
                return Err(LoggerError::shutdown_timeout(self.name(), timeout));
            }
        }
        Ok(())
    }

    fn join(&self, handle: thread::JoinHandle<()>, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        loop {
            if handle.is_finished() {
                if let Err(e) = handle.join() {
                    self.dispatcher.report(&format!(
                        "[LOGGER ERROR] Listener '{}' panicked during shutdown: {:?}",
                        self.name(),
                        e
                    ));
                }
                return Ok(());
            }

            if start.elapsed() >= timeout {
                return Err(LoggerError::shutdown_timeout(self.name(), timeout));
            }

            // Small sleep to avoid busy-waiting
            thread::sleep(Duration::from_millis(10));
        }
    }
}

/// Listener loop: one blocking receive, then whatever is immediately ready
fn listen(receiver: &Receiver<BridgeMessage>, dispatcher: &Dispatcher) {
    let mut batch = Vec::with_capacity(BATCH_SIZE);

    loop {
        let mut stopping = match receiver.recv() {
            Ok(BridgeMessage::Record(record)) => {
                batch.push(record);
                false
            }
            Ok(BridgeMessage::Stop) | Err(_) => true,
        };

        while !stopping && batch.len() < BATCH_SIZE {
            match receiver.try_recv() {
                Ok(BridgeMessage::Record(record)) => batch.push(record),
                Ok(BridgeMessage::Stop) => stopping = true,
                Err(_) => break,
            }
        }

        if !batch.is_empty() {
            dispatcher.emit_batch(&batch);
            batch.clear();
        }

        if stopping {
            batch.extend(receiver.try_iter().filter_map(|message| match message {
                BridgeMessage::Record(record) => Some(record),
                BridgeMessage::Stop => None,
            }));
            if !batch.is_empty() {
                dispatcher.emit_batch(&batch);
            }
            let _ = dispatcher.flush();
            return;
        }
    }
}

impl Drop for AsyncBridge {
    fn drop(&mut self) {
        if let Err(e) = self.stop(DEFAULT_SHUTDOWN_TIMEOUT) {
            self.dispatcher
                .report(&format!("[LOGGER WARNING] {}. Some logs may be lost.", e));
        }

        let pending = self.sender.len();
        if self.state() == BridgeState::Unstarted && pending > 0 {
            self.dispatcher.report(&format!(
                "[LOGGER WARNING] Bridge '{}' dropped before start with {} queued records",
                self.name(),
                pending
            ));
        }
    }
}

impl fmt::Debug for AsyncBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncBridge")
            .field("settings", &self.settings)
            .field("state", &self.state())
            .field("queued", &self.len())
            .finish()
    }
}
