use crate::classify::{Alert, classify};
use crate::config::Config;
use crate::convert::Converter;
use crate::dedup::DedupFilter;
use crate::event::{DecodeError, decode};
use crate::render::{CompileError, Renderer};
use crate::state::StateStore;
use crate::watch::StateWatcher;
use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};
use serde_json::{Value, json};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

/// State path holding the running total.
pub const TOTAL_PATH: &str = "total";

/// Messages consumed by the dispatcher, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A raw event payload from a transport.
    Event(Value),
    /// The state file was edited by someone else.
    StateFileChanged,
    /// Stop after everything queued before this message.
    Shutdown,
}

#[derive(Debug, Error)]
pub enum RelayError {
    /// The payload was not a well-formed event; nothing was applied.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Reading, locking or persisting the state file failed.
    #[error("state file: {0}")]
    Io(#[from] io::Error),

    /// A template did not compile.
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// What happened to the messages of one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Alerts folded into the total.
    pub applied: usize,
    /// Messages rejected as duplicates, tests or replays.
    pub skipped: usize,
    /// Messages not applied because they were malformed or named an
    /// unknown plan or currency.
    pub dropped: usize,
}

/// Everything one relay run owns: the seen-message filter, the converter,
/// the state store and, through the store's subscription, the renderer.
pub struct Session {
    dedup: DedupFilter,
    converter: Converter,
    store: StateStore,
    render_passes: Arc<AtomicU64>,
}

impl Session {
    /// Wire up a session.
    ///
    /// Renders every template once against the loaded state, then
    /// subscribes the renderer to every later change.
    pub fn new(
        mut store: StateStore,
        renderer: Renderer,
        dedup: DedupFilter,
        converter: Converter,
    ) -> Self {
        let render_passes = Arc::new(AtomicU64::new(0));

        renderer.render_all(store.value());
        render_passes.fetch_add(1, Ordering::SeqCst);

        let passes = Arc::clone(&render_passes);
        store.subscribe(move |state| {
            renderer.render_all(state);
            passes.fetch_add(1, Ordering::SeqCst);
        });

        Session {
            dedup,
            converter,
            store,
            render_passes,
        }
    }

    /// Build a session from configuration and an already loaded converter.
    pub fn from_config(config: &Config, converter: Converter) -> Result<Self, RelayError> {
        let renderer = Renderer::compile(
            &config.output_dir,
            config
                .templates
                .iter()
                .map(|t| (t.name.clone(), t.content.as_str())),
        )?;
        let store = StateStore::open(&config.state_path, json!({ "total": 0 }))?;
        let dedup = DedupFilter::new()
            .include_test_alerts(config.include_test_alerts)
            .include_repeat_alerts(config.include_repeat_alerts);

        info!(
            "relay session ready: state {}, {} template(s), currency {}",
            store.path().display(),
            renderer.len(),
            converter.target().unwrap_or("unchanged")
        );
        Ok(Session::new(store, renderer, dedup, converter))
    }

    /// Run one raw event through decode, dedup, classification and
    /// conversion, folding every resulting alert into the total.
    ///
    /// # Errors
    ///
    /// [`RelayError::Decode`] if the envelope is malformed (nothing applied);
    /// [`RelayError::Io`] if the state could not be persisted.
    pub fn handle_event(&mut self, raw: &Value) -> Result<Outcome, RelayError> {
        let event = decode(raw)?;
        let mut outcome = Outcome::default();

        if !event.kind.is_monetary() {
            return Ok(outcome);
        }
        debug!("event received: {raw}");

        for message in &event.messages {
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    warn!("dropping message: {e}");
                    outcome.dropped += 1;
                    continue;
                }
            };

            if !self.dedup.should_handle(message) {
                debug!("skipping message {:?}", message.id);
                outcome.skipped += 1;
                continue;
            }

            let alert = match classify(&event.kind, message) {
                Ok(Some(alert)) => alert,
                Ok(None) => {
                    outcome.dropped += 1;
                    continue;
                }
                Err(e) => {
                    warn!("dropping message {:?}: {e}", message.id);
                    outcome.dropped += 1;
                    continue;
                }
            };

            log_alert(&alert);

            let amount = match self.converter.convert(alert.amount(), alert.currency()) {
                Ok(amount) => amount,
                Err(e) => {
                    warn!("dropping message {:?}: {e}", message.id);
                    outcome.dropped += 1;
                    continue;
                }
            };

            self.store.update(TOTAL_PATH, |total| {
                json!(total.and_then(Value::as_f64).unwrap_or(0.0) + amount)
            })?;
            outcome.applied += 1;
        }

        Ok(outcome)
    }

    /// React to an external edit of the state file.
    pub fn handle_state_file_changed(&mut self) -> io::Result<bool> {
        self.store.reload()
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn dedup(&self) -> &DedupFilter {
        &self.dedup
    }

    /// Render passes so far, including the initial one.
    pub fn render_passes(&self) -> u64 {
        self.render_passes.load(Ordering::SeqCst)
    }
}

fn log_alert(alert: &Alert) {
    match alert {
        Alert::Cheer { name, bits } => info!("Cheer: {bits} bit(s) from {name}"),
        Alert::Donation {
            name,
            amount,
            currency,
        } => info!("Donation: {currency} {amount} from {name}"),
        Alert::Subscription { name, months, plan } => {
            info!("Subscription: {name} for {months} month(s) ({})", plan.name)
        }
    }
}

/// Starts the dispatcher for a session.
pub struct Relay;

impl Relay {
    /// Spawn the dispatcher thread, and a state file watcher if
    /// `watch_debounce` is set.
    pub fn start(session: Session, watch_debounce: Option<Duration>) -> io::Result<RelayHandle> {
        let (sender, receiver) = crossbeam_channel::unbounded();

        let watcher = match watch_debounce {
            Some(window) => Some(StateWatcher::spawn(
                session.store().path(),
                window,
                sender.clone(),
            )?),
            None => None,
        };

        let thread = thread::Builder::new()
            .name("alertfold-dispatch".into())
            .spawn(move || dispatch(session, receiver))?;

        Ok(RelayHandle {
            sender,
            watcher,
            thread: Some(thread),
        })
    }
}

fn dispatch(mut session: Session, inbound: Receiver<Inbound>) -> io::Result<Session> {
    for message in inbound.iter() {
        match message {
            Inbound::Event(raw) => match session.handle_event(&raw) {
                Ok(outcome) => debug!("event handled: {outcome:?}"),
                Err(RelayError::Io(e)) => {
                    error!("stopping relay: failed to persist state: {e}");
                    return Err(e);
                }
                Err(e) => warn!("dropping event: {e}"),
            },
            Inbound::StateFileChanged => {
                if let Err(e) = session.handle_state_file_changed() {
                    warn!("failed to reload state file: {e}");
                }
            }
            Inbound::Shutdown => break,
        }
    }
    Ok(session)
}

/// Handle to a running relay.
///
/// Dropping the handle shuts the relay down as [`RelayHandle::close`] does,
/// discarding the result.
pub struct RelayHandle {
    sender: Sender<Inbound>,
    watcher: Option<StateWatcher>,
    thread: Option<JoinHandle<io::Result<Session>>>,
}

impl RelayHandle {
    /// A sender for transports to push events into the relay.
    pub fn sender(&self) -> Sender<Inbound> {
        self.sender.clone()
    }

    /// Whether the dispatcher is still consuming messages. It stops early
    /// when a state write fails.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|thread| !thread.is_finished())
    }

    /// Stop watching, let the dispatcher drain what is already queued, and
    /// join it. Returns the session for inspection.
    ///
    /// # Errors
    ///
    /// Returns the write error that stopped the dispatcher, if any.
    pub fn close(mut self) -> io::Result<Session> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> io::Result<Session> {
        info!("Closing relay...");
        drop(self.watcher.take());
        let _ = self.sender.send(Inbound::Shutdown);

        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| io::Error::other("dispatcher thread panicked"))?,
            None => Err(io::Error::other("relay already closed")),
        }
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.shutdown();
        }
    }
}
