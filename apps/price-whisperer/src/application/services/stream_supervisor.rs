//! Stream Supervisor
//!
//! Owns one price subscription: opens it, feeds every tick through a
//! [`PriceTracker`] and hands the result to the caller. Ticks are processed
//! one at a time in stream order.
//!
//! The subscription is torn down through the returned [`SubscriptionHandle`].
//! Once [`SubscriptionHandle::cancel`] returns, neither callback runs again,
//! even if the consumer task is mid-iteration at that moment.

use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use parking_lot::{ReentrantMutex, RwLock};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::NarrationEngine;
use crate::application::ports::{FeedError, TickSource};
use crate::domain::pricing::{Instrument, Observation, PriceTracker};
use crate::infrastructure::metrics;

// =============================================================================
// Stream State
// =============================================================================

/// Lifecycle of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    /// Opening the subscription.
    #[default]
    Connecting,
    /// Consuming ticks.
    Streaming,
    /// The feed finished without an error.
    Ended,
    /// The feed failed; the subscription is over.
    Failed,
    /// Torn down by the caller.
    Canceled,
}

impl StreamState {
    /// Label used in logs and the status endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Ended => "ended",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    /// Whether the subscription is over.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Failed | Self::Canceled)
    }
}

/// Why the consumer task stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamExit {
    /// The feed finished.
    Ended,
    /// The feed failed. `on_error` was called with this error unless the
    /// subscription had already been canceled.
    Failed(FeedError),
    /// The handle was canceled.
    Canceled,
}

// =============================================================================
// Mount Gate
// =============================================================================

/// "Still mounted" flag checked before every callback.
///
/// Callbacks run while the lock is held, so [`MountGate::unmount`] waits for
/// an in-progress callback and no callback starts afterwards. The lock is
/// reentrant so a callback may cancel its own subscription.
#[derive(Debug)]
struct MountGate {
    mounted: ReentrantMutex<Cell<bool>>,
}

impl MountGate {
    fn new() -> Self {
        Self {
            mounted: ReentrantMutex::new(Cell::new(true)),
        }
    }

    /// Run `f` if still mounted. Returns whether it ran.
    fn run_if_mounted(&self, f: impl FnOnce()) -> bool {
        let mounted = self.mounted.lock();
        if !mounted.get() {
            return false;
        }
        f();
        true
    }

    fn unmount(&self) {
        self.mounted.lock().set(false);
    }
}

// =============================================================================
// Supervisor
// =============================================================================

/// Supervises one subscription to one instrument.
pub struct StreamSupervisor {
    source: Arc<dyn TickSource>,
    instrument: Instrument,
    narration: Option<Arc<NarrationEngine>>,
}

impl std::fmt::Debug for StreamSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSupervisor")
            .field("instrument", &self.instrument)
            .field("narration", &self.narration.is_some())
            .finish_non_exhaustive()
    }
}

impl StreamSupervisor {
    /// Create a supervisor for the given source and instrument.
    #[must_use]
    pub fn new(source: Arc<dyn TickSource>, instrument: Instrument) -> Self {
        Self {
            source,
            instrument,
            narration: None,
        }
    }

    /// Shut this narration engine down when the subscription is canceled.
    #[must_use]
    pub fn with_narration(mut self, engine: Arc<NarrationEngine>) -> Self {
        self.narration = Some(engine);
        self
    }

    /// The supervised instrument.
    #[must_use]
    pub const fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    /// Open the subscription.
    ///
    /// `on_change` runs for every tick with the tracker's result. `on_error`
    /// runs at most once, when the subscription cannot be opened, the feed
    /// fails, or a tick carries a malformed price; consumption stops right
    /// after. A feed that simply finishes calls neither.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<C, E>(&self, on_change: C, on_error: E) -> SubscriptionHandle
    where
        C: FnMut(&Observation) + Send + 'static,
        E: FnOnce(&FeedError) + Send + 'static,
    {
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let gate = Arc::new(MountGate::new());
        let state = Arc::new(RwLock::new(StreamState::Connecting));

        tracing::info!(
            subscription_id = %id,
            instrument = %self.instrument,
            "Starting price subscription"
        );

        let task = tokio::spawn(consume(
            Arc::clone(&self.source),
            self.instrument.clone(),
            cancel.clone(),
            Arc::clone(&gate),
            Arc::clone(&state),
            on_change,
            on_error,
        ));

        SubscriptionHandle {
            id,
            cancel,
            gate,
            state,
            narration: self.narration.clone(),
            task: Some(task),
            canceled: AtomicBool::new(false),
        }
    }
}

async fn consume<C, E>(
    source: Arc<dyn TickSource>,
    instrument: Instrument,
    cancel: CancellationToken,
    gate: Arc<MountGate>,
    state: Arc<RwLock<StreamState>>,
    mut on_change: C,
    on_error: E,
) -> StreamExit
where
    C: FnMut(&Observation) + Send + 'static,
    E: FnOnce(&FeedError) + Send + 'static,
{
    metrics::set_stream_state(StreamState::Connecting);

    let subscribed = tokio::select! {
        biased;
        () = cancel.cancelled() => return StreamExit::Canceled,
        result = source.subscribe(&instrument) => result,
    };

    let mut stream = match subscribed {
        Ok(stream) => stream,
        Err(error) => return fail(error, &gate, &state, on_error),
    };

    tracing::info!(instrument = %instrument, "Price subscription opened");
    transition(&state, StreamState::Streaming);

    let mut tracker = PriceTracker::new();

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return StreamExit::Canceled,
            next = stream.next() => next,
        };

        let tick = match next {
            Some(Ok(tick)) => tick,
            Some(Err(error)) => return fail(error, &gate, &state, on_error),
            None => {
                tracing::info!(instrument = %instrument, "Price stream ended");
                transition(&state, StreamState::Ended);
                return StreamExit::Ended;
            }
        };

        let sample = match tick.to_sample() {
            Ok(sample) => sample,
            Err(error) => return fail(error, &gate, &state, on_error),
        };

        metrics::record_tick_received();
        let observation = tracker.observe(sample);
        tracing::trace!(
            price = %observation.price(),
            direction = observation.direction().as_str(),
            first = observation.is_first(),
            "Tick observed"
        );

        if !gate.run_if_mounted(|| on_change(&observation)) {
            return StreamExit::Canceled;
        }
    }
}

fn fail<E>(
    error: FeedError,
    gate: &MountGate,
    state: &RwLock<StreamState>,
    on_error: E,
) -> StreamExit
where
    E: FnOnce(&FeedError),
{
    tracing::error!(error = %error, kind = error.kind(), "Price stream failed");
    metrics::record_stream_error(error.kind());
    transition(state, StreamState::Failed);
    gate.run_if_mounted(|| on_error(&error));
    StreamExit::Failed(error)
}

fn transition(state: &RwLock<StreamState>, next: StreamState) {
    let mut current = state.write();
    if current.is_terminal() {
        return;
    }
    *current = next;
    metrics::set_stream_state(next);
}

// =============================================================================
// Subscription Handle
// =============================================================================

/// Cancels a subscription started by [`StreamSupervisor::start`].
///
/// Dropping the handle cancels the subscription.
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: Uuid,
    cancel: CancellationToken,
    gate: Arc<MountGate>,
    state: Arc<RwLock<StreamState>>,
    narration: Option<Arc<NarrationEngine>>,
    task: Option<JoinHandle<StreamExit>>,
    canceled: AtomicBool,
}

impl SubscriptionHandle {
    /// Subscription identifier, for logs.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        *self.state.read()
    }

    /// Whether the consumer task has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancel the subscription and any in-flight narration.
    ///
    /// No callback runs after this returns. Calling it again does nothing.
    pub fn cancel(&self) {
        if self.canceled.swap(true, Ordering::SeqCst) {
            return;
        }

        self.gate.unmount();
        self.cancel.cancel();
        if let Some(engine) = &self.narration {
            engine.shutdown();
        }
        transition(&self.state, StreamState::Canceled);

        tracing::info!(subscription_id = %self.id, "Price subscription canceled");
    }

    /// Wait for the consumer task to stop.
    ///
    /// Returns `None` if it was already joined or the task panicked.
    pub async fn join(&mut self) -> Option<StreamExit> {
        let task = self.task.take()?;
        match task.await {
            Ok(exit) => Some(exit),
            Err(e) => {
                tracing::error!(subscription_id = %self.id, error = %e, "Subscription task failed");
                None
            }
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use futures::channel::mpsc as fmpsc;
    use rust_decimal::Decimal;
    use tokio::sync::mpsc;

    use super::*;
    use crate::application::ports::{MockSpeechBackend, RawTick, TickStream};
    use crate::domain::narration::NarrationConfig;
    use crate::domain::pricing::Direction;

    type TickSender = fmpsc::UnboundedSender<Result<RawTick, FeedError>>;

    struct ChannelSource {
        ticks: parking_lot::Mutex<Option<fmpsc::UnboundedReceiver<Result<RawTick, FeedError>>>>,
    }

    impl ChannelSource {
        fn new() -> (Arc<Self>, TickSender) {
            let (tx, rx) = fmpsc::unbounded();
            let source = Self {
                ticks: parking_lot::Mutex::new(Some(rx)),
            };
            (Arc::new(source), tx)
        }
    }

    #[async_trait]
    impl TickSource for ChannelSource {
        async fn subscribe(&self, _instrument: &Instrument) -> Result<TickStream, FeedError> {
            self.ticks
                .lock()
                .take()
                .map(|rx| rx.boxed())
                .ok_or_else(|| FeedError::Connect("already subscribed".into()))
        }
    }

    struct FailingSource;

    #[async_trait]
    impl TickSource for FailingSource {
        async fn subscribe(&self, _instrument: &Instrument) -> Result<TickStream, FeedError> {
            Err(FeedError::Connect("refused".into()))
        }
    }

    fn instrument() -> Instrument {
        Instrument::new("ethereum", "0xabc")
    }

    fn supervisor(source: Arc<dyn TickSource>) -> StreamSupervisor {
        StreamSupervisor::new(source, instrument())
    }

    fn tick(amount: &str) -> Result<RawTick, FeedError> {
        Ok(RawTick::new(amount))
    }

    #[tokio::test]
    async fn forwards_observations_in_order() {
        let (source, tx) = ChannelSource::new();
        let (seen_tx, mut seen) = mpsc::unbounded_channel();

        let mut handle = supervisor(source).start(
            move |obs: &Observation| {
                let _ = seen_tx.send((obs.direction(), obs.price(), obs.is_first()));
            },
            |_: &FeedError| panic!("no error expected"),
        );

        for amount in ["100.00", "100.00", "101.50", "99.25"] {
            tx.unbounded_send(tick(amount)).unwrap();
        }
        drop(tx);

        assert_eq!(handle.join().await, Some(StreamExit::Ended));
        assert_eq!(handle.state(), StreamState::Ended);

        let mut observed = Vec::new();
        while let Ok(item) = seen.try_recv() {
            observed.push(item);
        }
        assert_eq!(
            observed,
            vec![
                (Direction::Neutral, Decimal::new(10000, 2), true),
                (Direction::Neutral, Decimal::new(10000, 2), false),
                (Direction::Up, Decimal::new(10150, 2), false),
                (Direction::Down, Decimal::new(9925, 2), false),
            ]
        );
    }

    #[tokio::test]
    async fn malformed_tick_is_a_stream_error() {
        let (source, tx) = ChannelSource::new();
        let (err_tx, mut errors) = mpsc::unbounded_channel();
        let (seen_tx, mut seen) = mpsc::unbounded_channel();

        let mut handle = supervisor(source).start(
            move |obs: &Observation| {
                let _ = seen_tx.send(obs.price());
            },
            move |e: &FeedError| {
                let _ = err_tx.send(e.clone());
            },
        );

        tx.unbounded_send(tick("1.00")).unwrap();
        tx.unbounded_send(tick("not-a-price")).unwrap();
        tx.unbounded_send(tick("2.00")).unwrap();

        let exit = handle.join().await.unwrap();
        assert!(matches!(exit, StreamExit::Failed(FeedError::MalformedPrice { .. })));
        assert_eq!(handle.state(), StreamState::Failed);

        assert_eq!(seen.try_recv().unwrap(), Decimal::ONE);
        assert!(seen.try_recv().is_err());
        assert!(matches!(
            errors.try_recv().unwrap(),
            FeedError::MalformedPrice { .. }
        ));
        assert!(errors.try_recv().is_err());
    }

    #[tokio::test]
    async fn transport_error_calls_on_error_once() {
        let (source, tx) = ChannelSource::new();
        let (err_tx, mut errors) = mpsc::unbounded_channel();

        let mut handle = supervisor(source).start(
            |_: &Observation| {},
            move |e: &FeedError| {
                let _ = err_tx.send(e.clone());
            },
        );

        tx.unbounded_send(Err(FeedError::Transport("reset".into())))
            .unwrap();
        tx.unbounded_send(Err(FeedError::Transport("again".into())))
            .unwrap();

        assert_eq!(
            handle.join().await,
            Some(StreamExit::Failed(FeedError::Transport("reset".into())))
        );
        assert_eq!(errors.try_recv().unwrap(), FeedError::Transport("reset".into()));
        assert!(errors.try_recv().is_err());
    }

    #[tokio::test]
    async fn subscribe_failure_reports_error() {
        let (err_tx, mut errors) = mpsc::unbounded_channel();
        let mut handle = supervisor(Arc::new(FailingSource)).start(
            |_: &Observation| {},
            move |e: &FeedError| {
                let _ = err_tx.send(e.kind());
            },
        );

        assert!(matches!(
            handle.join().await,
            Some(StreamExit::Failed(FeedError::Connect(_)))
        ));
        assert_eq!(errors.try_recv().unwrap(), "connect");
    }

    #[tokio::test]
    async fn cancel_stops_callbacks_and_is_idempotent() {
        let (source, tx) = ChannelSource::new();
        let (seen_tx, mut seen) = mpsc::unbounded_channel();

        let mut handle = supervisor(source).start(
            move |obs: &Observation| {
                let _ = seen_tx.send(obs.price());
            },
            |_: &FeedError| panic!("no error expected"),
        );

        tx.unbounded_send(tick("10")).unwrap();
        assert_eq!(seen.recv().await, Some(Decimal::TEN));

        handle.cancel();
        handle.cancel();
        let _ = tx.unbounded_send(tick("11"));

        assert_eq!(handle.join().await, Some(StreamExit::Canceled));
        assert_eq!(handle.state(), StreamState::Canceled);
        assert!(seen.try_recv().is_err());
        assert!(handle.join().await.is_none());
    }

    #[tokio::test]
    async fn callback_can_cancel_its_own_subscription() {
        let (source, tx) = ChannelSource::new();
        let (handle_tx, handle_rx) = std::sync::mpsc::channel::<Arc<SubscriptionHandle>>();
        let (seen_tx, mut seen) = mpsc::unbounded_channel();

        let handle = Arc::new(supervisor(source).start(
            move |obs: &Observation| {
                let _ = seen_tx.send(obs.price());
                if let Ok(own) = handle_rx.try_recv() {
                    own.cancel();
                }
            },
            |_: &FeedError| {},
        ));
        handle_tx.send(Arc::clone(&handle)).unwrap();

        tx.unbounded_send(tick("1")).unwrap();
        tx.unbounded_send(tick("2")).unwrap();

        assert_eq!(seen.recv().await, Some(Decimal::ONE));
        assert!(seen.recv().await.is_none());
        assert_eq!(handle.state(), StreamState::Canceled);
    }

    #[tokio::test]
    async fn cancel_shuts_down_narration() {
        let mut backend = MockSpeechBackend::new();
        backend.expect_cancel().times(1).returning(|| ());
        let engine = Arc::new(NarrationEngine::new(
            Arc::new(backend),
            NarrationConfig::default(),
        ));

        let (source, _tx) = ChannelSource::new();
        let handle = supervisor(source)
            .with_narration(Arc::clone(&engine))
            .start(|_: &Observation| {}, |_: &FeedError| {});

        handle.cancel();
        handle.cancel();
        assert!(engine.is_shut_down());
    }

    #[tokio::test]
    async fn drop_cancels_subscription() {
        let (source, tx) = ChannelSource::new();
        let handle = supervisor(source).start(|_: &Observation| {}, |_: &FeedError| {});
        let cancel = handle.cancel.clone();

        drop(handle);
        assert!(cancel.is_cancelled());
        drop(tx);
    }

    #[test]
    fn stream_state_labels() {
        assert_eq!(StreamState::Connecting.as_str(), "connecting");
        assert!(!StreamState::Streaming.is_terminal());
        assert!(StreamState::Ended.is_terminal());
        assert!(StreamState::Failed.is_terminal());
        assert!(StreamState::Canceled.is_terminal());
    }
}
