//! # Campaign Runtime
//!
//! The [`Store`] owns the conversation state and drives a reducer:
//!
//! 1. `send` reduces the action under the state write lock
//! 2. each returned [`Effect::Future`] runs in its own tokio task
//! 3. an action produced by a future is broadcast to subscribers and reduced
//!    in turn, under the same [`EffectHandle`] as the action that caused it
//!
//! Reductions are serialized; effects are not. Two users' redemptions can be
//! in flight at once while their state transitions stay ordered.
//!
//! ## Example
//!
//! ```ignore
//! use campaign_runtime::Store;
//!
//! let store = Store::new(SessionStore::new(), RegistrationReducer::new(), environment);
//!
//! let mut handle = store.send(action).await?;
//! handle.wait().await; // the redemption and its feedback have finished
//!
//! let live = store.state(|sessions| sessions.len()).await;
//! ```

use campaign_core::{effect::Effect, reducer::Reducer};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors returned by [`Store`](crate::Store)
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// `send()` was called after shutdown began
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Effects were still running when the shutdown timeout elapsed
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),
    }
}

pub use error::StoreError;

// ============================================================================
// Effect tracking
// ============================================================================

/// Count of running effect tasks with an idle notification
struct InFlight {
    tasks: AtomicUsize,
    idle: watch::Sender<()>,
}

impl InFlight {
    fn new() -> Arc<Self> {
        let (idle, _) = watch::channel(());
        Arc::new(Self {
            tasks: AtomicUsize::new(0),
            idle,
        })
    }

    fn count(&self) -> usize {
        self.tasks.load(Ordering::SeqCst)
    }

    /// Register a task; it counts until the guard drops
    fn enter(self: &Arc<Self>) -> TaskGuard {
        self.tasks.fetch_add(1, Ordering::SeqCst);
        TaskGuard(Arc::clone(self))
    }

    /// Resolve once no task is running
    async fn idle(&self) {
        let mut idle = self.idle.subscribe();
        while self.count() > 0 {
            if idle.changed().await.is_err() {
                break;
            }
        }
    }
}

/// Releases its task on drop, panics included
struct TaskGuard(Arc<InFlight>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if self.0.tasks.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.send_replace(());
        }
    }
}

/// Completion handle for one `send`
///
/// Covers the effects of the sent action and, transitively, of every action
/// those effects fed back.
#[derive(Clone)]
pub struct EffectHandle {
    in_flight: Arc<InFlight>,
}

impl EffectHandle {
    fn new() -> Self {
        Self {
            in_flight: InFlight::new(),
        }
    }

    /// A handle with nothing to wait for
    #[must_use]
    pub fn completed() -> Self {
        Self::new()
    }

    /// Number of effects still running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.in_flight.count()
    }

    /// Wait for all effects to complete
    pub async fn wait(&mut self) {
        self.in_flight.idle().await;
    }

    /// Wait for all effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns `Err(())` if the timeout expires first.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), ()> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| ())
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.pending())
            .finish()
    }
}

// ============================================================================
// Store
// ============================================================================

/// Store module - the runtime for reducers
pub mod store {
    use super::{Arc, Duration, Effect, EffectHandle, InFlight, Reducer, StoreError};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::{RwLock, broadcast};

    struct Shared<S, A, E, R> {
        state: RwLock<S>,
        reducer: R,
        environment: E,
        shutting_down: AtomicBool,
        /// Every running effect, across all handles
        in_flight: Arc<InFlight>,
        feedback: broadcast::Sender<A>,
    }

    /// Runtime coordinator for a reducer
    ///
    /// Cheap to clone; clones share state, environment and effect tracking.
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        shared: Arc<Shared<S, A, E, R>>,
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn clone(&self) -> Self {
            Self {
                shared: Arc::clone(&self.shared),
            }
        }
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a store; the feedback broadcast buffers 64 actions
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_broadcast_capacity(initial_state, reducer, environment, 64)
        }

        /// Create a store with a custom feedback broadcast capacity
        #[must_use]
        pub fn with_broadcast_capacity(
            initial_state: S,
            reducer: R,
            environment: E,
            capacity: usize,
        ) -> Self {
            let (feedback, _) = broadcast::channel(capacity.max(1));

            Self {
                shared: Arc::new(Shared {
                    state: RwLock::new(initial_state),
                    reducer,
                    environment,
                    shutting_down: AtomicBool::new(false),
                    in_flight: InFlight::new(),
                    feedback,
                }),
            }
        }

        /// Reduce an action and start its effects
        ///
        /// Returns once the reducer has run; effects continue in the
        /// background and can be awaited through the returned handle.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] once shutdown has begun.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
            if self.is_shutting_down() {
                tracing::warn!("Rejected action: store is shutting down");
                metrics::counter!("store.shutdown.rejected_actions").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            metrics::counter!("store.commands.total").increment(1);

            let handle = EffectHandle::new();
            self.dispatch(action, &handle.in_flight).await;
            Ok(handle)
        }

        /// Subscribe to actions fed back by effects
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.shared.feedback.subscribe()
        }

        /// Read the state through a closure
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.shared.state.read().await;
            f(&state)
        }

        /// `true` once [`Store::shutdown`] has been called
        #[must_use]
        pub fn is_shutting_down(&self) -> bool {
            self.shared.shutting_down.load(Ordering::Acquire)
        }

        /// Stop accepting actions and wait for running effects
        ///
        /// Actions fed back by effects are still reduced, so an in-flight
        /// redemption completes and answers its user.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] with the number of effects
        /// still running when `timeout` elapses.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            metrics::counter!("store.shutdown.initiated").increment(1);
            self.shared.shutting_down.store(true, Ordering::Release);

            if tokio::time::timeout(timeout, self.shared.in_flight.idle())
                .await
                .is_err()
            {
                let pending = self.shared.in_flight.count();
                tracing::error!(pending_effects = pending, "Shutdown timed out");
                metrics::counter!("store.shutdown.timeout").increment(1);
                return Err(StoreError::ShutdownTimeout(pending));
            }

            tracing::info!("All effects completed, shutdown successful");
            Ok(())
        }

        async fn dispatch(&self, action: A, handle: &Arc<InFlight>) {
            let effects = {
                let mut state = self.shared.state.write().await;

                let span = tracing::debug_span!("reducer_execution");
                let _enter = span.enter();

                let start = std::time::Instant::now();
                let effects = self
                    .shared
                    .reducer
                    .reduce(&mut state, action, &self.shared.environment);
                metrics::histogram!("store.reducer.duration_seconds")
                    .record(start.elapsed().as_secs_f64());

                tracing::trace!(effects = effects.len(), "Reducer completed");
                effects
            };

            for effect in effects {
                self.execute(effect, handle);
            }
        }

        fn execute(&self, effect: Effect<A>, handle: &Arc<InFlight>) {
            match effect {
                Effect::None => {
                    metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                },
                Effect::Parallel(effects) => {
                    metrics::counter!("store.effects.executed", "type" => "parallel").increment(1);
                    for effect in effects {
                        self.execute(effect, handle);
                    }
                },
                Effect::Future(fut) => {
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);

                    let guards = (handle.enter(), self.shared.in_flight.enter());
                    let store = self.clone();
                    let handle = Arc::clone(handle);

                    tokio::spawn(async move {
                        let _guards = guards;
                        if let Some(action) = fut.await {
                            tracing::trace!("Effect produced an action, feeding it back");
                            let _ = store.shared.feedback.send(action.clone());
                            store.dispatch(action, &handle).await;
                        }
                    });
                },
            }
        }
    }
}

pub use store::Store;
