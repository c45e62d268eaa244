//! # Campaign Core
//!
//! Reducer, effect and clock abstractions for the campaign registration bot.
//!
//! A conversation step is a reducer: it reads the inbound action, updates the
//! session state in place and returns effect descriptions (send this reply,
//! redeem that code). The runtime crate runs the effects and feeds any
//! resulting action back into the reducer.
//!
//! ```text
//!   action ──▶ reduce(&mut state, action, &env) ──▶ effects
//!     ▲                                               │
//!     └──────────── Some(action) from a future ◀──────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use campaign_core::{effect::Effect, reducer::Reducer, SmallVec, smallvec};
//!
//! impl Reducer for GreetingReducer {
//!     type State = GreetingState;
//!     type Action = GreetingAction;
//!     type Environment = GreetingEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut GreetingState,
//!         action: GreetingAction,
//!         env: &GreetingEnvironment,
//!     ) -> SmallVec<[Effect<GreetingAction>; 4]> {
//!         state.greeted += 1;
//!         let messenger = env.messenger.clone();
//!         smallvec![Effect::fire_and_forget(async move {
//!             messenger.say_hello().await;
//!         })]
//!     }
//! }
//! ```

pub use chrono::{DateTime, Utc};
pub use smallvec::{SmallVec, smallvec};

/// The reducer trait
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// Business logic as `(State, Action, Environment) → (State, Effects)`
    ///
    /// Implementations must not perform I/O themselves; everything that
    /// touches the outside world goes into the returned effects.
    pub trait Reducer {
        /// State the reducer mutates
        type State;

        /// Inputs: inbound commands and fed-back events
        type Action;

        /// Injected dependencies (clock, storage, messenger)
        type Environment;

        /// Apply `action` to `state` and describe the follow-up work
        ///
        /// Most actions produce one or two effects, so they are returned
        /// inline in a `SmallVec`.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Side effect descriptions
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Boxed future carried by [`Effect::Future`]
    pub type EffectFuture<Action> = Pin<Box<dyn Future<Output = Option<Action>> + Send>>;

    /// Work for the runtime to do after a reducer returns
    ///
    /// Effects are values. Nothing runs until the store executes them.
    pub enum Effect<Action> {
        /// Nothing to do
        None,

        /// Run every effect; none waits for another
        Parallel(Vec<Effect<Action>>),

        /// Async work; a `Some` result is fed back into the reducer
        Future(EffectFuture<Action>),
    }

    impl<Action> std::fmt::Debug for Effect<Action> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => f.write_str("Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Future(_) => f.write_str("Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Run several effects side by side
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Async work that may produce a follow-up action
        #[must_use]
        pub fn future<F>(fut: F) -> Effect<Action>
        where
            F: Future<Output = Option<Action>> + Send + 'static,
            Action: 'static,
        {
            Effect::Future(Box::pin(fut))
        }

        /// Async work with no follow-up action (sending a reply, for example)
        #[must_use]
        pub fn fire_and_forget<F>(fut: F) -> Effect<Action>
        where
            F: Future<Output = ()> + Send + 'static,
            Action: 'static,
        {
            Effect::Future(Box::pin(async move {
                fut.await;
                None
            }))
        }

        /// `true` for [`Effect::None`]
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }
    }
}

/// Injected dependencies shared by every environment
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Source of the current time
    ///
    /// Lockout expiry and registration timestamps both go through the clock,
    /// so tests can pin or advance time deterministically.
    pub trait Clock: Send + Sync {
        /// The current instant
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
