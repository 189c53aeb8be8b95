// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Call-home registration manager.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use tokio::task::JoinHandle;

use crate::call_home::{RegisterUpdate, RegistrationOptions, RegistrationPhase, RegistrationState};
use crate::client::{NodePath, RemoteDevice};
use crate::error::{ConfigError, Error, RegistrationError, Result};
use crate::protocol::Resolver;
use crate::subscription::{CallbackList, CancelToken};

/// Module the registrar exposes its registration action under.
pub const REGISTRAR_MODULE: &str = "registrar";

/// Name of the registration action.
pub const REGISTER_ACTION: &str = "register";

/// Callback notified of registration transitions.
pub type RegistrationListener<T> = dyn Fn(&RemoteDevice<T>, RegisterUpdate) + Send + Sync;

/// Removes a listener added with [`CallHome::on_register`].
pub type ListenerToken<T> = CancelToken<RegistrationListener<T>>;

/// Called when a background registration run stops on a configuration
/// error.
pub type FatalHandler = dyn Fn(&ConfigError) + Send + Sync;

type TransportOf<R> = <R as Resolver>::Transport;

/// Registers this device with a remote registrar and keeps listeners
/// informed of the registration.
///
/// Applying options starts a background registration run that retries at a
/// fixed interval until it succeeds. A failure with retry disabled is a
/// configuration error: the run stops and the fatal handler is invoked,
/// which by default terminates the process.
///
/// `CallHome` is cheap to clone; clones share the same state.
///
/// # Examples
///
/// ```no_run
/// use restconf_callhome::call_home::{CallHome, RegisterUpdate, RegistrationOptions};
/// use restconf_callhome::protocol::HttpResolver;
///
/// # async fn example() -> restconf_callhome::Result<()> {
/// let call_home = CallHome::new(HttpResolver::new());
///
/// let _token = call_home.on_register(|registrar, update| {
///     if update == RegisterUpdate::Register {
///         println!("registered with {}", registrar.address());
///     }
/// });
///
/// call_home.apply_options(
///     RegistrationOptions::new("car-1", "http://registrar:8090")
///         .with_endpoint("/restconf")
///         .with_local_address("http://car:8080/restconf"),
/// )?;
/// # Ok(())
/// # }
/// ```
pub struct CallHome<R: Resolver> {
    inner: Arc<Inner<R>>,
}

struct Inner<R: Resolver> {
    resolver: R,
    shared: Mutex<Shared<TransportOf<R>>>,
    listeners: Arc<CallbackList<RegistrationListener<TransportOf<R>>>>,
    fatal_handler: Mutex<Arc<FatalHandler>>,
}

struct Shared<T> {
    options: RegistrationOptions,
    state: RegistrationState<T>,
    /// Bumped whenever a new run supersedes the current one.
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl<R: Resolver> CallHome<R> {
    /// Creates an unconfigured manager that reaches registrars through
    /// `resolver`.
    #[must_use]
    pub fn new(resolver: R) -> Self {
        let fatal_handler: Arc<FatalHandler> = Arc::new(exit_on_fatal);
        Self {
            inner: Arc::new(Inner {
                resolver,
                shared: Mutex::new(Shared {
                    options: RegistrationOptions::default(),
                    state: RegistrationState::default(),
                    generation: 0,
                    task: None,
                }),
                listeners: Arc::new(CallbackList::new()),
                fatal_handler: Mutex::new(fatal_handler),
            }),
        }
    }

    /// Replaces the handler called when a background run stops on a
    /// configuration error.
    #[must_use]
    pub fn with_fatal_handler<F>(self, handler: F) -> Self
    where
        F: Fn(&ConfigError) + Send + Sync + 'static,
    {
        *self.inner.fatal_handler.lock() = Arc::new(handler);
        self
    }

    /// Applies new options and starts registering with them.
    ///
    /// Options equal to the current ones are ignored. Otherwise the device
    /// becomes unregistered (listeners get [`RegisterUpdate::Unregister`] if
    /// it was registered), any running registration is cancelled and a new
    /// one is spawned in the background.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` if `device_id` or `address` is
    /// empty. The current options are left untouched in that case.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn apply_options(&self, options: RegistrationOptions) -> std::result::Result<(), ConfigError> {
        options.validate()?;

        let (previous, generation) = {
            let mut shared = self.inner.shared.lock();
            if shared.options == options {
                tracing::debug!(device_id = %options.device_id, "Options unchanged, ignoring");
                return Ok(());
            }

            let previous = shared
                .registered_with()
                .map(|registrar| (registrar, self.inner.listeners.snapshot()));
            shared.options = options;
            let generation = shared.supersede();
            (previous, generation)
        };

        if let Some((registrar, listeners)) = previous {
            tracing::info!(registrar = %registrar.address(), "Leaving registrar, options changed");
            notify(&listeners, &registrar, RegisterUpdate::Unregister);
        }

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            inner.run_background(generation).await;
        });

        let mut shared = self.inner.shared.lock();
        if shared.generation == generation {
            shared.task = Some(handle);
        } else {
            handle.abort();
        }
        Ok(())
    }

    /// Runs the registration loop inline with the current options.
    ///
    /// Takes over from any background run. Failed attempts are retried
    /// every `retry_rate_ms` for as long as it takes.
    ///
    /// # Errors
    ///
    /// - `ConfigError::MissingField` if no valid options were applied
    /// - `ConfigError::RetryDisabled` if an attempt failed and
    ///   `retry_rate_ms` is zero; this never resolves to `Ok`
    /// - `RegistrationError::Superseded` if options changed meanwhile
    pub async fn register(&self) -> Result<RemoteDevice<TransportOf<R>>> {
        let generation = self.inner.shared.lock().supersede();
        self.inner.run(generation).await
    }

    /// Adds a registration listener.
    ///
    /// If the device is already registered the listener is called with the
    /// current registrar before this returns.
    pub fn on_register<F>(&self, listener: F) -> ListenerToken<TransportOf<R>>
    where
        F: Fn(&RemoteDevice<TransportOf<R>>, RegisterUpdate) + Send + Sync + 'static,
    {
        let listener: Arc<RegistrationListener<TransportOf<R>>> = Arc::new(listener);
        // Registration commits under the same lock, so the listener is either
        // in the commit's snapshot or sees the registrar here.
        let (id, current) = {
            let shared = self.inner.shared.lock();
            let id = self.inner.listeners.insert(Arc::clone(&listener));
            (id, shared.registered_with())
        };
        if let Some(registrar) = current {
            listener(&registrar, RegisterUpdate::Register);
        }
        CancelToken::new(id, &self.inner.listeners)
    }

    /// Returns the current options.
    #[must_use]
    pub fn options(&self) -> RegistrationOptions {
        self.inner.shared.lock().options.clone()
    }

    /// Returns a snapshot of the registration state.
    #[must_use]
    pub fn state(&self) -> RegistrationState<TransportOf<R>> {
        self.inner.shared.lock().state.clone()
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> RegistrationPhase {
        self.inner.shared.lock().state.phase
    }

    /// Returns `true` if registered with the current registrar.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.inner.shared.lock().state.registered()
    }

    /// Returns the message of the most recent failure.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.inner.shared.lock().state.last_error.clone()
    }

    /// Returns the registrar, if registered.
    #[must_use]
    pub fn registrar(&self) -> Option<RemoteDevice<TransportOf<R>>> {
        self.inner.shared.lock().registered_with()
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

impl<R: Resolver> Inner<R> {
    async fn run_background(&self, generation: u64) {
        match self.run(generation).await {
            Ok(_) => {}
            Err(Error::Config(e)) => {
                let handler = Arc::clone(&*self.fatal_handler.lock());
                handler(&e);
            }
            Err(e) => tracing::debug!(error = %e, "Registration run ended"),
        }
    }

    async fn run(&self, generation: u64) -> Result<RemoteDevice<TransportOf<R>>> {
        let options = self.shared.lock().options.clone();
        options.validate()?;
        let url = options.url();

        loop {
            {
                let mut shared = self.shared.lock();
                if shared.generation != generation {
                    return Err(RegistrationError::Superseded.into());
                }
                shared.state.begin_attempt();
                tracing::debug!(url = %url, attempt = shared.state.attempts, "Registering");
            }

            match self.attempt(&url, &options).await {
                Ok(registrar) => {
                    let listeners = {
                        let mut shared = self.shared.lock();
                        if shared.generation != generation {
                            return Err(RegistrationError::Superseded.into());
                        }
                        let state = &mut shared.state;
                        state.phase = RegistrationPhase::Registered;
                        state.registrar = Some(registrar.clone());
                        state.last_error = None;
                        self.listeners.snapshot()
                    };
                    tracing::info!(url = %url, device_id = %options.device_id, "Registered");
                    notify(&listeners, &registrar, RegisterUpdate::Register);
                    return Ok(registrar);
                }
                Err(e) => {
                    let message = e.to_string();
                    tracing::warn!(url = %url, error = %message, "Registration failed");

                    {
                        let mut shared = self.shared.lock();
                        if shared.generation != generation {
                            return Err(RegistrationError::Superseded.into());
                        }
                        shared.state.last_error = Some(message.clone());
                        if !options.retries() {
                            shared.state.phase = RegistrationPhase::Fatal;
                        }
                    }

                    if !options.retries() {
                        return Err(ConfigError::RetryDisabled {
                            last_error: message,
                        }
                        .into());
                    }
                    tokio::time::sleep(options.retry_interval()).await;
                }
            }
        }
    }

    async fn attempt(
        &self,
        url: &str,
        options: &RegistrationOptions,
    ) -> std::result::Result<RemoteDevice<TransportOf<R>>, RegistrationError> {
        let registrar = self
            .resolver
            .resolve(url)
            .await
            .map_err(|e| RegistrationError::Connectivity(e.to_string()))?;

        let input = json!({
            "deviceId": options.device_id,
            "address": options.local_address,
        });
        let node = registrar
            .browser(REGISTRAR_MODULE)
            .action(&NodePath::root(), REGISTER_ACTION, Some(input))
            .await;

        match node.into_result() {
            Ok(_) => Ok(registrar),
            Err(e) if e.is_transport() => Err(RegistrationError::Connectivity(e.to_string())),
            Err(e) => Err(RegistrationError::Rejected(e.to_string())),
        }
    }
}

fn notify<T>(
    listeners: &[Arc<RegistrationListener<T>>],
    registrar: &RemoteDevice<T>,
    update: RegisterUpdate,
) {
    for listener in listeners {
        listener(registrar, update);
    }
}

impl<T> Shared<T> {
    fn registered_with(&self) -> Option<RemoteDevice<T>> {
        if self.state.registered() {
            self.state.registrar.clone()
        } else {
            None
        }
    }

    /// Resets the state and cancels the current run. Returns the new
    /// generation.
    fn supersede(&mut self) -> u64 {
        self.generation += 1;
        self.state.reset();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.generation
    }
}

impl<R: Resolver> Clone for CallHome<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Resolver> fmt::Debug for CallHome<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.inner.shared.lock();
        f.debug_struct("CallHome")
            .field("options", &shared.options)
            .field("state", &shared.state)
            .field("listeners", &self.inner.listeners.len())
            .finish_non_exhaustive()
    }
}

fn exit_on_fatal(error: &ConfigError) {
    tracing::error!(error = %error, "Call-home registration cannot continue");
    std::process::exit(1);
}
