//! Ticket and user repositories over a [`Transport`], falling back to the
//! [`DegradedStore`] when, and only when, the API is unreachable. The
//! source is chosen once per operation: a record read from one is never
//! written to the other.

mod suggestion;
mod ticket;
mod user;

use std::{
    collections::HashSet,
    fmt::Display,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use serde_json::json;
use tracing::{info, warn};

use crate::{
    api, config,
    model::{self, User},
    transport::Request,
    Config, DegradedStore, Error, Gateway, TokenStore, Transport,
};

pub use self::suggestion::{Source, Suggestion};

pub struct Client<T = Gateway> {
    transport: T,
    tokens: TokenStore,
    store: Arc<DegradedStore>,
    suggestion_timeout: Duration,

    /// Tickets with a claim or resolve currently in flight.
    busy: Mutex<HashSet<model::ticket::Id>>,
}

/// Where a record was read from. Follow-up writes go to the same place.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Origin {
    Remote,
    Degraded,
}

/// Outcome of a successful login.
#[derive(Clone, Debug)]
pub struct Session {
    /// Authenticated user, when the server (or offline store) provided it.
    pub user: Option<User>,

    /// Logged in against the degraded store; no token was stored.
    pub offline: bool,
}

impl Client<Gateway> {
    pub fn from_config(config: &Config, store: Arc<DegradedStore>) -> Self {
        let tokens = config.token.store();
        let gateway = Gateway::new(&config.api, tokens.clone());
        Self::new(gateway, tokens, store)
            .with_suggestion_timeout(config.api.suggestion_timeout)
    }
}

impl<T: Transport> Client<T> {
    pub fn new(
        transport: T,
        tokens: TokenStore,
        store: Arc<DegradedStore>,
    ) -> Self {
        Self {
            transport,
            tokens,
            store,
            suggestion_timeout: config::Api::default().suggestion_timeout,
            busy: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_suggestion_timeout(mut self, timeout: Duration) -> Self {
        self.suggestion_timeout = timeout;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn store(&self) -> &DegradedStore {
        &self.store
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, Error> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(Error::validation("email and password are required"));
        }

        let body = api::auth::LoginBody {
            email,
            senha: password,
        };
        let request = Request::post(api::auth::LOGIN_PATH, json!(body));
        let result = self.transport.send(request.anonymous()).await;
        match result {
            Ok(answer) => {
                let (token, user) = api::auth::decode_login(&answer)?;
                self.tokens.save(&token).await;
                info!(email, "logged in");
                Ok(Session {
                    user,
                    offline: false,
                })
            }
            Err(Error::Connectivity(reason)) => {
                warn!(%reason, "backend unreachable, offline login");
                let user = self.store.find_user_by_email(email).ok_or_else(
                    || Error::NotFound(format!("offline user {email}")),
                )?;
                Ok(Session {
                    user: Some(user),
                    offline: true,
                })
            }
            Err(Error::AuthExpired(message)) => Err(Error::Remote {
                status: 401,
                message,
            }),
            Err(e) => Err(e),
        }
    }

    pub async fn logout(&self) {
        self.tokens.clear().await;
        info!("logged out");
    }

    pub async fn is_authenticated(&self) -> bool {
        self.tokens.read().await.is_some()
    }

    /// Serves `result`, or the degraded store's answer if `result` failed
    /// for lack of connectivity.
    fn or_degraded<R>(
        &self,
        operation: &'static str,
        result: Result<R, Error>,
        degraded: impl FnOnce(&DegradedStore) -> Result<R, Error>,
    ) -> Result<R, Error> {
        match result {
            Err(Error::Connectivity(reason)) => {
                warn!(operation, %reason, "serving from degraded store");
                degraded(&self.store)
            }
            other => other,
        }
    }

    /// Logged-in user. When the API is unreachable, falls back to the
    /// degraded-store user registered under `offline_email`, the identity
    /// of an offline session.
    pub async fn current_user(
        &self,
        offline_email: Option<&str>,
    ) -> Result<User, Error> {
        match self.my_profile().await {
            Err(Error::Connectivity(reason)) => {
                let email = offline_email.ok_or(Error::Connectivity(reason))?;
                self.store.find_user_by_email(email).ok_or_else(|| {
                    Error::NotFound(format!("offline user {email}"))
                })
            }
            other => other,
        }
    }

    /// Marks `id` busy until the returned guard drops. `None` if it
    /// already is.
    fn begin(&self, id: model::ticket::Id) -> Option<Busy<'_>> {
        let mut busy =
            self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        busy.insert(id).then(|| Busy { set: &self.busy, id })
    }
}

/// The server accepted a write but its result could not be fetched. Never
/// served from the degraded store.
fn unread(record: impl Display, e: Error) -> Error {
    match e {
        Error::Connectivity(reason) => Error::Connectivity(format!(
            "{record} was updated but could not be read back: {reason}",
        )),
        e => e,
    }
}

struct Busy<'a> {
    set: &'a Mutex<HashSet<model::ticket::Id>>,
    id: model::ticket::Id,
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}
