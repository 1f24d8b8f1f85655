use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::api::{self, RegisterRequest, User};
use crate::data::AuthService;
use crate::storage::{self, TOKEN_KEY, USER_KEY};

pub const LOGIN_FAILED_MESSAGE: &str = "Login failed. Please try again.";
pub const REGISTER_FAILED_MESSAGE: &str = "Registration failed. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{0}")]
    Rejected(String),
    #[error("save session: {0:#}")]
    Persist(anyhow::Error),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub user: Option<User>,
    pub token: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
}

impl Snapshot {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

pub struct Manager {
    store: Arc<storage::Store>,
    auth: Arc<dyn AuthService>,
    state: RwLock<Snapshot>,
}

impl Manager {
    pub fn new(store: Arc<storage::Store>, auth: Arc<dyn AuthService>) -> Self {
        Self {
            store,
            auth,
            state: RwLock::new(Snapshot::default()),
        }
    }

    /// Restores a persisted session. Both entries must be present and the
    /// user record must decode; otherwise the session starts signed out.
    pub fn hydrate(&self) -> Result<()> {
        let stored_user = self.store.get(USER_KEY)?;
        let stored_token = self.store.get(TOKEN_KEY)?;

        let (Some(raw_user), Some(token)) = (stored_user, stored_token) else {
            return Ok(());
        };
        match serde_json::from_str::<User>(&raw_user) {
            Ok(user) => {
                info!(user = %user.user_name, "restored session");
                let mut state = self.state.write();
                state.user = Some(user);
                state.token = Some(token);
            }
            Err(err) => {
                warn!(error = %err, "ignoring unreadable stored user");
            }
        }
        Ok(())
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().user.is_some()
    }

    pub fn user(&self) -> Option<User> {
        self.state.read().user.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.state.read().token.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    pub fn clear_error(&self) {
        self.state.write().error = None;
    }

    pub fn login(&self, username: &str, password: &str) -> Result<User, SessionError> {
        {
            let mut state = self.state.write();
            state.loading = true;
            state.error = None;
        }

        let outcome = self
            .auth
            .login(username, password)
            .map_err(|err| {
                warn!(error = %format!("{err:#}"), "login failed");
                SessionError::Rejected(
                    api::server_message(&err).unwrap_or_else(|| LOGIN_FAILED_MESSAGE.to_string()),
                )
            })
            .and_then(|data| {
                let serialized = serde_json::to_string(&data.user)
                    .map_err(|err| SessionError::Persist(err.into()))?;
                self.store
                    .set_many(&[(TOKEN_KEY, data.token.as_str()), (USER_KEY, serialized.as_str())])
                    .map_err(SessionError::Persist)?;
                Ok(data)
            });

        let mut state = self.state.write();
        state.loading = false;
        match outcome {
            Ok(data) => {
                info!(user = %data.user.user_name, "logged in");
                state.user = Some(data.user.clone());
                state.token = Some(data.token);
                Ok(data.user)
            }
            Err(err) => {
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub fn register(&self, request: &RegisterRequest) -> bool {
        {
            let mut state = self.state.write();
            state.loading = true;
            state.error = None;
        }
        let result = self.auth.register(request);
        let mut state = self.state.write();
        state.loading = false;
        match result {
            Ok(()) => {
                info!(user = %request.username, "registered account");
                true
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "registration failed");
                state.error = Some(
                    api::server_message(&err)
                        .unwrap_or_else(|| REGISTER_FAILED_MESSAGE.to_string()),
                );
                false
            }
        }
    }

    pub fn logout(&self) {
        {
            let mut state = self.state.write();
            state.user = None;
            state.token = None;
            state.error = None;
        }
        if let Err(err) = self.store.remove_many(&[USER_KEY, TOKEN_KEY]) {
            warn!(error = %format!("{err:#}"), "failed to clear stored session");
        }
        info!("logged out");
    }
}
