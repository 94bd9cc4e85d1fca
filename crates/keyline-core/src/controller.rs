//! Session controller.
//!
//! Single authority for auth state transitions and the only writer to the
//! [`CredentialStore`]. Every operation publishes through its [`OutcomeSlot`];
//! the current [`Session`] is published through its own watch channel so
//! consumers subscribe instead of polling a global.
//!
//! A second call of the same kind supersedes the first: the earlier completion
//! is dropped, including its store write.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::client::{AuthClient, AuthError};
use crate::models::{RegisterRequest, Session, UserProfile};
use crate::outcome::{AuthOutcome, OutcomeSlot, Ticket};
use crate::store::CredentialStore;
use crate::validation::{self, RegistrationForm};

pub const INVALID_TOKEN: &str = "invalid token received";
pub const INVALID_USER: &str = "invalid user received";
pub const SUPERSEDED: &str = "request superseded by a newer one";

/// Successful login payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSuccess {
    pub token: String,
    pub user: UserProfile,
    pub message: Option<String>,
}

/// Outcome slots that can be reset independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Login,
    Register,
    Profile,
}

pub struct SessionController {
    client: AuthClient,
    store: Arc<dyn CredentialStore>,
    login: OutcomeSlot<LoginSuccess>,
    register: OutcomeSlot<String>,
    profile: OutcomeSlot<UserProfile>,
    session: watch::Sender<Session>,
    clear_on_unauthorized: bool,
}

impl SessionController {
    /// Creates a controller seeded with whatever session the store holds.
    ///
    /// An unreadable store starts signed out so that `logout` can still clear it.
    pub fn new(client: AuthClient, store: Arc<dyn CredentialStore>) -> Self {
        let session = store.read().unwrap_or_else(|err| {
            warn!(error = %format!("{err:#}"), "stored session unreadable; starting signed out");
            Session::default()
        });
        Self {
            client,
            store,
            login: OutcomeSlot::new(),
            register: OutcomeSlot::new(),
            profile: OutcomeSlot::new(),
            session: watch::Sender::new(session),
            clear_on_unauthorized: true,
        }
    }

    /// Whether a 401 from profile refresh ends the local session.
    #[must_use]
    pub fn with_clear_on_unauthorized(mut self, enabled: bool) -> Self {
        self.clear_on_unauthorized = enabled;
        self
    }

    pub fn client(&self) -> &AuthClient {
        &self.client
    }

    pub fn login_state(&self) -> watch::Receiver<AuthOutcome<LoginSuccess>> {
        self.login.subscribe()
    }

    pub fn register_state(&self) -> watch::Receiver<AuthOutcome<String>> {
        self.register.subscribe()
    }

    pub fn profile_state(&self) -> watch::Receiver<AuthOutcome<UserProfile>> {
        self.profile.subscribe()
    }

    pub fn session_state(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    /// Current in-memory session.
    pub fn session(&self) -> Session {
        self.session.borrow().clone()
    }

    /// Reads the durable session straight from the store.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub fn stored_session(&self) -> Result<Session> {
        self.store.read()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.borrow().is_authenticated()
    }

    pub fn profile_outcome(&self) -> AuthOutcome<UserProfile> {
        self.profile.current()
    }

    /// Validates, then logs in and persists the session.
    ///
    /// The returned outcome describes this call. It is only published, and the
    /// session only persisted, if no later login, reset or logout superseded it;
    /// a superseded success comes back as `Failed(SUPERSEDED)`.
    pub async fn login(&self, email: &str, password: &str) -> AuthOutcome<LoginSuccess> {
        let email = email.trim();
        if let Err(err) = validation::validate_login(email, password) {
            let err = AuthError::from(err);
            debug!(kind = %err.kind(), %err, "login rejected");
            return self.login.fail(err.to_string());
        }

        let ticket = self.login.begin();
        let result = self.client.login(email, password).await;

        let resolved = match result {
            Ok(response) => {
                let token = response.token.filter(|t| !t.trim().is_empty());
                match (token, response.user) {
                    (None, _) => Err(INVALID_TOKEN.to_string()),
                    (Some(_), None) => Err(INVALID_USER.to_string()),
                    (Some(token), Some(user)) => Ok(LoginSuccess {
                        token,
                        user,
                        message: response.message,
                    }),
                }
            }
            Err(err) => Err(err.to_string()),
        };

        match resolved {
            Ok(success) => self
                .login
                .commit(ticket, || self.persist_login(success))
                .unwrap_or_else(|| {
                    debug!("login completion superseded; session not saved");
                    AuthOutcome::Failed(SUPERSEDED.to_string())
                }),
            Err(reason) => {
                self.finish(&self.login, ticket, AuthOutcome::Failed(reason), "login")
            }
        }
    }

    // Store write and in-memory update share the session lock with `end_session_for`.
    fn persist_login(&self, success: LoginSuccess) -> AuthOutcome<LoginSuccess> {
        let mut saved = Ok(());
        self.session.send_if_modified(|session| {
            saved = self.store.save(&success.token, &success.user);
            if saved.is_err() {
                return false;
            }
            *session = Session::new(success.token.clone(), success.user.clone());
            true
        });
        if let Err(err) = saved {
            warn!(error = %format!("{err:#}"), "failed to persist session");
            return AuthOutcome::Failed(format!("Failed to save session: {err:#}"));
        }
        info!(user_id = success.user.id, email = %success.user.email, "session created");
        AuthOutcome::Ok(success)
    }

    /// Validates, then registers. Never authenticates the client.
    pub async fn register(&self, form: &RegistrationForm<'_>) -> AuthOutcome<String> {
        if let Err(err) = validation::validate_registration(form) {
            let err = AuthError::from(err);
            debug!(kind = %err.kind(), %err, "registration rejected");
            return self.register.fail(err.to_string());
        }

        let request = RegisterRequest {
            first_name: form.first_name.trim(),
            last_name: form.last_name.trim(),
            email: form.email.trim(),
            password: form.password,
        };

        let ticket = self.register.begin();
        let outcome = match self.client.register(&request).await {
            Ok(response) => AuthOutcome::Ok(response.message),
            Err(err) => AuthOutcome::Failed(err.to_string()),
        };

        self.finish(&self.register, ticket, outcome, "register")
    }

    /// Fetches the profile and writes it through to the store on success.
    ///
    /// On failure the stored user is left untouched. A 401 ends the session
    /// when `clear_on_unauthorized` is set.
    pub async fn load_profile(&self, token: &str) -> AuthOutcome<UserProfile> {
        let ticket = self.profile.begin();
        match self.client.get_profile(token).await {
            Ok(user) => {
                let outcome = self
                    .profile
                    .commit(ticket, || self.persist_profile(token, user.clone()));
                outcome.unwrap_or_else(|| {
                    debug!("profile completion superseded; discarded");
                    AuthOutcome::Ok(user)
                })
            }
            Err(err) => {
                let unauthorized = err.is_unauthorized();
                let failed = AuthOutcome::Failed(err.to_string());
                let outcome = self.finish(&self.profile, ticket, failed, "profile");
                if unauthorized && self.clear_on_unauthorized {
                    match self.end_session_for(token) {
                        Ok(true) => info!("profile refresh unauthorized; session ended"),
                        Ok(false) => debug!("rejected token already replaced; session kept"),
                        Err(clear_err) => {
                            warn!(error = %format!("{clear_err:#}"), "failed to clear expired session");
                        }
                    }
                }
                outcome
            }
        }
    }

    fn persist_profile(&self, token: &str, user: UserProfile) -> AuthOutcome<UserProfile> {
        let mut saved = None;
        self.session.send_if_modified(|session| {
            if session.token() != Some(token) {
                return false;
            }
            let result = self.store.save_user(&user);
            let ok = result.is_ok();
            if ok {
                session.user = Some(user.clone());
            }
            saved = Some(result);
            ok
        });
        match saved {
            None => debug!("profile fetched for a replaced token; cache left alone"),
            Some(Err(err)) => {
                warn!(error = %format!("{err:#}"), "failed to cache profile");
                return AuthOutcome::Failed(format!("Failed to save profile: {err:#}"));
            }
            Some(Ok(())) => debug!(user_id = user.id, "profile refreshed"),
        }
        AuthOutcome::Ok(user)
    }

    /// Best-effort backend logout, then unconditional local sign-out.
    ///
    /// Backend failures are logged and swallowed.
    ///
    /// # Errors
    /// Returns an error only if the local store cannot be cleared.
    pub async fn logout(&self, token: &str) -> Result<()> {
        if token.trim().is_empty() {
            debug!("logout without token; skipping backend call");
        } else if let Err(err) = self.client.logout(token).await {
            warn!(
                kind = %err.kind(),
                error = %err,
                "backend logout failed; clearing local session anyway"
            );
        }

        self.end_session()?;
        info!("session ended");
        Ok(())
    }

    /// Forces one slot back to `Idle`.
    pub fn reset(&self, kind: OutcomeKind) {
        match kind {
            OutcomeKind::Login => self.login.reset(),
            OutcomeKind::Register => self.register.reset(),
            OutcomeKind::Profile => self.profile.reset(),
        }
    }

    fn end_session(&self) -> Result<()> {
        self.reset_slots();
        self.session.send_replace(Session::default());
        self.store.clear().context("Failed to clear stored session")
    }

    /// Ends the session only if `token` is still the current one.
    ///
    /// The token check, the in-memory clear and the store clear happen under the
    /// session lock, so a login that lands meanwhile is never wiped.
    fn end_session_for(&self, token: &str) -> Result<bool> {
        let mut cleared = Ok(false);
        self.session.send_if_modified(|session| {
            if session.token() != Some(token) {
                return false;
            }
            *session = Session::default();
            cleared = self
                .store
                .clear()
                .context("Failed to clear stored session")
                .map(|()| true);
            true
        });
        if !matches!(cleared, Ok(false)) {
            self.reset_slots();
        }
        cleared
    }

    fn reset_slots(&self) {
        self.login.reset();
        self.register.reset();
        self.profile.reset();
    }

    fn finish<T: Clone>(
        &self,
        slot: &OutcomeSlot<T>,
        ticket: Ticket,
        outcome: AuthOutcome<T>,
        operation: &str,
    ) -> AuthOutcome<T> {
        let published = outcome.clone();
        if slot.commit(ticket, move || published).is_none() {
            debug!(operation, "completion superseded; discarded");
        }
        outcome
    }
}
