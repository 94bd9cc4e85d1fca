//! Profile reconciliation for authenticated views.
//!
//! On entry the cached user is shown at once; a background refresh replaces it
//! only on success. A failed refresh is silent and the cached copy stays the
//! visible truth. With no cache and a failed refresh the view stays a placeholder.

use anyhow::Result;
use tracing::debug;

use crate::controller::SessionController;
use crate::models::UserProfile;
use crate::outcome::AuthOutcome;

/// What an authenticated view should render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileView {
    /// Nothing cached and nothing fetched yet
    Placeholder,
    /// Shown from the store, not yet confirmed by the backend
    Cached(UserProfile),
    /// Confirmed by a refresh
    Fresh(UserProfile),
    /// The session ended (logout elsewhere or rejected token)
    SignedOut,
}

impl ProfileView {
    pub fn user(&self) -> Option<&UserProfile> {
        match self {
            ProfileView::Cached(user) | ProfileView::Fresh(user) => Some(user),
            ProfileView::Placeholder | ProfileView::SignedOut => None,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, ProfileView::Fresh(_))
    }
}

pub struct ProfileReconciler<'a> {
    controller: &'a SessionController,
    token: Option<String>,
    view: ProfileView,
}

impl<'a> ProfileReconciler<'a> {
    /// Enters the view: reads the stored session and renders the cached user.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub fn enter(controller: &'a SessionController) -> Result<Self> {
        let session = controller.stored_session()?;
        let token = session.token().map(str::to_string);
        let view = match session.user {
            Some(user) => ProfileView::Cached(user),
            None => ProfileView::Placeholder,
        };
        Ok(Self {
            controller,
            token,
            view,
        })
    }

    pub fn view(&self) -> &ProfileView {
        &self.view
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Refreshes unless a fetch is already in flight or this controller already
    /// holds a fresh profile, in which case that profile is reused.
    pub async fn refresh(&mut self) -> &ProfileView {
        match self.controller.profile_outcome() {
            AuthOutcome::Pending => {
                debug!("profile fetch already in flight; keeping current view");
                &self.view
            }
            AuthOutcome::Ok(user) => {
                self.view = ProfileView::Fresh(user);
                &self.view
            }
            AuthOutcome::Idle | AuthOutcome::Failed(_) => self.force_refresh().await,
        }
    }

    /// Always asks the backend, even if a fresh profile is already held.
    pub async fn force_refresh(&mut self) -> &ProfileView {
        let Some(token) = self.token.clone() else {
            debug!("no token stored; skipping profile refresh");
            return &self.view;
        };

        match self.controller.load_profile(&token).await {
            AuthOutcome::Ok(user) => self.view = ProfileView::Fresh(user),
            AuthOutcome::Failed(reason) => {
                if self.controller.is_authenticated() {
                    debug!(%reason, "profile refresh failed; keeping cached view");
                } else {
                    debug!(%reason, "session ended during refresh");
                    self.token = None;
                    self.view = ProfileView::SignedOut;
                }
            }
            AuthOutcome::Idle | AuthOutcome::Pending => {}
        }
        &self.view
    }
}
