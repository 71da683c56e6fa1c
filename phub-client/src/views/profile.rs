//! The signed-in user's profile page

use super::{ViewContext, ViewCore, ViewState};
use crate::error::ApiError;
use phub_common::models::ProfileUpdate;
use phub_common::ApplicationUser;
use tracing::{info, warn};

pub struct ProfileView {
    core: ViewCore,
    profile: ViewState<Option<ApplicationUser>>,
}

impl ProfileView {
    pub fn new(ctx: &ViewContext) -> Self {
        Self {
            core: ViewCore::new(ctx),
            profile: ViewState::new(None),
        }
    }

    /// `GET /users/me`
    pub async fn load(&self) -> Result<ApplicationUser, ApiError> {
        let mark = self.profile.version();
        match self.core.backend.fetch_current_user().await {
            Ok(profile) => {
                self.profile.set_if_version(mark, Some(profile.clone()));
                self.core.clear_error();
                Ok(profile)
            }
            Err(e) => {
                warn!(error = %e, "Failed to load profile");
                self.core.record_api_error(&e);
                Err(e)
            }
        }
    }

    pub fn profile(&self) -> Option<ApplicationUser> {
        self.profile.get()
    }

    pub fn error(&self) -> Option<String> {
        self.core.error()
    }

    /// `POST /users/profile`, then re-fetch
    ///
    /// Not optimistic: the displayed profile changes only once the server
    /// has accepted the update. A `None` bio keeps the current one.
    pub async fn update(
        &self,
        display_name: &str,
        bio: Option<&str>,
    ) -> Result<ApplicationUser, ApiError> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            let err = ApiError::ValidationError("Display name cannot be empty".to_string());
            self.core.record_api_error(&err);
            return Err(err);
        }
        if self.core.user().is_none() {
            let err = ApiError::Unauthorized("Please login to update your profile".to_string());
            self.core.record_api_error(&err);
            return Err(err);
        }

        let update = ProfileUpdate {
            display_name: display_name.to_string(),
            bio: match bio {
                Some(bio) => bio.trim().to_string(),
                None => self
                    .profile
                    .with(|p| p.as_ref().and_then(|p| p.bio.clone()))
                    .unwrap_or_default(),
            },
        };
        if let Err(e) = self.core.backend.update_profile(&update).await {
            warn!(error = %e, "Failed to update profile");
            self.core.record_api_error(&e);
            return Err(e);
        }
        info!(display_name = %update.display_name, "Profile updated");
        self.load().await
    }
}
