//! Cached user profile.

use serde::{Deserialize, Serialize};

/// Profile of the signed-in user, cached on device between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stable user identifier; owns every task the user creates.
    pub id: String,
    /// Sign-in email address.
    pub email: String,
    /// Name shown in the UI. Falls back to the email when empty.
    pub display_name: String,
}

impl UserProfile {
    /// Returns the name to show for this user.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.email
        } else {
            &self.display_name
        }
    }
}
