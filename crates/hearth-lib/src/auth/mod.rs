//! Authentication results consumed by the launcher.
//!
//! The wire protocol that produces these lives outside this crate; launching
//! only needs the resulting token/profile bundle.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome reported by an authenticator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthState {
    Success,
    /// Credentials are required before the account can be used
    ReqLogin,
    #[serde(rename = "ERR_INVALID_CRDL")]
    ErrInvalidCredentials,
    ErrNotFound,
    #[serde(rename = "ERR_METHOD_NOT_ALLOW")]
    ErrMethodNotAllowed,
    ErrOther,
    ErrInside,
}

/// A game profile owned by the authenticated account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Undashed UUID
    pub id: String,
    pub name: String,
}

/// Extra account data passed through to the game
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserData {
    pub id: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateResult {
    pub state: AuthState,
    pub error: Option<String>,
    pub access_token: Option<String>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
    pub selected_profile: Option<Profile>,
    pub user_data: Option<UserData>,
    /// `msa`, `mojang` or `legacy`
    #[serde(default = "default_user_type")]
    pub user_type: String,
}

fn default_user_type() -> String {
    "mojang".to_string()
}

impl AuthenticateResult {
    /// Successful result with a single selected profile
    pub fn success(access_token: impl Into<String>, profile: Profile) -> Self {
        Self {
            state: AuthState::Success,
            error: None,
            access_token: Some(access_token.into()),
            profiles: vec![profile.clone()],
            selected_profile: Some(profile),
            user_data: None,
            user_type: default_user_type(),
        }
    }

    /// Offline account: the profile id is derived from the player name so it
    /// stays stable between launches.
    pub fn offline(player_name: &str) -> Self {
        let digest = crate::utils::hash::sha1_hex(format!("OfflinePlayer:{}", player_name).as_bytes());
        let profile = Profile {
            id: digest[..32].to_string(),
            name: player_name.to_string(),
        };
        let mut result = Self::success(digest[..32].to_string(), profile);
        result.user_type = "legacy".to_string();
        result
    }

    pub fn failed(state: AuthState, error: impl Into<String>) -> Self {
        Self {
            state,
            error: Some(error.into()),
            access_token: None,
            profiles: Vec::new(),
            selected_profile: None,
            user_data: None,
            user_type: default_user_type(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == AuthState::Success
    }
}
