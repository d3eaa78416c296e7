//! Team-membership lookup collaborator.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::AppResult;
use crate::models::member::MemberProfile;

#[async_trait]
pub trait MembershipLookup: Send + Sync {
    /// Resolve a team member's profile, authenticated with the caller's
    /// cookie header. `None` means the user is not a member of the team.
    async fn member_profile(
        &self,
        team_id: &str,
        user_id: &str,
        cookie_header: &str,
    ) -> AppResult<Option<MemberProfile>>;
}

/// Looks members up against the backend's team-members endpoint.
pub struct HttpMembershipLookup {
    base_url: String,
    http: reqwest::Client,
}

impl HttpMembershipLookup {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl MembershipLookup for HttpMembershipLookup {
    async fn member_profile(
        &self,
        team_id: &str,
        user_id: &str,
        cookie_header: &str,
    ) -> AppResult<Option<MemberProfile>> {
        let url = format!(
            "{}/teams/{}/members?user_id={}",
            self.base_url, team_id, user_id
        );
        let response = self
            .http
            .get(url)
            .header(reqwest::header::COOKIE, cookie_header)
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let members: Vec<MemberProfile> = response.json().await?;
        Ok(members.into_iter().next())
    }
}

/// In-process lookup backed by a fixed member table, for tests and local
/// development.
#[derive(Default)]
pub struct StaticMembership {
    members: RwLock<HashMap<(String, String), MemberProfile>>,
}

impl StaticMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(&self, team_id: &str, user_id: &str, display_name: &str) {
        let profile = MemberProfile {
            display_name: display_name.to_string(),
            online: false,
            profile_picture_url: String::new(),
        };
        self.members
            .write()
            .expect("membership table lock poisoned")
            .insert((team_id.to_string(), user_id.to_string()), profile);
    }
}

#[async_trait]
impl MembershipLookup for StaticMembership {
    async fn member_profile(
        &self,
        team_id: &str,
        user_id: &str,
        _cookie_header: &str,
    ) -> AppResult<Option<MemberProfile>> {
        let members = self.members.read().expect("membership table lock poisoned");
        Ok(members
            .get(&(team_id.to_string(), user_id.to_string()))
            .cloned())
    }
}
