use serde::{Deserialize, Serialize};

/// Team member profile returned by the membership collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberProfile {
    pub display_name: String,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub profile_picture_url: String,
}
