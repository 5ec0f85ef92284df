// Navigation targets the social views hand back to the host application

use serde::Serialize;
use std::fmt;

use crate::core::Uid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "route", content = "id", rename_all = "camelCase")]
pub enum Route {
    Login,
    EditProfile,
    TheoryForm,
    Chat(Uid),
    Profile(Uid),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::EditProfile => "/Edit-Profile".to_string(),
            Route::TheoryForm => "/theory-form".to_string(),
            Route::Chat(uid) => format!("/chat/{}", uid),
            Route::Profile(uid) => format!("/profile/{}", uid),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Shareable link to a public profile
pub fn share_profile_link(origin: &str, uid: &Uid) -> String {
    format!("{}{}", origin.trim_end_matches('/'), Route::Profile(uid.clone()).path())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_paths() {
        assert_eq!(Route::Login.path(), "/login");
        assert_eq!(Route::EditProfile.path(), "/Edit-Profile");
        assert_eq!(Route::TheoryForm.path(), "/theory-form");
        assert_eq!(Route::Chat(Uid::from("bob")).to_string(), "/chat/bob");
    }

    #[test]
    fn test_share_link_trims_trailing_slash() {
        let uid = Uid::from("alice");
        assert_eq!(
            share_profile_link("https://theories.app/", &uid),
            "https://theories.app/profile/alice"
        );
    }
}
