// Viewer Context - the identity on whose behalf an operation runs
// Passed explicitly into every component instead of an ambient session global.

use uuid::Uuid;

use crate::core::Uid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerContext {
    pub uid: Uid,
    pub request_id: String,
}

impl ViewerContext {
    pub fn new(uid: impl Into<Uid>) -> Self {
        Self {
            uid: uid.into(),
            request_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_request_id(uid: impl Into<Uid>, request_id: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            request_id: request_id.into(),
        }
    }

    pub fn is(&self, uid: &Uid) -> bool {
        &self.uid == uid
    }
}
