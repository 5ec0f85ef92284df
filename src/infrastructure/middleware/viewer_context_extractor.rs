// ViewerContext Extractor - builds the request's ViewerContext from headers
// Handlers take `Vc` and never look at identity headers themselves.

use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

use crate::core::Uid;
use crate::error::AppError;
use crate::infrastructure::viewer::ViewerContext;

/// Identity of the signed-in caller, set by the auth layer in front of the API
pub const VIEWER_HEADER: &str = "x-viewer-id";
/// Optional correlation id; generated when absent
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request-scoped viewer. Cloning only bumps the Arc.
#[derive(Debug, Clone)]
pub struct Vc(Arc<ViewerContext>);

// Deref so handlers read vc.uid directly and pass &vc where &ViewerContext is expected
impl std::ops::Deref for Vc {
    type Target = ViewerContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<ViewerContext> for Vc {
    fn as_ref(&self) -> &ViewerContext {
        &self.0
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

impl<S> FromRequestParts<S> for Vc
where
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let vc = match header(parts, VIEWER_HEADER).map(Uid::from) {
            Some(uid) if uid.is_valid() => {
                let viewer = match header(parts, REQUEST_ID_HEADER) {
                    Some(request_id) => ViewerContext::with_request_id(uid, request_id),
                    None => ViewerContext::new(uid),
                };
                Ok(Vc(Arc::new(viewer)))
            }
            Some(uid) => Err(AppError::Unauthorized(format!("invalid viewer id '{}'", uid))),
            None => Err(AppError::Unauthorized(format!("missing {} header", VIEWER_HEADER))),
        };

        async move { vc }
    }
}
