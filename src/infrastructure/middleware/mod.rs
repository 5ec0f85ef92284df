// Request plumbing for the HTTP surface

pub mod viewer_context_extractor;

pub use viewer_context_extractor::{Vc, REQUEST_ID_HEADER, VIEWER_HEADER};
