// Core types and primitives shared by every layer

pub mod strong_types;

// Re-export commonly used types
pub use strong_types::{Uid, UidSet};

/// Current time in milliseconds since Unix epoch
pub fn current_time_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
