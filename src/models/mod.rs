// Typed records over the schema-less documents

pub mod activity;
pub mod contact;
pub mod user;

pub use activity::Activity;
pub use contact::Contact;
pub use user::{NamedUser, UserProfile, UserStats};
