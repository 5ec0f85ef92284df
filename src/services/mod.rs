// Social services - the components the profile, dashboard and messaging pages use

pub mod contact_list;
pub mod profile_loader;
pub mod relationship_manager;

pub use contact_list::{
    derive_contacts, load_contacts, AttachState, ContactListBuilder, SessionBinding,
};
pub use profile_loader::{DashboardView, ProfileLoader, ProfileView, PublicProfilePage};
pub use relationship_manager::{ReconciliationReport, RelationshipManager, RelationshipView};
