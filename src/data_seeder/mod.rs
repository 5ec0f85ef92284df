// Demo data - a small friendship graph with a few theories per user

use chrono::{Duration, Utc};
use tracing::info;

use crate::{
    config::CollectionConfig,
    core::Uid,
    error::AppResult,
    infrastructure::DocumentStore,
    models::{Activity, UserProfile},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub theories: usize,
}

struct DemoUser {
    uid: &'static str,
    name: &'static str,
    bio: Option<&'static str>,
    photo_url: Option<&'static str>,
    friends: &'static [&'static str],
    requests: &'static [&'static str],
    theories: &'static [DemoTheory],
}

struct DemoTheory {
    title: &'static str,
    description: Option<&'static str>,
    media_url: Option<&'static str>,
}

const fn theory(title: &'static str) -> DemoTheory {
    DemoTheory {
        title,
        description: None,
        media_url: None,
    }
}

const DEMO_USERS: &[DemoUser] = &[
    DemoUser {
        uid: "alice",
        name: "Alice Johnson",
        bio: Some("Software engineer who loves hiking and photography"),
        photo_url: Some("https://picsum.photos/seed/alice/200"),
        friends: &["bob", "diana"],
        requests: &["eve"],
        theories: &[
            DemoTheory {
                title: "The moon landing footage was shot twice",
                description: Some("Once for television, once for the archive."),
                media_url: Some("https://picsum.photos/seed/moon/600/400"),
            },
            theory("Cats understand Wi-Fi"),
        ],
    },
    DemoUser {
        uid: "bob",
        name: "Bob Smith",
        bio: Some("Product manager with a passion for cycling"),
        photo_url: None,
        friends: &["alice"],
        requests: &[],
        theories: &[DemoTheory {
            title: "Bicycles were invented by accident",
            description: Some("Someone was trying to build a faster wheelbarrow."),
            media_url: None,
        }],
    },
    DemoUser {
        uid: "charlie",
        name: "Charlie Brown",
        bio: None,
        photo_url: None,
        friends: &[],
        requests: &["bob"],
        theories: &[],
    },
    DemoUser {
        uid: "diana",
        name: "Diana Prince",
        bio: Some("Data scientist exploring machine learning"),
        photo_url: Some("https://picsum.photos/seed/diana/200"),
        friends: &["alice"],
        requests: &[],
        theories: &[theory("Every dataset has one row that lies")],
    },
    DemoUser {
        uid: "eve",
        name: "Eve Wilson",
        bio: Some("Marketing specialist who enjoys cooking"),
        photo_url: None,
        friends: &[],
        requests: &[],
        theories: &[theory("Recipes are just theories with salt")],
    },
];

/// Theory ids are derived from the author and position, so reseeding
/// replaces the same documents instead of adding new ones.
pub fn demo_theory_id(uid: &str, index: usize) -> String {
    format!("{}-theory-{}", uid, index + 1)
}

/// Write the demo graph. Existing documents with the same ids are replaced.
pub async fn seed_demo_data(
    store: &dyn DocumentStore,
    collections: &CollectionConfig,
) -> AppResult<SeedSummary> {
    info!("Seeding demo data...");
    let mut summary = SeedSummary::default();
    let now = Utc::now();

    for user in DEMO_USERS {
        let mut profile = UserProfile::new(user.uid).with_display_name(user.name);
        if let Some(bio) = user.bio {
            profile = profile.with_bio(bio);
        }
        if let Some(url) = user.photo_url {
            profile = profile.with_photo_url(url);
        }
        profile.friends = user.friends.iter().copied().map(Uid::from).collect();
        profile.friend_requests = user.requests.iter().copied().map(Uid::from).collect();
        profile.theories_count = user.theories.len() as u64;
        profile.following_count = user.friends.len() as u64;
        profile.followers_count = user.friends.len() as u64;

        store
            .set_document(&collections.users, user.uid, profile.to_fields())
            .await?;
        summary.users += 1;

        for (i, demo) in user.theories.iter().enumerate() {
            let id = demo_theory_id(user.uid, i);
            let mut theory = Activity::new(id.clone(), user.uid, demo.title)
                .created_at(now - Duration::hours((i as i64 + 1) * 6));
            if let Some(description) = demo.description {
                theory = theory.with_description(description);
            }
            if let Some(url) = demo.media_url {
                theory = theory.with_media_url(url);
            }
            store
                .set_document(&collections.theories, &id, theory.to_fields())
                .await?;
            summary.theories += 1;
        }
    }

    info!(
        users = summary.users,
        theories = summary.theories,
        "Demo data seeded"
    );
    Ok(summary)
}
