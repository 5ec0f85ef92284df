use serde::{Deserialize, Serialize};
use std::env;

use crate::core::Uid;
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub server: ServerConfig,
    pub collections: CollectionConfig,
    pub seed_demo_data: bool,
    /// Viewers allowed to run maintenance routes
    pub admin_uids: Vec<Uid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

impl std::str::FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(AppError::ConfigurationError(format!(
                "unknown STORE_BACKEND '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin used when building shareable profile links
    pub public_origin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub users: String,
    pub theories: String,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            users: "users".to_string(),
            theories: "theories".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                backend: StoreBackend::Memory,
                url: "sqlite:data/theory_social.db".to_string(),
            },
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                public_origin: "http://localhost:3000".to_string(),
            },
            collections: CollectionConfig::default(),
            seed_demo_data: false,
            admin_uids: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Config::default();
        let backend = match env::var("STORE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.store.backend,
        };

        Ok(Self {
            store: StoreConfig {
                backend,
                url: env::var("DATABASE_URL").unwrap_or(defaults.store.url),
            },
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|port| port.parse().ok())
                    .unwrap_or(defaults.server.port),
                public_origin: env::var("PUBLIC_ORIGIN").unwrap_or(defaults.server.public_origin),
            },
            collections: CollectionConfig {
                users: env::var("USERS_COLLECTION").unwrap_or(defaults.collections.users),
                theories: env::var("THEORIES_COLLECTION")
                    .unwrap_or(defaults.collections.theories),
            },
            seed_demo_data: env::var("SEED_DEMO_DATA")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            admin_uids: env::var("ADMIN_UIDS")
                .map(|v| parse_uid_list(&v))
                .unwrap_or_default(),
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn is_admin(&self, uid: &Uid) -> bool {
        self.admin_uids.contains(uid)
    }
}

fn parse_uid_list(raw: &str) -> Vec<Uid> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Uid::from)
        .collect()
}
