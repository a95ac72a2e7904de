use clap::Parser;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use tag_hub_core::Grant;

use crate::api::ApiSettings;

#[derive(Parser, Debug, Clone)]
#[command(name = "tag-hub")]
#[command(about = "Document tagging service with object-level access control")]
pub struct Config {
    /// Listen address
    #[arg(long, env = "TAG_HUB_ADDR", default_value = "127.0.0.1:3000")]
    pub addr: SocketAddr,

    /// Directory holding the state snapshot. State is kept in memory when unset.
    #[arg(long, env = "TAG_HUB_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Shared secret for HS256 bearer tokens
    #[arg(long, env = "TAG_HUB_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Reject bearer tokens whose `exp` has passed
    #[arg(long, env = "TAG_HUB_JWT_VALIDATE_EXP")]
    pub jwt_validate_exp: bool,

    /// Accept X-User-Id / X-Roles headers as identity
    #[arg(long, env = "TAG_HUB_TRUST_USER_HEADER")]
    pub trust_user_header: bool,

    /// Users that bypass every permission check
    #[arg(long = "admin", env = "TAG_HUB_ADMINS", value_delimiter = ',')]
    pub admins: Vec<String>,

    /// Global grants installed at startup, as user:<id>:<permission> or
    /// role:<name>:<permission>
    #[arg(long = "grant", env = "TAG_HUB_GLOBAL_GRANTS", value_delimiter = ',')]
    pub grants: Vec<String>,

    /// Default page size for list endpoints
    #[arg(long, env = "TAG_HUB_PAGE_SIZE", default_value_t = 40)]
    pub page_size: usize,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "TAG_HUB_LOG", default_value = "info")]
    pub log: String,
}

impl Config {
    pub fn global_grants(&self) -> tag_hub_core::Result<Vec<Grant>> {
        self.grants
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::parse::<Grant>)
            .collect()
    }

    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            trust_user_header: self.trust_user_header,
            admins: self
                .admins
                .iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect::<HashSet<_>>(),
            default_page_size: self.page_size.clamp(1, crate::api::MAX_PAGE_SIZE),
        }
    }
}
