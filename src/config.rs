use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

use crate::TokenStore;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: Api,
    pub token: Token,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Api {
    pub base_url: String,

    /// Budget for CRUD requests.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Budget for AI suggestion requests.
    #[serde(with = "humantime_serde")]
    pub suggestion_timeout: Duration,
}

impl Default for Api {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".into(),
            timeout: Duration::from_secs(10),
            suggestion_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Token {
    pub path: Option<PathBuf>,
}

impl Token {
    pub fn store(&self) -> TokenStore {
        self.path
            .clone()
            .map_or_else(TokenStore::default, TokenStore::new)
    }
}
