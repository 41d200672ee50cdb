//! Persisted UI preferences other than thresholds.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::db::Db;

pub const THEME_KEY: &str = "theme";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme '{other}'")),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

/// Stored theme, or the default when absent or unrecognised.
pub async fn load_theme(db: &Db) -> Result<Theme> {
    let theme = match db.get_setting(THEME_KEY).await? {
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            warn!(raw = %raw, "stored theme unusable ({e}), using default");
            Theme::default()
        }),
        None => Theme::default(),
    };
    Ok(theme)
}

pub async fn save_theme(db: &Db, theme: Theme) -> Result<()> {
    db.set_setting(THEME_KEY, &theme.to_string()).await
}

// ===========================================================================
// Tests
// ===========================================================================
