use std::path::{Path, PathBuf};

use anyhow::Context;

/// Environment variable overriding the data directory.
pub const HOME_ENV: &str = "INVESTIQ_HOME";

const DB_FILE_NAME: &str = "investiq.db";
const MODELS_DIR_NAME: &str = "models";

/// File locations for one installation, rooted at a data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvestiqContext {
    home: PathBuf,
}

impl InvestiqContext {
    pub fn new(home: PathBuf) -> Self {
        Self { home }
    }

    /// `$INVESTIQ_HOME`, or `~/.investiq` when unset.
    pub fn from_env() -> anyhow::Result<Self> {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::new(PathBuf::from(home)));
        }
        let home = dirs::home_dir().context("cannot determine the home directory")?;
        Ok(Self::new(home.join(".investiq")))
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn db_path(&self) -> PathBuf {
        self.home.join(DB_FILE_NAME)
    }

    pub fn model_cache_dir(&self) -> PathBuf {
        self.home.join(MODELS_DIR_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_rooted_at_home() {
        let ctx = InvestiqContext::new(PathBuf::from("/data/investiq"));
        assert_eq!(ctx.db_path(), PathBuf::from("/data/investiq/investiq.db"));
        assert_eq!(ctx.model_cache_dir(), PathBuf::from("/data/investiq/models"));
    }
}
