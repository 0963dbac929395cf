//! Engine configuration, loaded from TOML.
//!
//! ```toml
//! [manager]
//! name = "village"
//! quest_dir = "data/quests"
//! save_dir = "data/state"
//! quests = ["Deliver Apples", "Slay the Warden"]
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{QuestError, QuestResult};

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub manager: ManagerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManagerConfig {
    pub name: String,
    /// Directory holding `<quest name>.toml` template files
    #[serde(default = "default_quest_dir")]
    pub quest_dir: PathBuf,
    /// Directory quest state snapshots are saved to
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,
    /// Templates this manager may run
    #[serde(default)]
    pub quests: Vec<String>,
}

fn default_quest_dir() -> PathBuf {
    PathBuf::from("data/quests")
}

fn default_save_dir() -> PathBuf {
    PathBuf::from("data/state")
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> QuestResult<Self> {
        toml::from_str(content).map_err(|e| QuestError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> QuestResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            QuestError::Config(format!("failed to read {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&content)
    }
}

impl ManagerConfig {
    /// Template file for a quest name
    pub fn template_path(&self, quest_name: &str) -> PathBuf {
        self.quest_dir.join(format!("{}.toml", quest_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_toml_str("[manager]\nname = \"village\"\n").unwrap();
        assert_eq!(config.manager.name, "village");
        assert_eq!(config.manager.quest_dir, PathBuf::from("data/quests"));
        assert_eq!(config.manager.save_dir, PathBuf::from("data/state"));
        assert!(config.manager.quests.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("quest_manager.toml");
        std::fs::write(
            &path,
            r#"
[manager]
name = "village"
quest_dir = "quests"
save_dir = "state"
quests = ["Deliver Apples"]
"#,
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.manager.quests, vec!["Deliver Apples".to_string()]);
        assert_eq!(
            config.manager.template_path("Deliver Apples"),
            PathBuf::from("quests/Deliver Apples.toml")
        );
        assert!(EngineConfig::load(&temp_dir.path().join("missing.toml")).is_err());
    }
}
