use std::{collections::HashSet, fs};
use serde_json::Value;
use tracing::{info, warn};
use crate::config::resolve_repo_path;
use crate::types::AppConfig;

const BUILTIN_TITLES: &str = include_str!("../data/anime_titles.txt");

/// EntrantList is the ordered, de-duplicated set of titles a bracket starts from.
/// It is read once at startup and handed to the engine, which restores it on reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntrantList {
    titles: Vec<String>,
}

impl EntrantList {
    pub fn builtin() -> Self {
        // The compiled-in list is plain text, so parsing cannot fail on format.
        Self::from_text(BUILTIN_TITLES).unwrap_or_default()
    }

    /// Load the list named by `entrantsPath`, falling back to the built-in titles.
    pub fn load(config: &AppConfig) -> Result<Self, String> {
        let raw = config.entrants_path.trim();
        let list = if raw.is_empty() {
            Self::builtin()
        } else {
            let path = resolve_repo_path(raw);
            let data = fs::read_to_string(&path)
                .map_err(|e| format!("read entrants {}: {e}", path.display()))?;
            let list = Self::from_text(&data)
                .map_err(|e| format!("parse entrants {}: {e}", path.display()))?;
            info!("Loaded {} entrants from {}", list.len(), path.display());
            list
        };
        if list.is_empty() {
            return Err("Entrant list is empty.".to_string());
        }
        Ok(list)
    }

    /// Parse either a JSON array of strings or one title per line
    /// (blank lines and `#` comments skipped).
    pub fn from_text(data: &str) -> Result<Self, String> {
        let trimmed = data.trim_start();
        let raw: Vec<String> = if trimmed.starts_with('[') {
            let value: Value = serde_json::from_str(trimmed).map_err(|e| e.to_string())?;
            let items = value
                .as_array()
                .ok_or_else(|| "Entrant JSON must be an array of strings.".to_string())?;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let title = item
                    .as_str()
                    .ok_or_else(|| format!("Entrant JSON contains a non-string value: {item}"))?;
                out.push(title.to_string());
            }
            out
        } else {
            data.lines()
                .map(str::trim)
                .filter(|line| !line.starts_with('#'))
                .map(str::to_string)
                .collect()
        };
        Ok(Self::from_titles(raw))
    }

    /// Trim titles, drop empties, and keep only the first occurrence of each title.
    pub fn from_titles<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for title in titles {
            let title = title.as_ref().trim();
            if title.is_empty() {
                continue;
            }
            if !seen.insert(title.to_string()) {
                warn!("Duplicate entrant {title:?} ignored");
                continue;
            }
            out.push(title.to_string());
        }
        EntrantList { titles: out }
    }

    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    pub fn into_titles(self) -> Vec<String> {
        self.titles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::STAGE_SIZES;

    #[test]
    fn test_builtin_fills_first_stage() {
        let list = EntrantList::builtin();
        assert_eq!(list.len(), STAGE_SIZES[0] as usize);
        assert!(list.titles().iter().all(|title| !title.starts_with('#')));
    }

    #[test]
    fn test_text_lines_skip_comments_and_blanks() {
        let list = EntrantList::from_text("# header\n  Monster \n\nMushishi\n#Trigun\n").unwrap();
        assert_eq!(list.titles(), ["Monster".to_string(), "Mushishi".to_string()]);
    }

    #[test]
    fn test_json_array() {
        let list = EntrantList::from_text(r#"["Akira", " FLCL ", ""]"#).unwrap();
        assert_eq!(list.into_titles(), vec!["Akira".to_string(), "FLCL".to_string()]);

        assert!(EntrantList::from_text(r#"["Akira", 3]"#).is_err());
        assert!(EntrantList::from_text("[not json").is_err());
    }

    #[test]
    fn test_duplicates_keep_first_occurrence() {
        let list = EntrantList::from_titles(["Nana", "Berserk", "Nana", " Berserk"]);
        assert_eq!(list.titles(), ["Nana".to_string(), "Berserk".to_string()]);
    }

    #[test]
    fn test_load_rejects_empty_file() {
        let dir = std::env::temp_dir().join(format!("anime-bracket-entrants-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("empty.txt");
        fs::write(&path, "# nothing here\n\n").unwrap();

        let config = AppConfig {
            entrants_path: path.to_string_lossy().to_string(),
            ..AppConfig::default()
        };
        assert!(EntrantList::load(&config).is_err());

        fs::write(&path, "Pluto\nLink Click\n").unwrap();
        assert_eq!(EntrantList::load(&config).unwrap().len(), 2);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_defaults_to_builtin() {
        let list = EntrantList::load(&AppConfig::default()).unwrap();
        assert_eq!(list, EntrantList::builtin());
    }
}
