use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// UI preferences. Kept apart from the search settings record.
#[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
pub struct Config {
  pub theme_name: Option<String>,
  pub display_mode: Option<String>,
}

impl Config {
  pub fn load() -> Self {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "tenor-tui") {
      let config_file = proj_dirs.config_dir().join("prefs.toml");
      if let Ok(content) = std::fs::read_to_string(config_file)
        && let Ok(config) = toml::from_str(&content)
      {
        return config;
      }
    }
    Self::default()
  }

  pub fn save(&self) {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "tenor-tui") {
      let config_dir = proj_dirs.config_dir();
      if std::fs::create_dir_all(config_dir).is_ok() {
        let config_file = config_dir.join("prefs.toml");
        if let Ok(content) = toml::to_string(self) {
          let _ = std::fs::write(config_file, content);
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn prefs_round_trip_through_toml() {
    let config = Config { theme_name: Some("paper".to_string()), display_mode: Some("ascii".to_string()) };
    let text = toml::to_string(&config).unwrap();
    assert!(text.contains("theme_name = \"paper\""));
    assert_eq!(toml::from_str::<Config>(&text).unwrap(), config);
  }

  #[test]
  fn empty_prefs_file_is_default() {
    assert_eq!(toml::from_str::<Config>("").unwrap(), Config::default());
  }
}
