use crate::types::*;
use chrono::Local;
use std::{
    env,
    fs,
    io::{self, Write},
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

pub fn repo_root() -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn resolve_repo_path(raw: &str) -> PathBuf {
  let path = PathBuf::from(raw);
  if path.is_absolute() {
    path
  } else {
    repo_root().join(path)
  }
}

pub fn config_path() -> PathBuf {
  if let Some(raw) = env_default("BRACKET_CONFIG_PATH") {
    return resolve_repo_path(&raw);
  }
  repo_root().join("config.json")
}

pub fn env_default(key: &str) -> Option<String> {
  let value = env::var(key).ok()?;
  let value = value.trim();
  (!value.is_empty()).then(|| value.to_string())
}

/// Unset or blank keeps `default`.
pub fn env_flag(key: &str, default: bool) -> bool {
  env_default(key)
    .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
    .unwrap_or(default)
}

pub fn apply_env_defaults(mut config: AppConfig) -> AppConfig {
  if config.entrants_path.trim().is_empty() {
    if let Some(value) = env_default("BRACKET_ENTRANTS_PATH") {
      config.entrants_path = value;
    }
  }
  if config.listen_addr.trim().is_empty() {
    config.listen_addr = env_default("BRACKET_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
  }
  if config.ui_dir.trim().is_empty() {
    config.ui_dir = env_default("BRACKET_UI_DIR").unwrap_or_else(|| DEFAULT_UI_DIR.to_string());
  }
  if config.image_api_url.trim().is_empty() {
    config.image_api_url = env_default("IMAGE_API_URL").unwrap_or_else(|| DEFAULT_IMAGE_API_URL.to_string());
  }
  config.image_lookup = env_flag("IMAGE_LOOKUP", config.image_lookup);
  if config.ranking_limit == 0 {
    config.ranking_limit = RANKING_LIMIT;
  }
  config
}

pub fn load_app_config() -> Result<AppConfig, String> {
  let path = config_path();
  let config = match fs::read_to_string(&path) {
    Ok(data) => serde_json::from_str::<AppConfig>(&data)
      .map_err(|e| format!("parse config {}: {e}", path.display()))?,
    Err(e) if e.kind() == io::ErrorKind::NotFound => AppConfig::default(),
    Err(e) => return Err(format!("read config {}: {e}", path.display())),
  };
  Ok(apply_env_defaults(config))
}

/// Export `.env` entries beside `Cargo.toml` that the environment does not already set.
pub fn load_env_file() {
  let Ok(contents) = fs::read_to_string(repo_root().join(".env")) else {
    return;
  };
  for (key, value) in contents.lines().filter_map(parse_env_line) {
    if env::var_os(&key).is_none() {
      env::set_var(key, value);
    }
  }
}

/// `KEY=value`, with `#` comment lines skipped and one pair of double quotes stripped.
pub fn parse_env_line(line: &str) -> Option<(String, String)> {
  let line = line.trim();
  if line.starts_with('#') {
    return None;
  }
  let (key, value) = line.split_once('=')?;
  let key = key.trim();
  if key.is_empty() {
    return None;
  }
  let value = value.trim();
  let value = value
    .strip_prefix('"')
    .and_then(|inner| inner.strip_suffix('"'))
    .unwrap_or(value);
  Some((key.to_string(), value.to_string()))
}

pub fn now_ms() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_millis() as u64
}

pub fn logs_dir() -> PathBuf {
  repo_root().join("logs")
}

pub fn image_lookup_log_path() -> PathBuf {
  logs_dir().join("image_lookup.log")
}

pub fn append_image_lookup_log(label: &str, payload: &str) {
  let dir = logs_dir();
  if fs::create_dir_all(&dir).is_err() {
    return;
  }
  let path = image_lookup_log_path();
  let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
  let entry = format!("[{timestamp}] {label}\n{payload}\n\n");
  if let Ok(mut file) = fs::OpenOptions::new().create(true).append(true).open(&path) {
    let _ = file.write_all(entry.as_bytes());
  }
}

pub fn log_env_warnings(config: &AppConfig) {
  let mut warnings = Vec::new();

  if !config.entrants_path.trim().is_empty() && !resolve_repo_path(&config.entrants_path).is_file() {
    warnings.push(format!("Entrant file {} not found; startup will fail", config.entrants_path));
  }
  if !resolve_repo_path(&config.ui_dir).is_dir() {
    warnings.push(format!("UI directory {} not found; only the JSON API will be served", config.ui_dir));
  }
  if config.image_lookup && !config.image_api_url.starts_with("http") {
    warnings.push(format!("Image API URL {:?} does not look like an HTTP URL; image lookups will fail", config.image_api_url));
  }

  for msg in warnings {
    tracing::warn!("{}", msg);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_env_line_variants() {
    assert_eq!(parse_env_line("# comment"), None);
    assert_eq!(parse_env_line("   "), None);
    assert_eq!(parse_env_line("=value"), None);
    assert_eq!(parse_env_line("NO_EQUALS"), None);
    assert_eq!(
      parse_env_line(" BRACKET_LISTEN_ADDR = 0.0.0.0:9000 "),
      Some(("BRACKET_LISTEN_ADDR".to_string(), "0.0.0.0:9000".to_string()))
    );
    assert_eq!(
      parse_env_line("IMAGE_API_URL=\"http://localhost:8080\""),
      Some(("IMAGE_API_URL".to_string(), "http://localhost:8080".to_string()))
    );
    assert_eq!(
      parse_env_line("BRACKET_ENTRANTS_PATH=lists/a=b.txt"),
      Some(("BRACKET_ENTRANTS_PATH".to_string(), "lists/a=b.txt".to_string()))
    );
  }

  #[test]
  fn test_env_flag_falls_back_when_unset() {
    assert!(env_flag("ANIME_BRACKET_TEST_FLAG_NEVER_SET", true));
    assert!(!env_flag("ANIME_BRACKET_TEST_FLAG_NEVER_SET", false));
  }

  #[test]
  fn test_config_fields_default_when_missing() {
    let config: AppConfig = serde_json::from_str(r#"{ "listenAddr": "127.0.0.1:1" }"#).unwrap();
    assert_eq!(config.listen_addr, "127.0.0.1:1");
    assert!(config.image_lookup);
    assert_eq!(config.ranking_limit, RANKING_LIMIT);
    assert!(config.entrants_path.is_empty());
  }

  #[test]
  fn test_apply_env_defaults_keeps_explicit_values() {
    let config = apply_env_defaults(AppConfig {
      listen_addr: "127.0.0.1:2".to_string(),
      ui_dir: "public".to_string(),
      image_api_url: "http://images.local".to_string(),
      ranking_limit: 0,
      ..AppConfig::default()
    });
    assert_eq!(config.listen_addr, "127.0.0.1:2");
    assert_eq!(config.ui_dir, "public");
    assert_eq!(config.image_api_url, "http://images.local");
    assert_eq!(config.ranking_limit, RANKING_LIMIT);
  }

  #[test]
  fn test_resolve_repo_path() {
    assert_eq!(resolve_repo_path("ui"), repo_root().join("ui"));
    let absolute = std::env::temp_dir();
    assert_eq!(resolve_repo_path(&absolute.to_string_lossy()), absolute);
  }
}
