//! 应用配置：从 config/default.toml、命令行指定的文件与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量覆盖（`PLEX_URL`、`TARGET_USERS` 等，无前缀）。
//! 反序列化得到宽松的 [`Settings`]，校验后转为不可变的 [`Config`]，由调用方按引用传入每次运行。

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::core::DetectorError;

/// 原始配置（所有字段可缺省，校验在 [`Settings::validate`] 中完成）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub plex_url: Option<String>,
    pub plex_token: Option<String>,
    pub tautulli_url: Option<String>,
    pub tautulli_api_key: Option<String>,
    /// 逗号分隔字符串或 TOML 数组
    #[serde(deserialize_with = "de_user_list")]
    pub target_users: Vec<String>,
    pub lookback_days: u32,
    #[serde(deserialize_with = "de_lenient_bool")]
    pub dry_run: bool,
    pub state_file: PathBuf,
    pub max_analyze: usize,
    /// 形如 6h / 30m / 1d；未设置则只运行一次
    pub run_interval: Option<String>,
    #[serde(deserialize_with = "de_lenient_bool")]
    pub skip_watched: bool,
    /// Plex / Tautulli 普通请求超时（秒）
    pub request_timeout_secs: u64,
    /// 触发分析的请求超时（秒），超时视为已发出
    pub analyze_timeout_secs: u64,
    /// 每个用户拉取的历史条数上限
    pub history_length: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            plex_url: None,
            plex_token: None,
            tautulli_url: None,
            tautulli_api_key: None,
            target_users: Vec::new(),
            lookback_days: 7,
            dry_run: false,
            state_file: PathBuf::from("/config/analyzed.json"),
            max_analyze: 20,
            run_interval: None,
            skip_watched: true,
            request_timeout_secs: 30,
            analyze_timeout_secs: 2,
            history_length: 1000,
        }
    }
}

fn de_user_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Users {
        Joined(String),
        List(Vec<String>),
    }

    let users = match Users::deserialize(deserializer)? {
        Users::Joined(s) => s.split(',').map(str::to_string).collect(),
        Users::List(list) => list,
    };
    Ok(users
        .into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect())
}

/// 布尔开关：只有（不区分大小写的）"true" 为真，空串与其它任意值都为假
fn de_lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Text(s) => s.trim().eq_ignore_ascii_case("true"),
    })
}

static INTERVAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)([smhd])$").expect("interval pattern is valid"));

/// 校验后的运行配置
#[derive(Debug, Clone)]
pub struct Config {
    pub plex_url: String,
    pub plex_token: String,
    pub tautulli_url: String,
    pub tautulli_api_key: String,
    pub target_users: Vec<String>,
    pub lookback_days: u32,
    pub dry_run: bool,
    pub state_file: PathBuf,
    pub max_analyze: usize,
    pub run_interval: Option<Duration>,
    pub skip_watched: bool,
    pub request_timeout_secs: u64,
    pub analyze_timeout_secs: u64,
    pub history_length: u32,
}

fn required(value: Option<String>, key: &str, missing: &mut Vec<String>) -> String {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => v,
        _ => {
            missing.push(key.to_string());
            String::new()
        }
    }
}

impl Settings {
    /// 检查必填项（一次性列出所有缺失的键）并解析 run_interval
    pub fn validate(self) -> Result<Config, DetectorError> {
        let mut missing = Vec::new();
        let plex_url = required(self.plex_url, "PLEX_URL", &mut missing);
        let plex_token = required(self.plex_token, "PLEX_TOKEN", &mut missing);
        let tautulli_url = required(self.tautulli_url, "TAUTULLI_URL", &mut missing);
        let tautulli_api_key = required(self.tautulli_api_key, "TAUTULLI_API_KEY", &mut missing);
        if self.target_users.is_empty() {
            missing.push("TARGET_USERS".to_string());
        }
        if !missing.is_empty() {
            return Err(DetectorError::MissingConfig(missing));
        }

        let run_interval = self.run_interval.as_deref().and_then(parse_interval);

        Ok(Config {
            plex_url,
            plex_token,
            tautulli_url,
            tautulli_api_key,
            target_users: self.target_users,
            lookback_days: self.lookback_days,
            dry_run: self.dry_run,
            state_file: self.state_file,
            max_analyze: self.max_analyze,
            run_interval,
            skip_watched: self.skip_watched,
            request_timeout_secs: self.request_timeout_secs,
            analyze_timeout_secs: self.analyze_timeout_secs,
            history_length: self.history_length,
        })
    }
}

/// 解析 `<数字><单位>`（s/m/h/d）为时长；空串、0 或格式错误返回 None（格式错误会打 warn）
pub fn parse_interval(value: &str) -> Option<Duration> {
    let value = value.trim().to_lowercase();
    if value.is_empty() {
        return None;
    }
    let Some(caps) = INTERVAL_RE.captures(&value) else {
        tracing::warn!(
            "Invalid RUN_INTERVAL format: {}. Use format like '6h', '30m', '1d'",
            value
        );
        return None;
    };
    let num: u64 = caps[1].parse().ok()?;
    let multiplier = match &caps[2] {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86400,
        _ => return None,
    };
    match num.checked_mul(multiplier) {
        Some(0) | None => None,
        Some(secs) => Some(Duration::from_secs(secs)),
    }
}

/// 读取原始配置
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量（`PLEX_URL` -> plex_url）
pub fn load_settings(config_path: Option<PathBuf>) -> Result<Settings, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!("Config file {} not found, ignoring", path.display());
        }
    }

    builder = builder.add_source(config::Environment::default());

    let c = builder.build()?;
    c.try_deserialize()
}

/// 加载并校验配置
pub fn load_config(config_path: Option<PathBuf>) -> Result<Config, DetectorError> {
    load_settings(config_path)?.validate()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_settings() -> Settings {
        Settings {
            plex_url: Some("http://plex:32400".into()),
            plex_token: Some("token".into()),
            tautulli_url: Some("http://tautulli:8181".into()),
            tautulli_api_key: Some("key".into()),
            target_users: vec!["alice".into()],
            ..Settings::default()
        }
    }

    #[test]
    fn test_parse_interval_units() {
        assert_eq!(parse_interval("45s"), Some(Duration::from_secs(45)));
        assert_eq!(parse_interval("30m"), Some(Duration::from_secs(1800)));
        assert_eq!(parse_interval("6H"), Some(Duration::from_secs(21600)));
        assert_eq!(parse_interval("1d"), Some(Duration::from_secs(86400)));
    }

    #[test]
    fn test_parse_interval_invalid() {
        assert_eq!(parse_interval(""), None);
        assert_eq!(parse_interval("6"), None);
        assert_eq!(parse_interval("h6"), None);
        assert_eq!(parse_interval("1w"), None);
        assert_eq!(parse_interval("1.5h"), None);
        assert_eq!(parse_interval("0m"), None);
    }

    #[test]
    fn test_defaults() {
        let cfg = complete_settings().validate().unwrap();
        assert_eq!(cfg.lookback_days, 7);
        assert!(!cfg.dry_run);
        assert_eq!(cfg.state_file, PathBuf::from("/config/analyzed.json"));
        assert_eq!(cfg.max_analyze, 20);
        assert!(cfg.run_interval.is_none());
        assert!(cfg.skip_watched);
        assert_eq!(cfg.analyze_timeout_secs, 2);
    }

    #[test]
    fn test_missing_required_keys_listed_together() {
        let settings = Settings {
            plex_token: Some("  ".into()),
            ..complete_settings()
        };
        let settings = Settings {
            target_users: vec![],
            tautulli_url: None,
            ..settings
        };
        match settings.validate() {
            Err(DetectorError::MissingConfig(keys)) => {
                assert_eq!(keys, vec!["PLEX_TOKEN", "TAUTULLI_URL", "TARGET_USERS"]);
            }
            other => panic!("Expected MissingConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("detector.toml");
        std::fs::write(
            &path,
            r#"
plex_url = "http://plex:32400"
plex_token = "abc"
tautulli_url = "http://tautulli:8181"
tautulli_api_key = "def"
target_users = " alice , Bob ,,"
max_analyze = 5
dry_run = "true"
run_interval = "6h"
"#,
        )
        .unwrap();

        let settings = load_settings(Some(path)).unwrap();
        assert_eq!(settings.target_users, vec!["alice", "Bob"]);
        assert_eq!(settings.max_analyze, 5);
        assert!(settings.dry_run);

        let cfg = settings.validate().unwrap();
        assert_eq!(cfg.run_interval, Some(Duration::from_secs(21600)));
    }

    #[test]
    fn test_lenient_bool_values() {
        let parse = |v: serde_json::Value| de_lenient_bool(v).unwrap();
        assert!(!parse(serde_json::json!("")));
        assert!(parse(serde_json::json!("TRUE")));
        assert!(parse(serde_json::json!(" true ")));
        assert!(!parse(serde_json::json!("maybe")));
        assert!(!parse(serde_json::json!("yes")));
        assert!(parse(serde_json::json!(true)));
        assert!(!parse(serde_json::json!(false)));
    }

    #[test]
    fn test_empty_and_unknown_flags_load_as_false() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("detector.toml");
        std::fs::write(&path, "dry_run = \"\"\nskip_watched = \"maybe\"\n").unwrap();

        let settings = load_settings(Some(path)).unwrap();
        assert!(!settings.dry_run);
        assert!(!settings.skip_watched);
    }

    #[test]
    fn test_absent_flags_keep_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("detector.toml");
        std::fs::write(&path, "max_analyze = 3\n").unwrap();

        let settings = load_settings(Some(path)).unwrap();
        assert!(!settings.dry_run);
        assert!(settings.skip_watched);
    }

    #[test]
    fn test_user_list_as_array() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("detector.toml");
        std::fs::write(&path, "target_users = [\"alice\", \" carol \"]\n").unwrap();
        let settings = load_settings(Some(path)).unwrap();
        assert_eq!(settings.target_users, vec!["alice", "carol"]);
    }
}
