use std::fs;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::GdiResult;

/// 资源管理器配置
///
/// 缺省值跟随构建类型：调试构建开启缓存校验、致命用法错误与分配跟踪，
/// 发布构建全部关闭。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// 去重命中时仍向系统查询真实状态，发现不一致则自愈
    pub verify_cache: bool,
    /// 用法错误直接 panic；关闭时记录日志并尽力继续
    pub strict_usage: bool,
    /// 记录每个原生句柄的创建位置，用于泄漏报告
    pub track_allocations: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            verify_cache: cfg!(debug_assertions),
            strict_usage: cfg!(debug_assertions),
            track_allocations: cfg!(debug_assertions),
        }
    }
}

impl ManagerConfig {
    /// 发布构建的行为：不校验、不跟踪、用法错误不致命
    pub fn release() -> Self {
        Self {
            verify_cache: false,
            strict_usage: false,
            track_allocations: false,
        }
    }

    /// 调试构建的行为
    pub fn diagnostic() -> Self {
        Self {
            verify_cache: true,
            strict_usage: true,
            track_allocations: true,
        }
    }

    /// 从 JSON 读取配置，缺失字段取缺省值
    pub fn from_json(text: &str) -> GdiResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> GdiResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 从文件加载配置
    ///
    /// 文件不存在或无法解析时回退到缺省值。
    pub fn load(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        match Self::from_json(&content) {
            Ok(config) => config,
            Err(err) => {
                warn!("ignoring {}: {err}", path.display());
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GdiError;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ManagerConfig::from_json(r#"{ "strict_usage": false }"#).unwrap();
        assert!(!config.strict_usage);
        assert_eq!(config.verify_cache, ManagerConfig::default().verify_cache);
    }

    #[test]
    fn test_json_round_trip() {
        let config = ManagerConfig::diagnostic();
        let text = config.to_json().unwrap();
        assert_eq!(ManagerConfig::from_json(&text).unwrap(), config);
    }

    #[test]
    fn test_load_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join(format!("tk_gdi_config_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let missing = dir.join("missing.json");
        assert_eq!(ManagerConfig::load(&missing), ManagerConfig::default());

        let broken = dir.join("broken.json");
        fs::write(&broken, "verify_cache = true").unwrap();
        assert_eq!(ManagerConfig::load(&broken), ManagerConfig::default());

        let valid = dir.join("valid.json");
        fs::write(&valid, ManagerConfig::release().to_json().unwrap()).unwrap();
        assert_eq!(ManagerConfig::load(&valid), ManagerConfig::release());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let err = ManagerConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, GdiError::Config(_)));
    }
}
