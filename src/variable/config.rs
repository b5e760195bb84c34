use crate::collection::ScriptFlow;
use crate::error::{OcrunError, Result};
use crate::variable::resolver::VariableResolver;
use crate::variable::types::VarMap;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// 默认请求超时（毫秒）
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// `[runner]` 配置段
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunnerSection {
    pub timeout_ms: u64,
    pub validate_ssl: bool,
    pub script_flow: ScriptFlow,
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            validate_ssl: true,
            script_flow: ScriptFlow::Sandwich,
        }
    }
}

/// ocrun.toml 的完整内容
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunnerConfig {
    pub runner: RunnerSection,
    /// 全局环境变量，优先级最低
    pub globals: BTreeMap<String, String>,
}

impl RunnerConfig {
    /// 全局变量，`${VAR}` 已从系统环境变量中解析
    pub fn global_variables(&self) -> VarMap {
        self.globals
            .iter()
            .map(|(key, value)| {
                (
                    key.clone(),
                    Value::String(VariableResolver::resolve_env_vars(value)),
                )
            })
            .collect()
    }
}

/// 配置文件加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 配置文件名
    const CONFIG_FILE: &'static str = "ocrun.toml";

    /// 从指定路径加载配置文件
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<RunnerConfig> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            OcrunError::Config(format!(
                "failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Ok(toml::from_str(&content)?)
    }

    /// 查找并加载配置文件
    /// 查找顺序：
    /// 1. 起始目录
    /// 2. 父目录递归查找
    /// 3. 用户配置目录 ~/.config/ocrun/
    ///
    /// 找到但解析失败的文件会返回错误，而不是被跳过。
    pub fn find_and_load(start: &Path) -> Result<Option<RunnerConfig>> {
        match Self::find(start) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading runner config");
                Self::load_from_path(&path).map(Some)
            }
            None => Ok(None),
        }
    }

    /// 返回将被加载的配置文件路径
    pub fn find(start: &Path) -> Option<PathBuf> {
        Self::find_upwards(start).or_else(Self::user_config_path)
    }

    /// 从起始目录向上查找
    fn find_upwards(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            let config_path = current.join(Self::CONFIG_FILE);
            if config_path.is_file() {
                return Some(config_path);
            }

            // 尝试父目录
            if !current.pop() {
                break;
            }
        }

        None
    }

    /// 用户配置目录中的配置文件
    fn user_config_path() -> Option<PathBuf> {
        let home = dirs::home_dir()?;
        let config_path = home.join(".config").join("ocrun").join(Self::CONFIG_FILE);
        config_path.is_file().then_some(config_path)
    }

    /// 解析 CLI 变量参数 "key=value"
    pub fn parse_cli_var(s: &str) -> Option<(String, String)> {
        s.split_once('=')
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
    }
}
