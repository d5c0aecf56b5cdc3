//! 配置环境
//!
//! `Environment` 聚合多个按优先级排序的 `PropertySource`，提供：
//!
//! - 类型化的配置读取
//! - 占位符解析 `${key:default}`，支持嵌套
//! - 必需属性校验（上下文刷新时执行）
//! - 与父上下文环境合并

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ContainerError, ContainerResult};

const PLACEHOLDER_PREFIX: &str = "${";
const PLACEHOLDER_SUFFIX: char = '}';
const VALUE_SEPARATOR: char = ':';

/// 配置值类型
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<ConfigValue>),
    Object(HashMap<String, ConfigValue>),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            ConfigValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Int(i) => Some(*i as f64),
            ConfigValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

/// 标量渲染为字符串，数组以逗号连接
impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::String(s) => f.write_str(s),
            ConfigValue::Int(i) => write!(f, "{}", i),
            ConfigValue::Float(v) => write!(f, "{}", v),
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::Array(values) => {
                let rendered: Vec<String> = values.iter().map(ToString::to_string).collect();
                f.write_str(&rendered.join(","))
            }
            ConfigValue::Object(_) => f.write_str("[object]"),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

/// 配置源
pub trait PropertySource: Send + Sync {
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Option<ConfigValue>;

    fn keys(&self) -> Vec<String>;

    /// 数字越大优先级越高
    fn priority(&self) -> i32 {
        0
    }
}

/// 配置环境
///
/// 上下文持有一个共享的 `Arc<Environment>`；子上下文在设置父上下文时
/// 合并父环境的配置源与 profile
pub struct Environment {
    sources: RwLock<Vec<Arc<dyn PropertySource>>>,
    active_profiles: RwLock<Vec<String>>,
    required_properties: RwLock<Vec<String>>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources: Vec<String> = self.sources.read().iter().map(|s| s.name().to_string()).collect();
        f.debug_struct("Environment")
            .field("sources", &sources)
            .field("active_profiles", &*self.active_profiles.read())
            .finish()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(Vec::new()),
            active_profiles: RwLock::new(Vec::new()),
            required_properties: RwLock::new(Vec::new()),
        }
    }

    /// 添加配置源，按优先级降序保持有序；同优先级保持添加顺序
    pub fn add_property_source(&self, source: Arc<dyn PropertySource>) {
        let mut sources = self.sources.write();
        sources.push(source);
        sources.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    pub fn property_source_names(&self) -> Vec<String> {
        self.sources.read().iter().map(|s| s.name().to_string()).collect()
    }

    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        let sources = self.sources.read().clone();
        for source in sources.iter() {
            if let Some(value) = source.get(key) {
                tracing::trace!("Config '{}' found in source '{}'", key, source.name());
                return Some(value);
            }
        }
        None
    }

    pub fn contains_property(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// 以字符串形式读取任意标量配置
    pub fn get_property(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(String::from))
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_i64_or(&self, key: &str, default: i64) -> i64 {
        self.get_i64(key).unwrap_or(default)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    /// 字符串数组，支持 TOML 数组和逗号分隔字符串两种写法
    pub fn get_string_array(&self, key: &str) -> Option<Vec<String>> {
        match self.get(key)? {
            ConfigValue::Array(arr) => Some(arr.iter().map(ToString::to_string).collect()),
            ConfigValue::String(s) => Some(
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn set_active_profiles(&self, profiles: Vec<String>) {
        *self.active_profiles.write() = profiles;
    }

    pub fn get_active_profiles(&self) -> Vec<String> {
        self.active_profiles.read().clone()
    }

    pub fn accepts_profiles(&self, profile: &str) -> bool {
        self.active_profiles.read().iter().any(|p| p == profile)
    }

    /// 声明刷新前必须存在的属性
    pub fn set_required_properties<I, S>(&self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut required = self.required_properties.write();
        for key in keys {
            let key = key.into();
            if !required.contains(&key) {
                required.push(key);
            }
        }
    }

    /// 校验必需属性，一次性报告所有缺失项
    pub fn validate_required_properties(&self) -> ContainerResult<()> {
        let required = self.required_properties.read().clone();
        let missing: Vec<String> = required.into_iter().filter(|key| !self.contains_property(key)).collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ContainerError::MissingRequiredProperties(missing))
        }
    }

    /// 解析占位符，无法解析且没有默认值的占位符原样保留
    pub fn resolve_placeholders(&self, text: &str) -> ContainerResult<String> {
        self.parse_string_value(text, false, &mut Vec::new())
    }

    /// 解析占位符，无法解析的占位符视为错误
    pub fn resolve_required_placeholders(&self, text: &str) -> ContainerResult<String> {
        self.parse_string_value(text, true, &mut Vec::new())
    }

    fn parse_string_value(&self, text: &str, strict: bool, visiting: &mut Vec<String>) -> ContainerResult<String> {
        let mut result = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find(PLACEHOLDER_PREFIX) {
            result.push_str(&rest[..start]);
            let after = &rest[start + PLACEHOLDER_PREFIX.len()..];
            let Some(end) = find_placeholder_end(after) else {
                result.push_str(&rest[start..]);
                return Ok(result);
            };
            let raw = &after[..end];

            // 先解析键中的嵌套占位符
            let placeholder = self.parse_string_value(raw, strict, visiting)?;
            if visiting.contains(&placeholder) {
                return Err(ContainerError::Configuration(format!(
                    "Circular placeholder reference '{}' in property definitions",
                    placeholder
                )));
            }

            let value = self.get_property(&placeholder).or_else(|| {
                placeholder
                    .split_once(VALUE_SEPARATOR)
                    .map(|(key, default)| self.get_property(key).unwrap_or_else(|| default.to_string()))
            });

            match value {
                Some(value) => {
                    visiting.push(placeholder);
                    let resolved = self.parse_string_value(&value, strict, visiting)?;
                    visiting.pop();
                    result.push_str(&resolved);
                }
                None if strict => {
                    return Err(ContainerError::Configuration(format!(
                        "Could not resolve placeholder '{}' in value \"{}\"",
                        placeholder, text
                    )));
                }
                None => {
                    result.push_str(PLACEHOLDER_PREFIX);
                    result.push_str(raw);
                    result.push(PLACEHOLDER_SUFFIX);
                }
            }

            rest = &after[end + 1..];
        }

        result.push_str(rest);
        Ok(result)
    }

    /// 进程级属性快照，注册为 `systemProperties` 单例
    pub fn system_properties(&self) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        props.insert("os.name".to_string(), std::env::consts::OS.to_string());
        props.insert("os.arch".to_string(), std::env::consts::ARCH.to_string());
        props.insert("os.family".to_string(), std::env::consts::FAMILY.to_string());
        props.insert("process.id".to_string(), std::process::id().to_string());
        if let Ok(dir) = std::env::current_dir() {
            props.insert("user.dir".to_string(), dir.to_string_lossy().into_owned());
        }
        props
    }

    /// 环境变量快照，注册为 `systemEnvironment` 单例
    pub fn system_environment(&self) -> BTreeMap<String, String> {
        std::env::vars().collect()
    }

    /// 合并父环境：追加本环境没有的配置源（按名称判断），合并 profile
    pub fn merge(&self, parent: &Environment) {
        if std::ptr::eq(self, parent) {
            return;
        }
        let parent_sources = parent.sources.read().clone();
        {
            let mut sources = self.sources.write();
            for source in parent_sources {
                if !sources.iter().any(|s| s.name() == source.name()) {
                    sources.push(source);
                }
            }
            sources.sort_by(|a, b| b.priority().cmp(&a.priority()));
        }

        let parent_profiles = parent.get_active_profiles();
        let mut profiles = self.active_profiles.write();
        for profile in parent_profiles {
            if !profiles.contains(&profile) {
                profiles.push(profile);
            }
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

fn find_placeholder_end(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i..].starts_with(PLACEHOLDER_PREFIX.as_bytes()) {
            depth += 1;
            i += PLACEHOLDER_PREFIX.len();
            continue;
        }
        if bytes[i] == PLACEHOLDER_SUFFIX as u8 {
            if depth == 0 {
                return Some(i);
            }
            depth -= 1;
        }
        i += 1;
    }
    None
}

// ========== Property Sources ==========

/// 环境变量配置源
///
/// `APP_DATABASE_URL` 对应配置键 `database.url`
pub struct EnvironmentPropertySource {
    prefix: String,
    priority: i32,
}

impl EnvironmentPropertySource {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            priority: 100,
        }
    }

    fn env_to_key(&self, env_key: &str) -> String {
        env_key
            .strip_prefix(&self.prefix)
            .unwrap_or(env_key)
            .to_lowercase()
            .replace('_', ".")
    }

    fn key_to_env(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.replace(['.', '-'], "_").to_uppercase())
    }
}

impl PropertySource for EnvironmentPropertySource {
    fn name(&self) -> &str {
        "systemEnvironment"
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        std::env::var(self.key_to_env(key)).ok().map(ConfigValue::String)
    }

    fn keys(&self) -> Vec<String> {
        std::env::vars()
            .filter(|(k, _)| k.starts_with(&self.prefix))
            .map(|(k, _)| self.env_to_key(&k))
            .collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// TOML 配置源，嵌套表展平为点分键
pub struct TomlPropertySource {
    name: String,
    properties: HashMap<String, ConfigValue>,
    priority: i32,
}

impl TomlPropertySource {
    pub fn from_file(path: impl AsRef<Path>) -> ContainerResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ContainerError::Configuration(format!("Failed to read config file {:?}: {}", path, e)))?;
        Self::parse(&content, path.to_string_lossy().into_owned())
    }

    pub fn parse(content: &str, name: impl Into<String>) -> ContainerResult<Self> {
        let value: toml::Value = toml::from_str(content)
            .map_err(|e| ContainerError::Configuration(format!("Failed to parse TOML: {}", e)))?;

        let mut properties = HashMap::new();
        flatten_toml(&value, String::new(), &mut properties);

        Ok(Self {
            name: name.into(),
            properties,
            priority: 0,
        })
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

fn flatten_toml(value: &toml::Value, prefix: String, result: &mut HashMap<String, ConfigValue>) {
    match value {
        toml::Value::Table(table) => {
            for (key, val) in table {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_toml(val, key, result);
            }
        }
        other => {
            result.insert(prefix, toml_to_config(other));
        }
    }
}

fn toml_to_config(value: &toml::Value) -> ConfigValue {
    match value {
        toml::Value::String(s) => ConfigValue::String(s.clone()),
        toml::Value::Integer(i) => ConfigValue::Int(*i),
        toml::Value::Float(f) => ConfigValue::Float(*f),
        toml::Value::Boolean(b) => ConfigValue::Bool(*b),
        toml::Value::Datetime(dt) => ConfigValue::String(dt.to_string()),
        toml::Value::Array(arr) => ConfigValue::Array(arr.iter().map(toml_to_config).collect()),
        toml::Value::Table(table) => ConfigValue::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_config(v)))
                .collect(),
        ),
    }
}

impl PropertySource for TomlPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// 内存配置源
pub struct MapPropertySource {
    name: String,
    properties: HashMap<String, ConfigValue>,
    priority: i32,
}

impl MapPropertySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
            priority: 50,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl PropertySource for MapPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with(pairs: &[(&str, &str)]) -> Environment {
        let env = Environment::new();
        let mut source = MapPropertySource::new("test");
        for (k, v) in pairs {
            source = source.with_property(*k, *v);
        }
        env.add_property_source(Arc::new(source));
        env
    }

    #[test]
    fn test_higher_priority_source_wins() {
        let env = Environment::new();
        env.add_property_source(Arc::new(MapPropertySource::new("low").with_property("port", 8080i64).with_priority(1)));
        env.add_property_source(Arc::new(MapPropertySource::new("high").with_property("port", 9090i64).with_priority(10)));

        assert_eq!(env.get_i64("port"), Some(9090));
        assert_eq!(env.property_source_names(), vec!["high", "low"]);
    }

    #[test]
    fn test_placeholder_with_default_and_nesting() {
        let env = env_with(&[("host", "localhost"), ("port", "8080"), ("which", "host")]);

        assert_eq!(env.resolve_placeholders("http://${host}:${port}").unwrap(), "http://localhost:8080");
        assert_eq!(env.resolve_placeholders("${missing:fallback}").unwrap(), "fallback");
        assert_eq!(env.resolve_placeholders("${${which}}").unwrap(), "localhost");
        assert_eq!(env.resolve_placeholders("${missing:${host}}").unwrap(), "localhost");
    }

    #[test]
    fn test_unresolvable_placeholder_lenient_and_strict() {
        let env = env_with(&[]);
        assert_eq!(env.resolve_placeholders("a ${nope} b").unwrap(), "a ${nope} b");
        assert!(matches!(
            env.resolve_required_placeholders("${nope}"),
            Err(ContainerError::Configuration(_))
        ));
    }

    #[test]
    fn test_circular_placeholder_rejected() {
        let env = env_with(&[("a", "${b}"), ("b", "${a}")]);
        assert!(matches!(env.resolve_placeholders("${a}"), Err(ContainerError::Configuration(_))));
    }

    #[test]
    fn test_required_properties_reports_all_missing() {
        let env = env_with(&[("present", "1")]);
        env.set_required_properties(["present", "db.url", "db.user"]);

        match env.validate_required_properties() {
            Err(ContainerError::MissingRequiredProperties(missing)) => {
                assert_eq!(missing, vec!["db.url", "db.user"]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_toml_source_flattens_tables() {
        let source = TomlPropertySource::parse(
            r#"
            name = "demo"
            [server]
            port = 8080
            tags = ["a", "b"]
            "#,
            "application.toml",
        )
        .unwrap();
        let env = Environment::new();
        env.add_property_source(Arc::new(source));

        assert_eq!(env.get_string("name").as_deref(), Some("demo"));
        assert_eq!(env.get_i64("server.port"), Some(8080));
        assert_eq!(env.get_property("server.port").as_deref(), Some("8080"));
        assert_eq!(env.get_string_array("server.tags"), Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_merge_parent_sources_and_profiles() {
        let parent = env_with(&[("shared", "parent")]);
        parent.set_active_profiles(vec!["prod".to_string()]);

        let child = Environment::new();
        child.add_property_source(Arc::new(MapPropertySource::new("child").with_property("own", "x")));
        child.merge(&parent);

        assert_eq!(child.get_string("shared").as_deref(), Some("parent"));
        assert_eq!(child.get_string("own").as_deref(), Some("x"));
        assert!(child.accepts_profiles("prod"));
    }
}
