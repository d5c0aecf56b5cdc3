//! 消息源 - 按 code 和 locale 解析消息
//!
//! 解析分两条路径：
//!
//! - 内部路径 `get_message_internal`：本地查找，未命中时沿父级的**内部路径**继续查找，
//!   从不回退到 code；
//! - 公共路径 `get_message`：先走内部路径，未命中时使用调用方给的默认消息，
//!   最后才根据 `use_code_as_default_message` 回退到 code。
//!
//! 父级委托始终走内部路径，因此中间层的 code 回退不会遮蔽更上层父级中的真实消息，
//! code 回退只在最外层调用处生效。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ContainerError, ContainerResult};

/// 默认 locale
pub const DEFAULT_LOCALE: &str = "default";

/// 可解析的消息描述：候选 code 列表 + 参数 + 默认消息
#[derive(Debug, Clone, Default)]
pub struct MessageSourceResolvable {
    pub codes: Vec<String>,
    pub args: Vec<String>,
    pub default_message: Option<String>,
}

impl MessageSourceResolvable {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            codes: vec![code.into()],
            ..Default::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.codes.push(code.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_default_message(mut self, message: impl Into<String>) -> Self {
        self.default_message = Some(message.into());
        self
    }
}

/// 用位置参数替换 `{0}`、`{1}` ...
///
/// 不存在的参数位置保持原样
pub fn format_message(template: &str, args: &[String]) -> String {
    if args.is_empty() {
        return template.to_string();
    }
    let mut result = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        result.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let index = &after[..end];
                match index.parse::<usize>().ok().and_then(|i| args.get(i)) {
                    Some(arg) => result.push_str(arg),
                    None => {
                        result.push('{');
                        result.push_str(index);
                        result.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    result.push_str(rest);
    result
}

/// 消息源
pub trait MessageSource: Send + Sync {
    /// 内部解析路径：本地 + 父级内部路径，不应用任何默认消息
    fn get_message_internal(&self, code: &str, args: &[String], locale: &str) -> Option<String>;

    /// 未命中时是否以 code 作为消息
    fn use_code_as_default_message(&self) -> bool {
        false
    }

    /// 公共解析路径
    ///
    /// 顺序：内部路径 → `default_message` → code（若开启 `use_code_as_default_message`）
    fn get_message(
        &self,
        code: &str,
        args: &[String],
        default_message: Option<&str>,
        locale: &str,
    ) -> Option<String> {
        self.get_message_internal(code, args, locale)
            .or_else(|| default_message.map(|m| format_message(m, args)))
            .or_else(|| self.use_code_as_default_message().then(|| code.to_string()))
    }

    /// 必须解析出消息，否则返回 `NoSuchMessage`（开启 code 回退时返回 code）
    fn get_message_or_code(&self, code: &str, args: &[String], locale: &str) -> ContainerResult<String> {
        self.get_message(code, args, None, locale)
            .ok_or_else(|| ContainerError::NoSuchMessage {
                code: code.to_string(),
                locale: locale.to_string(),
            })
    }

    /// 按候选 code 依次解析
    fn resolve(&self, resolvable: &MessageSourceResolvable, locale: &str) -> ContainerResult<String> {
        for code in &resolvable.codes {
            if let Some(message) = self.get_message_internal(code, &resolvable.args, locale) {
                return Ok(message);
            }
        }
        if let Some(default) = &resolvable.default_message {
            return Ok(format_message(default, &resolvable.args));
        }
        if self.use_code_as_default_message() {
            if let Some(code) = resolvable.codes.first() {
                return Ok(code.clone());
            }
        }
        Err(ContainerError::NoSuchMessage {
            code: resolvable.codes.first().cloned().unwrap_or_default(),
            locale: locale.to_string(),
        })
    }
}

/// 可设置父级的消息源
pub trait HierarchicalMessageSource: MessageSource {
    fn set_parent_message_source(&self, parent: Option<Arc<dyn MessageSource>>);

    fn parent_message_source(&self) -> Option<Arc<dyn MessageSource>>;
}

/// 空消息源，把所有请求委托给父级
///
/// 上下文中没有名为 `messageSource` 的 Bean 时使用
#[derive(Default)]
pub struct DelegatingMessageSource {
    parent: RwLock<Option<Arc<dyn MessageSource>>>,
}

impl DelegatingMessageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: Option<Arc<dyn MessageSource>>) -> Self {
        Self {
            parent: RwLock::new(parent),
        }
    }
}

impl MessageSource for DelegatingMessageSource {
    fn get_message_internal(&self, code: &str, args: &[String], locale: &str) -> Option<String> {
        let parent = self.parent.read().clone();
        parent.and_then(|p| p.get_message_internal(code, args, locale))
    }

    /// 有父级时完整委托给父级的公共路径，否则只使用默认消息
    fn get_message(
        &self,
        code: &str,
        args: &[String],
        default_message: Option<&str>,
        locale: &str,
    ) -> Option<String> {
        let parent = self.parent.read().clone();
        match parent {
            Some(parent) => parent.get_message(code, args, default_message, locale),
            None => default_message.map(|m| format_message(m, args)),
        }
    }

    fn resolve(&self, resolvable: &MessageSourceResolvable, locale: &str) -> ContainerResult<String> {
        let parent = self.parent.read().clone();
        match parent {
            Some(parent) => parent.resolve(resolvable, locale),
            None => match &resolvable.default_message {
                Some(default) => Ok(format_message(default, &resolvable.args)),
                None => Err(ContainerError::NoSuchMessage {
                    code: resolvable.codes.first().cloned().unwrap_or_default(),
                    locale: locale.to_string(),
                }),
            },
        }
    }
}

impl HierarchicalMessageSource for DelegatingMessageSource {
    fn set_parent_message_source(&self, parent: Option<Arc<dyn MessageSource>>) {
        *self.parent.write() = parent;
    }

    fn parent_message_source(&self) -> Option<Arc<dyn MessageSource>> {
        self.parent.read().clone()
    }
}

/// 内存消息表
///
/// 查找顺序：精确 locale → 语言部分（`zh_CN` → `zh`）→ `default`
#[derive(Default)]
pub struct StaticMessageSource {
    messages: RwLock<HashMap<(String, String), String>>,
    parent: RwLock<Option<Arc<dyn MessageSource>>>,
    use_code_as_default_message: bool,
}

impl StaticMessageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_use_code_as_default_message(mut self, enabled: bool) -> Self {
        self.use_code_as_default_message = enabled;
        self
    }

    pub fn add_message(&self, code: impl Into<String>, locale: impl Into<String>, message: impl Into<String>) {
        self.messages
            .write()
            .insert((code.into(), locale.into()), message.into());
    }

    pub fn add_messages<I, C, M>(&self, locale: &str, messages: I)
    where
        I: IntoIterator<Item = (C, M)>,
        C: Into<String>,
        M: Into<String>,
    {
        let mut table = self.messages.write();
        for (code, message) in messages {
            table.insert((code.into(), locale.to_string()), message.into());
        }
    }

    fn lookup(&self, code: &str, locale: &str) -> Option<String> {
        let table = self.messages.read();
        let language = locale.split(['_', '-']).next().unwrap_or(locale);
        [locale, language, DEFAULT_LOCALE]
            .iter()
            .find_map(|candidate| table.get(&(code.to_string(), candidate.to_string())).cloned())
    }
}

impl MessageSource for StaticMessageSource {
    fn get_message_internal(&self, code: &str, args: &[String], locale: &str) -> Option<String> {
        if let Some(template) = self.lookup(code, locale) {
            return Some(format_message(&template, args));
        }
        let parent = self.parent.read().clone();
        parent.and_then(|p| p.get_message_internal(code, args, locale))
    }

    fn use_code_as_default_message(&self) -> bool {
        self.use_code_as_default_message
    }
}

impl HierarchicalMessageSource for StaticMessageSource {
    fn set_parent_message_source(&self, parent: Option<Arc<dyn MessageSource>>) {
        *self.parent.write() = parent;
    }

    fn parent_message_source(&self) -> Option<Arc<dyn MessageSource>> {
        self.parent.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_format_message() {
        assert_eq!(format_message("Hello {0}, {1}!", &args(&["a", "b"])), "Hello a, b!");
        assert_eq!(format_message("{2} stays", &args(&["a"])), "{2} stays");
        assert_eq!(format_message("open { brace", &args(&["a"])), "open { brace");
    }

    #[test]
    fn test_locale_fallback_chain() {
        let source = StaticMessageSource::new();
        source.add_message("greeting", "zh", "你好 {0}");
        source.add_message("farewell", DEFAULT_LOCALE, "bye");

        assert_eq!(
            source.get_message("greeting", &args(&["x"]), None, "zh_CN").as_deref(),
            Some("你好 x")
        );
        assert_eq!(source.get_message("farewell", &[], None, "fr").as_deref(), Some("bye"));
        assert!(matches!(
            source.get_message_or_code("missing", &[], "fr"),
            Err(ContainerError::NoSuchMessage { .. })
        ));
    }

    #[test]
    fn test_default_message_precedes_code_fallback() {
        let source = StaticMessageSource::new().with_use_code_as_default_message(true);
        assert_eq!(
            source.get_message("missing", &[], Some("dflt"), "en").as_deref(),
            Some("dflt")
        );
        assert_eq!(source.get_message_or_code("missing", &[], "en").unwrap(), "missing");
    }

    #[test]
    fn test_intermediate_code_fallback_does_not_mask_grandparent() {
        let grandparent = Arc::new(StaticMessageSource::new());
        grandparent.add_message("title", "en", "Grand Title");

        let parent = Arc::new(StaticMessageSource::new().with_use_code_as_default_message(true));
        parent.set_parent_message_source(Some(grandparent.clone()));

        let child = StaticMessageSource::new();
        child.set_parent_message_source(Some(parent.clone()));

        assert_eq!(child.get_message_or_code("title", &[], "en").unwrap(), "Grand Title");

        // 父级的 code 回退只在父级作为最外层调用时生效
        assert!(child.get_message_or_code("unknown", &[], "en").is_err());
        assert_eq!(parent.get_message_or_code("unknown", &[], "en").unwrap(), "unknown");
    }

    #[test]
    fn test_delegating_source() {
        let empty = DelegatingMessageSource::new();
        assert!(empty.get_message("x", &[], None, "en").is_none());
        assert_eq!(
            empty.get_message("x", &args(&["1"]), Some("d {0}"), "en").as_deref(),
            Some("d 1")
        );

        let parent = Arc::new(StaticMessageSource::new().with_use_code_as_default_message(true));
        parent.add_message("x", "en", "from parent");
        let delegating = DelegatingMessageSource::with_parent(Some(parent));
        assert_eq!(delegating.get_message_or_code("x", &[], "en").unwrap(), "from parent");
        // 公共路径完整委托给父级，包括父级的 code 回退
        assert_eq!(delegating.get_message_or_code("y", &[], "en").unwrap(), "y");
        assert!(delegating.get_message_internal("y", &[], "en").is_none());
    }

    #[test]
    fn test_resolvable_tries_codes_in_order() {
        let source = StaticMessageSource::new();
        source.add_message("second", "en", "found {0}");
        let resolvable = MessageSourceResolvable::new("first")
            .with_code("second")
            .with_args(["it"]);
        assert_eq!(source.resolve(&resolvable, "en").unwrap(), "found it");

        let missing = MessageSourceResolvable::new("nope").with_default_message("fallback");
        assert_eq!(source.resolve(&missing, "en").unwrap(), "fallback");
    }
}
