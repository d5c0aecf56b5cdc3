//! 统一的错误类型
//!
//! 初始化阶段的错误一律向调用方传播（fail-fast），关闭阶段的错误只记录日志。
//! 用户回调中可以直接使用 `anyhow`，通过 `ContainerError::Other` 自动转换。

use thiserror::Error;

/// 容器错误
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("No bean named '{0}' available")]
    BeanNotFound(String),

    #[error("Bean definition '{0}' already exists and overriding is not allowed")]
    BeanAlreadyExists(String),

    #[error("Error creating bean: {0}")]
    BeanCreationFailed(String),

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("Bean type mismatch: expected '{expected}', found '{found}'")]
    TypeMismatch { expected: String, found: String },

    #[error("Bean '{bean}' does not provide capability {capability}")]
    MissingCapability { bean: String, capability: String },

    /// 前置条件不满足（例如 refresh 之前访问 multicaster）
    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Cannot {0}: bean factory configuration is frozen")]
    ConfigurationFrozen(String),

    #[error("Dependency validation failed: {0}")]
    DependencyValidationFailed(String),

    #[error("Missing required properties: {}", .0.join(", "))]
    MissingRequiredProperties(Vec<String>),

    #[error("No message found under code '{code}' for locale '{locale}'")]
    NoSuchMessage { code: String, locale: String },

    #[error("Listener '{listener}' failed on event '{event}': {message}")]
    Listener {
        listener: String,
        event: String,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to initialize logging: {0}")]
    LoggingInitFailed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ContainerError {
    /// 便捷构造：状态错误
    pub fn illegal_state(message: impl Into<String>) -> Self {
        ContainerError::IllegalState(message.into())
    }

    /// 是否为前置条件错误
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, ContainerError::IllegalState(_))
    }
}

pub type ContainerResult<T> = std::result::Result<T, ContainerError>;

/// 应用层（runner）使用的结果类型，与容器共享同一错误枚举
pub type ApplicationResult<T> = ContainerResult<T>;

/// 框架对外暴露的通用 Result，供用户代码使用 anyhow 风格的上下文
pub use anyhow::Result;
