/// 保留的 Bean 名称
///
/// 在这些名称下注册的 Bean 会覆盖容器对应的默认基础设施组件，
/// 这是定制容器行为的主要约定面。
///
/// 当添加新的基础设施组件时，只需要在这里添加相应的常量，
/// 并同步更新 `RESERVED_BEAN_NAMES`。

/// MessageSource 的 Bean 名称，未定义时使用空的 DelegatingMessageSource
pub const MESSAGE_SOURCE_BEAN_NAME: &str = "messageSource";

/// LifecycleProcessor 的 Bean 名称，未定义时使用 DefaultLifecycleProcessor
pub const LIFECYCLE_PROCESSOR_BEAN_NAME: &str = "lifecycleProcessor";

/// ApplicationEventMulticaster 的 Bean 名称，未定义时使用 SimpleApplicationEventMulticaster
pub const APPLICATION_EVENT_MULTICASTER_BEAN_NAME: &str = "applicationEventMulticaster";

/// Environment 相关常量
pub const ENVIRONMENT_BEAN_NAME: &str = "environment";
pub const SYSTEM_PROPERTIES_BEAN_NAME: &str = "systemProperties";
pub const SYSTEM_ENVIRONMENT_BEAN_NAME: &str = "systemEnvironment";

/// ConversionService 的 Bean 名称，存在时在冻结配置之前接入 BeanFactory
pub const CONVERSION_SERVICE_BEAN_NAME: &str = "conversionService";

pub const APPLICATION_STARTUP_BEAN_NAME: &str = "applicationStartup";

/// LoadTimeWeaver 的 Bean 名称，存在时会切换到临时类加载标记
pub const LOAD_TIME_WEAVER_BEAN_NAME: &str = "loadTimeWeaver";

/// 关闭钩子线程名称，便于监控工具识别
pub const SHUTDOWN_HOOK_THREAD_NAME: &str = "TrellisContextShutdownHook";

/// 所有保留名称的集合
pub const RESERVED_BEAN_NAMES: &[&str] = &[
    MESSAGE_SOURCE_BEAN_NAME,
    LIFECYCLE_PROCESSOR_BEAN_NAME,
    APPLICATION_EVENT_MULTICASTER_BEAN_NAME,
    ENVIRONMENT_BEAN_NAME,
    SYSTEM_PROPERTIES_BEAN_NAME,
    SYSTEM_ENVIRONMENT_BEAN_NAME,
    CONVERSION_SERVICE_BEAN_NAME,
    APPLICATION_STARTUP_BEAN_NAME,
    LOAD_TIME_WEAVER_BEAN_NAME,
];

/// 检查给定的名称是否为保留的基础设施 Bean 名称
///
/// # Example
/// ```
/// use trellis_core::constants::is_reserved_bean_name;
///
/// assert!(is_reserved_bean_name("messageSource"));
/// assert!(!is_reserved_bean_name("userService"));
/// ```
pub fn is_reserved_bean_name(name: &str) -> bool {
    RESERVED_BEAN_NAMES.contains(&name)
}
