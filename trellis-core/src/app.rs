//! 应用启动器
//!
//! `TrellisApplication` 把配置加载、日志初始化、组件扫描和上下文刷新串在一起，
//! 是大多数应用的入口。

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::component::ComponentScanLoader;
use crate::config::{Environment, EnvironmentPropertySource, TomlPropertySource};
use crate::context::{ApplicationContext, ContextHooks, ContextRegistry};
use crate::error::{ApplicationResult, ContainerError};
use crate::factory_holder::{BeanDefinitionLoader, RefreshableBeanFactoryHolder};
use crate::logging::LoggingConfig;

type Initializer = Box<dyn Fn(&Arc<ApplicationContext>) -> ApplicationResult<()> + Send + Sync>;

/// 应用启动器
pub struct TrellisApplication {
    name: String,
    config_files: Vec<String>,
    env_prefix: String,
    profiles: Vec<String>,
    show_banner: bool,
    /// 为 None 时从 `[logging]` 配置和环境变量推导
    logging_config: Option<LoggingConfig>,
    init_logging: bool,
    scan_components: bool,
    allow_bean_definition_overriding: bool,
    register_shutdown_hook: bool,
    async_events: bool,
    required_properties: Vec<String>,
    loaders: Vec<Arc<dyn BeanDefinitionLoader>>,
    hooks: Option<Arc<dyn ContextHooks>>,
    context_registry: Option<Arc<ContextRegistry>>,
    /// 在 refresh 之前执行
    initializers: Vec<Initializer>,
}

impl TrellisApplication {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config_files: vec!["application.toml".to_string()],
            env_prefix: "APP_".to_string(),
            profiles: Vec::new(),
            show_banner: true,
            logging_config: None,
            init_logging: true,
            scan_components: true,
            allow_bean_definition_overriding: false,
            register_shutdown_hook: true,
            async_events: false,
            required_properties: Vec::new(),
            loaders: Vec::new(),
            hooks: None,
            context_registry: None,
            initializers: Vec::new(),
        }
    }

    pub fn config_file(mut self, path: impl Into<String>) -> Self {
        self.config_files = vec![path.into()];
        self
    }

    pub fn config_files(mut self, paths: Vec<String>) -> Self {
        self.config_files = paths;
        self
    }

    /// 环境变量前缀，默认 `APP_`
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn profiles(mut self, profiles: Vec<String>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn banner(mut self, show: bool) -> Self {
        self.show_banner = show;
        self
    }

    pub fn logging(mut self, config: LoggingConfig) -> Self {
        self.logging_config = Some(config);
        self
    }

    /// 由调用方自行安装 subscriber 时关闭
    pub fn init_logging(mut self, enabled: bool) -> Self {
        self.init_logging = enabled;
        self
    }

    pub fn scan_components(mut self, enabled: bool) -> Self {
        self.scan_components = enabled;
        self
    }

    pub fn allow_bean_definition_overriding(mut self, allow: bool) -> Self {
        self.allow_bean_definition_overriding = allow;
        self
    }

    pub fn register_shutdown_hook(mut self, enabled: bool) -> Self {
        self.register_shutdown_hook = enabled;
        self
    }

    pub fn async_events(mut self, enabled: bool) -> Self {
        self.async_events = enabled;
        self
    }

    pub fn required_property(mut self, key: impl Into<String>) -> Self {
        self.required_properties.push(key.into());
        self
    }

    /// 在组件扫描之后执行的定义装载器
    pub fn loader(mut self, loader: impl BeanDefinitionLoader + 'static) -> Self {
        self.loaders.push(Arc::new(loader));
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn ContextHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn context_registry(mut self, registry: Arc<ContextRegistry>) -> Self {
        self.context_registry = Some(registry);
        self
    }

    /// 添加初始化器，用于注册监听器或工厂后置处理器
    ///
    /// 此时工厂尚未创建，Bean 定义应通过 `loader` 注册
    pub fn initializer<F>(mut self, f: F) -> Self
    where
        F: Fn(&Arc<ApplicationContext>) -> ApplicationResult<()> + Send + Sync + 'static,
    {
        self.initializers.push(Box::new(f));
        self
    }

    /// 构建并刷新上下文
    pub fn run(self) -> ApplicationResult<Arc<ApplicationContext>> {
        let started = Instant::now();

        let active_profiles = self.resolve_active_profiles();
        let environment = Arc::new(Environment::new());
        self.load_configurations(&environment, &active_profiles)?;
        environment.add_property_source(Arc::new(EnvironmentPropertySource::new(&self.env_prefix)));
        environment.set_active_profiles(active_profiles.clone());

        if self.init_logging {
            let logging = match &self.logging_config {
                Some(config) => config.clone(),
                None => LoggingConfig::from_environment(&environment)?.with_env_overrides(),
            };
            logging.init()?;
        }

        if self.show_banner {
            self.print_banner();
        }

        tracing::info!("Starting {} application", self.name);
        if active_profiles.is_empty() {
            tracing::info!("No active profiles set, using default configuration");
        } else {
            tracing::info!("Active profiles: {:?}", active_profiles);
        }

        let context = self.build_context(Arc::clone(&environment));
        for initializer in &self.initializers {
            initializer(&context)?;
        }

        context.refresh()?;

        if self.register_shutdown_hook {
            context.register_shutdown_hook()?;
        }

        tracing::info!("Started {} in {}ms", self.name, started.elapsed().as_millis());
        Ok(context)
    }

    /// 在阻塞线程上启动，等待 Ctrl-C 后关闭上下文
    pub async fn run_until_shutdown(self) -> ApplicationResult<()> {
        let context = tokio::task::spawn_blocking(move || self.run())
            .await
            .map_err(|e| ContainerError::illegal_state(format!("Application startup task failed: {}", e)))??;

        tokio::signal::ctrl_c()
            .await
            .map_err(|e| ContainerError::illegal_state(format!("Failed to listen for shutdown signal: {}", e)))?;

        tokio::task::spawn_blocking(move || context.close())
            .await
            .map_err(|e| ContainerError::illegal_state(format!("Application shutdown task failed: {}", e)))
    }

    /// 代码设置优先于 `{prefix}PROFILES_ACTIVE`
    fn resolve_active_profiles(&self) -> Vec<String> {
        if !self.profiles.is_empty() {
            return self.profiles.clone();
        }
        std::env::var(format!("{}PROFILES_ACTIVE", self.env_prefix))
            .map(|value| {
                value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn build_context(&self, environment: Arc<Environment>) -> Arc<ApplicationContext> {
        let mut loaders: Vec<Arc<dyn BeanDefinitionLoader>> = Vec::new();
        if self.scan_components {
            loaders.push(Arc::new(ComponentScanLoader::new().with_environment(Arc::clone(&environment))));
        }
        loaders.extend(self.loaders.iter().cloned());

        let holder = RefreshableBeanFactoryHolder::new(loaders)
            .with_bean_definition_overriding(self.allow_bean_definition_overriding);

        let mut builder = ApplicationContext::builder()
            .id(self.name.clone())
            .display_name(format!("{} application", self.name))
            .environment(environment)
            .bean_factory_holder(holder)
            .async_events(self.async_events);
        for key in &self.required_properties {
            builder = builder.required_property(key.clone());
        }
        if let Some(hooks) = &self.hooks {
            builder = builder.hooks(Arc::clone(hooks));
        }
        if let Some(registry) = &self.context_registry {
            builder = builder.context_registry(Arc::clone(registry));
        }
        builder.build()
    }

    /// 依次加载基础配置和 profile 配置，后者优先级更高
    fn load_configurations(&self, environment: &Environment, active_profiles: &[String]) -> ApplicationResult<()> {
        for base in &self.config_files {
            Self::load_config_file(environment, base, 0)?;
        }
        for (index, profile) in active_profiles.iter().enumerate() {
            for base in &self.config_files {
                Self::load_config_file(environment, &profile_config_path(base, profile), 10 + index as i32)?;
            }
        }
        Ok(())
    }

    fn load_config_file(environment: &Environment, path: &str, priority: i32) -> ApplicationResult<()> {
        if !Path::new(path).exists() {
            tracing::debug!("Configuration file not found: {}", path);
            return Ok(());
        }
        let source = TomlPropertySource::from_file(path)?.with_priority(priority);
        tracing::info!("Loaded configuration from: {} (priority: {})", path, priority);
        environment.add_property_source(Arc::new(source));
        Ok(())
    }

    fn print_banner(&self) {
        println!();
        println!(r"  _             _ _ _     ");
        println!(r" | |_ _ __ ___| | (_)___ ");
        println!(r" | __| '__/ _ \ | | / __|");
        println!(r" | |_| | |  __/ | | \__ \");
        println!(r"  \__|_|  \___|_|_|_|___/");
        println!();
        println!("  :: Trellis ::        (v{})", env!("CARGO_PKG_VERSION"));
        println!();
    }
}

impl Default for TrellisApplication {
    fn default() -> Self {
        Self::new("TrellisApplication")
    }
}

/// `application.toml` → `application-dev.toml`
fn profile_config_path(base: &str, profile: &str) -> String {
    match base.rfind('.') {
        Some(dot) => {
            let (name, ext) = base.split_at(dot);
            format!("{}-{}{}", name, profile, ext)
        }
        None => format!("{}-{}", base, profile),
    }
}
