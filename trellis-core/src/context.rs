//! 应用上下文
//!
//! `ApplicationContext` 在 `BeanFactory` 之上编排完整的刷新生命周期：
//!
//! ```text
//! prepare_refresh → obtain_fresh_bean_factory → prepare_bean_factory
//!   → ContextHooks::post_process_bean_factory
//!   → invoke_bean_factory_post_processors → register_bean_post_processors
//!   → init_message_source → init_application_event_multicaster
//!   → ContextHooks::on_refresh → register_listeners
//!   → finish_bean_factory_initialization → finish_refresh
//! ```
//!
//! 任何一步失败都会销毁已创建的单例并把上下文恢复为非活动状态，
//! 错误原样返回给调用方。`close()` 是幂等的，关闭阶段的错误只记录日志。

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Instant, SystemTime};

use parking_lot::{Mutex, ReentrantMutex, RwLock};

use crate::bean::{BeanDefinition, BeanInstance, Capability, DeclareCapabilities, SharedBean};
use crate::bean_factory::{
    BeanDefinitionRegistry, BeanFactory, BeanFactoryExt, ConfigurableBeanFactory, ConfigurableListableBeanFactory,
    DefaultListableBeanFactory, ListableBeanFactory, SingletonBeanRegistry,
};
use crate::cache::{CacheRegistry, InvalidatableCache};
use crate::config::{Environment, PropertySource};
use crate::constants::{
    APPLICATION_EVENT_MULTICASTER_BEAN_NAME, CONVERSION_SERVICE_BEAN_NAME, ENVIRONMENT_BEAN_NAME,
    LIFECYCLE_PROCESSOR_BEAN_NAME, LOAD_TIME_WEAVER_BEAN_NAME, MESSAGE_SOURCE_BEAN_NAME,
    SYSTEM_ENVIRONMENT_BEAN_NAME, SYSTEM_PROPERTIES_BEAN_NAME,
};
use crate::error::{ContainerError, ContainerResult};
use crate::event::{
    ApplicationEvent, ApplicationEventMulticaster, ApplicationEventPublisher, ApplicationListener,
    ContextClosedEvent, ContextRefreshedEvent, ContextStartedEvent, ContextStoppedEvent, PayloadApplicationEvent,
    SimpleApplicationEventMulticaster,
};
use crate::factory_holder::{BeanDefinitionLoader, BeanFactoryHolder, GenericBeanFactoryHolder, RefreshableBeanFactoryHolder};
use crate::lifecycle::{DefaultLifecycleProcessor, LifecycleProcessor};
use crate::message::{DelegatingMessageSource, MessageSource, MessageSourceResolvable};
use crate::post_processor::{BeanPostProcessor, FactoryPostProcessor, PostProcessorHandle};
use crate::post_processor_registration::{
    invoke_bean_factory_post_processors, register_bean_post_processors, ApplicationListenerDetector,
};
use crate::shutdown::ShutdownHook;

static CONTEXT_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// 上下文扩展点
///
/// 所有方法都有空的默认实现，按需覆盖
pub trait ContextHooks: Send + Sync {
    /// 在校验必需属性之前初始化配置源
    fn init_property_sources(&self, _environment: &Environment) -> ContainerResult<()> {
        Ok(())
    }

    /// 工厂准备完成、工厂后置处理器执行之前
    fn post_process_bean_factory(&self, _bean_factory: &DefaultListableBeanFactory) -> ContainerResult<()> {
        Ok(())
    }

    /// 基础设施就绪、单例实例化之前
    fn on_refresh(&self, _context: &ApplicationContext) -> ContainerResult<()> {
        Ok(())
    }

    /// 关闭时调用，不允许失败
    fn on_close(&self, _context: &ApplicationContext) {}
}

/// 不做任何扩展
pub struct NoopContextHooks;

impl ContextHooks for NoopContextHooks {}

/// 存活上下文的监控视图
#[derive(Default)]
pub struct ContextRegistry {
    contexts: RwLock<Vec<(String, Weak<ApplicationContext>)>>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, context: &Arc<ApplicationContext>) {
        let mut contexts = self.contexts.write();
        contexts.retain(|(id, weak)| id != context.id() && weak.strong_count() > 0);
        contexts.push((context.id().to_string(), Arc::downgrade(context)));
    }

    pub fn unregister(&self, id: &str) {
        self.contexts.write().retain(|(existing, _)| existing != id);
    }

    pub fn context_ids(&self) -> Vec<String> {
        self.contexts
            .read()
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn live_contexts(&self) -> Vec<Arc<ApplicationContext>> {
        self.contexts.read().iter().filter_map(|(_, weak)| weak.upgrade()).collect()
    }
}

/// 保证 weaver-aware Bean 初始化前 `loadTimeWeaver` 已经创建
struct LoadTimeWeaverAwareProcessor {
    bean_factory: Weak<DefaultListableBeanFactory>,
}

impl BeanPostProcessor for LoadTimeWeaverAwareProcessor {
    fn post_process_before_initialization(&self, bean: SharedBean, bean_name: &str) -> ContainerResult<SharedBean> {
        let Some(factory) = self.bean_factory.upgrade() else {
            return Ok(bean);
        };
        let weaver_aware = factory
            .get_bean_capabilities(bean_name)
            .is_some_and(|caps| caps.has(Capability::LoadTimeWeaverAware));
        if weaver_aware {
            factory.get_bean(LOAD_TIME_WEAVER_BEAN_NAME)?;
            tracing::debug!("Bean '{}' is weaver-aware, load-time weaver available", bean_name);
        }
        Ok(bean)
    }

    fn name(&self) -> &str {
        "LoadTimeWeaverAwareProcessor"
    }
}

/// 刷新开始前的状态，用于工厂尚未就绪时的失败恢复
struct RefreshSnapshot {
    active: bool,
    closed: bool,
    early_events_pending: bool,
}

/// 应用上下文
pub struct ApplicationContext {
    id: String,
    display_name: String,
    parent: Option<Arc<ApplicationContext>>,
    environment: Arc<Environment>,
    holder: Box<dyn BeanFactoryHolder>,
    hooks: Arc<dyn ContextHooks>,
    async_events: bool,

    /// refresh 与 close 共用的监视器
    startup_shutdown_monitor: ReentrantMutex<()>,
    startup_date: RwLock<Option<SystemTime>>,
    active: AtomicBool,
    closed: AtomicBool,

    bean_factory_post_processors: RwLock<Vec<FactoryPostProcessor>>,
    application_listeners: RwLock<Vec<Arc<dyn ApplicationListener>>>,
    /// 首次刷新前的静态监听器快照
    early_application_listeners: RwLock<Option<Vec<Arc<dyn ApplicationListener>>>>,
    early_application_events: Mutex<Option<Vec<Arc<dyn ApplicationEvent>>>>,

    message_source: RwLock<Option<Arc<dyn MessageSource>>>,
    event_multicaster: RwLock<Option<Arc<dyn ApplicationEventMulticaster>>>,
    lifecycle_processor: RwLock<Option<Arc<dyn LifecycleProcessor>>>,

    listener_detector: PostProcessorHandle,
    cache_registry: Arc<CacheRegistry>,
    factory_cache: Mutex<Option<Arc<dyn InvalidatableCache>>>,
    context_registry: Option<Arc<ContextRegistry>>,
    shutdown_hook: Mutex<Option<ShutdownHook>>,

    self_ref: Weak<ApplicationContext>,
}

impl std::fmt::Debug for ApplicationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationContext")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("active", &self.is_active())
            .field("closed", &self.is_closed())
            .field("parent", &self.parent.as_ref().map(|p| p.id()))
            .finish()
    }
}

impl ApplicationContext {
    /// 单工厂上下文
    pub fn new() -> Arc<Self> {
        Self::builder().build()
    }

    pub fn builder() -> ApplicationContextBuilder {
        ApplicationContextBuilder::new()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn parent(&self) -> Option<&Arc<ApplicationContext>> {
        self.parent.as_ref()
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.environment
    }

    /// 最近一次刷新开始的时间
    pub fn startup_date(&self) -> Option<SystemTime> {
        *self.startup_date.read()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        let processor = self.lifecycle_processor.read().clone();
        processor.is_some_and(|p| p.is_running())
    }

    pub fn cache_registry(&self) -> &Arc<CacheRegistry> {
        &self.cache_registry
    }

    // ========== 刷新前配置 ==========

    /// 显式注册的工厂后置处理器，在发现的处理器之前执行
    pub fn add_bean_factory_post_processor(&self, processor: impl Into<FactoryPostProcessor>) {
        self.bean_factory_post_processors.write().push(processor.into());
    }

    pub fn get_bean_factory_post_processors(&self) -> Vec<FactoryPostProcessor> {
        self.bean_factory_post_processors.read().clone()
    }

    /// 静态监听器；多播器已存在时同时加入多播器
    pub fn add_application_listener(&self, listener: Arc<dyn ApplicationListener>) {
        let multicaster = self.event_multicaster.read().clone();
        if let Some(multicaster) = multicaster {
            multicaster.add_application_listener(Arc::clone(&listener));
        }
        let mut listeners = self.application_listeners.write();
        let exists = listeners
            .iter()
            .any(|l| Arc::as_ptr(l) as *const () == Arc::as_ptr(&listener) as *const ());
        if !exists {
            listeners.push(listener);
        }
    }

    pub fn remove_application_listener(&self, listener: &Arc<dyn ApplicationListener>) {
        let multicaster = self.event_multicaster.read().clone();
        if let Some(multicaster) = multicaster {
            multicaster.remove_application_listener(listener);
        }
        self.application_listeners
            .write()
            .retain(|l| Arc::as_ptr(l) as *const () != Arc::as_ptr(listener) as *const ());
    }

    pub fn get_application_listeners(&self) -> Vec<Arc<dyn ApplicationListener>> {
        self.application_listeners.read().clone()
    }

    /// 注册到当前工厂；可刷新上下文在首次刷新前没有工厂，应使用 `BeanDefinitionLoader`
    pub fn register_bean_definition(&self, name: &str, definition: BeanDefinition) -> ContainerResult<()> {
        self.get_bean_factory()?.register_bean_definition(name, definition)
    }

    pub fn register_singleton(&self, name: &str, instance: BeanInstance) -> ContainerResult<()> {
        self.get_bean_factory()?.register_singleton(name, instance)
    }

    // ========== 基础设施访问 ==========

    pub fn get_bean_factory(&self) -> ContainerResult<Arc<DefaultListableBeanFactory>> {
        self.holder.bean_factory()
    }

    pub fn message_source(&self) -> ContainerResult<Arc<dyn MessageSource>> {
        self.message_source.read().clone().ok_or_else(|| {
            ContainerError::illegal_state(format!(
                "MessageSource not initialized - call 'refresh' before accessing messages via the context: {}",
                self.display_name
            ))
        })
    }

    pub fn application_event_multicaster(&self) -> ContainerResult<Arc<dyn ApplicationEventMulticaster>> {
        self.event_multicaster.read().clone().ok_or_else(|| {
            ContainerError::illegal_state(format!(
                "ApplicationEventMulticaster not initialized - call 'refresh' before multicasting events via the context: {}",
                self.display_name
            ))
        })
    }

    pub fn lifecycle_processor(&self) -> ContainerResult<Arc<dyn LifecycleProcessor>> {
        self.lifecycle_processor.read().clone().ok_or_else(|| {
            ContainerError::illegal_state(format!(
                "LifecycleProcessor not initialized - call 'refresh' before invoking lifecycle methods via the context: {}",
                self.display_name
            ))
        })
    }

    // ========== 刷新 ==========

    /// 加载或刷新配置，创建所有非延迟单例
    ///
    /// 与 `close()` 互斥；失败时上下文回到非活动状态，不留下任何单例
    pub fn refresh(&self) -> ContainerResult<()> {
        let _guard = self.startup_shutdown_monitor.lock();
        let started = Instant::now();
        tracing::info!("Refreshing {}", self.display_name);

        let snapshot = RefreshSnapshot {
            active: self.is_active(),
            closed: self.is_closed(),
            early_events_pending: self.early_application_events.lock().is_some(),
        };

        let result = match self.prepare_refresh().and_then(|()| self.obtain_fresh_bean_factory()) {
            Ok(factory) => self.initialize_bean_factory(&factory).map_err(|e| {
                tracing::warn!(
                    "Exception encountered during context initialization - cancelling refresh attempt: {}",
                    e
                );
                tracing::debug!("Destroying {} singletons created so far", factory.get_singleton_count());
                factory.destroy_singletons();
                self.cancel_refresh();
                e
            }),
            Err(e) => {
                tracing::warn!("Failed to prepare refresh of {}: {}", self.display_name, e);
                self.restore_after_failed_start(&snapshot);
                Err(e)
            }
        };

        self.reset_common_caches();

        if result.is_ok() {
            tracing::info!("Refreshed {} in {}ms", self.display_name, started.elapsed().as_millis());
        }
        result
    }

    fn prepare_refresh(&self) -> ContainerResult<()> {
        *self.startup_date.write() = Some(SystemTime::now());
        self.closed.store(false, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);

        self.hooks.init_property_sources(&self.environment)?;
        self.environment.validate_required_properties()?;

        {
            let mut early_listeners = self.early_application_listeners.write();
            match early_listeners.as_ref() {
                None => *early_listeners = Some(self.application_listeners.read().clone()),
                Some(snapshot) => *self.application_listeners.write() = snapshot.clone(),
            }
        }

        self.early_application_events.lock().get_or_insert_with(Vec::new);
        Ok(())
    }

    fn obtain_fresh_bean_factory(&self) -> ContainerResult<Arc<DefaultListableBeanFactory>> {
        self.holder.refresh_bean_factory()?;
        self.holder.bean_factory()
    }

    /// 工厂可用之前失败：有可用工厂时恢复刷新前的状态，否则标记为非活动
    fn restore_after_failed_start(&self, snapshot: &RefreshSnapshot) {
        if self.holder.has_bean_factory() {
            self.active.store(snapshot.active, Ordering::SeqCst);
            self.closed.store(snapshot.closed, Ordering::SeqCst);
        } else {
            self.cancel_refresh();
        }

        if snapshot.early_events_pending {
            return;
        }
        let pending = self.early_application_events.lock().take();
        let multicaster = self.event_multicaster.read().clone();
        if let (Some(events), Some(multicaster)) = (pending, multicaster) {
            for event in events {
                if let Err(e) = multicaster.multicast_event(event) {
                    tracing::warn!("Failed to deliver event published during failed refresh: {}", e);
                }
            }
        }
    }

    fn initialize_bean_factory(&self, factory: &Arc<DefaultListableBeanFactory>) -> ContainerResult<()> {
        self.prepare_bean_factory(factory)?;
        self.hooks.post_process_bean_factory(factory)?;

        tracing::debug!("Invoking bean factory post processors");
        invoke_bean_factory_post_processors(factory, &self.get_bean_factory_post_processors())?;
        register_bean_post_processors(factory, &self.listener_detector)?;

        self.init_message_source(factory)?;
        self.init_application_event_multicaster(factory)?;
        self.hooks.on_refresh(self)?;
        self.register_listeners(factory)?;
        self.finish_bean_factory_initialization(factory)?;
        self.finish_refresh(factory)
    }

    fn prepare_bean_factory(&self, factory: &Arc<DefaultListableBeanFactory>) -> ContainerResult<()> {
        factory.set_application_context(self.self_ref.clone());
        factory.add_bean_post_processor(self.listener_detector.clone());

        let cache = factory.metadata_cache();
        let previous = self.factory_cache.lock().replace(Arc::clone(&cache));
        if let Some(previous) = previous {
            self.cache_registry.unregister(&previous);
        }
        self.cache_registry.register(cache);

        if factory.contains_bean(LOAD_TIME_WEAVER_BEAN_NAME) {
            factory.add_bean_post_processor(PostProcessorHandle::Plain(Arc::new(LoadTimeWeaverAwareProcessor {
                bean_factory: Arc::downgrade(factory),
            })));
            factory.set_temp_class_loader(true);
        }

        if !factory.contains_bean(ENVIRONMENT_BEAN_NAME) {
            factory.register_singleton(ENVIRONMENT_BEAN_NAME, BeanInstance::of(Arc::clone(&self.environment)))?;
        }
        if !factory.contains_bean(SYSTEM_PROPERTIES_BEAN_NAME) {
            let properties = Arc::new(self.environment.system_properties());
            factory.register_singleton(SYSTEM_PROPERTIES_BEAN_NAME, BeanInstance::of(properties))?;
        }
        if !factory.contains_bean(SYSTEM_ENVIRONMENT_BEAN_NAME) {
            let variables = Arc::new(self.environment.system_environment());
            factory.register_singleton(SYSTEM_ENVIRONMENT_BEAN_NAME, BeanInstance::of(variables))?;
        }
        Ok(())
    }

    /// 父上下文的消息源；父上下文尚未刷新时为 None
    fn internal_parent_message_source(&self) -> Option<Arc<dyn MessageSource>> {
        self.parent.as_ref().and_then(|parent| parent.message_source().ok())
    }

    fn init_message_source(&self, factory: &DefaultListableBeanFactory) -> ContainerResult<()> {
        if factory.contains_bean(MESSAGE_SOURCE_BEAN_NAME) {
            let source = factory.get_message_source(MESSAGE_SOURCE_BEAN_NAME)?;
            if self.parent.is_some() {
                if let Some(hierarchical) = factory.get_hierarchical_message_source(MESSAGE_SOURCE_BEAN_NAME)? {
                    if hierarchical.parent_message_source().is_none() {
                        hierarchical.set_parent_message_source(self.internal_parent_message_source());
                    }
                }
            }
            tracing::debug!("Using MessageSource bean '{}'", MESSAGE_SOURCE_BEAN_NAME);
            *self.message_source.write() = Some(source);
        } else {
            let delegating = Arc::new(DelegatingMessageSource::with_parent(self.internal_parent_message_source()));
            factory.register_singleton(
                MESSAGE_SOURCE_BEAN_NAME,
                BeanInstance::builder(Arc::clone(&delegating)).hierarchical_message_source().build(),
            )?;
            tracing::debug!("No '{}' bean, using DelegatingMessageSource", MESSAGE_SOURCE_BEAN_NAME);
            *self.message_source.write() = Some(delegating);
        }
        Ok(())
    }

    fn init_application_event_multicaster(&self, factory: &Arc<DefaultListableBeanFactory>) -> ContainerResult<()> {
        if factory.contains_bean(APPLICATION_EVENT_MULTICASTER_BEAN_NAME) {
            let multicaster = factory.get_event_multicaster(APPLICATION_EVENT_MULTICASTER_BEAN_NAME)?;
            tracing::debug!("Using ApplicationEventMulticaster bean '{}'", APPLICATION_EVENT_MULTICASTER_BEAN_NAME);
            *self.event_multicaster.write() = Some(multicaster);
        } else {
            let multicaster = if self.async_events {
                SimpleApplicationEventMulticaster::new_async()
            } else {
                SimpleApplicationEventMulticaster::new()
            };
            let multicaster = Arc::new(multicaster.with_bean_factory(factory));
            factory.register_singleton(
                APPLICATION_EVENT_MULTICASTER_BEAN_NAME,
                BeanInstance::builder(Arc::clone(&multicaster)).event_multicaster().build(),
            )?;
            tracing::debug!(
                "No '{}' bean, using SimpleApplicationEventMulticaster",
                APPLICATION_EVENT_MULTICASTER_BEAN_NAME
            );
            *self.event_multicaster.write() = Some(multicaster);
        }
        Ok(())
    }

    /// 静态监听器 → 监听器 Bean 名称（不实例化）→ 按发布顺序投递早期事件
    fn register_listeners(&self, factory: &DefaultListableBeanFactory) -> ContainerResult<()> {
        let multicaster = self.application_event_multicaster()?;

        for listener in self.get_application_listeners() {
            multicaster.add_application_listener(listener);
        }
        for name in factory.get_bean_names_for_capability(Capability::ApplicationListener, true) {
            multicaster.add_application_listener_bean(&name);
        }

        let early_events = self.early_application_events.lock().take();
        if let Some(events) = early_events {
            tracing::debug!("Publishing {} early application events", events.len());
            for event in events {
                multicaster.multicast_event(event)?;
            }
        }
        Ok(())
    }

    fn finish_bean_factory_initialization(&self, factory: &DefaultListableBeanFactory) -> ContainerResult<()> {
        let has_conversion_service = factory
            .get_bean_capabilities(CONVERSION_SERVICE_BEAN_NAME)
            .is_some_and(|caps| caps.has(Capability::ConversionService));
        if has_conversion_service {
            factory.set_conversion_service(factory.get_conversion_service_bean(CONVERSION_SERVICE_BEAN_NAME)?);
        }

        if !factory.has_embedded_value_resolver() {
            let environment = Arc::clone(&self.environment);
            factory.add_embedded_value_resolver(Arc::new(move |value: &str| environment.resolve_placeholders(value)));
        }

        for name in factory.get_bean_names_for_capability(Capability::LoadTimeWeaverAware, false) {
            factory.get_bean(&name)?;
        }

        factory.set_temp_class_loader(false);
        factory.freeze_configuration();
        factory.pre_instantiate_singletons()
    }

    fn finish_refresh(&self, factory: &Arc<DefaultListableBeanFactory>) -> ContainerResult<()> {
        self.cache_registry.invalidate_all();

        self.init_lifecycle_processor(factory)?;
        self.lifecycle_processor()?.on_refresh()?;

        self.publish_event(Arc::new(ContextRefreshedEvent::new(&self.id, &self.display_name)))?;

        if let (Some(registry), Some(me)) = (&self.context_registry, self.self_ref.upgrade()) {
            registry.register(&me);
        }
        Ok(())
    }

    fn init_lifecycle_processor(&self, factory: &Arc<DefaultListableBeanFactory>) -> ContainerResult<()> {
        if factory.contains_bean(LIFECYCLE_PROCESSOR_BEAN_NAME) {
            let processor = factory.get_lifecycle_processor(LIFECYCLE_PROCESSOR_BEAN_NAME)?;
            tracing::debug!("Using LifecycleProcessor bean '{}'", LIFECYCLE_PROCESSOR_BEAN_NAME);
            *self.lifecycle_processor.write() = Some(processor);
        } else {
            let processor = Arc::new(DefaultLifecycleProcessor::new(factory));
            factory.register_singleton(
                LIFECYCLE_PROCESSOR_BEAN_NAME,
                BeanInstance::builder(Arc::clone(&processor)).lifecycle_processor().build(),
            )?;
            tracing::debug!("No '{}' bean, using DefaultLifecycleProcessor", LIFECYCLE_PROCESSOR_BEAN_NAME);
            *self.lifecycle_processor.write() = Some(processor);
        }
        Ok(())
    }

    fn cancel_refresh(&self) {
        self.holder.cancel_refresh();
        self.active.store(false, Ordering::SeqCst);
    }

    fn reset_common_caches(&self) {
        self.cache_registry.invalidate_all();
    }

    // ========== 关闭 ==========

    /// 关闭上下文，重复调用没有效果
    pub fn close(&self) {
        {
            let _guard = self.startup_shutdown_monitor.lock();
            self.do_close();
        }

        let hook = self.shutdown_hook.lock().take();
        if let Some(hook) = hook {
            if !hook.cancel() {
                tracing::debug!("Shutdown hook already running, ignoring unregister request");
            }
        }
    }

    fn close_from_shutdown_hook(&self) {
        let _guard = self.startup_shutdown_monitor.lock();
        self.do_close();
    }

    fn do_close(&self) {
        if !self.is_active()
            || self
                .closed
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
        {
            return;
        }

        tracing::info!("Closing {}", self.display_name);

        if let Some(registry) = &self.context_registry {
            registry.unregister(&self.id);
        }

        if let Err(e) = self.publish_event(Arc::new(ContextClosedEvent::new(&self.id, &self.display_name))) {
            tracing::warn!("Exception thrown from ApplicationListener handling ContextClosedEvent: {}", e);
        }

        let processor = self.lifecycle_processor.read().clone();
        if let Some(processor) = processor {
            if let Err(e) = processor.on_close() {
                tracing::warn!("Exception thrown from LifecycleProcessor on context close: {}", e);
            }
        }

        match self.holder.bean_factory() {
            Ok(factory) => factory.destroy_singletons(),
            Err(e) => tracing::debug!("No bean factory to destroy: {}", e),
        }
        self.holder.close_bean_factory();
        self.hooks.on_close(self);
        self.cache_registry.invalidate_all();

        let snapshot = self.early_application_listeners.read().clone();
        if let Some(snapshot) = snapshot {
            *self.application_listeners.write() = snapshot;
        }

        self.active.store(false, Ordering::SeqCst);
        tracing::info!("Closed {}", self.display_name);
    }

    /// 注册进程关闭钩子，收到 Ctrl-C / SIGTERM 时关闭上下文
    pub fn register_shutdown_hook(&self) -> ContainerResult<()> {
        let mut slot = self.shutdown_hook.lock();
        if slot.is_some() {
            return Ok(());
        }
        let context = self.self_ref.clone();
        let hook = ShutdownHook::spawn(move || {
            if let Some(context) = context.upgrade() {
                context.close_from_shutdown_hook();
            }
        })?;
        *slot = Some(hook);
        Ok(())
    }

    // ========== Lifecycle ==========

    pub fn start(&self) -> ContainerResult<()> {
        self.lifecycle_processor()?.start()?;
        self.publish_event(Arc::new(ContextStartedEvent::new(&self.id, &self.display_name)))
    }

    pub fn stop(&self) -> ContainerResult<()> {
        self.lifecycle_processor()?.stop()?;
        self.publish_event(Arc::new(ContextStoppedEvent::new(&self.id, &self.display_name)))
    }

    // ========== 事件 ==========

    /// 发布事件
    ///
    /// 多播器就绪前事件进入早期缓冲区；随后沿父链向上传播
    pub fn publish_event(&self, event: Arc<dyn ApplicationEvent>) -> ContainerResult<()> {
        tracing::trace!("Publishing event in {}: {}", self.display_name, event.event_name());

        let buffered = {
            let mut early = self.early_application_events.lock();
            match early.as_mut() {
                Some(buffer) => {
                    buffer.push(Arc::clone(&event));
                    true
                }
                None => false,
            }
        };

        if !buffered {
            self.application_event_multicaster()?.multicast_event(Arc::clone(&event))?;
        }

        if let Some(parent) = &self.parent {
            parent.publish_event(event)?;
        }
        Ok(())
    }

    /// 把任意对象包装成 `PayloadApplicationEvent` 发布
    pub fn publish_payload<T: Any + Send + Sync>(&self, payload: T) -> ContainerResult<()> {
        self.publish_event(Arc::new(PayloadApplicationEvent::new(&self.id, payload)))
    }

    // ========== 消息 ==========

    pub fn get_message(
        &self,
        code: &str,
        args: &[String],
        default_message: Option<&str>,
        locale: &str,
    ) -> ContainerResult<Option<String>> {
        Ok(self.message_source()?.get_message(code, args, default_message, locale))
    }

    pub fn get_message_or_code(&self, code: &str, args: &[String], locale: &str) -> ContainerResult<String> {
        self.message_source()?.get_message_or_code(code, args, locale)
    }

    pub fn resolve_message(&self, resolvable: &MessageSourceResolvable, locale: &str) -> ContainerResult<String> {
        self.message_source()?.resolve(resolvable, locale)
    }

    // ========== Bean 访问 ==========

    fn assert_bean_factory_active(&self) -> ContainerResult<()> {
        if self.is_active() {
            return Ok(());
        }
        if self.is_closed() {
            Err(ContainerError::illegal_state(format!("{} has been closed already", self.display_name)))
        } else {
            Err(ContainerError::illegal_state(format!("{} has not been refreshed yet", self.display_name)))
        }
    }

    /// 本地没有时查找父上下文
    pub fn get_bean(&self, name: &str) -> ContainerResult<SharedBean> {
        self.assert_bean_factory_active()?;
        let factory = self.get_bean_factory()?;
        match &self.parent {
            Some(parent) if !factory.contains_bean(name) => parent.get_bean(name),
            _ => factory.get_bean(name),
        }
    }

    pub fn get_bean_typed<T: Any + Send + Sync>(&self, name: &str) -> ContainerResult<Arc<T>> {
        self.assert_bean_factory_active()?;
        let factory = self.get_bean_factory()?;
        match &self.parent {
            Some(parent) if !factory.contains_bean(name) => parent.get_bean_typed(name),
            _ => factory.get_bean_typed(name),
        }
    }

    pub fn get_bean_by_type<T: Any + Send + Sync>(&self) -> ContainerResult<Arc<T>> {
        self.assert_bean_factory_active()?;
        match (self.get_bean_factory()?.get_bean_by_type::<T>(), &self.parent) {
            (Err(ContainerError::BeanNotFound(_)), Some(parent)) => parent.get_bean_by_type::<T>(),
            (result, _) => result,
        }
    }

    pub fn contains_bean(&self, name: &str) -> bool {
        let local = self
            .get_bean_factory()
            .map(|factory| factory.contains_bean(name))
            .unwrap_or(false);
        local || self.parent.as_ref().is_some_and(|p| p.contains_bean(name))
    }

    pub fn get_bean_names_for_capability(&self, capability: Capability) -> ContainerResult<Vec<String>> {
        self.assert_bean_factory_active()?;
        Ok(self.get_bean_factory()?.get_bean_names_for_capability(capability, true))
    }

    pub fn get_bean_definition_names(&self) -> ContainerResult<Vec<String>> {
        Ok(self.get_bean_factory()?.get_bean_names())
    }

    pub fn get_bean_definition_count(&self) -> ContainerResult<usize> {
        Ok(self.get_bean_factory()?.get_bean_definition_count())
    }
}

impl ApplicationEventPublisher for ApplicationContext {
    fn publish_event(&self, event: Arc<dyn ApplicationEvent>) -> ContainerResult<()> {
        ApplicationContext::publish_event(self, event)
    }
}

/// 应用上下文构建器
pub struct ApplicationContextBuilder {
    id: Option<String>,
    display_name: Option<String>,
    parent: Option<Arc<ApplicationContext>>,
    environment: Option<Arc<Environment>>,
    property_sources: Vec<Arc<dyn PropertySource>>,
    active_profiles: Vec<String>,
    required_properties: Vec<String>,
    holder: Option<Box<dyn BeanFactoryHolder>>,
    hooks: Option<Arc<dyn ContextHooks>>,
    async_events: bool,
    cache_registry: Option<Arc<CacheRegistry>>,
    context_registry: Option<Arc<ContextRegistry>>,
    factory_post_processors: Vec<FactoryPostProcessor>,
    listeners: Vec<Arc<dyn ApplicationListener>>,
}

impl ApplicationContextBuilder {
    pub fn new() -> Self {
        Self {
            id: None,
            display_name: None,
            parent: None,
            environment: None,
            property_sources: Vec::new(),
            active_profiles: Vec::new(),
            required_properties: Vec::new(),
            holder: None,
            hooks: None,
            async_events: false,
            cache_registry: None,
            context_registry: None,
            factory_post_processors: Vec::new(),
            listeners: Vec::new(),
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// 父上下文；其环境会合并到本上下文的环境中
    pub fn parent(mut self, parent: Arc<ApplicationContext>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn environment(mut self, environment: Arc<Environment>) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn property_source(mut self, source: Arc<dyn PropertySource>) -> Self {
        self.property_sources.push(source);
        self
    }

    pub fn active_profiles(mut self, profiles: Vec<String>) -> Self {
        self.active_profiles = profiles;
        self
    }

    pub fn required_property(mut self, key: impl Into<String>) -> Self {
        self.required_properties.push(key.into());
        self
    }

    pub fn bean_factory_holder(mut self, holder: impl BeanFactoryHolder + 'static) -> Self {
        self.holder = Some(Box::new(holder));
        self
    }

    /// 每次刷新创建新工厂，定义由 `loaders` 装载
    pub fn refreshable(self, loaders: Vec<Arc<dyn BeanDefinitionLoader>>) -> Self {
        self.bean_factory_holder(RefreshableBeanFactoryHolder::new(loaders))
    }

    pub fn hooks(mut self, hooks: Arc<dyn ContextHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// 默认多播器是否在 tokio runtime 上异步投递事件
    pub fn async_events(mut self, async_events: bool) -> Self {
        self.async_events = async_events;
        self
    }

    pub fn cache_registry(mut self, registry: Arc<CacheRegistry>) -> Self {
        self.cache_registry = Some(registry);
        self
    }

    pub fn context_registry(mut self, registry: Arc<ContextRegistry>) -> Self {
        self.context_registry = Some(registry);
        self
    }

    pub fn bean_factory_post_processor(mut self, processor: impl Into<FactoryPostProcessor>) -> Self {
        self.factory_post_processors.push(processor.into());
        self
    }

    pub fn application_listener(mut self, listener: Arc<dyn ApplicationListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn build(self) -> Arc<ApplicationContext> {
        let sequence = CONTEXT_COUNTER.fetch_add(1, Ordering::SeqCst);
        let id = self.id.unwrap_or_else(|| format!("application-context-{}", sequence));
        let display_name = self.display_name.unwrap_or_else(|| format!("ApplicationContext[{}]", id));

        let environment = self.environment.unwrap_or_else(|| Arc::new(Environment::new()));
        for source in self.property_sources {
            environment.add_property_source(source);
        }
        if !self.active_profiles.is_empty() {
            environment.set_active_profiles(self.active_profiles);
        }
        environment.set_required_properties(self.required_properties);
        if let Some(parent) = &self.parent {
            environment.merge(parent.environment());
        }

        let holder = self
            .holder
            .unwrap_or_else(|| Box::new(GenericBeanFactoryHolder::new()));

        tracing::debug!("Created {}", display_name);

        Arc::new_cyclic(|self_ref: &Weak<ApplicationContext>| ApplicationContext {
            id,
            display_name,
            parent: self.parent,
            environment,
            holder,
            hooks: self.hooks.unwrap_or_else(|| Arc::new(NoopContextHooks)),
            async_events: self.async_events,
            startup_shutdown_monitor: ReentrantMutex::new(()),
            startup_date: RwLock::new(None),
            active: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            bean_factory_post_processors: RwLock::new(self.factory_post_processors),
            application_listeners: RwLock::new(self.listeners),
            early_application_listeners: RwLock::new(None),
            early_application_events: Mutex::new(Some(Vec::new())),
            message_source: RwLock::new(None),
            event_multicaster: RwLock::new(None),
            lifecycle_processor: RwLock::new(None),
            listener_detector: PostProcessorHandle::Merged(Arc::new(ApplicationListenerDetector::new(
                self_ref.clone(),
            ))),
            cache_registry: self.cache_registry.unwrap_or_else(|| Arc::new(CacheRegistry::new())),
            factory_cache: Mutex::new(None),
            context_registry: self.context_registry,
            shutdown_hook: Mutex::new(None),
            self_ref: self_ref.clone(),
        })
    }
}

impl Default for ApplicationContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
