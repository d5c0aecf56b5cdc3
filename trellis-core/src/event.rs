//! 事件机制
//!
//! 上下文通过 `ApplicationEventMulticaster` 把事件分发给监听器。
//! 监听器可以是直接注册的实例，也可以是按名称登记的监听器 Bean，
//! 后者在分发时才从 BeanFactory 获取，登记本身不会触发实例化。

use std::any::Any;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use parking_lot::RwLock;

use crate::bean_factory::DefaultListableBeanFactory;
use crate::error::{ContainerError, ContainerResult};
use crate::ordering::LOWEST_PRECEDENCE;

/// 事件 trait - 所有事件都必须实现此 trait
pub trait ApplicationEvent: Any + Send + Sync {
    /// 获取事件名称
    fn event_name(&self) -> &str;

    /// 获取事件时间戳
    fn timestamp(&self) -> SystemTime;

    /// 转换为 Any 引用，用于类型转换
    fn as_any(&self) -> &dyn Any;
}

macro_rules! context_event {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name {
            /// 发布事件的上下文 id
            pub context_id: String,
            pub display_name: String,
            pub timestamp: SystemTime,
        }

        impl $name {
            pub fn new(context_id: impl Into<String>, display_name: impl Into<String>) -> Self {
                Self {
                    context_id: context_id.into(),
                    display_name: display_name.into(),
                    timestamp: SystemTime::now(),
                }
            }
        }

        impl ApplicationEvent for $name {
            fn event_name(&self) -> &str {
                stringify!($name)
            }

            fn timestamp(&self) -> SystemTime {
                self.timestamp
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    };
}

context_event!(
    /// 上下文刷新完成（所有非延迟单例已创建）
    ContextRefreshedEvent
);
context_event!(
    /// 上下文开始关闭
    ContextClosedEvent
);
context_event!(
    /// 显式调用 `start()` 后发布
    ContextStartedEvent
);
context_event!(
    /// 显式调用 `stop()` 后发布
    ContextStoppedEvent
);

/// 携带任意负载的事件
///
/// `publish_payload` 发布的非事件对象会被包装成此类型
#[derive(Debug)]
pub struct PayloadApplicationEvent<T> {
    payload: Arc<T>,
    source_id: String,
    timestamp: SystemTime,
}

impl<T: Any + Send + Sync> PayloadApplicationEvent<T> {
    pub fn new(source_id: impl Into<String>, payload: T) -> Self {
        Self {
            payload: Arc::new(payload),
            source_id: source_id.into(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }
}

impl<T: Any + Send + Sync> ApplicationEvent for PayloadApplicationEvent<T> {
    fn event_name(&self) -> &str {
        "PayloadApplicationEvent"
    }

    fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 事件监听器 trait
pub trait ApplicationListener: Send + Sync {
    /// 处理事件；同步模式下错误会传给发布方（除非设置了错误处理器）
    fn on_application_event(&self, event: Arc<dyn ApplicationEvent>) -> ContainerResult<()>;

    /// 获取监听器名称（用于日志）
    fn listener_name(&self) -> &str {
        "AnonymousListener"
    }

    /// 是否支持该事件（默认支持所有事件）
    fn supports_event(&self, _event: &dyn ApplicationEvent) -> bool {
        true
    }

    /// 分发顺序，越小越先执行
    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE
    }
}

/// 类型化事件监听器 trait
pub trait TypedEventListener<E: ApplicationEvent>: Send + Sync {
    /// 处理特定类型的事件
    fn on_event(&self, event: &E) -> ContainerResult<()>;

    fn listener_name(&self) -> &str {
        "AnonymousTypedListener"
    }

    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE
    }
}

/// 类型化事件监听器适配器
///
/// 将 TypedEventListener<E> 适配为 ApplicationListener，只接收 `E` 类型的事件
pub struct TypedEventListenerAdapter<E: ApplicationEvent, L: TypedEventListener<E>> {
    listener: Arc<L>,
    _phantom: PhantomData<fn(&E)>,
}

impl<E: ApplicationEvent, L: TypedEventListener<E>> TypedEventListenerAdapter<E, L> {
    pub fn new(listener: Arc<L>) -> Self {
        Self {
            listener,
            _phantom: PhantomData,
        }
    }
}

impl<E: ApplicationEvent, L: TypedEventListener<E> + 'static> ApplicationListener for TypedEventListenerAdapter<E, L> {
    fn on_application_event(&self, event: Arc<dyn ApplicationEvent>) -> ContainerResult<()> {
        match event.as_any().downcast_ref::<E>() {
            Some(typed_event) => self.listener.on_event(typed_event),
            None => Ok(()),
        }
    }

    fn listener_name(&self) -> &str {
        self.listener.listener_name()
    }

    fn supports_event(&self, event: &dyn ApplicationEvent) -> bool {
        event.as_any().is::<E>()
    }

    fn order(&self) -> i32 {
        self.listener.order()
    }
}

/// 基于闭包的监听器
pub struct FnEventListener<E, F> {
    name: String,
    handler: F,
    _phantom: PhantomData<fn(&E)>,
}

impl<E, F> FnEventListener<E, F>
where
    E: ApplicationEvent,
    F: Fn(&E) -> ContainerResult<()> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<E, F> ApplicationListener for FnEventListener<E, F>
where
    E: ApplicationEvent,
    F: Fn(&E) -> ContainerResult<()> + Send + Sync + 'static,
{
    fn on_application_event(&self, event: Arc<dyn ApplicationEvent>) -> ContainerResult<()> {
        match event.as_any().downcast_ref::<E>() {
            Some(typed_event) => (self.handler)(typed_event),
            None => Ok(()),
        }
    }

    fn listener_name(&self) -> &str {
        &self.name
    }

    fn supports_event(&self, event: &dyn ApplicationEvent) -> bool {
        event.as_any().is::<E>()
    }
}

/// 便捷构造：监听 `E` 类型事件的闭包监听器
pub fn listener_fn<E, F>(name: impl Into<String>, handler: F) -> Arc<dyn ApplicationListener>
where
    E: ApplicationEvent,
    F: Fn(&E) -> ContainerResult<()> + Send + Sync + 'static,
{
    Arc::new(FnEventListener::new(name, handler))
}

/// 错误处理器类型
///
/// 设置后，监听器的错误（包括 panic）交给它处理，分发继续进行
pub type ErrorHandler =
    Arc<dyn Fn(&dyn ApplicationListener, &Arc<dyn ApplicationEvent>, &ContainerError) + Send + Sync>;

/// 事件多播器 trait
pub trait ApplicationEventMulticaster: Send + Sync {
    fn add_application_listener(&self, listener: Arc<dyn ApplicationListener>);

    /// 按名称登记监听器 Bean，不触发实例化
    fn add_application_listener_bean(&self, bean_name: &str);

    fn remove_application_listener(&self, listener: &Arc<dyn ApplicationListener>);

    fn remove_application_listener_bean(&self, bean_name: &str);

    fn remove_all_listeners(&self);

    /// 广播事件到所有支持它的监听器
    ///
    /// 同步模式下，监听器的错误会直接返回给发布方并中断后续监听器；
    /// 可通过设置错误处理器统一处理，避免单个监听器影响整体
    fn multicast_event(&self, event: Arc<dyn ApplicationEvent>) -> ContainerResult<()>;

    /// 实例监听器与监听器 Bean 名称的总数
    fn listener_count(&self) -> usize;
}

/// 事件发布接口，由应用上下文实现
pub trait ApplicationEventPublisher: Send + Sync {
    fn publish_event(&self, event: Arc<dyn ApplicationEvent>) -> ContainerResult<()>;
}

fn same_listener(a: &Arc<dyn ApplicationListener>, b: &Arc<dyn ApplicationListener>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// 简单事件多播器实现
///
/// 默认同步执行；异步模式下每个监听器在 tokio runtime 上独立执行
pub struct SimpleApplicationEventMulticaster {
    listeners: RwLock<Vec<Arc<dyn ApplicationListener>>>,
    listener_beans: RwLock<Vec<String>>,
    bean_factory: Option<Weak<DefaultListableBeanFactory>>,
    error_handler: RwLock<Option<ErrorHandler>>,
    async_mode: bool,
}

impl SimpleApplicationEventMulticaster {
    /// 创建同步模式的多播器
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            listener_beans: RwLock::new(Vec::new()),
            bean_factory: None,
            error_handler: RwLock::new(None),
            async_mode: false,
        }
    }

    /// 创建异步模式的多播器
    pub fn new_async() -> Self {
        Self {
            async_mode: true,
            ..Self::new()
        }
    }

    /// 关联 BeanFactory，用于解析按名称登记的监听器 Bean
    pub fn with_bean_factory(mut self, bean_factory: &Arc<DefaultListableBeanFactory>) -> Self {
        self.bean_factory = Some(Arc::downgrade(bean_factory));
        self
    }

    /// 设置错误处理器
    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(&dyn ApplicationListener, &Arc<dyn ApplicationEvent>, &ContainerError) + Send + Sync + 'static,
    {
        *self.error_handler.write() = Some(Arc::new(handler));
    }

    /// 移除错误处理器
    pub fn remove_error_handler(&self) {
        *self.error_handler.write() = None;
    }

    pub fn is_async(&self) -> bool {
        self.async_mode
    }

    /// 收集支持该事件的监听器，按 order 稳定排序
    fn retrieve_listeners(&self, event: &Arc<dyn ApplicationEvent>) -> ContainerResult<Vec<Arc<dyn ApplicationListener>>> {
        let mut all: Vec<Arc<dyn ApplicationListener>> = self.listeners.read().clone();

        let bean_names = self.listener_beans.read().clone();
        if !bean_names.is_empty() {
            if let Some(factory) = self.bean_factory.as_ref().and_then(Weak::upgrade) {
                for name in bean_names {
                    match factory.get_application_listener(&name) {
                        Ok(listener) => {
                            if !all.iter().any(|l| same_listener(l, &listener)) {
                                all.push(listener);
                            }
                        }
                        Err(ContainerError::BeanNotFound(_)) => {
                            tracing::trace!("Listener bean '{}' no longer exists", name);
                        }
                        Err(ContainerError::MissingCapability { .. }) => {
                            tracing::debug!("Bean '{}' is no longer exposed as an application listener", name);
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        all.retain(|l| l.supports_event(event.as_ref()));
        all.sort_by_key(|l| l.order());
        Ok(all)
    }

    /// 调用单个监听器，panic 转换为错误
    fn invoke_listener(listener: &Arc<dyn ApplicationListener>, event: &Arc<dyn ApplicationEvent>) -> ContainerResult<()> {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            listener.on_application_event(Arc::clone(event))
        }));

        match result {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "listener panicked".to_string());
                Err(ContainerError::Listener {
                    listener: listener.listener_name().to_string(),
                    event: event.event_name().to_string(),
                    message,
                })
            }
        }
    }

    fn handle_failure(
        listener: &Arc<dyn ApplicationListener>,
        event: &Arc<dyn ApplicationEvent>,
        error: ContainerError,
        error_handler: Option<&ErrorHandler>,
    ) -> ContainerResult<()> {
        match error_handler {
            Some(handler) => {
                handler(listener.as_ref(), event, &error);
                Ok(())
            }
            None => Err(error),
        }
    }
}

impl Default for SimpleApplicationEventMulticaster {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationEventMulticaster for SimpleApplicationEventMulticaster {
    fn add_application_listener(&self, listener: Arc<dyn ApplicationListener>) {
        let mut listeners = self.listeners.write();
        listeners.retain(|l| !same_listener(l, &listener));
        tracing::debug!("Added event listener: {}", listener.listener_name());
        listeners.push(listener);
    }

    fn add_application_listener_bean(&self, bean_name: &str) {
        let mut beans = self.listener_beans.write();
        if !beans.iter().any(|b| b == bean_name) {
            beans.push(bean_name.to_string());
            tracing::debug!("Added event listener bean: {}", bean_name);
        }
    }

    fn remove_application_listener(&self, listener: &Arc<dyn ApplicationListener>) {
        self.listeners.write().retain(|l| !same_listener(l, listener));
    }

    fn remove_application_listener_bean(&self, bean_name: &str) {
        self.listener_beans.write().retain(|b| b != bean_name);
    }

    fn remove_all_listeners(&self) {
        self.listeners.write().clear();
        self.listener_beans.write().clear();
        tracing::debug!("Removed all event listeners");
    }

    fn multicast_event(&self, event: Arc<dyn ApplicationEvent>) -> ContainerResult<()> {
        let listeners = self.retrieve_listeners(&event)?;
        let error_handler = self.error_handler.read().clone();

        tracing::debug!(
            "Multicasting event: {} to {} listener(s) (async_mode: {})",
            event.event_name(),
            listeners.len(),
            self.async_mode
        );

        if self.async_mode {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                for listener in listeners {
                    let event = Arc::clone(&event);
                    let error_handler = error_handler.clone();
                    handle.spawn(async move {
                        if let Err(e) = Self::invoke_listener(&listener, &event) {
                            if let Err(e) = Self::handle_failure(&listener, &event, e, error_handler.as_ref()) {
                                tracing::error!(
                                    "Listener '{}' failed while handling event '{}': {}",
                                    listener.listener_name(),
                                    event.event_name(),
                                    e
                                );
                            }
                        }
                    });
                }
                return Ok(());
            }
            // 没有runtime，降级为同步执行
            tracing::warn!("No tokio runtime available, falling back to sync execution");
        }

        for listener in &listeners {
            if let Err(e) = Self::invoke_listener(listener, &event) {
                Self::handle_failure(listener, &event, e, error_handler.as_ref())?;
            }
        }
        Ok(())
    }

    fn listener_count(&self) -> usize {
        self.listeners.read().len() + self.listener_beans.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::{BeanDefinition, DeclareCapabilities};
    use crate::bean_factory::BeanDefinitionRegistry;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Log = Arc<Mutex<Vec<String>>>;

    struct Named {
        name: &'static str,
        order: i32,
        fail: bool,
        log: Log,
    }

    impl ApplicationListener for Named {
        fn on_application_event(&self, event: Arc<dyn ApplicationEvent>) -> ContainerResult<()> {
            self.log.lock().push(format!("{}:{}", self.name, event.event_name()));
            if self.fail {
                return Err(ContainerError::illegal_state("listener failure"));
            }
            Ok(())
        }

        fn listener_name(&self) -> &str {
            self.name
        }

        fn order(&self) -> i32 {
            self.order
        }
    }

    fn named(name: &'static str, order: i32, fail: bool, log: &Log) -> Arc<dyn ApplicationListener> {
        Arc::new(Named {
            name,
            order,
            fail,
            log: Arc::clone(log),
        })
    }

    fn refreshed() -> Arc<dyn ApplicationEvent> {
        Arc::new(ContextRefreshedEvent::new("ctx", "test"))
    }

    #[test]
    fn test_listeners_invoked_by_order() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let multicaster = SimpleApplicationEventMulticaster::new();
        multicaster.add_application_listener(named("late", 10, false, &log));
        multicaster.add_application_listener(named("early", -5, false, &log));

        multicaster.multicast_event(refreshed()).unwrap();
        assert_eq!(
            *log.lock(),
            vec!["early:ContextRefreshedEvent", "late:ContextRefreshedEvent"]
        );
    }

    #[test]
    fn test_error_propagates_without_handler() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let multicaster = SimpleApplicationEventMulticaster::new();
        multicaster.add_application_listener(named("bad", 0, true, &log));
        multicaster.add_application_listener(named("good", 1, false, &log));

        assert!(multicaster.multicast_event(refreshed()).is_err());
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_error_handler_keeps_dispatching() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let failures = Arc::new(AtomicUsize::new(0));
        let multicaster = SimpleApplicationEventMulticaster::new();
        let counter = Arc::clone(&failures);
        multicaster.set_error_handler(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        multicaster.add_application_listener(named("bad", 0, true, &log));
        multicaster.add_application_listener(named("good", 1, false, &log));
        multicaster.add_application_listener(listener_fn("panicky", |_: &ContextRefreshedEvent| -> ContainerResult<()> {
            panic!("boom")
        }));

        multicaster.multicast_event(refreshed()).unwrap();
        assert_eq!(failures.load(Ordering::SeqCst), 2);
        assert_eq!(log.lock().len(), 2);
    }

    struct Counter(AtomicUsize);

    impl TypedEventListener<ContextClosedEvent> for Counter {
        fn on_event(&self, _event: &ContextClosedEvent) -> ContainerResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_typed_listener_only_sees_its_event() {
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let multicaster = SimpleApplicationEventMulticaster::new();
        multicaster.add_application_listener(Arc::new(TypedEventListenerAdapter::new(Arc::clone(&counter))));

        multicaster.multicast_event(refreshed()).unwrap();
        multicaster
            .multicast_event(Arc::new(ContextClosedEvent::new("ctx", "test")))
            .unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_payload_event() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let multicaster = SimpleApplicationEventMulticaster::new();
        multicaster.add_application_listener(listener_fn(
            "payload",
            move |e: &PayloadApplicationEvent<String>| {
                *sink.lock() = Some(e.payload().clone());
                Ok(())
            },
        ));

        multicaster
            .multicast_event(Arc::new(PayloadApplicationEvent::new("ctx", String::from("hello"))))
            .unwrap();
        multicaster
            .multicast_event(Arc::new(PayloadApplicationEvent::new("ctx", 5u32)))
            .unwrap();
        assert_eq!(seen.lock().as_deref(), Some("hello"));
    }

    #[test]
    fn test_listener_beans_resolved_at_multicast_time() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let factory = Arc::new(DefaultListableBeanFactory::new());
        let created = Arc::new(AtomicUsize::new(0));
        let (l, c) = (Arc::clone(&log), Arc::clone(&created));
        factory
            .register_bean_definition(
                "auditListener",
                BeanDefinition::builder(move |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(Named { name: "audit", order: 0, fail: false, log: Arc::clone(&l) })
                })
                .application_listener()
                .build(),
            )
            .unwrap();

        let multicaster = SimpleApplicationEventMulticaster::new().with_bean_factory(&factory);
        multicaster.add_application_listener_bean("auditListener");
        multicaster.add_application_listener_bean("auditListener");
        assert_eq!(created.load(Ordering::SeqCst), 0);
        assert_eq!(multicaster.listener_count(), 1);

        // 同一个实例既作为实例监听器又作为 Bean 登记，只调用一次
        let instance = factory.get_application_listener("auditListener").unwrap();
        multicaster.add_application_listener(instance);

        multicaster.multicast_event(refreshed()).unwrap();
        assert_eq!(*log.lock(), vec!["audit:ContextRefreshedEvent"]);
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_listener() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let multicaster = SimpleApplicationEventMulticaster::new();
        let listener = named("a", 0, false, &log);
        multicaster.add_application_listener(Arc::clone(&listener));
        multicaster.add_application_listener(Arc::clone(&listener));
        assert_eq!(multicaster.listener_count(), 1);

        multicaster.remove_application_listener(&listener);
        multicaster.multicast_event(refreshed()).unwrap();
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_async_multicast_runs_on_runtime() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        let multicaster = SimpleApplicationEventMulticaster::new_async();
        multicaster.add_application_listener(listener_fn("async", move |e: &ContextRefreshedEvent| {
            tx.send(e.context_id.clone()).map_err(|e| ContainerError::Other(e.into()))
        }));

        multicaster.multicast_event(refreshed()).unwrap();
        let received = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(received.as_deref(), Some("ctx"));
    }
}
