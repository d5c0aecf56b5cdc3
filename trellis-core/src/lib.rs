// trellis-core: 应用上下文生命周期引擎
//
// 在 Bean 工厂之上编排完整的启动/关闭流程：
// - 工厂后置处理器与 Bean 后置处理器的分级注册（PriorityOrdered / Ordered / 普通）
// - 消息源、事件多播器、生命周期处理器等基础设施的初始化
// - 早期事件缓冲与父子上下文的事件传播
// - 失败回滚、幂等关闭与进程关闭钩子

pub mod app;
pub mod bean;
pub mod bean_factory;
pub mod cache;
pub mod component;
pub mod config;
pub mod constants;
pub mod context;
pub mod conversion;
pub mod error;
pub mod event;
pub mod factory_holder;
pub mod lifecycle;
pub mod logging;
pub mod message;
pub mod ordering;
pub mod post_processor;
pub mod post_processor_registration;
pub mod scope;
pub mod shutdown;
pub mod utils;

// 重新导出常用类型
pub use app::TrellisApplication;
pub use bean::{
    BeanCreationContext, BeanDefinition, BeanInstance, BeanRole, Capabilities, Capability, DeclareCapabilities,
    SharedBean,
};
pub use bean_factory::{
    BeanDefinitionRegistry, BeanFactory, BeanFactoryExt, ConfigurableBeanFactory, ConfigurableListableBeanFactory,
    DefaultListableBeanFactory, ListableBeanFactory, SingletonBeanRegistry,
};
pub use cache::{CacheRegistry, InvalidatableCache, MemoCache};
pub use component::{ComponentRegistration, ComponentScanLoader};
pub use config::{
    ConfigValue, Environment, EnvironmentPropertySource, MapPropertySource, PropertySource, TomlPropertySource,
};
pub use constants::*;
pub use context::{ApplicationContext, ApplicationContextBuilder, ContextHooks, ContextRegistry};
pub use conversion::{ConversionService, DefaultConversionService};
pub use error::{ApplicationResult, ContainerError, ContainerResult, Result};
pub use event::{
    listener_fn, ApplicationEvent, ApplicationEventMulticaster, ApplicationEventPublisher, ApplicationListener,
    ContextClosedEvent, ContextRefreshedEvent, ContextStartedEvent, ContextStoppedEvent, ErrorHandler,
    PayloadApplicationEvent, SimpleApplicationEventMulticaster, TypedEventListener, TypedEventListenerAdapter,
};
pub use factory_holder::{
    BeanDefinitionLoader, BeanFactoryHolder, GenericBeanFactoryHolder, RefreshableBeanFactoryHolder,
};
pub use lifecycle::{DefaultLifecycleProcessor, Lifecycle, LifecycleProcessor, SmartInitializingSingleton};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use message::{
    DelegatingMessageSource, HierarchicalMessageSource, MessageSource, MessageSourceResolvable, StaticMessageSource,
};
pub use ordering::{Ordered, PriorityOrdered};
pub use post_processor::{
    BeanDefinitionRegistryPostProcessor, BeanFactoryPostProcessor, BeanPostProcessor, FactoryPostProcessor,
    MergedBeanDefinitionPostProcessor, PostProcessorHandle,
};
pub use scope::Scope;
pub use shutdown::ShutdownHook;

// component! 宏展开时使用
pub use inventory;

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::app::TrellisApplication;
    pub use crate::bean::{BeanCreationContext, BeanDefinition, BeanInstance, Capability, DeclareCapabilities};
    pub use crate::bean_factory::{
        BeanDefinitionRegistry, BeanFactory, BeanFactoryExt, ConfigurableBeanFactory,
        ConfigurableListableBeanFactory, DefaultListableBeanFactory, ListableBeanFactory, SingletonBeanRegistry,
    };
    pub use crate::component::ComponentScanLoader;
    pub use crate::config::{Environment, MapPropertySource, PropertySource};
    pub use crate::context::{ApplicationContext, ContextHooks};
    pub use crate::error::{ContainerError, ContainerResult};
    pub use crate::event::{
        listener_fn, ApplicationEvent, ApplicationEventPublisher, ApplicationListener, ContextClosedEvent,
        ContextRefreshedEvent, PayloadApplicationEvent,
    };
    pub use crate::factory_holder::BeanDefinitionLoader;
    pub use crate::lifecycle::{Lifecycle, SmartInitializingSingleton};
    pub use crate::logging::LoggingConfig;
    pub use crate::message::MessageSource;
    pub use crate::ordering::{Ordered, PriorityOrdered};
    pub use crate::post_processor::{
        BeanDefinitionRegistryPostProcessor, BeanFactoryPostProcessor, BeanPostProcessor,
    };
    pub use crate::scope::Scope;
    pub use anyhow::{anyhow, Context};
}
