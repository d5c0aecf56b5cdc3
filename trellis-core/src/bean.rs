//! Bean 定义与能力声明
//!
//! Rust 没有运行时反射，容器无法像 `instanceof` 那样检查一个实例是否实现了某个 trait。
//! 因此 Bean 的"能力"（后置处理器、监听器、生命周期等）在定义时通过类型化的 builder
//! 声明，并以类型擦除的适配器保存：
//!
//! - 容器可以在**不实例化**的情况下按能力枚举 Bean 名称；
//! - 实例化之后，适配器把 `Arc<dyn Any>` 还原为对应的 trait object。

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::bean_factory::{BeanFactoryExt, ConfigurableBeanFactory, DefaultListableBeanFactory};
use crate::config::Environment;
use crate::context::ApplicationContext;
use crate::conversion::{ConversionService, DefaultConversionService};
use crate::error::{ContainerError, ContainerResult};
use crate::event::{ApplicationEventMulticaster, ApplicationListener};
use crate::lifecycle::{Lifecycle, LifecycleProcessor, SmartInitializingSingleton};
use crate::message::{HierarchicalMessageSource, MessageSource};
use crate::ordering::{OrderKey, OrderTier, Ordered, PriorityOrdered, LOWEST_PRECEDENCE};
use crate::post_processor::{
    BeanDefinitionRegistryPostProcessor, BeanFactoryPostProcessor, BeanPostProcessor,
    MergedBeanDefinitionPostProcessor,
};
use crate::Scope;

/// 容器中保存的 Bean 实例
pub type SharedBean = Arc<dyn Any + Send + Sync>;

/// 类型擦除的能力适配器
type Adapter<V> = Arc<dyn Fn(&SharedBean) -> Option<Arc<V>> + Send + Sync>;

/// 实例化函数
pub type Instantiator = Arc<dyn Fn(&BeanCreationContext<'_>) -> ContainerResult<SharedBean> + Send + Sync>;

/// 生命周期回调类型
pub type InitCallback = Arc<dyn Fn(&SharedBean) -> ContainerResult<()> + Send + Sync>;
pub type DestroyCallback = Arc<dyn Fn(&SharedBean) -> ContainerResult<()> + Send + Sync>;

fn adapter<T, V>(coerce: fn(Arc<T>) -> Arc<V>) -> Adapter<V>
where
    T: Any + Send + Sync,
    V: ?Sized + 'static,
{
    Arc::new(move |bean: &SharedBean| Arc::clone(bean).downcast::<T>().ok().map(coerce))
}

/// 可按名称发现的能力
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    BeanPostProcessor,
    MergedBeanDefinitionPostProcessor,
    BeanFactoryPostProcessor,
    BeanDefinitionRegistryPostProcessor,
    ApplicationListener,
    Lifecycle,
    SmartInitializingSingleton,
    MessageSource,
    EventMulticaster,
    LifecycleProcessor,
    ConversionService,
    LoadTimeWeaverAware,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Bean 的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BeanRole {
    /// 用户定义的业务 Bean
    #[default]
    Application,
    /// 框架内部的基础设施 Bean，不参与 "too early" 诊断
    Infrastructure,
}

/// 类型擦除后的能力集合
#[derive(Clone, Default)]
pub struct Capabilities {
    tier: Option<OrderTier>,
    ordered: Option<Adapter<dyn Ordered>>,
    bean_post_processor: Option<Adapter<dyn BeanPostProcessor>>,
    merged_definition_post_processor: Option<Adapter<dyn MergedBeanDefinitionPostProcessor>>,
    factory_post_processor: Option<Adapter<dyn BeanFactoryPostProcessor>>,
    registry_post_processor: Option<Adapter<dyn BeanDefinitionRegistryPostProcessor>>,
    listener: Option<Adapter<dyn ApplicationListener>>,
    lifecycle: Option<Adapter<dyn Lifecycle>>,
    smart_initializing: Option<Adapter<dyn SmartInitializingSingleton>>,
    message_source: Option<Adapter<dyn MessageSource>>,
    hierarchical_message_source: Option<Adapter<dyn HierarchicalMessageSource>>,
    event_multicaster: Option<Adapter<dyn ApplicationEventMulticaster>>,
    lifecycle_processor: Option<Adapter<dyn LifecycleProcessor>>,
    conversion_service: Option<Adapter<dyn ConversionService>>,
    load_time_weaver_aware: bool,
}

impl Capabilities {
    /// 是否声明了某项能力
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::BeanPostProcessor => self.bean_post_processor.is_some(),
            Capability::MergedBeanDefinitionPostProcessor => self.merged_definition_post_processor.is_some(),
            Capability::BeanFactoryPostProcessor => self.factory_post_processor.is_some(),
            Capability::BeanDefinitionRegistryPostProcessor => self.registry_post_processor.is_some(),
            Capability::ApplicationListener => self.listener.is_some(),
            Capability::Lifecycle => self.lifecycle.is_some(),
            Capability::SmartInitializingSingleton => self.smart_initializing.is_some(),
            Capability::MessageSource => self.message_source.is_some(),
            Capability::EventMulticaster => self.event_multicaster.is_some(),
            Capability::LifecycleProcessor => self.lifecycle_processor.is_some(),
            Capability::ConversionService => self.conversion_service.is_some(),
            Capability::LoadTimeWeaverAware => self.load_time_weaver_aware,
        }
    }

    /// 定义时声明的排序层级
    pub fn tier(&self) -> OrderTier {
        self.tier.unwrap_or(OrderTier::Unordered)
    }

    /// 从实例读取排序键，层级来自定义，order 值来自实例
    pub fn order_key(&self, bean: &SharedBean) -> OrderKey {
        let order = self
            .ordered
            .as_ref()
            .and_then(|view| view(bean))
            .map(|ordered| ordered.order())
            .unwrap_or(LOWEST_PRECEDENCE);
        OrderKey::new(self.tier(), order)
    }

    pub fn bean_post_processor(&self, bean: &SharedBean) -> Option<Arc<dyn BeanPostProcessor>> {
        self.bean_post_processor.as_ref().and_then(|view| view(bean))
    }

    pub fn merged_definition_post_processor(
        &self,
        bean: &SharedBean,
    ) -> Option<Arc<dyn MergedBeanDefinitionPostProcessor>> {
        self.merged_definition_post_processor.as_ref().and_then(|view| view(bean))
    }

    pub fn factory_post_processor(&self, bean: &SharedBean) -> Option<Arc<dyn BeanFactoryPostProcessor>> {
        self.factory_post_processor.as_ref().and_then(|view| view(bean))
    }

    pub fn registry_post_processor(
        &self,
        bean: &SharedBean,
    ) -> Option<Arc<dyn BeanDefinitionRegistryPostProcessor>> {
        self.registry_post_processor.as_ref().and_then(|view| view(bean))
    }

    pub fn listener(&self, bean: &SharedBean) -> Option<Arc<dyn ApplicationListener>> {
        self.listener.as_ref().and_then(|view| view(bean))
    }

    pub fn lifecycle(&self, bean: &SharedBean) -> Option<Arc<dyn Lifecycle>> {
        self.lifecycle.as_ref().and_then(|view| view(bean))
    }

    pub fn smart_initializing(&self, bean: &SharedBean) -> Option<Arc<dyn SmartInitializingSingleton>> {
        self.smart_initializing.as_ref().and_then(|view| view(bean))
    }

    pub fn message_source(&self, bean: &SharedBean) -> Option<Arc<dyn MessageSource>> {
        self.message_source.as_ref().and_then(|view| view(bean))
    }

    pub fn hierarchical_message_source(&self, bean: &SharedBean) -> Option<Arc<dyn HierarchicalMessageSource>> {
        self.hierarchical_message_source.as_ref().and_then(|view| view(bean))
    }

    pub fn event_multicaster(&self, bean: &SharedBean) -> Option<Arc<dyn ApplicationEventMulticaster>> {
        self.event_multicaster.as_ref().and_then(|view| view(bean))
    }

    pub fn lifecycle_processor(&self, bean: &SharedBean) -> Option<Arc<dyn LifecycleProcessor>> {
        self.lifecycle_processor.as_ref().and_then(|view| view(bean))
    }

    pub fn conversion_service(&self, bean: &SharedBean) -> Option<Arc<dyn ConversionService>> {
        self.conversion_service.as_ref().and_then(|view| view(bean))
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const ALL: [Capability; 12] = [
            Capability::BeanPostProcessor,
            Capability::MergedBeanDefinitionPostProcessor,
            Capability::BeanFactoryPostProcessor,
            Capability::BeanDefinitionRegistryPostProcessor,
            Capability::ApplicationListener,
            Capability::Lifecycle,
            Capability::SmartInitializingSingleton,
            Capability::MessageSource,
            Capability::EventMulticaster,
            Capability::LifecycleProcessor,
            Capability::ConversionService,
            Capability::LoadTimeWeaverAware,
        ];
        let declared: Vec<_> = ALL.iter().filter(|c| self.has(**c)).collect();
        f.debug_struct("Capabilities")
            .field("tier", &self.tier())
            .field("declared", &declared)
            .finish()
    }
}

/// 类型化的能力声明
///
/// 由 `BeanDefinitionBuilder<T>` 和 `BeanInstanceBuilder<T>` 共享，
/// 每个方法都要求 `T` 实现对应的 trait，编译期保证声明与实现一致
pub trait DeclareCapabilities<T: Any + Send + Sync>: Sized {
    fn capabilities_mut(&mut self) -> &mut Capabilities;

    /// 声明为 Ordered，order 值在发现时从实例读取
    fn ordered(mut self) -> Self
    where
        T: Ordered,
    {
        let caps = self.capabilities_mut();
        caps.tier = Some(OrderTier::Ordered);
        caps.ordered = Some(adapter::<T, dyn Ordered>(|t| t as Arc<dyn Ordered>));
        self
    }

    /// 声明为 PriorityOrdered，总是排在 Ordered 之前
    fn priority_ordered(mut self) -> Self
    where
        T: PriorityOrdered,
    {
        let caps = self.capabilities_mut();
        caps.tier = Some(OrderTier::PriorityOrdered);
        caps.ordered = Some(adapter::<T, dyn Ordered>(|t| t as Arc<dyn Ordered>));
        self
    }

    fn bean_post_processor(mut self) -> Self
    where
        T: BeanPostProcessor,
    {
        self.capabilities_mut().bean_post_processor =
            Some(adapter::<T, dyn BeanPostProcessor>(|t| t as Arc<dyn BeanPostProcessor>));
        self
    }

    fn merged_definition_post_processor(mut self) -> Self
    where
        T: MergedBeanDefinitionPostProcessor,
    {
        let caps = self.capabilities_mut();
        caps.bean_post_processor = Some(adapter::<T, dyn BeanPostProcessor>(|t| t as Arc<dyn BeanPostProcessor>));
        caps.merged_definition_post_processor = Some(adapter::<T, dyn MergedBeanDefinitionPostProcessor>(|t| {
            t as Arc<dyn MergedBeanDefinitionPostProcessor>
        }));
        self
    }

    fn factory_post_processor(mut self) -> Self
    where
        T: BeanFactoryPostProcessor,
    {
        self.capabilities_mut().factory_post_processor =
            Some(adapter::<T, dyn BeanFactoryPostProcessor>(|t| t as Arc<dyn BeanFactoryPostProcessor>));
        self
    }

    fn registry_post_processor(mut self) -> Self
    where
        T: BeanDefinitionRegistryPostProcessor,
    {
        let caps = self.capabilities_mut();
        caps.factory_post_processor =
            Some(adapter::<T, dyn BeanFactoryPostProcessor>(|t| t as Arc<dyn BeanFactoryPostProcessor>));
        caps.registry_post_processor = Some(adapter::<T, dyn BeanDefinitionRegistryPostProcessor>(|t| {
            t as Arc<dyn BeanDefinitionRegistryPostProcessor>
        }));
        self
    }

    fn application_listener(mut self) -> Self
    where
        T: ApplicationListener,
    {
        self.capabilities_mut().listener =
            Some(adapter::<T, dyn ApplicationListener>(|t| t as Arc<dyn ApplicationListener>));
        self
    }

    fn lifecycle(mut self) -> Self
    where
        T: Lifecycle,
    {
        self.capabilities_mut().lifecycle = Some(adapter::<T, dyn Lifecycle>(|t| t as Arc<dyn Lifecycle>));
        self
    }

    fn smart_initializing_singleton(mut self) -> Self
    where
        T: SmartInitializingSingleton,
    {
        self.capabilities_mut().smart_initializing = Some(adapter::<T, dyn SmartInitializingSingleton>(|t| {
            t as Arc<dyn SmartInitializingSingleton>
        }));
        self
    }

    fn message_source(mut self) -> Self
    where
        T: MessageSource,
    {
        self.capabilities_mut().message_source =
            Some(adapter::<T, dyn MessageSource>(|t| t as Arc<dyn MessageSource>));
        self
    }

    fn hierarchical_message_source(mut self) -> Self
    where
        T: HierarchicalMessageSource,
    {
        let caps = self.capabilities_mut();
        caps.message_source = Some(adapter::<T, dyn MessageSource>(|t| t as Arc<dyn MessageSource>));
        caps.hierarchical_message_source = Some(adapter::<T, dyn HierarchicalMessageSource>(|t| {
            t as Arc<dyn HierarchicalMessageSource>
        }));
        self
    }

    fn event_multicaster(mut self) -> Self
    where
        T: ApplicationEventMulticaster,
    {
        self.capabilities_mut().event_multicaster = Some(adapter::<T, dyn ApplicationEventMulticaster>(|t| {
            t as Arc<dyn ApplicationEventMulticaster>
        }));
        self
    }

    fn lifecycle_processor(mut self) -> Self
    where
        T: LifecycleProcessor,
    {
        self.capabilities_mut().lifecycle_processor =
            Some(adapter::<T, dyn LifecycleProcessor>(|t| t as Arc<dyn LifecycleProcessor>));
        self
    }

    fn conversion_service(mut self) -> Self
    where
        T: ConversionService,
    {
        self.capabilities_mut().conversion_service =
            Some(adapter::<T, dyn ConversionService>(|t| t as Arc<dyn ConversionService>));
        self
    }

    /// 需要在冻结配置之前优先实例化（织入相关）
    fn load_time_weaver_aware(mut self) -> Self {
        self.capabilities_mut().load_time_weaver_aware = true;
        self
    }
}

/// Bean 定义 - 描述如何创建和管理 Bean
///
/// 定义本身不带名称，名称在注册到 BeanFactory 时给出
#[derive(Clone)]
pub struct BeanDefinition {
    /// Bean 的类型名称
    pub type_name: &'static str,

    /// Bean 的类型 ID
    pub type_id: TypeId,

    /// Bean 的作用域
    pub scope: Scope,

    /// 是否延迟初始化（仅对单例有效）
    pub lazy: bool,

    /// 必须先于本 Bean 创建的 Bean 名称
    pub dependencies: Vec<String>,

    /// Bean 的角色
    pub role: BeanRole,

    /// 属性值，可以包含 `${...}` 占位符
    pub properties: BTreeMap<String, String>,

    /// 描述信息
    pub description: Option<String>,

    /// 合并定义后置处理器是否已经处理过
    pub(crate) post_processed: bool,

    instantiator: Instantiator,
    capabilities: Capabilities,
    init_callback: Option<InitCallback>,
    destroy_callback: Option<DestroyCallback>,
}

impl BeanDefinition {
    /// 创建类型化的定义构建器
    pub fn builder<T, F>(factory: F) -> BeanDefinitionBuilder<T>
    where
        T: Any + Send + Sync,
        F: Fn(&BeanCreationContext<'_>) -> ContainerResult<T> + Send + Sync + 'static,
    {
        BeanDefinitionBuilder::new(factory)
    }

    /// 创建没有额外能力的普通 Bean 定义
    pub fn new<T, F>(factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&BeanCreationContext<'_>) -> ContainerResult<T> + Send + Sync + 'static,
    {
        Self::builder(factory).build()
    }

    /// 设置作用域
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// 设置延迟初始化
    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// 设置依赖列表
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_role(mut self, role: BeanRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn is_singleton(&self) -> bool {
        self.scope == Scope::Singleton
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.has(capability)
    }

    pub fn init_callback(&self) -> Option<&InitCallback> {
        self.init_callback.as_ref()
    }

    pub fn destroy_callback(&self) -> Option<&DestroyCallback> {
        self.destroy_callback.as_ref()
    }

    /// 调用实例化函数
    pub fn instantiate(&self, context: &BeanCreationContext<'_>) -> ContainerResult<SharedBean> {
        (self.instantiator)(context)
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("type_name", &self.type_name)
            .field("scope", &self.scope)
            .field("lazy", &self.lazy)
            .field("dependencies", &self.dependencies)
            .field("role", &self.role)
            .field("properties", &self.properties)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// 类型化的 Bean 定义构建器
pub struct BeanDefinitionBuilder<T> {
    definition: BeanDefinition,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> BeanDefinitionBuilder<T> {
    fn new<F>(factory: F) -> Self
    where
        F: Fn(&BeanCreationContext<'_>) -> ContainerResult<T> + Send + Sync + 'static,
    {
        let instantiator: Instantiator = Arc::new(move |ctx: &BeanCreationContext<'_>| {
            let bean = factory(ctx)?;
            Ok(Arc::new(bean) as SharedBean)
        });

        Self {
            definition: BeanDefinition {
                type_name: std::any::type_name::<T>(),
                type_id: TypeId::of::<T>(),
                scope: Scope::default(),
                lazy: false,
                dependencies: Vec::new(),
                role: BeanRole::default(),
                properties: BTreeMap::new(),
                description: None,
                post_processed: false,
                instantiator,
                capabilities: Capabilities::default(),
                init_callback: None,
                destroy_callback: None,
            },
            _phantom: PhantomData,
        }
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.definition.scope = scope;
        self
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.definition.lazy = lazy;
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.definition.dependencies.push(name.into());
        self
    }

    pub fn role(mut self, role: BeanRole) -> Self {
        self.definition.role = role;
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.definition.properties.insert(key.into(), value.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.definition.description = Some(description.into());
        self
    }

    /// 设置初始化回调（在 before/after 后置处理之间调用）
    pub fn init<F>(mut self, init_fn: F) -> Self
    where
        F: Fn(&T) -> ContainerResult<()> + Send + Sync + 'static,
    {
        self.definition.init_callback = Some(Arc::new(move |bean: &SharedBean| {
            match bean.downcast_ref::<T>() {
                Some(typed) => init_fn(typed),
                None => Err(ContainerError::BeanCreationFailed(format!(
                    "Failed to downcast bean to '{}' in init callback",
                    std::any::type_name::<T>()
                ))),
            }
        }));
        self
    }

    /// 设置销毁回调（单例销毁时调用）
    pub fn destroy<F>(mut self, destroy_fn: F) -> Self
    where
        F: Fn(&T) -> ContainerResult<()> + Send + Sync + 'static,
    {
        self.definition.destroy_callback = Some(Arc::new(move |bean: &SharedBean| {
            match bean.downcast_ref::<T>() {
                Some(typed) => destroy_fn(typed),
                None => Err(ContainerError::BeanCreationFailed(format!(
                    "Failed to downcast bean to '{}' in destroy callback",
                    std::any::type_name::<T>()
                ))),
            }
        }));
        self
    }

    pub fn build(self) -> BeanDefinition {
        self.definition
    }
}

impl<T: Any + Send + Sync> DeclareCapabilities<T> for BeanDefinitionBuilder<T> {
    fn capabilities_mut(&mut self) -> &mut Capabilities {
        &mut self.definition.capabilities
    }
}

/// 已创建的 Bean 实例及其能力
#[derive(Clone)]
pub struct BeanInstance {
    pub(crate) object: SharedBean,
    pub(crate) type_name: &'static str,
    pub(crate) capabilities: Capabilities,
}

impl BeanInstance {
    /// 不带能力的实例（手动注册单例时使用）
    pub fn of<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self::builder(value).build()
    }

    pub fn builder<T: Any + Send + Sync>(value: Arc<T>) -> BeanInstanceBuilder<T> {
        BeanInstanceBuilder {
            instance: BeanInstance {
                object: value as SharedBean,
                type_name: std::any::type_name::<T>(),
                capabilities: Capabilities::default(),
            },
            _phantom: PhantomData,
        }
    }

    pub(crate) fn from_parts(object: SharedBean, type_name: &'static str, capabilities: Capabilities) -> Self {
        Self {
            object,
            type_name,
            capabilities,
        }
    }

    pub fn object(&self) -> &SharedBean {
        &self.object
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> ContainerResult<Arc<T>> {
        Arc::clone(&self.object)
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                expected: std::any::type_name::<T>().to_string(),
                found: self.type_name.to_string(),
            })
    }
}

impl fmt::Debug for BeanInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanInstance")
            .field("type_name", &self.type_name)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

pub struct BeanInstanceBuilder<T> {
    instance: BeanInstance,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> BeanInstanceBuilder<T> {
    pub fn build(self) -> BeanInstance {
        self.instance
    }
}

impl<T: Any + Send + Sync> DeclareCapabilities<T> for BeanInstanceBuilder<T> {
    fn capabilities_mut(&mut self) -> &mut Capabilities {
        &mut self.instance.capabilities
    }
}

/// Bean 创建上下文
///
/// 工厂函数通过它获取依赖、属性值以及所属的应用上下文，
/// 取代在实例构造完成后再注入上下文的回调方式
pub struct BeanCreationContext<'a> {
    bean_name: &'a str,
    definition: &'a BeanDefinition,
    bean_factory: &'a DefaultListableBeanFactory,
}

impl<'a> BeanCreationContext<'a> {
    pub(crate) fn new(
        bean_name: &'a str,
        definition: &'a BeanDefinition,
        bean_factory: &'a DefaultListableBeanFactory,
    ) -> Self {
        Self {
            bean_name,
            definition,
            bean_factory,
        }
    }

    /// 正在创建的 Bean 名称
    pub fn bean_name(&self) -> &str {
        self.bean_name
    }

    pub fn definition(&self) -> &BeanDefinition {
        self.definition
    }

    pub fn bean_factory(&self) -> &DefaultListableBeanFactory {
        self.bean_factory
    }

    /// 按名称获取依赖
    pub fn get_bean<T: Any + Send + Sync>(&self, name: &str) -> ContainerResult<Arc<T>> {
        self.bean_factory.get_bean_typed::<T>(name)
    }

    /// 按类型获取依赖
    pub fn get_bean_by_type<T: Any + Send + Sync>(&self) -> ContainerResult<Arc<T>> {
        self.bean_factory.get_bean_by_type::<T>()
    }

    /// 读取属性值并解析其中的占位符
    pub fn property(&self, key: &str) -> ContainerResult<Option<String>> {
        match self.definition.properties.get(key) {
            Some(raw) => self.bean_factory.resolve_embedded_value(raw).map(Some),
            None => Ok(None),
        }
    }

    /// 读取必需的属性值
    pub fn required_property(&self, key: &str) -> ContainerResult<String> {
        self.property(key)?.ok_or_else(|| {
            ContainerError::BeanCreationFailed(format!(
                "Bean '{}' requires property '{}'",
                self.bean_name, key
            ))
        })
    }

    /// 读取属性值并通过 ConversionService 转换
    pub fn property_as<V: Any + Send>(&self, key: &str) -> ContainerResult<Option<V>> {
        let Some(raw) = self.property(key)? else {
            return Ok(None);
        };
        let converted = match self.bean_factory.conversion_service() {
            Some(service) => service.convert(&raw, TypeId::of::<V>())?,
            None => DefaultConversionService::new().convert(&raw, TypeId::of::<V>())?,
        };
        converted
            .downcast::<V>()
            .map(|v| Some(*v))
            .map_err(|_| ContainerError::TypeMismatch {
                expected: std::any::type_name::<V>().to_string(),
                found: "converted value".to_string(),
            })
    }

    /// 所属的应用上下文（如果工厂由上下文管理）
    pub fn application_context(&self) -> Option<Arc<ApplicationContext>> {
        self.bean_factory.application_context()
    }

    pub fn environment(&self) -> Option<Arc<Environment>> {
        self.application_context().map(|ctx| Arc::clone(ctx.environment()))
    }
}
