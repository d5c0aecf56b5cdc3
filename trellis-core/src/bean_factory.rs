//! Bean Factory - 核心容器接口
//!
//! 参考 Spring 的 BeanFactory 架构设计：一组按职责拆分的 trait，
//! 加上唯一的具体实现 `DefaultListableBeanFactory`。

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{ReentrantMutex, RwLock};

use crate::{
    bean::{BeanCreationContext, BeanDefinition, BeanInstance, BeanRole, Capabilities, Capability, SharedBean},
    cache::{InvalidatableCache, MemoCache},
    context::ApplicationContext,
    conversion::ConversionService,
    error::{ContainerError, ContainerResult},
    event::ApplicationListener,
    lifecycle::{Lifecycle, LifecycleProcessor},
    message::MessageSource,
    ordering::DependencyComparator,
    post_processor::{
        BeanDefinitionRegistryPostProcessor, BeanFactoryPostProcessor, BeanPostProcessor,
        PostProcessorHandle,
    },
    utils::dependency::{validate_dependency_graph, CreationTracker},
    Scope,
};
use crate::event::ApplicationEventMulticaster;
use crate::message::HierarchicalMessageSource;

/// 嵌入值解析器（例如 `${...}` 占位符）
pub type StringValueResolver = Arc<dyn Fn(&str) -> ContainerResult<String> + Send + Sync>;

/// BeanFactory - 最基础的容器接口
///
/// 注意：此 trait 不包含泛型方法，因此可以作为 trait object 使用
pub trait BeanFactory: Send + Sync {
    /// 通过名称获取 Bean
    fn get_bean(&self, name: &str) -> ContainerResult<SharedBean>;

    /// 检查是否包含指定名称的 Bean（定义或手动注册的单例）
    fn contains_bean(&self, name: &str) -> bool;

    fn is_singleton(&self, name: &str) -> ContainerResult<bool>;
}

/// BeanFactoryExt - BeanFactory 的扩展 trait
///
/// 提供泛型方法，不能作为 trait object 使用
pub trait BeanFactoryExt: BeanFactory {
    /// 通过名称获取并转换为具体类型
    fn get_bean_typed<T: Any + Send + Sync>(&self, name: &str) -> ContainerResult<Arc<T>>;

    /// 通过类型获取 Bean，必须恰好有一个候选
    fn get_bean_by_type<T: Any + Send + Sync>(&self) -> ContainerResult<Arc<T>>;

    fn contains_bean_by_type<T: Any + Send + Sync>(&self) -> bool;
}

/// ListableBeanFactory - 可列举的 Bean 工厂
pub trait ListableBeanFactory: BeanFactory {
    /// 所有 Bean 定义名称，按注册顺序
    fn get_bean_names(&self) -> Vec<String>;

    /// 指定类型的所有 Bean 名称（包括手动注册的单例）
    fn get_bean_names_for_type(&self, type_id: TypeId) -> Vec<String>;

    /// 按能力枚举 Bean 名称，不会触发实例化
    fn get_bean_names_for_capability(&self, capability: Capability, include_non_singletons: bool) -> Vec<String>;

    fn get_bean_definition_count(&self) -> usize;
}

/// Bean 定义注册表
pub trait BeanDefinitionRegistry {
    fn register_bean_definition(&self, name: &str, definition: BeanDefinition) -> ContainerResult<()>;

    fn remove_bean_definition(&self, name: &str) -> ContainerResult<()>;

    /// 获取定义的副本
    fn get_bean_definition(&self, name: &str) -> ContainerResult<BeanDefinition>;

    fn modify_bean_definition<F>(&self, name: &str, modifier: F) -> ContainerResult<()>
    where
        F: FnOnce(&mut BeanDefinition);

    fn contains_bean_definition(&self, name: &str) -> bool;

    /// 名称是否已被定义或单例占用
    fn is_bean_name_in_use(&self, name: &str) -> bool;
}

/// 单例注册表
pub trait SingletonBeanRegistry {
    /// 手动注册一个已创建的单例
    fn register_singleton(&self, name: &str, instance: BeanInstance) -> ContainerResult<()>;

    fn get_singleton(&self, name: &str) -> Option<SharedBean>;

    fn contains_singleton(&self, name: &str) -> bool;

    /// 单例名称，按创建顺序
    fn get_singleton_names(&self) -> Vec<String>;

    fn get_singleton_count(&self) -> usize;
}

/// ConfigurableBeanFactory - 可配置的 Bean 工厂
pub trait ConfigurableBeanFactory: BeanFactory + SingletonBeanRegistry {
    /// 添加 BeanPostProcessor
    ///
    /// 同一实例已注册时先移除再追加，即重新注册会移到末尾
    fn add_bean_post_processor(&self, processor: PostProcessorHandle);

    fn get_bean_post_processors(&self) -> Vec<PostProcessorHandle>;

    fn get_bean_post_processor_count(&self) -> usize;

    fn add_embedded_value_resolver(&self, resolver: StringValueResolver);

    fn has_embedded_value_resolver(&self) -> bool;

    /// 依次应用所有嵌入值解析器
    fn resolve_embedded_value(&self, value: &str) -> ContainerResult<String>;

    fn set_conversion_service(&self, service: Arc<dyn ConversionService>);

    fn conversion_service(&self) -> Option<Arc<dyn ConversionService>>;

    fn set_dependency_comparator(&self, comparator: Option<DependencyComparator>);

    fn dependency_comparator(&self) -> Option<DependencyComparator>;

    /// 销毁所有单例，按创建的逆序；错误只记录日志
    fn destroy_singletons(&self);
}

/// ConfigurableListableBeanFactory - 可配置且可列举的 Bean 工厂
///
/// 这是 BeanFactoryPostProcessor 处理的对象
pub trait ConfigurableListableBeanFactory:
    ListableBeanFactory + ConfigurableBeanFactory + BeanDefinitionRegistry
{
    /// 预实例化所有非延迟单例，并回调 SmartInitializingSingleton
    fn pre_instantiate_singletons(&self) -> ContainerResult<()>;

    /// 冻结配置（不再允许修改 Bean 定义）
    fn freeze_configuration(&self);

    fn is_configuration_frozen(&self) -> bool;

    /// 清除合并定义缓存（已创建的单例除外）以及能力名称缓存
    fn clear_metadata_cache(&self);

    /// 校验 depends-on 关系（缺失或循环）
    fn validate_dependencies(&self) -> ContainerResult<()>;
}

/// 单例销毁信息：原始对象 + 销毁回调
struct DisposableBean {
    raw: SharedBean,
    callback: crate::bean::DestroyCallback,
}

/// DefaultListableBeanFactory - ConfigurableListableBeanFactory 的默认实现
pub struct DefaultListableBeanFactory {
    /// Bean 定义存储
    definitions: RwLock<HashMap<String, BeanDefinition>>,

    /// 定义名称，按注册顺序
    definition_names: RwLock<Vec<String>>,

    /// 合并定义缓存
    merged_definitions: RwLock<HashMap<String, BeanDefinition>>,

    /// 单例缓存
    singletons: RwLock<HashMap<String, BeanInstance>>,

    /// 单例创建顺序，销毁时逆序
    singleton_order: RwLock<Vec<String>>,

    /// 没有对应定义的手动注册单例
    manual_singleton_names: RwLock<Vec<String>>,

    disposable_beans: RwLock<HashMap<String, DisposableBean>>,

    /// bean -> 依赖它的 bean
    dependent_beans: RwLock<HashMap<String, HashSet<String>>>,

    /// 单例创建互斥（可重入，允许创建过程中递归获取依赖）
    singleton_lock: ReentrantMutex<()>,

    /// 循环依赖检测
    creation_tracker: CreationTracker,

    bean_post_processors: RwLock<Vec<PostProcessorHandle>>,

    embedded_value_resolvers: RwLock<Vec<StringValueResolver>>,

    conversion_service: RwLock<Option<Arc<dyn ConversionService>>>,

    dependency_comparator: RwLock<Option<DependencyComparator>>,

    temp_class_loader: AtomicBool,

    /// 配置是否已冻结
    configuration_frozen: AtomicBool,

    allow_bean_definition_overriding: AtomicBool,

    singletons_in_destruction: AtomicBool,

    names_by_capability: Arc<MemoCache<(Capability, bool), Vec<String>>>,

    application_context: RwLock<Weak<ApplicationContext>>,
}

impl DefaultListableBeanFactory {
    /// 创建新的 Bean 工厂
    pub fn new() -> Self {
        Self {
            definitions: RwLock::new(HashMap::new()),
            definition_names: RwLock::new(Vec::new()),
            merged_definitions: RwLock::new(HashMap::new()),
            singletons: RwLock::new(HashMap::new()),
            singleton_order: RwLock::new(Vec::new()),
            manual_singleton_names: RwLock::new(Vec::new()),
            disposable_beans: RwLock::new(HashMap::new()),
            dependent_beans: RwLock::new(HashMap::new()),
            singleton_lock: ReentrantMutex::new(()),
            creation_tracker: CreationTracker::new(),
            bean_post_processors: RwLock::new(Vec::new()),
            embedded_value_resolvers: RwLock::new(Vec::new()),
            conversion_service: RwLock::new(None),
            dependency_comparator: RwLock::new(None),
            temp_class_loader: AtomicBool::new(false),
            configuration_frozen: AtomicBool::new(false),
            allow_bean_definition_overriding: AtomicBool::new(false),
            singletons_in_destruction: AtomicBool::new(false),
            names_by_capability: Arc::new(MemoCache::new("beanNamesByCapability")),
            application_context: RwLock::new(Weak::new()),
        }
    }

    pub fn set_allow_bean_definition_overriding(&self, allow: bool) {
        self.allow_bean_definition_overriding.store(allow, Ordering::SeqCst);
    }

    pub fn is_allow_bean_definition_overriding(&self) -> bool {
        self.allow_bean_definition_overriding.load(Ordering::SeqCst)
    }

    /// 安装应用上下文提供者，工厂函数通过 `BeanCreationContext` 访问
    pub fn set_application_context(&self, context: Weak<ApplicationContext>) {
        *self.application_context.write() = context;
    }

    pub fn application_context(&self) -> Option<Arc<ApplicationContext>> {
        self.application_context.read().upgrade()
    }

    /// 能力名称缓存，供上下文注册到 `CacheRegistry`
    pub fn metadata_cache(&self) -> Arc<dyn InvalidatableCache> {
        self.names_by_capability.clone()
    }

    pub fn set_temp_class_loader(&self, enabled: bool) {
        self.temp_class_loader.store(enabled, Ordering::SeqCst);
    }

    pub fn has_temp_class_loader(&self) -> bool {
        self.temp_class_loader.load(Ordering::SeqCst)
    }

    /// 获取 Bean 实例及其能力
    pub fn get_bean_instance(&self, name: &str) -> ContainerResult<BeanInstance> {
        tracing::trace!("Requesting bean: '{}'", name);

        let cached = self.singletons.read().get(name).cloned();
        if let Some(instance) = cached {
            return Ok(instance);
        }

        let definition = self.get_merged_bean_definition(name)?;

        for dep in &definition.dependencies {
            if self.is_dependent(name, dep) {
                return Err(ContainerError::CircularDependency(format!(
                    "Circular depends-on relationship between '{}' and '{}'",
                    name, dep
                )));
            }
            self.register_dependent_bean(dep, name);
            self.get_bean_instance(dep).map_err(|e| match e {
                ContainerError::CircularDependency(_) => e,
                other => ContainerError::BeanCreationFailed(format!(
                    "'{}' depends on '{}': {}",
                    name, dep, other
                )),
            })?;
        }

        match definition.scope {
            Scope::Singleton => self.get_or_create_singleton(name, definition),
            Scope::Prototype => {
                tracing::debug!("Creating new instance of prototype bean '{}'", name);
                self.create_bean(name, definition)
            }
        }
    }

    /// 不实例化 Bean，读取其声明的能力
    pub fn get_bean_capabilities(&self, name: &str) -> Option<Capabilities> {
        let from_definition = self.definitions.read().get(name).map(|d| d.capabilities().clone());
        from_definition.or_else(|| self.singletons.read().get(name).map(|i| i.capabilities.clone()))
    }

    /// Bean 的角色；手动注册的单例视为基础设施
    pub fn get_bean_role(&self, name: &str) -> BeanRole {
        self.definitions
            .read()
            .get(name)
            .map(|d| d.role)
            .unwrap_or(BeanRole::Infrastructure)
    }

    /// 合并后的定义，结果被缓存直到 `clear_metadata_cache`
    pub fn get_merged_bean_definition(&self, name: &str) -> ContainerResult<BeanDefinition> {
        let cached = self.merged_definitions.read().get(name).cloned();
        if let Some(definition) = cached {
            return Ok(definition);
        }

        let definition = self
            .definitions
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ContainerError::BeanNotFound(name.to_string()))?;
        self.merged_definitions
            .write()
            .insert(name.to_string(), definition.clone());
        Ok(definition)
    }

    fn view<V: ?Sized>(
        &self,
        name: &str,
        capability: Capability,
        select: impl FnOnce(&Capabilities, &SharedBean) -> Option<Arc<V>>,
    ) -> ContainerResult<Arc<V>> {
        let instance = self.get_bean_instance(name)?;
        select(&instance.capabilities, &instance.object).ok_or_else(|| ContainerError::MissingCapability {
            bean: name.to_string(),
            capability: capability.to_string(),
        })
    }

    pub fn get_bean_post_processor(&self, name: &str) -> ContainerResult<Arc<dyn BeanPostProcessor>> {
        self.view(name, Capability::BeanPostProcessor, Capabilities::bean_post_processor)
    }

    pub fn get_factory_post_processor(&self, name: &str) -> ContainerResult<Arc<dyn BeanFactoryPostProcessor>> {
        self.view(name, Capability::BeanFactoryPostProcessor, Capabilities::factory_post_processor)
    }

    pub fn get_registry_post_processor(
        &self,
        name: &str,
    ) -> ContainerResult<Arc<dyn BeanDefinitionRegistryPostProcessor>> {
        self.view(
            name,
            Capability::BeanDefinitionRegistryPostProcessor,
            Capabilities::registry_post_processor,
        )
    }

    pub fn get_application_listener(&self, name: &str) -> ContainerResult<Arc<dyn ApplicationListener>> {
        self.view(name, Capability::ApplicationListener, Capabilities::listener)
    }

    pub fn get_lifecycle(&self, name: &str) -> ContainerResult<Arc<dyn Lifecycle>> {
        self.view(name, Capability::Lifecycle, Capabilities::lifecycle)
    }

    pub fn get_message_source(&self, name: &str) -> ContainerResult<Arc<dyn MessageSource>> {
        self.view(name, Capability::MessageSource, Capabilities::message_source)
    }

    /// 层级消息源视图；Bean 没有声明层级能力时返回 `None`
    pub fn get_hierarchical_message_source(
        &self,
        name: &str,
    ) -> ContainerResult<Option<Arc<dyn HierarchicalMessageSource>>> {
        let instance = self.get_bean_instance(name)?;
        Ok(instance.capabilities.hierarchical_message_source(&instance.object))
    }

    pub fn get_event_multicaster(&self, name: &str) -> ContainerResult<Arc<dyn ApplicationEventMulticaster>> {
        self.view(name, Capability::EventMulticaster, Capabilities::event_multicaster)
    }

    pub fn get_lifecycle_processor(&self, name: &str) -> ContainerResult<Arc<dyn LifecycleProcessor>> {
        self.view(name, Capability::LifecycleProcessor, Capabilities::lifecycle_processor)
    }

    pub fn get_conversion_service_bean(&self, name: &str) -> ContainerResult<Arc<dyn ConversionService>> {
        self.view(name, Capability::ConversionService, Capabilities::conversion_service)
    }

    fn get_or_create_singleton(&self, name: &str, definition: BeanDefinition) -> ContainerResult<BeanInstance> {
        let _lock = self.singleton_lock.lock();

        let cached = self.singletons.read().get(name).cloned();
        if let Some(instance) = cached {
            return Ok(instance);
        }

        if self.singletons_in_destruction.load(Ordering::SeqCst) {
            return Err(ContainerError::illegal_state(format!(
                "Singleton bean creation not allowed while singletons of this factory are in destruction: '{}'",
                name
            )));
        }

        if !self.creation_tracker.start_creating(name) {
            return Err(ContainerError::CircularDependency(
                self.creation_tracker.describe_cycle(name),
            ));
        }

        // 使用 RAII 模式确保在任何情况下都会清理标记
        struct CreationGuard<'a> {
            tracker: &'a CreationTracker,
            name: &'a str,
        }

        impl Drop for CreationGuard<'_> {
            fn drop(&mut self) {
                self.tracker.finish_creating(self.name);
            }
        }

        let _guard = CreationGuard {
            tracker: &self.creation_tracker,
            name,
        };

        tracing::debug!("Creating shared instance of singleton bean '{}'", name);
        let destroy_callback = definition.destroy_callback().cloned();
        let (instance, raw) = self.create_bean_with_raw(name, definition)?;

        self.add_singleton(name, instance.clone());
        if let Some(callback) = destroy_callback {
            self.disposable_beans
                .write()
                .insert(name.to_string(), DisposableBean { raw, callback });
        }

        Ok(instance)
    }

    fn create_bean(&self, name: &str, definition: BeanDefinition) -> ContainerResult<BeanInstance> {
        self.create_bean_with_raw(name, definition).map(|(instance, _)| instance)
    }

    /// 创建 Bean 实例并调用生命周期回调
    ///
    /// 1. MergedBeanDefinitionPostProcessor（每个定义只处理一次）
    /// 2. 实例化（工厂函数，依赖通过 `BeanCreationContext` 获取）
    /// 3. BeanPostProcessor.post_process_before_initialization
    /// 4. init 回调（作用在原始对象上）
    /// 5. BeanPostProcessor.post_process_after_initialization
    fn create_bean_with_raw(
        &self,
        name: &str,
        mut definition: BeanDefinition,
    ) -> ContainerResult<(BeanInstance, SharedBean)> {
        if !definition.post_processed {
            self.apply_merged_bean_definition_post_processors(&mut definition, name)?;
            definition.post_processed = true;
            if self.definitions.read().contains_key(name) {
                self.merged_definitions
                    .write()
                    .insert(name.to_string(), definition.clone());
            }
        }

        let context = BeanCreationContext::new(name, &definition, self);
        let raw = definition.instantiate(&context).map_err(|e| match e {
            // 保留循环依赖错误，不要包装它
            ContainerError::CircularDependency(_) => e,
            _ => ContainerError::BeanCreationFailed(format!("{}: {}", name, e)),
        })?;

        let mut bean = self.apply_bean_post_processors_before_initialization(Arc::clone(&raw), name)?;

        if let Some(init_fn) = definition.init_callback() {
            init_fn(&raw).map_err(|e| {
                ContainerError::BeanCreationFailed(format!("{} init failed: {}", name, e))
            })?;
        }

        bean = self.apply_bean_post_processors_after_initialization(bean, name)?;

        let instance = BeanInstance::from_parts(bean, definition.type_name, definition.capabilities().clone());
        Ok((instance, raw))
    }

    fn apply_merged_bean_definition_post_processors(
        &self,
        definition: &mut BeanDefinition,
        name: &str,
    ) -> ContainerResult<()> {
        let processors = self.get_bean_post_processors();
        for processor in processors.iter().filter_map(PostProcessorHandle::as_merged) {
            processor.post_process_merged_bean_definition(definition, name)?;
        }
        Ok(())
    }

    /// 应用 BeanPostProcessor.post_process_before_initialization
    fn apply_bean_post_processors_before_initialization(
        &self,
        bean: SharedBean,
        bean_name: &str,
    ) -> ContainerResult<SharedBean> {
        let mut current_bean = bean;
        for processor in self.get_bean_post_processors() {
            current_bean = processor.before_initialization(current_bean, bean_name)?;
        }
        Ok(current_bean)
    }

    /// 应用 BeanPostProcessor.post_process_after_initialization
    fn apply_bean_post_processors_after_initialization(
        &self,
        bean: SharedBean,
        bean_name: &str,
    ) -> ContainerResult<SharedBean> {
        let mut current_bean = bean;
        for processor in self.get_bean_post_processors() {
            current_bean = processor.after_initialization(current_bean, bean_name)?;
        }
        Ok(current_bean)
    }

    fn add_singleton(&self, name: &str, instance: BeanInstance) {
        self.singletons.write().insert(name.to_string(), instance);
        let mut order = self.singleton_order.write();
        if !order.iter().any(|n| n == name) {
            order.push(name.to_string());
        }
    }

    fn register_dependent_bean(&self, bean: &str, dependent: &str) {
        self.dependent_beans
            .write()
            .entry(bean.to_string())
            .or_default()
            .insert(dependent.to_string());
    }

    /// `dependent` 是否（传递地）依赖于 `bean`
    fn is_dependent(&self, bean: &str, dependent: &str) -> bool {
        let graph = self.dependent_beans.read();
        let mut seen = HashSet::new();
        let mut pending = vec![bean.to_string()];
        while let Some(current) = pending.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(dependents) = graph.get(&current) {
                if dependents.contains(dependent) {
                    return true;
                }
                pending.extend(dependents.iter().cloned());
            }
        }
        false
    }

    /// 销毁单个单例，先销毁依赖它的 Bean
    fn destroy_singleton(&self, name: &str) {
        let dependents = self.dependent_beans.write().remove(name);
        for dependent in dependents.into_iter().flatten() {
            self.destroy_singleton(&dependent);
        }

        let removed = self.singletons.write().remove(name);
        self.singleton_order.write().retain(|n| n != name);
        self.manual_singleton_names.write().retain(|n| n != name);
        let disposable = self.disposable_beans.write().remove(name);

        let Some(instance) = removed else {
            return;
        };

        for processor in self.get_bean_post_processors() {
            if let Err(e) = processor.before_destruction(&instance.object, name) {
                tracing::warn!(
                    "Destruction callback of '{}' failed for bean '{}': {}",
                    processor.name(),
                    name,
                    e
                );
            }
        }

        if let Some(disposable) = disposable {
            match (disposable.callback)(&disposable.raw) {
                Ok(()) => tracing::debug!("Bean '{}' destroyed successfully", name),
                Err(e) => tracing::warn!("Failed to destroy bean '{}': {}", name, e),
            }
        }
    }

    /// 定义被移除或覆盖时清理相关状态
    fn reset_bean_definition(&self, name: &str) {
        self.merged_definitions.write().remove(name);
        self.destroy_singleton(name);
        for processor in self.get_bean_post_processors() {
            if let Some(merged) = processor.as_merged() {
                merged.reset_bean_definition(name);
            }
        }
        self.names_by_capability.invalidate();
    }

    fn check_not_frozen(&self, action: &str) -> ContainerResult<()> {
        if self.is_configuration_frozen() {
            return Err(ContainerError::ConfigurationFrozen(action.to_string()));
        }
        Ok(())
    }

    fn compute_names_for_capability(&self, capability: Capability, include_non_singletons: bool) -> Vec<String> {
        let mut names: Vec<String> = {
            let definitions = self.definitions.read();
            self.definition_names
                .read()
                .iter()
                .filter(|name| {
                    definitions.get(*name).is_some_and(|def| {
                        def.has_capability(capability) && (include_non_singletons || def.is_singleton())
                    })
                })
                .cloned()
                .collect()
        };

        let manual = self.manual_singleton_names.read().clone();
        let singletons = self.singletons.read();
        for name in manual {
            if singletons
                .get(&name)
                .is_some_and(|instance| instance.capabilities.has(capability))
            {
                names.push(name);
            }
        }
        names
    }
}

impl Default for DefaultListableBeanFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BeanFactory for DefaultListableBeanFactory {
    fn get_bean(&self, name: &str) -> ContainerResult<SharedBean> {
        self.get_bean_instance(name).map(|instance| instance.object)
    }

    fn contains_bean(&self, name: &str) -> bool {
        self.definitions.read().contains_key(name) || self.singletons.read().contains_key(name)
    }

    fn is_singleton(&self, name: &str) -> ContainerResult<bool> {
        if let Some(def) = self.definitions.read().get(name) {
            return Ok(def.is_singleton());
        }
        if self.singletons.read().contains_key(name) {
            return Ok(true);
        }
        Err(ContainerError::BeanNotFound(name.to_string()))
    }
}

impl BeanFactoryExt for DefaultListableBeanFactory {
    fn get_bean_typed<T: Any + Send + Sync>(&self, name: &str) -> ContainerResult<Arc<T>> {
        self.get_bean_instance(name)?.downcast::<T>()
    }

    fn get_bean_by_type<T: Any + Send + Sync>(&self) -> ContainerResult<Arc<T>> {
        let type_name = std::any::type_name::<T>();
        let names = self.get_bean_names_for_type(TypeId::of::<T>());

        match names.as_slice() {
            [] => Err(ContainerError::BeanNotFound(format!(
                "No bean found for type '{}'",
                type_name
            ))),
            [name] => self.get_bean_typed::<T>(name),
            _ => Err(ContainerError::BeanCreationFailed(format!(
                "Expected single matching bean of type '{}' but found {}: {}",
                type_name,
                names.len(),
                names.join(", ")
            ))),
        }
    }

    fn contains_bean_by_type<T: Any + Send + Sync>(&self) -> bool {
        !self.get_bean_names_for_type(TypeId::of::<T>()).is_empty()
    }
}

impl ListableBeanFactory for DefaultListableBeanFactory {
    fn get_bean_names(&self) -> Vec<String> {
        self.definition_names.read().clone()
    }

    fn get_bean_names_for_type(&self, type_id: TypeId) -> Vec<String> {
        let mut names: Vec<String> = {
            let definitions = self.definitions.read();
            self.definition_names
                .read()
                .iter()
                .filter(|name| definitions.get(*name).is_some_and(|def| def.type_id == type_id))
                .cloned()
                .collect()
        };

        let manual = self.manual_singleton_names.read().clone();
        let singletons = self.singletons.read();
        for name in manual {
            if singletons
                .get(&name)
                .is_some_and(|instance| (*instance.object).type_id() == type_id)
            {
                names.push(name);
            }
        }
        names
    }

    fn get_bean_names_for_capability(&self, capability: Capability, include_non_singletons: bool) -> Vec<String> {
        self.names_by_capability
            .get_or_insert_with((capability, include_non_singletons), || {
                self.compute_names_for_capability(capability, include_non_singletons)
            })
    }

    fn get_bean_definition_count(&self) -> usize {
        self.definitions.read().len()
    }
}

impl BeanDefinitionRegistry for DefaultListableBeanFactory {
    fn register_bean_definition(&self, name: &str, definition: BeanDefinition) -> ContainerResult<()> {
        self.check_not_frozen(&format!("register bean definition '{}'", name))?;

        tracing::trace!(
            "Registering bean definition: name='{}', type='{}', scope={}",
            name,
            definition.type_name,
            definition.scope
        );

        let existed = self.definitions.read().contains_key(name);
        if existed {
            if !self.is_allow_bean_definition_overriding() {
                tracing::warn!("Bean '{}' already exists, registration failed", name);
                return Err(ContainerError::BeanAlreadyExists(name.to_string()));
            }
            tracing::debug!("Overriding bean definition for bean '{}'", name);
            self.definitions.write().insert(name.to_string(), definition);
            self.reset_bean_definition(name);
            return Ok(());
        }

        self.definitions.write().insert(name.to_string(), definition);
        self.definition_names.write().push(name.to_string());
        self.manual_singleton_names.write().retain(|n| n != name);
        self.names_by_capability.invalidate();

        tracing::debug!("Bean definition registered successfully: '{}'", name);
        Ok(())
    }

    fn remove_bean_definition(&self, name: &str) -> ContainerResult<()> {
        self.check_not_frozen(&format!("remove bean definition '{}'", name))?;

        self.definitions
            .write()
            .remove(name)
            .ok_or_else(|| ContainerError::BeanNotFound(name.to_string()))?;
        self.definition_names.write().retain(|n| n != name);
        self.reset_bean_definition(name);

        tracing::debug!("Bean definition removed: '{}'", name);
        Ok(())
    }

    fn get_bean_definition(&self, name: &str) -> ContainerResult<BeanDefinition> {
        self.definitions
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ContainerError::BeanNotFound(name.to_string()))
    }

    fn modify_bean_definition<F>(&self, name: &str, modifier: F) -> ContainerResult<()>
    where
        F: FnOnce(&mut BeanDefinition),
    {
        self.check_not_frozen(&format!("modify bean definition '{}'", name))?;

        {
            let mut definitions = self.definitions.write();
            let definition = definitions
                .get_mut(name)
                .ok_or_else(|| ContainerError::BeanNotFound(name.to_string()))?;
            modifier(definition);
        }
        self.merged_definitions.write().remove(name);
        self.names_by_capability.invalidate();

        tracing::debug!("Bean definition '{}' modified successfully", name);
        Ok(())
    }

    fn contains_bean_definition(&self, name: &str) -> bool {
        self.definitions.read().contains_key(name)
    }

    fn is_bean_name_in_use(&self, name: &str) -> bool {
        self.contains_bean(name) || self.dependent_beans.read().contains_key(name)
    }
}

impl SingletonBeanRegistry for DefaultListableBeanFactory {
    fn register_singleton(&self, name: &str, instance: BeanInstance) -> ContainerResult<()> {
        if self.singletons.read().contains_key(name) {
            return Err(ContainerError::BeanAlreadyExists(name.to_string()));
        }

        tracing::debug!("Registering singleton '{}' of type '{}'", name, instance.type_name);
        self.add_singleton(name, instance);
        if !self.definitions.read().contains_key(name) {
            self.manual_singleton_names.write().push(name.to_string());
        }
        self.names_by_capability.invalidate();
        Ok(())
    }

    fn get_singleton(&self, name: &str) -> Option<SharedBean> {
        self.singletons.read().get(name).map(|i| Arc::clone(&i.object))
    }

    fn contains_singleton(&self, name: &str) -> bool {
        self.singletons.read().contains_key(name)
    }

    fn get_singleton_names(&self) -> Vec<String> {
        self.singleton_order.read().clone()
    }

    fn get_singleton_count(&self) -> usize {
        self.singletons.read().len()
    }
}

impl ConfigurableBeanFactory for DefaultListableBeanFactory {
    fn add_bean_post_processor(&self, processor: PostProcessorHandle) {
        let mut processors = self.bean_post_processors.write();
        let identity = processor.identity();
        processors.retain(|p| p.identity() != identity);
        tracing::trace!("Adding bean post processor '{}'", processor.name());
        processors.push(processor);
    }

    fn get_bean_post_processors(&self) -> Vec<PostProcessorHandle> {
        self.bean_post_processors.read().clone()
    }

    fn get_bean_post_processor_count(&self) -> usize {
        self.bean_post_processors.read().len()
    }

    fn add_embedded_value_resolver(&self, resolver: StringValueResolver) {
        self.embedded_value_resolvers.write().push(resolver);
    }

    fn has_embedded_value_resolver(&self) -> bool {
        !self.embedded_value_resolvers.read().is_empty()
    }

    fn resolve_embedded_value(&self, value: &str) -> ContainerResult<String> {
        let resolvers = self.embedded_value_resolvers.read().clone();
        let mut result = value.to_string();
        for resolver in resolvers {
            result = resolver(&result)?;
        }
        Ok(result)
    }

    fn set_conversion_service(&self, service: Arc<dyn ConversionService>) {
        *self.conversion_service.write() = Some(service);
    }

    fn conversion_service(&self) -> Option<Arc<dyn ConversionService>> {
        self.conversion_service.read().clone()
    }

    fn set_dependency_comparator(&self, comparator: Option<DependencyComparator>) {
        *self.dependency_comparator.write() = comparator;
    }

    fn dependency_comparator(&self) -> Option<DependencyComparator> {
        self.dependency_comparator.read().clone()
    }

    fn destroy_singletons(&self) {
        let names: Vec<String> = self.singleton_order.read().iter().rev().cloned().collect();
        if names.is_empty() {
            return;
        }

        tracing::debug!("Destroying {} singleton beans", names.len());
        self.singletons_in_destruction.store(true, Ordering::SeqCst);

        for name in names {
            self.destroy_singleton(&name);
        }

        self.singletons.write().clear();
        self.singleton_order.write().clear();
        self.manual_singleton_names.write().clear();
        self.disposable_beans.write().clear();
        self.dependent_beans.write().clear();
        self.names_by_capability.invalidate();

        self.singletons_in_destruction.store(false, Ordering::SeqCst);
        tracing::debug!("Singleton beans destruction completed");
    }
}

impl ConfigurableListableBeanFactory for DefaultListableBeanFactory {
    fn pre_instantiate_singletons(&self) -> ContainerResult<()> {
        let bean_names = self.get_bean_names();
        tracing::debug!("Pre-instantiating singletons in {} bean definitions", bean_names.len());

        for name in &bean_names {
            let definition = self.get_merged_bean_definition(name)?;
            if definition.is_singleton() && !definition.lazy {
                self.get_bean_instance(name)?;
            }
        }

        for name in &bean_names {
            let instance = self.singletons.read().get(name).cloned();
            let Some(instance) = instance else {
                continue;
            };
            if let Some(smart) = instance.capabilities.smart_initializing(&instance.object) {
                tracing::trace!("Invoking after_singletons_instantiated on '{}'", name);
                smart.after_singletons_instantiated()?;
            }
        }

        Ok(())
    }

    fn freeze_configuration(&self) {
        self.configuration_frozen.store(true, Ordering::SeqCst);
        tracing::debug!("Bean factory configuration frozen");
    }

    fn is_configuration_frozen(&self) -> bool {
        self.configuration_frozen.load(Ordering::SeqCst)
    }

    fn clear_metadata_cache(&self) {
        let created: HashSet<String> = self.singletons.read().keys().cloned().collect();
        self.merged_definitions
            .write()
            .retain(|name, _| created.contains(name));
        self.names_by_capability.invalidate();
    }

    fn validate_dependencies(&self) -> ContainerResult<()> {
        let graph: HashMap<String, Vec<String>> = self
            .definitions
            .read()
            .iter()
            .map(|(name, def)| (name.clone(), def.dependencies.clone()))
            .collect();
        let known: HashSet<String> = self.singletons.read().keys().cloned().collect();

        validate_dependency_graph(&graph, &known)
            .map_err(|e| ContainerError::DependencyValidationFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::DeclareCapabilities;
    use crate::lifecycle::SmartInitializingSingleton;
    use crate::post_processor::MergedBeanDefinitionPostProcessor;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Service {
        greeting: String,
    }

    struct Recording {
        label: &'static str,
        log: Log,
    }

    impl BeanPostProcessor for Recording {
        fn post_process_before_initialization(&self, bean: SharedBean, name: &str) -> ContainerResult<SharedBean> {
            self.log.lock().push(format!("{}:before:{}", self.label, name));
            Ok(bean)
        }

        fn post_process_after_initialization(&self, bean: SharedBean, name: &str) -> ContainerResult<SharedBean> {
            self.log.lock().push(format!("{}:after:{}", self.label, name));
            Ok(bean)
        }

        fn post_process_before_destruction(&self, _bean: &SharedBean, name: &str) -> ContainerResult<()> {
            self.log.lock().push(format!("{}:destroy:{}", self.label, name));
            Ok(())
        }
    }

    fn service_definition(log: &Log, name: &'static str) -> BeanDefinition {
        let init_log = Arc::clone(log);
        let destroy_log = Arc::clone(log);
        BeanDefinition::builder(|_| Ok(Service { greeting: "hi".into() }))
            .init(move |_| {
                init_log.lock().push(format!("init:{}", name));
                Ok(())
            })
            .destroy(move |_| {
                destroy_log.lock().push(format!("destroy:{}", name));
                Ok(())
            })
            .build()
    }

    #[test]
    fn test_definition_names_keep_registration_order() {
        let factory = DefaultListableBeanFactory::new();
        for name in ["c", "a", "b"] {
            factory
                .register_bean_definition(name, BeanDefinition::new(|_| Ok(0u8)))
                .unwrap();
        }
        assert_eq!(factory.get_bean_names(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_duplicate_definition_rejected_unless_overriding() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_definition("a", BeanDefinition::new(|_| Ok(1u8))).unwrap();
        assert!(matches!(
            factory.register_bean_definition("a", BeanDefinition::new(|_| Ok(2u8))),
            Err(ContainerError::BeanAlreadyExists(_))
        ));

        assert_eq!(*factory.get_bean_typed::<u8>("a").unwrap(), 1);
        factory.set_allow_bean_definition_overriding(true);
        factory.register_bean_definition("a", BeanDefinition::new(|_| Ok(2u8))).unwrap();
        assert_eq!(*factory.get_bean_typed::<u8>("a").unwrap(), 2);
        assert_eq!(factory.get_bean_names(), vec!["a"]);
    }

    #[test]
    fn test_frozen_configuration_rejects_changes() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_definition("a", BeanDefinition::new(|_| Ok(1u8))).unwrap();
        factory.freeze_configuration();

        assert!(matches!(
            factory.register_bean_definition("b", BeanDefinition::new(|_| Ok(1u8))),
            Err(ContainerError::ConfigurationFrozen(_))
        ));
        assert!(factory.modify_bean_definition("a", |d| d.lazy = true).is_err());
        assert!(factory.remove_bean_definition("a").is_err());

        // 单例注册不受冻结影响
        factory.register_singleton("late", BeanInstance::of(Arc::new(3u8))).unwrap();
    }

    #[test]
    fn test_singleton_and_prototype_scopes() {
        let factory = DefaultListableBeanFactory::new();
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        factory
            .register_bean_definition(
                "proto",
                BeanDefinition::new(move |_| Ok(counter.fetch_add(1, Ordering::SeqCst))).with_scope(Scope::Prototype),
            )
            .unwrap();
        factory
            .register_bean_definition("single", BeanDefinition::new(|_| Ok(String::from("x"))))
            .unwrap();

        let a = factory.get_bean_typed::<String>("single").unwrap();
        let b = factory.get_bean_typed::<String>("single").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        factory.get_bean("proto").unwrap();
        factory.get_bean("proto").unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert!(!factory.contains_singleton("proto"));
    }

    #[test]
    fn test_depends_on_creates_dependency_first() {
        let factory = DefaultListableBeanFactory::new();
        let log: Log = Arc::new(Mutex::new(Vec::new()));

        let l = Arc::clone(&log);
        factory
            .register_bean_definition(
                "app",
                BeanDefinition::builder(move |_| {
                    l.lock().push("app".into());
                    Ok(1u8)
                })
                .depends_on("db")
                .build(),
            )
            .unwrap();
        let l = Arc::clone(&log);
        factory
            .register_bean_definition(
                "db",
                BeanDefinition::new(move |_| {
                    l.lock().push("db".into());
                    Ok(2u8)
                }),
            )
            .unwrap();

        factory.get_bean("app").unwrap();
        assert_eq!(*log.lock(), vec!["db", "app"]);
        assert_eq!(factory.get_singleton_names(), vec!["db", "app"]);
    }

    #[test]
    fn test_circular_depends_on_detected() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition("a", BeanDefinition::builder(|_| Ok(1u8)).depends_on("b").build())
            .unwrap();
        factory
            .register_bean_definition("b", BeanDefinition::builder(|_| Ok(2u8)).depends_on("a").build())
            .unwrap();

        assert!(matches!(factory.get_bean("a"), Err(ContainerError::CircularDependency(_))));
        assert!(factory.validate_dependencies().is_err());
    }

    #[test]
    fn test_circular_reference_through_factory_functions() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(
                "a",
                BeanDefinition::new(|ctx| ctx.get_bean::<u16>("b").map(|b| *b as u32)),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "b",
                BeanDefinition::new(|ctx| ctx.get_bean::<u32>("a").map(|a| *a as u16)),
            )
            .unwrap();

        match factory.get_bean("a") {
            Err(ContainerError::CircularDependency(chain)) => assert_eq!(chain, "a -> b -> a"),
            other => panic!("expected circular dependency, got {:?}", other.map(|_| ())),
        }
        assert_eq!(factory.get_singleton_count(), 0);
    }

    #[test]
    fn test_post_processors_wrap_init_callback() {
        let factory = DefaultListableBeanFactory::new();
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        factory.add_bean_post_processor(PostProcessorHandle::Plain(Arc::new(Recording {
            label: "p",
            log: Arc::clone(&log),
        })));
        factory
            .register_bean_definition("svc", service_definition(&log, "svc"))
            .unwrap();

        let svc = factory.get_bean_typed::<Service>("svc").unwrap();
        assert_eq!(svc.greeting, "hi");
        assert_eq!(*log.lock(), vec!["p:before:svc", "init:svc", "p:after:svc"]);
    }

    #[test]
    fn test_re_adding_post_processor_moves_it_to_end() {
        let factory = DefaultListableBeanFactory::new();
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let first: Arc<dyn BeanPostProcessor> = Arc::new(Recording { label: "first", log: Arc::clone(&log) });
        let second: Arc<dyn BeanPostProcessor> = Arc::new(Recording { label: "second", log: Arc::clone(&log) });

        factory.add_bean_post_processor(PostProcessorHandle::Plain(Arc::clone(&first)));
        factory.add_bean_post_processor(PostProcessorHandle::Plain(Arc::clone(&second)));
        factory.add_bean_post_processor(PostProcessorHandle::Plain(Arc::clone(&first)));
        assert_eq!(factory.get_bean_post_processor_count(), 2);

        factory.register_bean_definition("x", BeanDefinition::new(|_| Ok(1u8))).unwrap();
        factory.get_bean("x").unwrap();
        assert_eq!(log.lock()[0], "second:before:x");
        assert_eq!(log.lock()[1], "first:before:x");
    }

    #[test]
    fn test_destroy_singletons_in_reverse_order() {
        let factory = DefaultListableBeanFactory::new();
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        factory.register_bean_definition("one", service_definition(&log, "one")).unwrap();
        factory.register_bean_definition("two", service_definition(&log, "two")).unwrap();
        factory
            .register_bean_definition(
                "broken",
                BeanDefinition::builder(|_| Ok(0u8))
                    .destroy(|_| Err(ContainerError::illegal_state("cannot close")))
                    .build(),
            )
            .unwrap();
        factory.pre_instantiate_singletons().unwrap();
        log.lock().clear();

        factory.destroy_singletons();

        assert_eq!(*log.lock(), vec!["destroy:two", "destroy:one"]);
        assert_eq!(factory.get_singleton_count(), 0);
        // 定义仍然存在，可以再次创建
        assert!(factory.get_bean("one").is_ok());
    }

    #[test]
    fn test_destruction_aware_post_processor_runs_before_destroy_callback() {
        let factory = DefaultListableBeanFactory::new();
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        factory.add_bean_post_processor(PostProcessorHandle::Plain(Arc::new(Recording {
            label: "p",
            log: Arc::clone(&log),
        })));
        factory.register_bean_definition("svc", service_definition(&log, "svc")).unwrap();
        factory.get_bean("svc").unwrap();
        log.lock().clear();

        factory.destroy_singletons();
        assert_eq!(*log.lock(), vec!["p:destroy:svc", "destroy:svc"]);
    }

    #[test]
    fn test_names_by_capability_without_instantiation() {
        let factory = DefaultListableBeanFactory::new();
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        factory
            .register_bean_definition(
                "processor",
                BeanDefinition::builder(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Recording { label: "r", log: Arc::new(Mutex::new(Vec::new())) })
                })
                .bean_post_processor()
                .build(),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "proto",
                BeanDefinition::builder(|_| Ok(Recording { label: "p", log: Arc::new(Mutex::new(Vec::new())) }))
                    .bean_post_processor()
                    .scope(Scope::Prototype)
                    .build(),
            )
            .unwrap();

        assert_eq!(
            factory.get_bean_names_for_capability(Capability::BeanPostProcessor, false),
            vec!["processor"]
        );
        assert_eq!(
            factory.get_bean_names_for_capability(Capability::BeanPostProcessor, true),
            vec!["processor", "proto"]
        );
        assert_eq!(created.load(Ordering::SeqCst), 0);

        factory
            .register_singleton(
                "manual",
                BeanInstance::builder(Arc::new(Recording { label: "m", log: Arc::new(Mutex::new(Vec::new())) }))
                    .bean_post_processor()
                    .build(),
            )
            .unwrap();
        assert_eq!(
            factory.get_bean_names_for_capability(Capability::BeanPostProcessor, false),
            vec!["processor", "manual"]
        );
    }

    #[test]
    fn test_missing_capability_view() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_definition("plain", BeanDefinition::new(|_| Ok(1u8))).unwrap();
        assert!(matches!(
            factory.get_lifecycle("plain"),
            Err(ContainerError::MissingCapability { .. })
        ));
    }

    struct Defaulter;

    impl BeanPostProcessor for Defaulter {}

    impl MergedBeanDefinitionPostProcessor for Defaulter {
        fn post_process_merged_bean_definition(
            &self,
            definition: &mut BeanDefinition,
            _bean_name: &str,
        ) -> ContainerResult<()> {
            definition.properties.entry("greeting".into()).or_insert_with(|| "${greeting:hello}".into());
            Ok(())
        }
    }

    #[test]
    fn test_merged_definition_hook_and_embedded_values() {
        let factory = DefaultListableBeanFactory::new();
        factory.add_bean_post_processor(PostProcessorHandle::Merged(Arc::new(Defaulter)));
        factory.add_embedded_value_resolver(Arc::new(|v: &str| Ok(v.replace("${greeting:hello}", "hello"))));
        factory
            .register_bean_definition(
                "svc",
                BeanDefinition::new(|ctx| Ok(Service { greeting: ctx.required_property("greeting")? })),
            )
            .unwrap();

        assert_eq!(factory.get_bean_typed::<Service>("svc").unwrap().greeting, "hello");
        assert!(factory.get_merged_bean_definition("svc").unwrap().post_processed);
        assert!(!factory.get_bean_definition("svc").unwrap().properties.contains_key("greeting"));
    }

    #[test]
    fn test_property_conversion() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(
                "port",
                BeanDefinition::builder(|ctx| Ok(ctx.property_as::<u16>("port")?.unwrap_or(80)))
                    .property("port", "8080")
                    .build(),
            )
            .unwrap();
        assert_eq!(*factory.get_bean_typed::<u16>("port").unwrap(), 8080);
    }

    struct Ready(Arc<AtomicBool>);

    impl SmartInitializingSingleton for Ready {
        fn after_singletons_instantiated(&self) -> ContainerResult<()> {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_pre_instantiate_skips_lazy_and_notifies_smart_singletons() {
        let factory = DefaultListableBeanFactory::new();
        let flag = Arc::new(AtomicBool::new(false));
        let f = Arc::clone(&flag);
        factory
            .register_bean_definition(
                "ready",
                BeanDefinition::builder(move |_| Ok(Ready(Arc::clone(&f))))
                    .smart_initializing_singleton()
                    .build(),
            )
            .unwrap();
        factory
            .register_bean_definition("lazy", BeanDefinition::new(|_| Ok(1u8)).with_lazy(true))
            .unwrap();

        factory.pre_instantiate_singletons().unwrap();
        assert!(flag.load(Ordering::SeqCst));
        assert!(!factory.contains_singleton("lazy"));
    }

    #[test]
    fn test_get_bean_by_type() {
        let factory = DefaultListableBeanFactory::new();
        assert!(factory.get_bean_by_type::<u8>().is_err());
        factory.register_bean_definition("a", BeanDefinition::new(|_| Ok(1u8))).unwrap();
        assert_eq!(*factory.get_bean_by_type::<u8>().unwrap(), 1);

        factory.register_singleton("b", BeanInstance::of(Arc::new(2u8))).unwrap();
        assert!(factory.contains_bean_by_type::<u8>());
        assert!(factory.get_bean_by_type::<u8>().is_err());
    }

    #[test]
    fn test_clear_metadata_cache_keeps_created_singletons() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_definition("a", BeanDefinition::new(|_| Ok(1u8))).unwrap();
        factory.register_bean_definition("b", BeanDefinition::new(|_| Ok(2u8)).with_lazy(true)).unwrap();
        factory.get_bean("a").unwrap();
        factory.get_merged_bean_definition("b").unwrap();

        factory.clear_metadata_cache();
        assert_eq!(factory.merged_definitions.read().len(), 1);
        assert!(factory.merged_definitions.read().contains_key("a"));
    }
}
