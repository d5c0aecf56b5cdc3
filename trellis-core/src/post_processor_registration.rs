//! 后置处理器注册委托
//!
//! 无状态函数，在 refresh 过程中被调用两次：
//!
//! 1. `invoke_bean_factory_post_processors`：调用工厂后置处理器，
//!    注册型处理器可能注册新的注册型处理器，因此按工作队列迭代到不动点；
//! 2. `register_bean_post_processors`：按层级发现并注册 Bean 后置处理器。
//!
//! 层级在定义上声明，发现阶段不需要实例化；排序键在实例化后一次性解析。
//! 回调中的错误一律不捕获，直接中断外层 refresh。

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::bean::{BeanDefinition, BeanRole, Capabilities, Capability, SharedBean};
use crate::bean_factory::{
    BeanDefinitionRegistry, ConfigurableBeanFactory, ConfigurableListableBeanFactory, DefaultListableBeanFactory,
    ListableBeanFactory,
};
use crate::context::ApplicationContext;
use crate::error::{ContainerError, ContainerResult};
use crate::ordering::{OrderComparator, OrderTier, Prioritized};
use crate::post_processor::{
    BeanDefinitionRegistryPostProcessor, BeanFactoryPostProcessor, BeanPostProcessor, FactoryPostProcessor,
    MergedBeanDefinitionPostProcessor, PostProcessorHandle,
};

fn declared_tier(factory: &DefaultListableBeanFactory, name: &str) -> OrderTier {
    factory
        .get_bean_capabilities(name)
        .map(|caps| caps.tier())
        .unwrap_or(OrderTier::Unordered)
}

/// 实例化并解析排序键
fn resolve<V: ?Sized>(
    factory: &DefaultListableBeanFactory,
    name: &str,
    capability: Capability,
    select: impl FnOnce(&Capabilities, &SharedBean) -> Option<Arc<V>>,
) -> ContainerResult<Prioritized<Arc<V>>> {
    let instance = factory.get_bean_instance(name)?;
    let key = instance.capabilities().order_key(instance.object());
    let view = select(instance.capabilities(), instance.object()).ok_or_else(|| ContainerError::MissingCapability {
        bean: name.to_string(),
        capability: capability.to_string(),
    })?;
    Ok(Prioritized::new(name, key, view))
}

fn sort_post_processors<T>(items: &mut [Prioritized<T>], factory: &DefaultListableBeanFactory) {
    if items.len() <= 1 {
        return;
    }
    let comparator = factory.dependency_comparator();
    OrderComparator::sort(items, comparator.as_ref());
}

fn resolve_registry_processor(
    factory: &DefaultListableBeanFactory,
    name: &str,
) -> ContainerResult<Prioritized<Arc<dyn BeanDefinitionRegistryPostProcessor>>> {
    resolve(
        factory,
        name,
        Capability::BeanDefinitionRegistryPostProcessor,
        Capabilities::registry_post_processor,
    )
}

fn invoke_registry_post_processors(
    processors: &[Prioritized<Arc<dyn BeanDefinitionRegistryPostProcessor>>],
    factory: &DefaultListableBeanFactory,
) -> ContainerResult<()> {
    for processor in processors {
        tracing::debug!("Invoking registry post processor '{}'", processor.bean_name);
        processor.value.post_process_bean_definition_registry(factory)?;
    }
    Ok(())
}

fn invoke_factory_post_processors(
    processors: &[Arc<dyn BeanFactoryPostProcessor>],
    factory: &DefaultListableBeanFactory,
) -> ContainerResult<()> {
    for processor in processors {
        tracing::debug!("Invoking bean factory post processor '{}'", processor.name());
        processor.post_process_bean_factory(factory)?;
    }
    Ok(())
}

/// 调用所有工厂后置处理器
///
/// 顺序：显式注册的注册型处理器 → 发现的注册型处理器（priority → ordered → 其余，
/// 其余部分迭代到不再出现新名称）→ 所有注册型处理器的 `post_process_bean_factory`
/// → 显式注册的普通处理器 → 发现的普通处理器（priority → ordered → 无序）
pub fn invoke_bean_factory_post_processors(
    factory: &DefaultListableBeanFactory,
    explicit: &[FactoryPostProcessor],
) -> ContainerResult<()> {
    let mut processed: HashSet<String> = HashSet::new();

    let mut regular: Vec<Arc<dyn BeanFactoryPostProcessor>> = Vec::new();
    let mut registry_processors: Vec<Arc<dyn BeanDefinitionRegistryPostProcessor>> = Vec::new();

    for processor in explicit {
        match processor {
            FactoryPostProcessor::Registry(registry) => {
                tracing::debug!("Invoking explicit registry post processor '{}'", registry.name());
                registry.post_process_bean_definition_registry(factory)?;
                registry_processors.push(Arc::clone(registry));
            }
            FactoryPostProcessor::Plain(plain) => regular.push(Arc::clone(plain)),
        }
    }

    // priority 与 ordered 两轮，每轮前重新查询名称；
    // PriorityOrdered 也是 Ordered，priority 轮中新注册的会进入 ordered 轮
    for tier in [OrderTier::PriorityOrdered, OrderTier::Ordered] {
        let mut current = Vec::new();
        for name in factory.get_bean_names_for_capability(Capability::BeanDefinitionRegistryPostProcessor, true) {
            if !processed.contains(&name) && declared_tier(factory, &name) <= tier {
                current.push(resolve_registry_processor(factory, &name)?);
                processed.insert(name);
            }
        }
        sort_post_processors(&mut current, factory);
        invoke_registry_post_processors(&current, factory)?;
        registry_processors.extend(current.into_iter().map(|p| p.value));
    }

    // 其余注册型处理器：工作队列，直到不再出现新名称
    let mut pending = pending_registry_names(factory, &processed);
    while !pending.is_empty() {
        let mut current = Vec::with_capacity(pending.len());
        for name in pending {
            current.push(resolve_registry_processor(factory, &name)?);
            processed.insert(name);
        }
        sort_post_processors(&mut current, factory);
        invoke_registry_post_processors(&current, factory)?;
        registry_processors.extend(current.into_iter().map(|p| p.value));

        pending = pending_registry_names(factory, &processed);
    }

    let registry_as_factory: Vec<Arc<dyn BeanFactoryPostProcessor>> = registry_processors
        .iter()
        .map(|p| Arc::clone(p) as Arc<dyn BeanFactoryPostProcessor>)
        .collect();
    invoke_factory_post_processors(&registry_as_factory, factory)?;
    invoke_factory_post_processors(&regular, factory)?;

    // 普通工厂后置处理器：priority 立即实例化，其余在轮到时才实例化
    let mut priority = Vec::new();
    let mut ordered_names = Vec::new();
    let mut plain_names = Vec::new();
    for name in factory.get_bean_names_for_capability(Capability::BeanFactoryPostProcessor, true) {
        if processed.contains(&name) {
            continue;
        }
        match declared_tier(factory, &name) {
            OrderTier::PriorityOrdered => priority.push(resolve(
                factory,
                &name,
                Capability::BeanFactoryPostProcessor,
                Capabilities::factory_post_processor,
            )?),
            OrderTier::Ordered => ordered_names.push(name),
            OrderTier::Unordered => plain_names.push(name),
        }
    }

    sort_post_processors(&mut priority, factory);
    invoke_factory_post_processors(&values(priority), factory)?;

    let mut ordered = Vec::with_capacity(ordered_names.len());
    for name in &ordered_names {
        ordered.push(resolve(
            factory,
            name,
            Capability::BeanFactoryPostProcessor,
            Capabilities::factory_post_processor,
        )?);
    }
    sort_post_processors(&mut ordered, factory);
    invoke_factory_post_processors(&values(ordered), factory)?;

    let mut plain = Vec::with_capacity(plain_names.len());
    for name in &plain_names {
        plain.push(factory.get_factory_post_processor(name)?);
    }
    invoke_factory_post_processors(&plain, factory)?;

    // 后置处理器可能修改了定义（例如占位符解析）
    factory.clear_metadata_cache();
    Ok(())
}

fn pending_registry_names(factory: &DefaultListableBeanFactory, processed: &HashSet<String>) -> Vec<String> {
    factory
        .get_bean_names_for_capability(Capability::BeanDefinitionRegistryPostProcessor, true)
        .into_iter()
        .filter(|name| !processed.contains(name))
        .collect()
}

fn values<T>(items: Vec<Prioritized<T>>) -> Vec<T> {
    items.into_iter().map(|p| p.value).collect()
}

fn resolve_bean_post_processor(
    factory: &DefaultListableBeanFactory,
    name: &str,
) -> ContainerResult<Prioritized<PostProcessorHandle>> {
    let instance = factory.get_bean_instance(name)?;
    let key = instance.capabilities().order_key(instance.object());
    let handle = match instance.capabilities().merged_definition_post_processor(instance.object()) {
        Some(merged) => PostProcessorHandle::Merged(merged),
        None => instance
            .capabilities()
            .bean_post_processor(instance.object())
            .map(PostProcessorHandle::Plain)
            .ok_or_else(|| ContainerError::MissingCapability {
                bean: name.to_string(),
                capability: Capability::BeanPostProcessor.to_string(),
            })?,
    };
    Ok(Prioritized::new(name, key, handle))
}

/// 发现并注册 Bean 后置处理器
///
/// 注册顺序：checker → priority（排序）→ ordered（排序）→ 无序（保持发现顺序）
/// → 合并定义处理器（跨层级收集，排序后重新注册）→ `listener_detector`
pub fn register_bean_post_processors(
    factory: &Arc<DefaultListableBeanFactory>,
    listener_detector: &PostProcessorHandle,
) -> ContainerResult<()> {
    let names = factory.get_bean_names_for_capability(Capability::BeanPostProcessor, true);

    // checker 自己也算一个
    let target_count = factory.get_bean_post_processor_count() + 1 + names.len();
    factory.add_bean_post_processor(PostProcessorHandle::Plain(Arc::new(BeanPostProcessorChecker::new(
        factory,
        target_count,
    ))));

    let mut priority = Vec::new();
    let mut internal = Vec::new();
    let mut ordered_names = Vec::new();
    let mut plain_names = Vec::new();
    for name in names {
        match declared_tier(factory, &name) {
            OrderTier::PriorityOrdered => {
                let processor = resolve_bean_post_processor(factory, &name)?;
                if processor.value.is_merged() {
                    internal.push(processor.clone());
                }
                priority.push(processor);
            }
            OrderTier::Ordered => ordered_names.push(name),
            OrderTier::Unordered => plain_names.push(name),
        }
    }

    sort_post_processors(&mut priority, factory);
    register_handles(factory, &priority);

    let mut ordered = Vec::with_capacity(ordered_names.len());
    for name in &ordered_names {
        let processor = resolve_bean_post_processor(factory, name)?;
        if processor.value.is_merged() {
            internal.push(processor.clone());
        }
        ordered.push(processor);
    }
    sort_post_processors(&mut ordered, factory);
    register_handles(factory, &ordered);

    let mut plain = Vec::with_capacity(plain_names.len());
    for name in &plain_names {
        let processor = resolve_bean_post_processor(factory, name)?;
        if processor.value.is_merged() {
            internal.push(processor.clone());
        }
        plain.push(processor);
    }
    register_handles(factory, &plain);

    sort_post_processors(&mut internal, factory);
    register_handles(factory, &internal);

    // 最后重新注册，保证它看到的是被其他处理器包装后的最终对象
    factory.add_bean_post_processor(listener_detector.clone());

    tracing::debug!(
        "Registered {} bean post processors",
        factory.get_bean_post_processor_count()
    );
    Ok(())
}

fn register_handles(factory: &DefaultListableBeanFactory, processors: &[Prioritized<PostProcessorHandle>]) {
    for processor in processors {
        factory.add_bean_post_processor(processor.value.clone());
    }
}

/// 检测在 BeanPostProcessor 注册过程中就被创建的 Bean
///
/// 这些 Bean 无法被所有后置处理器处理，只记录日志，不会失败
pub struct BeanPostProcessorChecker {
    bean_factory: Weak<DefaultListableBeanFactory>,
    target_count: usize,
    flagged: Mutex<Vec<String>>,
}

impl BeanPostProcessorChecker {
    pub fn new(bean_factory: &Arc<DefaultListableBeanFactory>, target_count: usize) -> Self {
        Self {
            bean_factory: Arc::downgrade(bean_factory),
            target_count,
            flagged: Mutex::new(Vec::new()),
        }
    }

    /// 被判定为"过早创建"的 Bean 名称
    pub fn flagged_beans(&self) -> Vec<String> {
        self.flagged.lock().clone()
    }
}

impl BeanPostProcessor for BeanPostProcessorChecker {
    fn post_process_after_initialization(&self, bean: SharedBean, bean_name: &str) -> ContainerResult<SharedBean> {
        let Some(factory) = self.bean_factory.upgrade() else {
            return Ok(bean);
        };

        let is_post_processor = factory
            .get_bean_capabilities(bean_name)
            .is_some_and(|caps| caps.has(Capability::BeanPostProcessor));
        let is_infrastructure = factory.contains_bean_definition(bean_name)
            && factory.get_bean_role(bean_name) == BeanRole::Infrastructure;

        if !is_post_processor && !is_infrastructure && factory.get_bean_post_processor_count() < self.target_count {
            tracing::info!(
                "Bean '{}' is not eligible for getting processed by all BeanPostProcessors \
                 (for example: not eligible for auto-proxying)",
                bean_name
            );
            self.flagged.lock().push(bean_name.to_string());
        }
        Ok(bean)
    }

    fn name(&self) -> &str {
        "BeanPostProcessorChecker"
    }
}

/// 把单例监听器 Bean 登记到上下文
///
/// 记录哪些定义是单例监听器；初始化完成后把最终对象的监听器视图加入上下文，
/// 销毁前再移除
pub struct ApplicationListenerDetector {
    context: Weak<ApplicationContext>,
    singleton_names: RwLock<HashMap<String, bool>>,
}

impl ApplicationListenerDetector {
    pub fn new(context: Weak<ApplicationContext>) -> Self {
        Self {
            context,
            singleton_names: RwLock::new(HashMap::new()),
        }
    }

    fn listener_view(
        context: &ApplicationContext,
        bean: &SharedBean,
        bean_name: &str,
    ) -> Option<Arc<dyn crate::event::ApplicationListener>> {
        let factory = context.get_bean_factory().ok()?;
        factory.get_bean_capabilities(bean_name)?.listener(bean)
    }
}

impl BeanPostProcessor for ApplicationListenerDetector {
    fn post_process_after_initialization(&self, bean: SharedBean, bean_name: &str) -> ContainerResult<SharedBean> {
        let Some(context) = self.context.upgrade() else {
            return Ok(bean);
        };
        let Some(listener) = Self::listener_view(&context, &bean, bean_name) else {
            return Ok(bean);
        };

        let flag = self.singleton_names.read().get(bean_name).copied();
        match flag {
            Some(true) => {
                tracing::debug!("Registering singleton listener bean '{}'", bean_name);
                context.add_application_listener(listener);
            }
            Some(false) => {
                tracing::warn!(
                    "Listener bean '{}' is not a singleton and will not receive events; \
                     declare it with singleton scope to react to events",
                    bean_name
                );
                self.singleton_names.write().remove(bean_name);
            }
            None => {}
        }
        Ok(bean)
    }

    fn post_process_before_destruction(&self, bean: &SharedBean, bean_name: &str) -> ContainerResult<()> {
        let Some(context) = self.context.upgrade() else {
            return Ok(());
        };
        if let Some(listener) = Self::listener_view(&context, bean, bean_name) {
            context.remove_application_listener(&listener);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "ApplicationListenerDetector"
    }
}

impl MergedBeanDefinitionPostProcessor for ApplicationListenerDetector {
    fn post_process_merged_bean_definition(
        &self,
        definition: &mut BeanDefinition,
        bean_name: &str,
    ) -> ContainerResult<()> {
        if definition.has_capability(Capability::ApplicationListener) {
            self.singleton_names
                .write()
                .insert(bean_name.to_string(), definition.is_singleton());
        }
        Ok(())
    }

    fn reset_bean_definition(&self, bean_name: &str) {
        self.singleton_names.write().remove(bean_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::{BeanCreationContext, BeanInstance, DeclareCapabilities};
    use crate::bean_factory::{BeanFactory, SingletonBeanRegistry};
    use crate::ordering::{Ordered, PriorityOrdered};
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Log = Arc<Mutex<Vec<String>>>;

    fn new_log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    struct Processor {
        label: &'static str,
        order: i32,
        log: Log,
    }

    impl BeanPostProcessor for Processor {
        fn post_process_before_initialization(&self, bean: SharedBean, bean_name: &str) -> ContainerResult<SharedBean> {
            self.log.lock().push(format!("{}:{}", self.label, bean_name));
            Ok(bean)
        }

        fn name(&self) -> &str {
            self.label
        }
    }

    impl Ordered for Processor {
        fn order(&self) -> i32 {
            self.order
        }
    }

    impl PriorityOrdered for Processor {}

    impl BeanFactoryPostProcessor for Processor {
        fn post_process_bean_factory(&self, _factory: &DefaultListableBeanFactory) -> ContainerResult<()> {
            self.log.lock().push(format!("factory:{}", self.label));
            Ok(())
        }

        fn name(&self) -> &str {
            self.label
        }
    }

    struct Merged(&'static str);

    impl BeanPostProcessor for Merged {
        fn name(&self) -> &str {
            self.0
        }
    }

    impl MergedBeanDefinitionPostProcessor for Merged {
        fn post_process_merged_bean_definition(&self, _: &mut BeanDefinition, _: &str) -> ContainerResult<()> {
            Ok(())
        }
    }

    impl Ordered for Merged {
        fn order(&self) -> i32 {
            0
        }
    }

    struct Noop;

    impl BeanPostProcessor for Noop {
        fn name(&self) -> &str {
            "detector"
        }
    }

    fn detector() -> PostProcessorHandle {
        PostProcessorHandle::Plain(Arc::new(Noop))
    }

    fn processor(
        label: &'static str,
        order: i32,
        log: &Log,
    ) -> impl Fn(&BeanCreationContext<'_>) -> ContainerResult<Processor> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |_: &BeanCreationContext<'_>| Ok(Processor { label, order, log: Arc::clone(&log) })
    }

    fn registered_names(factory: &DefaultListableBeanFactory) -> Vec<String> {
        factory
            .get_bean_post_processors()
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    #[test]
    fn test_bean_post_processor_tier_ordering() {
        let factory = Arc::new(DefaultListableBeanFactory::new());
        let log = new_log();
        factory
            .register_bean_definition("p4", BeanDefinition::builder(processor("P4", 0, &log)).bean_post_processor().build())
            .unwrap();
        factory
            .register_bean_definition(
                "p2",
                BeanDefinition::builder(processor("P2", 5, &log)).bean_post_processor().ordered().build(),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "p1",
                BeanDefinition::builder(processor("P1", 100, &log))
                    .bean_post_processor()
                    .priority_ordered()
                    .build(),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "p3",
                BeanDefinition::builder(processor("P3", 1, &log)).bean_post_processor().ordered().build(),
            )
            .unwrap();

        register_bean_post_processors(&factory, &detector()).unwrap();

        assert_eq!(
            registered_names(&factory),
            vec!["BeanPostProcessorChecker", "P1", "P3", "P2", "P4", "detector"]
        );
    }

    #[test]
    fn test_priority_processor_runs_before_plain() {
        let factory = Arc::new(DefaultListableBeanFactory::new());
        let log = new_log();
        factory
            .register_bean_definition("plain", BeanDefinition::builder(processor("plain", 0, &log)).bean_post_processor().build())
            .unwrap();
        factory
            .register_bean_definition(
                "first",
                BeanDefinition::builder(processor("first", 1, &log))
                    .bean_post_processor()
                    .priority_ordered()
                    .build(),
            )
            .unwrap();
        register_bean_post_processors(&factory, &detector()).unwrap();

        factory.register_bean_definition("service", BeanDefinition::new(|_| Ok(1u8))).unwrap();
        log.lock().clear();
        factory.get_bean("service").unwrap();
        assert_eq!(*log.lock(), vec!["first:service", "plain:service"]);
    }

    #[test]
    fn test_merged_processors_reregistered_before_detector() {
        let factory = Arc::new(DefaultListableBeanFactory::new());
        let log = new_log();
        factory
            .register_bean_definition(
                "merged",
                BeanDefinition::builder(|_| Ok(Merged("merged")))
                    .merged_definition_post_processor()
                    .ordered()
                    .build(),
            )
            .unwrap();
        factory
            .register_bean_definition("plain", BeanDefinition::builder(processor("plain", 0, &log)).bean_post_processor().build())
            .unwrap();

        register_bean_post_processors(&factory, &detector()).unwrap();
        assert_eq!(
            registered_names(&factory),
            vec!["BeanPostProcessorChecker", "plain", "merged", "detector"]
        );
    }

    #[test]
    fn test_checker_direct() {
        let factory = Arc::new(DefaultListableBeanFactory::new());
        factory.register_bean_definition("early", BeanDefinition::new(|_| Ok(1u8))).unwrap();
        factory
            .register_bean_definition(
                "infra",
                BeanDefinition::new(|_| Ok(2u8)).with_role(BeanRole::Infrastructure),
            )
            .unwrap();
        let checker = BeanPostProcessorChecker::new(&factory, 5);

        checker.post_process_after_initialization(Arc::new(1u8), "early").unwrap();
        checker.post_process_after_initialization(Arc::new(2u8), "infra").unwrap();
        assert_eq!(checker.flagged_beans(), vec!["early"]);
    }

    struct Registrar {
        label: &'static str,
        register: Option<(&'static str, &'static str)>,
        log: Log,
    }

    impl BeanFactoryPostProcessor for Registrar {
        fn post_process_bean_factory(&self, _factory: &DefaultListableBeanFactory) -> ContainerResult<()> {
            self.log.lock().push(format!("factory:{}", self.label));
            Ok(())
        }
    }

    impl BeanDefinitionRegistryPostProcessor for Registrar {
        fn post_process_bean_definition_registry(&self, registry: &DefaultListableBeanFactory) -> ContainerResult<()> {
            self.log.lock().push(format!("registry:{}", self.label));
            if let Some((name, next_label)) = self.register {
                let log = Arc::clone(&self.log);
                let follow_up = match next_label {
                    "third" => None,
                    _ => Some(("third", "third")),
                };
                registry.register_bean_definition(
                    name,
                    BeanDefinition::builder(move |_| {
                        Ok(Registrar { label: next_label, register: follow_up, log: Arc::clone(&log) })
                    })
                    .registry_post_processor()
                    .build(),
                )?;
            }
            Ok(())
        }
    }

    #[test]
    fn test_registry_post_processors_reach_fixed_point() {
        let factory = DefaultListableBeanFactory::new();
        let log = new_log();
        let l = Arc::clone(&log);
        factory
            .register_bean_definition(
                "first",
                BeanDefinition::builder(move |_| {
                    Ok(Registrar { label: "first", register: Some(("second", "second")), log: Arc::clone(&l) })
                })
                .registry_post_processor()
                .build(),
            )
            .unwrap();

        invoke_bean_factory_post_processors(&factory, &[]).unwrap();

        assert_eq!(
            *log.lock(),
            vec![
                "registry:first",
                "registry:second",
                "registry:third",
                "factory:first",
                "factory:second",
                "factory:third",
            ]
        );
    }

    struct TieredRegistrar {
        label: &'static str,
        order: i32,
        registers_priority_follow_up: bool,
        log: Log,
    }

    impl BeanFactoryPostProcessor for TieredRegistrar {
        fn post_process_bean_factory(&self, _factory: &DefaultListableBeanFactory) -> ContainerResult<()> {
            Ok(())
        }
    }

    impl BeanDefinitionRegistryPostProcessor for TieredRegistrar {
        fn post_process_bean_definition_registry(&self, registry: &DefaultListableBeanFactory) -> ContainerResult<()> {
            self.log.lock().push(self.label.to_string());
            if self.registers_priority_follow_up {
                let log = Arc::clone(&self.log);
                registry.register_bean_definition(
                    "lateRegistrar",
                    BeanDefinition::builder(move |_| {
                        Ok(TieredRegistrar {
                            label: "late",
                            order: 50,
                            registers_priority_follow_up: false,
                            log: Arc::clone(&log),
                        })
                    })
                    .registry_post_processor()
                    .priority_ordered()
                    .build(),
                )?;
            }
            Ok(())
        }
    }

    impl Ordered for TieredRegistrar {
        fn order(&self) -> i32 {
            self.order
        }
    }

    impl PriorityOrdered for TieredRegistrar {}

    #[test]
    fn test_priority_registrar_added_late_runs_in_ordered_wave() {
        let factory = DefaultListableBeanFactory::new();
        let log = new_log();
        let l = Arc::clone(&log);
        factory
            .register_bean_definition(
                "earlyRegistrar",
                BeanDefinition::builder(move |_| {
                    Ok(TieredRegistrar { label: "early", order: 0, registers_priority_follow_up: true, log: Arc::clone(&l) })
                })
                .registry_post_processor()
                .priority_ordered()
                .build(),
            )
            .unwrap();
        let l = Arc::clone(&log);
        factory
            .register_bean_definition(
                "orderedRegistrar",
                BeanDefinition::builder(move |_| {
                    Ok(TieredRegistrar { label: "ordered", order: 1, registers_priority_follow_up: false, log: Arc::clone(&l) })
                })
                .registry_post_processor()
                .ordered()
                .build(),
            )
            .unwrap();

        invoke_bean_factory_post_processors(&factory, &[]).unwrap();

        // late 的 order 更大，但 priority 层级排在 ordered 之前
        assert_eq!(*log.lock(), vec!["early", "late", "ordered"]);
    }

    #[test]
    fn test_factory_post_processor_phases() {
        let factory = DefaultListableBeanFactory::new();
        let log = new_log();

        let explicit_registry: Arc<dyn BeanDefinitionRegistryPostProcessor> =
            Arc::new(Registrar { label: "explicit", register: None, log: Arc::clone(&log) });
        let explicit_plain: Arc<dyn BeanFactoryPostProcessor> =
            Arc::new(Processor { label: "explicitPlain", order: 0, log: Arc::clone(&log) });

        factory
            .register_bean_definition(
                "ordered",
                BeanDefinition::builder(processor("ordered", 1, &log)).factory_post_processor().ordered().build(),
            )
            .unwrap();
        factory
            .register_bean_definition("plain", BeanDefinition::builder(processor("plain", 0, &log)).factory_post_processor().build())
            .unwrap();
        factory
            .register_bean_definition(
                "priority",
                BeanDefinition::builder(processor("priority", 9, &log))
                    .factory_post_processor()
                    .priority_ordered()
                    .build(),
            )
            .unwrap();
        let l = Arc::clone(&log);
        factory
            .register_bean_definition(
                "discovered",
                BeanDefinition::builder(move |_| Ok(Registrar { label: "discovered", register: None, log: Arc::clone(&l) }))
                    .registry_post_processor()
                    .build(),
            )
            .unwrap();

        invoke_bean_factory_post_processors(&factory, &[explicit_plain.into(), explicit_registry.into()]).unwrap();

        assert_eq!(
            *log.lock(),
            vec![
                "registry:explicit",
                "registry:discovered",
                "factory:explicit",
                "factory:discovered",
                "factory:explicitPlain",
                "factory:priority",
                "factory:ordered",
                "factory:plain",
            ]
        );
    }

    #[test]
    fn test_lower_tiers_instantiated_lazily() {
        let factory = DefaultListableBeanFactory::new();
        let created = Arc::new(AtomicUsize::new(0));
        let seen_when_priority_ran = Arc::new(AtomicUsize::new(usize::MAX));

        struct Probe {
            created: Arc<AtomicUsize>,
            seen: Arc<AtomicUsize>,
        }

        impl BeanFactoryPostProcessor for Probe {
            fn post_process_bean_factory(&self, _: &DefaultListableBeanFactory) -> ContainerResult<()> {
                self.seen.store(self.created.load(Ordering::SeqCst), Ordering::SeqCst);
                Ok(())
            }
        }

        impl Ordered for Probe {
            fn order(&self) -> i32 {
                0
            }
        }

        impl PriorityOrdered for Probe {}

        struct Counted;

        impl BeanFactoryPostProcessor for Counted {
            fn post_process_bean_factory(&self, _: &DefaultListableBeanFactory) -> ContainerResult<()> {
                Ok(())
            }
        }

        let c = Arc::clone(&created);
        factory
            .register_bean_definition(
                "counted",
                BeanDefinition::builder(move |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(Counted)
                })
                .factory_post_processor()
                .build(),
            )
            .unwrap();
        let (c, s) = (Arc::clone(&created), Arc::clone(&seen_when_priority_ran));
        factory
            .register_bean_definition(
                "probe",
                BeanDefinition::builder(move |_| Ok(Probe { created: Arc::clone(&c), seen: Arc::clone(&s) }))
                    .factory_post_processor()
                    .priority_ordered()
                    .build(),
            )
            .unwrap();

        invoke_bean_factory_post_processors(&factory, &[]).unwrap();
        assert_eq!(seen_when_priority_ran.load(Ordering::SeqCst), 0);
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_propagates_unchanged() {
        struct Failing;

        impl BeanFactoryPostProcessor for Failing {
            fn post_process_bean_factory(&self, _: &DefaultListableBeanFactory) -> ContainerResult<()> {
                Err(ContainerError::Configuration("bad placeholder".into()))
            }
        }

        let factory = DefaultListableBeanFactory::new();
        factory
            .register_singleton(
                "failing",
                BeanInstance::builder(Arc::new(Failing)).factory_post_processor().build(),
            )
            .unwrap();

        assert!(matches!(
            invoke_bean_factory_post_processors(&factory, &[]),
            Err(ContainerError::Configuration(_))
        ));
    }
}
