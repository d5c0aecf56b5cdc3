//! 后置处理器 - BeanFactory 与 Bean 实例的扩展钩子
//!
//! 两个家族：
//! - `BeanFactoryPostProcessor`：在 Bean 定义加载完成、任何普通 Bean 实例化之前修改定义；
//!   其子能力 `BeanDefinitionRegistryPostProcessor` 还可以注册新的定义。
//! - `BeanPostProcessor`：在每个 Bean 初始化前后处理实例；
//!   其子能力 `MergedBeanDefinitionPostProcessor` 可以在实例化前调整合并后的定义。

use std::any::Any;
use std::sync::Arc;

use crate::bean::BeanDefinition;
use crate::bean_factory::DefaultListableBeanFactory;
use crate::error::ContainerResult;

/// BeanPostProcessor trait
///
/// 在 Bean 初始化的不同阶段提供钩子，允许自定义修改或包装 Bean 实例
///
/// # 示例
///
/// ```ignore
/// use trellis_core::prelude::*;
///
/// struct LoggingBeanPostProcessor;
///
/// impl BeanPostProcessor for LoggingBeanPostProcessor {
///     fn post_process_before_initialization(
///         &self,
///         bean: Arc<dyn Any + Send + Sync>,
///         bean_name: &str,
///     ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
///         tracing::info!("Before initialization: {}", bean_name);
///         Ok(bean)
///     }
/// }
/// ```
pub trait BeanPostProcessor: Send + Sync {
    /// 在 Bean 初始化回调（init）之前调用
    ///
    /// 返回处理后的 Bean 实例（可以是原始 Bean，也可以是包装后的 Bean）
    fn post_process_before_initialization(
        &self,
        bean: Arc<dyn Any + Send + Sync>,
        _bean_name: &str,
    ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
        Ok(bean)
    }

    /// 在 Bean 初始化回调（init）之后调用
    ///
    /// 典型用途：创建代理、包装 Bean、登记监听器
    fn post_process_after_initialization(
        &self,
        bean: Arc<dyn Any + Send + Sync>,
        _bean_name: &str,
    ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
        Ok(bean)
    }

    /// Bean 销毁之前调用（单例销毁阶段），错误只记录日志
    fn post_process_before_destruction(
        &self,
        _bean: &Arc<dyn Any + Send + Sync>,
        _bean_name: &str,
    ) -> ContainerResult<()> {
        Ok(())
    }

    /// 获取处理器的名称（用于日志和调试）
    fn name(&self) -> &str {
        "BeanPostProcessor"
    }
}

/// 合并定义后置处理器
///
/// 在实例化之前对合并后的 Bean 定义进行调整，结果缓存在 BeanFactory 中，
/// 直到下一次 `clear_metadata_cache`
pub trait MergedBeanDefinitionPostProcessor: BeanPostProcessor {
    fn post_process_merged_bean_definition(
        &self,
        definition: &mut BeanDefinition,
        bean_name: &str,
    ) -> ContainerResult<()>;

    /// 定义被重置（移除或覆盖）时的通知
    fn reset_bean_definition(&self, _bean_name: &str) {}
}

/// 注册到 BeanFactory 的后置处理器句柄
///
/// 同一个实例重复注册时按指针去重，重新注册会把它移到末尾
#[derive(Clone)]
pub enum PostProcessorHandle {
    Plain(Arc<dyn BeanPostProcessor>),
    Merged(Arc<dyn MergedBeanDefinitionPostProcessor>),
}

impl PostProcessorHandle {
    /// 实例身份（数据指针）
    pub fn identity(&self) -> *const () {
        match self {
            PostProcessorHandle::Plain(p) => Arc::as_ptr(p) as *const (),
            PostProcessorHandle::Merged(p) => Arc::as_ptr(p) as *const (),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PostProcessorHandle::Plain(p) => p.name(),
            PostProcessorHandle::Merged(p) => p.name(),
        }
    }

    pub fn is_merged(&self) -> bool {
        matches!(self, PostProcessorHandle::Merged(_))
    }

    pub fn as_merged(&self) -> Option<&Arc<dyn MergedBeanDefinitionPostProcessor>> {
        match self {
            PostProcessorHandle::Merged(p) => Some(p),
            PostProcessorHandle::Plain(_) => None,
        }
    }

    pub fn before_initialization(
        &self,
        bean: Arc<dyn Any + Send + Sync>,
        bean_name: &str,
    ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
        match self {
            PostProcessorHandle::Plain(p) => p.post_process_before_initialization(bean, bean_name),
            PostProcessorHandle::Merged(p) => p.post_process_before_initialization(bean, bean_name),
        }
    }

    pub fn after_initialization(
        &self,
        bean: Arc<dyn Any + Send + Sync>,
        bean_name: &str,
    ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
        match self {
            PostProcessorHandle::Plain(p) => p.post_process_after_initialization(bean, bean_name),
            PostProcessorHandle::Merged(p) => p.post_process_after_initialization(bean, bean_name),
        }
    }

    pub fn before_destruction(
        &self,
        bean: &Arc<dyn Any + Send + Sync>,
        bean_name: &str,
    ) -> ContainerResult<()> {
        match self {
            PostProcessorHandle::Plain(p) => p.post_process_before_destruction(bean, bean_name),
            PostProcessorHandle::Merged(p) => p.post_process_before_destruction(bean, bean_name),
        }
    }
}

/// BeanFactoryPostProcessor trait
///
/// 在 Bean 定义加载后、普通 Bean 实例化之前执行，可以修改 Bean 定义
///
/// 使用场景：
/// - 修改 Bean 的作用域或延迟加载属性
/// - 配置占位符解析
pub trait BeanFactoryPostProcessor: Send + Sync {
    fn post_process_bean_factory(&self, bean_factory: &DefaultListableBeanFactory) -> ContainerResult<()>;

    fn name(&self) -> &str {
        "BeanFactoryPostProcessor"
    }
}

/// 可注册新定义的 BeanFactoryPostProcessor
///
/// `post_process_bean_definition_registry` 在所有普通工厂后置处理器之前执行，
/// 新注册的定义（包括新的注册型处理器）会在同一轮被继续发现
pub trait BeanDefinitionRegistryPostProcessor: BeanFactoryPostProcessor {
    fn post_process_bean_definition_registry(
        &self,
        registry: &DefaultListableBeanFactory,
    ) -> ContainerResult<()>;
}

/// 显式注册到上下文的工厂后置处理器
#[derive(Clone)]
pub enum FactoryPostProcessor {
    /// 可以注册新的 Bean 定义
    Registry(Arc<dyn BeanDefinitionRegistryPostProcessor>),
    /// 只能读取/修改已有定义
    Plain(Arc<dyn BeanFactoryPostProcessor>),
}

impl FactoryPostProcessor {
    pub fn name(&self) -> &str {
        match self {
            FactoryPostProcessor::Registry(p) => p.name(),
            FactoryPostProcessor::Plain(p) => p.name(),
        }
    }

    pub fn post_process_bean_factory(&self, bean_factory: &DefaultListableBeanFactory) -> ContainerResult<()> {
        match self {
            FactoryPostProcessor::Registry(p) => p.post_process_bean_factory(bean_factory),
            FactoryPostProcessor::Plain(p) => p.post_process_bean_factory(bean_factory),
        }
    }
}

impl From<Arc<dyn BeanDefinitionRegistryPostProcessor>> for FactoryPostProcessor {
    fn from(p: Arc<dyn BeanDefinitionRegistryPostProcessor>) -> Self {
        FactoryPostProcessor::Registry(p)
    }
}

impl From<Arc<dyn BeanFactoryPostProcessor>> for FactoryPostProcessor {
    fn from(p: Arc<dyn BeanFactoryPostProcessor>) -> Self {
        FactoryPostProcessor::Plain(p)
    }
}

