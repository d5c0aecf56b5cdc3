//! Bean 工厂持有者
//!
//! 上下文通过 `BeanFactoryHolder` 获得每个刷新周期使用的工厂：
//!
//! - `GenericBeanFactoryHolder`：整个生命周期只有一个工厂，只允许刷新一次，
//!   定义在刷新前直接注册到工厂上；
//! - `RefreshableBeanFactoryHolder`：每次刷新都销毁旧工厂的单例并创建新工厂，
//!   定义由 `BeanDefinitionLoader` 装载。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::bean_factory::{ConfigurableBeanFactory, DefaultListableBeanFactory};
use crate::error::{ContainerError, ContainerResult};

/// 把 Bean 定义装载进新创建的工厂
pub trait BeanDefinitionLoader: Send + Sync {
    fn load_bean_definitions(&self, factory: &DefaultListableBeanFactory) -> ContainerResult<()>;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> BeanDefinitionLoader for F
where
    F: Fn(&DefaultListableBeanFactory) -> ContainerResult<()> + Send + Sync,
{
    fn load_bean_definitions(&self, factory: &DefaultListableBeanFactory) -> ContainerResult<()> {
        self(factory)
    }
}

/// 上下文与其工厂之间的契约
pub trait BeanFactoryHolder: Send + Sync {
    /// 创建或准备工厂，返回时定义已全部装载，但尚未经过后置处理
    fn refresh_bean_factory(&self) -> ContainerResult<()>;

    /// 释放工厂，不允许失败
    fn close_bean_factory(&self);

    /// 当前工厂；没有可用工厂时返回 `IllegalState`
    fn bean_factory(&self) -> ContainerResult<Arc<DefaultListableBeanFactory>>;

    /// 刷新失败时调用
    fn cancel_refresh(&self) {}

    fn has_bean_factory(&self) -> bool {
        self.bean_factory().is_ok()
    }
}

/// 单工厂持有者
pub struct GenericBeanFactoryHolder {
    bean_factory: Arc<DefaultListableBeanFactory>,
    refreshed: AtomicBool,
}

impl GenericBeanFactoryHolder {
    pub fn new() -> Self {
        Self::with_bean_factory(Arc::new(DefaultListableBeanFactory::new()))
    }

    pub fn with_bean_factory(bean_factory: Arc<DefaultListableBeanFactory>) -> Self {
        Self {
            bean_factory,
            refreshed: AtomicBool::new(false),
        }
    }
}

impl Default for GenericBeanFactoryHolder {
    fn default() -> Self {
        Self::new()
    }
}

impl BeanFactoryHolder for GenericBeanFactoryHolder {
    fn refresh_bean_factory(&self) -> ContainerResult<()> {
        if self
            .refreshed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ContainerError::illegal_state(
                "Generic context does not support multiple refresh attempts: just call 'refresh' once",
            ));
        }
        Ok(())
    }

    fn close_bean_factory(&self) {}

    fn bean_factory(&self) -> ContainerResult<Arc<DefaultListableBeanFactory>> {
        Ok(Arc::clone(&self.bean_factory))
    }
}

/// 可重复刷新的持有者
pub struct RefreshableBeanFactoryHolder {
    bean_factory: RwLock<Option<Arc<DefaultListableBeanFactory>>>,
    loaders: Vec<Arc<dyn BeanDefinitionLoader>>,
    allow_bean_definition_overriding: Option<bool>,
}

impl RefreshableBeanFactoryHolder {
    pub fn new(loaders: Vec<Arc<dyn BeanDefinitionLoader>>) -> Self {
        Self {
            bean_factory: RwLock::new(None),
            loaders,
            allow_bean_definition_overriding: None,
        }
    }

    /// 应用到每个新建工厂上的覆盖选项
    pub fn with_bean_definition_overriding(mut self, allow: bool) -> Self {
        self.allow_bean_definition_overriding = Some(allow);
        self
    }

    fn create_bean_factory(&self) -> DefaultListableBeanFactory {
        let factory = DefaultListableBeanFactory::new();
        if let Some(allow) = self.allow_bean_definition_overriding {
            factory.set_allow_bean_definition_overriding(allow);
        }
        factory
    }
}

impl BeanFactoryHolder for RefreshableBeanFactoryHolder {
    fn refresh_bean_factory(&self) -> ContainerResult<()> {
        let previous = self.bean_factory.read().clone();
        if let Some(previous) = previous {
            tracing::debug!("Destroying singletons of the previous bean factory");
            previous.destroy_singletons();
            self.close_bean_factory();
        }

        let factory = self.create_bean_factory();
        for loader in &self.loaders {
            tracing::debug!("Loading bean definitions with '{}'", loader.name());
            loader.load_bean_definitions(&factory)?;
        }

        *self.bean_factory.write() = Some(Arc::new(factory));
        Ok(())
    }

    fn close_bean_factory(&self) {
        self.bean_factory.write().take();
    }

    fn bean_factory(&self) -> ContainerResult<Arc<DefaultListableBeanFactory>> {
        self.bean_factory.read().clone().ok_or_else(|| {
            ContainerError::illegal_state(
                "BeanFactory not initialized or already closed - call 'refresh' before accessing beans via the context",
            )
        })
    }
}
