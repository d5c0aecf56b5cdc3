//! 组件扫描
//!
//! 组件在编译期通过 `inventory` 提交，`ComponentScanLoader` 在每次刷新时
//! 把它们装载进新的 Bean 工厂：
//!
//! ```ignore
//! use trellis_core::prelude::*;
//!
//! fn user_repository() -> BeanDefinition {
//!     BeanDefinition::new(|_| Ok(UserRepository::default()))
//! }
//!
//! trellis_core::component!("userRepository", user_repository);
//! trellis_core::component!("devSeeder", dev_seeder, profiles = ["dev"]);
//! ```

use std::sync::Arc;

use crate::bean::BeanDefinition;
use crate::bean_factory::{BeanDefinitionRegistry, DefaultListableBeanFactory};
use crate::config::Environment;
use crate::error::ContainerResult;
use crate::factory_holder::BeanDefinitionLoader;

/// 构造组件定义的函数
pub type DefinitionFactory = fn() -> BeanDefinition;

/// 编译期收集的组件
pub struct ComponentRegistration {
    pub name: &'static str,
    pub definition: DefinitionFactory,
    /// 为空表示在任何 profile 下都装载
    pub profiles: &'static [&'static str],
}

impl ComponentRegistration {
    pub const fn new(name: &'static str, definition: DefinitionFactory) -> Self {
        Self {
            name,
            definition,
            profiles: &[],
        }
    }

    pub const fn with_profiles(mut self, profiles: &'static [&'static str]) -> Self {
        self.profiles = profiles;
        self
    }

    fn is_active(&self, environment: Option<&Environment>) -> bool {
        if self.profiles.is_empty() {
            return true;
        }
        environment.is_some_and(|env| self.profiles.iter().any(|p| env.accepts_profiles(p)))
    }
}

inventory::collect!(ComponentRegistration);

/// 提交组件
#[macro_export]
macro_rules! component {
    ($name:expr, $definition:path) => {
        $crate::inventory::submit! {
            $crate::component::ComponentRegistration::new($name, $definition)
        }
    };
    ($name:expr, $definition:path, profiles = [$($profile:expr),* $(,)?]) => {
        $crate::inventory::submit! {
            $crate::component::ComponentRegistration::new($name, $definition)
                .with_profiles(&[$($profile),*])
        }
    };
}

/// 装载所有已提交组件的 `BeanDefinitionLoader`
#[derive(Default)]
pub struct ComponentScanLoader {
    environment: Option<Arc<Environment>>,
    excluded: Vec<String>,
}

impl ComponentScanLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按该环境的 active profiles 过滤组件
    pub fn with_environment(mut self, environment: Arc<Environment>) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.excluded.push(name.into());
        self
    }

    /// 当前会被装载的组件名称，按名称排序
    pub fn candidate_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.candidates().map(|c| c.name).collect();
        names.sort_unstable();
        names
    }

    fn candidates(&self) -> impl Iterator<Item = &'static ComponentRegistration> + '_ {
        inventory::iter::<ComponentRegistration>
            .into_iter()
            .filter(|c| !self.excluded.iter().any(|e| e == c.name))
            .filter(|c| c.is_active(self.environment.as_deref()))
    }
}

impl BeanDefinitionLoader for ComponentScanLoader {
    fn load_bean_definitions(&self, factory: &DefaultListableBeanFactory) -> ContainerResult<()> {
        // inventory 不保证顺序，按名称排序保证注册顺序稳定
        let mut components: Vec<&'static ComponentRegistration> = self.candidates().collect();
        components.sort_by_key(|c| c.name);

        for component in &components {
            tracing::debug!("Registering component '{}'", component.name);
            factory.register_bean_definition(component.name, (component.definition)())?;
        }
        tracing::info!("Component scan registered {} bean definitions", components.len());
        Ok(())
    }

    fn name(&self) -> &str {
        "ComponentScanLoader"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean_factory::{BeanFactoryExt, ListableBeanFactory};

    struct ScannedGreeter {
        greeting: String,
    }

    fn scanned_greeter() -> BeanDefinition {
        BeanDefinition::new(|_| {
            Ok(ScannedGreeter {
                greeting: "hello".into(),
            })
        })
    }

    fn scanned_dev_only() -> BeanDefinition {
        BeanDefinition::new(|_| Ok(7u16))
    }

    crate::component!("scannedGreeter", scanned_greeter);
    crate::component!("scannedDevOnly", scanned_dev_only, profiles = ["dev"]);

    #[test]
    fn test_scan_registers_submitted_components() {
        let factory = DefaultListableBeanFactory::new();
        ComponentScanLoader::new().load_bean_definitions(&factory).unwrap();

        let names = factory.get_bean_names();
        assert!(names.contains(&"scannedGreeter".to_string()));
        assert!(!names.contains(&"scannedDevOnly".to_string()));
        let greeter = factory.get_bean_typed::<ScannedGreeter>("scannedGreeter").unwrap();
        assert_eq!(greeter.greeting, "hello");
    }

    #[test]
    fn test_profile_and_exclusion_filters() {
        let environment = Arc::new(Environment::new());
        environment.set_active_profiles(vec!["dev".into()]);

        let loader = ComponentScanLoader::new()
            .with_environment(environment)
            .exclude("scannedGreeter");
        let names = loader.candidate_names();

        assert!(names.contains(&"scannedDevOnly"));
        assert!(!names.contains(&"scannedGreeter"));
    }
}
