//! 生命周期管理
//!
//! `Lifecycle` Bean 由 `LifecycleProcessor` 在上下文刷新时启动、关闭时停止。
//! 启动按 phase 升序，停止按 phase 降序；停止过程中的错误只记录日志，
//! 保证所有 Bean 都有机会被停止。

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::bean_factory::{
    BeanDefinitionRegistry, DefaultListableBeanFactory, ListableBeanFactory, SingletonBeanRegistry,
};
use crate::bean::Capability;
use crate::error::{ContainerError, ContainerResult};

/// 可启动/停止的组件
pub trait Lifecycle: Send + Sync {
    fn start(&self) -> ContainerResult<()>;

    fn stop(&self) -> ContainerResult<()>;

    fn is_running(&self) -> bool;

    /// 是否在上下文刷新时自动启动
    fn is_auto_startup(&self) -> bool {
        true
    }

    /// 启动阶段，数字越小越早启动、越晚停止
    fn phase(&self) -> i32 {
        0
    }
}

/// 所有非延迟单例实例化完成后的回调
pub trait SmartInitializingSingleton: Send + Sync {
    fn after_singletons_instantiated(&self) -> ContainerResult<()>;
}

/// 生命周期处理器
///
/// 上下文通过它把刷新/关闭信号传播给所有 `Lifecycle` Bean
pub trait LifecycleProcessor: Send + Sync {
    fn start(&self) -> ContainerResult<()>;

    fn stop(&self) -> ContainerResult<()>;

    fn is_running(&self) -> bool;

    /// 上下文刷新完成通知
    fn on_refresh(&self) -> ContainerResult<()>;

    /// 上下文关闭通知
    fn on_close(&self) -> ContainerResult<()>;
}

/// 默认的生命周期处理器
pub struct DefaultLifecycleProcessor {
    bean_factory: Weak<DefaultListableBeanFactory>,
    running: AtomicBool,
}

impl DefaultLifecycleProcessor {
    pub fn new(bean_factory: &Arc<DefaultListableBeanFactory>) -> Self {
        Self {
            bean_factory: Arc::downgrade(bean_factory),
            running: AtomicBool::new(false),
        }
    }

    fn bean_factory(&self) -> ContainerResult<Arc<DefaultListableBeanFactory>> {
        self.bean_factory.upgrade().ok_or_else(|| {
            ContainerError::illegal_state("LifecycleProcessor outlived its bean factory")
        })
    }

    /// 收集 Lifecycle Bean，按 phase 分组
    ///
    /// 只包含已经创建的单例和非延迟单例，不会为停止而创建延迟 Bean
    fn lifecycle_beans(&self) -> ContainerResult<BTreeMap<i32, Vec<(String, Arc<dyn Lifecycle>)>>> {
        let factory = self.bean_factory()?;
        let mut phases: BTreeMap<i32, Vec<(String, Arc<dyn Lifecycle>)>> = BTreeMap::new();

        for name in factory.get_bean_names_for_capability(Capability::Lifecycle, false) {
            let eligible = factory.contains_singleton(&name)
                || factory
                    .get_bean_definition(&name)
                    .map(|def| !def.lazy)
                    .unwrap_or(false);
            if !eligible {
                continue;
            }
            let bean = factory.get_lifecycle(&name)?;
            phases.entry(bean.phase()).or_default().push((name, bean));
        }

        Ok(phases)
    }

    fn start_beans(&self, auto_startup_only: bool) -> ContainerResult<()> {
        let phases = self.lifecycle_beans()?;

        for (phase, beans) in phases {
            tracing::debug!("Starting beans in phase {}", phase);
            for (name, bean) in beans {
                if auto_startup_only && !bean.is_auto_startup() {
                    continue;
                }
                if bean.is_running() {
                    continue;
                }
                bean.start().map_err(|e| {
                    ContainerError::BeanCreationFailed(format!("Failed to start bean '{}': {}", name, e))
                })?;
                tracing::debug!("Successfully started bean '{}'", name);
            }
        }

        Ok(())
    }

    fn stop_beans(&self) {
        let phases = match self.lifecycle_beans() {
            Ok(phases) => phases,
            Err(e) => {
                tracing::warn!("Failed to collect lifecycle beans for stop: {}", e);
                return;
            }
        };

        for (phase, beans) in phases.into_iter().rev() {
            tracing::debug!("Stopping beans in phase {}", phase);
            for (name, bean) in beans.into_iter().rev() {
                if !bean.is_running() {
                    continue;
                }
                match bean.stop() {
                    Ok(()) => tracing::debug!("Successfully stopped bean '{}'", name),
                    Err(e) => tracing::warn!("Failed to stop bean '{}': {}", name, e),
                }
            }
        }
    }
}

impl LifecycleProcessor for DefaultLifecycleProcessor {
    fn start(&self) -> ContainerResult<()> {
        self.start_beans(false)?;
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> ContainerResult<()> {
        self.stop_beans();
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn on_refresh(&self) -> ContainerResult<()> {
        self.start_beans(true)?;
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn on_close(&self) -> ContainerResult<()> {
        self.stop_beans();
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::{BeanDefinition, DeclareCapabilities};
    use parking_lot::Mutex;

    struct Recorder {
        name: &'static str,
        phase: i32,
        auto: bool,
        fail_stop: bool,
        running: AtomicBool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Lifecycle for Recorder {
        fn start(&self) -> ContainerResult<()> {
            self.running.store(true, Ordering::SeqCst);
            self.log.lock().push(format!("start:{}", self.name));
            Ok(())
        }

        fn stop(&self) -> ContainerResult<()> {
            self.running.store(false, Ordering::SeqCst);
            self.log.lock().push(format!("stop:{}", self.name));
            if self.fail_stop {
                return Err(ContainerError::illegal_state("stop failed"));
            }
            Ok(())
        }

        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        fn is_auto_startup(&self) -> bool {
            self.auto
        }

        fn phase(&self) -> i32 {
            self.phase
        }
    }

    fn register(
        factory: &DefaultListableBeanFactory,
        name: &'static str,
        phase: i32,
        auto: bool,
        fail_stop: bool,
        log: &Arc<Mutex<Vec<String>>>,
    ) {
        let log = Arc::clone(log);
        let definition = BeanDefinition::builder(move |_| {
            Ok(Recorder {
                name,
                phase,
                auto,
                fail_stop,
                running: AtomicBool::new(false),
                log: Arc::clone(&log),
            })
        })
        .lifecycle()
        .build();
        factory.register_bean_definition(name, definition).unwrap();
    }

    #[test]
    fn test_start_ascending_stop_descending_phase() {
        let factory = Arc::new(DefaultListableBeanFactory::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        register(&factory, "late", 10, true, false, &log);
        register(&factory, "early", -10, true, false, &log);

        let processor = DefaultLifecycleProcessor::new(&factory);
        processor.on_refresh().unwrap();
        assert!(processor.is_running());
        processor.on_close().unwrap();
        assert!(!processor.is_running());

        assert_eq!(
            *log.lock(),
            vec!["start:early", "start:late", "stop:late", "stop:early"]
        );
    }

    #[test]
    fn test_on_refresh_skips_manual_startup_beans() {
        let factory = Arc::new(DefaultListableBeanFactory::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        register(&factory, "manual", 0, false, false, &log);

        let processor = DefaultLifecycleProcessor::new(&factory);
        processor.on_refresh().unwrap();
        assert!(log.lock().is_empty());

        processor.start().unwrap();
        assert_eq!(*log.lock(), vec!["start:manual"]);
    }

    #[test]
    fn test_stop_failure_does_not_block_remaining_beans() {
        let factory = Arc::new(DefaultListableBeanFactory::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        register(&factory, "a", 0, true, true, &log);
        register(&factory, "b", 1, true, false, &log);

        let processor = DefaultLifecycleProcessor::new(&factory);
        processor.on_refresh().unwrap();
        processor.stop().unwrap();

        let log = log.lock();
        assert!(log.contains(&"stop:a".to_string()));
        assert!(log.contains(&"stop:b".to_string()));
    }
}
