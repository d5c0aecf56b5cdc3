use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use trellis_core::prelude::*;
use trellis_core::{component, StaticMessageSource, MESSAGE_SOURCE_BEAN_NAME};

// ==================== 组件 ====================

#[derive(Debug)]
struct OrderPlaced {
    id: u64,
    amount_cents: u64,
}

/// 问候服务，文本来自配置
struct GreetingService {
    greeting: String,
}

fn greeting_service() -> BeanDefinition {
    BeanDefinition::builder(|ctx| {
        Ok(GreetingService {
            greeting: ctx.required_property("greeting")?,
        })
    })
    .property("greeting", "${app.greeting:Hello} (${app.name})")
    .build()
}

component!("greetingService", greeting_service);

/// 模拟的 HTTP 服务器，随上下文启动和停止
struct HttpServer {
    address: String,
    running: AtomicBool,
}

impl Lifecycle for HttpServer {
    fn start(&self) -> ContainerResult<()> {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("HTTP server listening on {}", self.address);
        Ok(())
    }

    fn stop(&self) -> ContainerResult<()> {
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("HTTP server on {} stopped", self.address);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn phase(&self) -> i32 {
        100
    }
}

fn http_server() -> BeanDefinition {
    BeanDefinition::builder(|ctx| {
        Ok(HttpServer {
            address: ctx.required_property("address")?,
            running: AtomicBool::new(false),
        })
    })
    .property("address", "${server.host:0.0.0.0}:${server.port:8080}")
    .depends_on("greetingService")
    .lifecycle()
    .build()
}

component!("httpServer", http_server);

/// 订单审计，作为监听器 Bean 注册
#[derive(Default)]
struct OrderAudit {
    seen: AtomicUsize,
}

impl ApplicationListener for OrderAudit {
    fn on_application_event(&self, event: Arc<dyn ApplicationEvent>) -> ContainerResult<()> {
        if let Some(order) = event.as_any().downcast_ref::<PayloadApplicationEvent<OrderPlaced>>() {
            let count = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::info!(
                "Audited order #{} ({} cents), {} so far",
                order.payload().id,
                order.payload().amount_cents,
                count
            );
        }
        Ok(())
    }

    fn listener_name(&self) -> &str {
        "orderAudit"
    }
}

fn order_audit() -> BeanDefinition {
    BeanDefinition::builder(|_| Ok(OrderAudit::default()))
        .application_listener()
        .build()
}

component!("orderAudit", order_audit);

/// 英文消息
fn message_source() -> BeanDefinition {
    BeanDefinition::builder(|_| {
        let source = StaticMessageSource::new();
        source.add_message("order.placed", "en", "Order {0} placed");
        source.add_message("order.placed", "de", "Bestellung {0} aufgegeben");
        Ok(source)
    })
    .hierarchical_message_source()
    .build()
}

component!(MESSAGE_SOURCE_BEAN_NAME, message_source);

// ==================== 后置处理器 ====================

/// 刷新时打印定义统计
struct DefinitionReport;

impl BeanFactoryPostProcessor for DefinitionReport {
    fn post_process_bean_factory(&self, factory: &DefaultListableBeanFactory) -> ContainerResult<()> {
        tracing::info!(
            "{} bean definitions registered: {:?}",
            factory.get_bean_definition_count(),
            factory.get_bean_names()
        );
        Ok(())
    }
}

impl Ordered for DefinitionReport {
    fn order(&self) -> i32 {
        0
    }
}

impl PriorityOrdered for DefinitionReport {}

fn definition_report() -> BeanDefinition {
    BeanDefinition::builder(|_| Ok(DefinitionReport))
        .factory_post_processor()
        .priority_ordered()
        .build()
}

component!("definitionReport", definition_report);

/// 记录每个 Bean 的初始化
struct InitializationTracer;

impl BeanPostProcessor for InitializationTracer {
    fn post_process_after_initialization(
        &self,
        bean: trellis_core::SharedBean,
        bean_name: &str,
    ) -> ContainerResult<trellis_core::SharedBean> {
        tracing::debug!("Bean '{}' initialized", bean_name);
        Ok(bean)
    }
}

fn initialization_tracer() -> BeanDefinition {
    BeanDefinition::builder(|_| Ok(InitializationTracer))
        .bean_post_processor()
        .build()
}

component!("initializationTracer", initialization_tracer);

// ==================== main ====================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let context = TrellisApplication::new("refresh-demo")
        .config_file(concat!(env!("CARGO_MANIFEST_DIR"), "/application.toml"))
        .async_events(true)
        .initializer(|context| {
            context.add_application_listener(listener_fn(
                "refreshLogger",
                |event: &ContextRefreshedEvent| {
                    tracing::info!("Context '{}' refreshed", event.context_id);
                    Ok(())
                },
            ));
            Ok(())
        })
        .run()?;

    let greeting = context.get_bean_typed::<GreetingService>("greetingService")?;
    tracing::info!("{}", greeting.greeting);

    for (id, amount_cents) in [(1001, 2599), (1002, 120)] {
        context.publish_payload(OrderPlaced { id, amount_cents })?;
        let args = vec![id.to_string()];
        tracing::info!("{}", context.get_message_or_code("order.placed", &args, "en")?);
    }

    context.stop()?;
    context.start()?;

    // 异步监听器在 runtime 上执行
    tokio::time::sleep(Duration::from_millis(50)).await;

    context.close();
    Ok(())
}
