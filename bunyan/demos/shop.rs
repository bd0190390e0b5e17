//! A small shop wired by the container.
//!
//! Run with `RUST_LOG=debug cargo run --example shop` to watch the build.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bunyan::prelude::*;
use tracing_subscriber::EnvFilter;

trait OrderApi: Send + Sync {
    fn place(&self, item: &str) -> String;
}

trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

struct TickingClock(AtomicU64);

impl Clock for TickingClock {
    fn now(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

#[derive(Default)]
struct InMemoryRepo {
    orders: parking_lot::Mutex<Vec<String>>,
}

impl InMemoryRepo {
    fn save(&self, order: String) -> usize {
        let mut orders = self.orders.lock();
        orders.push(order);
        orders.len()
    }
}

struct OrderService {
    repo: Arc<InMemoryRepo>,
    prefix: String,
    clock: Wired<dyn Clock>,
}

impl OrderApi for OrderService {
    fn place(&self, item: &str) -> String {
        let at = self.clock.get().map_or(0, |clock| clock.now());
        let order = format!("{}-{at}: {item}", self.prefix);
        let count = self.repo.save(order.clone());
        format!("{order} (#{count} stored)")
    }
}

struct OrderServiceProxy(Proxy<OrderService>);

impl OrderApi for OrderServiceProxy {
    fn place(&self, item: &str) -> String {
        self.0
            .invoke("place", |service| service.place(item))
            .unwrap_or_else(|err| format!("rejected: {err}"))
    }
}

struct Audit;

impl Interceptor for Audit {
    fn before(&self, bean: &str, method: &str) -> Result<()> {
        println!("  → {bean}.{method}()");
        Ok(())
    }

    fn after(&self, bean: &str, method: &str) {
        println!("  ← {bean}.{method}()");
    }
}

struct AppConfig;

fn order_service_class() -> Arc<ClassDescriptor> {
    ClassDescriptor::builder::<OrderService>("shop::orders::OrderService")
        .component()
        .around("audit")
        .implements::<dyn OrderApi>(|s| s as Arc<dyn OrderApi>)
        .constructor(
            ConstructorDescriptor::new(|args| {
                Ok(OrderService {
                    repo: args.bean(0)?,
                    prefix: args.value(1)?,
                    clock: Wired::new(),
                })
            })
            .param(ParamDescriptor::autowired::<InMemoryRepo>())
            .param(ParamDescriptor::value::<String>("${order.prefix:ORD}")),
        )
        .field(FieldDescriptor::autowired::<OrderService, dyn Clock>("clock", |s| &s.clock))
        .build()
}

fn classes() -> Vec<Arc<ClassDescriptor>> {
    let clock = ClassDescriptor::builder::<TickingClock>("shop::TickingClock")
        .implements::<dyn Clock>(|c| c as Arc<dyn Clock>)
        .build();

    let proxies = ProxyRegistry::new().register::<OrderService, _, _>(
        ClassDescriptor::builder::<OrderServiceProxy>("shop::orders::OrderServiceProxy")
            .extends(order_service_class(), |p: &OrderServiceProxy| p.0.target())
            .implements::<dyn OrderApi>(|p| p as Arc<dyn OrderApi>)
            .build(),
        OrderServiceProxy,
    );

    vec![
        ClassDescriptor::builder::<AppConfig>("shop::AppConfig")
            .configuration()
            .component_scan(["shop"])
            .import(["bunyan::AroundProxyPostProcessor"])
            .constructor(ConstructorDescriptor::new(|_| Ok(AppConfig)))
            .method(MethodDescriptor::factory::<AppConfig, TickingClock, _>(
                "clock",
                clock,
                |_, _| Ok(TickingClock(AtomicU64::new(1))),
            ))
            .build(),
        ClassDescriptor::builder::<InMemoryRepo>("shop::orders::InMemoryRepo")
            .component()
            .constructor(ConstructorDescriptor::new(|_| Ok(InMemoryRepo::default())))
            .build(),
        ClassDescriptor::builder::<Audit>("shop::Audit")
            .component()
            .implements::<dyn Interceptor>(|a| a as Arc<dyn Interceptor>)
            .constructor(ConstructorDescriptor::new(|_| Ok(Audit)))
            .build(),
        order_service_class(),
        AroundProxyPostProcessor::class_descriptor("bunyan::AroundProxyPostProcessor", Arc::new(proxies)),
    ]
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut builder = Container::builder()
        .configuration("shop::AppConfig")
        .properties(PropertyResolver::from_pairs([("order.prefix", "SHOP")]).with_env());
    for class in classes() {
        builder = builder.register_class(class);
    }
    let container = builder.build()?;

    println!("beans: {:?}", container.bean_names());
    let orders = container.get_bean::<dyn OrderApi>("orderService")?;
    println!("{}", orders.place("tea"));
    println!("{}", orders.place("scones"));

    container.close()
}
