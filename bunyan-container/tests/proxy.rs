//! Around proxies: the container hands out the proxy while injection and
//! callbacks reach the original object.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bunyan_container::prelude::*;

trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}

struct Repo;

struct Hello {
    repo: Wired<Repo>,
    started: Configured<bool>,
}

impl Greeter for Hello {
    fn greet(&self) -> String {
        "hello".to_string()
    }
}

struct HelloProxy(Proxy<Hello>);

impl Greeter for HelloProxy {
    fn greet(&self) -> String {
        self.0
            .invoke("greet", |hello| hello.greet())
            .unwrap_or_else(|err| format!("denied: {err}"))
    }
}

#[derive(Default)]
struct Counter {
    calls: AtomicUsize,
}

impl Interceptor for Counter {
    fn before(&self, _bean: &str, _method: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn repo_class() -> Arc<ClassDescriptor> {
    ClassDescriptor::builder::<Repo>("app::Repo")
        .component()
        .constructor(ConstructorDescriptor::new(|_| Ok(Repo)))
        .build()
}

fn hello_class(handler: &str) -> Arc<ClassDescriptor> {
    ClassDescriptor::builder::<Hello>("app::Hello")
        .component()
        .around(handler)
        .implements::<dyn Greeter>(|h| h as Arc<dyn Greeter>)
        .constructor(ConstructorDescriptor::new(|_| {
            Ok(Hello {
                repo: Wired::new(),
                started: Configured::new(),
            })
        }))
        .field(FieldDescriptor::autowired::<Hello, Repo>("repo", |h| &h.repo))
        .method(
            MethodDescriptor::callback::<Hello, _>("start", |h| {
                let _ = h.started.set(true);
                Ok(())
            })
            .post_construct(),
        )
        .build()
}

fn counter_class() -> Arc<ClassDescriptor> {
    ClassDescriptor::builder::<Counter>("app::Counter")
        .component()
        .implements::<dyn Interceptor>(|c| c as Arc<dyn Interceptor>)
        .constructor(ConstructorDescriptor::new(|_| Ok(Counter::default())))
        .build()
}

fn processor_class() -> Arc<ClassDescriptor> {
    let proxy_class = ClassDescriptor::builder::<HelloProxy>("app::HelloProxy")
        .extends(hello_class("counter"), |p: &HelloProxy| p.0.target())
        .implements::<dyn Greeter>(|p| p as Arc<dyn Greeter>)
        .build();
    let proxies = ProxyRegistry::new().register::<Hello, _, _>(proxy_class, HelloProxy);
    AroundProxyPostProcessor::class_descriptor("app::AroundProxyPostProcessor", Arc::new(proxies))
}

fn build(classes: Vec<Arc<ClassDescriptor>>) -> Result<Container> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    classes
        .into_iter()
        .fold(Container::builder(), ContainerBuilder::register_class)
        .build()
}

#[test]
fn lookup_returns_proxy() {
    let container = build(vec![
        repo_class(),
        hello_class("counter"),
        counter_class(),
        processor_class(),
    ])
    .unwrap();

    assert_eq!(container.bean_ref("hello").unwrap().class().name(), "app::HelloProxy");

    let greeter = container.get_bean::<dyn Greeter>("hello").unwrap();
    assert_eq!(greeter.greet(), "hello");
    assert_eq!(greeter.greet(), "hello");

    let counter: Arc<Counter> = container.get_bean("counter").unwrap();
    assert_eq!(counter.calls.load(Ordering::SeqCst), 2);

    // by type resolves to the proxy as well
    container.get_bean_by_type::<dyn Greeter>().unwrap().greet();
    assert_eq!(counter.calls.load(Ordering::SeqCst), 3);
}

#[test]
fn original_receives_injection_and_callbacks() {
    let container = build(vec![
        repo_class(),
        hello_class("counter"),
        counter_class(),
        processor_class(),
    ])
    .unwrap();

    // the declared class is Hello, so the proxy type is reached through the
    // bean's runtime class
    let proxy = container.bean_ref("hello").unwrap().cast::<HelloProxy>().unwrap();
    let original = proxy.0.target();
    let repo: Arc<Repo> = container.get_bean("repo").unwrap();

    assert!(Arc::ptr_eq(original.repo.get().unwrap(), &repo));
    assert_eq!(original.started.get(), Some(&true));
}

#[test]
fn proxy_stays_assignable_to_declared_class() {
    let container = build(vec![
        repo_class(),
        hello_class("counter"),
        counter_class(),
        processor_class(),
    ])
    .unwrap();

    let definition = container.find_definition("hello").unwrap();
    assert_eq!(definition.class().name(), "app::Hello");
    assert!(
        container
            .find_typed_definition("hello", &TypeKey::of::<Hello>())
            .unwrap()
            .is_some()
    );
}

struct Consumer {
    hello: Arc<Hello>,
    greeter: Arc<dyn Greeter>,
}

struct FieldConsumer {
    hello: Wired<Hello>,
    greeter: Wired<dyn Greeter>,
}

fn consumer_class() -> Arc<ClassDescriptor> {
    ClassDescriptor::builder::<Consumer>("app::Consumer")
        .component()
        .constructor(
            ConstructorDescriptor::new(|args| {
                Ok(Consumer {
                    hello: args.bean(0)?,
                    greeter: args.bean(1)?,
                })
            })
            .param(ParamDescriptor::autowired::<Hello>())
            .param(ParamDescriptor::autowired::<dyn Greeter>()),
        )
        .build()
}

fn field_consumer_class() -> Arc<ClassDescriptor> {
    ClassDescriptor::builder::<FieldConsumer>("app::FieldConsumer")
        .component()
        .constructor(ConstructorDescriptor::new(|_| {
            Ok(FieldConsumer {
                hello: Wired::new(),
                greeter: Wired::new(),
            })
        }))
        .field(FieldDescriptor::autowired::<FieldConsumer, Hello>("hello", |c| &c.hello))
        .field(FieldDescriptor::autowired::<FieldConsumer, dyn Greeter>("greeter", |c| &c.greeter))
        .build()
}

fn proxied_with_dependents() -> Container {
    build(vec![
        repo_class(),
        hello_class("counter"),
        counter_class(),
        processor_class(),
        consumer_class(),
        field_consumer_class(),
    ])
    .unwrap()
}

#[test]
fn dependent_by_class_receives_original() {
    let container = proxied_with_dependents();
    let proxy = container.bean_ref("hello").unwrap().cast::<HelloProxy>().unwrap();
    let original = proxy.0.target_arc();
    let repo: Arc<Repo> = container.get_bean("repo").unwrap();

    let consumer: Arc<Consumer> = container.get_bean("consumer").unwrap();
    assert!(Arc::ptr_eq(&consumer.hello, original));
    assert!(Arc::ptr_eq(consumer.hello.repo.get().unwrap(), &repo));

    let fields: Arc<FieldConsumer> = container.get_bean("fieldConsumer").unwrap();
    assert!(Arc::ptr_eq(fields.hello.get().unwrap(), original));
}

#[test]
fn dependent_by_trait_receives_proxy() {
    let container = proxied_with_dependents();
    let counter: Arc<Counter> = container.get_bean("counter").unwrap();

    let consumer: Arc<Consumer> = container.get_bean("consumer").unwrap();
    assert_eq!(consumer.greeter.greet(), "hello");
    assert_eq!(counter.calls.load(Ordering::SeqCst), 1);

    let fields: Arc<FieldConsumer> = container.get_bean("fieldConsumer").unwrap();
    assert_eq!(fields.greeter.get().unwrap().greet(), "hello");
    assert_eq!(counter.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn get_bean_by_class_of_proxied_bean() {
    let container = proxied_with_dependents();
    let proxy = container.bean_ref("hello").unwrap().cast::<HelloProxy>().unwrap();

    let hello: Arc<Hello> = container.get_bean("hello").unwrap();
    assert!(Arc::ptr_eq(&hello, proxy.0.target_arc()));
    assert_eq!(hello.started.get(), Some(&true));

    let by_type = container.get_bean_by_type::<Hello>().unwrap();
    assert!(Arc::ptr_eq(&by_type, &hello));
}

#[test]
fn handler_must_be_an_interceptor() {
    match build(vec![repo_class(), hello_class("repo"), processor_class()]) {
        Err(BunyanError::InvalidInterceptor { bean, handler }) => {
            assert_eq!(bean, "hello");
            assert_eq!(handler, "repo");
        }
        other => panic!("Expected InvalidInterceptor, got: {other:?}"),
    }
}

#[test]
fn unknown_handler() {
    match build(vec![repo_class(), hello_class("missing"), processor_class()]) {
        Err(BunyanError::NotFound(err)) => assert_eq!(err.requested, "'missing'"),
        other => panic!("Expected NotFound, got: {other:?}"),
    }
}

#[test]
fn target_without_proxy_type() {
    struct Plain;
    let plain = ClassDescriptor::builder::<Plain>("app::Plain")
        .component()
        .around("counter")
        .constructor(ConstructorDescriptor::new(|_| Ok(Plain)))
        .build();

    match build(vec![plain, counter_class(), processor_class()]) {
        Err(BunyanError::NoProxyFactory { bean, .. }) => assert_eq!(bean, "plain"),
        other => panic!("Expected NoProxyFactory, got: {other:?}"),
    }
}

#[test]
fn post_processor_cannot_autowire_constructor() {
    struct Tagger;
    impl BeanPostProcessor for Tagger {}

    let tagger = ClassDescriptor::builder::<Tagger>("app::Tagger")
        .component()
        .implements::<dyn BeanPostProcessor>(|t| t as Arc<dyn BeanPostProcessor>)
        .constructor(ConstructorDescriptor::new(|_| Ok(Tagger)).param(ParamDescriptor::autowired::<Repo>()))
        .build();

    match build(vec![repo_class(), tagger]) {
        Err(BunyanError::ForbiddenAutowired { bean, .. }) => assert_eq!(bean, "tagger"),
        other => panic!("Expected ForbiddenAutowired, got: {other:?}"),
    }
}

#[test]
fn after_initialization_replacement() {
    struct Wrapped(Arc<Repo>);

    struct Wrapper {
        wrapped: Arc<ClassDescriptor>,
    }

    impl BeanPostProcessor for Wrapper {
        fn post_process_after_initialization(&self, bean: BeanRef, _name: &str) -> Result<BeanRef> {
            match bean.cast::<Repo>() {
                Some(repo) => Ok(BeanRef::from_arc(Arc::new(Wrapped(repo)), self.wrapped.clone())),
                None => Ok(bean),
            }
        }
    }

    let wrapper = ClassDescriptor::builder::<Wrapper>("app::Wrapper")
        .component()
        .implements::<dyn BeanPostProcessor>(|w| w as Arc<dyn BeanPostProcessor>)
        .constructor(ConstructorDescriptor::new(|_| {
            Ok(Wrapper {
                wrapped: ClassDescriptor::builder::<Wrapped>("app::Wrapped")
                    .extends(repo_class(), |w: &Wrapped| w.0.as_ref())
                    .build(),
            })
        }))
        .build();

    let container = build(vec![repo_class(), wrapper]).unwrap();
    let bean = container.bean_ref("repo").unwrap();
    assert_eq!(bean.class().name(), "app::Wrapped");
    assert!(bean.cast::<Wrapped>().is_some());
    assert!(bean.is_assignable_to(&TypeKey::of::<Repo>()));
}
