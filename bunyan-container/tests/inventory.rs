//! Classes submitted with `inventory::submit!` end up in the catalog.

use std::sync::Arc;

use bunyan_container::prelude::*;

struct Clock;

struct Alarm {
    clock: Wired<Clock>,
}

fn clock_class() -> Arc<ClassDescriptor> {
    ClassDescriptor::builder::<Clock>("alarms::Clock")
        .component()
        .constructor(ConstructorDescriptor::new(|_| Ok(Clock)))
        .build()
}

fn alarm_class() -> Arc<ClassDescriptor> {
    ClassDescriptor::builder::<Alarm>("alarms::Alarm")
        .component()
        .constructor(ConstructorDescriptor::new(|_| Ok(Alarm { clock: Wired::new() })))
        .field(FieldDescriptor::autowired::<Alarm, Clock>("clock", |a| &a.clock))
        .build()
}

bunyan_container::inventory::submit! {
    ComponentRegistration::new(clock_class)
}

bunyan_container::inventory::submit! {
    ComponentRegistration::new(alarm_class)
}

#[test]
fn submitted_classes_are_wired() {
    let catalog = ClassCatalog::from_inventory();
    assert_eq!(catalog.len(), 2);

    let container = Container::builder().catalog(catalog).build().unwrap();
    let alarm: Arc<Alarm> = container.get_bean("alarm").unwrap();
    let clock: Arc<Clock> = container.get_bean("clock").unwrap();
    assert!(Arc::ptr_eq(alarm.clock.get().unwrap(), &clock));
}
