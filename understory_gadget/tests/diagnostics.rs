// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for the warnings emitted through `tracing`.

use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use understory_gadget::{ClassBuilder, Context, Props, Value};

#[derive(Clone, Debug, Default)]
struct Warning {
    target: String,
    fields: Vec<(String, String)>,
}

impl Warning {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }
}

impl Visit for Warning {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.fields.push((field.name().to_owned(), value.to_owned()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.fields.push((field.name().to_owned(), format!("{value:?}")));
    }
}

/// Records every event at `WARN` or above.
#[derive(Clone, Default)]
struct Warnings(Arc<Mutex<Vec<Warning>>>);

impl<S: Subscriber> Layer<S> for Warnings {
    fn on_event(&self, event: &tracing::Event<'_>, _: LayerContext<'_, S>) {
        if *event.metadata().level() <= Level::WARN {
            let mut warning = Warning {
                target: event.metadata().target().to_owned(),
                fields: Vec::new(),
            };
            event.record(&mut warning);
            self.0.lock().unwrap().push(warning);
        }
    }
}

fn capture(f: impl FnOnce()) -> Vec<Warning> {
    let warnings = Warnings::default();
    let subscriber = tracing_subscriber::registry().with(warnings.clone());
    tracing::subscriber::with_default(subscriber, f);
    warnings.0.lock().unwrap().clone()
}

#[test]
fn duplicate_class_registration_warns_once() {
    let ctx = Context::new();
    let seen = capture(|| {
        let first = ClassBuilder::new("Thing").build();
        assert!(ctx.register_class(first.clone()).is_none());
        // Re-registering the same class is not a conflict.
        assert!(ctx.register_class(first).is_some());
        assert!(ctx.register_class(ClassBuilder::new("Thing").build()).is_some());
    });
    assert_eq!(seen.len(), 1);
    assert!(seen[0].target.starts_with("understory_gadget"));
    assert_eq!(seen[0].field("class"), Some("Thing"));
}

#[test]
fn duplicate_singleton_warns_but_world_does_not() {
    let ctx = Context::new();
    let class = ClassBuilder::new("World").build();
    let seen = capture(|| {
        ctx.register_singleton("audio", 1);
        ctx.register_singleton("audio", 2);

        let first = class.construct_in(&ctx, &Props::new()).unwrap();
        let second = class.construct_in(&ctx, &Props::new()).unwrap();
        assert!(ctx.set_world(first).is_none());
        assert!(ctx.set_world(second.clone()).is_some());
        assert!(ctx.world().is_some_and(|w| w.ptr_eq(&second)));
    });
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].field("singleton"), Some("audio"));
    assert_eq!(seen[0].field("previous"), Some("Int(1)"));
    assert_eq!(seen[0].field("value"), Some("Int(2)"));
    assert_eq!(ctx.singleton("audio"), Some(Value::Int(2)));
}

#[test]
fn routine_operations_are_quiet() {
    let ctx = Context::new();
    let seen = capture(|| {
        let class = ClassBuilder::new("Quiet").build();
        ctx.register_class(class.clone());
        let g = class.construct_in(&ctx, &Props::new()).unwrap();
        ctx.defaults().add("Quiet", "k", 1);
        g.destroy();
    });
    assert!(seen.is_empty());
}
