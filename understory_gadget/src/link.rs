// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Parent/child notification links.
//!
//! A link is a listener on the child's "modified" emitter that re-raises each
//! change on the parent with the key path-qualified. The listener only holds a
//! weak reference to the parent, so links never keep parents alive; the
//! parent keeps the [`Link`] and releases it when the slot changes.

use std::rc::Rc;

use understory_emitter::{Emitter, Event, ListenerId};

use crate::array::WeakArray;
use crate::change::Modified;
use crate::gadget::WeakGadget;
use crate::value::Value;

/// Subscription of a parent slot to a child's "modified" emitter.
pub(crate) enum Link {
    Gadget {
        emitter: Emitter<Modified, WeakGadget>,
        id: ListenerId,
    },
    Array {
        emitter: Emitter<Modified, WeakArray>,
        id: ListenerId,
    },
}

impl Link {
    /// Unsubscribes from the child.
    pub(crate) fn release(self) {
        match self {
            Self::Gadget { emitter, id } => {
                emitter.ignore(id);
            }
            Self::Array { emitter, id } => {
                emitter.ignore(id);
            }
        }
    }
}

/// Where relayed changes go.
pub(crate) enum Relay {
    /// A gadget property; `eventable` is the flag of the linking property.
    Gadget { owner: WeakGadget, eventable: bool },
    /// A reactive array slot.
    Array(WeakArray),
}

impl Relay {
    fn forward(&self, prefix: &str, nested: &Modified) {
        match self {
            Self::Gadget { owner, eventable } => {
                if !*eventable {
                    return;
                }
                if let Some(owner) = owner.upgrade()
                    && owner.is_ready()
                {
                    owner.emit_modified(nested.qualified(prefix));
                }
            }
            Self::Array(owner) => {
                if let Some(owner) = owner.upgrade() {
                    owner.emit_modified(nested.qualified(prefix));
                }
            }
        }
    }
}

/// Links `value` to `relay` under `prefix`.
///
/// Returns `None` for values that are not gadgets or arrays.
pub(crate) fn establish(value: &Value, relay: Relay, prefix: Rc<str>) -> Option<Link> {
    match value {
        Value::Gadget(child) => {
            let emitter = child.modified();
            let id = emitter.listen(move |event: &Event<Modified, WeakGadget>| {
                relay.forward(&prefix, &event.payload);
            });
            Some(Link::Gadget { emitter, id })
        }
        Value::Array(child) => {
            let emitter = child.modified();
            let id = emitter.listen(move |event: &Event<Modified, WeakArray>| {
                relay.forward(&prefix, &event.payload);
            });
            Some(Link::Array { emitter, id })
        }
        _ => None,
    }
}
