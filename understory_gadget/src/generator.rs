// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Declarative construction.
//!
//! A [`Template`] describes a value tree in which some nodes are
//! [`Declaration`]s: "construct class `cls` with these arguments". The
//! context's generator resolves it depth-first, so nested declarations are
//! constructed before the gadget whose arguments contain them.

use tracing::debug;

use crate::context::Context;
use crate::error::GadgetError;
use crate::gadget::Gadget;
use crate::props::Props;
use crate::value::Value;

/// A value tree that may contain class declarations.
#[derive(Clone, Debug)]
pub enum Template {
    /// A literal value.
    Value(Value),
    /// A list of templates; generates a [`Value::List`].
    List(Vec<Template>),
    /// A nested declaration; generates a [`Value::Gadget`].
    Declaration(Declaration),
}

impl From<Value> for Template {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Declaration> for Template {
    fn from(declaration: Declaration) -> Self {
        Self::Declaration(declaration)
    }
}

impl From<Vec<Self>> for Template {
    fn from(items: Vec<Self>) -> Self {
        Self::List(items)
    }
}

/// "Construct the class registered as `class` from `args`."
///
/// # Example
///
/// ```rust
/// use understory_gadget::{ClassBuilder, Context, Declaration, PropertyBuilder, Value};
///
/// let ctx = Context::new();
/// ctx.register_class(
///     ClassBuilder::new("Sprite")
///         .property(PropertyBuilder::new("texture").build())
///         .property(PropertyBuilder::new("child").link().build())
///         .build(),
/// );
///
/// let sprite = ctx
///     .generate_gadget(
///         &Declaration::new("Sprite")
///             .value("texture", "hero.png")
///             .nested("child", Declaration::new("Sprite").value("texture", "hat.png")),
///     )
///     .unwrap();
///
/// let child = sprite.get_as::<understory_gadget::Gadget>("child").unwrap();
/// assert_eq!(child.get("texture"), Some(Value::from("hat.png")));
/// assert!(child.id() < sprite.id());
/// ```
#[derive(Clone, Debug)]
pub struct Declaration {
    /// Registered class name.
    pub class: String,
    /// Construction arguments, in resolution order.
    pub args: Vec<(String, Template)>,
}

impl Declaration {
    /// Starts a declaration of `class` without arguments.
    #[must_use]
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            args: Vec::new(),
        }
    }

    /// Adds an argument.
    #[must_use]
    pub fn arg(mut self, key: impl Into<String>, template: impl Into<Template>) -> Self {
        self.args.push((key.into(), template.into()));
        self
    }

    /// Adds a literal argument.
    #[must_use]
    pub fn value(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arg(key, Template::Value(value.into()))
    }

    /// Adds a nested declaration argument.
    #[must_use]
    pub fn nested(self, key: impl Into<String>, declaration: Self) -> Self {
        self.arg(key, Template::Declaration(declaration))
    }
}

impl Context {
    /// Resolves `template` into a value, constructing declared gadgets in
    /// this context.
    ///
    /// # Errors
    ///
    /// [`GadgetError::UnresolvedReference`] for unregistered classes, or any
    /// construction error. Gadgets already generated for the template are
    /// destroyed before the error is returned.
    pub fn generate(&self, template: &Template) -> Result<Value, GadgetError> {
        let mut built = Vec::new();
        let result = self.resolve(template, &mut built);
        if result.is_err() {
            for gadget in built.iter().rev() {
                gadget.destroy();
            }
        }
        result
    }

    /// Resolves a single declaration into a gadget.
    pub fn generate_gadget(&self, declaration: &Declaration) -> Result<Gadget, GadgetError> {
        match self.generate(&Template::Declaration(declaration.clone()))? {
            Value::Gadget(gadget) => Ok(gadget),
            other => Err(GadgetError::TypeMismatch {
                expected: "gadget",
                found: other.kind_name(),
            }),
        }
    }

    fn resolve(&self, template: &Template, built: &mut Vec<Gadget>) -> Result<Value, GadgetError> {
        match template {
            Template::Value(value) => Ok(value.clone()),
            Template::List(items) => items
                .iter()
                .map(|item| self.resolve(item, built))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::from),
            Template::Declaration(declaration) => {
                let class = self.class(&declaration.class).ok_or_else(|| {
                    GadgetError::UnresolvedReference {
                        class: declaration.class.clone(),
                    }
                })?;
                let mut props = Props::new();
                for (key, arg) in &declaration.args {
                    props.insert(key.as_str(), self.resolve(arg, built)?);
                }
                debug!(class = class.name(), args = declaration.args.len(), "generating gadget");
                let gadget = class.construct_in(self, &props)?;
                built.push(gadget.clone());
                Ok(Value::Gadget(gadget))
            }
        }
    }
}

#[cfg(feature = "json")]
impl Template {
    /// Reads a template from JSON.
    ///
    /// Objects with a `"cls"` string are declarations whose arguments come
    /// from an optional `"args"` object. Arrays become lists, numbers become
    /// integers when they fit and floats otherwise, and other scalars map to
    /// the matching [`Value`]. Any other object is rejected.
    ///
    /// # Example
    ///
    /// ```rust
    /// use understory_gadget::Template;
    ///
    /// let json = serde_json::json!({
    ///     "cls": "Sprite",
    ///     "args": { "texture": "hero.png", "frames": [1, 2, 3] }
    /// });
    /// let template = Template::from_json(&json).unwrap();
    /// assert!(matches!(template, Template::Declaration(ref d) if d.class == "Sprite"));
    ///
    /// assert!(Template::from_json(&serde_json::json!({ "x": 1 })).is_err());
    /// ```
    pub fn from_json(json: &serde_json::Value) -> Result<Self, GadgetError> {
        use serde_json::Value as Json;

        let invalid = |reason: &str| GadgetError::InvalidTemplate {
            reason: reason.into(),
        };
        Ok(match json {
            Json::Null => Self::Value(Value::Null),
            Json::Bool(b) => Self::Value(Value::Bool(*b)),
            Json::Number(n) => Self::Value(match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().ok_or_else(|| invalid("number out of range"))?),
            }),
            Json::String(s) => Self::Value(Value::from(s.as_str())),
            Json::Array(items) => Self::List(items.iter().map(Self::from_json).collect::<Result<_, _>>()?),
            Json::Object(map) => {
                let class = map
                    .get("cls")
                    .ok_or_else(|| invalid("object without `cls`"))?
                    .as_str()
                    .ok_or_else(|| invalid("`cls` must be a string"))?;
                let mut declaration = Declaration::new(class);
                match map.get("args") {
                    None | Some(Json::Null) => {}
                    Some(Json::Object(args)) => {
                        for (key, arg) in args {
                            declaration = declaration.arg(key.as_str(), Self::from_json(arg)?);
                        }
                    }
                    Some(_) => return Err(invalid("`args` must be an object")),
                }
                Self::Declaration(declaration)
            }
        })
    }
}
