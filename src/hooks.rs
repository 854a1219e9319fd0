//! Custom define/decode hooks for `flagcustom` fields.
//!
//! Each options struct registers hooks for its own fields in
//! [`Options::hooks`](crate::Options::hooks), keyed by field name. Hooks are
//! bound per field: two fields of the same custom type each get their own
//! pair, so there is no ambiguity to resolve.
//!
//! ```ignore
//! fn hooks(hooks: &mut Hooks) {
//!     hooks
//!         .define_flag("mode", |ctx| (Arg::new("mode").value_name("MODE"), "run mode".into()))
//!         .decode("mode", |raw: &RawValue| raw.text().unwrap_or_default().parse::<Mode>());
//! }
//! ```
//!
//! A define hook comes in two shapes. [`DefineHook::Flag`] returns an `Arg`
//! template plus a description and lets the engine stamp the id, long name,
//! shorthand and heading. [`DefineHook::Command`] receives the command and
//! must add the flag itself under [`DefineContext::flag`].
//!
//! The decode hook turns a [`RawValue`] into the field's value. Its output
//! type is recorded on registration and checked against the field when the
//! schema is walked.

use std::any::TypeId;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use clap::{Arg, Command};
use serde::Serialize;

use crate::error::{BoxError, DefinitionError};

/// A raw, undecoded value as it came from one source.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// A single string from the command line, the environment or a tag default.
    Text(String),
    /// Repeated or delimited command-line values.
    List(Vec<String>),
    /// A value from the configuration file.
    Config(toml::Value),
    /// Occurrence count of a `flagtype:"count"` flag.
    Count(u8),
}

impl RawValue {
    /// The string payload, when this value is a single string.
    pub fn text(&self) -> Option<&str> {
        match self {
            RawValue::Text(s) => Some(s),
            RawValue::Config(toml::Value::String(s)) => Some(s),
            RawValue::List(items) if items.len() == 1 => Some(&items[0]),
            _ => None,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Text(s) => f.write_str(s),
            RawValue::List(items) => f.write_str(&items.join(",")),
            RawValue::Config(toml::Value::String(s)) => f.write_str(s),
            RawValue::Config(other) => write!(f, "{other}"),
            RawValue::Count(n) => write!(f, "{n}"),
        }
    }
}

/// What a define hook knows about the flag it is defining.
#[derive(Debug, Clone)]
pub struct DefineContext<'a> {
    /// Arg id and long name the engine uses for the field.
    pub flag: &'a str,
    /// Dotted field path.
    pub field: &'a str,
    pub short: Option<char>,
    pub description: Option<&'a str>,
    pub default: Option<&'a str>,
    pub group: Option<&'a str>,
    pub env: Option<&'a str>,
    /// The field's current value, serialized.
    pub current: &'a serde_json::Value,
}

type DefineFlagFn = dyn Fn(&DefineContext<'_>) -> (Arg, String) + Send + Sync;
type DefineCommandFn = dyn Fn(Command, &DefineContext<'_>) -> Command + Send + Sync;
type DecodeFn = dyn Fn(&RawValue) -> Result<serde_json::Value, BoxError> + Send + Sync;

#[derive(Clone)]
pub enum DefineHook {
    Flag(Arc<DefineFlagFn>),
    Command(Arc<DefineCommandFn>),
}

impl fmt::Debug for DefineHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefineHook::Flag(_) => f.write_str("DefineHook::Flag"),
            DefineHook::Command(_) => f.write_str("DefineHook::Command"),
        }
    }
}

#[derive(Clone)]
pub struct DecodeHook {
    f: Arc<DecodeFn>,
    output: TypeId,
    output_name: &'static str,
}

impl DecodeHook {
    pub fn call(&self, raw: &RawValue) -> Result<serde_json::Value, BoxError> {
        (self.f)(raw)
    }

    pub fn output_name(&self) -> &'static str {
        self.output_name
    }
}

impl fmt::Debug for DecodeHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeHook")
            .field("output", &self.output_name)
            .finish()
    }
}

/// Hooks registered by one options struct, keyed by field name.
#[derive(Debug, Default, Clone)]
pub struct Hooks {
    define: BTreeMap<String, DefineHook>,
    decode: BTreeMap<String, DecodeHook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_flag<F>(&mut self, field: &str, hook: F) -> &mut Self
    where
        F: Fn(&DefineContext<'_>) -> (Arg, String) + Send + Sync + 'static,
    {
        self.define
            .insert(field.to_string(), DefineHook::Flag(Arc::new(hook)));
        self
    }

    pub fn define_command<F>(&mut self, field: &str, hook: F) -> &mut Self
    where
        F: Fn(Command, &DefineContext<'_>) -> Command + Send + Sync + 'static,
    {
        self.define
            .insert(field.to_string(), DefineHook::Command(Arc::new(hook)));
        self
    }

    pub fn decode<T, E, F>(&mut self, field: &str, hook: F) -> &mut Self
    where
        T: Serialize + 'static,
        E: Into<BoxError>,
        F: Fn(&RawValue) -> Result<T, E> + Send + Sync + 'static,
    {
        let f = move |raw: &RawValue| -> Result<serde_json::Value, BoxError> {
            let value = hook(raw).map_err(Into::into)?;
            serde_json::to_value(value).map_err(|e| Box::new(e) as BoxError)
        };
        self.decode.insert(
            field.to_string(),
            DecodeHook {
                f: Arc::new(f),
                output: TypeId::of::<T>(),
                output_name: std::any::type_name::<T>(),
            },
        );
        self
    }

    /// Field names that have at least one hook registered.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        let mut names: Vec<&str> = self
            .define
            .keys()
            .chain(self.decode.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        names.into_iter()
    }

    pub fn is_empty(&self) -> bool {
        self.define.is_empty() && self.decode.is_empty()
    }
}

/// The resolved hook pair of one custom field.
#[derive(Debug, Clone)]
pub struct CustomHooks {
    pub define: DefineHook,
    pub decode: DecodeHook,
}

pub fn define_hook_name(name: &str) -> String {
    format!("define_{name}")
}

pub fn decode_hook_name(name: &str) -> String {
    format!("decode_{name}")
}

/// Look up and check the hooks of a custom field.
///
/// `name` is the field name within its struct, `path` the dotted path used
/// in errors, `value_type` the type the decode hook must produce.
pub fn bind_custom(
    hooks: &Hooks,
    name: &str,
    path: &str,
    value_type: (TypeId, &'static str),
) -> Result<CustomHooks, DefinitionError> {
    let define = hooks
        .define
        .get(name)
        .cloned()
        .ok_or_else(|| DefinitionError::MissingHook {
            field: path.to_string(),
            hook: define_hook_name(name),
        })?;
    let decode = hooks
        .decode
        .get(name)
        .cloned()
        .ok_or_else(|| DefinitionError::MissingHook {
            field: path.to_string(),
            hook: decode_hook_name(name),
        })?;

    let (expected, expected_name) = value_type;
    if decode.output != expected {
        return Err(DefinitionError::InvalidHookSignature {
            field: path.to_string(),
            hook: decode_hook_name(name),
            reason: format!(
                "returns `{}` but the field holds `{expected_name}`",
                decode.output_name
            ),
        });
    }

    Ok(CustomHooks { define, decode })
}

/// Warn about hooks registered for fields that are not `flagcustom`.
pub fn warn_unused(hooks: &Hooks, custom_fields: &[&str], owner: &str) {
    for name in hooks.fields() {
        if !custom_fields.contains(&name) {
            tracing::warn!(
                field = %name,
                owner = %owner,
                "hook registered for a field that is not flagcustom; ignoring it"
            );
        }
    }
}
