//! Precedence resolution: flag > env > config > default.
//!
//! Operates on pre-loaded data ([`ResolveInput`]) with no I/O, so the full
//! pipeline is testable with synthetic inputs. For each planned field:
//!
//! 1. the flag, if it was given on the command line
//! 2. `{APP}_{SCOPE}_{FLAG}`, if the field is `flagenv` and the variable is
//!    set and non-empty
//! 3. the config file (see [`ConfigSource::lookup`])
//! 4. the tag default
//! 5. otherwise the field keeps its current value
//!
//! The first source that yields a value wins. Every value goes through the
//! field's decoder and is written into a serialized copy of the target; the
//! target is replaced only once the whole copy deserializes. Then the
//! target's transform and validate hooks run.

use std::fmt;
use std::path::PathBuf;

use clap::ArgMatches;
use clap::parser::ValueSource;
use serde_json::Value;

use crate::context::Context;
use crate::debug::DebugReport;
use crate::define::{Plan, PlannedField};
use crate::env::EnvSnapshot;
use crate::error::{StructcliError, ValidationError};
use crate::file::ConfigSource;
use crate::hooks::RawValue;
use crate::schema::{Kind, Options};
use crate::tree;
use crate::types::{DebugMode, Outcome};
use crate::walk::Descriptor;

/// All pre-loaded data needed to resolve a command's options. No I/O happens here.
#[derive(Debug, Clone, Copy)]
pub struct ResolveInput<'a> {
    /// Matches of the command the options were defined on.
    pub matches: &'a ArgMatches,
    pub env: &'a EnvSnapshot,
    pub config: Option<&'a ConfigSource>,
}

/// Where a field's value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Flag,
    Env(String),
    Config { key: String, path: Option<PathBuf> },
    Default,
    Unchanged,
}

impl Source {
    /// Whether this source satisfies `flagrequired`.
    pub fn is_explicit(&self) -> bool {
        matches!(self, Source::Flag | Source::Env(_) | Source::Config { .. })
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Flag => write!(f, "flag"),
            Source::Env(var) => write!(f, "env {var}"),
            Source::Config {
                key,
                path: Some(path),
            } => write!(f, "config {key} ({})", path.display()),
            Source::Config { key, path: None } => write!(f, "config {key}"),
            Source::Default => write!(f, "default"),
            Source::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Find the winning source of one field without decoding it.
pub fn locate(plan: &Plan, field: &PlannedField, input: &ResolveInput<'_>) -> (Source, Option<RawValue>) {
    let d = &field.descriptor;

    if let Some(raw) = from_command_line(input.matches, d) {
        return (Source::Flag, Some(raw));
    }

    if let Some(var) = &field.annotations.env
        && let Some(value) = input.env.get(var)
    {
        return (Source::Env(var.clone()), Some(RawValue::Text(value.to_string())));
    }

    if let Some(config) = input.config
        && let Some(hit) = config.lookup(&plan.scope, &d.flag, &d.path)
    {
        let source = Source::Config {
            key: hit.key,
            path: config.path().map(|p| p.to_path_buf()),
        };
        return (source, Some(RawValue::Config(hit.value.clone())));
    }

    if let Some(default) = &d.default {
        return (Source::Default, Some(RawValue::Text(default.clone())));
    }

    (Source::Unchanged, None)
}

pub(crate) fn from_command_line(matches: &ArgMatches, d: &Descriptor) -> Option<RawValue> {
    let id = d.flag.as_str();
    // Asking clap about an id it does not know panics in debug builds.
    if !matches.ids().any(|known| known.as_str() == id) {
        return None;
    }
    if matches.value_source(id) != Some(ValueSource::CommandLine) {
        return None;
    }
    if d.count {
        return count(matches, id);
    }

    let values: Vec<String> = match matches.try_get_raw(id) {
        Ok(Some(raw)) => raw.map(|v| v.to_string_lossy().into_owned()).collect(),
        _ => Vec::new(),
    };
    match (d.kind, values.len()) {
        (Kind::List(_), _) => Some(RawValue::List(values)),
        (_, 0) => count(matches, id).or_else(|| Some(presence(matches, id))),
        (_, 1) => values.into_iter().next().map(RawValue::Text),
        _ => Some(RawValue::List(values)),
    }
}

fn count(matches: &ArgMatches, id: &str) -> Option<RawValue> {
    matches
        .try_get_one::<u8>(id)
        .ok()
        .flatten()
        .map(|n| RawValue::Count(*n))
}

/// A value-less flag from a custom template (`SetTrue`, `SetFalse`).
fn presence(matches: &ArgMatches, id: &str) -> RawValue {
    let given = matches
        .try_get_one::<bool>(id)
        .ok()
        .flatten()
        .copied()
        .unwrap_or(true);
    RawValue::Text(given.to_string())
}

/// Resolved values written into a serialized copy of the target.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub tree: Value,
    /// `(dotted path, source)` per planned field, in plan order.
    pub sources: Vec<(String, Source)>,
    /// Flags of `flagrequired` fields that no flag, env or config provided.
    pub missing: Vec<String>,
}

impl Resolution {
    /// `Err(MissingRequired)` naming every unsatisfied required flag.
    pub fn check_required(&self) -> Result<(), StructcliError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(StructcliError::MissingRequired {
                flags: self.missing.clone(),
            })
        }
    }
}

/// Resolve every field of `plan` into `tree`.
///
/// Fails on the first value that does not decode, before anything reaches
/// the caller's struct. Missing required fields are collected into
/// [`Resolution::missing`] instead of failing, so a debug report can still be
/// rendered for them.
pub fn resolve_tree(
    plan: &Plan,
    input: &ResolveInput<'_>,
    mut tree: Value,
) -> Result<Resolution, StructcliError> {
    let mut missing = Vec::new();
    let mut sources = Vec::with_capacity(plan.fields.len());

    for field in &plan.fields {
        let d = &field.descriptor;
        let (source, raw) = locate(plan, field, input);

        if d.required && !source.is_explicit() {
            missing.push(d.flag.clone());
        }

        if let Some(raw) = raw {
            let value = d
                .decoder
                .decode(&raw)
                .map_err(|reason| StructcliError::Decode {
                    field: d.dotted(),
                    flag: d.flag.clone(),
                    value: raw.to_string(),
                    expected: d.decoder.expected(),
                    reason,
                })?;
            tree::set_path(&mut tree, &d.path, value, &plan.nested)?;
        }

        tracing::debug!(field = %d.dotted(), source = %source, "resolved field");
        sources.push((d.dotted(), source));
    }

    Ok(Resolution {
        tree,
        sources,
        missing,
    })
}

pub(crate) fn to_tree<T: Options>(target: &T) -> Result<Value, StructcliError> {
    serde_json::to_value(target).map_err(|e| StructcliError::Tree {
        path: String::new(),
        reason: e.to_string(),
    })
}

/// Populate `target` from the sources in `input`.
///
/// On a decode error, a missing required value or a transform error the
/// target is left untouched. Validation runs on the populated target, so a
/// [`ValidationError`] still leaves the resolved values in place.
pub fn unmarshal<T: Options>(
    plan: &Plan,
    input: &ResolveInput<'_>,
    target: &mut T,
    debug: DebugMode,
    ctx: Option<&mut Context>,
) -> Result<Outcome, StructcliError> {
    let resolution = resolve_tree(plan, input, to_tree(&*target)?)?;

    if !resolution.missing.is_empty() {
        if debug.is_on() {
            let report = DebugReport::new(plan, &resolution.tree, &resolution.sources, input);
            eprint!("{report}");
            if debug == DebugMode::Exit {
                return Ok(Outcome::Exit);
            }
        }
        resolution.check_required()?;
    }

    let mut value: T = serde_path_to_error::deserialize(resolution.tree).map_err(|e| {
        StructcliError::Tree {
            path: e.path().to_string(),
            reason: e.inner().to_string(),
        }
    })?;
    value
        .transform(&plan.transforms)
        .map_err(StructcliError::Transform)?;
    *target = value;

    if debug.is_on() {
        let report = DebugReport::new(plan, &to_tree(&*target)?, &resolution.sources, input);
        eprint!("{report}");
        if debug == DebugMode::Exit {
            return Ok(Outcome::Exit);
        }
    }

    let errors = target.validate(&plan.validations);
    if !errors.is_empty() {
        return Err(ValidationError::new(Some(plan.context_name()), errors).into());
    }

    if T::PROPAGATE
        && let Some(ctx) = ctx
    {
        ctx.insert(target.clone());
    }
    Ok(Outcome::Continue)
}
