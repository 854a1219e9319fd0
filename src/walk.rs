//! Struct walking and flag-name flattening.
//!
//! [`walk`] visits an options schema depth first, in declaration order, and
//! produces one [`Descriptor`] per leaf field. Nested structs are descended
//! into; their flag-style name becomes the prefix of their children's names:
//!
//! ```text
//! ServeOptions
//!   port                          --port
//!   database  (nested)
//!     url                         --database.url
//!     max_conns                   --database.max-conns
//!   cache     (nested, flag:"c")
//!     ttl                         --c.ttl
//!   token     (flag:"api-token")  --api-token
//! ```
//!
//! A `flag` tag on a leaf is used verbatim. On a nested field it replaces the
//! whole prefix for that subtree. After the walk every flag name and shorthand
//! must be unique.

use std::collections::HashMap;

use heck::ToKebabCase;

use crate::cli::{CONFIG_FLAG, DEBUG_FLAG};
use crate::decode::Decoder;
use crate::error::DefinitionError;
use crate::hooks::{self, DefineHook, Hooks};
use crate::schema::{Kind, Node, Options, Schema, ZeroFn};
use crate::tag::{self, FieldTags, Tags};

/// Normalized metadata of one leaf field.
#[derive(Debug, Clone)]
pub struct Descriptor {
    /// Field names from the root struct to this leaf.
    pub path: Vec<&'static str>,
    pub flag: String,
    pub short: Option<char>,
    pub description: Option<String>,
    pub default: Option<String>,
    pub required: bool,
    pub env: bool,
    pub group: Option<String>,
    pub custom: bool,
    pub count: bool,
    pub kind: Kind,
    pub optional: bool,
    pub type_name: &'static str,
    pub validate: Option<String>,
    pub transform: Option<String>,
    pub decoder: Decoder,
    pub define: Option<DefineHook>,
}

impl Descriptor {
    /// Field names joined with `.`, e.g. `database.url`.
    pub fn dotted(&self) -> String {
        self.path.join(".")
    }

    /// The leaf's own field name.
    pub fn name(&self) -> &'static str {
        self.path.last().copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NestedNode {
    pub path: Vec<&'static str>,
    pub zero: ZeroFn,
}

/// Result of walking one options type.
#[derive(Debug, Clone, Default)]
pub struct Walk {
    pub descriptors: Vec<Descriptor>,
    pub(crate) nested: Vec<NestedNode>,
}

/// Walk `T`'s schema into descriptors.
pub fn walk<T: Options>() -> Result<Walk, DefinitionError> {
    let mut out = Walk::default();
    let mut level = Level {
        owner: std::any::type_name::<T>(),
        path: Vec::new(),
        prefix: String::new(),
        group: None,
    };
    visit(T::schema(), T::hooks, &mut level, &mut out)?;
    check_unique(&out.descriptors)?;
    tracing::debug!(
        target_type = level.owner,
        fields = out.descriptors.len(),
        "walked options schema"
    );
    Ok(out)
}

struct Level {
    owner: &'static str,
    path: Vec<&'static str>,
    prefix: String,
    group: Option<String>,
}

fn visit(
    schema: Schema,
    register: fn(&mut Hooks),
    level: &mut Level,
    out: &mut Walk,
) -> Result<(), DefinitionError> {
    let mut hooks = Hooks::new();
    register(&mut hooks);
    let mut custom_fields = Vec::new();

    for entry in schema.entries {
        let mut path = level.path.clone();
        path.push(entry.name);
        let dotted = path.join(".");
        let tags = entry.tags.resolve(&dotted)?;
        let field = FieldTags::from_tags(&dotted, &tags)?;

        if field.ignore {
            tracing::debug!(field = %dotted, "ignored field");
            continue;
        }

        match entry.node {
            Node::Nested {
                schema,
                hooks: register_child,
                zero,
                type_name,
            } => {
                check_nested_tags(&dotted, &tags, &field, type_name)?;
                let prefix = match &field.flag {
                    Some(flag) => {
                        check_name(&dotted, flag)?;
                        flag.clone()
                    }
                    None => join(&level.prefix, &entry.name.to_kebab_case()),
                };
                out.nested.push(NestedNode {
                    path: path.clone(),
                    zero,
                });
                let mut child = Level {
                    owner: type_name,
                    path,
                    prefix,
                    group: field.group.clone().or_else(|| level.group.clone()),
                };
                visit(schema(), register_child, &mut child, out)?;
            }
            Node::Leaf {
                kind,
                optional,
                value_type,
                type_name,
            } => {
                let flag = match &field.flag {
                    Some(flag) => flag.clone(),
                    None => join(&level.prefix, &entry.name.to_kebab_case()),
                };
                check_name(&dotted, &flag)?;

                if field.count && !kind.is_int() {
                    return Err(DefinitionError::UnsupportedType {
                        field: dotted,
                        type_name: type_name.to_string(),
                    });
                }

                let (decoder, define) = if field.custom {
                    let bound =
                        hooks::bind_custom(&hooks, entry.name, &dotted, (value_type, type_name))?;
                    custom_fields.push(entry.name);
                    (Decoder::Custom(bound.decode), Some(bound.define))
                } else if kind == Kind::Opaque {
                    return Err(DefinitionError::UnsupportedType {
                        field: dotted,
                        type_name: type_name.to_string(),
                    });
                } else {
                    (Decoder::for_kind(kind), None)
                };

                tracing::debug!(field = %dotted, flag = %flag, "descriptor");
                out.descriptors.push(Descriptor {
                    path,
                    flag,
                    short: field.short,
                    description: field.descr,
                    default: field.default,
                    required: field.required,
                    env: field.env,
                    group: field.group.or_else(|| level.group.clone()),
                    custom: field.custom,
                    count: field.count,
                    kind,
                    optional,
                    type_name,
                    validate: field.validate,
                    transform: field.transform,
                    decoder,
                    define,
                });
            }
        }
    }

    hooks::warn_unused(&hooks, &custom_fields, level.owner);
    Ok(())
}

/// Tags that only make sense on a leaf field.
const LEAF_ONLY: [&str; 6] = [
    tag::FLAG_SHORT,
    tag::FLAG_REQUIRED,
    tag::FLAG_ENV,
    tag::FLAG_DEFAULT,
    tag::DEFAULT,
    tag::FLAG_TYPE,
];

/// Nested structs accept `flag`, `flaggroup` and `flagignore`. A custom
/// nested struct has no flag of its own to bind hooks to.
fn check_nested_tags(
    field: &str,
    tags: &Tags,
    parsed: &FieldTags,
    type_name: &'static str,
) -> Result<(), DefinitionError> {
    if parsed.custom {
        return Err(DefinitionError::UnsupportedType {
            field: field.to_string(),
            type_name: type_name.to_string(),
        });
    }
    let offending: Vec<String> = LEAF_ONLY
        .iter()
        .filter(|t| tags.contains(t))
        .map(|t| t.to_string())
        .collect();
    if offending.is_empty() {
        Ok(())
    } else {
        Err(DefinitionError::ConflictingTags {
            field: field.to_string(),
            tags: offending,
        })
    }
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

/// `[A-Za-z0-9][A-Za-z0-9.-]*`
pub fn is_valid_flag_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

fn check_name(field: &str, name: &str) -> Result<(), DefinitionError> {
    if is_valid_flag_name(name) {
        Ok(())
    } else {
        Err(DefinitionError::InvalidFlagName {
            field: field.to_string(),
            name: name.to_string(),
        })
    }
}

/// Flags every command gets from clap or from a parent's
/// [`CommonArgs`](crate::CommonArgs), with the owner reported on a clash.
const RESERVED_FLAGS: [(&str, &str); 3] = [
    ("help", "built-in --help"),
    (CONFIG_FLAG, "global --config"),
    (DEBUG_FLAG, "global --debug-options"),
];
const RESERVED_SHORT: char = 'h';

fn check_unique(descriptors: &[Descriptor]) -> Result<(), DefinitionError> {
    let mut flags: HashMap<&str, String> = RESERVED_FLAGS
        .iter()
        .map(|(flag, owner)| (*flag, owner.to_string()))
        .collect();
    let mut shorts: HashMap<char, String> = HashMap::new();
    shorts.insert(RESERVED_SHORT, "built-in --help".to_string());

    for d in descriptors {
        if let Some(existing) = flags.get(d.flag.as_str()) {
            return Err(DefinitionError::DuplicateFlag {
                flag: d.flag.clone(),
                field: d.dotted(),
                existing: existing.clone(),
            });
        }
        flags.insert(&d.flag, d.dotted());

        if let Some(short) = d.short {
            if let Some(existing) = shorts.get(&short) {
                return Err(DefinitionError::DuplicateShorthand {
                    short,
                    field: d.dotted(),
                    existing: existing.clone(),
                });
            }
            shorts.insert(short, d.dotted());
        }
    }
    Ok(())
}
