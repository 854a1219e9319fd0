//! Command-line flags, environment variables and config keys derived from one
//! options struct.
//!
//! Structcli registers a clap flag for every field of an options struct, then
//! fills the struct from the command line, the environment, a TOML config
//! file and the defaults declared on the fields, in that order of precedence.
//!
//! ```ignore
//! let mut app = Structcli::builder().app_name("myapp").build()?;
//! let scope = Scope::command("serve");
//! let cmd = app.define::<ServeOptions>(&scope, Command::new("serve"))?;
//!
//! let matches = cmd.get_matches();
//! app.load_config_from(&matches)?;
//!
//! let mut opts = ServeOptions::default();
//! if app.unmarshal(&scope, &matches, &mut opts)?.should_exit() {
//!     return Ok(());
//! }
//! ```
//!
//! # Declaring options
//!
//! An options struct is a plain serde struct that implements [`Options`]. Its
//! [`schema()`](Options::schema) lists the fields in declaration order with
//! Go-style struct tags:
//!
//! ```ignore
//! #[derive(Serialize, Deserialize, Default, Clone)]
//! struct ServeOptions {
//!     port: u16,
//!     timeout: Duration,
//!     database: DatabaseOptions,
//! }
//!
//! impl Options for ServeOptions {
//!     fn schema() -> Schema {
//!         Schema::new()
//!             .field::<u16>("port", r#"flagshort:"p" flagdefault:"8080" flagenv:"true""#)
//!             .field::<Duration>("timeout", r#"flagdescr:"request timeout" default:"30s""#)
//!             .nested::<DatabaseOptions>("database", r#"flaggroup:"Database""#)
//!     }
//! }
//! ```
//!
//! The type parameter of [`Schema::field`] picks the built-in handling:
//! booleans, integers up to 64 bits, floats, strings, paths,
//! [`Duration`](std::time::Duration) (`1h30m`, `250ms`), [`LogLevel`] and
//! lists of scalars. `Option<T>` fields behave like `T`. Anything else needs
//! `flagcustom:"true"` and a pair of hooks.
//!
//! ## Tags
//!
//! | Tag | Meaning |
//! |-----|---------|
//! | `flag` | explicit flag name; on a nested struct, replaces the prefix |
//! | `flagshort` | one-character shorthand |
//! | `flagdescr` | help text |
//! | `flagdefault` / `default` | literal default |
//! | `flagrequired` | must come from a flag, env or config |
//! | `flagenv` | bind `{APP}_{SCOPE}_{FLAG}` |
//! | `flaggroup` | help heading; inherited by nested fields |
//! | `flagignore` | skip the field entirely |
//! | `flagcustom` | use the field's define and decode hooks |
//! | `flagtype` | `count` for `-vvv` style counters |
//! | `validate`, `mod` | passed to [`Options::validate`] / [`Options::transform`] |
//!
//! Boolean tags accept `1 t T TRUE true True` and `0 f F FALSE false False`.
//! Contradictory tags (`flagignore` with `flagenv`, `flagcustom` with
//! `flagtype:"count"`, both `default` and `flagdefault`) are definition
//! errors.
//!
//! ## Flag names
//!
//! Field names become kebab-case flags. Nested fields are prefixed with the
//! path of their parents, joined by dots: `database.max_conns` becomes
//! `--database.max-conns`. A `flag` tag on a leaf replaces the whole name; a
//! `flag` tag on a nested struct replaces its prefix. Two fields with the same
//! flag name, or the same shorthand, fail with
//! [`DefinitionError::DuplicateFlag`] / [`DefinitionError::DuplicateShorthand`]
//! naming both fields. `--help` and `-h` are reserved.
//!
//! # Precedence
//!
//! ```text
//! Current value         whatever the struct held before unmarshal
//!        ↑ overridden by
//! Tag default           flagdefault / default
//!        ↑ overridden by
//! Config file           [scope] section first, then the root table
//!        ↑ overridden by
//! Environment           {APP}_{SCOPE}_{FLAG}, only with flagenv
//!        ↑ overridden by
//! Command line          --flag
//! ```
//!
//! The first source that has a value wins; values from different sources are
//! never merged within one field. Every raw value, wherever it came from,
//! goes through the same decoder, so `--timeout 5m`, `MYAPP_TIMEOUT=5m` and
//! `timeout = "5m"` behave alike. Decode failures name the field, the flag,
//! the rejected literal and the expected type, and leave the target
//! untouched.
//!
//! ## Config keys
//!
//! Within a table, a field is looked up by its flag name (`db-url`), then by
//! its dotted field path as a literal key (`"database.url"`), then by walking
//! nested tables (`[database] url = ...`). Subcommand options look in the
//! `[serve]` section before the root table.
//!
//! The config file is found by [`Structcli::load_config`]: an explicit path
//! (`--config`), then `{APP}_CONFIG`, then the search paths in
//! priority-ascending order. See [`SearchPath`].
//!
//! # Custom fields
//!
//! A `flagcustom` field gets its flag from a define hook and its value from a
//! decode hook, both registered in [`Options::hooks`]:
//!
//! ```ignore
//! fn hooks(hooks: &mut Hooks) {
//!     hooks
//!         .define_flag("mode", |_ctx| (Arg::new("mode").value_name("MODE"), "run mode".into()))
//!         .decode("mode", |raw: &RawValue| raw.to_string().parse::<Mode>());
//! }
//! ```
//!
//! A missing hook fails with [`DefinitionError::MissingHook`]; a decode hook
//! returning the wrong type fails with
//! [`DefinitionError::InvalidHookSignature`]. Both surface from
//! [`Structcli::define`], long before any value is parsed.
//!
//! # After resolution
//!
//! [`Options::transform`] runs first and receives the `mod` tags. Then
//! [`Options::validate`] runs with the `validate` tags; every error it returns
//! is collected into one [`ValidationError`] named after the command. With
//! the `validator` feature, [`validate::run`] forwards to a
//! `validator::Validate` derive.
//!
//! Options types that set [`Options::PROPAGATE`] are stored in the
//! [`Context`] passed to [`Structcli::unmarshal_in`], so subcommands can read
//! their parent's options.
//!
//! # Debug output
//!
//! `--debug-options` (see [`CommonArgs`]) or `{APP}_DEBUG_OPTIONS=true`
//! prints a [`DebugReport`] to stderr on every unmarshal: aliases, flags
//! given, env variables, config keys in lookup order, defaults and final
//! values with their source. With `=exit`, unmarshal returns
//! [`Outcome::Exit`] and the caller is expected to skip the command body.
//!
//! # Error handling
//!
//! Definition problems are [`DefinitionError`]s and stop flag registration.
//! Everything else is a [`StructcliError`]. With the `rich-errors` feature
//! both implement `miette::Diagnostic`.

pub mod cli;
pub mod context;
pub mod debug;
pub mod decode;
pub mod define;
pub mod env;
pub mod error;
pub mod file;
pub mod hooks;
pub mod registry;
pub mod resolve;
pub mod schema;
pub mod tag;
pub mod types;
#[cfg(feature = "validator")]
pub mod validate;
pub mod walk;

mod builder;
mod tree;

#[cfg(test)]
mod fixtures;

pub use builder::{Structcli, StructcliBuilder};
pub use cli::CommonArgs;
pub use context::Context;
pub use debug::DebugReport;
pub use define::{Annotations, Plan, PlannedField};
pub use env::EnvSnapshot;
pub use error::{BoxError, DefinitionError, ErrorKind, StructcliError, ValidationError};
pub use file::ConfigSource;
pub use hooks::{DecodeHook, DefineContext, DefineHook, Hooks, RawValue};
pub use resolve::{ResolveInput, Source};
pub use schema::{Directives, FieldType, Kind, ListElem, Options, Schema};
pub use tag::{TagInput, Tags};
pub use types::{DebugMode, LogLevel, Outcome, Scope, SearchPath};
pub use walk::Descriptor;
