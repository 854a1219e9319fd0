//! Flag definition: one clap `Arg` per descriptor.
//!
//! [`define`] walks the options type, registers its flags on a `clap::Command`
//! and returns the [`Plan`] that unmarshalling and debug output work from.
//! Metadata clap has no slot for (group, env binding, decode hook, required)
//! is kept in the plan as [`Annotations`].
//!
//! Flags are plain string flags as far as clap is concerned: decoding happens
//! later, with the same decoder for command-line, environment, config and tag
//! default values, so every source reports errors the same way.

use std::collections::HashMap;

use clap::{Arg, ArgAction, Command};
use serde_json::Value;

use crate::decode;
use crate::env;
use crate::error::{DefinitionError, StructcliError};
use crate::hooks::{DefineContext, DefineHook};
use crate::schema::{Directives, Elem, Kind, Options};
use crate::tree;
use crate::types::Scope;
use crate::walk::{self, Descriptor, NestedNode};

/// Flag metadata clap cannot carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations {
    pub group: Option<String>,
    /// Env variable consulted at unmarshal time; `None` unless `flagenv`.
    pub env: Option<String>,
    /// Built-in decode hook id, or `custom`.
    pub decode_hook: Option<&'static str>,
    pub required: bool,
}

#[derive(Debug, Clone)]
pub struct PlannedField {
    pub descriptor: Descriptor,
    /// Derived env name, recorded whether or not `flagenv` is set.
    pub env_name: String,
    pub annotations: Annotations,
    /// Tag default, or the value the field held at definition time.
    pub default: Option<String>,
    /// Serialized value of the field at definition time.
    pub initial: Value,
}

/// Everything known about one options type in one command.
#[derive(Debug, Clone)]
pub struct Plan {
    pub app_name: String,
    pub scope: Scope,
    pub command: String,
    pub type_name: &'static str,
    pub fields: Vec<PlannedField>,
    pub validations: Directives,
    pub transforms: Directives,
    pub(crate) nested: Vec<NestedNode>,
}

impl Plan {
    pub fn field(&self, flag: &str) -> Option<&PlannedField> {
        self.fields.iter().find(|f| f.descriptor.flag == flag)
    }

    pub fn annotations(&self, flag: &str) -> Option<&Annotations> {
        self.field(flag).map(|f| &f.annotations)
    }

    pub fn flags(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.descriptor.flag.as_str())
    }

    /// Name used in validation messages: the innermost scope segment, or
    /// the command name at the root.
    pub fn context_name(&self) -> String {
        self.scope
            .name()
            .map(String::from)
            .unwrap_or_else(|| self.command.clone())
    }
}

/// Register `T`'s flags on `cmd`. `current` supplies the displayed defaults.
pub fn define<T: Options>(
    app_name: &str,
    scope: &Scope,
    cmd: Command,
    current: &T,
) -> Result<(Command, Plan), StructcliError> {
    let walk = walk::walk::<T>()?;
    let tree = serde_json::to_value(current).map_err(|e| StructcliError::Tree {
        path: String::new(),
        reason: e.to_string(),
    })?;
    check_command(&cmd, &walk.descriptors)?;
    check_env_names(app_name, scope, &walk.descriptors)?;

    let command_name = cmd.get_name().to_string();
    let mut cmd = cmd;
    let mut fields = Vec::with_capacity(walk.descriptors.len());
    let mut validations = Directives::default();
    let mut transforms = Directives::default();

    for d in walk.descriptors {
        let env_name = env::env_name(app_name, scope, &d.flag);
        let current = tree::get_path(&tree, &d.path)
            .cloned()
            .unwrap_or(Value::Null);
        let default = d
            .default
            .clone()
            .or_else(|| decode::render(d.kind, &current));
        let annotations = Annotations {
            group: d.group.clone(),
            env: d.env.then(|| env_name.clone()),
            decode_hook: d.decoder.hook_id(),
            required: d.required,
        };

        cmd = match &d.define {
            Some(hook) => {
                let dotted = d.dotted();
                let ctx = DefineContext {
                    flag: &d.flag,
                    field: &dotted,
                    short: d.short,
                    description: d.description.as_deref(),
                    default: d.default.as_deref(),
                    group: d.group.as_deref(),
                    env: annotations.env.as_deref(),
                    current: &current,
                };
                define_custom(cmd, &d, hook, &ctx)?
            }
            None => cmd.arg(standard_arg(&d, annotations.env.as_deref(), default.as_deref())),
        };
        tracing::debug!(
            command = %command_name,
            flag = %d.flag,
            field = %d.dotted(),
            "registered flag"
        );

        if let Some(v) = &d.validate {
            validations.push(d.dotted(), v.clone());
        }
        if let Some(m) = &d.transform {
            transforms.push(d.dotted(), m.clone());
        }
        fields.push(PlannedField {
            descriptor: d,
            env_name,
            annotations,
            default,
            initial: current,
        });
    }

    let plan = Plan {
        app_name: app_name.to_string(),
        scope: scope.clone(),
        command: command_name,
        type_name: std::any::type_name::<T>(),
        fields,
        validations,
        transforms,
        nested: walk.nested,
    };
    Ok((cmd, plan))
}

/// Flags already on the command count as collisions.
fn check_command(cmd: &Command, descriptors: &[Descriptor]) -> Result<(), DefinitionError> {
    let existing = format!("command {}", cmd.get_name());
    for d in descriptors {
        for arg in cmd.get_arguments() {
            if arg.get_long() == Some(d.flag.as_str()) || arg.get_id() == d.flag.as_str() {
                return Err(DefinitionError::DuplicateFlag {
                    flag: d.flag.clone(),
                    field: d.dotted(),
                    existing,
                });
            }
            if let Some(short) = d.short
                && arg.get_short() == Some(short)
            {
                return Err(DefinitionError::DuplicateShorthand {
                    short,
                    field: d.dotted(),
                    existing,
                });
            }
        }
    }
    Ok(())
}

/// Env names collapse punctuation, so `db-url` and `db.url` would share
/// `APP_DB_URL`. Only `flagenv` fields are checked.
fn check_env_names(
    app_name: &str,
    scope: &Scope,
    descriptors: &[Descriptor],
) -> Result<(), DefinitionError> {
    let mut owners: HashMap<String, String> = HashMap::new();
    for d in descriptors.iter().filter(|d| d.env) {
        let var = env::env_name(app_name, scope, &d.flag);
        if let Some(existing) = owners.get(&var) {
            return Err(DefinitionError::DuplicateEnv {
                var,
                field: d.dotted(),
                existing: existing.clone(),
            });
        }
        owners.insert(var, d.dotted());
    }
    Ok(())
}

fn help_text(d: &Descriptor, env: Option<&str>) -> String {
    let mut parts = Vec::new();
    if let Some(text) = d.description.as_deref().filter(|t| !t.is_empty()) {
        parts.push(text.to_string());
    }
    if d.required {
        parts.push("[required]".to_string());
    }
    if let Some(env) = env {
        parts.push(format!("[env: {env}]"));
    }
    parts.join(" ")
}

fn value_name(kind: Kind) -> &'static str {
    match kind {
        Kind::Bool => "BOOL",
        Kind::Int(k) if k.signed => "INT",
        Kind::Int(_) => "UINT",
        Kind::Float => "FLOAT",
        Kind::Text => "STRING",
        Kind::Duration => "DURATION",
        Kind::LogLevel => "LEVEL",
        Kind::List(Elem::Bool) => "BOOLS",
        Kind::List(Elem::Int(_)) => "INTS",
        Kind::List(Elem::Float) => "FLOATS",
        Kind::List(Elem::Text) => "STRINGS",
        Kind::Opaque => "VALUE",
    }
}

fn stamp(mut arg: Arg, d: &Descriptor) -> Arg {
    arg = arg.id(d.flag.clone()).long(d.flag.clone());
    if let Some(short) = d.short {
        arg = arg.short(short);
    }
    if let Some(group) = &d.group {
        arg = arg.help_heading(group.clone());
    }
    arg
}

fn standard_arg(d: &Descriptor, env: Option<&str>, default: Option<&str>) -> Arg {
    let mut arg = stamp(Arg::new(d.flag.clone()), d).help(help_text(d, env));

    if d.count {
        return arg.action(ArgAction::Count);
    }

    arg = match d.kind {
        Kind::Bool => arg
            .action(ArgAction::Set)
            .num_args(0..=1)
            .require_equals(true)
            .default_missing_value("true"),
        Kind::List(_) => arg.action(ArgAction::Append).value_delimiter(','),
        _ => arg.action(ArgAction::Set),
    }
    .value_name(value_name(d.kind));

    if let Some(default) = default.filter(|v| !v.is_empty()) {
        arg = arg.default_value(default.to_string());
    }
    arg
}

fn define_custom(
    cmd: Command,
    d: &Descriptor,
    hook: &DefineHook,
    ctx: &DefineContext<'_>,
) -> Result<Command, StructcliError> {
    match hook {
        DefineHook::Flag(f) => {
            let (template, description) = f(ctx);
            let mut shown = d.clone();
            if !description.is_empty() {
                shown.description = Some(description);
            }
            let arg = stamp(template, d).help(help_text(&shown, ctx.env));
            Ok(cmd.arg(arg))
        }
        DefineHook::Command(f) => {
            let cmd = f(cmd, ctx);
            if cmd.get_arguments().any(|a| a.get_id() == d.flag.as_str()) {
                Ok(cmd)
            } else {
                Err(DefinitionError::InvalidHookSignature {
                    field: d.dotted(),
                    hook: crate::hooks::define_hook_name(d.name()),
                    reason: format!("hook did not register a flag with id '{}'", d.flag),
                }
                .into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fixtures::test::{DeployOptions, ServeOptions};
    use crate::hooks::Hooks;
    use crate::schema::{FieldType, Schema};
    use serde::{Deserialize, Serialize};

    fn serve() -> (Command, Plan) {
        define(
            "app",
            &Scope::root(),
            Command::new("serve"),
            &ServeOptions::default(),
        )
        .unwrap()
    }

    fn arg<'a>(cmd: &'a Command, id: &str) -> &'a Arg {
        cmd.get_arguments()
            .find(|a| a.get_id() == id)
            .unwrap_or_else(|| panic!("no arg {id}"))
    }

    fn defaults(arg: &Arg) -> Vec<String> {
        arg.get_default_values()
            .iter()
            .map(|v| v.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn one_arg_per_descriptor() {
        let (cmd, plan) = serve();
        assert_eq!(cmd.get_arguments().count(), plan.fields.len());
        for flag in plan.flags() {
            assert_eq!(arg(&cmd, flag).get_long(), Some(flag));
        }
    }

    #[test]
    fn shorthand_and_heading() {
        let (cmd, _) = serve();
        assert_eq!(arg(&cmd, "port").get_short(), Some('p'));
        assert_eq!(arg(&cmd, "db-url").get_help_heading(), Some("Database"));
        assert_eq!(arg(&cmd, "database.maxconns").get_help_heading(), Some("Database"));
        assert_eq!(arg(&cmd, "host").get_help_heading(), None);
    }

    #[test]
    fn defaults_from_tags() {
        let (cmd, plan) = serve();
        assert_eq!(defaults(arg(&cmd, "port")), ["8080"]);
        assert_eq!(defaults(arg(&cmd, "timeout")), ["30s"]);
        assert_eq!(plan.field("c.ttl").unwrap().default.as_deref(), Some("5m"));
    }

    #[test]
    fn defaults_from_current_value() {
        let current = ServeOptions {
            tags: vec!["a".into(), "b".into()],
            ..ServeOptions::default()
        };
        let (cmd, plan) = define("app", &Scope::root(), Command::new("serve"), &current).unwrap();
        assert_eq!(plan.field("tags").unwrap().default.as_deref(), Some("a,b"));
        assert_eq!(defaults(arg(&cmd, "tags")), ["a,b"]);
        // Option<String> = None has nothing to show.
        assert_eq!(plan.field("api-token").unwrap().default, None);
    }

    #[test]
    fn count_flag_action() {
        let (cmd, _) = serve();
        assert!(matches!(arg(&cmd, "verbose").get_action(), ArgAction::Count));
        let m = cmd.try_get_matches_from(["serve", "-vvv"]).unwrap();
        assert_eq!(m.get_count("verbose"), 3);
    }

    #[test]
    fn help_mentions_env() {
        let (cmd, _) = serve();
        let help = arg(&cmd, "port").get_help().unwrap().to_string();
        assert!(help.contains("port to listen on"));
        assert!(help.contains("[env: APP_PORT]"));
        let help = arg(&cmd, "timeout").get_help().unwrap().to_string();
        assert!(!help.contains("env"));
    }

    #[test]
    fn annotations_recorded() {
        let (_, plan) = serve();
        let a = plan.annotations("database.maxconns").unwrap();
        assert_eq!(a.env.as_deref(), Some("APP_DATABASE_MAXCONNS"));
        assert_eq!(a.group.as_deref(), Some("Database"));
        assert_eq!(a.decode_hook, None);
        let t = plan.annotations("timeout").unwrap();
        assert_eq!(t.env, None);
        assert_eq!(t.decode_hook, Some("duration"));
        assert_eq!(plan.field("timeout").unwrap().env_name, "APP_TIMEOUT");
    }

    #[test]
    fn scoped_env_names() {
        let (_, plan) = define(
            "app",
            &Scope::command("srv"),
            Command::new("srv"),
            &ServeOptions::default(),
        )
        .unwrap();
        assert_eq!(
            plan.field("database.maxconns").unwrap().env_name,
            "APP_SRV_DATABASE_MAXCONNS"
        );
        assert_eq!(plan.context_name(), "srv");
    }

    #[test]
    fn bool_flag_forms() {
        #[derive(Debug, Clone, Default, Serialize, Deserialize)]
        struct Flags {
            dry_run: bool,
        }
        impl Options for Flags {
            fn schema() -> Schema {
                Schema::new().field::<bool>("dry_run", "")
            }
        }

        let (cmd, _) = define("app", &Scope::root(), Command::new("x"), &Flags::default()).unwrap();
        let m = cmd.clone().try_get_matches_from(["x", "--dry-run"]).unwrap();
        assert_eq!(
            m.get_raw("dry-run").unwrap().next().and_then(|v| v.to_str()),
            Some("true")
        );
        let m = cmd.try_get_matches_from(["x", "--dry-run=false"]).unwrap();
        assert_eq!(
            m.get_raw("dry-run").unwrap().next().and_then(|v| v.to_str()),
            Some("false")
        );
    }

    #[test]
    fn list_flags_repeat_and_split() {
        let (cmd, _) = serve();
        let m = cmd
            .try_get_matches_from(["serve", "--tags", "a,b", "--tags", "c"])
            .unwrap();
        let values: Vec<_> = m
            .get_raw("tags")
            .unwrap()
            .map(|v| v.to_string_lossy().into_owned())
            .collect();
        assert_eq!(values, ["a", "b", "c"]);
    }

    #[test]
    fn existing_command_flag_collides() {
        let cmd = Command::new("serve").arg(Arg::new("port").long("port"));
        let err = define("app", &Scope::root(), cmd, &ServeOptions::default()).unwrap_err();
        match err {
            StructcliError::Definition(DefinitionError::DuplicateFlag { flag, existing, .. }) => {
                assert_eq!(flag, "port");
                assert_eq!(existing, "command serve");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn existing_command_short_collides() {
        let cmd = Command::new("serve").arg(Arg::new("pretty").long("pretty").short('p'));
        let err = define("app", &Scope::root(), cmd, &ServeOptions::default()).unwrap_err();
        assert_eq!(err.definition_kind(), Some(ErrorKind::DuplicateShorthand));
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct SameEnv {
        a: String,
        b: String,
        c: String,
    }

    impl Options for SameEnv {
        fn schema() -> Schema {
            Schema::new()
                .field::<String>("a", r#"flag:"db-url" flagenv:"true""#)
                .field::<String>("b", r#"flag:"db.url" flagenv:"true""#)
                .field::<String>("c", r#"flag:"db--url""#)
        }
    }

    #[test]
    fn env_names_must_be_unique() {
        let err = define("app", &Scope::root(), Command::new("x"), &SameEnv::default()).unwrap_err();
        match err {
            StructcliError::Definition(DefinitionError::DuplicateEnv { var, field, existing }) => {
                assert_eq!(var, "APP_DB_URL");
                assert_eq!(field, "b");
                assert_eq!(existing, "a");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn custom_hooks_define_flags() {
        let (cmd, plan) = define(
            "app",
            &Scope::root(),
            Command::new("deploy"),
            &DeployOptions::default(),
        )
        .unwrap();
        let mode = arg(&cmd, "mode");
        assert_eq!(mode.get_long(), Some("mode"));
        assert_eq!(mode.get_short(), Some('m'));
        assert!(mode.get_help().unwrap().to_string().contains("deploy mode"));
        assert!(mode.get_help().unwrap().to_string().contains("[env: APP_MODE]"));
        assert_eq!(arg(&cmd, "fallback").get_long(), Some("fallback"));
        assert_eq!(plan.annotations("mode").unwrap().decode_hook, Some("custom"));
        assert!(plan.annotations("replicas").unwrap().required);
    }

    #[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
    struct Level(u8);

    impl FieldType for Level {}

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Forgetful {
        level: Level,
    }

    impl Options for Forgetful {
        fn schema() -> Schema {
            Schema::new().field::<Level>("level", r#"flagcustom:"true""#)
        }

        fn hooks(hooks: &mut Hooks) {
            hooks
                .define_command("level", |cmd, _ctx| cmd)
                .decode("level", |raw: &crate::hooks::RawValue| {
                    raw.to_string().parse::<u8>().map(Level)
                });
        }
    }

    #[test]
    fn command_hook_must_register_its_flag() {
        let err = define("app", &Scope::root(), Command::new("x"), &Forgetful::default()).unwrap_err();
        assert_eq!(err.definition_kind(), Some(ErrorKind::InvalidHookSignature));
        assert!(err.to_string().contains("define_level"));
    }

    #[test]
    fn directives_collected() {
        let (_, plan) = define(
            "app",
            &Scope::root(),
            Command::new("x"),
            &crate::fixtures::test::CheckedOptions::default(),
        )
        .unwrap();
        assert_eq!(plan.transforms.get("name"), Some("trim,lower"));
        assert_eq!(plan.validations.get("port"), Some("min=1"));
    }
}
