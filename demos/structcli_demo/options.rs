//! Options structs for the structcli demo application.
//!
//! [`RootOptions`] belongs to the root command and is propagated to the
//! subcommands through the [`Context`](structcli::Context).
//! [`ServeOptions`] nests a [`DatabaseOptions`] and has one custom-typed
//! field, [`Color`], with its own define and decode hooks.
//!
//! # Env var mapping
//!
//! | Env var                                  | Field                    |
//! |------------------------------------------|--------------------------|
//! | `STRUCTCLI_DEMO_SERVE_HOST`              | `serve: host`            |
//! | `STRUCTCLI_DEMO_SERVE_PORT`              | `serve: port`            |
//! | `STRUCTCLI_DEMO_SERVE_DB_URL`            | `serve: database.url`    |
//! | `STRUCTCLI_DEMO_SERVE_DATABASE_MAX_CONNS`| `serve: database.max_conns` |
//! | `STRUCTCLI_DEMO_SERVE_COLOR`             | `serve: color`           |

use std::str::FromStr;
use std::time::Duration;

use clap::{Arg, ArgAction};
use serde::{Deserialize, Serialize};
use structcli::{BoxError, Directives, FieldType, Hooks, LogLevel, Options, RawValue, Schema};

/// Root command options.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RootOptions {
    pub verbose: u8,
    pub log_level: LogLevel,
}

impl Options for RootOptions {
    const PROPAGATE: bool = true;

    fn schema() -> Schema {
        Schema::new()
            .field::<u8>("verbose", r#"flagshort:"v" flagtype:"count" flagdescr:"more output""#)
            .field::<LogLevel>("log_level", r#"flagdescr:"log level" flagenv:"true""#)
    }
}

/// Options of `serve`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ServeOptions {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
    pub tags: Vec<String>,
    pub color: Color,
    pub database: DatabaseOptions,
}

impl Options for ServeOptions {
    fn schema() -> Schema {
        Schema::new()
            .field::<String>(
                "host",
                r#"flagdescr:"address to bind" default:"127.0.0.1" flagenv:"true""#,
            )
            .field::<u16>(
                "port",
                r#"flagshort:"p" flagdescr:"port to listen on" default:"3000" flagenv:"true" validate:"min=1""#,
            )
            .field::<Duration>("timeout", r#"flagdescr:"request timeout" default:"30s""#)
            .field::<Vec<String>>("tags", r#"flagdescr:"labels, comma separated""#)
            .field::<Color>("color", r#"flagcustom:"true" flagenv:"true""#)
            .nested::<DatabaseOptions>("database", r#"flaggroup:"Database""#)
    }

    fn hooks(hooks: &mut Hooks) {
        hooks
            .define_flag("color", |_ctx| {
                (
                    Arg::new("color")
                        .value_name("COLOR")
                        .action(ArgAction::Set)
                        .value_parser(["red", "green", "yellow", "blue"]),
                    "banner color".to_string(),
                )
            })
            .decode("color", |raw: &RawValue| raw.to_string().parse::<Color>());
    }

    fn validate(&self, directives: &Directives) -> Vec<BoxError> {
        let mut errors: Vec<BoxError> = Vec::new();
        if directives.get("port") == Some("min=1") && self.port == 0 {
            errors.push("port must be at least 1".into());
        }
        errors
    }
}

/// Database settings, shown under their own help heading.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct DatabaseOptions {
    pub url: String,
    pub max_conns: u32,
}

impl Options for DatabaseOptions {
    fn schema() -> Schema {
        Schema::new()
            .field::<String>("url", r#"flag:"db-url" flagdescr:"database URL" flagenv:"true""#)
            .field::<u32>("max_conns", r#"default:"10" flagenv:"true""#)
    }
}

/// Options of `echo`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct EchoOptions {
    pub message: String,
    pub repeat: u32,
    pub upper: bool,
}

impl Options for EchoOptions {
    fn schema() -> Schema {
        Schema::new()
            .field::<String>("message", r#"flagshort:"m" flagrequired:"true" mod:"trim""#)
            .field::<u32>("repeat", r#"default:"1""#)
            .field::<bool>("upper", r#"flagdescr:"shout""#)
    }

    fn transform(&mut self, directives: &Directives) -> Result<(), BoxError> {
        if directives.get("message") == Some("trim") {
            self.message = self.message.trim().to_string();
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Green,
    #[default]
    Yellow,
    Blue,
}

impl FieldType for Color {}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" => Ok(Color::Red),
            "green" => Ok(Color::Green),
            "yellow" => Ok(Color::Yellow),
            "blue" => Ok(Color::Blue),
            other => Err(format!("unknown color {other:?}")),
        }
    }
}

impl Color {
    pub fn ansi(self) -> &'static str {
        match self {
            Color::Red => "\x1b[31m",
            Color::Green => "\x1b[32m",
            Color::Yellow => "\x1b[33m",
            Color::Blue => "\x1b[34m",
        }
    }
}
