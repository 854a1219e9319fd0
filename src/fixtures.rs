#[cfg(test)]
pub mod test {
    use std::time::Duration;

    use clap::{Arg, ArgAction};
    use serde::{Deserialize, Serialize};

    use crate::error::BoxError;
    use crate::hooks::{Hooks, RawValue};
    use crate::schema::{Directives, FieldType, Options, Schema};
    use crate::types::LogLevel;

    #[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct ServeOptions {
        pub host: String,
        pub port: u16,
        pub verbose: u8,
        pub timeout: Duration,
        pub log_level: LogLevel,
        pub tags: Vec<String>,
        pub database: DatabaseOptions,
        pub cache: Option<CacheOptions>,
        pub token: Option<String>,
        pub internal: String,
    }

    impl Options for ServeOptions {
        fn schema() -> Schema {
            Schema::new()
                .field::<String>(
                    "host",
                    r#"flagdescr:"address to bind" flagdefault:"localhost" flagenv:"true""#,
                )
                .field::<u16>(
                    "port",
                    r#"flagshort:"p" flagdescr:"port to listen on" flagdefault:"8080" flagenv:"true""#,
                )
                .field::<u8>("verbose", r#"flagshort:"v" flagtype:"count""#)
                .field::<Duration>("timeout", r#"flagdefault:"30s" flagdescr:"request timeout""#)
                .field::<LogLevel>("log_level", r#"flagenv:"true""#)
                .field::<Vec<String>>("tags", r#"flagdescr:"labels to attach""#)
                .nested::<DatabaseOptions>("database", r#"flaggroup:"Database""#)
                .nested::<CacheOptions>("cache", r#"flag:"c""#)
                .field::<Option<String>>("token", r#"flag:"api-token" flagenv:"true""#)
                .field::<String>("internal", r#"flagignore:"true""#)
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct DatabaseOptions {
        pub url: String,
        pub maxconns: u32,
        pub pool_timeout: Duration,
    }

    impl Options for DatabaseOptions {
        fn schema() -> Schema {
            Schema::new()
                .field::<String>("url", r#"flag:"db-url" flagdescr:"database URL" flagenv:"true""#)
                .field::<u32>("maxconns", r#"flagdefault:"10" flagenv:"true""#)
                .field::<Duration>("pool_timeout", "")
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct CacheOptions {
        pub ttl: Duration,
    }

    impl Options for CacheOptions {
        fn schema() -> Schema {
            Schema::new().field::<Duration>("ttl", r#"flagdefault:"5m""#)
        }
    }

    // -- Custom field types ----------------------------------------------------

    #[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
    #[serde(rename_all = "lowercase")]
    pub enum Mode {
        #[default]
        Fast,
        Slow,
    }

    impl FieldType for Mode {}

    pub fn decode_mode(raw: &RawValue) -> Result<Mode, String> {
        match raw.text() {
            Some("fast") => Ok(Mode::Fast),
            Some("slow") => Ok(Mode::Slow),
            _ => Err(format!("unknown mode {:?}", raw.to_string())),
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct DeployOptions {
        pub mode: Mode,
        pub fallback: Option<Mode>,
        pub replicas: u32,
    }

    impl Options for DeployOptions {
        fn schema() -> Schema {
            Schema::new()
                .field::<Mode>("mode", r#"flagcustom:"true" flagshort:"m" flagenv:"true""#)
                .field::<Option<Mode>>("fallback", r#"flagcustom:"true""#)
                .field::<u32>("replicas", r#"flagrequired:"true" flagenv:"true""#)
        }

        fn hooks(hooks: &mut Hooks) {
            hooks
                .define_flag("mode", |_ctx| {
                    (
                        Arg::new("mode").value_name("MODE").action(ArgAction::Set),
                        "deploy mode (fast|slow)".to_string(),
                    )
                })
                .decode("mode", decode_mode)
                .define_command("fallback", |cmd, ctx| {
                    cmd.arg(
                        Arg::new(ctx.flag.to_string())
                            .long(ctx.flag.to_string())
                            .value_name("MODE")
                            .help("mode to use when the primary fails"),
                    )
                })
                .decode("fallback", decode_mode);
        }
    }

    // -- Transform / validate / propagate -----------------------------------

    #[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct CheckedOptions {
        pub name: String,
        pub port: u16,
    }

    impl Options for CheckedOptions {
        const PROPAGATE: bool = true;

        fn schema() -> Schema {
            Schema::new()
                .field::<String>("name", r#"mod:"trim,lower" validate:"required""#)
                .field::<u16>("port", r#"validate:"min=1""#)
        }

        fn transform(&mut self, directives: &Directives) -> Result<(), BoxError> {
            if let Some(mods) = directives.get("name") {
                for m in mods.split(',') {
                    match m {
                        "trim" => self.name = self.name.trim().to_string(),
                        "lower" => self.name = self.name.to_lowercase(),
                        other => return Err(format!("unknown modifier {other:?}").into()),
                    }
                }
            }
            Ok(())
        }

        fn validate(&self, directives: &Directives) -> Vec<BoxError> {
            let mut errors: Vec<BoxError> = Vec::new();
            if directives.get("name") == Some("required") && self.name.is_empty() {
                errors.push("name is required".into());
            }
            if directives.get("port") == Some("min=1") && self.port < 1 {
                errors.push("port must be at least 1".into());
            }
            errors
        }
    }

    #[test]
    fn fixtures_default_to_zero_values() {
        let opts = ServeOptions::default();
        assert_eq!(opts.port, 0);
        assert_eq!(opts.log_level, LogLevel::Info);
        assert!(opts.cache.is_none());
        assert_eq!(DeployOptions::default().mode, Mode::Fast);
    }

    #[test]
    fn decode_mode_rejects_unknown() {
        let err = decode_mode(&RawValue::Text("warp".into())).unwrap_err();
        assert!(err.contains("warp"));
    }
}
