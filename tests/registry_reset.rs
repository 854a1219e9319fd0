//! `registry::reset` clears every stored plan. Kept in its own test binary so
//! clearing the registry cannot race with other tests.

use clap::Command;
use serde::{Deserialize, Serialize};
use structcli::{Options, Schema, Scope, Structcli, StructcliError, registry};

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
struct Opts {
    port: u16,
}

impl Options for Opts {
    fn schema() -> Schema {
        Schema::new().field::<u16>("port", r#"default:"80""#)
    }
}

#[test]
fn reset_forgets_defined_plans() {
    let engine = Structcli::builder()
        .app_name("reset")
        .env_vars(Vec::<(String, String)>::new())
        .build()
        .unwrap();
    let cmd = engine.define::<Opts>(&Scope::root(), Command::new("reset")).unwrap();
    assert!(engine.plan::<Opts>(&Scope::root()).is_ok());
    assert!(registry::len() >= 1);

    let matches = cmd.try_get_matches_from(["reset"]).unwrap();
    registry::reset();
    assert_eq!(registry::len(), 0);

    let mut opts = Opts::default();
    let err = engine
        .unmarshal(&Scope::root(), &matches, &mut opts)
        .unwrap_err();
    assert!(matches!(err, StructcliError::NotDefined { .. }));
    assert_eq!(opts.port, 0);
}
