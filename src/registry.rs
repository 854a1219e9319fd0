//! Process-wide plan registry.
//!
//! Defining flags for an options type stores its [`Plan`] under
//! `(app name, type, scope)`; unmarshalling and debug output look it up by the
//! same key. Plans are immutable and shared as `Arc`s. The map is guarded by a
//! mutex so concurrent command construction is safe, but callers building the
//! same command from several threads will simply overwrite each other's
//! (identical) plans.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;

use crate::define::Plan;
use crate::types::Scope;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PlanKey {
    app: String,
    type_id: TypeId,
    scope: Scope,
}

static PLANS: LazyLock<Mutex<HashMap<PlanKey, Arc<Plan>>>> = LazyLock::new(Default::default);

/// Store `plan` for options type `T`, replacing any previous one.
pub fn store<T: 'static>(plan: Plan) -> Arc<Plan> {
    let key = PlanKey {
        app: plan.app_name.clone(),
        type_id: TypeId::of::<T>(),
        scope: plan.scope.clone(),
    };
    let plan = Arc::new(plan);
    let replaced = PLANS.lock().insert(key, Arc::clone(&plan)).is_some();
    tracing::debug!(
        target_type = plan.type_name,
        scope = %plan.scope,
        replaced,
        "stored plan"
    );
    plan
}

pub fn get<T: 'static>(app_name: &str, scope: &Scope) -> Option<Arc<Plan>> {
    let key = PlanKey {
        app: app_name.to_string(),
        type_id: TypeId::of::<T>(),
        scope: scope.clone(),
    };
    PLANS.lock().get(&key).cloned()
}

/// Drop every plan of options type `T`, across apps and scopes.
pub fn forget<T: 'static>() {
    let type_id = TypeId::of::<T>();
    PLANS.lock().retain(|key, _| key.type_id != type_id);
}

/// Drop all plans.
pub fn reset() {
    PLANS.lock().clear();
}

pub fn len() -> usize {
    PLANS.lock().len()
}
