//
// Canonical evaluation parameters
//

use lazy_static::lazy_static;

use libra_shared::config::MAX_DEPTH;

use crate::analysis::context::{
    ErrorPolicy, EvalParams, Information, LatticeCreation, LatticePolicy,
};

impl EvalParams {
    /// Results may always become intervals, and only may-evaluations may produce a top
    pub fn preset(information: Information, errors: ErrorPolicy) -> Self {
        Self {
            information,
            errors,
            policy: LatticePolicy::new(LatticeCreation::Interval, LatticeCreation::Top)
                .unwrap_or_else(|e| crate::error::invariant_violation(e.to_string())),
            max_depth: *MAX_DEPTH,
        }
    }
}

lazy_static! {
    pub static ref MAY_STOP: EvalParams = EvalParams::preset(Information::May, ErrorPolicy::Stop);
    pub static ref MAY_PROPAGATE: EvalParams =
        EvalParams::preset(Information::May, ErrorPolicy::Propagate);
    pub static ref EXACT_STOP: EvalParams =
        EvalParams::preset(Information::Exact, ErrorPolicy::Stop);
    pub static ref EXACT_PROPAGATE: EvalParams =
        EvalParams::preset(Information::Exact, ErrorPolicy::Propagate);
    pub static ref SURE_STOP: EvalParams =
        EvalParams::preset(Information::Sure, ErrorPolicy::Stop);
    pub static ref SURE_PROPAGATE: EvalParams =
        EvalParams::preset(Information::Sure, ErrorPolicy::Propagate);
}

/// Look a preset up by its information kind and error policy
pub fn preset(information: Information, errors: ErrorPolicy) -> &'static EvalParams {
    match (information, errors) {
        (Information::May, ErrorPolicy::Stop) => &MAY_STOP,
        (Information::May, ErrorPolicy::Propagate) => &MAY_PROPAGATE,
        (Information::Exact, ErrorPolicy::Stop) => &EXACT_STOP,
        (Information::Exact, ErrorPolicy::Propagate) => &EXACT_PROPAGATE,
        (Information::Sure, ErrorPolicy::Stop) => &SURE_STOP,
        (Information::Sure, ErrorPolicy::Propagate) => &SURE_PROPAGATE,
    }
}
