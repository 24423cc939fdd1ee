use std::env;

use lazy_static::lazy_static;

/// Default bound on nested evaluations (e.g., disjunction members)
pub const DEFAULT_MAX_DEPTH: u32 = 16;

/// Default number of constants a disjunction may hold
pub const DEFAULT_DISJUNCTION_LIMIT: usize = 8;

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(val) => val.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

// common configurations
lazy_static! {
    pub static ref PARALLEL: bool = matches!(env::var("LIBRA_PARALLEL"), Ok(val) if val == "1");
    pub static ref MAX_DEPTH: u32 = parse_env("LIBRA_SCALAR_MAX_DEPTH", DEFAULT_MAX_DEPTH);
    pub static ref DISJUNCTION_LIMIT: usize = {
        // a disjunction needs room for at least two options
        parse_env("LIBRA_SCALAR_DISJUNCTION_LIMIT", DEFAULT_DISJUNCTION_LIMIT).max(2)
    };
}
