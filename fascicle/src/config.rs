//! Solver configuration.
use serde::Deserialize;

/// Configurable parameters used during solving.
#[derive(Clone, Debug)]
pub struct SolverConfig {
    /// Damping factor for the variable activity bump. (Default: 0.9)
    ///
    /// The bump amount is divided by this after every learned clause, which
    /// is equivalent to decaying all existing activities.
    pub rho: f64,

    /// Damping factor for clause activity bumps. (Default: 0.9995)
    pub clause_rho: f64,

    /// Blend factor between satisfied and touched levels in the purge range
    /// score. (Default: 0.4)
    pub clause_alpha: f64,

    /// Fraction of the agility scale below which a flush may fire.
    /// (Default: 0.05)
    pub psi: f64,

    /// Initial purge threshold and its base increment, in learned clauses.
    /// (Default: 1000)
    pub cap_delta: u64,

    /// Growth of the purge increment after every purge. (Default: 500)
    pub lower_delta: u64,

    /// Rate of random decision pops, per 1000 pops. (Default: 20)
    pub random_decision_rate: u32,

    /// Rescale all variable activities when one exceeds this value.
    /// (Default: 1e100)
    pub rescale_limit: f64,
}

impl Default for SolverConfig {
    fn default() -> SolverConfig {
        SolverConfig {
            rho: 0.9,
            clause_rho: 0.9995,
            clause_alpha: 0.4,
            psi: 0.05,
            cap_delta: 1000,
            lower_delta: 500,
            random_decision_rate: 20,
            rescale_limit: 1e100,
        }
    }
}

/// A partial update of a [`SolverConfig`].
///
/// Deserializable from TOML fragments like `rho = 0.95`, used by the command
/// line frontend for `--config` files and `-C` options.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolverConfigUpdate {
    pub rho: Option<f64>,
    pub clause_rho: Option<f64>,
    pub clause_alpha: Option<f64>,
    pub psi: Option<f64>,
    pub cap_delta: Option<u64>,
    pub lower_delta: Option<u64>,
    pub random_decision_rate: Option<u32>,
    pub rescale_limit: Option<f64>,
}

impl SolverConfigUpdate {
    /// Create an empty update.
    pub fn new() -> SolverConfigUpdate {
        SolverConfigUpdate::default()
    }

    /// Combine two updates, with the other update taking precedence.
    pub fn merge(&mut self, other: SolverConfigUpdate) {
        macro_rules! merge_fields {
            ($($field:ident),*) => {
                $(
                    if let Some(value) = other.$field {
                        self.$field = Some(value);
                    }
                )*
            };
        }

        merge_fields!(
            rho,
            clause_rho,
            clause_alpha,
            psi,
            cap_delta,
            lower_delta,
            random_decision_rate,
            rescale_limit
        );
    }

    /// Apply the update to a configuration.
    pub fn apply(&self, config: &mut SolverConfig) {
        macro_rules! apply_fields {
            ($($field:ident),*) => {
                $(
                    if let Some(value) = self.$field {
                        config.$field = value;
                    }
                )*
            };
        }

        apply_fields!(
            rho,
            clause_rho,
            clause_alpha,
            psi,
            cap_delta,
            lower_delta,
            random_decision_rate,
            rescale_limit
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_newer_values() {
        let mut base = SolverConfigUpdate::new();
        base.rho = Some(0.8);
        base.cap_delta = Some(100);

        let mut newer = SolverConfigUpdate::new();
        newer.rho = Some(0.95);

        base.merge(newer);

        assert_eq!(base.rho, Some(0.95));
        assert_eq!(base.cap_delta, Some(100));
    }

    #[test]
    fn apply_leaves_unset_fields_alone() {
        let mut config = SolverConfig::default();
        let mut update = SolverConfigUpdate::new();
        update.psi = Some(0.1);

        update.apply(&mut config);

        assert_eq!(config.psi, 0.1);
        assert_eq!(config.cap_delta, SolverConfig::default().cap_delta);
    }
}
