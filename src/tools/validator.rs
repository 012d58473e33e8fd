//! Argument validation against a tool's parameter contract
//!
//! Two phases: presence of required arguments, then declared types. The
//! presence check short-circuits so type checks only run on complete calls.

use serde::{Deserialize, Serialize};

use crate::tools::definition::{json_type_name, Arguments, ParamType, Parameter};

/// A declared-type mismatch for a single argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeError {
    pub parameter: String,
    pub expected: ParamType,
    pub got: String,
}

/// Outcome of validating an argument map
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    /// Required parameters absent from the argument map, in declaration order
    MissingParameters(Vec<String>),
    /// Every argument whose value disagrees with its declared type
    TypeErrors(Vec<TypeError>),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }
}

/// Check `args` against `parameters`
pub fn validate(parameters: &[Parameter], args: &Arguments) -> ValidationOutcome {
    let missing = missing_parameters(parameters, args);
    if !missing.is_empty() {
        return ValidationOutcome::MissingParameters(missing);
    }

    let errors = type_errors(parameters, args);
    if errors.is_empty() {
        ValidationOutcome::Valid
    } else {
        ValidationOutcome::TypeErrors(errors)
    }
}

fn missing_parameters(parameters: &[Parameter], args: &Arguments) -> Vec<String> {
    parameters
        .iter()
        .filter(|p| p.is_required() && !args.contains_key(p.name()))
        .map(|p| p.name().to_string())
        .collect()
}

// Absent optional parameters are skipped, never defaulted.
fn type_errors(parameters: &[Parameter], args: &Arguments) -> Vec<TypeError> {
    parameters
        .iter()
        .filter_map(|p| {
            let value = args.get(p.name())?;
            if p.param_type().accepts(value) {
                None
            } else {
                Some(TypeError {
                    parameter: p.name().to_string(),
                    expected: p.param_type(),
                    got: json_type_name(value).to_string(),
                })
            }
        })
        .collect()
}
