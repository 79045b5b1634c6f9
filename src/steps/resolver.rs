//! Parameter resolution.
//!
//! Turns a step's declared parameters into the flat `flag value` argument
//! list handed to its component. References are looked up in the run state
//! right before dispatch, so values that only exist at runtime are visible.

use crate::error::{PipewrightError, Result};
use crate::runner::RunState;

use super::descriptor::{Literal, OutputReference, ParameterValue, StepDescriptor};

/// Resolve a step's parameters against the records of the current run.
///
/// Fails with [`PipewrightError::UnresolvedReference`] when a referenced step
/// has not succeeded or did not produce the named output.
pub fn resolve(step: &StepDescriptor, state: &RunState) -> Result<Vec<String>> {
    render(step, |reference| lookup(step, reference, state))
}

/// Render a step's arguments without running anything upstream.
///
/// References are shown in their `${steps.x.y}` form.
pub fn preview(step: &StepDescriptor) -> Vec<String> {
    render(step, |reference| Ok(reference.to_string())).unwrap_or_default()
}

/// Command-line flag for a parameter name.
///
/// Names already starting with `--` are used as-is; otherwise underscores
/// become dashes (`input_file` → `--input-file`).
pub fn flag_name(name: &str) -> String {
    if name.starts_with("--") {
        name.to_string()
    } else {
        format!("--{}", name.replace('_', "-"))
    }
}

fn lookup(step: &StepDescriptor, reference: &OutputReference, state: &RunState) -> Result<String> {
    state
        .record(&reference.step)
        .filter(|r| r.is_success())
        .and_then(|r| r.output(&reference.output))
        .map(str::to_string)
        .ok_or_else(|| PipewrightError::UnresolvedReference {
            step: step.id.clone(),
            source_step: reference.step.clone(),
            output: reference.output.clone(),
        })
}

fn render<F>(step: &StepDescriptor, mut resolve_reference: F) -> Result<Vec<String>>
where
    F: FnMut(&OutputReference) -> Result<String>,
{
    let mut args = Vec::new();

    for (name, value) in &step.parameters {
        let flag = flag_name(name);
        match value {
            ParameterValue::Literal(Literal::Text(text)) => {
                args.push(flag);
                args.push(text.clone());
            }
            ParameterValue::Literal(Literal::Switch(true)) => args.push(flag),
            ParameterValue::Literal(Literal::Switch(false)) => {}
            ParameterValue::Literal(Literal::List(items)) => {
                args.push(flag);
                args.extend(items.iter().cloned());
            }
            ParameterValue::Reference(reference) => {
                let value = resolve_reference(reference)?;
                args.push(flag);
                args.push(value);
            }
        }
    }

    Ok(args)
}
