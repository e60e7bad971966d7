//! Pre-execution validation for tool arguments.
//!
//! Catches malformed arguments before the capability runs, so the model gets
//! a readable observation it can correct on the next cycle.

use rootcause_core::{ParameterKind, ToolParameter, ToolParameters};
use serde_json::Value;

/// Check `args` against the declared parameters.
///
/// Required parameters must be present and non-null. Values must be plausible
/// for their kind: strings are strings, numbers are numbers or numeric
/// strings, string arrays hold only strings. Undeclared arguments pass through.
pub fn validate_parameters(declared: &[ToolParameter], args: &ToolParameters) -> Result<(), String> {
    for param in declared {
        match args.get(&param.name) {
            None | Some(Value::Null) => {
                if param.required {
                    return Err(format!(
                        "'{}' is required ({})",
                        param.name, param.kind
                    ));
                }
            }
            Some(value) => check_kind(&param.name, param.kind, value)?,
        }
    }
    Ok(())
}

fn check_kind(field: &str, kind: ParameterKind, value: &Value) -> Result<(), String> {
    let ok = match kind {
        ParameterKind::String => value.is_string(),
        ParameterKind::Number => match value {
            Value::Number(_) => true,
            Value::String(s) => s.trim().parse::<f64>().is_ok(),
            _ => false,
        },
        ParameterKind::StringArray => value
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string)),
    };
    if ok {
        Ok(())
    } else {
        Err(format!("{field}: expected {kind}, got {}", preview(value)))
    }
}

fn preview(value: &Value) -> String {
    value.to_string().chars().take(50).collect()
}
