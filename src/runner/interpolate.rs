//! Variable interpolation for strings
//!
//! Replaces `${key}` references with context variables, falling back to the
//! process environment. Substituted values are not interpolated again.

use crate::error::{InterpolationError, InterpolationResult};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::env;
use std::sync::OnceLock;

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]*)\}").expect("interpolation pattern is valid"))
}

/// Interpolate variables in a string
///
/// Supports:
/// - `${var}` - variable from the context
/// - Environment variables (when not found in the context)
pub fn interpolate(s: &str, vars: &HashMap<String, String>) -> InterpolationResult<String> {
    let re = pattern();
    let mut missing = None;

    let result = re.replace_all(s, |caps: &Captures| {
        let name = caps[1].trim();
        if let Some(value) = vars.get(name) {
            return value.clone();
        }
        if let Ok(value) = env::var(name) {
            return value;
        }
        if missing.is_none() {
            missing = Some(name.to_string());
        }
        String::new()
    });

    if let Some(name) = missing {
        if name.is_empty() {
            return Err(InterpolationError::InvalidSyntax(s.to_string()));
        }
        return Err(InterpolationError::UndefinedVariable(name));
    }

    // An opening marker left over means a reference was never closed
    if re.replace_all(s, "").contains("${") {
        return Err(InterpolationError::InvalidSyntax(s.to_string()));
    }

    Ok(result.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_interpolate_simple() {
        let vars = vars(&[("patient", "Rex")]);
        assert_eq!(interpolate("Hello ${patient}", &vars).unwrap(), "Hello Rex");
    }

    #[test]
    fn test_interpolate_multiple() {
        let vars = vars(&[("patient", "Rex"), ("customer", "J. Smith")]);
        assert_eq!(
            interpolate("${patient} owned by ${ customer }", &vars).unwrap(),
            "Rex owned by J. Smith"
        );
    }

    #[test]
    fn test_interpolate_no_vars() {
        assert_eq!(interpolate("plain", &HashMap::new()).unwrap(), "plain");
    }

    #[test]
    fn test_interpolate_undefined() {
        let err = interpolate("${taskflow_surely_undefined_var}", &HashMap::new()).unwrap_err();
        assert_eq!(
            err,
            InterpolationError::UndefinedVariable("taskflow_surely_undefined_var".to_string())
        );
    }

    #[test]
    fn test_values_are_not_reinterpolated() {
        let vars = vars(&[("a", "${b}"), ("b", "x")]);
        assert_eq!(interpolate("${a}", &vars).unwrap(), "${b}");
    }

    #[test]
    fn test_invalid_syntax() {
        let vars = vars(&[("a", "1")]);
        assert!(matches!(
            interpolate("${a} and ${b", &vars),
            Err(InterpolationError::InvalidSyntax(_))
        ));
        assert!(matches!(
            interpolate("${}", &vars),
            Err(InterpolationError::InvalidSyntax(_))
        ));
    }
}
