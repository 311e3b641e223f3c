// src/core/validation.rs

//! # Option Validation
//!
//! Three independent passes over a schema and a set of values. Callers choose
//! the passes with [`ValidationFlags`], so the same rules can run eagerly right
//! after parsing (before any prompt could fill a gap) and lazily once a value has
//! been resolved.
//!
//! Schema self-consistency (`required` together with `conflicts`/`requires`) is
//! always checked first and fails with an options-config error, independent of
//! the values.

use crate::core::arg_parser::coerce_number;
use crate::core::options::{OptionConfig, OptionSchema, OptionType, OptionValue, OptionValues};
use crate::errors::{EngineError, OptionsError};

/// Selects which validation passes run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationFlags {
    /// Type, choices and `nargs` checks.
    pub types: bool,
    /// Required options must have a value.
    pub required: bool,
    /// Declared conflicts must not both be present.
    pub conflicts: bool,
    /// Declared requirements must be present.
    pub requires: bool,
}

impl ValidationFlags {
    /// Every pass.
    pub fn all() -> Self {
        Self {
            types: true,
            required: true,
            conflicts: true,
            requires: true,
        }
    }

    /// The passes that can run before prompting: everything except `required`.
    pub fn eager() -> Self {
        Self {
            required: false,
            ..Self::all()
        }
    }
}

/// Validates `values` against `schema` using the selected passes.
pub fn validate_options(
    schema: &OptionSchema,
    values: &OptionValues,
    flags: ValidationFlags,
) -> Result<(), EngineError> {
    schema.validate_config()?;

    if flags.types {
        for (key, config) in schema.iter() {
            if let Some(value) = find_value(schema, key, values) {
                validate_value(schema, key, config, value)?;
            }
        }
    }

    if flags.required {
        for (key, config) in schema.iter().filter(|(_, c)| c.required) {
            if find_value(schema, key, values).is_none() {
                return Err(OptionsError::Required {
                    name: schema.display_name(key),
                }
                .into());
            }
        }
    }

    if flags.conflicts || flags.requires {
        validate_relations(schema, values, flags)?;
    }

    Ok(())
}

/// Finds the value of an option under any of its spellings.
pub fn find_value<'v>(
    schema: &OptionSchema,
    key: &str,
    values: &'v OptionValues,
) -> Option<&'v OptionValue> {
    schema
        .variants(key)
        .iter()
        .find_map(|variant| values.get(variant))
}

fn validate_relations(
    schema: &OptionSchema,
    values: &OptionValues,
    flags: ValidationFlags,
) -> Result<(), EngineError> {
    let is_present = |name: &str| -> bool {
        let key = schema.canonical_key(name).unwrap_or(name);
        find_value(schema, key, values).is_some()
    };
    let display = |name: &str| -> String {
        schema
            .canonical_key(name)
            .map(|key| schema.display_name(key))
            .unwrap_or_else(|| name.to_string())
    };

    for (key, config) in schema.iter() {
        if find_value(schema, key, values).is_none() {
            continue;
        }

        if flags.conflicts
            && let Some(other) = config.conflicts.iter().find(|other| is_present(other))
        {
            return Err(OptionsError::Conflict {
                name: schema.display_name(key),
                other: display(other),
            }
            .into());
        }

        if flags.requires
            && let Some(other) = config.requires.iter().find(|other| !is_present(other))
        {
            return Err(OptionsError::Requires {
                name: schema.display_name(key),
                other: display(other),
            }
            .into());
        }
    }
    Ok(())
}

/// Checks a single value against its entry: primitive type, `nargs` and `choices`.
pub fn validate_value(
    schema: &OptionSchema,
    key: &str,
    config: &OptionConfig,
    value: &OptionValue,
) -> Result<(), OptionsError> {
    let name = || schema.display_name(key);
    let type_error = |expected: String| OptionsError::Type {
        name: name(),
        expected,
        received: value.kind_name().to_string(),
    };

    if let Some(expected) = config.nargs.filter(|_| config.is_multi_arg()) {
        let received = value.as_array().map_or(1, <[String]>::len);
        if received != expected {
            return Err(OptionsError::Nargs {
                name: name(),
                expected,
                received,
            });
        }
    }

    match (config.kind, value) {
        (OptionType::Boolean, OptionValue::Boolean(_)) => {}
        (OptionType::Number, OptionValue::Number(n)) if n.is_finite() => {}
        (OptionType::String | OptionType::Secret, OptionValue::String(_)) => {}
        (OptionType::String | OptionType::Secret | OptionType::Number, OptionValue::Array(items))
            if config.is_multi_arg() =>
        {
            if config.kind == OptionType::Number
                && let Some(bad) = items.iter().find(|item| coerce_number((*item).clone()).as_f64().is_none())
            {
                return Err(OptionsError::Type {
                    name: name(),
                    expected: "number".to_string(),
                    received: format!("'{}'", bad),
                });
            }
        }
        (OptionType::Array, OptionValue::Array(items)) => {
            if items.is_empty() {
                return Err(OptionsError::EmptyArray { name: name() });
            }
        }
        (kind, _) => return Err(type_error(kind.to_string())),
    }

    if !config.choices.is_empty() {
        let candidates: Vec<String> = match value {
            OptionValue::Array(items) => items.clone(),
            other => vec![other.to_string()],
        };
        if let Some(bad) = candidates.iter().find(|c| !config.choices.contains(c)) {
            return Err(OptionsError::Choices {
                name: name(),
                value: bad.clone(),
                choices: config.choices.join(", "),
            });
        }
    }

    Ok(())
}

/// Coerces a value obtained from a prompt, a default or a fork into the shape its
/// entry declares. Values that cannot be coerced are returned unchanged so that
/// [`validate_value`] reports them.
pub fn normalize_value(config: &OptionConfig, value: OptionValue) -> OptionValue {
    match (config.kind, value) {
        (OptionType::Number, OptionValue::String(raw)) if !config.is_multi_arg() => {
            coerce_number(raw)
        }
        (OptionType::Boolean, OptionValue::String(raw)) => match raw.as_str() {
            "true" | "yes" | "y" => OptionValue::Boolean(true),
            "false" | "no" | "n" => OptionValue::Boolean(false),
            _ => OptionValue::String(raw),
        },
        (OptionType::String | OptionType::Secret, OptionValue::Number(n))
            if !config.is_multi_arg() =>
        {
            OptionValue::String(n.to_string())
        }
        (OptionType::Array, OptionValue::String(raw)) => OptionValue::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        ),
        (_, value) => value,
    }
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::OptionsConfigError;

    fn values(pairs: &[(&str, OptionValue)]) -> OptionValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn conflict_only() -> ValidationFlags {
        ValidationFlags {
            conflicts: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_conflicts_reports_other_option() {
        let schema = OptionSchema::try_from_entries([
            ("a", OptionConfig::string().conflicts("b")),
            ("b", OptionConfig::string()),
        ])
        .unwrap();
        let vals = values(&[("a", "x".into()), ("b", "y".into())]);

        let err = validate_options(&schema, &vals, conflict_only()).unwrap_err();
        assert_eq!(
            err.as_options_error(),
            Some(&OptionsError::Conflict {
                name: "a".to_string(),
                other: "b".to_string(),
            })
        );
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn test_conflicts_use_display_name_of_other_option() {
        let schema = OptionSchema::try_from_entries([
            ("q", OptionConfig::boolean().alias("quiet").conflicts("v")),
            ("v", OptionConfig::boolean().alias("verbose")),
        ])
        .unwrap();
        // The conflicting value is present under an alias.
        let vals = values(&[("q", true.into()), ("verbose", true.into())]);
        let err = validate_options(&schema, &vals, conflict_only()).unwrap_err();
        assert!(matches!(
            err.as_options_error(),
            Some(OptionsError::Conflict { other, .. }) if other == "verbose"
        ));
    }

    #[test]
    fn test_conflicts_pass_when_only_one_present() {
        let schema = OptionSchema::try_from_entries([
            ("a", OptionConfig::string().conflicts("b")),
            ("b", OptionConfig::string()),
        ])
        .unwrap();
        let vals = values(&[("a", "x".into())]);
        assert!(validate_options(&schema, &vals, ValidationFlags::all()).is_ok());
    }

    #[test]
    fn test_requires_reports_missing_option() {
        let schema = OptionSchema::try_from_entries([
            ("user", OptionConfig::string().requires("password")),
            ("password", OptionConfig::secret()),
        ])
        .unwrap();
        let vals = values(&[("user", "root".into())]);
        let flags = ValidationFlags {
            requires: true,
            ..Default::default()
        };
        let err = validate_options(&schema, &vals, flags).unwrap_err();
        assert_eq!(
            err.as_options_error(),
            Some(&OptionsError::Requires {
                name: "user".to_string(),
                other: "password".to_string(),
            })
        );
    }

    #[test]
    fn test_required_checks_every_alias() {
        let schema = OptionSchema::try_from_entries([(
            "name",
            OptionConfig::string().alias("n").required(),
        )])
        .unwrap();
        let flags = ValidationFlags {
            required: true,
            ..Default::default()
        };
        assert!(validate_options(&schema, &values(&[("n", "x".into())]), flags).is_ok());
        let err = validate_options(&schema, &OptionValues::new(), flags).unwrap_err();
        assert!(matches!(
            err.as_options_error(),
            Some(OptionsError::Required { .. })
        ));
    }

    #[test]
    fn test_type_pass() {
        let schema = OptionSchema::try_from_entries([
            ("count", OptionConfig::number()),
            ("env", OptionConfig::string().choices(["dev", "prod"])),
            ("tags", OptionConfig::array().choices(["a", "b"])),
            ("point", OptionConfig::number().nargs(2)),
        ])
        .unwrap();
        let flags = ValidationFlags {
            types: true,
            ..Default::default()
        };

        let ok = values(&[
            ("count", 2.0.into()),
            ("env", "dev".into()),
            ("tags", OptionValue::Array(vec!["a".into()])),
            ("point", OptionValue::Array(vec!["1".into(), "2".into()])),
        ]);
        assert!(validate_options(&schema, &ok, flags).is_ok());

        let bad_type = values(&[("count", "many".into())]);
        assert!(matches!(
            validate_options(&schema, &bad_type, flags).unwrap_err().as_options_error(),
            Some(OptionsError::Type { .. })
        ));

        let bad_choice = values(&[("tags", OptionValue::Array(vec!["a".into(), "z".into()]))]);
        assert!(matches!(
            validate_options(&schema, &bad_choice, flags).unwrap_err().as_options_error(),
            Some(OptionsError::Choices { value, .. }) if value == "z"
        ));

        let empty = values(&[("tags", OptionValue::Array(vec![]))]);
        assert!(matches!(
            validate_options(&schema, &empty, flags).unwrap_err().as_options_error(),
            Some(OptionsError::EmptyArray { .. })
        ));

        let short = values(&[("point", OptionValue::Array(vec!["1".into()]))]);
        assert_eq!(
            validate_options(&schema, &short, flags)
                .unwrap_err()
                .as_options_error(),
            Some(&OptionsError::Nargs {
                name: "point".to_string(),
                expected: 2,
                received: 1,
            })
        );
    }

    #[test]
    fn test_config_error_precedes_value_checks() {
        // Deserialized schemas bypass `insert`.
        let schema: OptionSchema = toml::from_str(
            r#"
            [a]
            required = true
            conflicts = ["b"]
            "#,
        )
        .unwrap();
        let err = validate_options(&schema, &OptionValues::new(), ValidationFlags::default())
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::OptionsConfig(OptionsConfigError::RequiredWithConflicts(_))
        ));
    }

    #[test]
    fn test_normalize_value() {
        assert_eq!(
            normalize_value(&OptionConfig::number(), "4".into()),
            OptionValue::Number(4.0)
        );
        assert_eq!(
            normalize_value(&OptionConfig::boolean(), "yes".into()),
            OptionValue::Boolean(true)
        );
        assert_eq!(
            normalize_value(&OptionConfig::array(), "a, b".into()),
            OptionValue::Array(vec!["a".into(), "b".into()])
        );
    }
}
