//! Courier configuration.

use core_config::{ConfigError, FromEnv, env_list, env_or_default, env_parse};
use std::collections::BTreeSet;
use std::str::FromStr;

/// What happens to subscriptions when the template they reference is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemplateOnDelete {
    /// Clear the reference; the subscriptions lose their bindings.
    #[default]
    SetNull,
    /// Refuse the delete while any subscription references the template.
    Restrict,
}

impl FromStr for TemplateOnDelete {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "set_null" | "setnull" => Ok(TemplateOnDelete::SetNull),
            "restrict" | "protect" => Ok(TemplateOnDelete::Restrict),
            other => Err(format!(
                "unknown on-delete behavior '{}', expected set_null or restrict",
                other
            )),
        }
    }
}

/// Method names left out of variable manifests unless configured otherwise.
pub const DEFAULT_IGNORED_CONTEXT_METHODS: &[&str] = &[
    "save",
    "delete",
    "clean",
    "full_clean",
    "clean_fields",
    "validate_unique",
    "refresh_from_db",
];

/// Configuration for the courier engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourierConfig {
    /// Sender address for subscriptions that do not set one.
    pub default_from_email: String,
    /// Template delete behavior.
    pub template_on_delete: TemplateOnDelete,
    /// Method names excluded from variable manifests.
    pub ignored_context_methods: BTreeSet<String>,
    /// Site record supplying `site.name` and `site.domain`.
    pub site_id: u32,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            default_from_email: "webmaster@localhost".to_string(),
            template_on_delete: TemplateOnDelete::default(),
            ignored_context_methods: DEFAULT_IGNORED_CONTEXT_METHODS
                .iter()
                .map(|name| name.to_string())
                .collect(),
            site_id: 1,
        }
    }
}

impl FromEnv for CourierConfig {
    /// - COURIER_DEFAULT_FROM_EMAIL: defaults to webmaster@localhost
    /// - COURIER_TEMPLATE_ON_DELETE: set_null (default) or restrict
    /// - COURIER_IGNORED_CONTEXT_METHODS: comma separated method names
    /// - COURIER_SITE_ID: defaults to 1
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let ignored_context_methods = env_list("COURIER_IGNORED_CONTEXT_METHODS")
            .map(|names| names.into_iter().collect())
            .unwrap_or(defaults.ignored_context_methods);

        Ok(Self {
            default_from_email: env_or_default(
                "COURIER_DEFAULT_FROM_EMAIL",
                &defaults.default_from_email,
            ),
            template_on_delete: env_parse(
                "COURIER_TEMPLATE_ON_DELETE",
                defaults.template_on_delete,
            )?,
            ignored_context_methods,
            site_id: env_parse("COURIER_SITE_ID", defaults.site_id)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 4] = [
        "COURIER_DEFAULT_FROM_EMAIL",
        "COURIER_TEMPLATE_ON_DELETE",
        "COURIER_IGNORED_CONTEXT_METHODS",
        "COURIER_SITE_ID",
    ];

    #[test]
    fn test_from_env_with_defaults() {
        temp_env::with_vars(VARS.map(|key| (key, None::<&str>)), || {
            let config = CourierConfig::from_env().unwrap();
            assert_eq!(config, CourierConfig::default());
            assert!(config.ignored_context_methods.contains("save"));
        });
    }

    #[test]
    fn test_from_env_with_custom_values() {
        temp_env::with_vars(
            [
                ("COURIER_DEFAULT_FROM_EMAIL", Some("alerts@example.com")),
                ("COURIER_TEMPLATE_ON_DELETE", Some("PROTECT")),
                ("COURIER_IGNORED_CONTEXT_METHODS", Some("save, archive")),
                ("COURIER_SITE_ID", Some("3")),
            ],
            || {
                let config = CourierConfig::from_env().unwrap();
                assert_eq!(config.default_from_email, "alerts@example.com");
                assert_eq!(config.template_on_delete, TemplateOnDelete::Restrict);
                assert_eq!(
                    config.ignored_context_methods,
                    ["archive".to_string(), "save".to_string()].into_iter().collect()
                );
                assert_eq!(config.site_id, 3);
            },
        );
    }

    #[test]
    fn test_from_env_invalid_on_delete() {
        temp_env::with_var("COURIER_TEMPLATE_ON_DELETE", Some("cascade"), || {
            let err = CourierConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("COURIER_TEMPLATE_ON_DELETE"));
        });
    }

    #[test]
    fn test_from_env_invalid_site_id() {
        temp_env::with_var("COURIER_SITE_ID", Some("main"), || {
            assert!(CourierConfig::from_env().is_err());
        });
    }
}
