// Environment configuration (MD_* variables)

use anyhow::{bail, Context, Result};
use config::{Config, Environment};
use msgdelivery_core::config::{OverrideTemplate, PollIntervals, Settings};
use msgdelivery_infra_aws::AwsSettings;
use serde::Deserialize;

pub const ENV_PREFIX: &str = "MD";

const DEFAULT_QUEUE_REFRESH_MINUTES: u64 = 30;
const DEFAULT_BLANK_CHECK_SECONDS: u64 = 30;
const DEFAULT_ACTIVE_REFRESH_MINUTES: u64 = 5;

/// Raw `MD_*` variables, keyed by their lowercased suffix
#[derive(Debug, Default, Deserialize)]
pub struct EnvSettings {
    pub aws_key: Option<String>,
    pub aws_secret: Option<String>,
    pub aws_region: Option<String>,
    pub queue_prefix: Option<String>,
    pub message_threshold: Option<u64>,
    /// Minutes
    pub queue_url_refresh: Option<u64>,
    /// Seconds
    pub queue_blank_message_check: Option<u64>,
    /// Minutes
    pub queue_active_message_refresh: Option<u64>,
    pub ecs_cluster_arn: Option<String>,
    pub ecs_task_arn: Option<String>,
    pub ecs_task_launch: Option<String>,
    pub ecs_task_container_name: Option<String>,
    pub ecs_task_container_environment: Option<String>,
    pub queue_skip_tag: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    match non_empty(value) {
        Some(v) => Ok(v),
        None => bail!("{}_{} is required", ENV_PREFIX, name),
    }
}

impl EnvSettings {
    /// Read settings from the process environment
    pub fn load() -> Result<Self> {
        Self::from_source(Environment::with_prefix(ENV_PREFIX))
    }

    pub fn from_source(source: Environment) -> Result<Self> {
        Config::builder()
            .add_source(source)
            .build()
            .and_then(Config::try_deserialize)
            .context("Failed to read MD_* environment variables")
    }

    /// Validated controller settings
    pub fn controller_settings(&self) -> Result<Settings> {
        let cluster = required(&self.ecs_cluster_arn, "ECS_CLUSTER_ARN")?;
        let task_definition = required(&self.ecs_task_arn, "ECS_TASK_ARN")?;

        let mut settings = Settings::new(cluster, task_definition);
        if let Some(launch_type) = non_empty(&self.ecs_task_launch) {
            settings.launch_type = launch_type.to_string();
        }
        if let Some(threshold) = self.message_threshold {
            settings.message_threshold = threshold;
        }
        if let Some(prefix) = non_empty(&self.queue_prefix) {
            settings.queue_prefix = prefix.to_string();
        }
        if let Some(skip_tag) = non_empty(&self.queue_skip_tag) {
            settings.skip_tag = skip_tag.to_string();
        }
        settings.intervals = PollIntervals::from_units(
            self.queue_url_refresh
                .unwrap_or(DEFAULT_QUEUE_REFRESH_MINUTES),
            self.queue_blank_message_check
                .unwrap_or(DEFAULT_BLANK_CHECK_SECONDS),
            self.queue_active_message_refresh
                .unwrap_or(DEFAULT_ACTIVE_REFRESH_MINUTES),
        )
        .context("Invalid poll intervals")?;
        settings.container_override = OverrideTemplate::from_raw(
            self.ecs_task_container_name.as_deref(),
            self.ecs_task_container_environment.as_deref(),
        )
        .context("Invalid MD_ECS_TASK_CONTAINER_ENVIRONMENT")?;

        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }

    /// Region and credentials; the key pair must be given together or not at all
    pub fn aws_settings(&self) -> Result<AwsSettings> {
        let static_credentials = match (non_empty(&self.aws_key), non_empty(&self.aws_secret)) {
            (Some(key), Some(secret)) => Some((key.to_string(), secret.to_string())),
            (None, None) => None,
            _ => bail!("MD_AWS_KEY and MD_AWS_SECRET must be set together"),
        };

        Ok(AwsSettings {
            region: non_empty(&self.aws_region).map(str::to_string),
            static_credentials,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msgdelivery_core::config::{DEFAULT_LAUNCH_TYPE, DEFAULT_SKIP_TAG};
    use std::time::Duration;

    fn from_vars(vars: &[(&str, &str)]) -> Result<EnvSettings> {
        let source: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvSettings::from_source(Environment::with_prefix(ENV_PREFIX).source(Some(source)))
    }

    fn minimal() -> EnvSettings {
        EnvSettings {
            ecs_cluster_arn: Some("arn:cluster/main".to_string()),
            ecs_task_arn: Some("arn:task-definition/worker:3".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_applied() {
        let settings = minimal().controller_settings().unwrap();

        assert_eq!(settings.launch_type, DEFAULT_LAUNCH_TYPE);
        assert_eq!(settings.skip_tag, DEFAULT_SKIP_TAG);
        assert_eq!(settings.message_threshold, 1);
        assert_eq!(settings.queue_prefix, "");
        assert_eq!(settings.intervals, PollIntervals::default());
        assert!(settings.container_override.is_none());
    }

    #[test]
    fn test_cluster_required() {
        let env = EnvSettings {
            ecs_cluster_arn: Some("  ".to_string()),
            ..minimal()
        };
        let err = env.controller_settings().unwrap_err();
        assert!(err.to_string().contains("MD_ECS_CLUSTER_ARN"));
    }

    #[test]
    fn test_task_definition_required() {
        let env = EnvSettings {
            ecs_task_arn: None,
            ..minimal()
        };
        assert!(env.controller_settings().is_err());
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let env = EnvSettings {
            message_threshold: Some(0),
            ..minimal()
        };
        assert!(env.controller_settings().is_err());
    }

    #[test]
    fn test_interval_units() {
        let env = EnvSettings {
            queue_url_refresh: Some(10),
            queue_blank_message_check: Some(15),
            queue_active_message_refresh: Some(2),
            ..minimal()
        };
        let intervals = env.controller_settings().unwrap().intervals;

        assert_eq!(intervals.queue_refresh, Duration::from_secs(600));
        assert_eq!(intervals.blank_poll, Duration::from_secs(15));
        assert_eq!(intervals.active_poll, Duration::from_secs(120));
    }

    #[test]
    fn test_interval_overflow_rejected() {
        let env = EnvSettings {
            queue_url_refresh: Some(u64::MAX),
            ..minimal()
        };
        let err = env.controller_settings().unwrap_err();
        assert!(err.to_string().contains("poll intervals"));
    }

    #[test]
    fn test_override_requires_container_name() {
        let env = EnvSettings {
            ecs_task_container_environment: Some("QUEUE=x".to_string()),
            ..minimal()
        };
        assert!(env.controller_settings().is_err());
    }

    #[test]
    fn test_override_parsed() {
        let env = EnvSettings {
            ecs_task_container_name: Some("worker".to_string()),
            ecs_task_container_environment: Some(
                "QUEUE=##MessageDelivery.Tag.Name##:MODE=batch".to_string(),
            ),
            ..minimal()
        };
        let template = env.controller_settings().unwrap().container_override.unwrap();

        assert_eq!(template.container_name, "worker");
        assert_eq!(template.variables.len(), 2);
        assert_eq!(template.variables[1], ("MODE".to_string(), "batch".to_string()));
    }

    #[test]
    fn test_duplicate_override_key_rejected() {
        let env = EnvSettings {
            ecs_task_container_name: Some("worker".to_string()),
            ecs_task_container_environment: Some("A=1:A=2".to_string()),
            ..minimal()
        };
        assert!(env.controller_settings().is_err());
    }

    #[test]
    fn test_aws_key_pair_must_be_complete() {
        let env = EnvSettings {
            aws_key: Some("AKIA".to_string()),
            ..minimal()
        };
        assert!(env.aws_settings().is_err());

        let env = EnvSettings {
            aws_key: Some("AKIA".to_string()),
            aws_secret: Some("secret".to_string()),
            aws_region: Some("eu-west-1".to_string()),
            ..minimal()
        };
        let aws = env.aws_settings().unwrap();
        assert_eq!(aws.region.as_deref(), Some("eu-west-1"));
        assert!(aws.static_credentials.is_some());
    }

    #[test]
    fn test_default_credential_chain() {
        let aws = minimal().aws_settings().unwrap();
        assert!(aws.static_credentials.is_none());
        assert!(aws.region.is_none());
    }

    #[test]
    fn test_load_from_environment_source() {
        let env = from_vars(&[
            ("MD_ECS_CLUSTER_ARN", "arn:cluster/main"),
            ("MD_ECS_TASK_ARN", "arn:task-definition/worker:3"),
            ("MD_MESSAGE_THRESHOLD", "25"),
            ("MD_QUEUE_PREFIX", "orders"),
            ("OTHER_VARIABLE", "ignored"),
        ])
        .unwrap();

        assert_eq!(env.ecs_cluster_arn.as_deref(), Some("arn:cluster/main"));
        let settings = env.controller_settings().unwrap();
        assert_eq!(settings.message_threshold, 25);
        assert_eq!(settings.queue_prefix, "orders");
    }

    #[test]
    fn test_non_numeric_threshold_rejected() {
        assert!(from_vars(&[("MD_MESSAGE_THRESHOLD", "lots")]).is_err());
    }
}
