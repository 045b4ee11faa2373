use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, Vars};

pub const DEFAULT_RAW_PREFIX: &str = "spacex/launches";
pub const DEFAULT_CONTAINER_NAME: &str = "spacex-etl";

/// Everything the run driver needs, validated up front. The surrounding
/// scheduler (cron or similar) owns cadence and single-active-run; this
/// structure only describes one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    pub airbyte_api_url: String,
    pub airbyte_connection_id: String,
    pub raw_bucket: String,
    pub raw_prefix: String,
    /// Date partition (YYYYMMDD) this run covers.
    pub partition: String,
    /// When set, a wait-for-data timeout skips the rest of the run instead
    /// of failing it. Strict failure is the default.
    pub wait_soft_fail: bool,
    pub ecs: EcsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EcsConfig {
    pub cluster: String,
    pub task_definition: String,
    pub container_name: String,
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
}

impl PipelineConfig {
    pub fn load(vars: &Vars) -> Result<Self, ConfigError> {
        Ok(Self {
            airbyte_api_url: vars.require("AIRBYTE_API_URL")?,
            airbyte_connection_id: vars.require("AIRBYTE_CONNECTION_ID")?,
            raw_bucket: vars.require("RAW_BUCKET")?,
            raw_prefix: vars.get_or("RAW_PREFIX", DEFAULT_RAW_PREFIX),
            partition: vars
                .get("EXEC_DATE")
                .unwrap_or_else(|| Utc::now().format("%Y%m%d").to_string()),
            wait_soft_fail: vars
                .get("WAIT_RAW_SOFT_FAIL")
                .is_some_and(|value| value == "true"),
            ecs: EcsConfig {
                cluster: vars.require("ECS_CLUSTER")?,
                task_definition: vars.require("ECS_TASK_DEFINITION")?,
                container_name: vars.get_or("ECS_CONTAINER_NAME", DEFAULT_CONTAINER_NAME),
                subnets: vars.require_json_list("ECS_SUBNETS")?,
                security_groups: vars.require_json_list("ECS_SECURITY_GROUPS")?,
            },
        })
    }

    /// Key prefix the sync service writes this run's raw objects under.
    pub fn raw_data_prefix(&self) -> String {
        format!("{}/{}/", self.raw_prefix, self.partition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> Vars {
        Vars::from([
            ("AIRBYTE_API_URL", "http://10.0.0.12:8000"),
            ("AIRBYTE_CONNECTION_ID", "b2e4c5d6"),
            ("RAW_BUCKET", "raw-data"),
            ("ECS_CLUSTER", "etl-cluster"),
            ("ECS_TASK_DEFINITION", "spacex-etl:3"),
            ("ECS_SUBNETS", r#"["subnet-a", "subnet-b"]"#),
            ("ECS_SECURITY_GROUPS", r#"["sg-1"]"#),
            ("EXEC_DATE", "20250101"),
        ])
    }

    #[test]
    fn applies_defaults_for_prefix_and_container_name() {
        let config = PipelineConfig::load(&vars()).unwrap();

        assert_eq!(config.raw_prefix, "spacex/launches");
        assert_eq!(config.ecs.container_name, "spacex-etl");
        assert_eq!(config.ecs.subnets, vec!["subnet-a", "subnet-b"]);
        assert!(!config.wait_soft_fail);
    }

    #[test]
    fn raw_data_prefix_covers_the_partition() {
        let config = PipelineConfig::load(&vars()).unwrap();

        assert_eq!(config.raw_data_prefix(), "spacex/launches/20250101/");
    }

    #[test]
    fn missing_required_variable_names_it() {
        let vars = Vars::from([
            ("AIRBYTE_API_URL", "http://10.0.0.12:8000"),
            ("AIRBYTE_CONNECTION_ID", "b2e4c5d6"),
            ("RAW_BUCKET", "raw-data"),
        ]);

        let error = PipelineConfig::load(&vars).unwrap_err();
        assert!(matches!(error, ConfigError::Missing("ECS_CLUSTER")));
    }

    #[test]
    fn rejects_subnets_that_are_not_a_json_list() {
        let vars = Vars::from([
            ("AIRBYTE_API_URL", "http://10.0.0.12:8000"),
            ("AIRBYTE_CONNECTION_ID", "b2e4c5d6"),
            ("RAW_BUCKET", "raw-data"),
            ("ECS_CLUSTER", "etl-cluster"),
            ("ECS_TASK_DEFINITION", "spacex-etl:3"),
            ("ECS_SUBNETS", "subnet-a"),
            ("ECS_SECURITY_GROUPS", r#"["sg-1"]"#),
        ]);

        let error = PipelineConfig::load(&vars).unwrap_err();
        assert!(matches!(error, ConfigError::Json("ECS_SUBNETS", _)));
    }
}
