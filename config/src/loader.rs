use serde::{Deserialize, Serialize};

use crate::{ConfigError, Vars, DEFAULT_RAW_PREFIX};

pub const DEFAULT_REGION: &str = "us-east-1";

/// Loader-side configuration, all of it required up front so a misconfigured
/// container fails before it opens a warehouse connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderConfig {
    pub bucket: String,
    pub prefix: String,
    pub region: String,
    /// Date partition (YYYYMMDD); absent means load the whole prefix.
    pub partition: Option<String>,
    pub warehouse_host: String,
    pub warehouse_db: String,
    pub credentials: Credentials,
    /// Role the warehouse assumes to read from object storage.
    pub iam_role_arn: String,
    /// Accepted but unused; would only matter for IAM-based auth, which is
    /// not implemented.
    pub cluster_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl LoaderConfig {
    pub fn load(vars: &Vars) -> Result<Self, ConfigError> {
        Ok(Self {
            bucket: vars.require("RAW_BUCKET")?,
            prefix: vars.get_or("RAW_PREFIX", DEFAULT_RAW_PREFIX),
            region: vars.get_or("AWS_REGION", DEFAULT_REGION),
            partition: vars.get("EXEC_DATE"),
            warehouse_host: vars.require("REDSHIFT_HOST")?,
            warehouse_db: vars.require("REDSHIFT_DB")?,
            credentials: Credentials {
                user: vars.require("REDSHIFT_USER")?,
                password: vars.require("REDSHIFT_PASSWORD")?,
            },
            iam_role_arn: vars.require("REDSHIFT_IAM_ROLE_ARN")?,
            cluster_id: vars.get("REDSHIFT_CLUSTER_ID"),
        })
    }

    /// Object-storage path the COPY reads from: one partition when a date is
    /// supplied, the whole prefix otherwise.
    pub fn s3_path(&self) -> String {
        match &self.partition {
            Some(partition) => format!("s3://{}/{}/{}/", self.bucket, self.prefix, partition),
            None => format!("s3://{}/{}/", self.bucket, self.prefix),
        }
    }
}
