use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_rds::{Client, error::DisplayErrorContext, types::Tag};

use crate::errors::{RecorderError, RecorderResult};
use crate::models::snapshot::{DbInstance, SnapshotRequest, SnapshotTarget};
use crate::services::provider::{DbLogSource, LogFilesPage, LogPortion};

/// RDS client serving logs, topology and snapshots.
#[derive(Clone)]
pub struct AwsDbLogSource {
    client: Client,
}

impl AwsDbLogSource {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn snapshot_tags(request: &SnapshotRequest) -> Vec<Tag> {
    request
        .tags
        .iter()
        .map(|(key, value)| Tag::builder().key(key).value(value).build())
        .collect()
}

fn target_identifier(request: &SnapshotRequest) -> &str {
    match &request.target {
        SnapshotTarget::Instance(id) | SnapshotTarget::Cluster(id) => id,
    }
}

#[async_trait]
impl DbLogSource for AwsDbLogSource {
    async fn describe_db_log_files(
        &self,
        db_identifier: &str,
        marker: &str,
    ) -> RecorderResult<LogFilesPage> {
        let output = self
            .client
            .describe_db_log_files()
            .db_instance_identifier(db_identifier)
            .marker(marker)
            .send()
            .await
            .map_err(|e| RecorderError::provider("DescribeDBLogFiles", DisplayErrorContext(&e)))?;

        let file_names = output
            .describe_db_log_files()
            .iter()
            .filter_map(|details| details.log_file_name().map(str::to_string))
            .collect();

        Ok(LogFilesPage {
            file_names,
            marker: output.marker().map(str::to_string),
        })
    }

    async fn download_db_log_file_portion(
        &self,
        db_identifier: &str,
        log_file_name: &str,
        marker: &str,
        number_of_lines: i32,
    ) -> RecorderResult<LogPortion> {
        let output = self
            .client
            .download_db_log_file_portion()
            .db_instance_identifier(db_identifier)
            .log_file_name(log_file_name)
            .marker(marker)
            .number_of_lines(number_of_lines)
            .send()
            .await
            .map_err(|e| {
                RecorderError::provider("DownloadDBLogFilePortion", DisplayErrorContext(&e))
            })?;

        Ok(LogPortion {
            data: output.log_file_data().unwrap_or_default().to_string(),
            marker: output.marker().map(str::to_string),
        })
    }

    async fn describe_db_instances(&self, db_identifier: &str) -> RecorderResult<Vec<DbInstance>> {
        let output = self
            .client
            .describe_db_instances()
            .db_instance_identifier(db_identifier)
            .send()
            .await
            .map_err(|e| RecorderError::provider("DescribeDBInstances", DisplayErrorContext(&e)))?;

        Ok(output
            .db_instances()
            .iter()
            .map(|instance| DbInstance {
                identifier: instance
                    .db_instance_identifier()
                    .unwrap_or(db_identifier)
                    .to_string(),
                cluster_identifier: instance.db_cluster_identifier().map(str::to_string),
            })
            .collect())
    }

    async fn create_db_snapshot(&self, request: &SnapshotRequest) -> RecorderResult<String> {
        let output = self
            .client
            .create_db_snapshot()
            .db_instance_identifier(target_identifier(request))
            .db_snapshot_identifier(&request.snapshot_identifier)
            .set_tags(Some(snapshot_tags(request)))
            .send()
            .await
            .map_err(|e| RecorderError::provider("CreateDBSnapshot", DisplayErrorContext(&e)))?;

        output
            .db_snapshot()
            .and_then(|snapshot| snapshot.db_snapshot_arn())
            .map(str::to_string)
            .ok_or_else(|| RecorderError::IncompleteResponse {
                operation: "CreateDBSnapshot",
                detail: "missing snapshot ARN".into(),
            })
    }

    async fn create_db_cluster_snapshot(&self, request: &SnapshotRequest) -> RecorderResult<String> {
        let output = self
            .client
            .create_db_cluster_snapshot()
            .db_cluster_identifier(target_identifier(request))
            .db_cluster_snapshot_identifier(&request.snapshot_identifier)
            .set_tags(Some(snapshot_tags(request)))
            .send()
            .await
            .map_err(|e| {
                RecorderError::provider("CreateDBClusterSnapshot", DisplayErrorContext(&e))
            })?;

        output
            .db_cluster_snapshot()
            .and_then(|snapshot| snapshot.db_cluster_snapshot_arn())
            .map(str::to_string)
            .ok_or_else(|| RecorderError::IncompleteResponse {
                operation: "CreateDBClusterSnapshot",
                detail: "missing cluster snapshot ARN".into(),
            })
    }
}
