//! Deploys a [`DeploymentPlan`]: every stack in order, then the site contents.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use aws_sdk_cloudformation::types::{Capability, OnFailure, Parameter, StackStatus};
use aws_sdk_s3::primitives::ByteStream;

use crate::error::{aws_error, Result, StaticWebsiteError};
use crate::resources::{ContentUpload, DeploymentPlan};
use crate::stack::Stack;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(700);

#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub skip_upload: bool,
    pub poll_interval: Duration,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self { skip_upload: false, poll_interval: DEFAULT_POLL_INTERVAL }
    }
}

#[derive(Debug, Default)]
pub struct DeployOutputs {
    /// outputs of every deployed stack. later stacks win on a name clash.
    pub outputs: HashMap<String, String>,
    pub uploaded: usize,
    pub deleted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackState {
    Done,
    InProgress,
    Failed,
}

pub fn classify_status(status: &StackStatus) -> StackState {
    match status {
        StackStatus::CreateComplete
        | StackStatus::UpdateComplete
        | StackStatus::ImportComplete => StackState::Done,

        StackStatus::CreateInProgress
        | StackStatus::DeleteInProgress
        | StackStatus::ImportInProgress
        | StackStatus::ImportRollbackInProgress
        | StackStatus::ReviewInProgress
        | StackStatus::RollbackInProgress
        | StackStatus::UpdateCompleteCleanupInProgress
        | StackStatus::UpdateInProgress
        | StackStatus::UpdateRollbackCompleteCleanupInProgress
        | StackStatus::UpdateRollbackInProgress => StackState::InProgress,

        // a rolled back or deleted stack did not deploy what we asked for
        _ => StackState::Failed,
    }
}

/// Every parameter of `stack` is filled from an earlier stack's output with the same name.
pub fn resolve_parameters(stack: &Stack, known_outputs: &HashMap<String, String>) -> Result<Vec<(String, String)>> {
    stack
        .parameters
        .keys()
        .map(|key| match known_outputs.get(key) {
            Some(value) => Ok((key.clone(), value.clone())),
            None => Err(StaticWebsiteError::MissingOutput { stack: stack.name.clone(), key: key.clone() }),
        })
        .collect()
}

/// the physical bucket name: either known up front, or read from the site stack outputs.
pub fn bucket_name_for(upload: &ContentUpload, outputs: &HashMap<String, String>) -> Result<String> {
    if let Some(name) = upload.bucket.literal_name() {
        return Ok(name.to_string());
    }
    outputs.get(&upload.bucket_output).cloned().ok_or_else(|| StaticWebsiteError::MissingOutput {
        stack: "site".to_string(),
        key: upload.bucket_output.clone(),
    })
}

/// keys under the prefix that are not part of the upload anymore.
pub fn stale_keys(existing: Vec<String>, uploaded: &HashSet<String>) -> Vec<String> {
    existing.into_iter().filter(|k| !uploaded.contains(k)).collect()
}

async fn make_config(region: &str) -> aws_config::SdkConfig {
    aws_config::from_env()
        .region(aws_sdk_cloudformation::config::Region::new(region.to_string()))
        .load()
        .await
}

pub async fn deploy_plan(plan: &DeploymentPlan, options: &DeployOptions) -> Result<DeployOutputs> {
    let mut out = DeployOutputs::default();
    for stack in plan.stacks.iter() {
        let body = stack.to_json_pretty()?;
        let parameters = resolve_parameters(stack, &out.outputs)?;
        let config = make_config(&stack.region).await;
        let client = aws_sdk_cloudformation::Client::new(&config);
        tracing::info!("deploying stack {} to {}", stack.name, stack.region);
        create_or_update_stack(&client, &stack.name, &body, &parameters).await?;
        let outputs = wait_for_output(&client, &stack.name, options.poll_interval).await?;
        tracing::info!("stack {} is ready", stack.name);
        out.outputs.extend(outputs);
    }

    if options.skip_upload {
        tracing::info!("skipping upload of {}", plan.upload.source_dir.display());
        return Ok(out);
    }
    let region = match plan.site_stack() {
        Some(stack) => stack.region.clone(),
        None => return Ok(out),
    };
    let bucket = bucket_name_for(&plan.upload, &out.outputs)?;
    let config = make_config(&region).await;
    let client = aws_sdk_s3::Client::new(&config);
    let (uploaded, deleted) = upload_contents(&client, &bucket, &plan.upload).await?;
    out.uploaded = uploaded;
    out.deleted = deleted;
    Ok(out)
}

pub async fn does_stack_exist(client: &aws_sdk_cloudformation::Client, name: &str) -> Result<bool> {
    match client.describe_stacks().stack_name(name).send().await {
        Ok(_) => Ok(true),
        Err(e) => {
            let e_str = format!("{:#?}", e);
            if e_str.contains("does not exist") {
                return Ok(false);
            }
            Err(StaticWebsiteError::Aws(e_str))
        }
    }
}

/// `None` while the stack is still being worked on.
pub async fn describe_stack(
    client: &aws_sdk_cloudformation::Client,
    name: &str,
) -> Result<Option<aws_sdk_cloudformation::types::Stack>> {
    let resp = client.describe_stacks().stack_name(name).send().await.map_err(aws_error)?;
    let not_found = || StaticWebsiteError::StackFailed { stack: name.to_string(), reason: "stack not found".to_string() };
    let first = resp.stacks().and_then(|s| s.first()).ok_or_else(not_found)?;
    let status = first.stack_status().ok_or_else(not_found)?;
    match classify_status(status) {
        StackState::Done => Ok(Some(first.clone())),
        StackState::InProgress => Ok(None),
        StackState::Failed => Err(StaticWebsiteError::StackFailed {
            stack: name.to_string(),
            reason: format!(
                "{}: {}",
                status.as_str(),
                first.stack_status_reason().unwrap_or("Failed to get stack failure reason")
            ),
        }),
    }
}

pub async fn wait_for_output(
    client: &aws_sdk_cloudformation::Client,
    name: &str,
    poll_interval: Duration,
) -> Result<HashMap<String, String>> {
    loop {
        tokio::time::sleep(poll_interval).await;
        let stack = match describe_stack(client, name).await? {
            Some(stack) => stack,
            None => {
                tracing::debug!("still waiting on {name}");
                continue;
            }
        };
        let mut out = HashMap::new();
        for output in stack.outputs().unwrap_or_default() {
            if let (Some(key), Some(val)) = (output.output_key(), output.output_value()) {
                out.insert(key.to_string(), val.to_string());
            }
        }
        return Ok(out);
    }
}

pub async fn create_or_update_stack(
    client: &aws_sdk_cloudformation::Client,
    name: &str,
    body: &str,
    parameters: &[(String, String)],
) -> Result<()> {
    let parameters: Vec<Parameter> = parameters
        .iter()
        .map(|(k, v)| Parameter::builder().parameter_key(k).parameter_value(v).build())
        .collect();
    if does_stack_exist(client, name).await? {
        tracing::info!("updating {name}");
        let res = client
            .update_stack()
            .capabilities(Capability::CapabilityNamedIam)
            .capabilities(Capability::CapabilityIam)
            .stack_name(name)
            .template_body(body)
            .set_parameters(Some(parameters))
            .send()
            .await;
        if let Err(e) = res {
            let e_str = format!("{:#?}", e);
            if e_str.contains("No updates are to be performed") {
                tracing::info!("{name} is already up to date");
                return Ok(());
            }
            return Err(StaticWebsiteError::Aws(e_str));
        }
    } else {
        tracing::info!("creating {name}");
        client
            .create_stack()
            .on_failure(OnFailure::Delete)
            .capabilities(Capability::CapabilityNamedIam)
            .capabilities(Capability::CapabilityIam)
            .stack_name(name)
            .template_body(body)
            .set_parameters(Some(parameters))
            .send()
            .await
            .map_err(aws_error)?;
    }
    Ok(())
}

/// Uploads every file of the source directory, then prunes what is left over.
/// Returns (uploaded, deleted).
pub async fn upload_contents(client: &aws_sdk_s3::Client, bucket: &str, upload: &ContentUpload) -> Result<(usize, usize)> {
    let files = upload.collect_files()?;
    tracing::info!("uploading {} files to s3://{}/{}", files.len(), bucket, upload.list_prefix());
    let mut uploaded = HashSet::new();
    for file in files.iter() {
        let upload_err = |reason: String| StaticWebsiteError::Upload { path: file.path.display().to_string(), reason };
        let body = ByteStream::from_path(&file.path).await.map_err(|e| upload_err(e.to_string()))?;
        client
            .put_object()
            .bucket(bucket)
            .key(&file.key)
            .content_type(file.content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| upload_err(format!("{:#?}", e)))?;
        tracing::debug!("uploaded {}", file.key);
        uploaded.insert(file.key.clone());
    }

    if !upload.prune {
        return Ok((uploaded.len(), 0));
    }
    let existing = list_keys(client, bucket, &upload.list_prefix()).await?;
    let stale = stale_keys(existing, &uploaded);
    for key in stale.iter() {
        client.delete_object().bucket(bucket).key(key).send().await.map_err(aws_error)?;
        tracing::debug!("deleted {key}");
    }
    Ok((uploaded.len(), stale.len()))
}

pub async fn list_keys(client: &aws_sdk_s3::Client, bucket: &str, prefix: &str) -> Result<Vec<String>> {
    let mut keys = vec![];
    let mut token: Option<String> = None;
    loop {
        let resp = client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .set_continuation_token(token.take())
            .send()
            .await
            .map_err(aws_error)?;
        for object in resp.contents().unwrap_or_default() {
            if let Some(key) = object.key() {
                keys.push(key.to_string());
            }
        }
        match resp.next_continuation_token() {
            Some(next) => token = Some(next.to_string()),
            None => return Ok(keys),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::BucketHandle;

    #[test]
    fn statuses_are_classified() {
        assert_eq!(classify_status(&StackStatus::CreateComplete), StackState::Done);
        assert_eq!(classify_status(&StackStatus::UpdateComplete), StackState::Done);
        assert_eq!(classify_status(&StackStatus::CreateInProgress), StackState::InProgress);
        assert_eq!(classify_status(&StackStatus::UpdateCompleteCleanupInProgress), StackState::InProgress);
        assert_eq!(classify_status(&StackStatus::RollbackComplete), StackState::Failed);
        assert_eq!(classify_status(&StackStatus::UpdateRollbackComplete), StackState::Failed);
        assert_eq!(classify_status(&StackStatus::DeleteComplete), StackState::Failed);
        assert_eq!(classify_status(&StackStatus::CreateFailed), StackState::Failed);
    }

    #[test]
    fn parameters_come_from_earlier_outputs() {
        let mut stack = Stack::new("site", "eu-west-1");
        stack.add_string_parameter("SiteCertificateArn", "arn");
        let mut known = HashMap::new();
        assert!(matches!(resolve_parameters(&stack, &known), Err(StaticWebsiteError::MissingOutput { .. })));

        known.insert("SiteCertificateArn".to_string(), "arn:aws:acm:us-east-1:1:certificate/x".to_string());
        known.insert("Unrelated".to_string(), "x".to_string());
        let params = resolve_parameters(&stack, &known).unwrap();
        assert_eq!(params, vec![("SiteCertificateArn".to_string(), "arn:aws:acm:us-east-1:1:certificate/x".to_string())]);

        assert!(resolve_parameters(&Stack::new("cert", "us-east-1"), &HashMap::new()).unwrap().is_empty());
    }

    fn upload(bucket: BucketHandle) -> ContentUpload {
        ContentUpload {
            source_dir: "./public".into(),
            bucket,
            bucket_output: "SiteBucketName".into(),
            key_prefix: None,
            prune: true,
        }
    }

    #[test]
    fn bucket_name_from_literal_or_output() {
        let outputs = HashMap::from([("SiteBucketName".to_string(), "site-bucket-abc".to_string())]);
        assert_eq!(bucket_name_for(&upload(BucketHandle::from_bucket_name("shared")), &outputs).unwrap(), "shared");
        assert_eq!(bucket_name_for(&upload(BucketHandle::from_logical_id("SiteBucket")), &outputs).unwrap(), "site-bucket-abc");
        assert!(bucket_name_for(&upload(BucketHandle::from_logical_id("SiteBucket")), &HashMap::new()).is_err());
    }

    #[test]
    fn only_stale_keys_are_pruned() {
        let uploaded: HashSet<String> = ["site/index.html".to_string()].into();
        let existing = vec!["site/index.html".to_string(), "site/old.html".to_string()];
        assert_eq!(stale_keys(existing, &uploaded), vec!["site/old.html".to_string()]);
    }
}
