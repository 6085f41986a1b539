use serde::Serialize;
use serde_json::{json, Value};

use super::*;
use crate::cfn::{
    get_att, get_ref, logical_id, policy_document, policy_statement, select_s3website_url, sub, to_properties,
    CfnResource, RemovalPolicy,
};

/// How the bucket holding the site contents is obtained.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum BucketSource {
    /// a new bucket is created and owned by the site. cloudformation picks the name.
    #[default]
    Create,
    /// a new bucket is created and owned by the site, with this physical name.
    Named(String),
    /// an existing bucket is used as is. nothing is created for it, and it is never deleted.
    Existing(BucketHandle),
}

/// Template values that point at a bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketHandle {
    pub bucket_name: Value,
    pub regional_domain_name: Value,
    /// set when the bucket is configured as an S3 website
    pub website_domain: Option<Value>,
}

impl BucketHandle {
    pub fn from_bucket_name(name: &str) -> Self {
        Self {
            bucket_name: Value::String(name.to_string()),
            regional_domain_name: sub(&format!("{name}.s3.${{AWS::Region}}.${{AWS::URLSuffix}}")),
            website_domain: None,
        }
    }

    /// a bucket defined elsewhere in the same template
    pub fn from_logical_id(logical_bucket: &str) -> Self {
        Self {
            bucket_name: get_ref(logical_bucket),
            regional_domain_name: get_att(logical_bucket, "RegionalDomainName"),
            website_domain: None,
        }
    }

    pub fn with_website_domain(mut self, domain: Value) -> Self {
        self.website_domain = Some(domain);
        self
    }

    /// the physical bucket name, if it is known before deploying.
    pub fn literal_name(&self) -> Option<&str> {
        self.bucket_name.as_str()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBucket {
    pub handle: BucketHandle,
    /// only set when the bucket was created by the site.
    pub logical_id: Option<String>,
    pub website: bool,
}

impl ResolvedBucket {
    pub fn is_owned(&self) -> bool {
        self.logical_id.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerSideEncryptionByDefault {
    #[serde(rename = "SSEAlgorithm")]
    pub sse_algorithm: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerSideEncryptionRule {
    pub server_side_encryption_by_default: ServerSideEncryptionByDefault,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BucketEncryption {
    pub server_side_encryption_configuration: Vec<ServerSideEncryptionRule>,
}

impl BucketEncryption {
    /// SSE-S3
    pub fn s3_managed() -> Self {
        Self {
            server_side_encryption_configuration: vec![ServerSideEncryptionRule {
                server_side_encryption_by_default: ServerSideEncryptionByDefault {
                    sse_algorithm: "AES256".to_string(),
                },
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebsiteConfiguration {
    pub index_document: String,
    pub error_document: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PublicAccessBlockConfiguration {
    pub block_public_acls: bool,
    pub block_public_policy: bool,
    pub ignore_public_acls: bool,
    pub restrict_public_buckets: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnBucket {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    pub bucket_encryption: BucketEncryption,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_configuration: Option<WebsiteConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_access_block_configuration: Option<PublicAccessBlockConfiguration>,
    #[serde(skip)]
    pub removal_policy: RemovalPolicy,
}

impl CfnResource for CfnBucket {
    fn type_string(&self) -> &'static str {
        "AWS::S3::Bucket"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        to_properties(self)
    }
    fn removal_policy(&self) -> Option<RemovalPolicy> {
        Some(self.removal_policy)
    }
    fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.bucket_name {
            let valid_chars = name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
            if name.len() < 3 || name.len() > 63 || !valid_chars {
                return Err(format!("Invalid bucket name {name:?}\nMust be 3-63 characters of lowercase letters, numbers, dots and hyphens"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnBucketPolicy {
    pub bucket: Value,
    pub policy_document: Value,
}

impl CfnResource for CfnBucketPolicy {
    fn type_string(&self) -> &'static str {
        "AWS::S3::BucketPolicy"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        to_properties(self)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IamPolicy {
    pub policy_name: String,
    pub policy_document: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnRole {
    pub description: String,
    pub assume_role_policy_document: Value,
    pub managed_policy_arns: Vec<Value>,
    pub policies: Vec<IamPolicy>,
}

impl CfnResource for CfnRole {
    fn type_string(&self) -> &'static str {
        "AWS::IAM::Role"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        to_properties(self)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionCode {
    pub zip_file: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnFunction {
    pub runtime: String,
    pub handler: String,
    pub role: Value,
    pub timeout: u32,
    pub code: FunctionCode,
}

impl CfnResource for CfnFunction {
    fn type_string(&self) -> &'static str {
        "AWS::Lambda::Function"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        to_properties(self)
    }
}

/// Custom resource that empties the bucket when the stack gets deleted.
/// Without it, deleting a stack with a bucket that is not empty will fail.
#[derive(Debug, Clone)]
pub struct CleanupResource {
    pub lambda_logical_id: String,
    pub bucket_logical_id: String,
}

impl CfnResource for CleanupResource {
    fn type_string(&self) -> &'static str {
        "Custom::S3AutoDeleteObjects"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        Ok(json!({
            "ServiceToken": get_att(&self.lambda_logical_id, "Arn"),
            "BucketName": get_ref(&self.bucket_logical_id),
        }))
    }
    fn depends_on(&self) -> Vec<String> {
        vec![self.bucket_logical_id.clone()]
    }
}

const CLEANUP_FUNCTION_CODE: &str = r#"
const { S3Client, ListObjectsV2Command, DeleteObjectsCommand } = require('@aws-sdk/client-s3');
const response = require('cfn-response');
const s3 = new S3Client({});
async function emptyBucket(bucketName) {
    let token;
    do {
        const page = await s3.send(new ListObjectsV2Command({ Bucket: bucketName, ContinuationToken: token }));
        const objects = (page.Contents || []).map((obj) => ({ Key: obj.Key }));
        if (objects.length > 0) {
            await s3.send(new DeleteObjectsCommand({ Bucket: bucketName, Delete: { Objects: objects } }));
        }
        token = page.NextContinuationToken;
    } while (token);
}
exports.handler = async function(event, context) {
    let responseType = response.SUCCESS;
    if (event.RequestType == 'Delete') {
        try {
            await emptyBucket(event.ResourceProperties.BucketName);
        } catch (err) {
            console.log(`Error deleting objects from S3 bucket: ${err}`);
            responseType = response.FAILED;
        }
    }
    await response.send(event, context, responseType);
}
"#;

pub fn create_assume_role_policy_doc() -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": "lambda.amazonaws.com" },
            "Action": "sts:AssumeRole",
        }],
    })
}

fn objects_arn(logical_bucket: &str) -> Value {
    sub(&format!("arn:${{AWS::Partition}}:s3:::${{{logical_bucket}}}/*"))
}

/// lets `principal` read every object of a bucket owned by the site.
pub fn add_read_policy(stack: &mut Stack, policy_logical_id: &str, logical_bucket: &str, principal: Value) {
    let policy = CfnBucketPolicy {
        bucket: get_ref(logical_bucket),
        policy_document: policy_document(vec![policy_statement("Allow", "s3:GetObject", objects_arn(logical_bucket), principal)]),
    };
    stack.add_resource(policy_logical_id, policy);
}

pub fn resolve_bucket(stack: &mut Stack, id: &str, props: &StaticWebsiteProps, defaults: &SiteDefaults) -> ResolvedBucket {
    let bucket_name = match &props.bucket {
        BucketSource::Existing(handle) => {
            tracing::debug!("using existing bucket {}", handle.bucket_name);
            return ResolvedBucket {
                handle: handle.clone(),
                logical_id: None,
                website: handle.website_domain.is_some(),
            };
        }
        BucketSource::Named(name) => Some(name.clone()),
        BucketSource::Create => None,
    };

    let logical_bucket_name = logical_id(&[id, "Bucket"]);
    let mut bucket = CfnBucket {
        bucket_name,
        bucket_encryption: BucketEncryption::s3_managed(),
        website_configuration: None,
        public_access_block_configuration: None,
        // the bucket only holds contents built during deploy, so it can be safely removed
        removal_policy: RemovalPolicy::Destroy,
    };
    if props.website_mode {
        bucket.website_configuration = Some(WebsiteConfiguration {
            index_document: props.index_page.clone().unwrap_or_else(|| defaults.index_page.clone()),
            error_document: props.error_page.clone().unwrap_or_else(|| defaults.error_page.clone()),
        });
        bucket.public_access_block_configuration = Some(PublicAccessBlockConfiguration {
            block_public_acls: false,
            block_public_policy: false,
            ignore_public_acls: false,
            restrict_public_buckets: false,
        });
    }
    tracing::debug!("creating bucket {logical_bucket_name} (website mode: {})", props.website_mode);
    stack.add_resource(&logical_bucket_name, bucket);

    let mut handle = BucketHandle::from_logical_id(&logical_bucket_name);
    if props.website_mode {
        add_read_policy(stack, &logical_id(&[id, "BucketPolicy"]), &logical_bucket_name, Value::String("*".into()));
        handle = handle.with_website_domain(select_s3website_url(&logical_bucket_name));
    }
    if props.auto_delete_objects {
        add_cleanup_resources(stack, id, &logical_bucket_name);
    }
    ResolvedBucket {
        handle,
        logical_id: Some(logical_bucket_name),
        website: props.website_mode,
    }
}

fn add_cleanup_resources(stack: &mut Stack, id: &str, logical_bucket_name: &str) {
    let list_bucket = json!({
        "Effect": "Allow",
        "Action": "s3:ListBucket",
        "Resource": get_att(logical_bucket_name, "Arn"),
    });
    let delete_objects = json!({
        "Effect": "Allow",
        "Action": "s3:DeleteObject",
        "Resource": objects_arn(logical_bucket_name),
    });
    let logical_role_name = logical_id(&[id, "CleanupRole"]);
    let role = CfnRole {
        description: format!("auto generated cleanup resource for {id}"),
        assume_role_policy_document: create_assume_role_policy_doc(),
        managed_policy_arns: vec![sub("arn:${AWS::Partition}:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole")],
        policies: vec![IamPolicy {
            policy_name: "cleanup-bucket".to_string(),
            policy_document: json!({
                "Version": "2012-10-17",
                "Statement": [list_bucket, delete_objects],
            }),
        }],
    };
    let logical_fn_name = logical_id(&[id, "CleanupFunction"]);
    let function = CfnFunction {
        runtime: "nodejs20.x".to_string(),
        handler: "index.handler".to_string(),
        role: get_att(&logical_role_name, "Arn"),
        timeout: 900,
        code: FunctionCode { zip_file: CLEANUP_FUNCTION_CODE.trim_start().to_string() },
    };
    let cleanup = CleanupResource {
        lambda_logical_id: logical_fn_name.clone(),
        bucket_logical_id: logical_bucket_name.to_string(),
    };
    stack.add_resource(&logical_role_name, role);
    stack.add_resource(&logical_fn_name, function);
    stack.add_resource(&logical_id(&[id, "Cleanup"]), cleanup);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(bucket: BucketSource, website_mode: bool) -> StaticWebsiteProps {
        StaticWebsiteProps {
            bucket,
            website_mode,
            ..StaticWebsiteProps::new("blog.acme.tld", HostedZone::new("Z123", "acme.tld"), "./public")
        }
    }

    fn resolve(p: &StaticWebsiteProps) -> (Stack, ResolvedBucket) {
        let mut stack = Stack::new("site", "eu-west-1");
        let resolved = resolve_bucket(&mut stack, "Site", p, &SiteDefaults::default());
        (stack, resolved)
    }

    #[test]
    fn creates_encrypted_bucket_that_is_destroyed() {
        let (stack, resolved) = resolve(&props(BucketSource::Create, false));
        let template = stack.to_template().unwrap();
        assert_eq!(template.count_of_type("AWS::S3::Bucket"), 1);
        let bucket = &template.resources["SiteBucket"];
        assert_eq!(bucket.deletion_policy.as_deref(), Some("Delete"));
        assert_eq!(
            bucket.properties["BucketEncryption"]["ServerSideEncryptionConfiguration"][0]["ServerSideEncryptionByDefault"]["SSEAlgorithm"],
            "AES256"
        );
        assert!(bucket.properties.get("BucketName").is_none());
        assert!(bucket.properties.get("WebsiteConfiguration").is_none());
        assert_eq!(template.count_of_type("AWS::S3::BucketPolicy"), 0);
        assert!(resolved.is_owned());
        assert!(!resolved.website);
        assert_eq!(resolved.handle.bucket_name, get_ref("SiteBucket"));
    }

    #[test]
    fn named_bucket_keeps_its_name() {
        let (stack, _) = resolve(&props(BucketSource::Named("my-site-bucket".into()), false));
        let template = stack.to_template().unwrap();
        assert_eq!(template.resources["SiteBucket"].properties["BucketName"], "my-site-bucket");
    }

    #[test]
    fn invalid_bucket_name_fails_rendering() {
        let (stack, _) = resolve(&props(BucketSource::Named("My_Bucket".into()), false));
        assert!(stack.to_template().is_err());
    }

    #[test]
    fn website_mode_is_public_with_documents() {
        let (stack, resolved) = resolve(&props(BucketSource::Create, true));
        let template = stack.to_template().unwrap();
        assert_eq!(template.count_of_type("AWS::S3::Bucket"), 1);
        let bucket = &template.resources["SiteBucket"];
        assert_eq!(bucket.properties["WebsiteConfiguration"]["IndexDocument"], "index.html");
        assert_eq!(bucket.properties["WebsiteConfiguration"]["ErrorDocument"], "error.html");
        assert_eq!(bucket.properties["PublicAccessBlockConfiguration"]["BlockPublicPolicy"], false);
        let policy = &template.resources["SiteBucketPolicy"];
        assert_eq!(policy.properties["PolicyDocument"]["Statement"][0]["Principal"], "*");
        assert_eq!(policy.properties["PolicyDocument"]["Statement"][0]["Action"], "s3:GetObject");
        assert!(resolved.website);
        assert!(resolved.handle.website_domain.is_some());
    }

    #[test]
    fn website_documents_follow_configured_pages() {
        let mut p = props(BucketSource::Create, true);
        p.index_page = Some("home.html".into());
        p.error_page = Some("oops.html".into());
        let (stack, _) = resolve(&p);
        let template = stack.to_template().unwrap();
        let website = &template.resources["SiteBucket"].properties["WebsiteConfiguration"];
        assert_eq!(website["IndexDocument"], "home.html");
        assert_eq!(website["ErrorDocument"], "oops.html");
    }

    #[test]
    fn existing_bucket_is_reused_unchanged() {
        let handle = BucketHandle::from_bucket_name("shared-assets");
        for website_mode in [false, true] {
            let (stack, resolved) = resolve(&props(BucketSource::Existing(handle.clone()), website_mode));
            assert!(stack.resources.is_empty());
            assert_eq!(resolved.handle, handle);
            assert!(!resolved.is_owned());
            assert_eq!(resolved.handle.literal_name(), Some("shared-assets"));
        }
    }

    #[test]
    fn cleanup_resources_empty_the_bucket() {
        let mut p = props(BucketSource::Create, false);
        p.auto_delete_objects = true;
        let (stack, _) = resolve(&p);
        let template = stack.to_template().unwrap();
        assert_eq!(template.count_of_type("AWS::IAM::Role"), 1);
        assert_eq!(template.count_of_type("AWS::Lambda::Function"), 1);
        let cleanup = &template.resources["SiteCleanup"];
        assert_eq!(cleanup.ty, "Custom::S3AutoDeleteObjects");
        assert_eq!(cleanup.properties["BucketName"], get_ref("SiteBucket"));
        assert_eq!(cleanup.depends_on, vec!["SiteBucket".to_string()]);

        p.auto_delete_objects = false;
        let (stack, _) = resolve(&p);
        assert_eq!(stack.to_template().unwrap().count_of_type("Custom::S3AutoDeleteObjects"), 0);
    }
}
