use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::*;
use crate::cfn::{get_att, get_ref, logical_id, sub, to_properties, CfnResource};
use crate::resources::paths::{origin_path, prefixed_path};

/// managed "CORS-S3Origin" origin request policy.
/// see https://docs.aws.amazon.com/AmazonCloudFront/latest/DeveloperGuide/using-managed-origin-request-policies.html
pub const CORS_S3_ORIGIN_REQUEST_POLICY_ID: &str = "88a5eaf4-2fd4-4709-b370-b4c650ea3fcf";

/// cloudfront caps the max TTL of a cache policy at one year by default.
pub const DEFAULT_MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

const ORIGIN_ID: &str = "origin0";

/// Whether and which values of a request attribute (cookies, query parameters)
/// take part in the cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawCacheKey")]
pub enum CacheKeyFilter {
    #[default]
    Disabled,
    All,
    AllowList(Vec<String>),
}

/// Cache policies can't key on every header, so headers only get an allow list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawCacheKey")]
pub enum HeaderCacheKey {
    #[default]
    Disabled,
    AllowList(Vec<String>),
}

/// config files write cache keys as `false`, `true` or a list of names.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawCacheKey {
    Flag(bool),
    Names(Vec<String>),
}

impl From<RawCacheKey> for CacheKeyFilter {
    fn from(raw: RawCacheKey) -> Self {
        match raw {
            RawCacheKey::Flag(false) => CacheKeyFilter::Disabled,
            RawCacheKey::Flag(true) => CacheKeyFilter::All,
            RawCacheKey::Names(names) => CacheKeyFilter::AllowList(names),
        }
    }
}

impl TryFrom<RawCacheKey> for HeaderCacheKey {
    type Error = String;

    fn try_from(raw: RawCacheKey) -> Result<Self, Self::Error> {
        match raw {
            RawCacheKey::Flag(false) => Ok(HeaderCacheKey::Disabled),
            RawCacheKey::Flag(true) => Err("cache_headers cannot be true: cache policies only accept an allow list of header names".to_string()),
            RawCacheKey::Names(names) => Ok(HeaderCacheKey::AllowList(names)),
        }
    }
}

impl CacheKeyFilter {
    fn behavior(&self) -> (&'static str, Option<Vec<String>>) {
        match self {
            CacheKeyFilter::Disabled => ("none", None),
            CacheKeyFilter::All => ("all", None),
            CacheKeyFilter::AllowList(names) => ("whitelist", Some(names.clone())),
        }
    }
}

impl HeaderCacheKey {
    fn behavior(&self) -> (&'static str, Option<Vec<String>>) {
        match self {
            HeaderCacheKey::Disabled => ("none", None),
            HeaderCacheKey::AllowList(names) => ("whitelist", Some(names.clone())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CookiesConfig {
    pub cookie_behavior: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HeadersConfig {
    pub header_behavior: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryStringsConfig {
    pub query_string_behavior: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_strings: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParametersInCacheKey {
    pub cookies_config: CookiesConfig,
    pub headers_config: HeadersConfig,
    pub query_strings_config: QueryStringsConfig,
    pub enable_accept_encoding_gzip: bool,
    pub enable_accept_encoding_brotli: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CachePolicyConfig {
    #[serde(rename = "Name")]
    pub name: Value,
    #[serde(rename = "Comment")]
    pub comment: String,
    #[serde(rename = "DefaultTTL")]
    pub default_ttl: u64,
    #[serde(rename = "MinTTL")]
    pub min_ttl: u64,
    #[serde(rename = "MaxTTL")]
    pub max_ttl: u64,
    #[serde(rename = "ParametersInCacheKeyAndForwardedToOrigin")]
    pub parameters: ParametersInCacheKey,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnCachePolicy {
    pub cache_policy_config: CachePolicyConfig,
}

impl CfnResource for CfnCachePolicy {
    fn type_string(&self) -> &'static str {
        "AWS::CloudFront::CachePolicy"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        to_properties(self)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OriginAccessIdentityConfig {
    pub comment: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnOriginAccessIdentity {
    pub cloud_front_origin_access_identity_config: OriginAccessIdentityConfig,
}

impl CfnResource for CfnOriginAccessIdentity {
    fn type_string(&self) -> &'static str {
        "AWS::CloudFront::CloudFrontOriginAccessIdentity"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        to_properties(self)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3OriginConfig {
    pub origin_access_identity: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomOriginConfig {
    #[serde(rename = "OriginProtocolPolicy")]
    pub origin_protocol_policy: String,
    #[serde(rename = "HTTPPort")]
    pub http_port: u16,
    #[serde(rename = "HTTPSPort")]
    pub https_port: u16,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Origin {
    pub id: String,
    pub domain_name: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_origin_config: Option<S3OriginConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_origin_config: Option<CustomOriginConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ViewerCertificate {
    pub acm_certificate_arn: Value,
    pub ssl_support_method: String,
    pub minimum_protocol_version: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DefaultCacheBehavior {
    pub target_origin_id: String,
    pub viewer_protocol_policy: String,
    pub allowed_methods: Vec<String>,
    pub cached_methods: Vec<String>,
    pub cache_policy_id: Value,
    pub origin_request_policy_id: String,
    pub compress: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomErrorResponse {
    #[serde(rename = "ErrorCode")]
    pub error_code: u16,
    #[serde(rename = "ResponseCode")]
    pub response_code: u16,
    #[serde(rename = "ResponsePagePath")]
    pub response_page_path: String,
    #[serde(rename = "ErrorCachingMinTTL")]
    pub error_caching_min_ttl: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DistributionConfig {
    pub enabled: bool,
    pub aliases: Vec<String>,
    pub default_root_object: String,
    pub http_version: String,
    pub viewer_certificate: ViewerCertificate,
    pub origins: Vec<Origin>,
    pub default_cache_behavior: DefaultCacheBehavior,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_error_responses: Option<Vec<CustomErrorResponse>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnDistribution {
    pub distribution_config: DistributionConfig,
}

impl CfnResource for CfnDistribution {
    fn type_string(&self) -> &'static str {
        "AWS::CloudFront::Distribution"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        to_properties(self)
    }
    fn validate(&self) -> Result<(), String> {
        if self.distribution_config.aliases.is_empty() {
            return Err("A distribution with a custom certificate needs at least one alias".to_string());
        }
        if let Some(path) = self.distribution_config.origins.iter().filter_map(|o| o.origin_path.as_ref()).find(|p| p.ends_with('/')) {
            return Err(format!("Origin path {path:?} must not end with a slash"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistributionHandle {
    pub logical_id: String,
}

impl DistributionHandle {
    pub fn domain_name(&self) -> Value {
        get_att(&self.logical_id, "DomainName")
    }

    pub fn distribution_id(&self) -> Value {
        get_ref(&self.logical_id)
    }
}

/// By default nothing but the path is used to build the cache key.
pub fn build_cache_policy(id: &str, props: &StaticWebsiteProps, defaults: &SiteDefaults) -> CfnCachePolicy {
    let default_ttl = props.cache_duration.unwrap_or(defaults.cache_duration).as_secs();
    let (cookie_behavior, cookies) = props.cache_cookies.behavior();
    let (header_behavior, headers) = props.cache_headers.behavior();
    let (query_string_behavior, query_strings) = props.cache_query.behavior();
    CfnCachePolicy {
        cache_policy_config: CachePolicyConfig {
            // names must be unique per account
            name: sub(&format!("{id}-${{AWS::StackName}}-${{AWS::Region}}")),
            comment: format!("cache policy for {}", props.domain),
            default_ttl,
            min_ttl: 0,
            max_ttl: DEFAULT_MAX_TTL_SECS.max(default_ttl),
            parameters: ParametersInCacheKey {
                cookies_config: CookiesConfig { cookie_behavior: cookie_behavior.to_string(), cookies },
                headers_config: HeadersConfig { header_behavior: header_behavior.to_string(), headers },
                query_strings_config: QueryStringsConfig { query_string_behavior: query_string_behavior.to_string(), query_strings },
                enable_accept_encoding_gzip: false,
                enable_accept_encoding_brotli: false,
            },
        },
    }
}

/// Website buckets are reached through their public website endpoint (http only).
/// Every other bucket is read through an origin access identity.
pub fn build_origin(stack: &mut Stack, id: &str, bucket: &ResolvedBucket, props: &StaticWebsiteProps) -> Origin {
    let origin_path = origin_path(props.bucket_content_prefix.as_deref());
    if let Some(website_domain) = &bucket.handle.website_domain {
        return Origin {
            id: ORIGIN_ID.to_string(),
            domain_name: website_domain.clone(),
            origin_path,
            s3_origin_config: None,
            custom_origin_config: Some(CustomOriginConfig {
                origin_protocol_policy: "http-only".to_string(),
                http_port: 80,
                https_port: 443,
            }),
        };
    }

    let logical_oai_name = logical_id(&[id, "OriginAccessIdentity"]);
    stack.add_resource(&logical_oai_name, CfnOriginAccessIdentity {
        cloud_front_origin_access_identity_config: OriginAccessIdentityConfig {
            comment: format!("Identity for {}", props.domain),
        },
    });
    match &bucket.logical_id {
        Some(logical_bucket) => {
            let principal = json!({ "CanonicalUser": get_att(&logical_oai_name, "S3CanonicalUserId") });
            add_read_policy(stack, &logical_id(&[id, "BucketPolicy"]), logical_bucket, principal);
        }
        None => {
            tracing::warn!(
                "bucket {} is not owned by this site; its bucket policy must let the origin access identity read objects",
                bucket.handle.bucket_name
            );
        }
    }
    Origin {
        id: ORIGIN_ID.to_string(),
        domain_name: bucket.handle.regional_domain_name.clone(),
        origin_path,
        s3_origin_config: Some(S3OriginConfig {
            origin_access_identity: sub(&format!("origin-access-identity/cloudfront/${{{logical_oai_name}}}")),
        }),
        custom_origin_config: None,
    }
}

pub fn build_error_responses(props: &StaticWebsiteProps, defaults: &SiteDefaults) -> Option<Vec<CustomErrorResponse>> {
    let error_page = props.error_page.as_ref()?;
    let ttl = props.error_cache_duration.unwrap_or(defaults.error_cache_duration);
    Some(vec![CustomErrorResponse {
        error_code: 404,
        response_code: 404,
        response_page_path: prefixed_path(props.bucket_content_prefix.as_deref(), error_page),
        error_caching_min_ttl: ttl.as_secs(),
    }])
}

pub fn build_distribution(
    stack: &mut Stack,
    id: &str,
    props: &StaticWebsiteProps,
    defaults: &SiteDefaults,
    bucket: &ResolvedBucket,
    certificate: &ResolvedCertificate,
) -> DistributionHandle {
    let logical_policy_name = logical_id(&[id, "DistributionCachePolicy"]);
    stack.add_resource(&logical_policy_name, build_cache_policy(id, props, defaults));

    let origin = build_origin(stack, id, bucket, props);
    let distribution = CfnDistribution {
        distribution_config: DistributionConfig {
            enabled: true,
            aliases: props.domain_names().into_iter().map(String::from).collect(),
            default_root_object: props.index_page.clone().unwrap_or_else(|| defaults.index_page.clone()),
            http_version: "http2".to_string(),
            viewer_certificate: ViewerCertificate {
                acm_certificate_arn: certificate.handle.arn.clone(),
                ssl_support_method: "sni-only".to_string(),
                minimum_protocol_version: "TLSv1.2_2021".to_string(),
            },
            default_cache_behavior: DefaultCacheBehavior {
                target_origin_id: origin.id.clone(),
                viewer_protocol_policy: "redirect-to-https".to_string(),
                allowed_methods: vec!["GET".to_string(), "HEAD".to_string()],
                cached_methods: vec!["GET".to_string(), "HEAD".to_string()],
                cache_policy_id: get_ref(&logical_policy_name),
                origin_request_policy_id: CORS_S3_ORIGIN_REQUEST_POLICY_ID.to_string(),
                compress: true,
            },
            origins: vec![origin],
            custom_error_responses: build_error_responses(props, defaults),
        },
    };
    let logical_distr_name = logical_id(&[id, "Distribution"]);
    stack.add_resource(&logical_distr_name, distribution);
    DistributionHandle { logical_id: logical_distr_name }
}
