use std::path::PathBuf;
use std::time::Duration;

use super::*;
use crate::cfn::logical_id;
use crate::regions::CERTIFICATE_REGION;

pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_INDEX_PAGE: &str = "index.html";
pub const DEFAULT_ERROR_PAGE: &str = "error.html";

/// Values used whenever the props leave something out.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteDefaults {
    pub cache_duration: Duration,
    pub error_cache_duration: Duration,
    pub index_page: String,
    /// only used for the bucket website configuration
    pub error_page: String,
    pub certificate_region: String,
}

impl Default for SiteDefaults {
    fn default() -> Self {
        Self {
            cache_duration: DEFAULT_CACHE_DURATION,
            error_cache_duration: DEFAULT_CACHE_DURATION,
            index_page: DEFAULT_INDEX_PAGE.to_string(),
            error_page: DEFAULT_ERROR_PAGE.to_string(),
            certificate_region: CERTIFICATE_REGION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StaticWebsiteProps {
    /// The bucket which will contain the website contents.
    pub bucket: BucketSource,

    /// The prefix (path) where the contents can be found in the bucket.
    /// Defaults to no prefix.
    pub bucket_content_prefix: Option<String>,

    /// The certificate assigned to the distribution. HTTPS is always enforced.
    pub certificate: CertificateSource,

    /// Default TTL of the cache policy. Defaults to 1 hour.
    pub cache_duration: Option<Duration>,

    pub cache_cookies: CacheKeyFilter,
    pub cache_headers: HeaderCacheKey,
    pub cache_query: CacheKeyFilter,

    /// The directory that contains the website contents that are to be published.
    pub directory: PathBuf,

    /// The public domain name under which the website shall be accessible.
    pub domain: String,

    /// Additional domain names. These MUST be in the same hosted zone as `domain`.
    pub domain_aliases: Vec<String>,

    /// Object key of the 404 error page in the bucket.
    pub error_page: Option<String>,

    /// Cache duration for the custom 404 error page. Defaults to 1 hour.
    pub error_cache_duration: Option<Duration>,

    /// The hosted zone in which the records for the domain (and aliases) are created.
    pub hosted_zone: HostedZone,

    /// Object key of the default index page in the bucket. Defaults to `index.html`.
    pub index_page: Option<String>,

    /// Website mode lets a request for a "directory" resolve to its index document,
    /// but requires the bucket to be publicly readable, so traffic is no longer
    /// guaranteed to go through the distribution.
    pub website_mode: bool,

    pub record_mode: RecordMode,

    /// Empty a created bucket when the stack is deleted, so the bucket can be deleted too.
    pub auto_delete_objects: bool,

    /// Remove objects under the content prefix that are not part of `directory` when uploading.
    pub prune: bool,
}

impl StaticWebsiteProps {
    pub fn new<D: Into<String>, P: Into<PathBuf>>(domain: D, hosted_zone: HostedZone, directory: P) -> Self {
        Self {
            bucket: Default::default(),
            bucket_content_prefix: None,
            certificate: Default::default(),
            cache_duration: None,
            cache_cookies: Default::default(),
            cache_headers: Default::default(),
            cache_query: Default::default(),
            directory: directory.into(),
            domain: domain.into(),
            domain_aliases: vec![],
            error_page: None,
            error_cache_duration: None,
            hosted_zone,
            index_page: None,
            website_mode: false,
            record_mode: Default::default(),
            auto_delete_objects: true,
            prune: true,
        }
    }

    /// `[domain, ...domain_aliases]`
    pub fn domain_names(&self) -> Vec<&str> {
        std::iter::once(self.domain.as_str())
            .chain(self.domain_aliases.iter().map(String::as_str))
            .collect()
    }
}

/// The resources of one static website, resolved from its props.
#[derive(Debug)]
pub struct StaticWebsite {
    pub bucket: ResolvedBucket,
    pub certificate: ResolvedCertificate,
    pub distribution: DistributionHandle,
    /// logical ids of the DNS records
    pub records: Vec<String>,
    pub upload: ContentUpload,
    /// only set when a certificate has to be issued
    pub certificate_stack: Option<Stack>,
}

impl StaticWebsite {
    /// Adds the website's resources to `stack`. `id` prefixes every logical id,
    /// so several sites can share a stack.
    pub fn new(stack: &mut Stack, id: &str, props: &StaticWebsiteProps, defaults: &SiteDefaults) -> Self {
        tracing::debug!("resolving static website {} in stack {}", props.domain, stack.name);
        let bucket = resolve_bucket(stack, id, props, defaults);
        let (certificate, certificate_stack) = resolve_certificate(stack, id, props, defaults);
        let distribution = build_distribution(stack, id, props, defaults, &bucket, &certificate);
        let records = build_records(stack, id, props, &distribution);

        let bucket_output = logical_id(&[id, "BucketName"]);
        stack.add_output(&bucket_output, "bucket holding the website contents", bucket.handle.bucket_name.clone());
        stack.add_output(&logical_id(&[id, "DistributionId"]), "id of the distribution", distribution.distribution_id());
        stack.add_output(&logical_id(&[id, "DistributionDomainName"]), "domain name of the distribution", distribution.domain_name());
        let upload = ContentUpload::new(props, &bucket, bucket_output);

        Self {
            bucket,
            certificate,
            distribution,
            records,
            upload,
            certificate_stack,
        }
    }

    /// Stacks in the order they must be deployed in, followed by the upload.
    pub fn into_plan(self, site_stack: Stack) -> DeploymentPlan {
        let mut stacks = vec![];
        if let Some(cert_stack) = self.certificate_stack {
            stacks.push(cert_stack);
        }
        stacks.push(site_stack);
        DeploymentPlan { stacks, upload: self.upload }
    }
}

#[derive(Debug)]
pub struct DeploymentPlan {
    pub stacks: Vec<Stack>,
    pub upload: ContentUpload,
}

impl DeploymentPlan {
    pub fn site_stack(&self) -> Option<&Stack> {
        self.stacks.last()
    }

    /// renders every stack, returning (stack name, pretty json)
    pub fn render(&self) -> crate::error::Result<Vec<(String, String)>> {
        let mut out = vec![];
        for stack in self.stacks.iter() {
            out.push((stack.name.clone(), stack.to_json_pretty()?));
        }
        Ok(out)
    }
}
