//! Site configuration file.
//!
//! ```toml
//! [stack]
//! name = "blog-site"
//! region = "eu-west-1"
//!
//! [site]
//! domain = "blog.acme.tld"
//! directory = "./public"
//! hosted_zone = { id = "Z123", name = "acme.tld" }
//! cache_query = ["page"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, StaticWebsiteError};
use crate::resources::{
    BucketHandle, BucketSource, CacheKeyFilter, CertificateSource, DeploymentPlan, HeaderCacheKey, HostedZone,
    RecordMode, SiteDefaults, StaticWebsite, StaticWebsiteProps,
};
use crate::stack::{validate_stack_name, Stack};
use crate::regions::verify_region;

pub const DEFAULT_SITE_ID: &str = "StaticWebsite";

fn default_site_id() -> String {
    DEFAULT_SITE_ID.to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackConfig {
    pub name: String,
    pub region: String,
    /// prefix of every logical id in the site stack
    #[serde(default = "default_site_id")]
    pub id: String,
}

/// `{ name = "my-bucket" }` creates a bucket with that name,
/// `{ existing = "their-bucket" }` uses one that is already there.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BucketConfig {
    pub name: Option<String>,
    pub existing: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CertificateConfig {
    pub arn: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteSection {
    pub domain: String,
    #[serde(default)]
    pub domain_aliases: Vec<String>,
    pub directory: PathBuf,
    pub hosted_zone: HostedZone,
    #[serde(default)]
    pub bucket: BucketConfig,
    pub bucket_content_prefix: Option<String>,
    #[serde(default)]
    pub certificate: CertificateConfig,
    pub cache_duration_secs: Option<u64>,
    #[serde(default)]
    pub cache_cookies: CacheKeyFilter,
    #[serde(default)]
    pub cache_headers: HeaderCacheKey,
    #[serde(default)]
    pub cache_query: CacheKeyFilter,
    pub error_page: Option<String>,
    pub error_cache_duration_secs: Option<u64>,
    pub index_page: Option<String>,
    #[serde(default)]
    pub website_mode: bool,
    #[serde(default)]
    pub record_mode: RecordMode,
    #[serde(default = "default_true")]
    pub auto_delete_objects: bool,
    #[serde(default = "default_true")]
    pub prune: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    pub stack: StackConfig,
    pub site: SiteSection,
    /// directory of the config file, relative site paths are resolved against it
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl SiteConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("loading config {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&contents)?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn to_props(&self) -> Result<StaticWebsiteProps> {
        let site = &self.site;
        let bucket = match (&site.bucket.name, &site.bucket.existing) {
            (Some(_), Some(_)) => {
                return Err(StaticWebsiteError::Config("bucket cannot have both `name` and `existing`".to_string()))
            }
            (Some(name), None) => BucketSource::Named(name.clone()),
            (None, Some(existing)) => BucketSource::Existing(BucketHandle::from_bucket_name(existing)),
            (None, None) => BucketSource::Create,
        };
        let certificate = match &site.certificate.arn {
            Some(arn) => CertificateSource::Arn(arn.clone()),
            None => CertificateSource::Create,
        };
        let directory = if site.directory.is_absolute() {
            site.directory.clone()
        } else {
            self.base_dir.join(&site.directory)
        };
        Ok(StaticWebsiteProps {
            bucket,
            bucket_content_prefix: site.bucket_content_prefix.clone(),
            certificate,
            cache_duration: site.cache_duration_secs.map(Duration::from_secs),
            cache_cookies: site.cache_cookies.clone(),
            cache_headers: site.cache_headers.clone(),
            cache_query: site.cache_query.clone(),
            directory,
            domain: site.domain.clone(),
            domain_aliases: site.domain_aliases.clone(),
            error_page: site.error_page.clone(),
            error_cache_duration: site.error_cache_duration_secs.map(Duration::from_secs),
            hosted_zone: site.hosted_zone.clone(),
            index_page: site.index_page.clone(),
            website_mode: site.website_mode,
            record_mode: site.record_mode,
            auto_delete_objects: site.auto_delete_objects,
            prune: site.prune,
        })
    }

    pub fn plan(&self) -> Result<DeploymentPlan> {
        validate_stack_name(&self.stack.name)?;
        verify_region(&self.stack.region)?;
        let props = self.to_props()?;
        let mut stack = Stack::new(self.stack.name.clone(), self.stack.region.clone());
        stack.description = Some(format!("static website {}", props.domain));
        let site = StaticWebsite::new(&mut stack, &self.stack.id, &props, &SiteDefaults::default());
        Ok(site.into_plan(stack))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [stack]
        name = "blog-site"
        region = "eu-west-1"

        [site]
        domain = "blog.acme.tld"
        directory = "public"
        hosted_zone = { id = "Z123", name = "acme.tld" }
    "#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = SiteConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.stack.id, DEFAULT_SITE_ID);
        let props = config.to_props().unwrap();
        let expected = StaticWebsiteProps::new("blog.acme.tld", HostedZone::new("Z123", "acme.tld"), "public");
        assert_eq!(props, expected);
    }

    #[test]
    fn full_config() {
        let config = SiteConfig::from_toml_str(
            r#"
            [stack]
            name = "blog-site"
            region = "eu-west-1"
            id = "Blog"

            [site]
            domain = "blog.acme.tld"
            domain_aliases = ["www.blog.acme.tld"]
            directory = "/srv/blog"
            hosted_zone = { id = "Z123", name = "acme.tld" }
            bucket = { existing = "shared-assets" }
            bucket_content_prefix = "/blog"
            certificate = { arn = "arn:aws:acm:us-east-1:1:certificate/x" }
            cache_duration_secs = 123
            cache_cookies = true
            cache_headers = ["Accept-Language"]
            cache_query = false
            error_page = "404.html"
            error_cache_duration_secs = 10
            website_mode = true
            record_mode = "primary_only"
            auto_delete_objects = false
            prune = false
            "#,
        )
        .unwrap();
        let props = config.to_props().unwrap();
        assert_eq!(props.bucket, BucketSource::Existing(BucketHandle::from_bucket_name("shared-assets")));
        assert_eq!(props.certificate, CertificateSource::Arn("arn:aws:acm:us-east-1:1:certificate/x".into()));
        assert_eq!(props.cache_duration, Some(Duration::from_secs(123)));
        assert_eq!(props.cache_cookies, CacheKeyFilter::All);
        assert_eq!(props.cache_headers, HeaderCacheKey::AllowList(vec!["Accept-Language".into()]));
        assert_eq!(props.cache_query, CacheKeyFilter::Disabled);
        assert_eq!(props.error_cache_duration, Some(Duration::from_secs(10)));
        assert_eq!(props.record_mode, RecordMode::PrimaryOnly);
        assert_eq!(props.directory, PathBuf::from("/srv/blog"));
        assert!(props.website_mode);
        assert!(!props.auto_delete_objects);
        assert!(!props.prune);
    }

    #[test]
    fn headers_cannot_be_true() {
        let contents = format!("{MINIMAL}\ncache_headers = true\n");
        assert!(matches!(SiteConfig::from_toml_str(&contents), Err(StaticWebsiteError::Toml(_))));
    }

    #[test]
    fn bucket_name_and_existing_conflict() {
        let contents = format!("{MINIMAL}\nbucket = {{ name = \"a-bucket\", existing = \"b-bucket\" }}\n");
        let config = SiteConfig::from_toml_str(&contents).unwrap();
        assert!(matches!(config.to_props(), Err(StaticWebsiteError::Config(_))));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let contents = format!("{MINIMAL}\ncache_everything = true\n");
        assert!(SiteConfig::from_toml_str(&contents).is_err());
    }

    #[test]
    fn load_resolves_directory_next_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.toml");
        std::fs::write(&path, MINIMAL).unwrap();
        let config = SiteConfig::load(&path).unwrap();
        assert_eq!(config.to_props().unwrap().directory, dir.path().join("public"));
    }

    #[test]
    fn plan_validates_stack() {
        let mut config = SiteConfig::from_toml_str(MINIMAL).unwrap();
        let plan = config.plan().unwrap();
        assert_eq!(plan.stacks.len(), 2);
        assert_eq!(plan.stacks[1].name, "blog-site");
        assert!(plan.stacks[1].has_resource("StaticWebsiteDistribution"));

        config.stack.name = "blog_site".into();
        assert!(matches!(config.plan(), Err(StaticWebsiteError::InvalidStackName(_))));
        config.stack.name = "blog-site".into();
        config.stack.region = "mars-1".into();
        assert!(matches!(config.plan(), Err(StaticWebsiteError::InvalidRegion(..))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(SiteConfig::load(dir.path().join("nope.toml")), Err(StaticWebsiteError::Io(_))));
    }
}
