use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::*;
use crate::cfn::{logical_id, to_properties, CfnResource};

/// this is static for all of AWS for aliases to CloudFront
/// see https://docs.aws.amazon.com/AWSCloudFormation/latest/UserGuide/aws-properties-route53-aliastarget.html#cfn-route53-aliastarget-hostedzoneid
pub const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

/// The Route53 hosted zone the site's domain (and all aliases) live in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostedZone {
    #[serde(rename = "id")]
    pub zone_id: String,
    #[serde(rename = "name")]
    pub zone_name: String,
}

impl HostedZone {
    pub fn new<S: Into<String>, N: Into<String>>(zone_id: S, zone_name: N) -> Self {
        Self {
            zone_id: zone_id.into(),
            zone_name: zone_name.into(),
        }
    }
}

/// Which domains get a record pointing at the distribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordMode {
    /// one record for the domain and one for every alias
    #[default]
    PerDomain,
    /// a single record for the domain, aliases are left alone
    PrimaryOnly,
}

#[derive(Debug, Clone, Serialize)]
pub struct AliasTarget {
    #[serde(rename = "DNSName")]
    pub dns_name: Value,
    #[serde(rename = "HostedZoneId")]
    pub hosted_zone_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnRecordSet {
    pub hosted_zone_id: String,
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: String,
    pub alias_target: AliasTarget,
}

impl CfnResource for CfnRecordSet {
    fn type_string(&self) -> &'static str {
        "AWS::Route53::RecordSet"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        to_properties(self)
    }
}

/// record names must end in `.`
pub fn fully_qualified(domain: &str) -> String {
    let mut name = domain.to_string();
    if !name.ends_with('.') {
        name.push('.');
    }
    name
}

pub fn record_domains(props: &StaticWebsiteProps) -> Vec<&str> {
    match props.record_mode {
        RecordMode::PerDomain => props.domain_names(),
        RecordMode::PrimaryOnly => vec![props.domain.as_str()],
    }
}

/// 32 bit FNV-1a, so ids stay the same across builds and toolchains.
fn domain_hash(domain: &str) -> u32 {
    domain.to_ascii_lowercase().bytes().fold(0x811c9dc5u32, |hash, b| (hash ^ b as u32).wrapping_mul(0x01000193))
}

/// The readable part of a domain loses its dots, dashes and wildcards,
/// so the hash of the full domain keeps ids of different domains apart.
/// eg: `*.acme.tld` -> `SiteRecordacmetld` + 8 hex digits
pub fn record_logical_id(id: &str, domain: &str) -> String {
    format!("{}{:08x}", logical_id(&[id, "Record", domain]), domain_hash(domain))
}

/// Creates one A alias record per domain, all pointing at the same distribution.
/// Returns the logical ids of the records.
pub fn build_records(stack: &mut Stack, id: &str, props: &StaticWebsiteProps, distribution: &DistributionHandle) -> Vec<String> {
    let mut out = vec![];
    for domain in record_domains(props) {
        let record = CfnRecordSet {
            hosted_zone_id: props.hosted_zone.zone_id.clone(),
            name: fully_qualified(domain),
            record_type: "A".to_string(),
            alias_target: AliasTarget {
                dns_name: distribution.domain_name(),
                hosted_zone_id: CLOUDFRONT_HOSTED_ZONE_ID.to_string(),
            },
        };
        let logical_record_name = record_logical_id(id, domain);
        tracing::debug!("record {} -> {}", record.name, distribution.logical_id);
        stack.add_resource(&logical_record_name, record);
        out.push(logical_record_name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(aliases: &[&str], record_mode: RecordMode) -> StaticWebsiteProps {
        StaticWebsiteProps {
            domain_aliases: aliases.iter().map(|s| s.to_string()).collect(),
            record_mode,
            ..StaticWebsiteProps::new("blog.acme.tld", HostedZone::new("Z123", "acme.tld"), "./public")
        }
    }

    fn distribution() -> DistributionHandle {
        DistributionHandle { logical_id: "SiteDistribution".into() }
    }

    #[test]
    fn one_record_per_domain() {
        for n in 0..4 {
            let aliases: Vec<String> = (0..n).map(|i| format!("www{i}.blog.acme.tld")).collect();
            let aliases: Vec<&str> = aliases.iter().map(String::as_str).collect();
            let mut stack = Stack::new("site", "eu-west-1");
            let records = build_records(&mut stack, "Site", &props(&aliases, RecordMode::PerDomain), &distribution());
            assert_eq!(records.len(), n + 1);
            let template = stack.to_template().unwrap();
            assert_eq!(template.count_of_type("AWS::Route53::RecordSet"), n + 1);
            for (_, record) in template.resources_of_type("AWS::Route53::RecordSet") {
                assert_eq!(record.properties["AliasTarget"]["DNSName"], distribution().domain_name());
                assert_eq!(record.properties["AliasTarget"]["HostedZoneId"], CLOUDFRONT_HOSTED_ZONE_ID);
                assert_eq!(record.properties["HostedZoneId"], "Z123");
                assert_eq!(record.properties["Type"], "A");
            }
        }
    }

    #[test]
    fn primary_only_ignores_aliases() {
        let mut stack = Stack::new("site", "eu-west-1");
        let records = build_records(&mut stack, "Site", &props(&["www.blog.acme.tld"], RecordMode::PrimaryOnly), &distribution());
        assert_eq!(records, vec![record_logical_id("Site", "blog.acme.tld")]);
        assert!(records[0].starts_with("SiteRecordblogacmetld"));
        let template = stack.to_template().unwrap();
        assert_eq!(template.resources[&records[0]].properties["Name"], "blog.acme.tld.");
    }

    #[test]
    fn similar_domains_get_distinct_records() {
        for (domain, alias) in [("acme.tld", "*.acme.tld"), ("wwwblog.acme.tld", "www-blog.acme.tld")] {
            let p = StaticWebsiteProps {
                domain_aliases: vec![alias.to_string()],
                ..StaticWebsiteProps::new(domain, HostedZone::new("Z123", "acme.tld"), "./public")
            };
            let mut stack = Stack::new("site", "eu-west-1");
            let records = build_records(&mut stack, "Site", &p, &distribution());
            assert_ne!(records[0], records[1]);
            let template = stack.to_template().unwrap();
            assert_eq!(template.count_of_type("AWS::Route53::RecordSet"), 2);
            let mut names: Vec<_> = records.iter().map(|r| template.resources[r].properties["Name"].clone()).collect();
            names.sort_by_key(|n| n.to_string());
            let mut expected = vec![serde_json::json!(fully_qualified(domain)), serde_json::json!(fully_qualified(alias))];
            expected.sort_by_key(|n| n.to_string());
            assert_eq!(names, expected);
        }
    }

    #[test]
    fn record_ids_are_stable_and_valid() {
        let a = record_logical_id("Site", "www.blog.acme.tld");
        assert_eq!(a, record_logical_id("Site", "www.blog.acme.tld"));
        assert_ne!(a, record_logical_id("Site", "www.blog2.acme.tld"));
        assert!(crate::cfn::verify_resource_name(&a).is_ok());
    }

    #[test]
    fn names_are_fully_qualified_once() {
        assert_eq!(fully_qualified("blog.acme.tld"), "blog.acme.tld.");
        assert_eq!(fully_qualified("blog.acme.tld."), "blog.acme.tld.");
    }
}
