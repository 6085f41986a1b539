use serde::Serialize;
use serde_json::Value;

use super::*;
use crate::cfn::{get_ref, logical_id, to_properties, CfnResource};

/// How the certificate assigned to the distribution is obtained.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CertificateSource {
    /// a new DNS validated certificate is requested for the domain and its aliases.
    #[default]
    Create,
    /// an existing certificate is loaded by its ARN.
    Arn(String),
    /// an existing certificate is used as is.
    Existing(CertificateHandle),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CertificateHandle {
    pub arn: Value,
}

impl CertificateHandle {
    pub fn from_arn(arn: &str) -> Self {
        Self { arn: Value::String(arn.to_string()) }
    }

    /// the ARN is passed in as a template parameter of the stack using it.
    pub fn from_parameter(parameter: &str) -> Self {
        Self { arn: get_ref(parameter) }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CertificateOrigin {
    Provided,
    Imported,
    /// requested in its own stack, since it must live in the certificate region.
    Created,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCertificate {
    pub handle: CertificateHandle,
    pub origin: CertificateOrigin,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DomainValidationOption {
    pub domain_name: String,
    pub hosted_zone_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnCertificate {
    pub domain_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subject_alternative_names: Vec<String>,
    pub validation_method: String,
    pub domain_validation_options: Vec<DomainValidationOption>,
}

impl CfnResource for CfnCertificate {
    fn type_string(&self) -> &'static str {
        "AWS::CertificateManager::Certificate"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        to_properties(self)
    }
    fn validate(&self) -> Result<(), String> {
        if self.domain_name.is_empty() {
            return Err("Must provide a domain name".to_string());
        }
        for domain in std::iter::once(&self.domain_name).chain(self.subject_alternative_names.iter()) {
            verify_certificate_domain(domain)?;
        }
        Ok(())
    }
}

/// Domains must be fully qualified, and can have 1 optional wildcard as the first component.
/// - valid: `www.mysite.com`, `mysite.com`, `*.mysite.com`
/// - invalid: `*.something.*.mysite.com`, `cannotendwithdot.com.`
pub fn verify_certificate_domain(domain: &str) -> Result<(), String> {
    if domain.ends_with('.') {
        return Err(format!("{domain} is invalid. Certificate domains cannot end with a dot"));
    }
    if domain.contains('*') {
        if domain.matches('*').count() > 1 {
            return Err(format!("Must only provide 1 wildcard. {domain} is invalid."));
        }
        if !domain.starts_with("*.") {
            return Err(format!("If using a wildcard, it must be the first component of your domain, eg: \"*.something.com\". {domain} is invalid."));
        }
    }
    Ok(())
}

/// Returns the certificate plus, when one has to be issued, the stack that issues it.
/// That stack exports the ARN as an output, and `site_stack` receives it through
/// a parameter with the same name.
pub fn resolve_certificate(
    site_stack: &mut Stack,
    id: &str,
    props: &StaticWebsiteProps,
    defaults: &SiteDefaults,
) -> (ResolvedCertificate, Option<Stack>) {
    match &props.certificate {
        CertificateSource::Existing(handle) => {
            let resolved = ResolvedCertificate { handle: handle.clone(), origin: CertificateOrigin::Provided };
            (resolved, None)
        }
        CertificateSource::Arn(arn) => {
            tracing::debug!("loading existing certificate {arn}");
            let resolved = ResolvedCertificate { handle: CertificateHandle::from_arn(arn), origin: CertificateOrigin::Imported };
            (resolved, None)
        }
        CertificateSource::Create => {
            let logical_cert_name = logical_id(&[id, "Certificate"]);
            let arn_name = logical_id(&[id, "CertificateArn"]);
            let domain_validation_options = props
                .domain_names()
                .into_iter()
                .map(|domain| DomainValidationOption {
                    domain_name: domain.to_string(),
                    hosted_zone_id: props.hosted_zone.zone_id.clone(),
                })
                .collect();
            let cert = CfnCertificate {
                domain_name: props.domain.clone(),
                subject_alternative_names: props.domain_aliases.clone(),
                validation_method: "DNS".to_string(),
                domain_validation_options,
            };

            let mut cert_stack = Stack::new(format!("{}-certificate", site_stack.name), defaults.certificate_region.clone());
            cert_stack.description = Some(format!("certificate for {}", props.domain));
            cert_stack.add_resource(&logical_cert_name, cert);
            cert_stack.add_output(&arn_name, "ARN of the site certificate", get_ref(&logical_cert_name));
            site_stack.add_string_parameter(&arn_name, &format!("ARN of the certificate from {}", cert_stack.name));
            tracing::debug!("requesting certificate for {} in {}", props.domain, cert_stack.region);

            let resolved = ResolvedCertificate {
                handle: CertificateHandle::from_parameter(&arn_name),
                origin: CertificateOrigin::Created,
            };
            (resolved, Some(cert_stack))
        }
    }
}
