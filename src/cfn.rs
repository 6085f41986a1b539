use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{Result, StaticWebsiteError};

/// A resource that can be written into a cloudformation template.
/// `properties` is the value of the `Properties` key for this resource.
pub trait CfnResource: std::fmt::Debug {
    fn type_string(&self) -> &'static str;

    fn properties(&self) -> serde_json::Result<Value>;

    fn removal_policy(&self) -> Option<RemovalPolicy> {
        None
    }

    fn depends_on(&self) -> Vec<String> {
        vec![]
    }

    /// checks that can be done before sending the template to cloudformation.
    /// returns a human readable reason on failure.
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// What happens to a resource when it is removed from the stack,
/// or when the whole stack is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalPolicy {
    Destroy,
    Retain,
}

pub fn to_properties<T: Serialize>(t: &T) -> serde_json::Result<Value> {
    serde_json::to_value(t)
}

/// { "Ref": logical_id }
pub fn get_ref(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// { "Fn::GetAtt": [logical_id, attribute] }
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// { "Fn::Sub": s }
pub fn sub(s: &str) -> Value {
    json!({ "Fn::Sub": s })
}

/// { "Fn::Select": [index, { "Fn::Split": [delimiter, value] }] }
pub fn select_split(index: usize, delimiter: &str, value: Value) -> Value {
    json!({ "Fn::Select": [index.to_string(), { "Fn::Split": [delimiter, value] }] })
}

/// S3 only gives us the website url (http://bucket.s3-website-region.amazonaws.com)
/// but cloudfront wants the bare domain name:
/// { "Fn::Select" : [ "2", { "Fn::Split": ["/", { "Fn::GetAtt": [logical_bucket, "WebsiteURL"] }] } ] }
pub fn select_s3website_url(logical_bucket: &str) -> Value {
    select_split(2, "/", get_att(logical_bucket, "WebsiteURL"))
}

pub fn policy_statement(effect: &str, action: &str, resource: Value, principal: Value) -> Value {
    json!({
        "Effect": effect,
        "Action": action,
        "Resource": resource,
        "Principal": principal,
    })
}

pub fn policy_document(statements: Vec<Value>) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": statements,
    })
}

/// logical ids must be alphanumeric. we drop every other character, eg:
/// `logical_id("Site", "Record", "www.acme.tld")` -> `SiteRecordwwwacmetld`
pub fn logical_id(parts: &[&str]) -> String {
    parts.concat().chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

pub fn verify_resource_name(resource_name: &str) -> Result<()> {
    let invalid = |reason: &str| Err(StaticWebsiteError::InvalidLogicalId(resource_name.to_string(), reason.to_string()));
    if resource_name.len() > 255 {
        return invalid("must be less than 255 characters");
    }
    if resource_name.is_empty() {
        return invalid("Must contain at least 1 character");
    }
    if !resource_name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return invalid("Must contain only alphanumeric characters [A-Za-z0-9]");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_ids_drop_non_alphanumerics() {
        assert_eq!(logical_id(&["Site", "Record", "www.blog-1.acme.tld"]), "SiteRecordwwwblog1acmetld");
        assert!(verify_resource_name(&logical_id(&["my_site", "Bucket"])).is_ok());
    }

    #[test]
    fn resource_names_are_checked() {
        assert!(verify_resource_name("").is_err());
        assert!(verify_resource_name("has-dash").is_err());
        assert!(verify_resource_name(&"a".repeat(256)).is_err());
        assert!(verify_resource_name("Bucket1").is_ok());
    }

    #[test]
    fn website_url_is_split_into_domain() {
        let v = select_s3website_url("SiteBucket");
        assert_eq!(v["Fn::Select"][0], "2");
        assert_eq!(v["Fn::Select"][1]["Fn::Split"][0], "/");
        assert_eq!(v["Fn::Select"][1]["Fn::Split"][1]["Fn::GetAtt"][1], "WebsiteURL");
    }
}
