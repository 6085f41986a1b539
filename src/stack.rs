use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cfn::{verify_resource_name, CfnResource, RemovalPolicy};
use crate::error::{Result, StaticWebsiteError};
use crate::regions::verify_region;

#[derive(Debug)]
pub struct Resource {
    pub name: String,
    pub properties: Box<dyn CfnResource>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedResource {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Properties")]
    pub properties: Value,
    #[serde(rename = "DeletionPolicy", default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<String>,
    #[serde(rename = "UpdateReplacePolicy", default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<String>,
    #[serde(rename = "DependsOn", default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateParameter {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceOutput {
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Value")]
    pub value: Value,
}

/// maps are ordered so that the same stack always renders the same json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedTemplate {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub version: String,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Parameters", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, TemplateParameter>,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, SavedResource>,
    #[serde(rename = "Outputs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, ResourceOutput>,
}

impl Default for SavedTemplate {
    fn default() -> Self {
        Self {
            version: "2010-09-09".to_string(),
            description: None,
            parameters: Default::default(),
            resources: Default::default(),
            outputs: Default::default(),
        }
    }
}

impl SavedTemplate {
    pub fn resources_of_type<'a>(&'a self, ty: &'a str) -> impl Iterator<Item = (&'a String, &'a SavedResource)> + 'a {
        self.resources.iter().filter(move |(_, r)| r.ty == ty)
    }

    pub fn count_of_type(&self, ty: &str) -> usize {
        self.resources_of_type(ty).count()
    }
}

/// One cloudformation stack: everything in it is deployed to a single region.
#[derive(Debug)]
pub struct Stack {
    pub name: String,
    pub region: String,
    pub description: Option<String>,
    pub parameters: BTreeMap<String, TemplateParameter>,
    pub resources: Vec<Resource>,
    pub outputs: BTreeMap<String, ResourceOutput>,
}

impl Stack {
    pub fn new<S: Into<String>, R: Into<String>>(name: S, region: R) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            description: None,
            parameters: Default::default(),
            resources: vec![],
            outputs: Default::default(),
        }
    }

    pub fn add_resource<R: CfnResource + 'static>(&mut self, name: &str, resource: R) {
        self.resources.push(Resource {
            name: name.to_string(),
            properties: Box::new(resource) as _,
        });
    }

    pub fn add_string_parameter(&mut self, name: &str, description: &str) {
        self.parameters.insert(name.to_string(), TemplateParameter {
            ty: "String".to_string(),
            description: Some(description.to_string()),
        });
    }

    pub fn add_output(&mut self, name: &str, description: &str, value: Value) {
        self.outputs.insert(name.to_string(), ResourceOutput {
            description: description.to_string(),
            value,
        });
    }

    pub fn has_resource(&self, name: &str) -> bool {
        self.resources.iter().any(|r| r.name == name)
    }

    pub fn to_template(&self) -> Result<SavedTemplate> {
        validate_stack_name(&self.name)?;
        verify_region(&self.region)?;
        let mut out_template = SavedTemplate {
            description: self.description.clone(),
            parameters: self.parameters.clone(),
            outputs: self.outputs.clone(),
            ..Default::default()
        };
        for resource in self.resources.iter() {
            verify_resource_name(&resource.name)?;
            if let Err(reason) = resource.properties.validate() {
                return Err(StaticWebsiteError::InvalidResource { name: resource.name.clone(), reason });
            }
            let policy = resource.properties.removal_policy().map(|p| policy_string(p).to_string());
            let saved_resource = SavedResource {
                ty: resource.properties.type_string().to_string(),
                properties: resource.properties.properties()?,
                deletion_policy: policy.clone(),
                update_replace_policy: policy,
                depends_on: resource.properties.depends_on(),
            };
            if out_template.resources.insert(resource.name.clone(), saved_resource).is_some() {
                return Err(StaticWebsiteError::DuplicateLogicalId(resource.name.clone(), self.name.clone()));
            }
        }
        for name in self.parameters.keys().chain(self.outputs.keys()) {
            verify_resource_name(name)?;
        }
        Ok(out_template)
    }

    /// pretty so that if a user needs to look at the stack in the Cfn console, it looks nice
    pub fn to_json_pretty(&self) -> Result<String> {
        let template = self.to_template()?;
        Ok(serde_json::to_string_pretty(&template)?)
    }
}

fn policy_string(policy: RemovalPolicy) -> &'static str {
    match policy {
        RemovalPolicy::Destroy => "Delete",
        RemovalPolicy::Retain => "Retain",
    }
}

/// A stack name can contain only alphanumeric characters (case sensitive) and hyphens.
/// It must start with an alphabetical character and can't be longer than 128 characters.
pub fn validate_stack_name(stack_name: &str) -> Result<()> {
    let invalid = || Err(StaticWebsiteError::InvalidStackName(stack_name.to_string()));
    if stack_name.is_empty() || stack_name.len() > 128 {
        return invalid();
    }
    for (i, c) in stack_name.chars().enumerate() {
        if i == 0 && !c.is_ascii_alphabetic() {
            return invalid();
        }
        if !c.is_ascii_alphanumeric() && c != '-' {
            return invalid();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfn::to_properties;
    use serde_json::json;

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct Dummy {
        name: String,
        #[serde(skip)]
        keep: bool,
    }

    impl CfnResource for Dummy {
        fn type_string(&self) -> &'static str {
            "Custom::Dummy"
        }
        fn properties(&self) -> serde_json::Result<Value> {
            to_properties(self)
        }
        fn removal_policy(&self) -> Option<RemovalPolicy> {
            if self.keep { Some(RemovalPolicy::Retain) } else { None }
        }
        fn validate(&self) -> std::result::Result<(), String> {
            if self.name.is_empty() {
                return Err("Must provide a name".into());
            }
            Ok(())
        }
    }

    fn dummy(name: &str) -> Dummy {
        Dummy { name: name.into(), keep: false }
    }

    #[test]
    fn stack_names() {
        assert!(validate_stack_name("my-site").is_ok());
        assert!(validate_stack_name("1site").is_err());
        assert!(validate_stack_name("my_site").is_err());
        assert!(validate_stack_name("").is_err());
        assert!(validate_stack_name(&"a".repeat(129)).is_err());
    }

    #[test]
    fn renders_resources_and_policies() {
        let mut stack = Stack::new("my-site", "eu-west-1");
        stack.add_resource("A", dummy("a"));
        stack.add_resource("B", Dummy { name: "b".into(), keep: true });
        stack.add_output("AName", "the name", json!({ "Ref": "A" }));
        let template = stack.to_template().unwrap();
        assert_eq!(template.resources.len(), 2);
        assert_eq!(template.resources["A"].properties, json!({ "Name": "a" }));
        assert_eq!(template.resources["A"].deletion_policy, None);
        assert_eq!(template.resources["B"].deletion_policy.as_deref(), Some("Retain"));
        assert_eq!(template.resources["B"].update_replace_policy.as_deref(), Some("Retain"));
        assert_eq!(template.count_of_type("Custom::Dummy"), 2);

        let rendered: Value = serde_json::from_str(&stack.to_json_pretty().unwrap()).unwrap();
        assert_eq!(rendered["AWSTemplateFormatVersion"], "2010-09-09");
        assert!(rendered.get("Parameters").is_none());
        assert_eq!(rendered["Outputs"]["AName"]["Value"]["Ref"], "A");
    }

    #[test]
    fn rejects_bad_resources() {
        let mut stack = Stack::new("my-site", "eu-west-1");
        stack.add_resource("A", dummy(""));
        assert!(matches!(stack.to_template(), Err(StaticWebsiteError::InvalidResource { .. })));

        let mut stack = Stack::new("my-site", "eu-west-1");
        stack.add_resource("A", dummy("a"));
        stack.add_resource("A", dummy("b"));
        assert!(matches!(stack.to_template(), Err(StaticWebsiteError::DuplicateLogicalId(..))));

        let mut stack = Stack::new("my-site", "eu-west-1");
        stack.add_resource("a-b", dummy("a"));
        assert!(matches!(stack.to_template(), Err(StaticWebsiteError::InvalidLogicalId(..))));

        let stack = Stack::new("my-site", "mars-north-1");
        assert!(matches!(stack.to_template(), Err(StaticWebsiteError::InvalidRegion(..))));
    }

    #[test]
    fn rendering_is_deterministic() {
        let build = || {
            let mut stack = Stack::new("my-site", "eu-west-1");
            for name in ["Zeta", "Alpha", "Mid"] {
                stack.add_resource(name, dummy(name));
            }
            stack.to_json_pretty().unwrap()
        };
        assert_eq!(build(), build());
    }
}
