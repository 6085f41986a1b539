//! Static websites on AWS: an S3 bucket behind a CloudFront distribution,
//! with an ACM certificate and Route53 records for every domain.
//!
//! [`resources::StaticWebsite`] turns [`resources::StaticWebsiteProps`] into
//! cloudformation stacks, and [`deploy`] applies them.

pub mod cfn;
pub mod config;
pub mod deploy;
pub mod error;
pub mod regions;
pub mod resources;
pub mod stack;

pub use error::{Result, StaticWebsiteError};
pub use resources::{DeploymentPlan, SiteDefaults, StaticWebsite, StaticWebsiteProps};
pub use stack::Stack;
