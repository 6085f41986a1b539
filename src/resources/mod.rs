pub use crate::stack::Stack;

pub mod paths;

mod s3_bucket;
pub use s3_bucket::*;
mod acm_cert;
pub use acm_cert::*;
mod cloudfront;
pub use cloudfront::*;
mod route53;
pub use route53::*;
mod bucket_deployment;
pub use bucket_deployment::*;

// higher level resources:
mod static_website;
pub use static_website::*;
