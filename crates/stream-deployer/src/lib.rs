//! Event stream template deployer.
//!
//! Templates carry a JSON stream definition. Several artifacts may deploy
//! the same stream; the definition is kept while at least one of them
//! still references it.

pub mod definition;
pub mod deployer;
pub mod error;

pub use definition::{Attribute, AttributeType, DeployableTemplate, StreamDefinition};
pub use deployer::StreamDeployer;
pub use error::DeployError;
