//! Platform-level build defaults supplied by the active platform.

use super::{BuildStrategy, PublishStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Target registry for the built image.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegistrySpec {
    /// Registry address (e.g. "registry.local:5000"). Empty means no push.
    #[serde(default)]
    pub address: String,
    /// Name of the secret holding registry credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Allow plain HTTP and unverified TLS.
    #[serde(default)]
    pub insecure: bool,
}

impl RegistrySpec {
    /// Creates a registry spec for an address.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    /// Sets the credentials secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Marks the registry as insecure.
    #[must_use]
    pub fn insecure(mut self) -> Self {
        self.insecure = true;
        self
    }

    /// Returns the full image reference for `image` in this registry.
    #[must_use]
    pub fn image_reference(&self, image: &str) -> Option<String> {
        let address = self.address.trim_end_matches('/');
        if address.is_empty() {
            None
        } else {
            Some(format!("{address}/{image}"))
        }
    }
}

/// Compute resource requests and limits, keyed by resource name ("cpu", "memory").
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceRequirements {
    /// Upper bounds.
    #[serde(default)]
    pub limits: BTreeMap<String, String>,
    /// Guaranteed amounts.
    #[serde(default)]
    pub requests: BTreeMap<String, String>,
}

impl ResourceRequirements {
    /// Sets a limit.
    #[must_use]
    pub fn with_limit(mut self, resource: impl Into<String>, quantity: impl Into<String>) -> Self {
        self.limits.insert(resource.into(), quantity.into());
        self
    }

    /// Sets a request.
    #[must_use]
    pub fn with_request(mut self, resource: impl Into<String>, quantity: impl Into<String>) -> Self {
        self.requests.insert(resource.into(), quantity.into());
        self
    }
}

/// Default build inputs every build on a platform starts from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildTemplate {
    /// Named byte-content inputs (e.g. the Dockerfile).
    #[serde(default, with = "super::build::base64_map")]
    pub resources: BTreeMap<String, Vec<u8>>,
    /// Extra executor arguments.
    #[serde(default)]
    pub additional_args: Vec<String>,
    /// Compute resources for the build.
    #[serde(default)]
    pub resource_requirements: ResourceRequirements,
    /// Build timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl BuildTemplate {
    /// Adds a named resource.
    #[must_use]
    pub fn with_resource(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.resources.insert(name.into(), content.into());
        self
    }

    /// Appends extra executor arguments.
    #[must_use]
    pub fn with_additional_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.additional_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the resource requirements.
    #[must_use]
    pub fn with_resource_requirements(mut self, requirements: ResourceRequirements) -> Self {
        self.resource_requirements = requirements;
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }
}

/// The active platform of a namespace, as returned by the platform lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Platform {
    /// Platform name.
    pub name: String,
    /// Defaults copied into every new build.
    #[serde(default)]
    pub build_template: BuildTemplate,
    /// Registry target.
    #[serde(default)]
    pub registry: RegistrySpec,
    /// Execution backend selector.
    #[serde(default)]
    pub build_strategy: BuildStrategy,
    /// Publish selector.
    #[serde(default)]
    pub publish_strategy: PublishStrategy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_reference() {
        let registry = RegistrySpec::new("registry.local:5000/");
        assert_eq!(
            registry.image_reference("greetings:latest").as_deref(),
            Some("registry.local:5000/greetings:latest")
        );
        assert_eq!(RegistrySpec::default().image_reference("x:latest"), None);
    }

    #[test]
    fn test_platform_deserialize_defaults() {
        let platform: Platform = serde_json::from_str(r#"{"name": "default"}"#).unwrap();
        assert_eq!(platform.build_strategy, BuildStrategy::PodExecutor);
        assert_eq!(platform.publish_strategy, PublishStrategy::Kaniko);
        assert!(platform.build_template.resources.is_empty());
    }

    #[test]
    fn test_template_resources_serialize_as_base64() {
        let template = BuildTemplate::default().with_resource("Dockerfile", b"FROM scratch".to_vec());
        let json = serde_json::to_value(&template).unwrap();
        assert_eq!(json["resources"]["Dockerfile"], "RlJPTSBzY3JhdGNo");

        let back: BuildTemplate = serde_json::from_value(json).unwrap();
        assert_eq!(back, template);
    }
}
