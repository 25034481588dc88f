//! Application image build and its resulting reference.

use std::{fmt, path::PathBuf};

use crate::{error::BoxError, policy::CachePolicy, topology::BuildSettings};

/// Builds and publishes the application image.
pub trait ImageBuilder {
    /// # Errors
    ///
    /// Returns the collaborator's error when building or pushing fails.
    async fn build(&self, spec: &BuildSpec) -> Result<ImageReference, BoxError>;
}

/// A published image, as consumed by the workload.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ImageReference(String);

impl ImageReference {
    pub fn new(reference: impl Into<String>) -> Self { Self(reference.into()) }

    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuildSpec {
    pub context: PathBuf,
    pub dockerfile: PathBuf,
    pub repository: String,
    pub tag: String,
    pub cache: CachePolicy,
}

impl BuildSpec {
    #[must_use]
    pub fn new(settings: &BuildSettings, cache: &CachePolicy) -> Self {
        Self {
            context: settings.context.clone(),
            dockerfile: settings.dockerfile.clone(),
            repository: settings.repository.clone(),
            tag: settings.tag.clone(),
            cache: cache.clone(),
        }
    }

    /// The reference the build is tagged with before it is pushed.
    #[must_use]
    pub fn expected_reference(&self) -> ImageReference {
        ImageReference(format!("{}:{}", self.repository, self.tag))
    }

    /// Image names used as cache sources, one per cached stage.
    #[must_use]
    pub fn cache_sources(&self) -> Vec<String> {
        match &self.cache {
            CachePolicy::CacheFrom { stages } => {
                stages.iter().map(|stage| format!("{}:{stage}", self.repository)).collect()
            }
            CachePolicy::InlineCache => Vec::new(),
        }
    }

    /// Stages built and pushed ahead of the final image so they can serve as
    /// cache sources.
    #[must_use]
    pub fn cached_stages(&self) -> &[String] {
        match &self.cache {
            CachePolicy::CacheFrom { stages } => stages,
            CachePolicy::InlineCache => &[],
        }
    }

    /// Arguments for `docker build` of a single cached stage.
    #[must_use]
    pub fn stage_build_args(&self, stage: &str) -> Vec<String> {
        let source = format!("{}:{stage}", self.repository);
        vec![
            "build".to_string(),
            "--file".to_string(),
            self.dockerfile.display().to_string(),
            "--target".to_string(),
            stage.to_string(),
            "--tag".to_string(),
            source.clone(),
            "--cache-from".to_string(),
            source,
            self.context.display().to_string(),
        ]
    }

    /// Arguments for `docker build`.
    #[must_use]
    pub fn docker_build_args(&self) -> Vec<String> {
        let mut args = vec![
            "build".to_string(),
            "--file".to_string(),
            self.dockerfile.display().to_string(),
            "--tag".to_string(),
            self.expected_reference().to_string(),
        ];
        match &self.cache {
            CachePolicy::CacheFrom { .. } => {
                for source in self.cache_sources() {
                    args.extend(["--cache-from".to_string(), source]);
                }
                args.push("--load".to_string());
            }
            CachePolicy::InlineCache => {
                args.extend(["--build-arg".to_string(), "BUILDKIT_INLINE_CACHE=1".to_string()]);
            }
        }
        args.push(self.context.display().to_string());
        args
    }
}
