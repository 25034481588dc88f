use berth_planner::{BoxError, BuildSpec, ImageBuilder, ImageReference};

use super::{Error, run_command};

const DOCKER: &str = "docker";

/// Builds with the local `docker` CLI and pushes to the registry named by
/// the repository.
#[derive(Clone, Debug)]
pub struct DockerImageBuilder {
    program: String,
}

impl Default for DockerImageBuilder {
    fn default() -> Self { Self { program: DOCKER.to_string() } }
}

impl DockerImageBuilder {
    async fn docker(&self, args: Vec<String>) -> Result<String, Error> {
        run_command(&self.program, &args, None).await
    }

    async fn build_stages(&self, spec: &BuildSpec) -> Result<(), Error> {
        for (stage, source) in spec.cached_stages().iter().zip(spec.cache_sources()) {
            // The cache image does not exist on the first build.
            if let Err(err) = self.docker(vec!["pull".to_string(), source.clone()]).await {
                tracing::debug!("No cache image {source}: {err}");
            }
            tracing::info!("Building stage {stage} as {source}");
            let _unused = self.docker(spec.stage_build_args(stage)).await?;
            let _unused = self.docker(vec!["push".to_string(), source]).await?;
        }
        Ok(())
    }

    async fn build_and_push(&self, spec: &BuildSpec) -> Result<ImageReference, Error> {
        self.build_stages(spec).await?;

        let reference = spec.expected_reference();
        let _unused = self.docker(spec.docker_build_args()).await?;
        let _unused = self.docker(vec!["push".to_string(), reference.to_string()]).await?;

        // Empty output when the image has no registry digest.
        let digests = self
            .docker(vec![
                "image".to_string(),
                "inspect".to_string(),
                "--format".to_string(),
                "{{range .RepoDigests}}{{.}} {{end}}".to_string(),
                reference.to_string(),
            ])
            .await?;
        Ok(pinned_reference(&digests).unwrap_or(reference))
    }
}

impl ImageBuilder for DockerImageBuilder {
    async fn build(&self, spec: &BuildSpec) -> Result<ImageReference, BoxError> {
        Ok(self.build_and_push(spec).await?)
    }
}

/// The first repository digest listed by `docker image inspect`.
fn pinned_reference(digests: &str) -> Option<ImageReference> {
    digests.split_whitespace().next().map(ImageReference::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pinned_reference() {
        assert_eq!(
            pinned_reference("registry/chat@sha256:aa registry/chat@sha256:bb \n"),
            Some(ImageReference::new("registry/chat@sha256:aa"))
        );
        assert_eq!(pinned_reference(" \n"), None);
    }
}
