//! Container runtime operations for the chat UI, via the Docker API.
//!
//! Lifecycle verbs consumed: pull image, inspect state by name, remove, and
//! create + start. A stopped container is removed and recreated rather than
//! restarted so configuration changes always take effect.

use anyhow::{Context, Result};
use bollard::Docker;
use bollard::models::{ContainerCreateBody, HostConfig, PortBinding};
use bollard::query_parameters::{
    CreateContainerOptionsBuilder, CreateImageOptionsBuilder, InspectContainerOptions,
    RemoveContainerOptionsBuilder, StartContainerOptions, StopContainerOptionsBuilder,
};
use futures_util::TryStreamExt;
use std::collections::HashMap;

/// Port the chat UI image listens on inside the container.
const CONTAINER_PORT: &str = "8080/tcp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Running,
    Stopped,
    Absent,
}

pub struct ContainerRuntime {
    docker: Docker,
}

impl ContainerRuntime {
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .context("failed to connect to the container runtime")?;
        Ok(Self { docker })
    }

    /// Cheap reachability check against the daemon.
    pub async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .context("container runtime did not answer ping")?;
        Ok(())
    }

    pub async fn image_present(&self, image: &str) -> bool {
        self.docker.inspect_image(image).await.is_ok()
    }

    pub async fn pull_image(&self, image: &str) -> Result<()> {
        tracing::info!(image, "pulling image");
        let options = CreateImageOptionsBuilder::default()
            .from_image(image)
            .build();
        self.docker
            .create_image(Some(options), None, None)
            .try_collect::<Vec<_>>()
            .await
            .with_context(|| format!("failed to pull image {image}"))?;
        Ok(())
    }

    pub async fn state(&self, name: &str) -> Result<ContainerState> {
        match self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
        {
            Ok(info) => {
                let running = info.state.and_then(|s| s.running).unwrap_or(false);
                Ok(if running {
                    ContainerState::Running
                } else {
                    ContainerState::Stopped
                })
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(ContainerState::Absent),
            Err(e) => Err(e).with_context(|| format!("failed to inspect container {name}")),
        }
    }

    /// Remove the named container, tolerating absence.
    pub async fn remove(&self, name: &str) -> Result<()> {
        let options = RemoveContainerOptionsBuilder::default().force(true).build();
        match self.docker.remove_container(name, Some(options)).await {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove container {name}")),
        }
    }

    /// Stop the named container gracefully, tolerating absence.
    pub async fn stop(&self, name: &str) -> Result<()> {
        let options = StopContainerOptionsBuilder::default().t(10).build();
        match self.docker.stop_container(name, Some(options)).await {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304 | 404,
                ..
            }) => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to stop container {name}")),
        }
    }

    /// Create and start the chat UI container, publishing `host_port` and
    /// pointing it at the inference server on the host.
    pub async fn run_chat_ui(
        &self,
        name: &str,
        image: &str,
        host_port: u16,
        backend_url: &str,
    ) -> Result<()> {
        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            CONTAINER_PORT.to_string(),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(host_port.to_string()),
            }]),
        );

        let body = ContainerCreateBody {
            image: Some(image.to_string()),
            env: Some(chat_ui_env(backend_url)),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                // The container reaches the server bound on the host.
                extra_hosts: Some(vec!["host.docker.internal:host-gateway".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let options = CreateContainerOptionsBuilder::default().name(name).build();
        self.docker
            .create_container(Some(options), body)
            .await
            .with_context(|| format!("failed to create container {name}"))?;
        self.docker
            .start_container(name, None::<StartContainerOptions>)
            .await
            .with_context(|| format!("failed to start container {name}"))?;
        tracing::info!(name, image, host_port, "chat UI container started");
        Ok(())
    }
}

/// Environment wiring the chat UI to the inference server's OpenAI-compatible
/// endpoint.
pub fn chat_ui_env(backend_url: &str) -> Vec<String> {
    vec![
        format!("OPENAI_API_BASE_URL={backend_url}"),
        "OPENAI_API_KEY=none".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_ui_env_points_at_backend() {
        let env = chat_ui_env("http://host.docker.internal:8080/v1");
        assert_eq!(
            env[0],
            "OPENAI_API_BASE_URL=http://host.docker.internal:8080/v1"
        );
        assert!(env.iter().any(|e| e.starts_with("OPENAI_API_KEY=")));
    }
}
