//! Chat UI container provisioning.

use anyhow::anyhow;
use async_trait::async_trait;

use crate::config::RigConfig;
use crate::container::{ContainerRuntime, ContainerState};
use crate::errors::StepError;
use crate::step::{ProbeStatus, Step};

/// Image-presence probe; the action pulls the image.
pub struct ChatUiImageStep {
    image: String,
}

impl ChatUiImageStep {
    pub fn new(config: &RigConfig) -> Self {
        Self {
            image: config.toml.webui.image.clone(),
        }
    }
}

#[async_trait]
impl Step for ChatUiImageStep {
    fn name(&self) -> &str {
        "chat-ui-image"
    }

    async fn probe(&self) -> Result<ProbeStatus, StepError> {
        let runtime = ContainerRuntime::connect().map_err(StepError::Probe)?;
        if runtime.image_present(&self.image).await {
            Ok(ProbeStatus::Satisfied)
        } else {
            Ok(ProbeStatus::Unsatisfied(format!(
                "image {} not pulled",
                self.image
            )))
        }
    }

    async fn action(&self) -> Result<(), StepError> {
        let runtime = ContainerRuntime::connect().map_err(StepError::Action)?;
        runtime
            .pull_image(&self.image)
            .await
            .map_err(StepError::Action)
    }
}

/// Container-running probe; the action removes a stale container and creates
/// plus starts a fresh one wired to the inference server endpoint. Recreating
/// rather than restarting means endpoint or env changes always take effect.
pub struct ChatUiContainerStep {
    name: String,
    image: String,
    port: u16,
    backend_url: String,
}

impl ChatUiContainerStep {
    pub fn new(config: &RigConfig) -> Self {
        Self {
            name: config.toml.webui.container.clone(),
            image: config.toml.webui.image.clone(),
            port: config.toml.webui.port,
            backend_url: config.webui_backend_url(),
        }
    }
}

#[async_trait]
impl Step for ChatUiContainerStep {
    fn name(&self) -> &str {
        "chat-ui-container"
    }

    async fn probe(&self) -> Result<ProbeStatus, StepError> {
        let runtime = ContainerRuntime::connect().map_err(StepError::Probe)?;
        match runtime.state(&self.name).await.map_err(StepError::Probe)? {
            ContainerState::Running => Ok(ProbeStatus::Satisfied),
            ContainerState::Stopped => Ok(ProbeStatus::Unsatisfied(format!(
                "container {} present but stopped",
                self.name
            ))),
            ContainerState::Absent => Ok(ProbeStatus::Unsatisfied(format!(
                "container {} not created",
                self.name
            ))),
        }
    }

    async fn action(&self) -> Result<(), StepError> {
        let runtime = ContainerRuntime::connect().map_err(StepError::Action)?;
        match runtime.state(&self.name).await.map_err(StepError::Action)? {
            ContainerState::Running => return Ok(()),
            ContainerState::Stopped => {
                runtime.remove(&self.name).await.map_err(StepError::Action)?;
            }
            ContainerState::Absent => {}
        }
        if !runtime.image_present(&self.image).await {
            return Err(StepError::Action(anyhow!(
                "image {} missing; the pull step should have provided it",
                self.image
            )));
        }
        runtime
            .run_chat_ui(&self.name, &self.image, self.port, &self.backend_url)
            .await
            .map_err(StepError::Action)
    }
}
