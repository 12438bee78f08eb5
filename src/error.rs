use vulkano::{
    LoadingError, Validated, VulkanError, buffer::AllocateBufferError,
    command_buffer::CommandBufferExecError, sync::HostAccessError,
};

#[derive(Debug, thiserror::Error)]
pub enum SortError {
    #[error("failed to load the Vulkan library: {0}")]
    Loading(#[from] LoadingError),
    #[error("no compute-capable physical device available")]
    NoComputeDevice,
    #[error("Vulkan call failed: {0}")]
    Vulkan(#[from] Validated<VulkanError>),
    #[error("Vulkan call failed: {0}")]
    Runtime(#[from] VulkanError),
    #[error("buffer allocation failed: {0}")]
    Allocation(#[from] Validated<AllocateBufferError>),
    #[error("command buffer execution failed: {0}")]
    Execution(#[from] CommandBufferExecError),
    #[error("host buffer access failed: {0}")]
    HostAccess(#[from] HostAccessError),
}
