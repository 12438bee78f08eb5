use std::sync::Arc;

use log::info;
use vulkano::{
    VulkanLibrary,
    device::{
        Device, DeviceCreateInfo, Queue, QueueCreateInfo, QueueFlags,
        physical::PhysicalDeviceType,
    },
    instance::{Instance, InstanceCreateFlags, InstanceCreateInfo},
};

use crate::error::SortError;

pub fn new_instance() -> Result<Arc<Instance>, SortError> {
    let library = VulkanLibrary::new()?;

    let instance = Instance::new(
        library,
        InstanceCreateInfo {
            flags: InstanceCreateFlags::ENUMERATE_PORTABILITY,
            ..Default::default()
        },
    )?;

    Ok(instance)
}

/// Picks the most capable physical device with a compute queue. No surface or
/// device extensions are required; the sort runs on core compute alone.
pub fn get_device_for_sorting_on(
    instance: Arc<Instance>,
) -> Result<(Arc<Device>, Arc<Queue>), SortError> {
    let (physical_device, compute_queue_family_index) = instance
        .enumerate_physical_devices()?
        .filter_map(|p| {
            // find a compute-capable queue
            let compute_queue_family_index = p
                .queue_family_properties()
                .iter()
                .position(|q| q.queue_flags.intersects(QueueFlags::COMPUTE));

            compute_queue_family_index.map(|i| (p, i as u32))
        })
        .min_by_key(|(p, _)| match p.properties().device_type {
            PhysicalDeviceType::DiscreteGpu => 0,
            PhysicalDeviceType::IntegratedGpu => 1,
            PhysicalDeviceType::VirtualGpu => 2,
            PhysicalDeviceType::Cpu => 3,
            PhysicalDeviceType::Other => 4,
            _ => 5,
        })
        .ok_or(SortError::NoComputeDevice)?;

    info!(
        "sorting on device: {} (type: {:?})",
        physical_device.properties().device_name,
        physical_device.properties().device_type
    );

    let (device, mut queues) = Device::new(
        physical_device,
        DeviceCreateInfo {
            queue_create_infos: vec![QueueCreateInfo {
                queue_family_index: compute_queue_family_index,
                ..Default::default()
            }],
            ..Default::default()
        },
    )?;

    let queue = queues.next().unwrap();

    Ok((device, queue))
}
