//! Host-side orchestration: pipeline construction, buffer management and
//! command recording for one sort.
//!
//! A sort records one command buffer: the block pre-sort over the full
//! capacity, the argument-generation dispatch, then one indirect dispatch per
//! merge pass reading its group count from the slot the argument kernel
//! wrote. The live count never crosses back to the CPU.

use std::sync::Arc;

use vulkano::{
    buffer::{Buffer, BufferCreateInfo, BufferUsage, Subbuffer},
    command_buffer::{
        AutoCommandBufferBuilder, CommandBufferUsage, DispatchIndirectCommand,
        PrimaryAutoCommandBuffer, PrimaryCommandBufferAbstract,
        allocator::{CommandBufferAllocator, StandardCommandBufferAllocator},
    },
    descriptor_set::{
        PersistentDescriptorSet, WriteDescriptorSet, allocator::StandardDescriptorSetAllocator,
    },
    device::{Device, DeviceOwned, Queue},
    memory::allocator::{AllocationCreateInfo, MemoryTypeFilter, StandardMemoryAllocator},
    pipeline::{
        ComputePipeline, Pipeline, PipelineBindPoint, PipelineLayout,
        PipelineShaderStageCreateInfo, compute::ComputePipelineCreateInfo,
        layout::PipelineDescriptorSetLayoutCreateInfo,
    },
    shader::EntryPoint,
    sync::GpuFuture,
};

use crate::{
    SortConfig, SortError,
    plan::{self, BLOCK_SIZE, GROUP_SIZE, MergePass},
    shader,
};

/// The GPU-resident state of one sortable data set.
///
/// The key and value buffers have `capacity` slots, a multiple of the block
/// size; everything past the live count holds the sentinel pair after a
/// sort. The counter buffer carries the live count, written either from the
/// host via [`SortBuffers::write`] or by an earlier GPU pass.
pub struct SortBuffers {
    capacity: u32,
    keys: Subbuffer<[f32]>,
    values: Subbuffer<[u32]>,
    counter: Subbuffer<[u32]>,
    indirect_args: Subbuffer<[DispatchIndirectCommand]>,
}

impl SortBuffers {
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn keys(&self) -> Subbuffer<[f32]> {
        self.keys.clone()
    }

    pub fn values(&self) -> Subbuffer<[u32]> {
        self.values.clone()
    }

    pub fn counter(&self) -> Subbuffer<[u32]> {
        self.counter.clone()
    }

    pub fn indirect_args(&self) -> Subbuffer<[DispatchIndirectCommand]> {
        self.indirect_args.clone()
    }

    /// Substitutes a caller-owned counter buffer, for counts produced by an
    /// earlier GPU pass. Pair with [`SortConfig::counter_offset`] when the
    /// count does not live in cell 0.
    pub fn with_counter(self, counter: Subbuffer<[u32]>) -> SortBuffers {
        SortBuffers { counter, ..self }
    }

    /// Uploads key/value data from the host and sets the live count to its
    /// length. The count is written to cell 0 of the counter buffer.
    pub fn write(&self, keys: &[f32], values: &[u32]) -> Result<(), SortError> {
        assert_eq!(keys.len(), values.len());
        assert!(keys.len() <= self.capacity as usize);

        self.keys.write()?[..keys.len()].copy_from_slice(keys);
        self.values.write()?[..values.len()].copy_from_slice(values);
        self.counter.write()?[0] = keys.len() as u32;
        Ok(())
    }

    pub fn read_keys(&self) -> Result<Vec<f32>, SortError> {
        Ok(self.keys.read()?.to_vec())
    }

    pub fn read_values(&self) -> Result<Vec<u32>, SortError> {
        Ok(self.values.read()?.to_vec())
    }
}

fn create_compute_pipeline(device: Arc<Device>, shader: EntryPoint) -> Arc<ComputePipeline> {
    let stage = PipelineShaderStageCreateInfo::new(shader);

    let layout = PipelineLayout::new(
        device.clone(),
        PipelineDescriptorSetLayoutCreateInfo::from_stages(&[stage.clone()])
            .into_pipeline_layout_create_info(device.clone())
            .unwrap(),
    )
    .unwrap();

    ComputePipeline::new(
        device,
        None,
        ComputePipelineCreateInfo::stage_layout(stage, layout),
    )
    .unwrap()
}

pub struct BitonicSorter {
    queue: Arc<Queue>,
    memory_allocator: Arc<StandardMemoryAllocator>,
    command_buffer_allocator: Arc<StandardCommandBufferAllocator>,
    descriptor_set_allocator: Arc<StandardDescriptorSetAllocator>,
    pre_sort_pipeline: Arc<ComputePipeline>,
    inner_sort_pipeline: Arc<ComputePipeline>,
    outer_sort_pipeline: Arc<ComputePipeline>,
    indirect_args_pipeline: Arc<ComputePipeline>,
    copy_indices_pipeline: Arc<ComputePipeline>,
}

impl BitonicSorter {
    pub fn new(
        queue: Arc<Queue>,
        memory_allocator: Arc<StandardMemoryAllocator>,
        command_buffer_allocator: Arc<StandardCommandBufferAllocator>,
        descriptor_set_allocator: Arc<StandardDescriptorSetAllocator>,
    ) -> BitonicSorter {
        let device = memory_allocator.device().clone();

        let pre_sort_pipeline = create_compute_pipeline(
            device.clone(),
            shader::pre_sort::load(device.clone())
                .unwrap()
                .entry_point("main")
                .unwrap(),
        );

        let inner_sort_pipeline = create_compute_pipeline(
            device.clone(),
            shader::inner_sort::load(device.clone())
                .unwrap()
                .entry_point("main")
                .unwrap(),
        );

        let outer_sort_pipeline = create_compute_pipeline(
            device.clone(),
            shader::outer_sort::load(device.clone())
                .unwrap()
                .entry_point("main")
                .unwrap(),
        );

        let indirect_args_pipeline = create_compute_pipeline(
            device.clone(),
            shader::indirect_args::load(device.clone())
                .unwrap()
                .entry_point("main")
                .unwrap(),
        );

        let copy_indices_pipeline = create_compute_pipeline(
            device.clone(),
            shader::copy_indices::load(device.clone())
                .unwrap()
                .entry_point("main")
                .unwrap(),
        );

        BitonicSorter {
            queue,
            memory_allocator,
            command_buffer_allocator,
            descriptor_set_allocator,
            pre_sort_pipeline,
            inner_sort_pipeline,
            outer_sort_pipeline,
            indirect_args_pipeline,
            copy_indices_pipeline,
        }
    }

    /// Allocates buffers sized for up to `max_count` elements. The capacity
    /// is the count rounded up to a whole number of blocks; the indirect
    /// argument buffer gets one slot per merge pass of that capacity.
    pub fn create_sort_buffers(&self, max_count: u32) -> Result<SortBuffers, SortError> {
        let capacity = plan::round_up_to_block(max_count.max(1));
        let arg_slots = plan::pass_schedule(capacity).len().max(1) as u64;

        let keys = Buffer::new_slice::<f32>(
            self.memory_allocator.clone(),
            BufferCreateInfo {
                usage: BufferUsage::STORAGE_BUFFER,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_HOST
                    | MemoryTypeFilter::HOST_RANDOM_ACCESS,
                ..Default::default()
            },
            capacity as u64,
        )?;

        let values = Buffer::new_slice::<u32>(
            self.memory_allocator.clone(),
            BufferCreateInfo {
                usage: BufferUsage::STORAGE_BUFFER,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_HOST
                    | MemoryTypeFilter::HOST_RANDOM_ACCESS,
                ..Default::default()
            },
            capacity as u64,
        )?;

        let counter = Buffer::new_slice::<u32>(
            self.memory_allocator.clone(),
            BufferCreateInfo {
                usage: BufferUsage::STORAGE_BUFFER,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_HOST
                    | MemoryTypeFilter::HOST_RANDOM_ACCESS,
                ..Default::default()
            },
            1,
        )?;

        let indirect_args = Buffer::new_slice::<DispatchIndirectCommand>(
            self.memory_allocator.clone(),
            BufferCreateInfo {
                usage: BufferUsage::STORAGE_BUFFER | BufferUsage::INDIRECT_BUFFER,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_HOST
                    | MemoryTypeFilter::HOST_RANDOM_ACCESS,
                ..Default::default()
            },
            arg_slots,
        )?;

        Ok(SortBuffers {
            capacity,
            keys,
            values,
            counter,
            indirect_args,
        })
    }

    fn sort_descriptor_set(
        &self,
        pipeline: &Arc<ComputePipeline>,
        buffers: &SortBuffers,
    ) -> Arc<PersistentDescriptorSet> {
        PersistentDescriptorSet::new(
            &self.descriptor_set_allocator,
            pipeline.layout().set_layouts().first().unwrap().clone(),
            [
                WriteDescriptorSet::buffer(0, buffers.keys.clone()),
                WriteDescriptorSet::buffer(1, buffers.values.clone()),
                WriteDescriptorSet::buffer(2, buffers.counter.clone()),
            ],
            [],
        )
        .unwrap()
    }

    /// Records and submits the whole sorting network for the live count in
    /// the counter buffer, then waits for completion.
    pub fn sort(&self, buffers: &SortBuffers, config: &SortConfig) -> Result<(), SortError> {
        let sort_sign = config.direction.sign();

        let mut builder = AutoCommandBufferBuilder::primary(
            &self.command_buffer_allocator,
            self.queue.queue_family_index(),
            CommandBufferUsage::OneTimeSubmit,
        )
        .unwrap();

        // sort each block, writing sentinels past the live count
        builder
            .bind_pipeline_compute(self.pre_sort_pipeline.clone())
            .unwrap()
            .bind_descriptor_sets(
                PipelineBindPoint::Compute,
                self.pre_sort_pipeline.layout().clone(),
                0,
                self.sort_descriptor_set(&self.pre_sort_pipeline, buffers),
            )
            .unwrap()
            .push_constants(
                self.pre_sort_pipeline.layout().clone(),
                0,
                shader::pre_sort::PushConstants {
                    sort_sign,
                    null_key: config.null_key,
                    null_value: config.null_value,
                    counter_offset: config.counter_offset,
                },
            )
            .unwrap()
            .dispatch([buffers.capacity / BLOCK_SIZE, 1, 1])
            .unwrap();

        let schedule = plan::pass_schedule(buffers.capacity);
        if schedule.is_empty() {
            // a single block is fully sorted by the pre-sort alone
            return self.submit(builder);
        }

        let args_set = PersistentDescriptorSet::new(
            &self.descriptor_set_allocator,
            self.indirect_args_pipeline
                .layout()
                .set_layouts()
                .first()
                .unwrap()
                .clone(),
            [
                WriteDescriptorSet::buffer(0, buffers.counter.clone()),
                WriteDescriptorSet::buffer(
                    1,
                    buffers.indirect_args.clone().reinterpret::<[u32]>(),
                ),
            ],
            [],
        )
        .unwrap();

        builder
            .bind_pipeline_compute(self.indirect_args_pipeline.clone())
            .unwrap()
            .bind_descriptor_sets(
                PipelineBindPoint::Compute,
                self.indirect_args_pipeline.layout().clone(),
                0,
                args_set,
            )
            .unwrap()
            .push_constants(
                self.indirect_args_pipeline.layout().clone(),
                0,
                shader::indirect_args::PushConstants {
                    counter_offset: config.counter_offset,
                    max_iterations: plan::max_iterations(buffers.capacity),
                },
            )
            .unwrap()
            .dispatch([1, 1, 1])
            .unwrap();

        for (slot, pass) in schedule.iter().enumerate() {
            let slot = slot as u64;
            let args = buffers.indirect_args.clone().slice(slot..slot + 1);

            match *pass {
                MergePass::Outer { k, j } => {
                    builder
                        .bind_pipeline_compute(self.outer_sort_pipeline.clone())
                        .unwrap()
                        .bind_descriptor_sets(
                            PipelineBindPoint::Compute,
                            self.outer_sort_pipeline.layout().clone(),
                            0,
                            self.sort_descriptor_set(&self.outer_sort_pipeline, buffers),
                        )
                        .unwrap()
                        .push_constants(
                            self.outer_sort_pipeline.layout().clone(),
                            0,
                            shader::outer_sort::PushConstants {
                                sort_sign,
                                counter_offset: config.counter_offset,
                                k,
                                j,
                            },
                        )
                        .unwrap()
                        .dispatch_indirect(args)
                        .unwrap();
                }
                MergePass::Inner { .. } => {
                    builder
                        .bind_pipeline_compute(self.inner_sort_pipeline.clone())
                        .unwrap()
                        .bind_descriptor_sets(
                            PipelineBindPoint::Compute,
                            self.inner_sort_pipeline.layout().clone(),
                            0,
                            self.sort_descriptor_set(&self.inner_sort_pipeline, buffers),
                        )
                        .unwrap()
                        .push_constants(
                            self.inner_sort_pipeline.layout().clone(),
                            0,
                            shader::inner_sort::PushConstants {
                                sort_sign,
                                null_key: config.null_key,
                                null_value: config.null_value,
                                counter_offset: config.counter_offset,
                            },
                        )
                        .unwrap()
                        .dispatch_indirect(args)
                        .unwrap();
                }
            }
        }

        self.submit(builder)
    }

    /// Copies the sorted values out into `indices`, up to the live count.
    /// The destination must have at least `capacity` slots.
    pub fn extract_indices(
        &self,
        buffers: &SortBuffers,
        indices: Subbuffer<[u32]>,
        config: &SortConfig,
    ) -> Result<(), SortError> {
        assert!(indices.len() >= buffers.capacity as u64);

        let set = PersistentDescriptorSet::new(
            &self.descriptor_set_allocator,
            self.copy_indices_pipeline
                .layout()
                .set_layouts()
                .first()
                .unwrap()
                .clone(),
            [
                WriteDescriptorSet::buffer(0, buffers.values.clone()),
                WriteDescriptorSet::buffer(1, indices),
                WriteDescriptorSet::buffer(2, buffers.counter.clone()),
            ],
            [],
        )
        .unwrap();

        let mut builder = AutoCommandBufferBuilder::primary(
            &self.command_buffer_allocator,
            self.queue.queue_family_index(),
            CommandBufferUsage::OneTimeSubmit,
        )
        .unwrap();

        builder
            .bind_pipeline_compute(self.copy_indices_pipeline.clone())
            .unwrap()
            .bind_descriptor_sets(
                PipelineBindPoint::Compute,
                self.copy_indices_pipeline.layout().clone(),
                0,
                set,
            )
            .unwrap()
            .push_constants(
                self.copy_indices_pipeline.layout().clone(),
                0,
                shader::copy_indices::PushConstants {
                    counter_offset: config.counter_offset,
                },
            )
            .unwrap()
            .dispatch([buffers.capacity / GROUP_SIZE, 1, 1])
            .unwrap();

        self.submit(builder)
    }

    fn submit<A>(
        &self,
        builder: AutoCommandBufferBuilder<PrimaryAutoCommandBuffer<A>, A>,
    ) -> Result<(), SortError>
    where
        A: CommandBufferAllocator + 'static,
    {
        let command_buffer = builder.build().unwrap();
        command_buffer
            .execute(self.queue.clone())?
            .then_signal_fence_and_flush()?
            .wait(None)?;
        Ok(())
    }
}
