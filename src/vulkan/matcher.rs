// src/vulkan/matcher.rs

use crate::error::{PatternMatchingError, Result};
use crate::problem::{MatchResult, PatternObject, Picture, Position};
use crate::search::kernel::match_score;
use crate::vulkan::{VulkanBuffer, VulkanDevice, VulkanInstance, VulkanMemoryManager};
use ash::{Device, vk};
use bytemuck::{Pod, Zeroable};
use log::{debug, info};

// Writes one f32 relative-error score per candidate position.
static SHADER_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/relative_error.spv"));

/// Matches `layout(local_size_x = 16, local_size_y = 16)` in the shader.
const WORKGROUP_SIZE: u32 = 16;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ScoreParams {
    picture_dim: u32,
    pattern_dim: u32,
    span: u32,
}

/// Vulkan compute scorer for one picture against an ordered object list.
///
/// Scores are computed in `f32` on the device and only used to select
/// candidates; every reported position is re-scored with the `f64` CPU kernel.
pub struct VulkanScoreMatcher {
    // Declaration order is drop order: allocations go before the device,
    // the device before the instance.
    memory_manager: VulkanMemoryManager,
    device: Device,
    compute_queue: vk::Queue,
    command_pool: vk::CommandPool,
    descriptor_set_layout: vk::DescriptorSetLayout,
    descriptor_pool: vk::DescriptorPool,
    descriptor_set: vk::DescriptorSet,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    max_workgroups: [u32; 2],
    _vulkan_device: VulkanDevice,
    _vulkan_instance: VulkanInstance,
}

impl VulkanScoreMatcher {
    pub fn new(enable_validation: bool) -> Result<Self> {
        if SHADER_SPV.is_empty() {
            return Err(PatternMatchingError::AcceleratorUnavailable(
                "compute shader was not compiled into this build".to_string(),
            ));
        }

        info!("Initialising Vulkan score matcher…");

        let vulkan_instance = VulkanInstance::new(enable_validation)?;
        let vulkan_device = VulkanDevice::new(&vulkan_instance.instance)?;
        let memory_manager = VulkanMemoryManager::new(
            &vulkan_instance.instance,
            vulkan_device.device.clone(),
            vulkan_device.physical_device,
        )?;

        let limits = unsafe {
            vulkan_instance
                .instance
                .get_physical_device_properties(vulkan_device.physical_device)
        }
        .limits;
        let max_workgroups = [limits.max_compute_work_group_count[0], limits.max_compute_work_group_count[1]];

        let device = vulkan_device.device.clone();
        let compute_queue = vulkan_device.compute_queue;

        let command_pool = Self::create_command_pool(&vulkan_device)?;
        let descriptor_set_layout = Self::create_descriptor_set_layout(&device)?;

        let descriptor_pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::STORAGE_BUFFER,
            descriptor_count: 3,
        }];
        let descriptor_pool_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(1)
            .pool_sizes(&descriptor_pool_sizes);
        let descriptor_pool = unsafe { device.create_descriptor_pool(&descriptor_pool_info, None)? };

        let set_layouts = [descriptor_set_layout];
        let descriptor_set_allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(descriptor_pool)
            .set_layouts(&set_layouts);
        let descriptor_set = unsafe { device.allocate_descriptor_sets(&descriptor_set_allocate_info)? }[0];

        let push_constant_ranges = [vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::COMPUTE)
            .offset(0)
            .size(std::mem::size_of::<ScoreParams>() as u32)];
        let pipeline_layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);
        let pipeline_layout = unsafe { device.create_pipeline_layout(&pipeline_layout_info, None)? };

        let pipeline = Self::create_pipeline(&device, pipeline_layout)?;

        Ok(Self {
            memory_manager,
            device,
            compute_queue,
            command_pool,
            descriptor_set_layout,
            descriptor_pool,
            descriptor_set,
            pipeline_layout,
            pipeline,
            max_workgroups,
            _vulkan_device: vulkan_device,
            _vulkan_instance: vulkan_instance,
        })
    }

    /// First object (in list order) with a verified qualifying position, and
    /// its topmost, then leftmost, such position.
    pub fn find_first(
        &self,
        picture: &Picture,
        objects: &[PatternObject],
        threshold: f64,
    ) -> Result<Option<MatchResult>> {
        let mut picture_buffer = self
            .memory_manager
            .create_input_buffer::<i32>(picture.cells().len(), "Picture Buffer")?;
        let outcome = self
            .memory_manager
            .upload(&mut picture_buffer, picture.cells())
            .and_then(|_| self.search_objects(&picture_buffer, picture, objects, threshold));
        self.memory_manager.destroy_buffer(picture_buffer)?;
        outcome
    }

    fn search_objects(
        &self,
        picture_buffer: &VulkanBuffer,
        picture: &Picture,
        objects: &[PatternObject],
        threshold: f64,
    ) -> Result<Option<MatchResult>> {
        for object in objects {
            let Some(span) = picture.span_for(object.dim()) else {
                continue;
            };
            let scores = self.score_object(picture_buffer, picture, object, span)?;

            // f32 accumulation can land just above a threshold the f64 kernel
            // would pass, so candidates get a margin and are re-verified.
            let cells = (object.dim() * object.dim()) as f64;
            let margin = cells * 1e-6 * (threshold + 1.0);
            let hit = scores
                .iter()
                .enumerate()
                .filter(|&(_, &score)| score.is_nan() || (score as f64) < threshold + margin)
                .map(|(index, _)| Position::new(index / span, index % span))
                .find(|&position| match_score(picture, object, position) < threshold);

            if let Some(position) = hit {
                debug!(
                    "GPU: picture {} matched object {} at {}",
                    picture.id(),
                    object.id(),
                    position
                );
                return Ok(Some(MatchResult::found(picture.id(), object.id(), position)));
            }
        }
        Ok(None)
    }

    fn score_object(
        &self,
        picture_buffer: &VulkanBuffer,
        picture: &Picture,
        object: &PatternObject,
        span: usize,
    ) -> Result<Vec<f32>> {
        let params = ScoreParams {
            picture_dim: to_u32(picture.dim())?,
            pattern_dim: to_u32(object.dim())?,
            span: to_u32(span)?,
        };
        let groups = params.span.div_ceil(WORKGROUP_SIZE);
        if groups > self.max_workgroups[0] || groups > self.max_workgroups[1] {
            return Err(PatternMatchingError::AcceleratorUnavailable(format!(
                "{} workgroups per axis exceeds device limit",
                groups
            )));
        }

        let mut pattern_buffer = self
            .memory_manager
            .create_input_buffer::<i32>(object.cells().len(), "Pattern Buffer")?;
        let score_buffer = match self
            .memory_manager
            .create_output_buffer::<f32>(span * span, "Score Buffer")
        {
            Ok(buffer) => buffer,
            Err(e) => {
                self.memory_manager.destroy_buffer(pattern_buffer)?;
                return Err(e);
            }
        };

        let outcome = self
            .memory_manager
            .upload(&mut pattern_buffer, object.cells())
            .and_then(|_| self.dispatch(picture_buffer, &pattern_buffer, &score_buffer, &params, groups))
            .and_then(|_| {
                let mut scores = vec![0.0f32; span * span];
                self.memory_manager.download(&score_buffer, &mut scores)?;
                Ok(scores)
            });

        self.memory_manager.destroy_buffer(pattern_buffer)?;
        self.memory_manager.destroy_buffer(score_buffer)?;
        outcome
    }

    fn dispatch(
        &self,
        picture_buffer: &VulkanBuffer,
        pattern_buffer: &VulkanBuffer,
        score_buffer: &VulkanBuffer,
        params: &ScoreParams,
        groups: u32,
    ) -> Result<()> {
        // ---------- Descriptor set updates ----------
        let buffer_infos = [picture_buffer, pattern_buffer, score_buffer].map(|buffer| {
            [vk::DescriptorBufferInfo::default()
                .buffer(buffer.buffer)
                .offset(0)
                .range(vk::WHOLE_SIZE)]
        });
        let descriptor_writes: Vec<vk::WriteDescriptorSet<'_>> = buffer_infos
            .iter()
            .enumerate()
            .map(|(binding, info)| {
                vk::WriteDescriptorSet::default()
                    .dst_set(self.descriptor_set)
                    .dst_binding(binding as u32)
                    .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                    .buffer_info(info)
            })
            .collect();
        unsafe {
            self.device.update_descriptor_sets(&descriptor_writes, &[]);
        }

        // ---------- Command buffer ----------
        let cmd_buffer_allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let cmd_buffer = unsafe { self.device.allocate_command_buffers(&cmd_buffer_allocate_info)? }[0];

        let outcome = self.record_and_submit(cmd_buffer, params, groups);

        unsafe {
            self.device.free_command_buffers(self.command_pool, &[cmd_buffer]);
        }
        outcome
    }

    fn record_and_submit(&self, cmd_buffer: vk::CommandBuffer, params: &ScoreParams, groups: u32) -> Result<()> {
        unsafe {
            let cmd_begin_info =
                vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.device.begin_command_buffer(cmd_buffer, &cmd_begin_info)?;

            self.device
                .cmd_bind_pipeline(cmd_buffer, vk::PipelineBindPoint::COMPUTE, self.pipeline);
            self.device.cmd_bind_descriptor_sets(
                cmd_buffer,
                vk::PipelineBindPoint::COMPUTE,
                self.pipeline_layout,
                0,
                &[self.descriptor_set],
                &[],
            );
            self.device.cmd_push_constants(
                cmd_buffer,
                self.pipeline_layout,
                vk::ShaderStageFlags::COMPUTE,
                0,
                bytemuck::bytes_of(params),
            );
            self.device.cmd_dispatch(cmd_buffer, groups, groups, 1);
            self.device.end_command_buffer(cmd_buffer)?;
        }

        let fence = unsafe { self.device.create_fence(&vk::FenceCreateInfo::default(), None)? };
        let command_buffers = [cmd_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        let outcome = unsafe {
            self.device
                .queue_submit(self.compute_queue, &[submit_info], fence)
                .and_then(|_| self.device.wait_for_fences(&[fence], true, u64::MAX))
        };
        unsafe {
            self.device.destroy_fence(fence, None);
        }
        outcome.map_err(PatternMatchingError::VulkanError)
    }

    fn create_command_pool(vulkan_device: &VulkanDevice) -> Result<vk::CommandPool> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(vulkan_device.compute_queue_family_index);

        unsafe {
            vulkan_device
                .device
                .create_command_pool(&create_info, None)
                .map_err(PatternMatchingError::VulkanError)
        }
    }

    /// Bindings: 0 picture cells, 1 pattern cells, 2 scores.
    fn create_descriptor_set_layout(device: &Device) -> Result<vk::DescriptorSetLayout> {
        let bindings = [0, 1, 2].map(|binding| {
            vk::DescriptorSetLayoutBinding::default()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::COMPUTE)
        });

        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        unsafe {
            device
                .create_descriptor_set_layout(&create_info, None)
                .map_err(PatternMatchingError::VulkanError)
        }
    }

    fn create_pipeline(device: &Device, pipeline_layout: vk::PipelineLayout) -> Result<vk::Pipeline> {
        let shader_code = ash::util::read_spv(&mut std::io::Cursor::new(SHADER_SPV))?;
        let shader_module_info = vk::ShaderModuleCreateInfo::default().code(&shader_code);
        let shader_module = unsafe { device.create_shader_module(&shader_module_info, None)? };

        let shader_stage_info = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(shader_module)
            .name(c"main");
        let pipeline_info = vk::ComputePipelineCreateInfo::default()
            .stage(shader_stage_info)
            .layout(pipeline_layout);
        let pipelines = unsafe {
            device
                .create_compute_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                .map_err(PatternMatchingError::PipelineCreationError)
        };
        // The pipeline keeps what it needs from the module.
        unsafe {
            device.destroy_shader_module(shader_module, None);
        }
        Ok(pipelines?[0])
    }
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| PatternMatchingError::AcceleratorUnavailable(format!("dimension {value} exceeds u32")))
}

impl Drop for VulkanScoreMatcher {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.pipeline_layout, None);
            self.device.destroy_descriptor_pool(self.descriptor_pool, None);
            self.device
                .destroy_descriptor_set_layout(self.descriptor_set_layout, None);
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
