// crates/fv_physics/src/screening/gpu.rs

//! wgpu GPU 后端
//!
//! 一条边一个线程，单精度计算。坐标先平移到包围盒中心再转为 f32，
//! 着色器内部用 Kahan 补偿求和。边中点与节点的重合检查在派发前
//! 由主机端以双精度完成，与 CPU 后端判定一致。
//!
//! [`GpuContext`] 由调用方创建一次，通过 `Arc` 在多个后端之间共享。

use std::sync::{mpsc, Arc};

use bytemuck::{Pod, Zeroable};
use fv_config::{BackendKind, ScreeningConfig};
use glam::DVec2;
use log::{debug, info};
use wgpu::util::DeviceExt;
use wgpu::{
    BindGroupLayoutEntry, BindingType, BufferBindingType, BufferUsages, DeviceDescriptor,
    Instance, InstanceDescriptor, Limits, PowerPreference, RequestAdapterOptions, ShaderStages,
};

use super::backend::{
    bounding_box, check_coincidence, coincidence_radius, source_weights, ScreeningBackend,
};
use super::ScreeningInputs;
use crate::error::{GpuError, PhysicsResult};

const SHADER: &str = include_str!("shaders/induced_potential.wgsl");

/// 着色器参数（Uniform Buffer）
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct GpuParams {
    n_sites: u32,
    n_edges: u32,
    row_stride: u32,
    _pad: u32,
}

// ============================================================================
// 设备上下文
// ============================================================================

/// GPU 设备上下文
#[derive(Debug)]
pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    info: wgpu::AdapterInfo,
    limits: Limits,
}

impl GpuContext {
    /// 异步创建
    ///
    /// 返回 `Ok(None)` 表示没有可用的 GPU 适配器
    pub async fn new_async() -> Result<Option<Self>, GpuError> {
        let instance = Instance::new(InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = match instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
        {
            Some(adapter) => adapter,
            None => return Ok(None),
        };

        let info = adapter.get_info();
        info!("GPU 适配器: {} ({:?})", info.name, info.backend);

        let supported = adapter.limits();
        let required = Limits {
            max_storage_buffer_binding_size: supported.max_storage_buffer_binding_size,
            max_buffer_size: supported.max_buffer_size,
            max_compute_workgroups_per_dimension: supported.max_compute_workgroups_per_dimension,
            max_compute_workgroup_size_x: supported.max_compute_workgroup_size_x.min(256),
            max_compute_invocations_per_workgroup: supported
                .max_compute_invocations_per_workgroup
                .min(256),
            ..Limits::downlevel_defaults()
        };

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: Some("fv_physics screening device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: required,
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| GpuError::DeviceCreation(e.to_string()))?;

        let limits = device.limits();
        Ok(Some(Self {
            device,
            queue,
            info,
            limits,
        }))
    }

    /// 同步创建（阻塞）
    pub fn new() -> Result<Option<Self>, GpuError> {
        pollster::block_on(Self::new_async())
    }

    #[inline]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// 适配器名称
    pub fn adapter_name(&self) -> &str {
        &self.info.name
    }

    /// 设备限制
    #[inline]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// 检查工作组大小
    pub fn check_workgroup_size(&self, size: u32) -> Result<(), GpuError> {
        let available = self
            .limits
            .max_compute_workgroup_size_x
            .min(self.limits.max_compute_invocations_per_workgroup);
        if size > available {
            return Err(GpuError::LimitExceeded {
                limit: "max_compute_workgroup_size_x",
                required: size as u64,
                available: available as u64,
            });
        }
        Ok(())
    }

    /// 检查存储缓冲区大小
    pub fn check_storage_binding(&self, bytes: u64) -> Result<(), GpuError> {
        let available = (self.limits.max_storage_buffer_binding_size as u64)
            .min(self.limits.max_buffer_size);
        if bytes > available {
            return Err(GpuError::LimitExceeded {
                limit: "max_storage_buffer_binding_size",
                required: bytes,
                available,
            });
        }
        Ok(())
    }

    /// 阻塞读回缓冲区
    fn read_back<T: Pod>(&self, buffer: &wgpu::Buffer) -> Result<Vec<T>, GpuError> {
        let slice = buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| GpuError::BufferOperation(e.to_string()))?
            .map_err(|e| GpuError::BufferOperation(e.to_string()))?;

        let data = slice.get_mapped_range();
        let values = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        buffer.unmap();
        Ok(values)
    }
}

/// 计算二维调度网格 `(x 组数, y 组数, 行跨度)`
///
/// 单维组数超出设备上限时折叠到 y 维。
pub fn dispatch_layout(
    n_edges: u32,
    workgroup_size: u32,
    max_per_dimension: u32,
) -> Result<(u32, u32, u32), GpuError> {
    let groups = n_edges.div_ceil(workgroup_size).max(1);
    let gx = groups.min(max_per_dimension);
    let gy = groups.div_ceil(gx);
    if gy > max_per_dimension {
        return Err(GpuError::LimitExceeded {
            limit: "max_compute_workgroups_per_dimension",
            required: gy as u64,
            available: max_per_dimension as u64,
        });
    }
    Ok((gx, gy, gx * workgroup_size))
}

// ============================================================================
// 后端
// ============================================================================

/// GPU 屏蔽计算后端
#[derive(Debug)]
pub struct GpuScreeningBackend {
    context: Arc<GpuContext>,
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    workgroup_size: u32,
    coincidence_tolerance: f64,
}

impl GpuScreeningBackend {
    /// 编译计算管线
    pub fn new(context: Arc<GpuContext>, config: &ScreeningConfig) -> Result<Self, GpuError> {
        context.check_workgroup_size(config.workgroup_size)?;

        let device = context.device();
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let source = format!(
            "const WORKGROUP_SIZE: u32 = {}u;\n{}",
            config.workgroup_size, SHADER
        );
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("induced_potential_shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let entry = |binding: u32, ty: BufferBindingType| BindGroupLayoutEntry {
            binding,
            visibility: ShaderStages::COMPUTE,
            ty: BindingType::Buffer {
                ty,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("induced_potential_layout"),
            entries: &[
                entry(0, BufferBindingType::Uniform),
                entry(1, BufferBindingType::Storage { read_only: true }),
                entry(2, BufferBindingType::Storage { read_only: true }),
                entry(3, BufferBindingType::Storage { read_only: false }),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("induced_potential_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("induced_potential"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(GpuError::PipelineCreation(err.to_string()));
        }

        debug!(
            "GPU 屏蔽管线就绪: {}, 工作组大小 {}",
            context.adapter_name(),
            config.workgroup_size
        );

        Ok(Self {
            context,
            pipeline,
            layout,
            workgroup_size: config.workgroup_size,
            coincidence_tolerance: config.coincidence_tolerance,
        })
    }

    /// 共享的设备上下文
    pub fn context(&self) -> &Arc<GpuContext> {
        &self.context
    }

    fn init_buffer<T: Pod>(&self, label: &str, data: &[T], usage: BufferUsages) -> wgpu::Buffer {
        self.context
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(data),
                usage,
            })
    }

    fn staging_buffer(&self, label: &str, size: u64) -> wgpu::Buffer {
        self.context.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn run(&self, inputs: &ScreeningInputs<'_>) -> PhysicsResult<Vec<DVec2>> {
        let n = inputs.n_sites();
        let m = inputs.n_edges();
        if m == 0 {
            return Ok(Vec::new());
        }
        if n == 0 {
            return Ok(vec![DVec2::ZERO; m]);
        }

        check_coincidence(inputs, coincidence_radius(inputs, self.coincidence_tolerance))?;

        let origin = bounding_box(inputs).map_or(DVec2::ZERO, |(lo, hi)| 0.5 * (lo + hi));

        let sources: Vec<[f32; 4]> = inputs
            .site_positions
            .iter()
            .zip(source_weights(inputs))
            .map(|(&p, w)| {
                let q = p - origin;
                [q.x as f32, q.y as f32, w.x as f32, w.y as f32]
            })
            .collect();
        let centers: Vec<[f32; 2]> = inputs
            .edge_centers
            .iter()
            .map(|&c| {
                let q = c - origin;
                [q.x as f32, q.y as f32]
            })
            .collect();

        let out_bytes = (m * std::mem::size_of::<[f32; 2]>()) as u64;
        self.context
            .check_storage_binding((n * std::mem::size_of::<[f32; 4]>()) as u64)?;
        self.context.check_storage_binding(out_bytes)?;

        let (gx, gy, row_stride) = dispatch_layout(
            m as u32,
            self.workgroup_size,
            self.context.limits().max_compute_workgroups_per_dimension,
        )?;

        let params = GpuParams {
            n_sites: n as u32,
            n_edges: m as u32,
            row_stride,
            _pad: 0,
        };

        let device = self.context.device();
        let params_buf = self.init_buffer("params", &[params], BufferUsages::UNIFORM);
        let sources_buf = self.init_buffer("sources", &sources, BufferUsages::STORAGE);
        let centers_buf = self.init_buffer("centers", &centers, BufferUsages::STORAGE);
        let out_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("potential"),
            size: out_bytes,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let out_staging = self.staging_buffer("potential_staging", out_bytes);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("induced_potential_bind_group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: sources_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: centers_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: out_buf.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("induced_potential_encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("induced_potential"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(gx, gy, 1);
        }
        encoder.copy_buffer_to_buffer(&out_buf, 0, &out_staging, 0, out_bytes);
        self.context.queue().submit(std::iter::once(encoder.finish()));

        let raw: Vec<[f32; 2]> = self.context.read_back(&out_staging)?;
        Ok(raw
            .into_iter()
            .map(|[x, y]| DVec2::new(x as f64, y as f64))
            .collect())
    }
}

impl ScreeningBackend for GpuScreeningBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn induced_potential(&self, inputs: &ScreeningInputs<'_>) -> PhysicsResult<Vec<DVec2>> {
        self.run(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_layout() {
        assert_eq!(std::mem::size_of::<GpuParams>(), 16);
    }

    #[test]
    fn test_dispatch_layout_single_row() {
        assert_eq!(dispatch_layout(1000, 256, 65535).unwrap(), (4, 1, 1024));
        assert_eq!(dispatch_layout(1, 64, 65535).unwrap(), (1, 1, 64));
    }

    #[test]
    fn test_dispatch_layout_folds_rows() {
        let (gx, gy, stride) = dispatch_layout(10_000, 10, 100).unwrap();
        assert_eq!((gx, gy, stride), (100, 10, 1000));
        assert!(dispatch_layout(10_000_000, 1, 100).is_err());
    }

    #[test]
    #[ignore = "Requires GPU hardware"]
    fn test_coincidence_decided_in_double_precision() {
        let Some(ctx) = GpuContext::new().unwrap() else {
            return;
        };
        let backend = GpuScreeningBackend::new(Arc::new(ctx), &ScreeningConfig::default()).unwrap();

        // 双精度下可区分、单精度下重合
        let current = [DVec2::X, DVec2::Y];
        let areas = [1.0, 1.0];
        let positions = [DVec2::new(1.0, 0.0), DVec2::new(-1.0, 0.0)];
        let centers = [DVec2::new(1.0 + 1e-9, 0.0), DVec2::new(0.0, 1.0)];
        let inputs = ScreeningInputs::new(&current, &areas, &positions, &centers);
        assert!(backend.induced_potential(&inputs).is_ok());

        let centers = [DVec2::new(0.0, 1.0), DVec2::new(-1.0, 0.0)];
        let inputs = ScreeningInputs::new(&current, &areas, &positions, &centers);
        assert!(matches!(
            backend.induced_potential(&inputs),
            Err(crate::error::PhysicsError::CoincidentPoints { edge: 1, site: 1, .. })
        ));
    }

    #[test]
    #[ignore = "Requires GPU hardware"]
    fn test_gpu_context_creation() {
        let ctx = GpuContext::new().unwrap();
        if let Some(ctx) = ctx {
            assert!(ctx.check_workgroup_size(64).is_ok());
            assert!(ctx.check_workgroup_size(1 << 20).is_err());
        }
    }
}
