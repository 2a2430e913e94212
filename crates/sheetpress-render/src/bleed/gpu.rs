// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// GPU flood context (wgpu compute).
//
// Seeds live in two storage buffers that swap roles each pass; every pass gets
// its own small uniform with the canvas size and step so the whole
// propagation is recorded into a single command buffer. Seed buffers larger
// than the device can bind are propagated in software instead, and device
// errors raised while recording are caught in error scopes.

use sheetpress_core::error::{Result, SheetpressError};
use tracing::{debug, info};

use super::flood::{FloodContext, SoftwareFlood, jfa_steps};

const WORKGROUP: u32 = 8;

const FLOOD_WGSL: &str = r#"
struct Pass {
    width: u32,
    height: u32,
    step: i32,
    _pad: u32,
};

@group(0) @binding(0) var<uniform> pass_info: Pass;
@group(0) @binding(1) var<storage, read> seeds_in: array<i32>;
@group(0) @binding(2) var<storage, read_write> seeds_out: array<i32>;

fn dist2(x: i32, y: i32, sx: i32, sy: i32) -> i32 {
    let dx = x - sx;
    let dy = y - sy;
    return dx * dx + dy * dy;
}

@compute @workgroup_size(8, 8, 1)
fn propagate(@builtin(global_invocation_id) id: vec3<u32>) {
    if (id.x >= pass_info.width || id.y >= pass_info.height) {
        return;
    }
    let w = i32(pass_info.width);
    let h = i32(pass_info.height);
    let x = i32(id.x);
    let y = i32(id.y);
    let i = (y * w + x) * 2;

    var best_x = seeds_in[i];
    var best_y = seeds_in[i + 1];
    var best_d = 0x7fffffff;
    if (best_x != -1) {
        best_d = dist2(x, y, best_x, best_y);
    }

    for (var dy = -1; dy <= 1; dy = dy + 1) {
        for (var dx = -1; dx <= 1; dx = dx + 1) {
            if (dx == 0 && dy == 0) {
                continue;
            }
            let nx = x + dx * pass_info.step;
            let ny = y + dy * pass_info.step;
            if (nx < 0 || ny < 0 || nx >= w || ny >= h) {
                continue;
            }
            let j = (ny * w + nx) * 2;
            let sx = seeds_in[j];
            if (sx == -1) {
                continue;
            }
            let sy = seeds_in[j + 1];
            let d = dist2(x, y, sx, sy);
            if (d < best_d) {
                best_d = d;
                best_x = sx;
                best_y = sy;
            }
        }
    }

    seeds_out[i] = best_x;
    seeds_out[i + 1] = best_y;
}
"#;

pub struct GpuFlood {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl GpuFlood {
    /// Open an adapter and compile the propagation shader.
    pub fn new() -> Result<Self> {
        let (device, queue, adapter_name) = pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .map_err(|e| SheetpressError::SynthesisUnavailable(format!("no adapter: {e}")))?;
            let name = adapter.get_info().name;
            let (device, queue) = adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some("sheetpress.flood"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    experimental_features: wgpu::ExperimentalFeatures::disabled(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    trace: wgpu::Trace::Off,
                })
                .await
                .map_err(|e| {
                    SheetpressError::SynthesisUnavailable(format!("device request: {e}"))
                })?;
            Ok::<_, SheetpressError>((device, queue, name))
        })?;

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sheetpress.flood.shader"),
            source: wgpu::ShaderSource::Wgsl(std::borrow::Cow::Borrowed(FLOOD_WGSL)),
        });

        let storage = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sheetpress.flood.layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage(1, true),
                storage(2, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sheetpress.flood.pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("sheetpress.flood.pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("propagate"),
            compilation_options: Default::default(),
            cache: None,
        });

        info!(adapter = %adapter_name, "GPU flood context ready");
        Ok(Self {
            device,
            queue,
            pipeline,
            layout,
        })
    }

    fn storage_buffer(&self, label: &str, size: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }
}

/// Whether a seed buffer of `size` bytes can be bound as storage under `limits`.
fn seed_buffer_fits(size: u64, limits: &wgpu::Limits) -> bool {
    size <= u64::from(limits.max_storage_buffer_binding_size) && size <= limits.max_buffer_size
}

fn to_bytes(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

impl FloodContext for GpuFlood {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn propagate(&mut self, seeds: &mut Vec<i32>, width: u32, height: u32) -> Result<()> {
        let steps = jfa_steps(width, height);
        if steps.is_empty() || seeds.is_empty() {
            return Ok(());
        }
        let size = (seeds.len() * std::mem::size_of::<i32>()) as u64;
        if !seed_buffer_fits(size, &self.device.limits()) {
            debug!(width, height, size, "seed buffer exceeds device limits, using software");
            return SoftwareFlood::new().propagate(seeds, width, height);
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let outcome = self.dispatch(seeds, width, height, &steps, size);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        if let Some(e) = validation.or(out_of_memory) {
            return Err(SheetpressError::SynthesisUnavailable(format!(
                "GPU flood rejected: {e}"
            )));
        }
        outcome?;

        debug!(width, height, passes = steps.len(), "GPU propagation complete");
        Ok(())
    }
}

impl GpuFlood {
    /// Record every pass, submit, and read the seeds back.
    fn dispatch(
        &self,
        seeds: &mut [i32],
        width: u32,
        height: u32,
        steps: &[u32],
        size: u64,
    ) -> Result<()> {
        let ping = self.storage_buffer("sheetpress.flood.ping", size);
        let pong = self.storage_buffer("sheetpress.flood.pong", size);
        self.queue.write_buffer(&ping, 0, &to_bytes(seeds));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("sheetpress.flood.encoder"),
            });

        // Keep uniforms and bind groups alive until submission.
        let mut passes = Vec::with_capacity(steps.len());
        for (n, step) in steps.iter().enumerate() {
            let (src, dst) = if n % 2 == 0 { (&ping, &pong) } else { (&pong, &ping) };
            let uniform = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("sheetpress.flood.pass"),
                size: 16,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let mut params = Vec::with_capacity(16);
            params.extend_from_slice(&width.to_le_bytes());
            params.extend_from_slice(&height.to_le_bytes());
            params.extend_from_slice(&(*step as i32).to_le_bytes());
            params.extend_from_slice(&0u32.to_le_bytes());
            self.queue.write_buffer(&uniform, 0, &params);

            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("sheetpress.flood.bind_group"),
                layout: &self.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: src.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: dst.as_entire_binding(),
                    },
                ],
            });

            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("sheetpress.flood.pass"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(width.div_ceil(WORKGROUP), height.div_ceil(WORKGROUP), 1);
            }
            passes.push((uniform, bind_group));
        }

        let result = if steps.len() % 2 == 0 { &ping } else { &pong };
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sheetpress.flood.readback"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        encoder.copy_buffer_to_buffer(result, 0, &readback, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |mapped| {
            let _ = sender.send(mapped);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| SheetpressError::ContextLost(format!("device poll: {e}")))?;
        receiver
            .recv()
            .map_err(|e| SheetpressError::ContextLost(format!("readback channel: {e}")))?
            .map_err(|e| SheetpressError::ContextLost(format!("readback map: {e}")))?;

        {
            let data = slice.get_mapped_range();
            for (seed, chunk) in seeds.iter_mut().zip(data.chunks_exact(4)) {
                *seed = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            }
        }
        readback.unmap();
        drop(passes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bleed::flood::{KnownRect, SoftwareFlood, init_seeds};

    #[test]
    fn oversized_seed_buffer_does_not_fit_default_limits() {
        let limits = wgpu::Limits::default();
        // 63 x 88 mm card plus 20 mm bleed per side at 1200 DPI.
        let (w, h) = (4866u64, 6047u64);
        let size = w * h * 2 * std::mem::size_of::<i32>() as u64;
        assert!(!seed_buffer_fits(size, &limits));
        // 300 DPI with 3 mm bleed stays well inside.
        let (w, h) = (815u64, 1110u64);
        assert!(seed_buffer_fits(w * h * 8, &limits));
    }

    #[test]
    fn gpu_matches_software_when_an_adapter_exists() {
        let Ok(mut gpu) = GpuFlood::new() else {
            // No adapter on this machine; the software path covers behaviour.
            return;
        };
        let known = KnownRect {
            x: 4,
            y: 3,
            width: 9,
            height: 6,
        };
        let mut a = init_seeds(21, 17, known);
        let mut b = a.clone();
        gpu.propagate(&mut a, 21, 17).expect("gpu");
        SoftwareFlood::new().propagate(&mut b, 21, 17).expect("software");
        assert_eq!(a, b);
    }
}
