//! Direct3D 11 implementation of [`Graphics`].
//!
//! The device is created on the adapter that drives the headset. Besides the
//! per-eye work it owns the desktop swap chain the mirror image is copied into.

use std::ffi::{CStr, c_void};
use std::mem;

use log::{debug, info, warn};
use windows::{
    Win32::Foundation::*, Win32::Graphics::Direct3D::Fxc::*, Win32::Graphics::Direct3D::*,
    Win32::Graphics::Direct3D11::*, Win32::Graphics::Dxgi::Common::*, Win32::Graphics::Dxgi::*,
    core::*,
};

use crate::error::{Error, Result};
use crate::gfx::{DrawUniforms, Extent, Graphics, Viewport};
use crate::mesh::{TriangleSet, Vertex};
use crate::texture::TextureImage;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Format of the runtime's eye textures and of the views rendered into them.
pub const EYE_FORMAT: DXGI_FORMAT = DXGI_FORMAT_R8G8B8A8_UNORM_SRGB;
const MIRROR_FORMAT: DXGI_FORMAT = DXGI_FORMAT_R8G8B8A8_UNORM;
const TEXTURE_FORMAT: DXGI_FORMAT = DXGI_FORMAT_B8G8R8A8_UNORM;
const DEPTH_FORMAT: DXGI_FORMAT = DXGI_FORMAT_D24_UNORM_S8_UINT;

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];
const MAX_ANISOTROPY: u32 = 8;

fn graphics_error(what: &'static str) -> impl FnOnce(windows::core::Error) -> Error {
    move |e| Error::Graphics(format!("{what}: {e}"))
}

fn created<T>(value: Option<T>, what: &'static str) -> Result<T> {
    value.ok_or_else(|| Error::Graphics(format!("{what}: no object returned")))
}

// ============================================================================
// RESOURCE TYPES
// ============================================================================

pub struct D3D11Mesh {
    vertex_buffer: ID3D11Buffer,
    index_buffer: ID3D11Buffer,
    index_count: u32,
}

pub struct D3D11Texture {
    _texture: ID3D11Texture2D,
    view: ID3D11ShaderResourceView,
}

/// One swap texture of an eye ring, viewed as a render target.
pub struct EyeTarget {
    texture: ID3D11Texture2D,
    view: ID3D11RenderTargetView,
    size: Extent,
}

pub struct DepthBuffer {
    _texture: ID3D11Texture2D,
    view: ID3D11DepthStencilView,
}

/// Fixed pipeline state shared by every draw.
struct Pipeline {
    vertex_shader: ID3D11VertexShader,
    pixel_shader: ID3D11PixelShader,
    input_layout: ID3D11InputLayout,
    uniform_buffer: ID3D11Buffer,
    sampler: ID3D11SamplerState,
    blend_state: ID3D11BlendState,
    rasterizer_state: ID3D11RasterizerState,
    depth_stencil_state: ID3D11DepthStencilState,
}

/// Desktop window swap chain plus the texture both eyes are copied into while
/// the runtime still lets us read them.
struct Mirror {
    swap_chain: IDXGISwapChain1,
    back_buffer: ID3D11Texture2D,
    image: ID3D11Texture2D,
}

pub struct D3D11Graphics {
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    pipeline: Pipeline,
    mirror: Mirror,
}

// ============================================================================
// INITIALIZATION
// ============================================================================

impl D3D11Graphics {
    /// Create the device on the adapter with `adapter_luid`, plus a swap chain
    /// of `mirror_size` for `hwnd`.
    pub fn new(adapter_luid: u64, hwnd: HWND, mirror_size: Extent) -> Result<Self> {
        unsafe {
            let factory: IDXGIFactory1 =
                CreateDXGIFactory1().map_err(graphics_error("create DXGI factory"))?;
            let adapter = find_adapter(&factory, adapter_luid)?;
            let (device, context) = create_device(&adapter)?;

            // Keep the CPU from running ahead of the GPU by more than a frame.
            let dxgi_device: IDXGIDevice1 =
                device.cast().map_err(graphics_error("query DXGI device"))?;
            dxgi_device
                .SetMaximumFrameLatency(1)
                .map_err(graphics_error("set frame latency"))?;

            let pipeline = create_pipeline(&device)?;
            let mirror = create_mirror(&factory, &device, hwnd, mirror_size)?;

            Ok(Self {
                device,
                context,
                pipeline,
                mirror,
            })
        }
    }

    /// The device OpenXR renders with. (INTERFACE POINT)
    pub fn device(&self) -> &ID3D11Device {
        &self.device
    }

    /// Wrap one of the runtime's swapchain images as a render target. (INTERFACE POINT)
    ///
    /// The runtime keeps ownership of the image; the returned target holds its
    /// own reference for as long as it lives.
    pub fn wrap_eye_texture(&self, image: *mut c_void, size: Extent) -> Result<EyeTarget> {
        unsafe {
            let texture = ID3D11Texture2D::from_raw_borrowed(&image)
                .cloned()
                .ok_or_else(|| Error::Graphics("runtime returned a null eye texture".into()))?;

            let desc = D3D11_RENDER_TARGET_VIEW_DESC {
                Format: EYE_FORMAT,
                ViewDimension: D3D11_RTV_DIMENSION_TEXTURE2D,
                Anonymous: D3D11_RENDER_TARGET_VIEW_DESC_0 {
                    Texture2D: D3D11_TEX2D_RTV { MipSlice: 0 },
                },
            };
            let mut view: Option<ID3D11RenderTargetView> = None;
            self.device
                .CreateRenderTargetView(&texture, Some(&desc), Some(&mut view))
                .map_err(graphics_error("create eye render target view"))?;

            Ok(EyeTarget {
                texture,
                view: created(view, "eye render target view")?,
                size,
            })
        }
    }
}

/// Find the adapter the runtime asked for, falling back to the default one.
unsafe fn find_adapter(factory: &IDXGIFactory1, luid: u64) -> Result<IDXGIAdapter> {
    unsafe {
        let mut index = 0;
        while let Ok(adapter) = factory.EnumAdapters1(index) {
            let desc = adapter
                .GetDesc1()
                .map_err(graphics_error("describe adapter"))?;
            if mem::transmute_copy::<LUID, u64>(&desc.AdapterLuid) == luid {
                let name = String::from_utf16_lossy(&desc.Description);
                info!("headset adapter: {}", name.trim_end_matches('\0'));
                return adapter.cast().map_err(graphics_error("query adapter"));
            }
            index += 1;
        }

        warn!("no adapter matches the headset's LUID {luid:#x}; using the default adapter");
        factory
            .EnumAdapters(0)
            .map_err(graphics_error("enumerate default adapter"))
    }
}

unsafe fn create_device(adapter: &IDXGIAdapter) -> Result<(ID3D11Device, ID3D11DeviceContext)> {
    unsafe {
        let feature_levels = [D3D_FEATURE_LEVEL_11_1, D3D_FEATURE_LEVEL_11_0];

        let mut device: Option<ID3D11Device> = None;
        let mut device_context: Option<ID3D11DeviceContext> = None;
        let mut feature_level = D3D_FEATURE_LEVEL_11_0;

        // An explicit adapter requires the unknown driver type.
        D3D11CreateDevice(
            adapter,
            D3D_DRIVER_TYPE_UNKNOWN,
            HMODULE::default(),
            D3D11_CREATE_DEVICE_BGRA_SUPPORT,
            Some(&feature_levels),
            D3D11_SDK_VERSION,
            Some(&mut device),
            Some(&mut feature_level),
            Some(&mut device_context),
        )
        .map_err(graphics_error("create D3D11 device"))?;

        info!("created D3D11 device with feature level {feature_level:?}");

        Ok((
            created(device, "D3D11 device")?,
            created(device_context, "D3D11 device context")?,
        ))
    }
}

unsafe fn create_pipeline(device: &ID3D11Device) -> Result<Pipeline> {
    unsafe {
        let shader_code = include_str!("room.hlsl");
        let vs_blob = compile_shader(shader_code, c"VSMain", c"vs_5_0")?;
        let ps_blob = compile_shader(shader_code, c"PSMain", c"ps_5_0")?;
        let vs_bytecode = blob_bytes(&vs_blob);
        let ps_bytecode = blob_bytes(&ps_blob);

        let mut vertex_shader: Option<ID3D11VertexShader> = None;
        device
            .CreateVertexShader(vs_bytecode, None, Some(&mut vertex_shader))
            .map_err(graphics_error("create vertex shader"))?;

        let mut pixel_shader: Option<ID3D11PixelShader> = None;
        device
            .CreatePixelShader(ps_bytecode, None, Some(&mut pixel_shader))
            .map_err(graphics_error("create pixel shader"))?;

        // Matches `mesh::Vertex`: position, packed ARGB colour, uv.
        let input_layout_desc = [
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: PCSTR(c"POSITION".as_ptr() as _),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32B32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 0,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: PCSTR(c"COLOR".as_ptr() as _),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_B8G8R8A8_UNORM,
                InputSlot: 0,
                AlignedByteOffset: 12,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: PCSTR(c"TEXCOORD".as_ptr() as _),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 16,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
        ];
        let mut input_layout: Option<ID3D11InputLayout> = None;
        device
            .CreateInputLayout(&input_layout_desc, vs_bytecode, Some(&mut input_layout))
            .map_err(graphics_error("create input layout"))?;

        let uniform_buffer_desc = D3D11_BUFFER_DESC {
            ByteWidth: mem::size_of::<DrawUniforms>() as u32,
            Usage: D3D11_USAGE_DYNAMIC,
            BindFlags: D3D11_BIND_CONSTANT_BUFFER.0 as u32,
            CPUAccessFlags: D3D11_CPU_ACCESS_WRITE.0 as u32,
            MiscFlags: Default::default(),
            StructureByteStride: 0,
        };
        let mut uniform_buffer: Option<ID3D11Buffer> = None;
        device
            .CreateBuffer(&uniform_buffer_desc, None, Some(&mut uniform_buffer))
            .map_err(graphics_error("create uniform buffer"))?;

        let sampler_desc = D3D11_SAMPLER_DESC {
            Filter: D3D11_FILTER_ANISOTROPIC,
            AddressU: D3D11_TEXTURE_ADDRESS_WRAP,
            AddressV: D3D11_TEXTURE_ADDRESS_WRAP,
            AddressW: D3D11_TEXTURE_ADDRESS_WRAP,
            MipLODBias: 0.0,
            MaxAnisotropy: MAX_ANISOTROPY,
            ComparisonFunc: D3D11_COMPARISON_NEVER,
            BorderColor: [0.0; 4],
            MinLOD: 0.0,
            MaxLOD: D3D11_FLOAT32_MAX,
        };
        let mut sampler: Option<ID3D11SamplerState> = None;
        device
            .CreateSamplerState(&sampler_desc, Some(&mut sampler))
            .map_err(graphics_error("create sampler"))?;

        let blend_desc = D3D11_BLEND_DESC {
            AlphaToCoverageEnable: FALSE,
            IndependentBlendEnable: FALSE,
            RenderTarget: [
                D3D11_RENDER_TARGET_BLEND_DESC {
                    BlendEnable: TRUE,
                    SrcBlend: D3D11_BLEND_SRC_ALPHA,
                    DestBlend: D3D11_BLEND_INV_SRC_ALPHA,
                    BlendOp: D3D11_BLEND_OP_ADD,
                    SrcBlendAlpha: D3D11_BLEND_SRC_ALPHA,
                    DestBlendAlpha: D3D11_BLEND_INV_SRC_ALPHA,
                    BlendOpAlpha: D3D11_BLEND_OP_ADD,
                    RenderTargetWriteMask: D3D11_COLOR_WRITE_ENABLE_ALL.0 as u8,
                },
                Default::default(),
                Default::default(),
                Default::default(),
                Default::default(),
                Default::default(),
                Default::default(),
                Default::default(),
            ],
        };
        let mut blend_state: Option<ID3D11BlendState> = None;
        device
            .CreateBlendState(&blend_desc, Some(&mut blend_state))
            .map_err(graphics_error("create blend state"))?;

        let rasterizer_desc = D3D11_RASTERIZER_DESC {
            FillMode: D3D11_FILL_SOLID,
            CullMode: D3D11_CULL_BACK,
            FrontCounterClockwise: FALSE,
            DepthBias: 0,
            DepthBiasClamp: 0.0,
            SlopeScaledDepthBias: 0.0,
            DepthClipEnable: TRUE,
            ScissorEnable: FALSE,
            MultisampleEnable: FALSE,
            AntialiasedLineEnable: TRUE,
        };
        let mut rasterizer_state: Option<ID3D11RasterizerState> = None;
        device
            .CreateRasterizerState(&rasterizer_desc, Some(&mut rasterizer_state))
            .map_err(graphics_error("create rasterizer state"))?;

        let depth_stencil_desc = D3D11_DEPTH_STENCIL_DESC {
            DepthEnable: TRUE,
            DepthWriteMask: D3D11_DEPTH_WRITE_MASK_ALL,
            DepthFunc: D3D11_COMPARISON_LESS,
            StencilEnable: FALSE,
            StencilReadMask: 0,
            StencilWriteMask: 0,
            FrontFace: Default::default(),
            BackFace: Default::default(),
        };
        let mut depth_stencil_state: Option<ID3D11DepthStencilState> = None;
        device
            .CreateDepthStencilState(&depth_stencil_desc, Some(&mut depth_stencil_state))
            .map_err(graphics_error("create depth stencil state"))?;

        Ok(Pipeline {
            vertex_shader: created(vertex_shader, "vertex shader")?,
            pixel_shader: created(pixel_shader, "pixel shader")?,
            input_layout: created(input_layout, "input layout")?,
            uniform_buffer: created(uniform_buffer, "uniform buffer")?,
            sampler: created(sampler, "sampler")?,
            blend_state: created(blend_state, "blend state")?,
            rasterizer_state: created(rasterizer_state, "rasterizer state")?,
            depth_stencil_state: created(depth_stencil_state, "depth stencil state")?,
        })
    }
}

unsafe fn create_mirror(
    factory: &IDXGIFactory1,
    device: &ID3D11Device,
    hwnd: HWND,
    size: Extent,
) -> Result<Mirror> {
    unsafe {
        let factory: IDXGIFactory2 =
            factory.cast().map_err(graphics_error("query DXGI factory 2"))?;
        let desc = DXGI_SWAP_CHAIN_DESC1 {
            Width: size.width,
            Height: size.height,
            Format: MIRROR_FORMAT,
            Stereo: FALSE,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: 2,
            // The window may be smaller than both eyes side by side.
            Scaling: DXGI_SCALING_STRETCH,
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_SEQUENTIAL,
            AlphaMode: DXGI_ALPHA_MODE_UNSPECIFIED,
            Flags: 0,
        };
        let swap_chain = factory
            .CreateSwapChainForHwnd(device, hwnd, &desc, None, None)
            .map_err(graphics_error("create mirror swap chain"))?;
        let back_buffer: ID3D11Texture2D = swap_chain
            .GetBuffer(0)
            .map_err(graphics_error("get mirror back buffer"))?;

        let image_desc = D3D11_TEXTURE2D_DESC {
            Width: size.width,
            Height: size.height,
            MipLevels: 1,
            ArraySize: 1,
            Format: MIRROR_FORMAT,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_DEFAULT,
            BindFlags: Default::default(),
            CPUAccessFlags: Default::default(),
            MiscFlags: Default::default(),
        };
        let mut image: Option<ID3D11Texture2D> = None;
        device
            .CreateTexture2D(&image_desc, None, Some(&mut image))
            .map_err(graphics_error("create mirror image"))?;

        debug!("mirror swap chain {}x{}", size.width, size.height);
        Ok(Mirror {
            swap_chain,
            back_buffer,
            image: created(image, "mirror image")?,
        })
    }
}

/// Compile HLSL shader from source
unsafe fn compile_shader(source: &str, entry_point: &CStr, target: &CStr) -> Result<ID3DBlob> {
    unsafe {
        let mut blob: Option<ID3DBlob> = None;
        let mut error_blob: Option<ID3DBlob> = None;

        let source_bytes = source.as_bytes();
        let hr = D3DCompile(
            source_bytes.as_ptr() as *const _,
            source_bytes.len(),
            None,
            None,
            None,
            PCSTR(entry_point.as_ptr() as *const u8),
            PCSTR(target.as_ptr() as *const u8),
            D3DCOMPILE_OPTIMIZATION_LEVEL3,
            0,
            &mut blob,
            Some(&mut error_blob),
        );

        if let Err(e) = hr {
            let details = error_blob
                .map(|b| String::from_utf8_lossy(blob_bytes(&b)).into_owned())
                .unwrap_or_else(|| e.to_string());
            return Err(Error::Graphics(format!(
                "compiling {entry_point:?} failed: {details}"
            )));
        }

        created(blob, "shader bytecode")
    }
}

unsafe fn blob_bytes(blob: &ID3DBlob) -> &[u8] {
    unsafe { std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize()) }
}

// ============================================================================
// GRAPHICS SEAM
// ============================================================================

impl D3D11Graphics {
    unsafe fn create_buffer<T: bytemuck::Pod>(
        &self,
        data: &[T],
        bind: D3D11_BIND_FLAG,
        what: &'static str,
    ) -> Result<ID3D11Buffer> {
        unsafe {
            let bytes: &[u8] = bytemuck::cast_slice(data);
            let desc = D3D11_BUFFER_DESC {
                ByteWidth: bytes.len() as u32,
                Usage: D3D11_USAGE_IMMUTABLE,
                BindFlags: bind.0 as u32,
                CPUAccessFlags: Default::default(),
                MiscFlags: Default::default(),
                StructureByteStride: 0,
            };
            let initial = D3D11_SUBRESOURCE_DATA {
                pSysMem: bytes.as_ptr() as *const _,
                SysMemPitch: 0,
                SysMemSlicePitch: 0,
            };
            let mut buffer: Option<ID3D11Buffer> = None;
            self.device
                .CreateBuffer(&desc, Some(&initial), Some(&mut buffer))
                .map_err(graphics_error(what))?;
            created(buffer, what)
        }
    }
}

impl Graphics for D3D11Graphics {
    type Mesh = D3D11Mesh;
    type Texture = D3D11Texture;
    type RenderTarget = EyeTarget;
    type DepthBuffer = DepthBuffer;

    fn create_mesh(&mut self, triangles: &TriangleSet) -> Result<D3D11Mesh> {
        if triangles.is_empty() {
            return Err(Error::Graphics("cannot upload an empty triangle set".into()));
        }
        unsafe {
            Ok(D3D11Mesh {
                vertex_buffer: self.create_buffer::<Vertex>(
                    &triangles.vertices,
                    D3D11_BIND_VERTEX_BUFFER,
                    "create vertex buffer",
                )?,
                index_buffer: self.create_buffer::<u16>(
                    &triangles.indices,
                    D3D11_BIND_INDEX_BUFFER,
                    "create index buffer",
                )?,
                index_count: triangles.indices.len() as u32,
            })
        }
    }

    fn create_texture(&mut self, image: &TextureImage) -> Result<D3D11Texture> {
        unsafe {
            let desc = D3D11_TEXTURE2D_DESC {
                Width: image.size(),
                Height: image.size(),
                MipLevels: image.levels.len() as u32,
                ArraySize: 1,
                Format: TEXTURE_FORMAT,
                SampleDesc: DXGI_SAMPLE_DESC {
                    Count: 1,
                    Quality: 0,
                },
                Usage: D3D11_USAGE_IMMUTABLE,
                BindFlags: D3D11_BIND_SHADER_RESOURCE.0 as u32,
                CPUAccessFlags: Default::default(),
                MiscFlags: Default::default(),
            };
            let initial = image
                .level_bytes()
                .enumerate()
                .map(|(level, bytes)| D3D11_SUBRESOURCE_DATA {
                    pSysMem: bytes.as_ptr() as *const _,
                    SysMemPitch: image.level_size(level) * 4,
                    SysMemSlicePitch: 0,
                })
                .collect::<Vec<_>>();

            let mut texture: Option<ID3D11Texture2D> = None;
            self.device
                .CreateTexture2D(&desc, Some(initial.as_ptr()), Some(&mut texture))
                .map_err(graphics_error("create texture"))?;
            let texture = created(texture, "texture")?;

            let mut view: Option<ID3D11ShaderResourceView> = None;
            self.device
                .CreateShaderResourceView(&texture, None, Some(&mut view))
                .map_err(graphics_error("create texture view"))?;

            Ok(D3D11Texture {
                _texture: texture,
                view: created(view, "texture view")?,
            })
        }
    }

    fn create_depth_buffer(&mut self, size: Extent) -> Result<DepthBuffer> {
        unsafe {
            let desc = D3D11_TEXTURE2D_DESC {
                Width: size.width,
                Height: size.height,
                MipLevels: 1,
                ArraySize: 1,
                Format: DEPTH_FORMAT,
                SampleDesc: DXGI_SAMPLE_DESC {
                    Count: 1,
                    Quality: 0,
                },
                Usage: D3D11_USAGE_DEFAULT,
                BindFlags: D3D11_BIND_DEPTH_STENCIL.0 as u32,
                CPUAccessFlags: Default::default(),
                MiscFlags: Default::default(),
            };
            let mut texture: Option<ID3D11Texture2D> = None;
            self.device
                .CreateTexture2D(&desc, None, Some(&mut texture))
                .map_err(graphics_error("create depth buffer"))?;
            let texture = created(texture, "depth buffer")?;

            let mut view: Option<ID3D11DepthStencilView> = None;
            self.device
                .CreateDepthStencilView(&texture, None, Some(&mut view))
                .map_err(graphics_error("create depth stencil view"))?;

            Ok(DepthBuffer {
                _texture: texture,
                view: created(view, "depth stencil view")?,
            })
        }
    }

    fn set_and_clear_render_target(&mut self, target: &EyeTarget, depth: &DepthBuffer) {
        unsafe {
            self.context.ClearRenderTargetView(&target.view, &CLEAR_COLOR);
            self.context.ClearDepthStencilView(
                &depth.view,
                (D3D11_CLEAR_DEPTH.0 | D3D11_CLEAR_STENCIL.0) as u32,
                1.0,
                0,
            );
            self.context
                .OMSetRenderTargets(Some(&[Some(target.view.clone())]), &depth.view);
        }
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        let viewport = D3D11_VIEWPORT {
            TopLeftX: viewport.x as f32,
            TopLeftY: viewport.y as f32,
            Width: viewport.width as f32,
            Height: viewport.height as f32,
            MinDepth: 0.0,
            MaxDepth: 1.0,
        };
        unsafe { self.context.RSSetViewports(Some(&[viewport])) };
    }

    fn draw(
        &mut self,
        mesh: &D3D11Mesh,
        texture: &D3D11Texture,
        uniforms: &DrawUniforms,
    ) -> Result<()> {
        let context = &self.context;
        let pipeline = &self.pipeline;
        unsafe {
            let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
            context
                .Map(
                    &pipeline.uniform_buffer,
                    0,
                    D3D11_MAP_WRITE_DISCARD,
                    0,
                    Some(&mut mapped),
                )
                .map_err(graphics_error("map uniform buffer"))?;
            *(mapped.pData as *mut DrawUniforms) = *uniforms;
            context.Unmap(&pipeline.uniform_buffer, 0);

            context.IASetInputLayout(&pipeline.input_layout);
            context.VSSetShader(&pipeline.vertex_shader, None);
            context.PSSetShader(&pipeline.pixel_shader, None);
            let uniform_buffer = Some(pipeline.uniform_buffer.clone());
            context.VSSetConstantBuffers(0, Some(&[uniform_buffer.clone()]));
            context.PSSetConstantBuffers(0, Some(&[uniform_buffer]));
            context.PSSetShaderResources(0, Some(&[Some(texture.view.clone())]));
            context.PSSetSamplers(0, Some(&[Some(pipeline.sampler.clone())]));
            context.OMSetBlendState(&pipeline.blend_state, None, 0xffffffff);
            context.RSSetState(&pipeline.rasterizer_state);
            context.OMSetDepthStencilState(&pipeline.depth_stencil_state, 0);
            context.IASetPrimitiveTopology(D3D11_PRIMITIVE_TOPOLOGY_TRIANGLELIST);

            let stride = mem::size_of::<Vertex>() as u32;
            let offset = 0u32;
            context.IASetVertexBuffers(
                0,
                1,
                Some(&Some(mesh.vertex_buffer.clone())),
                Some(&stride),
                Some(&offset),
            );
            context.IASetIndexBuffer(&mesh.index_buffer, DXGI_FORMAT_R16_UINT, 0);
            context.DrawIndexed(mesh.index_count, 0, 0);
        }
        Ok(())
    }

    fn copy_mirror(&mut self, eyes: [&EyeTarget; 2]) {
        unsafe {
            let mut desc = D3D11_TEXTURE2D_DESC::default();
            self.mirror.image.GetDesc(&mut desc);

            // Left eye on the left half, right eye on the right half, each
            // cropped to what fits.
            let mut x = 0;
            for eye in eyes {
                let width = eye.size.width.min(desc.Width.saturating_sub(x));
                let height = eye.size.height.min(desc.Height);
                if width > 0 && height > 0 {
                    let source = D3D11_BOX {
                        left: 0,
                        top: 0,
                        front: 0,
                        right: width,
                        bottom: height,
                        back: 1,
                    };
                    self.context.CopySubresourceRegion(
                        &self.mirror.image,
                        0,
                        x,
                        0,
                        0,
                        &eye.texture,
                        0,
                        Some(&source),
                    );
                }
                x += eye.size.width;
            }
        }
    }

    fn present_mirror(&mut self) -> Result<()> {
        unsafe {
            self.context
                .CopyResource(&self.mirror.back_buffer, &self.mirror.image);

            // No vsync; the headset runtime paces frames.
            self.mirror
                .swap_chain
                .Present(0, DXGI_PRESENT(0))
                .ok()
                .map_err(graphics_error("present mirror"))
        }
    }
}

impl Drop for D3D11Graphics {
    fn drop(&mut self) {
        // The flip-model swap chain keeps the HWND until deferred destruction
        // runs; the next session's swap chain needs it.
        unsafe {
            self.context.ClearState();
            self.context.Flush();
        }
    }
}
