//! Graphics backend seam
//!
//! The coordinator never talks to a concrete graphics API; it sees only the
//! [`GraphicsBackend`] capability defined here, plus the small value types
//! shared with the resource registry (surfaces, native objects, view
//! descriptions). Concrete backends live outside the engine core.

use std::sync::Arc;

use crate::cache::DescriptorAllocator;
use crate::core::VersionedBindlessHandle;
use crate::errors::Result;

/// Identifier of a presentable surface (swapchain-backed render target).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u32);

/// Opaque handle to a backend-owned object (buffer, texture, queue, view).
/// Zero is the invalid sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NativeObject(pub u64);

impl NativeObject {
    pub const INVALID: NativeObject = NativeObject(0);

    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// A backend view object paired with the bindless handle it is published
/// under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeView {
    pub object: NativeObject,
    pub handle: VersionedBindlessHandle,
}

/// Classification of a resource view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewType {
    ShaderResource,
    UnorderedAccess,
    RenderTarget,
    DepthStencil,
    ConstantBuffer,
}

/// Description of a view over a registered resource. Equality and hashing are
/// structural; the registry keys its view cache on `(resource, ViewDesc)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewDesc {
    pub view_type: ViewType,
    /// Backend format tag; `0` means "inherit from the resource".
    pub format: u32,
    /// First addressable element (texel, mip, or structured element).
    pub first_element: u32,
    /// Number of addressed elements; `u32::MAX` means "to the end".
    pub element_count: u32,
}

impl ViewDesc {
    /// Shader-resource view over the whole resource.
    #[must_use]
    pub const fn whole_resource(view_type: ViewType) -> Self {
        Self { view_type, format: 0, first_element: 0, element_count: u32::MAX }
    }
}

/// Buffer creation parameters.
#[derive(Debug, Clone, Copy)]
pub struct BufferDesc {
    pub size: u64,
    pub stride: u32,
}

/// Texture creation parameters.
#[derive(Debug, Clone, Copy)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: u32,
    pub mip_levels: u32,
}

/// Role of a command queue created through the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueRole {
    Graphics,
    Compute,
    Transfer,
    Present,
}

/// Stable name under which a queue is created and later looked up.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueKey(pub String);

/// Per-view rendering data modules contribute during PreRender.
#[derive(Debug, Clone)]
pub struct RenderView {
    pub label: String,
    pub surface: Option<SurfaceId>,
}

/// Capability consumed by the coordinator; supplied externally.
pub trait GraphicsBackend {
    /// Prepares backend per-frame state. Called at FrameStart.
    fn begin_frame(&mut self, sequence: u64, slot: u32);

    /// Finalizes backend per-frame state. Called at FrameEnd.
    fn end_frame(&mut self, sequence: u64, slot: u32);

    /// Presents the surfaces marked presentable during the frame.
    fn present_surfaces(&mut self, surfaces: &[SurfaceId]);

    /// Blocks until all submitted work completes.
    fn flush(&mut self);

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<NativeObject>;

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<NativeObject>;

    fn create_command_queue(&mut self, key: QueueKey, role: QueueRole) -> Result<NativeObject>;

    fn create_surface(&mut self, width: u32, height: u32) -> Result<SurfaceId>;

    /// Descriptor allocator backing the shader-visible heap of the queue
    /// created under `key`, if the backend exposes one.
    fn descriptor_allocator(&self, _key: &QueueKey) -> Option<Arc<dyn DescriptorAllocator>> {
        None
    }
}

/// No-op backend used by tests and headless runs.
#[derive(Debug, Default)]
pub struct NullGraphics {
    next_object: u64,
    next_surface: u32,
    pub frames_begun: u64,
    pub frames_ended: u64,
    pub presented: Vec<SurfaceId>,
    pub flush_count: u32,
}

impl NullGraphics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl GraphicsBackend for NullGraphics {
    fn begin_frame(&mut self, _sequence: u64, _slot: u32) {
        self.frames_begun += 1;
    }

    fn end_frame(&mut self, _sequence: u64, _slot: u32) {
        self.frames_ended += 1;
    }

    fn present_surfaces(&mut self, surfaces: &[SurfaceId]) {
        self.presented.extend_from_slice(surfaces);
    }

    fn flush(&mut self) {
        self.flush_count += 1;
    }

    fn create_buffer(&mut self, _desc: &BufferDesc) -> Result<NativeObject> {
        self.next_object += 1;
        Ok(NativeObject(self.next_object))
    }

    fn create_texture(&mut self, _desc: &TextureDesc) -> Result<NativeObject> {
        self.next_object += 1;
        Ok(NativeObject(self.next_object))
    }

    fn create_command_queue(&mut self, key: QueueKey, role: QueueRole) -> Result<NativeObject> {
        log::debug!("NullGraphics: queue '{}' created for {role:?}", key.0);
        self.next_object += 1;
        Ok(NativeObject(self.next_object))
    }

    fn create_surface(&mut self, _width: u32, _height: u32) -> Result<SurfaceId> {
        let id = SurfaceId(self.next_surface);
        self.next_surface += 1;
        Ok(id)
    }
}
