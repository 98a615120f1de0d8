//! Per-kind work items and cooks
//!
//! A work item is the self-contained input to one cook; the cook produces a
//! descriptor plus a resource payload blob, with diagnostics. Cooks run on
//! the thread pool and check the stop token before doing real work.
//!
//! Texture cooks fall back to a 1x1 placeholder when the source data is
//! unusable; the result is marked so the dispatcher can downgrade its
//! diagnostics and account the fallback in the report.

use serde::Serialize;
use uuid::Uuid;

use crate::import::diagnostics::ImportDiagnostic;
use crate::platform::StopToken;

/// Stable identity of an emitted material/geometry/scene asset.
pub type AssetKey = Uuid;

/// Sentinel bindless index for a missing texture dependency.
pub const MISSING_TEXTURE_INDEX: u32 = u32::MAX;

/// Reserved bindless index of the engine fallback texture.
pub const FALLBACK_TEXTURE_INDEX: u32 = 0;

/// Outcome of one cook.
#[derive(Debug)]
pub struct WorkResult<C> {
    pub source_id: String,
    pub success: bool,
    pub canceled: bool,
    pub used_placeholder: bool,
    pub cooked: Option<C>,
    pub diagnostics: Vec<ImportDiagnostic>,
}

impl<C> WorkResult<C> {
    #[must_use]
    pub fn canceled(source_id: String) -> Self {
        Self {
            source_id,
            success: false,
            canceled: true,
            used_placeholder: false,
            cooked: None,
            diagnostics: Vec::new(),
        }
    }
}

// ============================================================================
// Texture
// ============================================================================

#[derive(Debug, Clone)]
pub struct TextureWorkItem {
    pub source_id: String,
    pub width: u32,
    pub height: u32,
    pub srgb: bool,
    /// RGBA8 pixel data, `width * height * 4` bytes.
    pub pixels: Vec<u8>,
}

impl TextureWorkItem {
    #[must_use]
    pub fn from_pixels(source_id: impl Into<String>, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self { source_id: source_id.into(), width, height, srgb: true, pixels }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TextureDescriptor {
    pub width: u32,
    pub height: u32,
    pub srgb: bool,
    pub mip_levels: u32,
    /// Hash of the payload, patched after the cook when hashing is enabled.
    pub content_hash: u64,
}

#[derive(Debug)]
pub struct CookedTexture {
    pub descriptor: TextureDescriptor,
    pub payload: Vec<u8>,
}

pub(crate) fn cook_texture(item: TextureWorkItem, stop: &StopToken) -> WorkResult<CookedTexture> {
    if stop.stop_requested() {
        return WorkResult::canceled(item.source_id);
    }

    let expected = item.width as usize * item.height as usize * 4;
    if item.width == 0 || item.height == 0 || item.pixels.len() != expected {
        // Substitute the 1x1 placeholder and keep the plan alive.
        let diagnostics = vec![ImportDiagnostic::error(
            "texture.cook_failed",
            format!(
                "texture has {} payload bytes, expected {expected}",
                item.pixels.len()
            ),
            &item.source_id,
            "",
        )];
        return WorkResult {
            source_id: item.source_id,
            success: true,
            canceled: false,
            used_placeholder: true,
            cooked: Some(CookedTexture {
                descriptor: TextureDescriptor {
                    width: 1,
                    height: 1,
                    srgb: true,
                    mip_levels: 1,
                    content_hash: 0,
                },
                payload: vec![255, 0, 255, 255],
            }),
            diagnostics,
        };
    }

    let mip_levels = 32 - item.width.max(item.height).leading_zeros();
    WorkResult {
        source_id: item.source_id,
        success: true,
        canceled: false,
        used_placeholder: false,
        cooked: Some(CookedTexture {
            descriptor: TextureDescriptor {
                width: item.width,
                height: item.height,
                srgb: item.srgb,
                mip_levels,
                content_hash: 0,
            },
            payload: item.pixels,
        }),
        diagnostics: Vec::new(),
    }
}

// ============================================================================
// Buffer
// ============================================================================

#[derive(Debug, Clone)]
pub struct BufferWorkItem {
    pub source_id: String,
    pub stride: u32,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BufferDescriptor {
    pub size: u64,
    pub stride: u32,
    pub content_hash: u64,
}

#[derive(Debug)]
pub struct CookedBuffer {
    pub descriptor: BufferDescriptor,
    pub payload: Vec<u8>,
}

pub(crate) fn cook_buffer(item: BufferWorkItem, stop: &StopToken) -> WorkResult<CookedBuffer> {
    if stop.stop_requested() {
        return WorkResult::canceled(item.source_id);
    }
    if item.bytes.is_empty() {
        return WorkResult {
            source_id: item.source_id.clone(),
            success: false,
            canceled: false,
            used_placeholder: false,
            cooked: None,
            diagnostics: vec![ImportDiagnostic::error(
                "buffer.empty",
                "buffer work item carries no data",
                &item.source_id,
                "",
            )],
        };
    }
    WorkResult {
        source_id: item.source_id,
        success: true,
        canceled: false,
        used_placeholder: false,
        cooked: Some(CookedBuffer {
            descriptor: BufferDescriptor {
                size: item.bytes.len() as u64,
                stride: item.stride,
                content_hash: 0,
            },
            payload: item.bytes,
        }),
        diagnostics: Vec::new(),
    }
}

// ============================================================================
// Material
// ============================================================================

/// One texture slot of a material, bound by texture source id and resolved
/// to a bindless index before submission.
#[derive(Debug, Clone)]
pub struct MaterialTextureBinding {
    pub slot: String,
    pub source_id: String,
    pub index: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct MaterialWorkItem {
    pub source_id: String,
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub textures: Vec<MaterialTextureBinding>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaterialDescriptor {
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    /// `(slot, bindless index)` pairs in binding order.
    pub texture_indices: Vec<(String, u32)>,
    pub content_hash: u64,
}

#[derive(Debug)]
pub struct CookedMaterial {
    pub material_key: AssetKey,
    pub descriptor: MaterialDescriptor,
    pub payload: Vec<u8>,
}

pub(crate) fn cook_material(item: MaterialWorkItem, stop: &StopToken) -> WorkResult<CookedMaterial> {
    if stop.stop_requested() {
        return WorkResult::canceled(item.source_id);
    }

    let mut diagnostics = Vec::new();
    let mut texture_indices = Vec::with_capacity(item.textures.len());
    for binding in &item.textures {
        match binding.index {
            Some(index) => texture_indices.push((binding.slot.clone(), index)),
            None => {
                diagnostics.push(ImportDiagnostic::warning(
                    "material.texture_missing",
                    "Material texture dependency is missing",
                    &item.source_id,
                    &binding.source_id,
                ));
                texture_indices.push((binding.slot.clone(), MISSING_TEXTURE_INDEX));
            }
        }
    }

    let descriptor = MaterialDescriptor {
        base_color: item.base_color,
        metallic: item.metallic,
        roughness: item.roughness,
        texture_indices,
        content_hash: 0,
    };
    let payload = serde_json::to_vec(&descriptor).unwrap_or_default();
    WorkResult {
        source_id: item.source_id,
        success: true,
        canceled: false,
        used_placeholder: false,
        cooked: Some(CookedMaterial { material_key: Uuid::new_v4(), descriptor, payload }),
        diagnostics,
    }
}

// ============================================================================
// Geometry
// ============================================================================

#[derive(Debug, Clone)]
pub struct GeometryWorkItem {
    pub source_id: String,
    /// Interleaved xyz positions.
    pub positions: Vec<f32>,
    pub indices: Vec<u32>,
    /// Material keys bound by the dispatcher from completed material items.
    pub material_keys: Vec<AssetKey>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeometryDescriptor {
    pub vertex_count: u32,
    pub index_count: u32,
    pub material_keys: Vec<AssetKey>,
    pub content_hash: u64,
}

#[derive(Debug)]
pub struct CookedGeometry {
    pub geometry_key: AssetKey,
    pub descriptor: GeometryDescriptor,
    pub payload: Vec<u8>,
}

pub(crate) fn cook_geometry(item: GeometryWorkItem, stop: &StopToken) -> WorkResult<CookedGeometry> {
    if stop.stop_requested() {
        return WorkResult::canceled(item.source_id);
    }
    if item.positions.is_empty() {
        return WorkResult {
            source_id: item.source_id.clone(),
            success: false,
            canceled: false,
            used_placeholder: false,
            cooked: None,
            diagnostics: vec![ImportDiagnostic::error(
                "mesh.missing_positions",
                "geometry has no position stream",
                &item.source_id,
                "",
            )],
        };
    }

    let mut payload = Vec::with_capacity(item.positions.len() * 4 + item.indices.len() * 4);
    for position in &item.positions {
        payload.extend_from_slice(&position.to_le_bytes());
    }
    for index in &item.indices {
        payload.extend_from_slice(&index.to_le_bytes());
    }

    WorkResult {
        source_id: item.source_id,
        success: true,
        canceled: false,
        used_placeholder: false,
        cooked: Some(CookedGeometry {
            geometry_key: Uuid::new_v4(),
            descriptor: GeometryDescriptor {
                vertex_count: (item.positions.len() / 3) as u32,
                index_count: item.indices.len() as u32,
                material_keys: item.material_keys,
                content_hash: 0,
            },
            payload,
        }),
        diagnostics: Vec::new(),
    }
}

// ============================================================================
// Scene
// ============================================================================

#[derive(Debug, Clone)]
pub struct SceneWorkItem {
    pub source_id: String,
    /// Node names, one per instanced geometry.
    pub nodes: Vec<String>,
    /// Geometry keys bound by the dispatcher from completed geometry items.
    pub geometry_keys: Vec<AssetKey>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneDescriptor {
    pub nodes: Vec<String>,
    pub geometry_keys: Vec<AssetKey>,
    pub content_hash: u64,
}

#[derive(Debug)]
pub struct CookedScene {
    pub scene_key: AssetKey,
    pub descriptor: SceneDescriptor,
    pub payload: Vec<u8>,
}

pub(crate) fn cook_scene(item: SceneWorkItem, stop: &StopToken) -> WorkResult<CookedScene> {
    if stop.stop_requested() {
        return WorkResult::canceled(item.source_id);
    }
    let descriptor = SceneDescriptor {
        nodes: item.nodes,
        geometry_keys: item.geometry_keys,
        content_hash: 0,
    };
    let payload = serde_json::to_vec(&descriptor).unwrap_or_default();
    WorkResult {
        source_id: item.source_id,
        success: true,
        canceled: false,
        used_placeholder: false,
        cooked: Some(CookedScene { scene_key: Uuid::new_v4(), descriptor, payload }),
        diagnostics: Vec::new(),
    }
}
