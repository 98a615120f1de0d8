//! Import session
//!
//! The session owns what an import run produces: emitted texture and buffer
//! payloads (addressed by sequential resource indices), emitted assets
//! (materials, geometries, scenes, addressed by asset key), and the
//! accumulated diagnostics. At the end of a run it renders a serializable
//! [`ImportReport`].

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::import::diagnostics::{ImportDiagnostic, ImportSeverity};
use crate::import::work::{AssetKey, CookedBuffer, CookedTexture, FALLBACK_TEXTURE_INDEX};

/// Kind tag of an emitted asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Material,
    Geometry,
    Scene,
}

/// One emitted material/geometry/scene descriptor.
#[derive(Debug, Serialize)]
pub struct EmittedAsset {
    pub key: AssetKey,
    pub asset_type: AssetType,
    pub virtual_path: String,
    #[serde(skip)]
    pub descriptor_bytes: Vec<u8>,
}

/// Serializable summary of an import run.
#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub success: bool,
    pub textures_emitted: usize,
    pub buffers_emitted: usize,
    pub materials_emitted: usize,
    pub geometries_emitted: usize,
    pub scenes_emitted: usize,
    pub used_fallback: bool,
    pub error_count: usize,
    pub warning_count: usize,
    pub diagnostics: Vec<ImportDiagnostic>,
}

/// Collects emitted payloads and diagnostics for one import run.
#[derive(Default)]
pub struct ImportSession {
    /// Directory cooked outputs are addressed under. The engine only passes
    /// this through; writing is the host tooling's concern.
    cooked_root: std::path::PathBuf,
    diagnostics: Vec<ImportDiagnostic>,
    textures: Vec<CookedTexture>,
    buffers: Vec<CookedBuffer>,
    assets: Vec<EmittedAsset>,
    asset_lookup: FxHashMap<AssetKey, usize>,
    used_fallback: bool,
}

impl ImportSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_cooked_root(cooked_root: impl Into<std::path::PathBuf>) -> Self {
        Self { cooked_root: cooked_root.into(), ..Self::default() }
    }

    #[must_use]
    pub fn cooked_root(&self) -> &std::path::Path {
        &self.cooked_root
    }

    pub fn add_diagnostic(&mut self, diagnostic: ImportDiagnostic) {
        log::debug!(
            "import [{:?}] {}: {} ({})",
            diagnostic.severity,
            diagnostic.code,
            diagnostic.message,
            diagnostic.source_path
        );
        self.diagnostics.push(diagnostic);
    }

    pub fn add_diagnostics(&mut self, diagnostics: Vec<ImportDiagnostic>) {
        for diagnostic in diagnostics {
            self.add_diagnostic(diagnostic);
        }
    }

    /// Emits a cooked texture; returns its bindless index. Index 0 is
    /// reserved for the engine fallback texture.
    pub fn emit_texture(&mut self, cooked: CookedTexture) -> u32 {
        self.textures.push(cooked);
        FALLBACK_TEXTURE_INDEX + self.textures.len() as u32
    }

    /// Records that an item fell back to the placeholder texture; returns
    /// the reserved fallback index.
    pub fn emit_fallback_texture(&mut self) -> u32 {
        self.used_fallback = true;
        FALLBACK_TEXTURE_INDEX
    }

    /// Emits a cooked buffer; returns its resource index.
    pub fn emit_buffer(&mut self, cooked: CookedBuffer) -> u32 {
        self.buffers.push(cooked);
        self.buffers.len() as u32 - 1
    }

    /// Emits an asset descriptor under its key.
    pub fn emit_asset(
        &mut self,
        key: AssetKey,
        asset_type: AssetType,
        virtual_path: impl Into<String>,
        descriptor_bytes: Vec<u8>,
    ) {
        self.asset_lookup.insert(key, self.assets.len());
        self.assets.push(EmittedAsset {
            key,
            asset_type,
            virtual_path: virtual_path.into(),
            descriptor_bytes,
        });
    }

    #[must_use]
    pub fn asset(&self, key: AssetKey) -> Option<&EmittedAsset> {
        self.asset_lookup.get(&key).map(|index| &self.assets[*index])
    }

    /// Emitted assets in emission order.
    #[must_use]
    pub fn assets(&self) -> &[EmittedAsset] {
        &self.assets
    }

    #[must_use]
    pub fn texture(&self, index: u32) -> Option<&CookedTexture> {
        if index == FALLBACK_TEXTURE_INDEX {
            return None;
        }
        self.textures.get(index as usize - 1)
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[ImportDiagnostic] {
        &self.diagnostics
    }

    #[must_use]
    pub fn used_fallback(&self) -> bool {
        self.used_fallback
    }

    fn count_assets(&self, asset_type: AssetType) -> usize {
        self.assets.iter().filter(|a| a.asset_type == asset_type).count()
    }

    /// Renders the run summary. `success` is the dispatcher's verdict.
    #[must_use]
    pub fn report(&self, success: bool) -> ImportReport {
        ImportReport {
            success,
            textures_emitted: self.textures.len(),
            buffers_emitted: self.buffers.len(),
            materials_emitted: self.count_assets(AssetType::Material),
            geometries_emitted: self.count_assets(AssetType::Geometry),
            scenes_emitted: self.count_assets(AssetType::Scene),
            used_fallback: self.used_fallback,
            error_count: self
                .diagnostics
                .iter()
                .filter(|d| d.severity == ImportSeverity::Error)
                .count(),
            warning_count: self
                .diagnostics
                .iter()
                .filter(|d| d.severity == ImportSeverity::Warning)
                .count(),
            diagnostics: self.diagnostics.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::work::TextureDescriptor;
    use uuid::Uuid;

    fn cooked_texture() -> CookedTexture {
        CookedTexture {
            descriptor: TextureDescriptor {
                width: 1,
                height: 1,
                srgb: true,
                mip_levels: 1,
                content_hash: 0,
            },
            payload: vec![0, 0, 0, 255],
        }
    }

    #[test]
    fn texture_indices_skip_the_fallback_slot() {
        let mut session = ImportSession::new();
        let first = session.emit_texture(cooked_texture());
        let second = session.emit_texture(cooked_texture());
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert!(session.texture(first).is_some());
        assert!(session.texture(FALLBACK_TEXTURE_INDEX).is_none());
    }

    #[test]
    fn report_counts_diagnostics_and_assets() {
        let mut session = ImportSession::new();
        session.emit_asset(Uuid::new_v4(), AssetType::Material, "mat/m0", vec![1]);
        session.add_diagnostic(ImportDiagnostic::warning("texture.placeholder_used", "", "t", ""));
        session.emit_fallback_texture();

        let report = session.report(true);
        assert!(report.success);
        assert_eq!(report.materials_emitted, 1);
        assert_eq!(report.warning_count, 1);
        assert_eq!(report.error_count, 0);
        assert!(report.used_fallback);
        // The report serializes for external tooling.
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"used_fallback\":true"));
    }
}
