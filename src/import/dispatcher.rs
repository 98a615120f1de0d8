//! Work dispatcher
//!
//! Drives an import plan to completion: seeds the ready queue with
//! prerequisite-free items, submits ready items to their per-kind pipelines
//! (binding references resolved from previously completed items), reacts to
//! full queues by collecting a result first, promotes dependents as results
//! land, and fails the plan on cancellation or when nothing is pending while
//! items remain (the deadlock guard). All pipelines are closed on exit,
//! success or failure, so worker tasks terminate.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::import::diagnostics::{ImportDiagnostic, downgrade_errors};
use crate::import::pipeline::{
    BufferPipeline, GeometryPipeline, MaterialPipeline, PipelineConfig, ScenePipeline,
    TexturePipeline,
};
use crate::import::plan::{ImportPlan, PlanItemId, PlanItemKind};
use crate::import::session::{AssetType, ImportSession};
use crate::import::work::{
    AssetKey, BufferDescriptor, CookedBuffer, CookedGeometry, CookedMaterial, CookedScene,
    CookedTexture, WorkResult,
};
use crate::platform::{StopToken, ThreadPool};

/// Per-kind pipeline configuration for one import run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportConcurrency {
    pub texture: PipelineConfig,
    pub buffer: PipelineConfig,
    pub material: PipelineConfig,
    pub geometry: PipelineConfig,
    pub scene: PipelineConfig,
}

/// Bookkeeping for one run of the dispatcher.
struct RunState {
    plan: ImportPlan,
    submitted: Vec<bool>,
    completed: Vec<bool>,
    completed_count: usize,
    dependents: Vec<Vec<PlanItemId>>,
    ready: VecDeque<PlanItemId>,

    // Result-to-item resolution, keyed by source id per kind.
    texture_items: FxHashMap<String, PlanItemId>,
    buffer_items: FxHashMap<String, PlanItemId>,
    material_items: FxHashMap<String, PlanItemId>,
    geometry_items: FxHashMap<String, PlanItemId>,
    scene_items: FxHashMap<String, PlanItemId>,

    // Outputs of completed items, for reference binding.
    texture_indices: FxHashMap<String, u32>,
    material_keys: FxHashMap<PlanItemId, AssetKey>,
    geometry_keys: FxHashMap<PlanItemId, AssetKey>,
}

impl RunState {
    fn new(plan: ImportPlan) -> Self {
        let item_count = plan.len();
        let mut dependents: Vec<Vec<PlanItemId>> = vec![Vec::new(); item_count];
        for index in 0..item_count {
            let id = PlanItemId(index);
            for prerequisite in &plan.item(id).prerequisites {
                dependents[prerequisite.0].push(id);
            }
        }
        let ready = plan.ready_items().into();
        Self {
            plan,
            submitted: vec![false; item_count],
            completed: vec![false; item_count],
            completed_count: 0,
            dependents,
            ready,
            texture_items: FxHashMap::default(),
            buffer_items: FxHashMap::default(),
            material_items: FxHashMap::default(),
            geometry_items: FxHashMap::default(),
            scene_items: FxHashMap::default(),
            texture_indices: FxHashMap::default(),
            material_keys: FxHashMap::default(),
            geometry_keys: FxHashMap::default(),
        }
    }

    /// Marks an item complete and promotes dependents that became ready.
    fn mark_complete(&mut self, id: PlanItemId) {
        if std::mem::replace(&mut self.completed[id.0], true) {
            return;
        }
        self.completed_count += 1;
        let dependents = std::mem::take(&mut self.dependents[id.0]);
        for dependent in &dependents {
            if self.plan.mark_prerequisite_satisfied(*dependent) && !self.submitted[dependent.0] {
                self.ready.push_back(*dependent);
            }
        }
        self.dependents[id.0] = dependents;
    }
}

/// Executes an import plan against a session.
pub struct WorkDispatcher<'s> {
    session: &'s mut ImportSession,
    pool: ThreadPool,
    concurrency: ImportConcurrency,
    stop: StopToken,

    textures: Option<TexturePipeline>,
    buffers: Option<BufferPipeline>,
    materials: Option<MaterialPipeline>,
    geometries: Option<GeometryPipeline>,
    scenes: Option<ScenePipeline>,

    pending_textures: usize,
    pending_buffers: usize,
    pending_materials: usize,
    pending_geometries: usize,
    pending_scenes: usize,
}

impl<'s> WorkDispatcher<'s> {
    #[must_use]
    pub fn new(
        session: &'s mut ImportSession,
        pool: ThreadPool,
        concurrency: ImportConcurrency,
        stop: StopToken,
    ) -> Self {
        Self {
            session,
            pool,
            concurrency,
            stop,
            textures: None,
            buffers: None,
            materials: None,
            geometries: None,
            scenes: None,
            pending_textures: 0,
            pending_buffers: 0,
            pending_materials: 0,
            pending_geometries: 0,
            pending_scenes: 0,
        }
    }

    /// Runs the plan to completion. Returns false on the first failure,
    /// cancellation, or deadlock; pipelines are closed either way.
    pub async fn run(&mut self, plan: ImportPlan) -> bool {
        let mut state = RunState::new(plan);
        let outcome = self.run_inner(&mut state).await;
        self.close_pipelines();
        outcome
    }

    async fn run_inner(&mut self, state: &mut RunState) -> bool {
        let item_count = state.plan.len();
        while state.completed_count < item_count {
            while let Some(id) = state.ready.pop_front() {
                if !self.submit_item(state, id).await {
                    return false;
                }
            }

            if self.stop.stop_requested() {
                return false;
            }

            if self.pending_total() == 0 {
                self.session.add_diagnostic(ImportDiagnostic::error(
                    "import.plan.deadlock",
                    "Import plan has no pending work but is not complete",
                    "",
                    "",
                ));
                return false;
            }

            if !self.collect_one(state).await {
                return false;
            }
        }
        true
    }

    fn pending_total(&self) -> usize {
        self.pending_textures
            + self.pending_buffers
            + self.pending_materials
            + self.pending_geometries
            + self.pending_scenes
    }

    fn close_pipelines(&mut self) {
        if let Some(pipeline) = &self.textures {
            pipeline.close();
        }
        if let Some(pipeline) = &self.buffers {
            pipeline.close();
        }
        if let Some(pipeline) = &self.materials {
            pipeline.close();
        }
        if let Some(pipeline) = &self.geometries {
            pipeline.close();
        }
        if let Some(pipeline) = &self.scenes {
            pipeline.close();
        }
    }

    async fn submit_item(&mut self, state: &mut RunState, id: PlanItemId) -> bool {
        if self.stop.stop_requested() {
            return false;
        }
        if std::mem::replace(&mut state.submitted[id.0], true) {
            return true;
        }
        match state.plan.item(id).kind {
            PlanItemKind::TextureResource => self.submit_texture(state, id).await,
            PlanItemKind::BufferResource => self.submit_buffer(state, id).await,
            PlanItemKind::MaterialAsset => self.submit_material(state, id).await,
            PlanItemKind::GeometryAsset => self.submit_geometry(state, id).await,
            PlanItemKind::SceneAsset => self.submit_scene(state, id).await,
            PlanItemKind::AudioResource => {
                self.session.add_diagnostic(ImportDiagnostic::error(
                    "import.plan.unhandled_kind",
                    "Unhandled plan item kind in import",
                    &state.plan.item(id).debug_name,
                    "",
                ));
                false
            }
        }
    }

    async fn submit_texture(&mut self, state: &mut RunState, id: PlanItemId) -> bool {
        let handle = state.plan.item(id).work_handle;
        let Some(item) = state.plan.textures[handle].take() else {
            return false;
        };
        state.texture_items.insert(item.source_id.clone(), id);

        if self.textures.is_none() {
            self.textures =
                Some(TexturePipeline::start(&self.concurrency.texture, &self.pool, &self.stop));
        }
        while self.pending_textures >= self.concurrency.texture.queue_capacity.max(1) {
            if !self.collect_one(state).await {
                return false;
            }
        }
        self.pending_textures += 1;
        self.textures.as_ref().unwrap().submit(item).await.is_ok()
    }

    async fn submit_buffer(&mut self, state: &mut RunState, id: PlanItemId) -> bool {
        let handle = state.plan.item(id).work_handle;
        let Some(item) = state.plan.buffers[handle].take() else {
            return false;
        };
        state.buffer_items.insert(item.source_id.clone(), id);

        if self.buffers.is_none() {
            self.buffers =
                Some(BufferPipeline::start(&self.concurrency.buffer, &self.pool, &self.stop));
        }
        while self.pending_buffers >= self.concurrency.buffer.queue_capacity.max(1) {
            if !self.collect_one(state).await {
                return false;
            }
        }
        self.pending_buffers += 1;
        self.buffers.as_ref().unwrap().submit(item).await.is_ok()
    }

    async fn submit_material(&mut self, state: &mut RunState, id: PlanItemId) -> bool {
        let handle = state.plan.item(id).work_handle;
        let Some(mut item) = state.plan.materials[handle].take() else {
            return false;
        };

        // Bind texture dependencies cooked earlier in the plan. Unresolved
        // bindings stay unbound; the cook diagnoses them and substitutes the
        // missing-texture sentinel.
        for binding in &mut item.textures {
            if binding.index.is_none() {
                binding.index = state.texture_indices.get(&binding.source_id).copied();
            }
        }
        state.material_items.insert(item.source_id.clone(), id);

        if self.materials.is_none() {
            self.materials =
                Some(MaterialPipeline::start(&self.concurrency.material, &self.pool, &self.stop));
        }
        while self.pending_materials >= self.concurrency.material.queue_capacity.max(1) {
            if !self.collect_one(state).await {
                return false;
            }
        }
        self.pending_materials += 1;
        self.materials.as_ref().unwrap().submit(item).await.is_ok()
    }

    async fn submit_geometry(&mut self, state: &mut RunState, id: PlanItemId) -> bool {
        let handle = state.plan.item(id).work_handle;
        let Some(mut item) = state.plan.geometries[handle].take() else {
            return false;
        };

        // Bind material keys produced by completed material prerequisites,
        // in prerequisite order.
        item.material_keys.clear();
        for prerequisite in &state.plan.item(id).prerequisites {
            if state.plan.item(*prerequisite).kind == PlanItemKind::MaterialAsset {
                if let Some(key) = state.material_keys.get(prerequisite) {
                    item.material_keys.push(*key);
                }
            }
        }
        state.geometry_items.insert(item.source_id.clone(), id);

        if self.geometries.is_none() {
            self.geometries =
                Some(GeometryPipeline::start(&self.concurrency.geometry, &self.pool, &self.stop));
        }
        while self.pending_geometries >= self.concurrency.geometry.queue_capacity.max(1) {
            if !self.collect_one(state).await {
                return false;
            }
        }
        self.pending_geometries += 1;
        self.geometries.as_ref().unwrap().submit(item).await.is_ok()
    }

    async fn submit_scene(&mut self, state: &mut RunState, id: PlanItemId) -> bool {
        let handle = state.plan.item(id).work_handle;
        let Some(mut item) = state.plan.scenes[handle].take() else {
            return false;
        };

        item.geometry_keys.clear();
        for prerequisite in &state.plan.item(id).prerequisites {
            if state.plan.item(*prerequisite).kind == PlanItemKind::GeometryAsset {
                match state.geometry_keys.get(prerequisite) {
                    Some(key) => item.geometry_keys.push(*key),
                    None => {
                        self.session.add_diagnostic(ImportDiagnostic::error(
                            "scene.geometry_key_missing",
                            "Missing geometry key for scene dependency",
                            &item.source_id,
                            "",
                        ));
                    }
                }
            }
        }
        state.scene_items.insert(item.source_id.clone(), id);

        if self.scenes.is_none() {
            self.scenes =
                Some(ScenePipeline::start(&self.concurrency.scene, &self.pool, &self.stop));
        }
        while self.pending_scenes >= self.concurrency.scene.queue_capacity.max(1) {
            if !self.collect_one(state).await {
                return false;
            }
        }
        self.pending_scenes += 1;
        self.scenes.as_ref().unwrap().submit(item).await.is_ok()
    }

    /// Collects exactly one result from whichever pipeline has pending work.
    async fn collect_one(&mut self, state: &mut RunState) -> bool {
        if self.pending_textures > 0 {
            let Ok(result) = self.textures.as_ref().unwrap().collect().await else {
                return false;
            };
            self.pending_textures -= 1;
            return self.process_texture_result(state, result);
        }
        if self.pending_buffers > 0 {
            let Ok(result) = self.buffers.as_ref().unwrap().collect().await else {
                return false;
            };
            self.pending_buffers -= 1;
            return self.process_buffer_result(state, result);
        }
        if self.pending_materials > 0 {
            let Ok(result) = self.materials.as_ref().unwrap().collect().await else {
                return false;
            };
            self.pending_materials -= 1;
            return self.process_material_result(state, result);
        }
        if self.pending_geometries > 0 {
            let Ok(result) = self.geometries.as_ref().unwrap().collect().await else {
                return false;
            };
            self.pending_geometries -= 1;
            return self.process_geometry_result(state, result);
        }
        if self.pending_scenes > 0 {
            let Ok(result) = self.scenes.as_ref().unwrap().collect().await else {
                return false;
            };
            self.pending_scenes -= 1;
            return self.process_scene_result(state, result);
        }
        false
    }

    fn process_texture_result(
        &mut self,
        state: &mut RunState,
        mut result: WorkResult<CookedTexture>,
    ) -> bool {
        if result.canceled {
            return false;
        }

        let index = if result.used_placeholder {
            // Survivable failure: downgrade and account the fallback.
            downgrade_errors(&mut result.diagnostics);
            self.session.add_diagnostics(std::mem::take(&mut result.diagnostics));
            self.session.add_diagnostic(ImportDiagnostic::warning(
                "texture.placeholder_used",
                "Texture cooking failed; using fallback texture",
                &result.source_id,
                "",
            ));
            self.session.emit_fallback_texture()
        } else if !result.success {
            self.session.add_diagnostics(std::mem::take(&mut result.diagnostics));
            return false;
        } else {
            self.session.add_diagnostics(std::mem::take(&mut result.diagnostics));
            let Some(cooked) = result.cooked.take() else {
                return false;
            };
            self.session.emit_texture(cooked)
        };

        state.texture_indices.insert(result.source_id.clone(), index);

        match state.texture_items.remove(&result.source_id) {
            Some(id) => {
                state.mark_complete(id);
                true
            }
            None => {
                self.session.add_diagnostic(ImportDiagnostic::error(
                    "import.plan.texture_unmapped",
                    "Texture result could not be mapped to a plan item",
                    &result.source_id,
                    "",
                ));
                false
            }
        }
    }

    fn process_buffer_result(
        &mut self,
        state: &mut RunState,
        mut result: WorkResult<CookedBuffer>,
    ) -> bool {
        if result.canceled {
            return false;
        }
        self.session.add_diagnostics(std::mem::take(&mut result.diagnostics));
        if !result.success {
            return false;
        }
        let Some(cooked) = result.cooked.take() else {
            return false;
        };
        self.session.emit_buffer(cooked);

        match state.buffer_items.remove(&result.source_id) {
            Some(id) => {
                state.mark_complete(id);
                true
            }
            None => {
                self.session.add_diagnostic(ImportDiagnostic::error(
                    "import.plan.buffer_unmapped",
                    "Buffer result could not be mapped to a plan item",
                    &result.source_id,
                    "",
                ));
                false
            }
        }
    }

    fn process_material_result(
        &mut self,
        state: &mut RunState,
        mut result: WorkResult<CookedMaterial>,
    ) -> bool {
        if result.canceled {
            return false;
        }
        self.session.add_diagnostics(std::mem::take(&mut result.diagnostics));
        if !result.success {
            return false;
        }
        let Some(cooked) = result.cooked.take() else {
            return false;
        };

        let Some(id) = state.material_items.remove(&result.source_id) else {
            self.session.add_diagnostic(ImportDiagnostic::error(
                "import.plan.material_unmapped",
                "Material result could not be mapped to a plan item",
                &result.source_id,
                "",
            ));
            return false;
        };

        state.material_keys.insert(id, cooked.material_key);
        self.session.emit_asset(
            cooked.material_key,
            AssetType::Material,
            format!("materials/{}", result.source_id),
            cooked.payload,
        );
        state.mark_complete(id);
        true
    }

    fn process_geometry_result(
        &mut self,
        state: &mut RunState,
        mut result: WorkResult<CookedGeometry>,
    ) -> bool {
        if result.canceled {
            return false;
        }
        self.session.add_diagnostics(std::mem::take(&mut result.diagnostics));
        if !result.success {
            return false;
        }
        let Some(cooked) = result.cooked.take() else {
            return false;
        };

        let Some(id) = state.geometry_items.remove(&result.source_id) else {
            self.session.add_diagnostic(ImportDiagnostic::error(
                "import.plan.geometry_unmapped",
                "Geometry result could not be mapped to a plan item",
                &result.source_id,
                "",
            ));
            return false;
        };

        // The vertex/index blob lands in the buffer table; the descriptor is
        // the emitted asset.
        self.session.emit_buffer(CookedBuffer {
            descriptor: BufferDescriptor {
                size: cooked.payload.len() as u64,
                stride: 12,
                content_hash: cooked.descriptor.content_hash,
            },
            payload: cooked.payload,
        });
        state.geometry_keys.insert(id, cooked.geometry_key);
        self.session.emit_asset(
            cooked.geometry_key,
            AssetType::Geometry,
            format!("geometries/{}", result.source_id),
            serde_json::to_vec(&cooked.descriptor).unwrap_or_default(),
        );
        state.mark_complete(id);
        true
    }

    fn process_scene_result(
        &mut self,
        state: &mut RunState,
        mut result: WorkResult<CookedScene>,
    ) -> bool {
        if result.canceled {
            return false;
        }
        self.session.add_diagnostics(std::mem::take(&mut result.diagnostics));
        if !result.success {
            return false;
        }
        let Some(cooked) = result.cooked.take() else {
            return false;
        };

        let Some(id) = state.scene_items.remove(&result.source_id) else {
            self.session.add_diagnostic(ImportDiagnostic::error(
                "import.plan.scene_unmapped",
                "Scene result could not be mapped to a plan item",
                &result.source_id,
                "",
            ));
            return false;
        };

        self.session.emit_asset(
            cooked.scene_key,
            AssetType::Scene,
            format!("scenes/{}", result.source_id),
            cooked.payload,
        );
        state.mark_complete(id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::session::AssetType;
    use crate::import::work::{
        GeometryWorkItem, MaterialTextureBinding, MaterialWorkItem, SceneWorkItem,
        TextureWorkItem,
    };
    use crate::platform::StopSource;

    fn texture(name: &str) -> TextureWorkItem {
        TextureWorkItem::from_pixels(name, 2, 2, vec![128; 16])
    }

    fn material(name: &str, texture_source: &str) -> MaterialWorkItem {
        MaterialWorkItem {
            source_id: name.into(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            metallic: 0.0,
            roughness: 1.0,
            textures: vec![MaterialTextureBinding {
                slot: "base_color".into(),
                source_id: texture_source.into(),
                index: None,
            }],
        }
    }

    fn geometry(name: &str) -> GeometryWorkItem {
        GeometryWorkItem {
            source_id: name.into(),
            positions: vec![0.0; 9],
            indices: vec![0, 1, 2],
            material_keys: Vec::new(),
        }
    }

    fn dispatcher_parts() -> (ImportSession, ThreadPool, StopSource) {
        (ImportSession::new(), ThreadPool::current(), StopSource::new())
    }

    #[tokio::test]
    async fn texture_material_edge_binds_bindless_index() {
        let (mut session, pool, stop) = dispatcher_parts();
        let mut plan = ImportPlan::new();
        let t = plan.add_texture(texture("albedo"));
        let m = plan.add_material(material("gold", "albedo"));
        plan.add_dependency(m, t).unwrap();

        let ok = WorkDispatcher::new(&mut session, pool, ImportConcurrency::default(), stop.token())
            .run(plan)
            .await;
        assert!(ok);

        let report = session.report(true);
        assert_eq!(report.textures_emitted, 1);
        assert_eq!(report.materials_emitted, 1);

        // The material payload references the bindless index the texture
        // emitter produced.
        let asset = &session.assets()[0];
        assert_eq!(asset.asset_type, AssetType::Material);
        let descriptor: serde_json::Value =
            serde_json::from_slice(&asset.descriptor_bytes).unwrap();
        assert_eq!(descriptor["texture_indices"][0][1], 1);
    }

    #[tokio::test]
    async fn full_chain_scene_geometry_material_texture() {
        let (mut session, pool, stop) = dispatcher_parts();
        let mut plan = ImportPlan::new();
        let t = plan.add_texture(texture("tex"));
        let m = plan.add_material(material("mat", "tex"));
        let g = plan.add_geometry(geometry("mesh"));
        let s = plan.add_scene(SceneWorkItem {
            source_id: "level".into(),
            nodes: vec!["root".into()],
            geometry_keys: Vec::new(),
        });
        plan.add_dependency(m, t).unwrap();
        plan.add_dependency(g, m).unwrap();
        plan.add_dependency(s, g).unwrap();

        let ok = WorkDispatcher::new(&mut session, pool, ImportConcurrency::default(), stop.token())
            .run(plan)
            .await;
        assert!(ok);

        let report = session.report(true);
        assert_eq!(report.materials_emitted, 1);
        assert_eq!(report.geometries_emitted, 1);
        assert_eq!(report.scenes_emitted, 1);
        // Geometry vertex blob lands in the buffer table.
        assert_eq!(report.buffers_emitted, 1);
        assert_eq!(report.error_count, 0);
    }

    #[tokio::test]
    async fn placeholder_texture_downgrades_and_plan_succeeds() {
        let (mut session, pool, stop) = dispatcher_parts();
        let mut plan = ImportPlan::new();
        plan.add_texture(TextureWorkItem::from_pixels("broken", 8, 8, vec![0; 3]));

        let ok = WorkDispatcher::new(&mut session, pool, ImportConcurrency::default(), stop.token())
            .run(plan)
            .await;
        assert!(ok);
        assert!(session.used_fallback());

        let report = session.report(ok);
        assert_eq!(report.error_count, 0);
        assert!(report.diagnostics.iter().any(|d| d.code == "texture.placeholder_used"));
    }

    #[tokio::test]
    async fn failed_geometry_fails_plan_with_diagnostic() {
        let (mut session, pool, stop) = dispatcher_parts();
        let mut plan = ImportPlan::new();
        plan.add_geometry(GeometryWorkItem {
            source_id: "empty".into(),
            positions: Vec::new(),
            indices: Vec::new(),
            material_keys: Vec::new(),
        });

        let ok = WorkDispatcher::new(&mut session, pool, ImportConcurrency::default(), stop.token())
            .run(plan)
            .await;
        assert!(!ok);
        assert!(session.diagnostics().iter().any(|d| d.code == "mesh.missing_positions"));
    }

    #[tokio::test]
    async fn cancellation_fails_the_plan() {
        let (mut session, pool, stop) = dispatcher_parts();
        let mut plan = ImportPlan::new();
        for n in 0..8 {
            plan.add_texture(texture(&format!("tex{n}")));
        }
        stop.request_stop();

        let ok = WorkDispatcher::new(&mut session, pool, ImportConcurrency::default(), stop.token())
            .run(plan)
            .await;
        assert!(!ok);
    }

    #[tokio::test]
    async fn unsatisfiable_plan_reports_deadlock() {
        let (mut session, pool, stop) = dispatcher_parts();
        let mut plan = ImportPlan::new();
        let t = plan.add_texture(texture("tex"));
        // Corrupt the readiness tracker: one phantom prerequisite that no
        // item will ever satisfy.
        plan.item_mut(t).remaining_prerequisites = 1;

        let ok = WorkDispatcher::new(&mut session, pool, ImportConcurrency::default(), stop.token())
            .run(plan)
            .await;
        assert!(!ok);
        assert!(session.diagnostics().iter().any(|d| d.code == "import.plan.deadlock"));
    }

    #[tokio::test]
    async fn backpressure_still_completes_wide_plans() {
        let (mut session, pool, stop) = dispatcher_parts();
        let concurrency = ImportConcurrency {
            texture: PipelineConfig {
                queue_capacity: 1,
                worker_count: 1,
                with_content_hashing: false,
                use_thread_pool: false,
            },
            ..ImportConcurrency::default()
        };
        let mut plan = ImportPlan::new();
        for n in 0..16 {
            plan.add_texture(texture(&format!("tex{n}")));
        }

        let ok = WorkDispatcher::new(&mut session, pool, concurrency, stop.token())
            .run(plan)
            .await;
        assert!(ok);
        assert_eq!(session.report(true).textures_emitted, 16);
    }
}
