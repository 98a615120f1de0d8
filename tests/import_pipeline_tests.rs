//! Import pipeline integration tests through the public API.

use ember::import::{
    AssetType, ImportConcurrency, ImportPlan, ImportSession, MaterialTextureBinding,
    MaterialWorkItem, SceneWorkItem, TextureWorkItem, WorkDispatcher,
};
use ember::import::work::GeometryWorkItem;
use ember::platform::{StopSource, ThreadPool};

fn texture(name: &str, side: u32) -> TextureWorkItem {
    TextureWorkItem::from_pixels(name, side, side, vec![200; (side * side * 4) as usize])
}

fn material(name: &str, textures: &[&str]) -> MaterialWorkItem {
    MaterialWorkItem {
        source_id: name.into(),
        base_color: [1.0, 1.0, 1.0, 1.0],
        metallic: 0.1,
        roughness: 0.8,
        textures: textures
            .iter()
            .map(|source| MaterialTextureBinding {
                slot: format!("slot_{source}"),
                source_id: (*source).into(),
                index: None,
            })
            .collect(),
    }
}

#[tokio::test]
async fn gltf_like_plan_cooks_in_dependency_order() {
    let mut plan = ImportPlan::new();
    let albedo = plan.add_texture(texture("albedo", 4));
    let normal = plan.add_texture(texture("normal", 4));
    let gold = plan.add_material(material("gold", &["albedo", "normal"]));
    let mesh = plan.add_geometry(GeometryWorkItem {
        source_id: "mesh".into(),
        positions: vec![0.0; 24],
        indices: vec![0, 1, 2, 0, 2, 3],
        material_keys: Vec::new(),
    });
    let level = plan.add_scene(SceneWorkItem {
        source_id: "level".into(),
        nodes: vec!["root".into(), "child".into()],
        geometry_keys: Vec::new(),
    });
    plan.add_dependency(gold, albedo).unwrap();
    plan.add_dependency(gold, normal).unwrap();
    plan.add_dependency(mesh, gold).unwrap();
    plan.add_dependency(level, mesh).unwrap();

    let mut session = ImportSession::new();
    let stop = StopSource::new();
    let ok = WorkDispatcher::new(
        &mut session,
        ThreadPool::current(),
        ImportConcurrency::default(),
        stop.token(),
    )
    .run(plan)
    .await;
    assert!(ok);

    let report = session.report(ok);
    assert_eq!(report.textures_emitted, 2);
    assert_eq!(report.materials_emitted, 1);
    assert_eq!(report.geometries_emitted, 1);
    assert_eq!(report.scenes_emitted, 1);
    assert_eq!(report.error_count, 0);
    assert!(!report.used_fallback);

    // Every material texture slot resolved to a real bindless index.
    let material_asset =
        session.assets().iter().find(|a| a.asset_type == AssetType::Material).unwrap();
    let descriptor: serde_json::Value =
        serde_json::from_slice(&material_asset.descriptor_bytes).unwrap();
    let indices = descriptor["texture_indices"].as_array().unwrap();
    assert_eq!(indices.len(), 2);
    for entry in indices {
        let index = entry[1].as_u64().unwrap();
        assert!(index >= 1 && index <= 2, "unresolved binding: {entry:?}");
    }

    // The report serializes for external tooling.
    let json = serde_json::to_string_pretty(&report).unwrap();
    assert!(json.contains("\"success\": true"));
}

#[test]
fn cyclic_dependency_is_rejected_at_plan_build_time() {
    let mut plan = ImportPlan::new();
    let a = plan.add_material(material("a", &[]));
    let b = plan.add_material(material("b", &[]));
    plan.add_dependency(a, b).unwrap();
    let err = plan.add_dependency(b, a).unwrap_err();
    assert!(matches!(err, ember::EmberError::ImportCycle { .. }));
}

#[tokio::test]
async fn canceled_plan_reports_failure_without_partial_success() {
    let mut plan = ImportPlan::new();
    for n in 0..12 {
        plan.add_texture(texture(&format!("tex{n}"), 2));
    }

    let mut session = ImportSession::new();
    let stop = StopSource::new();
    stop.request_stop();
    let ok = WorkDispatcher::new(
        &mut session,
        ThreadPool::current(),
        ImportConcurrency::default(),
        stop.token(),
    )
    .run(plan)
    .await;

    assert!(!ok);
    assert!(!session.report(ok).success);
}
