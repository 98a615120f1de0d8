//! Resource registry
//!
//! The registry is the [`AnyCache`] storing registered resources, plus a
//! secondary index mapping bindless descriptor indices to view records and a
//! per-resource set of registered views.
//!
//! Ownership invariant: a descriptor index is owned by at most one resource
//! at any time. [`ResourceRegistry::replace`] transfers views between
//! resources without allocating or releasing the descriptors it keeps.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::cache::any_cache::AnyCache;
use crate::cache::descriptor::{DescriptorAllocator, DescriptorHandle};
use crate::core::{BindlessIndex, VersionedBindlessHandle};
use crate::errors::{EmberError, Result};
use crate::graphics::{NativeObject, NativeView, ViewDesc};

/// Stable identity of a registered resource.
pub type ResourceId = u64;

/// A resource that can be registered and exposed through bindless views.
///
/// `create_view` is the resource's view factory; returning `None` or an
/// invalid object fails the registration without leaking the descriptor.
pub trait RegisteredResource: Send + Sync + 'static {
    fn resource_id(&self) -> ResourceId;

    fn create_view(&self, desc: &ViewDesc) -> Option<NativeObject>;
}

/// Cache payload wrapping the type-erased resource.
struct ResourceEntry(Arc<dyn RegisteredResource>);

struct ViewRecord {
    owner: ResourceId,
    desc: ViewDesc,
    native: NativeObject,
    handle: VersionedBindlessHandle,
}

#[derive(Default)]
struct RegistryInner {
    views: FxHashMap<BindlessIndex, ViewRecord>,
    view_lookup: FxHashMap<(ResourceId, ViewDesc), BindlessIndex>,
    resource_views: FxHashMap<ResourceId, SmallVec<[BindlessIndex; 4]>>,
}

/// Thread-safe registry of resources and their bindless views.
pub struct ResourceRegistry {
    name: String,
    cache: Arc<AnyCache>,
    allocator: Arc<dyn DescriptorAllocator>,
    inner: Mutex<RegistryInner>,
}

impl ResourceRegistry {
    #[must_use]
    pub fn new(name: impl Into<String>, allocator: Arc<dyn DescriptorAllocator>) -> Self {
        Self {
            name: name.into(),
            // The resource table itself is unbounded; budgets apply to the
            // payload caches layered on top, not to registration.
            cache: Arc::new(AnyCache::new(u64::MAX)),
            allocator,
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stores the resource in the cache.
    pub fn register(&self, resource: Arc<dyn RegisteredResource>) -> Result<()> {
        let id = resource.resource_id();
        log::debug!("[{}] register resource {id:#x}", self.name);
        self.cache.store(id, ResourceEntry(resource))
    }

    #[must_use]
    pub fn is_registered(&self, id: ResourceId) -> bool {
        self.cache.contains(id)
    }

    /// Looks the resource up in the cache without touching reference counts.
    #[must_use]
    pub fn find_resource(&self, id: ResourceId) -> Option<Arc<dyn RegisteredResource>> {
        self.cache.peek::<ResourceEntry>(id).map(|entry| Arc::clone(&entry.0))
    }

    /// Unregisters the resource, releasing every descriptor it owns.
    pub fn unregister(&self, id: ResourceId) {
        let released: Vec<BindlessIndex> = {
            let mut inner = self.inner.lock();
            let indices = inner.resource_views.remove(&id).unwrap_or_default();
            for index in &indices {
                if let Some(record) = inner.views.remove(index) {
                    inner.view_lookup.remove(&(record.owner, record.desc));
                }
            }
            indices.into_iter().collect()
        };
        for index in released {
            self.allocator.release(index);
        }
        self.cache.remove(id);
    }

    /// Registers a view of `resource_id` under a caller-allocated descriptor.
    ///
    /// On any failure the descriptor is released back to the allocator, never
    /// leaked.
    pub fn register_view(
        &self,
        resource_id: ResourceId,
        descriptor: DescriptorHandle,
        desc: ViewDesc,
    ) -> Result<NativeView> {
        let Some(resource) = self.find_resource(resource_id) else {
            self.allocator.release(descriptor.index());
            return Err(EmberError::ResourceNotRegistered(resource_id));
        };

        let native = resource.create_view(&desc).filter(|object| object.is_valid());
        let Some(object) = native else {
            self.allocator.release(descriptor.index());
            return Err(EmberError::ViewCreationFailed(resource_id));
        };

        let index = descriptor.index();
        let handle = descriptor.bindless();
        let mut inner = self.inner.lock();
        inner.views.insert(index, ViewRecord { owner: resource_id, desc, native: object, handle });
        inner.view_lookup.insert((resource_id, desc), index);
        inner.resource_views.entry(resource_id).or_default().push(index);
        Ok(NativeView { object, handle })
    }

    /// Re-creates the view at `index` with `desc`. Returns true iff the
    /// descriptor index is currently owned by `resource_id` and the
    /// resource's factory produced a valid view.
    pub fn update_view(&self, resource_id: ResourceId, index: BindlessIndex, desc: ViewDesc) -> bool {
        let owned = {
            let inner = self.inner.lock();
            inner.views.get(&index).is_some_and(|record| record.owner == resource_id)
        };
        if !owned {
            return false;
        }

        let Some(resource) = self.find_resource(resource_id) else {
            return false;
        };
        let Some(object) = resource.create_view(&desc).filter(|o| o.is_valid()) else {
            return false;
        };

        let mut inner = self.inner.lock();
        let Some(record) = inner.views.get_mut(&index) else {
            return false;
        };
        if record.owner != resource_id {
            return false;
        }
        let old_desc = record.desc;
        record.desc = desc;
        record.native = object;
        inner.view_lookup.remove(&(resource_id, old_desc));
        inner.view_lookup.insert((resource_id, desc), index);
        true
    }

    /// Finds the view registered for `(resource_id, desc)`, if any.
    #[must_use]
    pub fn find_view(&self, resource_id: ResourceId, desc: ViewDesc) -> Option<NativeView> {
        let inner = self.inner.lock();
        let index = inner.view_lookup.get(&(resource_id, desc))?;
        let record = inner.views.get(index)?;
        Some(NativeView { object: record.native, handle: record.handle })
    }

    /// Owner of a descriptor index, if registered.
    #[must_use]
    pub fn descriptor_owner(&self, index: BindlessIndex) -> Option<ResourceId> {
        self.inner.lock().views.get(&index).map(|record| record.owner)
    }

    /// View descriptions registered on `resource_id`, in registration order.
    #[must_use]
    pub fn views_of(&self, resource_id: ResourceId) -> Vec<ViewDesc> {
        let inner = self.inner.lock();
        inner
            .resource_views
            .get(&resource_id)
            .map(|indices| {
                indices.iter().filter_map(|index| inner.views.get(index)).map(|r| r.desc).collect()
            })
            .unwrap_or_default()
    }

    /// Replaces `old_id` with `new_resource`, migrating views per `updater`.
    ///
    /// For each view registered on the old resource, `updater(&desc)` decides
    /// its fate: `Some(new_desc)` re-creates the view on the new resource and
    /// keeps the descriptor index; `None` (or a failing view factory)
    /// releases the descriptor. Kept descriptors are never re-allocated, and
    /// released descriptors are only the dropped ones. After a successful
    /// replace the old resource is unregistered.
    pub fn replace(
        &self,
        old_id: ResourceId,
        new_resource: Arc<dyn RegisteredResource>,
        mut updater: impl FnMut(&ViewDesc) -> Option<ViewDesc>,
    ) -> Result<()> {
        if !self.is_registered(old_id) {
            return Err(EmberError::ResourceNotRegistered(old_id));
        }
        let new_id = new_resource.resource_id();

        // Snapshot outside user code; updater and the view factory both run
        // without the registry lock held.
        let snapshot: Vec<(BindlessIndex, ViewDesc)> = {
            let inner = self.inner.lock();
            inner
                .resource_views
                .get(&old_id)
                .map(|indices| {
                    indices
                        .iter()
                        .filter_map(|index| inner.views.get(index).map(|r| (*index, r.desc)))
                        .collect()
                })
                .unwrap_or_default()
        };

        enum Fate {
            Keep { desc: ViewDesc, native: NativeObject },
            Drop,
        }

        let mut plan: Vec<(BindlessIndex, Fate)> = Vec::with_capacity(snapshot.len());
        for (index, desc) in &snapshot {
            match updater(desc) {
                Some(new_desc) => {
                    match new_resource.create_view(&new_desc).filter(|o| o.is_valid()) {
                        Some(native) => plan.push((*index, Fate::Keep { desc: new_desc, native })),
                        None => {
                            log::warn!(
                                "[{}] replace {old_id:#x}->{new_id:#x}: view factory failed, \
                                 releasing descriptor {index}",
                                self.name
                            );
                            plan.push((*index, Fate::Drop));
                        }
                    }
                }
                None => plan.push((*index, Fate::Drop)),
            }
        }

        self.register(Arc::clone(&new_resource))?;

        let released: Vec<BindlessIndex> = {
            let mut inner = self.inner.lock();
            let mut released = Vec::new();
            inner.resource_views.remove(&old_id);
            for (index, fate) in plan {
                let Some(record) = inner.views.remove(&index) else { continue };
                inner.view_lookup.remove(&(record.owner, record.desc));
                match fate {
                    Fate::Keep { desc, native } => {
                        inner.views.insert(
                            index,
                            ViewRecord { owner: new_id, desc, native, handle: record.handle },
                        );
                        inner.view_lookup.insert((new_id, desc), index);
                        inner.resource_views.entry(new_id).or_default().push(index);
                    }
                    Fate::Drop => released.push(index),
                }
            }
            released
        };
        for index in released {
            self.allocator.release(index);
        }

        self.cache.remove(old_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::descriptor::FixedDescriptorAllocator;
    use crate::graphics::ViewType;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    /// Test resource with a controllable view factory.
    struct FakeResource {
        id: ResourceId,
        fail_views: AtomicBool,
        views_created: AtomicU64,
    }

    impl FakeResource {
        fn new(id: ResourceId) -> Arc<Self> {
            Arc::new(Self {
                id,
                fail_views: AtomicBool::new(false),
                views_created: AtomicU64::new(0),
            })
        }
    }

    impl RegisteredResource for FakeResource {
        fn resource_id(&self) -> ResourceId {
            self.id
        }

        fn create_view(&self, desc: &ViewDesc) -> Option<NativeObject> {
            if self.fail_views.load(Ordering::SeqCst) {
                return None;
            }
            let nth = self.views_created.fetch_add(1, Ordering::SeqCst) + 1;
            // Unique per (resource, creation); high bits carry the id.
            Some(NativeObject((self.id << 16) | (u64::from(desc.format) << 8) | nth))
        }
    }

    fn setup() -> (ResourceRegistry, Arc<FixedDescriptorAllocator>) {
        let allocator = Arc::new(FixedDescriptorAllocator::new(0, 16));
        let registry = ResourceRegistry::new("test", allocator.clone());
        (registry, allocator)
    }

    fn desc(format: u32) -> ViewDesc {
        ViewDesc { view_type: ViewType::ShaderResource, format, first_element: 0, element_count: u32::MAX }
    }

    fn register_view(
        registry: &ResourceRegistry,
        allocator: &FixedDescriptorAllocator,
        id: ResourceId,
        view: ViewDesc,
    ) -> (NativeView, BindlessIndex) {
        let descriptor = allocator.allocate().unwrap();
        let index = descriptor.index();
        let native = registry.register_view(id, descriptor, view).unwrap();
        (native, index)
    }

    #[test]
    fn register_view_requires_registered_resource() {
        let (registry, allocator) = setup();
        let descriptor = allocator.allocate().unwrap();
        let err = registry.register_view(1, descriptor, desc(0)).unwrap_err();
        assert!(matches!(err, EmberError::ResourceNotRegistered(1)));
        // Descriptor was returned, not leaked.
        assert_eq!(allocator.allocated(), 0);
    }

    #[test]
    fn failed_view_factory_does_not_leak_descriptor() {
        let (registry, allocator) = setup();
        let resource = FakeResource::new(1);
        resource.fail_views.store(true, Ordering::SeqCst);
        registry.register(resource).unwrap();

        let descriptor = allocator.allocate().unwrap();
        let err = registry.register_view(1, descriptor, desc(0)).unwrap_err();
        assert!(matches!(err, EmberError::ViewCreationFailed(1)));
        assert_eq!(allocator.allocated(), 0);
    }

    #[test]
    fn replace_keeps_descriptor_slots() {
        let (registry, allocator) = setup();
        registry.register(FakeResource::new(1)).unwrap();

        let (_, i1) = register_view(&registry, &allocator, 1, desc(1));
        let (_, i2) = register_view(&registry, &allocator, 1, desc(2));
        let allocated_before = allocator.allocated();
        let remaining_before = allocator.remaining();

        registry.replace(1, FakeResource::new(2), |d| Some(*d)).unwrap();

        assert!(!registry.is_registered(1));
        assert!(registry.is_registered(2));
        assert_eq!(registry.views_of(2).len(), 2);
        assert!(registry.update_view(2, i1, desc(1)));
        assert!(registry.update_view(2, i2, desc(2)));
        assert_eq!(allocator.allocated(), allocated_before);
        assert_eq!(allocator.remaining(), remaining_before);
    }

    #[test]
    fn replace_transfers_ownership_for_identity_updater() {
        let (registry, allocator) = setup();
        registry.register(FakeResource::new(1)).unwrap();
        let (_, index) = register_view(&registry, &allocator, 1, desc(7));
        assert_eq!(registry.descriptor_owner(index), Some(1));

        registry.replace(1, FakeResource::new(2), |d| Some(*d)).unwrap();
        assert_eq!(registry.descriptor_owner(index), Some(2));
        // Old resource no longer owns anything.
        assert!(!registry.update_view(1, index, desc(7)));
        assert!(registry.views_of(1).is_empty());
    }

    #[test]
    fn replace_mixed_views_transfer_and_drop() {
        let (registry, allocator) = setup();
        registry.register(FakeResource::new(1)).unwrap();
        let (_, keep) = register_view(&registry, &allocator, 1, desc(1));
        let (_, dropped) = register_view(&registry, &allocator, 1, desc(2));
        let allocated_before = allocator.allocated();

        registry
            .replace(1, FakeResource::new(2), |d| if d.format == 1 { Some(*d) } else { None })
            .unwrap();

        assert_eq!(registry.descriptor_owner(keep), Some(2));
        assert_eq!(registry.descriptor_owner(dropped), None);
        assert_eq!(allocator.allocated(), allocated_before - 1);
        assert_eq!(registry.views_of(2).len(), 1);
    }

    #[test]
    fn replace_with_failing_factory_releases_descriptor() {
        let (registry, allocator) = setup();
        registry.register(FakeResource::new(1)).unwrap();
        let (_, index) = register_view(&registry, &allocator, 1, desc(1));

        let broken = FakeResource::new(2);
        broken.fail_views.store(true, Ordering::SeqCst);
        registry.replace(1, broken, |d| Some(*d)).unwrap();

        assert_eq!(registry.descriptor_owner(index), None);
        assert_eq!(allocator.allocated(), 0);
        assert!(registry.is_registered(2));
    }

    #[test]
    fn replace_with_no_views_is_unregister_plus_register() {
        let (registry, _allocator) = setup();
        registry.register(FakeResource::new(1)).unwrap();
        registry.replace(1, FakeResource::new(2), |d| Some(*d)).unwrap();
        assert!(!registry.is_registered(1));
        assert!(registry.is_registered(2));
        assert!(registry.views_of(2).is_empty());
    }

    #[test]
    fn replace_on_unregistered_resource_fails() {
        let (registry, _allocator) = setup();
        let err = registry.replace(1, FakeResource::new(2), |d| Some(*d)).unwrap_err();
        assert!(matches!(err, EmberError::ResourceNotRegistered(1)));
        assert!(!registry.is_registered(2));
    }

    #[test]
    fn update_view_rejects_wrong_resource() {
        let (registry, allocator) = setup();
        registry.register(FakeResource::new(1)).unwrap();
        registry.register(FakeResource::new(2)).unwrap();
        let (_, index) = register_view(&registry, &allocator, 1, desc(1));

        assert!(!registry.update_view(2, index, desc(1)));
        assert!(registry.update_view(1, index, desc(3)));
        assert!(registry.find_view(1, desc(3)).is_some());
        assert!(registry.find_view(1, desc(1)).is_none());
    }

    #[test]
    fn unregister_releases_all_descriptors() {
        let (registry, allocator) = setup();
        registry.register(FakeResource::new(1)).unwrap();
        register_view(&registry, &allocator, 1, desc(1));
        register_view(&registry, &allocator, 1, desc(2));
        assert_eq!(allocator.allocated(), 2);

        registry.unregister(1);
        assert_eq!(allocator.allocated(), 0);
        assert!(!registry.is_registered(1));
    }

    #[test]
    fn find_view_follows_replace() {
        let (registry, allocator) = setup();
        registry.register(FakeResource::new(1)).unwrap();
        let (_, index) = register_view(&registry, &allocator, 1, desc(5));

        registry.replace(1, FakeResource::new(2), |d| Some(*d)).unwrap();
        let view = registry.find_view(2, desc(5)).expect("view moved to new resource");
        assert_eq!(view.handle.index(), index);
        assert!(registry.find_view(1, desc(5)).is_none());
    }

    #[test]
    fn concurrent_replace_on_disjoint_resources() {
        let (registry, allocator) = setup();
        let registry = Arc::new(registry);
        registry.register(FakeResource::new(1)).unwrap();
        registry.register(FakeResource::new(2)).unwrap();
        let (_, i1) = register_view(&registry, &allocator, 1, desc(1));
        let (_, i2) = register_view(&registry, &allocator, 2, desc(2));

        let handles: Vec<_> = [(1u64, 11u64), (2, 12)]
            .into_iter()
            .map(|(old, new)| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry.replace(old, FakeResource::new(new), |d| Some(*d)).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.descriptor_owner(i1), Some(11));
        assert_eq!(registry.descriptor_owner(i2), Some(12));
        assert_eq!(allocator.allocated(), 2);
    }
}
