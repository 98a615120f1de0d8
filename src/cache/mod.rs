//! Resource storage: the any-cache, descriptor allocation, and the bindless
//! resource registry built on top of them.

pub mod any_cache;
pub mod descriptor;
pub mod registry;

pub use any_cache::{AnyCache, CacheKey, EvictionSubscription};
pub use descriptor::{DescriptorAllocator, DescriptorHandle, FixedDescriptorAllocator};
pub use registry::{RegisteredResource, ResourceId, ResourceRegistry};
