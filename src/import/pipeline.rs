//! Per-kind cook pipelines
//!
//! A [`CookPipeline`] is a bounded MPMC work channel, a bounded result
//! channel, and a pool of worker tasks. Workers check the stop token before
//! each cook, offload the cook to the thread pool when configured, optionally
//! content-hash the cooked payload on the pool and patch the descriptor, and
//! emit the result. Closing the pipeline stops further submissions; in-flight
//! work still completes and workers terminate once the work channel drains.
//!
//! The per-kind contract is uniform: `submit` awaits queue space, bumping the
//! submitted/in-flight counters; `try_submit` refuses when closed or full;
//! `collect` dequeues one result, bumping completed or failed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use xxhash_rust::xxh3::xxh3_64;

use crate::errors::{EmberError, Result};
use crate::import::work::{
    BufferWorkItem, CookedBuffer, CookedGeometry, CookedMaterial, CookedScene, CookedTexture,
    GeometryWorkItem, MaterialWorkItem, SceneWorkItem, TextureWorkItem, WorkResult, cook_buffer,
    cook_geometry, cook_material, cook_scene, cook_texture,
};
use crate::platform::{StopToken, ThreadPool};

/// Configuration of one per-kind pipeline.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
    pub worker_count: usize,
    /// Patch a content hash into each cooked descriptor.
    pub with_content_hashing: bool,
    /// Run cooks (and hashing) on the blocking thread pool instead of the
    /// worker task itself.
    pub use_thread_pool: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { queue_capacity: 4, worker_count: 2, with_content_hashing: true, use_thread_pool: true }
    }
}

/// Static description of a cookable kind.
pub trait CookKind: Send + Sync + 'static {
    const LABEL: &'static str;
    type Item: Send + 'static;
    type Cooked: Send + 'static;

    fn source_id(item: &Self::Item) -> &str;
    fn cook(item: Self::Item, stop: &StopToken) -> WorkResult<Self::Cooked>;
    fn payload(cooked: &Self::Cooked) -> &[u8];
    fn set_content_hash(cooked: &mut Self::Cooked, hash: u64);
}

macro_rules! cook_kind {
    ($name:ident, $label:literal, $item:ty, $cooked:ty, $cook:path) => {
        pub struct $name;

        impl CookKind for $name {
            const LABEL: &'static str = $label;
            type Item = $item;
            type Cooked = $cooked;

            fn source_id(item: &Self::Item) -> &str {
                &item.source_id
            }

            fn cook(item: Self::Item, stop: &StopToken) -> WorkResult<Self::Cooked> {
                $cook(item, stop)
            }

            fn payload(cooked: &Self::Cooked) -> &[u8] {
                &cooked.payload
            }

            fn set_content_hash(cooked: &mut Self::Cooked, hash: u64) {
                cooked.descriptor.content_hash = hash;
            }
        }
    };
}

cook_kind!(TextureCook, "texture", TextureWorkItem, CookedTexture, cook_texture);
cook_kind!(BufferCook, "buffer", BufferWorkItem, CookedBuffer, cook_buffer);
cook_kind!(MaterialCook, "material", MaterialWorkItem, CookedMaterial, cook_material);
cook_kind!(GeometryCook, "geometry", GeometryWorkItem, CookedGeometry, cook_geometry);
cook_kind!(SceneCook, "scene", SceneWorkItem, CookedScene, cook_scene);

pub type TexturePipeline = CookPipeline<TextureCook>;
pub type BufferPipeline = CookPipeline<BufferCook>;
pub type MaterialPipeline = CookPipeline<MaterialCook>;
pub type GeometryPipeline = CookPipeline<GeometryCook>;
pub type ScenePipeline = CookPipeline<SceneCook>;

#[derive(Debug, Default)]
struct PipelineCounters {
    submitted: AtomicU64,
    in_flight: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Bounded pipeline of worker tasks for one cookable kind.
pub struct CookPipeline<K: CookKind> {
    work_tx: Mutex<Option<flume::Sender<K::Item>>>,
    result_rx: flume::Receiver<WorkResult<K::Cooked>>,
    counters: Arc<PipelineCounters>,
}

impl<K: CookKind> CookPipeline<K> {
    /// Starts the pipeline's workers on the ambient runtime.
    #[must_use]
    pub fn start(config: &PipelineConfig, pool: &ThreadPool, stop: &StopToken) -> Self {
        let (work_tx, work_rx) = flume::bounded::<K::Item>(config.queue_capacity);
        let (result_tx, result_rx) =
            flume::bounded::<WorkResult<K::Cooked>>(config.queue_capacity.max(1) * 2);
        let counters = Arc::new(PipelineCounters::default());

        for _ in 0..config.worker_count.max(1) {
            tokio::spawn(worker::<K>(
                work_rx.clone(),
                result_tx.clone(),
                pool.clone(),
                stop.clone(),
                *config,
            ));
        }

        log::debug!(
            "{} pipeline started ({} workers, queue {})",
            K::LABEL,
            config.worker_count.max(1),
            config.queue_capacity
        );
        Self { work_tx: Mutex::new(Some(work_tx)), result_rx, counters }
    }

    /// Enqueues an item, awaiting queue space.
    pub async fn submit(&self, item: K::Item) -> Result<()> {
        let sender = self.work_tx.lock().clone();
        let Some(sender) = sender else {
            return Err(EmberError::PipelineClosed);
        };
        sender.send_async(item).await.map_err(|_| EmberError::PipelineClosed)?;
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        self.counters.in_flight.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Enqueues without waiting; false when closed or full.
    pub fn try_submit(&self, item: K::Item) -> bool {
        let guard = self.work_tx.lock();
        let Some(sender) = guard.as_ref() else {
            return false;
        };
        if sender.try_send(item).is_ok() {
            self.counters.submitted.fetch_add(1, Ordering::Relaxed);
            self.counters.in_flight.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Dequeues one result.
    pub async fn collect(&self) -> Result<WorkResult<K::Cooked>> {
        let result =
            self.result_rx.recv_async().await.map_err(|_| EmberError::PipelineClosed)?;
        self.counters.in_flight.fetch_sub(1, Ordering::Relaxed);
        if result.success {
            self.counters.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
        }
        Ok(result)
    }

    /// Signals no further submissions; in-flight work completes and workers
    /// terminate when the work channel drains.
    pub fn close(&self) {
        if self.work_tx.lock().take().is_some() {
            log::debug!("{} pipeline closed", K::LABEL);
        }
    }

    #[must_use]
    pub fn submitted(&self) -> u64 {
        self.counters.submitted.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.counters.in_flight.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn completed(&self) -> u64 {
        self.counters.completed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failed(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }
}

async fn worker<K: CookKind>(
    work_rx: flume::Receiver<K::Item>,
    result_tx: flume::Sender<WorkResult<K::Cooked>>,
    pool: ThreadPool,
    stop: StopToken,
    config: PipelineConfig,
) {
    while let Ok(item) = work_rx.recv_async().await {
        let source_id = K::source_id(&item).to_string();

        let mut result = if stop.stop_requested() {
            WorkResult::canceled(source_id)
        } else if config.use_thread_pool {
            match pool.run(move |token| K::cook(item, &token), stop.clone()).await {
                Ok(result) => result,
                Err(_) => WorkResult::canceled(source_id),
            }
        } else {
            K::cook(item, &stop)
        };

        if config.with_content_hashing && result.success && !result.canceled {
            if let Some(cooked) = result.cooked.take() {
                result.cooked = hash_cooked::<K>(cooked, &pool, &stop, config.use_thread_pool).await;
                if result.cooked.is_none() {
                    result.success = false;
                    result.canceled = true;
                }
            }
        }

        if result_tx.send_async(result).await.is_err() {
            // Collector went away; nothing left to report to.
            break;
        }
    }
}

async fn hash_cooked<K: CookKind>(
    mut cooked: K::Cooked,
    pool: &ThreadPool,
    stop: &StopToken,
    use_thread_pool: bool,
) -> Option<K::Cooked> {
    if use_thread_pool {
        pool.run(
            move |_| {
                let hash = xxh3_64(K::payload(&cooked));
                K::set_content_hash(&mut cooked, hash);
                cooked
            },
            stop.clone(),
        )
        .await
        .ok()
    } else {
        let hash = xxh3_64(K::payload(&cooked));
        K::set_content_hash(&mut cooked, hash);
        Some(cooked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixels(n: u32) -> TextureWorkItem {
        TextureWorkItem::from_pixels(format!("tex{n}"), 1, 1, vec![0, 0, 0, 255])
    }

    #[tokio::test]
    async fn submit_and_collect_round_trip() {
        let pipeline = TexturePipeline::start(
            &PipelineConfig::default(),
            &ThreadPool::current(),
            &StopToken::never(),
        );
        pipeline.submit(pixels(0)).await.unwrap();
        let result = pipeline.collect().await.unwrap();
        assert!(result.success);
        assert_eq!(result.source_id, "tex0");
        assert_eq!(pipeline.submitted(), 1);
        assert_eq!(pipeline.completed(), 1);
        assert_eq!(pipeline.in_flight(), 0);
        pipeline.close();
    }

    #[tokio::test]
    async fn content_hash_is_patched() {
        let config = PipelineConfig { with_content_hashing: true, ..PipelineConfig::default() };
        let pipeline =
            TexturePipeline::start(&config, &ThreadPool::current(), &StopToken::never());
        pipeline.submit(pixels(0)).await.unwrap();
        let result = pipeline.collect().await.unwrap();
        let cooked = result.cooked.unwrap();
        assert_eq!(cooked.descriptor.content_hash, xxh3_64(&cooked.payload));
        pipeline.close();
    }

    #[tokio::test]
    async fn try_submit_respects_capacity_and_close() {
        let config = PipelineConfig {
            queue_capacity: 1,
            worker_count: 1,
            with_content_hashing: false,
            use_thread_pool: false,
        };
        // A stopped pipeline still drains its queue with canceled results, so
        // use a live one and fill the queue faster than one worker drains it.
        let pipeline =
            TexturePipeline::start(&config, &ThreadPool::current(), &StopToken::never());
        let mut accepted = 0u32;
        for n in 0..64 {
            if pipeline.try_submit(pixels(n)) {
                accepted += 1;
            }
        }
        assert!(accepted < 64, "bounded queue must reject some submissions");

        for _ in 0..accepted {
            pipeline.collect().await.unwrap();
        }
        pipeline.close();
        assert!(!pipeline.try_submit(pixels(99)));
    }

    #[tokio::test]
    async fn stopped_pipeline_emits_canceled_results() {
        let source = crate::platform::StopSource::new();
        let pipeline = TexturePipeline::start(
            &PipelineConfig::default(),
            &ThreadPool::current(),
            &source.token(),
        );
        source.request_stop();
        pipeline.submit(pixels(0)).await.unwrap();
        let result = pipeline.collect().await.unwrap();
        assert!(result.canceled);
        assert_eq!(pipeline.failed(), 1);
        pipeline.close();
    }
}
