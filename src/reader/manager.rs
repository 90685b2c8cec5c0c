use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::av::{TimeRange, VideoFormat};
use crate::error::Result;

use super::element::MediaElement;
use super::video_reader::VideoReader;

/// Identifier of one video resource inside a composition. Several layers may
/// reference the same resource.
pub type ResourceId = u32;

/// One placed video layer: which resource it shows and the span of
/// composition frames during which it is active.
#[derive(Debug, Clone, Copy)]
pub struct VideoLayer {
    /// Resource this layer displays.
    pub resource_id: ResourceId,
    /// Composition frames during which the layer is on screen.
    pub active_range: TimeRange,
}

/// Read-only surface the manager needs from a composition.
///
/// Implementors flatten nested compositions before reporting layers; the
/// manager never walks a layer tree itself.
pub trait CompositionSource: Send + Sync {
    /// Every video layer in the flattened composition.
    fn video_layers(&self) -> Vec<VideoLayer>;

    /// The video frame `resource` should show for the composition's current
    /// tick. Negative means the resource is not needed this tick.
    fn target_frame(&self, resource: ResourceId) -> i64;

    /// Nominal playback rate for `resource` at the current tick.
    fn playback_rate(&self, resource: ResourceId) -> f64;

    /// Frame spans during which `resource`'s content is static.
    fn static_time_ranges(&self, resource: ResourceId) -> Vec<TimeRange>;

    /// The resource's muxed fragmented-MP4 buffer.
    fn video_buffer(&self, resource: ResourceId) -> Result<Bytes>;

    /// The resource's display format.
    fn video_format(&self, resource: ResourceId) -> Result<VideoFormat>;
}

/// Constructs environment-appropriate media elements.
pub trait MediaElementFactory: Send + Sync {
    /// Creates one element sized for `format`.
    fn create(&self, format: &VideoFormat) -> Result<Arc<dyn MediaElement>>;
}

/// Owns one [`VideoReader`] per distinct video resource of a composition and
/// fans composition ticks out to them.
pub struct VideoReaderManager {
    readers: HashMap<ResourceId, VideoReader>,
    overlap: bool,
}

impl VideoReaderManager {
    /// True when the composition references at least one video layer.
    /// Structural check only; no element is instantiated.
    pub fn has_video(source: &dyn CompositionSource) -> bool {
        !source.video_layers().is_empty()
    }

    /// Builds one reader per distinct resource and eagerly brings each to
    /// frame 0 so the first visible tick does not pay priming latency.
    ///
    /// Overlapping active ranges on a shared resource are an authoring
    /// mistake: a single element cannot show two positions at once. The
    /// overlap is recorded and logged, not corrected.
    pub async fn make(
        source: &dyn CompositionSource,
        factory: &dyn MediaElementFactory,
    ) -> Result<Self> {
        let layers = source.video_layers();
        let overlap = detect_overlap(&layers);

        let mut readers = HashMap::new();
        for layer in &layers {
            if readers.contains_key(&layer.resource_id) {
                continue;
            }
            let format = source.video_format(layer.resource_id)?;
            let buffer = source.video_buffer(layer.resource_id)?;
            let element = factory.create(&format)?;
            let mut reader = VideoReader::new(
                element,
                Some(buffer),
                format,
                source.static_time_ranges(layer.resource_id),
            )?;
            if let Err(e) = reader
                .prepare(0, source.playback_rate(layer.resource_id))
                .await
            {
                log::warn!(
                    "eager prepare of video resource {} failed: {}",
                    layer.resource_id,
                    e
                );
            }
            readers.insert(layer.resource_id, reader);
        }

        Ok(Self { readers, overlap })
    }

    /// True when two layers sharing a resource have overlapping active
    /// ranges.
    pub fn has_time_range_overlap(&self) -> bool {
        self.overlap
    }

    /// Number of managed readers.
    pub fn reader_count(&self) -> usize {
        self.readers.len()
    }

    /// Advances every needed resource to its target frame for this tick.
    ///
    /// Resources reporting a negative target are skipped. A failing reader
    /// does not stop the fan-out; the first error is returned after every
    /// resource has been attempted.
    pub async fn prepare_target_frame(&mut self, source: &dyn CompositionSource) -> Result<()> {
        let mut first_error = None;
        for (resource, reader) in self.readers.iter_mut() {
            let target = source.target_frame(*resource);
            if target < 0 {
                continue;
            }
            if let Err(e) = reader.prepare(target, source.playback_rate(*resource)).await {
                log::warn!("prepare of video resource {} failed: {}", resource, e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Destroys every reader and releases their elements.
    pub fn destroy(&mut self) {
        for reader in self.readers.values_mut() {
            reader.destroy();
        }
        self.readers.clear();
    }
}

fn detect_overlap(layers: &[VideoLayer]) -> bool {
    let mut by_resource: HashMap<ResourceId, Vec<TimeRange>> = HashMap::new();
    for layer in layers {
        by_resource
            .entry(layer.resource_id)
            .or_default()
            .push(layer.active_range);
    }

    let mut overlap = false;
    for (resource, ranges) in &by_resource {
        for i in 0..ranges.len() {
            for j in (i + 1)..ranges.len() {
                if ranges[i].overlaps(&ranges[j]) {
                    log::warn!(
                        "video resource {} is active in overlapping ranges \
                         [{}, {}) and [{}, {})",
                        resource,
                        ranges[i].start,
                        ranges[i].end,
                        ranges[j].start,
                        ranges[j].end
                    );
                    overlap = true;
                }
            }
        }
    }
    overlap
}
