//! Ordered stacks of raster layers.
//!
//! Compositing is modelled as flattening a stack of surfaces onto a
//! destination, lowest `order` first and top-most last. Layers with equal
//! order keep insertion order. A stack can be snapshotted into PNG bytes
//! plus placement and restored later.

use std::io::Cursor;

use image::{imageops, RgbaImage};
use serde::{Deserialize, Serialize};

use storyreel_common::error::{StoryreelError, StoryreelResult};

/// One paintable surface placed on the destination.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Stacking position; higher draws later.
    pub order: i32,
    /// Top-left placement on the destination (may be negative).
    pub x: i64,
    pub y: i64,
    pub surface: RgbaImage,
}

/// Serialized form of a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSnapshot {
    pub order: i32,
    pub x: i64,
    pub y: i64,
    /// PNG-encoded surface.
    pub png: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct LayerStack {
    layers: Vec<Layer>,
}

impl Layer {
    pub fn new(order: i32, x: i64, y: i64, surface: RgbaImage) -> Self {
        Self {
            order,
            x,
            y,
            surface,
        }
    }
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layers in draw order.
    pub fn ordered(&self) -> Vec<&Layer> {
        let mut ordered: Vec<&Layer> = self.layers.iter().collect();
        ordered.sort_by_key(|layer| layer.order);
        ordered
    }

    /// Alpha-blend every layer onto `dest`, bottom to top.
    pub fn flatten_onto(&self, dest: &mut RgbaImage) {
        for layer in self.ordered() {
            imageops::overlay(dest, &layer.surface, layer.x, layer.y);
        }
    }

    pub fn snapshot(&self) -> StoryreelResult<Vec<LayerSnapshot>> {
        self.layers
            .iter()
            .map(|layer| -> StoryreelResult<LayerSnapshot> {
                let mut png = Cursor::new(Vec::new());
                layer
                    .surface
                    .write_to(&mut png, image::ImageFormat::Png)
                    .map_err(|e| anyhow::anyhow!("Failed to encode layer {}: {e}", layer.order))?;
                Ok(LayerSnapshot {
                    order: layer.order,
                    x: layer.x,
                    y: layer.y,
                    png: png.into_inner(),
                })
            })
            .collect()
    }

    pub fn restore(snapshots: &[LayerSnapshot]) -> StoryreelResult<Self> {
        let layers = snapshots
            .iter()
            .map(|snapshot| -> StoryreelResult<Layer> {
                let surface = image::load_from_memory_with_format(
                    &snapshot.png,
                    image::ImageFormat::Png,
                )
                .map_err(|e| {
                    StoryreelError::from(anyhow::anyhow!(
                        "Failed to decode layer {}: {e}",
                        snapshot.order
                    ))
                })?
                .to_rgba8();
                Ok(Layer::new(snapshot.order, snapshot.x, snapshot.y, surface))
            })
            .collect::<StoryreelResult<Vec<_>>>()?;
        Ok(Self { layers })
    }
}
