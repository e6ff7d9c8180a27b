//! Depth-to-layer mapping.

use crate::core::error::{DomainError, Result};
use crate::core::loaders::{GroundwaterTable, Layer, LayerTable};

/// Per-sample layer attributes, structure-of-arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerAssignment {
    /// Index into the layer table for each sample.
    pub layer_index: Vec<usize>,
    /// Unit weight of the mapped layer (kN/m3).
    pub unit_weight: Vec<f64>,
    /// Groundwater depth looked up from the mapped layer's id.
    pub groundwater_depth: Vec<f64>,
}

impl LayerAssignment {
    #[inline]
    pub fn len(&self) -> usize {
        self.layer_index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layer_index.is_empty()
    }

    /// Layer record of sample `i`.
    pub fn layer<'a>(&self, table: &'a LayerTable, i: usize) -> &'a Layer {
        &table.layers()[self.layer_index[i]]
    }
}

/// Index of the layer containing each depth.
///
/// Layer `i` covers `[top_i, top_{i+1})`; the last layer covers `[top_last, +inf)`.
///
/// # Errors
///
/// `DomainError::UnmappedDepth` for a depth above the shallowest top (or NaN).
pub fn map_layers(depth: &[f64], table: &LayerTable) -> Result<Vec<usize>> {
    let layers = table.layers();
    let first_top = layers[0].top_depth;

    depth
        .iter()
        .enumerate()
        .map(|(index, &d)| {
            // Number of tops at or above d; the containing layer is the last of them
            let above = layers.partition_point(|layer| layer.top_depth <= d);
            if above == 0 || d.is_nan() {
                return Err(DomainError::UnmappedDepth {
                    index,
                    depth: d,
                    first_top,
                }
                .into());
            }
            Ok(above - 1)
        })
        .collect()
}

/// Map depths to layers and attach unit weight and groundwater depth.
///
/// # Errors
///
/// `DomainError` for an unmapped depth or a layer whose groundwater id is not in
/// `groundwater`.
pub fn assign_layers(
    depth: &[f64],
    table: &LayerTable,
    groundwater: &GroundwaterTable,
) -> Result<LayerAssignment> {
    let layer_index = map_layers(depth, table)?;

    // Resolve each layer once
    let gwt_per_layer = table
        .layers()
        .iter()
        .map(|layer| groundwater.depth_of(&layer.groundwater_id))
        .collect::<Vec<_>>();

    let mut unit_weight = Vec::with_capacity(layer_index.len());
    let mut groundwater_depth = Vec::with_capacity(layer_index.len());
    for &i in &layer_index {
        unit_weight.push(table.layers()[i].unit_weight);
        groundwater_depth.push(gwt_per_layer[i].clone()?);
    }

    Ok(LayerAssignment {
        layer_index,
        unit_weight,
        groundwater_depth,
    })
}
