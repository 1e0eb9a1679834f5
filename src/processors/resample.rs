//! Bilinear resampling of heatmap tensors.
//!
//! Uses half-pixel centres (`align_corners = false`): destination pixel `d`
//! samples source coordinate `(d + 0.5) * in / out - 0.5`, clamped at the
//! low edge.

use ndarray::{Array2, Array4, ArrayView2, Axis, Zip};
use rayon::prelude::*;

use crate::core::Tensor4D;
use crate::core::errors::{PipelineError, PipelineResult, SimpleError};

/// Precomputed source indices and weights along one axis.
#[derive(Debug, Clone)]
struct AxisTaps {
    lo: Vec<usize>,
    hi: Vec<usize>,
    frac: Vec<f32>,
}

impl AxisTaps {
    fn new(input: usize, output: usize) -> Self {
        let scale = input as f32 / output as f32;
        let mut lo = Vec::with_capacity(output);
        let mut hi = Vec::with_capacity(output);
        let mut frac = Vec::with_capacity(output);
        for d in 0..output {
            let src = ((d as f32 + 0.5) * scale - 0.5).max(0.0);
            let i0 = (src.floor() as usize).min(input - 1);
            let i1 = (i0 + 1).min(input - 1);
            lo.push(i0);
            hi.push(i1);
            frac.push(src - i0 as f32);
        }
        Self { lo, hi, frac }
    }
}

fn resize_plane(plane: ArrayView2<'_, f32>, rows: &AxisTaps, cols: &AxisTaps) -> Array2<f32> {
    Array2::from_shape_fn((rows.lo.len(), cols.lo.len()), |(y, x)| {
        let (y0, y1, fy) = (rows.lo[y], rows.hi[y], rows.frac[y]);
        let (x0, x1, fx) = (cols.lo[x], cols.hi[x], cols.frac[x]);
        let top = plane[[y0, x0]] * (1.0 - fx) + plane[[y0, x1]] * fx;
        let bottom = plane[[y1, x0]] * (1.0 - fx) + plane[[y1, x1]] * fx;
        top * (1.0 - fy) + bottom * fy
    })
}

/// Resizes every `[n, c]` plane of `input` to `height` x `width`.
///
/// Returns the input unchanged (moved, not copied) when it already has the
/// requested spatial size.
pub fn resize_bilinear(input: Tensor4D, height: usize, width: usize) -> PipelineResult<Tensor4D> {
    let (n, c, in_h, in_w) = input.dim();
    if (in_h, in_w) == (height, width) {
        return Ok(input);
    }
    if in_h == 0 || in_w == 0 || height == 0 || width == 0 {
        return Err(PipelineError::resample(
            &format!("cannot resample {in_h}x{in_w} heatmaps to {height}x{width}"),
            SimpleError::new("zero-sized spatial dimension"),
        ));
    }

    let rows = AxisTaps::new(in_h, height);
    let cols = AxisTaps::new(in_w, width);

    let mut output = Array4::<f32>::zeros((n, c, height, width));
    output
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(input.axis_iter(Axis(0)).into_par_iter())
        .for_each(|(mut out_tile, in_tile)| {
            for (mut out_plane, in_plane) in out_tile
                .axis_iter_mut(Axis(0))
                .zip(in_tile.axis_iter(Axis(0)))
            {
                let resized = resize_plane(in_plane, &rows, &cols);
                Zip::from(&mut out_plane)
                    .and(&resized)
                    .for_each(|o, &v| *o = v);
            }
        });

    Ok(output)
}
