//! Reference int8 convolution for hand-checking traced `CONV_2D` outputs.
//!
//! Feed it the input snapshot, the constant weights and biases from the
//! graph description and the per-channel fixed-point multipliers, then look
//! at the result next to the output snapshot of the same operator.

use crate::{Error, Result};

/// Largest right shift a fixed-point multiplier may carry
const MAX_SHIFT: u32 = 63;

/// Shape and quantization parameters of one int8 convolution.
///
/// Input is HWC, weights are OHWI, output is HWC. There is no padding
/// field: only valid (unpadded) windows are computed.
#[derive(Debug, Clone)]
pub struct Conv2dParams {
    pub input_h: usize,
    pub input_w: usize,
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_h: usize,
    pub kernel_w: usize,
    pub stride_h: usize,
    pub stride_w: usize,
    pub input_zero_point: i32,
    pub output_zero_point: i32,
    /// One per output channel
    pub weight_zero_points: Vec<i32>,
    /// `(M, n)` per output channel: the real multiplier is `M / 2^n`,
    /// with `M >= 0` and `n <= 63`
    pub multipliers: Vec<(i32, u32)>,
}

impl Conv2dParams {
    /// Output height and width for valid padding
    pub fn output_shape(&self) -> (usize, usize) {
        let sweeps = |input: usize, kernel: usize, stride: usize| {
            if input < kernel || stride == 0 {
                0
            } else {
                (input - kernel) / stride + 1
            }
        };
        (
            sweeps(self.input_h, self.kernel_h, self.stride_h),
            sweeps(self.input_w, self.kernel_w, self.stride_w),
        )
    }

    fn check(&self, input: &[i8], weights: &[i8], biases: &[i32]) -> Result<()> {
        if self.stride_h == 0 || self.stride_w == 0 {
            return Err(Error::InvalidModel("conv2d stride must be positive".to_string()));
        }

        let expect = |what: &str, got: usize, want: usize| {
            if got == want {
                Ok(())
            } else {
                Err(Error::DataConversion(format!(
                    "conv2d {}: expected {} elements, got {}",
                    what, want, got
                )))
            }
        };
        expect(
            "input",
            input.len(),
            self.input_h * self.input_w * self.in_channels,
        )?;
        expect(
            "weights",
            weights.len(),
            self.out_channels * self.kernel_h * self.kernel_w * self.in_channels,
        )?;
        expect("biases", biases.len(), self.out_channels)?;
        expect(
            "weight zero points",
            self.weight_zero_points.len(),
            self.out_channels,
        )?;
        expect("multipliers", self.multipliers.len(), self.out_channels)?;

        for (oc, &(multiplier, shift)) in self.multipliers.iter().enumerate() {
            if multiplier < 0 || shift > MAX_SHIFT {
                return Err(Error::InvalidModel(format!(
                    "conv2d channel {}: multiplier ({}, {}) needs M >= 0 and n <= {}",
                    oc, multiplier, shift, MAX_SHIFT
                )));
            }
        }
        Ok(())
    }
}

/// Run a valid-padding int8 convolution.
///
/// Per output element: accumulate `(x - input_zp) * (w - weight_zp[oc])`,
/// add the bias, rescale with `(acc * M + 2^(n-1)) >> n`, add the output
/// zero point and clamp to `[-128, 127]`.
pub fn conv2d_valid(
    params: &Conv2dParams,
    input: &[i8],
    weights: &[i8],
    biases: &[i32],
) -> Result<Vec<i8>> {
    params.check(input, weights, biases)?;

    let (out_h, out_w) = params.output_shape();
    let cin = params.in_channels;
    let cout = params.out_channels;
    let mut output = vec![0i8; out_h * out_w * cout];

    for oc in 0..cout {
        let weight_zp = params.weight_zero_points[oc];
        let (multiplier, shift) = params.multipliers[oc];

        for oy in 0..out_h {
            for ox in 0..out_w {
                let mut acc: i64 = 0;

                for ky in 0..params.kernel_h {
                    for kx in 0..params.kernel_w {
                        let iy = oy * params.stride_h + ky;
                        let ix = ox * params.stride_w + kx;
                        let in_base = (iy * params.input_w + ix) * cin;
                        let w_base = ((oc * params.kernel_h + ky) * params.kernel_w + kx) * cin;

                        for ic in 0..cin {
                            let x = input[in_base + ic] as i64 - params.input_zero_point as i64;
                            let w = weights[w_base + ic] as i64 - weight_zp as i64;
                            acc += x * w;
                        }
                    }
                }

                acc += biases[oc] as i64;
                let scaled = rescale(acc, multiplier, shift) + params.output_zero_point as i64;
                output[(oy * out_w + ox) * cout + oc] =
                    scaled.clamp(i8::MIN as i64, i8::MAX as i64) as i8;
            }
        }
    }

    Ok(output)
}

/// `(acc * M + 2^(n-1)) >> n`; no rounding term when `n == 0`
fn rescale(acc: i64, multiplier: i32, shift: u32) -> i64 {
    let product = acc as i128 * multiplier as i128;
    let rounding = if shift == 0 { 0 } else { 1i128 << (shift - 1) };
    ((product + rounding) >> shift) as i64
}
