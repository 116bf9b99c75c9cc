//! 1-D Gaussian kernel for the separable near/far blur.

/// Largest supported kernel radius in blur-target texels.
pub const MAX_KERNEL_RADIUS: usize = 31;
/// Number of `vec4<f32>` slots needed to hold `MAX_KERNEL_RADIUS + 1` weights.
pub const KERNEL_WEIGHT_VEC4S: usize = (MAX_KERNEL_RADIUS + 1) / 4;
/// Resolution of the blur targets relative to the viewport.
pub const DOF_TEXTURE_SCALE: f32 = 0.5;

/// Symmetric, normalized 1-D kernel. Only the non-negative half is stored.
#[derive(Clone, Debug, PartialEq)]
pub struct BlurKernel {
    weights: Vec<f32>,
}

impl BlurKernel {
    /// Gaussian with `sigma = radius / 2`, normalized so the full kernel sums to 1.
    /// Radius 0 is the identity kernel.
    pub fn gaussian(radius: usize) -> Self {
        let radius = radius.min(MAX_KERNEL_RADIUS);
        let sigma = (radius as f32 / 2.0).max(0.5);
        let denom = 2.0 * sigma * sigma;

        let mut weights: Vec<f32> = (0..=radius)
            .map(|k| (-((k * k) as f32) / denom).exp())
            .collect();
        let total = weights[0] + 2.0 * weights[1..].iter().sum::<f32>();
        for w in &mut weights {
            *w /= total;
        }
        Self { weights }
    }

    /// Kernel for a maximum CoC radius given in full-resolution pixels,
    /// applied on targets scaled by `scale`.
    pub fn for_coc_radius(max_coc_radius: f32, scale: f32) -> Self {
        let radius = (max_coc_radius.max(0.0) * scale).ceil() as usize;
        Self::gaussian(radius)
    }

    pub fn radius(&self) -> usize {
        self.weights.len() - 1
    }

    /// Weight at a signed tap offset; zero outside the kernel.
    pub fn weight(&self, offset: i32) -> f32 {
        self.weights
            .get(offset.unsigned_abs() as usize)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Weights laid out for a `array<vec4<f32>, N>` uniform.
    pub fn packed_weights(&self) -> [[f32; 4]; KERNEL_WEIGHT_VEC4S] {
        let mut packed = [[0.0; 4]; KERNEL_WEIGHT_VEC4S];
        for (k, w) in self.weights.iter().enumerate() {
            packed[k / 4][k % 4] = *w;
        }
        packed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Clamp-to-edge 1-D convolution over a single-channel image.
    fn convolve_1d(
        image: &[f32],
        width: usize,
        height: usize,
        kernel: &BlurKernel,
        horizontal: bool,
    ) -> Vec<f32> {
        let r = kernel.radius() as i32;
        let mut out = vec![0.0; image.len()];
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                let mut acc = 0.0;
                for i in -r..=r {
                    let (sx, sy) = if horizontal { (x + i, y) } else { (x, y + i) };
                    let sx = sx.clamp(0, width as i32 - 1) as usize;
                    let sy = sy.clamp(0, height as i32 - 1) as usize;
                    acc += kernel.weight(i) * image[sy * width + sx];
                }
                out[y as usize * width + x as usize] = acc;
            }
        }
        out
    }

    /// Direct 2-D convolution with the outer-product kernel.
    fn convolve_2d(image: &[f32], width: usize, height: usize, kernel: &BlurKernel) -> Vec<f32> {
        let r = kernel.radius() as i32;
        let mut out = vec![0.0; image.len()];
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                let mut acc = 0.0;
                for j in -r..=r {
                    for i in -r..=r {
                        let sx = (x + i).clamp(0, width as i32 - 1) as usize;
                        let sy = (y + j).clamp(0, height as i32 - 1) as usize;
                        acc += kernel.weight(i) * kernel.weight(j) * image[sy * width + sx];
                    }
                }
                out[y as usize * width + x as usize] = acc;
            }
        }
        out
    }

    #[test]
    fn test_weights_sum_to_one() {
        for radius in [0, 1, 4, 8, MAX_KERNEL_RADIUS] {
            let kernel = BlurKernel::gaussian(radius);
            let sum: f32 = (-(radius as i32)..=radius as i32).map(|i| kernel.weight(i)).sum();
            assert!((sum - 1.0).abs() < 1e-5, "radius {radius}: sum {sum}");
        }
    }

    #[test]
    fn test_zero_radius_is_identity() {
        let kernel = BlurKernel::gaussian(0);
        assert_eq!(kernel.weights(), &[1.0]);
        assert_eq!(kernel.weight(1), 0.0);
    }

    #[test]
    fn test_radius_follows_max_coc() {
        assert_eq!(BlurKernel::for_coc_radius(15.0, DOF_TEXTURE_SCALE).radius(), 8);
        assert_eq!(BlurKernel::for_coc_radius(4.0, DOF_TEXTURE_SCALE).radius(), 2);
        assert_eq!(BlurKernel::for_coc_radius(0.0, DOF_TEXTURE_SCALE).radius(), 0);
        assert_eq!(BlurKernel::for_coc_radius(-3.0, DOF_TEXTURE_SCALE).radius(), 0);
        assert_eq!(
            BlurKernel::for_coc_radius(1000.0, DOF_TEXTURE_SCALE).radius(),
            MAX_KERNEL_RADIUS
        );
        assert_ne!(
            BlurKernel::for_coc_radius(15.0, DOF_TEXTURE_SCALE),
            BlurKernel::for_coc_radius(20.0, DOF_TEXTURE_SCALE)
        );
    }

    #[test]
    fn test_weights_decrease_from_center() {
        let kernel = BlurKernel::gaussian(6);
        for k in 1..=6 {
            assert!(kernel.weight(k) < kernel.weight(k - 1));
            assert_eq!(kernel.weight(k), kernel.weight(-k));
        }
    }

    #[test]
    fn test_packed_weights_layout() {
        let kernel = BlurKernel::gaussian(MAX_KERNEL_RADIUS);
        let packed = kernel.packed_weights();
        assert_eq!(packed[0][1], kernel.weight(1));
        assert_eq!(packed[2][3], kernel.weight(11));
        assert_eq!(packed[KERNEL_WEIGHT_VEC4S - 1][3], kernel.weight(31));
    }

    #[test]
    fn test_separable_impulse_matches_2d_convolution() {
        let (width, height) = (25, 25);
        let mut image = vec![0.0; width * height];
        image[12 * width + 12] = 1.0;

        let kernel = BlurKernel::for_coc_radius(15.0, DOF_TEXTURE_SCALE);
        let horizontal = convolve_1d(&image, width, height, &kernel, true);
        let separable = convolve_1d(&horizontal, width, height, &kernel, false);
        let reference = convolve_2d(&image, width, height, &kernel);

        for (i, (a, b)) in separable.iter().zip(&reference).enumerate() {
            assert!((a - b).abs() < 1e-5, "texel {i}: {a} vs {b}");
        }
        let total: f32 = separable.iter().sum();
        assert!((total - 1.0).abs() < 1e-4);
    }
}
