//! Octahedral encoding of unit vectors and the canonicalized residual
//! transform used by normal prediction.
//!
//! A unit vector is projected onto the octahedron |x|+|y|+|z| = 1; the
//! lower hemisphere (x < 0) is folded over the diamond diagonal, leaving a
//! pair of coordinates (s, t) on a square grid of side `max_value + 1`.

use crate::decoder_buffer::DecoderBuffer;
use crate::encoder_buffer::EncoderBuffer;
use crate::error::{corrupt, invalid_parameter, Result};

#[derive(Debug, Clone, Copy)]
pub struct Octahedron {
    quantization_bits: u8,
    max_quantized_value: i32,
    max_value: i32,
    center_value: i32,
}

impl Octahedron {
    pub fn new(quantization_bits: u8) -> Result<Self> {
        if !(2..=30).contains(&quantization_bits) {
            return Err(invalid_parameter(format!(
                "octahedral quantization bits {quantization_bits} out of range 2-30"
            )));
        }
        let max_quantized_value = (1i32 << quantization_bits) - 1;
        let max_value = max_quantized_value - 1;
        Ok(Self {
            quantization_bits,
            max_quantized_value,
            max_value,
            center_value: max_value / 2,
        })
    }

    pub fn quantization_bits(&self) -> u8 {
        self.quantization_bits
    }

    pub fn max_quantized_value(&self) -> i32 {
        self.max_quantized_value
    }

    pub fn center_value(&self) -> i32 {
        self.center_value
    }

    pub fn write_parameters(&self, buffer: &mut EncoderBuffer) -> Result<()> {
        buffer.encode_u8(self.quantization_bits)
    }

    pub fn read_parameters(buffer: &mut DecoderBuffer) -> Result<Self> {
        let bits = buffer.decode_u8()?;
        Self::new(bits).map_err(|_| corrupt(format!("invalid octahedral bit count {bits}")))
    }

    /// Quantizes a (not necessarily unit) vector to octahedral (s, t).
    /// Zero vectors map to the +x pole.
    pub fn vector_to_coords(&self, v: [f32; 3]) -> (i32, i32) {
        let abs_sum = v[0].abs() + v[1].abs() + v[2].abs();
        let scaled = if abs_sum > 1e-6 {
            let s = 1.0 / abs_sum;
            [v[0] * s, v[1] * s, v[2] * s]
        } else {
            [1.0, 0.0, 0.0]
        };

        let mut int_vec = [0i32; 3];
        int_vec[0] = (scaled[0] * self.center_value as f32 + 0.5).floor() as i32;
        int_vec[1] = (scaled[1] * self.center_value as f32 + 0.5).floor() as i32;
        int_vec[2] = self.center_value - int_vec[0].abs() - int_vec[1].abs();
        if int_vec[2] < 0 {
            if int_vec[1] > 0 {
                int_vec[1] += int_vec[2];
            } else {
                int_vec[1] -= int_vec[2];
            }
            int_vec[2] = 0;
        }
        if scaled[2] < 0.0 {
            int_vec[2] = -int_vec[2];
        }
        self.integer_vector_to_coords(int_vec)
    }

    /// Quantized octahedral coordinates of an integer vector on the
    /// diamond |x|+|y|+|z| = center_value.
    pub fn integer_vector_to_coords(&self, v: [i32; 3]) -> (i32, i32) {
        debug_assert_eq!(v[0].abs() + v[1].abs() + v[2].abs(), self.center_value);
        let (s, t) = if v[0] >= 0 {
            (v[1] + self.center_value, v[2] + self.center_value)
        } else {
            // Folded hemisphere.
            let s = if v[1] < 0 {
                v[2].abs()
            } else {
                self.max_value - v[2].abs()
            };
            let t = if v[2] < 0 {
                v[1].abs()
            } else {
                self.max_value - v[1].abs()
            };
            (s, t)
        };
        self.canonicalize_coords(s, t)
    }

    /// Rescales an arbitrary integer vector onto the diamond.
    pub fn canonicalize_integer_vector(&self, v: &mut [i32; 3]) {
        let abs_sum = v[0].abs() as i64 + v[1].abs() as i64 + v[2].abs() as i64;
        if abs_sum == 0 {
            *v = [self.center_value, 0, 0];
        } else {
            v[0] = ((v[0] as i64 * self.center_value as i64) / abs_sum) as i32;
            v[1] = ((v[1] as i64 * self.center_value as i64) / abs_sum) as i32;
            let rest = self.center_value - v[0].abs() - v[1].abs();
            v[2] = if v[2] >= 0 { rest } else { -rest };
        }
    }

    /// Folds edge and corner cases of the diamond onto unique
    /// representatives so every direction has exactly one encoding.
    fn canonicalize_coords(&self, s: i32, t: i32) -> (i32, i32) {
        let (mut s, mut t) = (s, t);
        if (s == 0 && t == 0)
            || (s == 0 && t == self.max_value)
            || (s == self.max_value && t == 0)
        {
            s = self.max_value;
            t = self.max_value;
        } else if s == 0 && t > self.center_value {
            t = self.center_value - (t - self.center_value);
        } else if s == self.max_value && t < self.center_value {
            t = self.center_value + (self.center_value - t);
        } else if t == self.max_value && s < self.center_value {
            s = self.center_value + (self.center_value - s);
        } else if t == 0 && s > self.center_value {
            s = self.center_value - (s - self.center_value);
        }
        (s, t)
    }

    /// Inverse projection back to a unit vector.
    pub fn coords_to_unit_vector(&self, s: i32, t: i32) -> [f32; 3] {
        let scale = 2.0 / self.max_value as f32;
        let mut y = s as f32 * scale - 1.0;
        let mut z = t as f32 * scale - 1.0;
        let x = 1.0 - y.abs() - z.abs();
        if x < 0.0 {
            let offset = -x;
            y += if y < 0.0 { offset } else { -offset };
            z += if z < 0.0 { offset } else { -offset };
        }
        let norm2 = x * x + y * y + z * z;
        if norm2 < 1e-6 {
            [0.0, 0.0, 0.0]
        } else {
            let d = 1.0 / norm2.sqrt();
            [x * d, y * d, z * d]
        }
    }

    // Residual-transform helpers below operate on centered coordinates
    // (s, t in [-center, center]).

    fn in_diamond(&self, s: i32, t: i32) -> bool {
        s.abs() as u32 + t.abs() as u32 <= self.center_value as u32
    }

    /// Mirrors a point outside the diamond back inside (and vice versa).
    fn invert_diamond(&self, s: &mut i32, t: &mut i32) {
        let sign_s = if *s >= 0 && *t >= 0 {
            1
        } else if *s <= 0 && *t <= 0 {
            -1
        } else if *s > 0 {
            1
        } else {
            -1
        };
        let sign_t = if *s >= 0 && *t >= 0 {
            1
        } else if *s <= 0 && *t <= 0 {
            -1
        } else if *t > 0 {
            1
        } else {
            -1
        };

        let corner_s = (sign_s * self.center_value) as u32;
        let corner_t = (sign_t * self.center_value) as u32;
        let mut us = (*s as u32).wrapping_mul(2).wrapping_sub(corner_s);
        let mut ut = (*t as u32).wrapping_mul(2).wrapping_sub(corner_t);
        if sign_s * sign_t >= 0 {
            let tmp = us;
            us = (ut as i32).wrapping_neg() as u32;
            ut = (tmp as i32).wrapping_neg() as u32;
        } else {
            std::mem::swap(&mut us, &mut ut);
        }
        *s = us.wrapping_add(corner_s) as i32 / 2;
        *t = ut.wrapping_add(corner_t) as i32 / 2;
    }

    fn mod_max(&self, x: i32) -> i32 {
        if x > self.center_value {
            x - self.max_quantized_value
        } else if x < -self.center_value {
            x + self.max_quantized_value
        } else {
            x
        }
    }

    fn make_positive(&self, x: i32) -> i32 {
        if x < 0 {
            x + self.max_quantized_value
        } else {
            x
        }
    }

    fn in_bottom_left(p: &[i32; 2]) -> bool {
        (p[0] == 0 && p[1] == 0) || (p[0] < 0 && p[1] <= 0)
    }

    fn rotation_count(p: &[i32; 2]) -> i32 {
        match (p[0].signum(), p[1].signum()) {
            (0, 0) => 0,
            (0, 1) => 3,
            (0, -1) => 1,
            (1, -1) => 1,
            (1, _) => 2,
            (-1, 1) => 3,
            _ => 0,
        }
    }

    fn rotate(p: [i32; 2], count: i32) -> [i32; 2] {
        match count {
            1 => [p[1], -p[0]],
            2 => [-p[0], -p[1]],
            3 => [-p[1], p[0]],
            _ => p,
        }
    }

    /// Canonicalized correction between an actual and a predicted pair of
    /// octahedral coordinates. Corrections are always non-negative.
    pub fn compute_correction(&self, orig: [i32; 2], pred: [i32; 2]) -> [i32; 2] {
        let center = self.center_value;
        let mut orig = [orig[0] - center, orig[1] - center];
        let mut pred = [pred[0] - center, pred[1] - center];

        if !self.in_diamond(pred[0], pred[1]) {
            let (mut s, mut t) = (orig[0], orig[1]);
            self.invert_diamond(&mut s, &mut t);
            orig = [s, t];
            let (mut s, mut t) = (pred[0], pred[1]);
            self.invert_diamond(&mut s, &mut t);
            pred = [s, t];
        }
        if !Self::in_bottom_left(&pred) {
            let count = Self::rotation_count(&pred);
            orig = Self::rotate(orig, count);
            pred = Self::rotate(pred, count);
        }
        [
            self.make_positive(orig[0] - pred[0]),
            self.make_positive(orig[1] - pred[1]),
        ]
    }

    /// Inverse of [`compute_correction`](Self::compute_correction).
    pub fn apply_correction(&self, pred: [i32; 2], corr: [i32; 2]) -> [i32; 2] {
        let center = self.center_value;
        let mut pred = [pred[0] - center, pred[1] - center];

        let pred_in_diamond = self.in_diamond(pred[0], pred[1]);
        if !pred_in_diamond {
            let (mut s, mut t) = (pred[0], pred[1]);
            self.invert_diamond(&mut s, &mut t);
            pred = [s, t];
        }
        let pred_in_bottom_left = Self::in_bottom_left(&pred);
        let count = Self::rotation_count(&pred);
        if !pred_in_bottom_left {
            pred = Self::rotate(pred, count);
        }

        let mut orig = [
            self.mod_max(pred[0].wrapping_add(corr[0])),
            self.mod_max(pred[1].wrapping_add(corr[1])),
        ];
        if !pred_in_bottom_left {
            orig = Self::rotate(orig, (4 - count) % 4);
        }
        if !pred_in_diamond {
            let (mut s, mut t) = (orig[0], orig[1]);
            self.invert_diamond(&mut s, &mut t);
            orig = [s, t];
        }
        [orig[0] + center, orig[1] + center]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
        a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
    }

    fn sample_directions() -> Vec<[f32; 3]> {
        let mut dirs = vec![
            [1.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, -1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, -1.0],
        ];
        for i in 0..64 {
            let theta = (i as f32 * 0.7).sin() * std::f32::consts::PI;
            let phi = i as f32 * 0.37;
            dirs.push([
                theta.sin() * phi.cos(),
                theta.sin() * phi.sin(),
                theta.cos(),
            ]);
        }
        dirs
    }

    #[test]
    fn roundtrip_angle_error_is_bounded() {
        let oct = Octahedron::new(10).unwrap();
        // The projection error at q bits stays within a few grid steps,
        // each about 2^(1-q) radians.
        let max_err = 2.0f32.powi(1 - 10);
        for dir in sample_directions() {
            let n = dot(dir, dir).sqrt();
            if n < 1e-6 {
                continue;
            }
            let unit = [dir[0] / n, dir[1] / n, dir[2] / n];
            let (s, t) = oct.vector_to_coords(unit);
            let restored = oct.coords_to_unit_vector(s, t);
            let cos = dot(unit, restored).clamp(-1.0, 1.0);
            assert!(cos.acos() <= max_err * 4.0, "direction {unit:?} error {}", cos.acos());
        }
    }

    #[test]
    fn zero_vector_is_encodable() {
        let oct = Octahedron::new(8).unwrap();
        let (s, t) = oct.vector_to_coords([0.0, 0.0, 0.0]);
        let v = oct.coords_to_unit_vector(s, t);
        // Encodes as the +x pole.
        assert!(v[0] > 0.99);
    }

    #[test]
    fn correction_transform_roundtrip() {
        let oct = Octahedron::new(6).unwrap();
        // Canonical coordinate pairs, as produced by actual projections.
        let coords: Vec<[i32; 2]> = sample_directions()
            .into_iter()
            .map(|v| {
                let (s, t) = oct.vector_to_coords(v);
                [s, t]
            })
            .collect();
        for &orig in &coords {
            for &pred in coords.iter().step_by(3) {
                let corr = oct.compute_correction(orig, pred);
                assert!(corr[0] >= 0 && corr[1] >= 0);
                let restored = oct.apply_correction(pred, corr);
                assert_eq!(restored, orig, "orig {orig:?} pred {pred:?}");
            }
        }
    }

    #[test]
    fn bit_range_is_checked() {
        assert!(Octahedron::new(1).is_err());
        assert!(Octahedron::new(31).is_err());
        assert!(Octahedron::new(10).is_ok());
    }
}
