use core::ops::Mul;

use super::Vec2;

/// 2D affine matrix, column-major `[a, b, c, d, e, f]`:
///
/// ```text
/// | a c e |
/// | b d f |
/// | 0 0 1 |
/// ```
///
/// Used to place a drawable's local geometry in the workspace before the
/// viewport transform is applied.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Affine(pub [f32; 6]);

impl Affine {
    pub const IDENTITY: Affine = Affine([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    #[inline]
    pub const fn translate(t: Vec2) -> Self {
        Affine([1.0, 0.0, 0.0, 1.0, t.x, t.y])
    }

    #[inline]
    pub const fn scale(sx: f32, sy: f32) -> Self {
        Affine([sx, 0.0, 0.0, sy, 0.0, 0.0])
    }

    /// Rotation by `radians` (clockwise on screen, since +Y is down).
    #[inline]
    pub fn rotate(radians: f32) -> Self {
        let (s, c) = radians.sin_cos();
        Affine([c, s, -s, c, 0.0, 0.0])
    }

    #[inline]
    pub fn apply(self, p: Vec2) -> Vec2 {
        let [a, b, c, d, e, f] = self.0;
        Vec2::new(a * p.x + c * p.y + e, b * p.x + d * p.y + f)
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// `lhs * rhs` applies `rhs` first.
impl Mul for Affine {
    type Output = Affine;

    fn mul(self, rhs: Affine) -> Affine {
        let [a0, b0, c0, d0, e0, f0] = self.0;
        let [a1, b1, c1, d1, e1, f1] = rhs.0;
        Affine([
            a0 * a1 + c0 * b1,
            b0 * a1 + d0 * b1,
            a0 * c1 + c0 * d1,
            b0 * c1 + d0 * d1,
            a0 * e1 + c0 * f1 + e0,
            b0 * e1 + d0 * f1 + f0,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_leaves_points_alone() {
        let p = Vec2::new(3.5, -2.0);
        assert_eq!(Affine::IDENTITY.apply(p), p);
    }

    #[test]
    fn composition_applies_right_operand_first() {
        let m = Affine::translate(Vec2::new(10.0, 0.0)) * Affine::scale(2.0, 3.0);
        assert_eq!(m.apply(Vec2::new(1.0, 1.0)), Vec2::new(12.0, 3.0));
    }

    #[test]
    fn quarter_turn_maps_x_axis_to_y_axis() {
        let p = Affine::rotate(core::f32::consts::FRAC_PI_2).apply(Vec2::new(1.0, 0.0));
        assert!(p.approx_eq(Vec2::new(0.0, 1.0), 1e-6));
    }
}
