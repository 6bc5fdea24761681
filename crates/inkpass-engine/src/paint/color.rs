/// Linear premultiplied RGBA color.
///
/// Invariant:
/// - `rgb` components are expected to be multiplied by `a` (premultiplied alpha).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Color {
    pub r: f32, // premultiplied
    pub g: f32, // premultiplied
    pub b: f32, // premultiplied
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::from_premul(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::from_premul(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Color = Color::from_premul(0.0, 0.0, 0.0, 0.0);

    /// Creates a premultiplied color from premultiplied components.
    #[inline]
    pub const fn from_premul(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates a premultiplied color from straight alpha components.
    #[inline]
    pub fn from_straight(r: f32, g: f32, b: f32, a: f32) -> Self {
        let a = a.clamp(0.0, 1.0);
        Self {
            r: r.clamp(0.0, 1.0) * a,
            g: g.clamp(0.0, 1.0) * a,
            b: b.clamp(0.0, 1.0) * a,
            a,
        }
    }

    /// Creates a premultiplied color from straight sRGB bytes (`0`–`255`).
    #[inline]
    pub fn from_srgb_u8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::from_straight(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, a as f32 / 255.0)
    }

    /// Returns the color with every channel scaled by `alpha`.
    #[inline]
    pub fn with_opacity(self, alpha: f32) -> Self {
        let k = alpha.clamp(0.0, 1.0);
        Self { r: self.r * k, g: self.g * k, b: self.b * k, a: self.a * k }
    }

    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Per-channel comparison: every channel must differ by strictly less
    /// than `eps`. A difference of exactly `eps` is not equal, and NaN never is.
    #[inline]
    pub fn approx_eq(self, other: Color, eps: f32) -> bool {
        (self.r - other.r).abs() < eps
            && (self.g - other.g).abs() < eps
            && (self.b - other.b).abs() < eps
            && (self.a - other.a).abs() < eps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_alpha_is_premultiplied() {
        let c = Color::from_straight(1.0, 0.5, 0.0, 0.5);
        assert_eq!(c, Color::from_premul(0.5, 0.25, 0.0, 0.5));
    }

    #[test]
    fn approx_eq_is_strict_at_the_boundary() {
        let eps = 1.0 / 256.0;
        let base = Color::from_premul(0.5, 0.5, 0.5, 1.0);
        let edge = Color::from_premul(0.5 + eps, 0.5, 0.5, 1.0);
        let near = Color::from_premul(0.5 + eps / 2.0, 0.5, 0.5, 1.0);
        assert!(!base.approx_eq(edge, eps));
        assert!(base.approx_eq(near, eps));
    }

    #[test]
    fn nan_is_never_approx_equal() {
        let c = Color::from_premul(f32::NAN, 0.0, 0.0, 1.0);
        assert!(!c.approx_eq(c, 1.0));
    }
}
