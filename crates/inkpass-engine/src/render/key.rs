use crate::coords::Vec2;
use crate::paint::Color;

use super::ImageHandle;
use super::mask::MaskBindings;

/// Bare pass-family tag: one per pipeline program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum PassFamily {
    Flat,
    Textured,
    TexturedVertexColor,
    ToneOverlay,
    GrayDisabled,
    AlphaToWhite,
    SpriteAdditive,
    SpriteOutline,
    SpriteSilhouette,
    MaskWriteColor,
    MaskWriteAlpha,
    Masked,
    MaskedAlphaOnly,
    Clipped,
    MaskedGray,
    MaskedTone,
}

impl PassFamily {
    pub const ALL: [PassFamily; 16] = [
        PassFamily::Flat,
        PassFamily::Textured,
        PassFamily::TexturedVertexColor,
        PassFamily::ToneOverlay,
        PassFamily::GrayDisabled,
        PassFamily::AlphaToWhite,
        PassFamily::SpriteAdditive,
        PassFamily::SpriteOutline,
        PassFamily::SpriteSilhouette,
        PassFamily::MaskWriteColor,
        PassFamily::MaskWriteAlpha,
        PassFamily::Masked,
        PassFamily::MaskedAlphaOnly,
        PassFamily::Clipped,
        PassFamily::MaskedGray,
        PassFamily::MaskedTone,
    ];

    /// Stable numeric code handed to programs.
    #[inline]
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Families that write into an off-screen mask target.
    #[inline]
    pub fn writes_mask(self) -> bool {
        matches!(self, PassFamily::MaskWriteColor | PassFamily::MaskWriteAlpha)
    }
}

/// Specialized sprite programs.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SpriteKind {
    Additive,
    Outline,
    Silhouette,
}

/// Program used to draw geometry that consumes received masks.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MaskedVariant {
    Textured,
    AlphaOnly,
    Clipped,
    Gray,
    Tone,
}

/// Tone-overlay / outline parameters.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Overlay {
    pub thickness: f32,
    pub shape_ratio: f32,
    pub offset: Vec2,
}

/// Per-parameter tolerances for merging consecutive passes.
///
/// The defaults are exact binary fractions so boundary comparisons are
/// reproducible.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Tolerances {
    pub color: f32,
    pub vertex_color_ratio: f32,
    pub thickness: f32,
    pub shape_ratio: f32,
    pub offset: f32,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            color: 1.0 / 256.0,
            vertex_color_ratio: 1.0 / 256.0,
            thickness: 1.0 / 64.0,
            shape_ratio: 1.0 / 1024.0,
            offset: 1.0 / 64.0,
        }
    }
}

/// Pipeline state requested by a drawable: a family plus the parameters
/// that family reads.
#[derive(Debug, Clone, PartialEq)]
pub enum PassKey {
    Flat {
        tint: Color,
    },
    Textured {
        tint: Color,
        image: ImageHandle,
    },
    TexturedVertexColor {
        tint: Color,
        image: ImageHandle,
        vertex_color_ratio: f32,
    },
    ToneOverlay {
        tint: Color,
        image: ImageHandle,
        overlay: Overlay,
    },
    GrayDisabled {
        tint: Color,
        image: ImageHandle,
    },
    AlphaToWhite {
        tint: Color,
        image: ImageHandle,
    },
    Sprite {
        kind: SpriteKind,
        tint: Color,
        image: ImageHandle,
        overlay: Overlay,
    },
    /// Writes into the active mask target.
    MaskWrite {
        alpha_only: bool,
        tint: Color,
        image: Option<ImageHandle>,
    },
    /// Reads received masks while drawing to the output.
    Masked {
        variant: MaskedVariant,
        tint: Color,
        image: Option<ImageHandle>,
        overlay: Overlay,
        bindings: MaskBindings,
    },
}

impl PassKey {
    pub fn family(&self) -> PassFamily {
        match self {
            PassKey::Flat { .. } => PassFamily::Flat,
            PassKey::Textured { .. } => PassFamily::Textured,
            PassKey::TexturedVertexColor { .. } => PassFamily::TexturedVertexColor,
            PassKey::ToneOverlay { .. } => PassFamily::ToneOverlay,
            PassKey::GrayDisabled { .. } => PassFamily::GrayDisabled,
            PassKey::AlphaToWhite { .. } => PassFamily::AlphaToWhite,
            PassKey::Sprite { kind, .. } => match kind {
                SpriteKind::Additive => PassFamily::SpriteAdditive,
                SpriteKind::Outline => PassFamily::SpriteOutline,
                SpriteKind::Silhouette => PassFamily::SpriteSilhouette,
            },
            PassKey::MaskWrite { alpha_only: false, .. } => PassFamily::MaskWriteColor,
            PassKey::MaskWrite { alpha_only: true, .. } => PassFamily::MaskWriteAlpha,
            PassKey::Masked { variant, .. } => match variant {
                MaskedVariant::Textured => PassFamily::Masked,
                MaskedVariant::AlphaOnly => PassFamily::MaskedAlphaOnly,
                MaskedVariant::Clipped => PassFamily::Clipped,
                MaskedVariant::Gray => PassFamily::MaskedGray,
                MaskedVariant::Tone => PassFamily::MaskedTone,
            },
        }
    }

    pub fn tint(&self) -> Color {
        match self {
            PassKey::Flat { tint }
            | PassKey::Textured { tint, .. }
            | PassKey::TexturedVertexColor { tint, .. }
            | PassKey::ToneOverlay { tint, .. }
            | PassKey::GrayDisabled { tint, .. }
            | PassKey::AlphaToWhite { tint, .. }
            | PassKey::Sprite { tint, .. }
            | PassKey::MaskWrite { tint, .. }
            | PassKey::Masked { tint, .. } => *tint,
        }
    }

    pub fn image(&self) -> Option<ImageHandle> {
        match self {
            PassKey::Flat { .. } => None,
            PassKey::Textured { image, .. }
            | PassKey::TexturedVertexColor { image, .. }
            | PassKey::ToneOverlay { image, .. }
            | PassKey::GrayDisabled { image, .. }
            | PassKey::AlphaToWhite { image, .. }
            | PassKey::Sprite { image, .. } => Some(*image),
            PassKey::MaskWrite { image, .. } | PassKey::Masked { image, .. } => *image,
        }
    }

    /// Replaces the bound image, if this family binds one.
    ///
    /// Flat passes are untouched; optional-image families gain the image.
    pub fn with_image(mut self, new_image: ImageHandle) -> Self {
        match &mut self {
            PassKey::Flat { .. } => {}
            PassKey::Textured { image, .. }
            | PassKey::TexturedVertexColor { image, .. }
            | PassKey::ToneOverlay { image, .. }
            | PassKey::GrayDisabled { image, .. }
            | PassKey::AlphaToWhite { image, .. }
            | PassKey::Sprite { image, .. } => *image = new_image,
            PassKey::MaskWrite { image, .. } | PassKey::Masked { image, .. } => {
                *image = Some(new_image)
            }
        }
        self
    }

    pub fn overlay(&self) -> Option<Overlay> {
        match self {
            PassKey::ToneOverlay { overlay, .. }
            | PassKey::Sprite { overlay, .. }
            | PassKey::Masked { overlay, .. } => Some(*overlay),
            _ => None,
        }
    }

    pub fn vertex_color_ratio(&self) -> f32 {
        match self {
            PassKey::TexturedVertexColor { vertex_color_ratio, .. } => *vertex_color_ratio,
            _ => 0.0,
        }
    }

    pub fn mask_bindings(&self) -> Option<&MaskBindings> {
        match self {
            PassKey::Masked { bindings, .. } => Some(bindings),
            _ => None,
        }
    }

    /// Keys that imply a render-target switch; they never share a batch.
    #[inline]
    pub fn is_merge_barrier(&self) -> bool {
        matches!(self, PassKey::MaskWrite { .. } | PassKey::Masked { .. })
    }

    #[inline]
    pub fn is_compatible_with(&self, other: &PassKey, tol: &Tolerances) -> bool {
        keys_compatible(self, other, tol)
    }
}

/// Whether a pass open with `a` can keep accepting geometry requested with `b`.
///
/// Same family tag; tints within `tol.color`; images by identity; scalar
/// parameters each within their own tolerance. Keys carrying mask or clip
/// bindings never merge.
pub fn keys_compatible(a: &PassKey, b: &PassKey, tol: &Tolerances) -> bool {
    if a.family() != b.family() || a.is_merge_barrier() || b.is_merge_barrier() {
        return false;
    }
    if !a.tint().approx_eq(b.tint(), tol.color) || a.image() != b.image() {
        return false;
    }
    if !within(a.vertex_color_ratio(), b.vertex_color_ratio(), tol.vertex_color_ratio) {
        return false;
    }
    match (a.overlay(), b.overlay()) {
        (Some(oa), Some(ob)) => overlays_compatible(&oa, &ob, tol),
        (None, None) => true,
        _ => false,
    }
}

fn overlays_compatible(a: &Overlay, b: &Overlay, tol: &Tolerances) -> bool {
    within(a.thickness, b.thickness, tol.thickness)
        && within(a.shape_ratio, b.shape_ratio, tol.shape_ratio)
        && within(a.offset.x, b.offset.x, tol.offset)
        && within(a.offset.y, b.offset.y, tol.offset)
}

#[inline]
fn within(a: f32, b: f32, eps: f32) -> bool {
    (a - b).abs() < eps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::mask::MaskBindings;

    const A: ImageHandle = ImageHandle(1);
    const B: ImageHandle = ImageHandle(2);

    fn textured(tint: Color, image: ImageHandle) -> PassKey {
        PassKey::Textured { tint, image }
    }

    fn tone(thickness: f32, shape_ratio: f32) -> PassKey {
        PassKey::ToneOverlay {
            tint: Color::WHITE,
            image: A,
            overlay: Overlay { thickness, shape_ratio, offset: Vec2::zero() },
        }
    }

    // ── family tag ────────────────────────────────────────────────────────

    #[test]
    fn different_families_never_merge() {
        let tol = Tolerances::default();
        let a = textured(Color::WHITE, A);
        let b = PassKey::GrayDisabled { tint: Color::WHITE, image: A };
        assert!(!keys_compatible(&a, &b, &tol));
    }

    #[test]
    fn sprite_kinds_are_distinct_families() {
        let sprite = |kind| PassKey::Sprite { kind, tint: Color::WHITE, image: A, overlay: Overlay::default() };
        let tol = Tolerances::default();
        assert!(keys_compatible(&sprite(SpriteKind::Outline), &sprite(SpriteKind::Outline), &tol));
        assert!(!keys_compatible(&sprite(SpriteKind::Outline), &sprite(SpriteKind::Additive), &tol));
    }

    #[test]
    fn every_family_has_a_distinct_code() {
        let codes: std::collections::HashSet<u32> = PassFamily::ALL.iter().map(|f| f.code()).collect();
        assert_eq!(codes.len(), PassFamily::ALL.len());
    }

    // ── colors ────────────────────────────────────────────────────────────

    #[test]
    fn color_at_exact_epsilon_is_consistently_incompatible() {
        let tol = Tolerances::default();
        let base = textured(Color::from_premul(0.5, 0.5, 0.5, 1.0), A);
        let edge = textured(Color::from_premul(0.5, 0.5 + tol.color, 0.5, 1.0), A);
        let inside = textured(Color::from_premul(0.5, 0.5 + tol.color / 2.0, 0.5, 1.0), A);

        for _ in 0..100 {
            assert!(!keys_compatible(&base, &edge, &tol));
            assert!(!keys_compatible(&edge, &base, &tol));
            assert!(keys_compatible(&base, &inside, &tol));
        }
    }

    // ── images ────────────────────────────────────────────────────────────

    #[test]
    fn images_compare_by_identity() {
        let tol = Tolerances::default();
        assert!(keys_compatible(&textured(Color::WHITE, A), &textured(Color::WHITE, A), &tol));
        assert!(!keys_compatible(&textured(Color::WHITE, A), &textured(Color::WHITE, B), &tol));
    }

    #[test]
    fn with_image_rebinds_textured_and_ignores_flat() {
        assert_eq!(textured(Color::WHITE, A).with_image(B).image(), Some(B));
        assert_eq!(PassKey::Flat { tint: Color::WHITE }.with_image(B).image(), None);
    }

    // ── scalar parameters ─────────────────────────────────────────────────

    #[test]
    fn overlay_parameters_use_their_own_tolerances() {
        let tol = Tolerances::default();
        // Shape ratio tolerance is far tighter than thickness tolerance.
        assert!(keys_compatible(&tone(2.0, 0.5), &tone(2.0 + 1.0 / 128.0, 0.5), &tol));
        assert!(!keys_compatible(&tone(2.0, 0.5), &tone(2.0, 0.5 + 1.0 / 128.0), &tol));
    }

    #[test]
    fn vertex_color_ratio_is_compared() {
        let tol = Tolerances::default();
        let k = |r| PassKey::TexturedVertexColor { tint: Color::WHITE, image: A, vertex_color_ratio: r };
        assert!(keys_compatible(&k(0.25), &k(0.25), &tol));
        assert!(!keys_compatible(&k(0.25), &k(0.5), &tol));
    }

    // ── barriers ──────────────────────────────────────────────────────────

    #[test]
    fn mask_keys_never_merge_even_with_themselves() {
        let tol = Tolerances::default();
        let write = PassKey::MaskWrite { alpha_only: true, tint: Color::WHITE, image: None };
        let masked = PassKey::Masked {
            variant: MaskedVariant::Textured,
            tint: Color::WHITE,
            image: Some(A),
            overlay: Overlay::default(),
            bindings: MaskBindings::default(),
        };
        assert!(!keys_compatible(&write, &write.clone(), &tol));
        assert!(!keys_compatible(&masked, &masked.clone(), &tol));
        assert_eq!(write.family(), PassFamily::MaskWriteAlpha);
        assert!(write.family().writes_mask());
    }
}
