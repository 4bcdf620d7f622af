//! Per-size layer compositing.
//!
//! One size is rendered by building a *stencil* (the mask sized and placed on
//! the final canvas), deriving a fill layer and a handful of shadow layers
//! from it, and laying those over the epoch's template image in the order the
//! epoch's [`Recipe`] prescribes.
//!
//! # Architecture
//!
//! Each layer implements [`LayerEffect`], which turns the shared stencil into
//! one finished RGBA layer. [`Compositor`] owns the ordered list of effects
//! for one size and applies them to a [`RenderContext`].

pub mod primitives;
pub mod svg;

use image::RgbaImage;
use palette::Srgb;
use tracing::debug;

use crate::icon::SizePx;
use crate::style::{LayerRole, Recipe, ShadowSpec, SizeSpec};
use primitives::CompositeMode;

// ============================================================================
// Render Context
// ============================================================================

/// State that flows through one size's render.
pub struct RenderContext {
    /// The image being built up, starting from the template.
    pub image: RgbaImage,

    /// Alignment reference shared by every layer.
    stencil: RgbaImage,
}

impl RenderContext {
    pub fn new(template: RgbaImage, stencil: RgbaImage) -> Self {
        Self {
            image: template,
            stencil,
        }
    }

    pub fn stencil(&self) -> &RgbaImage {
        &self.stencil
    }
}

/// Sizes and places a prepared mask on a `spec.canvas()` square.
pub fn sized_stencil(prepared: &RgbaImage, spec: &SizeSpec) -> RgbaImage {
    let fitted = primitives::resize_to_fit(prepared, spec.mask);
    let canvas = SizePx::new(spec.canvas(), spec.canvas());
    primitives::extend_with_offset(&fitted, canvas, spec.offset_y)
}

// ============================================================================
// Layer Effects
// ============================================================================

/// Callback receiving each named intermediate of a render.
pub type Trace<'a> = &'a mut dyn FnMut(&str, &RgbaImage);

/// Name of the stencil step.
pub const STENCIL_STEP: &str = "1.0_SIZED_MASK";

/// A layer derived from the stencil.
pub trait LayerEffect: Send + Sync {
    fn role(&self) -> LayerRole;

    /// Produces the finished layer, opacity already applied, reporting every
    /// intermediate to `trace` as `<n>.<k>_<LAYER>_<STEP>`.
    fn render_traced(&self, stencil: &RgbaImage, trace: Trace<'_>) -> RgbaImage;

    fn render(&self, stencil: &RgbaImage) -> RgbaImage {
        self.render_traced(stencil, &mut |_, _| {})
    }
}

fn step_name(role: LayerRole, index: u32, step: &str) -> String {
    let (group, name) = role.step_group();
    if step.is_empty() {
        format!("{group}.{index}_{name}")
    } else {
        format!("{group}.{index}_{name}_{step}")
    }
}

/// The tinted body of the silhouette.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillLayer {
    pub color: Srgb<u8>,
    pub opacity: f32,
}

impl LayerEffect for FillLayer {
    fn role(&self) -> LayerRole {
        LayerRole::Fill
    }

    fn render_traced(&self, stencil: &RgbaImage, trace: Trace<'_>) -> RgbaImage {
        let colorized = primitives::colorize(stencil, self.color);
        trace(&step_name(LayerRole::Fill, 1, "COLORIZED"), &colorized);
        let layer = primitives::alpha_scale(&colorized, self.opacity);
        trace(&step_name(LayerRole::Fill, 2, ""), &layer);
        layer
    }
}

/// A blurred, displaced copy of the stencil clipped back against it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowLayer {
    pub spec: ShadowSpec,
}

impl LayerEffect for ShadowLayer {
    fn role(&self) -> LayerRole {
        self.spec.role
    }

    fn render_traced(&self, stencil: &RgbaImage, trace: Trace<'_>) -> RgbaImage {
        let role = self.spec.role;
        let colorized = primitives::colorize(stencil, self.spec.color);
        trace(&step_name(role, 1, "COLORIZED"), &colorized);
        let mut clipped =
            primitives::directional_blur(&colorized, self.spec.blur, self.spec.offset_y);
        trace(&step_name(role, 2, "BLURRED"), &clipped);
        primitives::composite(&mut clipped, stencil, self.spec.clip);
        trace(&step_name(role, 3, "MASKED"), &clipped);
        let layer = primitives::alpha_scale(&clipped, self.spec.opacity);
        trace(&step_name(role, 4, "SHADOW"), &layer);
        layer
    }
}

// ============================================================================
// Compositor
// ============================================================================

/// The ordered layer stack for one size.
pub struct Compositor {
    layers: Vec<Box<dyn LayerEffect>>,
}

impl Compositor {
    /// Builds the stack for `spec`, ordered back to front per `recipe.order`.
    pub fn new(recipe: &Recipe, spec: &SizeSpec) -> Self {
        let mut layers: Vec<Box<dyn LayerEffect>> = Vec::with_capacity(recipe.order.len());
        for role in recipe.order {
            match role {
                LayerRole::Fill => layers.push(Box::new(FillLayer {
                    color: recipe.fill,
                    opacity: recipe.fill_opacity,
                })),
                other => match spec.shadow(*other) {
                    Some(shadow) => layers.push(Box::new(ShadowLayer { spec: *shadow })),
                    None => debug!(role = other.label(), size = %spec.name, "no layer for role"),
                },
            }
        }
        Self { layers }
    }

    pub fn roles(&self) -> Vec<LayerRole> {
        self.layers.iter().map(|l| l.role()).collect()
    }

    /// Applies every layer to the context in order.
    pub fn render(&self, ctx: &mut RenderContext) {
        self.render_traced(ctx, &mut |_, _| {});
    }

    /// Like [`render`](Self::render), reporting each layer's intermediates.
    pub fn render_traced(&self, ctx: &mut RenderContext, trace: Trace<'_>) {
        for layer in &self.layers {
            debug!(role = layer.role().label(), "compositing layer");
            let rendered = layer.render_traced(ctx.stencil(), &mut *trace);
            primitives::composite(&mut ctx.image, &rendered, CompositeMode::OVER);
        }
    }
}

/// Renders one size: stencil, layers, then the final composite over `template`.
///
/// `template` must already be `spec.canvas()` pixels square.
pub fn render_size(
    template: RgbaImage,
    prepared: &RgbaImage,
    recipe: &Recipe,
    spec: &SizeSpec,
) -> RgbaImage {
    render_size_traced(template, prepared, recipe, spec, &mut |_, _| {})
}

/// [`render_size`] with every numbered intermediate passed to `trace`.
pub fn render_size_traced(
    template: RgbaImage,
    prepared: &RgbaImage,
    recipe: &Recipe,
    spec: &SizeSpec,
    trace: Trace<'_>,
) -> RgbaImage {
    let stencil = sized_stencil(prepared, spec);
    trace(STENCIL_STEP, &stencil);
    let mut ctx = RenderContext::new(template, stencil);
    Compositor::new(recipe, spec).render_traced(&mut ctx, trace);
    ctx.image
}

// ============================================================================
// Tests
// ============================================================================
