use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::dom::{Mutation, NodeId, NodeSpec};

pub const DEFAULT_PALETTE: [&str; 4] = ["#9E7CC1", "#79589F", "#4A3171", "#FD9A69"];

/// Shape of a floating element, rendered as a CSS class
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Shape {
    Circle,
    Square,
    Triangle,
    Diamond,
}

impl Shape {
    pub const ALL: [Shape; 4] = [Shape::Circle, Shape::Square, Shape::Triangle, Shape::Diamond];
}

/// Bounds for a sampled value. Integer spans are inclusive, real spans
/// exclude `max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span<T> {
    pub min: T,
    pub max: T,
}

impl<T> Span<T> {
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }
}

impl Span<u32> {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        if self.max > self.min {
            rng.gen_range(self.min..=self.max)
        } else {
            self.min
        }
    }
}

impl Span<f64> {
    /// Width of the range; infinite when the ends are too far apart
    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.max > self.min && self.width().is_finite() {
            rng.gen_range(self.min..self.max)
        } else {
            self.min
        }
    }
}

/// Parameters for populating the hero region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub count: usize,
    pub shapes: Vec<Shape>,
    pub palette: Vec<String>,
    pub size_px: Span<u32>,
    pub position_percent: Span<f64>,
    pub duration_sec: Span<f64>,
    pub delay_sec: Span<f64>,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            count: 25,
            shapes: Shape::ALL.to_vec(),
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            size_px: Span::new(15, 55),
            position_percent: Span::new(0.0, 100.0),
            duration_sec: Span::new(7.0, 15.0),
            delay_sec: Span::new(0.0, 5.0),
        }
    }
}

/// One decorative shape; never changes after sampling
#[derive(Debug, Clone, PartialEq)]
pub struct FloatingElement {
    pub shape: Shape,
    pub color: String,
    pub size_px: u32,
    pub left_percent: f64,
    pub top_percent: f64,
    pub duration_sec: f64,
    pub delay_sec: f64,
}

impl FloatingElement {
    /// Draws every parameter independently from `cfg`
    pub fn sample<R: Rng + ?Sized>(rng: &mut R, cfg: &FieldConfig) -> Self {
        let shape = cfg
            .shapes
            .choose(rng)
            .copied()
            .or_else(|| Shape::ALL.choose(rng).copied())
            .unwrap_or(Shape::Circle);
        let color = cfg
            .palette
            .choose(rng)
            .map(String::as_str)
            .or_else(|| DEFAULT_PALETTE.choose(rng).copied())
            .unwrap_or(DEFAULT_PALETTE[0])
            .to_string();

        Self {
            shape,
            color,
            size_px: cfg.size_px.sample(rng),
            left_percent: cfg.position_percent.sample(rng),
            top_percent: cfg.position_percent.sample(rng),
            duration_sec: cfg.duration_sec.sample(rng),
            delay_sec: cfg.delay_sec.sample(rng),
        }
    }

    /// Triangles are drawn with a border trick, so they take no fill
    pub fn fill_color(&self) -> Option<&str> {
        (self.shape != Shape::Triangle).then_some(self.color.as_str())
    }

    pub fn border_color(&self) -> Option<&str> {
        (self.shape == Shape::Triangle).then_some(self.color.as_str())
    }

    pub fn to_node_spec(&self) -> NodeSpec {
        let size = format!("{}px", self.size_px);
        let mut spec = NodeSpec::new("div")
            .class("floating-element")
            .class(self.shape.to_string())
            .style("width", size.clone())
            .style("height", size);

        if let Some(fill) = self.fill_color() {
            spec = spec.style("background-color", fill);
        }
        if let Some(border) = self.border_color() {
            spec = spec.style("border-bottom-color", border);
        }

        spec.style("left", format!("{}%", self.left_percent))
            .style("top", format!("{}%", self.top_percent))
            .style("animation-duration", format!("{}s", self.duration_sec))
            .style("animation-delay", format!("{}s", self.delay_sec))
    }
}

/// Samples `cfg.count` elements in generation order
pub fn sample_field<R: Rng + ?Sized>(rng: &mut R, cfg: &FieldConfig) -> Vec<FloatingElement> {
    (0..cfg.count)
        .map(|_| FloatingElement::sample(rng, cfg))
        .collect()
}

/// Mutations that append a fresh field to `container`; empty when the
/// container is missing. Calling it again appends another field.
pub fn plan_field<R: Rng + ?Sized>(
    container: Option<NodeId>,
    cfg: &FieldConfig,
    rng: &mut R,
) -> Vec<Mutation> {
    let Some(parent) = container else {
        tracing::debug!("no hero container, skipping floating field");
        return Vec::new();
    };

    sample_field(rng, cfg)
        .iter()
        .map(|el| Mutation::AppendChild {
            parent,
            node: el.to_node_spec(),
        })
        .collect()
}
