use std::f64::consts::PI;
use std::time::Duration;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::dom::{Document, Node, NodeId};
use crate::floating::Shape;

const HORIZONTAL_MARGIN: u16 = 4;
const BIO_LINES: u16 = 4;
const LINK_GAP: u16 = 3;

/// Screen regions of the preview
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewLayout {
    pub field: Rect,
    pub title: Rect,
    pub bio: Rect,
    pub links: Rect,
    pub legend: Rect,
}

impl PreviewLayout {
    pub fn new(area: Rect) -> Self {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),
                Constraint::Length(1),
                Constraint::Length(BIO_LINES),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(area);

        let inset = |r: Rect| {
            Layout::default()
                .horizontal_margin(HORIZONTAL_MARGIN)
                .constraints([Constraint::Min(0)])
                .split(r)[0]
        };

        Self {
            field: chunks[0],
            title: inset(chunks[1]),
            bio: inset(chunks[2]),
            links: inset(chunks[3]),
            legend: chunks[4],
        }
    }
}

/// Cells occupied by each social link, centered in `row` and clipped to it
pub fn link_hitboxes(doc: &Document, links: &[NodeId], row: Rect) -> Vec<(NodeId, Rect)> {
    let widths: Vec<usize> = links
        .iter()
        .map(|id| doc.text_content(*id).width().max(1))
        .collect();
    let gap = usize::from(LINK_GAP);
    let total = widths
        .iter()
        .fold(0usize, |acc, w| acc.saturating_add(*w))
        .saturating_add(gap.saturating_mul(widths.len().saturating_sub(1)));
    let total = u16::try_from(total).unwrap_or(u16::MAX).min(row.width);

    let mut x = row.x.saturating_add((row.width - total) / 2);
    links
        .iter()
        .zip(widths)
        .map(|(id, w)| {
            let w = u16::try_from(w).unwrap_or(u16::MAX);
            let rect = Rect::new(x, row.y, w.min(row.width), 1).intersection(row);
            x = x.saturating_add(w).saturating_add(LINK_GAP);
            (*id, rect)
        })
        .collect()
}

/// Social link under the given cell, if any
pub fn hit_test(doc: &Document, config: &Config, area: Rect, column: u16, row: u16) -> Option<NodeId> {
    let layout = PreviewLayout::new(area);
    let links = doc.query_selector_all(&config.selectors.social_links);
    link_hitboxes(doc, &links, layout.links)
        .into_iter()
        .find(|(_, r)| {
            column >= r.x && column < r.x + r.width && row >= r.y && row < r.y + r.height
        })
        .map(|(id, _)| id)
}

/// `#RRGGBB` to an RGB terminal color
pub fn parse_hex_color(value: &str) -> Option<Color> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?))
}

fn parse_unit(value: Option<&str>, unit: &str) -> Option<f64> {
    value?.strip_suffix(unit)?.trim().parse().ok()
}

/// What the preview needs from a floating element node
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub symbol: &'static str,
    pub color: Color,
    pub left_percent: f64,
    pub top_percent: f64,
    pub duration_sec: f64,
    pub delay_sec: f64,
    pub large: bool,
}

impl Glyph {
    pub fn from_node(node: &Node) -> Option<Self> {
        if !node.has_class("floating-element") {
            return None;
        }
        let (symbol, color_style) = if node.has_class(&Shape::Triangle.to_string()) {
            ("▲", "border-bottom-color")
        } else if node.has_class(&Shape::Square.to_string()) {
            ("■", "background-color")
        } else if node.has_class(&Shape::Diamond.to_string()) {
            ("◆", "background-color")
        } else {
            ("●", "background-color")
        };

        Some(Self {
            symbol,
            color: node
                .style(color_style)
                .and_then(parse_hex_color)
                .unwrap_or(Color::Magenta),
            left_percent: parse_unit(node.style("left"), "%")?,
            top_percent: parse_unit(node.style("top"), "%")?,
            duration_sec: parse_unit(node.style("animation-duration"), "s").unwrap_or(10.0),
            delay_sec: parse_unit(node.style("animation-delay"), "s").unwrap_or(0.0),
            large: parse_unit(node.style("width"), "px").unwrap_or(0.0) >= 40.0,
        })
    }

    /// Vertical offset in rows; elements sit still until their delay passes
    pub fn bob(&self, elapsed: Duration) -> i32 {
        let t = elapsed.as_secs_f64() - self.delay_sec;
        if t < 0.0 || self.duration_sec <= 0.0 {
            return 0;
        }
        (2.0 * PI * t / self.duration_sec).sin().round() as i32
    }

    pub fn cell(&self, field: Rect, elapsed: Duration) -> Option<(u16, u16)> {
        if field.width == 0 || field.height == 0 {
            return None;
        }
        let x = field.x as f64 + (self.left_percent / 100.0) * field.width as f64;
        let y = field.y as f64 + (self.top_percent / 100.0) * field.height as f64;
        let y = y.floor() as i64 - self.bob(elapsed) as i64;
        let (x, y) = (x.floor() as i64, y);

        let inside = x >= field.x as i64
            && x < (field.x + field.width) as i64
            && y >= field.y as i64
            && y < (field.y + field.height) as i64;
        inside.then_some((x as u16, y as u16))
    }
}

/// Terminal rendering of the page's hero region
pub struct Preview<'a> {
    pub doc: &'a Document,
    pub config: &'a Config,
    pub elapsed: Duration,
}

impl Widget for &Preview<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let doc = self.doc;
        let layout = PreviewLayout::new(area);

        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        if let Some(hero) = doc.query_selector(&self.config.selectors.hero) {
            for child in doc.children(hero) {
                let Some(glyph) = doc.node(*child).and_then(Glyph::from_node) else {
                    continue;
                };
                if let Some((x, y)) = glyph.cell(layout.field, self.elapsed) {
                    if let Some(cell) = buf.cell_mut((x, y)) {
                        let mut style = Style::default().fg(glyph.color);
                        if glyph.large {
                            style = style.add_modifier(Modifier::BOLD);
                        }
                        cell.set_symbol(glyph.symbol).set_style(style);
                    }
                }
            }
        }

        if let Some(title) = doc.query_selector("h1") {
            Paragraph::new(Span::styled(doc.text_content(title), bold_style))
                .alignment(Alignment::Center)
                .render(layout.title, buf);
        }

        if let Some(bio) = doc.query_selector(&self.config.selectors.bio) {
            let node = doc.node(bio);
            let typing = node.is_some_and(|n| n.has_class(&self.config.typing.in_progress_class));
            let done = node.is_some_and(|n| n.has_class(&self.config.typing.complete_class));

            let mut spans = vec![Span::styled(
                doc.text_content(bio),
                if done { italic_style } else { Style::default() },
            )];
            if typing {
                spans.push(Span::styled("▌", Style::default().fg(Color::Magenta)));
            }
            Paragraph::new(Line::from(spans))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .render(layout.bio, buf);
        }

        let links = doc.query_selector_all(&self.config.selectors.social_links);
        for (id, rect) in link_hitboxes(doc, &links, layout.links) {
            let active = doc
                .node(id)
                .is_some_and(|n| n.has_class(&self.config.hover.active_class));
            let style = if active {
                Style::default()
                    .patch(bold_style)
                    .fg(Color::Rgb(0xFD, 0x9A, 0x69))
                    .add_modifier(Modifier::REVERSED)
            } else {
                Style::default().fg(Color::Rgb(0x9E, 0x7C, 0xC1))
            };
            Paragraph::new(Span::styled(doc.text_content(id), style)).render(rect, buf);
        }

        Paragraph::new(Span::styled(
            "hover a link with the mouse / (r)eload / (esc)ape",
            dim_style.patch(italic_style),
        ))
        .alignment(Alignment::Center)
        .render(layout.legend, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Mutation, NodeSpec};
    use crate::floating::FloatingElement;

    fn node_for(el: &FloatingElement) -> Node {
        let mut doc = Document::new();
        let id = doc.create_element(doc.root(), el.to_node_spec()).unwrap();
        doc.node(id).unwrap().clone()
    }

    fn element(shape: Shape) -> FloatingElement {
        FloatingElement {
            shape,
            color: "#4A3171".into(),
            size_px: 45,
            left_percent: 50.0,
            top_percent: 25.0,
            duration_sec: 8.0,
            delay_sec: 2.0,
        }
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FD9A69"), Some(Color::Rgb(0xFD, 0x9A, 0x69)));
        assert_eq!(parse_hex_color("FD9A69"), None);
        assert_eq!(parse_hex_color("#FFF"), None);
        assert_eq!(parse_hex_color("#GG0000"), None);
    }

    #[test]
    fn test_glyph_reads_triangle_border() {
        let glyph = Glyph::from_node(&node_for(&element(Shape::Triangle))).unwrap();
        assert_eq!(glyph.symbol, "▲");
        assert_eq!(glyph.color, Color::Rgb(0x4A, 0x31, 0x71));
        assert!(glyph.large);
        assert_eq!(glyph.left_percent, 50.0);
        assert_eq!(glyph.delay_sec, 2.0);
    }

    #[test]
    fn test_glyph_ignores_other_nodes() {
        let mut doc = Document::new();
        let p = doc
            .create_element(doc.root(), NodeSpec::new("p").class("bio"))
            .unwrap();
        assert!(Glyph::from_node(doc.node(p).unwrap()).is_none());
    }

    #[test]
    fn test_glyph_waits_for_delay() {
        let glyph = Glyph::from_node(&node_for(&element(Shape::Circle))).unwrap();
        assert_eq!(glyph.bob(Duration::from_secs(1)), 0);
        // A quarter period after the delay the element is at the top of its swing
        assert_eq!(glyph.bob(Duration::from_secs(4)), 1);
    }

    #[test]
    fn test_glyph_cell_is_inside_field() {
        let glyph = Glyph::from_node(&node_for(&element(Shape::Diamond))).unwrap();
        let field = Rect::new(0, 0, 80, 20);
        assert_eq!(glyph.cell(field, Duration::ZERO), Some((40, 5)));
        assert_eq!(glyph.cell(Rect::new(0, 0, 0, 0), Duration::ZERO), None);
    }

    #[test]
    fn test_hit_test_finds_links() {
        let mut doc = Document::new();
        let nav = doc
            .create_element(doc.root(), NodeSpec::new("nav").class("social-links"))
            .unwrap();
        let mut ids = vec![];
        for name in ["GitHub", "RSS"] {
            let a = doc.create_element(nav, NodeSpec::new("a")).unwrap();
            doc.apply(Mutation::AppendText {
                node: a,
                text: name.into(),
            });
            ids.push(a);
        }

        let area = Rect::new(0, 0, 80, 24);
        let layout = PreviewLayout::new(area);
        let boxes = link_hitboxes(&doc, &ids, layout.links);
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].1.width, 6);
        assert_eq!(boxes[1].1.x, boxes[0].1.x + 6 + LINK_GAP);

        let cfg = Config::default();
        let (first, rect) = boxes[0];
        assert_eq!(hit_test(&doc, &cfg, area, rect.x, rect.y), Some(first));
        assert_eq!(hit_test(&doc, &cfg, area, rect.x + 7, rect.y), None);
        assert_eq!(hit_test(&doc, &cfg, area, rect.x, rect.y - 1), None);
    }

    #[test]
    fn test_long_links_are_clipped_to_row() {
        let mut doc = Document::new();
        let nav = doc
            .create_element(doc.root(), NodeSpec::new("nav").class("social-links"))
            .unwrap();
        let ids: Vec<_> = (0..3)
            .map(|_| {
                let a = doc.create_element(nav, NodeSpec::new("a")).unwrap();
                doc.apply(Mutation::AppendText {
                    node: a,
                    text: "x".repeat(40_000),
                });
                a
            })
            .collect();

        let row = PreviewLayout::new(Rect::new(0, 0, 80, 24)).links;
        let boxes = link_hitboxes(&doc, &ids, row);
        assert_eq!(boxes.len(), 3);
        assert_eq!(boxes[0].1, row);
        for (_, r) in &boxes {
            assert!(r.width <= row.width);
            if r.width > 0 {
                assert!(r.x >= row.x && r.right() <= row.right());
            }
        }
    }
}
