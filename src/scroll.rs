use std::fmt::Write as _;

use serde::Deserialize;

use crate::engine::{ScrollDelta, ScrollMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    #[default]
    Down,
    Up,
    Right,
    Left,
}

impl ScrollDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrollDirection::Down => "down",
            ScrollDirection::Up => "up",
            ScrollDirection::Right => "right",
            ScrollDirection::Left => "left",
        }
    }

    /// Signed offset for scrolling `pixels` in this direction.
    pub fn delta(&self, pixels: i64) -> ScrollDelta {
        match self {
            ScrollDirection::Down => ScrollDelta { x: 0, y: pixels },
            ScrollDirection::Up => ScrollDelta { x: 0, y: pixels.saturating_neg() },
            ScrollDirection::Right => ScrollDelta { x: pixels, y: 0 },
            ScrollDirection::Left => ScrollDelta { x: pixels.saturating_neg(), y: 0 },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollAxis {
    #[default]
    Both,
    Vertical,
    Horizontal,
}

/// Scroll state of the page along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisScroll {
    pub scrollable: bool,
    pub content: i64,
    pub viewport: i64,
    pub position: i64,
    pub max_scroll: i64,
    /// Toward the origin (up / left).
    pub can_scroll_back: bool,
    /// Away from the origin (down / right).
    pub can_scroll_forward: bool,
}

impl AxisScroll {
    pub fn new(content: i64, viewport: i64, position: i64) -> Self {
        let max_scroll = (content - viewport).max(0);
        Self {
            scrollable: content > viewport,
            content,
            viewport,
            position,
            max_scroll,
            can_scroll_back: position > 0,
            can_scroll_forward: position < max_scroll,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scrollability {
    pub vertical: AxisScroll,
    pub horizontal: AxisScroll,
}

impl Scrollability {
    pub fn from_metrics(m: &ScrollMetrics) -> Self {
        Self {
            vertical: AxisScroll::new(m.content_height, m.viewport_height, m.scroll_y),
            horizontal: AxisScroll::new(m.content_width, m.viewport_width, m.scroll_x),
        }
    }

    pub fn can_scroll_up(&self) -> bool {
        self.vertical.can_scroll_back
    }

    pub fn can_scroll_down(&self) -> bool {
        self.vertical.can_scroll_forward
    }

    pub fn can_scroll_left(&self) -> bool {
        self.horizontal.can_scroll_back
    }

    pub fn can_scroll_right(&self) -> bool {
        self.horizontal.can_scroll_forward
    }

    pub fn render(&self, axis: ScrollAxis) -> String {
        let mut out = String::new();
        match axis {
            ScrollAxis::Both => {
                out.push_str("Page scrollability:\n");
                render_axis(&mut out, "Vertical", &self.vertical, ("up", "down"));
                render_axis(&mut out, "Horizontal", &self.horizontal, ("left", "right"));
            }
            ScrollAxis::Vertical => {
                out.push_str("Vertical scrollability:\n");
                render_axis(&mut out, "Vertical", &self.vertical, ("up", "down"));
            }
            ScrollAxis::Horizontal => {
                out.push_str("Horizontal scrollability:\n");
                render_axis(&mut out, "Horizontal", &self.horizontal, ("left", "right"));
            }
        }
        out.trim_end().to_string()
    }
}

fn render_axis(out: &mut String, label: &str, axis: &AxisScroll, (back, forward): (&str, &str)) {
    let state = if axis.scrollable { "scrollable" } else { "not scrollable" };
    let _ = writeln!(
        out,
        "{label}: {state} (content {}px, viewport {}px)",
        axis.content, axis.viewport
    );
    let _ = writeln!(out, "  Position: {}px of {}px max", axis.position, axis.max_scroll);
    let _ = writeln!(
        out,
        "  Can scroll {back}: {}, can scroll {forward}: {}",
        yes_no(axis.can_scroll_back),
        yes_no(axis.can_scroll_forward)
    );
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(scroll_y: i64, content_height: i64) -> ScrollMetrics {
        ScrollMetrics {
            scroll_x: 0,
            scroll_y,
            content_width: 1280,
            content_height,
            viewport_width: 1280,
            viewport_height: 720,
        }
    }

    #[test]
    fn deltas_are_signed_by_direction() {
        assert_eq!(ScrollDirection::Down.delta(100), ScrollDelta { x: 0, y: 100 });
        assert_eq!(ScrollDirection::Up.delta(100), ScrollDelta { x: 0, y: -100 });
        assert_eq!(ScrollDirection::Right.delta(50), ScrollDelta { x: 50, y: 0 });
        assert_eq!(ScrollDirection::Left.delta(50), ScrollDelta { x: -50, y: 0 });
    }

    #[test]
    fn extreme_deltas_saturate() {
        assert_eq!(ScrollDirection::Up.delta(i64::MIN), ScrollDelta { x: 0, y: i64::MAX });
        assert_eq!(ScrollDirection::Left.delta(i64::MIN), ScrollDelta { x: i64::MAX, y: 0 });
    }

    #[test]
    fn top_of_long_page() {
        let s = Scrollability::from_metrics(&metrics(0, 3000));
        assert!(s.vertical.scrollable);
        assert_eq!(s.vertical.max_scroll, 2280);
        assert!(!s.can_scroll_up());
        assert!(s.can_scroll_down());
        assert!(!s.horizontal.scrollable);
        assert!(!s.can_scroll_left());
        assert!(!s.can_scroll_right());
    }

    #[test]
    fn bottom_of_long_page() {
        let s = Scrollability::from_metrics(&metrics(2280, 3000));
        assert!(s.can_scroll_up());
        assert!(!s.can_scroll_down());
    }

    #[test]
    fn short_page_has_zero_max() {
        let s = Scrollability::from_metrics(&metrics(0, 400));
        assert!(!s.vertical.scrollable);
        assert_eq!(s.vertical.max_scroll, 0);
        assert!(!s.can_scroll_down());
    }

    #[test]
    fn direction_flags_follow_offset_bounds() {
        for content in [500, 720, 721, 2000] {
            for pos in [0, 1, 200, 1279, 1280, 1500] {
                let a = AxisScroll::new(content, 720, pos);
                assert_eq!(a.can_scroll_forward, a.position < a.max_scroll);
                assert_eq!(a.can_scroll_back, a.position > 0);
            }
        }
    }

    #[test]
    fn render_per_axis() {
        let s = Scrollability::from_metrics(&metrics(100, 3000));
        let both = s.render(ScrollAxis::Both);
        assert!(both.contains("Vertical: scrollable"));
        assert!(both.contains("Horizontal: not scrollable"));
        assert!(both.contains("Position: 100px of 2280px max"));
        assert!(both.contains("Can scroll up: yes, can scroll down: yes"));

        let vertical = s.render(ScrollAxis::Vertical);
        assert!(vertical.contains("Vertical"));
        assert!(!vertical.contains("Horizontal"));

        let horizontal = s.render(ScrollAxis::Horizontal);
        assert!(horizontal.contains("Can scroll left: no, can scroll right: no"));
        assert!(!horizontal.contains("Vertical"));
    }
}
