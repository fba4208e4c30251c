//! Dash stencils for line primitives

use tidemark_core::coord::Pixel;

/// A draw/gap dash description in pixels.
///
/// A zero draw or gap length disables dashing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dash {
    /// Length of the drawn part
    pub draw: i32,
    /// Length of the gap
    pub gap: i32,
    /// Whether the line starts with a drawn part
    pub start: bool,
}

impl Dash {
    /// A dash starting with ink
    pub fn new(draw: i32, gap: i32) -> Self {
        Dash {
            draw,
            gap,
            start: true,
        }
    }
}

/// Tracks dash state along an arbitrarily stepped line.
///
/// Distances are compared squared so the handler works for diagonal
/// stepping without a square root per pixel.
pub(crate) struct DashHandler<'a> {
    dash: Option<&'a Dash>,
    is_drawing: bool,
    has_point: bool,
    last_x: Pixel,
    last_y: Pixel,
    draw_dist: i64,
    gap_dist: i64,
}

impl<'a> DashHandler<'a> {
    pub fn new(dash: Option<&'a Dash>) -> Self {
        let (is_drawing, draw_dist, gap_dist) = match dash {
            Some(d) => (d.start, (d.draw as i64) * (d.draw as i64), (d.gap as i64) * (d.gap as i64)),
            None => (true, 0, 0),
        };
        DashHandler {
            dash,
            is_drawing,
            has_point: false,
            last_x: 0,
            last_y: 0,
            draw_dist,
            gap_dist,
        }
    }

    pub fn should_draw(&mut self, x: Pixel, y: Pixel) -> bool {
        if self.dash.is_none() || self.draw_dist == 0 || self.gap_dist == 0 {
            return true;
        }
        if !self.has_point {
            self.last_x = x;
            self.last_y = y;
            self.has_point = true;
            return self.is_drawing;
        }
        let dx = (x - self.last_x) as i64;
        let dy = (y - self.last_y) as i64;
        let dst = dx * dx + dy * dy;
        if self.is_drawing {
            if dst >= self.draw_dist {
                self.last_x = x;
                self.last_y = y;
                self.is_drawing = false;
            }
        } else if dst >= self.gap_dist {
            self.last_x = x;
            self.last_y = y;
            self.is_drawing = true;
        }
        self.is_drawing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_dash_always_draws() {
        let mut h = DashHandler::new(None);
        for x in 0..100 {
            assert!(h.should_draw(x, 0));
        }
    }

    #[test]
    fn test_dash_alternates() {
        let dash = Dash::new(4, 4);
        let mut h = DashHandler::new(Some(&dash));
        let drawn: Vec<bool> = (0..16).map(|x| h.should_draw(x, 0)).collect();
        assert!(drawn[0]);
        assert!(drawn.iter().any(|d| !d), "gap must appear");
        // it toggles back to drawing eventually
        assert!(drawn[12..].iter().any(|d| *d));
    }
}
