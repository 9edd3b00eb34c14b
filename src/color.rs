// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use serde::{Deserialize, Serialize};

/// A colour in HSL space. Hue is in degrees, saturation and lightness are 0-1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

impl Default for Hsl {
    fn default() -> Self {
        Hsl::BLACK
    }
}

impl Hsl {
    pub const BLACK: Hsl = Hsl {
        h: 0.0,
        s: 0.0,
        l: 0.0,
    };

    pub const WHITE: Hsl = Hsl {
        h: 0.0,
        s: 0.0,
        l: 1.0,
    };

    pub fn new(h: f64, s: f64, l: f64) -> Self {
        Hsl { h, s, l }
    }

    /// Returns a copy with the hue rotated by the given number of degrees.
    pub fn rotate(&self, degrees: f64) -> Hsl {
        Hsl {
            h: (self.h + degrees).rem_euclid(360.0),
            ..*self
        }
    }

    /// Linearly interpolate towards another colour along the shortest hue arc.
    pub fn lerp(&self, other: &Hsl, t: f64) -> Hsl {
        let t = t.clamp(0.0, 1.0);
        let mut delta = (other.h - self.h).rem_euclid(360.0);
        if delta > 180.0 {
            delta -= 360.0;
        }
        Hsl {
            h: (self.h + delta * t).rem_euclid(360.0),
            s: self.s + (other.s - self.s) * t,
            l: self.l + (other.l - self.l) * t,
        }
    }

    /// Converts to RGB in the DMX domain (0-255 per component, unrounded).
    pub fn to_rgb(&self) -> (f64, f64, f64) {
        let h = self.h.rem_euclid(360.0);
        let s = self.s.clamp(0.0, 1.0);
        let l = self.l.clamp(0.0, 1.0);

        let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
        let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
        let m = l - c / 2.0;

        // Each sector is 60 degrees of the colour wheel.
        let sector = (h / 60.0).floor() as u8 % 6;
        let (r, g, b) = match sector {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };

        ((r + m) * 255.0, (g + m) * 255.0, (b + m) * 255.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn assert_rgb(actual: (f64, f64, f64), expected: (f64, f64, f64)) {
        assert!((actual.0 - expected.0).abs() < 1e-9, "{:?}", actual);
        assert!((actual.1 - expected.1).abs() < 1e-9, "{:?}", actual);
        assert!((actual.2 - expected.2).abs() < 1e-9, "{:?}", actual);
    }

    #[test]
    fn primaries() {
        assert_rgb(Hsl::new(0.0, 1.0, 0.5).to_rgb(), (255.0, 0.0, 0.0));
        assert_rgb(Hsl::new(120.0, 1.0, 0.5).to_rgb(), (0.0, 255.0, 0.0));
        assert_rgb(Hsl::new(240.0, 1.0, 0.5).to_rgb(), (0.0, 0.0, 255.0));
        assert_rgb(Hsl::WHITE.to_rgb(), (255.0, 255.0, 255.0));
        assert_rgb(Hsl::BLACK.to_rgb(), (0.0, 0.0, 0.0));
    }

    #[test]
    fn rotate_wraps() {
        assert_eq!(Hsl::new(350.0, 1.0, 0.5).rotate(20.0).h, 10.0);
        assert_eq!(Hsl::new(10.0, 1.0, 0.5).rotate(-20.0).h, 350.0);
    }

    #[test]
    fn lerp_takes_short_arc() {
        let a = Hsl::new(350.0, 1.0, 0.5);
        let b = Hsl::new(10.0, 1.0, 0.5);
        let mid = a.lerp(&b, 0.5);
        assert!(mid.h.abs() < 1e-9 || (mid.h - 360.0).abs() < 1e-9);
    }
}
