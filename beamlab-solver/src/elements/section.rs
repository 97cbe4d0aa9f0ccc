//! Section properties for beam elements

use serde::{Deserialize, Serialize};

/// Cross-section properties for beam elements
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Cross-sectional area in m²
    pub a: f64,
    /// Moment of inertia about the bending axis in m⁴
    pub i: f64,
}

impl Section {
    /// Create a new section with basic properties
    pub fn new(a: f64, i: f64) -> Self {
        Self { a, i }
    }

    /// Create a rectangular section bending about its strong axis
    pub fn rectangular(width: f64, depth: f64) -> Self {
        Self {
            a: width * depth,
            i: width * depth.powi(3) / 12.0,
        }
    }

    /// Create a wide flange (I-beam) section bending about its strong axis
    pub fn wide_flange(
        depth: f64,
        flange_width: f64,
        flange_thickness: f64,
        web_thickness: f64,
    ) -> Self {
        let bf = flange_width;
        let tf = flange_thickness;
        let tw = web_thickness;
        let hw = depth - 2.0 * tf;

        Self {
            a: 2.0 * bf * tf + hw * tw,
            i: (bf * depth.powi(3) - (bf - tw) * hw.powi(3)) / 12.0,
        }
    }

    /// Create a circular section
    pub fn circular(diameter: f64) -> Self {
        let r = diameter / 2.0;
        Self {
            a: std::f64::consts::PI * r.powi(2),
            i: std::f64::consts::PI * r.powi(4) / 4.0,
        }
    }
}

impl Default for Section {
    fn default() -> Self {
        // 300mm x 500mm rectangle
        Self::rectangular(0.3, 0.5)
    }
}
