//! Material properties

use serde::{Deserialize, Serialize};

/// Material properties used for bending stiffness
///
/// Moduli are in kN/m² so that stiffness stays consistent with kN and metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Modulus of elasticity (Young's modulus) in kN/m²
    pub e: f64,
    /// Poisson's ratio
    pub nu: f64,
}

impl Material {
    /// Create a new material with given properties
    pub fn new(e: f64, nu: f64) -> Self {
        Self { e, nu }
    }

    /// Structural steel
    pub fn steel() -> Self {
        Self::new(200e6, 0.3)
    }

    /// Normal-weight concrete from its compressive strength in MPa
    pub fn concrete(fc_mpa: f64) -> Self {
        // ACI: E = 4700 * sqrt(f'c) MPa
        let e_mpa = 4700.0 * fc_mpa.sqrt();
        Self::new(e_mpa * 1e3, 0.2)
    }

    /// Structural timber (softwood, parallel to grain)
    pub fn timber() -> Self {
        Self::new(11e6, 0.35)
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::steel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_steel() {
        let mat = Material::default();
        assert_eq!(mat, Material::steel());
        assert!((mat.e - 200e6).abs() < 1e-6);
    }

    #[test]
    fn test_concrete_modulus() {
        let c = Material::concrete(25.0);
        assert!((c.e - 23.5e6).abs() < 1.0);
    }
}
