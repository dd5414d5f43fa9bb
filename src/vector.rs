//! Embedding vector type

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// An embedding in n-dimensional space.
///
/// Serializes as a plain JSON array of numbers so collection files stay
/// readable by other tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vector {
    data: Vec<f64>,
}

impl Vector {
    /// Create a new vector from a Vec<f64>
    pub fn new(data: Vec<f64>) -> Self {
        Self { data }
    }

    /// Get the dimension of the vector
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Get the underlying data as a slice
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Check if this vector has the same dimension as another
    pub fn has_same_dimension(&self, other: &Vector) -> bool {
        self.dimension() == other.dimension()
    }

    /// Compute the L2 norm (magnitude) of the vector
    pub fn norm(&self) -> f64 {
        self.data.iter().map(|x| x * x).sum::<f64>().sqrt()
    }

    /// True when every component is zero (or the vector is empty)
    pub fn is_zero(&self) -> bool {
        self.norm() == 0.0
    }
}

impl FromStr for Vector {
    type Err = StoreError;

    /// Parse a vector from a comma-separated string like "0.1, 0.2, 0.3".
    fn from_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Err(StoreError::InvalidVector {
                reason: "empty vector".to_string(),
            });
        }

        let data = s
            .split(',')
            .map(|x| {
                let x = x.trim();
                x.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| StoreError::InvalidVector {
                        reason: format!("Invalid float: {}", x),
                    })
            })
            .collect::<Result<Vec<f64>>>()?;

        Ok(Vector::new(data))
    }
}
