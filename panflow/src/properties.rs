//! Named tunables.
//!
//! Estimators expose their tuning parameters through the [`Properties`] trait, so that front-ends
//! can list and adjust them without knowing the concrete estimator type.

use crate::prelude::v1::*;
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

/// Object with named tunables.
pub trait Properties {
    /// Get mutable references to available properties.
    fn props_mut(&mut self) -> Vec<(&str, PropertyMut)> {
        vec![]
    }

    /// Get a snapshot of available properties.
    fn props(&mut self) -> Vec<(&str, Property)> {
        self.props_mut()
            .into_iter()
            .map(|(n, p)| (n, p.into()))
            .collect()
    }

    /// Set a property from its textual representation.
    ///
    /// The value is clamped to the property's bounds.
    ///
    /// # Arguments
    ///
    /// * `name` - name of the property, as reported by `props_mut`.
    /// * `value` - value to parse.
    fn set_prop(&mut self, name: &str, value: &str) -> Result<()> {
        let mut props = self.props_mut();
        let (_, prop) = props
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .ok_or_else(|| anyhow!("Unknown property: {name}"))?;
        prop.parse_set(value)
    }
}

/// Property with a lower and upper bound.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundedProp<T> {
    pub val: T,
    pub min: T,
    pub max: T,
}

impl<T> Deref for BoundedProp<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.val
    }
}

impl<'a, T: Copy> From<BoundedPropMut<'a, T>> for BoundedProp<T> {
    fn from(BoundedPropMut { val, min, max }: BoundedPropMut<'a, T>) -> Self {
        Self {
            val: *val,
            min,
            max,
        }
    }
}

/// Snapshot of a property value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Property {
    Float(BoundedProp<f32>),
    Usize(BoundedProp<usize>),
}

impl<'a> From<PropertyMut<'a>> for Property {
    fn from(prop: PropertyMut<'a>) -> Self {
        match prop {
            PropertyMut::Float(p) => Self::Float(p.into()),
            PropertyMut::Usize(p) => Self::Usize(p.into()),
        }
    }
}

impl std::fmt::Display for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Float(p) => write!(f, "{} [{}; {}]", p.val, p.min, p.max),
            Self::Usize(p) => write!(f, "{} [{}; {}]", p.val, p.min, p.max),
        }
    }
}

/// Mutable reference to a bounded value.
pub struct BoundedPropMut<'a, T> {
    pub val: &'a mut T,
    pub min: T,
    pub max: T,
}

impl<'a, T> Deref for BoundedPropMut<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.val
    }
}

impl<'a, T> DerefMut for BoundedPropMut<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.val
    }
}

impl<'a, T: PartialOrd + Copy> BoundedPropMut<'a, T> {
    /// Store a new value, clamped between the lower and upper bounds.
    pub fn set_clamped(&mut self, val: T) {
        *self.val = if val < self.min {
            self.min
        } else if val > self.max {
            self.max
        } else {
            val
        };
    }
}

/// Mutable reference to a property.
pub enum PropertyMut<'a> {
    Float(BoundedPropMut<'a, f32>),
    Usize(BoundedPropMut<'a, usize>),
}

impl<'a> PropertyMut<'a> {
    /// Create a floating point property.
    ///
    /// # Arguments
    ///
    /// * `val` - reference to the underlying float to be mutated.
    /// * `min` - lowest value for the property.
    /// * `max` - highest value for the property.
    pub fn float(val: &'a mut f32, min: f32, max: f32) -> Self {
        Self::Float(BoundedPropMut { val, min, max })
    }

    /// Create an integer property.
    ///
    /// # Arguments
    ///
    /// * `val` - reference to the underlying usize to be mutated.
    /// * `min` - lowest value for the property.
    /// * `max` - highest value for the property.
    pub fn usize(val: &'a mut usize, min: usize, max: usize) -> Self {
        Self::Usize(BoundedPropMut { val, min, max })
    }

    /// Copy the value of a snapshot of the same kind.
    pub fn set(&mut self, other: &Property) {
        match (self, other) {
            (Self::Float(val), Property::Float(oval)) => val.set_clamped(oval.val),
            (Self::Usize(val), Property::Usize(oval)) => val.set_clamped(oval.val),
            _ => {}
        }
    }

    /// Parse and set a value.
    pub fn parse_set(&mut self, value: &str) -> Result<()> {
        let value = value.trim();
        match self {
            Self::Float(val) => val.set_clamped(value.parse()?),
            Self::Usize(val) => val.set_clamped(value.parse()?),
        }
        Ok(())
    }
}
