
use indexmap::IndexMap;
use ndarray::ArrayD;
use netcdf::{types::{FloatType, IntType}, AttributeValue, Extents};

use crate::config::NumericPrecision;

/// The numeric type of a variable the encoder creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NcValueType {
    I32,
    F32,
    F64,
}

impl From<NumericPrecision> for NcValueType {
    fn from(value: NumericPrecision) -> Self {
        match value {
            NumericPrecision::Float => Self::F32,
            NumericPrecision::Double => Self::F64,
        }
    }
}

impl NcValueType {
    /// Build an attribute holding `value` in this type, for attributes such
    /// as `_FillValue` that must match the variable's type.
    pub fn attribute_value(&self, value: f64) -> AttributeValue {
        match self {
            NcValueType::I32 => AttributeValue::Int(value as i32),
            NcValueType::F32 => AttributeValue::Float(value as f32),
            NcValueType::F64 => AttributeValue::Double(value),
        }
    }
}

/// A type that can hold the arrays the encoder writes to a netCDF file.
#[derive(Debug, Clone, PartialEq)]
pub enum NcArray {
    I32(ArrayD<i32>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

impl NcArray {
    /// An array of the given type and shape with every cell set to `fill`.
    pub fn filled(value_type: NcValueType, shape: &[usize], fill: f64) -> Self {
        match value_type {
            NcValueType::I32 => Self::I32(ArrayD::from_elem(shape, fill as i32)),
            NcValueType::F32 => Self::F32(ArrayD::from_elem(shape, fill as f32)),
            NcValueType::F64 => Self::F64(ArrayD::from_elem(shape, fill)),
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            NcArray::I32(arr) => arr.shape(),
            NcArray::F32(arr) => arr.shape(),
            NcArray::F64(arr) => arr.shape(),
        }
    }

    /// Set one cell, converting `value` to the array's type.
    ///
    /// # Panics
    /// If `index` does not match the array's shape.
    pub fn set(&mut self, index: &[usize], value: f64) {
        match self {
            NcArray::I32(arr) => arr[index] = value as i32,
            NcArray::F32(arr) => arr[index] = value as f32,
            NcArray::F64(arr) => arr[index] = value,
        }
    }

    /// Get one cell as an `f64`, or `None` if `index` is out of bounds.
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        match self {
            NcArray::I32(arr) => arr.get(index).map(|&v| v as f64),
            NcArray::F32(arr) => arr.get(index).map(|&v| v as f64),
            NcArray::F64(arr) => arr.get(index).copied(),
        }
    }

    /// Iterate over all cells in logical order, as `f64`.
    pub fn iter_f64(&self) -> Box<dyn Iterator<Item = f64> + '_> {
        match self {
            NcArray::I32(arr) => Box::new(arr.iter().map(|&v| v as f64)),
            NcArray::F32(arr) => Box::new(arr.iter().map(|&v| v as f64)),
            NcArray::F64(arr) => Box::new(arr.iter().copied()),
        }
    }

    /// Retrieve data from a netCDF variable and construct the appropriate variant.
    ///
    /// Only the types the encoder writes are supported; others return a
    /// `netcdf::Error::TypeMismatch`-style error.
    pub fn get_from(var: &netcdf::Variable) -> netcdf::Result<Self> {
        match var.vartype() {
            netcdf::types::NcVariableType::Int(IntType::I32) => {
                let values = var.get::<i32, _>(Extents::All)?;
                Ok(Self::I32(values))
            },
            netcdf::types::NcVariableType::Float(FloatType::F32) => {
                let values = var.get::<f32, _>(Extents::All)?;
                Ok(Self::F32(values))
            },
            netcdf::types::NcVariableType::Float(FloatType::F64) => {
                let values = var.get::<f64, _>(Extents::All)?;
                Ok(Self::F64(values))
            },
            other => Err(netcdf::Error::Str(format!(
                "variable '{}' has type {other:?}, which is not one the encoder writes", var.name()
            ))),
        }
    }

    /// Write this data into an already defined variable. The extents are
    /// given explicitly from the array's shape so that unlimited dimensions
    /// grow to fit.
    pub fn put_to(&self, var: &mut netcdf::VariableMut) -> netcdf::Result<()> {
        let extents = extents_for_shape(self.shape())?;
        match self {
            NcArray::I32(arr) => {
                let values = arr.as_slice()
                    .ok_or_else(|| netcdf::Error::Str("Could not convert i32 array to a standard order slice".to_string()))?;
                var.put_values(values, extents)
            },
            NcArray::F32(arr) => {
                let values = arr.as_slice()
                    .ok_or_else(|| netcdf::Error::Str("Could not convert f32 array to a standard order slice".to_string()))?;
                var.put_values(values, extents)
            },
            NcArray::F64(arr) => {
                let values = arr.as_slice()
                    .ok_or_else(|| netcdf::Error::Str("Could not convert f64 array to a standard order slice".to_string()))?;
                var.put_values(values, extents)
            },
        }
    }
}

/// Only time series (1-D) and time series profile (2-D) data are written.
fn extents_for_shape(shape: &[usize]) -> netcdf::Result<Extents> {
    match shape {
        &[n] => Ok([0..n].into()),
        &[nt, nz] => Ok([0..nt, 0..nz].into()),
        _ => Err(netcdf::Error::Str(format!("cannot write a {}-dimensional array", shape.len()))),
    }
}

/// An ordered list of attribute records.
///
/// Attributes are accumulated here first and applied to a netCDF variable or
/// file in a single pass, so the order in the file is exactly the order they
/// were added. Adding an attribute that already exists replaces its value but
/// keeps its original position.
#[derive(Debug, Clone, Default)]
pub struct AttributeList {
    attrs: IndexMap<String, AttributeValue>,
}

impl AttributeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<N: ToString, V: Into<AttributeValue>>(mut self, name: N, value: V) -> Self {
        self.push(name, value);
        self
    }

    pub fn push<N: ToString, V: Into<AttributeValue>>(&mut self, name: N, value: V) {
        self.attrs.insert(name.to_string(), value.into());
    }

    pub fn extend(&mut self, other: AttributeList) {
        for (name, value) in other.attrs {
            self.attrs.insert(name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attrs.get(name)
    }

    /// Get a string attribute; `None` if missing or not a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.attrs.get(name) {
            Some(AttributeValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get a numeric attribute as an `f64`; `None` if missing or not a scalar number.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.attrs.get(name)? {
            AttributeValue::Double(v) => Some(*v),
            AttributeValue::Float(v) => Some(*v as f64),
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Short(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn write_to_variable(&self, var: &mut netcdf::VariableMut) -> netcdf::Result<()> {
        for (name, value) in self.attrs.iter() {
            var.put_attribute(name, value.clone())?;
        }
        Ok(())
    }

    pub fn write_to_file(&self, nc: &mut netcdf::FileMut) -> netcdf::Result<()> {
        for (name, value) in self.attrs.iter() {
            nc.add_attribute(name, value.clone())?;
        }
        Ok(())
    }
}
