//! Record shapes for the tabular decoder.
//!
//! A record shape declares, once, the table of fields it accepts: a canonical
//! (camelCase) field name and a typed setter. The setter variant fixes the
//! scalar converter, so binding a header column to a field never needs
//! runtime type discovery.

use std::num::{ParseFloatError, ParseIntError};

use thiserror::Error;

/// Typed setter for one field of a record shape.
///
/// The variant selects the scalar converter applied to the raw field text.
pub enum FieldSetter<T> {
    /// `"0"` converts to `false`, anything else to `true`.
    Bool(fn(&mut T, bool)),
    I8(fn(&mut T, i8)),
    I16(fn(&mut T, i16)),
    I32(fn(&mut T, i32)),
    I64(fn(&mut T, i64)),
    F32(fn(&mut T, f32)),
    F64(fn(&mut T, f64)),
    /// Raw string, taken verbatim.
    Text(fn(&mut T, String)),
    /// A declared field whose type has no scalar converter. Columns bound to
    /// it are skipped with a warning.
    Unsupported(&'static str),
}

/// One entry of a record shape's field table.
pub struct FieldSpec<T> {
    /// Canonical field name, e.g. `geonameId` for the `geoname_id` column.
    pub name: &'static str,
    /// Converter and assignment for the field's values.
    pub setter: FieldSetter<T>,
}

impl<T> FieldSpec<T> {
    /// Table entry binding `name` to `setter`.
    pub const fn new(name: &'static str, setter: FieldSetter<T>) -> Self {
        FieldSpec { name, setter }
    }
}

/// A record type the tabular decoder can produce.
///
/// Fields absent from a row (empty text) keep their `Default` value.
pub trait TabularRecord: Default + Sized + 'static {
    /// Name used in log messages.
    const SHAPE: &'static str;

    /// The shape's field table.
    fn fields() -> &'static [FieldSpec<Self>];

    /// Looks up a field by canonical name.
    fn field(name: &str) -> Option<&'static FieldSpec<Self>> {
        Self::fields().iter().find(|field| field.name == name)
    }
}

/// A field's text could not be converted to its declared type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error("invalid integer {0:?}: {1}")]
    Integer(String, ParseIntError),
    #[error("invalid float {0:?}: {1}")]
    Float(String, ParseFloatError),
    #[error("field type {0} has no converter")]
    Unsupported(&'static str),
}

impl<T> FieldSetter<T> {
    /// Converts `raw` and stores it into `record`.
    pub fn apply(&self, record: &mut T, raw: &str) -> Result<(), ConvertError> {
        let int_err = |e| ConvertError::Integer(raw.to_string(), e);
        let float_err = |e| ConvertError::Float(raw.to_string(), e);
        match self {
            FieldSetter::Bool(set) => set(record, raw != "0"),
            FieldSetter::I8(set) => set(record, raw.parse().map_err(int_err)?),
            FieldSetter::I16(set) => set(record, raw.parse().map_err(int_err)?),
            FieldSetter::I32(set) => set(record, raw.parse().map_err(int_err)?),
            FieldSetter::I64(set) => set(record, raw.parse().map_err(int_err)?),
            FieldSetter::F32(set) => set(record, raw.parse().map_err(float_err)?),
            FieldSetter::F64(set) => set(record, raw.parse().map_err(float_err)?),
            FieldSetter::Text(set) => set(record, raw.to_string()),
            FieldSetter::Unsupported(type_name) => return Err(ConvertError::Unsupported(type_name)),
        }
        Ok(())
    }
}

/// Converts a snake_case column name into its canonical camelCase field name.
///
/// `subdivision_1_iso_code` becomes `subdivision1IsoCode`.
pub fn snake_to_camel(column: &str) -> String {
    let mut name = String::with_capacity(column.len());
    for part in column.split('_').filter(|part| !part.is_empty()) {
        if name.is_empty() {
            name.push_str(part);
        } else {
            let mut chars = part.chars();
            if let Some(first) = chars.next() {
                name.extend(first.to_uppercase());
                name.push_str(chars.as_str());
            }
        }
    }
    name
}
