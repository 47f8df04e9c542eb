//! Thin helpers over the native netcdf library.
//!
//! Attribute lookups go through [`has_attr`] first: asking libnetcdf for an
//! attribute that does not exist makes HDF5 print a diagnostic to stderr,
//! even though the missing attribute is handled on our side.

use std::collections::BTreeMap;
use std::sync::Once;

use netcdf::AttributeValue;

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose error messages to stderr even when errors
/// are handled gracefully (e.g. probing optional attributes), producing log
/// spam like:
///
/// ```text
/// HDF5-DIAG: Error detected in HDF5 (1.10.8) thread 3:
///   #003: ../../../src/H5Adense.c line 397 in H5A__dense_open(): can't locate attribute in name index
/// ```
///
/// Call it early in `main()`, before any NetCDF operation. Only the first
/// call does anything.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and null handlers are a
        // documented way to disable error output.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Check if a variable has an attribute with the given name.
pub(crate) fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

/// Numeric attribute as f64.
pub(crate) fn get_f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    f64::try_from(attr_value).ok()
}

/// Text (or numeric, formatted) attribute.
pub(crate) fn get_string_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    attr_to_string(attr_value)
}

/// All attributes of a variable that can be represented as text.
pub(crate) fn variable_attributes(var: &netcdf::Variable) -> BTreeMap<String, String> {
    var.attributes()
        .filter_map(|attr| {
            let value = attr.value().ok().and_then(attr_to_string)?;
            Some((attr.name().to_string(), value))
        })
        .collect()
}

/// Global attributes of a file that can be represented as text.
pub(crate) fn global_attributes(file: &netcdf::File) -> BTreeMap<String, String> {
    file.attributes()
        .filter_map(|attr| {
            let value = attr.value().ok().and_then(attr_to_string)?;
            Some((attr.name().to_string(), value))
        })
        .collect()
}

fn attr_to_string(value: AttributeValue) -> Option<String> {
    match value {
        AttributeValue::Str(s) => Some(s),
        other => f64::try_from(other).ok().map(|v| v.to_string()),
    }
}
