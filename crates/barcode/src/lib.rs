//! EAN-13 barcode encoding and PNG rendering.

pub mod ean13;
pub mod error;
pub mod render;

pub use {
    ean13::Ean13,
    error::{Error, Result},
    render::{BarcodeRenderer, Ean13Renderer},
};
