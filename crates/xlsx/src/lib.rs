//! XLSX adapter that writes task and index sheets from a workbook plan.

pub mod writer;

pub use writer::XlsxMaterializer;
