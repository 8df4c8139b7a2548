//! Data layer: archive layout, segment discovery, reading, concatenation,
//! conversion.

pub mod catalog;
pub mod concat;
pub mod convert;
pub mod layout;
pub mod reader;

pub use catalog::{CatalogError, DirectoryCatalog, SegmentCatalog, StaticCatalog};
pub use concat::{ConcatError, ConcatStats, StreamingConcatenator};
pub use convert::{convert_file, converted_path, ConvertError, Converted};
pub use layout::{extract_date, segment_file_name, ArchiveLayout};
pub use reader::{read_segment, ReadError};
