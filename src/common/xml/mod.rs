//! XML text helpers shared by the document and workbook engines.

mod escape;

pub use escape::{escape_xml, is_xml_char, unescape_xml};
