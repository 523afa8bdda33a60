pub mod digest;
pub mod fields;
pub mod poly;
