pub mod multipart;
pub mod sanitize;
