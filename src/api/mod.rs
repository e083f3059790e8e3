//! Client-side view of the two DICOMweb transactions used by the PACS:
//! - QIDO-RS (search) lists studies, series and instances.
//! - WADO-RS (retrieve) downloads the instances of a series.
//!
//! The HTTP implementations live in [`crate::backend`].

pub mod qido;
pub mod wado;
