//! Virtual (VRT) datasets and their simple sources.

mod dataset;
mod source;

pub use dataset::{VrtDataset, VrtDatasetBands};
pub use source::{VrtSimpleSource, Window};

pub(crate) use source::SourceDef;
