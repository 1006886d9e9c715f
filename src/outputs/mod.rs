//! Output writers for the two JSON artifacts the pipeline produces: the
//! reference index and the cluster record array.
//!
//! Both writers replace the whole file from a complete in-memory list, via a
//! temp file and a rename, so a reader never observes a half-written
//! document. The checkpointing loop depends on that.

pub mod json;
