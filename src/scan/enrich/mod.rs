//! Enricher scanners: compute derived views without emitting findings.

pub mod skeleton;

pub use skeleton::SkeletonEnricher;
