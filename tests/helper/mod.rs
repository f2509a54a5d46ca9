#![allow(dead_code)]

pub mod evaluator;
pub mod nix;

pub use evaluator::ManifestEvaluator;
pub use nix::FakeNix;
