//! Job matching core.
//!
//! Text normalization, catalog loading, the embedding index lifecycle,
//! location filtering, similarity ranking, skill overlap and match explanations.
//! All encoder calls go through the `Encoder` trait; no model is constructed here.

pub mod catalog;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod explain;
pub mod handlers;
pub mod index;
pub mod location;
pub mod normalize;
pub mod overlap;
pub mod ranker;
pub mod strategy;
