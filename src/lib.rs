//! Project feature vectors from CSV files and visualize them, either as a
//! scatter plot or as a directory for an embedding projector viewer with an
//! optional thumbnail sprite.

pub mod distance;
pub mod error;
pub mod features;
mod font;
pub mod histogram;
pub mod identifiers;
pub mod labels;
pub mod projection;
pub mod sampling;
pub mod sprite;
pub mod table;
pub mod visualize;

pub use error::Error;
