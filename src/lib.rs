pub mod batch;
#[cfg(feature = "cli")]
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod icons;
pub mod layout;
pub mod loader;
pub mod pipeline;
pub mod raster;
pub mod render;
pub mod theme;
pub mod topology;

pub use batch::{BatchReport, run_batch};
#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{ClientConfig, RenderConfig};
pub use error::{ConfigError, RenderError, RenderResult};
pub use layout::{Bounds, compute_bounds};
pub use pipeline::ThumbnailGenerator;
pub use render::compose;
pub use topology::Topology;
