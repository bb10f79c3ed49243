use crate::client::Api;
use crate::config::RenderConfig;
use crate::error::{RenderError, RenderResult};
use crate::icons::{IconCache, IconResolver};
use crate::loader::TopologyLoader;
use crate::raster::{write_output_svg, write_thumbnail};
use crate::render::compose;
use crate::theme::Theme;
use std::path::PathBuf;
use std::sync::Arc;

/// One unit of batch work: turn a project id into an output file.
pub trait JobRunner: Send + Sync {
    fn run_job(&self, project_id: &str) -> RenderResult<PathBuf>;
}

/// Single-project pipeline: load → compose → rasterize → write.
pub struct ThumbnailGenerator {
    loader: TopologyLoader,
    icons: IconResolver,
    config: RenderConfig,
    theme: Theme,
    output_dir: PathBuf,
}

impl ThumbnailGenerator {
    /// `cache` memoizes symbols across generators; `icon_dir` is the on-disk
    /// symbol cache, if any.
    pub fn with_icon_cache(
        api: Arc<dyn Api>,
        config: RenderConfig,
        output_dir: impl Into<PathBuf>,
        cache: Arc<IconCache>,
        icon_dir: Option<PathBuf>,
    ) -> Self {
        let icons = IconResolver::new(Arc::clone(&api), cache, icon_dir, config.icon_pixels());
        Self {
            loader: TopologyLoader::new(api),
            icons,
            config,
            theme: Theme::gns3(),
            output_dir: output_dir.into(),
        }
    }

    #[tracing::instrument(skip(self), fields(source))]
    pub fn generate(&self, project_id: &str) -> RenderResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| RenderError::io(&self.output_dir, e))?;

        // Holding `loaded` until the end keeps a session we opened alive
        // through rasterization; dropping it closes the session on every path.
        let loaded = self.loader.load(project_id)?;
        tracing::Span::current().record("source", tracing::field::debug(loaded.source));
        let topology = &loaded.topology;
        tracing::debug!(
            nodes = topology.nodes.len(),
            links = topology.links.len(),
            drawings = topology.drawings.len(),
            "topology loaded"
        );

        let svg = compose(topology, &self.config, &self.theme, &self.icons);
        if self.config.save_svg {
            write_output_svg(&svg, &self.output_dir.join(format!("{project_id}.svg")))?;
        }

        let png_path = self.output_dir.join(format!("{project_id}.png"));
        if let Err(err) = write_thumbnail(&svg, &png_path, &self.config) {
            tracing::warn!(error = %err, "PNG conversion failed");
            return Err(err);
        }
        drop(loaded);
        Ok(png_path)
    }
}

impl JobRunner for ThumbnailGenerator {
    fn run_job(&self, project_id: &str) -> RenderResult<PathBuf> {
        self.generate(project_id)
    }
}
