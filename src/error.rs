use std::path::PathBuf;

pub type RenderResult<T> = Result<T, RenderError>;

/// Failure of a single project's thumbnail job.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("project {0} is unavailable")]
    ProjectUnavailable(String),

    #[error("could not open project {0}")]
    SessionOpen(String),

    #[error("rasterization failed: {0}")]
    Raster(String),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("worker panicked: {0}")]
    Panicked(String),
}

impl RenderError {
    pub fn raster(msg: impl Into<String>) -> Self {
        Self::Raster(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Invalid settings detected before any job starts.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no valid project ids provided")]
    NoProjects,

    #[error("workers must be 'auto' or a positive integer, got: {0}")]
    Workers(String),

    #[error("invalid background color: {0}")]
    Background(String),

    #[error("background color must be opaque, got: {0}")]
    TranslucentBackground(String),

    #[error("invalid server url: {0}")]
    ServerUrl(String),

    #[error("{0} must be positive")]
    NotPositive(&'static str),

    #[error("padding must be a non-negative number")]
    Padding,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            RenderError::raster("x")
                .to_string()
                .contains("rasterization failed:")
        );
        assert!(
            RenderError::SessionOpen("p1".into())
                .to_string()
                .contains("could not open project p1")
        );
        assert!(
            ConfigError::Workers("lots".into())
                .to_string()
                .contains("'auto' or a positive integer")
        );
    }

    #[test]
    fn io_preserves_source() {
        let err = RenderError::io("out/p1.png", std::io::Error::other("disk full"));
        let text = err.to_string();
        assert!(text.contains("out/p1.png"));
        assert!(text.contains("disk full"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
