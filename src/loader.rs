//! Fetching one project's topology from the server.
//!
//! The project document is read directly when the server allows it; this
//! leaves the project's run state untouched. Otherwise the project is opened
//! and its nodes, links and drawings are queried one collection at a time.

use crate::client::{Api, RequestKind};
use crate::error::{RenderError, RenderResult};
use crate::topology::Topology;
use serde_json::Value;
use std::sync::Arc;

const DEFAULT_PROJECT_FILE: &str = "project.gns3";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologySource {
    /// Parsed from the serialized project file.
    Document,
    /// Queried from an open project session.
    Session,
}

/// Closes the project on drop if this job was the one that opened it.
pub struct SessionGuard {
    api: Arc<dyn Api>,
    project_id: String,
    opened_here: bool,
}

impl SessionGuard {
    fn untouched(api: Arc<dyn Api>, project_id: &str) -> Self {
        Self {
            api,
            project_id: project_id.to_string(),
            opened_here: false,
        }
    }

    pub fn opened_here(&self) -> bool {
        self.opened_here
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.opened_here {
            return;
        }
        tracing::debug!(project = %self.project_id, "closing project opened for rendering");
        if self
            .api
            .post_json(&["v2", "projects", self.project_id.as_str(), "close"])
            .is_none()
        {
            tracing::warn!(project = %self.project_id, "failed to close project");
        }
    }
}

pub struct LoadedTopology {
    pub topology: Topology,
    pub source: TopologySource,
    /// Keep alive until rendering is finished.
    pub session: SessionGuard,
}

pub struct TopologyLoader {
    api: Arc<dyn Api>,
}

impl TopologyLoader {
    pub fn new(api: Arc<dyn Api>) -> Self {
        Self { api }
    }

    pub fn load(&self, project_id: &str) -> RenderResult<LoadedTopology> {
        let project = self
            .api
            .get_json(&["v2", "projects", project_id])
            .ok_or_else(|| RenderError::ProjectUnavailable(project_id.to_string()))?;

        if let Some(topology) = self.read_project_file(project_id, &project) {
            tracing::debug!(project = project_id, "loaded topology from project file");
            return Ok(LoadedTopology {
                topology,
                source: TopologySource::Document,
                session: SessionGuard::untouched(Arc::clone(&self.api), project_id),
            });
        }

        tracing::debug!(project = project_id, "project file unavailable, querying session");
        let session = self.ensure_open(project_id, &project)?;
        let collection = |name: &str| {
            self.api
                .get_json(&["v2", "projects", project_id, name])
                .unwrap_or(Value::Null)
        };
        let nodes = collection("nodes");
        let links = collection("links");
        let drawings = collection("drawings");

        Ok(LoadedTopology {
            topology: Topology::from_collections(Some(&nodes), Some(&links), Some(&drawings)),
            source: TopologySource::Session,
            session,
        })
    }

    /// Fast path. `None` means "use the session instead", never an error.
    fn read_project_file(&self, project_id: &str, project: &Value) -> Option<Topology> {
        let filename = project
            .get("filename")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PROJECT_FILE);
        let url = self.api.url(&["v2", "projects", project_id, "files", filename]);

        let fetched = match self.api.get(&url, RequestKind::Document) {
            Ok(fetched) => fetched,
            Err(err) => {
                tracing::debug!(project = project_id, error = %err, "project file read failed");
                return None;
            }
        };
        if fetched.status != 200 {
            tracing::debug!(project = project_id, status = fetched.status, "project file not readable");
            return None;
        }
        let document = fetched.json().ok()?;
        parse_project_document(&document)
    }

    fn ensure_open(&self, project_id: &str, project: &Value) -> RenderResult<SessionGuard> {
        let mut guard = SessionGuard::untouched(Arc::clone(&self.api), project_id);
        if project.get("status").and_then(Value::as_str) == Some("opened") {
            return Ok(guard);
        }
        tracing::info!(project = project_id, "opening project to read its topology");
        self.api
            .post_json(&["v2", "projects", project_id, "open"])
            .ok_or_else(|| RenderError::SessionOpen(project_id.to_string()))?;
        guard.opened_here = true;
        Ok(guard)
    }
}

/// Accepts `{"topology": {nodes, links, drawings}}` and, failing that, a flat
/// `{nodes, links, drawings}`. The nested form wins when both are present.
pub fn parse_project_document(document: &Value) -> Option<Topology> {
    let root = document.as_object()?;
    if let Some(topology) = root.get("topology") {
        let topology = topology.as_object()?;
        return Some(Topology::from_collections(
            topology.get("nodes"),
            topology.get("links"),
            topology.get("drawings"),
        ));
    }
    if root.contains_key("nodes") {
        return Some(Topology::from_collections(
            root.get("nodes"),
            root.get("links"),
            root.get("drawings"),
        ));
    }
    None
}
