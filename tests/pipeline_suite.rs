use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use gns3_snapshot::client::{Api, ApiError, Fetched, RequestKind};
use gns3_snapshot::icons::{IconCache, NoIcons};
use gns3_snapshot::loader::parse_project_document;
use gns3_snapshot::theme::Theme;
use gns3_snapshot::{RenderConfig, RenderError, ThumbnailGenerator, compose, compute_bounds, run_batch};
use serde_json::{Value, json};
use url::Url;

const SERVER: &str = "http://gns3.test";

fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("fixture {name} unreadable: {e}"))
}

/// In-memory stand-in for a GNS3 server. Unknown URLs answer 404.
struct FakeServer {
    base: Url,
    routes: HashMap<String, Fetched>,
    calls: Mutex<Vec<String>>,
}

impl Default for FakeServer {
    fn default() -> Self {
        Self {
            base: Url::parse(SERVER).unwrap(),
            routes: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeServer {
    fn route(mut self, method: &str, endpoint: &str, reply: Fetched) -> Self {
        self.routes.insert(format!("{method} {SERVER}{endpoint}"), reply);
        self
    }

    fn json(self, endpoint: &str, value: Value) -> Self {
        self.route("GET", endpoint, Fetched::ok(value.to_string()))
    }

    /// Project metadata plus a readable project file.
    fn document(self, project_id: &str, body: String) -> Self {
        self.json(
            &format!("/v2/projects/{project_id}"),
            json!({"project_id": project_id, "filename": "lab.gns3", "status": "closed"}),
        )
        .route("GET", &format!("/v2/projects/{project_id}/files/lab.gns3"), Fetched::ok(body))
    }

    fn no_content(self, endpoint: &str) -> Self {
        self.route(
            "POST",
            endpoint,
            Fetched {
                status: 204,
                body: Vec::new(),
            },
        )
    }

    fn posted(&self, endpoint: &str) -> bool {
        let wanted = format!("POST {SERVER}{endpoint}");
        self.calls.lock().unwrap().iter().any(|c| *c == wanted)
    }

    fn answer(&self, key: String) -> Result<Fetched, ApiError> {
        let reply = self.routes.get(&key).cloned().unwrap_or(Fetched {
            status: 404,
            body: Vec::new(),
        });
        self.calls.lock().unwrap().push(key);
        Ok(reply)
    }
}

impl Api for FakeServer {
    fn base_url(&self) -> &Url {
        &self.base
    }

    fn get(&self, url: &str, _kind: RequestKind) -> Result<Fetched, ApiError> {
        self.answer(format!("GET {url}"))
    }

    fn post(&self, url: &str) -> Result<Fetched, ApiError> {
        self.answer(format!("POST {url}"))
    }
}

fn generator(api: Arc<FakeServer>, config: RenderConfig, out: &Path) -> ThumbnailGenerator {
    ThumbnailGenerator::with_icon_cache(api, config, out, Arc::new(IconCache::new()), None)
}

fn small_config() -> RenderConfig {
    RenderConfig {
        width: 400,
        height: 300,
        ..Default::default()
    }
}

#[test]
fn two_router_project_end_to_end() {
    let doc: Value = serde_json::from_str(&fixture("two_routers.gns3")).unwrap();
    let topology = parse_project_document(&doc).unwrap();
    let bounds = compute_bounds(&topology.nodes, &topology.drawings, 60.0, 40.0);
    assert_eq!(
        (bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y),
        (60.0, 60.0, 400.0, 200.0)
    );
    assert_eq!((bounds.width, bounds.height), (340.0, 140.0));

    let svg = compose(&topology, &RenderConfig::default(), &Theme::gns3(), &NoIcons);
    assert_eq!(svg.matches("<line").count(), 1);
    assert!(svg.contains(">e0</text>") && svg.contains(">e1</text>"));
    assert!(svg.contains(">R1</text>") && svg.contains(">R2</text>"));

    let out = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeServer::default().document("p1", fixture("two_routers.gns3")));
    let path = generator(api.clone(), small_config(), out.path()).generate("p1").unwrap();
    assert_eq!(path, out.path().join("p1.png"));

    let png = image::open(&path).unwrap();
    assert_eq!((png.width(), png.height()), (400, 300));
    assert!(!api.posted("/v2/projects/p1/open"));
}

#[test]
fn empty_project_gets_placeholder_thumbnail() {
    let out = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeServer::default().document("empty", fixture("empty.gns3")));
    let config = RenderConfig {
        save_svg: true,
        ..small_config()
    };
    let path = generator(api, config, out.path()).generate("empty").unwrap();

    let svg = std::fs::read_to_string(out.path().join("empty.svg")).unwrap();
    assert!(svg.contains("Empty Project"));
    let png = image::open(&path).unwrap().to_rgb8();
    assert_eq!(png.dimensions(), (400, 300));
    // Letterbox and canvas are both the configured white background.
    assert!(png.get_pixel(0, 0).0.iter().all(|&c| c >= 250));
}

#[test]
fn dangling_links_and_blank_drawings_are_skipped() {
    let doc: Value = serde_json::from_str(&fixture("annotated.gns3")).unwrap();
    let topology = parse_project_document(&doc).unwrap();
    assert_eq!(topology.links.len(), 4);

    let svg = compose(&topology, &RenderConfig::default(), &Theme::gns3(), &NoIcons);
    assert_eq!(svg.matches("<line").count(), 2);
    assert_eq!(svg.matches("<g transform=\"translate(").count(), 1);
    assert!(svg.contains(">Node</text>"));
    assert!(svg.contains(">Ethernet0</text>") && svg.contains(">nat0</text>"));
}

#[test]
fn session_fallback_closes_what_it_opened() {
    let out = tempfile::tempdir().unwrap();
    let api = Arc::new(
        FakeServer::default()
            .json("/v2/projects/live", json!({"project_id": "live", "status": "closed"}))
            .json(
                "/v2/projects/live/nodes",
                json!([{"node_id": "a", "name": "PC1", "x": 0, "y": 0, "node_type": "vpcs"}]),
            )
            .json("/v2/projects/live/links", json!([]))
            .json("/v2/projects/live/drawings", json!([]))
            .no_content("/v2/projects/live/open")
            .no_content("/v2/projects/live/close"),
    );
    generator(api.clone(), small_config(), out.path()).generate("live").unwrap();
    assert!(api.posted("/v2/projects/live/open"));
    assert!(api.posted("/v2/projects/live/close"));
}

#[test]
fn session_is_closed_even_when_rasterization_fails() {
    let out = tempfile::tempdir().unwrap();
    let api = Arc::new(
        FakeServer::default()
            .json("/v2/projects/broken", json!({"status": "closed"}))
            .json("/v2/projects/broken/nodes", json!([{"node_id": "a", "x": 0, "y": 0}]))
            .json(
                "/v2/projects/broken/drawings",
                json!([{"x": 10, "y": 10, "svg": "<svg><unclosed"}]),
            )
            .no_content("/v2/projects/broken/open")
            .no_content("/v2/projects/broken/close"),
    );
    let err = generator(api.clone(), small_config(), out.path())
        .generate("broken")
        .unwrap_err();
    assert!(matches!(err, RenderError::Raster(_)));
    assert!(api.posted("/v2/projects/broken/close"));
    assert!(!out.path().join("broken.png").exists());
}

#[test]
fn batch_reports_each_project_independently() {
    let out = tempfile::tempdir().unwrap();
    let mut server = FakeServer::default();
    for id in ["p1", "p2", "p4", "p5"] {
        server = server.document(id, fixture("two_routers.gns3"));
    }
    let generator = generator(Arc::new(server), small_config(), out.path());
    let ids: Vec<String> = (1..=5).map(|i| format!("p{i}")).collect();

    let report = run_batch(&generator, &ids, 3).unwrap();
    assert_eq!(report.succeeded.len(), 4);
    assert_eq!(report.failed.iter().collect::<Vec<_>>(), vec!["p3"]);
    assert!(!report.all_succeeded());
    for id in ["p1", "p2", "p4", "p5"] {
        assert!(out.path().join(format!("{id}.png")).exists());
    }
    assert!(!out.path().join("p3.png").exists());
}
