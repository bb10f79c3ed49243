use crate::config::RenderConfig;
use crate::topology::{Drawing, Node, Topology};

/// Canvas used when a topology has nothing with an extent.
pub const DEFAULT_CANVAS_WIDTH: f64 = 800.0;
pub const DEFAULT_CANVAS_HEIGHT: f64 = 600.0;

/// Distance added past the node radius when placing interface labels.
const LABEL_GAP: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn default_canvas() -> Self {
        Self {
            min_x: 0.0,
            min_y: 0.0,
            max_x: DEFAULT_CANVAS_WIDTH,
            max_y: DEFAULT_CANVAS_HEIGHT,
            width: DEFAULT_CANVAS_WIDTH,
            height: DEFAULT_CANVAS_HEIGHT,
        }
    }

    /// Translation that maps raw topology coordinates onto the canvas.
    pub fn offset(&self) -> (f64, f64) {
        (-self.min_x, -self.min_y)
    }
}

/// Union of node and drawing extents, grown by `padding` on every side.
pub fn compute_bounds(nodes: &[Node], drawings: &[Drawing], node_size: f64, padding: f64) -> Bounds {
    if nodes.is_empty() && drawings.is_empty() {
        return Bounds::default_canvas();
    }

    let extents = nodes
        .iter()
        .map(|n| (n.x, n.y, n.x + node_size, n.y + node_size))
        .chain(drawings.iter().map(|d| {
            let (w, h) = d.declared_size();
            (d.x, d.y, d.x + w, d.y + h)
        }));

    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for (x0, y0, x1, y1) in extents {
        min_x = min_x.min(x0);
        min_y = min_y.min(y0);
        max_x = max_x.max(x1);
        max_y = max_y.max(y1);
    }

    Bounds {
        min_x: min_x - padding,
        min_y: min_y - padding,
        max_x: max_x + padding,
        max_y: max_y + padding,
        width: (max_x - min_x) + 2.0 * padding,
        height: (max_y - min_y) + 2.0 * padding,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    Start,
    End,
}

impl TextAnchor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeLabel {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub anchor: TextAnchor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeLayout {
    pub from: String,
    pub to: String,
    pub start: (f64, f64),
    pub end: (f64, f64),
    pub start_label: Option<EdgeLabel>,
    pub end_label: Option<EdgeLabel>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeLayout {
    pub id: String,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub node_type: String,
    pub symbol: String,
}

impl NodeLayout {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.size / 2.0, self.y + self.size / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawingLayout {
    pub x: f64,
    pub y: f64,
    pub svg: String,
}

/// Every element of a topology placed in canvas coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub bounds: Bounds,
    pub width: f64,
    pub height: f64,
    pub nodes: Vec<NodeLayout>,
    pub edges: Vec<EdgeLayout>,
    pub drawings: Vec<DrawingLayout>,
}

pub fn compute_layout(topology: &Topology, config: &RenderConfig) -> Layout {
    let node_size = config.node_size;
    let bounds = compute_bounds(&topology.nodes, &topology.drawings, node_size, config.padding);
    let (dx, dy) = bounds.offset();

    let nodes: Vec<NodeLayout> = topology
        .nodes
        .iter()
        .map(|n| NodeLayout {
            id: n.node_id.clone(),
            name: n.name.clone(),
            x: n.x + dx,
            y: n.y + dy,
            size: node_size,
            node_type: n.node_type.clone(),
            symbol: n.symbol.clone(),
        })
        .collect();

    let edges = topology
        .links
        .iter()
        .filter_map(|link| {
            let [a, b, ..] = link.nodes.as_slice() else {
                return None;
            };
            let from = nodes.iter().find(|n| n.id == a.node_id)?;
            let to = nodes.iter().find(|n| n.id == b.node_id)?;
            Some(place_edge(from, to, a.label_text(), b.label_text()))
        })
        .collect();

    let drawings = topology
        .drawings
        .iter()
        .filter(|d| !d.svg.is_empty())
        .map(|d| DrawingLayout {
            x: d.x + dx,
            y: d.y + dy,
            svg: d.svg.clone(),
        })
        .collect();

    Layout {
        bounds,
        width: bounds.width,
        height: bounds.height,
        nodes,
        edges,
        drawings,
    }
}

fn place_edge(from: &NodeLayout, to: &NodeLayout, start_text: &str, end_text: &str) -> EdgeLayout {
    let start = from.center();
    let end = to.center();
    let (dx, dy) = (end.0 - start.0, end.1 - start.1);
    let length = (dx * dx + dy * dy).sqrt();

    let mut start_label = None;
    let mut end_label = None;
    if length > 0.0 {
        let (ux, uy) = (dx / length, dy / length);
        let reach = from.size / 2.0 + LABEL_GAP;
        // Labels read away from their own node: the start label grows along
        // the link direction, the end label against it.
        let (start_anchor, end_anchor) = if ux >= 0.0 {
            (TextAnchor::Start, TextAnchor::End)
        } else {
            (TextAnchor::End, TextAnchor::Start)
        };
        if !start_text.is_empty() {
            start_label = Some(EdgeLabel {
                text: start_text.to_string(),
                x: start.0 + ux * reach,
                y: start.1 + uy * reach,
                anchor: start_anchor,
            });
        }
        if !end_text.is_empty() {
            end_label = Some(EdgeLabel {
                text: end_text.to_string(),
                x: end.0 - ux * reach,
                y: end.1 - uy * reach,
                anchor: end_anchor,
            });
        }
    }

    EdgeLayout {
        from: from.id.clone(),
        to: to.id.clone(),
        start,
        end,
        start_label,
        end_label,
    }
}
