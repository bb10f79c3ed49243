use crate::config::RenderConfig;
use crate::icons::IconLookup;
use crate::layout::{DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH, EdgeLabel, Layout, NodeLayout, compute_layout};
use crate::theme::Theme;
use crate::topology::Topology;
use base64::Engine as _;

/// Fraction of the node footprint an icon occupies.
const ICON_SCALE: f64 = 0.8;
/// Baseline of a node's name, measured from the bottom of its footprint.
const NAME_OFFSET: f64 = 15.0;

/// Build the SVG scene for a topology. An empty topology gets a placeholder.
pub fn compose(topology: &Topology, config: &RenderConfig, theme: &Theme, icons: &dyn IconLookup) -> String {
    if topology.is_empty() {
        return render_empty_svg(config, theme);
    }
    let layout = compute_layout(topology, config);
    render_svg(&layout, config, theme, icons)
}

pub fn render_empty_svg(config: &RenderConfig, theme: &Theme) -> String {
    let width = DEFAULT_CANVAS_WIDTH;
    let height = DEFAULT_CANVAS_HEIGHT;
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\">\
         <rect width=\"100%\" height=\"100%\" fill=\"{}\"/>\
         <text x=\"{}\" y=\"{}\" font-family=\"{}\" font-size=\"24\" fill=\"{}\" text-anchor=\"middle\">Empty Project</text>\
         </svg>",
        escape_xml(&config.background),
        width / 2.0,
        height / 2.0,
        theme.font_family,
        theme.placeholder_text_color
    )
}

pub fn render_svg(layout: &Layout, config: &RenderConfig, theme: &Theme, icons: &dyn IconLookup) -> String {
    let mut svg = String::new();
    let width = layout.width;
    let height = layout.height;
    let background = escape_xml(&config.background);

    svg.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" xmlns:xlink=\"http://www.w3.org/1999/xlink\" width=\"{width:.2}\" height=\"{height:.2}\" viewBox=\"0 0 {width:.2} {height:.2}\">\n",
    ));
    svg.push_str(&format!("<rect width=\"100%\" height=\"100%\" fill=\"{background}\"/>\n"));

    let label_size = (config.font_size - 2.0).max(1.0);
    for edge in &layout.edges {
        svg.push_str(&format!(
            "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-width=\"{}\" opacity=\"{}\"/>\n",
            edge.start.0,
            edge.start.1,
            edge.end.0,
            edge.end.1,
            theme.line_color,
            theme.line_width,
            theme.line_opacity
        ));

        if !config.show_interface_labels {
            continue;
        }
        for label in [&edge.start_label, &edge.end_label].into_iter().flatten() {
            svg.push_str(&interface_label_svg(label, label_size, &background, theme));
        }
    }

    for drawing in &layout.drawings {
        svg.push_str(&format!(
            "<g transform=\"translate({:.2},{:.2})\">{}</g>\n",
            drawing.x, drawing.y, drawing.svg
        ));
    }

    for node in &layout.nodes {
        let icon = if config.use_node_icons && !node.symbol.is_empty() {
            icons.lookup(&node.symbol)
        } else {
            None
        };
        match icon {
            Some(png) => svg.push_str(&node_icon_svg(node, &png)),
            None => svg.push_str(&format!(
                "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{}\" height=\"{}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"{}\" rx=\"{}\"/>\n",
                node.x,
                node.y,
                node.size,
                node.size,
                theme.node_color(&node.node_type, &node.symbol),
                theme.node_border_color,
                theme.node_border_width,
                theme.node_corner_radius
            )),
        }

        let (center_x, _) = node.center();
        svg.push_str(&format!(
            "<text x=\"{center_x:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\" text-anchor=\"middle\" font-weight=\"bold\">{}</text>\n",
            node.y + node.size + NAME_OFFSET,
            theme.font_family,
            config.font_size,
            theme.node_label_color,
            escape_xml(&node.name)
        ));
    }

    svg.push_str("</svg>");
    svg
}

/// Halo pass in the background color first, then the readable fill pass.
fn interface_label_svg(label: &EdgeLabel, font_size: f64, halo: &str, theme: &Theme) -> String {
    let text = escape_xml(&label.text);
    let attrs = format!(
        "x=\"{:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\" text-anchor=\"{}\"",
        label.x,
        label.y,
        theme.font_family,
        font_size,
        theme.interface_label_color,
        label.anchor.as_str()
    );
    format!(
        "<text {attrs} stroke=\"{halo}\" stroke-width=\"3\" paint-order=\"stroke\">{text}</text>\n<text {attrs}>{text}</text>\n"
    )
}

fn node_icon_svg(node: &NodeLayout, png: &[u8]) -> String {
    let (cx, cy) = node.center();
    let half = node.size * ICON_SCALE / 2.0;
    let side = node.size * ICON_SCALE;
    let data = base64::engine::general_purpose::STANDARD.encode(png);
    format!(
        "<g transform=\"translate({cx:.2},{cy:.2})\"><image x=\"{:.2}\" y=\"{:.2}\" width=\"{side:.2}\" height=\"{side:.2}\" xlink:href=\"data:image/png;base64,{data}\"/></g>\n",
        -half, -half
    )
}

pub fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icons::NoIcons;
    use crate::topology::{Drawing, Link, LinkEndpoint, Node};
    use std::sync::Arc;

    fn sample() -> Topology {
        Topology::new(
            vec![
                Node::new("n1", "R1", 100.0, 100.0).with_kind("router", "router.svg"),
                Node::new("n2", "S1", 300.0, 100.0).with_kind("switch", "switch.svg"),
            ],
            vec![Link::between(
                LinkEndpoint::new("n1", Some("e0")),
                LinkEndpoint::new("n2", Some("e1")),
            )],
            Vec::new(),
        )
    }

    fn compose_default(topology: &Topology, config: &RenderConfig) -> String {
        compose(topology, config, &Theme::gns3(), &NoIcons)
    }

    #[test]
    fn empty_topology_renders_placeholder() {
        let svg = compose_default(&Topology::default(), &RenderConfig::default());
        assert!(svg.contains("Empty Project"));
        assert!(svg.contains("width=\"800\" height=\"600\""));
        assert!(!svg.contains("<line"));
    }

    #[test]
    fn links_and_labels_are_drawn() {
        let svg = compose_default(&sample(), &RenderConfig::default());
        assert_eq!(svg.matches("<line").count(), 1);
        assert_eq!(svg.matches(">e0</text>").count(), 2);
        assert_eq!(svg.matches(">e1</text>").count(), 2);
        assert_eq!(svg.matches("paint-order=\"stroke\"").count(), 2);
        assert!(svg.contains(">R1</text>"));
        assert!(svg.contains("fill=\"#4A90E2\""));
        assert!(svg.contains("fill=\"#7ED321\""));
    }

    #[test]
    fn labels_can_be_hidden() {
        let config = RenderConfig {
            show_interface_labels: false,
            ..Default::default()
        };
        let svg = compose_default(&sample(), &config);
        assert_eq!(svg.matches("<line").count(), 1);
        assert!(!svg.contains(">e0<"));
    }

    #[test]
    fn dangling_links_produce_no_segments() {
        let mut topo = sample();
        topo.links = vec![Link::between(
            LinkEndpoint::new("n1", Some("e0")),
            LinkEndpoint::new("gone", Some("e9")),
        )];
        let svg = compose_default(&topo, &RenderConfig::default());
        assert_eq!(svg.matches("<line").count(), 0);
        assert!(!svg.contains("e9"));
    }

    #[test]
    fn element_order_is_links_drawings_nodes() {
        let mut topo = sample();
        topo.drawings.push(Drawing::new(
            0.0,
            0.0,
            "<svg width=\"40\" height=\"40\"><ellipse cx=\"20\" cy=\"20\" rx=\"20\" ry=\"20\"/></svg>",
        ));
        let svg = compose_default(&topo, &RenderConfig::default());
        let line = svg.find("<line").unwrap();
        let drawing = svg.find("<ellipse").unwrap();
        let node = svg.find("rx=\"5\"").unwrap();
        assert!(line < drawing && drawing < node);
        assert!(svg.contains("<g transform=\"translate(40.00,40.00)\"><svg"));
    }

    #[test]
    fn icons_replace_shapes_but_keep_names() {
        let config = RenderConfig {
            use_node_icons: true,
            ..Default::default()
        };
        let lookup = |symbol: &str| (symbol == "router.svg").then(|| Arc::new(vec![0x89, b'P', b'N', b'G']));
        let svg = compose(&sample(), &config, &Theme::gns3(), &lookup);
        assert_eq!(svg.matches("<image").count(), 1);
        assert!(svg.contains("width=\"48.00\""));
        assert!(svg.contains("data:image/png;base64,iVBORw=="));
        // The switch has no icon and falls back to a colored shape.
        assert_eq!(svg.matches("rx=\"5\"").count(), 1);
        assert!(svg.contains(">R1</text>") && svg.contains(">S1</text>"));
    }

    #[test]
    fn icons_are_not_requested_when_disabled() {
        let lookup = |_: &str| -> Option<crate::icons::IconBytes> { panic!("lookup while disabled") };
        let svg = compose(&sample(), &RenderConfig::default(), &Theme::gns3(), &lookup);
        assert_eq!(svg.matches("rx=\"5\"").count(), 2);
    }

    #[test]
    fn names_are_escaped() {
        let topo = Topology::new(vec![Node::new("a", "R<1> & \"core\"", 0.0, 0.0)], Vec::new(), Vec::new());
        let svg = compose_default(&topo, &RenderConfig::default());
        assert!(svg.contains("R&lt;1&gt; &amp; &quot;core&quot;"));
    }

    #[test]
    fn composed_scene_parses_as_svg() {
        let svg = compose_default(&sample(), &RenderConfig::default());
        let opt = usvg::Options::default();
        assert!(usvg::Tree::from_str(&svg, &opt).is_ok());
    }
}
