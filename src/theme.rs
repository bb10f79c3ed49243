use serde::{Deserialize, Serialize};

/// Keyword → fill color for nodes drawn without an icon. Order matters: the
/// first keyword found in the node type or symbol wins.
pub const NODE_COLORS: [(&str, &str); 9] = [
    ("router", "#4A90E2"),
    ("switch", "#7ED321"),
    ("vpcs", "#F5A623"),
    ("cloud", "#50E3C2"),
    ("nat", "#BD10E0"),
    ("ethernet_switch", "#7ED321"),
    ("ethernet_hub", "#B8E986"),
    ("frame_relay_switch", "#4A90E2"),
    ("atm_switch", "#4A90E2"),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub line_color: String,
    pub line_width: f64,
    pub line_opacity: f64,
    pub interface_label_color: String,
    pub node_label_color: String,
    pub node_border_color: String,
    pub node_border_width: f64,
    pub node_corner_radius: f64,
    pub default_node_color: String,
    pub placeholder_text_color: String,
}

impl Theme {
    pub fn gns3() -> Self {
        Self {
            font_family: "Arial".to_string(),
            line_color: "#333".to_string(),
            line_width: 2.0,
            line_opacity: 0.6,
            interface_label_color: "#666".to_string(),
            node_label_color: "#333".to_string(),
            node_border_color: "#333".to_string(),
            node_border_width: 2.0,
            node_corner_radius: 5.0,
            default_node_color: "#9B9B9B".to_string(),
            placeholder_text_color: "#CCCCCC".to_string(),
        }
    }

    pub fn node_color(&self, node_type: &str, symbol: &str) -> &str {
        let node_type = node_type.to_lowercase();
        let symbol = symbol.to_lowercase();
        NODE_COLORS
            .iter()
            .find(|(key, _)| node_type.contains(key) || symbol.contains(key))
            .map(|(_, color)| *color)
            .unwrap_or(self.default_node_color.as_str())
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::gns3()
    }
}
