use crate::ir::{DiagramKind, Direction};
use crate::shape::ShapeType;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpacingConfig {
    pub horizontal_spacing: f64,
    pub vertical_spacing: f64,
}

impl SpacingConfig {
    pub const fn new(horizontal_spacing: f64, vertical_spacing: f64) -> Self {
        Self {
            horizontal_spacing,
            vertical_spacing,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    pub flowchart: SpacingConfig,
    pub class: SpacingConfig,
    pub sequence: SpacingConfig,
    pub architecture: SpacingConfig,
    /// Median reordering sweeps per rank in the flow layout.
    pub order_passes: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            flowchart: SpacingConfig::new(220.0, 150.0),
            class: SpacingConfig::new(280.0, 260.0),
            sequence: SpacingConfig::new(200.0, 0.0),
            architecture: SpacingConfig::new(280.0, 220.0),
            order_passes: 4,
        }
    }
}

impl LayoutConfig {
    pub fn spacing(&self, kind: DiagramKind) -> SpacingConfig {
        match kind {
            DiagramKind::Flowchart => self.flowchart,
            DiagramKind::Class => self.class,
            DiagramKind::Sequence => self.sequence,
            DiagramKind::Architecture => self.architecture,
        }
    }

    fn spacing_mut(&mut self, kind: DiagramKind) -> &mut SpacingConfig {
        match kind {
            DiagramKind::Flowchart => &mut self.flowchart,
            DiagramKind::Class => &mut self.class,
            DiagramKind::Sequence => &mut self.sequence,
            DiagramKind::Architecture => &mut self.architecture,
        }
    }

    /// Applies `nodeSpacing`/`rankSpacing` from a `%%{init}%%` directive.
    ///
    /// Ranks run along x for horizontal flows, so `rankSpacing` maps to the
    /// horizontal spacing there and to the vertical spacing otherwise.
    pub fn apply_init_config(
        &mut self,
        kind: DiagramKind,
        direction: Direction,
        init: &serde_json::Value,
    ) {
        let section = match kind {
            DiagramKind::Flowchart => "flowchart",
            DiagramKind::Class => "class",
            DiagramKind::Sequence => "sequence",
            DiagramKind::Architecture => "architecture",
        };
        let Some(values) = init.get(section) else {
            return;
        };
        let node_spacing = values.get("nodeSpacing").and_then(|v| v.as_f64());
        let rank_spacing = values.get("rankSpacing").and_then(|v| v.as_f64());
        let spacing = self.spacing_mut(kind);
        let (rank_axis, node_axis) = if direction.is_horizontal() {
            (&mut spacing.horizontal_spacing, &mut spacing.vertical_spacing)
        } else {
            (&mut spacing.vertical_spacing, &mut spacing.horizontal_spacing)
        };
        if let Some(v) = rank_spacing.filter(|v| *v > 0.0) {
            *rank_axis = v;
        }
        if let Some(v) = node_spacing.filter(|v| *v > 0.0) {
            *node_axis = v;
        }
    }
}

/// Default shape sizes keyed by shape type. Parsed text never sets sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionConfig {
    pub event: Size,
    pub gateway: Size,
    pub task: Size,
    pub subprocess: Size,
    pub class: Size,
    pub lifeline: Size,
    pub service: Size,
    pub group: Size,
    pub junction: Size,
}

impl Default for DimensionConfig {
    fn default() -> Self {
        Self {
            event: Size::new(50.0, 50.0),
            gateway: Size::new(70.0, 70.0),
            task: Size::new(140.0, 70.0),
            subprocess: Size::new(160.0, 80.0),
            class: Size::new(180.0, 80.0),
            lifeline: Size::new(140.0, 400.0),
            service: Size::new(80.0, 80.0),
            group: Size::new(240.0, 160.0),
            junction: Size::new(16.0, 16.0),
        }
    }
}

impl DimensionConfig {
    pub fn size_for(&self, shape_type: ShapeType) -> Size {
        match shape_type {
            ShapeType::Event => self.event,
            ShapeType::Gateway => self.gateway,
            ShapeType::Task => self.task,
            ShapeType::Subprocess => self.subprocess,
            ShapeType::Class => self.class,
            ShapeType::Lifeline => self.lifeline,
            ShapeType::Service => self.service,
            ShapeType::Group => self.group,
            ShapeType::Junction => self.junction,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub layout: LayoutConfig,
    pub dimensions: DimensionConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpacingConfigFile {
    horizontal_spacing: Option<f64>,
    vertical_spacing: Option<f64>,
}

impl SpacingConfigFile {
    fn apply(self, target: &mut SpacingConfig) {
        if let Some(v) = self.horizontal_spacing {
            target.horizontal_spacing = v;
        }
        if let Some(v) = self.vertical_spacing {
            target.vertical_spacing = v;
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    flowchart: Option<SpacingConfigFile>,
    class: Option<SpacingConfigFile>,
    sequence: Option<SpacingConfigFile>,
    architecture: Option<SpacingConfigFile>,
    order_passes: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DimensionConfigFile {
    event: Option<Size>,
    gateway: Option<Size>,
    task: Option<Size>,
    subprocess: Option<Size>,
    class: Option<Size>,
    lifeline: Option<Size>,
    service: Option<Size>,
    group: Option<Size>,
    junction: Option<Size>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    layout: Option<LayoutConfigFile>,
    dimensions: Option<DimensionConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parses config text as JSON, falling back to JSON5 for hand-written files.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let parsed: ConfigFile = match serde_json::from_str(contents) {
        Ok(parsed) => parsed,
        Err(json_err) => json5::from_str(contents)
            .map_err(|_| anyhow::anyhow!("invalid config file: {json_err}"))?,
    };

    let mut config = Config::default();

    if let Some(layout) = parsed.layout {
        if let Some(v) = layout.flowchart {
            v.apply(&mut config.layout.flowchart);
        }
        if let Some(v) = layout.class {
            v.apply(&mut config.layout.class);
        }
        if let Some(v) = layout.sequence {
            v.apply(&mut config.layout.sequence);
        }
        if let Some(v) = layout.architecture {
            v.apply(&mut config.layout.architecture);
        }
        if let Some(v) = layout.order_passes {
            config.layout.order_passes = v;
        }
    }

    if let Some(dims) = parsed.dimensions {
        let target = &mut config.dimensions;
        if let Some(v) = dims.event {
            target.event = v;
        }
        if let Some(v) = dims.gateway {
            target.gateway = v;
        }
        if let Some(v) = dims.task {
            target.task = v;
        }
        if let Some(v) = dims.subprocess {
            target.subprocess = v;
        }
        if let Some(v) = dims.class {
            target.class = v;
        }
        if let Some(v) = dims.lifeline {
            target.lifeline = v;
        }
        if let Some(v) = dims.service {
            target.service = v;
        }
        if let Some(v) = dims.group {
            target.group = v;
        }
        if let Some(v) = dims.junction {
            target.junction = v;
        }
    }

    Ok(config)
}
