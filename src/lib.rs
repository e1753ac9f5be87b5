//! Mermaid import/export for design canvases.
//!
//! [`import_mermaid`] turns flowchart, class, sequence or architecture
//! diagram text into positioned [`Shape`]s and [`Connector`]s centred on a
//! canvas point; [`export_mermaid`] writes such a graph back out.

pub mod assemble;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod ir;
pub mod layout;
pub mod parser;
pub mod shape;

pub use assemble::{
    Connector, ConnectorId, Diagram, IdTranslation, IndexedConnector, Marker, PendingImport,
    Point, Shape, ShapeData, ShapeId,
};
#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, load_config};
pub use error::{ExportError, ImportError};
pub use export::export_mermaid;
pub use ir::{DiagramKind, Direction};
pub use layout::LayoutStrategy;
pub use parser::parse_mermaid;
pub use shape::{ShapeSubtype, ShapeType};

use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Canvas point the mean of the shape centres lands on.
    pub center: Point,
    /// Overrides the per-dialect default layout strategy.
    pub strategy: Option<LayoutStrategy>,
    pub config: Config,
}

impl ImportOptions {
    pub fn centered_on(center: Point) -> Self {
        Self {
            center,
            ..Self::default()
        }
    }
}

/// Parse, lay out and assemble `input` in one pass.
pub fn import_mermaid(input: &str, options: &ImportOptions) -> Result<Diagram, ImportError> {
    let parsed = parser::parse_mermaid(input)?;
    let mut config = options.config.clone();
    if let Some(init) = &parsed.init_config {
        config
            .layout
            .apply_init_config(parsed.kind, parsed.direction, init);
    }
    let strategy = options
        .strategy
        .unwrap_or_else(|| LayoutStrategy::default_for(parsed.kind));
    debug!(kind = %parsed.kind, ?strategy, "importing mermaid diagram");
    let positions = layout::compute_layout(&parsed, strategy, &config.layout);
    assemble::assemble(&parsed, &positions, &config, options.center)
}

/// Like [`import_mermaid`], but the result keeps temporary ids until it is
/// committed.
pub fn import_mermaid_pending(
    input: &str,
    options: &ImportOptions,
) -> Result<PendingImport, ImportError> {
    import_mermaid(input, options).map(PendingImport::new)
}
