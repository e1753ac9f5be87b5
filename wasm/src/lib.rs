use mermaid_canvas::config::parse_config;
use mermaid_canvas::{Diagram, ImportOptions, LayoutStrategy, Point, export_mermaid, import_mermaid};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MermaidImportOptions {
    center_x: Option<f64>,
    center_y: Option<f64>,
    strategy: Option<LayoutStrategy>,
    /// Same shape as the CLI config file.
    config: Option<serde_json::Value>,
}

fn build_import_options(options: MermaidImportOptions) -> Result<ImportOptions, String> {
    let mut import_options = ImportOptions::centered_on(Point::new(
        options.center_x.unwrap_or_default(),
        options.center_y.unwrap_or_default(),
    ));
    import_options.strategy = options.strategy;
    if let Some(config) = options.config {
        import_options.config = parse_config(&config.to_string()).map_err(|error| error.to_string())?;
    }
    Ok(import_options)
}

fn to_js(error: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&error.to_string())
}

/// Imports Mermaid text and returns the canvas diagram as JSON.
#[wasm_bindgen]
pub fn import_mermaid_json(code: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let options = match options_json {
        Some(raw_options) => serde_json::from_str::<MermaidImportOptions>(&raw_options).map_err(to_js)?,
        None => MermaidImportOptions::default(),
    };
    let import_options = build_import_options(options).map_err(to_js)?;
    let diagram = import_mermaid(code, &import_options).map_err(to_js)?;
    serde_json::to_string(&diagram).map_err(to_js)
}

#[wasm_bindgen]
pub fn export_mermaid_text(diagram_json: &str) -> Result<String, JsValue> {
    let diagram: Diagram = serde_json::from_str(diagram_json).map_err(to_js)?;
    export_mermaid(&diagram).map_err(to_js)
}

#[cfg(test)]
mod tests {
    use mermaid_canvas::{Diagram, export_mermaid, import_mermaid};

    use crate::{MermaidImportOptions, build_import_options};

    #[test]
    fn options_center_the_diagram() {
        let options: MermaidImportOptions =
            serde_json::from_str(r#"{"centerX": 500, "centerY": 300, "strategy": "grid"}"#).unwrap();
        let import_options = build_import_options(options).unwrap();
        let diagram = import_mermaid(
            "flowchart LR\nA((Start)) --> B[Process Order]\nB --> C{Payment Valid?}",
            &import_options,
        )
        .unwrap();
        let center = diagram.mean_center().unwrap();
        assert!((center.x - 500.0).abs() < 1e-9);
        assert!((center.y - 300.0).abs() < 1e-9);
    }

    #[test]
    fn diagram_json_round_trips_through_export() {
        let options = build_import_options(MermaidImportOptions {
            config: Some(serde_json::json!({ "layout": { "flowchart": { "horizontalSpacing": 300 } } })),
            ..MermaidImportOptions::default()
        })
        .unwrap();
        let diagram = import_mermaid("flowchart TD\nA --> B", &options).unwrap();
        let json = serde_json::to_string(&diagram).unwrap();
        let decoded: Diagram = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, diagram);
        assert!(export_mermaid(&decoded).unwrap().contains("n0 --> n1"));
    }
}
