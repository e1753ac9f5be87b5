use std::collections::HashSet;
use std::path::Path;

use mermaid_canvas::layout::LayoutStrategy;
use mermaid_canvas::parser::parse_diagram;
use mermaid_canvas::{
    Diagram, DiagramKind, ImportError, ImportOptions, Point, ShapeType, export_mermaid,
    import_mermaid,
};

// Keep this list explicit so new fixtures must be added intentionally.
const FIXTURES: [(&str, DiagramKind); 9] = [
    ("flowchart/checkout.mmd", DiagramKind::Flowchart),
    ("flowchart/pipeline.mmd", DiagramKind::Flowchart),
    ("flowchart/isolated.mmd", DiagramKind::Flowchart),
    ("class/shop.mmd", DiagramKind::Class),
    ("class/animals.mmd", DiagramKind::Class),
    ("sequence/login.mmd", DiagramKind::Sequence),
    ("sequence/queue.mmd", DiagramKind::Sequence),
    ("architecture/platform.mmd", DiagramKind::Architecture),
    ("architecture/edges.mmd", DiagramKind::Architecture),
];

fn read_fixture(rel: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(rel);
    assert!(path.exists(), "fixture missing: {rel}");
    std::fs::read_to_string(path).expect("fixture read failed")
}

fn import_fixture(rel: &str, options: &ImportOptions) -> Diagram {
    let input = read_fixture(rel);
    import_mermaid(&input, options).unwrap_or_else(|err| panic!("{rel}: {err}"))
}

fn shape_set(diagram: &Diagram) -> HashSet<String> {
    diagram
        .shapes
        .iter()
        .map(|s| format!("{:?}/{:?}/{}", s.shape_type, s.subtype, s.label))
        .collect()
}

fn connector_set(diagram: &Diagram) -> HashSet<String> {
    diagram
        .connectors
        .iter()
        .map(|c| {
            let source = diagram.shape(c.source_shape_id).expect("source shape");
            let target = diagram.shape(c.target_shape_id).expect("target shape");
            format!("{} -{:?}-> {}", source.label, c.relationship, target.label)
        })
        .collect()
}

fn overlaps(diagram: &Diagram) -> Option<(String, String)> {
    for (i, a) in diagram.shapes.iter().enumerate() {
        for b in &diagram.shapes[i + 1..] {
            let separate = a.x + a.width <= b.x
                || b.x + b.width <= a.x
                || a.y + a.height <= b.y
                || b.y + b.height <= a.y;
            if !separate {
                return Some((a.label.clone(), b.label.clone()));
            }
        }
    }
    None
}

#[test]
fn fixtures_import_as_their_dialect() {
    for (rel, kind) in FIXTURES {
        let diagram = import_fixture(rel, &ImportOptions::default());
        assert_eq!(diagram.kind, kind, "{rel}");
        assert!(!diagram.shapes.is_empty(), "{rel}: no shapes");
        assert!(diagram.indexed_connectors().is_ok(), "{rel}: dangling connector");
    }
}

#[test]
fn export_then_import_preserves_shapes_and_connectors() {
    for (rel, _) in FIXTURES {
        let diagram = import_fixture(rel, &ImportOptions::default());
        let text = export_mermaid(&diagram).unwrap_or_else(|err| panic!("{rel}: {err}"));
        let again = import_mermaid(&text, &ImportOptions::default())
            .unwrap_or_else(|err| panic!("{rel}: re-import failed: {err}\n{text}"));
        assert_eq!(again.kind, diagram.kind, "{rel}");
        assert_eq!(shape_set(&again), shape_set(&diagram), "{rel}\n{text}");
        assert_eq!(connector_set(&again), connector_set(&diagram), "{rel}\n{text}");
        assert_eq!(again.connectors.len(), diagram.connectors.len(), "{rel}");
    }
}

#[test]
fn default_layouts_do_not_overlap() {
    for (rel, _) in FIXTURES {
        let diagram = import_fixture(rel, &ImportOptions::default());
        if let Some((a, b)) = overlaps(&diagram) {
            panic!("{rel}: '{a}' overlaps '{b}'");
        }
    }
}

// Sequence spacing has no vertical pitch, so only the lane layout applies there.
#[test]
fn every_strategy_places_every_shape_without_overlap() {
    for strategy in [LayoutStrategy::Grid, LayoutStrategy::Flow, LayoutStrategy::Lane] {
        for (rel, kind) in FIXTURES {
            if kind == DiagramKind::Sequence {
                continue;
            }
            let options = ImportOptions {
                strategy: Some(strategy),
                ..ImportOptions::default()
            };
            let diagram = import_fixture(rel, &options);
            if let Some((a, b)) = overlaps(&diagram) {
                panic!("{rel} with {strategy:?}: '{a}' overlaps '{b}'");
            }
        }
    }
}

#[test]
fn diagrams_are_centred_on_the_requested_point() {
    let center = Point::new(500.0, 300.0);
    for (rel, _) in FIXTURES {
        let diagram = import_fixture(rel, &ImportOptions::centered_on(center));
        let mean = diagram.mean_center().expect("shapes");
        assert!((mean.x - center.x).abs() < 1e-6, "{rel}: x {}", mean.x);
        assert!((mean.y - center.y).abs() < 1e-6, "{rel}: y {}", mean.y);
    }
}

#[test]
fn fixture_contents_are_understood() {
    let checkout = import_fixture("flowchart/checkout.mmd", &ImportOptions::default());
    assert_eq!(checkout.shapes.len(), 6);
    assert_eq!(checkout.connectors.len(), 6);

    let pipeline = import_fixture("flowchart/pipeline.mmd", &ImportOptions::default());
    let labels: Vec<&str> = pipeline.shapes.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, ["Plan", "Build", "Test", "Release", "Monitor", "Alert"]);
    assert_eq!(pipeline.connectors.len(), 6);

    let shop = import_fixture("class/shop.mmd", &ImportOptions::default());
    assert_eq!(shop.shapes.len(), 6);
    assert!(shop.shapes.iter().all(|s| s.shape_type == ShapeType::Class));

    let login = import_fixture("sequence/login.mmd", &ImportOptions::default());
    let labels: Vec<&str> = login.shapes.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, ["User", "Web App", "Auth Service", "Audit"]);
    assert_eq!(login.connectors.len(), 6);

    let platform = import_fixture("architecture/platform.mmd", &ImportOptions::default());
    let groups = platform
        .shapes
        .iter()
        .filter(|s| s.shape_type == ShapeType::Group)
        .count();
    assert_eq!(groups, 2);
    assert_eq!(platform.connectors.len(), 5);
}

#[test]
fn failures_are_typed() {
    assert_eq!(
        import_mermaid("", &ImportOptions::default()).unwrap_err(),
        ImportError::EmptyInput
    );
    assert_eq!(
        import_mermaid("gantt\ntitle Plan", &ImportOptions::default()).unwrap_err(),
        ImportError::UnknownDiagramType {
            found: "gantt".to_string()
        }
    );
    assert_eq!(
        parse_diagram(DiagramKind::Class, "flowchart TD\nA --> B").unwrap_err(),
        ImportError::MissingHeader {
            expected: "classDiagram"
        }
    );
}

#[test]
fn malformed_class_reference_is_lenient() {
    let diagram =
        import_mermaid("classDiagram\nclassA <|-- ClassB", &ImportOptions::default()).unwrap();
    let labels: Vec<&str> = diagram.shapes.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, ["classA", "ClassB"]);
    assert_eq!(diagram.connectors.len(), 1);
}
