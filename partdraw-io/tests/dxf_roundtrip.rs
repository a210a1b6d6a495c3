use partdraw_core::{
    document::{DimensionKind, DimensionStyle, Document, Entity},
    geometry::Point2,
};
use partdraw_io::{DocumentLoader, DocumentSaver, DocumentWriter, DxfFacade};

fn sample_document() -> Document {
    let mut doc = Document::new();
    doc.add_layer("CONTOUR", 7);
    doc.add_layer("HOLES", 1);
    doc.add_layer("TEXT", 2);
    doc.add_layer("DIMENSIONS", 2);
    doc.add_dimension_style(DimensionStyle::scaled("PARTDRAW", 5.0));
    doc.add_polyline(
        [
            Point2::new(0.0, 0.0),
            Point2::new(100.0, 0.0),
            Point2::new(100.0, 50.0),
            Point2::new(0.0, 50.0),
        ],
        true,
        "CONTOUR",
    );
    doc.add_text(Point2::new(0.0, -10.0), "CHAPA Nº1", 5.0, 0.0, "TEXT");
    doc.add_aligned_dimension(
        Point2::new(0.0, 50.0),
        Point2::new(100.0, 50.0),
        15.0,
        "PARTDRAW",
        "DIMENSIONS",
    )
    .expect("style registered");
    doc
}

#[test]
fn written_document_loads_back_with_same_content() {
    let facade = DxfFacade::new();
    let content = facade
        .write_to_string(&sample_document())
        .expect("写出 DXF 失败");

    assert!(content.starts_with("  0\nSECTION\n  2\nHEADER\n"));
    assert!(content.ends_with("  0\nEOF\n"));
    assert!(content.contains("AC1009"));
    assert!(content.contains("CHAPA N\\U+00BA1"));

    let doc = facade.parse_str(&content).expect("读取 DXF 失败");
    let layers: Vec<(String, i16)> = doc
        .layers()
        .map(|layer| (layer.name.clone(), layer.color))
        .collect();
    assert_eq!(
        layers,
        vec![
            ("0".to_string(), 7),
            ("CONTOUR".to_string(), 7),
            ("HOLES".to_string(), 1),
            ("TEXT".to_string(), 2),
            ("DIMENSIONS".to_string(), 2),
        ]
    );

    let style = doc.dimension_style("PARTDRAW").expect("未找到标注样式");
    assert!((style.text_height - 5.0).abs() < 1e-9);

    let entities: Vec<&Entity> = doc.entities().map(|(_, entity)| entity).collect();
    assert_eq!(entities.len(), 3);

    match entities[0] {
        Entity::Polyline(polyline) => {
            assert_eq!(polyline.layer, "CONTOUR");
            assert!(polyline.is_closed);
            let points: Vec<(f64, f64)> = polyline
                .vertices
                .iter()
                .map(|vertex| (vertex.position.x(), vertex.position.y()))
                .collect();
            assert_eq!(
                points,
                vec![(0.0, 0.0), (100.0, 0.0), (100.0, 50.0), (0.0, 50.0)]
            );
        }
        other => panic!("期望多段线，实际为 {other:?}"),
    }

    match entities[1] {
        Entity::Text(text) => {
            assert_eq!(text.content, "CHAPA Nº1");
            assert_eq!(text.layer, "TEXT");
            assert!((text.insert.y() + 10.0).abs() < 1e-9);
        }
        other => panic!("期望文字，实际为 {other:?}"),
    }

    match entities[2] {
        Entity::Dimension(dimension) => {
            assert!(matches!(dimension.kind, DimensionKind::Aligned));
            assert_eq!(dimension.style_name, "PARTDRAW");
            assert_eq!(dimension.layer, "DIMENSIONS");
            assert!((dimension.measurement - 100.0).abs() < 1e-9);
            assert!((dimension.definition_point.y() - 65.0).abs() < 1e-9);
        }
        other => panic!("期望标注，实际为 {other:?}"),
    }
}

#[test]
fn dimension_is_rendered_into_anonymous_block() {
    let content = DxfFacade::new()
        .write_to_string(&sample_document())
        .expect("写出 DXF 失败");
    assert!(content.contains("  2\n*D0\n"));
    assert!(content.contains("SOLID"));
    // 测量文字写在块内。
    assert!(content.contains("  1\n100\n"));
}

#[test]
fn writing_is_deterministic() {
    let facade = DxfFacade::new();
    let first = facade.write_to_string(&sample_document()).expect("first");
    let second = facade.write_to_string(&sample_document()).expect("second");
    assert_eq!(first, second);
}

#[test]
fn dimension_with_unknown_style_is_rejected() {
    let mut doc = sample_document();
    let mut orphan = match doc.entities().find_map(|(_, entity)| match entity {
        Entity::Dimension(dimension) => Some(dimension.clone()),
        _ => None,
    }) {
        Some(dimension) => dimension,
        None => panic!("sample document has a dimension"),
    };
    orphan.style_name = "MISSING".to_string();
    doc.add_dimension(orphan);

    let err = DxfFacade::new()
        .write_to_string(&doc)
        .expect_err("未定义样式应报错");
    assert!(err.to_string().contains("MISSING"));
}

#[test]
fn non_finite_coordinates_are_rejected() {
    let mut doc = Document::new();
    doc.add_polyline([Point2::new(f64::NAN, 0.0)], false, "CONTOUR");
    assert!(DxfFacade::new().write_to_string(&doc).is_err());
}

#[test]
fn save_and_load_through_file() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("part.dxf");
    let facade = DxfFacade::new();
    facade.save(&sample_document(), &path).expect("保存失败");

    let loaded = facade.load(&path).expect("加载失败");
    assert_eq!(loaded.entities().count(), 3);
    assert!(loaded.layer("HOLES").is_some());
}
