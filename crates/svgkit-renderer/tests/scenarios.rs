//! End-to-end scenarios: markup in, draws and hit tests out.

use svgkit_canvas::{DrawCommand, PaintStyle};
use svgkit_common::{IndexConfig, ViewerConfig};
use svgkit_index::Point;
use svgkit_renderer::{spawn_build, RecordingHost, Renderer, Scene, ViewTransform};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn scene(svg: &str) -> Scene {
    init_tracing();
    Scene::parse_str(svg, &ViewerConfig::default()).expect("scene builds")
}

fn renderer(svg: &str) -> Renderer<RecordingHost> {
    Renderer::new(scene(svg), RecordingHost::new(), &ViewerConfig::default())
}

#[test]
fn test_shape1_round_trip() {
    let r = renderer(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="200">
             <path id="shape1" d="M 5 5 L 45 5 L 45 30 L 5 30 Z" transform="translate(10,20)" style="fill:red"/>
           </svg>"#,
    );
    // First path coordinate plus the translation.
    assert_eq!(r.locate(15.0, 25.0), Some("shape1"));
    assert_eq!(r.locate(30.0, 40.0), Some("shape1"));
    assert_eq!(r.locate(4.0, 4.0), None);
}

#[test]
fn test_eleven_squares_split_root() {
    let positions = [
        (5, 5),
        (15, 5),
        (25, 5),
        (55, 5),
        (65, 5),
        (75, 5),
        (5, 55),
        (15, 55),
        (25, 55),
        (55, 55),
        (65, 55),
    ];
    let mut svg = String::from(r#"<svg width="100" height="100">"#);
    for (i, (x, y)) in positions.iter().enumerate() {
        svg.push_str(&format!(r#"<rect id="s{i}" x="{x}" y="{y}" width="1" height="1"/>"#));
    }
    svg.push_str("</svg>");

    let scene = scene(&svg);
    let index = scene.index();
    assert_eq!(index.len(), 11);
    assert!(index.is_split());
    assert_eq!(index.count_leaves(), 4);

    for (i, (x, y)) in positions.iter().enumerate() {
        let hit = scene.hit(Point::new(*x as f32 + 0.5, *y as f32 + 0.5)).unwrap();
        assert_eq!(scene.sprite_name(hit), Some(format!("s{i}").as_str()));
    }
}

#[test]
fn test_dense_grid_every_cell_found() {
    let mut svg = String::from(r#"<svg width="100" height="100">"#);
    for row in 0..20 {
        for col in 0..20 {
            svg.push_str(&format!(
                r#"<rect id="c{row}_{col}" x="{}" y="{}" width="5" height="5"/>"#,
                col * 5,
                row * 5
            ));
        }
    }
    svg.push_str("</svg>");

    let r = renderer(&svg);
    assert_eq!(r.scene().index().len(), 400);
    assert!(r.scene().index().depth() > 1);
    for row in 0..20 {
        for col in 0..20 {
            let name = format!("c{row}_{col}");
            let (x, y) = (col as f32 * 5.0 + 2.5, row as f32 * 5.0 + 2.5);
            assert_eq!(r.locate(x, y), Some(name.as_str()), "at ({x}, {y})");
        }
    }
}

#[test]
fn test_coincident_sprites_respect_depth_cap() {
    let mut svg = String::from(r#"<svg width="64" height="64">"#);
    for i in 0..40 {
        svg.push_str(&format!(r#"<rect id="same{i}" x="10" y="10" width="2" height="2"/>"#));
    }
    svg.push_str("</svg>");

    let config = ViewerConfig {
        index: IndexConfig {
            max_node_capacity: 4,
            max_depth: 5,
        },
        ..ViewerConfig::default()
    };
    let scene = Scene::parse_str(&svg, &config).unwrap();
    assert!(scene.index().depth() <= 5);
    assert_eq!(scene.index().query_point(Point::new(11.0, 11.0)).len(), 40);
    // Equal areas: the last one drawn wins.
    let hit = scene.hit(Point::new(11.0, 11.0)).unwrap();
    assert_eq!(scene.sprite_name(hit), Some("same39"));
}

#[test]
fn test_missing_gradient_disables_fill_only() {
    let mut r = renderer(
        r#"<svg width="100" height="100">
             <rect id="a" width="40" height="40" style="fill:url(#missingGrad);stroke:black"/>
             <rect id="b" x="50" y="50" width="40" height="40" fill="green"/>
           </svg>"#,
    );
    assert!(r.scene().diagnostics().iter().any(|d| d.message.contains("missingGrad")));
    assert_eq!(r.locate(20.0, 20.0), Some("a"));
    assert_eq!(r.locate(70.0, 70.0), Some("b"));

    r.render().unwrap();
    let commands = r.host().last_frame().unwrap().commands();
    let fills = commands
        .iter()
        .filter(|c| matches!(c, DrawCommand::FillPath { .. }))
        .count();
    let strokes = commands
        .iter()
        .filter(|c| matches!(c, DrawCommand::StrokePath { .. }))
        .count();
    assert_eq!(fills, 1);
    assert_eq!(strokes, 1);
}

#[test]
fn test_nested_transforms_compose_in_document_order() {
    let mut r = renderer(
        r#"<svg width="50" height="50">
             <g transform="scale(2)">
               <g transform="translate(5,0)">
                 <path d="M 1 0 L 2 0 L 2 1 Z"/>
               </g>
             </g>
           </svg>"#,
    );
    r.render().unwrap();

    let transform = r
        .host()
        .last_frame()
        .unwrap()
        .commands()
        .iter()
        .find_map(|c| match c {
            DrawCommand::FillPath { transform, .. } => Some(*transform),
            _ => None,
        })
        .unwrap();
    let (x, y) = transform.apply(1.0, 0.0);
    assert!((x - 7.0).abs() < 1e-5 && y.abs() < 1e-5, "got ({x}, {y})");
}

#[test]
fn test_gradient_fill_reaches_context() {
    let mut r = renderer(
        r##"<svg width="100" height="100">
             <defs>
               <linearGradient id="fade" x1="0" y1="0" x2="1" y2="0">
                 <stop offset="0" stop-color="#000"/>
                 <stop offset="1" stop-color="#fff"/>
               </linearGradient>
             </defs>
             <rect id="bar" x="10" y="10" width="80" height="20" fill="url(#fade)"/>
           </svg>"##,
    );
    r.render().unwrap();
    let paint = r
        .host()
        .last_frame()
        .unwrap()
        .commands()
        .iter()
        .find_map(|c| match c {
            DrawCommand::FillPath { paint, .. } => Some(paint.clone()),
            _ => None,
        })
        .unwrap();
    match paint {
        PaintStyle::LinearGradient(g) => {
            assert_eq!((g.x0, g.y0, g.x1, g.y1), (10.0, 10.0, 90.0, 10.0));
            assert_eq!(g.stops.len(), 2);
        }
        other => panic!("expected linear gradient, got {other:?}"),
    }
}

#[test]
fn test_used_symbol_is_locatable() {
    let r = renderer(
        r##"<svg width="100" height="100" viewBox="0 0 50 50">
             <symbol id="pin"><rect width="5" height="5"/></symbol>
             <use id="pin-a" href="#pin" x="10" y="10"/>
             <use id="pin-b" href="#pin" x="30" y="30"/>
           </svg>"##,
    );
    // viewBox doubles everything.
    assert_eq!(r.locate(25.0, 25.0), Some("pin-a"));
    assert_eq!(r.locate(65.0, 65.0), Some("pin-b"));
    assert_eq!(r.locate(45.0, 45.0), None);
}

#[test]
fn test_zoomed_locate() {
    let mut r = renderer(
        r#"<svg width="100" height="100">
             <rect id="tiny" x="49" y="49" width="2" height="2"/>
           </svg>"#,
    );
    r.set_view(ViewTransform::uniform(10.0, -450.0, -450.0)).unwrap();
    assert_eq!(r.locate(50.0, 50.0), Some("tiny"));
    assert_eq!(r.locate(0.0, 0.0), None);
}

#[test]
fn test_background_build_swaps_in() {
    let config = ViewerConfig::default();
    let mut r = Renderer::new(
        scene(r#"<svg width="10" height="10"><rect id="old" width="10" height="10"/></svg>"#),
        RecordingHost::new(),
        &config,
    );

    let handle = spawn_build(
        r#"<svg width="10" height="10"><rect id="new" width="10" height="10"/></svg>"#.to_string(),
        config.clone(),
    )
    .unwrap();
    assert_eq!(r.locate(5.0, 5.0), Some("old"));

    let next = handle.wait().unwrap();
    let previous = r.replace_scene(next);
    assert_eq!(r.locate(5.0, 5.0), Some("new"));
    assert!(previous.document().sprites.find("old").is_some());
}
