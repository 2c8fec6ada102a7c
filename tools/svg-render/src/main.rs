//! Command-line front end for SvgKit.
//!
//! Provides commands for:
//! - Rendering an SVG document to PNG
//! - Locating the named shape under a view point
//! - Printing scene and index statistics
//!
//! ## Usage
//!
//! ```bash
//! # Render at twice the document size
//! svg-render render map.svg --output map.png --scale 2
//!
//! # Which region is under (120, 80)?
//! svg-render locate map.svg 120 80
//!
//! # Quadtree statistics as JSON
//! svg-render stats map.svg --json
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use svgkit_common::{init_logging, LogConfig, LogFormat, ViewerConfig};
use svgkit_renderer::{PixmapHost, Renderer, Scene, ViewTransform};

#[derive(Parser, Debug)]
#[command(name = "svg-render")]
#[command(about = "Render SVG documents and probe their hit-test index")]
struct Cli {
    /// Viewer configuration (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log format: pretty, compact or json
    #[arg(long, global = true, default_value = "compact")]
    log_format: String,

    /// Log filter directives, e.g. "svgkit_svg=trace"
    #[arg(long, global = true)]
    log_filter: Option<String>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rasterize a document to PNG
    Render {
        /// Input SVG
        input: PathBuf,
        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,
        /// Zoom factor applied to the document
        #[arg(short, long, default_value = "1.0")]
        scale: f32,
        /// Output width in pixels (defaults to the scaled document width)
        #[arg(long)]
        width: Option<u32>,
        /// Output height in pixels (defaults to the scaled document height)
        #[arg(long)]
        height: Option<u32>,
        /// Fit the whole document into the output size
        #[arg(long, conflicts_with = "stretch")]
        fit: bool,
        /// Stretch the document to fill the output size on both axes
        #[arg(long)]
        stretch: bool,
        /// Draw highlight feedback on the named shape
        #[arg(long)]
        highlight: Option<String>,
    },

    /// Print the name of the shape under a view point
    Locate {
        /// Input SVG
        input: PathBuf,
        x: f32,
        y: f32,
        /// Zoom factor of the view the point was taken in
        #[arg(short, long, default_value = "1.0")]
        scale: f32,
        /// Vertical zoom factor, when it differs from --scale
        #[arg(long)]
        scale_y: Option<f32>,
        /// Horizontal view offset
        #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
        offset_x: f32,
        /// Vertical view offset
        #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
        offset_y: f32,
        /// Print JSON instead of plain text
        #[arg(long)]
        json: bool,
    },

    /// Print scene, index and diagnostic statistics
    Stats {
        /// Input SVG
        input: PathBuf,
        /// Print JSON instead of plain text
        #[arg(long)]
        json: bool,
    },

    /// Print the effective viewer configuration
    Config,
}

#[derive(Serialize, Debug)]
struct LocateReport<'a> {
    x: f32,
    y: f32,
    name: Option<&'a str>,
    neighbors: Vec<&'a str>,
}

#[derive(Serialize, Debug)]
struct StatsReport {
    width: f32,
    height: f32,
    fragments: usize,
    sprites: usize,
    indexed: usize,
    definitions: usize,
    leaves: usize,
    depth: usize,
    entries: usize,
    fullest_leaf: usize,
    diagnostics: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = LogFormat::from_name(&cli.log_format)
        .with_context(|| format!("unknown log format '{}'", cli.log_format))?;
    let mut log_config = LogConfig::from_verbosity(cli.verbose).with_format(format);
    if let Some(filter) = &cli.log_filter {
        log_config = log_config.with_filter(filter.as_str());
    }
    init_logging(log_config);

    let stdout = std::io::stdout();
    run(cli, &mut stdout.lock())
}

fn load_config(path: Option<&Path>) -> Result<ViewerConfig> {
    match path {
        Some(path) => ViewerConfig::load(path).with_context(|| format!("loading config {}", path.display())),
        None => Ok(ViewerConfig::default()),
    }
}

fn open_scene(input: &Path, config: &ViewerConfig) -> Result<Scene> {
    let scene = Scene::open(input, config).with_context(|| format!("building scene from {}", input.display()))?;
    for diagnostic in scene.diagnostics() {
        tracing::warn!("{}: {diagnostic}", input.display());
    }
    Ok(scene)
}

fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Render {
            input,
            output,
            scale,
            width,
            height,
            fit,
            stretch,
            highlight,
        } => {
            if !(scale.is_finite() && scale > 0.0) {
                bail!("scale must be positive, got {scale}");
            }
            let scene = open_scene(&input, &config)?;
            config.render.width = width.unwrap_or((scene.width() * scale).ceil() as u32);
            config.render.height = height.unwrap_or((scene.height() * scale).ceil() as u32);

            let host = PixmapHost::new(config.render.anti_alias);
            let mut renderer = Renderer::new(scene, host, &config);
            if fit {
                renderer.fit_to_view();
            } else if stretch {
                renderer.stretch_to_view();
            } else {
                renderer.set_view(ViewTransform::uniform(scale, 0.0, 0.0))?;
            }
            if let Some(name) = highlight {
                renderer.scene().sprite_id(&name)?;
                renderer.highlight(&name);
            }

            renderer.render()?;
            let frame = renderer
                .host_mut()
                .take_frame()
                .context("renderer produced no frame")?;
            frame
                .save_png(&output)
                .with_context(|| format!("writing {}", output.display()))?;

            let (w, h) = renderer.view_size();
            writeln!(out, "Rendered {} ({w}x{h}) to {}", input.display(), output.display())?;
        }

        Commands::Locate {
            input,
            x,
            y,
            scale,
            scale_y,
            offset_x,
            offset_y,
            json,
        } => {
            let scene = open_scene(&input, &config)?;
            let mut renderer = Renderer::new(scene, PixmapHost::default(), &config);
            renderer.set_view(ViewTransform::new(scale, scale_y.unwrap_or(scale), offset_x, offset_y))?;

            let name = renderer.locate(x, y);
            let neighbors = name.map(|n| renderer.scene().neighbors(n)).unwrap_or_default();
            if json {
                let report = LocateReport { x, y, name, neighbors };
                writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            } else {
                match name {
                    Some(name) => writeln!(out, "{name}")?,
                    None => writeln!(out, "(none)")?,
                }
            }
        }

        Commands::Stats { input, json } => {
            let scene = open_scene(&input, &config)?;
            let stats = scene.stats();
            let report = StatsReport {
                width: scene.width(),
                height: scene.height(),
                fragments: stats.fragments,
                sprites: stats.sprites,
                indexed: stats.index.sprites,
                definitions: stats.definitions,
                leaves: stats.index.leaves,
                depth: stats.index.depth,
                entries: stats.index.entries,
                fullest_leaf: stats.index.fullest_leaf,
                diagnostics: scene.diagnostics().iter().map(ToString::to_string).collect(),
            };

            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            } else {
                writeln!(out, "Document:    {} x {}", report.width, report.height)?;
                writeln!(out, "Fragments:   {}", report.fragments)?;
                writeln!(out, "Sprites:     {} ({} indexed)", report.sprites, report.indexed)?;
                writeln!(out, "Definitions: {}", report.definitions)?;
                writeln!(
                    out,
                    "Quadtree:    {} leaves, depth {}, {} entries, fullest leaf {}",
                    report.leaves, report.depth, report.entries, report.fullest_leaf
                )?;
                writeln!(out, "Diagnostics: {}", report.diagnostics.len())?;
                for d in &report.diagnostics {
                    writeln!(out, "  {d}")?;
                }
            }
        }

        Commands::Config => {
            writeln!(out, "{}", config.to_json_string()?)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<svg width="40" height="20">
        <rect id="west" width="20" height="20" fill="red"/>
        <rect id="east" x="20" width="20" height="20" fill="blue"/>
        <blink/>
    </svg>"#;

    fn run_args(args: &[&str]) -> Result<String> {
        let cli = Cli::try_parse_from(std::iter::once("svg-render").chain(args.iter().copied()))?;
        let mut out = Vec::new();
        run(cli, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    fn write_doc(dir: &tempfile::TempDir) -> String {
        let path = dir.path().join("doc.svg");
        std::fs::write(&path, DOC).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_locate() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_doc(&dir);
        assert_eq!(run_args(&["locate", &input, "5", "5"]).unwrap().trim(), "west");
        assert_eq!(run_args(&["locate", &input, "30", "5"]).unwrap().trim(), "east");
        assert_eq!(run_args(&["locate", &input, "60", "5"]).unwrap().trim(), "(none)");
        assert_eq!(
            run_args(&["locate", &input, "60", "10", "--scale", "2"]).unwrap().trim(),
            "east"
        );
    }

    #[test]
    fn test_locate_non_uniform() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_doc(&dir);
        // Doubled x, halved y: view (50, 5) is document (25, 10).
        let args = ["locate", &input, "50", "5", "--scale", "2", "--scale-y", "0.5"];
        assert_eq!(run_args(&args).unwrap().trim(), "east");
    }

    #[test]
    fn test_render_stretch() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_doc(&dir);
        let output = dir.path().join("out.png");
        let out = output.to_str().unwrap();
        let message = run_args(&["render", &input, "-o", out, "--width", "40", "--height", "80", "--stretch"]).unwrap();
        assert!(message.contains("40x80"));
        assert!(run_args(&["render", &input, "-o", out, "--fit", "--stretch"]).is_err());
    }

    #[test]
    fn test_locate_json() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_doc(&dir);
        let json = run_args(&["locate", &input, "5", "5", "--json"]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["name"], "west");
        assert_eq!(value["neighbors"][0], "east");
    }

    #[test]
    fn test_render_png() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_doc(&dir);
        let output = dir.path().join("out.png");
        let message = run_args(&["render", &input, "-o", output.to_str().unwrap(), "--scale", "2"]).unwrap();
        assert!(message.contains("80x40"));
        let bytes = std::fs::read(&output).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn test_render_unknown_highlight_fails() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_doc(&dir);
        let output = dir.path().join("out.png");
        let result = run_args(&["render", &input, "-o", output.to_str().unwrap(), "--highlight", "north"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_stats_reports_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_doc(&dir);
        let json = run_args(&["stats", &input, "--json"]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["sprites"], 2);
        assert_eq!(value["leaves"], 1);
        assert_eq!(value["diagnostics"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.json");
        std::fs::write(&path, r#"{"index": {"max_node_capacity": 3}}"#).unwrap();
        let json = run_args(&["config", "--config", path.to_str().unwrap()]).unwrap();
        assert!(json.contains("\"max_node_capacity\": 3"));

        std::fs::write(&path, r#"{"index": {"max_node_capacity": 0}}"#).unwrap();
        assert!(run_args(&["config", "--config", path.to_str().unwrap()]).is_err());
    }

    #[test]
    fn test_missing_input() {
        assert!(run_args(&["stats", "/nonexistent/doc.svg"]).is_err());
    }
}
