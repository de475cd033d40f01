mod manifest;
mod renderer;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use sakuga_core::ExportConfig;
use sakuga_export::{preview_scene, ExportPipeline};
use sakuga_ir::{validate_scene, SourceDocument};
use sakuga_tnz::{scene_script, SCRIPT_SUCCESS_SENTINEL};

use manifest::DocumentManifest;
use renderer::ImageFileRenderer;

#[derive(Parser)]
#[command(
    name = "sakuga",
    version,
    about = "Sakuga — export layered animation documents to OpenToonz",
    long_about = "Sakuga translates a layered, keyframed animation document into an\nOpenToonz scene: numbered image sequences per layer, deduplicated held\nand cloned drawings, and a ToonzScript that assembles the exposure sheet."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a document manifest to an OpenToonz scene
    Export {
        /// Path to the document manifest (.json)
        #[arg()]
        manifest: PathBuf,

        /// Base directory for the scene directory (default: output)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Scene name override (default: the document name)
        #[arg(long)]
        scene_name: Option<String>,

        /// Path to a sakuga.config.toml (default: ./sakuga.config.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// Validate a manifest's timelines and scene without writing anything
    Check {
        /// Path to the document manifest (.json)
        #[arg()]
        manifest: PathBuf,

        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// Print the ToonzScript an export would produce
    Script {
        /// Path to the document manifest (.json)
        #[arg()]
        manifest: PathBuf,

        /// Scene name override (default: the document name)
        #[arg(long)]
        scene_name: Option<String>,

        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// Display version and exporter info
    Info,
}

/// Layer inclusion flags shared by the subcommands. Each one overrides the
/// corresponding config file field when set.
#[derive(Args)]
struct PolicyArgs {
    /// Include layers hidden in the source document
    #[arg(long)]
    include_invisible: bool,

    /// Include layers carrying the reference (guide) marker
    #[arg(long)]
    include_reference: bool,

    /// Include non-animated paint layers as single-image columns
    #[arg(long)]
    include_static: bool,

    /// Export each animated layer inside a group separately instead of
    /// flattening the group into one unit
    #[arg(long)]
    no_flatten_groups: bool,

    /// Deduplicate identical rendered content across layers
    #[arg(long)]
    dedup_across_layers: bool,
}

impl PolicyArgs {
    fn apply(&self, config: &mut ExportConfig) {
        if self.include_invisible {
            config.policy.include_invisible = true;
        }
        if self.include_reference {
            config.policy.include_reference = true;
        }
        if self.include_static {
            config.policy.include_static = true;
        }
        if self.no_flatten_groups {
            config.policy.flatten_animated_groups = false;
        }
        if self.dedup_across_layers {
            config.policy.cross_layer_dedup = true;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Export {
            manifest,
            output,
            scene_name,
            config,
            policy,
        } => cmd_export(manifest, output, scene_name, config, policy),
        Commands::Check { manifest, policy } => cmd_check(manifest, policy),
        Commands::Script {
            manifest,
            scene_name,
            policy,
        } => cmd_script(manifest, scene_name, policy),
        Commands::Info => cmd_info(),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<ExportConfig> {
    match path {
        Some(p) => ExportConfig::load_from_file(&p)
            .with_context(|| format!("failed to load config: {}", p.display())),
        None => {
            // Best-effort project config; a bare manifest is fine too.
            let default = std::path::Path::new("sakuga.config.toml");
            if default.exists() {
                ExportConfig::load_from_file(default)
                    .with_context(|| format!("failed to load config: {}", default.display()))
            } else {
                Ok(ExportConfig::default())
            }
        }
    }
}

fn cmd_export(
    manifest_path: PathBuf,
    output: Option<PathBuf>,
    scene_name: Option<String>,
    config_path: Option<PathBuf>,
    policy: PolicyArgs,
) -> Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    policy.apply(&mut config);
    if let Some(output) = output {
        config.output_dir = output;
    } else if config.output_dir == PathBuf::from(".") {
        config.output_dir = PathBuf::from("output");
    }
    if scene_name.is_some() {
        config.scene_name = scene_name;
    }

    let document = DocumentManifest::load(&manifest_path)
        .with_context(|| format!("failed to load manifest: {}", manifest_path.display()))?;
    let info = document.info();

    println!("🎬 Sakuga Exporter v{}", env!("CARGO_PKG_VERSION"));
    println!("   Source: {}", manifest_path.display());
    println!(
        "   {}x{} @ {}fps, {} frames",
        info.width, info.height, info.frame_rate, info.duration
    );

    let renderer = ImageFileRenderer::new(info.width, info.height);
    let pipeline = ExportPipeline::new(&document, &renderer, &config);
    let report = pipeline.run()?;

    println!(
        "   ✓ {} column(s), {} canonical frame(s), {} file(s) written",
        report.units_exported, report.canonical_frames, report.files_written
    );
    for (unit, error) in &report.unit_errors {
        println!("   ⚠️  Layer '{}' skipped: {}", unit, error);
    }
    for failure in &report.frame_failures {
        println!("   ⚠️  {}", failure);
    }
    if report.cancelled {
        anyhow::bail!("export cancelled");
    }

    let Some(script_path) = &report.scene_path else {
        anyhow::bail!("no layer survived export, scene not written");
    };
    println!("   📦 Scene script: {}", script_path.display());
    println!(
        "   ▶ Run it with OpenToonz; it prints \"{}\" on success.",
        SCRIPT_SUCCESS_SENTINEL
    );
    println!("   ⚡ Total: {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn cmd_check(manifest_path: PathBuf, policy: PolicyArgs) -> Result<()> {
    let mut config = ExportConfig::default();
    policy.apply(&mut config);

    println!("🔍 Checking {}", manifest_path.display());

    let document = DocumentManifest::load(&manifest_path)
        .with_context(|| format!("failed to load manifest: {}", manifest_path.display()))?;
    println!("   ✓ Manifest OK");

    let preview = preview_scene(&document, &config).map_err(|e| anyhow::anyhow!("{}", e))?;
    for (unit, error) in &preview.unit_errors {
        println!("   ⚠️  Layer '{}': {}", unit, error);
    }
    if preview.unit_errors.is_empty() {
        println!("   ✓ Timelines OK");
    }

    let scene = preview.scene;
    validate_scene(&scene).map_err(|errors| {
        let msgs: Vec<String> = errors.into_iter().map(|e| e.to_string()).collect();
        anyhow::anyhow!("scene validation errors:\n  {}", msgs.join("\n  "))
    })?;
    println!(
        "   ✓ Scene OK ({} level(s), {} column(s), {} frames)",
        scene.levels.len(),
        scene.columns.len(),
        scene.duration
    );

    println!();
    if preview.unit_errors.is_empty() {
        println!("   ✅ No errors found.");
        Ok(())
    } else {
        anyhow::bail!(
            "{} layer(s) failed timeline checks",
            preview.unit_errors.len()
        )
    }
}

fn cmd_script(manifest_path: PathBuf, scene_name: Option<String>, policy: PolicyArgs) -> Result<()> {
    let mut config = ExportConfig::default();
    policy.apply(&mut config);
    config.scene_name = scene_name;

    let document = DocumentManifest::load(&manifest_path)
        .with_context(|| format!("failed to load manifest: {}", manifest_path.display()))?;
    let preview = preview_scene(&document, &config).map_err(|e| anyhow::anyhow!("{}", e))?;
    // Script goes to stdout; keep skipped-layer warnings out of it.
    for (unit, error) in &preview.unit_errors {
        eprintln!("warning: layer '{}' skipped: {}", unit, error);
    }
    let script = scene_script(&preview.scene).map_err(|e| anyhow::anyhow!("{}", e))?;

    print!("{}", script);
    Ok(())
}

fn cmd_info() -> Result<()> {
    println!("🎬 Sakuga OpenToonz Exporter");
    println!("   Version:   {}", env!("CARGO_PKG_VERSION"));
    println!("   Input:     JSON document manifests + image files");
    println!("   Output:    PNG level sequences + ToonzScript scene");
    println!();
    println!("   Repository: https://github.com/sakuga-dev/sakuga");
    Ok(())
}
