//! Single tree generation utility
//!
//! Runs the full pipeline for one species preset or JSON config and prints
//! the generation report as JSON. No mesh files are written.
//!
//! Usage:
//!     generate_tree [OPTIONS]
//!
//! Options:
//!     -s, --species <NAME>      oak, willow, elm, winter_oak, winter_willow (default: oak)
//!     --seed <SEED>             RNG seed (default: 12345)
//!     -c, --config <PATH>       JSON generation config (overrides --species)
//!     --view-distance <METERS>  Score branch tiers from a viewer this far away
//!     --dump-config             Print the resolved config as JSON and exit
//!     -h, --help                Show this help message

use std::env;
use std::path::PathBuf;
use std::time::Instant;

use arbor::generation::{GenerationConfig, TreeGenerator};
use arbor::lod::Viewer;
use arbor::procgen::Species;
use glam::Vec3;

fn print_help() {
    eprintln!("generate_tree - Single tree generation utility");
    eprintln!();
    eprintln!("Usage: generate_tree [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("    -s, --species <NAME>      oak, willow, elm, winter_oak, winter_willow (default: oak)");
    eprintln!("    --seed <SEED>             RNG seed (default: 12345)");
    eprintln!("    -c, --config <PATH>       JSON generation config (overrides --species)");
    eprintln!("    --view-distance <METERS>  Score branch tiers from a viewer this far away");
    eprintln!("    --dump-config             Print the resolved config as JSON and exit");
    eprintln!("    -h, --help                Show this help message");
    eprintln!();
    eprintln!("Example:");
    eprintln!("    generate_tree -s willow --seed 7");
    eprintln!("    generate_tree --dump-config > tree.json && generate_tree -c tree.json");
}

#[derive(Debug)]
struct Args {
    species: Species,
    seed: Option<u64>,
    config: Option<PathBuf>,
    view_distance: Option<f32>,
    dump_config: bool,
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = env::args().skip(1).collect();

    let mut species = Species::Oak;
    let mut seed: Option<u64> = None;
    let mut config: Option<PathBuf> = None;
    let mut view_distance: Option<f32> = None;
    let mut dump_config = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-s" | "--species" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --species".to_string());
                }
                species = args[i].parse().map_err(|e| format!("{}", e))?;
            }
            "--seed" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --seed".to_string());
                }
                seed = Some(args[i].parse().map_err(|_| format!("Invalid seed: {}", args[i]))?);
            }
            "-c" | "--config" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --config".to_string());
                }
                config = Some(PathBuf::from(&args[i]));
            }
            "--view-distance" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --view-distance".to_string());
                }
                let d: f32 = args[i]
                    .parse()
                    .map_err(|_| format!("Invalid view distance: {}", args[i]))?;
                if !(d.is_finite() && d >= 0.0) {
                    return Err(format!("Invalid view distance: {}", args[i]));
                }
                view_distance = Some(d);
            }
            "--dump-config" => dump_config = true,
            other => {
                return Err(format!("Unknown option: {}", other));
            }
        }
        i += 1;
    }

    Ok(Args {
        species,
        seed,
        config,
        view_distance,
        dump_config,
    })
}

fn resolve_config(args: &Args) -> Result<GenerationConfig, String> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
            GenerationConfig::from_json_str(&json).map_err(|e| e.to_string())?
        }
        None => args.species.config(12345),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(distance) = args.view_distance {
        let viewer = config.tessellation.viewer.unwrap_or_default();
        let far = viewer.far.max(distance + 1.0);
        config.tessellation.viewer = Some(Viewer {
            position: Vec3::new(0.0, viewer.position.y, distance),
            far,
            ..viewer
        });
    }
    Ok(config)
}

fn main() {
    arbor::core::logging::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_help();
            std::process::exit(1);
        }
    };

    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if args.dump_config {
        match config.to_json_string() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let generator = match TreeGenerator::new(config) {
        Ok(generator) => generator,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let start = Instant::now();
    let tree = match generator.generate() {
        Ok(tree) => tree,
        Err(e) => {
            eprintln!("Generation failed: {}", e);
            std::process::exit(1);
        }
    };
    log::info!("Completed in {:.2}s", start.elapsed().as_secs_f64());

    match serde_json::to_string_pretty(&tree.report) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize report: {}", e);
            std::process::exit(1);
        }
    }
}
