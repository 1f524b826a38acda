use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use matid_core::config::{self, MaterialIdMode, ToolConfig};
use matid_core::scene::{schema, NewImage, ObjectId, Scene};
use matid_core::{tools, ColorSequence, Rgba, VERSION};

#[derive(Parser, Debug)]
#[command(name = "matid", version = VERSION, about = "Material ID and combine-children scene tools")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the material ID color sequence
    Colors {
        #[arg(long, default_value_t = 12)]
        count: u64,
        #[arg(long, default_value_t = 0)]
        start: u64,
        /// Emit a JSON array instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Load a scene and print its object hierarchy
    Inspect { scene: PathBuf },
    /// Combine the selected objects and their child meshes into one mesh
    Combine {
        scene: PathBuf,
        /// Tool settings (YAML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Where to write the result; defaults to the input scene
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Generate material ID shaders on the selected meshes
    MaterialId {
        scene: PathBuf,
        /// Also add an image texture node bound to the chosen image
        #[arg(long)]
        textured: bool,
        /// Work on the selected objects instead of duplicates
        #[arg(long)]
        no_duplicate: bool,
        /// Image for --textured, overriding the config
        #[arg(long)]
        image: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Add a blank square image to a scene
    NewImage {
        scene: PathBuf,
        #[arg(long, default_value = "Untitled")]
        name: String,
        #[arg(long, default_value_t = 2048)]
        resolution: u64,
        #[arg(long)]
        no_alpha: bool,
        #[arg(long)]
        float32: bool,
        /// Fill color as r,g,b,a
        #[arg(long, default_value = "0,0,0,1")]
        color: String,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Register an image file in a scene
    OpenImage {
        scene: PathBuf,
        path: PathBuf,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn load_scene(path: &Path) -> Result<Scene> {
    schema::load_from_path(path).with_context(|| format!("loading scene {}", path.display()))
}

fn save_scene(scene: &Scene, input: &Path, out: Option<&Path>) -> Result<()> {
    let target = out.unwrap_or(input);
    schema::save_to_path(scene, target).with_context(|| format!("writing scene {}", target.display()))?;
    info!("wrote {}", target.display());
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ToolConfig> {
    match path {
        Some(p) => config::load_from_path(p).with_context(|| format!("loading config {}", p.display())),
        None => Ok(ToolConfig::default()),
    }
}

fn parse_color(s: &str) -> Result<Rgba> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f64>().with_context(|| format!("bad color component '{}'", p)))
        .collect::<Result<Vec<_>>>()?;
    match parts.as_slice() {
        [r, g, b, a] => Ok(Rgba::new(*r, *g, *b, *a)),
        _ => bail!("color needs four components (r,g,b,a), got {}", parts.len()),
    }
}

fn name_of(scene: &Scene, id: ObjectId) -> &str {
    scene.object(id).map(|o| o.name.as_str()).unwrap_or("?")
}

fn print_tree(scene: &Scene) {
    let mut stack: Vec<(ObjectId, usize)> = scene.roots().into_iter().rev().map(|id| (id, 0)).collect();
    while let Some((id, depth)) = stack.pop() {
        let Some(obj) = scene.object(id) else { continue };
        let mut line = format!("{}{} [{:?}]", "  ".repeat(depth), obj.name, obj.kind);
        if let Some(mesh) = scene.mesh_of(id) {
            line.push_str(&format!(" tris={}", mesh.geometry.triangle_count()));
        }
        if !obj.modifiers.is_empty() {
            let mods: Vec<_> = obj.modifiers.iter().map(|m| format!("{}:{}", m.name, m.kind.type_name())).collect();
            line.push_str(&format!(" modifiers=[{}]", mods.join(", ")));
        }
        if !obj.material_slots.is_empty() {
            let mats: Vec<_> = obj
                .material_slots
                .iter()
                .map(|s| s.and_then(|m| scene.material(m)).map_or("-", |m| m.name.as_str()))
                .collect();
            line.push_str(&format!(" materials=[{}]", mats.join(", ")));
        }
        if obj.selected {
            line.push_str(" *");
        }
        if scene.active() == Some(id) {
            line.push_str(" (active)");
        }
        println!("{}", line);
        for &child in scene.children(id).iter().rev() {
            stack.push((child, depth + 1));
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Colors { count, start, json } => {
            let colors: Vec<_> = ColorSequence::starting_at(start).take(count as usize).collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&colors)?);
            } else {
                for (i, c) in colors.iter().enumerate() {
                    println!("{:>6}  {:.5} {:.5} {:.5} {:.1}", start + i as u64, c.r, c.g, c.b, c.a);
                }
            }
        }
        Command::Inspect { scene } => {
            let s = load_scene(&scene)?;
            println!("Scene: {} ({} objects, mode {:?})", scene.display(), s.object_count(), s.mode());
            print_tree(&s);
            for c in s.collections() {
                let objs: Vec<_> = c.objects.iter().map(|id| name_of(&s, *id)).collect();
                println!("collection {}: {}", c.name, objs.join(", "));
            }
            for img in s.images() {
                println!("image {} ({}x{})", img.name, img.width, img.height);
            }
        }
        Command::Combine { scene, config, out } => {
            let cfg = load_config(config.as_deref())?;
            let mut s = load_scene(&scene)?;
            let report = tools::combine_children(&mut s, &cfg.combine).context("combining children")?;
            match report.combined {
                Some(id) => println!(
                    "Combined {} mesh(es) into {} ({} modifier(s) applied)",
                    report.meshes_joined,
                    name_of(&s, id),
                    report.modifiers_applied
                ),
                None => println!("No meshes to combine"),
            }
            save_scene(&s, &scene, out.as_deref())?;
        }
        Command::MaterialId { scene, textured, no_duplicate, image, config, out } => {
            let mut cfg = load_config(config.as_deref())?.material_id;
            if textured {
                cfg.mode = MaterialIdMode::Image;
            }
            if no_duplicate {
                cfg.create_duplicate = false;
            }
            if image.is_some() {
                cfg.image = image;
            }
            let mut s = load_scene(&scene)?;
            let report = tools::generate_material_ids(&mut s, &cfg).context("generating material IDs")?;
            for m in &report.assigned {
                println!(
                    "{:>4}  {:<24} {:<20} ({:.4}, {:.4}, {:.4}, {:.1})",
                    m.iteration, m.object, m.material, m.color.r, m.color.g, m.color.b, m.color.a
                );
            }
            if let Some(c) = &report.collection {
                println!("Duplicates linked into collection {}", c);
            }
            save_scene(&s, &scene, out.as_deref())?;
        }
        Command::NewImage { scene, name, resolution, no_alpha, float32, color, out } => {
            let mut s = load_scene(&scene)?;
            let opts = NewImage { name, resolution, alpha: !no_alpha, color: parse_color(&color)?.to_vec4(), float32 };
            let name = s.new_image(&opts)?;
            println!("Created image {}", name);
            save_scene(&s, &scene, out.as_deref())?;
        }
        Command::OpenImage { scene, path, out } => {
            let mut s = load_scene(&scene)?;
            let dims = match image::image_dimensions(&path) {
                Ok(d) => Some(d),
                Err(e) => {
                    warn!("could not read dimensions of {}: {}", path.display(), e);
                    None
                }
            };
            let name = s.open_image(&path, dims)?;
            println!("Opened image {}", name);
            save_scene(&s, &scene, out.as_deref())?;
        }
    }
    Ok(())
}
