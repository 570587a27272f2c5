use color_constancy::calibration::{calibrate, TrainingSet};
use color_constancy::config::{self, OutputFormat, RuntimeConfig};
use color_constancy::image::io::{load_color_image, save_label_mask, write_json_file};
use color_constancy::{ConstancyEstimator, ConstancyResult, Result};
use log::info;
use std::env;
use std::path::Path;
use std::time::Instant;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let program = env::args()
        .next()
        .unwrap_or_else(|| "constancy_demo".to_string());
    let config = config::parse_cli(&program)?;

    let t0 = Instant::now();
    let images = config
        .training
        .images
        .iter()
        .map(|p| load_color_image(p))
        .collect::<Result<Vec<_>>>()?;
    let training = TrainingSet::new(images, config.training.samples.clone());
    let calibration = calibrate(&training, &config.params.classes, &config.params.calibration)?;
    let mean_colors = match &config.mean_colors {
        Some(table) => table.clone(),
        None => calibration.mean_colors.clone(),
    };
    info!(
        "constancy_demo calibrated {} training images in {:.3} ms",
        training.images.len(),
        t0.elapsed().as_secs_f64() * 1000.0
    );

    let target = load_color_image(&config.target)?;
    let estimator = ConstancyEstimator::new(calibration.model, &mean_colors, &target, &config.params)?;
    let result = estimator.run()?;

    if config.output.format.includes_text() {
        print_text_summary(&config, &result);
    }

    if config.output.format.includes_json() {
        if let Some(path) = &config.output.json_out {
            write_json_file(path, &result)?;
            println!("\nJSON report written to {}", path.display());
        } else {
            let json = serde_json::to_string_pretty(&result).map_err(|source| {
                color_constancy::ConstancyError::Json {
                    path: "<stdout>".into(),
                    source,
                }
            })?;
            if config.output.format == OutputFormat::Both {
                println!("\nJSON report:\n{json}");
            } else {
                println!("{json}");
            }
        }
    }

    if let Some(dir) = &config.output.mask_dir {
        save_masks(dir, &config, &result)?;
        eprintln!("Label masks written to {}", dir.display());
    }
    Ok(())
}

fn print_text_summary(config: &RuntimeConfig, result: &ConstancyResult) {
    let classes = &config.params.classes;
    println!("Colour constancy summary");
    println!("  image: {}x{}", result.width, result.height);
    println!("  iterations: {}", result.iterations.len());
    println!("  faults: {}", result.faults.len());
    println!("  latency_ms: {:.3}", result.latency_ms);

    println!("\nMaterials");
    for (m, spec) in classes.materials.iter().enumerate() {
        let count = result.material_labels.iter().filter(|l| l.0 == m).count();
        println!("  {}: {} pixels", spec.name, count);
    }
    println!("\nLight sources");
    for (w, spec) in classes.light_sources.iter().enumerate() {
        let count = result.light_source_labels.iter().filter(|l| l.0 == w).count();
        let beta: Vec<String> = result.spectra[w].iter().map(|v| format!("{v:.4}")).collect();
        println!("  {}: {} pixels beta=[{}]", spec.name, count, beta.join(", "));
    }

    println!("\nIterations");
    for report in &result.iterations {
        let stages: Vec<String> = report
            .timing
            .stages
            .iter()
            .map(|s| format!("{}={:.3}", s.label, s.elapsed_ms))
            .collect();
        println!(
            "  #{} hypotheses={} faults={} total_ms={:.3} ({})",
            report.iteration,
            report.hypotheses_per_pixel,
            report.faults.len(),
            report.timing.total_ms,
            stages.join(" ")
        );
    }
}

fn save_masks(dir: &Path, config: &RuntimeConfig, result: &ConstancyResult) -> Result<()> {
    let num_materials = config.params.classes.num_materials();
    let num_lights = config.params.classes.num_light_sources();
    let (w, h) = (result.width, result.height);
    for report in &result.iterations {
        let materials: Vec<usize> = report.material_labels.iter().map(|m| m.0).collect();
        let lights: Vec<usize> = report.light_source_labels.iter().map(|l| l.0).collect();
        save_label_mask(
            &materials,
            w,
            h,
            num_materials,
            &dir.join(format!("material_{:02}.png", report.iteration)),
        )?;
        save_label_mask(
            &lights,
            w,
            h,
            num_lights,
            &dir.join(format!("light_source_{:02}.png", report.iteration)),
        )?;
    }
    let materials: Vec<usize> = result.material_labels.iter().map(|m| m.0).collect();
    let lights: Vec<usize> = result.light_source_labels.iter().map(|l| l.0).collect();
    save_label_mask(&materials, w, h, num_materials, &dir.join("material_final.png"))?;
    save_label_mask(&lights, w, h, num_lights, &dir.join("light_source_final.png"))?;
    let tables: Vec<_> = result.iterations.iter().map(|r| &r.likelihoods).collect();
    write_json_file(&dir.join("likelihoods.json"), &tables)
}
