use color_constancy::image::ColorImage;
use color_constancy::types::ClassCatalog;
use color_constancy::{CalibratedModel, ConstancyEstimator, ConstancyParams, MeanColorTable};
use nalgebra::{DMatrix, DVector};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> color_constancy::Result<()> {
    // Demo: two materials under two light sources with one reduced dimension;
    // the left half of the scene is material 0 in full light, the right half
    // material 1 in half light.
    let materials = [
        DVector::from_vec(vec![0.8, 0.2, 0.2]),
        DVector::from_vec(vec![0.2, 0.2, 0.8]),
    ];
    let spectra = [1.0, 0.5];
    let mut pair_reflectance = Vec::new();
    let mut mean_colors = Vec::new();
    for mu in &materials {
        for &beta in &spectra {
            pair_reflectance.push(mu.clone());
            mean_colors.push((mu * beta).iter().copied().collect());
        }
    }
    let model = CalibratedModel::from_parts(
        &ClassCatalog::uniform(2, 2),
        1,
        materials
            .iter()
            .map(|mu| (mu.clone(), DMatrix::identity(3, 3) * 1e-3))
            .collect(),
        spectra
            .iter()
            .map(|&b| (DVector::from_element(1, b), DMatrix::identity(1, 1) * 1e-2))
            .collect(),
        pair_reflectance,
    )?;
    let table = MeanColorTable::new(2, 2, mean_colors)?;

    let (w, h) = (6usize, 4usize);
    let mut image = ColorImage::new(w, h, 3);
    for y in 0..h {
        for x in 0..w {
            let color = if x < w / 2 {
                [0.8, 0.2, 0.2]
            } else {
                [0.1, 0.1, 0.4]
            };
            image.set(x, y, &color);
        }
    }

    let params = ConstancyParams::default();
    let result = ConstancyEstimator::new(model, &table, &image, &params)?.run()?;
    println!(
        "iterations={} faults={} latency_ms={:.3}",
        result.iterations.len(),
        result.faults.len(),
        result.latency_ms
    );
    for y in 0..h {
        let row: Vec<String> = (0..w)
            .map(|x| {
                let i = y * w + x;
                format!(
                    "m{}/w{}",
                    result.material_labels[i].0, result.light_source_labels[i].0
                )
            })
            .collect();
        println!("  {}", row.join(" "));
    }
    Ok(())
}
