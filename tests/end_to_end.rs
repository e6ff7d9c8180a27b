use std::fs;
use std::path::Path;

use cpt_pipeline::core::loaders::{load_groundwater_table, load_layer_table};
use cpt_pipeline::processors::pipeline::{analyze_sounding, find_sounding_files, process_batch};
use cpt_pipeline::{GroundwaterTable, Layer, LayerTable, PipelineConfig, Sounding};
use tempfile::TempDir;

fn write(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
}

#[test]
fn test_three_sample_dry_sounding() {
    let sounding = Sounding::new(
        "CPT01",
        vec![1.0, 2.0, 3.0],
        vec![1000.0; 3],
        vec![10.0; 3],
        vec![0.0; 3],
    );
    let layers = LayerTable::new(vec![Layer::new("fill", 0.0, 18.0, "gw")]).unwrap();
    let groundwater = GroundwaterTable::single("gw", 10.0);

    let analysis =
        analyze_sounding(&sounding, &layers, &groundwater, &PipelineConfig::default()).unwrap();

    assert_eq!(analysis.stresses.total(), &[18.0, 36.0, 54.0]);
    assert_eq!(analysis.stresses.pore_pressure(), &[0.0, 0.0, 0.0]);
    assert_eq!(analysis.stresses.effective(), analysis.stresses.total());

    for record in &analysis.soil.records {
        assert!(record.fr > 0.0);
        assert!(record.ic_0.is_finite());
        if let Some(n) = record.n {
            assert!((0.35..=1.0).contains(&n));
        }
        assert!(record.friction_angle.is_finite());
    }

    for (record, &sigma_e) in analysis
        .residual
        .records
        .iter()
        .zip(analysis.stresses.effective())
    {
        assert!(record.olson_stark_lsr > 0.0 && record.olson_stark_lsr <= 0.4);
        assert!((record.olson_stark_sr - record.olson_stark_lsr * sigma_e).abs() < 1e-9);
        if let Some(ib) = record.idriss_boulanger {
            assert!(ib.lsr <= 0.4 && ib.lsr_void <= 0.4);
        }
    }
}

#[test]
fn test_batch_from_files() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    fs::create_dir_all(&data).unwrap();

    write(
        &dir.path().join("layers.csv"),
        "name,top_depth,unit_weight,gwt_id\nfill,0,17.5,main\nsand,2.0,19.0,main\n",
    );
    write(&dir.path().join("groundwater.csv"), "id,depth\nmain,1.5\n");

    let mut csv = String::from("Depth (m),qc (kPa),fs (kPa),u2 (kPa)\n");
    for i in 1..=40 {
        let depth = i as f64 * 0.1;
        let u2 = if depth > 1.5 { (depth - 1.5) * 9.81 } else { 0.0 };
        csv.push_str(&format!("{:.1},{},{},{:.3}\n", depth, 3000.0 + 50.0 * i as f64, 25.0, u2));
    }
    write(&data.join("SITE-CPT07-2021.csv"), &csv);

    let mut export = String::new();
    for line in 0..7 {
        export.push_str(&format!("header line {}\n", line));
    }
    for i in 1..=20 {
        let depth = i as f64 * 0.2;
        export.push_str(&format!("{:.2}\t0\t0\t{:.2}\t{:.3}\t{:.1}\n", depth, 5.0, 4.0 + 0.01 * i as f64, 30.0));
    }
    write(&data.join("SITE-CPT09-2022.txt"), &export);

    let layers = load_layer_table(dir.path().join("layers.csv")).unwrap();
    let groundwater = load_groundwater_table(dir.path().join("groundwater.csv")).unwrap();
    let files = find_sounding_files(&data).unwrap();
    assert_eq!(files.len(), 2);

    let output = dir.path().join("output");
    let results = process_batch(
        &files,
        &layers,
        &groundwater,
        &PipelineConfig::default(),
        &output,
        true,
    );

    let ids: Vec<String> = results
        .iter()
        .map(|(_, r)| r.as_ref().unwrap().id.clone())
        .collect();
    assert_eq!(ids, vec!["CPT07", "CPT09"]);

    let mut reader = csv::Reader::from_path(output.join("CPT_CPT07.csv")).unwrap();
    let headers = reader.headers().unwrap().clone();
    for column in ["depth", "qt", "effective_stress", "Ic_n", "Sr_OS_2002", "IB15_Sr_void"] {
        assert!(headers.iter().any(|h| h == column), "missing column {}", column);
    }
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 40);

    let layer_idx = headers.iter().position(|h| h == "layer").unwrap();
    assert_eq!(&rows[0][layer_idx], "fill");
    assert_eq!(&rows[39][layer_idx], "sand");

    assert!(output.join("CPT_CPT09.csv").exists());
    assert!(output.join("CPT_CPT07.png").exists());
    assert!(output.join("CPT_CPT09.png").exists());
}
