use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const IA_LINES: [(f64, f64, f64); 6] = [
    (3750.0, 80.0, 0.5),
    (4350.0, 70.0, 0.35),
    (4900.0, 80.0, 0.4),
    (5650.0, 50.0, 0.3),
    (6150.0, 70.0, 0.6),
    (7500.0, 120.0, 0.45),
];
const II_LINES: [(f64, f64, f64); 4] = [
    (4861.0, 40.0, -0.6),
    (5890.0, 60.0, 0.3),
    (6563.0, 60.0, -1.5),
    (8600.0, 120.0, 0.3),
];

fn snid(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_snid-rs"))
        .args(args)
        .output()
        .expect("snid-rs should run")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("temp paths are utf-8")
}

fn write_spectrum(dir: &Path, name: &str, lines: &[(f64, f64, f64)], redshift: f64) -> PathBuf {
    let rest: Vec<f64> = (0..3200).map(|index| 3000.0 + 2.0 * index as f64).collect();
    let flux: Vec<f64> = rest
        .iter()
        .map(|wavelength| {
            let continuum = 1.0 + 0.8 * (-0.5 * ((wavelength - 4500.0) / 2500.0).powi(2)).exp();
            let profile: f64 = lines
                .iter()
                .map(|(center, sigma, depth)| {
                    depth * (-0.5 * ((wavelength - center) / sigma).powi(2)).exp()
                })
                .sum();
            continuum * (1.0 - profile)
        })
        .collect();
    let wavelength: Vec<f64> = rest.iter().map(|value| value * (1.0 + redshift)).collect();

    let path = dir.join(name);
    fs::write(
        &path,
        serde_json::to_string(&json!({ "wavelength": wavelength, "flux": flux }))
            .expect("spectrum json"),
    )
    .expect("spectrum should be written");
    path
}

fn build_library(temp: &TempDir) -> PathBuf {
    let library = temp.path().join("library/templates.json");
    fs::create_dir_all(library.parent().expect("parent")).expect("library dir");
    for (id, type_name, lines) in [
        ("ia-max", "Ia", &IA_LINES[..]),
        ("iip-early", "II", &II_LINES[..]),
    ] {
        let spectrum = write_spectrum(temp.path(), &format!("{id}.json"), lines, 0.0);
        let output = snid(&[
            "template",
            path_arg(&spectrum),
            "--id",
            id,
            "--type",
            type_name,
            "--age",
            "-2",
            "--output",
            path_arg(&library),
        ]);
        assert!(
            output.status.success(),
            "template failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    library
}

#[test]
fn template_library_and_identify_work_together() {
    let temp = TempDir::new().expect("tempdir should be created");
    let library = build_library(&temp);

    let output = snid(&["library", path_arg(&library)]);
    assert!(output.status.success());
    let summary: Value = serde_json::from_slice(&output.stdout).expect("summary json");
    assert_eq!(summary["templates"], 2);
    assert_eq!(summary["types"]["Ia"], 1);
    assert_eq!(summary["grid"]["num_points"], 1024);

    let observed = write_spectrum(temp.path(), "observed.json", &IA_LINES, 0.05);
    let report_path = temp.path().join("out/report.json");
    let output = snid(&[
        "identify",
        path_arg(&observed),
        path_arg(&library),
        "--zmin",
        "-0.01",
        "--zmax",
        "0.5",
        "--output",
        path_arg(&report_path),
    ]);
    assert!(
        output.status.success(),
        "identify failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: Value =
        serde_json::from_str(&fs::read_to_string(&report_path).expect("report")).expect("json");
    assert_eq!(report["result"]["best_type"], "Ia");
    let redshift = report["result"]["redshift"].as_f64().expect("redshift");
    assert!((redshift - 0.05).abs() < 0.005, "redshift {redshift}");
    assert_eq!(report["matches"][0]["template_id"], "ia-max");
}

#[test]
fn duplicate_template_ids_are_rejected() {
    let temp = TempDir::new().expect("tempdir should be created");
    let library = build_library(&temp);
    let spectrum = write_spectrum(temp.path(), "again.json", &IA_LINES, 0.0);

    let output = snid(&[
        "template",
        path_arg(&spectrum),
        "--id",
        "ia-max",
        "--type",
        "Ia",
        "--output",
        path_arg(&library),
    ]);
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: [LIBRARY.FORMAT]"));
    assert!(stderr.contains("FATAL EXIT CODE: 3"));
}

#[test]
fn missing_library_is_an_io_failure() {
    let temp = TempDir::new().expect("tempdir should be created");
    let spectrum = write_spectrum(temp.path(), "observed.json", &IA_LINES, 0.05);
    let missing = temp.path().join("missing-library");

    let output = snid(&["identify", path_arg(&spectrum), path_arg(&missing)]);
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("IO.LIBRARY_READ"));
}

#[test]
fn usage_errors_exit_with_code_two() {
    let output = snid(&["classify-everything"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("INPUT.CLI_USAGE"));

    let output = snid(&["--help"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("identify"));
}
