//! Generate testdata command implementation.
//!
//! Writes synthetic PM dumps covering every report source and the DU power
//! family, laid out the way the OSS writes them. The output directory can be
//! used directly as `file.api_path` for `report` or as `file.csv_path` for
//! `collect --offline`.

use oss_pm_exporter::aggregator::report::ReportSources;
use oss_pm_exporter::lifecycle::sanitize_family_name;
use oss_pm_exporter::tabular::Dataset;
use oss_pm_exporter::window::{SystemClock, TimeWindow, PARAM_FORMAT};
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::Config;

/// Identity columns of every RAN dump; counters start at index 7.
const RAN_IDENTITY: [&str; 7] = [
    "NE ID", "NE Type", "NE Name", "Init Time", "Duration", "Status", "Location",
];

fn header(title: &str, window: &TimeWindow, columns: Vec<String>) -> Vec<Vec<String>> {
    vec![
        vec![title.to_string()],
        vec![window.start_param(), window.end_param()],
        columns,
    ]
}

fn ran_columns(counters: &[&str]) -> Vec<String> {
    RAN_IDENTITY
        .iter()
        .copied()
        .chain(counters.iter().copied())
        .map(str::to_string)
        .collect()
}

fn ran_identity(location: usize, row: usize, window: &TimeWindow) -> Vec<String> {
    vec![
        format!("{}", 1000 + location * 10 + row),
        "DU".to_string(),
        format!("du-{:02}-{}", location, row),
        window.start_param(),
        "900".to_string(),
        "OK".to_string(),
        format!("SITE_{:02}", location),
    ]
}

/// RAN dump with four counters at columns 7..=10.
fn ran_dump<R: Rng>(
    rng: &mut R,
    title: &str,
    counters: [&str; 4],
    max: u64,
    locations: usize,
    rows: usize,
    window: &TimeWindow,
) -> Dataset {
    let mut out = header(title, window, ran_columns(&counters));
    for loc in 0..locations {
        for r in 0..rows {
            let mut row = ran_identity(loc, r, window);
            for _ in 0..counters.len() {
                row.push(rng.gen_range(0..=max).to_string());
            }
            out.push(row);
        }
    }
    Dataset::from_rows(out)
}

/// AMF dump: identity columns, then attempt/success/cache-hit at 7..=9 and
/// the ratio at 18.
fn core_dump<R: Rng>(rng: &mut R, title: &str, rows: usize, window: &TimeWindow) -> Dataset {
    let mut columns: Vec<String> = RAN_IDENTITY.iter().map(|s| s.to_string()).collect();
    columns.extend(["Attempt(count)", "Success(count)", "CacheHit(count)"].map(String::from));
    for i in 10..18 {
        columns.push(format!("Reserved{i}(count)"));
    }
    columns.push("Ratio(%)".to_string());

    let mut out = header(title, window, columns);
    for r in 0..rows {
        let mut row = ran_identity(0, r, window);
        row[1] = "AMF".to_string();
        row[2] = format!("amf-{r}");
        let attempt: u64 = rng.gen_range(100..10_000);
        let success = rng.gen_range(attempt / 2..=attempt);
        let hit = rng.gen_range(1..=success);
        row.push(attempt.to_string());
        row.push(success.to_string());
        row.push(hit.to_string());
        for _ in 10..18 {
            row.push("0".to_string());
        }
        row.push(format!("{:.2}", success as f64 * 100.0 / attempt as f64));
        out.push(row);
    }
    Dataset::from_rows(out)
}

fn write_dump(dir: &Path, name: &str, dataset: &Dataset) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = dir.join(format!("{}.csv", sanitize_family_name(name)));
    dataset.write(&path)?;
    debug!("Wrote {} ({} rows)", path.display(), dataset.len());
    println!("   ✅ {}", path.display());
    Ok(path)
}

/// Generates synthetic PM dumps.
pub fn command_generate_testdata(
    output: PathBuf,
    locations: usize,
    rows_per_location: usize,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    if locations == 0 || rows_per_location == 0 {
        return Err("locations and rows-per-location must be greater than 0".into());
    }

    println!("🧪 Generating synthetic PM dumps");
    println!("================================");
    fs::create_dir_all(&output)?;

    let window = TimeWindow::from_clock(&SystemClock);
    let mut rng = rand::thread_rng();
    let sources: &ReportSources = &config.report.sources;
    let bytes = ["ULByte(byte)", "Reserved(count)", "Reserved(count)", "DLByte(byte)"];

    let dumps = [
        (
            sources.mac_packet.as_str(),
            ran_dump(&mut rng, "Air MAC Packet", bytes, 5_000_000, locations, rows_per_location, &window),
        ),
        (
            sources.ue_activity.as_str(),
            ran_dump(
                &mut rng,
                "Downlink Active UE Number",
                ["UEActiveDLAvg(count)", "Reserved(count)", "Reserved(count)", "UEActiveDLMax(count)"],
                64,
                locations,
                rows_per_location,
                &window,
            ),
        ),
        (
            sources.pcell.as_str(),
            ran_dump(&mut rng, "Air MAC Packet (PCell)", bytes, 5_000_000, locations, rows_per_location, &window),
        ),
        (
            sources.scell.as_str(),
            ran_dump(&mut rng, "Air MAC Packet (SCell)", bytes, 5_000_000, locations, rows_per_location, &window),
        ),
        (sources.uecon.as_str(), core_dump(&mut rng, "UECON_AMF", rows_per_location, &window)),
        (sources.ueid.as_str(), core_dump(&mut rng, "UEID_AMF", rows_per_location, &window)),
        (sources.amftps.as_str(), core_dump(&mut rng, "AMFTPS", rows_per_location, &window)),
        (sources.amfms.as_str(), core_dump(&mut rng, "AMFMS", rows_per_location, &window)),
        (
            "DU_Power_Consumption",
            ran_dump(
                &mut rng,
                "DU Power Consumption",
                ["Power(W)", "PowerMax(W)", "PowerMin(W)", "Energy(Wh)"],
                400,
                locations,
                rows_per_location,
                &window,
            ),
        ),
    ];

    for (name, dataset) in &dumps {
        write_dump(&output, name, dataset)?;
    }

    println!(
        "\n✅ {} dumps written to {} (window {} - {})",
        dumps.len(),
        output.display(),
        window.start.format(PARAM_FORMAT),
        window.end.format(PARAM_FORMAT)
    );
    Ok(())
}
