//! On-demand aggregation document served at `/api/metrics`.
//!
//! Built from the flat API staging directory on every request. The first
//! section that cannot be built aborts the report with a [`ReportError`]
//! naming that section.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, instrument};

use super::correlation::{
    correlate_ran_application, correlate_ran_physical, find_locations, summarize_core_application,
    CoreApplication, CoreDumps, RanApplication, RanPhysical,
};
use super::schema::DumpSchema;
use crate::error::PmError;
use crate::lifecycle::sanitize_family_name;
use crate::tabular::Dataset;

/// Staged file names (without `.csv`) feeding each part of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSources {
    pub mac_packet: String,
    pub ue_activity: String,
    pub pcell: String,
    pub scell: String,
    pub uecon: String,
    pub ueid: String,
    pub amftps: String,
    pub amfms: String,
}

impl Default for ReportSources {
    fn default() -> Self {
        Self {
            mac_packet: "Air_MAC_Packet".into(),
            ue_activity: "Downlink_Active_UE_Number".into(),
            pcell: "Air_MAC_Packet_(PCell)".into(),
            scell: "Air_MAC_Packet_(SCell)".into(),
            uecon: "UECON_AMF".into(),
            ueid: "UEID_AMF".into(),
            amftps: "AMFTPS".into(),
            amfms: "AMFMS".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RanSection {
    pub application: RanApplication,
    pub physical: RanPhysical,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoreSection {
    pub application: CoreApplication,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PmReport {
    pub ran: RanSection,
    pub core: CoreSection,
}

/// First hard failure while building a report.
#[derive(Debug, thiserror::Error)]
#[error("{section} is not found: {source}")]
pub struct ReportError {
    /// Dotted section name, e.g. `ran.physical`.
    pub section: &'static str,
    #[source]
    pub source: PmError,
}

impl ReportError {
    fn new(section: &'static str, source: PmError) -> Self {
        Self { section, source }
    }
}

fn load_staged(api_dir: &Path, name: &str, section: &'static str) -> Result<Dataset, ReportError> {
    let path = api_dir.join(format!("{}.csv", sanitize_family_name(name)));
    debug!(path = %path.display(), section, "Loading staged dump");
    Dataset::load(&path).map_err(|e| ReportError::new(section, e))
}

/// Builds the aggregation document.
///
/// Core dumps are only read when their name is listed in `core_names`; an
/// unlisted dump contributes zero.
#[instrument(skip(sources, schema), fields(api_dir = %api_dir.display()))]
pub fn build_report(
    api_dir: &Path,
    core_names: &[String],
    sources: &ReportSources,
    schema: &DumpSchema,
) -> Result<PmReport, ReportError> {
    let mac = load_staged(api_dir, &sources.mac_packet, "ran.location")?;
    let pcell = load_staged(api_dir, &sources.pcell, "ran.location")?;
    let app_locations = find_locations(&mac, &schema.identity);
    let cell_locations = find_locations(&pcell, &schema.identity);

    let ue = load_staged(api_dir, &sources.ue_activity, "ran.application")?;
    let application = correlate_ran_application(&app_locations, &ue, &mac, schema);

    let scell = load_staged(api_dir, &sources.scell, "ran.physical")?;
    let physical = correlate_ran_physical(&cell_locations, &pcell, &scell, schema);
    if !application.unmatched.is_empty() || !physical.unmatched.is_empty() {
        debug!(
            application = application.unmatched.len(),
            physical = physical.unmatched.len(),
            "Report built with uncorrelated locations"
        );
    }

    let configured = |name: &str| core_names.iter().any(|n| n == name);
    let load_core = |name: &str| -> Result<Option<Dataset>, ReportError> {
        if configured(name) {
            load_staged(api_dir, name, "core.application").map(Some)
        } else {
            Ok(None)
        }
    };
    let uecon = load_core(&sources.uecon)?;
    let ueid = load_core(&sources.ueid)?;
    let amftps = load_core(&sources.amftps)?;
    let amfms = load_core(&sources.amfms)?;

    let core = summarize_core_application(
        CoreDumps {
            uecon: uecon.as_ref(),
            ueid: ueid.as_ref(),
            amftps: amftps.as_ref(),
            amfms: amfms.as_ref(),
        },
        schema,
    );

    Ok(PmReport {
        ran: RanSection {
            application,
            physical,
        },
        core: CoreSection { application: core },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_dump(dir: &Path, name: &str, rows: &[&str]) {
        let mut content = format!("{name}\nstart,end\nNE ID,x,NE Name,Init,y,z,Location,A(count),b,c,B(count)\n");
        for r in rows {
            content.push_str(r);
            content.push('\n');
        }
        fs::write(dir.join(format!("{name}.csv")), content).unwrap();
    }

    fn write_ran(dir: &Path) {
        write_dump(dir, "Air_MAC_Packet", &["ne1,,gNB1,t0,,,LOC1,20,,,20"]);
        write_dump(dir, "Downlink_Active_UE_Number", &["ne1,,gNB1,t0,,,LOC1,10,,,12"]);
        write_dump(dir, "Air_MAC_Packet_(PCell)", &["ne1,,gNB1,t0,,,LOC1,3,,,4"]);
        write_dump(dir, "Air_MAC_Packet_(SCell)", &["ne1,,gNB1,t0,,,LOC1,5,,,6"]);
    }

    #[test]
    fn test_build_report() {
        let dir = tempfile::tempdir().unwrap();
        write_ran(dir.path());
        write_dump(dir.path(), "AMFTPS", &["a,,b,t0,,,AMF,0,0,41"]);

        let report = build_report(
            dir.path(),
            &["AMFTPS".to_string()],
            &ReportSources::default(),
            &DumpSchema::default(),
        )
        .unwrap();

        let app = &report.ran.application;
        assert_eq!(app.detail.len(), 1);
        assert_eq!(app.detail[0].ue_active_dl_avg, 10);
        assert_eq!(app.sum.air_mac_ul_byte, 20);
        assert_eq!(app.sum.air_mac_dl_byte, 20);
        assert_eq!(report.ran.physical.sum.air_mac_dl_byte_scell, 6);
        assert_eq!(report.core.application.sum.amftps_total_msg, 41);
        assert_eq!(report.core.application.sum.amfms_cur_cm_conn, 0);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["ran"]["application"]["sum"]["airMacULByte"].is_i64());
        assert!(json["core"]["application"]["detail"].is_array());
    }

    #[test]
    fn test_missing_location_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = build_report(dir.path(), &[], &ReportSources::default(), &DumpSchema::default())
            .unwrap_err();
        assert_eq!(err.section, "ran.location");
        assert_eq!(err.source.kind(), "not_found");
    }

    #[test]
    fn test_missing_configured_core_dump() {
        let dir = tempfile::tempdir().unwrap();
        write_ran(dir.path());
        let err = build_report(
            dir.path(),
            &["UECON_AMF".to_string()],
            &ReportSources::default(),
            &DumpSchema::default(),
        )
        .unwrap_err();
        assert_eq!(err.section, "core.application");
    }
}
