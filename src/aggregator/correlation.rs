//! Cross-file correlation keyed by network-element location.
//!
//! RAN dumps fetched independently (UE activity, MAC packets, PCell/SCell
//! packets) describe the same cells. Rows are matched to a location when
//! their location cell *contains* the location string, so a location that is
//! a prefix of another also picks up the longer one's rows. Global sums are
//! accumulated over every matched row and are therefore not guaranteed to
//! equal the total of the detail records.

use ahash::AHashSet;
use serde::Serialize;
use tracing::{debug, warn};

use super::schema::{data_rows, DumpSchema, IdentityColumns, PairColumns, Row};
use crate::error::PmError;
use crate::tabular::Dataset;

/// `{sum, detail}` section of the aggregation document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary<S, D> {
    pub sum: S,
    pub detail: Vec<D>,
    /// Locations that could not be correlated; their detail values are zero.
    #[serde(skip)]
    pub unmatched: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RanAppSum {
    #[serde(rename = "airMacULByte")]
    pub air_mac_ul_byte: i64,
    #[serde(rename = "airMacDLByte")]
    pub air_mac_dl_byte: i64,
    #[serde(rename = "ueActiveDLAvg")]
    pub ue_active_dl_avg: i64,
    #[serde(rename = "ueActiveDLMax")]
    pub ue_active_dl_max: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RanAppDetail {
    #[serde(rename = "neId")]
    pub ne_id: String,
    #[serde(rename = "neName")]
    pub ne_name: String,
    // Existing consumers read this key as spelled.
    #[serde(rename = "initTile")]
    pub init_time: String,
    pub location: String,
    #[serde(rename = "airMacULByte")]
    pub air_mac_ul_byte: i64,
    #[serde(rename = "airMacDLByte")]
    pub air_mac_dl_byte: i64,
    #[serde(rename = "ueActiveDLAvg")]
    pub ue_active_dl_avg: i64,
    #[serde(rename = "ueActiveDLMax")]
    pub ue_active_dl_max: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RanPhysicalSum {
    #[serde(rename = "airMacULByte_PCELL")]
    pub air_mac_ul_byte_pcell: i64,
    #[serde(rename = "airMacDLByte_PCELL")]
    pub air_mac_dl_byte_pcell: i64,
    #[serde(rename = "airMacULByte_SCELL")]
    pub air_mac_ul_byte_scell: i64,
    #[serde(rename = "airMacDLByte_SCELL")]
    pub air_mac_dl_byte_scell: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RanPhysicalDetail {
    #[serde(rename = "neId")]
    pub ne_id: String,
    #[serde(rename = "neName")]
    pub ne_name: String,
    #[serde(rename = "initTile")]
    pub init_time: String,
    pub location: String,
    #[serde(rename = "airMacULByte_PCELL")]
    pub air_mac_ul_byte_pcell: i64,
    #[serde(rename = "airMacDLByte_PCELL")]
    pub air_mac_dl_byte_pcell: i64,
    #[serde(rename = "airMacULByte_SCELL")]
    pub air_mac_ul_byte_scell: i64,
    #[serde(rename = "airMacDLByte_SCELL")]
    pub air_mac_dl_byte_scell: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoreAppSum {
    #[serde(rename = "ueconAmfCRatio")]
    pub uecon_amf_c_ratio: f64,
    #[serde(rename = "ueidAmfCRatio")]
    pub ueid_amf_c_ratio: f64,
    #[serde(rename = "amftpsTotalMsg")]
    pub amftps_total_msg: i64,
    #[serde(rename = "amfmsCurCmConn")]
    pub amfms_cur_cm_conn: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoreAppDetail {
    #[serde(rename = "initTile")]
    pub init_time: String,
    pub location: String,
    pub attempt: i64,
    pub success: i64,
    #[serde(rename = "cachehit")]
    pub cache_hit: f64,
    #[serde(rename = "cRatio")]
    pub c_ratio: f64,
}

pub type RanApplication = Summary<RanAppSum, RanAppDetail>;
pub type RanPhysical = Summary<RanPhysicalSum, RanPhysicalDetail>;
pub type CoreApplication = Summary<CoreAppSum, CoreAppDetail>;

/// Network-element identity taken from a matched row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Identity {
    ne_id: String,
    ne_name: String,
    init_time: String,
}

/// Accumulated values of the rows matching one location in one dump.
#[derive(Debug, Default)]
struct LocationScan {
    rows: i64,
    first_sum: i64,
    second_sum: i64,
    second_max: Option<i64>,
    /// Identity of the last matching row.
    identity: Option<Identity>,
}

impl LocationScan {
    /// Fails when no row of `dump` matched `location`.
    fn matched(&self, location: &str, dump: &str) -> Result<(), PmError> {
        if self.rows == 0 {
            return Err(PmError::Correlation {
                scope: location.to_string(),
                reason: format!("no {dump} rows matched"),
            });
        }
        Ok(())
    }

    /// Average of the first column.
    fn first_avg(&self, location: &str, dump: &str) -> Result<i64, PmError> {
        self.matched(location, dump)?;
        Ok(self.first_sum / self.rows)
    }
}

/// Logs a correlation failure and records it; the caller reports zero.
fn record_unmatched(unmatched: &mut Vec<String>, err: PmError) {
    warn!(error = %err, "Location not correlated, values reported as 0");
    unmatched.push(err.to_string());
}

fn read_identity(row: &Row<'_>, cols: &IdentityColumns) -> Result<Identity, PmError> {
    Ok(Identity {
        ne_id: row.text(cols.ne_id, "ne_id")?.to_string(),
        ne_name: row.text(cols.ne_name, "ne_name")?.to_string(),
        init_time: row.text(cols.init_time, "init_time")?.to_string(),
    })
}

fn scan_location(
    dataset: &Dataset,
    dump: &str,
    location: &str,
    identity_cols: &IdentityColumns,
    pair: &PairColumns,
) -> LocationScan {
    let mut scan = LocationScan::default();

    for row in data_rows(dataset) {
        match row.text(identity_cols.location, "location") {
            Ok(cell) if cell.contains(location) => {}
            Ok(_) => continue,
            Err(e) => {
                debug!(dump, error = %e, "Row without location cell skipped");
                continue;
            }
        }

        let values = row
            .int(pair.first, "first")
            .and_then(|first| Ok((first, row.int(pair.second, "second")?)))
            .and_then(|(first, second)| Ok((first, second, read_identity(&row, identity_cols)?)));
        let (first, second, identity) = match values {
            Ok(v) => v,
            Err(e) => {
                warn!(dump, location, error = %e, "Skipping malformed row");
                continue;
            }
        };

        scan.rows += 1;
        scan.first_sum += first;
        scan.second_sum += second;
        scan.second_max = Some(scan.second_max.map_or(second, |m| m.max(second)));
        scan.identity = Some(identity);
    }

    scan
}

/// Distinct locations of a dump in first-seen order.
pub fn find_locations(dataset: &Dataset, cols: &IdentityColumns) -> Vec<String> {
    let mut seen = AHashSet::new();
    let mut locations = Vec::new();

    for row in data_rows(dataset) {
        let Ok(location) = row.text(cols.location, "location") else {
            continue;
        };
        if seen.insert(location) {
            locations.push(location.to_string());
        }
    }

    locations
}

/// RAN application statistics from the UE activity and MAC packet dumps.
///
/// Per location: average and maximum active downlink UEs from the activity
/// dump, uplink/downlink bytes summed from the MAC packet dump, identity from
/// the last matching activity row.
pub fn correlate_ran_application(
    locations: &[String],
    ue_activity: &Dataset,
    mac_packet: &Dataset,
    schema: &DumpSchema,
) -> RanApplication {
    let mut out = RanApplication::default();

    for location in locations {
        let ue = scan_location(ue_activity, "ue_activity", location, &schema.identity, &schema.pair);
        let mac = scan_location(mac_packet, "mac_packet", location, &schema.identity, &schema.pair);

        out.sum.ue_active_dl_avg += ue.first_sum;
        out.sum.ue_active_dl_max += ue.second_sum;
        out.sum.air_mac_ul_byte += mac.first_sum;
        out.sum.air_mac_dl_byte += mac.second_sum;

        let ue_active_dl_avg = ue.first_avg(location, "ue_activity").unwrap_or_else(|e| {
            record_unmatched(&mut out.unmatched, e);
            0
        });

        let identity = ue.identity.clone().unwrap_or_default();
        out.detail.push(RanAppDetail {
            ne_id: identity.ne_id,
            ne_name: identity.ne_name,
            init_time: identity.init_time,
            location: location.clone(),
            air_mac_ul_byte: mac.first_sum,
            air_mac_dl_byte: mac.second_sum,
            ue_active_dl_avg,
            ue_active_dl_max: ue.second_max.unwrap_or(0),
        });
    }

    out
}

/// RAN physical statistics: per-location uplink/downlink bytes on the
/// primary and secondary cells.
pub fn correlate_ran_physical(
    locations: &[String],
    pcell: &Dataset,
    scell: &Dataset,
    schema: &DumpSchema,
) -> RanPhysical {
    let mut out = RanPhysical::default();

    for location in locations {
        let p = scan_location(pcell, "pcell", location, &schema.identity, &schema.pair);
        let s = scan_location(scell, "scell", location, &schema.identity, &schema.pair);

        if let Err(e) = p.matched(location, "pcell") {
            record_unmatched(&mut out.unmatched, e);
        }

        out.sum.air_mac_ul_byte_pcell += p.first_sum;
        out.sum.air_mac_dl_byte_pcell += p.second_sum;
        out.sum.air_mac_ul_byte_scell += s.first_sum;
        out.sum.air_mac_dl_byte_scell += s.second_sum;

        let identity = p.identity.unwrap_or_default();
        out.detail.push(RanPhysicalDetail {
            ne_id: identity.ne_id,
            ne_name: identity.ne_name,
            init_time: identity.init_time,
            location: location.clone(),
            air_mac_ul_byte_pcell: p.first_sum,
            air_mac_dl_byte_pcell: p.second_sum,
            air_mac_ul_byte_scell: s.first_sum,
            air_mac_dl_byte_scell: s.second_sum,
        });
    }

    out
}

/// Core dumps feeding the core application section. Absent dumps contribute
/// zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct CoreDumps<'a> {
    pub uecon: Option<&'a Dataset>,
    pub ueid: Option<&'a Dataset>,
    pub amftps: Option<&'a Dataset>,
    pub amfms: Option<&'a Dataset>,
}

/// Marker the OSS writes in the first cell of UE context dumps.
const UECON_TITLE: &str = "UECON_AMF";

/// Core application statistics.
pub fn summarize_core_application(dumps: CoreDumps<'_>, schema: &DumpSchema) -> CoreApplication {
    let cols = &schema.core;
    let mut out = CoreApplication::default();

    if let Some(uecon) = dumps.uecon {
        let with_detail = uecon.title().is_some_and(|t| t.contains(UECON_TITLE));
        let mut ratios = Vec::new();

        for row in data_rows(uecon) {
            let parsed = (|| {
                let ratio = row.float(cols.ratio, "c_ratio")?;
                let detail = if with_detail {
                    Some(CoreAppDetail {
                        init_time: row.text(schema.identity.init_time, "init_time")?.to_string(),
                        location: row.text(schema.identity.location, "location")?.to_string(),
                        attempt: row.int(cols.attempt, "attempt")?,
                        success: row.int(cols.success, "success")?,
                        cache_hit: row.float(cols.cache_hit, "cache_hit")?,
                        c_ratio: ratio,
                    })
                } else {
                    None
                };
                Ok::<_, PmError>((ratio, detail))
            })();

            match parsed {
                Ok((ratio, detail)) => {
                    ratios.push(ratio);
                    out.detail.extend(detail);
                }
                Err(e) => warn!(dump = UECON_TITLE, error = %e, "Skipping malformed row"),
            }
        }
        out.sum.uecon_amf_c_ratio = mean(&ratios);
    }

    if let Some(ueid) = dumps.ueid {
        let ratios: Vec<f64> = data_rows(ueid)
            .filter_map(|row| row.float(cols.ratio, "c_ratio").ok())
            .collect();
        out.sum.ueid_amf_c_ratio = mean(&ratios);
    }

    if let Some(amftps) = dumps.amftps {
        out.sum.amftps_total_msg = column_total(amftps, cols.total);
    }
    if let Some(amfms) = dumps.amfms {
        out.sum.amfms_cur_cm_conn = column_total(amfms, cols.total);
    }

    out
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn column_total(dataset: &Dataset, col: usize) -> i64 {
    data_rows(dataset)
        .filter_map(|row| row.int(col, "total").ok())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a dump with the given (location, first, second) data rows.
    fn ran_dump(title: &str, rows: &[(&str, &str, &str)]) -> Dataset {
        let mut all = vec![vec![title.to_string()], vec![], vec![]];
        for (i, (loc, first, second)) in rows.iter().enumerate() {
            let mut r = vec![String::new(); 11];
            r[0] = format!("ne-{i}");
            r[2] = format!("gNB-{i}");
            r[3] = format!("2023-09-23 01:{:02}:00", 15 + i);
            r[6] = loc.to_string();
            r[7] = first.to_string();
            r[10] = second.to_string();
            all.push(r);
        }
        Dataset::from_rows(all)
    }

    #[test]
    fn test_find_locations_first_seen_order() {
        let ds = ran_dump("Air MAC Packet", &[("B", "1", "1"), ("A", "1", "1"), ("B", "1", "1")]);
        let locations = find_locations(&ds, &IdentityColumns::default());
        assert_eq!(locations, vec!["B".to_string(), "A".to_string()]);
    }

    #[test]
    fn test_ran_application_single_location() {
        let ue = ran_dump("Downlink Active UE Number", &[("LOC1", "10", "15")]);
        let mac = ran_dump("Air MAC Packet", &[("LOC1", "20", "20")]);
        let locations = vec!["LOC1".to_string()];

        let app = correlate_ran_application(&locations, &ue, &mac, &DumpSchema::default());

        assert_eq!(app.detail.len(), 1);
        assert_eq!(app.detail[0].ue_active_dl_avg, 10);
        assert_eq!(app.detail[0].ue_active_dl_max, 15);
        assert_eq!(app.sum.air_mac_ul_byte, 20);
        assert_eq!(app.sum.air_mac_dl_byte, 20);
    }

    #[test]
    fn test_ran_application_average_max_and_last_identity() {
        let ue = ran_dump(
            "Downlink Active UE Number",
            &[("LOC1", "10", "3"), ("LOC2", "99", "99"), ("LOC1", "21", "8")],
        );
        let mac = ran_dump("Air MAC Packet", &[("LOC1", "5", "6"), ("LOC1", "1", "2")]);
        let locations = vec!["LOC1".to_string()];

        let app = correlate_ran_application(&locations, &ue, &mac, &DumpSchema::default());
        let d = &app.detail[0];

        assert_eq!(d.ue_active_dl_avg, 15);
        assert_eq!(d.ue_active_dl_max, 8);
        assert_eq!(d.ne_id, "ne-2");
        assert_eq!(d.ne_name, "gNB-2");
        assert_eq!(d.air_mac_ul_byte, 6);
        assert_eq!(d.air_mac_dl_byte, 8);
        assert_eq!(app.sum.ue_active_dl_avg, 31);
        assert_eq!(app.sum.ue_active_dl_max, 11);
    }

    #[test]
    fn test_location_without_rows_is_zero_not_fault() {
        let ue = ran_dump("Downlink Active UE Number", &[]);
        let mac = ran_dump("Air MAC Packet", &[("LOC9", "4", "4")]);
        let locations = vec!["LOC9".to_string()];

        let app = correlate_ran_application(&locations, &ue, &mac, &DumpSchema::default());

        assert_eq!(app.detail[0].ue_active_dl_avg, 0);
        assert_eq!(app.detail[0].ue_active_dl_max, 0);
        assert_eq!(app.detail[0].ne_id, "");
        assert_eq!(app.sum.air_mac_ul_byte, 4);
        assert_eq!(app.unmatched.len(), 1);
        assert!(app.unmatched[0].contains("LOC9"));
    }

    #[test]
    fn test_unmatched_locations_are_not_serialized() {
        let pcell = ran_dump("PCell", &[]);
        let scell = ran_dump("SCell", &[("LOC3", "1", "1")]);
        let phy = correlate_ran_physical(&["LOC3".to_string()], &pcell, &scell, &DumpSchema::default());

        assert_eq!(
            phy.unmatched,
            vec!["correlation failed for 'LOC3': no pcell rows matched".to_string()]
        );
        let json = serde_json::to_value(&phy).unwrap();
        assert!(json.get("unmatched").is_none());
        assert_eq!(json["detail"][0]["airMacULByte_PCELL"], 0);
    }

    #[test]
    fn test_substring_location_match() {
        let ue = ran_dump("UE", &[("SITE-LOC1-A", "6", "6"), ("SITE-LOC1-B", "2", "2")]);
        let mac = ran_dump("MAC", &[]);
        let app = correlate_ran_application(&["LOC1".to_string()], &ue, &mac, &DumpSchema::default());
        assert_eq!(app.detail[0].ue_active_dl_avg, 4);
    }

    #[test]
    fn test_malformed_row_is_skipped() {
        let ue = ran_dump("UE", &[("LOC1", "abc", "1"), ("LOC1", "8", "1")]);
        let mac = ran_dump("MAC", &[]);
        let app = correlate_ran_application(&["LOC1".to_string()], &ue, &mac, &DumpSchema::default());
        assert_eq!(app.detail[0].ue_active_dl_avg, 8);
    }

    #[test]
    fn test_ran_physical_sums() {
        let pcell = ran_dump("PCell", &[("LOC1", "1", "2"), ("LOC1", "3", "4")]);
        let scell = ran_dump("SCell", &[("LOC1", "10", "20")]);
        let phy = correlate_ran_physical(&["LOC1".to_string()], &pcell, &scell, &DumpSchema::default());

        assert_eq!(phy.detail[0].air_mac_ul_byte_pcell, 4);
        assert_eq!(phy.detail[0].air_mac_dl_byte_pcell, 6);
        assert_eq!(phy.detail[0].air_mac_ul_byte_scell, 10);
        assert_eq!(phy.sum.air_mac_dl_byte_scell, 20);
        assert_eq!(phy.detail[0].ne_id, "ne-1");
        assert!(phy.unmatched.is_empty());
    }

    fn core_dump(title: &str, rows: &[[&str; 4]]) -> Dataset {
        let mut all = vec![vec![title.to_string()], vec![], vec![]];
        for cells in rows {
            let mut r = vec![String::new(); 19];
            r[3] = "2023-09-23 01:15:00".into();
            r[6] = "AMF-1".into();
            r[7] = cells[0].into();
            r[8] = cells[1].into();
            r[9] = cells[2].into();
            r[18] = cells[3].into();
            all.push(r);
        }
        Dataset::from_rows(all)
    }

    #[test]
    fn test_core_application() {
        let uecon = core_dump("UECON_AMF", &[["10", "9", "0.5", "90"], ["20", "20", "1", "100"]]);
        let ueid = core_dump("UEID_AMF", &[["0", "0", "0", "80"]]);
        let amftps = core_dump("AMFTPS", &[["0", "0", "7", "0"], ["0", "0", "5", "0"]]);
        let amfms = core_dump("AMFMS", &[["0", "0", "3", "0"]]);

        let core = summarize_core_application(
            CoreDumps {
                uecon: Some(&uecon),
                ueid: Some(&ueid),
                amftps: Some(&amftps),
                amfms: Some(&amfms),
            },
            &DumpSchema::default(),
        );

        assert_eq!(core.detail.len(), 2);
        assert_eq!(core.detail[0].attempt, 10);
        assert_eq!(core.detail[1].c_ratio, 100.0);
        assert_eq!(core.sum.uecon_amf_c_ratio, 95.0);
        assert_eq!(core.sum.ueid_amf_c_ratio, 80.0);
        assert_eq!(core.sum.amftps_total_msg, 12);
        assert_eq!(core.sum.amfms_cur_cm_conn, 3);
    }

    #[test]
    fn test_core_application_empty_dumps() {
        let empty = core_dump("UECON_AMF", &[]);
        let core = summarize_core_application(
            CoreDumps {
                uecon: Some(&empty),
                ueid: Some(&empty),
                ..CoreDumps::default()
            },
            &DumpSchema::default(),
        );
        assert!(core.detail.is_empty());
        assert_eq!(core.sum, CoreAppSum::default());
    }

    #[test]
    fn test_detail_json_keys() {
        let json = serde_json::to_value(RanAppDetail::default()).unwrap();
        assert!(json.get("neId").is_some());
        assert!(json.get("ueActiveDLAvg").is_some());
        assert!(json.get("initTile").is_some());
    }
}
