//! Per-night status snapshot.
//!
//! After every completion the whole target list is written to
//! `<dir>/speckle_<night date>.csv`, replacing the previous snapshot of that
//! night. The file uses the target list column names, so it can also be fed
//! back in as the next night's target list.

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use super::target_file::{columns, csv_error_context, parse_bool, DelimitedTable};
use crate::api::TargetId;
use crate::error::{ErrorContext, SchedulerError, SchedulerResult};
use crate::models::Target;

const DELIMITER: u8 = b',';

const HEADER: &[&str] = &[
    "id",
    "name",
    "ra",
    "dec",
    "mag1",
    "mag2",
    "sep",
    "color",
    "filter",
    "exposure_time",
    "exposure_count",
    "rotation",
    "nights",
    "cycles",
    "completed_nights",
    "completed_cycles",
    "completed_reference_cycles",
    "priority",
    "min_altitude",
    "airmass_min",
    "airmass_max",
    "image",
    "register",
    "get_reference",
    "template",
    "reference_template",
    "imaged_at",
    "image_time",
    "rejection",
];

/// Snapshot file name for a night.
pub fn snapshot_file_name(night: NaiveDate) -> String {
    format!("speckle_{}.csv", night.format("%Y-%m-%d"))
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

fn optional_time(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.to_rfc3339()).unwrap_or_default()
}

fn snapshot_row(target: &Target) -> [String; 29] {
    [
        target.id.to_string(),
        target.name.clone(),
        target.coordinates.ra_hms(),
        target.coordinates.dec_dms(),
        target.magnitude_1.to_string(),
        target.magnitude_2.to_string(),
        target.separation_arcsec.to_string(),
        target.color_index.map(|c| c.to_string()).unwrap_or_default(),
        target.filter.clone(),
        target.exposure_time_secs.to_string(),
        target.exposure_count.to_string(),
        target.rotation_deg.to_string(),
        target.nights.to_string(),
        target.cycles.to_string(),
        target.completed_nights.to_string(),
        target.completed_cycles.to_string(),
        target.completed_reference_cycles.to_string(),
        target.priority.to_string(),
        target.min_altitude_deg.to_string(),
        target.airmass_min.to_string(),
        target.airmass_max.to_string(),
        flag(target.enabled()).to_string(),
        flag(target.register).to_string(),
        flag(target.get_reference).to_string(),
        target.template.clone(),
        target.reference_template.clone(),
        optional_time(target.imaged_at),
        optional_time(target.image_time),
        target
            .rejection
            .as_ref()
            .map(|r| r.to_string())
            .unwrap_or_default(),
    ]
}

/// Serialized snapshot text for `targets`.
///
/// The `image` column keeps the target list's intent: a target switched off
/// only by tonight's ingest is written as `1`, so the next night evaluates it
/// again.
pub fn render_snapshot(targets: &[Target]) -> SchedulerResult<String> {
    let context = || ErrorContext::new("render_snapshot");
    let mut writer = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .from_writer(Vec::new());
    writer.write_record(HEADER).map_err(|e| {
        SchedulerError::snapshot("Failed to render header", csv_error_context(context(), &e))
    })?;
    for target in targets {
        writer.write_record(&snapshot_row(target)).map_err(|e| {
            SchedulerError::snapshot(
                format!("Failed to render target {}", target.name),
                csv_error_context(context(), &e),
            )
        })?;
    }
    let bytes = writer.into_inner().map_err(|e| {
        SchedulerError::snapshot("Failed to flush snapshot", context().with_details(e.to_string()))
    })?;
    String::from_utf8(bytes).map_err(|e| {
        SchedulerError::snapshot("Snapshot is not UTF-8", context().with_details(e.to_string()))
    })
}

/// Single-writer snapshot persistence.
///
/// Callers take a ticket while they still hold the scheduler lock and write
/// after releasing it. Tickets order the writes: one that arrives after a
/// newer snapshot was already written is dropped.
#[derive(Debug)]
pub struct SnapshotWriter {
    dir: PathBuf,
    next_ticket: AtomicU64,
    written: Mutex<u64>,
}

impl SnapshotWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            next_ticket: AtomicU64::new(1),
            written: Mutex::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, night: NaiveDate) -> PathBuf {
        self.dir.join(snapshot_file_name(night))
    }

    pub fn ticket(&self) -> u64 {
        self.next_ticket.fetch_add(1, Ordering::SeqCst)
    }

    /// Write the snapshot for `night`. Returns the path, or `None` when a
    /// newer snapshot already went out.
    pub fn write(
        &self,
        ticket: u64,
        night: NaiveDate,
        targets: &[Target],
    ) -> SchedulerResult<Option<PathBuf>> {
        self.write_rendered(ticket, night, &render_snapshot(targets)?)
    }

    /// Write text produced by `render_snapshot`.
    pub fn write_rendered(
        &self,
        ticket: u64,
        night: NaiveDate,
        content: &str,
    ) -> SchedulerResult<Option<PathBuf>> {
        let mut written = self.written.lock();
        if ticket <= *written {
            debug!("Skipping stale snapshot #{} (#{} already written)", ticket, *written);
            return Ok(None);
        }

        let path = self.path_for(night);
        let tmp = path.with_extension("csv.tmp");
        let context = || ErrorContext::new("write_snapshot").with_path(path.display());

        fs::create_dir_all(&self.dir).map_err(|e| SchedulerError::io(e, context()))?;
        let file = fs::File::create(&tmp).map_err(|e| SchedulerError::io(e, context()))?;
        let mut out = BufWriter::new(file);
        out.write_all(content.as_bytes())
            .and_then(|_| out.flush())
            .map_err(|e| SchedulerError::io(e, context()))?;
        drop(out);
        fs::rename(&tmp, &path).map_err(|e| SchedulerError::io(e, context()))?;

        *written = ticket;
        info!("Wrote snapshot to {}", path.display());
        Ok(Some(path))
    }
}

/// Counters of one target as read back from a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    pub id: TargetId,
    pub name: String,
    pub nights: u32,
    pub cycles: u32,
    pub completed_nights: u32,
    pub completed_cycles: u32,
    pub completed_reference_cycles: u32,
    pub image_target: bool,
    pub imaged_at: Option<DateTime<Utc>>,
}

/// Parse snapshot text into rows keyed by target id.
pub fn parse_snapshot_str(
    content: &str,
    source: &str,
) -> SchedulerResult<BTreeMap<TargetId, SnapshotRow>> {
    let context = || ErrorContext::new("read_snapshot").with_path(source);
    let table = DelimitedTable::parse(content)
        .map_err(|e| {
            SchedulerError::snapshot("Malformed snapshot", csv_error_context(context(), &e))
        })?
        .ok_or_else(|| SchedulerError::snapshot("Snapshot is empty", context()))?;
    let column = |name: &'static str, aliases: &[&str]| {
        table.column(aliases).ok_or_else(|| {
            SchedulerError::snapshot("Missing snapshot column", context().with_column(name))
        })
    };

    let id_col = column("id", &["id"])?;
    let name_col = column("name", columns::NAME)?;
    let nights_col = column("nights", columns::NIGHTS)?;
    let cycles_col = column("cycles", columns::CYCLES)?;
    let cn_col = column("completed_nights", columns::COMPLETED_NIGHTS)?;
    let cc_col = column("completed_cycles", columns::COMPLETED_CYCLES)?;
    let crc_col = column("completed_reference_cycles", columns::COMPLETED_REF_CYCLES)?;
    let image_col = column("image", columns::IMAGE)?;
    let imaged_at_col = column("imaged_at", columns::IMAGED_AT)?;

    let mut rows = BTreeMap::new();
    for (i, cells) in table.rows.iter().enumerate() {
        let row = i + 1;
        let cell = |index: usize| cells.get(index).map(|s| s.trim()).unwrap_or("");
        let bad = |index: usize| {
            SchedulerError::snapshot(
                format!("Invalid value '{}'", cell(index)),
                context().with_row(row).with_column(table.header(index)),
            )
        };
        let count = |index: usize| cell(index).parse::<u32>().map_err(|_| bad(index));

        let id = cell(id_col).parse::<u64>().map_err(|_| bad(id_col))?;
        let imaged_at = match cell(imaged_at_col) {
            "" => None,
            raw => Some(
                DateTime::parse_from_rfc3339(raw)
                    .map_err(|_| bad(imaged_at_col))?
                    .with_timezone(&Utc),
            ),
        };
        let snapshot_row = SnapshotRow {
            id: TargetId(id),
            name: cell(name_col).to_string(),
            nights: count(nights_col)?,
            cycles: count(cycles_col)?,
            completed_nights: count(cn_col)?,
            completed_cycles: count(cc_col)?,
            completed_reference_cycles: count(crc_col)?,
            image_target: parse_bool(cell(image_col)).ok_or_else(|| bad(image_col))?,
            imaged_at,
        };
        rows.insert(snapshot_row.id, snapshot_row);
    }
    Ok(rows)
}

/// Read a snapshot file back.
pub fn read_snapshot<P: AsRef<Path>>(path: P) -> SchedulerResult<BTreeMap<TargetId, SnapshotRow>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        SchedulerError::io(e, ErrorContext::new("read_snapshot").with_path(path.display()))
    })?;
    parse_snapshot_str(&content, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::parse_target_str;
    use crate::models::Coordinates;
    use chrono::TimeZone;

    fn targets() -> Vec<Target> {
        let mut a = Target::new("STF 1110, AB", Coordinates::new(113.65, 31.89));
        a.cycles = 3;
        a.completed_cycles = 2;
        a.imaged_at = Some(Utc.with_ymd_and_hms(2024, 3, 2, 4, 15, 0).unwrap());
        let mut b = Target::new("A 1", Coordinates::new(10.0, -5.5));
        b.reject(crate::models::RejectionReason::NotImageableTonight);
        let mut c = Target::new("HU 1", Coordinates::new(20.0, 5.0));
        c.image_target = false;
        vec![a, b, c]
    }

    #[test]
    fn test_file_name() {
        let night = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(snapshot_file_name(night), "speckle_2024-03-01.csv");
    }

    #[test]
    fn test_round_trip_counters() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path());
        let night = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let targets = targets();

        let path = writer.write(writer.ticket(), night, &targets).unwrap().unwrap();
        assert!(path.ends_with("speckle_2024-03-01.csv"));
        let rows = read_snapshot(&path).unwrap();

        for target in &targets {
            let row = &rows[&target.id];
            assert_eq!(row.name, target.name);
            assert_eq!(row.cycles, target.cycles);
            assert_eq!(row.completed_cycles, target.completed_cycles);
            assert_eq!(row.completed_nights, target.completed_nights);
            assert_eq!(row.image_target, target.enabled());
            assert_eq!(row.imaged_at, target.imaged_at);
        }
    }

    #[test]
    fn test_stale_ticket_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path());
        let night = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let old = writer.ticket();
        let new = writer.ticket();
        assert!(writer.write(new, night, &targets()).unwrap().is_some());
        assert!(writer.write(old, night, &[]).unwrap().is_none());
        assert_eq!(read_snapshot(writer.path_for(night)).unwrap().len(), 3);
    }

    #[test]
    fn test_snapshot_reads_as_target_list() {
        let text = render_snapshot(&targets()).unwrap();
        let records = parse_target_str(&text, "snapshot").unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].name, "STF 1110, AB");
        assert_eq!(records[0].completed_cycles, Some(2));
        assert_eq!(
            records[0].imaged_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 2, 4, 15, 0).unwrap())
        );
        let coords = records[1].coordinates.unwrap();
        assert!((coords.dec_deg + 5.5).abs() < 1e-3);
        // Rejected by tonight's ingest only: evaluated again next night.
        assert_eq!(records[1].image_target, Some(true));
        assert_eq!(records[2].image_target, Some(false));
    }

    #[test]
    fn test_quoted_names_survive_rendering() {
        let mut target = Target::new("STF 1110\n\"AB\"", Coordinates::new(113.65, 31.89));
        target.template = "speckle, fast".to_string();
        let text = render_snapshot(&[target.clone()]).unwrap();
        let records = parse_target_str(&text, "snapshot").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, target.name);
        assert_eq!(records[0].template.as_deref(), Some("speckle, fast"));
    }

    #[test]
    fn test_missing_column_is_snapshot_error() {
        let err = parse_snapshot_str("id,name\n1,A\n", "bad").unwrap_err();
        assert!(matches!(err, SchedulerError::SnapshotError { .. }));
    }
}
