//! Target list file parsing.
//!
//! The target list is a delimited text table with a header row. The
//! delimiter (`;`, `,`, `|` or tab) is detected from the header, column names are
//! matched case-insensitively against a set of aliases, and only the RA and
//! Dec columns are mandatory. Optional cells that are empty or unparsable
//! are left unset so ingest can substitute configured defaults.

use chrono::{DateTime, Utc};
use log::debug;
use std::fs;
use std::path::Path;

use crate::error::{ErrorContext, SchedulerError, SchedulerResult};
use crate::models::coordinates::{parse_dec, parse_ra};
use crate::models::Coordinates;

/// One row of the target list, before defaults are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetRecord {
    /// 1-based data row (header excluded)
    pub row: usize,
    pub name: String,
    /// `None` when both coordinate cells are empty
    pub coordinates: Option<Coordinates>,
    pub magnitude_1: Option<f64>,
    pub magnitude_2: Option<f64>,
    pub separation_arcsec: Option<f64>,
    pub color_index: Option<f64>,
    pub filter: Option<String>,
    pub exposure_time_secs: Option<f64>,
    pub exposure_count: Option<u32>,
    pub rotation_deg: Option<f64>,
    pub nights: Option<u32>,
    pub cycles: Option<u32>,
    pub completed_nights: Option<u32>,
    pub completed_cycles: Option<u32>,
    pub completed_reference_cycles: Option<u32>,
    pub priority: Option<f64>,
    pub min_altitude_deg: Option<f64>,
    pub airmass_min: Option<f64>,
    pub airmass_max: Option<f64>,
    pub image_target: Option<bool>,
    pub register: Option<bool>,
    pub get_reference: Option<bool>,
    pub template: Option<String>,
    pub reference_template: Option<String>,
    /// Last completion, as written by the snapshot
    pub imaged_at: Option<DateTime<Utc>>,
}

/// Recognized column names, lowercase.
pub(crate) mod columns {
    pub const NAME: &[&str] = &["name", "target", "object", "wds", "star"];
    pub const RA: &[&str] = &["ra", "ra2000", "ra_j2000", "raj2000", "right ascension"];
    pub const DEC: &[&str] = &["dec", "de", "dec2000", "dec_j2000", "dej2000", "declination"];
    pub const MAG1: &[&str] = &["mag1", "magnitude1", "m1", "mag_a", "vmag"];
    pub const MAG2: &[&str] = &["mag2", "magnitude2", "m2", "mag_b"];
    pub const SEPARATION: &[&str] = &["sep", "separation", "rho"];
    pub const COLOR: &[&str] = &["color", "b-v", "bv", "color_index"];
    pub const FILTER: &[&str] = &["filter"];
    pub const EXPOSURE_TIME: &[&str] = &["exposure_time", "exposure", "exptime"];
    pub const EXPOSURE_COUNT: &[&str] = &["exposure_count", "exposures", "count"];
    pub const ROTATION: &[&str] = &["rotation", "rot"];
    pub const NIGHTS: &[&str] = &["nights"];
    pub const CYCLES: &[&str] = &["cycles"];
    pub const COMPLETED_NIGHTS: &[&str] = &["completed_nights", "nights_done"];
    pub const COMPLETED_CYCLES: &[&str] = &["completed_cycles", "cycles_done"];
    pub const COMPLETED_REF_CYCLES: &[&str] = &["completed_reference_cycles", "ref_cycles_done"];
    pub const PRIORITY: &[&str] = &["priority", "prio"];
    pub const MIN_ALTITUDE: &[&str] = &["min_altitude", "minalt", "min_alt"];
    pub const AIRMASS_MIN: &[&str] = &["airmass_min", "min_airmass"];
    pub const AIRMASS_MAX: &[&str] = &["airmass_max", "max_airmass"];
    pub const IMAGE: &[&str] = &["image", "image_target"];
    pub const REGISTER: &[&str] = &["register", "register_target"];
    pub const GET_REFERENCE: &[&str] = &["get_reference", "getref", "reference"];
    pub const TEMPLATE: &[&str] = &["template"];
    pub const REFERENCE_TEMPLATE: &[&str] = &["reference_template", "ref_template"];
    pub const IMAGED_AT: &[&str] = &["imaged_at", "last_imaged"];
}

/// A header-named delimited table, shared by target lists and snapshots.
#[derive(Debug, Clone)]
pub(crate) struct DelimitedTable {
    pub delimiter: u8,
    headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DelimitedTable {
    /// Parse `content`; `Ok(None)` when there is no header row.
    pub fn parse(content: &str) -> Result<Option<Self>, csv::Error> {
        let Some(first) = content
            .lines()
            .find(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
        else {
            return Ok(None);
        };
        let delimiter = detect_delimiter(first);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(content.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_lowercase).collect();
        if headers.iter().all(String::is_empty) {
            return Ok(None);
        }
        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<Result<Vec<Vec<String>>, csv::Error>>()?;
        Ok(Some(Self {
            delimiter,
            headers,
            rows,
        }))
    }

    /// Index of the first header matching one of `aliases`.
    pub fn column(&self, aliases: &[&str]) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| aliases.iter().any(|a| h == a))
    }

    pub fn header(&self, index: usize) -> &str {
        self.headers.get(index).map(String::as_str).unwrap_or("")
    }
}

/// Error context for a reader failure: the data row, when known, and the
/// reader's message.
pub(crate) fn csv_error_context(context: ErrorContext, error: &csv::Error) -> ErrorContext {
    let context = match error.position().map(|p| p.record()) {
        Some(record) if record > 0 => context.with_row(record as usize),
        _ => context,
    };
    context.with_details(error.to_string())
}

/// Most frequent of `;`, tab, `|` and `,` in the header; `,` when none occur.
fn detect_delimiter(header: &str) -> u8 {
    [b';', b'\t', b'|', b',']
        .into_iter()
        .max_by_key(|d| (header.bytes().filter(|b| b == d).count(), *d == b','))
        .filter(|d| header.as_bytes().contains(d))
        .unwrap_or(b',')
}

pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

struct RowReader<'a> {
    table: &'a DelimitedTable,
    cells: &'a [String],
    row: usize,
}

impl<'a> RowReader<'a> {
    fn cell(&self, aliases: &[&str]) -> Option<&'a str> {
        let index = self.table.column(aliases)?;
        let value = self.cells.get(index)?.trim();
        (!value.is_empty()).then_some(value)
    }

    fn optional<T>(&self, aliases: &[&str], parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let raw = self.cell(aliases)?;
        let parsed = parse(raw);
        if parsed.is_none() {
            debug!(
                "row {}: ignoring unparsable value '{}' in column '{}'",
                self.row, raw, aliases[0]
            );
        }
        parsed
    }

    fn number(&self, aliases: &[&str]) -> Option<f64> {
        self.optional(aliases, |s| s.parse::<f64>().ok().filter(|v| v.is_finite()))
    }

    fn count(&self, aliases: &[&str]) -> Option<u32> {
        self.optional(aliases, |s| s.parse::<u32>().ok())
    }

    fn flag(&self, aliases: &[&str]) -> Option<bool> {
        self.optional(aliases, parse_bool)
    }

    fn text(&self, aliases: &[&str]) -> Option<String> {
        self.cell(aliases).map(str::to_string)
    }

    fn time(&self, aliases: &[&str]) -> Option<DateTime<Utc>> {
        self.optional(aliases, |s| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|t| t.with_timezone(&Utc))
        })
    }
}

/// Parse target list text. `source` names the input in error messages.
pub fn parse_target_str(content: &str, source: &str) -> SchedulerResult<Vec<TargetRecord>> {
    let context = || ErrorContext::new("parse_target_file").with_path(source);
    let table = DelimitedTable::parse(content)
        .map_err(|e| {
            SchedulerError::parse("Malformed delimited text", csv_error_context(context(), &e))
        })?
        .ok_or_else(|| SchedulerError::parse("Target file has no header row", context()))?;

    let ra_col = table
        .column(columns::RA)
        .ok_or_else(|| SchedulerError::parse("Missing mandatory column", context().with_column("RA")))?;
    let dec_col = table
        .column(columns::DEC)
        .ok_or_else(|| SchedulerError::parse("Missing mandatory column", context().with_column("Dec")))?;

    let mut records = Vec::with_capacity(table.rows.len());
    for (i, cells) in table.rows.iter().enumerate() {
        let row = i + 1;
        let reader = RowReader {
            table: &table,
            cells,
            row,
        };
        let ra_raw = cells.get(ra_col).map(|s| s.trim()).unwrap_or("");
        let dec_raw = cells.get(dec_col).map(|s| s.trim()).unwrap_or("");

        let coordinates = if ra_raw.is_empty() && dec_raw.is_empty() {
            None
        } else {
            let ra = parse_ra(ra_raw).ok_or_else(|| {
                SchedulerError::parse(
                    format!("Unparsable right ascension '{}'", ra_raw),
                    context()
                        .with_row(row)
                        .with_column(table.header(ra_col))
                        .with_details("expected decimal degrees or sexagesimal hours"),
                )
            })?;
            let dec = parse_dec(dec_raw)
                .filter(|d| (-90.0..=90.0).contains(d))
                .ok_or_else(|| {
                    SchedulerError::parse(
                        format!("Unparsable declination '{}'", dec_raw),
                        context()
                            .with_row(row)
                            .with_column(table.header(dec_col))
                            .with_details("expected degrees within [-90, 90]"),
                    )
                })?;
            Some(Coordinates::new(ra, dec))
        };

        records.push(TargetRecord {
            row,
            name: reader
                .text(columns::NAME)
                .unwrap_or_else(|| format!("Target {}", row)),
            coordinates,
            magnitude_1: reader.number(columns::MAG1),
            magnitude_2: reader.number(columns::MAG2),
            separation_arcsec: reader.number(columns::SEPARATION),
            color_index: reader.number(columns::COLOR),
            filter: reader.text(columns::FILTER),
            exposure_time_secs: reader.number(columns::EXPOSURE_TIME),
            exposure_count: reader.count(columns::EXPOSURE_COUNT),
            rotation_deg: reader.number(columns::ROTATION),
            nights: reader.count(columns::NIGHTS),
            cycles: reader.count(columns::CYCLES),
            completed_nights: reader.count(columns::COMPLETED_NIGHTS),
            completed_cycles: reader.count(columns::COMPLETED_CYCLES),
            completed_reference_cycles: reader.count(columns::COMPLETED_REF_CYCLES),
            priority: reader.number(columns::PRIORITY),
            min_altitude_deg: reader.number(columns::MIN_ALTITUDE),
            airmass_min: reader.number(columns::AIRMASS_MIN),
            airmass_max: reader.number(columns::AIRMASS_MAX),
            image_target: reader.flag(columns::IMAGE),
            register: reader.flag(columns::REGISTER),
            get_reference: reader.flag(columns::GET_REFERENCE),
            template: reader.text(columns::TEMPLATE),
            reference_template: reader.text(columns::REFERENCE_TEMPLATE),
            imaged_at: reader.time(columns::IMAGED_AT),
        });
    }

    debug!("Parsed {} target rows from {}", records.len(), source);
    Ok(records)
}

/// Read and parse a target list file.
pub fn parse_target_file<P: AsRef<Path>>(path: P) -> SchedulerResult<Vec<TargetRecord>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        SchedulerError::io(e, ErrorContext::new("parse_target_file").with_path(path.display()))
    })?;
    parse_target_str(&content, &path.display().to_string())
}
