//! Post-run check that every stored record is complete and self-consistent.

use std::collections::BTreeSet;
use std::fmt;
use tracing::{info, warn};

use crate::core::AttributeTable;
use crate::error::PipelineResult;
use crate::store::{Record, RecordKey, RecordStore, StoreLocation};

const DRIVER_BINS: [&str; 5] = ["key", "streamId", "time", "thumbnailUrl", "eventId"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub key: String,
    pub problem: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.problem)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub records: usize,
    pub violations: Vec<Violation>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Scan `location` and check every record against `table`. When
/// `expected_records` is set the record count must match it too.
pub async fn verify_store(
    store: &dyn RecordStore,
    location: &StoreLocation,
    table: &AttributeTable,
    expected_records: Option<u64>,
) -> PipelineResult<AuditReport> {
    let records = store.scan(location).await?;
    let mut report = AuditReport {
        records: records.len(),
        violations: Vec::new(),
    };

    if let Some(expected) = expected_records {
        if records.len() as u64 != expected {
            report.violations.push(Violation {
                key: format!("{}/{}", location.namespace, location.set_name),
                problem: format!("expected {} records, found {}", expected, records.len()),
            });
        }
    }

    for (key, record) in &records {
        report.violations.extend(check_record(key, record, table));
    }

    if report.is_clean() {
        info!(records = report.records, "audit passed");
    } else {
        warn!(
            records = report.records,
            violations = report.violations.len(),
            "audit found inconsistent records"
        );
    }
    Ok(report)
}

/// Every problem found on a single record.
pub fn check_record(key: &RecordKey, record: &Record, table: &AttributeTable) -> Vec<Violation> {
    let mut problems = Vec::new();

    for bin in DRIVER_BINS {
        if record.bin(bin).is_none() {
            problems.push(format!("missing bin '{}'", bin));
        }
    }

    let Some(stream_id) = record.bin("streamId").and_then(|b| b.as_int()) else {
        return violations(key, problems);
    };
    let stream_index = stream_id as u32;
    let row = table.row_for(stream_index);

    match record.bin("exLevel").and_then(|b| b.as_int()) {
        Some(level) if level == table.row_index(stream_index) as i64 => {}
        Some(level) => problems.push(format!("exLevel {} does not match stream {}", level, stream_id)),
        None => problems.push("missing bin 'exLevel'".to_string()),
    }

    let Some(face_ids) = record.bin("faceIds").and_then(|b| b.as_str_list()) else {
        problems.push("missing bin 'faceIds'".to_string());
        return violations(key, problems);
    };
    if face_ids.len() != row.len() {
        problems.push(format!("{} faces, attribute row has {}", face_ids.len(), row.len()));
    }
    let face_set: BTreeSet<&String> = face_ids.iter().collect();

    match record.bin("ages").and_then(|b| b.as_int_map()) {
        Some(ages) => {
            if ages.keys().collect::<BTreeSet<_>>() != face_set {
                problems.push("ages keys differ from faceIds".to_string());
            } else if face_ids.iter().zip(row).any(|(id, p)| ages.get(id) != Some(&p.age)) {
                problems.push("ages do not follow the attribute row".to_string());
            }
        }
        None => problems.push("missing bin 'ages'".to_string()),
    }

    match record.bin("genders").and_then(|b| b.as_str_map()) {
        Some(genders) => {
            if genders.keys().collect::<BTreeSet<_>>() != face_set {
                problems.push("genders keys differ from faceIds".to_string());
            } else if face_ids
                .iter()
                .zip(row)
                .any(|(id, p)| genders.get(id).map(String::as_str) != Some(p.gender.as_str()))
            {
                problems.push("genders do not follow the attribute row".to_string());
            }
        }
        None => problems.push("missing bin 'genders'".to_string()),
    }

    violations(key, problems)
}

fn violations(key: &RecordKey, problems: Vec<String>) -> Vec<Violation> {
    problems
        .into_iter()
        .map(|problem| Violation {
            key: key.user_key.clone(),
            problem,
        })
        .collect()
}
