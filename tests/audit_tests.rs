use ingestlab::audit::{check_record, verify_store};
use ingestlab::bins;
use ingestlab::core::AttributeTable;
use ingestlab::store::{Bins, MemoryStore, Record, RecordStore, StoreLocation};
use std::collections::BTreeMap;

fn location() -> StoreLocation {
    StoreLocation::new("test", "search-engine")
}

fn complete_bins(stream_id: i64, faces: &[(&str, i64, &str)]) -> Bins {
    let face_ids: Vec<String> = faces.iter().map(|(id, _, _)| id.to_string()).collect();
    let ages: BTreeMap<String, i64> = faces.iter().map(|(id, age, _)| (id.to_string(), *age)).collect();
    let genders: BTreeMap<String, String> =
        faces.iter().map(|(id, _, g)| (id.to_string(), g.to_string())).collect();

    bins! {
        "key" => format!("{}:100", stream_id),
        "streamId" => stream_id,
        "time" => 100i64,
        "thumbnailUrl" => "http://thumbs/x.jpeg",
        "eventId" => 1i64,
        "faceIds" => face_ids,
        "exLevel" => stream_id % 10,
        "ages" => ages,
        "genders" => genders,
    }
}

fn record(bins: Bins) -> Record {
    Record { bins, generation: 5 }
}

#[test]
fn test_complete_record_passes() {
    let table = AttributeTable::builtin();
    let key = location().key("8:100");
    let rec = record(complete_bins(8, &[("a", 26, "male"), ("b", 27, "female")]));

    assert!(check_record(&key, &rec, &table).is_empty());
}

#[test]
fn test_swapped_attributes_are_flagged() {
    let table = AttributeTable::builtin();
    let key = location().key("8:100");
    let rec = record(complete_bins(8, &[("a", 27, "female"), ("b", 26, "male")]));

    let problems = check_record(&key, &rec, &table);
    assert_eq!(problems.len(), 2);
    assert!(problems.iter().all(|v| v.key == "8:100"));
}

#[test]
fn test_missing_enrichment_is_flagged() {
    let table = AttributeTable::builtin();
    let key = location().key("3:100");
    let mut bins = complete_bins(3, &[("a", 17, "female")]);
    bins.remove("genders");
    bins.remove("exLevel");

    let problems: Vec<String> = check_record(&key, &record(bins), &table)
        .into_iter()
        .map(|v| v.problem)
        .collect();
    assert!(problems.contains(&"missing bin 'genders'".to_string()));
    assert!(problems.contains(&"missing bin 'exLevel'".to_string()));
}

#[test]
fn test_face_count_mismatch_is_flagged() {
    let table = AttributeTable::builtin();
    let key = location().key("0:100");
    let rec = record(complete_bins(0, &[("a", 33, "male"), ("b", 33, "male")]));

    let problems = check_record(&key, &rec, &table);
    assert!(problems.iter().any(|v| v.problem.contains("2 faces")));
}

#[tokio::test]
async fn test_verify_store_counts_records() {
    let store = MemoryStore::new();
    let loc = location();
    store
        .upsert(&loc.key("0:100"), complete_bins(0, &[("a", 33, "male")]))
        .await
        .unwrap();
    store
        .upsert(&StoreLocation::new("other", "set").key("0:100"), bins! { "key" => "0:100" })
        .await
        .unwrap();

    let table = AttributeTable::builtin();
    let report = verify_store(&store, &loc, &table, Some(1)).await.unwrap();
    assert_eq!(report.records, 1);
    assert!(report.is_clean());

    let report = verify_store(&store, &loc, &table, Some(2)).await.unwrap();
    assert_eq!(report.violations.len(), 1);
    assert!(report.violations[0].problem.contains("expected 2 records"));
}
