use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;
use stream_join::JoinError;
use stream_join::config::JoinConfig;
use stream_join::processing::{route_streams, run};
use stream_join::store::MemoryStore;
use stream_join::types::{Manifest, ResourceStream, Row};

fn row(v: serde_json::Value) -> Row {
    v.as_object().cloned().unwrap()
}

fn sales_rows() -> Vec<Row> {
    vec![
        row(json!({"region": "eu", "amount": 3, "rep": "ada"})),
        row(json!({"region": "eu", "amount": 5, "rep": "joan"})),
        row(json!({"region": "us", "amount": -1, "rep": "ada"})),
    ]
}

fn config(full: bool) -> JoinConfig {
    serde_json::from_value(json!({
        "source": {"name": "sales", "key": "{region}"},
        "target": {"name": "regions", "key": "{region}", "full": full},
        "fields": {
            "total": {"name": "amount", "aggregate": "sum"},
            "reps": {"name": "rep", "aggregate": "set"}
        }
    }))
    .unwrap()
}

fn manifest() -> Manifest {
    serde_json::from_value(json!({
        "resources": [
            {
                "name": "sales",
                "path": "data/sales.csv",
                "schema": {"fields": [
                    {"name": "region", "type": "string"},
                    {"name": "amount", "type": "number"},
                    {"name": "rep", "type": "string"}
                ]}
            },
            {
                "name": "notes",
                "path": "data/notes.csv",
                "schema": {"fields": [{"name": "text", "type": "string"}]}
            },
            {
                "name": "regions",
                "path": "data/regions.csv",
                "schema": {"fields": [{"name": "region", "type": "string"}]}
            }
        ]
    }))
    .unwrap()
}

fn resources() -> Vec<ResourceStream> {
    vec![
        ResourceStream::from_rows("sales", sales_rows()),
        ResourceStream::from_rows("notes", vec![row(json!({"text": "hi"}))]),
        ResourceStream::from_rows("regions", vec![
            row(json!({"region": "eu", "total": "stale"})),
            row(json!({"region": "apac"})),
        ]),
    ]
}

fn drain(
    streams: impl Iterator<Item = stream_join::JoinResult<ResourceStream>>,
) -> Vec<(String, Vec<Row>)> {
    streams
        .map(|stream| {
            let ResourceStream { name, rows } = stream.unwrap();
            (name, rows.map(|r| r.unwrap()).collect())
        })
        .collect()
}

#[test]
fn enrichment_merges_aggregates_and_nulls_unmatched_keys() {
    let (manifest, streams) = run(config(true), manifest(), resources()).unwrap();

    // Target schema extended in place; other resources untouched.
    let regions = &manifest.resources[2];
    let names: Vec<&str> = regions.schema.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["region", "reps", "total"]);
    assert_eq!(regions.schema.fields[1].field_type, "array");
    assert_eq!(regions.schema.fields[2].field_type, "number");
    assert_eq!(manifest.resources[1].schema.fields.len(), 1);

    let streams = drain(streams);
    assert_eq!(streams.len(), 3);
    assert_eq!(streams[0].1, sales_rows());
    assert_eq!(streams[1], ("notes".to_string(), vec![row(json!({"text": "hi"}))]));

    let regions = &streams[2].1;
    // The stale "total" is overwritten in place, so field order is preserved.
    assert_eq!(regions[0], row(json!({"region": "eu", "total": 8, "reps": ["ada", "joan"]})));
    let names: Vec<&String> = regions[0].keys().collect();
    assert_eq!(names, ["region", "total", "reps"]);
    // Unmatched key, full join: all configured fields present and null.
    assert_eq!(regions[1], row(json!({"region": "apac", "reps": null, "total": null})));
}

#[test]
fn inner_join_drops_unmatched_target_rows() {
    let (_, streams) = run(config(false), manifest(), resources()).unwrap();
    let streams = drain(streams);
    let regions = &streams[2].1;
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0]["region"], json!("eu"));
}

#[test]
fn every_aggregation_kind_survives_an_end_to_end_run() {
    let config: JoinConfig = serde_json::from_value(json!({
        "source": {"name": "sales", "key": "{region}", "delete": true},
        "target": {"name": "regions", "key": "{region}"},
        "fields": {
            "a_sum": {"name": "amount", "aggregate": "sum"},
            "b_avg": {"name": "amount", "aggregate": "avg"},
            "c_max": {"name": "amount", "aggregate": "max"},
            "d_min": {"name": "amount", "aggregate": "min"},
            "e_first": {"name": "rep", "aggregate": "first"},
            "f_last": {"name": "rep", "aggregate": "last"},
            "g_any": {"name": "rep", "aggregate": "any"},
            "h_count": {"aggregate": "count"},
            "i_set": {"name": "rep", "aggregate": "set"},
            "j_array": {"name": "rep", "aggregate": "array"}
        }
    }))
    .unwrap();

    let resources = vec![
        ResourceStream::from_rows("sales", sales_rows()),
        ResourceStream::from_rows("regions", vec![row(json!({"region": "eu"}))]),
    ];
    let store = Rc::new(RefCell::new(MemoryStore::new()));
    let streams = route_streams(Rc::new(config.resolve()), store, resources);

    let streams = drain(streams);
    assert_eq!(streams.len(), 1); // source swallowed by delete
    assert_eq!(streams[0].1, vec![row(json!({
        "region": "eu",
        "a_sum": 8,
        "b_avg": 4.0,
        "c_max": 5,
        "d_min": 3,
        "e_first": "ada",
        "f_last": "joan",
        "g_any": "joan",
        "h_count": 2,
        "i_set": ["ada", "joan"],
        "j_array": ["ada", "joan"]
    }))]);
}

#[test]
fn target_before_source_is_an_ordering_violation() {
    let config = config(true).resolve();
    let store = Rc::new(RefCell::new(MemoryStore::new()));
    let mut streams = route_streams(
        Rc::new(config),
        store,
        vec![
            ResourceStream::from_rows("regions", vec![]),
            ResourceStream::from_rows("sales", sales_rows()),
        ],
    );

    let err = streams.next().unwrap().unwrap_err();
    assert!(matches!(
        err,
        JoinError::OrderingViolation { ref source_name, ref target_name }
            if source_name == "sales" && target_name == "regions"
    ));
    assert_eq!(
        err.to_string(),
        "ordering violation: source resource 'sales' must precede target resource 'regions'"
    );
    // Terminal: no further resources are routed.
    assert!(streams.next().is_none());
}

#[test]
fn sqlite_and_memory_backends_agree() {
    let (_, streams) = run(config(true), manifest(), resources()).unwrap();
    let from_sqlite = drain(streams);

    let store = Rc::new(RefCell::new(MemoryStore::new()));
    let streams = route_streams(Rc::new(config(true).resolve()), store, resources());
    let from_memory = drain(streams);

    assert_eq!(from_sqlite, from_memory);
}
