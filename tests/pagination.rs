use mpds_client::{
    Client, ClientConfig, CrystalData, Error, Fields, ObjectType, PageRequest, Query, RawResponse,
    Result, Transport,
};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

/// Replays canned answers and records every request.
#[derive(Default)]
struct Scripted {
    answers: RefCell<VecDeque<RawResponse>>,
    seen: RefCell<Vec<(String, PageRequest)>>,
}

impl Scripted {
    fn new(answers: impl IntoIterator<Item = RawResponse>) -> Self {
        Self {
            answers: RefCell::new(answers.into_iter().collect()),
            seen: RefCell::default(),
        }
    }

    fn requests(&self) -> Vec<PageRequest> {
        self.seen.borrow().iter().map(|(_, r)| r.clone()).collect()
    }
}

impl Transport for Scripted {
    fn fetch(&self, _endpoint: &str, api_key: &str, request: &PageRequest) -> Result<RawResponse> {
        self.seen
            .borrow_mut()
            .push((api_key.to_string(), request.clone()));
        Ok(self
            .answers
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| RawResponse::new(500, "script exhausted")))
    }
}

fn client(answers: impl IntoIterator<Item = RawResponse>) -> Client<Scripted> {
    let cfg = ClientConfig {
        endpoint: "http://mpds.test/v0/download/facet".to_string(),
        key: "test-key".to_string(),
        verify: true,
    };
    Client::with_transport(cfg, Scripted::new(answers))
        .with_pause(Duration::ZERO)
        .with_progress(false)
}

fn page(entries: Value, npages: u32, count: u64) -> RawResponse {
    RawResponse::new(
        200,
        json!({"out": entries, "npages": npages, "count": count, "error": null}).to_string(),
    )
}

fn structure(id: u64) -> Value {
    json!({
        "object_type": "S",
        "phase_id": id,
        "chemical_formula": format!("Ti{id}O2"),
        "sg_n": 136,
        "entry": format!("S{id}"),
    })
}

fn three_pages() -> Vec<RawResponse> {
    vec![
        page(json!([structure(1), structure(2)]), 3, 5),
        page(json!([structure(3), structure(4)]), 3, 5),
        page(json!([structure(5)]), 3, 5),
    ]
}

fn phase_ids(rows: &mpds_client::ResultSet) -> Vec<u64> {
    rows.iter().map(|r| r["phase_id"].as_u64().unwrap()).collect()
}

#[test]
fn no_hits_is_an_empty_result() {
    let c = client([page(json!([]), 0, 0)]);
    let rows = c.execute(&Query::new().elements("Xx"), &Fields::raw()).unwrap();
    assert!(rows.is_empty());
    assert_eq!(rows.declared_count(), 0);
    assert_eq!(c.transport().requests().len(), 1);

    let c = client([RawResponse::new(204, "")]);
    let rows = c.execute(&Query::new(), &Fields::default()).unwrap();
    assert!(rows.is_empty());
}

#[test]
fn null_out_is_an_empty_result() {
    for body in [r#"{"out": null}"#, r#"{"out": null, "npages": 0, "count": 0, "error": null}"#] {
        let c = client([RawResponse::new(200, body)]);
        let rows = c.execute(&Query::new().formulae("Xx2"), &Fields::default()).unwrap();
        assert!(rows.is_empty());
        assert_eq!(rows.declared_count(), 0);
    }

    let c = client([RawResponse::new(200, r#"{"out": null}"#)]);
    assert_eq!(c.count(&Query::new()).unwrap(), 0);
}

#[test]
fn pages_are_followed_in_order() {
    let c = client(three_pages()).with_pagesize(2);
    let query = Query::new().elements("Ti-O").classes("binary");
    let rows = c.execute(&query, &Fields::raw()).unwrap();

    assert_eq!(phase_ids(&rows), vec![1, 2, 3, 4, 5]);
    assert_eq!(rows.pages(), 3);

    let requests = c.transport().requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(
        requests.iter().map(|r| r.page).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    for r in &requests {
        assert_eq!(r.pagesize, 2);
        assert_eq!(r.q, r#"{"classes":"binary","elements":"Ti-O"}"#);
        assert_eq!(r.phases, "");
    }
    assert!(c.transport().seen.borrow().iter().all(|(key, _)| key == "test-key"));
}

#[test]
fn repeated_queries_give_identical_results() {
    let query = Query::new().elements("Ti-O");
    let first = client(three_pages()).execute(&query, &Fields::default()).unwrap();
    let second = client(three_pages()).execute(&query, &Fields::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn malformed_page_fails_the_whole_call() {
    let mut answers = three_pages();
    answers[1] = RawResponse::new(200, r#"{"out": "oops", "npages": 3, "count": 5}"#);
    let err = client(answers)
        .execute(&Query::new(), &Fields::raw())
        .unwrap_err();
    assert!(matches!(err, Error::Malformed { page: 1, .. }), "{err:?}");

    let mut answers = three_pages();
    answers[2] = RawResponse::new(200, "<html>Bad gateway</html>");
    let err = client(answers)
        .execute(&Query::new(), &Fields::raw())
        .unwrap_err();
    assert!(matches!(err, Error::Malformed { page: 2, .. }), "{err:?}");
}

#[test]
fn empty_page_mid_way_is_malformed() {
    let mut answers = three_pages();
    answers[1] = page(json!([]), 3, 5);
    let err = client(answers)
        .execute(&Query::new(), &Fields::raw())
        .unwrap_err();
    assert!(matches!(err, Error::Malformed { page: 1, .. }));
}

#[test]
fn count_consistency_is_checked() {
    let mut answers = three_pages();
    answers[2] = page(json!([structure(5)]), 3, 6);
    let err = client(answers)
        .execute(&Query::new(), &Fields::raw())
        .unwrap_err();
    assert!(matches!(err, Error::CountChanged { before: 5, after: 6 }));

    let answers = vec![
        page(json!([structure(1), structure(2)]), 2, 4),
        page(json!([structure(3)]), 2, 4),
    ];
    let err = client(answers)
        .execute(&Query::new(), &Fields::raw())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::CountMismatch {
            collected: 3,
            declared: 4
        }
    ));
}

#[test]
fn oversized_datasets_are_refused() {
    let c = client([page(json!([structure(1)]), 101, 100_500)]);
    let err = c.execute(&Query::new(), &Fields::raw()).unwrap_err();
    assert!(matches!(
        err,
        Error::TooManyHits {
            count: 100_500,
            limit: 100_000
        }
    ));
    assert_eq!(c.transport().requests().len(), 1);
}

#[test]
fn failures_keep_their_kind() {
    let err = client([RawResponse::new(401, r#"{"error": "Key not recognized"}"#)])
        .execute(&Query::new(), &Fields::raw())
        .unwrap_err();
    assert!(matches!(err, Error::Unauthorized { status: 401, ref message } if message == "Key not recognized"));

    let err = client([RawResponse::new(429, "")])
        .execute(&Query::new(), &Fields::raw())
        .unwrap_err();
    assert!(matches!(err, Error::RateLimited { .. }));
    assert_eq!(err.status(), Some(429));

    let err = client([RawResponse::new(503, "maintenance")])
        .execute(&Query::new(), &Fields::raw())
        .unwrap_err();
    assert!(matches!(err, Error::Http { status: 503, .. }));

    let err = client([RawResponse::new(200, r#"{"error": "Unknown category: colour", "out": []}"#)])
        .execute(&Query::new().with("colour", "red"), &Fields::raw())
        .unwrap_err();
    assert!(matches!(err, Error::Api(ref m) if m == "Unknown category: colour"));
}

#[test]
fn failure_after_some_pages_returns_nothing_partial() {
    let mut answers = three_pages();
    answers[2] = RawResponse::new(429, "");
    let c = client(answers);
    let result = c.execute(&Query::new(), &Fields::raw());
    assert!(matches!(result, Err(Error::RateLimited { .. })));
    // No automatic retry.
    assert_eq!(c.transport().requests().len(), 3);
}

#[test]
fn phase_chunks_are_paginated_separately() {
    let answers = vec![
        page(json!([structure(1), structure(3)]), 2, 3),
        page(json!([structure(3)]), 2, 3),
        page(json!([structure(5)]), 1, 1),
    ];
    let c = client(answers).with_max_phases(2);
    let query = Query::new().props("band gap").phases([5, 1, 3, 3]);
    let rows = c.execute(&query, &Fields::raw()).unwrap();

    assert_eq!(phase_ids(&rows), vec![1, 3, 3, 5]);
    assert_eq!(rows.declared_count(), 4);

    let requests = c.transport().requests();
    let sent: Vec<(&str, u32)> = requests.iter().map(|r| (r.phases.as_str(), r.page)).collect();
    assert_eq!(sent, vec![("1,3", 0), ("1,3", 1), ("5", 0)]);
}

#[test]
fn unknown_entry_types_fail_with_selection_only() {
    let answers = || vec![page(json!([{"object_type": "Z"}]), 1, 1)];
    let raw = client(answers()).execute(&Query::new(), &Fields::raw()).unwrap();
    assert_eq!(raw.len(), 1);

    let err = client(answers())
        .execute(&Query::new(), &Fields::default())
        .unwrap_err();
    assert!(matches!(err, Error::UnknownObjectType(_)));
}

#[test]
fn default_table_has_seven_titled_columns() {
    let property = json!({
        "object_type": "P",
        "sample": {
            "material": {"phase_id": 77, "chemical_formula": "KAgI2", "entry": "P1",
                         "condition": [{"scalar": [{"value": 300}]}]},
            "measurement": [{"property": {"name": "heat capacity", "units": "J/K", "scalar": 12.5}}]
        }
    });
    let c = client([page(json!([structure(1), property]), 1, 2)]);
    let table = c.get_table(&Query::new(), &Fields::default(), None).unwrap();

    assert_eq!(
        table.columns(),
        ["Phase", "Formula", "SG", "Entry", "Property", "Units", "Value"]
    );
    assert_eq!(table.rows()[0][4], json!("crystal structure"));
    assert_eq!(table.rows()[0][6], Value::Null);
    assert_eq!(table.rows()[1][1], json!("KAgI2"));
    assert_eq!(table.column_f64("Value").unwrap(), vec![None, Some(12.5)]);
}

#[test]
fn custom_columns_for_selected_fields() {
    let property = |id: u64| json!({"object_type": "P", "sample": {"material": {"phase_id": id, "chemical_formula": "O2Ti"}}});
    let fields = Fields::select()
        .with(ObjectType::P, ["sample.material.phase_id", "sample.material.chemical_formula"])
        .unwrap();
    let c = client([page(json!([property(4), property(9)]), 1, 2)]);
    let table = c
        .get_table(&Query::new(), &fields, Some(&["Phid", "Object"]))
        .unwrap();
    assert_eq!(table.column_f64("Phid").unwrap(), vec![Some(4.0), Some(9.0)]);
}

#[test]
fn projections_and_functions_in_selected_fields() {
    let property = json!({
        "object_type": "P",
        "sample": {
            "material": {"phase_id": 12, "chemical_formula": "SrTiO3"},
            "measurement": [
                {"property": {"name": "band gap", "units": "eV", "scalar": 3.2}},
                {"property": {"name": "Seebeck coefficient", "units": "muV K-1", "scalar": -120}}
            ]
        }
    });
    let fields = Fields::select()
        .with(
            ObjectType::P,
            [
                "sample.measurement[*].property.name",
                "sample.measurement[-1].property.scalar",
                "length(sample.measurement)",
            ],
        )
        .unwrap();
    let c = client([page(json!([property]), 1, 1)]);
    let rows = c.execute(&Query::new(), &fields).unwrap();
    let row = &rows.entries()[0];
    assert_eq!(row[0], json!(["band gap", "Seebeck coefficient"]));
    assert_eq!(row[1].as_f64(), Some(-120.0));
    assert_eq!(row[2].as_f64(), Some(2.0));
}

#[test]
fn crystals_are_compiled_from_structure_rows() {
    let rutile = json!({
        "object_type": "S",
        "cell_abc": [4.594, 4.594, 2.959, 90, 90, 90],
        "sg_n": 136,
        "setting": "1",
        "basis_noneq": [[0, 0, 0], [0.3048, 0.3048, 0]],
        "els_noneq": ["Ti", "O"]
    });
    let cell_only = json!({"object_type": "S", "cell_abc": [1, 1, 1, 90, 90, 90], "sg_n": 136});
    let property = json!({"object_type": "P", "sample": {}});

    let c = client([page(json!([rutile, cell_only, property]), 1, 3)]);
    let crystals = c
        .get_crystals(&Query::new().elements("Ti-O").sgs(136))
        .unwrap();

    assert_eq!(crystals.len(), 1);
    assert_eq!(crystals[0].sg_n, 136);
    assert_eq!(crystals[0].els_noneq, vec!["Ti", "O"]);

    let sent: Value = serde_json::from_str(&c.transport().requests()[0].q).unwrap();
    assert_eq!(sent["props"], "atomic structure");
    assert_eq!(sent["sgs"], 136);
    assert_eq!(CrystalData::fields().selectors(ObjectType::S).len(), 5);
}

#[test]
fn count_uses_a_small_page() {
    let c = client([page(json!([structure(1)]), 16, 160)]);
    assert_eq!(c.count(&Query::new().elements("Ti-O")).unwrap(), 160);
    assert_eq!(c.transport().requests()[0].pagesize, 10);

    let c = client([page(json!([]), 0, 0)]);
    assert_eq!(c.count(&Query::new()).unwrap(), 0);
}
