// crates/rd_pipeline/tests/pipeline_e2e.rs
//
// Manifest → outputs through real files. Two districts; swapping units 2 and 3
// flips district 1 to BJP without costing anything in district 2.

use std::fs;
use std::path::{Path, PathBuf};

use assert_json_diff::assert_json_include;
use serde_json::{json, Value};

use rd_algo::{CommittedSwap, ConsistencyVerifier, SwapProposal};
use rd_core::ids::{DistrictId, PartyId, UnitId};
use rd_core::variables::Objective;
use rd_io::loader::{load_district_map, load_records};
use rd_pipeline::build_result::build_verification_doc;
use rd_pipeline::{aggregate, run_from_manifest_path, ParamOverrides, PipelineError};

fn cand(unit: u32, party: &str, votes: Value, valid: u32, pos: &str) -> Value {
    json!({
        "Assembly_No": unit,
        "Party": party,
        "Votes": votes,
        "Valid_Votes": valid,
        "Electors": valid * 2,
        "Constituency_Type": "GEN",
        "Candidate_Position": pos
    })
}

fn write_world(dir: &Path, params: Option<Value>) -> PathBuf {
    let records = json!([
        cand(1, "BJP", json!(500), 800, "1"),
        cand(1, "INC", json!(300), 800, "2"),
        cand(2, "INC", json!("600"), 700, "1"),
        cand(2, "BJP", json!(200), 700, "2"),
        cand(3, "INC", json!(100), 150, "1"),
        cand(3, "BJP", json!(50), 150, "2"),
        cand(4, "INC", json!(300), 400, "1"),
        cand(4, "BJP", json!(100), 400, "2"),
        cand(4, "NOTA", json!("N/A"), 400, "3")
    ]);
    fs::write(dir.join("records.json"), serde_json::to_vec(&records).unwrap()).unwrap();
    fs::write(dir.join("districts.json"), br#"{"1": [1, 2], "2": [3, 4]}"#).unwrap();
    fs::write(dir.join("adjacency.json"), br#"{"1": [2], "2": [1, 3], "3": [2, 4], "4": [3]}"#).unwrap();

    let mut manifest = json!({
        "records_path": "records.json",
        "districts_path": "districts.json",
        "adjacency_path": "adjacency.json"
    });
    if let Some(p) = params {
        fs::write(dir.join("params.json"), serde_json::to_vec(&p).unwrap()).unwrap();
        manifest["params_path"] = json!("params.json");
    }
    let mpath = dir.join("manifest.json");
    fs::write(&mpath, serde_json::to_vec(&manifest).unwrap()).unwrap();
    mpath
}

#[test]
fn single_swap_flips_district_one() {
    let dir = tempfile::tempdir().unwrap();
    let m = write_world(dir.path(), Some(json!({"target_party": "BJP", "screen_margin_pct": "50"})));
    let out = run_from_manifest_path(&m, &ParamOverrides::default()).unwrap();

    // base partition, section-6 district shape
    let d1 = serde_json::to_value(&out.districts[0]).unwrap();
    assert_json_include!(
        actual: d1,
        expected: json!({
            "PC_Number": 1,
            "Valid_Votes": "1500",
            "Electors": "3000",
            "Winning_Party": "INC",
            "Winning_Margin": "200",
            "Winning_Margin_Percentage": "13.33",
            "swappable_neighbors": ["3"]
        })
    );

    let swaps = serde_json::to_value(&out.swaps).unwrap();
    assert_eq!(
        swaps,
        json!([{
            "fromPC": 1, "fromAssembly": 2, "toPC": 2, "toAssembly": 3,
            "earlierWonByA": "INC", "earlierWonByB": "INC",
            "nowWonByA": "BJP", "nowWonByB": "INC",
            "score": 1
        }])
    );
    assert_eq!(serde_json::to_value(&out.mapping).unwrap(), json!({"1": [1, 3], "2": [2, 4]}));
    assert_eq!(serde_json::to_value(&out.winners).unwrap(), json!({"1": "BJP", "2": "INC"}));

    // independent tally of the final district 1: units 1 and 3
    let bjp = 500 + 50;
    let inc = 300 + 100;
    let after = serde_json::to_value(&out.districts_after[0]).unwrap();
    assert_eq!(after["Winning_Margin"], json!((bjp - inc).to_string()));

    let v = serde_json::to_value(&out.verification).unwrap();
    assert_json_include!(
        actual: v,
        expected: json!({
            "totalVotesVerified": 2150,
            "totalDiscrepancies": 0,
            "targetWinsBefore": 0,
            "targetWinsAfter": 1,
            "flipped": [{"district": 1, "before": "INC", "after": "BJP"}]
        })
    );
    assert!(!out.has_discrepancies());
    assert_eq!(out.diagnostics.malformed_numeric, 1);
    assert!(out.screen.is_some());
    assert!(out.run_record.id.starts_with("RUN:"));
}

#[test]
fn run_id_is_stable_and_tracks_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let m = write_world(dir.path(), Some(json!({"target_party": "BJP"})));
    let a = run_from_manifest_path(&m, &ParamOverrides::default()).unwrap();
    let b = run_from_manifest_path(&m, &ParamOverrides::default()).unwrap();
    assert_eq!(a.run_record.id, b.run_record.id);

    let strict = ParamOverrides { objective: Some(Objective::BothFlip), ..Default::default() };
    let c = run_from_manifest_path(&m, &strict).unwrap();
    assert_ne!(a.run_record.id, c.run_record.id);
    // district 2 stays INC, so nothing qualifies
    assert!(c.swaps.is_empty());
    assert_eq!(c.run_record.body.search.stop_reason, "exhausted");
}

#[test]
fn target_party_is_required_somewhere() {
    let dir = tempfile::tempdir().unwrap();
    let m = write_world(dir.path(), None);
    let err = run_from_manifest_path(&m, &ParamOverrides::default()).unwrap_err();
    assert!(matches!(err, PipelineError::Params(_)));

    let over = ParamOverrides { target_party: Some("BJP".parse().unwrap()), ..Default::default() };
    let out = run_from_manifest_path(&m, &over).unwrap();
    assert_eq!(out.swaps.len(), 1);
}

#[test]
fn empty_mapping_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let m = write_world(dir.path(), Some(json!({"target_party": "BJP"})));
    fs::write(dir.path().join("districts.json"), b"{}").unwrap();
    let err = run_from_manifest_path(&m, &ParamOverrides::default()).unwrap_err();
    assert!(matches!(err, PipelineError::Validate(ref s) if s.contains("Partition.Empty")), "{err}");
}

#[test]
fn check_reports_without_searching() {
    let dir = tempfile::tempdir().unwrap();
    let m = write_world(dir.path(), Some(json!({"target_party": "BJP"})));
    let report = rd_pipeline::check_from_manifest_path(&m, &ParamOverrides::default()).unwrap();
    assert!(report.pass);

    fs::write(dir.path().join("districts.json"), b"{}").unwrap();
    let report = rd_pipeline::check_from_manifest_path(&m, &ParamOverrides::default()).unwrap();
    assert!(!report.pass);
    assert!(report.issues.iter().any(|i| i.code == "Partition.Empty"));
}

#[test]
fn district_without_adjacency_is_never_a_swap_partner() {
    let dir = tempfile::tempdir().unwrap();
    let m = write_world(dir.path(), Some(json!({"target_party": "BJP"})));
    // no unit of district 2 has its own entry; unit 1 still points at unit 3
    fs::write(dir.path().join("adjacency.json"), br#"{"1": [3], "2": [3]}"#).unwrap();
    let out = run_from_manifest_path(&m, &ParamOverrides::default()).unwrap();

    let codes: Vec<&str> = out.validation.issues.iter().map(|i| i.code).collect();
    assert!(codes.contains(&"District.NoAdjacency"), "{codes:?}");
    let swaps = serde_json::to_value(&out.swaps).unwrap();
    assert!(
        swaps.as_array().unwrap().iter().all(|s| s["fromPC"] != json!(2) && s["toPC"] != json!(2)),
        "{swaps}"
    );
    assert!(out.swaps.is_empty());
    assert_eq!(serde_json::to_value(&out.mapping).unwrap(), json!({"1": [1, 2], "2": [3, 4]}));
}

#[test]
fn tampered_swap_log_surfaces_as_discrepancies() {
    let dir = tempfile::tempdir().unwrap();
    let m = write_world(dir.path(), Some(json!({"target_party": "BJP"})));
    let mut out = run_from_manifest_path(&m, &ParamOverrides::default()).unwrap();
    assert!(!out.has_discrepancies());

    let records = load_records(&dir.path().join("records.json")).unwrap();
    let districts = load_district_map(&dir.path().join("districts.json")).unwrap();
    let agg = aggregate(&records, &districts);
    let bjp: PartyId = "BJP".parse().unwrap();
    let inc: PartyId = "INC".parse().unwrap();

    // the real swap of units 2 and 3 makes BJP win district 1; the log claims INC kept it
    let forged = CommittedSwap {
        proposal: SwapProposal {
            unit_a: UnitId::new(2),
            district_a: DistrictId::new(1),
            unit_b: UnitId::new(3),
            district_b: DistrictId::new(2),
        },
        earlier_winner_a: Some(inc.clone()),
        earlier_winner_b: Some(inc.clone()),
        now_winner_a: Some(inc.clone()),
        now_winner_b: Some(inc.clone()),
        score: 1,
    };
    let (report, _) = ConsistencyVerifier::new(&agg.registry).verify(&agg.partition, &[forged.clone()], &bjp);
    out.verification = build_verification_doc(&report, &bjp);
    assert!(out.has_discrepancies());
    assert_json_include!(
        actual: serde_json::to_value(&out.verification).unwrap(),
        expected: json!({
            "totalDiscrepancies": 1,
            "mismatches": [{"district": 1, "expected": "INC", "actual": "BJP"}]
        })
    );

    // the same swap logged twice cannot be replayed the second time
    let mut replayed_twice = forged;
    replayed_twice.now_winner_a = Some(bjp.clone());
    let log = vec![replayed_twice.clone(), replayed_twice];
    let (report, _) = ConsistencyVerifier::new(&agg.registry).verify(&agg.partition, &log, &bjp);
    out.verification = build_verification_doc(&report, &bjp);
    assert_eq!(out.verification.total_discrepancies, 0);
    assert_eq!(out.verification.replay_errors.len(), 1);
    assert!(out.has_discrepancies());
}
