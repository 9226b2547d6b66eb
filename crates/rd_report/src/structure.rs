//! crates/rd_report/src/structure.rs
//! Report data model + mapper from pipeline artifacts.
//! No I/O, no recomputation of winners, no floats. Deterministic ordering only.

use serde::Serialize;
use serde_json::Value;

use rd_core::numeric::Pct2;

use crate::ReportError;

// -------------------- Public model root & sections --------------------

#[derive(Clone, Debug, Serialize)]
pub struct ReportModel {
    pub cover: SectionCover,
    pub summary: SectionSummary,
    pub swaps: Vec<SwapRow>,
    pub districts: Vec<DistrictRow>,
    pub verification: SectionVerification,
    pub screen: Option<SectionScreen>,
    pub diagnostics: SectionDiagnostics,
    pub integrity: SectionIntegrity,
}

#[derive(Clone, Debug, Serialize)]
pub struct SectionCover {
    pub title: String,
    pub target_party: String,
    pub objective: String,
    pub no_loss: bool,
    pub compatibility: String,
    pub neighbor_source: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct SectionSummary {
    pub districts: u64,
    pub target_wins_before: u64,
    pub target_wins_after: u64,
    pub gain: i64,
    /// Share of districts won by the target, 2-decimal percent strings.
    pub share_before: String,
    pub share_after: String,
    pub committed_swaps: u64,
    pub stop_reason: String,
    pub districts_examined: u64,
    pub evaluations: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct SwapRow {
    pub from_pc: String,
    pub from_assembly: String,
    pub to_pc: String,
    pub to_assembly: String,
    pub before: String,
    pub after: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct DistrictRow {
    pub pc: String,
    pub winner: String,
    pub margin: String,
    pub margin_pct: String,
    pub valid_votes: String,
    pub assemblies: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct SectionVerification {
    pub clean: bool,
    pub total_votes_verified: String,
    pub winning_votes_verified: String,
    pub discrepancies: u64,
    pub mismatches: Vec<String>,
    pub replay_errors: Vec<String>,
    pub flipped: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScreenRow {
    pub assembly: String,
    pub pc: String,
    pub winner: String,
    pub margin_pct: String,
    pub neighbors: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SectionScreen {
    pub threshold: String,
    pub flagged: usize,
    pub rows: Vec<ScreenRow>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SectionDiagnostics {
    pub records_read: u64,
    pub loader_skipped: u64,
    pub malformed_numeric: u64,
    pub missing_references: u64,
    pub validation_warnings: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct InputDigestRow {
    pub name: String,
    pub sha256: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct SectionIntegrity {
    pub run_id: String,
    pub engine_vendor: String,
    pub engine_name: String,
    pub engine_version: String,
    pub engine_build: String,
    pub inputs: Vec<InputDigestRow>,
}

/// Artifacts the model is built from, all as already-parsed JSON.
pub struct ReportInputs<'a> {
    pub run_record: &'a Value,
    pub verification: &'a Value,
    pub swaps: &'a Value,
    pub districts_after: &'a Value,
    pub screen: Option<&'a Value>,
}

// -------------------- Mapper --------------------

pub fn build_model(inp: &ReportInputs<'_>) -> Result<ReportModel, ReportError> {
    let run = inp.run_record;

    let cover = SectionCover {
        title: "Redistricting What-If Report".into(),
        target_party: get_str(run, "/params/target_party")?,
        objective: get_str(run, "/params/objective").unwrap_or_else(|_| "net_flips".into()),
        no_loss: run.pointer("/params/no_loss").and_then(Value::as_bool).unwrap_or(true),
        compatibility: get_str(run, "/params/compatibility").unwrap_or_else(|_| "reservation_match".into()),
        neighbor_source: get_str(run, "/search/neighbor_source").unwrap_or_else(|_| "adjacency".into()),
    };

    let districts = inp
        .districts_after
        .as_array()
        .ok_or(ReportError::MissingField("districts_after"))?;
    let n_districts = districts.len() as u64;
    let before = get_u64(run, "/search/target_wins_before")?;
    let after = get_u64(run, "/search/target_wins_after")?;
    let summary = SectionSummary {
        districts: n_districts,
        target_wins_before: before,
        target_wins_after: after,
        gain: after as i64 - before as i64,
        share_before: Pct2::from_ratio(before, n_districts).to_string(),
        share_after: Pct2::from_ratio(after, n_districts).to_string(),
        committed_swaps: get_u64(run, "/search/committed_swaps")?,
        stop_reason: get_str(run, "/search/stop_reason")?,
        districts_examined: get_u64(run, "/search/districts_examined").unwrap_or(0),
        evaluations: get_u64(run, "/search/evaluations").unwrap_or(0),
    };

    let swaps: Vec<SwapRow> = inp
        .swaps
        .as_array()
        .ok_or(ReportError::MissingField("swaps"))?
        .iter()
        .map(|s| SwapRow {
            from_pc: cell(s.get("fromPC")),
            from_assembly: cell(s.get("fromAssembly")),
            to_pc: cell(s.get("toPC")),
            to_assembly: cell(s.get("toAssembly")),
            before: format!("{} / {}", party(s.get("earlierWonByA")), party(s.get("earlierWonByB"))),
            after: format!("{} / {}", party(s.get("nowWonByA")), party(s.get("nowWonByB"))),
        })
        .collect();

    let districts: Vec<DistrictRow> = districts
        .iter()
        .map(|d| DistrictRow {
            pc: cell(d.get("PC_Number")),
            winner: party(d.get("Winning_Party")),
            margin: group_thousands(&cell(d.get("Winning_Margin"))),
            margin_pct: cell(d.get("Winning_Margin_Percentage")),
            valid_votes: group_thousands(&cell(d.get("Valid_Votes"))),
            assemblies: d.get("Assemblies").and_then(Value::as_array).map(Vec::len).unwrap_or(0),
        })
        .collect();

    let v = inp.verification;
    let discrepancies = get_u64(v, "/totalDiscrepancies")?;
    let replay_errors: Vec<String> = list(v, "/replayErrors")
        .iter()
        .map(|e| format!("#{} {} <-> {}: {}", cell(e.get("index")), cell(e.get("unitA")), cell(e.get("unitB")), cell(e.get("reason"))))
        .collect();
    let verification = SectionVerification {
        clean: discrepancies == 0,
        total_votes_verified: group_thousands(&get_u64(v, "/totalVotesVerified")?.to_string()),
        winning_votes_verified: group_thousands(&get_u64(v, "/winningVotesVerified").unwrap_or(0).to_string()),
        discrepancies,
        mismatches: list(v, "/mismatches")
            .iter()
            .map(|m| format!("PC {}: expected {}, found {}", cell(m.get("district")), party(m.get("expected")), party(m.get("actual"))))
            .collect(),
        replay_errors,
        flipped: list(v, "/flipped")
            .iter()
            .map(|f| format!("PC {}: {} -> {}", cell(f.get("district")), party(f.get("before")), party(f.get("after"))))
            .collect(),
    };

    let screen = inp.screen.map(|s| SectionScreen {
        threshold: cell(s.get("threshold")),
        flagged: s.get("flagged").and_then(Value::as_array).map(Vec::len).unwrap_or(0),
        rows: list(s, "/candidates")
            .iter()
            .map(|c| ScreenRow {
                assembly: cell(c.get("Assembly_No")),
                pc: cell(c.get("PC_Number")),
                winner: party(c.get("Winning_Party")),
                margin_pct: cell(c.get("Win_Margin_Percentage")),
                neighbors: c
                    .get("neighbors")
                    .and_then(Value::as_array)
                    .map(|ns| {
                        ns.iter()
                            .map(|n| format!("{} ({}, {})", cell(n.get("Assembly_No")), party(n.get("Winning_Party")), cell(n.get("Win_Margin_Percentage"))))
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default(),
            })
            .collect(),
    });

    let diag_sum = |keys: &[&str]| -> u64 {
        keys.iter()
            .map(|k| run.pointer(&format!("/diagnostics/{k}")).and_then(Value::as_u64).unwrap_or(0))
            .sum()
    };
    let diagnostics = SectionDiagnostics {
        records_read: diag_sum(&["records_read"]),
        loader_skipped: diag_sum(&["loader_skipped"]),
        malformed_numeric: diag_sum(&["malformed_numeric"]),
        missing_references: diag_sum(&[
            "records_without_unit",
            "records_without_party",
            "units_without_district",
            "mapped_units_without_records",
            "districts_without_records",
            "districts_emptied_by_duplicates",
            "duplicate_assignments",
        ]),
        validation_warnings: diag_sum(&["validation_warnings"]),
    };

    let inputs: Vec<InputDigestRow> = run
        .pointer("/inputs")
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|h| InputDigestRow { name: k.clone(), sha256: h.to_string() }))
                .collect()
        })
        .unwrap_or_default();

    let integrity = SectionIntegrity {
        run_id: get_str(run, "/id")?,
        engine_vendor: get_str(run, "/engine/vendor").unwrap_or_else(|_| "rd".into()),
        engine_name: get_str(run, "/engine/name").unwrap_or_else(|_| "rd_engine".into()),
        engine_version: get_str(run, "/engine/version").unwrap_or_else(|_| "0.0.0".into()),
        engine_build: get_str(run, "/engine/build").unwrap_or_else(|_| "dev".into()),
        inputs,
    };

    Ok(ReportModel { cover, summary, swaps, districts, verification, screen, diagnostics, integrity })
}

// -------------------- Helpers (pure; no floats) --------------------

fn get_str(root: &Value, ptr: &'static str) -> Result<String, ReportError> {
    root.pointer(ptr)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ReportError::MissingField(ptr))
}

fn get_u64(root: &Value, ptr: &'static str) -> Result<u64, ReportError> {
    root.pointer(ptr).and_then(Value::as_u64).ok_or(ReportError::MissingField(ptr))
}

fn list<'a>(root: &'a Value, ptr: &str) -> &'a [Value] {
    root.pointer(ptr).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

fn cell(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Party label, with "-" for "no winner".
fn party(v: Option<&Value>) -> String {
    match v.and_then(Value::as_str) {
        Some(s) => s.to_string(),
        None => "-".to_string(),
    }
}

/// "1234567" -> "1,234,567"; non-digit input is returned unchanged.
pub fn group_thousands(s: &str) -> String {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return s.to_string();
    }
    let n = s.len();
    let mut out = String::with_capacity(n + n / 3);
    for (i, ch) in s.chars().enumerate() {
        if i > 0 && (n - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
