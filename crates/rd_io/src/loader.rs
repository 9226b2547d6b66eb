//! Loader: read the local JSON inputs of a run (manifest → records → districts →
//! adjacency → params) and hand typed values to the pipeline. No network I/O.
//!
//! Shape problems of the file as a whole (not an array, not an object, bad JSON)
//! are errors. Problems of a single entry are skipped with a warning and
//! counted in `LoadSkips`; numeric fields are kept raw for the aggregator.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use rd_core::entities::CandidateRecord;
use rd_core::ids::{DistrictId, UnitId};
use rd_core::numeric::RawNumeric;
use rd_core::variables::SearchParams;

use crate::{hasher, manifest as man, IoError};

/// Hard cap on any single input file.
pub const MAX_INPUT_BYTES: u64 = 256 * 1024 * 1024;

// ----------------------------- Wire-facing types -----------------------------

/// One candidate row as found on the wire. Every field is optional and untyped
/// so that malformed values reach the aggregator instead of failing the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCandidateRecord {
    #[serde(rename = "Assembly_No", default)]
    pub assembly_no: Option<Value>,
    #[serde(rename = "Party", default)]
    pub party: Option<Value>,
    #[serde(rename = "Votes", default)]
    pub votes: Option<Value>,
    #[serde(rename = "Valid_Votes", default)]
    pub valid_votes: Option<Value>,
    #[serde(rename = "Vote_Share_Percentage", default)]
    pub vote_share_percentage: Option<Value>,
    #[serde(rename = "Electors", default)]
    pub electors: Option<Value>,
    #[serde(rename = "Constituency_Type", default)]
    pub constituency_type: Option<Value>,
    #[serde(rename = "Margin", default)]
    pub margin: Option<Value>,
    #[serde(rename = "Margin_Percentage", default)]
    pub margin_percentage: Option<Value>,
    #[serde(rename = "Candidate_Position", default)]
    pub candidate_position: Option<Value>,
}

impl RawCandidateRecord {
    pub fn into_record(self) -> CandidateRecord {
        CandidateRecord {
            unit: raw_numeric(self.assembly_no),
            party: raw_label(self.party),
            votes: raw_numeric(self.votes),
            valid_votes: raw_numeric(self.valid_votes),
            vote_share: raw_numeric(self.vote_share_percentage),
            electors: raw_numeric(self.electors),
            category: raw_label(self.constituency_type),
            margin: raw_numeric(self.margin),
            margin_pct: raw_numeric(self.margin_percentage),
            position: raw_numeric(self.candidate_position),
        }
    }
}

/// Map a JSON value onto the raw numeric forms the core knows how to coerce.
pub fn raw_numeric(v: Option<Value>) -> RawNumeric {
    match v {
        None | Some(Value::Null) => RawNumeric::Absent,
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                RawNumeric::Int(i)
            } else if let Some(f) = n.as_f64() {
                RawNumeric::Float(f)
            } else {
                RawNumeric::Text(n.to_string())
            }
        }
        Some(Value::String(s)) => RawNumeric::Text(s),
        Some(other) => RawNumeric::Text(other.to_string()),
    }
}

fn raw_label(v: Option<Value>) -> Option<String> {
    match v {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(_) => None,
    }
}

/// Entries dropped while reading, per input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSkips {
    pub records: usize,
    pub district_keys: usize,
    pub district_members: usize,
    pub adjacency_keys: usize,
    pub adjacency_members: usize,
}

impl LoadSkips {
    pub fn total(&self) -> usize {
        self.records + self.district_keys + self.district_members + self.adjacency_keys + self.adjacency_members
    }
}

/// SHA-256 of the canonical bytes of each input (params only when a file was given).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputDigests {
    pub records_sha256: String,
    pub districts_sha256: String,
    pub adjacency_sha256: String,
    pub params_sha256: Option<String>,
}

/// Unit→district mapping in district-id order; member lists keep file order.
pub type DistrictMap = BTreeMap<DistrictId, Vec<UnitId>>;
/// Unit→neighbors table as read (not symmetrized).
pub type AdjacencyMap = BTreeMap<UnitId, Vec<UnitId>>;

#[derive(Debug, Clone)]
pub struct InputPaths {
    pub records: PathBuf,
    pub districts: PathBuf,
    pub adjacency: PathBuf,
    pub params: Option<PathBuf>,
}

impl From<&man::ResolvedManifest> for InputPaths {
    fn from(r: &man::ResolvedManifest) -> Self {
        Self {
            records: r.records_path.clone(),
            districts: r.districts_path.clone(),
            adjacency: r.adjacency_path.clone(),
            params: r.params_path.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedInputs {
    pub records: Vec<CandidateRecord>,
    pub districts: DistrictMap,
    pub adjacency: AdjacencyMap,
    pub params: Option<SearchParams>,
    pub digests: InputDigests,
    pub skips: LoadSkips,
}

// ----------------------------- Orchestration -----------------------------

/// Load everything named by a manifest file: manifest → records → districts → adjacency (+params).
pub fn load_all_from_manifest(path: &Path, engine_version: &str) -> Result<LoadedInputs, IoError> {
    let resolved = man::load_verify_manifest(path, engine_version)?;
    load_inputs(&InputPaths::from(&resolved))
}

/// Load the inputs from explicit paths.
pub fn load_inputs(paths: &InputPaths) -> Result<LoadedInputs, IoError> {
    let mut skips = LoadSkips::default();

    let records_v = read_json_value_with_limits(&paths.records)?;
    let records_sha256 = hasher::sha256_canonical_value(&records_v)?;
    let records = records_from_value(records_v, &mut skips)?;

    let districts_v = read_json_value_with_limits(&paths.districts)?;
    let districts_sha256 = hasher::sha256_canonical_value(&districts_v)?;
    let districts = districts_from_value(&districts_v, &mut skips)?;

    let adjacency_v = read_json_value_with_limits(&paths.adjacency)?;
    let adjacency_sha256 = hasher::sha256_canonical_value(&adjacency_v)?;
    let adjacency = adjacency_from_value(&adjacency_v, &mut skips)?;

    let (params, params_sha256) = match &paths.params {
        Some(p) => {
            let v = read_json_value_with_limits(p)?;
            let digest = hasher::sha256_canonical_value(&v)?;
            (Some(params_from_value(v)?), Some(digest))
        }
        None => (None, None),
    };

    tracing::info!(
        records = records.len(),
        districts = districts.len(),
        adjacency_entries = adjacency.len(),
        skipped = skips.total(),
        "inputs loaded"
    );

    Ok(LoadedInputs {
        records,
        districts,
        adjacency,
        params,
        digests: InputDigests { records_sha256, districts_sha256, adjacency_sha256, params_sha256 },
        skips,
    })
}

// ----------------------------- Targeted loaders -----------------------------

pub fn load_records(path: &Path) -> Result<Vec<CandidateRecord>, IoError> {
    let v = read_json_value_with_limits(path)?;
    records_from_value(v, &mut LoadSkips::default())
}

pub fn load_district_map(path: &Path) -> Result<DistrictMap, IoError> {
    let v = read_json_value_with_limits(path)?;
    districts_from_value(&v, &mut LoadSkips::default())
}

pub fn load_adjacency(path: &Path) -> Result<AdjacencyMap, IoError> {
    let v = read_json_value_with_limits(path)?;
    adjacency_from_value(&v, &mut LoadSkips::default())
}

pub fn load_params(path: &Path) -> Result<SearchParams, IoError> {
    let v = read_json_value_with_limits(path)?;
    params_from_value(v)
}

// ----------------------------- Value → typed -----------------------------

fn records_from_value(v: Value, skips: &mut LoadSkips) -> Result<Vec<CandidateRecord>, IoError> {
    let Value::Array(items) = v else {
        return Err(IoError::Json { pointer: "/".into(), msg: "expected an array of candidate records".into() });
    };
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        if !item.is_object() {
            tracing::warn!(index = i, "candidate record is not an object; skipped");
            skips.records += 1;
            continue;
        }
        match serde_json::from_value::<RawCandidateRecord>(item) {
            Ok(raw) => out.push(raw.into_record()),
            Err(e) => {
                tracing::warn!(index = i, error = %e, "candidate record unreadable; skipped");
                skips.records += 1;
            }
        }
    }
    Ok(out)
}

fn id_list<T: std::str::FromStr>(v: &Value) -> Option<Vec<Option<T>>> {
    let arr = v.as_array()?;
    Some(
        arr.iter()
            .map(|m| match m {
                Value::Number(n) => n.as_u64().and_then(|x| x.to_string().parse().ok()),
                Value::String(s) => s.parse().ok(),
                _ => None,
            })
            .collect(),
    )
}

fn districts_from_value(v: &Value, skips: &mut LoadSkips) -> Result<DistrictMap, IoError> {
    let Some(obj) = v.as_object() else {
        return Err(IoError::Json { pointer: "/".into(), msg: "expected an object keyed by district id".into() });
    };
    let mut out = DistrictMap::new();
    for (key, members) in obj {
        let Ok(d) = key.parse::<DistrictId>() else {
            tracing::warn!(key = %key, "district key is not a numeric id; skipped");
            skips.district_keys += 1;
            continue;
        };
        let Some(list) = id_list::<UnitId>(members) else {
            tracing::warn!(district = %d, "district members are not an array; skipped");
            skips.district_keys += 1;
            continue;
        };
        let entry = out.entry(d).or_default();
        for (i, m) in list.into_iter().enumerate() {
            match m {
                Some(u) => entry.push(u),
                None => {
                    tracing::warn!(district = %d, index = i, "district member is not a unit id; skipped");
                    skips.district_members += 1;
                }
            }
        }
    }
    Ok(out)
}

fn adjacency_from_value(v: &Value, skips: &mut LoadSkips) -> Result<AdjacencyMap, IoError> {
    let Some(obj) = v.as_object() else {
        return Err(IoError::Json { pointer: "/".into(), msg: "expected an object keyed by unit id".into() });
    };
    let mut out = AdjacencyMap::new();
    for (key, neighbors) in obj {
        let Ok(u) = key.parse::<UnitId>() else {
            tracing::warn!(key = %key, "adjacency key is not a unit id; skipped");
            skips.adjacency_keys += 1;
            continue;
        };
        let Some(list) = id_list::<UnitId>(neighbors) else {
            tracing::warn!(unit = %u, "adjacency entry is not an array; skipped");
            skips.adjacency_keys += 1;
            continue;
        };
        let entry = out.entry(u).or_default();
        for m in list {
            match m {
                Some(n) => entry.push(n),
                None => skips.adjacency_members += 1,
            }
        }
    }
    if skips.adjacency_members > 0 {
        tracing::warn!(count = skips.adjacency_members, "non-numeric adjacency neighbors skipped");
    }
    Ok(out)
}

fn params_from_value(v: Value) -> Result<SearchParams, IoError> {
    let ps: SearchParams =
        serde_json::from_value(v).map_err(|e| IoError::Json { pointer: "/".into(), msg: e.to_string() })?;
    ps.validate().map_err(|e| IoError::Invalid(format!("parameter domain error: {e}")))?;
    Ok(ps)
}

// ----------------------------- Low-level read -----------------------------

/// Read a local JSON file fully into a `Value`, refusing files above `MAX_INPUT_BYTES`.
pub fn read_json_value_with_limits(path: &Path) -> Result<Value, IoError> {
    let f = File::open(path).map_err(|e| IoError::Path(format!("{}: {e}", path.display())))?;
    let mut buf = Vec::new();
    f.take(MAX_INPUT_BYTES + 1)
        .read_to_end(&mut buf)
        .map_err(|e| IoError::Path(format!("{}: {e}", path.display())))?;
    if buf.len() as u64 > MAX_INPUT_BYTES {
        return Err(IoError::Invalid(format!("{} exceeds {} bytes", path.display(), MAX_INPUT_BYTES)));
    }
    serde_json::from_slice(&buf).map_err(|e| IoError::Json {
        pointer: "/".into(),
        msg: format!("{}: {e}", path.display()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_numeric_covers_wire_forms() {
        assert_eq!(raw_numeric(None), RawNumeric::Absent);
        assert_eq!(raw_numeric(Some(Value::Null)), RawNumeric::Absent);
        assert_eq!(raw_numeric(Some(json!(12))), RawNumeric::Int(12));
        assert_eq!(raw_numeric(Some(json!(1.5))), RawNumeric::Float(1.5));
        assert_eq!(raw_numeric(Some(json!("1,200"))), RawNumeric::Text("1,200".into()));
        assert_eq!(raw_numeric(Some(json!(true))), RawNumeric::Text("true".into()));
    }

    #[test]
    fn records_skip_non_objects() {
        let v = json!([
            {"Assembly_No": 1, "Party": "BJP", "Votes": "500", "Candidate_Position": 1},
            42,
            {"Assembly_No": "2", "Party": null}
        ]);
        let mut skips = LoadSkips::default();
        let recs = records_from_value(v, &mut skips).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(skips.records, 1);
        assert_eq!(recs[0].party.as_deref(), Some("BJP"));
        assert_eq!(recs[0].votes, RawNumeric::Text("500".into()));
        assert_eq!(recs[1].unit, RawNumeric::Text("2".into()));
        assert_eq!(recs[1].party, None);
        assert_eq!(recs[1].votes, RawNumeric::Absent);
    }

    #[test]
    fn records_must_be_an_array() {
        assert!(matches!(records_from_value(json!({}), &mut LoadSkips::default()), Err(IoError::Json { .. })));
    }

    #[test]
    fn district_map_tolerates_bad_entries() {
        let v = json!({"2": [3, "4"], "1": [1, 2, "x"], "abc": [9], "3": "nope"});
        let mut skips = LoadSkips::default();
        let m = districts_from_value(&v, &mut skips).unwrap();
        let ids: Vec<u32> = m.keys().map(|d| d.get()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(m[&DistrictId::new(2)], vec![UnitId::new(3), UnitId::new(4)]);
        assert_eq!(skips.district_keys, 2);
        assert_eq!(skips.district_members, 1);
    }

    #[test]
    fn adjacency_keeps_asymmetry() {
        let v = json!({"1": [2, 3], "2": []});
        let m = adjacency_from_value(&v, &mut LoadSkips::default()).unwrap();
        assert_eq!(m[&UnitId::new(1)], vec![UnitId::new(2), UnitId::new(3)]);
        assert!(m[&UnitId::new(2)].is_empty());
        assert!(!m.contains_key(&UnitId::new(3)));
    }

    #[test]
    fn params_are_validated() {
        let ok = json!({"target_party": "BJP", "objective": "both_flip"});
        assert!(params_from_value(ok).is_ok());
        let bad = json!({"target_party": "BJP", "max_swaps_per_district": 0});
        assert!(matches!(params_from_value(bad), Err(IoError::Invalid(_))));
        let unknown = json!({"target_party": "BJP", "seed": 1});
        assert!(matches!(params_from_value(unknown), Err(IoError::Json { .. })));
    }
}
