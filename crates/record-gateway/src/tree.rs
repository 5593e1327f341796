//! Tree reconstruction (spec.md §4.4): rebuilds the causal request tree for
//! one execution from the unordered record set, recursing into each
//! dependency's child execution by `DependencyContext`.
//!
//! Grounded on `backend-runtime/backend.go`'s `buildRequestTree`, extended
//! per spec.md §3 with a dense `observations` array the Go prototype
//! predates (SPEC_FULL.md's "Observations in the tree" expansion).

use record_core::{Id, Record, RecordType};
use serde::{Deserialize, Serialize};

/// One execution's reconstructed view: the inbound request/response, its
/// outbound dependencies (dense over `DependencySequence`), and its
/// observations (dense over `ObservationSequence`). A missing slot —
/// a dangling dependency-request with no response, a response that arrived
/// before the matching request was ingested, an observation sequence with a
/// gap — serializes as `null` rather than a fabricated zero-value record
/// (spec.md §7: "produce zero-valued slots rather than failing; callers
/// must tolerate partial trees").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "in")]
    pub inbound: Option<Record>,
    #[serde(rename = "dep")]
    pub dependencies: Vec<Dependency>,
    #[serde(rename = "out")]
    pub outbound: Option<Record>,
    #[serde(rename = "obs")]
    pub observations: Vec<Option<Record>>,
}

/// One outbound call from a `Request` node: the dependency-request/response
/// pair this execution recorded, plus a reference to the child execution
/// the call reached (or an empty [`Request`] if the callee was
/// uninstrumented — spec.md §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(rename = "in")]
    pub request: Option<Record>,
    #[serde(rename = "out")]
    pub response: Option<Record>,
    #[serde(rename = "ref")]
    pub reference: Request,
}

/// Find the execution context of the edge request for `rc`: the unique
/// record with `RequestContext == CauseContext == rc` (spec.md §4.4 step
/// 6). First match wins; multiple edge records sharing one RC is
/// undefined behavior, preserved as-is per spec.md §9's "Tree root search"
/// open question.
pub fn find_root_execution(records: &[Record], rc: &Id) -> Option<Id> {
    records
        .iter()
        .find(|r| r.record_type == RecordType::Request && &r.request_context == rc && &r.cause_context == rc)
        .map(|r| r.execution_context.clone())
}

/// Rebuild the tree rooted at `ec` from `records` (spec.md §4.4 steps 1-5).
/// Pure function of `(records, ec)`: two calls on the same input produce
/// structurally identical trees (spec.md §8 property 5), independent of the
/// input's ordering (property 8).
pub fn build_tree(records: &[Record], ec: &Id) -> Request {
    let mut local = Vec::new();
    let mut remote = Vec::new();
    for record in records {
        if &record.execution_context == ec {
            local.push(record);
        } else {
            remote.push(record.clone());
        }
    }

    let max_dependency_sequence = local
        .iter()
        .filter(|r| {
            matches!(
                r.record_type,
                RecordType::DependencyRequest | RecordType::DependencyResponse
            )
        })
        .map(|r| r.dependency_sequence)
        .max()
        .unwrap_or(-1);
    let max_observation_sequence = local
        .iter()
        .filter(|r| r.record_type == RecordType::Observed)
        .map(|r| r.observation_sequence)
        .max()
        .unwrap_or(-1);

    let mut tree = Request {
        inbound: None,
        dependencies: (0..=max_dependency_sequence)
            .map(|_| Dependency::default())
            .collect(),
        outbound: None,
        observations: vec![None; (max_observation_sequence + 1).max(0) as usize],
    };

    for record in &local {
        match record.record_type {
            RecordType::Request => tree.inbound = Some((*record).clone()),
            RecordType::Response => tree.outbound = Some((*record).clone()),
            RecordType::DependencyRequest => {
                tree.dependencies[record.dependency_sequence as usize].request = Some((*record).clone());
            }
            RecordType::DependencyResponse => {
                tree.dependencies[record.dependency_sequence as usize].response = Some((*record).clone());
            }
            RecordType::Observed => {
                tree.observations[record.observation_sequence as usize] = Some((*record).clone());
            }
            // spec.md §8 boundary behavior 10: ignored, not a panic.
            RecordType::Unknown => {}
        }
    }

    for dependency in &mut tree.dependencies {
        let Some(dc) = dependency
            .request
            .as_ref()
            .and_then(Record::dependency_context)
        else {
            continue;
        };
        dependency.reference = build_tree(&remote, dc);
    }

    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn base(ec: &str, rc: &str, cc: &str, rt: RecordType) -> Record {
        Record {
            request_context: Id::from(rc),
            cause_context: Id::from(cc),
            execution_context: Id::from(ec),
            dependency_context: record_core::ids::empty_id(),
            record_type: rt,
            method: "GET".to_string(),
            time: Utc::now(),
            duration_ms: 0,
            dependency_sequence: 0,
            scoped_sequence: 0,
            observation_sequence: 0,
            service_name: "A".to_string(),
            observation_name: String::new(),
            host: String::new(),
            uri: "/x".to_string(),
            header: Default::default(),
            body: vec![],
            observation_error: None,
            status_code: 0,
        }
    }

    #[test]
    fn single_execution_no_dependencies() {
        let records = vec![
            base("E1", "R", "R", RecordType::Request),
            base("E1", "R", "R", RecordType::Response),
        ];
        let tree = build_tree(&records, &Id::from("E1"));
        assert!(tree.inbound.is_some());
        assert!(tree.outbound.is_some());
        assert!(tree.dependencies.is_empty());
    }

    #[test]
    fn two_hop_tree_links_via_dependency_context() {
        // spec.md §8 S2.
        let mut a_req = base("E1", "R", "R", RecordType::Request);
        a_req.service_name = "A".to_string();
        let mut a_dep_req = base("E1", "R", "R", RecordType::DependencyRequest);
        a_dep_req.dependency_context = Id::from("E2");
        a_dep_req.uri = "http://b/x".to_string();
        let mut b_req = base("E2", "R", "E1", RecordType::Request);
        b_req.service_name = "B".to_string();
        let mut b_resp = base("E2", "R", "E1", RecordType::Response);
        b_resp.status_code = 200;
        let mut a_dep_resp = base("E1", "R", "R", RecordType::DependencyResponse);
        a_dep_resp.dependency_context = Id::from("E2");
        a_dep_resp.status_code = 200;
        let mut a_resp = base("E1", "R", "R", RecordType::Response);
        a_resp.status_code = 200;

        let records = vec![a_req, a_dep_req, b_req, b_resp, a_dep_resp, a_resp];

        let root_ec = find_root_execution(&records, &Id::from("R")).unwrap();
        assert_eq!(root_ec, Id::from("E1"));

        let tree = build_tree(&records, &root_ec);
        assert_eq!(tree.dependencies.len(), 1);
        let reference = &tree.dependencies[0].reference;
        assert_eq!(
            reference.inbound.as_ref().unwrap().execution_context,
            Id::from("E2")
        );
        assert_eq!(reference.outbound.as_ref().unwrap().status_code, 200);
    }

    #[test]
    fn uninstrumented_child_yields_empty_reference() {
        let mut dep_req = base("E1", "R", "R", RecordType::DependencyRequest);
        dep_req.dependency_context = record_core::ids::empty_id();
        let records = vec![base("E1", "R", "R", RecordType::Request), dep_req];
        let tree = build_tree(&records, &Id::from("E1"));
        assert!(tree.dependencies[0].reference.inbound.is_none());
    }

    #[test]
    fn dangling_dependency_request_has_zero_valued_out() {
        // spec.md §8 boundary behavior 11.
        let records = vec![
            base("E1", "R", "R", RecordType::Request),
            base("E1", "R", "R", RecordType::DependencyRequest),
        ];
        let tree = build_tree(&records, &Id::from("E1"));
        assert!(tree.dependencies[0].request.is_some());
        assert!(tree.dependencies[0].response.is_none());
    }

    #[test]
    fn unknown_record_type_is_ignored_not_panicking() {
        // spec.md §8 boundary behavior 10.
        let records = vec![
            base("E1", "R", "R", RecordType::Request),
            base("E1", "R", "R", RecordType::Unknown),
            base("E1", "R", "R", RecordType::Response),
        ];
        let tree = build_tree(&records, &Id::from("E1"));
        assert!(tree.inbound.is_some());
        assert!(tree.outbound.is_some());
    }

    #[test]
    fn tree_is_invariant_under_record_permutation() {
        let mut records = vec![
            base("E1", "R", "R", RecordType::Request),
            base("E1", "R", "R", RecordType::Response),
        ];
        let forward = build_tree(&records, &Id::from("E1"));
        records.reverse();
        let reversed = build_tree(&records, &Id::from("E1"));
        assert_eq!(
            serde_json::to_value(&forward).unwrap(),
            serde_json::to_value(&reversed).unwrap()
        );
    }
}
