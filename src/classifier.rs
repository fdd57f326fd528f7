use std::net::IpAddr;

use serde::Serialize;

use crate::{identity::NetworkIdentitySnapshot, probe::ProbeOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// Reachable and egresses from a different address than ours.
    Active,
    /// Reachable, but our own address (or none at all) shows through.
    Inactive,
    /// No strategy produced a parseable answer.
    Unreachable,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Active => "ACTIVE",
            Verdict::Inactive => "INACTIVE",
            Verdict::Unreachable => "UNREACHABLE",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Verdict::Active => "proxy relays traffic and hides the caller's address",
            Verdict::Inactive => "proxy answered but does not hide the caller's address",
            Verdict::Unreachable => "proxy could not be reached or returned no usable data",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn classify(baseline: &NetworkIdentitySnapshot, outcome: &ProbeOutcome) -> Verdict {
    match outcome {
        ProbeOutcome::NoResponse(_) => Verdict::Unreachable,
        ProbeOutcome::Responded(snapshot) => {
            match (&baseline.observed_ip, &snapshot.observed_ip) {
                (Some(ours), Some(theirs)) if !same_address(ours, theirs) => Verdict::Active,
                _ => Verdict::Inactive,
            }
        }
    }
}

fn same_address(a: &str, b: &str) -> bool {
    match (a.parse::<IpAddr>(), b.parse::<IpAddr>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.eq_ignore_ascii_case(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::StrategyError;

    fn snapshot(ip: &str) -> NetworkIdentitySnapshot {
        NetworkIdentitySnapshot::with_ip(ip)
    }

    #[test]
    fn no_response_is_unreachable() {
        for baseline in [snapshot("9.9.9.9"), NetworkIdentitySnapshot::default()] {
            assert_eq!(
                classify(&baseline, &ProbeOutcome::NoResponse(vec![])),
                Verdict::Unreachable
            );
            let errors = vec![StrategyError::new("http-direct", "refused")];
            assert_eq!(
                classify(&baseline, &ProbeOutcome::NoResponse(errors)),
                Verdict::Unreachable
            );
        }
    }

    #[test]
    fn different_egress_is_active() {
        let pairs = [("9.9.9.9", "5.5.5.5"), ("2001:db8::1", "2001:db8::2"), ("9.9.9.9", "::1")];
        for (ours, theirs) in pairs {
            assert_eq!(
                classify(&snapshot(ours), &ProbeOutcome::Responded(snapshot(theirs))),
                Verdict::Active
            );
        }
    }

    #[test]
    fn identical_snapshot_is_never_active() {
        let mut full = snapshot("9.9.9.9");
        full.country = Some("US".into());
        full.asn = Some(13335);
        for s in [full, snapshot("9.9.9.9"), NetworkIdentitySnapshot::default()] {
            assert_eq!(
                classify(&s, &ProbeOutcome::Responded(s.clone())),
                Verdict::Inactive
            );
        }
    }

    #[test]
    fn equivalent_notations_are_the_same_address() {
        let verdict = classify(
            &snapshot("2001:db8::1"),
            &ProbeOutcome::Responded(snapshot("2001:0db8:0000::0001")),
        );
        assert_eq!(verdict, Verdict::Inactive);
    }

    #[test]
    fn missing_egress_ip_is_inactive() {
        let mut probe = NetworkIdentitySnapshot::default();
        probe.country = Some("US".into());
        assert_eq!(
            classify(&snapshot("9.9.9.9"), &ProbeOutcome::Responded(probe)),
            Verdict::Inactive
        );
    }

    #[test]
    fn verdict_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&Verdict::Active).unwrap(), "\"ACTIVE\"");
        assert_eq!(Verdict::Unreachable.to_string(), "UNREACHABLE");
    }
}
