//! Normalises upstream identity payloads and assembles verification results.
//!
//! Echo services disagree on field names (`clientIp` vs `origin`, `asOrganization`
//! vs `org`, ...). [`FIELD_TABLE`] maps every canonical field to the upstream keys
//! accepted for it; the first key holding a usable value wins.

use std::{net::IpAddr, time::Duration};

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use crate::{
    classifier::Verdict,
    error::CheckError,
    identity::NetworkIdentitySnapshot,
    probe::ProbeOutcome,
    proxy::{ProxyCandidate, VerificationResult},
};

lazy_static! {
    static ref ASN_RE: Regex = Regex::new(r"\d+").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    ObservedIp,
    Asn,
    Organization,
    Country,
    City,
    RegionCode,
    Timezone,
    Latitude,
    Longitude,
    Colo,
    TlsVersion,
    ClientTcpRtt,
}

const FIELD_TABLE: &[(Field, &[&str])] = &[
    (Field::ObservedIp, &["clientIp", "observedIp", "ip", "query", "origin"]),
    (Field::Asn, &["asn", "as"]),
    (Field::Organization, &["asOrganization", "organization", "org", "isp"]),
    (Field::Country, &["country", "countryCode", "country_code"]),
    (Field::City, &["city"]),
    (Field::RegionCode, &["regionCode", "region_code", "region"]),
    (Field::Timezone, &["timezone", "time_zone"]),
    (Field::Latitude, &["latitude", "lat"]),
    (Field::Longitude, &["longitude", "lon", "lng"]),
    (Field::Colo, &["colo"]),
    (Field::TlsVersion, &["tlsVersion", "tls_version"]),
    (Field::ClientTcpRtt, &["clientTcpRtt"]),
];

/// Parses an echo service body. Accepts a JSON object or a bare IP address.
pub fn parse_snapshot(body: &[u8]) -> Result<NetworkIdentitySnapshot, CheckError> {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();

    if let Ok(ip) = text.parse::<IpAddr>() {
        return Ok(NetworkIdentitySnapshot::with_ip(&ip.to_string()));
    }

    let value: Value = serde_json::from_str(text)
        .map_err(|err| CheckError::MalformedResponse(format!("body is not JSON: {}", err)))?;
    match value {
        Value::Object(object) => Ok(snapshot_from_object(&object)),
        _ => Err(CheckError::MalformedResponse(
            "body is not a JSON object".to_string(),
        )),
    }
}

fn snapshot_from_object(object: &Map<String, Value>) -> NetworkIdentitySnapshot {
    let mut snapshot = NetworkIdentitySnapshot::default();
    for (field, keys) in FIELD_TABLE {
        // first alias whose value converts wins; unusable values fall through to the next
        let mut values = keys.iter().filter_map(|key| object.get(*key).and_then(scalar));
        match field {
            // httpbin reports "client, proxy1, proxy2"
            Field::ObservedIp => {
                snapshot.observed_ip = values.find_map(|value| {
                    value
                        .split(',')
                        .map(str::trim)
                        .find(|part| !part.is_empty())
                        .map(String::from)
                })
            }
            Field::Asn => snapshot.asn = values.find_map(|value| parse_asn(&value)),
            Field::Organization => snapshot.organization = values.next(),
            Field::Country => snapshot.country = values.next(),
            Field::City => snapshot.city = values.next(),
            Field::RegionCode => snapshot.region_code = values.next(),
            Field::Timezone => snapshot.timezone = values.next(),
            Field::Latitude => snapshot.latitude = values.next(),
            Field::Longitude => snapshot.longitude = values.next(),
            Field::Colo => snapshot.colo = values.next(),
            Field::TlsVersion => snapshot.tls_version = values.next(),
            Field::ClientTcpRtt => snapshot.client_tcp_rtt = values.next(),
        }
    }
    snapshot
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_asn(value: &str) -> Option<u32> {
    ASN_RE.find(value)?.as_str().parse().ok()
}

/// Assembles the immutable record for one classified candidate.
pub fn project(
    input: String,
    candidate: ProxyCandidate,
    baseline: NetworkIdentitySnapshot,
    outcome: ProbeOutcome,
    verdict: Verdict,
    elapsed: Duration,
) -> VerificationResult {
    let (probe_identity, errors) = match outcome {
        ProbeOutcome::Responded(snapshot) => (Some(snapshot), None),
        ProbeOutcome::NoResponse(errors) => {
            (None, Some(errors.iter().map(ToString::to_string).collect()))
        }
    };
    VerificationResult {
        input,
        candidate: Some(candidate),
        verdict: Some(verdict),
        baseline_identity: Some(baseline),
        probe_identity,
        elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::StrategyError;

    #[test]
    fn cloudflare_shape() {
        let body = br#"{
            "clientIp": "5.5.5.5", "asn": 13335, "asOrganization": "Cloudflare, Inc.",
            "country": "US", "city": "San Jose", "regionCode": "CA",
            "timezone": "America/Los_Angeles", "latitude": "37.33939", "longitude": "-121.89496",
            "colo": "SJC", "tlsVersion": "TLSv1.3", "clientTcpRtt": 12
        }"#;
        let snapshot = parse_snapshot(body).unwrap();
        assert_eq!(snapshot.observed_ip.as_deref(), Some("5.5.5.5"));
        assert_eq!(snapshot.asn, Some(13335));
        assert_eq!(snapshot.organization.as_deref(), Some("Cloudflare, Inc."));
        assert_eq!(snapshot.region_code.as_deref(), Some("CA"));
        assert_eq!(snapshot.colo.as_deref(), Some("SJC"));
        assert_eq!(snapshot.client_tcp_rtt.as_deref(), Some("12"));
    }

    #[test]
    fn ip_api_shape() {
        let body = br#"{"query": "8.8.8.8", "as": "AS15169 Google LLC", "org": "Google Public DNS",
            "countryCode": "US", "region": "VA", "lat": 39.03, "lon": -77.5}"#;
        let snapshot = parse_snapshot(body).unwrap();
        assert_eq!(snapshot.observed_ip.as_deref(), Some("8.8.8.8"));
        assert_eq!(snapshot.asn, Some(15169));
        assert_eq!(snapshot.organization.as_deref(), Some("Google Public DNS"));
        assert_eq!(snapshot.country.as_deref(), Some("US"));
        assert_eq!(snapshot.latitude.as_deref(), Some("39.03"));
        assert_eq!(snapshot.longitude.as_deref(), Some("-77.5"));
        assert!(snapshot.city.is_none());
    }

    #[test]
    fn preferred_key_wins_over_alias() {
        let snapshot =
            parse_snapshot(br#"{"ip": "1.1.1.1", "clientIp": "2.2.2.2", "org": "x"}"#).unwrap();
        assert_eq!(snapshot.observed_ip.as_deref(), Some("2.2.2.2"));
    }

    #[test]
    fn unusable_asn_falls_through_to_alias() {
        let snapshot =
            parse_snapshot(br#"{"clientIp": "8.8.8.8", "asn": "unknown", "as": "AS15169 Google LLC"}"#)
                .unwrap();
        assert_eq!(snapshot.asn, Some(15169));
    }

    #[test]
    fn httpbin_origin_chain_takes_first_hop() {
        let snapshot = parse_snapshot(br#"{"origin": "5.5.5.5, 10.0.0.1"}"#).unwrap();
        assert_eq!(snapshot.observed_ip.as_deref(), Some("5.5.5.5"));
    }

    #[test]
    fn plain_text_ip_is_a_snapshot() {
        let snapshot = parse_snapshot(b"  203.0.113.7\n").unwrap();
        assert_eq!(snapshot, NetworkIdentitySnapshot::with_ip("203.0.113.7"));
    }

    #[test]
    fn empty_values_stay_unknown() {
        let snapshot = parse_snapshot(br#"{"clientIp": "", "country": null, "city": "  "}"#).unwrap();
        assert_eq!(snapshot, NetworkIdentitySnapshot::default());
    }

    #[test]
    fn garbled_bodies_are_malformed() {
        let bodies: [&[u8]; 4] = [b"<html>blocked</html>", b"[1, 2]", b"", b"\"5.5.5.5\""];
        for body in bodies {
            assert!(matches!(
                parse_snapshot(body),
                Err(CheckError::MalformedResponse(_))
            ));
        }
    }

    #[test]
    fn project_no_response_carries_errors() {
        let candidate = ProxyCandidate::new("1.2.3.4", "80").unwrap();
        let outcome = ProbeOutcome::NoResponse(vec![
            StrategyError::new("http-direct", "connection refused"),
            StrategyError::new("https-direct", "timed out"),
        ]);
        let result = project(
            "1.2.3.4:80".into(),
            candidate,
            NetworkIdentitySnapshot::with_ip("9.9.9.9"),
            outcome,
            Verdict::Unreachable,
            Duration::from_millis(1234),
        );
        assert_eq!(result.elapsed_ms, 1234);
        assert!(result.probe_identity.is_none());
        assert_eq!(
            result.errors.unwrap(),
            vec![
                "http-direct: connection refused".to_string(),
                "https-direct: timed out".to_string()
            ]
        );
    }
}
