//! Candidate URL expansion
//!
//! The original URL always goes first. Content-addressed sources expand to
//! every configured gateway in priority order; plain URLs on a known gateway
//! host get the other gateway hosts substituted in.

use std::collections::HashSet;

use crate::constants::CID_LENGTHS;

pub fn is_http_url(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Bare identifier of plausible length (CIDv0 or CIDv1)
pub fn is_bare_cid(source: &str) -> bool {
    CID_LENGTHS.contains(&source.len()) && source.chars().all(|c| c.is_ascii_alphanumeric())
}

/// CID from an `/ipfs/<cid>` path or an `ipfs://<cid>` URI
pub fn extract_cid(source: &str) -> Option<&str> {
    let rest = match source.strip_prefix("ipfs://") {
        Some(rest) => rest,
        None => source.split_once("/ipfs/")?.1,
    };

    rest.split(|c| c == '/' || c == '?' || c == '#')
        .next()
        .filter(|cid| !cid.is_empty())
}

pub fn host_of(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    rest.split(|c| c == '/' || c == '?' || c == '#')
        .next()
        .filter(|host| !host.is_empty())
}

pub fn gateway_url(gateway: &str, cid: &str) -> String {
    format!("{}/{}", gateway.trim_end_matches('/'), cid)
}

/// Ordered, de-duplicated candidate list for one source
pub fn expand_candidates(source: &str, gateways: &[String]) -> Vec<String> {
    let mut candidates = Vec::new();

    if is_http_url(source) {
        candidates.push(source.to_string());
    }

    let cid = extract_cid(source).or_else(|| is_bare_cid(source).then_some(source));

    if let Some(cid) = cid {
        candidates.extend(gateways.iter().map(|g| gateway_url(g, cid)));
    } else if let Some(host) = host_of(source) {
        let gateway_hosts: Vec<&str> = gateways.iter().filter_map(|g| host_of(g)).collect();
        if gateway_hosts.contains(&host) {
            candidates.extend(
                gateway_hosts
                    .iter()
                    .filter(|alt| **alt != host)
                    .map(|alt| source.replacen(host, alt, 1)),
            );
        }
    }

    let mut seen = HashSet::new();
    candidates.retain(|c| seen.insert(c.clone()));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    const CID: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";

    fn gateways() -> Vec<String> {
        vec![
            "https://ipfs.io/ipfs/".to_string(),
            "https://dweb.link/ipfs/".to_string(),
            "https://gateway.pinata.cloud/ipfs".to_string(),
        ]
    }

    #[test]
    fn test_cid_detection() {
        assert_eq!(CID.len(), 46);
        assert!(is_bare_cid(CID));
        assert!(!is_bare_cid("photo.png"));
        assert!(!is_bare_cid(&format!("https://{}", &CID[..38])));
    }

    #[test]
    fn test_extract_cid() {
        assert_eq!(extract_cid(&format!("https://x.io/ipfs/{}/img.png", CID)), Some(CID));
        assert_eq!(extract_cid(&format!("https://x.io/ipfs/{}?filename=a", CID)), Some(CID));
        assert_eq!(extract_cid(&format!("ipfs://{}", CID)), Some(CID));
        assert_eq!(extract_cid("https://x.io/ipfs/"), None);
        assert_eq!(extract_cid("https://x.io/img.png"), None);
    }

    #[test]
    fn test_ipfs_url_expands_after_original() {
        let source = format!("https://gateway.pinata.cloud/ipfs/{}", CID);
        let candidates = expand_candidates(&source, &gateways());

        assert_eq!(candidates, vec![
            source.clone(),
            format!("https://ipfs.io/ipfs/{}", CID),
            format!("https://dweb.link/ipfs/{}", CID),
        ]);
    }

    #[test]
    fn test_bare_cid_uses_gateways_only() {
        let candidates = expand_candidates(CID, &gateways());
        assert_eq!(candidates.len(), 3);
        assert!(candidates.iter().all(|c| c.ends_with(CID) && is_http_url(c)));
        assert_eq!(candidates[0], format!("https://ipfs.io/ipfs/{}", CID));
    }

    #[test]
    fn test_gateway_host_substitution() {
        let source = "https://gateway.pinata.cloud/files/report-7.jpg";
        let candidates = expand_candidates(source, &gateways());

        assert_eq!(candidates, vec![
            source.to_string(),
            "https://ipfs.io/files/report-7.jpg".to_string(),
            "https://dweb.link/files/report-7.jpg".to_string(),
        ]);
    }

    #[test]
    fn test_plain_url_is_alone() {
        let source = "https://example.org/beach.jpg";
        assert_eq!(expand_candidates(source, &gateways()), vec![source.to_string()]);
    }

    #[test]
    fn test_unusable_source_has_no_candidates() {
        assert!(expand_candidates("not a url", &gateways()).is_empty());
    }
}
