use serde::{Deserialize, Serialize};

/// Cloudflare's ttl sentinel for "automatic".
pub const TTL_AUTOMATIC: u32 = 1;

/// Envelope wrapped around every v4 API response body.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub result: T,
}

/// A DNS record as returned by `GET /zones/{zone_id}/dns_records`.
///
/// Only `content` and `ttl` are ever rewritten by this service. The rest is
/// carried through untouched so an update PUT round-trips the record exactly
/// as the provider handed it out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    pub zone_id: String,
    #[serde(default)]
    pub zone_name: Option<String>,
    pub name: String, // "rebind.example.com"
    #[serde(rename = "type")]
    pub record_type: String, // "A", "AAAA", ...
    pub content: String, // "192.0.2.1"
    pub ttl: u32,        // seconds, 1 = automatic
    #[serde(default)]
    pub proxiable: bool,
    #[serde(default)]
    pub proxied: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub meta: serde_json::Value,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_on: Option<String>,
    #[serde(default)]
    pub modified_on: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_list_deserializes_from_api_envelope() {
        let body = r#"{
            "result": [{
                "id": "372e67954025e0ba6aaa6d586b9e0b59",
                "zone_id": "023e105f4ecef8ad9ca31a8372d0c353",
                "zone_name": "example.com",
                "name": "rebind.example.com",
                "type": "A",
                "content": "93.184.216.34",
                "proxiable": true,
                "proxied": false,
                "ttl": 300,
                "locked": false,
                "meta": {"auto_added": false, "source": "primary"},
                "comment": null,
                "tags": [],
                "created_on": "2024-01-01T05:20:00.12345Z",
                "modified_on": "2024-01-01T05:20:00.12345Z"
            }],
            "success": true,
            "errors": [],
            "messages": []
        }"#;

        let envelope: ApiEnvelope<Vec<DnsRecord>> = serde_json::from_str(body).unwrap();
        let record = &envelope.result[0];
        assert_eq!(record.id, "372e67954025e0ba6aaa6d586b9e0b59");
        assert_eq!(record.zone_id, "023e105f4ecef8ad9ca31a8372d0c353");
        assert_eq!(record.name, "rebind.example.com");
        assert_eq!(record.record_type, "A");
        assert_eq!(record.content, "93.184.216.34");
        assert_eq!(record.ttl, 300);
        assert!(!record.proxied);
    }

    #[test]
    fn record_serializes_with_provider_field_names() {
        let record = DnsRecord {
            id: "abc".into(),
            zone_id: "z1".into(),
            zone_name: None,
            name: "rebind.example.com".into(),
            record_type: "A".into(),
            content: "10.0.0.5".into(),
            ttl: 200,
            proxiable: false,
            proxied: false,
            locked: false,
            meta: serde_json::Value::Null,
            comment: None,
            tags: Vec::new(),
            created_on: None,
            modified_on: None,
        };

        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "A");
        assert_eq!(json["zone_id"], "z1");
        assert_eq!(json["content"], "10.0.0.5");
        assert_eq!(json["ttl"], 200);
    }
}
