//! Perfmon event descriptors.
//!
//! Vendor event files are JSON arrays of string maps. Values are cleaned
//! up on read and a handful of encodings are rewritten into the form perf
//! expects.

use super::topic::topic;
use crate::utils::error::EventError;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A perf JSON event: sorted string keys to string values
pub type PerfEventJson = BTreeMap<String, String>;

/// Values that mean "not set"
const DROP_VALUES: [&str; 6] = ["0", "0x0", "0x00", "na", "null", "tbd"];

/// Filters perf has no encoding for; the filter is removed
const REMOVED_FILTER_PREFIXES: [&str; 8] = [
    "cbofilter",
    "chafilter",
    "pcufilter",
    "qpimask",
    "uboxfilter",
    "fc, chnl",
    "chnl",
    "ctrctrl",
];

/// Filters that make the whole event unusable
const DROPPED_EVENT_FILTER_PREFIXES: [&str; 3] = ["ha_addrmatch", "ha_opcodematch", "irpfilter"];

/// Normalized perfmon event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerfmonEvent {
    pub event_name: String,
    pub any_thread: Option<String>,
    pub counter_mask: Option<String>,
    pub data_la: Option<String>,
    pub deprecated: Option<String>,
    pub edge_detect: Option<String>,
    pub errata: Option<String>,
    pub event_code: Option<String>,
    pub fc_mask: Option<String>,
    pub filter: Option<String>,
    pub filter_value: Option<String>,
    pub invert: Option<String>,
    pub msr_index: Option<String>,
    pub msr_value: Option<String>,
    pub pebs: Option<String>,
    pub port_mask: Option<String>,
    pub sample_after_value: Option<String>,
    pub umask: Option<String>,
    pub unit: Option<String>,
    pub brief_description: Option<String>,
    pub public_description: Option<String>,
    pub topic: String,
}

/// Cleaned value of `key`, or None when absent or a placeholder
fn get(raw: &Map<String, Value>, key: &str) -> Option<String> {
    let value = match raw.get(key)? {
        Value::String(s) => s.clone(),
        Value::Null => return None,
        other => other.to_string(),
    };
    if value.is_empty() || DROP_VALUES.contains(&value.as_str()) {
        return None;
    }

    let cleaned = value
        .trim()
        .replace('\u{ae}', "(R)")
        .replace('\u{2122}', "(TM)")
        .replace('\u{feff}', "");
    Some(cleaned)
}

/// Canonical lower-case hex, keeping the input when it does not parse
fn canonical_hex(text: &str) -> String {
    let digits = text.trim_start_matches("0x").trim_start_matches("0X");
    match u64::from_str_radix(digits, 16) {
        Ok(value) => format!("0x{:x}", value),
        Err(_) => text.to_string(),
    }
}

impl PerfmonEvent {
    /// Normalize an event name perf spells differently
    pub fn fix_name(name: &str) -> String {
        if let Some(rest) = name.strip_prefix("OFFCORE_RESPONSE_0") {
            return format!("OFFCORE_RESPONSE{}", rest);
        }
        if let Some(rest) = name.strip_prefix("OFFCORE_RESPONSE:request=") {
            if let Some((request, response)) = rest.split_once(":response=") {
                return format!("OFFCORE_RESPONSE.{}.{}", request, response);
            }
        }
        name.to_string()
    }

    /// Build from one JSON object; None when it has no event name
    pub fn from_json(raw: &Map<String, Value>) -> Option<Self> {
        let event_name = Self::fix_name(&get(raw, "EventName")?);

        let mut event = PerfmonEvent {
            event_name,
            any_thread: get(raw, "AnyThread"),
            counter_mask: get(raw, "CounterMask"),
            data_la: get(raw, "Data_LA"),
            deprecated: get(raw, "Deprecated"),
            edge_detect: get(raw, "EdgeDetect"),
            errata: get(raw, "Errata"),
            event_code: get(raw, "EventCode"),
            fc_mask: get(raw, "FCMask"),
            filter: get(raw, "Filter"),
            filter_value: get(raw, "FILTER_VALUE"),
            invert: get(raw, "Invert"),
            msr_index: get(raw, "MSRIndex"),
            msr_value: get(raw, "MSRValue"),
            pebs: get(raw, "PEBS"),
            port_mask: get(raw, "PortMask"),
            sample_after_value: get(raw, "SampleAfterValue"),
            umask: get(raw, "UMask"),
            unit: get(raw, "Unit"),
            ..Default::default()
        };

        if let Some(umask) = event.umask.take() {
            let first = umask.split(',').next().unwrap_or_default().trim().to_string();
            let combined = match get(raw, "UMaskExt") {
                Some(ext) => format!("{}{}", ext, first.get(2..).unwrap_or_default()),
                None => first,
            };
            event.umask = Some(canonical_hex(&combined));
        }

        match event.unit.as_deref() {
            Some("NCU") if event.event_name == "UNC_CLOCK.SOCKET" => {
                event.unit = Some("CLOCK".to_string());
            }
            Some("PCU") => event.umask = None,
            _ => {}
        }

        let fixed_counter = raw
            .get("Counter")
            .and_then(Value::as_str)
            .map_or(false, |c| c.eq_ignore_ascii_case("fixed"));
        if fixed_counter {
            event.event_code = Some("0xff".to_string());
            event.umask = None;
        }

        if let Some(filter) = event.filter.take() {
            let lower = filter.to_lowercase();
            if REMOVED_FILTER_PREFIXES.iter().any(|p| lower.starts_with(p)) {
                event.filter = None;
            } else if filter == "Filter1" {
                event.filter = Some(format!(
                    "config1={}",
                    event.filter_value.as_deref().unwrap_or_default()
                ));
            } else {
                event.filter = Some(filter);
            }
        }

        event.brief_description = get(raw, "BriefDescription").or_else(|| get(raw, "Description"));
        if event.brief_description.is_none()
            && event.event_name == "OFFCORE_RESPONSE.COREWB.ANY_RESPONSE"
        {
            event.brief_description = Some("COREWB & ANY_RESPONSE".to_string());
        }
        event.public_description = get(raw, "PublicDescription").or_else(|| get(raw, "Description"));
        if let (Some(public), Some(brief)) = (&event.public_description, &event.brief_description) {
            if brief.contains(public.as_str()) {
                event.public_description = None;
            }
        }

        event.topic = topic(&event.event_name, event.unit.as_deref());
        Some(event)
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated.as_deref() == Some("1")
    }

    /// Perf JSON form, or None when the event uses an unsupported filter
    pub fn to_perf_json(&self) -> Option<PerfEventJson> {
        if let Some(filter) = &self.filter {
            let lower = filter.to_lowercase();
            if DROPPED_EVENT_FILTER_PREFIXES.iter().any(|p| lower.starts_with(p)) {
                return None;
            }
        }

        let mut json = PerfEventJson::new();
        json.insert("EventName".to_string(), self.event_name.clone());

        let fields = [
            ("AnyThread", &self.any_thread),
            ("BriefDescription", &self.brief_description),
            ("CounterMask", &self.counter_mask),
            ("Data_LA", &self.data_la),
            ("Deprecated", &self.deprecated),
            ("EdgeDetect", &self.edge_detect),
            ("Errata", &self.errata),
            ("EventCode", &self.event_code),
            ("FCMask", &self.fc_mask),
            ("Filter", &self.filter),
            ("Invert", &self.invert),
            ("MSRIndex", &self.msr_index),
            ("MSRValue", &self.msr_value),
            ("PEBS", &self.pebs),
            ("PortMask", &self.port_mask),
            ("PublicDescription", &self.public_description),
            ("SampleAfterValue", &self.sample_after_value),
            ("UMask", &self.umask),
            ("Unit", &self.unit),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                json.insert(key.to_string(), value.clone());
            }
        }

        Some(json)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EventFile {
    Bare(Vec<Map<String, Value>>),
    Wrapped {
        #[serde(rename = "Events")]
        events: Vec<Map<String, Value>>,
    },
}

/// Parse a perfmon event file, either a bare array or `{"Events": [...]}`
///
/// # Errors
/// * `EventError::JsonError` - the text is not one of the two layouts
pub fn parse_event_file(text: &str) -> Result<Vec<PerfmonEvent>, EventError> {
    let file: EventFile = serde_json::from_str(text.trim_start_matches('\u{feff}'))?;
    let raw = match file {
        EventFile::Bare(events) => events,
        EventFile::Wrapped { events } => events,
    };
    Ok(raw.iter().filter_map(PerfmonEvent::from_json).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: Value) -> PerfmonEvent {
        match value {
            Value::Object(map) => PerfmonEvent::from_json(&map).unwrap(),
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_placeholders_dropped_and_symbols_replaced() {
        let e = event(json!({
            "EventName": "INST_RETIRED.ANY",
            "CounterMask": "0",
            "Errata": "null",
            "BriefDescription": "Instructions retired\u{ae} by Intel\u{2122}",
            "EventCode": "0x00",
        }));
        assert_eq!(e.counter_mask, None);
        assert_eq!(e.errata, None);
        assert_eq!(e.event_code, None);
        assert_eq!(
            e.brief_description.as_deref(),
            Some("Instructions retired(R) by Intel(TM)")
        );
    }

    #[test]
    fn test_fix_name() {
        assert_eq!(
            PerfmonEvent::fix_name("OFFCORE_RESPONSE_0.DEMAND_DATA_RD"),
            "OFFCORE_RESPONSE.DEMAND_DATA_RD"
        );
        assert_eq!(
            PerfmonEvent::fix_name("OFFCORE_RESPONSE:request=DEMAND_RFO:response=LLC_MISS.LOCAL_DRAM"),
            "OFFCORE_RESPONSE.DEMAND_RFO.LLC_MISS.LOCAL_DRAM"
        );
    }

    #[test]
    fn test_umask_normalization() {
        let e = event(json!({"EventName": "A", "UMask": "0x01,0x02"}));
        assert_eq!(e.umask.as_deref(), Some("0x1"));

        let e = event(json!({"EventName": "B", "UMask": "0x02", "UMaskExt": "0x10"}));
        assert_eq!(e.umask.as_deref(), Some("0x1002"));
    }

    #[test]
    fn test_fixed_counter() {
        let e = event(json!({"EventName": "INST_RETIRED.ANY", "Counter": "Fixed counter 0", "EventCode": "0x00", "UMask": "0x01"}));
        // Only an exact "fixed" counter is rewritten.
        assert_eq!(e.umask.as_deref(), Some("0x1"));

        let e = event(json!({"EventName": "INST_RETIRED.ANY", "Counter": "Fixed", "UMask": "0x01"}));
        assert_eq!(e.event_code.as_deref(), Some("0xff"));
        assert_eq!(e.umask, None);
    }

    #[test]
    fn test_unit_fixups() {
        let e = event(json!({"EventName": "UNC_CLOCK.SOCKET", "Unit": "NCU"}));
        assert_eq!(e.unit.as_deref(), Some("CLOCK"));

        let e = event(json!({"EventName": "UNC_P_POWER_STATE_OCCUPANCY.CORES_C0", "Unit": "PCU", "UMask": "0x40"}));
        assert_eq!(e.umask, None);
        assert_eq!(e.topic, "Uncore-Power");
    }

    #[test]
    fn test_filters() {
        let e = event(json!({"EventName": "UNC_C_LLC_LOOKUP.ANY", "Unit": "CBO", "Filter": "CboFilter0[23:17]"}));
        assert_eq!(e.filter, None);

        let e = event(json!({"EventName": "UNC_CHA_TOR_INSERTS.IA", "Filter": "Filter1", "FILTER_VALUE": "0x3b"}));
        assert_eq!(e.filter.as_deref(), Some("config1=0x3b"));

        let e = event(json!({"EventName": "UNC_H_ADDR", "Filter": "HA_AddrMatch0[31:6]"}));
        assert!(e.to_perf_json().is_none());
    }

    #[test]
    fn test_descriptions() {
        let e = event(json!({"EventName": "A", "Description": "Counts things."}));
        assert_eq!(e.brief_description.as_deref(), Some("Counts things."));
        assert_eq!(e.public_description, None);

        let e = event(json!({"EventName": "B", "BriefDescription": "Short", "PublicDescription": "Much longer text"}));
        assert_eq!(e.public_description.as_deref(), Some("Much longer text"));
    }

    #[test]
    fn test_perf_json_sorted_and_sparse() {
        let e = event(json!({"EventName": "INST_RETIRED.ANY", "EventCode": "0xc0", "SampleAfterValue": "2000003", "BriefDescription": "Instructions"}));
        let json = e.to_perf_json().unwrap();
        let keys: Vec<&str> = json.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["BriefDescription", "EventCode", "EventName", "SampleAfterValue"]);
    }

    #[test]
    fn test_parse_both_layouts() {
        let bare = r#"[{"EventName": "A"}, {"BriefDescription": "nameless"}]"#;
        assert_eq!(parse_event_file(bare).unwrap().len(), 1);

        let wrapped = r#"{"Header": {"Copyright": "x"}, "Events": [{"EventName": "A"}, {"EventName": "B"}]}"#;
        assert_eq!(parse_event_file(wrapped).unwrap().len(), 2);
    }
}
