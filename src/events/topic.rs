//! Topic classification of event names.
//!
//! Each topic owns a list of name patterns with a priority. The matching
//! pattern with the highest priority decides the topic; on a tie the topic
//! that sorts later wins.

use regex::Regex;
use std::sync::OnceLock;

/// Topic used when no pattern matches
pub const DEFAULT_TOPIC: &str = "Other";

/// `(topic, [(pattern, priority)])`, topics in alphabetical order
const TOPIC_PATTERNS: &[(&str, &[(&str, u8)])] = &[
    (
        "Cache",
        &[
            (r".*CACHE.*", 3),
            (r"CORE_REJECT_L2Q.*", 1),
            (r"DL1.*", 1),
            (r"L1D.*", 1),
            (r"L1D_.*", 1),
            (r"L2.*", 1),
            (r"LONGEST_LAT_CACHE.*", 1),
            (r"MEM_.+", 3),
            (r"MEM_LOAD_UOPS.*", 1),
            (r"OCR.*L3_HIT.*", 1),
            (r"OFFCORE_REQUESTS.*", 1),
            (r"OFFCORE_RESPONSE.*", 1),
            (r"REHABQ.*", 1),
            (r"SQ_MISC.*", 1),
            (r"STORE.*", 1),
            (r"SW_PREFETCH_ACCESS.*", 1),
        ],
    ),
    (
        "Floating point",
        &[
            (r".*AVX.*", 3),
            (r".*FPDIV.*", 3),
            (r".*FP_ASSIST.*", 3),
            (r".*SIMD.*", 3),
            (r"ASSISTS.FP.*", 1),
            (r"FP_.*", 3),
            (r"FP_COMP_OPS_EXE.*", 1),
            (r"SIMD.*", 1),
            (r"SIMD_FP_256.*", 1),
            (r"X87.*", 1),
        ],
    ),
    (
        "Frontend",
        &[
            (r"BACLEARS.*", 3),
            (r"CYCLES_ICACHE_MEM_STALLED.*", 3),
            (r"DECODE.*", 1),
            (r"DSB.*", 1),
            (r"FRONTEND.*", 3),
            (r"ICACHE.*", 4),
            (r"IDQ.*", 3),
            (r"MACRO_INSTS.*", 1),
            (r"MS_DECODED.*", 1),
            (r"TWO_UOP_INSTS_DECODED.*", 1),
            (r"UOPS.MS_CYCLES.*", 1),
        ],
    ),
    (
        "Memory",
        &[
            (r".*L3_MISS.*", 2),
            (r".*LLC_MISS.*", 2),
            (r".*MEMORY_ORDERING.*", 3),
            (r"HLE.*", 3),
            (r"LD_HEAD.*", 1),
            (r"MEMORY_ACTIVITY.*", 1),
            (r"MEM_TRANS_RETIRED.*", 3),
            (r"MISALIGN_MEM_REF.*", 1),
            (r"OFFCORE_RESPONSE.*DDR.*", 1),
            (r"OFFCORE_RESPONSE.*DRAM.*", 1),
            (r"OFFCORE_RESPONSE.*MCDRAM.*", 1),
            (r"PREFETCH.*", 1),
            (r"RTM.*", 3),
            (r"TX_EXEC.*", 1),
            (r"TX_MEM.*", 1),
        ],
    ),
    (
        "Pipeline",
        &[
            (r".*_DISPATCHED.*", 1),
            (r".*_ISSUED.*", 1),
            (r".*_RETIRED.*", 1),
            (r"AGU_BYPASS_CANCEL.*", 1),
            (r"ARITH.*", 1),
            (r"ASSISTS.ANY.*", 1),
            (r"BACLEAR.*", 1),
            (r"BOGUS_BR.*", 1),
            (r"BPU_.*", 1),
            (r"BR_.*", 1),
            (r"BTCLEAR.*", 1),
            (r"CPU_CLK.*", 1),
            (r"CYCLES_DIV_BUSY.*", 1),
            (r"CYCLE_ACTIVITY.*", 1),
            (r"DIV.*", 1),
            (r"EXE_ACTIVITY.*", 1),
            (r"IDQ.*", 1),
            (r"ILD.*", 1),
            (r"INST_.*", 1),
            (r"INT_MISC.*", 1),
            (r"ISSUE_SLOTS_NOT_CONSUMED.*", 1),
            (r"LD_BLOCKS.*", 1),
            (r"LOAD_HIT_PRE.*", 1),
            (r"LSD.*", 1),
            (r"MACHINE_CLEARS.*", 1),
            (r"MOVE_ELIMINATION.*", 1),
            (r"MUL.*", 1),
            (r"NO_ALLOC_CYCLES.*", 1),
            (r"OTHER_ASSISTS.*", 1),
            (r"PARTIAL_RAT_STALLS.*", 1),
            (r"RAT_STALLS.*", 1),
            (r"RECYCLEQ.*", 1),
            (r"REISSUE.*", 1),
            (r"RESOURCE_STALLS.*", 1),
            (r"ROB_MISC_EVENTS.*", 1),
            (r"RS_EVENTS.*", 1),
            (r"RS_FULL.*", 1),
            (r"SERIALIZATION.NON_C01_MS_SCB.*", 1),
            (r"STORE_FORWARD.*", 1),
            (r"TOPDOWN.*", 1),
            (r"UOPS_.*", 1),
            (r"UOP_DISPATCHES_CANCELLED.*", 1),
            (r"UOP_UNFUSION.*", 1),
        ],
    ),
    (
        "Virtual Memory",
        &[
            (r".*DTLB.*", 3),
            (r".TLB_.*", 1),
            (r"DATA_TLB.*", 1),
            (r"EPT.*", 1),
            (r"ITLB.*", 3),
            (r"PAGE_WALK.*", 1),
            (r"TLB_FLUSH.*", 1),
        ],
    ),
];

struct TopicRule {
    topic: &'static str,
    pattern: Regex,
    priority: u8,
}

fn rules() -> &'static [TopicRule] {
    static RULES: OnceLock<Vec<TopicRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        TOPIC_PATTERNS
            .iter()
            .flat_map(|(topic, patterns)| {
                patterns.iter().map(move |(pattern, priority)| TopicRule {
                    topic,
                    // Safety: every pattern in TOPIC_PATTERNS is a valid regex literal
                    pattern: Regex::new(&format!("^(?:{})", pattern)).unwrap(),
                    priority: *priority,
                })
            })
            .collect()
    })
}

/// Topic an event belongs to
///
/// # Arguments
/// * `event_name` - normalized event name
/// * `unit` - PMU unit from the descriptor; `None` or a `cpu*` unit for core events
pub fn topic(event_name: &str, unit: Option<&str>) -> String {
    if let Some(unit) = unit.filter(|u| !u.contains("cpu")) {
        let mapped = match unit {
            "iMC" => "Uncore-Memory",
            "CBO" | "HA" => "Uncore-Cache",
            "PCU" => "Uncore-Power",
            u if u.starts_with("QPI") => "Uncore-Interconnect",
            _ => "Uncore-Other",
        };
        return mapped.to_string();
    }

    let mut best: Option<(&str, u8)> = None;
    for rule in rules() {
        if !rule.pattern.is_match(event_name) {
            continue;
        }
        // Topics are visited in alphabetical order, so `>=` lets a later
        // topic take a tie.
        if best.map_or(true, |(_, p)| rule.priority >= p) {
            best = Some((rule.topic, rule.priority));
        }
    }

    best.map(|(t, _)| t).unwrap_or(DEFAULT_TOPIC).to_string()
}
