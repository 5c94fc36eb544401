use perfmon_metrics::events::{apply_uncore_csv, topic, ArchEvents};
use perfmon_metrics::output::write_events;
use pretty_assertions::assert_eq;
use std::fs;

const ATOM: &str = r#"[
    {"EventName": "BR_MISP_RETIRED.ALL_BRANCHES", "EventCode": "0xc5", "UMask": "0x00", "BriefDescription": "Mispredicted branches."},
    {"EventName": "MEM_UOPS_RETIRED.ALL_LOADS", "EventCode": "0xd0", "UMask": "0x81", "BriefDescription": "Loads retired."}
]"#;

const CORE: &str = r#"{"Events": [
    {"EventName": "BR_MISP_RETIRED.ALL_BRANCHES", "EventCode": "0xc5", "BriefDescription": "Mispredicted branches."},
    {"EventName": "DTLB_LOAD_MISSES.WALK_COMPLETED", "EventCode": "0x12", "UMask": "0x0e", "BriefDescription": "Page walks."}
]}"#;

const UNCORE: &str = r#"[
    {"EventName": "UNC_M_CAS_COUNT.RD", "Unit": "iMC", "EventCode": "0x4", "UMask": "0x3", "BriefDescription": "Reads."},
    {"EventName": "UNC_CHA_TOR_INSERTS.IA_MISS", "Unit": "CHA", "EventCode": "0x35", "UMask": "0x21"}
]"#;

#[test]
fn test_hybrid_model_events_written_by_topic() {
    let mut events = ArchEvents::new();
    events.add_file("atom", "atom.json", ATOM, true).unwrap();
    events.add_file("core", "core.json", CORE, true).unwrap();
    events.add_file("uncore", "uncore.json", UNCORE, true).unwrap();
    assert_eq!(events.record_count(), 6);

    let dir = tempfile::tempdir().unwrap();
    let files = write_events(dir.path(), &events.topics).unwrap();
    assert_eq!(files, events.topics.len());

    let pipeline = fs::read_to_string(dir.path().join("pipeline.json")).unwrap();
    assert!(pipeline.contains("\"Unit\": \"cpu_atom\""));
    assert!(pipeline.contains("\"Unit\": \"cpu_core\""));

    let memory = fs::read_to_string(dir.path().join("uncore-memory.json")).unwrap();
    assert!(memory.contains("\"PerPkg\": \"1\""));
    assert!(memory.contains("\"Unit\": \"iMC\""));

    assert!(dir.path().join("virtual-memory.json").is_file());
}

#[test]
fn test_uncore_csv_adds_derived_event() {
    let mut events = ArchEvents::new();
    events.add_file("uncore", "uncore.json", UNCORE, false).unwrap();

    let csv = "\
name,newname,desc,filter,scale,formula,comment
UNC_M_CAS_COUNT.RD,LLC_MISSES.MEM_READ,read requests to memory,,64,,
UNC_CHA_TOR_INSERTS.IA_MISS,,TOR inserts for misses,:u0x21:opc=0x202,,,
";
    assert_eq!(apply_uncore_csv(&mut events, csv).unwrap(), 2);
    assert_eq!(events.topics["Uncore-Memory"].len(), 2);

    let derived = events.json_mut("LLC_MISSES.MEM_READ").unwrap();
    assert_eq!(derived["ScaleUnit"], "64Bytes");
    assert_eq!(derived["PerPkg"], "1");

    let tor = events.json_mut("UNC_CHA_TOR_INSERTS.IA_MISS").unwrap();
    assert_eq!(tor["Filter"], "filter_opc=0x202");
    assert_eq!(tor["BriefDescription"], "TOR inserts for misses");
}

#[test]
fn test_topic_is_pure() {
    assert_eq!(topic("DTLB_LOAD_MISSES.WALK_COMPLETED", None), "Virtual Memory");
    assert_eq!(
        topic("DTLB_LOAD_MISSES.WALK_COMPLETED", None),
        topic("DTLB_LOAD_MISSES.WALK_COMPLETED", Some("cpu"))
    );
    assert_eq!(topic("UNC_M_CAS_COUNT.RD", Some("iMC")), "Uncore-Memory");
}
