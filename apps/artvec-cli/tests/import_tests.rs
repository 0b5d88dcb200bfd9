use std::io::Write;

use artvec_cli::{parse_objects, read_objects};

const RECORDS: &str = r#"{"id": 1, "original_id": "SK-C-5", "image_url": "https://lh3.example.org/a=s0", "long_title": "The Night Watch, Rembrandt van Rijn, 1642", "artist": "Rembrandt van Rijn"}

{"id": 2, "original_id": "SK-A-2344", "image_url": "https://lh3.example.org/b=s0", "long_title": "The Milkmaid, Johannes Vermeer, c. 1660", "artist": "Johannes Vermeer"}
"#;

#[test]
fn parses_records_and_skips_blank_lines() {
    let objects = parse_objects(RECORDS.as_bytes()).unwrap();
    assert_eq!(objects.len(), 2);
    assert_eq!(objects[1].original_id, "SK-A-2344");
    assert_eq!(objects[0].work_item().source_url, "https://lh3.example.org/a=s0");
}

#[test]
fn reports_the_offending_line() {
    let input = format!("{}\n{{\"id\": \"three\"}}\n", RECORDS.lines().next().unwrap());
    let err = parse_objects(input.as_bytes()).unwrap_err();
    assert!(format!("{err:#}").contains("line 2"), "{err:#}");
}

#[test]
fn reads_from_a_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(RECORDS.as_bytes()).unwrap();
    assert_eq!(read_objects(file.path()).unwrap().len(), 2);
}
