use std::io::Cursor;

use pretty_assertions::{assert_eq, assert_str_eq};
use tmod_archive::{
    error::{Error, Result},
    read::TmodArchive,
    Archive,
};
use tracing_test::traced_test;

/// Assemble an archive by hand, independent of the writer
fn build(entries: &[(&str, u32, &[u8])], declared_count: i32) -> Vec<u8> {
    fn string(out: &mut Vec<u8>, value: &str) {
        out.push(value.len() as u8);
        out.extend_from_slice(value.as_bytes());
    }

    let mut body = Vec::new();
    string(&mut body, "HandMade");
    string(&mut body, "0.3.1");
    body.extend_from_slice(&declared_count.to_le_bytes());
    for (path, length, stored) in entries {
        string(&mut body, path);
        body.extend_from_slice(&length.to_le_bytes());
        body.extend_from_slice(&(stored.len() as u32).to_le_bytes());
    }
    for (_, _, stored) in entries {
        body.extend_from_slice(stored);
    }

    let mut bytes = b"TMOD".to_vec();
    string(&mut bytes, "2023.8.3.4");
    bytes.extend((0..20).map(|i| i as u8 * 3));
    bytes.extend_from_slice(&[0x00; 256]);
    bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&body);
    bytes
}

fn sample() -> Vec<u8> {
    build(
        &[
            ("Info", 4, &[0x00, 0x00, 0x00, 0x00]),
            ("a.txt", 5, b"hello"),
            ("Content/x.bin", 32, &[0x73, 0x74, 0xC4, 0x0F, 0x00]),
            ("empty", 0, &[]),
        ],
        4,
    )
}

#[traced_test]
#[test]
fn round_trip_is_byte_identical() -> Result<()> {
    let expected = sample();

    let archive = Archive::read(Cursor::new(&expected))?;
    let actual = archive.to_bytes()?;

    assert_eq!(actual.len(), expected.len());
    assert_str_eq!(format!("{:02X?}", actual), format!("{:02X?}", expected));

    let eager = Archive::read_eager(Cursor::new(&expected))?;
    assert_eq!(eager.to_bytes()?, expected);

    Ok(())
}

#[traced_test]
#[test]
fn listing_reads_metadata_only() -> Result<()> {
    let tmod = TmodArchive::new(Cursor::new(sample()))?;

    assert_eq!(tmod.mod_loader_version(), "2023.8.3.4");
    assert_eq!(tmod.name(), "HandMade");
    assert_eq!(tmod.version(), "0.3.1");
    assert_eq!(tmod.len(), 4);
    assert_eq!(tmod.decompressed_size(), Some(41));

    let sizes = tmod
        .entries()
        .map(|e| (e.path.to_string(), e.uncompressed_size, e.stored_size))
        .collect::<Vec<_>>();
    assert_eq!(
        sizes,
        vec![
            ("Info".to_owned(), 4, 4),
            ("a.txt".to_owned(), 5, 5),
            ("Content/x.bin".to_owned(), 32, 5),
            ("empty".to_owned(), 0, 0),
        ]
    );

    Ok(())
}

#[traced_test]
#[test]
fn entry_count_beyond_table() {
    let bytes = build(&[("a.txt", 5, b"hello")], 3);

    let archive = TmodArchive::new(Cursor::new(bytes));
    assert!(matches!(archive, Err(Error::InvalidEntryTable(_))));
}

#[traced_test]
#[test]
fn negative_entry_count() {
    let bytes = build(&[], -1);

    let archive = Archive::read(Cursor::new(bytes));
    assert!(matches!(archive, Err(Error::InvalidEntryTable(_))));
}

#[traced_test]
#[test]
fn payload_cut_short() {
    let mut bytes = sample();
    bytes.truncate(bytes.len() - 3);

    let archive = Archive::read(Cursor::new(bytes));
    assert!(matches!(
        archive,
        Err(Error::TruncatedPayload { ref path, .. }) if path == "Content/x.bin"
    ));
}

#[traced_test]
#[test]
fn stale_data_length_is_only_a_warning() -> Result<()> {
    let mut bytes = sample();
    let data_length = 4 + 11 + 20 + 256;
    bytes[data_length] = bytes[data_length].wrapping_add(1);

    let archive = Archive::read(Cursor::new(&bytes))?;
    assert_eq!(archive.len(), 4);
    assert!(logs_contain("data length does not match"));

    // the writer always stores the real length
    let rewritten = archive.to_bytes()?;
    assert_eq!(rewritten, sample());

    Ok(())
}

#[traced_test]
#[test]
fn table_paths_are_written_back_unchanged() -> Result<()> {
    let expected = build(
        &[
            ("notes.txt ", 5, b"hello"),
            ("a\\b.txt", 3, b"one"),
            ("a/b.txt", 3, b"two"),
        ],
        3,
    );

    let archive = Archive::read(Cursor::new(&expected))?;
    assert_eq!(
        archive.file_names().collect::<Vec<_>>(),
        vec!["notes.txt ", "a\\b.txt", "a/b.txt"]
    );

    let actual = archive.to_bytes()?;
    assert_str_eq!(format!("{:02X?}", actual), format!("{:02X?}", expected));

    Ok(())
}
