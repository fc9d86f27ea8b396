use std::io::{Cursor, Read, Write};

use pretty_assertions::assert_eq;
use tmod_archive::{
    error::Result,
    read::TmodArchive,
    write::{TmodWriter, TmodWriterOptions},
    Archive, CompressionMethod, CompressionPolicy,
};
use tracing::info;
use tracing_test::traced_test;

fn options() -> TmodWriterOptions {
    TmodWriterOptions::builder()
        .mod_loader_version("2022.9.47.0")
        .name("ExampleMod")
        .version("1.0")
        .build()
}

#[traced_test]
#[test]
fn single_small_entry() -> Result<()> {
    let mut archive = Archive::new("2022.9.47.0", "ExampleMod", "1.0");
    archive.insert("a.txt", b"hello".to_vec(), &CompressionPolicy::default())?;
    let bytes = archive.to_bytes()?;

    let mut tmod = TmodArchive::new(Cursor::new(bytes))?;
    assert_eq!(tmod.len(), 1);

    let metadata = tmod.metadata(0)?.clone();
    assert_eq!(&*metadata.path, "a.txt");
    assert_eq!(metadata.uncompressed_size, 5);
    assert_eq!(metadata.stored_size, 5);
    assert!(!metadata.is_compressed());

    assert_eq!(tmod.read_entry(0)?, b"hello");

    Ok(())
}

#[traced_test]
#[test]
fn repetitive_entry_is_compressed() -> Result<()> {
    let raw = vec![b'A'; 10_000];

    let mut writer = TmodWriter::new(Vec::new(), options());
    writer.start_file("big.txt")?;
    writer.write_all(&raw)?;
    let bytes = writer.finish()?;

    let mut tmod = TmodArchive::new(Cursor::new(bytes))?;
    let metadata = tmod.metadata(0)?.clone();
    info!("stored {} of {} bytes", metadata.stored_size, metadata.uncompressed_size);
    assert!(metadata.stored_size < metadata.uncompressed_size);
    assert_eq!(metadata.compression_method(), CompressionMethod::Deflate);

    let decompressed = tmod.read_entry(0)?;
    assert_eq!(decompressed.len(), 10_000);
    assert_eq!(decompressed, raw);

    let mut streamed = Vec::new();
    tmod.by_name("big.txt")?.read_to_end(&mut streamed)?;
    assert_eq!(streamed, raw);

    Ok(())
}

#[traced_test]
#[test]
fn stored_never_exceeds_uncompressed() -> Result<()> {
    let noise: Vec<u8> = (0u32..4096)
        .map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8)
        .collect();

    let mut writer = TmodWriter::new(Vec::new(), options());
    writer.add_file("empty.bin", Vec::new())?;
    writer.add_file("noise.bin", noise.clone())?;
    writer.add_file("text.txt", "lorem ipsum ".repeat(200))?;
    let bytes = writer.finish()?;

    let mut tmod = TmodArchive::new(Cursor::new(bytes))?;
    for entry in tmod.entries() {
        assert!(entry.stored_size <= entry.uncompressed_size);
        assert_eq!(
            entry.is_compressed(),
            entry.stored_size < entry.uncompressed_size
        );
    }

    assert_eq!(tmod.read_entry(0)?, Vec::<u8>::new());
    assert_eq!(tmod.read_entry(1)?, noise);
    assert!(tmod.metadata(2)?.is_compressed());

    Ok(())
}

#[traced_test]
#[test]
fn table_order_is_insertion_order() -> Result<()> {
    let mut writer = TmodWriter::new(Vec::new(), options());
    for name in ["z.txt", "a.txt", "Content/m.txt"] {
        writer.add_file(name, name.as_bytes().to_vec())?;
    }
    let bytes = writer.finish()?;

    let tmod = TmodArchive::new(Cursor::new(bytes))?;
    assert_eq!(
        tmod.file_names().collect::<Vec<_>>(),
        vec!["z.txt", "a.txt", "Content/m.txt"]
    );
    assert_eq!(tmod.index_for_name("Content/m.txt"), Some(2));
    assert_eq!(tmod.name_for_index(1), Some("a.txt"));

    Ok(())
}

#[traced_test]
#[test]
fn written_hash_verifies() -> Result<()> {
    let mut writer = TmodWriter::new(Vec::new(), options());
    writer.add_file("a.txt", b"hello".to_vec())?;
    let mut bytes = writer.finish()?;

    let mut tmod = TmodArchive::new(Cursor::new(bytes.clone()))?;
    assert!(tmod.verify_hash()?);

    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    let mut tmod = TmodArchive::new(Cursor::new(bytes))?;
    assert!(!tmod.verify_hash()?);
    assert!(logs_contain("stored hash does not match"));

    Ok(())
}
