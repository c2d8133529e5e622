use constdb::Config;

#[test_log::test]
fn file_roundtrip_simple() -> constdb::Result<()> {
    let folder = constdb::get_tmp_folder();
    let path = folder.path().join("simple.cdb");

    let config = Config::new();

    let mut writer = config.create(&path)?;
    writer.put("foo", "bar")?;
    writer.put("baz", "qux")?;
    writer.close()?;

    let mut reader = config.open(&path)?;
    assert_eq!(2, reader.len());
    assert_eq!(Some(b"bar".to_vec()), reader.get("foo")?);
    assert_eq!(Some(b"qux".to_vec()), reader.get("baz")?);
    assert_eq!(None, reader.get("missing")?);
    assert!(reader.contains_key("foo")?);
    assert!(!reader.contains_key("bar")?);
    reader.close()?;

    Ok(())
}

#[test_log::test]
fn file_roundtrip_layout() -> constdb::Result<()> {
    let folder = constdb::get_tmp_folder();
    let path = folder.path().join("layout.cdb");

    let config = Config::new();

    let mut writer = config.create(&path)?;
    writer.put("foo", "bar")?;
    writer.close()?;

    // header + record (8 + 3 + 3) + 2 slots
    let bytes = std::fs::read(&path)?;
    assert_eq!(2_048 + 14 + 16, bytes.len());

    let reader = config.open(&path)?;
    let header = reader.header();

    // DJB("foo") = 0x0B8737A3
    let bucket = header[0xA3];
    assert_eq!(2_048 + 14, bucket.position);
    assert_eq!(2, bucket.slot_count);

    assert_eq!(2_048 + 14, header.data_region_end());
    assert_eq!(
        1,
        header.iter().filter(|entry| !entry.is_empty()).count(),
    );

    Ok(())
}

#[test_log::test]
fn file_roundtrip_empty() -> constdb::Result<()> {
    let folder = constdb::get_tmp_folder();
    let path = folder.path().join("empty.cdb");

    let config = Config::new();

    let mut writer = config.create(&path)?;
    writer.close()?;

    assert_eq!(2_048, std::fs::metadata(&path)?.len());

    let mut reader = config.open(&path)?;
    assert!(reader.is_empty());
    assert_eq!(None, reader.get("")?);
    assert_eq!(None, reader.get("a")?);
    assert_eq!(0, reader.iter().count());

    Ok(())
}

#[test_log::test]
fn file_roundtrip_truncated_file() -> constdb::Result<()> {
    let folder = constdb::get_tmp_folder();
    let path = folder.path().join("short.cdb");

    std::fs::write(&path, [0; 100])?;

    assert!(matches!(
        Config::new().open(&path),
        Err(constdb::Error::InvalidHeader(_)),
    ));

    Ok(())
}

#[test_log::test]
fn file_roundtrip_missing_file() {
    let folder = constdb::get_tmp_folder();
    let path = folder.path().join("nope.cdb");

    assert!(matches!(
        Config::new().open(&path),
        Err(constdb::Error::Io(_)),
    ));
}

#[test_log::test]
fn file_roundtrip_binary() -> constdb::Result<()> {
    let folder = constdb::get_tmp_folder();
    let path = folder.path().join("binary.cdb");

    let items: Vec<(Vec<u8>, Vec<u8>)> = vec![
        (vec![0], vec![0, 0, 0]),
        (vec![0, 0], vec![]),
        (vec![0xD8, 0x3D, 0xDE, 0x00], vec![0xED, 0xA0, 0x80, 0xED, 0xB0, 0x80]),
        (vec![0xFF; 300], (0..=255).collect()),
        (vec![], vec![1, 2, 3]),
    ];

    let config = Config::new().block_size(64);

    let mut writer = config.create(&path)?;
    for (key, value) in &items {
        writer.put(key, value)?;
    }
    writer.close()?;

    let mut reader = config.open(&path)?;
    for (key, value) in &items {
        assert_eq!(Some(value.clone()), reader.get(key)?);
    }

    let scanned = reader.iter().collect::<constdb::Result<Vec<_>>>()?;
    assert_eq!(items, scanned);

    Ok(())
}

#[test_log::test]
fn file_roundtrip_overwrite() -> constdb::Result<()> {
    let folder = constdb::get_tmp_folder();
    let path = folder.path().join("overwrite.cdb");

    let config = Config::new();

    let mut writer = config.create(&path)?;
    for idx in 0..100u32 {
        writer.put(idx.to_be_bytes(), "old")?;
    }
    writer.close()?;

    let mut writer = config.create(&path)?;
    writer.put("a", "new")?;
    writer.close()?;

    let mut reader = config.open(&path)?;
    assert_eq!(1, reader.len());
    assert_eq!(Some(b"new".to_vec()), reader.get("a")?);
    assert_eq!(None, reader.get(0u32.to_be_bytes())?);

    Ok(())
}
