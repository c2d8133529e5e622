use constdb::{Config, CustomSource, Error};
use std::sync::{
    atomic::{AtomicBool, Ordering::Relaxed},
    Arc,
};

#[test_log::test]
fn custom_source_lifecycle() -> constdb::Result<()> {
    let config = Config::new();

    let mut writer = config.create_in_memory()?;
    writer.put("foo", "bar")?;
    writer.close()?;

    let bytes: Arc<[u8]> = writer.into_sink().into_inner().into();

    let opened = Arc::new(AtomicBool::new(false));
    let closed = Arc::new(AtomicBool::new(false));

    let source = CustomSource::builder()
        .read({
            let opened = opened.clone();
            move |start, len| {
                assert!(opened.load(Relaxed), "read before open");

                let start = usize::try_from(start).unwrap_or(usize::MAX).min(bytes.len());
                let end = start.saturating_add(len).min(bytes.len());
                Ok(bytes.get(start..end).unwrap_or_default().to_vec())
            }
        })
        .open({
            let opened = opened.clone();
            move || {
                opened.store(true, Relaxed);
                Ok(())
            }
        })
        .close({
            let closed = closed.clone();
            move || {
                closed.store(true, Relaxed);
                Ok(())
            }
        })
        .build()?;

    let mut reader = config.open_source(source)?;
    assert!(opened.load(Relaxed));

    assert_eq!(Some(b"bar".to_vec()), reader.get("foo")?);
    assert!(!closed.load(Relaxed));

    reader.close()?;
    assert!(closed.load(Relaxed));

    Ok(())
}

#[test_log::test]
fn custom_source_open_fails() -> constdb::Result<()> {
    let source = CustomSource::builder()
        .read(|_, _| Ok(vec![]))
        .open(|| {
            Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "nope",
            ))
        })
        .build()?;

    let Err(Error::Io(e)) = Config::new().open_source(source) else {
        panic!("expected I/O error");
    };
    assert_eq!(std::io::ErrorKind::PermissionDenied, e.kind());

    Ok(())
}

#[test_log::test]
fn custom_source_read_fails() -> constdb::Result<()> {
    let config = Config::new().use_cache(false);

    let mut writer = config.create_in_memory()?;
    writer.put("foo", "bar")?;
    writer.close()?;
    let bytes = writer.into_sink().into_inner();
    let header_size = bytes.len() - 14 - 16;

    let source = CustomSource::builder()
        .read(move |start, len| {
            if start as usize >= header_size {
                return Err(std::io::Error::other("disk on fire"));
            }
            Ok(bytes[start as usize..start as usize + len].to_vec())
        })
        .build()?;

    let mut reader = config.open_source(source)?;

    // Empty buckets are answered from the header
    assert_eq!(None, reader.get("")?);

    assert!(matches!(reader.get("foo"), Err(Error::Io(_))));
    assert!(matches!(reader.get("foo"), Err(Error::Io(_))));

    Ok(())
}

#[test_log::test]
fn custom_source_without_read() {
    assert!(matches!(
        CustomSource::builder().build(),
        Err(Error::InvalidSource(_)),
    ));
}

#[test_log::test]
fn custom_source_get_next_retry_after_error() -> constdb::Result<()> {
    let config = Config::new().use_cache(false);

    let mut writer = config.create_in_memory()?;
    writer.put("dup", "1")?;
    writer.put("dup", "2")?;
    writer.put("dup", "3")?;
    writer.close()?;
    let bytes = writer.into_sink().into_inner();

    let fail_next_read = Arc::new(AtomicBool::new(false));

    let source = CustomSource::builder()
        .read({
            let fail_next_read = fail_next_read.clone();
            move |start, len| {
                if fail_next_read.swap(false, Relaxed) {
                    return Err(std::io::Error::other("transient failure"));
                }

                let start = usize::try_from(start).unwrap_or(usize::MAX).min(bytes.len());
                let end = start.saturating_add(len).min(bytes.len());
                Ok(bytes.get(start..end).unwrap_or_default().to_vec())
            }
        })
        .build()?;

    let mut reader = config.open_source(source)?;
    assert_eq!(Some(b"1".to_vec()), reader.get("dup")?);

    fail_next_read.store(true, Relaxed);
    assert!(matches!(reader.get_next(), Err(Error::Io(_))));

    assert_eq!(Some(b"2".to_vec()), reader.get_next()?);

    fail_next_read.store(true, Relaxed);
    assert!(matches!(reader.get_next(), Err(Error::Io(_))));

    assert_eq!(Some(b"3".to_vec()), reader.get_next()?);
    assert_eq!(None, reader.get_next()?);

    Ok(())
}
