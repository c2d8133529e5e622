use constdb::{BlockCache, Config, CustomSource, MemorySource, Source};
use std::sync::{
    atomic::{AtomicUsize, Ordering::Relaxed},
    Arc,
};

fn build_database(config: &Config, count: u32) -> constdb::Result<Vec<u8>> {
    let mut writer = config.create_in_memory()?;
    for idx in 0..count {
        writer.put(idx.to_be_bytes(), format!("value-{idx}").repeat(10))?;
    }
    writer.close()?;
    Ok(writer.into_sink().into_inner())
}

fn counting_source(bytes: Vec<u8>, reads: Arc<AtomicUsize>) -> constdb::Result<CustomSource> {
    let mut inner = MemorySource::new(bytes);

    CustomSource::builder()
        .read(move |start, len| {
            reads.fetch_add(1, Relaxed);
            inner.read(start, len)
        })
        .build()
}

#[test_log::test]
fn cache_reads_same_range_once() -> constdb::Result<()> {
    let reads = Arc::new(AtomicUsize::default());
    let source = counting_source((0..10_000u32).map(|x| x as u8).collect(), reads.clone())?;

    let mut cache = BlockCache::new(source, 4_096, 16);

    let first = cache.read(5_000, 100)?;
    let second = cache.read(5_000, 100)?;
    assert_eq!(first, second);
    assert_eq!(1, reads.load(Relaxed));

    // Spans blocks 0 and 1, block 1 is cached
    cache.read(4_000, 200)?;
    assert_eq!(2, reads.load(Relaxed));

    Ok(())
}

#[test_log::test]
fn cache_reads_lookups_hit_cache() -> constdb::Result<()> {
    let config = Config::new().block_size(512).cache_block_limit(4_096);
    let bytes = build_database(&config, 200)?;

    let reads = Arc::new(AtomicUsize::default());
    let mut reader = config.open_source(counting_source(bytes, reads.clone())?)?;

    for idx in 0..200u32 {
        assert!(reader.get(idx.to_be_bytes())?.is_some());
    }
    let cold_reads = reads.load(Relaxed);

    for idx in 0..200u32 {
        assert_eq!(
            Some(format!("value-{idx}").repeat(10).into_bytes()),
            reader.get(idx.to_be_bytes())?,
        );
    }
    assert_eq!(cold_reads, reads.load(Relaxed));

    Ok(())
}

#[test_log::test]
fn cache_reads_uncached() -> constdb::Result<()> {
    let config = Config::new().use_cache(false);
    let bytes = build_database(&config, 50)?;

    let reads = Arc::new(AtomicUsize::default());
    let mut reader = config.open_source(counting_source(bytes, reads.clone())?)?;

    assert!(reader.get(7u32.to_be_bytes())?.is_some());
    let after_first = reads.load(Relaxed);

    assert!(reader.get(7u32.to_be_bytes())?.is_some());
    assert_eq!(after_first * 2 - 1, reads.load(Relaxed));

    Ok(())
}

#[test_log::test]
fn cache_reads_small_cache() -> constdb::Result<()> {
    // Constant eviction must not affect results
    let config = Config::new().block_size(16).cache_block_limit(2);
    let bytes = build_database(&config, 300)?;

    let mut reader = config.open_bytes(bytes)?;
    for idx in (0..300u32).rev() {
        assert_eq!(
            Some(format!("value-{idx}").repeat(10).into_bytes()),
            reader.get(idx.to_be_bytes())?,
        );
    }

    let scanned = reader.iter().collect::<constdb::Result<Vec<_>>>()?;
    assert_eq!(300, scanned.len());

    Ok(())
}

#[test_log::test]
#[cfg(feature = "metrics")]
fn cache_reads_metrics() -> constdb::Result<()> {
    let config = Config::new().block_size(256);
    let bytes = build_database(&config, 100)?;

    let mut reader = config.open_bytes(bytes)?;
    reader.get(1u32.to_be_bytes())?;
    reader.get(1u32.to_be_bytes())?;

    let metrics = reader.metrics().clone();
    assert!(metrics.block_loads_io() > 0);
    assert!(metrics.block_loads() > metrics.block_loads_io());
    assert!(metrics.slot_probes() >= 2);

    Ok(())
}
