//! Quick tour of the map: typed codecs, TTL, events, compaction and a
//! file-backed snapshot.
//!
//! Run with: cargo run --example kv_demo

use eyre::Result;
use roguedb::{EventSink, I64Codec, MapBuilder, PersistOptions, StrCodec};

struct Printer;

impl EventSink<String, i64> for Printer {
    fn on_set(&mut self, key: &String, value: &i64) {
        println!("  set    {key} = {value}");
    }

    fn on_delete(&mut self, key: &String) {
        println!("  delete {key}");
    }

    fn on_expire(&mut self, key: &String) {
        println!("  expire {key}");
    }
}

fn main() -> Result<()> {
    let dir = std::env::temp_dir().join("roguedb-demo");
    let mut map = MapBuilder::new()
        .bucket_count(1024)
        .log_bytes(1 << 20)
        .key_codec(StrCodec)
        .value_codec(I64Codec)
        .persistence(PersistOptions::file(&dir).sync_load(false))
        .build::<String, i64>()?;
    map.subscribe(Box::new(Printer));

    println!("writing:");
    for i in 0..5 {
        map.set(format!("counter-{i}"), i * 100)?;
    }
    map.set_with_ttl("short-lived".into(), 1, 250)?;
    map.delete(&"counter-3".to_string())?;

    println!("\nlive entries ({}):", map.len());
    for pair in map.entries() {
        let (key, value) = pair?;
        println!("  {key} = {value}");
    }

    std::thread::sleep(std::time::Duration::from_millis(300));
    println!("\nafter the TTL elapses:");
    println!("  short-lived -> {:?}", map.get(&"short-lived".to_string())?);

    map.compact()?;
    map.close()?;
    println!("\nsnapshot saved under {}", dir.display());
    Ok(())
}
