//! Fuzz testing for the snapshot decoder.
//!
//! Feeds arbitrary byte sequences to `RogueMap::deserialize` to ensure
//! malformed snapshots are rejected with an error, never a panic, and
//! that a rejected blob leaves the map fully usable.

#![no_main]

use libfuzzer_sys::fuzz_target;

use roguedb::{I64Codec, MapBuilder, StrCodec};

fuzz_target!(|data: &[u8]| {
    let mut map = MapBuilder::new()
        .bucket_count(16)
        .log_bytes(1024)
        .key_codec(StrCodec)
        .value_codec(I64Codec)
        .build::<String, i64>()
        .unwrap();
    map.set("sentinel".to_string(), 1).unwrap();

    if map.deserialize(data).is_err() {
        // rejected blobs must leave prior state intact
        assert_eq!(map.get(&"sentinel".to_string()).unwrap(), Some(1));
    } else {
        // accepted blobs must yield a map that works
        let _ = map.len();
        let _ = map.set("after".to_string(), 2);
        let _ = map.get(&"after".to_string());
    }
});
