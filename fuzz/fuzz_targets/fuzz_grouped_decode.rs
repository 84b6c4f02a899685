#![no_main]
use libfuzzer_sys::fuzz_target;
use idext_core::blocks::AllSolid;
use idext_core::config::UnregisteredPolicy;
use idext_core::protocol::chunk_data::{ChunkData, ChunkDataCodec, LayoutVariant};
use idext_core::storage::chunk::Chunk;

fuzz_target!(|data: &[u8]| {
    if let Ok(packet) = ChunkData::read_from(data) {
        let mut chunk = Chunk::new(packet.coord);
        for has_sky in [false, true] {
            for variant in [LayoutVariant::Interleaved, LayoutVariant::Grouped] {
                let codec = ChunkDataCodec::new(variant, has_sky);
                let _ = codec.decode(&packet, &mut chunk, &AllSolid, UnregisteredPolicy::Remove);
            }
        }
    }
});
