use std::sync::{Arc, Mutex};

use array_init::array_init;

use idext_core::blocks::{AllSolid, BlockInfo, BlockTable};
use idext_core::codec::vanilla;
use idext_core::config::{Config, LegacyRangePolicy, UnregisteredPolicy};
use idext_core::coord::{ChunkCoord, Coord};
use idext_core::mirror::{Slot, SlotCapabilities};
use idext_core::mirror::heap_slot::{HeapSlot, HeapSlotAllocator};
use idext_core::protocol::block_change::MultiBlockChange;
use idext_core::protocol::chunk_data::{ChunkData, ChunkDataCodec, LayoutVariant};
use idext_core::storage::chunk::{Chunk, ChunkColumn, SECTION_BLOCK_COUNT};
use idext_core::storage::persistence::{PersistenceAdapter, Staging};
use idext_core::Section;
use idext_nbt::{NBTRead, NBTWrite};

fn world_chunk() -> Chunk {
    let mut chunk = Chunk::new(ChunkCoord::new(12, -3));
    for y in [0usize, 3, 4, 15] {
        let section = chunk.data.get_or_create_section(y).unwrap();
        let ids: [u16; SECTION_BLOCK_COUNT] = array_init(|i| ((i * 7 + y * 4099) % 65535) as u16 + 1);
        let metas: [u16; SECTION_BLOCK_COUNT] = array_init(|i| (i % 13) as u16);
        *section.block_ids_mut() = ids;
        *section.block_metas_mut() = metas;
        section.sweep_invalid_ids(&AllSolid, UnregisteredPolicy::Raise).unwrap();
    }

    chunk
}

#[test]
fn record_survives_disk_and_wire() {
    let chunk = world_chunk();
    let adapter = PersistenceAdapter::new(Config::default(), &AllSolid, Staging::Direct);

    let mut bytes = Vec::new();
    bytes.write_root("", &adapter.save_chunk(&chunk)).unwrap();
    let (_, root) = (&bytes[..]).read_root().unwrap();
    let loaded = adapter.load_chunk(&root).unwrap();
    assert!(loaded.failures.is_empty());

    let codec = ChunkDataCodec::new(LayoutVariant::Interleaved, true);
    let (packet, _) = codec.encode(&loaded.chunk, 0xffff, true, LegacyRangePolicy::Raise).unwrap();
    let mut wire = Vec::new();
    packet.write_to(&mut wire).unwrap();

    let mut received = Chunk::new(ChunkCoord::new(0, 0));
    let packet = ChunkData::read_from(&wire[..]).unwrap();
    assert!(codec.decode(&packet, &mut received, &AllSolid, UnregisteredPolicy::Raise).unwrap().is_empty());

    for y in 0..16 {
        assert_eq!(received.data.section(y), chunk.data.section(y), "section {}", y);
    }
}

#[test]
fn legacy_clients_get_clamped_ids() {
    let chunk = world_chunk();
    let codec = ChunkDataCodec::new(LayoutVariant::Grouped, true);

    let (packet, _) = codec.encode(&chunk, 0xffff, false, LegacyRangePolicy::Clamp).unwrap();
    assert_eq!(packet.primary_mask, chunk.data.get_primary_bit_mask());

    let mut received = Chunk::new(chunk.coord);
    codec.decode(&packet, &mut received, &AllSolid, UnregisteredPolicy::Raise).unwrap();

    let sent = chunk.data.section(3).unwrap();
    let got = received.data.section(3).unwrap();
    for i in 0..SECTION_BLOCK_COUNT {
        assert_eq!(got.block_ids()[i], sent.block_ids()[i].min(4095));
        assert_eq!(got.block_metas()[i], sent.block_metas()[i] & 0x0f);
    }
}

#[test]
fn old_records_upgrade() {
    let mut section = Section::new();
    for (i, id) in section.block_ids_mut().iter_mut().enumerate() {
        *id = (i % 4096) as u16;
    }

    let legacy = vanilla::encode(&section, LegacyRangePolicy::Raise).unwrap();
    let mut registry = BlockTable::new();
    for id in 1..4096 {
        registry.register(id, if id % 2 == 0 { BlockInfo::SOLID } else { BlockInfo::TICKING });
    }

    let adapter = PersistenceAdapter::new(Config::default(), &registry, Staging::Direct);
    let mut tag = adapter.save_section(&vanilla::decode(&legacy));
    tag.remove("Blocks16");
    tag.remove("Data16");

    let loaded = adapter.load_section(&tag).unwrap();
    assert_eq!(loaded.block_ids(), section.block_ids());
    assert_eq!(loaded.non_empty_count(), 4095);
    assert_eq!(loaded.ticking_count(), 2048);

    let upgraded = adapter.save_section(&loaded);
    assert!(upgraded.contains_key("Blocks16"));
    assert_eq!(adapter.load_section(&upgraded).unwrap(), loaded);
}

#[test]
fn mirrored_world() {
    let allocator = Arc::new(HeapSlotAllocator::with_capabilities(SlotCapabilities::all()));
    let mut chunk = Chunk::with_column(ChunkCoord::new(1, 1), ChunkColumn::with_allocator(allocator));
    chunk.data.set_block(Coord::new(8, 100, 8), 30000).unwrap();

    let capabilities = chunk.data.section(6).unwrap().mirror_capabilities();
    let codec = ChunkDataCodec::from_config(&Config::default(), capabilities);
    assert_eq!(codec.variant(), LayoutVariant::Grouped);

    // the host generator writes straight into the slot
    {
        let section = chunk.data.section_mut(6).unwrap();
        section.mirror().unwrap().lock().unwrap().set_block_id(0, 0, 0, 12);
        section.sync_from_mirror().unwrap();
    }
    assert_eq!(chunk.data.block(Coord::new(0, 96, 0)).unwrap(), 12);

    let change = MultiBlockChange::collect(&chunk, &[Coord::new(8, 100, 8), Coord::new(0, 96, 0)]).unwrap();
    let slot = Arc::new(Mutex::new(HeapSlot::new()));
    let mut client = Chunk::new(chunk.coord);
    client.data.get_or_create_section(6).unwrap().attach_mirror(slot.clone()).unwrap();
    change.apply(&mut client).unwrap();

    let slot = slot.lock().unwrap();
    assert_eq!(slot.block_id(8, 4, 8), 30000);
    assert_eq!(slot.block_id(0, 0, 0), 12);
}
