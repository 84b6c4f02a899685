#![no_main]
use libfuzzer_sys::fuzz_target;
use idext_core::blocks::AllSolid;
use idext_core::config::Config;
use idext_core::storage::persistence::{PersistenceAdapter, Staging};
use idext_nbt::NBTRead;

fuzz_target!(|data: &[u8]| {
    let mut data = data;
    if let Ok((_, root)) = data.read_root() {
        let adapter = PersistenceAdapter::new(Config::default(), &AllSolid, Staging::Direct);
        let _ = adapter.load_chunk(&root);
    }
});
