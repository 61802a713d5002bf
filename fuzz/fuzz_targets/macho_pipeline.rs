#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(reader) = objrecon::io::MachOReader::from_bytes(data.to_vec()) else {
        return;
    };
    let cfg = objrecon::AnalysisConfig::default();
    let _ = objrecon::analyzers::default_pipeline(objrecon::io::share(reader), &cfg).run();
});
