#![no_main]
use libfuzzer_sys::fuzz_target;
use objrecon::io::{ImageReader, Section};

// Raw bytes laid out as the three Objective-C tables back to back.
fuzz_target!(|data: &[u8]| {
    const BASE: u64 = 0x1000;
    let len = data.len() as u64;
    if len < 3 {
        return;
    }
    let third = len / 3;
    let sections = vec![
        Section::new("__cfstring", BASE, BASE + third),
        Section::new("__objc_selrefs", BASE + third, BASE + 2 * third),
        Section::new("__objc_classlist", BASE + 2 * third, BASE + len),
    ];
    let Ok(reader) = ImageReader::new(BASE, data.to_vec()).with_sections(sections) else {
        return;
    };
    let cfg = objrecon::AnalysisConfig::default();
    let _ = objrecon::analyzers::default_pipeline(objrecon::io::share(reader), &cfg).run();
});
