#![no_main]

use imr_compiler::Compiler;
use imr_tags::StaticTagKnowledgeBase;
use libfuzzer_sys::fuzz_target;

const VOCABULARY: &str = include_str!("../../crates/imr-cli/tests/fixtures/vocabulary.json");

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(knowledge_base) = StaticTagKnowledgeBase::from_json_str(VOCABULARY) else {
        return;
    };

    let compiler = Compiler::new(knowledge_base);
    if let Ok(compiled) = compiler.compile_text(input) {
        if let Some(compilation) = compiled.compilation {
            for node in &compilation.imr.nodes {
                assert!(node.filters.iter().all(|filter| filter.is_group()));
            }
            let _ = serde_json::to_string(&compilation.imr);
        }
    }
    let _ = compiler.respond("fuzz", input, None);
});
