#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(relation) = expinv_engine::expr::parse_relation(s) {
            // Printing and translating what parsed must not panic.
            let _ = expinv_engine::expr::parse_relation(&relation.to_string());
            let _ = expinv_engine::translate::relation_to_smt(&relation);
        }
        let _ = expinv_engine::expr::parse_expr(s);
    }
});
