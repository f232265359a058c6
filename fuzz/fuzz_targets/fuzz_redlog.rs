#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(formula) = expinv_engine::formula::parse_redlog(s) {
            let _ = expinv_engine::translate::formula_to_smt(&formula);
        }
        let _ = expinv_engine::witness::echoed_formula(s);
        let _ = expinv_engine::witness::pasf_witness(s, &["x", "y", "n"]);
    }
});
