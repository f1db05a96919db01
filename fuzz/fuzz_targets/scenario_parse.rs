#![no_main]

use libfuzzer_sys::fuzz_target;
use lrumap_core::config::Config;
use lrumap_core::scenario::Scenario;

fuzz_target!(|data: &[u8]| {
    if data.len() > 16_384 {
        return;
    }
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let _ = Config::from_toml(text);

    if let Ok(scenario) = Scenario::from_yaml(text) {
        // Parsed scenarios either run to a report or fail with an error.
        if scenario.steps.len() <= 256 {
            if let Ok(report) = scenario.run(8) {
                assert_eq!(report.steps_run, scenario.steps.len());
                assert!(report.order.len() <= report.capacity);
            }
        }
    }
});
