//! The `log` facade bridge installed as the process-wide logger.
//!
//! Installing a global logger can only happen once per process, so this file
//! holds a single test.

mod test_utils;

use logship::{LogHandler, install_log_bridge};
use serial_test::serial;
use test_utils::{Collector, WAIT, config_for, messages};

#[test]
#[serial]
fn log_macros_ship_through_the_handler() {
    let collector = Collector::start();
    let handler = LogHandler::connect(config_for(collector.address())).expect("connect");
    install_log_bridge(handler.with_group("rust")).expect("no other logger installed");

    log::info!(target: "payments", "charge accepted");
    log::debug!(target: "payments", "below the info floor");
    log::warn!(target: "logship::shipper", "internal diagnostics stay local");
    log::error!("module target");
    log::logger().flush();

    let entries = collector.wait_for(2, WAIT);
    assert_eq!(
        messages(&entries),
        vec!["charge accepted".to_owned(), "module target".to_owned()]
    );
    assert_eq!(entries[0]["target"], "payments");
    assert_eq!(entries[0]["groups"][0], "rust");
    assert_eq!(entries[1]["target"], "log_bridge");
    assert_eq!(entries[1]["level"], "ERROR");
    handler.close().expect("close");
}
