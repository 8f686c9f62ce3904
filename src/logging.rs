use std::io::Write;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use log::LevelFilter;

/// Install the stderr logger. `RUST_LOG` overrides the build-dependent default.
pub fn init() {
    let default_level = if cfg!(debug_assertions) {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(default_level);
    builder.parse_env("RUST_LOG");
    builder.format(|buf, record| {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let current = thread::current();
        let thread_name = current.name().unwrap_or("unnamed");
        writeln!(
            buf,
            "[{ts}ms][{thread_name}] {} {}",
            record.level(),
            record.args()
        )
    });
    // A second init (e.g. from tests) keeps the first logger.
    let _ = builder.try_init();
}
