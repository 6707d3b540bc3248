use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;

/// Initialize the process logger. `RUST_LOG` wins if set; otherwise the
/// `--debug` flag picks between info and debug for this crate.
pub fn init(debug: bool) {
    let default_level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut builder = Builder::from_default_env();
    if std::env::var("RUST_LOG").is_err() {
        builder.filter_level(LevelFilter::Warn);
        builder.filter_module("token_radar", default_level);
    }
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
}
