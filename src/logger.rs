use chrono::Local;
use env_logger::fmt::Color;
use log::LevelFilter;
use std::io::Write;

/// Install the global logger. `level` is the default; `RUST_LOG` still
/// takes precedence when set. Logs go to stderr so they never mix with
/// the codes printed on stdout.
pub fn init_logger(level: LevelFilter) {
    let mut bui = env_logger::Builder::new();
    bui.filter_level(level).parse_default_env();

    bui.format(|buf, record| {
        let dt = Local::now();

        let mut level_style = buf.style();
        level_style
            .set_color(match record.level() {
                log::Level::Error => Color::Red,
                log::Level::Warn => Color::Yellow,
                log::Level::Info => Color::Green,
                log::Level::Debug => Color::Blue,
                log::Level::Trace => Color::Magenta,
            })
            .set_bold(true);

        let mut target_style = buf.style();
        target_style.set_color(Color::Cyan);

        writeln!(
            buf,
            "{} {} {}: {}",
            dt.format("%Y-%m-%d %H:%M:%S"),
            level_style.value(record.level()),
            target_style.value(record.target()),
            record.args()
        )
    });

    // a second init (e.g. from tests) keeps the first logger
    let _ = bui.try_init();
}
