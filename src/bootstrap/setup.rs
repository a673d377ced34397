//! Process startup: logger installation and the image backend probe.

use anstyle::{AnsiColor, Style};
use env_logger::Builder;
use log::kv::Key;
use log::{error, info};
use std::io::Write;

use crate::config::APP_CONFIG;
use crate::operations::imaging::{ImageBackend, backend_from_config};

const DIM: Style = Style::new().dimmed();
const DURATION: Style = Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::Cyan)));
const DURATION_WIDTH: usize = 10;

/// Renders a `duration` kv such as `1.234567ms` as `1.23 ms`.
fn format_duration(raw: &str) -> String {
    if let Some(idx) = raw.find(|c: char| c.is_alphabetic()) {
        let (num, unit) = (&raw[..idx], &raw[idx..]);
        if let Ok(val) = num.parse::<f32>() {
            return format!("{:.2} {}", val, unit);
        }
    }
    raw.to_string()
}

/// Install the global logger. `RUST_LOG` overrides the default filters.
pub fn initialize_logger() {
    let result = Builder::new()
        .format(|buf, record| {
            let ts = buf.timestamp();
            let level_style = buf.default_level_style(record.level());

            writeln!(
                buf,
                "{DIM}{ts}{DIM:#} {level_style}{}{level_style:#} {DIM}{}{DIM:#}",
                record.level(),
                record.target()
            )?;

            let dur_raw = record
                .key_values()
                .get(Key::from("duration"))
                .map(|v| format_duration(&v.to_string()))
                .unwrap_or_default();
            let dur = if dur_raw.is_empty() {
                " ".repeat(DURATION_WIDTH)
            } else {
                format!("{DURATION}{dur_raw:>10}{DURATION:#}")
            };

            let message = record.args().to_string();
            let mut lines = message.lines();
            if let Some(first_line) = lines.next() {
                writeln!(buf, "{} {}", dur, first_line)?;
            }
            let subsequent_indent = " ".repeat(DURATION_WIDTH + 1);
            for line in lines {
                writeln!(buf, "{}{}", subsequent_indent, line)?;
            }
            Ok(())
        })
        .filter(None, log::LevelFilter::Info)
        .filter(Some("rocket"), log::LevelFilter::Warn)
        .parse_default_env()
        .try_init();

    if let Err(err) = result {
        eprintln!("Logger already initialized: {err}");
    }
}

/// Log whether the configured backend answers. A dead backend does not stop the
/// server; every batch then fails with a stream error instead.
pub fn check_backend(backend: &dyn ImageBackend) {
    match backend.probe() {
        Ok(version) => info!("{} image backend ready: {}", backend.name(), version),
        Err(err) => error!(
            "{} image backend is unavailable, batches will fail until it is fixed: {:#}",
            backend.name(),
            err
        ),
    }
}

pub fn initialize() {
    initialize_logger();
    check_backend(&*backend_from_config(&APP_CONFIG));
}
