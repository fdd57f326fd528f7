use owo_colors::{OwoColorize, Style};

/// Installs the coloured console logger. Only this crate's target is let through.
pub fn setup_logger(level: Option<log::LevelFilter>) -> anyhow::Result<()> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            let style = match record.level() {
                log::Level::Trace => Style::new().purple(),
                log::Level::Debug => Style::new().blue(),
                log::Level::Warn => Style::new().yellow(),
                log::Level::Error => Style::new().red(),
                log::Level::Info => Style::new().bright_green(),
            };
            out.finish(format_args!(
                "{:<5} {} {} {}",
                record.level().style(style),
                record.target(),
                "~".fg_rgb::<128, 128, 128>(),
                message
            ))
        })
        .level(log::LevelFilter::Off)
        .level_for("proxy_verifier", level.unwrap_or(log::LevelFilter::Info))
        // stdout carries check results
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

pub fn parse_level(name: &str) -> log::LevelFilter {
    match name {
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Warn,
    }
}
