//! Paths command

use crossterm::style::Stylize;

use super::Context;

/// Print the effective cache, output and config locations
pub fn paths(ctx: &Context) {
    let rows = [
        ("Home:", crate::quarry_home()),
        ("Cache:", ctx.config.cache_dir.clone()),
        ("Output:", ctx.config.output_dir.clone()),
        ("Config:", crate::config_path()),
    ];
    for (label, path) in rows {
        println!("{} {}", format!("{label:<10}").dark_grey(), path.display());
    }
}
