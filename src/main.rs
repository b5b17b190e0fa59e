use config_history::config::Config;
use config_history::history::{ContextLines, DiffView, compute_diff_with_deadline, render_view};
use config_history::logging;
use std::fs;
use std::process::ExitCode;

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    logging::init(&config.settings);

    let mut args = std::env::args().skip(1);
    let (Some(old_path), Some(new_path)) = (args.next(), args.next()) else {
        eprintln!("usage: config-history <old-file> <new-file> [context-lines]");
        return Ok(ExitCode::from(2));
    };
    let context = match args.next() {
        Some(value) => ContextLines::new(value.parse()?),
        None => ContextLines::new(config.settings.default_context_lines),
    };

    let old = fs::read_to_string(&old_path)?;
    let new = fs::read_to_string(&new_path)?;
    let diff = compute_diff_with_deadline(&old, &new, config.settings.diff_timeout());

    match render_view(&diff, context, config.settings.show_only_changes) {
        DiffView::Identical => {
            println!("No differences");
            Ok(ExitCode::SUCCESS)
        }
        DiffView::Units(units) => {
            println!("--- {}", old_path);
            println!("+++ {}", new_path);
            for unit in &units {
                println!("{}", unit);
            }
            println!("+{} -{}", diff.summary.added, diff.summary.removed);
            Ok(ExitCode::from(1))
        }
    }
}
