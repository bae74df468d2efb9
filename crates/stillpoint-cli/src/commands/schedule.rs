use std::path::PathBuf;

use clap::Args;
use stillpoint_core::script::section_text;
use stillpoint_core::storage::{FileSettingsStore, SettingsStore};
use stillpoint_core::compute_schedule;

#[derive(Args)]
pub struct ScheduleArgs {
    /// Meditation length in seconds (defaults to the configured length)
    #[arg(long)]
    duration: Option<u64>,
    /// Script file (.json or markup); defaults to the bundled script
    #[arg(long)]
    script: Option<PathBuf>,
    /// Print the schedule as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: ScheduleArgs) -> Result<(), Box<dyn std::error::Error>> {
    let duration = match args.duration {
        Some(d) => d,
        None => FileSettingsStore::open()?.current().meditation_duration,
    };
    let script = super::load_script(args.script.as_deref())?;
    let schedule = compute_schedule(duration, &script);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&schedule)?);
        return Ok(());
    }
    for event in &schedule {
        let text = section_text(&event.content);
        let preview: String = text.chars().take(60).collect();
        let ellipsis = if text.chars().count() > 60 { "..." } else { "" };
        println!(
            "{:>2}:{:02}  {:<5}  {preview}{ellipsis}",
            event.time / 60,
            event.time % 60,
            format!("{:?}", event.kind).to_lowercase(),
        );
    }
    Ok(())
}
