//! Init command implementation

use colored::Colorize;
use dialoguer::{Confirm, Input, theme::ColorfulTheme};

use crate::cli::args::GlobalOptions;
use crate::error::Result;

/// Run the init command
///
/// Starts from the existing config (or defaults) and prompts for the values
/// most deployments change.
pub fn run(opts: &GlobalOptions) -> Result<()> {
    let path = opts.config_path();
    let theme = ColorfulTheme::default();

    println!("{}", "Welcome to pulsemind-sw!".bold().green());
    println!("Let's set up your service worker configuration.\n");

    if path.exists() {
        let overwrite = Confirm::with_theme(&theme)
            .with_prompt(format!("{} exists. Update it?", path.display()))
            .default(true)
            .interact()?;
        if !overwrite {
            println!("Nothing changed.");
            return Ok(());
        }
    }

    let mut config = opts.load_config().unwrap_or_default();

    config.cache.version = Input::with_theme(&theme)
        .with_prompt("Precache name (bump to invalidate old caches)")
        .default(config.cache.version.clone())
        .interact_text()?;

    config.host.origin = Input::with_theme(&theme)
        .with_prompt("Origin the app is served from")
        .default(config.host.origin.clone())
        .interact_text()?;

    config.reminder.hour = Input::with_theme(&theme)
        .with_prompt("Daily reminder hour (0-23)")
        .default(config.reminder.hour)
        .validate_with(|h: &u32| {
            if *h <= 23 {
                Ok(())
            } else {
                Err("hour must be between 0 and 23")
            }
        })
        .interact_text()?;

    config.reminder.minute = Input::with_theme(&theme)
        .with_prompt("Daily reminder minute (0-59)")
        .default(config.reminder.minute)
        .validate_with(|m: &u32| {
            if *m <= 59 {
                Ok(())
            } else {
                Err("minute must be between 0 and 59")
            }
        })
        .interact_text()?;

    config.reminder.max_snooze = Input::with_theme(&theme)
        .with_prompt("Maximum snoozes per day")
        .default(config.reminder.max_snooze)
        .interact_text()?;

    config.reminder.snooze_minutes = Input::with_theme(&theme)
        .with_prompt("Snooze length in minutes")
        .default(config.reminder.snooze_minutes)
        .interact_text()?;

    config.validate()?;
    config.save_to(&path)?;

    println!("\n{} Configuration saved to: {}", "✓".green(), path.display());
    println!(
        "  Reminder: {:02}:{:02}, up to {} snoozes of {} min",
        config.reminder.hour,
        config.reminder.minute,
        config.reminder.max_snooze,
        config.reminder.snooze_minutes
    );

    println!("\n{}", "You're all set! Try running:".bold());
    println!("  {} - Write sw.js", "pulsemind-sw generate".cyan());
    println!("  {} - Show status", "pulsemind-sw status".cyan());

    Ok(())
}
