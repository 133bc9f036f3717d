use anyhow::{Context, Result};
use clap::Subcommand;
use console::style;
use plugins_core::config::{self, DISCOVERY_URL};
use plugins_core::{ArtifactKind, Cleanup, EnableOutcome, PluginManager};

use crate::ui::{self, Spinner};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the current configuration
    Show,
    /// Marketplace that loose plugins are installed into
    SetMarketplace { name: String },
    /// Registry used to resolve identifiers and search skills
    SetRegistry { url: String },
}

pub async fn install(manager: &PluginManager, identifier: &str) -> Result<()> {
    let spinner = Spinner::start(&format!("Installing {identifier}..."));
    let report = match manager.install(identifier, &spinner).await {
        Ok(report) => report,
        Err(e) => {
            spinner.fail("Installation failed");
            return Err(e.into());
        }
    };

    match report.kind {
        ArtifactKind::Marketplace => spinner.succeed(&format!(
            "Marketplace \"{}\" installed, plugin \"{}\" enabled",
            report.marketplace, report.plugin
        )),
        ArtifactKind::Plugin => spinner.succeed(&format!(
            "Plugin \"{}\" installed in {}",
            report.plugin, report.marketplace
        )),
    }
    ui::hint(format!("Location: {}", report.location.display()));
    ui::hint("Restart Claude Code to load it.");
    Ok(())
}

pub async fn enable(manager: &PluginManager, name: &str) -> Result<()> {
    match manager.enable(name).await? {
        EnableOutcome::Enabled { marketplace } => {
            ui::success(format!("Plugin \"{name}\" enabled ({marketplace})"));
        }
        EnableOutcome::AlreadyEnabled { marketplace } => {
            ui::warn(format!("Plugin \"{name}\" is already enabled ({marketplace})"));
        }
    }
    Ok(())
}

pub async fn disable(manager: &PluginManager, name: &str, yes: bool) -> Result<()> {
    // Local plugins lose their files on disable; ask first.
    if let Some(entry) = manager.settings().find(name).await?
        && manager.marketplaces().is_local(&entry.marketplace).await
        && !ui::confirm(
            &format!("Disable \"{name}\" and delete its files from {}?", entry.marketplace),
            yes,
        )?
    {
        ui::warn("Cancelled");
        return Ok(());
    }

    let spinner = Spinner::start(&format!("Disabling {name}..."));
    let report = match manager.disable(name, &spinner).await {
        Ok(report) => report,
        Err(e) => {
            spinner.fail("Disable failed");
            return Err(e.into());
        }
    };

    spinner.succeed(&format!("Plugin \"{name}\" disabled ({})", report.marketplace));
    print_cleanup(&report.cleanup);
    Ok(())
}

fn print_cleanup(cleanup: &Cleanup) {
    match cleanup {
        Cleanup::None => {}
        Cleanup::PluginDir(dir) => ui::hint(format!("Removed {}", dir.display())),
        Cleanup::Marketplace(dir) => ui::hint(format!(
            "No plugins left, removed marketplace {}",
            dir.display()
        )),
    }
}

pub async fn remove(manager: &PluginManager, name: &str, yes: bool) -> Result<()> {
    if !ui::confirm(&format!("Remove plugin \"{name}\" and its files?"), yes)? {
        ui::warn("Cancelled");
        return Ok(());
    }

    let spinner = Spinner::start(&format!("Removing {name}..."));
    let report = match manager.remove(name, &spinner).await {
        Ok(report) => report,
        Err(e) => {
            spinner.fail("Remove failed");
            return Err(e.into());
        }
    };

    spinner.succeed(&format!("Plugin \"{name}\" removed ({})", report.marketplace));
    print_cleanup(&report.cleanup);
    Ok(())
}

pub async fn list(manager: &PluginManager) -> Result<()> {
    let groups = manager.list().await?;
    if groups.is_empty() {
        ui::warn("No plugins installed");
        ui::hint(format!("Visit {DISCOVERY_URL} to discover plugins."));
        return Ok(());
    }

    println!("{}", style("Installed plugins").bold());
    for group in groups {
        println!();
        println!("  {}", style(&group.marketplace).cyan().bold());
        for plugin in group.plugins {
            if plugin.enabled {
                println!("    {} {}", style("●").green(), plugin.name);
            } else {
                println!(
                    "    {} {} {}",
                    style("○").dim(),
                    style(&plugin.name).dim(),
                    style("(disabled)").dim()
                );
            }
        }
    }
    println!();
    Ok(())
}

pub async fn marketplaces(manager: &PluginManager) -> Result<()> {
    let known = manager.marketplaces().known().await;
    if known.is_empty() {
        ui::warn("No marketplaces registered");
        return Ok(());
    }

    println!("{}", style("Known marketplaces").bold());
    for (name, entry) in known {
        println!();
        println!("  {}", style(&name).cyan().bold());
        println!("    Source:   {}", entry.source.describe());
        println!("    Location: {}", entry.install_location.display());
        if !entry.last_updated.is_empty() {
            println!("    Updated:  {}", style(&entry.last_updated).dim());
        }
    }
    println!();
    Ok(())
}

pub async fn configure(manager: &PluginManager, command: Option<ConfigCommands>) -> Result<()> {
    let store = manager.store();
    let paths = manager.paths();

    match command.unwrap_or(ConfigCommands::Show) {
        ConfigCommands::Show => {
            let config = config::load_or_init(store, paths).await?;
            println!("  {:<21}{}", "Root:", paths.root().display());
            println!("  {:<21}{}", "Default marketplace:", config.default_marketplace);
            println!("  {:<21}{}", "Registry:", config.registry_url());
        }
        ConfigCommands::SetMarketplace { name } => {
            let config = config::set_default_marketplace(store, paths, &name)
                .await
                .context("Failed to update config")?;
            ui::success(format!("Default marketplace set to {}", config.default_marketplace));
        }
        ConfigCommands::SetRegistry { url } => {
            let config = config::set_registry_url(store, paths, &url)
                .await
                .context("Failed to update config")?;
            ui::success(format!("Registry set to {}", config.registry_url()));
        }
    }
    Ok(())
}
