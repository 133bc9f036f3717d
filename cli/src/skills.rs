use anyhow::{Context, Result};
use clap::Subcommand;
use console::style;
use dialoguer::{Input, Select};
use plugins_core::config::DISCOVERY_URL;
use plugins_core::skills::{self, CLIENTS, Client, DEFAULT_CLIENT, Scope, SkillInstaller, SkillRoots};
use plugins_core::{Paths, SearchParams, SearchResultSkill, SortField};

use crate::ui::{self, Spinner};

const PAGE_SIZE: u32 = 5;

#[derive(Subcommand)]
pub enum SkillsCommands {
    /// Install or update an agent skill
    Install {
        /// @owner/repo/skill, owner/repo, or a GitHub URL
        identifier: String,
        /// Target client
        #[arg(long, default_value = DEFAULT_CLIENT)]
        client: String,
        /// Install into the current project instead of the home directory
        #[arg(short, long, visible_alias = "project")]
        local: bool,
    },
    /// Search the registry and install a result
    Search {
        query: Option<String>,
        #[arg(long, default_value = DEFAULT_CLIENT)]
        client: String,
        #[arg(short, long, visible_alias = "project")]
        local: bool,
    },
    /// List installed skills
    List {
        /// Only this client
        #[arg(long)]
        client: Option<String>,
    },
}

fn scope(local: bool) -> Scope {
    if local { Scope::Local } else { Scope::Global }
}

pub async fn handle_command(paths: &Paths, command: SkillsCommands) -> Result<()> {
    match command {
        SkillsCommands::Install {
            identifier,
            client,
            local,
        } => {
            let client = skills::client(&client)?;
            let installer = installer(paths).await?;
            install_skill(&installer, &identifier, client, scope(local)).await
        }
        SkillsCommands::Search {
            query,
            client,
            local,
        } => {
            let client = skills::client(&client)?;
            let installer = installer(paths).await?;
            search_skills(&installer, query, client, scope(local)).await
        }
        SkillsCommands::List { client } => list_skills(client.as_deref()),
    }
}

async fn installer(paths: &Paths) -> Result<SkillInstaller> {
    let roots = SkillRoots::discover().context("Failed to locate skill directories")?;
    Ok(SkillInstaller::connect(paths, roots).await)
}

async fn install_skill(
    installer: &SkillInstaller,
    identifier: &str,
    client: &'static Client,
    scope: Scope,
) -> Result<()> {
    let spinner = Spinner::start(&format!("Installing {identifier}..."));
    let report = match installer.install(identifier, client, scope, &spinner).await {
        Ok(report) => report,
        Err(e) => {
            spinner.fail("Installation failed");
            return Err(e.into());
        }
    };

    let updated = report.skills.iter().filter(|s| s.updated).count();
    spinner.succeed(&format!(
        "{} skill(s) installed for {}{}",
        report.skills.len(),
        client.name,
        if updated > 0 {
            format!(", {updated} updated")
        } else {
            String::new()
        }
    ));

    for skill in &report.skills {
        println!("  {} {}", style("●").green(), style(&skill.name).bold());
        ui::hint(skill.path.display());
    }
    match report.scope {
        Scope::Global => ui::hint(format!("Available for all {} projects.", client.name)),
        Scope::Local => ui::hint("Available for this project only."),
    }
    Ok(())
}

fn describe(skill: &SearchResultSkill) -> String {
    let description = skill.description.as_deref().unwrap_or("").trim();
    let mut line = format!(
        "{} {}",
        style(&skill.namespace).bold(),
        style(format!("★ {}  ↓ {}", skill.stars, skill.installs)).dim()
    );
    if !description.is_empty() {
        let short: String = description.chars().take(70).collect();
        line.push_str(&format!("\n    {}", style(short).dim()));
    }
    line
}

async fn search_skills(
    installer: &SkillInstaller,
    query: Option<String>,
    client: &'static Client,
    scope: Scope,
) -> Result<()> {
    let query = match query {
        Some(query) => query,
        None => Input::<String>::new()
            .with_prompt("Search skills (empty for most installed)")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read search query")?,
    };

    let registry = installer.registry();
    let mut results: Vec<SearchResultSkill> = Vec::new();
    let mut offset = 0;

    let chosen = loop {
        let mut params = SearchParams::new(query.trim()).page(PAGE_SIZE, offset);
        if query.trim().is_empty() {
            params = params.sorted_by(SortField::Downloads);
        }

        let spinner = Spinner::start("Searching...");
        let page = match registry.search_skills(&params).await {
            Ok(page) => page,
            Err(e) => {
                spinner.fail("Search failed");
                return Err(e.into());
            }
        };
        spinner.succeed(&format!("{} result(s)", page.total));

        let has_more = page.has_more();
        offset += page.skills.len() as u32;
        results.extend(page.skills);

        if results.is_empty() {
            ui::warn("No skills found");
            ui::hint(format!("Visit {DISCOVERY_URL}/skills to discover agent skills."));
            return Ok(());
        }

        let mut items: Vec<String> = results.iter().map(describe).collect();
        if has_more {
            items.push(style("Load more...").cyan().to_string());
        }

        let selection = Select::new()
            .with_prompt("Select a skill to install")
            .items(&items)
            .default(results.len().saturating_sub(PAGE_SIZE as usize))
            .interact_opt()
            .context("Failed to select skill")?;

        match selection {
            None => {
                ui::warn("Cancelled");
                return Ok(());
            }
            Some(index) if index < results.len() => break results.swap_remove(index),
            Some(_) => continue,
        }
    };

    install_skill(installer, &chosen.namespace, client, scope).await
}

fn list_skills(client: Option<&str>) -> Result<()> {
    let clients: Vec<&'static Client> = match client {
        Some(id) => vec![skills::client(id)?],
        None => CLIENTS.iter().collect(),
    };
    let roots = SkillRoots::discover().context("Failed to locate skill directories")?;
    let installed = skills::scan_installed(&clients, &roots)?;

    if installed.is_empty() {
        ui::warn("No skills installed");
        ui::hint(format!("Visit {DISCOVERY_URL}/skills to discover agent skills."));
        return Ok(());
    }

    println!(
        "{} Installed agent skills ({})",
        style("✓").green().bold(),
        installed.len()
    );
    println!();

    for entry in installed {
        println!(
            "  {} {} {}",
            style("●").green(),
            style(&entry.dir_name).white().bold(),
            style(format!("({}, {})", entry.client.name, entry.scope)).dim()
        );
        match &entry.skill {
            Some(skill) => {
                println!("    {} {}", style(format!("v{}", skill.version)).dim(), skill.description);
                if !skill.tags.is_empty() {
                    println!("    Tags:   {}", skill.tags.join(", "));
                }
                if let Some(author) = &skill.author {
                    println!("    Author: {author}");
                }
            }
            None => println!("    {}", style("missing SKILL.md").yellow()),
        }
        ui::hint(entry.path.display());
    }
    println!();

    Ok(())
}
