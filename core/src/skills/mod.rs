pub mod clients;
pub mod install;
pub mod manifest;
pub mod registry;

pub use clients::{CLIENTS, Client, DEFAULT_CLIENT, Scope, SkillRoots, client, client_ids};
pub use install::{InstalledSkillReport, SkillInstallReport, SkillInstaller};
pub use manifest::{SKILL_FILE, Skill, load_skill};
pub use registry::{InstalledSkill, scan_installed};
