pub mod config;
pub mod error;
pub mod fetch;
pub mod marketplace;
pub mod plugins;
pub mod registry;
pub mod settings;
pub mod skills;
pub mod store;
pub mod target;
pub mod traits;

pub use config::{Config, Paths};
pub use error::{Error, Result};
pub use fetch::RemoteFetcher;
pub use marketplace::{ArtifactKind, KnownMarketplace, Marketplace, MarketplaceRegistry, Plugin};
pub use plugins::{
    Cleanup, DisableReport, EnableOutcome, InstallReport, MarketplaceGroup, PluginManager,
    RemoveReport,
};
pub use registry::{HttpRegistry, RetryPolicy};
pub use settings::{PluginEntry, SettingsStore};
pub use skills::{Scope, SkillInstaller, SkillRoots};
pub use store::{JsonStore, KeyedMutex};
pub use target::{InstallTarget, ParseError, parse_install_target};
pub use traits::*;
