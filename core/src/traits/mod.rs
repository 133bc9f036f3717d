pub mod fetcher;
pub mod registry;
pub mod status;

pub use fetcher::Fetcher;
pub use registry::{
    RegistryApi, ResolvedSkill, SearchMetadata, SearchParams, SearchResponse, SearchResultSkill,
    SkillInfo, SortField,
};
pub use status::Reporter;
