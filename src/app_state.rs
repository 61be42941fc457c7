use crate::cli::CommandLineArgs;
use crate::dataset_store::DatasetStore;
use crate::error::EquistatError;
use crate::resource_manager::ResourceManager;
use crate::user_store::UserStore;

use byte_unit::Byte;
use std::sync::Arc;

/// Shared application state passed to each request handler.
pub struct AppState {
    /// Command line arguments.
    pub args: CommandLineArgs,

    /// Dataset metadata and blob storage.
    pub dataset_store: DatasetStore,

    /// User registry.
    pub user_store: UserStore,

    /// Resource manager.
    pub resource_manager: ResourceManager,
}

impl AppState {
    /// Create and return an [AppState].
    ///
    /// Opens both embedded stores and creates the configured administrator
    /// account if it does not exist yet.
    pub async fn new(args: &CommandLineArgs) -> Result<Self, EquistatError> {
        let memory_limit = args.memory_limit.as_deref().map(parse_size);
        let task_limit = args.task_limit.or_else(|| Some(num_cpus::get() - 1));
        let resource_manager = ResourceManager::new(memory_limit, task_limit);
        let dataset_store = DatasetStore::new(args)?;
        let user_store = UserStore::new(args)?;
        user_store.ensure_admin(args).await?;

        Ok(Self {
            args: args.clone(),
            dataset_store,
            user_store,
            resource_manager,
        })
    }
}

/// AppState wrapped in an Atomic Reference Count (Arc) to allow multiple references.
pub type SharedAppState = Arc<AppState>;

/// Parse a human readable size such as "16 MiB" into a byte count.
///
/// Sizes come from the command line, so a value that does not parse aborts
/// start up.
pub fn parse_size(size: &str) -> usize {
    usize::try_from(
        Byte::parse_str(size, /* ignore case */ true)
            .expect("Invalid size limit")
            .as_u64(),
    )
    .expect("Size limit failed to convert to usize")
}
