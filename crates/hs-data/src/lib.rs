pub mod catalog;
pub mod loaders;
pub mod storage;

pub use catalog::*;
pub use loaders::*;
pub use storage::*;

use std::path::Path;

use hs_types::{Dataset, HsResult};

/// Discover and load every reward log in `input_dir` that passes `filter`.
///
/// Returns the dataset plus the number of files that were skipped either
/// during discovery or while loading.
pub fn load_dataset<P: AsRef<Path>>(
    input_dir: P,
    filter: &CatalogFilter,
    loader: &TrajectoryLoader,
) -> HsResult<(Dataset, usize)> {
    let catalog = RunCatalog::scan(input_dir, filter)?;
    let (dataset, failed) = catalog.load(loader);
    tracing::info!(
        "Loaded {} reward logs covering {} environments",
        dataset.sets().len(),
        dataset.envs().len()
    );
    Ok((dataset, catalog.skipped() + failed))
}
