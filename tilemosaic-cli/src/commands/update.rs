//! Update command - merge new footprints into an existing mosaic.

use clap::ValueEnum;
use tilemosaic::backend::open;
use tilemosaic::mosaic::MergeOrder;

use super::common::{read_footprints, FilterArgs};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Merge order selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum MergeOrderArg {
    /// New assets take priority over existing ones
    #[default]
    Prepend,
    /// Existing assets keep priority
    Append,
}

impl From<MergeOrderArg> for MergeOrder {
    fn from(arg: MergeOrderArg) -> Self {
        match arg {
            MergeOrderArg::Prepend => MergeOrder::Prepend,
            MergeOrderArg::Append => MergeOrder::Append,
        }
    }
}

/// Arguments for the update command.
pub struct UpdateArgs {
    pub uri: String,
    /// GeoJSON footprints file (`-` for stdin)
    pub footprints: String,
    pub order: MergeOrderArg,
    pub filter: FilterArgs,
    pub debug: bool,
}

/// Run the update command.
pub fn run(args: UpdateArgs) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(args.debug)?;
    runner.log_startup("update");

    let footprints = read_footprints(&args.footprints)?;
    let mut config = runner.backend_config(Default::default());
    config.build = args.filter.apply(config.build)?;

    runner.block_on(async {
        let mut mosaic = open(&args.uri, &config).await?;
        mosaic.update(&footprints, args.order.into()).await?;
        eprintln!(
            "Updated {} with {} footprints (version {})",
            mosaic.uri(),
            footprints.len(),
            mosaic.document().version()
        );
        mosaic.close()?;
        Ok::<(), CliError>(())
    })
}
