//! Info command - print mosaic metadata as JSON.

use tilemosaic::backend::open;

use super::common::{parse_stac_query, print_json};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the info command.
pub struct InfoArgs {
    pub uri: String,
    pub quadkeys: bool,
    pub stac_query: Option<String>,
    pub debug: bool,
}

/// Run the info command.
pub fn run(args: InfoArgs) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(args.debug)?;
    runner.log_startup("info");
    let config = runner.backend_config(parse_stac_query(args.stac_query.as_deref())?);

    let info = runner.block_on(async {
        let mosaic = open(&args.uri, &config).await?;
        let info = mosaic.info(args.quadkeys).await?;
        mosaic.close()?;
        Ok::<_, CliError>(info)
    })?;

    print_json(&info)
}
