use tonutils_boc::cli::Cli;
use tonutils_boc::utils::init_logger;


fn main() -> anyhow::Result<()> {
    init_logger()?;
    let cli = Cli::parse_args();
    cli.execute()?;
    Ok(())
}
