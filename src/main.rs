mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use fileprep::config::Config;
use fileprep::observability::init_tracing;
use fileprep::registry::ScriptRegistry;
use fileprep::tasks::TaskRunner;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Prepare(args) => {
            let config = match cli.config {
                Some(path) => Config::load_from_path(path)?,
                None => Config::load()?,
            };
            let request = args.into_request()?;
            let runner = TaskRunner::from_config(&config)?;

            for path in runner.prepare_file(request).await? {
                println!("{path}");
            }
        }
        Commands::Feeds => {
            for (key, handler) in ScriptRegistry::with_defaults().feeds() {
                println!("{}\t{}\t{}", key.feed_identifier, key.feed_version, handler);
            }
        }
    }

    Ok(())
}
