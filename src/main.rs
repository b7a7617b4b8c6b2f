use clap::Parser;
use visual_assistant::Opts;
use visual_assistant::cli::SubCommandExtend;
use visual_assistant::config::SubCommand;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();

    match &opts.subcmd {
        SubCommand::Register(config) => config.run(&opts).await,
        SubCommand::Add(config) => config.run(&opts).await,
        SubCommand::RemoveImage(config) => config.run(&opts).await,
        SubCommand::Rename(config) => config.run(&opts).await,
        SubCommand::Delete(config) => config.run(&opts).await,
        SubCommand::List(config) => config.run(&opts).await,
        SubCommand::Show(config) => config.run(&opts).await,
        SubCommand::Recognize(config) => config.run(&opts).await,
        SubCommand::Reindex(config) => config.run(&opts).await,
        SubCommand::Server(config) => config.run(&opts).await,
    }
}
