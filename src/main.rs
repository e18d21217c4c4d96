use clap::Parser;

fn main() -> anyhow::Result<()> {
    let cli = bookforge::cli::Cli::parse();
    bookforge::run(cli)
}
