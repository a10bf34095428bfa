use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "smile-bridge")]
#[command(about = "Bridges SMILE broker messages into a request/sample repository")]
pub struct CliConfig {
    #[arg(long, env = "SMILE_CONFIG", default_value = "smile.toml")]
    pub config: String,

    #[arg(long, env = "SMILE_OUTPUT_PATH", default_value = "./smile-data")]
    pub output_path: String,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}
