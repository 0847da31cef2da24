use clap::Parser;

use fpgrab::{
    cli::{Cli, Commands},
    handler::{handle_capture, handle_inspect, handle_ports},
    logging::init_logging,
};

/// 程序的主入口点
///
/// 负责解析命令行参数、初始化日志，并根据指定的子命令
/// 将执行分派到相应的处理函数
fn main() -> anyhow::Result<()> {
    // 解析命令行参数
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    // 根据子命令调用相应的处理函数
    match cli.command {
        Commands::Capture(args) => handle_capture(args),
        Commands::Ports => handle_ports(),
        Commands::Inspect(args) => handle_inspect(args),
    }
}
