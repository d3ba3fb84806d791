// Voxd 数据库管理 CLI 工具

use std::env;
use tracing::{error, info};
use voxd_admin::config::AppConfig;
use voxd_admin::db::cli::{parse_args, print_help, CliExecutor};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return;
    }

    // 先解析命令，避免参数错误时还要连接数据库
    let command = match parse_args(args) {
        Ok(command) => command,
        Err(e) => {
            error!("解析命令失败: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("加载配置失败: {}", e);
            std::process::exit(1);
        }
    };

    let executor = match CliExecutor::new(config).await {
        Ok(executor) => executor,
        Err(e) => {
            error!("初始化 CLI 执行器失败: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = executor.execute(command).await {
        error!("执行命令失败: {}", e);
        std::process::exit(1);
    }

    info!("命令执行完成");
}
