use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use partdraw_config::{AppConfig, ConfigError};
use partdraw_engine::BatchOutcome;
use partdraw_frontend::{CliContext, FrontendError, run_batch, run_generate, run_inspect};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// 把零件参数转换为可用于激光切割的 DXF 图纸。
#[derive(Debug, Parser)]
#[command(name = "partdraw", version)]
struct Cli {
    /// 配置文件路径，缺省时按 `PARTDRAW_CONFIG` 与 `./config/default.toml` 查找。
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// 图纸输出目录，覆盖配置中的 `output.directory`。
    #[arg(long, global = true, value_name = "DIR")]
    output: Option<PathBuf>,
    /// 写出 JSON 报告的路径。
    #[arg(long, global = true, value_name = "FILE")]
    report: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 由 `key=value` 参数生成单个图纸。
    Generate {
        #[arg(required = true, value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
    /// 从 JSON 或 CSV 记录文件批量生成。
    Batch {
        source: PathBuf,
        /// 作用于每一行的覆盖值。
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
    },
    /// 打印 DXF 文件的图层与实体概览。
    Inspect { path: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = load_configuration(cli.config.clone());
    init_logging(&config);
    info!("启动 partdraw");

    match execute(cli, &config) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "命令执行失败");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli, config: &AppConfig) -> Result<ExitCode, FrontendError> {
    let context = CliContext::from_config(config, cli.output, cli.report);
    match cli.command {
        Command::Generate { fields } => {
            run_generate(&context, &fields)?;
        }
        Command::Batch { source, overrides } => {
            let result = run_batch(&context, &source, &overrides)?;
            if result.outcome() == BatchOutcome::AllFailed {
                warn!(source = %source.display(), "所有记录均未能生成图纸");
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Inspect { path } => {
            run_inspect(&path)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
