use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tex_autograder::config::DEFAULT_ROOT;
use tex_autograder::utils::logging;
use tex_autograder::{App, AutograderPaths, Halted, MergeRequest};
use tracing::{error, warn};

#[derive(Parser)]
#[command(name = "tex-autograder", version, about = "LaTeX 作业自动评分")]
struct Cli {
    /// 输出 debug 日志
    #[arg(short, long, global = true)]
    verbose: bool,

    /// 评分环境根目录
    #[arg(long, global = true, env = "AUTOGRADER_ROOT", default_value = DEFAULT_ROOT)]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 编译提交、分析日志，按配置上传 PDF 并分页
    Grade,
    /// 合并检查器输出，写出最终 results.json
    Merge {
        /// 只合并排版检查器的结果
        #[arg(long)]
        tex_only: bool,
        #[arg(long)]
        proof_results: Option<PathBuf>,
        #[arg(long)]
        tex_results: Option<PathBuf>,
        #[arg(long)]
        results_file: Option<PathBuf>,
        #[arg(long)]
        submission_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // 初始化日志
    logging::init(cli.verbose);

    let paths = AutograderPaths::under(&cli.root);
    let results_path = paths.results_file.clone();

    match run(cli.command, paths).await {
        Ok(()) => {
            logging::log_finish(true, &results_path);
            ExitCode::SUCCESS
        }
        Err(e) => {
            // 失败原因已经写进结果文件，这里只记一行
            if let Some(halted) = e.downcast_ref::<Halted>() {
                warn!("⚠️ {}", halted);
            } else {
                error!("❌ {:#}", e);
            }
            logging::log_finish(false, &results_path);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, paths: AutograderPaths) -> Result<()> {
    match command {
        Commands::Grade => App::initialize(paths).await?.grade().await,
        Commands::Merge {
            tex_only,
            proof_results,
            tex_results,
            results_file,
            submission_dir,
        } => {
            let request = MergeRequest {
                tex_only,
                proof_results,
                tex_results,
                results_file,
                submission_dir,
            };
            App::initialize_merge(paths).await?.merge(request).await
        }
    }
}
