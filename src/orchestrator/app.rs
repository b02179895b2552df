use crate::clients::GradescopeClient;
use crate::config::{AutograderPaths, Config};
use crate::infrastructure::{LatexToolchain, ResultsFile};
use crate::services::{MergeOptions, MergedResult, ResultMerger};
use crate::utils::logging::log_startup;
use crate::workflow::GradeFlow;
use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

/// merge 子命令的参数，未给出的路径使用默认布局
#[derive(Debug, Clone, Default)]
pub struct MergeRequest {
    /// 只看排版检查器
    pub tex_only: bool,
    pub proof_results: Option<PathBuf>,
    pub tex_results: Option<PathBuf>,
    pub results_file: Option<PathBuf>,
    pub submission_dir: Option<PathBuf>,
}

/// 应用主结构
pub struct App {
    paths: AutograderPaths,
    config: Config,
}

impl App {
    /// 初始化评分应用（读取全部配置）
    pub async fn initialize(paths: AutograderPaths) -> Result<Self> {
        log_startup("grade", &paths.root);
        let config = Config::load(&paths).await?;
        Ok(Self { paths, config })
    }

    /// 初始化合并应用（只读取功能开关）
    pub async fn initialize_merge(paths: AutograderPaths) -> Result<Self> {
        log_startup("merge", &paths.root);
        let config = Config::load_settings_only(&paths).await?;
        Ok(Self { paths, config })
    }

    pub fn paths(&self) -> &AutograderPaths {
        &self.paths
    }

    /// 编译、评分，按配置上传并分页
    pub async fn grade(&self) -> Result<()> {
        let toolchain = LatexToolchain::from_paths(&self.paths);
        let flow = GradeFlow::new(&self.paths, &self.config, &toolchain);

        flow.compile_and_grade().await?;

        if !self.config.settings.upload_enabled {
            info!("⏭️ 未开启上传，跳过上传与分页");
            return Ok(());
        }

        let client = self
            .config
            .secrets()
            .and_then(|secrets| {
                GradescopeClient::new(&self.config.settings.base_url, secrets)
                    .map_err(anyhow::Error::from)
            });
        match client {
            Ok(client) => flow.upload(client).await,
            Err(e) => flow.abort_upload(&e).await,
        }
    }

    /// 合并检查器输出并写出最终结果
    pub async fn merge(&self, request: MergeRequest) -> Result<()> {
        let settings = &self.config.settings;
        let merger = ResultMerger::new(MergeOptions {
            tex_optional: settings.tex_optional,
            lean_optional: settings.lean_optional,
            proof_max_scores: settings.proof_max_scores.clone(),
        });

        let proof_results = request
            .proof_results
            .unwrap_or_else(|| self.paths.proof_results.clone());
        let tex_results = request
            .tex_results
            .unwrap_or_else(|| self.paths.tex_results.clone());
        let submission_dir = request
            .submission_dir
            .unwrap_or_else(|| self.paths.submission_dir.clone());
        let results = ResultsFile::new(
            request
                .results_file
                .unwrap_or_else(|| self.paths.results_file.clone()),
        );

        let proof = (!request.tex_only).then_some(proof_results.as_path());
        match merger.run(proof, &tex_results, &submission_dir).await? {
            MergedResult::Results(set) => results.write(&set).await?,
            MergedResult::Passthrough(report) => results.write_value(&report).await?,
        }
        info!("✓ 结果已写入: {}", results.path().display());
        Ok(())
    }
}
