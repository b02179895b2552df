/// 日志工具模块
///
/// 初始化 tracing 输出，并提供启动 / 结束横幅等辅助函数。
/// 日志统一写到 stderr，标准输出留给评分平台。
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化日志
///
/// # 参数
/// - `verbose`: 为 true 时输出 debug 级别，否则默认 info（可被 `RUST_LOG` 覆盖）
pub fn init(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `command`: 本次执行的子命令
/// - `root`: 评分环境根目录
pub fn log_startup(command: &str, root: &Path) {
    info!("{}", "=".repeat(60));
    info!("🚀 自动评分启动 - {}", command);
    info!("📁 评分目录: {}", root.display());
    info!(
        "开始时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
}

/// 记录程序结束信息
///
/// # 参数
/// - `succeeded`: 是否正常结束
/// - `results_path`: 结果文件路径
pub fn log_finish(succeeded: bool, results_path: &Path) {
    info!("{}", "─".repeat(60));
    if succeeded {
        info!("✅ 评分完成");
    } else {
        info!("❌ 评分终止");
    }
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("结果已写入: {}", results_path.display());
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("abcdef", 3), "abc...");
    }
}
