use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use ocrun::Collection;
use ocrun::runner::{CollectionRunOptions, CollectionRunner, RequestRunner, RunReporter};
use ocrun::variable::{ConfigLoader, RunnerConfig, VarMap};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// 输出调试日志和响应体
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 运行集合中的请求
    Run(RunArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// 集合文件（JSON）
    pub collection: PathBuf,

    /// 只运行指定名称的请求
    #[arg(short, long)]
    pub request: Option<String>,

    /// 使用集合中定义的环境
    #[arg(short, long)]
    pub env: Option<String>,

    /// 临时变量 key=value，可重复
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// 请求超时（毫秒）
    #[arg(long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// 不校验 TLS 证书
    #[arg(long)]
    pub insecure: bool,

    /// 以 JSON 输出全部结果
    #[arg(long)]
    pub json: bool,

    /// 指定配置文件，默认自动查找 ocrun.toml
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

fn parse_var(s: &str) -> std::result::Result<(String, String), String> {
    ConfigLoader::parse_cli_var(s).ok_or_else(|| format!("invalid variable '{s}', expected KEY=VALUE"))
}

/// 加载配置：显式路径优先，否则从当前目录开始查找
fn load_config(explicit: Option<&Path>) -> Result<RunnerConfig> {
    if let Some(path) = explicit {
        return ConfigLoader::load_from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }
    let cwd = std::env::current_dir()?;
    Ok(ConfigLoader::find_and_load(&cwd)?.unwrap_or_default())
}

/// 执行 `run` 子命令，返回是否全部通过
pub async fn run(args: RunArgs, verbose: bool) -> Result<bool> {
    let text = std::fs::read_to_string(&args.collection)
        .with_context(|| format!("Failed to read {}", args.collection.display()))?;
    let collection = Collection::from_json_str(&text)
        .with_context(|| format!("Invalid collection {}", args.collection.display()))?;

    let config = load_config(args.config.as_deref())?;

    let environment = match &args.env {
        Some(name) => Some(
            collection
                .environment(name)
                .with_context(|| format!("Environment '{name}' not found in collection"))?,
        ),
        None => None,
    };

    if let Some(name) = &args.request {
        if collection.find_request(name).is_none() {
            bail!("Request '{name}' not found in collection");
        }
    }

    let prompt_variables: VarMap = args
        .vars
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();
    let collection_dir = args
        .collection
        .parent()
        .map(|dir| dir.display().to_string());

    let options = CollectionRunOptions {
        environment,
        request_name: args.request.as_deref(),
        prompt_variables,
        timeout_ms: args.timeout,
        validate_ssl: args.insecure.then_some(false),
        collection_path: collection_dir.as_deref(),
        ..Default::default()
    };

    let runner = CollectionRunner::new(RequestRunner::with_config(config)?);
    let reporter = RunReporter::new(verbose);
    let total = collection
        .requests()
        .iter()
        .filter(|r| args.request.as_deref().is_none_or(|name| r.name == name))
        .count();
    if !args.json {
        reporter.print_header(&collection.info.name, total);
    }

    let result = runner.run(&collection, options).await;

    if args.json {
        let responses: Vec<_> = result.runs.iter().map(|run| &run.result).collect();
        println!("{}", serde_json::to_string_pretty(&responses)?);
    } else {
        for (index, run) in result.runs.iter().enumerate() {
            reporter.print_run(index, run);
        }
        reporter.print_summary(&result.summary);
    }

    Ok(result.summary.is_success())
}
