use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, Table};

use crate::runner::collection_runner::{RequestRun, RunSummary};
use crate::runner::types::RunOutcome;
use crate::script::ResultStatus;

/// 控制台报告输出
pub struct RunReporter {
    verbose: bool,
}

impl RunReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// 打印运行开始
    pub fn print_header(&self, collection: &str, total: usize) {
        println!("\nRunning {} requests from {}...\n", total, collection.bold());
    }

    /// 打印单个请求的结果
    pub fn print_run(&self, index: usize, run: &RequestRun) {
        let symbol = if run.passed() { "✓".green() } else { "✗".red() };
        let outcome = match &run.result.outcome {
            RunOutcome::Response(response) => {
                let status = response.status.to_string();
                let status = if response.status < 400 {
                    status.green()
                } else {
                    status.red()
                };
                format!("{} ({}ms)", status, response.duration)
            }
            RunOutcome::Failed(failure) => {
                format!("{} ({}ms)", failure.error_type.to_string().red(), failure.duration)
            }
            RunOutcome::Aborted { .. } => "aborted".red().to_string(),
        };

        println!(
            " {} [{}] {} - {} {} {}",
            symbol,
            index + 1,
            run.name,
            run.method.cyan(),
            run.url,
            outcome
        );

        // 错误信息
        if let Some(error) = run.result.error() {
            println!("   {}: {}", "Error".red().bold(), error);
        }

        // verbose 模式下显示响应体
        if let Some(response) = run.result.response().filter(|_| self.verbose) {
            let body = match &response.data {
                serde_json::Value::String(text) => text.clone(),
                other => serde_json::to_string_pretty(other).unwrap_or_default(),
            };
            for line in body.lines() {
                println!("   {}", line.dimmed());
            }
        }

        // 断言结果
        if let Some(assertions) = run
            .result
            .assertion_results
            .as_ref()
            .filter(|a| !a.results.is_empty())
        {
            println!("   Assertions:");
            for assertion in &assertions.results {
                let label = format!(
                    "{} {} {}",
                    assertion.expression,
                    assertion.operator,
                    assertion.value.as_deref().unwrap_or_default()
                );
                if assertion.passed() {
                    println!("     {} {}", "✓".green(), label.trim_end());
                } else {
                    println!("     {} {}", "✗".red(), label.trim_end());
                    if let Some(error) = &assertion.error {
                        println!("       {}", error.red());
                    }
                }
            }
        }

        // 测试结果
        if let Some(tests) = run
            .result
            .test_results
            .as_ref()
            .filter(|t| !t.results.is_empty())
        {
            println!("   Tests:");
            for test in &tests.results {
                match test.status {
                    ResultStatus::Pass => println!("     {} {}", "✓".green(), test.description),
                    ResultStatus::Skip => {
                        println!("     {} {}", "⊘".dimmed(), test.description.dimmed())
                    }
                    ResultStatus::Fail => {
                        println!("     {} {}", "✗".red(), test.description);
                        if let Some(error) = &test.error {
                            println!("       {}", error.red());
                        }
                    }
                }
            }
        }
        println!();
    }

    /// 打印运行摘要
    pub fn print_summary(&self, summary: &RunSummary) {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_header(vec!["", "Passed", "Failed", "Skipped", "Total"]);

        let count = |n: usize, color: Color| {
            if n == 0 {
                Cell::new(n).add_attribute(Attribute::Dim)
            } else {
                Cell::new(n).fg(color)
            }
        };

        table.add_row(vec![
            Cell::new("Requests").add_attribute(Attribute::Bold),
            count(summary.completed, Color::Green),
            count(summary.errored, Color::Red),
            count(0, Color::Reset),
            Cell::new(summary.requests),
        ]);
        table.add_row(vec![
            Cell::new("Assertions").add_attribute(Attribute::Bold),
            count(summary.assertions_passed, Color::Green),
            count(summary.assertions_failed, Color::Red),
            count(0, Color::Reset),
            Cell::new(summary.assertions_passed + summary.assertions_failed),
        ]);
        table.add_row(vec![
            Cell::new("Tests").add_attribute(Attribute::Bold),
            count(summary.tests_passed, Color::Green),
            count(summary.tests_failed, Color::Red),
            count(summary.tests_skipped, Color::Yellow),
            Cell::new(summary.tests_passed + summary.tests_failed + summary.tests_skipped),
        ]);

        println!("{}", table);
        println!(
            "  {}: {:.3}s\n",
            "Duration".bold(),
            summary.duration.as_secs_f64()
        );

        if summary.is_success() {
            println!("{}", "All requests passed".green().bold());
        } else {
            println!("{}", "Some requests failed".red().bold());
        }
    }
}

impl Default for RunReporter {
    fn default() -> Self {
        Self::new(false)
    }
}
