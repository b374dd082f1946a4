//! gate CLI 分发：`run`、`doctor`、`version`。

use anyhow::anyhow;
use serde_json::json;

use crate::{config::Config, slug::store::StoreStats};

/// CLI 分发结果。
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum CliDispatch {
    /// 继续进入服务主循环。
    Run,
    /// 命令已处理完成，主程序应退出。
    Exit,
}

/// 解析并执行 gate CLI。
pub(crate) fn dispatch(args: &[String]) -> anyhow::Result<CliDispatch> {
    let Some(cmd) = args.first().map(|raw| raw.trim()) else {
        return Ok(CliDispatch::Run);
    };
    if cmd.is_empty() || cmd == "run" {
        return Ok(CliDispatch::Run);
    }

    match cmd {
        "-h" | "--help" | "help" => {
            print_root_help();
            Ok(CliDispatch::Exit)
        }
        "doctor" => {
            let format = parse_doctor_format(&args[1..])?;
            let healthy = run_doctor(format)?;
            if !healthy {
                std::process::exit(1);
            }
            Ok(CliDispatch::Exit)
        }
        "version" | "--version" | "-V" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(CliDispatch::Exit)
        }
        other => Err(anyhow!(
            "unknown command: {other}; run `sg-gate --help` for usage"
        )),
    }
}

/// `doctor` 输出格式。
#[derive(Debug, PartialEq, Eq)]
enum DoctorFormat {
    Text,
    Json,
}

/// 解析 doctor 的 `--format` 参数。
fn parse_doctor_format(args: &[String]) -> anyhow::Result<DoctorFormat> {
    if args.is_empty() {
        return Ok(DoctorFormat::Text);
    }
    if args.len() == 2 && args[0] == "--format" {
        return match args[1].as_str() {
            "text" => Ok(DoctorFormat::Text),
            "json" => Ok(DoctorFormat::Json),
            other => Err(anyhow!("unsupported doctor format: {other}")),
        };
    }
    Err(anyhow!("usage: sg-gate doctor [--format text|json]"))
}

/// 打印当前配置与存储状态，返回存储是否可用。
fn run_doctor(format: DoctorFormat) -> anyhow::Result<bool> {
    let config = Config::from_env()?;
    let stats = config
        .open_store()
        .and_then(|store| store.stats().map_err(anyhow::Error::from));

    match format {
        DoctorFormat::Text => print!("{}", doctor_text(&config, &stats)),
        DoctorFormat::Json => {
            let payload = json!({
                "config": config,
                "storeOk": stats.is_ok(),
                "storeStats": stats.as_ref().ok(),
                "storeError": stats.as_ref().err().map(|err| format!("{err:#}")),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).unwrap_or_else(|_| "{}".to_string())
            );
        }
    }
    Ok(stats.is_ok())
}

/// doctor 文本输出。
fn doctor_text(config: &Config, stats: &anyhow::Result<StoreStats>) -> String {
    let mut out = String::new();
    out.push_str(&format!("addr: {}\n", config.addr));
    out.push_str(&format!(
        "ttl-sec: {}{}\n",
        config.ttl.as_secs(),
        if config.ttl_explicit { "" } else { " (default)" }
    ));
    out.push_str(&format!("slug-length: {}\n", config.slug_length));
    out.push_str(&format!("store: {:?}\n", config.store));
    out.push_str(&format!("store-path: {}\n", config.store_path.display()));
    out.push_str(&format!("static-dir: {}\n", config.static_dir.display()));
    out.push_str(&format!("pages-dir: {}\n", config.pages_dir.display()));
    match stats {
        Ok(stats) => out.push_str(&format!(
            "store-status: ok (total {}, used {})\n",
            stats.total, stats.used
        )),
        Err(err) => out.push_str(&format!("store-status: error ({err:#})\n")),
    }
    out
}

/// 打印 root help。
fn print_root_help() {
    println!("sg-gate usage:");
    println!("  sg-gate run");
    println!("  sg-gate doctor [--format text|json]");
    println!("  sg-gate version");
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{CliDispatch, DoctorFormat, dispatch, doctor_text, parse_doctor_format};
    use crate::{config::Config, slug::store::StoreStats};

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn empty_or_run_starts_service() {
        assert_eq!(dispatch(&[]).unwrap(), CliDispatch::Run);
        assert_eq!(dispatch(&args(&["run"])).unwrap(), CliDispatch::Run);
        assert_eq!(dispatch(&args(&["version"])).unwrap(), CliDispatch::Exit);
        assert!(dispatch(&args(&["serve-forever"])).is_err());
    }

    #[test]
    fn doctor_format_parsing() {
        assert_eq!(parse_doctor_format(&[]).unwrap(), DoctorFormat::Text);
        assert_eq!(
            parse_doctor_format(&args(&["--format", "json"])).unwrap(),
            DoctorFormat::Json
        );
        assert!(parse_doctor_format(&args(&["--format", "yaml"])).is_err());
        assert!(parse_doctor_format(&args(&["json"])).is_err());
    }

    #[test]
    fn doctor_text_flags_default_ttl() {
        let env = HashMap::<String, String>::new();
        let config = Config::from_lookup(|key| env.get(key).cloned()).unwrap();
        let text = doctor_text(&config, &Ok(StoreStats { total: 3, used: 1 }));
        assert!(text.contains("ttl-sec: 600 (default)"));
        assert!(text.contains("store-status: ok (total 3, used 1)"));
    }
}
