mod cache;
mod logging;
mod models;
mod output;
mod phases;
mod scenario;
mod scheduler;
mod simulation;

use clap::{Arg, ArgAction, Command};
use logging::{LogConfig, LogOutput};
use scenario::MissionConfig;
use simulation::SimulationEngine;
use tracing::{info, error};

fn main() {
    // コマンドライン引数の解析
    let matches = Command::new("uasmission")
        .version(env!("CARGO_PKG_VERSION"))
        .about("UAS探索・追尾ミッションスケジューラ")
        .long_about("2台の地上車両（RGV）を探索・位置特定・追尾するUASの\n\
                     ミッションフェーズスケジューラを、閉ループシミュレーションで実行します。")
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("ミッションファイル(.yaml)のパスを指定")
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(ArgAction::SetTrue)
                .help("ミッションの情報のみ表示して終了")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("詳細出力レベル (-v: 基本, -vv: 詳細, -vvv: デバッグ)")
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("TARGET")
                .value_parser(["console", "file", "both"])
                .default_value("console")
                .help("ログ出力先 (console, file, both)")
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("ログレベル (trace, debug, info, warn, error)。省略時は-vから決定")
        )
        .arg(
            Arg::new("paced")
                .long("paced")
                .action(ArgAction::SetTrue)
                .help("ティック周期に合わせて実時間で実行")
                .conflicts_with("info")
        )
        .get_matches();

    let verbose_level = matches.get_count("verbose");

    let Some(scenario_path) = matches.get_one::<String>("scenario") else {
        show_default_help();
        return;
    };

    let log_output = matches
        .get_one::<String>("log-output")
        .and_then(|s| s.parse::<LogOutput>().ok())
        .unwrap_or(LogOutput::Console);
    let level = match matches.get_one::<String>("log-level") {
        Some(level) => logging::parse_log_level(level),
        None => logging::level_from_verbosity(verbose_level),
    };
    let log_config = LogConfig { level, output: log_output, ..LogConfig::default() };

    // ファイル出力のガードはプロセス終了まで保持する
    let _log_guard = match logging::init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ログ初期化エラー: {}", e);
            None
        }
    };

    if let Err(e) = run_scenario(scenario_path, matches.get_flag("info"), matches.get_flag("paced"), verbose_level) {
        error!("ミッション実行に失敗しました: {}", e);
        eprintln!("エラー: {}", e);
        std::process::exit(1);
    }
}

/// ミッションファイルを読み込んで実行
fn run_scenario(
    scenario_path: &str,
    info_only: bool,
    paced: bool,
    verbose_level: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    // 設定エラーは最初のティックより前に致命的
    let config = MissionConfig::from_file(scenario_path)?;
    info!(path = scenario_path, name = %config.meta.name, "ミッションファイル読み込み完了");

    config.print_summary();
    if info_only {
        return Ok(());
    }
    println!();

    let mut engine = SimulationEngine::new(&config, verbose_level)?;
    let summary = if paced {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        runtime.block_on(engine.run_paced())
    } else {
        engine.run()
    };

    println!();
    summary.print();
    Ok(())
}

/// デフォルトヘルプを表示
fn show_default_help() {
    println!("UAS探索・追尾ミッションスケジューラ - uasmission v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("使用方法:");
    println!("  uasmission [オプション]");
    println!();
    println!("オプション:");
    println!("  -s, --scenario <FILE>     ミッションファイルを指定して実行");
    println!("  -i, --info                ミッション情報のみ表示");
    println!("  -v, --verbose             詳細出力 (複数指定で詳細レベル上昇)");
    println!("      --log-output <TARGET> ログ出力先 (console, file, both)");
    println!("      --log-level <LEVEL>   ログレベル");
    println!("      --paced               実時間で実行");
    println!("  -h, --help                このヘルプを表示");
    println!();
    println!("利用可能なミッションファイル:");
    println!("  missions/single_rgv.yaml  - 1台のRGVを探索・追尾");
    println!("  missions/two_rgv.yaml     - 2台のRGVを同時追尾");
    println!();
    println!("例:");
    println!("  uasmission -s missions/single_rgv.yaml");
    println!("  uasmission -s missions/two_rgv.yaml -v --log-output both");
    println!("  uasmission -s missions/two_rgv.yaml -i");
}
