// ==========================================
// 钢卷纵剪排产系统 - 命令行入口
// ==========================================
// 用法: coil-slitting <scenario.json> [--db <path>] [--execute <方案序号>]
// 输入: JSON 场景 (钢卷、欠料、选卷与模式)
// 输出: 方案生成结果 (JSON,stdout);指定 --execute 时输出投产回执
// ==========================================

use std::fs;

use anyhow::{bail, Context};
use coil_slitting::app::AppState;
use coil_slitting::{logging, Coil, DemandLine, PlanningRequest};
use serde::Deserialize;
use serde_json::json;

/// 排产场景
#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(default)]
    coils: Vec<Coil>,
    #[serde(default)]
    demand_lines: Vec<DemandLine>,
    #[serde(flatten)]
    request: PlanningRequest,
}

struct CliArgs {
    scenario_path: String,
    db_path: Option<String>,
    execute_index: Option<usize>,
}

fn parse_args() -> anyhow::Result<CliArgs> {
    let mut args = std::env::args().skip(1);
    let mut scenario_path = None;
    let mut db_path = None;
    let mut execute_index = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => {
                db_path = Some(args.next().context("--db 需要数据库路径")?);
            }
            "--execute" => {
                let raw = args.next().context("--execute 需要方案序号")?;
                execute_index = Some(raw.parse::<usize>().context("方案序号必须为非负整数")?);
            }
            other if scenario_path.is_none() => scenario_path = Some(other.to_string()),
            other => bail!("无法识别的参数: {}", other),
        }
    }

    let scenario_path = scenario_path
        .context("用法: coil-slitting <scenario.json> [--db <path>] [--execute <方案序号>]")?;
    Ok(CliArgs {
        scenario_path,
        db_path,
        execute_index,
    })
}

fn main() -> anyhow::Result<()> {
    logging::init();

    tracing::info!("{} v{}", coil_slitting::APP_NAME, coil_slitting::VERSION);

    let args = parse_args()?;
    let raw = fs::read_to_string(&args.scenario_path)
        .with_context(|| format!("无法读取场景文件: {}", args.scenario_path))?;
    let scenario: Scenario = serde_json::from_str(&raw).context("场景文件格式错误")?;

    let state = match args.db_path {
        Some(path) => AppState::new(path),
        None => AppState::in_memory(),
    }
    .map_err(anyhow::Error::msg)?;

    if !scenario.coils.is_empty() {
        state.inventory_api.import_coils(scenario.coils)?;
    }
    if !scenario.demand_lines.is_empty() {
        state.inventory_api.import_demand_lines(scenario.demand_lines)?;
    }

    let outcome = state.planning_api.generate_plans(&scenario.request)?;

    let output = match args.execute_index {
        None => serde_json::to_value(&outcome)?,
        Some(index) => {
            let plan = outcome
                .plans
                .get(index)
                .with_context(|| format!("方案序号 {} 不存在 (共 {} 个)", index, outcome.plans.len()))?;
            let coil = outcome.coil.as_ref().context("未选定钢卷")?;
            let receipt = state.ledger_api.execute_plan(plan, &coil.coil_id)?;
            eprintln!("{}", receipt.summary());
            json!({
                "outcome": outcome,
                "receipt": receipt,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
