use std::env;
use std::sync::Arc;

use systemd_units::{
    config::Config, default_registry, logging, types::realtime_usec_to_utc, Mode, MonitorListener,
    Unit, UnitKind, UnitTypeMonitor,
};
use tracing::info;

struct PrintListener;

impl MonitorListener for PrintListener {
    fn monitor_refreshed(&self, units: &[Arc<Unit>]) {
        let mut names: Vec<&str> = units.iter().map(|unit| unit.name()).collect();
        names.sort_unstable();
        info!(count = names.len(), units = ?names, "monitor refreshed");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    let registry = default_registry();
    let manager = registry.open(config.bus).await?;

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None | Some("list") => {
            let units = manager.list_units().await?;
            for unit in &units {
                println!("{}", serde_json::to_string(unit)?);
            }
            info!(count = units.len(), "listed units");
        }
        Some("service") => {
            if args.len() < 2 {
                return Err("service requires at least one unit name".into());
            }
            for name in &args[1..] {
                let unit = manager.resolve(name, UnitKind::Service);
                unit.refresh_properties().await?;
                let active_since = unit
                    .active_enter_timestamp()
                    .ok()
                    .and_then(realtime_usec_to_utc)
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}\t{}/{}\t{}\t{}",
                    unit.name(),
                    unit.active_state()?,
                    unit.sub_state()?,
                    active_since,
                    unit.description()?,
                );
            }
        }
        Some("start") | Some("stop") | Some("restart") => {
            if args.len() != 2 {
                return Err(format!("{} requires exactly one unit name", args[0]).into());
            }
            let unit = manager.resolve(&args[1], UnitKind::Service);
            let job = match args[0].as_str() {
                "start" => unit.start(Mode::Replace).await?,
                "stop" => unit.stop(Mode::Replace).await?,
                _ => unit.restart(Mode::Replace).await?,
            };
            info!(unit = unit.name(), job = %job, "job enqueued");
        }
        Some("monitor") => {
            let kinds: Vec<UnitKind> = args[1..]
                .iter()
                .filter_map(|tag| UnitKind::from_tag(tag))
                .collect();
            if kinds.is_empty() {
                return Err("monitor requires at least one unit kind (e.g. service)".into());
            }

            let monitor = UnitTypeMonitor::new(manager.clone());
            monitor.add_listener(Arc::new(PrintListener));
            monitor.add_monitored_types(&kinds).await?;
            if config.follow_signals {
                monitor.attach().await?;
            }

            info!("monitoring, press ctrl-c to stop");
            tokio::signal::ctrl_c().await?;
            monitor.detach();
        }
        Some(other) => {
            return Err(format!(
                "unknown command {other}; expected list, service, start, stop, restart or monitor"
            )
            .into())
        }
    }

    registry.close_all();
    Ok(())
}
