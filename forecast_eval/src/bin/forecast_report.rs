use forecast_eval::config::{
    ConnectionSettings, ForecastConfig, StaticConfigProvider, StaticConnectionResolver,
};
use forecast_eval::settings::EngineSettings;
use forecast_eval::source::PgSourceFactory;
use forecast_eval::{logging, EvalError, ForecastService};
use serde::Deserialize;
use std::fs::File;
use std::io::BufWriter;
use std::process::ExitCode;

const USAGE: &str = "usage: forecast_report <registry.json> <command>

commands:
  dates <data_name>
  metrics <data_name> <start> <end>
  dashboard <data_name> [csv_path]";

/// Organization, connections and forecast configs the report runs against
#[derive(Debug, Deserialize)]
struct Registry {
    organization_id: i64,
    connections: Vec<ConnectionEntry>,
    forecasts: Vec<ForecastConfig>,
}

#[derive(Debug, Deserialize)]
struct ConnectionEntry {
    id: i64,
    #[serde(flatten)]
    settings: ConnectionSettings,
}

enum Command {
    Dates(String),
    Metrics(String, String, String),
    Dashboard(String, Option<String>),
}

fn parse_command(args: &[String]) -> Option<Command> {
    match args {
        [cmd, name] if cmd == "dates" => Some(Command::Dates(name.clone())),
        [cmd, name, start, end] if cmd == "metrics" => {
            Some(Command::Metrics(name.clone(), start.clone(), end.clone()))
        }
        [cmd, name] if cmd == "dashboard" => Some(Command::Dashboard(name.clone(), None)),
        [cmd, name, csv] if cmd == "dashboard" => {
            Some(Command::Dashboard(name.clone(), Some(csv.clone())))
        }
        _ => None,
    }
}

fn load_registry(path: &str) -> Result<Registry, EvalError> {
    let file = File::open(path)?;
    let registry: Registry = serde_json::from_reader(file)?;
    for config in &registry.forecasts {
        config.validate()?;
    }
    Ok(registry)
}

async fn run(
    registry: Registry,
    command: Command,
    settings: EngineSettings,
) -> Result<String, EvalError> {
    let org = registry.organization_id;

    let mut configs = StaticConfigProvider::new();
    for config in registry.forecasts {
        configs.insert(org, config);
    }
    let mut connections = StaticConnectionResolver::new();
    for entry in registry.connections {
        connections.insert(org, entry.id, entry.settings);
    }

    let factory = PgSourceFactory::from_settings(&settings);
    let service = ForecastService::new(configs, connections, factory, settings);

    let output = match command {
        Command::Dates(name) => {
            serde_json::to_string_pretty(&service.evaluate_dates(org, &name).await?)?
        }
        Command::Metrics(name, start, end) => serde_json::to_string_pretty(
            &service.evaluate_metrics(org, &name, &start, &end).await?,
        )?,
        Command::Dashboard(name, csv_path) => {
            let view = service.build_dashboard_view(org, &name).await?;
            if let Some(path) = csv_path {
                let writer = BufWriter::new(File::create(&path)?);
                view.table_to_download.write_csv(writer)?;
                tracing::info!(path = %path, "wrote download table");
            }
            serde_json::to_string_pretty(&view.to_keyed_json()?)?
        }
    };
    Ok(output)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((registry_path, rest)) = args.split_first() else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };
    let Some(command) = parse_command(rest) else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };

    let settings = match EngineSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Invalid settings: {}", e);
            return ExitCode::from(2);
        }
    };
    logging::init(&settings.log_filter);

    let result = match load_registry(registry_path) {
        Ok(registry) => run(registry, command, settings).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "report failed");
            eprintln!("{}", e.public_message());
            ExitCode::FAILURE
        }
    }
}
