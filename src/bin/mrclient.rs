/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use clap::{Parser, Subcommand};
use mrclient::domain::parse_scalar;
use mrclient::{
    ContainerConfig, ContainerConfigBuilder, InventoryReportingService, PlistEncoding,
    ReportFormat, ReportKind, ServiceContainer,
};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "mrclient", author, version, about, long_about = None)]
struct Cli {
    /// TOML settings file; flags override its values
    #[arg(long, env = "MRCLIENT_CONFIG")]
    config: Option<PathBuf>,

    /// Directory reports are written to
    #[arg(long)]
    tmp_dir: Option<PathBuf>,

    /// Collect and validate but do not write report files
    #[arg(long)]
    dry_run: bool,

    /// Locale for localised report values
    #[arg(long)]
    locale: Option<String>,

    /// Separator for flattened CSV column names
    #[arg(long)]
    separator: Option<String>,

    /// Kill tools that run longer than this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Write binary property lists
    #[arg(long)]
    binary: bool,

    /// Log debug output (commands run, files written)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect reports and write them to the report directory
    Run {
        /// Reports to run; all of them when omitted
        kinds: Vec<ReportKind>,

        /// Output format (csv or plist)
        #[arg(long, default_value = "plist")]
        format: ReportFormat,
    },
    /// Collect one report and print it as JSON
    Show { kind: ReportKind },
    /// Read or write a managed preference
    Pref {
        #[command(subcommand)]
        action: PrefAction,
    },
    /// List required tools that are not installed
    Check,
}

#[derive(Subcommand, Debug)]
enum PrefAction {
    /// Print the effective value of a key
    Read { bundle_id: String, key: String },
    /// Set a key for all users of this Mac
    Write {
        bundle_id: String,
        key: String,
        value: String,
    },
}

impl Cli {
    fn container_config(&self) -> Result<ContainerConfig, Box<dyn Error>> {
        let base = match self.config {
            Some(ref path) => ContainerConfig::from_toml_file(path)?,
            None => ContainerConfig::default(),
        };

        let mut builder = ContainerConfigBuilder::from(base);
        if let Some(ref dir) = self.tmp_dir {
            builder = builder.tmp_dir(dir);
        }
        if let Some(ref locale) = self.locale {
            builder = builder.locale(locale);
        }
        if let Some(ref separator) = self.separator {
            builder = builder.separator(separator);
        }
        if let Some(secs) = self.timeout {
            builder = builder.command_timeout(Duration::from_secs(secs));
        }
        if self.dry_run {
            builder = builder.dry_run(true);
        }
        if self.binary {
            builder = builder.plist_encoding(PlistEncoding::Binary);
        }
        if self.verbose {
            builder = builder.verbose(true);
        }
        Ok(builder.build())
    }
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "warn"),
    );
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

async fn run_reports(
    service: &dyn InventoryReportingService,
    kinds: &[ReportKind],
    format: ReportFormat,
) -> Result<(), Box<dyn Error>> {
    let kinds = if kinds.is_empty() {
        ReportKind::ALL.to_vec()
    } else {
        kinds.to_vec()
    };

    for kind in kinds {
        let path = match format {
            ReportFormat::Plist => service.run(kind).await?,
            ReportFormat::Csv => service.export_csv(kind).await?,
        };
        println!("{}: {}", kind, path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = cli.container_config()?;
    init_logging(config.verbose);

    let container = ServiceContainer::new(config);
    log::debug!("Running on {}", container.get_platform_name());

    match cli.command {
        Command::Run { ref kinds, format } => {
            let service = container.create_reporting_service()?;
            run_reports(service.as_ref(), kinds, format).await?;
        }
        Command::Show { kind } => {
            let service = container.create_reporting_service()?;
            let data = service.collect(kind).await?;
            println!("{}", serde_json::to_string_pretty(&data.to_value())?);
        }
        Command::Pref { ref action } => {
            let store = container.create_preference_store();
            match action {
                PrefAction::Read { bundle_id, key } => match store.read(bundle_id, key).await? {
                    Some(value) => println!("{}", value),
                    None => {
                        eprintln!("{} {} is not set", bundle_id, key);
                        std::process::exit(1);
                    }
                },
                PrefAction::Write {
                    bundle_id,
                    key,
                    value,
                } => {
                    store.write(key, &parse_scalar(value), bundle_id).await?;
                }
            }
        }
        Command::Check => {
            let missing = container.validate_dependencies().await?;
            if missing.is_empty() {
                println!("All required tools are installed");
            } else {
                println!("Missing dependencies: {}", missing.join(", "));
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
