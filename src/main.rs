use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use aws_static_website::config::SiteConfig;
use aws_static_website::deploy::{deploy_plan, DeployOptions};

#[derive(Parser)]
#[command(name = "aws_static_website")]
#[command(about = "Render and deploy a static website on S3 + CloudFront", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// more logging, repeat for more
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write one cloudformation template per stack
    Synth {
        #[arg(short, long, env = "STATIC_WEBSITE_CONFIG")]
        config: PathBuf,
        #[arg(short, long, default_value = "static-website.out")]
        out_dir: PathBuf,
    },
    /// Deploy every stack, then upload the site contents
    Deploy {
        #[arg(short, long, env = "STATIC_WEBSITE_CONFIG")]
        config: PathBuf,
        /// only deploy the stacks
        #[arg(long)]
        skip_upload: bool,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Synth { config, out_dir } => {
            let plan = SiteConfig::load(&config)
                .and_then(|c| c.plan())
                .with_context(|| format!("failed to build plan from {}", config.display()))?;
            std::fs::create_dir_all(&out_dir)?;
            for (stack_name, body) in plan.render()? {
                let path = out_dir.join(format!("{stack_name}.template.json"));
                std::fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))?;
                println!("{}", path.display());
            }
        }
        Commands::Deploy { config, skip_upload } => {
            let plan = SiteConfig::load(&config)
                .and_then(|c| c.plan())
                .with_context(|| format!("failed to build plan from {}", config.display()))?;
            let options = DeployOptions { skip_upload, ..Default::default() };
            let outputs = deploy_plan(&plan, &options).await?;
            let mut keys: Vec<_> = outputs.outputs.keys().collect();
            keys.sort();
            for key in keys {
                println!("{key} = {}", outputs.outputs[key]);
            }
            tracing::info!("uploaded {} files, deleted {}", outputs.uploaded, outputs.deleted);
        }
    }
    Ok(())
}
