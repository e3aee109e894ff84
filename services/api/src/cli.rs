use crate::demo::{run_demo, run_pipeline_report, DemoArgs, PipelineArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use recruit_flow::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Recruitment Workflow",
    about = "Run the recruitment workflow service or walk through it from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk a job from draft to hire against in-memory collaborators
    Demo(DemoArgs),
    /// Summarize the hiring funnel for a JSON snapshot of applications
    Pipeline(PipelineArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::Pipeline(args) => run_pipeline_report(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recruit_flow::workflows::hiring::FunnelStage;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["recruit-flow-api"]).expect("parses");
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["recruit-flow-api", "serve", "--port", "9090"])
            .expect("parses");
        match cli.command {
            Some(Command::Serve(args)) => assert_eq!(args.port, Some(9090)),
            other => panic!("expected serve, got {other:?}"),
        }
    }

    #[test]
    fn pipeline_collects_repeated_falling_stages() {
        let cli = Cli::try_parse_from([
            "recruit-flow-api",
            "pipeline",
            "--input",
            "applications.json",
            "--falling",
            "hr_review",
            "--falling",
            "final_review",
        ])
        .expect("parses");
        match cli.command {
            Some(Command::Pipeline(args)) => {
                assert_eq!(args.falling, vec![FunnelStage::HrReview, FunnelStage::FinalReview]);
                assert_eq!(args.threshold_days, 3.0);
                assert!(args.as_of.is_none());
            }
            other => panic!("expected pipeline, got {other:?}"),
        }
    }

    #[test]
    fn demo_rejects_malformed_dates() {
        let error = Cli::try_parse_from(["recruit-flow-api", "demo", "--interview-date", "June 20"])
            .expect_err("date must be YYYY-MM-DD");
        assert!(error.to_string().contains("June 20"));
    }
}
