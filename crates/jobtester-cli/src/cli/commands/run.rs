//! `jobtester run`: callback server in the background, one pass over the fleet.

use anyhow::Context;
use jobtester_core::{server, JobTester, TesterConfig};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::cli::args::RunArgs;
use crate::exit_codes::{JOB_FAILED, SUCCESS};

pub async fn run(args: RunArgs) -> anyhow::Result<i32> {
    let mut config = TesterConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
        config.validate().context("--concurrency")?;
    }

    let server_addr = config.server_addr();
    let tester = JobTester::new(config)?;

    let mut shutdown = None;
    let mut server_task = None;
    if !args.no_server {
        let listener = server::bind(&server_addr).await?;
        let (tx, rx) = oneshot::channel::<()>();
        let context = tester.context();
        server_task = Some(tokio::spawn(async move {
            server::serve(listener, context, async {
                let _ = rx.await;
            })
            .await
        }));
        shutdown = Some(tx);
    }

    let result = tester.run().await;

    if let Some(tx) = shutdown {
        let _ = tx.send(());
    }
    if let Some(task) = server_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "callback server exited with error"),
            Err(e) => warn!(error = %e, "callback server task failed"),
        }
    }

    let summary = result.context("test run aborted")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if args.fail_on_job_failure && summary.any_failed() {
        info!("at least one job did not pass");
        return Ok(JOB_FAILED);
    }
    Ok(SUCCESS)
}
