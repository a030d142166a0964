//! `jobtester transfer`: copy raw stats between collectors.

use std::time::Duration;

use jobtester_core::{
    build_http_client, GatewayClient, HttpStatsReporter, StatsTransfer, TransferConfig,
};

use crate::cli::args::TransferArgs;
use crate::exit_codes::SUCCESS;

pub async fn run(args: TransferArgs) -> anyhow::Result<i32> {
    let timeout = Duration::from_secs(args.timeout_secs);
    let client = build_http_client(args.insecure_tls)?;

    let gateway = GatewayClient::new(client.clone(), args.gw.clone(), timeout);
    let destination = HttpStatsReporter::new(client.clone(), args.api.clone(), args.secret, timeout);
    let transfer = StatsTransfer::new(
        client,
        gateway,
        destination,
        TransferConfig {
            source_api: args.source_api,
            destination_api: args.api,
            timeout,
        },
    );

    let summary = transfer.run().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(SUCCESS)
}
