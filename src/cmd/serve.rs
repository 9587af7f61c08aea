//! The `serve` subcommand.

use std::net::SocketAddr;

use clap::Args;

use crate::{
    gateway::Gateway,
    prelude::*,
    providers::ProviderOpts,
    server::{AppState, serve},
};

/// Serve command line arguments.
#[derive(Debug, Args)]
pub struct ServeOpts {
    /// The address to listen on.
    #[clap(long, default_value = "127.0.0.1:9002")]
    pub listen: SocketAddr,

    /// The largest request body we accept. Images are sent inline, so this
    /// bounds the image size.
    #[clap(long, default_value_t = 20 * 1024 * 1024)]
    pub max_body_bytes: usize,

    #[clap(flatten)]
    pub provider_opts: ProviderOpts,
}

/// The `serve` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_serve(opts: &ServeOpts) -> Result<()> {
    let gateway = Gateway::from_opts(&opts.provider_opts).await?;
    serve(opts.listen, AppState { gateway }, opts.max_body_bytes).await
}
