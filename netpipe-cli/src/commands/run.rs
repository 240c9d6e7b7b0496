// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `netpipe run` command - Play one role against a remote peer.
//!
//! With `--host` this process transmits and prints the result stream;
//! without it, it listens on the port and answers.

use anyhow::Context;
use netpipe_core::{ConfigLoader, Role, TcpOptions, TcpTransport};

use crate::args::BenchArgs;

pub fn execute(args: &BenchArgs) -> anyhow::Result<()> {
    let settings = args.to_settings()?;
    let config = ConfigLoader::validate(settings).context("Invalid benchmark configuration")?;
    super::announce(&config);
    super::pin(args.cpu.as_deref())?;

    let options = TcpOptions {
        socket_buffer: config.socket_buffer,
        ..Default::default()
    };
    let port = config.port.value();

    let transport = match (config.role, config.host.as_deref()) {
        (Role::Transmitter, Some(host)) => {
            tracing::info!(host = %host, port = port, "Connecting to receiver");
            TcpTransport::connect(host, port, options)?
        }
        _ => {
            let listener = TcpTransport::bind(port)?;
            tracing::info!(port = port, "Waiting for transmitter");
            TcpTransport::accept(listener, options)?
        }
    };

    super::drive(config, transport, args)
}
